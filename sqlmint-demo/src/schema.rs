use sqlmint::{dialect::Dialect, query::raw::Raw};
use sqlx::{Database, Executor, Pool};

use crate::db::DbType;

const POSTGRES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "author" (
        "id" SERIAL PRIMARY KEY,
        "email" TEXT NOT NULL,
        "name" TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "article" (
        "id" SERIAL PRIMARY KEY,
        "title" TEXT NOT NULL,
        "body" TEXT,
        "author_id" INTEGER NOT NULL REFERENCES "author" ("id") ON DELETE CASCADE,
        "created_at" TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
    )"#,
];

const SQLITE: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "author" (
        "id" INTEGER PRIMARY KEY AUTOINCREMENT,
        "email" TEXT NOT NULL,
        "name" TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "article" (
        "id" INTEGER PRIMARY KEY AUTOINCREMENT,
        "title" TEXT NOT NULL,
        "body" TEXT,
        "author_id" INTEGER NOT NULL REFERENCES "author" ("id") ON DELETE CASCADE,
        "created_at" DATETIME DEFAULT CURRENT_TIMESTAMP
    )"#,
];

#[must_use]
pub const fn statements(db_type: DbType) -> &'static [&'static str] {
    match db_type {
        DbType::Postgres => POSTGRES,
        DbType::Sqlite => SQLITE,
    }
}

/// Create the `author` and `article` tables if they don't exist yet. Statements run one at a
/// time since prepared statements can't hold more than one.
///
/// # Errors
///
/// If a statement fails.
pub async fn bootstrap<DB>(pool: &Pool<DB>, db_type: DbType) -> sqlmint::Result<()>
where
    DB: Dialect,
    for<'e> &'e mut <DB as Database>::Connection: Executor<'e, Database = DB>,
{
    for statement in statements(db_type) {
        Raw::new(*statement).execute(pool).await?;
    }

    Ok(())
}
