use std::str::FromStr;

use dotenvy::dotenv;
use eyre::Context;
use sqlx::{
    PgPool, SqlitePool,
    postgres::PgPoolOptions,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

impl DbType {
    #[must_use]
    pub fn from_connection_string(input: &str) -> Option<Self> {
        let lower = input.to_lowercase();

        if lower.starts_with("postgres") {
            Some(Self::Postgres)
        } else if lower.starts_with("sqlite") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }
}

/// Attempt to retrieve the database URL from the `DATABASE_URL` environment variable, or from a
/// corresponding `.env` file.
#[must_use]
pub fn get_database_url() -> Option<String> {
    let _ = dotenv();

    std::env::var("DATABASE_URL").ok()
}

/// # Errors
///
/// If the server cannot be reached.
pub async fn connect_postgres(url: &str) -> eyre::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("Failed to connect to postgres")
}

/// Open a SQLite database, creating the file if needed. The pool holds a single connection so
/// that `sqlite::memory:` databases outlive individual statements.
///
/// # Errors
///
/// If the URL is malformed or the database cannot be opened.
pub async fn connect_sqlite(url: &str) -> eyre::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .context("Invalid sqlite URL")?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .context("Failed to open sqlite database")
}
