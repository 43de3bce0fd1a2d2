//! SQL text for the statements issued by a repository.
//!
//! Every function here is pure: the output depends on nothing but the arguments. Placeholders
//! are numbered left to right, write columns first, then key columns, then one key group per
//! row for batched statements.

use itertools::Itertools;

use crate::query::quote_ident;

/// SQL text along with the number of values it expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub placeholders: usize,
}

#[derive(Default)]
struct Placeholders(usize);

impl Placeholders {
    fn next(&mut self) -> String {
        self.0 += 1;
        format!("${}", self.0)
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            placeholders: self.0,
        }
    }
}

fn column_list(columns: &[&str]) -> String {
    columns.iter().map(|e| quote_ident(e)).join(",")
}

fn assignments(columns: &[&str], placeholders: &mut Placeholders) -> String {
    columns
        .iter()
        .map(|e| format!("{}={}", quote_ident(e), placeholders.next()))
        .join(",")
}

fn key_match(key: &[&str], placeholders: &mut Placeholders) -> String {
    key.iter()
        .map(|e| format!("{}={}", quote_ident(e), placeholders.next()))
        .join(" AND ")
}

fn returning(columns: &[&str]) -> String {
    if columns.is_empty() {
        String::new()
    } else {
        format!(" RETURNING {}", column_list(columns))
    }
}

fn insert_head(table: &str, write: &[&str], placeholders: &mut Placeholders) -> String {
    if write.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table));
    }

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        column_list(write),
        write.iter().map(|_| placeholders.next()).join(",")
    )
}

/// `key` matched once per row, each group in brackets, glued with `OR`.
#[must_use]
pub fn repeated_key_match(key: &[&str], start: usize, rows: usize) -> String {
    let mut placeholders = Placeholders(start);

    (0..rows)
        .map(|_| format!("({})", key_match(key, &mut placeholders)))
        .join(" OR ")
}

#[must_use]
pub fn insert(table: &str, write: &[&str], returned: &[&str]) -> Statement {
    let mut placeholders = Placeholders::default();
    let sql = insert_head(table, write, &mut placeholders) + &returning(returned);
    placeholders.finish(sql)
}

/// An insert that falls back to updating `update` when a row with the same `conflict` columns
/// already exists. With `update` set to `None` the conflicting insert is skipped instead.
#[must_use]
pub fn upsert(
    table: &str,
    write: &[&str],
    conflict: &[&str],
    update: Option<&[&str]>,
    returned: &[&str],
) -> Statement {
    let mut placeholders = Placeholders::default();
    let mut sql = insert_head(table, write, &mut placeholders);

    match update {
        Some(update) => {
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                column_list(conflict),
                update
                    .iter()
                    .map(|e| format!("{0}=EXCLUDED.{0}", quote_ident(e)))
                    .join(",")
            ));
        }
        None => sql.push_str(" ON CONFLICT DO NOTHING"),
    }

    sql.push_str(&returning(returned));
    placeholders.finish(sql)
}

#[must_use]
pub fn update(table: &str, write: &[&str], key: &[&str]) -> Statement {
    let mut placeholders = Placeholders::default();
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quote_ident(table),
        assignments(write, &mut placeholders),
        key_match(key, &mut placeholders)
    );
    placeholders.finish(sql)
}

/// One update setting the same values on `rows` rows.
#[must_use]
pub fn update_all(table: &str, write: &[&str], key: &[&str], rows: usize) -> Statement {
    let mut placeholders = Placeholders::default();
    let set = assignments(write, &mut placeholders);
    let filter = repeated_key_match(key, placeholders.0, rows);
    placeholders.0 += key.len() * rows;

    placeholders.finish(format!(
        "UPDATE {} SET {} WHERE {}",
        quote_ident(table),
        set,
        filter
    ))
}

#[must_use]
pub fn delete(table: &str, key: &[&str]) -> Statement {
    let mut placeholders = Placeholders::default();
    let sql = format!(
        "DELETE FROM {} WHERE {}",
        quote_ident(table),
        key_match(key, &mut placeholders)
    );
    placeholders.finish(sql)
}

#[must_use]
pub fn delete_all(table: &str, key: &[&str], rows: usize) -> Statement {
    Statement {
        sql: format!(
            "DELETE FROM {} WHERE {}",
            quote_ident(table),
            repeated_key_match(key, 0, rows)
        ),
        placeholders: key.len() * rows,
    }
}

#[must_use]
pub fn select_by_key(table: &str, columns: &[&str], key: &[&str]) -> Statement {
    let mut placeholders = Placeholders::default();
    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        column_list(columns),
        quote_ident(table),
        key_match(key, &mut placeholders)
    );
    placeholders.finish(sql)
}

#[must_use]
pub fn select_by_keys(table: &str, columns: &[&str], key: &[&str], rows: usize) -> Statement {
    Statement {
        sql: format!(
            "SELECT {} FROM {} WHERE {}",
            column_list(columns),
            quote_ident(table),
            repeated_key_match(key, 0, rows)
        ),
        placeholders: key.len() * rows,
    }
}

#[must_use]
pub fn exists(table: &str, key: &[&str]) -> Statement {
    let mut placeholders = Placeholders::default();
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} LIMIT 1) AS \"exists\"",
        quote_ident(table),
        key_match(key, &mut placeholders)
    );
    placeholders.finish(sql)
}
