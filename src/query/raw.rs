use sqlx::Executor;
use tracing::debug;

use crate::{
    dialect::Dialect,
    error::{Error, Operation, Result},
    value::{ColumnValue, Value},
};

use super::parse::ParseFromRow;

/// Name used in errors raised by raw queries, which are not tied to a table.
pub const RAW_QUERY: &str = "raw query";

/// A hand-written SQL statement with positional `$n` placeholders.
///
/// ```ignore
/// let rows: Vec<AuthorArticle> = Raw::new(
///     "SELECT a.name, b.title FROM author a JOIN article b ON b.author_id = a.id WHERE a.id = $1",
/// )
/// .bind(1)
/// .fetch_all(&pool)
/// .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Raw {
    sql: String,
    values: Vec<Value>,
}

impl Raw {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: vec![],
        }
    }

    /// Bind the value of the next placeholder.
    #[must_use]
    pub fn bind(mut self, value: impl ColumnValue) -> Self {
        self.values.push(value.to_value());
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// # Errors
    ///
    /// If there's been a problem communicating with the database.
    pub async fn execute<'c, DB, E>(self, executor: E) -> Result<u64>
    where
        DB: Dialect,
        E: Executor<'c, Database = DB>,
    {
        debug!(sql = %self.sql, values = ?self.values, "raw execute");

        DB::execute(executor, &self.sql, self.values.clone())
            .await
            .map_err(|e| Error::execution(RAW_QUERY, Operation::Raw, e))
    }

    /// # Errors
    ///
    /// [`Error::NotFound`] if the statement returned no rows, or if there's been a problem
    /// communicating with the database.
    pub async fn fetch_one<'c, R, DB, E>(self, executor: E) -> Result<R>
    where
        R: ParseFromRow<DB>,
        DB: Dialect,
        E: Executor<'c, Database = DB>,
    {
        debug!(sql = %self.sql, values = ?self.values, "raw fetch one");

        let row = DB::fetch_optional(executor, &self.sql, self.values.clone())
            .await
            .map_err(|e| Error::execution(RAW_QUERY, Operation::Raw, e))?
            .ok_or(Error::NotFound { table: RAW_QUERY })?;

        R::parse_from_row(&row)
    }

    /// # Errors
    ///
    /// If there's been a problem communicating with the database, or a row could not be parsed.
    pub async fn fetch_all<'c, R, DB, E>(self, executor: E) -> Result<Vec<R>>
    where
        R: ParseFromRow<DB>,
        DB: Dialect,
        E: Executor<'c, Database = DB>,
    {
        debug!(sql = %self.sql, values = ?self.values, "raw fetch all");

        DB::fetch_all(executor, &self.sql, self.values.clone())
            .await
            .map_err(|e| Error::execution(RAW_QUERY, Operation::Raw, e))?
            .iter()
            .map(R::parse_from_row)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::Raw;
    use crate::value::Value;

    #[test]
    fn test_values_are_bound_in_order() {
        let raw = Raw::new("SELECT * FROM author WHERE id = $1 OR (name = $2 AND email IS NOT $3)")
            .bind(3)
            .bind(Some("x".to_string()))
            .bind(None::<i64>);

        assert_eq!(
            raw.values(),
            &[
                Value::I32(3),
                Value::Text("x".to_string()),
                Value::Null(crate::value::ValueKind::I64),
            ]
        );
    }
}
