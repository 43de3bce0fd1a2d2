use futures::future::BoxFuture;
use sqlx::{Database, Executor};

use crate::value::{Value, ValueKind};

/// A database backend statements can be run against.
///
/// Generated SQL uses double-quoted identifiers and positional `$n` placeholders, which both
/// supported backends accept. The methods here are the only places where [`Value`]s meet
/// concrete driver types, so the rest of the crate stays generic over the backend without
/// carrying per-type `Encode`/`Decode` bounds around.
pub trait Dialect: Database {
    /// Whether `INSERT .. ON CONFLICT .. RETURNING` is supported.
    const UPSERT_RETURNING: bool;

    /// Run a statement, returning the number of affected rows.
    fn execute<'e, 'c: 'e, E>(
        executor: E,
        sql: &'e str,
        values: Vec<Value>,
    ) -> BoxFuture<'e, Result<u64, sqlx::Error>>
    where
        E: 'e + Executor<'c, Database = Self>;

    /// Run a statement, returning its first row if there is one.
    fn fetch_optional<'e, 'c: 'e, E>(
        executor: E,
        sql: &'e str,
        values: Vec<Value>,
    ) -> BoxFuture<'e, Result<Option<Self::Row>, sqlx::Error>>
    where
        E: 'e + Executor<'c, Database = Self>;

    /// Run a statement, returning all of its rows.
    fn fetch_all<'e, 'c: 'e, E>(
        executor: E,
        sql: &'e str,
        values: Vec<Value>,
    ) -> BoxFuture<'e, Result<Vec<Self::Row>, sqlx::Error>>
    where
        E: 'e + Executor<'c, Database = Self>;

    /// Decode a single column of a row. `NULL` decodes to [`Value::Null`].
    ///
    /// # Errors
    ///
    /// If the column does not exist in the row, or its type is incompatible with `kind`.
    fn decode(row: &Self::Row, column: &str, kind: ValueKind) -> Result<Value, sqlx::Error>;
}

macro_rules! impl_dialect {
    ($db:ty, upsert_returning = $upsert_returning:expr) => {
        impl Dialect for $db {
            const UPSERT_RETURNING: bool = $upsert_returning;

            fn execute<'e, 'c: 'e, E>(
                executor: E,
                sql: &'e str,
                values: Vec<Value>,
            ) -> BoxFuture<'e, Result<u64, sqlx::Error>>
            where
                E: 'e + Executor<'c, Database = Self>,
            {
                Box::pin(async move {
                    let arguments = bind_values::<$db>(values)?;
                    let result = sqlx::query_with(sql, arguments).execute(executor).await?;
                    Ok(result.rows_affected())
                })
            }

            fn fetch_optional<'e, 'c: 'e, E>(
                executor: E,
                sql: &'e str,
                values: Vec<Value>,
            ) -> BoxFuture<'e, Result<Option<Self::Row>, sqlx::Error>>
            where
                E: 'e + Executor<'c, Database = Self>,
            {
                Box::pin(async move {
                    let arguments = bind_values::<$db>(values)?;
                    sqlx::query_with(sql, arguments)
                        .fetch_optional(executor)
                        .await
                })
            }

            fn fetch_all<'e, 'c: 'e, E>(
                executor: E,
                sql: &'e str,
                values: Vec<Value>,
            ) -> BoxFuture<'e, Result<Vec<Self::Row>, sqlx::Error>>
            where
                E: 'e + Executor<'c, Database = Self>,
            {
                Box::pin(async move {
                    let arguments = bind_values::<$db>(values)?;
                    sqlx::query_with(sql, arguments).fetch_all(executor).await
                })
            }

            fn decode(
                row: &Self::Row,
                column: &str,
                kind: ValueKind,
            ) -> Result<Value, sqlx::Error> {
                use chrono::{DateTime, Utc};
                use sqlx::Row;

                let value = match kind {
                    ValueKind::Bool => row.try_get::<Option<bool>, _>(column)?.map(Value::Bool),
                    ValueKind::I32 => row.try_get::<Option<i32>, _>(column)?.map(Value::I32),
                    ValueKind::I64 => row.try_get::<Option<i64>, _>(column)?.map(Value::I64),
                    ValueKind::F64 => row.try_get::<Option<f64>, _>(column)?.map(Value::F64),
                    ValueKind::Text => row.try_get::<Option<String>, _>(column)?.map(Value::Text),
                    ValueKind::Timestamp => row
                        .try_get::<Option<DateTime<Utc>>, _>(column)?
                        .map(Value::Timestamp),
                };

                Ok(value.unwrap_or(Value::Null(kind)))
            }
        }
    };
}

/// Bind values, in order, into the driver's argument buffer.
#[cfg(any(feature = "postgres", feature = "sqlite", feature = "sqlite-unbundled"))]
fn bind_values<'q, DB>(values: Vec<Value>) -> Result<<DB as Database>::Arguments<'q>, sqlx::Error>
where
    DB: Database,
    bool: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    i32: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    i64: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    f64: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    String: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    chrono::DateTime<chrono::Utc>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    Option<bool>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    Option<i32>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    Option<i64>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    Option<f64>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    Option<String>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    Option<chrono::DateTime<chrono::Utc>>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
{
    use chrono::{DateTime, Utc};
    use sqlx::Arguments;

    let mut arguments = <DB as Database>::Arguments::<'q>::default();

    for value in values {
        let bound = match value {
            Value::Bool(v) => arguments.add(v),
            Value::I32(v) => arguments.add(v),
            Value::I64(v) => arguments.add(v),
            Value::F64(v) => arguments.add(v),
            Value::Text(v) => arguments.add(v),
            Value::Timestamp(v) => arguments.add(v),
            Value::Null(kind) => match kind {
                ValueKind::Bool => arguments.add(None::<bool>),
                ValueKind::I32 => arguments.add(None::<i32>),
                ValueKind::I64 => arguments.add(None::<i64>),
                ValueKind::F64 => arguments.add(None::<f64>),
                ValueKind::Text => arguments.add(None::<String>),
                ValueKind::Timestamp => arguments.add(None::<DateTime<Utc>>),
            },
        };

        bound.map_err(sqlx::Error::Encode)?;
    }

    Ok(arguments)
}

#[cfg(feature = "postgres")]
impl_dialect!(sqlx::Postgres, upsert_returning = true);

#[cfg(any(feature = "sqlite", feature = "sqlite-unbundled"))]
impl_dialect!(sqlx::Sqlite, upsert_returning = true);
