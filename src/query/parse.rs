use crate::{dialect::Dialect, error::Result};

/// Trait describing a struct that may be parsed from a [`sqlx::Row`].
///
/// Implemented for every entity by [`DatabaseModel`](crate::DatabaseModel), and for ad-hoc
/// result structs by [`FromSqlxRow`](crate::FromSqlxRow).
pub trait ParseFromRow<DB>: Sized
where
    DB: Dialect,
{
    /// # Errors
    ///
    /// If a column is missing from the row or cannot be decoded into the field's type.
    fn parse_from_row(row: &DB::Row) -> Result<Self>;
}
