extern crate self as sqlmint;

pub mod dialect;
pub mod entity;
pub mod error;
pub mod query;
pub mod repository;
pub mod session;
pub mod statement;
pub mod value;

pub use error::{Error, Result};
pub use repository::{Repository, UpsertOptions};
pub use session::{Session, SessionConfig};
pub use statement::Columns;

pub use sqlmint_macros::DatabaseModel;
/// Derive macro to implement [`ParseFromRow`](query::parse::ParseFromRow).
pub use sqlmint_macros::FromSqlxRow;

pub use sqlx;
