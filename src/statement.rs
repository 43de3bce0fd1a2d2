//! Column inference, SQL text building and the per-shape statement cache backing
//! [`Repository`](crate::repository::Repository).

pub mod build;
pub mod cache;
pub mod columns;

pub use cache::{CacheEntry, CacheKey, StatementCache};
pub use columns::Columns;
