use std::fmt::Display;

use thiserror::Error as ThisError;

use crate::entity::hooks::HookPoint;

/// Boxed error type returned by lifecycle hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The kind of statement an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Upsert,
    Delete,
    Select,
    Count,
    Exists,
    /// A hand-written statement.
    Raw,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Insert => "insert",
                Self::Update => "update",
                Self::Upsert => "upsert",
                Self::Delete => "delete",
                Self::Select => "select",
                Self::Count => "count",
                Self::Exists => "exists",
                Self::Raw => "run",
            }
        )
    }
}

#[derive(Debug, ThisError)]
pub enum Error {
    /// A single-row fetch matched no rows.
    #[error("no matching row in \"{table}\"")]
    NotFound { table: &'static str },

    /// The column-selection policy left nothing to write.
    #[error("unable to {operation} \"{table}\": no columns to write")]
    EmptyColumnSet {
        table: &'static str,
        operation: Operation,
    },

    #[error("failed to {operation} \"{table}\": {source}")]
    Execution {
        table: &'static str,
        operation: Operation,
        #[source]
        source: sqlx::Error,
    },

    /// Field bindings and statement placeholders disagree. This is a bug in the entity
    /// declaration or in this crate, never a runtime condition.
    #[error("binding mismatch on \"{table}\": {detail}")]
    BindingMismatch { table: &'static str, detail: String },

    #[error("failed to decode column \"{column}\" of \"{table}\": {source}")]
    Decode {
        table: &'static str,
        column: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// The statement did not finish within the configured timeout.
    #[error("{operation} on \"{table}\" was cancelled")]
    Cancelled {
        table: &'static str,
        operation: Operation,
    },

    #[error("{point} hook failed: {source}")]
    Hook {
        point: HookPoint,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn execution(table: &'static str, operation: Operation, source: sqlx::Error) -> Self {
        match source {
            sqlx::Error::RowNotFound => Self::NotFound { table },
            source => Self::Execution {
                table,
                operation,
                source,
            },
        }
    }

    pub(crate) fn binding(table: &'static str, detail: impl Into<String>) -> Self {
        Self::BindingMismatch {
            table,
            detail: detail.into(),
        }
    }

    /// Whether this error signals a missing row rather than a failed operation.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
