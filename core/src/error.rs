//! Error types for lihtne-core.

use crate::value::Value;
use thiserror::Error;

/// Core error type for query construction, compilation and execution.
///
/// Variants map directly onto the error kinds named in the specification:
/// `InvalidArgument`, `UnsupportedFeature`, `CompilationError`, `QueryError`,
/// `LostConnection` and `Runtime`.
#[derive(Debug, Error)]
pub enum LihtneError {
    /// Malformed argument to a builder method: a non-scalar nested in a
    /// `whereIn` array, a non-associative payload to `incrementEach`, an
    /// unsupported subquery shape, a non-numeric increment, wrong arity in
    /// `whereRowValues`, or a bad order direction.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A dialect's grammar does not support the requested operation (lateral
    /// joins on SQLite/MariaDB, JSON ops on ANSI, fulltext outside
    /// MySQL/Postgres, upsert on ANSI, insert-or-ignore on SQL Server,
    /// update-from outside Postgres).
    #[error("unsupported feature on this dialect: {0}")]
    UnsupportedFeature(String),

    /// Internal invariant breach: a grammar was asked to compile a WhereIR
    /// (or HavingIR) variant it has no rule for.
    #[error("compilation error: {0}")]
    CompilationError(String),

    /// A driver error bubbled up through the Connection façade, with the
    /// compiled SQL and bindings attached for diagnosis.
    #[error("query error: {message} (sql: {sql:?}, bindings: {bindings:?})")]
    QueryError {
        message: String,
        sql: String,
        bindings: Vec<Value>,
    },

    /// The connection observed a "lost connection" condition while a
    /// transaction was open, so it could not safely auto-retry.
    #[error("lost connection: {0}")]
    LostConnection(String),

    /// Any other runtime failure: a `chunkById` row missing its alias
    /// column, or `reconnect` invoked with no reconnector configured.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl LihtneError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFeature(msg.into())
    }

    pub fn compilation(msg: impl Into<String>) -> Self {
        Self::CompilationError(msg.into())
    }

    pub fn query(message: impl Into<String>, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Self::QueryError {
            message: message.into(),
            sql: sql.into(),
            bindings,
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }
}

/// Result type for lihtne operations.
pub type Result<T> = core::result::Result<T, LihtneError>;
