//! [`Connection`] — the narrow façade the core consumes (§4.4). The actual
//! driver, prepared statements, reconnection policy and row decoding live
//! outside this crate; dialect crates or downstream callers provide an
//! implementation.

use crate::error::{LihtneError, Result};
use crate::value::Value;
use std::collections::BTreeMap;

/// One result row: a dialect-agnostic column-name → value map. Real drivers
/// will wrap their own row type; this is the shape the core's processors and
/// pagination helpers operate on.
pub type Row = BTreeMap<String, Value>;

/// The operations a [`crate::builder::Builder`] performs against a live
/// database (§4.4). Implementors own reconnection, transaction depth
/// tracking and lost-connection retry (§7 `LostConnection`); the core only
/// ever sees a `QueryError` or a successful result.
pub trait Connection {
    fn select(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>>;
    fn insert(&self, sql: &str, bindings: &[Value]) -> Result<bool>;
    fn update(&self, sql: &str, bindings: &[Value]) -> Result<u64>;
    fn delete(&self, sql: &str, bindings: &[Value]) -> Result<u64>;
    fn affecting_statement(&self, sql: &str, bindings: &[Value]) -> Result<u64>;
    fn statement(&self, sql: &str, bindings: &[Value]) -> Result<bool>;

    /// Renders `value` as a SQL literal for `toRawSql`. `binary` requests
    /// the dialect's binary-string literal form instead of text.
    fn escape(&self, value: &Value, binary: bool) -> Result<String>;

    fn get_config(&self, key: &str) -> Option<String>;

    /// Executes an insert and returns the generated id, used by
    /// `insertGetId`/`Processor::process_insert_get_id`. `sequence` names the
    /// PG column/sequence to read back via `returning` when relevant.
    fn insert_get_id(&self, sql: &str, bindings: &[Value], sequence: Option<&str>) -> Result<i64>;

    fn transaction_level(&self) -> u32 {
        0
    }
}

/// Wraps a driver failure as a [`LihtneError::QueryError`] carrying the
/// compiled SQL and bindings for diagnosis (§7).
pub fn wrap_query_error(message: impl Into<String>, sql: &str, bindings: &[Value]) -> LihtneError {
    LihtneError::query(message, sql.to_string(), bindings.to_vec())
}
