//! Tracing utilities for query observability.
//!
//! Enable the `tracing` feature to emit a debug event with the compiled SQL
//! and bound-parameter count at every executing terminal. No-ops when the
//! feature is disabled, avoiding `#[cfg]` boilerplate at every call site.

/// Emit a debug-level tracing event with the SQL text and parameter count.
///
/// ```ignore
/// lihtne_trace_query!(&sql, bindings.len());
/// ```
#[macro_export]
macro_rules! lihtne_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %$sql, params = $param_count, "lihtne.query");
    };
}
