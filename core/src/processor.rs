//! [`Processor`] — post-processes driver results (§4.3). The ANSI default is
//! a no-op pass-through; dialect crates override where the driver's raw
//! shape needs coercion (MySQL's `"YES"/"NO"` nullability strings, Postgres
//! column-listing metadata, ...).

use crate::connection::{Connection, Row};
use crate::error::Result;
use crate::value::Value;

pub trait Processor {
    fn process_select(&self, rows: Vec<Row>) -> Vec<Row> {
        rows
    }

    /// Executes the insert and returns the generated id. The ANSI default
    /// defers entirely to the connection's own last-insert-id tracking;
    /// PG overrides to append `returning "<sequence>"` at the grammar layer
    /// and simply reads the row back here.
    fn process_insert_get_id(
        &self,
        connection: &dyn Connection,
        sql: &str,
        bindings: &[Value],
        sequence: Option<&str>,
    ) -> Result<i64> {
        connection.insert_get_id(sql, bindings, sequence)
    }
}

/// The stateless ANSI processor; every dialect that needs no row coercion
/// uses this directly (§5 "Processors are likewise stateless").
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiProcessor;

impl Processor for AnsiProcessor {}
