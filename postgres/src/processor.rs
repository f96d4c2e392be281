//! [`PostgresProcessor`] — appends a default `"id"` sequence name when the
//! caller didn't request a specific one (§4.3 "processInsertGetId").

use lihtne_core::connection::{Connection, Row};
use lihtne_core::error::Result;
use lihtne_core::processor::Processor;
use lihtne_core::value::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresProcessor;

impl Processor for PostgresProcessor {
    fn process_select(&self, rows: Vec<Row>) -> Vec<Row> {
        rows
    }

    fn process_insert_get_id(
        &self,
        connection: &dyn Connection,
        sql: &str,
        bindings: &[Value],
        sequence: Option<&str>,
    ) -> Result<i64> {
        let sequence = sequence.or(Some("id"));
        connection.insert_get_id(sql, bindings, sequence)
    }
}
