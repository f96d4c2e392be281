//! [`SqliteProcessor`] — the ANSI default suffices; SQLite's driver already
//! reports typed columns and `last_insert_rowid()` without coercion (§4.3).

use lihtne_core::connection::Row;
use lihtne_core::processor::Processor;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteProcessor;

impl Processor for SqliteProcessor {
    fn process_select(&self, rows: Vec<Row>) -> Vec<Row> {
        rows
    }
}
