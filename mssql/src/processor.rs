//! [`MsSqlProcessor`] — the ANSI default suffices; `SCOPE_IDENTITY()`
//! retrieval is the connection's concern, not the processor's (§4.3).

use lihtne_core::connection::Row;
use lihtne_core::processor::Processor;

#[derive(Debug, Clone, Copy, Default)]
pub struct MsSqlProcessor;

impl Processor for MsSqlProcessor {
    fn process_select(&self, rows: Vec<Row>) -> Vec<Row> {
        rows
    }
}
