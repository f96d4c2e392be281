//! [`MySqlProcessor`] — coerces MySQL's `information_schema` nullability
//! strings into booleans on column-listing result rows (§4.3).

use lihtne_core::connection::Row;
use lihtne_core::processor::Processor;
use lihtne_core::value::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlProcessor;

impl Processor for MySqlProcessor {
    fn process_select(&self, rows: Vec<Row>) -> Vec<Row> {
        rows.into_iter()
            .map(|mut row| {
                if let Some(val) = row.get_mut("Null") {
                    coerce_nullable(val);
                }
                if let Some(val) = row.get_mut("is_nullable") {
                    coerce_nullable(val);
                }
                row
            })
            .collect()
    }
}

fn coerce_nullable(val: &mut Value) {
    if let Value::Str(s) = val {
        match s.as_str() {
            "YES" => *val = Value::Bool(true),
            "NO" => *val = Value::Bool(false),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn coerces_yes_no() {
        let mut row = BTreeMap::new();
        row.insert("Null".to_string(), Value::Str("YES".to_string()));
        let rows = MySqlProcessor.process_select(vec![row]);
        assert_eq!(rows[0].get("Null"), Some(&Value::Bool(true)));
    }
}
