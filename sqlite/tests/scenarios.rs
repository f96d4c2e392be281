//! §8 scenario S5 — SQLite JSON-path update mix, exercised through the
//! full `Builder::update` path rather than `compile_assignments` alone.

use lihtne_core::builder::Builder;
use lihtne_core::connection::{Connection, Row};
use lihtne_core::error::Result;
use lihtne_core::grammar::GrammarConfig;
use lihtne_core::value::Value;
use lihtne_sqlite::SqliteGrammar;
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::rc::Rc;

struct CapturingConnection {
    last_sql: RefCell<String>,
    last_bindings: RefCell<Vec<Value>>,
}

impl Connection for CapturingConnection {
    fn select(&self, _sql: &str, _bindings: &[Value]) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }

    fn insert(&self, _sql: &str, _bindings: &[Value]) -> Result<bool> {
        Ok(true)
    }

    fn update(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        *self.last_sql.borrow_mut() = sql.to_string();
        *self.last_bindings.borrow_mut() = bindings.to_vec();
        Ok(1)
    }

    fn delete(&self, _sql: &str, _bindings: &[Value]) -> Result<u64> {
        Ok(0)
    }

    fn affecting_statement(&self, _sql: &str, _bindings: &[Value]) -> Result<u64> {
        Ok(0)
    }

    fn statement(&self, _sql: &str, _bindings: &[Value]) -> Result<bool> {
        Ok(true)
    }

    fn escape(&self, _value: &Value, _binary: bool) -> Result<String> {
        Ok(String::new())
    }

    fn get_config(&self, _key: &str) -> Option<String> {
        None
    }

    fn insert_get_id(&self, _sql: &str, _bindings: &[Value], _sequence: Option<&str>) -> Result<i64> {
        unreachable!("not exercised by this scenario")
    }
}

#[test]
fn s5_sqlite_json_path_update_mix() {
    let grammar = Rc::new(SqliteGrammar::new(GrammarConfig::default()));
    let connection = Rc::new(CapturingConnection {
        last_sql: RefCell::new(String::new()),
        last_bindings: RefCell::new(Vec::new()),
    });

    let values = vec![
        ("options->name".to_string(), Value::Str("X".to_string())),
        ("group_id".to_string(), Value::Raw("45".to_string())),
        ("options->security".to_string(), Value::Str(r#"{"level":1}"#.to_string())),
        ("options->sharing->twitter".to_string(), Value::Str("u".to_string())),
        ("created_at".to_string(), Value::DateTime("2026-01-01 00:00:00".to_string())),
    ];

    let affected = Builder::with_connection(grammar, Rc::clone(&connection) as Rc<dyn Connection>)
        .from("users")
        .where_eq("id", 1)
        .update(values)
        .unwrap();

    assert_eq!(affected, 1);
    assert_eq!(
        *connection.last_sql.borrow(),
        "update \"users\" set \"options\" = json_patch(ifnull(\"options\", json('{}')), json(?)), \"group_id\" = 45, \"created_at\" = ? where \"id\" = ?"
    );

    let bindings = connection.last_bindings.borrow();
    assert_eq!(bindings.len(), 3);
    let merged: JsonValue = match &bindings[0] {
        Value::Str(s) => serde_json::from_str(s).unwrap(),
        other => panic!("expected merged JSON string, got {other:?}"),
    };
    assert_eq!(
        merged,
        serde_json::json!({"name": "X", "security": {"level": 1}, "sharing": {"twitter": "u"}})
    );
    assert_eq!(bindings[1], Value::DateTime("2026-01-01 00:00:00".to_string()));
    assert_eq!(bindings[2], Value::Int(1));
}
