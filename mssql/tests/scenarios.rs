//! §8 scenario S3 — empty insert on SQL Server.

use lihtne_core::builder::Builder;
use lihtne_core::connection::{Connection, Row};
use lihtne_core::error::Result;
use lihtne_core::grammar::GrammarConfig;
use lihtne_core::value::Value;
use lihtne_mssql::MsSqlGrammar;
use std::cell::RefCell;
use std::rc::Rc;

struct CapturingConnection {
    last_sql: RefCell<String>,
}

impl Connection for CapturingConnection {
    fn select(&self, _sql: &str, _bindings: &[Value]) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }

    fn insert(&self, _sql: &str, _bindings: &[Value]) -> Result<bool> {
        Ok(true)
    }

    fn update(&self, _sql: &str, _bindings: &[Value]) -> Result<u64> {
        Ok(0)
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

    fn insert_get_id(&self, sql: &str, _bindings: &[Value], _sequence: Option<&str>) -> Result<i64> {
        *self.last_sql.borrow_mut() = sql.to_string();
        Ok(1)
    }
}

#[test]
fn s3_empty_insert_on_sql_server() {
    let grammar = Rc::new(MsSqlGrammar::new(GrammarConfig::default()));
    let connection = Rc::new(CapturingConnection {
        last_sql: RefCell::new(String::new()),
    });

    let id = Builder::with_connection(grammar, Rc::clone(&connection) as Rc<dyn Connection>)
        .from("users")
        .insert_get_id(Vec::new(), None)
        .unwrap();

    assert_eq!(id, 1);
    assert_eq!(*connection.last_sql.borrow(), "insert into [users] default values");
}
