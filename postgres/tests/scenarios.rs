//! §8 scenario S4 — PostgreSQL upsert.

use lihtne_core::builder::Builder;
use lihtne_core::connection::{Connection, Row};
use lihtne_core::error::Result;
use lihtne_core::grammar::GrammarConfig;
use lihtne_core::value::Value;
use lihtne_postgres::PostgresGrammar;
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

    fn update(&self, _sql: &str, _bindings: &[Value]) -> Result<u64> {
        Ok(0)
    }

    fn delete(&self, _sql: &str, _bindings: &[Value]) -> Result<u64> {
        Ok(0)
    }

    fn affecting_statement(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
        *self.last_sql.borrow_mut() = sql.to_string();
        *self.last_bindings.borrow_mut() = bindings.to_vec();
        Ok(2)
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
fn s4_postgres_upsert() {
    let grammar = Rc::new(PostgresGrammar::new(GrammarConfig::default()));
    let connection = Rc::new(CapturingConnection {
        last_sql: RefCell::new(String::new()),
        last_bindings: RefCell::new(Vec::new()),
    });

    let rows = vec![
        vec![("email".to_string(), Value::from("foo")), ("name".to_string(), Value::from("bar"))],
        vec![("email".to_string(), Value::from("foo2")), ("name".to_string(), Value::from("bar2"))],
    ];

    let affected = Builder::with_connection(grammar, Rc::clone(&connection) as Rc<dyn Connection>)
        .from("users")
        .upsert(rows, vec!["email".to_string()], vec!["email".to_string(), "name".to_string()])
        .unwrap();

    assert_eq!(affected, 2);
    assert_eq!(
        *connection.last_sql.borrow(),
        r#"insert into "users" ("email", "name") values (?, ?), (?, ?) on conflict ("email") do update set "email" = "excluded"."email", "name" = "excluded"."name""#
    );
    assert_eq!(
        *connection.last_bindings.borrow(),
        vec![
            Value::from("foo"),
            Value::from("bar"),
            Value::from("foo2"),
            Value::from("bar2"),
        ]
    );
}
