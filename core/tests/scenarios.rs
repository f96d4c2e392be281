//! End-to-end scenarios against the ANSI grammar (§8).

use lihtne_core::builder::Builder;
use lihtne_core::connection::{Connection, Row};
use lihtne_core::error::Result;
use lihtne_core::grammar::{Grammar, GrammarConfig};
use lihtne_core::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

struct AnsiGrammar {
    config: GrammarConfig,
}

impl Grammar for AnsiGrammar {
    fn config(&self) -> &GrammarConfig {
        &self.config
    }
}

fn grammar() -> Rc<AnsiGrammar> {
    Rc::new(AnsiGrammar {
        config: GrammarConfig::default(),
    })
}

fn builder() -> Builder {
    Builder::new(grammar())
}

#[test]
fn s1_basic_union_with_order() {
    let b = builder()
        .from("users")
        .where_eq("id", 1)
        .union(|sub| sub.from("users").where_eq("id", 2))
        .order_by_desc("id");

    let sql = b.clone().to_sql().unwrap();
    assert_eq!(
        sql,
        r#"(select * from "users" where "id" = ?) union (select * from "users" where "id" = ?) order by "id" desc"#
    );
    assert_eq!(b.get_bindings(), vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn s2_mysql_nested_wheres_with_between_and_or_having_raw() {
    let sql = builder()
        .from("users")
        .having_raw("\"last_login_date\" between ? and ?", vec!["2018-11-16".into(), "2018-12-16".into()])
        .or_having_raw("user_foo < user_bar", vec![])
        .to_sql()
        .unwrap();

    assert_eq!(
        sql,
        r#"select * from "users" having "last_login_date" between ? and ? or user_foo < user_bar"#
    );
}

/// A `Connection` backed by a fixed page queue, used to verify S6's
/// stop-on-false-callback behaviour without a real driver.
struct QueuedConnection {
    pages: RefCell<Vec<Vec<Row>>>,
    calls: RefCell<u32>,
}

impl QueuedConnection {
    fn new(pages: Vec<Vec<Row>>) -> Self {
        QueuedConnection {
            pages: RefCell::new(pages),
            calls: RefCell::new(0),
        }
    }
}

impl Connection for QueuedConnection {
    fn select(&self, _sql: &str, _bindings: &[Value]) -> Result<Vec<Row>> {
        *self.calls.borrow_mut() += 1;
        let mut pages = self.pages.borrow_mut();
        if pages.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(pages.remove(0))
        }
    }

    fn insert(&self, _sql: &str, _bindings: &[Value]) -> Result<bool> {
        unreachable!("not exercised by this scenario")
    }

    fn update(&self, _sql: &str, _bindings: &[Value]) -> Result<u64> {
        unreachable!("not exercised by this scenario")
    }

    fn delete(&self, _sql: &str, _bindings: &[Value]) -> Result<u64> {
        unreachable!("not exercised by this scenario")
    }

    fn affecting_statement(&self, _sql: &str, _bindings: &[Value]) -> Result<u64> {
        unreachable!("not exercised by this scenario")
    }

    fn statement(&self, _sql: &str, _bindings: &[Value]) -> Result<bool> {
        unreachable!("not exercised by this scenario")
    }

    fn escape(&self, _value: &Value, _binary: bool) -> Result<String> {
        unreachable!("not exercised by this scenario")
    }

    fn get_config(&self, _key: &str) -> Option<String> {
        None
    }

    fn insert_get_id(&self, _sql: &str, _bindings: &[Value], _sequence: Option<&str>) -> Result<i64> {
        unreachable!("not exercised by this scenario")
    }
}

fn row(id: i64) -> Row {
    let mut r = BTreeMap::new();
    r.insert("id".to_string(), Value::Int(id));
    r
}

#[test]
fn s6_chunk_stop_on_false_makes_no_second_call() {
    let connection = Rc::new(QueuedConnection::new(vec![vec![row(1), row(2)], vec![row(3), row(4)], vec![]]));
    let b = Builder::with_connection(grammar(), Rc::clone(&connection) as Rc<dyn Connection>)
        .from("users")
        .order_by("foobar", lihtne_core::ir::Direction::Asc);

    let mut seen_pages = 0;
    let completed = b
        .chunk(2, |rows, _page| {
            seen_pages += 1;
            assert_eq!(rows.len(), 2);
            Ok(false)
        })
        .unwrap();

    assert_eq!(completed, false);
    assert_eq!(seen_pages, 1);
    assert_eq!(*connection.calls.borrow(), 1);
}
