//! [`Expression`] — an opaque raw SQL fragment plus its explicit bindings.
//!
//! Grammars pass the fragment through unquoted. This is the builder-facing
//! type behind `selectRaw`/`whereRaw`/`groupByRaw`/`havingRaw`/`orderByRaw`;
//! once attached to a `QueryIR` its bindings are added to the bag verbatim
//! (per §4.2 "Parameter binding": an explicit bindings array supplied
//! alongside a raw clause is appended verbatim).
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub sql: String,
    pub bindings: Vec<Value>,
}

impl Expression {
    pub fn new(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Expression {
            sql: sql.into(),
            bindings,
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expression {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }
}

impl From<&str> for Expression {
    fn from(sql: &str) -> Self {
        Expression::raw(sql)
    }
}

impl From<String> for Expression {
    fn from(sql: String) -> Self {
        Expression::raw(sql)
    }
}
