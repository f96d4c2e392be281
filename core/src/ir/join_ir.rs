//! [`JoinIR`] — one join clause, including its own where tree and any
//! joins nested inside it (from a join closure calling `.join` again).

use super::query::FromSource;
use super::where_ir::WhereIR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
    LeftLateral,
    InnerLateral,
}

impl JoinKind {
    pub fn is_lateral(self) -> bool {
        matches!(self, JoinKind::LeftLateral | JoinKind::InnerLateral)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinIR {
    pub kind: JoinKind,
    pub table: FromSource,
    pub alias: Option<String>,
    pub on: Vec<WhereIR>,
    pub nested_joins: Vec<JoinIR>,
}

impl JoinIR {
    pub fn new(kind: JoinKind, table: FromSource) -> Self {
        JoinIR {
            kind,
            table,
            alias: None,
            on: Vec::new(),
            nested_joins: Vec::new(),
        }
    }
}
