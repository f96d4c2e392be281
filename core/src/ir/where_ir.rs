//! [`WhereIR`] — the tagged variant set for a single where/on condition.

use super::query::QueryIR;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Date,
    Day,
    Month,
    Year,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulltextMode {
    Natural,
    Boolean,
    Plain,
    Phrase,
    Websearch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FulltextOptions {
    pub mode: FulltextMode,
    pub expand: bool,
    pub language: Option<String>,
}

impl Default for FulltextOptions {
    fn default() -> Self {
        FulltextOptions {
            mode: FulltextMode::Natural,
            expand: false,
            language: Some("english".to_string()),
        }
    }
}

/// One node of the where tree. `Nested` holds a full sub-list, giving the
/// tree shape described in §3.4; every other variant is a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereIR {
    Basic {
        col: String,
        op: String,
        val: Value,
        boolean: BoolOp,
    },
    In {
        col: String,
        vals: Vec<Value>,
        not: bool,
        boolean: BoolOp,
    },
    InSub {
        col: String,
        sub: Box<QueryIR>,
        not: bool,
        boolean: BoolOp,
    },
    InRaw {
        col: String,
        ints: Vec<i64>,
        not: bool,
        boolean: BoolOp,
    },
    Null {
        col: String,
        not: bool,
        boolean: BoolOp,
    },
    Between {
        col: String,
        min: Value,
        max: Value,
        not: bool,
        boolean: BoolOp,
    },
    BetweenColumns {
        col: String,
        a: String,
        b: String,
        not: bool,
        boolean: BoolOp,
    },
    Column {
        a: String,
        op: String,
        b: String,
        boolean: BoolOp,
    },
    DateBased {
        unit: DateUnit,
        col: String,
        op: String,
        val: Value,
        boolean: BoolOp,
    },
    Exists {
        sub: Box<QueryIR>,
        not: bool,
        boolean: BoolOp,
    },
    Nested {
        children: Vec<WhereIR>,
        negated: bool,
        boolean: BoolOp,
    },
    Sub {
        col: String,
        op: String,
        sub: Box<QueryIR>,
        boolean: BoolOp,
    },
    Raw {
        sql: String,
        bindings: Vec<Value>,
        boolean: BoolOp,
    },
    Fulltext {
        cols: Vec<String>,
        value: String,
        opts: FulltextOptions,
        boolean: BoolOp,
    },
    JsonContains {
        col: String,
        val: Value,
        not: bool,
        boolean: BoolOp,
    },
    JsonContainsKey {
        col: String,
        not: bool,
        boolean: BoolOp,
    },
    JsonLength {
        col: String,
        op: String,
        val: Value,
        boolean: BoolOp,
    },
    RowValues {
        cols: Vec<String>,
        op: String,
        vals: Vec<Value>,
        boolean: BoolOp,
    },
    Expression {
        expr: crate::expression::Expression,
        boolean: BoolOp,
    },
    Bitwise {
        col: String,
        op: String,
        val: Value,
        boolean: BoolOp,
    },
}

impl WhereIR {
    pub fn boolean(&self) -> BoolOp {
        match self {
            WhereIR::Basic { boolean, .. }
            | WhereIR::In { boolean, .. }
            | WhereIR::InSub { boolean, .. }
            | WhereIR::InRaw { boolean, .. }
            | WhereIR::Null { boolean, .. }
            | WhereIR::Between { boolean, .. }
            | WhereIR::BetweenColumns { boolean, .. }
            | WhereIR::Column { boolean, .. }
            | WhereIR::DateBased { boolean, .. }
            | WhereIR::Exists { boolean, .. }
            | WhereIR::Nested { boolean, .. }
            | WhereIR::Sub { boolean, .. }
            | WhereIR::Raw { boolean, .. }
            | WhereIR::Fulltext { boolean, .. }
            | WhereIR::JsonContains { boolean, .. }
            | WhereIR::JsonContainsKey { boolean, .. }
            | WhereIR::JsonLength { boolean, .. }
            | WhereIR::RowValues { boolean, .. }
            | WhereIR::Expression { boolean, .. }
            | WhereIR::Bitwise { boolean, .. } => *boolean,
        }
    }

    pub fn set_boolean(&mut self, new: BoolOp) {
        let slot = match self {
            WhereIR::Basic { boolean, .. }
            | WhereIR::In { boolean, .. }
            | WhereIR::InSub { boolean, .. }
            | WhereIR::InRaw { boolean, .. }
            | WhereIR::Null { boolean, .. }
            | WhereIR::Between { boolean, .. }
            | WhereIR::BetweenColumns { boolean, .. }
            | WhereIR::Column { boolean, .. }
            | WhereIR::DateBased { boolean, .. }
            | WhereIR::Exists { boolean, .. }
            | WhereIR::Nested { boolean, .. }
            | WhereIR::Sub { boolean, .. }
            | WhereIR::Raw { boolean, .. }
            | WhereIR::Fulltext { boolean, .. }
            | WhereIR::JsonContains { boolean, .. }
            | WhereIR::JsonContainsKey { boolean, .. }
            | WhereIR::JsonLength { boolean, .. }
            | WhereIR::RowValues { boolean, .. }
            | WhereIR::Expression { boolean, .. }
            | WhereIR::Bitwise { boolean, .. } => boolean,
        };
        *slot = new;
    }
}

/// Same shape, restricted to the variants valid after `having` (§3.4):
/// Basic, Between, Null, NotNull, Nested, Raw, Expression, Bitwise ("Bit").
pub type HavingIR = WhereIR;
