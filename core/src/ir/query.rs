//! [`QueryIR`] — the dialect-independent intermediate representation of one
//! query (§3.4).

use super::bindings::BindingsBag;
use super::join_ir::JoinIR;
use super::order_ir::OrderIR;
use super::where_ir::{HavingIR, WhereIR};
use crate::value::Value;
use std::rc::Rc;

/// The table/subquery/raw source a query selects `FROM` (or a join's right
/// side, or an insert's `USING` source).
#[derive(Debug, Clone, PartialEq)]
pub enum FromSource {
    Table { name: String, alias: Option<String> },
    Sub { ir: Box<QueryIR>, alias: String },
    Raw { sql: String, bindings: Vec<Value> },
}

impl FromSource {
    pub fn table(name: impl Into<String>) -> Self {
        FromSource::Table {
            name: name.into(),
            alias: None,
        }
    }

    pub fn table_aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        FromSource::Table {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }
}

/// One projected column: a plain identifier, a raw expression, or an
/// aliased subquery (`selectSub`).
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnItem {
    Identifier(String),
    Raw { sql: String, bindings: Vec<Value> },
    Sub { ir: Box<QueryIR>, alias: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl AggregateFn {
    pub fn as_sql(self) -> &'static str {
        match self {
            AggregateFn::Count => "count",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub func: AggregateFn,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexHintKind {
    Use,
    Force,
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexHint {
    pub kind: IndexHintKind,
    pub index: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lock {
    ForUpdate,
    ForShare,
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Distinct {
    No,
    Yes,
    Columns(Vec<String>),
}

impl Distinct {
    pub fn is_active(&self) -> bool {
        !matches!(self, Distinct::No)
    }
}

/// One member of a `UNION [ALL]` composition.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionIR {
    pub query: Box<QueryIR>,
    pub all: bool,
}

/// A before-query callback. `Rc` (not `Box`) so `QueryIR::clone` is cheap
/// and deep in every field except the callback list, which is shared by
/// reference — matching the "clone preserves state, callbacks run once and
/// are cleared" lifecycle in §3.6/§3.7.
pub type BeforeQueryCallback = Rc<dyn Fn(&mut crate::builder::Builder) -> crate::error::Result<()>>;

/// The dialect-independent representation of one query. Owned by exactly
/// one [`crate::builder::Builder`] (§3.7); subqueries embed their own
/// `QueryIR` wherever a nested query is required.
#[derive(Clone)]
pub struct QueryIR {
    pub from: Option<FromSource>,
    pub columns: Vec<ColumnItem>,
    pub distinct: Distinct,
    pub joins: Vec<JoinIR>,
    pub wheres: Vec<WhereIR>,
    pub groups: Vec<String>,
    pub group_raw: Vec<(String, Vec<Value>)>,
    pub havings: Vec<HavingIR>,
    pub orders: Vec<OrderIR>,
    pub unions: Vec<UnionIR>,
    pub union_orders: Vec<OrderIR>,
    pub union_limit: Option<i64>,
    pub union_offset: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub lock: Option<Lock>,
    pub aggregate: Option<Aggregate>,
    pub index_hint: Option<IndexHint>,
    pub bindings: BindingsBag,
    pub before_query_callbacks: Vec<BeforeQueryCallback>,
}

impl Default for QueryIR {
    fn default() -> Self {
        QueryIR {
            from: None,
            columns: Vec::new(),
            distinct: Distinct::No,
            joins: Vec::new(),
            wheres: Vec::new(),
            groups: Vec::new(),
            group_raw: Vec::new(),
            havings: Vec::new(),
            orders: Vec::new(),
            unions: Vec::new(),
            union_orders: Vec::new(),
            union_limit: None,
            union_offset: None,
            limit: None,
            offset: None,
            lock: None,
            aggregate: None,
            index_hint: None,
            bindings: BindingsBag::new(),
            before_query_callbacks: Vec::new(),
        }
    }
}

impl QueryIR {
    pub fn new() -> Self {
        Self::default()
    }

    /// `limit(n)` with n <= 0 omits the clause (§3.6).
    pub fn set_limit(&mut self, n: i64) {
        self.limit = if n > 0 { Some(n) } else { None };
    }

    /// `offset(n)` with n <= 0 omits the clause (§3.6); dialects that need
    /// `offset 0` to unlock `fetch next` special-case that in their own
    /// grammar rather than here.
    pub fn set_offset(&mut self, n: i64) {
        self.offset = if n > 0 { Some(n) } else { None };
    }
}

impl core::fmt::Debug for QueryIR {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueryIR")
            .field("from", &self.from)
            .field("columns", &self.columns)
            .field("distinct", &self.distinct)
            .field("joins", &self.joins)
            .field("wheres", &self.wheres)
            .field("groups", &self.groups)
            .field("havings", &self.havings)
            .field("orders", &self.orders)
            .field("unions", &self.unions)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("lock", &self.lock)
            .field("aggregate", &self.aggregate)
            .field("index_hint", &self.index_hint)
            .field("bindings", &self.bindings)
            .field(
                "before_query_callbacks",
                &format!("<{} callbacks>", self.before_query_callbacks.len()),
            )
            .finish()
    }
}

impl PartialEq for QueryIR {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from
            && self.columns == other.columns
            && self.distinct == other.distinct
            && self.joins == other.joins
            && self.wheres == other.wheres
            && self.groups == other.groups
            && self.havings == other.havings
            && self.orders == other.orders
            && self.unions == other.unions
            && self.limit == other.limit
            && self.offset == other.offset
            && self.lock == other.lock
            && self.aggregate == other.aggregate
            && self.index_hint == other.index_hint
    }
}
