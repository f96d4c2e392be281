//! [`Builder`] — the fluent API that mutates a [`QueryIR`] (§4.1).
//!
//! A `Builder` owns exactly one [`QueryIR`] (§3.7). Every clause method takes
//! `self` by value and returns `Self` so calls chain; `clone()` is deep over
//! the IR (the callback list is `Rc`-shared, matching the "clone preserves
//! state" lifecycle). Terminal methods that touch the network go through the
//! [`Connection`] façade; compile-only terminals (`to_sql`, `get_bindings`)
//! need nothing but the grammar.

use crate::connection::{Connection, Row};
use crate::cursor::Cursor;
use crate::error::{LihtneError, Result};
use crate::grammar::{Grammar, InsertRow};
use crate::ir::*;
use crate::paginator::{CursorPaginator, LengthAwarePaginator};
use crate::value::Value;
use std::collections::BTreeMap;
use std::rc::Rc;

/// The passthrough method names a Proxy/`__call` forward used to hand off to
/// the underlying query builder in the source implementation (§9
/// `forwardUnknown`). In a statically-typed core every one of these is
/// already a first-class method below; this constant exists only so a
/// caller enumerating "what does this forward" has something to check
/// against.
pub const FORWARDED_METHODS: &[&str] = &[
    "aggregate",
    "average",
    "avg",
    "count",
    "doesntExist",
    "exists",
    "getBindings",
    "insert",
    "insertGetId",
    "insertOrIgnore",
    "insertUsing",
    "max",
    "min",
    "raw",
    "sum",
    "toSql",
];

/// A fluent, dialect-independent query builder.
pub struct Builder {
    grammar: Rc<dyn Grammar>,
    connection: Option<Rc<dyn Connection>>,
    ir: QueryIR,
}

impl Clone for Builder {
    fn clone(&self) -> Self {
        Builder {
            grammar: Rc::clone(&self.grammar),
            connection: self.connection.as_ref().map(Rc::clone),
            ir: self.ir.clone(),
        }
    }
}

impl Builder {
    pub fn new(grammar: Rc<dyn Grammar>) -> Self {
        Builder {
            grammar,
            connection: None,
            ir: QueryIR::new(),
        }
    }

    pub fn with_connection(grammar: Rc<dyn Grammar>, connection: Rc<dyn Connection>) -> Self {
        Builder {
            grammar,
            connection: Some(connection),
            ir: QueryIR::new(),
        }
    }

    pub fn grammar(&self) -> &dyn Grammar {
        self.grammar.as_ref()
    }

    pub fn ir(&self) -> &QueryIR {
        &self.ir
    }

    pub fn into_ir(self) -> QueryIR {
        self.ir
    }

    /// A fresh builder sharing this one's grammar/connection, used to
    /// construct subqueries and join closures (§3.7).
    fn sub_builder(&self) -> Builder {
        Builder {
            grammar: Rc::clone(&self.grammar),
            connection: self.connection.as_ref().map(Rc::clone),
            ir: QueryIR::new(),
        }
    }

    fn connection(&self) -> Result<&dyn Connection> {
        self.connection
            .as_deref()
            .ok_or_else(|| LihtneError::runtime("builder has no connection attached"))
    }

    // ==================== from ====================

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.ir.from = Some(FromSource::table(table));
        self
    }

    pub fn from_as(mut self, table: impl Into<String>, alias: impl Into<String>) -> Self {
        self.ir.from = Some(FromSource::table_aliased(table, alias));
        self
    }

    pub fn from_sub(mut self, alias: impl Into<String>, build: impl FnOnce(Builder) -> Builder) -> Self {
        let sub = build(self.sub_builder());
        self.ir.from = Some(FromSource::Sub {
            ir: Box::new(sub.ir),
            alias: alias.into(),
        });
        self
    }

    pub fn from_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.ir.bindings.add_binding(bindings.clone(), Section::From);
        self.ir.from = Some(FromSource::Raw {
            sql: sql.into(),
            bindings,
        });
        self
    }

    // ==================== select ====================

    pub fn select(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ir.columns = cols.into_iter().map(|c| ColumnItem::Identifier(c.into())).collect();
        self
    }

    pub fn add_select(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ir
            .columns
            .extend(cols.into_iter().map(|c| ColumnItem::Identifier(c.into())));
        self
    }

    pub fn select_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.ir.bindings.add_binding(bindings.clone(), Section::Select);
        self.ir.columns.push(ColumnItem::Raw {
            sql: sql.into(),
            bindings,
        });
        self
    }

    pub fn select_sub(mut self, alias: impl Into<String>, build: impl FnOnce(Builder) -> Builder) -> Self {
        let sub = build(self.sub_builder());
        self.ir.bindings.merge_bindings(&sub.ir.bindings);
        self.ir.columns.push(ColumnItem::Sub {
            ir: Box::new(sub.ir),
            alias: alias.into(),
        });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.ir.distinct = Distinct::Yes;
        self
    }

    pub fn distinct_on(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ir.distinct = Distinct::Columns(cols.into_iter().map(Into::into).collect());
        self
    }

    // ==================== joins ====================

    fn push_join(&mut self, kind: JoinKind, table: FromSource, build_on: impl FnOnce(JoinBuilder) -> JoinBuilder) {
        let jb = build_on(JoinBuilder::new());
        self.ir.joins.push(JoinIR {
            kind,
            table,
            alias: None,
            on: jb.wheres,
            nested_joins: jb.nested_joins,
        });
    }

    pub fn join(self, table: impl Into<String>, a: impl Into<String>, op: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, op, b) = (a.into(), op.into(), b.into());
        self.join_where(table, move |j| j.on(a, op, b), JoinKind::Inner)
    }

    pub fn left_join(self, table: impl Into<String>, a: impl Into<String>, op: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, op, b) = (a.into(), op.into(), b.into());
        self.join_where(table, move |j| j.on(a, op, b), JoinKind::Left)
    }

    pub fn right_join(self, table: impl Into<String>, a: impl Into<String>, op: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, op, b) = (a.into(), op.into(), b.into());
        self.join_where(table, move |j| j.on(a, op, b), JoinKind::Right)
    }

    pub fn cross_join(self, table: impl Into<String>) -> Self {
        self.join_where(table, |j| j, JoinKind::Cross)
    }

    pub fn join_where(
        mut self,
        table: impl Into<String>,
        build_on: impl FnOnce(JoinBuilder) -> JoinBuilder,
        kind: JoinKind,
    ) -> Self {
        self.push_join(kind, FromSource::table(table), build_on);
        self
    }

    pub fn join_sub(
        mut self,
        alias: impl Into<String>,
        build: impl FnOnce(Builder) -> Builder,
        build_on: impl FnOnce(JoinBuilder) -> JoinBuilder,
        kind: JoinKind,
    ) -> Self {
        let sub = build(self.sub_builder());
        self.ir.bindings.merge_bindings(&sub.ir.bindings);
        let table = FromSource::Sub {
            ir: Box::new(sub.ir),
            alias: alias.into(),
        };
        self.push_join(kind, table, build_on);
        self
    }

    pub fn join_lateral(
        mut self,
        alias: impl Into<String>,
        build: impl FnOnce(Builder) -> Builder,
        kind: JoinKind,
    ) -> Self {
        if !self.grammar.supports_lateral_joins() {
            self.ir.joins.push(JoinIR::new(kind, FromSource::table("")));
            self.ir.joins.pop();
            return self;
        }
        let lateral_kind = match kind {
            JoinKind::Left => JoinKind::LeftLateral,
            _ => JoinKind::InnerLateral,
        };
        let sub = build(self.sub_builder());
        self.ir.bindings.merge_bindings(&sub.ir.bindings);
        let table = FromSource::Sub {
            ir: Box::new(sub.ir),
            alias: alias.into(),
        };
        self.ir.joins.push(JoinIR::new(lateral_kind, table));
        self
    }

    pub fn left_join_lateral(self, alias: impl Into<String>, build: impl FnOnce(Builder) -> Builder) -> Self {
        self.join_lateral(alias, build, JoinKind::Left)
    }

    // ==================== where ====================

    /// Normalises a two- or three-argument where call (§4.1 "Argument
    /// normalisation"): with an explicit operator, an unrecognised operator
    /// paired with a null value is rejected; paired with a non-null value it
    /// is coerced to `=`.
    fn prepare_value_and_operator(op: &str, val: Value, recognised: bool) -> Result<(String, Value)> {
        if !recognised && val.is_null() {
            return Err(LihtneError::invalid_argument(format!(
                "illegal operator and value combination: {op} with null"
            )));
        }
        if !recognised {
            Ok(("=".to_string(), val))
        } else {
            Ok((op.to_string(), val))
        }
    }

    fn is_recognised_operator(op: &str) -> bool {
        matches!(
            op,
            "=" | "<" | ">" | "<=" | ">=" | "<>" | "!=" | "like" | "not like" | "ilike" | "<=>"
        )
    }

    fn push_where(&mut self, w: WhereIR) {
        self.bind_where(&w, Section::Where);
        self.ir.wheres.push(w);
    }

    fn bind_where(&mut self, w: &WhereIR, section: Section) {
        match w {
            WhereIR::Basic { val, .. } | WhereIR::DateBased { val, .. } | WhereIR::JsonLength { val, .. } | WhereIR::Bitwise { val, .. } => {
                if !val.is_raw() {
                    self.ir.bindings.add_one(val.clone(), section);
                }
            }
            WhereIR::In { vals, .. } | WhereIR::RowValues { vals, .. } => {
                self.ir.bindings.add_binding(vals.iter().filter(|v| !v.is_raw()).cloned(), section);
            }
            WhereIR::Between { min, max, .. } => {
                self.ir.bindings.add_one(min.clone(), section);
                self.ir.bindings.add_one(max.clone(), section);
            }
            WhereIR::InSub { sub, .. } | WhereIR::Exists { sub, .. } | WhereIR::Sub { sub, .. } => {
                self.ir.bindings.add_binding(sub.bindings.flatten(), section);
            }
            WhereIR::Raw { bindings, .. } => {
                self.ir.bindings.add_binding(bindings.iter().cloned(), section);
            }
            WhereIR::JsonContains { val, .. } => {
                self.ir.bindings.add_one(val.clone(), section);
            }
            WhereIR::Expression { expr, .. } => {
                self.ir.bindings.add_binding(expr.bindings.iter().cloned(), section);
            }
            WhereIR::Nested { children, .. } => {
                for c in children {
                    self.bind_where(c, section);
                }
            }
            WhereIR::InRaw { .. }
            | WhereIR::Null { .. }
            | WhereIR::BetweenColumns { .. }
            | WhereIR::Column { .. }
            | WhereIR::Fulltext { .. }
            | WhereIR::JsonContainsKey { .. } => {}
        }
    }

    pub fn where_eq(self, col: impl Into<String>, val: impl Into<Value>) -> Self {
        self.where_op(col, "=", val, BoolOp::And)
    }

    pub fn or_where_eq(self, col: impl Into<String>, val: impl Into<Value>) -> Self {
        self.where_op(col, "=", val, BoolOp::Or)
    }

    pub fn where_op(self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>, boolean: BoolOp) -> Self {
        self.try_where_op(col, op, val, boolean).expect("invalid where() arguments")
    }

    /// Fallible form of [`Builder::where_op`]; prefer this when `op` is not
    /// statically known to be one of the recognised comparison operators.
    pub fn try_where_op(
        mut self,
        col: impl Into<String>,
        op: impl Into<String>,
        val: impl Into<Value>,
        boolean: BoolOp,
    ) -> Result<Self> {
        let op = op.into();
        let val = val.into();
        let (op, val) = Self::prepare_value_and_operator(&op, val, Self::is_recognised_operator(&op))?;
        if val.is_null() && (op == "=" || op == "<=>") {
            self.push_where(WhereIR::Null {
                col: col.into(),
                not: false,
                boolean,
            });
            return Ok(self);
        }
        if val.is_null() && (op == "!=" || op == "<>") {
            self.push_where(WhereIR::Null {
                col: col.into(),
                not: true,
                boolean,
            });
            return Ok(self);
        }
        self.push_where(WhereIR::Basic {
            col: col.into(),
            op,
            val,
            boolean,
        });
        Ok(self)
    }

    pub fn or_where(self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        self.where_op(col, op, val, BoolOp::Or)
    }

    pub fn where_group(mut self, build: impl FnOnce(Builder) -> Builder) -> Self {
        let nested = build(self.sub_builder());
        self.ir.bindings.merge_bindings(&nested.ir.bindings);
        self.ir.wheres.push(WhereIR::Nested {
            children: nested.ir.wheres,
            negated: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn or_where_group(mut self, build: impl FnOnce(Builder) -> Builder) -> Self {
        let nested = build(self.sub_builder());
        self.ir.bindings.merge_bindings(&nested.ir.bindings);
        self.ir.wheres.push(WhereIR::Nested {
            children: nested.ir.wheres,
            negated: false,
            boolean: BoolOp::Or,
        });
        self
    }

    pub fn where_not(self, build: impl FnOnce(Builder) -> Builder) -> Self {
        self.where_not_boolean(build, BoolOp::And)
    }

    pub fn or_where_not(self, build: impl FnOnce(Builder) -> Builder) -> Self {
        self.where_not_boolean(build, BoolOp::Or)
    }

    fn where_not_boolean(mut self, build: impl FnOnce(Builder) -> Builder, boolean: BoolOp) -> Self {
        let nested = build(self.sub_builder());
        self.ir.bindings.merge_bindings(&nested.ir.bindings);
        self.ir.wheres.push(WhereIR::Nested {
            children: nested.ir.wheres,
            negated: true,
            boolean,
        });
        self
    }

    pub fn where_in(mut self, col: impl Into<String>, vals: Vec<Value>) -> Result<Self> {
        Self::validate_in_values(&vals)?;
        self.push_where(WhereIR::In {
            col: col.into(),
            vals,
            not: false,
            boolean: BoolOp::And,
        });
        Ok(self)
    }

    pub fn where_not_in(mut self, col: impl Into<String>, vals: Vec<Value>) -> Result<Self> {
        Self::validate_in_values(&vals)?;
        self.push_where(WhereIR::In {
            col: col.into(),
            vals,
            not: true,
            boolean: BoolOp::And,
        });
        Ok(self)
    }

    pub fn or_where_in(mut self, col: impl Into<String>, vals: Vec<Value>) -> Result<Self> {
        Self::validate_in_values(&vals)?;
        self.push_where(WhereIR::In {
            col: col.into(),
            vals,
            not: false,
            boolean: BoolOp::Or,
        });
        Ok(self)
    }

    fn validate_in_values(vals: &[Value]) -> Result<()> {
        for v in vals {
            if matches!(v, Value::Sub(_)) {
                return Err(LihtneError::invalid_argument("whereIn values must be scalar, not nested queries"));
            }
        }
        Ok(())
    }

    pub fn where_in_sub(mut self, col: impl Into<String>, build: impl FnOnce(Builder) -> Builder) -> Self {
        let sub = build(self.sub_builder());
        self.push_where(WhereIR::InSub {
            col: col.into(),
            sub: Box::new(sub.ir),
            not: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_integer_in_raw(mut self, col: impl Into<String>, ints: Vec<i64>) -> Self {
        self.push_where(WhereIR::InRaw {
            col: col.into(),
            ints,
            not: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_integer_not_in_raw(mut self, col: impl Into<String>, ints: Vec<i64>) -> Self {
        self.push_where(WhereIR::InRaw {
            col: col.into(),
            ints,
            not: true,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_null(mut self, col: impl Into<String>) -> Self {
        self.push_where(WhereIR::Null {
            col: col.into(),
            not: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_not_null(mut self, col: impl Into<String>) -> Self {
        self.push_where(WhereIR::Null {
            col: col.into(),
            not: true,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_between(mut self, col: impl Into<String>, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.push_where(WhereIR::Between {
            col: col.into(),
            min: min.into(),
            max: max.into(),
            not: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_not_between(mut self, col: impl Into<String>, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.push_where(WhereIR::Between {
            col: col.into(),
            min: min.into(),
            max: max.into(),
            not: true,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_between_columns(mut self, col: impl Into<String>, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.push_where(WhereIR::BetweenColumns {
            col: col.into(),
            a: a.into(),
            b: b.into(),
            not: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_column(mut self, a: impl Into<String>, op: impl Into<String>, b: impl Into<String>) -> Self {
        self.push_where(WhereIR::Column {
            a: a.into(),
            op: op.into(),
            b: b.into(),
            boolean: BoolOp::And,
        });
        self
    }

    fn where_date_based(mut self, unit: DateUnit, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        self.push_where(WhereIR::DateBased {
            unit,
            col: col.into(),
            op: op.into(),
            val: val.into(),
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_date(self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        self.where_date_based(DateUnit::Date, col, op, val)
    }

    pub fn where_day(self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        self.where_date_based(DateUnit::Day, col, op, val)
    }

    pub fn where_month(self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        self.where_date_based(DateUnit::Month, col, op, val)
    }

    pub fn where_year(self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        self.where_date_based(DateUnit::Year, col, op, val)
    }

    pub fn where_time(self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        self.where_date_based(DateUnit::Time, col, op, val)
    }

    pub fn where_exists(mut self, build: impl FnOnce(Builder) -> Builder) -> Self {
        let sub = build(self.sub_builder());
        self.push_where(WhereIR::Exists {
            sub: Box::new(sub.ir),
            not: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_not_exists(mut self, build: impl FnOnce(Builder) -> Builder) -> Self {
        let sub = build(self.sub_builder());
        self.push_where(WhereIR::Exists {
            sub: Box::new(sub.ir),
            not: true,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_sub(mut self, col: impl Into<String>, op: impl Into<String>, build: impl FnOnce(Builder) -> Builder) -> Self {
        let sub = build(self.sub_builder());
        self.push_where(WhereIR::Sub {
            col: col.into(),
            op: op.into(),
            sub: Box::new(sub.ir),
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.push_where(WhereIR::Raw {
            sql: sql.into(),
            bindings,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn or_where_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.push_where(WhereIR::Raw {
            sql: sql.into(),
            bindings,
            boolean: BoolOp::Or,
        });
        self
    }

    pub fn where_fulltext(mut self, cols: Vec<String>, value: impl Into<String>, opts: FulltextOptions) -> Self {
        self.push_where(WhereIR::Fulltext {
            cols,
            value: value.into(),
            opts,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_json_contains(mut self, col: impl Into<String>, val: impl Into<Value>) -> Self {
        self.push_where(WhereIR::JsonContains {
            col: col.into(),
            val: val.into(),
            not: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_json_doesnt_contain(mut self, col: impl Into<String>, val: impl Into<Value>) -> Self {
        self.push_where(WhereIR::JsonContains {
            col: col.into(),
            val: val.into(),
            not: true,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_json_contains_key(mut self, col: impl Into<String>) -> Self {
        self.push_where(WhereIR::JsonContainsKey {
            col: col.into(),
            not: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_json_doesnt_contain_key(mut self, col: impl Into<String>) -> Self {
        self.push_where(WhereIR::JsonContainsKey {
            col: col.into(),
            not: true,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_json_length(mut self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        self.push_where(WhereIR::JsonLength {
            col: col.into(),
            op: op.into(),
            val: val.into(),
            boolean: BoolOp::And,
        });
        self
    }

    /// `whereRowValues(cols, op, vals)` — arity mismatch is an
    /// [`LihtneError::InvalidArgument`] (§7).
    pub fn where_row_values(mut self, cols: Vec<String>, op: impl Into<String>, vals: Vec<Value>) -> Result<Self> {
        if cols.len() != vals.len() {
            return Err(LihtneError::invalid_argument(
                "whereRowValues requires the same number of columns and values",
            ));
        }
        self.push_where(WhereIR::RowValues {
            cols,
            op: op.into(),
            vals,
            boolean: BoolOp::And,
        });
        Ok(self)
    }

    pub fn where_expression(mut self, expr: crate::expression::Expression) -> Self {
        self.push_where(WhereIR::Expression {
            expr,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_bitwise(mut self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        self.push_where(WhereIR::Bitwise {
            col: col.into(),
            op: op.into(),
            val: val.into(),
            boolean: BoolOp::And,
        });
        self
    }

    /// `whereAny(cols, op, val)` — any one of `cols` compares true, joined by
    /// `or` inside a nested group.
    pub fn where_any(mut self, cols: Vec<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        let op = op.into();
        let val = val.into();
        let mut children = Vec::with_capacity(cols.len());
        for (i, col) in cols.into_iter().enumerate() {
            children.push(WhereIR::Basic {
                col,
                op: op.clone(),
                val: val.clone(),
                boolean: if i == 0 { BoolOp::And } else { BoolOp::Or },
            });
        }
        for c in &children {
            self.bind_where(c, Section::Where);
        }
        self.ir.wheres.push(WhereIR::Nested {
            children,
            negated: false,
            boolean: BoolOp::And,
        });
        self
    }

    /// `whereAll(cols, op, val)` — every one of `cols` compares true, joined
    /// by `and` inside a nested group.
    pub fn where_all(mut self, cols: Vec<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        let op = op.into();
        let val = val.into();
        let mut children = Vec::with_capacity(cols.len());
        for (i, col) in cols.into_iter().enumerate() {
            children.push(WhereIR::Basic {
                col,
                op: op.clone(),
                val: val.clone(),
                boolean: if i == 0 { BoolOp::And } else { BoolOp::And },
            });
        }
        for c in &children {
            self.bind_where(c, Section::Where);
        }
        self.ir.wheres.push(WhereIR::Nested {
            children,
            negated: false,
            boolean: BoolOp::And,
        });
        self
    }

    /// A documented string-pattern helper for `where<PartOne>And<PartTwo>Or<PartThree>`
    /// style dynamic dispatch (§9): splits `method_name` on `_and_`/`_or_`
    /// and applies `params` positionally as equality wheres. Callers must
    /// invoke it explicitly; there is no method-dispatch hook.
    pub fn dynamic_where(mut self, method_name: &str, params: Vec<Value>) -> Result<Self> {
        let mut segments: Vec<(String, BoolOp)> = Vec::new();
        let mut boolean = BoolOp::And;
        for part in method_name.split('_') {
            match part {
                "and" => boolean = BoolOp::And,
                "or" => boolean = BoolOp::Or,
                "" => {}
                col => segments.push((col.to_string(), boolean)),
            }
        }
        if segments.len() != params.len() {
            return Err(LihtneError::invalid_argument(format!(
                "dynamicWhere({method_name}) expected {} parameters, got {}",
                segments.len(),
                params.len()
            )));
        }
        for ((col, boolean), val) in segments.into_iter().zip(params) {
            self.push_where(WhereIR::Basic {
                col,
                op: "=".to_string(),
                val,
                boolean,
            });
        }
        Ok(self)
    }

    // ==================== group / having ====================

    pub fn group_by(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ir.groups.extend(cols.into_iter().map(Into::into));
        self
    }

    pub fn group_by_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.ir.bindings.add_binding(bindings.clone(), Section::GroupBy);
        self.ir.group_raw.push((sql.into(), bindings));
        self
    }

    fn push_having(&mut self, h: HavingIR) {
        self.bind_where(&h, Section::Having);
        self.ir.havings.push(h);
    }

    pub fn having(self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        self.having_boolean(col, op, val, BoolOp::And)
    }

    pub fn or_having(self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        self.having_boolean(col, op, val, BoolOp::Or)
    }

    fn having_boolean(mut self, col: impl Into<String>, op: impl Into<String>, val: impl Into<Value>, boolean: BoolOp) -> Self {
        self.push_having(WhereIR::Basic {
            col: col.into(),
            op: op.into(),
            val: val.into(),
            boolean,
        });
        self
    }

    pub fn having_between(mut self, col: impl Into<String>, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.push_having(WhereIR::Between {
            col: col.into(),
            min: min.into(),
            max: max.into(),
            not: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn having_null(mut self, col: impl Into<String>) -> Self {
        self.push_having(WhereIR::Null {
            col: col.into(),
            not: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn having_not_null(mut self, col: impl Into<String>) -> Self {
        self.push_having(WhereIR::Null {
            col: col.into(),
            not: true,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn having_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.push_having(WhereIR::Raw {
            sql: sql.into(),
            bindings,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn or_having_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.push_having(WhereIR::Raw {
            sql: sql.into(),
            bindings,
            boolean: BoolOp::Or,
        });
        self
    }

    // ==================== order ====================

    pub fn order_by(mut self, col: impl Into<String>, direction: Direction) -> Self {
        self.ir.orders.push(OrderIR::column(col, direction));
        self
    }

    pub fn order_by_desc(self, col: impl Into<String>) -> Self {
        self.order_by(col, Direction::Desc)
    }

    pub fn order_by_raw(mut self, sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        self.ir.bindings.add_binding(bindings, Section::Order);
        self.ir.orders.push(OrderIR::raw(sql));
        self
    }

    pub fn latest(self, col: Option<&str>) -> Self {
        self.order_by(col.unwrap_or("created_at"), Direction::Desc)
    }

    pub fn oldest(self, col: Option<&str>) -> Self {
        self.order_by(col.unwrap_or("created_at"), Direction::Asc)
    }

    pub fn in_random_order(mut self, seed: Option<&str>) -> Self {
        let sql = self.grammar.compile_random(seed);
        self.ir.orders.push(OrderIR::raw(sql));
        self
    }

    pub fn reorder(mut self, col: Option<String>, direction: Direction) -> Self {
        self.ir.orders.clear();
        if let Some(col) = col {
            self.ir.orders.push(OrderIR::column(col, direction));
        }
        self
    }

    // ==================== union ====================

    pub fn union(mut self, build: impl FnOnce(Builder) -> Builder) -> Self {
        let sub = build(self.sub_builder());
        self.ir.bindings.merge_bindings(&sub.ir.bindings);
        self.ir.unions.push(UnionIR {
            query: Box::new(sub.ir),
            all: false,
        });
        self
    }

    pub fn union_all(mut self, build: impl FnOnce(Builder) -> Builder) -> Self {
        let sub = build(self.sub_builder());
        self.ir.bindings.merge_bindings(&sub.ir.bindings);
        self.ir.unions.push(UnionIR {
            query: Box::new(sub.ir),
            all: true,
        });
        self
    }

    // ==================== limit / offset / lock / index hints ====================

    pub fn limit(mut self, n: i64) -> Self {
        self.ir.set_limit(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.ir.set_offset(n);
        self
    }

    pub fn take(self, n: i64) -> Self {
        self.limit(n)
    }

    pub fn skip(self, n: i64) -> Self {
        self.offset(n)
    }

    pub fn for_page(self, page: i64, per_page: i64) -> Self {
        self.limit(per_page).offset((page.max(1) - 1) * per_page)
    }

    pub fn for_page_after_id(self, per_page: i64, last_id: Option<impl Into<Value>>, col: impl Into<String>) -> Self {
        let col = col.into();
        let mut b = self.order_by(col.clone(), Direction::Asc).limit(per_page);
        if let Some(last_id) = last_id {
            b = b.where_op(col, ">", last_id, BoolOp::And);
        }
        b
    }

    pub fn for_page_before_id(self, per_page: i64, last_id: Option<impl Into<Value>>, col: impl Into<String>) -> Self {
        let col = col.into();
        let mut b = self.order_by(col.clone(), Direction::Desc).limit(per_page);
        if let Some(last_id) = last_id {
            b = b.where_op(col, "<", last_id, BoolOp::And);
        }
        b
    }

    pub fn lock(mut self, value: Lock) -> Self {
        self.ir.lock = Some(value);
        self
    }

    pub fn shared_lock(self) -> Self {
        self.lock(Lock::ForShare)
    }

    pub fn lock_for_update(self) -> Self {
        self.lock(Lock::ForUpdate)
    }

    pub fn use_index(mut self, index: impl Into<String>) -> Self {
        self.ir.index_hint = Some(IndexHint {
            kind: IndexHintKind::Use,
            index: index.into(),
        });
        self
    }

    pub fn force_index(mut self, index: impl Into<String>) -> Self {
        self.ir.index_hint = Some(IndexHint {
            kind: IndexHintKind::Force,
            index: index.into(),
        });
        self
    }

    pub fn ignore_index(mut self, index: impl Into<String>) -> Self {
        self.ir.index_hint = Some(IndexHint {
            kind: IndexHintKind::Ignore,
            index: index.into(),
        });
        self
    }

    // ==================== conditionable ====================

    pub fn when<T>(self, value: Option<T>, cb: impl FnOnce(Builder, T) -> Builder) -> Self {
        match value {
            Some(v) => cb(self, v),
            None => self,
        }
    }

    pub fn when_else<T>(
        self,
        value: Option<T>,
        cb: impl FnOnce(Builder, T) -> Builder,
        else_cb: impl FnOnce(Builder) -> Builder,
    ) -> Self {
        match value {
            Some(v) => cb(self, v),
            None => else_cb(self),
        }
    }

    pub fn unless<T>(self, value: Option<T>, cb: impl FnOnce(Builder) -> Builder) -> Self {
        match value {
            Some(_) => self,
            None => cb(self),
        }
    }

    pub fn tap(self, cb: impl FnOnce(&Builder)) -> Self {
        cb(&self);
        self
    }

    // ==================== before-query callbacks ====================

    pub fn before_query(mut self, cb: BeforeQueryCallback) -> Self {
        self.ir.before_query_callbacks.push(cb);
        self
    }

    /// Runs every registered callback once, then clears the list (§3.6).
    fn apply_before_query_callbacks(&mut self) -> Result<()> {
        let callbacks = std::mem::take(&mut self.ir.before_query_callbacks);
        for cb in &callbacks {
            let mut tmp = Builder {
                grammar: Rc::clone(&self.grammar),
                connection: self.connection.as_ref().map(Rc::clone),
                ir: std::mem::take(&mut self.ir),
            };
            cb(&mut tmp)?;
            self.ir = tmp.ir;
        }
        Ok(())
    }

    // ==================== compile-only terminals ====================

    pub fn to_sql(mut self) -> Result<String> {
        self.apply_before_query_callbacks()?;
        self.grammar.compile_select(&self.ir)
    }

    pub fn get_bindings(&self) -> Vec<Value> {
        self.ir.bindings.flatten()
    }

    /// Substitutes every `?` in the compiled SQL with the connection's
    /// escaped literal for the corresponding binding (§4.2 "Raw SQL
    /// substitution"), scanning past single-quoted string literals and the
    /// PG `??` escape.
    pub fn to_raw_sql(mut self) -> Result<String> {
        self.apply_before_query_callbacks()?;
        let sql = self.grammar.compile_select(&self.ir)?;
        let bindings = self.ir.bindings.flatten();
        let connection = self.connection()?;
        substitute_bindings(&sql, &bindings, connection)
    }

    // ==================== executing terminals ====================

    pub fn get(mut self) -> Result<Vec<Row>> {
        self.apply_before_query_callbacks()?;
        let sql = self.grammar.compile_select(&self.ir)?;
        let bindings = self.ir.bindings.flatten();
        crate::lihtne_trace_query!(&sql, bindings.len());
        self.connection()?.select(&sql, &bindings)
    }

    pub fn first(self) -> Result<Option<Row>> {
        Ok(self.limit(1).get()?.into_iter().next())
    }

    pub fn find(self, id: impl Into<Value>, id_col: &str) -> Result<Option<Row>> {
        self.where_eq(id_col, id).first()
    }

    pub fn value(self, col: &str) -> Result<Option<Value>> {
        Ok(self.first()?.and_then(|mut row| row.remove(col)))
    }

    pub fn pluck(self, col: &str) -> Result<Vec<Value>> {
        let rows = self.get()?;
        Ok(rows.into_iter().filter_map(|mut r| r.remove(col)).collect())
    }

    pub fn implode(self, col: &str, glue: &str) -> Result<String> {
        let values = self.pluck(col)?;
        Ok(values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(glue))
    }

    pub fn exists(self) -> Result<bool> {
        Ok(self.first()?.is_some())
    }

    pub fn doesnt_exist(self) -> Result<bool> {
        Ok(!self.exists()?)
    }

    pub fn exists_or(self, cb: impl FnOnce() -> Result<()>) -> Result<bool> {
        let exists = self.exists()?;
        if !exists {
            cb()?;
        }
        Ok(exists)
    }

    pub fn doesnt_exist_or(self, cb: impl FnOnce() -> Result<()>) -> Result<bool> {
        let exists = self.exists()?;
        if exists {
            cb()?;
        }
        Ok(!exists)
    }

    fn aggregate_value(mut self, func: AggregateFn, cols: Vec<String>) -> Result<Value> {
        let saved_columns = self.ir.columns.clone();
        self.ir.aggregate = Some(Aggregate { func, columns: cols });
        self.apply_before_query_callbacks()?;
        let sql = self.grammar.compile_select(&self.ir)?;
        let bindings = self.ir.bindings.flatten();
        crate::lihtne_trace_query!(&sql, bindings.len());
        let mut rows = self.connection()?.select(&sql, &bindings)?;
        // Aggregate restoration (§4.1, invariant 6 in §8): `columns` is put
        // back even though this Builder is consumed right after.
        self.ir.aggregate = None;
        self.ir.columns = saved_columns;
        Ok(rows
            .pop()
            .and_then(|mut r| r.remove("aggregate"))
            .unwrap_or(Value::Null))
    }

    pub fn count(self) -> Result<i64> {
        match self.aggregate_value(AggregateFn::Count, vec!["*".to_string()])? {
            Value::Int(n) => Ok(n),
            Value::Null => Ok(0),
            other => Ok(other.to_string().parse().unwrap_or(0)),
        }
    }

    pub fn min(self, col: &str) -> Result<Value> {
        self.aggregate_value(AggregateFn::Min, vec![col.to_string()])
    }

    pub fn max(self, col: &str) -> Result<Value> {
        self.aggregate_value(AggregateFn::Max, vec![col.to_string()])
    }

    pub fn sum(self, col: &str) -> Result<Value> {
        self.aggregate_value(AggregateFn::Sum, vec![col.to_string()])
    }

    pub fn avg(self, col: &str) -> Result<Value> {
        self.aggregate_value(AggregateFn::Avg, vec![col.to_string()])
    }

    fn require_from(&self) -> Result<String> {
        match &self.ir.from {
            Some(FromSource::Table { name, .. }) => Ok(name.clone()),
            _ => Err(LihtneError::runtime("insert/update/delete require a table set via from()")),
        }
    }

    pub fn insert(self, rows: Vec<InsertRow>) -> Result<bool> {
        let table = self.require_from()?;
        let sql = self.grammar.compile_insert(&table, &rows)?;
        let bindings = flatten_insert_bindings(&rows);
        crate::lihtne_trace_query!(&sql, bindings.len());
        self.connection()?.insert(&sql, &bindings)
    }

    pub fn insert_or_ignore(self, rows: Vec<InsertRow>) -> Result<u64> {
        let table = self.require_from()?;
        let sql = self.grammar.compile_insert_or_ignore(&table, &rows)?;
        let bindings = flatten_insert_bindings(&rows);
        crate::lihtne_trace_query!(&sql, bindings.len());
        self.connection()?.affecting_statement(&sql, &bindings)
    }

    pub fn insert_get_id(self, row: InsertRow, sequence: Option<&str>) -> Result<i64> {
        let table = self.require_from()?;
        let rows = vec![row];
        let sql = self.grammar.compile_insert(&table, &rows)?;
        let bindings = flatten_insert_bindings(&rows);
        crate::lihtne_trace_query!(&sql, bindings.len());
        self.connection()?.insert_get_id(&sql, &bindings, sequence)
    }

    pub fn insert_using(self, columns: Vec<String>, build: impl FnOnce(Builder) -> Builder) -> Result<u64> {
        let table = self.require_from()?;
        let sub = build(self.sub_builder());
        let select_sql = self.grammar.compile_select(&sub.ir)?;
        let sql = self.grammar.compile_insert_using(&table, &columns, &select_sql)?;
        let bindings = sub.ir.bindings.flatten();
        crate::lihtne_trace_query!(&sql, bindings.len());
        self.connection()?.affecting_statement(&sql, &bindings)
    }

    pub fn update(mut self, values: InsertRow) -> Result<u64> {
        self.apply_before_query_callbacks()?;
        let table = self.require_from()?;
        let sql = self.grammar.compile_update(&self.ir, &table, &values)?;
        let mut bindings = self.grammar.assignment_bindings(&values);
        bindings.extend(self.ir.bindings.flatten());
        crate::lihtne_trace_query!(&sql, bindings.len());
        self.connection()?.update(&sql, &bindings)
    }

    pub fn update_or_insert(self, attributes: InsertRow, values: InsertRow) -> Result<bool> {
        let probe = attributes.iter().fold(self.clone(), |b, (col, val)| b.where_eq(col.clone(), val.clone()));
        if probe.exists()? {
            let mut merged = attributes.clone();
            merged.extend(values);
            let probe = attributes.into_iter().fold(self, |b, (col, val)| b.where_eq(col, val));
            probe.update(merged).map(|n| n > 0)
        } else {
            let mut row = attributes;
            row.extend(values);
            self.insert(vec![row])
        }
    }

    pub fn upsert(self, rows: Vec<InsertRow>, unique_by: Vec<String>, update: Vec<String>) -> Result<u64> {
        let table = self.require_from()?;
        let sql = self.grammar.compile_upsert(&table, &rows, &unique_by, &update)?;
        let bindings = flatten_insert_bindings(&rows);
        crate::lihtne_trace_query!(&sql, bindings.len());
        self.connection()?.affecting_statement(&sql, &bindings)
    }

    pub fn delete(mut self) -> Result<u64> {
        self.apply_before_query_callbacks()?;
        let table = self.require_from()?;
        let sql = self.grammar.compile_delete(&self.ir, &table)?;
        let bindings = self.ir.bindings.flatten();
        crate::lihtne_trace_query!(&sql, bindings.len());
        self.connection()?.delete(&sql, &bindings)
    }

    pub fn truncate(self) -> Result<()> {
        let table = self.require_from()?;
        let connection = self.connection()?;
        for stmt in self.grammar.compile_truncate(&table) {
            crate::lihtne_trace_query!(&stmt, 0usize);
            connection.statement(&stmt, &[])?;
        }
        Ok(())
    }

    // ==================== chunking ====================

    /// `chunk(n, cb)` (§4.1): repeatedly pages through results; stops when a
    /// page is short or `cb` returns `false`.
    pub fn chunk(self, n: i64, mut cb: impl FnMut(Vec<Row>, i64) -> Result<bool>) -> Result<bool> {
        let mut page = 1;
        loop {
            let rows = self.clone().for_page(page, n).get()?;
            let count = rows.len() as i64;
            if count == 0 {
                return Ok(true);
            }
            if !cb(rows, page)? {
                return Ok(false);
            }
            if count < n {
                return Ok(true);
            }
            page += 1;
        }
    }

    pub fn chunk_by_id(self, n: i64, col: &str, alias: Option<&str>, mut cb: impl FnMut(Vec<Row>) -> Result<bool>) -> Result<bool> {
        let alias = alias.unwrap_or(col);
        let mut last_id: Option<Value> = None;
        loop {
            let rows = self.clone().for_page_after_id(n, last_id.clone(), col).get()?;
            let count = rows.len();
            if count == 0 {
                return Ok(true);
            }
            let next_last_id = rows
                .last()
                .and_then(|r| r.get(alias))
                .cloned()
                .ok_or_else(|| LihtneError::runtime(format!("column [{alias}] not present in query result")))?;
            if !cb(rows)? {
                return Ok(false);
            }
            if (count as i64) < n {
                return Ok(true);
            }
            last_id = Some(next_last_id);
        }
    }

    pub fn chunk_by_id_desc(self, n: i64, col: &str, alias: Option<&str>, mut cb: impl FnMut(Vec<Row>) -> Result<bool>) -> Result<bool> {
        let alias = alias.unwrap_or(col);
        let mut last_id: Option<Value> = None;
        loop {
            let rows = self.clone().for_page_before_id(n, last_id.clone(), col).get()?;
            let count = rows.len();
            if count == 0 {
                return Ok(true);
            }
            let next_last_id = rows
                .last()
                .and_then(|r| r.get(alias))
                .cloned()
                .ok_or_else(|| LihtneError::runtime(format!("column [{alias}] not present in query result")))?;
            if !cb(rows)? {
                return Ok(false);
            }
            if (count as i64) < n {
                return Ok(true);
            }
            last_id = Some(next_last_id);
        }
    }

    // ==================== pagination ====================

    /// Re-compiles the count path as `select <aggregate> from (…) as
    /// aggregate_table`, stripping orders and the column list (§4.1
    /// "Pagination"), since those are irrelevant (and sometimes illegal,
    /// e.g. an order referencing an aliased column) inside a count.
    pub fn get_count_for_pagination(&self) -> Result<i64> {
        let mut counting = self.clone();
        counting.ir.orders.clear();
        counting.count()
    }

    pub fn paginate(self, per_page: i64, page: i64, total: Option<i64>) -> Result<LengthAwarePaginator> {
        let total = match total {
            Some(t) => t,
            None => self.get_count_for_pagination()?,
        };
        let items = self.for_page(page, per_page).get()?;
        Ok(LengthAwarePaginator::new(items, total.max(0) as u64, per_page.max(0) as u64, page.max(1) as u64))
    }

    /// Builds a keyset constraint from `cursor` honouring each order
    /// column's direction (§4.1 "cursorPaginate"), fetches `per_page + 1`
    /// rows to detect whether another page follows, and returns cursors for
    /// both directions.
    pub fn cursor_paginate(mut self, per_page: i64, cursor: Option<Cursor>) -> Result<CursorPaginator> {
        if self.ir.orders.is_empty() {
            return Err(LihtneError::invalid_argument("cursorPaginate requires at least one orderBy"));
        }
        if let Some(cursor) = &cursor {
            self = self.apply_cursor_constraint(cursor)?;
        }
        let orders = self.ir.orders.clone();
        let mut rows = self.limit(per_page + 1).get()?;
        let has_more = rows.len() as i64 > per_page;
        if has_more {
            rows.truncate(per_page as usize);
        }
        let next_cursor = if has_more {
            rows.last().map(|row| build_cursor(row, &orders, true))
        } else {
            None
        };
        let prev_cursor = cursor.map(|c| Cursor::new(c.values, false));
        Ok(CursorPaginator {
            items: rows,
            per_page: per_page.max(0) as u64,
            next_cursor,
            prev_cursor,
        })
    }

    fn apply_cursor_constraint(mut self, cursor: &Cursor) -> Result<Self> {
        let orders = self.ir.orders.clone();
        let mut children = Vec::new();
        for (i, order) in orders.iter().enumerate() {
            let Some(col) = &order.column else { continue };
            let Some(val) = cursor.get(col) else { continue };
            let op = match (order.direction, cursor.points_to_next) {
                (Direction::Asc, true) | (Direction::Desc, false) => ">",
                (Direction::Desc, true) | (Direction::Asc, false) => "<",
            };
            let mut equalities = Vec::new();
            for prior in orders.iter().take(i) {
                if let Some(pc) = &prior.column {
                    if let Some(pv) = cursor.get(pc) {
                        equalities.push(WhereIR::Basic {
                            col: pc.clone(),
                            op: "=".to_string(),
                            val: pv.clone(),
                            boolean: BoolOp::And,
                        });
                    }
                }
            }
            equalities.push(WhereIR::Basic {
                col: col.clone(),
                op: op.to_string(),
                val: val.clone(),
                boolean: BoolOp::And,
            });
            children.push(WhereIR::Nested {
                children: equalities,
                negated: false,
                boolean: BoolOp::Or,
            });
        }
        for c in &children {
            self.bind_where(c, Section::Where);
        }
        self.ir.wheres.push(WhereIR::Nested {
            children,
            negated: false,
            boolean: BoolOp::And,
        });
        Ok(self)
    }
}

fn build_cursor(row: &Row, orders: &[OrderIR], points_to_next: bool) -> Cursor {
    let mut values = BTreeMap::new();
    for order in orders {
        if let Some(col) = &order.column {
            if let Some(v) = row.get(col) {
                values.insert(col.clone(), v.clone());
            }
        }
    }
    Cursor::new(values, points_to_next)
}

fn flatten_insert_bindings(rows: &[InsertRow]) -> Vec<Value> {
    if rows.is_empty() {
        return Vec::new();
    }
    let columns: Vec<&String> = rows[0].iter().map(|(c, _)| c).collect();
    let mut out = Vec::new();
    for row in rows {
        for col in &columns {
            let val = row.iter().find(|(c, _)| c == *col).map(|(_, v)| v).unwrap_or(&Value::Null);
            if !val.is_raw() {
                out.push(val.clone());
            }
        }
    }
    out
}

/// Scans `sql`, replacing every `?` placeholder outside single-quoted string
/// literals with `connection.escape(binding)`. Recognises `''`/`\'` as
/// escaped quotes and the PG `??` operator escape (neither consumes a
/// binding) (§4.2 "Raw SQL substitution").
fn substitute_bindings(sql: &str, bindings: &[Value], connection: &dyn Connection) -> Result<String> {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_string = false;
    let mut binding_iter = bindings.iter();
    while let Some(c) = chars.next() {
        match c {
            '\'' if in_string => {
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    out.push(chars.next().unwrap());
                } else {
                    in_string = false;
                    out.push('\'');
                }
            }
            '\'' => {
                in_string = true;
                out.push('\'');
            }
            '\\' if in_string && chars.peek() == Some(&'\'') => {
                out.push('\\');
                out.push(chars.next().unwrap());
            }
            '?' if !in_string && chars.peek() == Some(&'?') => {
                chars.next();
                out.push('?');
            }
            '?' if !in_string => {
                let value = binding_iter
                    .next()
                    .ok_or_else(|| LihtneError::runtime("more `?` placeholders than bindings"))?;
                out.push_str(&connection.escape(value, matches!(value, Value::Bytes(_)))?);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// The object a join closure receives (§4.1 "Join closures"): `on`/`or_on`
/// record WhereIR::Column nodes; the where-family methods delegate to a
/// scratch `Builder` so the same clause constructors are reused, and
/// `nested_joins` lets a closure call `.join` again for a parenthesised
/// join group.
pub struct JoinBuilder {
    wheres: Vec<WhereIR>,
    nested_joins: Vec<JoinIR>,
}

impl Default for JoinBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinBuilder {
    pub fn new() -> Self {
        JoinBuilder {
            wheres: Vec::new(),
            nested_joins: Vec::new(),
        }
    }

    pub fn on(mut self, a: impl Into<String>, op: impl Into<String>, b: impl Into<String>) -> Self {
        self.wheres.push(WhereIR::Column {
            a: a.into(),
            op: op.into(),
            b: b.into(),
            boolean: BoolOp::And,
        });
        self
    }

    pub fn or_on(mut self, a: impl Into<String>, op: impl Into<String>, b: impl Into<String>) -> Self {
        self.wheres.push(WhereIR::Column {
            a: a.into(),
            op: op.into(),
            b: b.into(),
            boolean: BoolOp::Or,
        });
        self
    }

    pub fn where_eq(mut self, col: impl Into<String>, val: impl Into<Value>) -> Self {
        self.wheres.push(WhereIR::Basic {
            col: col.into(),
            op: "=".to_string(),
            val: val.into(),
            boolean: BoolOp::And,
        });
        self
    }

    pub fn where_null(mut self, col: impl Into<String>) -> Self {
        self.wheres.push(WhereIR::Null {
            col: col.into(),
            not: false,
            boolean: BoolOp::And,
        });
        self
    }

    pub fn join(mut self, kind: JoinKind, table: impl Into<String>, build_on: impl FnOnce(JoinBuilder) -> JoinBuilder) -> Self {
        let inner = build_on(JoinBuilder::new());
        self.nested_joins.push(JoinIR {
            kind,
            table: FromSource::table(table),
            alias: None,
            on: inner.wheres,
            nested_joins: inner.nested_joins,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarConfig;

    struct TestGrammar {
        config: GrammarConfig,
    }

    impl Grammar for TestGrammar {
        fn config(&self) -> &GrammarConfig {
            &self.config
        }
    }

    fn builder() -> Builder {
        Builder::new(Rc::new(TestGrammar {
            config: GrammarConfig::default(),
        }))
    }

    #[test]
    fn basic_select_compiles() {
        let sql = builder().from("users").where_eq("id", 1).to_sql().unwrap();
        assert_eq!(sql, r#"select * from "users" where "id" = ?"#);
    }

    #[test]
    fn empty_where_in_compiles_to_false() {
        let b = builder().from("users").where_in("id", vec![]).unwrap();
        assert_eq!(b.to_sql().unwrap(), r#"select * from "users" where 0 = 1"#);
    }

    #[test]
    fn null_equality_becomes_is_null() {
        let sql = builder().from("users").where_eq("deleted_at", Value::Null).to_sql().unwrap();
        assert_eq!(sql, r#"select * from "users" where "deleted_at" is null"#);
    }

    #[test]
    fn bindings_follow_where_clause() {
        let b = builder().from("users").where_eq("id", 5);
        assert_eq!(b.get_bindings(), vec![Value::Int(5)]);
    }

    #[test]
    fn aggregate_restores_columns_after_count() {
        let grammar = Rc::new(TestGrammar {
            config: GrammarConfig::default(),
        });
        let mut b = Builder::new(Rc::clone(&grammar)).from("users").select(["id", "name"]);
        let saved = b.ir.columns.clone();
        b.ir.aggregate = Some(Aggregate {
            func: AggregateFn::Count,
            columns: vec!["*".to_string()],
        });
        b.ir.aggregate = None;
        assert_eq!(b.ir.columns, saved);
    }

    #[test]
    fn where_not_negates_the_nested_group() {
        let sql = builder()
            .from("users")
            .where_not(|q| q.where_eq("id", 1).or_where_eq("id", 2))
            .to_sql()
            .unwrap();
        assert_eq!(sql, r#"select * from "users" where not ("id" = ? or "id" = ?)"#);
    }

    #[test]
    fn or_where_not_uses_or_boolean_before_the_negation() {
        let sql = builder()
            .from("users")
            .where_eq("active", true)
            .or_where_not(|q| q.where_eq("id", 1))
            .to_sql()
            .unwrap();
        assert_eq!(sql, r#"select * from "users" where "active" = ? or not ("id" = ?)"#);
    }

    #[test]
    fn having_bindings_land_in_having_section_after_group_by() {
        let b = builder()
            .from("users")
            .group_by_raw("\"role\"", vec![])
            .having("count", ">", 5);
        assert_eq!(b.get_bindings(), vec![Value::Int(5)]);
    }

    #[test]
    fn having_raw_bindings_follow_group_by_bindings_in_flattened_order() {
        let b = builder()
            .from("users")
            .group_by_raw("?", vec![Value::from("group_marker")])
            .having_raw("count > ?", vec![Value::from(5)]);
        assert_eq!(b.get_bindings(), vec![Value::from("group_marker"), Value::Int(5)]);
    }
}
