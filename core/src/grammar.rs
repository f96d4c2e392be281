//! [`Grammar`] — compiles a [`QueryIR`] into dialect SQL (§4.2).
//!
//! The default method bodies here are the ANSI grammar: every clause has a
//! sensible default, and dialect crates override only the pieces that
//! differ (identifier quoting, JSON paths, upsert, lock hints,
//! limit/offset syntax, lateral joins, fulltext, joined update/delete).
//! Everything lives in one trait definition because Rust can't merge a
//! trait's default methods back together across files.

use crate::error::{LihtneError, Result};
use crate::identifier::{escape_by_doubling, Identifier};
use crate::ir::*;
use crate::json_path::JsonPath;
use crate::value::Value;

/// Per-grammar-instance configuration (§6.3): table prefix and the
/// MySQL-only `use_upsert_alias` switch. One `Grammar` may back many
/// `Builder`s (§5 "Shared-resource policy").
#[derive(Debug, Clone, Default)]
pub struct GrammarConfig {
    pub table_prefix: String,
    pub use_upsert_alias: bool,
}

/// One row of values for an INSERT, keyed by column name; order within a
/// row is irrelevant, the grammar collects the union of keys across all
/// rows (insertion order of the first row) the way `compileInsert` does.
pub type InsertRow = Vec<(String, Value)>;

/// Dialect-specific SQL compiler. Stateless beyond [`GrammarConfig`].
pub trait Grammar {
    fn config(&self) -> &GrammarConfig;

    fn table_prefix(&self) -> &str {
        &self.config().table_prefix
    }

    /// Default date format (§6.3); SQL Server overrides with fractional
    /// seconds.
    fn date_format(&self) -> &str {
        "%Y-%m-%d %H:%M:%S"
    }

    // ==================== identifiers ====================

    /// The character(s) used to wrap a single identifier segment.
    /// ANSI/Postgres/SQLite: `"`. MySQL/MariaDB: `` ` ``. SQL Server: `[ ]`.
    fn wrap_value(&self, segment: &str) -> String {
        if segment == "*" {
            return "*".to_string();
        }
        format!("\"{}\"", escape_by_doubling(segment, '"'))
    }

    /// Wraps a dotted identifier (`a.b.c [as alias]`), applying
    /// `wrap_value` to every non-`*` segment. Does **not** apply the table
    /// prefix — that only happens in `wrap_table_name` (§3.6 invariant).
    fn wrap(&self, ident: &Identifier) -> String {
        let body = ident
            .segments
            .iter()
            .map(|s| self.wrap_value(s))
            .collect::<Vec<_>>()
            .join(".");
        match &ident.alias {
            Some(alias) => format!("{} as {}", body, self.wrap_value(alias)),
            None => body,
        }
    }

    /// Wraps a table reference, applying the configured prefix exactly once
    /// to the last dotted segment and to any alias.
    fn wrap_table_name(&self, raw: &str) -> String {
        let ident = Identifier::parse(raw);
        let prefix = self.table_prefix();
        let mut segments = ident.segments.clone();
        if let Some(last) = segments.last_mut() {
            *last = format!("{}{}", prefix, last);
        }
        let wrapped = segments
            .iter()
            .map(|s| self.wrap_value(s))
            .collect::<Vec<_>>()
            .join(".");
        match ident.alias {
            Some(alias) => {
                let aliased = format!("{}{}", prefix, alias);
                format!("{} as {}", wrapped, self.wrap_value(&aliased))
            }
            None => wrapped,
        }
    }

    fn wrap_from_source(&self, source: &FromSource) -> Result<String> {
        match source {
            FromSource::Table { name, alias } => {
                let combined = match alias {
                    Some(a) => format!("{} as {}", name, a),
                    None => name.clone(),
                };
                Ok(self.wrap_table_name(&combined))
            }
            FromSource::Sub { ir, alias } => {
                let sql = self.compile_select(ir)?;
                let aliased_name = format!("{}{}", self.table_prefix(), alias);
                Ok(format!("({}) as {}", sql, self.wrap_value(&aliased_name)))
            }
            FromSource::Raw { sql, .. } => Ok(sql.clone()),
        }
    }

    fn compile_column_reference(&self, col: &str) -> Result<String> {
        match JsonPath::parse(col) {
            Some(path) => self.compile_json_selector(&path),
            None => Ok(self.wrap(&Identifier::parse(col))),
        }
    }

    // ==================== parameters ====================

    /// `?` for a bound value; `Raw` values render inline and bind nothing
    /// (§4.2 "Parameter binding").
    fn parameter(&self, value: &Value) -> String {
        match value {
            Value::Raw(sql) => sql.clone(),
            _ => "?".to_string(),
        }
    }

    fn parameterize(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|v| self.parameter(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ==================== select columns ====================

    fn compile_column_item(&self, col: &ColumnItem) -> Result<String> {
        match col {
            ColumnItem::Identifier(raw) => self.compile_column_reference(raw),
            ColumnItem::Raw { sql, .. } => Ok(sql.clone()),
            ColumnItem::Sub { ir, alias } => {
                let sql = self.compile_select(ir)?;
                Ok(format!("({}) as {}", sql, self.wrap_value(alias)))
            }
        }
    }

    fn compile_columns(&self, ir: &QueryIR) -> Result<String> {
        if ir.aggregate.is_some() {
            return Ok(String::new());
        }
        let select = match &ir.distinct {
            Distinct::No => "select",
            Distinct::Yes | Distinct::Columns(_) => "select distinct",
        };
        let cols = if ir.columns.is_empty() {
            "*".to_string()
        } else {
            ir.columns
                .iter()
                .map(|c| self.compile_column_item(c))
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        };
        Ok(format!("{} {}", select, cols))
    }

    fn compile_aggregate(&self, agg: &Aggregate) -> String {
        let cols = agg
            .columns
            .iter()
            .map(|c| {
                if c == "*" {
                    "*".to_string()
                } else {
                    self.wrap(&Identifier::parse(c))
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("select {}({}) as aggregate", agg.func.as_sql(), cols)
    }

    fn compile_from(&self, ir: &QueryIR) -> Result<String> {
        let Some(from) = &ir.from else {
            return Ok(String::new());
        };
        Ok(format!("from {}", self.wrap_from_source(from)?))
    }

    fn compile_index_hint(&self, _ir: &QueryIR) -> Result<String> {
        Ok(String::new())
    }

    // ==================== joins ====================

    fn compile_joins(&self, ir: &QueryIR) -> Result<String> {
        if ir.joins.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::new();
        for join in &ir.joins {
            parts.push(self.compile_join(join)?);
        }
        Ok(parts.join(" "))
    }

    fn compile_join(&self, join: &JoinIR) -> Result<String> {
        if join.kind.is_lateral() {
            return self.compile_join_lateral(join);
        }
        let kind = match join.kind {
            JoinKind::Inner => "inner join",
            JoinKind::Left => "left join",
            JoinKind::Right => "right join",
            JoinKind::Cross => "cross join",
            JoinKind::LeftLateral | JoinKind::InnerLateral => unreachable!(),
        };
        let table = self.wrap_from_source(&join.table)?;
        let mut nested = String::new();
        for n in &join.nested_joins {
            if !nested.is_empty() {
                nested.push(' ');
            }
            nested.push_str(&self.compile_join(n)?);
        }
        let on = self.compile_where_list(&join.on, "on")?;
        let mut out = format!("{} {}", kind, table);
        if !nested.is_empty() {
            out = format!("{} ({})", out, nested);
        }
        if !on.is_empty() {
            out = format!("{} {}", out, on);
        }
        Ok(out)
    }

    fn compile_join_lateral(&self, _join: &JoinIR) -> Result<String> {
        Err(LihtneError::unsupported("lateral joins not supported"))
    }

    fn supports_lateral_joins(&self) -> bool {
        true
    }

    // ==================== where / having ====================

    /// The where/on tree compiled and joined with its leading boolean
    /// stripped, prefixed with `where `/`on ` (empty prefix means: just the
    /// stripped, parenthesisable body, used for `Nested`).
    fn compile_where_list(&self, wheres: &[WhereIR], prefix: &str) -> Result<String> {
        if wheres.is_empty() {
            return Ok(String::new());
        }
        let mut sql = String::new();
        for w in wheres {
            let frag = self.compile_where_node(w)?;
            if sql.is_empty() {
                sql.push_str(&frag);
            } else {
                sql.push(' ');
                sql.push_str(&frag);
            }
        }
        let stripped = remove_leading_boolean(&sql);
        if prefix.is_empty() {
            Ok(stripped.to_string())
        } else {
            Ok(format!("{} {}", prefix, stripped))
        }
    }

    fn compile_wheres(&self, ir: &QueryIR) -> Result<String> {
        self.compile_where_list(&ir.wheres, "where")
    }

    fn compile_where_node(&self, w: &WhereIR) -> Result<String> {
        let boolean = w.boolean().as_sql();
        let body = self.compile_where_body(w)?;
        Ok(format!("{} {}", boolean, body))
    }

    fn compile_having_node(&self, w: &WhereIR) -> Result<String> {
        match w {
            WhereIR::Basic { .. }
            | WhereIR::Between { .. }
            | WhereIR::Null { .. }
            | WhereIR::Nested { .. }
            | WhereIR::Raw { .. }
            | WhereIR::Expression { .. }
            | WhereIR::Bitwise { .. } => self.compile_where_node(w),
            other => Err(LihtneError::compilation(format!(
                "having does not support the {} clause",
                variant_name(other)
            ))),
        }
    }

    fn compile_where_body(&self, w: &WhereIR) -> Result<String> {
        match w {
            WhereIR::Basic { col, op, val, .. } => {
                let col_sql = self.compile_column_reference(col)?;
                match (op.as_str(), val.is_null()) {
                    ("=", true) => Ok(format!("{} is null", col_sql)),
                    ("!=", true) | ("<>", true) => Ok(format!("{} is not null", col_sql)),
                    _ => Ok(format!("{} {} {}", col_sql, op, self.parameter(val))),
                }
            }
            WhereIR::In { col, vals, not, .. } => {
                let col_sql = self.compile_column_reference(col)?;
                if vals.is_empty() {
                    return Ok(if *not { "1 = 1".to_string() } else { "0 = 1".to_string() });
                }
                let kw = if *not { "not in" } else { "in" };
                Ok(format!("{} {} ({})", col_sql, kw, self.parameterize(vals)))
            }
            WhereIR::InSub { col, sub, not, .. } => {
                let col_sql = self.compile_column_reference(col)?;
                let kw = if *not { "not in" } else { "in" };
                let sub_sql = self.compile_select(sub)?;
                Ok(format!("{} {} ({})", col_sql, kw, sub_sql))
            }
            WhereIR::InRaw { col, ints, not, .. } => {
                let col_sql = self.compile_column_reference(col)?;
                if ints.is_empty() {
                    return Ok(if *not { "1 = 1".to_string() } else { "0 = 1".to_string() });
                }
                let kw = if *not { "not in" } else { "in" };
                let list = ints.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
                Ok(format!("{} {} ({})", col_sql, kw, list))
            }
            WhereIR::Null { col, not, .. } => {
                let col_sql = self.compile_column_reference(col)?;
                Ok(format!("{} is {}null", col_sql, if *not { "not " } else { "" }))
            }
            WhereIR::Between { col, min, max, not, .. } => {
                let col_sql = self.compile_column_reference(col)?;
                let kw = if *not { "not between" } else { "between" };
                Ok(format!(
                    "{} {} {} and {}",
                    col_sql,
                    kw,
                    self.parameter(min),
                    self.parameter(max)
                ))
            }
            WhereIR::BetweenColumns { col, a, b, not, .. } => {
                let col_sql = self.compile_column_reference(col)?;
                let kw = if *not { "not between" } else { "between" };
                Ok(format!(
                    "{} {} {} and {}",
                    col_sql,
                    kw,
                    self.wrap(&Identifier::parse(a)),
                    self.wrap(&Identifier::parse(b))
                ))
            }
            WhereIR::Column { a, op, b, .. } => Ok(format!(
                "{} {} {}",
                self.wrap(&Identifier::parse(a)),
                op,
                self.wrap(&Identifier::parse(b))
            )),
            WhereIR::DateBased { unit, col, op, val, .. } => {
                self.compile_date_based(*unit, col, op, val)
            }
            WhereIR::Exists { sub, not, .. } => {
                let kw = if *not { "not exists" } else { "exists" };
                Ok(format!("{} ({})", kw, self.compile_select(sub)?))
            }
            WhereIR::Nested { children, negated, .. } => {
                if children.is_empty() {
                    return Ok(if *negated { "(not (1 = 1))".to_string() } else { "(1 = 1)".to_string() });
                }
                let inner = self.compile_where_list(children, "")?;
                Ok(if *negated { format!("not ({})", inner) } else { format!("({})", inner) })
            }
            WhereIR::Sub { col, op, sub, .. } => {
                let col_sql = self.compile_column_reference(col)?;
                Ok(format!("{} {} ({})", col_sql, op, self.compile_select(sub)?))
            }
            WhereIR::Raw { sql, .. } => Ok(sql.clone()),
            WhereIR::Fulltext { cols, value, opts, .. } => self.compile_fulltext(cols, value, opts),
            WhereIR::JsonContains { col, val, not, .. } => {
                let sql = self.compile_json_contains(col, val)?;
                Ok(if *not { format!("not {}", sql) } else { sql })
            }
            WhereIR::JsonContainsKey { col, not, .. } => {
                let sql = self.compile_json_contains_key(col)?;
                Ok(if *not { format!("not {}", sql) } else { sql })
            }
            WhereIR::JsonLength { col, op, val, .. } => self.compile_json_length(col, op, val),
            WhereIR::RowValues { cols, op, vals, .. } => {
                if cols.len() != vals.len() {
                    return Err(LihtneError::invalid_argument(
                        "whereRowValues requires the same number of columns and values",
                    ));
                }
                let cols_sql = cols
                    .iter()
                    .map(|c| self.wrap(&Identifier::parse(c)))
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(format!("({}) {} ({})", cols_sql, op, self.parameterize(vals)))
            }
            WhereIR::Expression { expr, .. } => Ok(expr.sql.clone()),
            WhereIR::Bitwise { col, op, val, .. } => {
                let col_sql = self.compile_column_reference(col)?;
                Ok(format!("{} {} {}", col_sql, op, self.parameter(val)))
            }
        }
    }

    fn compile_date_based(&self, unit: DateUnit, col: &str, op: &str, val: &Value) -> Result<String> {
        let col_sql = self.wrap(&Identifier::parse(col));
        let func = match unit {
            DateUnit::Date => "date",
            DateUnit::Day => "day",
            DateUnit::Month => "month",
            DateUnit::Year => "year",
            DateUnit::Time => "time",
        };
        Ok(format!("{}({}) {} {}", func, col_sql, op, self.parameter(val)))
    }

    fn compile_groups(&self, ir: &QueryIR) -> Result<String> {
        if ir.groups.is_empty() && ir.group_raw.is_empty() {
            return Ok(String::new());
        }
        let mut parts: Vec<String> = ir
            .groups
            .iter()
            .map(|g| self.wrap(&Identifier::parse(g)))
            .collect();
        parts.extend(ir.group_raw.iter().map(|(sql, _)| sql.clone()));
        Ok(format!("group by {}", parts.join(", ")))
    }

    fn compile_havings(&self, ir: &QueryIR) -> Result<String> {
        if ir.havings.is_empty() {
            return Ok(String::new());
        }
        let mut sql = String::new();
        for h in &ir.havings {
            let frag = self.compile_having_node(h)?;
            if sql.is_empty() {
                sql.push_str(&frag);
            } else {
                sql.push(' ');
                sql.push_str(&frag);
            }
        }
        Ok(format!("having {}", remove_leading_boolean(&sql)))
    }

    // ==================== fulltext ====================

    fn compile_fulltext(
        &self,
        _cols: &[String],
        _value: &str,
        _opts: &FulltextOptions,
    ) -> Result<String> {
        Err(LihtneError::unsupported(
            "full text search not supported by this grammar",
        ))
    }

    fn supports_fulltext(&self) -> bool {
        false
    }

    // ==================== JSON ====================

    fn compile_json_selector(&self, _path: &JsonPath) -> Result<String> {
        Err(LihtneError::unsupported("JSON paths not supported by this grammar"))
    }

    fn compile_json_contains(&self, _col: &str, _val: &Value) -> Result<String> {
        Err(LihtneError::unsupported("JSON contains not supported by this grammar"))
    }

    fn compile_json_contains_key(&self, _col: &str) -> Result<String> {
        Err(LihtneError::unsupported(
            "JSON contains key not supported by this grammar",
        ))
    }

    fn compile_json_length(&self, _col: &str, _op: &str, _val: &Value) -> Result<String> {
        Err(LihtneError::unsupported("JSON length not supported by this grammar"))
    }

    /// Compiles a single JSON-path assignment for UPDATE; default errors
    /// out, dialects override (MySQL: `json_set`, Postgres: `jsonb_set`,
    /// SQLite: merged `json_patch`, SQL Server: not supported via this
    /// path — SQL Server updates scalars directly via `json_modify`).
    fn compile_json_update_assignment(&self, _col: &str, _path_segments: &str, _val: &Value) -> Result<String> {
        Err(LihtneError::unsupported("JSON column updates not supported by this grammar"))
    }

    // ==================== order / limit / offset / lock ====================

    fn compile_orders(&self, ir: &QueryIR) -> Result<String> {
        self.compile_order_list(&ir.orders)
    }

    fn compile_order_list(&self, orders: &[OrderIR]) -> Result<String> {
        if orders.is_empty() {
            return Ok(String::new());
        }
        let parts = orders
            .iter()
            .map(|o| self.compile_order(o))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("order by {}", parts))
    }

    fn compile_order(&self, order: &OrderIR) -> String {
        if let Some(raw) = &order.raw {
            return raw.clone();
        }
        format!(
            "{} {}",
            self.wrap(&Identifier::parse(order.column.as_deref().unwrap_or(""))),
            order.direction.as_sql()
        )
    }

    fn compile_limit(&self, ir: &QueryIR) -> Result<String> {
        Ok(match ir.limit {
            Some(n) => format!("limit {}", n),
            None => String::new(),
        })
    }

    fn compile_offset(&self, ir: &QueryIR) -> Result<String> {
        Ok(match ir.offset {
            Some(n) => format!("offset {}", n),
            None => String::new(),
        })
    }

    fn compile_lock(&self, ir: &QueryIR) -> Result<String> {
        Ok(match &ir.lock {
            None => String::new(),
            Some(Lock::ForUpdate) => "for update".to_string(),
            Some(Lock::ForShare) => "for share".to_string(),
            Some(Lock::Raw(s)) => s.clone(),
        })
    }

    fn compile_random(&self, seed: Option<&str>) -> String {
        let _ = seed;
        "RANDOM()".to_string()
    }

    // ==================== select ====================

    /// Full SELECT compilation (§4.2 algorithm). Aggregate+union or
    /// aggregate+having rewriting happens before the fixed-order clause
    /// walk; the caller's `ir.columns` is never mutated since we operate on
    /// an owned clone.
    fn compile_select(&self, ir: &QueryIR) -> Result<String> {
        if needs_aggregate_rewrite(ir) {
            return self.compile_union_aggregate(ir);
        }
        let mut effective = ir.clone();
        if effective.columns.is_empty() {
            effective.columns = vec![ColumnItem::Identifier("*".to_string())];
        }

        let mut fragments = Vec::new();
        if let Some(agg) = &effective.aggregate {
            fragments.push(self.compile_aggregate(agg));
        } else {
            let cols = self.compile_columns(&effective)?;
            if !cols.is_empty() {
                fragments.push(cols);
            }
        }
        for frag in [
            self.compile_from(&effective)?,
            self.compile_index_hint(&effective)?,
            self.compile_joins(&effective)?,
            self.compile_wheres(&effective)?,
            self.compile_groups(&effective)?,
            self.compile_havings(&effective)?,
            self.compile_orders(&effective)?,
            self.compile_limit(&effective)?,
            self.compile_offset(&effective)?,
            self.compile_lock(&effective)?,
        ] {
            if !frag.is_empty() {
                fragments.push(frag);
            }
        }

        let mut sql = fragments.join(" ");
        if !effective.unions.is_empty() {
            sql = self.wrap_union(&sql);
            let unions = self.compile_unions(&effective)?;
            if !unions.is_empty() {
                sql = format!("{} {}", sql, unions);
            }
        }
        Ok(sql)
    }

    /// Wraps the base select of a union composition; ANSI parenthesises it
    /// the same way each member is parenthesised.
    fn wrap_union(&self, sql: &str) -> String {
        format!("({})", sql)
    }

    fn compile_unions(&self, ir: &QueryIR) -> Result<String> {
        let mut parts = Vec::new();
        for u in &ir.unions {
            let inner = self.compile_select(&u.query)?;
            let keyword = if u.all { "union all" } else { "union" };
            parts.push(format!("{} ({})", keyword, inner));
        }
        let mut sql = parts.join(" ");
        let orders = self.compile_order_list(&ir.union_orders)?;
        if !orders.is_empty() {
            sql = format!("{} {}", sql, orders);
        }
        if let Some(n) = ir.union_limit {
            sql = format!("{} limit {}", sql, n);
        }
        if let Some(n) = ir.union_offset {
            sql = format!("{} offset {}", sql, n);
        }
        Ok(sql)
    }

    /// Rewrites `select <agg> from (<inner select, minus its own
    /// aggregate>) as temp_table` when both unions/havings and an
    /// aggregate are present (§4.1 "Aggregates and union-aggregate
    /// rewriting").
    fn compile_union_aggregate(&self, ir: &QueryIR) -> Result<String> {
        let agg = ir.aggregate.clone().expect("rewrite only called with an aggregate");
        let mut inner = ir.clone();
        inner.aggregate = None;
        let inner_sql = self.compile_select(&inner)?;
        let cols = agg
            .columns
            .iter()
            .map(|c| {
                if c == "*" {
                    "*".to_string()
                } else {
                    self.wrap(&Identifier::parse(c))
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "select {}({}) as aggregate from ({}) as temp_table",
            agg.func.as_sql(),
            cols,
            inner_sql
        ))
    }

    // ==================== insert / update / delete / upsert ====================

    fn compile_insert(&self, table: &str, rows: &[InsertRow]) -> Result<String> {
        let table_sql = self.wrap_table_name(table);
        if rows.is_empty() || rows.iter().all(|r| r.is_empty()) {
            return Ok(format!("insert into {} default values", table_sql));
        }
        let columns = rows[0].iter().map(|(c, _)| c.clone()).collect::<Vec<_>>();
        let cols_sql = columns
            .iter()
            .map(|c| self.wrap(&Identifier::parse(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut value_groups = Vec::with_capacity(rows.len());
        for row in rows {
            let vals: Vec<&Value> = columns
                .iter()
                .map(|c| {
                    row.iter()
                        .find(|(rc, _)| rc == c)
                        .map(|(_, v)| v)
                        .unwrap_or(&Value::Null)
                })
                .collect();
            let params = vals.iter().map(|v| self.parameter(v)).collect::<Vec<_>>().join(", ");
            value_groups.push(format!("({})", params));
        }
        Ok(format!(
            "insert into {} ({}) values {}",
            table_sql,
            cols_sql,
            value_groups.join(", ")
        ))
    }

    fn compile_insert_or_ignore(&self, table: &str, rows: &[InsertRow]) -> Result<String> {
        let _ = (table, rows);
        Err(LihtneError::unsupported("insert or ignore not supported by this grammar"))
    }

    fn compile_insert_using(&self, table: &str, columns: &[String], select_sql: &str) -> Result<String> {
        let table_sql = self.wrap_table_name(table);
        let cols_sql = columns
            .iter()
            .map(|c| self.wrap(&Identifier::parse(c)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("insert into {} ({}) {}", table_sql, cols_sql, select_sql))
    }

    fn compile_update(&self, ir: &QueryIR, table: &str, values: &[(String, Value)]) -> Result<String> {
        if !ir.joins.is_empty() {
            return self.compile_update_with_joins(ir, table, values);
        }
        let table_sql = self.wrap_table_name(table);
        let assignments = self.compile_assignments(values)?;
        let mut sql = format!("update {} set {}", table_sql, assignments);
        let wheres = self.compile_wheres(ir)?;
        if !wheres.is_empty() {
            sql = format!("{} {}", sql, wheres);
        }
        Ok(sql)
    }

    fn compile_assignments(&self, values: &[(String, Value)]) -> Result<String> {
        let mut parts = Vec::new();
        for (col, val) in values {
            if let Some(path) = JsonPath::parse(col) {
                parts.push(self.compile_json_update_assignment(&path.column, &path.dotted(), val)?);
            } else {
                parts.push(format!("{} = {}", self.wrap(&Identifier::parse(col)), self.parameter(val)));
            }
        }
        Ok(parts.join(", "))
    }

    fn compile_update_with_joins(&self, ir: &QueryIR, table: &str, values: &[(String, Value)]) -> Result<String> {
        let _ = (ir, table, values);
        Err(LihtneError::unsupported("joined updates not supported by this grammar"))
    }

    fn compile_update_from(&self, ir: &QueryIR, table: &str, values: &[(String, Value)]) -> Result<String> {
        let _ = (ir, table, values);
        Err(LihtneError::unsupported("updateFrom is only supported on PostgreSQL"))
    }

    /// Bindings for an `update()` assignment list, in the order
    /// `compile_assignments` emits `?` placeholders for them. The ANSI
    /// default is one binding per non-`Raw` value; SQLite overrides this
    /// since it collapses every JSON-path assignment sharing a base column
    /// into a single merged `json_patch` binding.
    fn assignment_bindings(&self, values: &[(String, Value)]) -> Vec<Value> {
        values.iter().filter(|(_, v)| !v.is_raw()).map(|(_, v)| v.clone()).collect()
    }

    fn compile_delete(&self, ir: &QueryIR, table: &str) -> Result<String> {
        if !ir.joins.is_empty() {
            return self.compile_delete_with_joins(ir, table);
        }
        let table_sql = self.wrap_table_name(table);
        let mut sql = format!("delete from {}", table_sql);
        let wheres = self.compile_wheres(ir)?;
        if !wheres.is_empty() {
            sql = format!("{} {}", sql, wheres);
        }
        Ok(sql)
    }

    fn compile_delete_with_joins(&self, ir: &QueryIR, table: &str) -> Result<String> {
        let _ = (ir, table);
        Err(LihtneError::unsupported("joined deletes not supported by this grammar"))
    }

    fn compile_truncate(&self, table: &str) -> Vec<String> {
        vec![format!("truncate table {}", self.wrap_table_name(table))]
    }

    fn supports_upsert(&self) -> bool {
        false
    }

    fn compile_upsert(
        &self,
        _table: &str,
        _rows: &[InsertRow],
        _unique_by: &[String],
        _update: &[String],
    ) -> Result<String> {
        Err(LihtneError::unsupported("upsert statements not supported by this grammar"))
    }

    // ==================== savepoints ====================

    fn compile_savepoint(&self, name: &str) -> String {
        format!("SAVEPOINT {}", name)
    }

    fn compile_savepoint_rollback(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {}", name)
    }
}

/// True when the aggregate+union/having rewrite rule applies (§4.1): an
/// aggregate together with any union or having clause.
fn needs_aggregate_rewrite(ir: &QueryIR) -> bool {
    ir.aggregate.is_some() && (!ir.unions.is_empty() || !ir.havings.is_empty())
}

/// Strips a single leading `and `/`or ` (case-insensitive) from a compiled
/// where/having fragment.
pub fn remove_leading_boolean(sql: &str) -> &str {
    let trimmed = sql.trim_start();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("and ") {
        trimmed[4..].trim_start()
    } else if lower.starts_with("or ") {
        trimmed[3..].trim_start()
    } else {
        trimmed
    }
}

fn variant_name(w: &WhereIR) -> &'static str {
    match w {
        WhereIR::Basic { .. } => "Basic",
        WhereIR::In { .. } => "In",
        WhereIR::InSub { .. } => "InSub",
        WhereIR::InRaw { .. } => "InRaw",
        WhereIR::Null { .. } => "Null",
        WhereIR::Between { .. } => "Between",
        WhereIR::BetweenColumns { .. } => "BetweenColumns",
        WhereIR::Column { .. } => "Column",
        WhereIR::DateBased { .. } => "DateBased",
        WhereIR::Exists { .. } => "Exists",
        WhereIR::Nested { .. } => "Nested",
        WhereIR::Sub { .. } => "Sub",
        WhereIR::Raw { .. } => "Raw",
        WhereIR::Fulltext { .. } => "Fulltext",
        WhereIR::JsonContains { .. } => "JsonContains",
        WhereIR::JsonContainsKey { .. } => "JsonContainsKey",
        WhereIR::JsonLength { .. } => "JsonLength",
        WhereIR::RowValues { .. } => "RowValues",
        WhereIR::Expression { .. } => "Expression",
        WhereIR::Bitwise { .. } => "Bitwise",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_and() {
        assert_eq!(remove_leading_boolean("and \"id\" = ?"), "\"id\" = ?");
    }

    #[test]
    fn strips_leading_or() {
        assert_eq!(remove_leading_boolean("or \"id\" = ?"), "\"id\" = ?");
    }

    #[test]
    fn leaves_unprefixed_alone() {
        assert_eq!(remove_leading_boolean("\"id\" = ?"), "\"id\" = ?");
    }
}
