//! [`MsSqlGrammar`] — bracket quoting, `top`/`offset ... fetch next` paging,
//! lock hints embedded in `from`, `merge` upsert, `openjson`/`json_value`
//! JSON support, `SAVE TRANSACTION` savepoints (§4.2).

use lihtne_core::error::{LihtneError, Result};
use lihtne_core::grammar::{Grammar, GrammarConfig, InsertRow};
use lihtne_core::identifier::{escape_by_doubling, Identifier};
use lihtne_core::ir::*;
use lihtne_core::json_path::{JsonPath, JsonPathSegment};
use lihtne_core::value::Value;

#[derive(Debug, Clone, Default)]
pub struct MsSqlGrammar {
    pub config: GrammarConfig,
}

impl MsSqlGrammar {
    pub fn new(config: GrammarConfig) -> Self {
        MsSqlGrammar { config }
    }
}

fn json_path_literal(path: &JsonPath) -> String {
    let mut out = String::from("$");
    for seg in &path.segments {
        match seg {
            JsonPathSegment::Key(k) => out.push_str(&format!(".\"{}\"", k)),
            JsonPathSegment::Index(n) => out.push_str(&format!("[{}]", n)),
        }
    }
    out
}

impl Grammar for MsSqlGrammar {
    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn date_format(&self) -> &str {
        "%Y-%m-%d %H:%M:%S%.3f"
    }

    fn wrap_value(&self, segment: &str) -> String {
        if segment == "*" {
            return "*".to_string();
        }
        format!("[{}]", escape_by_doubling(segment, ']'))
    }

    fn compile_random(&self, _seed: Option<&str>) -> String {
        "NEWID()".to_string()
    }

    fn compile_join_lateral(&self, join: &JoinIR) -> Result<String> {
        let table = self.wrap_from_source(&join.table)?;
        let on = self.compile_where_list(&join.on, "on")?;
        let mut out = format!("outer apply {}", table);
        if !on.is_empty() {
            out = format!("{} {}", out, on);
        }
        Ok(out)
    }

    /// Lock hints live on the `from` clause, not as a trailing fragment
    /// (§4.2 "compileLock (SQL Server)").
    fn compile_lock(&self, _ir: &QueryIR) -> Result<String> {
        Ok(String::new())
    }

    fn compile_from(&self, ir: &QueryIR) -> Result<String> {
        let Some(from) = &ir.from else {
            return Ok(String::new());
        };
        let base = format!("from {}", self.wrap_from_source(from)?);
        let hint = match &ir.lock {
            None => String::new(),
            Some(Lock::ForUpdate) => " with(rowlock,updlock,holdlock)".to_string(),
            Some(Lock::ForShare) => " with(rowlock,holdlock)".to_string(),
            Some(Lock::Raw(s)) => format!(" {}", s),
        };
        Ok(format!("{}{}", base, hint))
    }

    fn compile_index_hint(&self, ir: &QueryIR) -> Result<String> {
        match &ir.index_hint {
            Some(hint) => Ok(format!("with (index({}))", hint.index)),
            None => Ok(String::new()),
        }
    }

    /// Full select override: `top N` sits right after `select`, and
    /// `offset ... fetch next` is a trailing pair synthesising `order by
    /// (SELECT 0)` when the query has none (§4.2 "compileLimit/Offset
    /// (SQL Server)").
    fn compile_select(&self, ir: &QueryIR) -> Result<String> {
        if ir.aggregate.is_some() && (!ir.unions.is_empty() || !ir.havings.is_empty()) {
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
            let select_kw = match &effective.distinct {
                Distinct::No => "select",
                Distinct::Yes | Distinct::Columns(_) => "select distinct",
            };
            let mut head = select_kw.to_string();
            if effective.offset.is_none() {
                if let Some(n) = effective.limit {
                    if n > 0 {
                        head.push_str(&format!(" top {}", n));
                    }
                }
            }
            let cols = effective
                .columns
                .iter()
                .map(|c| self.compile_column_item(c))
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            fragments.push(format!("{} {}", head, cols));
        }

        for frag in [
            self.compile_from(&effective)?,
            self.compile_index_hint(&effective)?,
            self.compile_joins(&effective)?,
            self.compile_wheres(&effective)?,
            self.compile_groups(&effective)?,
            self.compile_havings(&effective)?,
        ] {
            if !frag.is_empty() {
                fragments.push(frag);
            }
        }

        let orders_sql = if effective.orders.is_empty() && effective.offset.is_some() {
            "order by (SELECT 0)".to_string()
        } else {
            self.compile_order_list(&effective.orders)?
        };
        if !orders_sql.is_empty() {
            fragments.push(orders_sql);
        }

        if let Some(offset) = effective.offset {
            let mut clause = format!("offset {} rows", offset);
            if let Some(limit) = effective.limit {
                if limit > 0 {
                    clause.push_str(&format!(" fetch next {} rows only", limit));
                }
            }
            fragments.push(clause);
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

    fn compile_json_selector(&self, path: &JsonPath) -> Result<String> {
        let col_sql = self.wrap(&Identifier::parse(&path.column));
        if path.segments.is_empty() {
            return Ok(col_sql);
        }
        Ok(format!("json_value({}, '{}')", col_sql, json_path_literal(path)))
    }

    fn compile_json_contains(&self, col: &str, _val: &Value) -> Result<String> {
        let col_sql = match JsonPath::parse(col) {
            Some(path) => self.wrap(&Identifier::parse(&path.column)),
            None => self.wrap(&Identifier::parse(col)),
        };
        Ok(format!("exists (select 1 from openjson({}) where [value] = ?)", col_sql))
    }

    fn compile_json_contains_key(&self, col: &str) -> Result<String> {
        let Some(path) = JsonPath::parse(col) else {
            return Err(LihtneError::invalid_argument(
                "whereJsonContainsKey requires a `col->key` selector",
            ));
        };
        let col_sql = self.wrap(&Identifier::parse(&path.column));
        let Some(last) = path.segments.last() else {
            return Err(LihtneError::invalid_argument(
                "whereJsonContainsKey requires at least one path segment",
            ));
        };
        let key = match last {
            JsonPathSegment::Key(k) => k.clone(),
            JsonPathSegment::Index(n) => n.to_string(),
        };
        Ok(format!("exists (select 1 from openjson({}) where [key] = '{}')", col_sql, key))
    }

    fn compile_json_length(&self, col: &str, op: &str, val: &Value) -> Result<String> {
        let base = match JsonPath::parse(col) {
            Some(path) if !path.segments.is_empty() => {
                format!("json_query({}, '{}')", self.wrap(&Identifier::parse(&path.column)), json_path_literal(&path))
            }
            _ => self.wrap(&Identifier::parse(col)),
        };
        Ok(format!("(select count(*) from openjson({})) {} {}", base, op, self.parameter(val)))
    }

    fn compile_json_update_assignment(&self, col: &str, path_segments: &str, val: &Value) -> Result<String> {
        let col_sql = self.wrap(&Identifier::parse(col));
        let literal = if path_segments.is_empty() {
            "$".to_string()
        } else {
            format!(
                "${}",
                path_segments
                    .split('.')
                    .map(|seg| {
                        if let Some(idx) = seg.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                            format!("[{}]", idx)
                        } else {
                            format!(".\"{}\"", seg)
                        }
                    })
                    .collect::<String>()
            )
        };
        Ok(format!(
            "{} = json_modify({}, '{}', {})",
            col_sql,
            col_sql,
            literal,
            self.parameter(val)
        ))
    }

    fn supports_upsert(&self) -> bool {
        true
    }

    fn compile_upsert(&self, table: &str, rows: &[InsertRow], unique_by: &[String], update: &[String]) -> Result<String> {
        if rows.is_empty() || rows.iter().all(|r| r.is_empty()) {
            return Err(LihtneError::invalid_argument("upsert requires at least one row"));
        }
        let table_sql = self.wrap_table_name(table);
        let target_alias = "t";
        let source_alias = "lihtne_source";
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
                .map(|c| row.iter().find(|(rc, _)| rc == c).map(|(_, v)| v).unwrap_or(&Value::Null))
                .collect();
            let params = vals.iter().map(|v| self.parameter(v)).collect::<Vec<_>>().join(", ");
            value_groups.push(format!("({})", params));
        }
        let on_clause = unique_by
            .iter()
            .map(|c| {
                let wrapped = self.wrap(&Identifier::parse(c));
                format!("{}.{} = {}.{}", target_alias, wrapped, source_alias, wrapped)
            })
            .collect::<Vec<_>>()
            .join(" and ");
        let update_clause = update
            .iter()
            .map(|c| {
                let wrapped = self.wrap(&Identifier::parse(c));
                format!("{} = {}.{}", wrapped, source_alias, wrapped)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let insert_vals = columns
            .iter()
            .map(|c| format!("{}.{}", source_alias, self.wrap(&Identifier::parse(c))))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "merge into {} as {} using (values {}) as {} ({}) on {} when matched then update set {} when not matched then insert ({}) values ({});",
            table_sql,
            target_alias,
            value_groups.join(", "),
            source_alias,
            cols_sql,
            on_clause,
            update_clause,
            cols_sql,
            insert_vals
        ))
    }

    fn compile_update_with_joins(&self, ir: &QueryIR, table: &str, values: &[(String, Value)]) -> Result<String> {
        let alias = Identifier::parse(table).last_segment().to_string();
        let alias_sql = self.wrap_value(&alias);
        let table_sql = self.wrap_table_name(table);
        let assignments = self.compile_assignments(values)?;
        let joins = self.compile_joins(ir)?;
        let mut sql = format!("update {} set {} from {} as {}", alias_sql, assignments, table_sql, alias_sql);
        if !joins.is_empty() {
            sql = format!("{} {}", sql, joins);
        }
        let wheres = self.compile_wheres(ir)?;
        if !wheres.is_empty() {
            sql = format!("{} {}", sql, wheres);
        }
        Ok(sql)
    }

    fn compile_delete_with_joins(&self, ir: &QueryIR, table: &str) -> Result<String> {
        let alias = Identifier::parse(table).last_segment().to_string();
        let alias_sql = self.wrap_value(&alias);
        let table_sql = self.wrap_table_name(table);
        let joins = self.compile_joins(ir)?;
        let mut sql = format!("delete {} from {} as {}", alias_sql, table_sql, alias_sql);
        if !joins.is_empty() {
            sql = format!("{} {}", sql, joins);
        }
        let wheres = self.compile_wheres(ir)?;
        if !wheres.is_empty() {
            sql = format!("{} {}", sql, wheres);
        }
        Ok(sql)
    }

    fn compile_savepoint(&self, name: &str) -> String {
        format!("SAVE TRANSACTION {}", name)
    }

    fn compile_savepoint_rollback(&self, name: &str) -> String {
        format!("ROLLBACK TRANSACTION {}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> MsSqlGrammar {
        MsSqlGrammar::new(GrammarConfig::default())
    }

    #[test]
    fn limit_offset_synthesises_order_by() {
        let mut ir = QueryIR::default();
        ir.from = Some(FromSource::table("users"));
        ir.set_limit(10);
        ir.set_offset(10);
        let sql = grammar().compile_select(&ir).unwrap();
        assert_eq!(
            sql,
            "select * from [users] order by (SELECT 0) offset 10 rows fetch next 10 rows only"
        );
    }

    #[test]
    fn top_only_when_no_offset() {
        let mut ir = QueryIR::default();
        ir.from = Some(FromSource::table("users"));
        ir.set_limit(5);
        let sql = grammar().compile_select(&ir).unwrap();
        assert_eq!(sql, "select top 5 * from [users]");
    }

    #[test]
    fn empty_insert_uses_default_values() {
        let sql = grammar().compile_insert("users", &[]).unwrap();
        assert_eq!(sql, "insert into [users] default values");
    }

    #[test]
    fn savepoint_uses_save_transaction() {
        assert_eq!(grammar().compile_savepoint("sp1"), "SAVE TRANSACTION sp1");
    }
}
