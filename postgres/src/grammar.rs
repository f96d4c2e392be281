//! [`PostgresGrammar`] — `jsonb` operators, `on conflict` upsert, `ctid`
//! rewrites for joined update/delete, `to_tsvector` fulltext (§4.2).

use lihtne_core::error::{LihtneError, Result};
use lihtne_core::grammar::{Grammar, GrammarConfig, InsertRow};
use lihtne_core::identifier::Identifier;
use lihtne_core::ir::{FulltextMode, FulltextOptions, JoinIR, QueryIR};
use lihtne_core::json_path::{JsonPath, JsonPathSegment};
use lihtne_core::value::Value;

#[derive(Debug, Clone, Default)]
pub struct PostgresGrammar {
    pub config: GrammarConfig,
}

impl PostgresGrammar {
    pub fn new(config: GrammarConfig) -> Self {
        PostgresGrammar { config }
    }
}

/// Converts a dotted `JsonPath::dotted()` rendering (`a.b[0]`) into
/// Postgres' brace path-array literal (`{a,b,0}`).
fn path_array(path_segments: &str) -> String {
    let normalized = path_segments.replace('[', ".").replace(']', "");
    let parts: Vec<&str> = normalized.split('.').filter(|s| !s.is_empty()).collect();
    format!("{{{}}}", parts.join(","))
}

impl Grammar for PostgresGrammar {
    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn compile_join_lateral(&self, join: &JoinIR) -> Result<String> {
        let table = self.wrap_from_source(&join.table)?;
        let on = self.compile_where_list(&join.on, "on")?;
        let mut out = format!("join lateral {}", table);
        if !on.is_empty() {
            out = format!("{} {}", out, on);
        }
        Ok(out)
    }

    fn compile_json_selector(&self, path: &JsonPath) -> Result<String> {
        let col_sql = self.wrap(&Identifier::parse(&path.column));
        if path.segments.is_empty() {
            return Ok(col_sql);
        }
        let n = path.segments.len();
        let mut expr = col_sql;
        for (i, seg) in path.segments.iter().enumerate() {
            let op = if i == n - 1 { "->>" } else { "->" };
            expr = match seg {
                JsonPathSegment::Key(k) => format!("{}{}'{}'", expr, op, k),
                JsonPathSegment::Index(idx) => format!("{}{}{}", expr, op, idx),
            };
        }
        Ok(expr)
    }

    fn compile_json_contains(&self, col: &str, _val: &Value) -> Result<String> {
        let col_sql = match JsonPath::parse(col) {
            Some(path) => self.wrap(&Identifier::parse(&path.column)),
            None => self.wrap(&Identifier::parse(col)),
        };
        Ok(format!("({})::jsonb @> ?", col_sql))
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
        let mut expr = format!("({})::jsonb", col_sql);
        for seg in &path.segments[..path.segments.len() - 1] {
            expr = match seg {
                JsonPathSegment::Key(k) => format!("{}->'{}'", expr, k),
                JsonPathSegment::Index(n) => format!("{}->{}", expr, n),
            };
        }
        Ok(format!("coalesce({} ?? '{}', false)", expr, key))
    }

    fn compile_json_length(&self, col: &str, op: &str, val: &Value) -> Result<String> {
        let col_sql = match JsonPath::parse(col) {
            Some(path) => self.compile_json_selector(&path)?,
            None => self.wrap(&Identifier::parse(col)),
        };
        Ok(format!("jsonb_array_length(({})::jsonb) {} {}", col_sql, op, self.parameter(val)))
    }

    fn compile_json_update_assignment(&self, col: &str, path_segments: &str, val: &Value) -> Result<String> {
        let col_sql = self.wrap(&Identifier::parse(col));
        let arr = path_array(path_segments);
        Ok(format!(
            "{} = jsonb_set(coalesce({}, '{{}}'::jsonb), '{}', to_jsonb({}))",
            col_sql,
            col_sql,
            arr,
            self.parameter(val)
        ))
    }

    fn supports_fulltext(&self) -> bool {
        true
    }

    fn compile_fulltext(&self, cols: &[String], _value: &str, opts: &FulltextOptions) -> Result<String> {
        let lang = opts.language.as_deref().unwrap_or("english");
        let cols_sql = cols
            .iter()
            .map(|c| self.wrap(&Identifier::parse(c)))
            .collect::<Vec<_>>()
            .join(" || ' ' || ");
        let func = match opts.mode {
            FulltextMode::Phrase => "phraseto_tsquery",
            FulltextMode::Websearch => "websearch_to_tsquery",
            _ => "plainto_tsquery",
        };
        Ok(format!(
            "to_tsvector('{}', {}) @@ {}('{}', ?)",
            lang, cols_sql, func, lang
        ))
    }

    fn supports_upsert(&self) -> bool {
        true
    }

    fn compile_upsert(&self, table: &str, rows: &[InsertRow], unique_by: &[String], update: &[String]) -> Result<String> {
        let insert_sql = self.compile_insert(table, rows)?;
        let conflict_cols = unique_by
            .iter()
            .map(|c| self.wrap(&Identifier::parse(c)))
            .collect::<Vec<_>>()
            .join(", ");
        if update.is_empty() {
            return Ok(format!("{} on conflict ({}) do nothing", insert_sql, conflict_cols));
        }
        let assignments = update
            .iter()
            .map(|c| {
                let wrapped = self.wrap(&Identifier::parse(c));
                format!("{} = \"excluded\".{}", wrapped, wrapped)
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "{} on conflict ({}) do update set {}",
            insert_sql, conflict_cols, assignments
        ))
    }

    fn compile_insert_or_ignore(&self, table: &str, rows: &[InsertRow]) -> Result<String> {
        let insert_sql = self.compile_insert(table, rows)?;
        Ok(format!("{} on conflict do nothing", insert_sql))
    }

    fn compile_update_with_joins(&self, ir: &QueryIR, table: &str, values: &[(String, Value)]) -> Result<String> {
        let table_sql = self.wrap_table_name(table);
        let assignments = self.compile_assignments(values)?;
        let alias_sql = self.wrap_value(Identifier::parse(table).last_segment());
        let joins = self.compile_joins(ir)?;
        let wheres = self.compile_wheres(ir)?;
        let mut inner = format!("select {}.ctid from {}", alias_sql, table_sql);
        if !joins.is_empty() {
            inner = format!("{} {}", inner, joins);
        }
        if !wheres.is_empty() {
            inner = format!("{} {}", inner, wheres);
        }
        Ok(format!(
            "update {} set {} where {}.ctid in ({})",
            table_sql, assignments, alias_sql, inner
        ))
    }

    fn compile_delete_with_joins(&self, ir: &QueryIR, table: &str) -> Result<String> {
        let table_sql = self.wrap_table_name(table);
        let alias_sql = self.wrap_value(Identifier::parse(table).last_segment());
        let joins = self.compile_joins(ir)?;
        let wheres = self.compile_wheres(ir)?;
        let mut inner = format!("select {}.ctid from {}", alias_sql, table_sql);
        if !joins.is_empty() {
            inner = format!("{} {}", inner, joins);
        }
        if !wheres.is_empty() {
            inner = format!("{} {}", inner, wheres);
        }
        Ok(format!("delete from {} where {}.ctid in ({})", table_sql, alias_sql, inner))
    }

    fn compile_update_from(&self, ir: &QueryIR, table: &str, values: &[(String, Value)]) -> Result<String> {
        if ir.joins.is_empty() {
            return Err(LihtneError::invalid_argument(
                "updateFrom requires at least one join describing the additional from source",
            ));
        }
        let table_sql = self.wrap_table_name(table);
        let assignments = self.compile_assignments(values)?;
        let mut froms = Vec::new();
        let mut on_wheres = Vec::new();
        for j in &ir.joins {
            froms.push(self.wrap_from_source(&j.table)?);
            on_wheres.extend(j.on.clone());
        }
        on_wheres.extend(ir.wheres.clone());
        let where_sql = self.compile_where_list(&on_wheres, "where")?;
        let mut sql = format!("update {} set {} from {}", table_sql, assignments, froms.join(", "));
        if !where_sql.is_empty() {
            sql = format!("{} {}", sql, where_sql);
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lihtne_core::ir::FromSource;

    fn grammar() -> PostgresGrammar {
        PostgresGrammar::new(GrammarConfig::default())
    }

    #[test]
    fn json_contains() {
        let mut ir = QueryIR::default();
        ir.from = Some(FromSource::table("users"));
        ir.wheres.push(lihtne_core::ir::WhereIR::JsonContains {
            col: "options".to_string(),
            val: Value::Str("{}".to_string()),
            not: false,
            boolean: lihtne_core::ir::BoolOp::And,
        });
        let sql = grammar().compile_select(&ir).unwrap();
        assert_eq!(sql, "select * from \"users\" where (\"options\")::jsonb @> ?");
    }

    #[test]
    fn upsert_on_conflict() {
        let rows = vec![
            vec![
                ("email".to_string(), Value::Str("foo".to_string())),
                ("name".to_string(), Value::Str("bar".to_string())),
            ],
            vec![
                ("email".to_string(), Value::Str("foo2".to_string())),
                ("name".to_string(), Value::Str("bar2".to_string())),
            ],
        ];
        let sql = grammar()
            .compile_upsert("users", &rows, &["email".to_string()], &["email".to_string(), "name".to_string()])
            .unwrap();
        assert_eq!(
            sql,
            "insert into \"users\" (\"email\", \"name\") values (?, ?), (?, ?) on conflict (\"email\") do update set \"email\" = \"excluded\".\"email\", \"name\" = \"excluded\".\"name\""
        );
    }

    #[test]
    fn json_selector_chain() {
        let path = JsonPath::parse("col->a->b").unwrap();
        assert_eq!(grammar().compile_json_selector(&path).unwrap(), "\"col\"->'a'->>'b'");
    }
}
