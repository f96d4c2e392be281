//! [`SqliteGrammar`] — `json_extract`/`json_each` JSON support, merged
//! `json_patch` updates, `rowid`-based joined update/delete rewrites, no
//! lateral joins, no lock clause (§4.2).

use lihtne_core::error::{LihtneError, Result};
use lihtne_core::grammar::{Grammar, GrammarConfig, InsertRow};
use lihtne_core::identifier::Identifier;
use lihtne_core::ir::{IndexHintKind, QueryIR};
use lihtne_core::json_path::{JsonPath, JsonPathSegment};
use lihtne_core::value::Value;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, Default)]
pub struct SqliteGrammar {
    pub config: GrammarConfig,
}

impl SqliteGrammar {
    pub fn new(config: GrammarConfig) -> Self {
        SqliteGrammar { config }
    }
}

enum AssignmentPlan {
    Plain(String, Value),
    JsonMerge(String, JsonValue),
}

fn value_to_json(val: &Value) -> Result<JsonValue> {
    match val {
        Value::Null => Ok(JsonValue::Null),
        Value::Bool(b) => Ok(JsonValue::Bool(*b)),
        Value::Int(i) => Ok(serde_json::json!(*i)),
        Value::Float(f) => Ok(serde_json::json!(*f)),
        Value::Str(s) => Ok(serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone()))),
        Value::DateTime(s) => Ok(JsonValue::String(s.clone())),
        Value::Raw(s) => serde_json::from_str(s)
            .map_err(|_| LihtneError::invalid_argument("raw value merged into a JSON column must be valid JSON")),
        Value::Bytes(_) => Err(LihtneError::invalid_argument("binary values cannot be merged into a JSON column")),
        Value::Sub(_) => Err(LihtneError::invalid_argument("subquery values cannot be merged into a JSON column")),
    }
}

fn insert_path(tree: &mut JsonValue, segments: &[JsonPathSegment], val: &Value) -> Result<()> {
    if !tree.is_object() {
        *tree = JsonValue::Object(Map::new());
    }
    let mut cur = tree;
    for (i, seg) in segments.iter().enumerate() {
        let JsonPathSegment::Key(key) = seg else {
            return Err(LihtneError::unsupported(
                "SQLite JSON-path update merge does not support array index segments",
            ));
        };
        let map = cur.as_object_mut().expect("tree nodes are always objects here");
        if i == segments.len() - 1 {
            map.insert(key.clone(), value_to_json(val)?);
        } else {
            cur = map.entry(key.clone()).or_insert_with(|| JsonValue::Object(Map::new()));
        }
    }
    Ok(())
}

/// Groups `values` into plain assignments and per-base-column JSON merges,
/// preserving first-occurrence order (§4.2 "SQLite JSON-path update mix").
fn plan_assignments(values: &[(String, Value)]) -> Result<Vec<AssignmentPlan>> {
    let mut plan: Vec<AssignmentPlan> = Vec::new();
    let mut json_index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for (col, val) in values {
        if let Some(path) = JsonPath::parse(col) {
            if let Some(&idx) = json_index.get(&path.column) {
                if let AssignmentPlan::JsonMerge(_, tree) = &mut plan[idx] {
                    insert_path(tree, &path.segments, val)?;
                }
            } else {
                let mut tree = JsonValue::Object(Map::new());
                insert_path(&mut tree, &path.segments, val)?;
                json_index.insert(path.column.clone(), plan.len());
                plan.push(AssignmentPlan::JsonMerge(path.column.clone(), tree));
            }
        } else {
            plan.push(AssignmentPlan::Plain(col.clone(), val.clone()));
        }
    }
    Ok(plan)
}

impl Grammar for SqliteGrammar {
    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn compile_lock(&self, _ir: &QueryIR) -> Result<String> {
        Ok(String::new())
    }

    fn supports_lateral_joins(&self) -> bool {
        false
    }

    fn compile_index_hint(&self, ir: &QueryIR) -> Result<String> {
        match &ir.index_hint {
            Some(hint) if hint.kind == IndexHintKind::Use => Ok(format!("indexed by {}", hint.index)),
            _ => Ok(String::new()),
        }
    }

    fn compile_json_selector(&self, path: &JsonPath) -> Result<String> {
        let col_sql = self.wrap(&Identifier::parse(&path.column));
        if path.segments.is_empty() {
            return Ok(col_sql);
        }
        Ok(format!("json_extract({}, '{}')", col_sql, json_path_literal(path)))
    }

    fn compile_json_contains(&self, col: &str, _val: &Value) -> Result<String> {
        let col_sql = match JsonPath::parse(col) {
            Some(path) => self.wrap(&Identifier::parse(&path.column)),
            None => self.wrap(&Identifier::parse(col)),
        };
        Ok(format!(
            "exists (select 1 from json_each({}) where \"json_each\".\"value\" is ?)",
            col_sql
        ))
    }

    fn compile_json_contains_key(&self, col: &str) -> Result<String> {
        let Some(path) = JsonPath::parse(col) else {
            return Err(LihtneError::invalid_argument(
                "whereJsonContainsKey requires a `col->key` selector",
            ));
        };
        let col_sql = self.wrap(&Identifier::parse(&path.column));
        Ok(format!("json_type({}, '{}') is not null", col_sql, json_path_literal(&path)))
    }

    fn compile_json_length(&self, col: &str, op: &str, val: &Value) -> Result<String> {
        let sql = match JsonPath::parse(col) {
            Some(path) => format!("json_array_length({}, '{}')", self.wrap(&Identifier::parse(&path.column)), json_path_literal(&path)),
            None => format!("json_array_length({})", self.wrap(&Identifier::parse(col))),
        };
        Ok(format!("{} {} {}", sql, op, self.parameter(val)))
    }

    fn compile_assignments(&self, values: &[(String, Value)]) -> Result<String> {
        let plan = plan_assignments(values)?;
        let mut parts = Vec::with_capacity(plan.len());
        for item in &plan {
            match item {
                AssignmentPlan::Plain(col, val) => {
                    parts.push(format!("{} = {}", self.wrap(&Identifier::parse(col)), self.parameter(val)));
                }
                AssignmentPlan::JsonMerge(col, _) => {
                    let col_sql = self.wrap(&Identifier::parse(col));
                    parts.push(format!(
                        "{} = json_patch(ifnull({}, json('{{}}')), json(?))",
                        col_sql, col_sql
                    ));
                }
            }
        }
        Ok(parts.join(", "))
    }

    fn assignment_bindings(&self, values: &[(String, Value)]) -> Vec<Value> {
        let Ok(plan) = plan_assignments(values) else {
            return Vec::new();
        };
        plan.into_iter()
            .filter_map(|item| match item {
                AssignmentPlan::Plain(_, val) if !val.is_raw() => Some(val),
                AssignmentPlan::Plain(..) => None,
                AssignmentPlan::JsonMerge(_, tree) => Some(Value::Str(tree.to_string())),
            })
            .collect()
    }

    fn compile_update_with_joins(&self, ir: &QueryIR, table: &str, values: &[(String, Value)]) -> Result<String> {
        let table_sql = self.wrap_table_name(table);
        let assignments = self.compile_assignments(values)?;
        let inner = self.rowid_subquery(ir, table)?;
        Ok(format!("update {} set {} where rowid in ({})", table_sql, assignments, inner))
    }

    fn compile_delete_with_joins(&self, ir: &QueryIR, table: &str) -> Result<String> {
        let table_sql = self.wrap_table_name(table);
        let inner = self.rowid_subquery(ir, table)?;
        Ok(format!("delete from {} where rowid in ({})", table_sql, inner))
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
        Ok(insert_sql.replacen("insert into", "insert or ignore into", 1))
    }
}

impl SqliteGrammar {
    fn rowid_subquery(&self, ir: &QueryIR, table: &str) -> Result<String> {
        let table_sql = self.wrap_table_name(table);
        let joins = self.compile_joins(ir)?;
        let wheres = self.compile_wheres(ir)?;
        let mut inner = format!("select rowid from {}", table_sql);
        if !joins.is_empty() {
            inner = format!("{} {}", inner, joins);
        }
        if !wheres.is_empty() {
            inner = format!("{} {}", inner, wheres);
        }
        Ok(inner)
    }
}

fn json_path_literal(path: &JsonPath) -> String {
    let mut out = String::from("$");
    for seg in &path.segments {
        match seg {
            JsonPathSegment::Key(k) => out.push_str(&format!(".{}", k)),
            JsonPathSegment::Index(n) => out.push_str(&format!("[{}]", n)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lihtne_core::ir::{BoolOp, FromSource, WhereIR};

    fn grammar() -> SqliteGrammar {
        SqliteGrammar::new(GrammarConfig::default())
    }

    #[test]
    fn json_contains_via_json_each() {
        let mut ir = QueryIR::default();
        ir.from = Some(FromSource::table("users"));
        ir.wheres.push(WhereIR::JsonContains {
            col: "options".to_string(),
            val: Value::Str("x".to_string()),
            not: false,
            boolean: BoolOp::And,
        });
        let sql = grammar().compile_select(&ir).unwrap();
        assert_eq!(
            sql,
            "select * from \"users\" where exists (select 1 from json_each(\"options\") where \"json_each\".\"value\" is ?)"
        );
    }

    #[test]
    fn merges_json_path_updates_into_one_patch() {
        let values = vec![
            ("options->name".to_string(), Value::Str("X".to_string())),
            ("group_id".to_string(), Value::Raw("45".to_string())),
            ("options->security".to_string(), Value::Str(r#"{"level":1}"#.to_string())),
            ("options->sharing->twitter".to_string(), Value::Str("u".to_string())),
            ("created_at".to_string(), Value::DateTime("2026-01-01 00:00:00".to_string())),
        ];
        let sql = grammar().compile_assignments(&values).unwrap();
        assert_eq!(
            sql,
            "\"options\" = json_patch(ifnull(\"options\", json('{}')), json(?)), \"group_id\" = 45, \"created_at\" = ?"
        );
        let bindings = grammar().assignment_bindings(&values);
        assert_eq!(bindings.len(), 2);
        let merged: JsonValue = serde_json::from_str(match &bindings[0] {
            Value::Str(s) => s,
            _ => panic!("expected merged JSON string"),
        })
        .unwrap();
        assert_eq!(
            merged,
            serde_json::json!({"name": "X", "security": {"level": 1}, "sharing": {"twitter": "u"}})
        );
    }

    #[test]
    fn supports_lateral_is_false() {
        assert!(!grammar().supports_lateral_joins());
    }
}
