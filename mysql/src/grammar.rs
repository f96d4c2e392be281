//! [`MySqlGrammar`] — backtick quoting, `on duplicate key update` upsert,
//! `json_*` function family, `match ... against` fulltext (§4.2).
//!
//! The same grammar backs both MySQL and MariaDB; MariaDB differs only in
//! refusing lateral joins, toggled by [`MySqlGrammar::mariadb`].

use lihtne_core::error::{LihtneError, Result};
use lihtne_core::grammar::{Grammar, GrammarConfig, InsertRow};
use lihtne_core::identifier::Identifier;
use lihtne_core::ir::{FulltextMode, FulltextOptions, JoinIR};
use lihtne_core::json_path::{JsonPath, JsonPathSegment};
use lihtne_core::value::Value;

pub const UPSERT_ALIAS: &str = "lihtne_upsert_alias";

#[derive(Debug, Clone, Default)]
pub struct MySqlGrammar {
    pub config: GrammarConfig,
    /// MariaDB refuses lateral joins; everything else is shared syntax.
    pub mariadb: bool,
}

impl MySqlGrammar {
    pub fn new(config: GrammarConfig) -> Self {
        MySqlGrammar { config, mariadb: false }
    }

    pub fn mariadb(config: GrammarConfig) -> Self {
        MySqlGrammar { config, mariadb: true }
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
}

impl Grammar for MySqlGrammar {
    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn wrap_value(&self, segment: &str) -> String {
        if segment == "*" {
            return "*".to_string();
        }
        format!("`{}`", segment.replace('`', "``"))
    }

    fn compile_join_lateral(&self, join: &JoinIR) -> Result<String> {
        if self.mariadb {
            return Err(LihtneError::unsupported("lateral joins not supported"));
        }
        let table = self.wrap_from_source(&join.table)?;
        let on = self.compile_where_list(&join.on, "on")?;
        let mut out = format!("join lateral {}", table);
        if !on.is_empty() {
            out = format!("{} {}", out, on);
        }
        Ok(out)
    }

    fn supports_lateral_joins(&self) -> bool {
        !self.mariadb
    }

    fn compile_lock(&self, ir: &lihtne_core::ir::QueryIR) -> Result<String> {
        use lihtne_core::ir::Lock;
        Ok(match &ir.lock {
            None => String::new(),
            Some(Lock::ForUpdate) => "for update".to_string(),
            Some(Lock::ForShare) => "lock in share mode".to_string(),
            Some(Lock::Raw(s)) => s.clone(),
        })
    }

    fn compile_index_hint(&self, ir: &lihtne_core::ir::QueryIR) -> Result<String> {
        use lihtne_core::ir::IndexHintKind;
        let Some(hint) = &ir.index_hint else {
            return Ok(String::new());
        };
        let keyword = match hint.kind {
            IndexHintKind::Use => "use index",
            IndexHintKind::Force => "force index",
            IndexHintKind::Ignore => "ignore index",
        };
        Ok(format!("{} ({})", keyword, hint.index))
    }

    fn supports_fulltext(&self) -> bool {
        true
    }

    fn compile_fulltext(&self, cols: &[String], value: &str, opts: &FulltextOptions) -> Result<String> {
        let cols_sql = cols
            .iter()
            .map(|c| self.wrap(&Identifier::parse(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let mode = match opts.mode {
            FulltextMode::Boolean => "in boolean mode",
            _ => "in natural language mode",
        };
        let mut sql = format!("match({}) against(? {})", cols_sql, mode);
        if opts.expand {
            sql.push_str(" with query expansion");
        }
        let _ = value;
        Ok(sql)
    }

    fn compile_json_selector(&self, path: &JsonPath) -> Result<String> {
        let col_sql = self.wrap(&Identifier::parse(&path.column));
        Ok(format!(
            "json_unquote(json_extract({}, '{}'))",
            col_sql,
            Self::json_path_literal(path)
        ))
    }

    fn compile_json_contains(&self, col: &str, _val: &Value) -> Result<String> {
        let path = JsonPath::parse(col);
        let col_sql = match &path {
            Some(p) => self.wrap(&Identifier::parse(&p.column)),
            None => self.wrap(&Identifier::parse(col)),
        };
        Ok(format!("json_contains({}, ?)", col_sql))
    }

    fn compile_json_contains_key(&self, col: &str) -> Result<String> {
        match JsonPath::parse(col) {
            Some(path) => {
                let col_sql = self.wrap(&Identifier::parse(&path.column));
                Ok(format!(
                    "json_contains_path({}, 'one', '{}')",
                    col_sql,
                    Self::json_path_literal(&path)
                ))
            }
            None => {
                let col_sql = self.wrap(&Identifier::parse(col));
                Ok(format!("json_contains_path({}, 'one', '$')", col_sql))
            }
        }
    }

    fn compile_json_length(&self, col: &str, op: &str, val: &Value) -> Result<String> {
        let sql = match JsonPath::parse(col) {
            Some(path) => {
                let col_sql = self.wrap(&Identifier::parse(&path.column));
                format!("json_length({}, '{}')", col_sql, Self::json_path_literal(&path))
            }
            None => format!("json_length({})", self.wrap(&Identifier::parse(col))),
        };
        Ok(format!("{} {} {}", sql, op, self.parameter(val)))
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
            "{} = json_set({}, '{}', {})",
            col_sql,
            col_sql,
            literal,
            self.parameter(val)
        ))
    }

    fn supports_upsert(&self) -> bool {
        true
    }

    fn compile_upsert(
        &self,
        table: &str,
        rows: &[InsertRow],
        _unique_by: &[String],
        update: &[String],
    ) -> Result<String> {
        let insert_sql = self.compile_insert(table, rows)?;
        if update.is_empty() {
            return Ok(insert_sql);
        }
        if self.config.use_upsert_alias {
            let assignments = update
                .iter()
                .map(|c| {
                    let wrapped = self.wrap(&Identifier::parse(c));
                    format!("{} = {}.{}", wrapped, self.wrap_value(UPSERT_ALIAS), wrapped)
                })
                .collect::<Vec<_>>()
                .join(", ");
            Ok(format!(
                "{} as {} on duplicate key update {}",
                insert_sql, UPSERT_ALIAS, assignments
            ))
        } else {
            let assignments = update
                .iter()
                .map(|c| {
                    let wrapped = self.wrap(&Identifier::parse(c));
                    format!("{} = values({})", wrapped, wrapped)
                })
                .collect::<Vec<_>>()
                .join(", ");
            Ok(format!("{} on duplicate key update {}", insert_sql, assignments))
        }
    }

    fn compile_insert_or_ignore(&self, table: &str, rows: &[InsertRow]) -> Result<String> {
        let insert_sql = self.compile_insert(table, rows)?;
        Ok(insert_sql.replacen("insert into", "insert ignore into", 1))
    }

    fn compile_update_with_joins(
        &self,
        ir: &lihtne_core::ir::QueryIR,
        table: &str,
        values: &[(String, Value)],
    ) -> Result<String> {
        let table_sql = self.wrap_table_name(table);
        let joins = self.compile_joins(ir)?;
        let assignments = self.compile_assignments(values)?;
        let mut sql = format!("update {} {} set {}", table_sql, joins, assignments);
        let wheres = self.compile_wheres(ir)?;
        if !wheres.is_empty() {
            sql = format!("{} {}", sql, wheres);
        }
        Ok(sql)
    }

    fn compile_delete_with_joins(&self, ir: &lihtne_core::ir::QueryIR, table: &str) -> Result<String> {
        let alias = Identifier::parse(table).last_segment().to_string();
        let table_sql = self.wrap_table_name(table);
        let joins = self.compile_joins(ir)?;
        let mut sql = format!("delete {} from {} {}", self.wrap_value(&alias), table_sql, joins);
        let wheres = self.compile_wheres(ir)?;
        if !wheres.is_empty() {
            sql = format!("{} {}", sql, wheres);
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lihtne_core::ir::QueryIR;

    fn grammar() -> MySqlGrammar {
        MySqlGrammar::new(GrammarConfig::default())
    }

    #[test]
    fn wraps_with_backticks() {
        let mut ir = QueryIR::default();
        ir.from = Some(lihtne_core::ir::FromSource::Table {
            name: "users".to_string(),
            alias: None,
        });
        let sql = grammar().compile_select(&ir).unwrap();
        assert_eq!(sql, "select * from `users`");
    }

    #[test]
    fn aliases_prefixed_table() {
        let g = MySqlGrammar::new(GrammarConfig {
            table_prefix: "prefix_".to_string(),
            use_upsert_alias: false,
        });
        let mut ir = QueryIR::default();
        ir.from = Some(lihtne_core::ir::FromSource::Table {
            name: "users as people".to_string(),
            alias: None,
        });
        let sql = g.compile_select(&ir).unwrap();
        assert_eq!(sql, "select * from `prefix_users` as `prefix_people`");
    }

    #[test]
    fn mariadb_refuses_lateral() {
        let g = MySqlGrammar::mariadb(GrammarConfig::default());
        assert!(!g.supports_lateral_joins());
    }

    #[test]
    fn json_selector_unquotes() {
        let path = JsonPath::parse("items->price").unwrap();
        assert_eq!(
            grammar().compile_json_selector(&path).unwrap(),
            "json_unquote(json_extract(`items`, '$.\"price\"'))"
        );
    }

    #[test]
    fn upsert_with_alias() {
        let g = MySqlGrammar::new(GrammarConfig {
            table_prefix: String::new(),
            use_upsert_alias: true,
        });
        let rows = vec![
            vec![
                ("email".to_string(), Value::Str("a@example.com".to_string())),
                ("name".to_string(), Value::Str("A".to_string())),
            ],
            vec![
                ("email".to_string(), Value::Str("b@example.com".to_string())),
                ("name".to_string(), Value::Str("B".to_string())),
            ],
        ];
        let sql = g
            .compile_upsert("users", &rows, &["email".to_string()], &["email".to_string(), "name".to_string()])
            .unwrap();
        assert_eq!(
            sql,
            "insert into `users` (`email`, `name`) values (?, ?), (?, ?) as lihtne_upsert_alias on duplicate key update `email` = `lihtne_upsert_alias`.`email`, `name` = `lihtne_upsert_alias`.`name`"
        );
    }
}
