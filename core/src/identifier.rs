//! [`Identifier`] — a dotted, optionally-aliased column/table reference.

/// A string that may contain zero or more dotted path segments
/// (`schema.table.column`) and at most one ` as ` alias.
///
/// Parsing is intentionally dumb: it splits on `.` and on the literal
/// (case-insensitive) ` as ` separator. Grammars are responsible for
/// wrapping each segment per-dialect; `*` is recognised here so grammars can
/// skip wrapping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub segments: Vec<String>,
    pub alias: Option<String>,
}

impl Identifier {
    pub fn parse(raw: &str) -> Self {
        let (path, alias) = split_alias(raw);
        let segments = path.split('.').map(|s| s.to_string()).collect();
        Identifier { segments, alias }
    }

    /// A single bare segment with no dots and no alias.
    pub fn simple(name: impl Into<String>) -> Self {
        Identifier {
            segments: vec![name.into()],
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn last_segment(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    pub fn is_star(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == "*"
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::parse(s)
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier::parse(&s)
    }
}

/// Splits `"foo.bar as baz"` into (`"foo.bar"`, `Some("baz")`), matching on
/// the literal, case-insensitive ` as ` separator. Only the first occurrence
/// is honoured.
fn split_alias(raw: &str) -> (&str, Option<String>) {
    let lower = raw.to_ascii_lowercase();
    if let Some(idx) = lower.find(" as ") {
        let (path, rest) = raw.split_at(idx);
        let alias = rest[4..].trim();
        (path.trim(), Some(alias.to_string()))
    } else {
        (raw.trim(), None)
    }
}

/// Doubles any occurrence of `ch` inside `s` — the escaping rule used by
/// every dialect's identifier wrapping for embedded quote characters.
pub fn escape_by_doubling(s: &str, ch: char) -> String {
    if !s.contains(ch) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c == ch {
            out.push(ch);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_path() {
        let id = Identifier::parse("schema.table.column");
        assert_eq!(id.segments, vec!["schema", "table", "column"]);
        assert_eq!(id.alias, None);
    }

    #[test]
    fn parses_alias() {
        let id = Identifier::parse("users as u");
        assert_eq!(id.segments, vec!["users"]);
        assert_eq!(id.alias.as_deref(), Some("u"));
    }

    #[test]
    fn star_passthrough() {
        let id = Identifier::parse("*");
        assert!(id.is_star());
    }

    #[test]
    fn doubles_embedded_quotes() {
        assert_eq!(escape_by_doubling(r#"a"b"#, '"'), r#"a""b"#);
        assert_eq!(escape_by_doubling("plain", '"'), "plain");
    }
}
