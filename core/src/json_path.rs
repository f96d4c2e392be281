//! [`JsonPath`] — a `col->a->b[0]` selector, parsed once and handed to the
//! grammar for dialect-specific translation.

/// One segment of a JSON path: either a key (`->name`) or an array index
/// (`[n]`).
#[derive(Debug, Clone, PartialEq)]
pub enum JsonPathSegment {
    Key(String),
    Index(i64),
}

/// A parsed `column->path->segments[n]` selector. The first `->`-delimited
/// piece is the column; everything after becomes the JSON path.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    pub column: String,
    pub segments: Vec<JsonPathSegment>,
}

impl JsonPath {
    /// Parses `raw` if it contains `->`, otherwise returns `None` (callers
    /// should treat it as a plain column/identifier).
    pub fn parse(raw: &str) -> Option<Self> {
        if !raw.contains("->") {
            return None;
        }
        let mut parts = raw.split("->");
        let column = parts.next().unwrap_or_default().to_string();
        let mut segments = Vec::new();
        for part in parts {
            segments.extend(parse_segment(part));
        }
        Some(JsonPath { column, segments })
    }

    /// Renders the path as a dot-delimited string with `[n]` array markers,
    /// e.g. `a.b[0]` — the form most grammars embed inside a JSON function
    /// literal path argument.
    pub fn dotted(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                JsonPathSegment::Key(k) => {
                    if i > 0 {
                        out.push('.');
                    }
                    out.push_str(k);
                }
                JsonPathSegment::Index(n) => {
                    out.push('[');
                    out.push_str(&n.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

fn parse_segment(part: &str) -> Vec<JsonPathSegment> {
    let mut segments = Vec::new();
    let mut key = String::new();
    let mut chars = part.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '[' {
            if !key.is_empty() {
                segments.push(JsonPathSegment::Key(std::mem::take(&mut key)));
            }
            let mut idx = String::new();
            for c2 in chars.by_ref() {
                if c2 == ']' {
                    break;
                }
                idx.push(c2);
            }
            if let Ok(n) = idx.parse::<i64>() {
                segments.push(JsonPathSegment::Index(n));
            }
        } else {
            key.push(c);
        }
    }
    if !key.is_empty() {
        segments.push(JsonPathSegment::Key(key));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_path() {
        let p = JsonPath::parse("options->name").unwrap();
        assert_eq!(p.column, "options");
        assert_eq!(p.segments, vec![JsonPathSegment::Key("name".into())]);
    }

    #[test]
    fn parses_index() {
        let p = JsonPath::parse("items->list[0]->id").unwrap();
        assert_eq!(p.column, "items");
        assert_eq!(
            p.segments,
            vec![
                JsonPathSegment::Key("list".into()),
                JsonPathSegment::Index(0),
                JsonPathSegment::Key("id".into()),
            ]
        );
    }

    #[test]
    fn no_arrow_is_none() {
        assert!(JsonPath::parse("plain_column").is_none());
    }
}
