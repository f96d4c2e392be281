//! [`OrderIR`] — one ORDER BY term.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderIR {
    pub column: Option<String>,
    pub direction: Direction,
    pub raw: Option<String>,
}

impl OrderIR {
    pub fn column(column: impl Into<String>, direction: Direction) -> Self {
        OrderIR {
            column: Some(column.into()),
            direction,
            raw: None,
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        OrderIR {
            column: None,
            direction: Direction::Asc,
            raw: Some(sql.into()),
        }
    }
}
