//! [`Value`] — the tagged union of scalars carried across the builder API.

use crate::ir::QueryIR;
use core::cmp::Ordering;
use core::fmt;

/// A value flowing through the query builder: a scalar, a raw SQL fragment
/// that bypasses parameterisation, or a subquery whose bindings are spliced
/// into the caller's bag.
///
/// `DateTime` values carry the *already formatted* string; the grammar picks
/// the format (`Grammar::date_format`) at the point the caller's date value
/// is lowered into a `Value::DateTime`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(String),
    Bytes(Vec<u8>),
    /// SQL emitted verbatim; contributes zero bindings (invariant §3.6).
    Raw(String),
    /// A nested query whose SQL is inlined and whose bindings are merged.
    Sub(Box<QueryIR>),
}

impl Value {
    pub fn raw(sql: impl Into<String>) -> Self {
        Value::Raw(sql.into())
    }

    pub fn sub(ir: QueryIR) -> Self {
        Value::Sub(Box::new(ir))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Value::Raw(_))
    }

    pub fn as_sub(&self) -> Option<&QueryIR> {
        match self {
            Value::Sub(ir) => Some(ir),
            _ => None,
        }
    }

    /// Renders a scalar value as a literal for `toRawSql`-style substitution,
    /// via the supplied escape function (which is dialect/connection
    /// specific). Raw and Sub values are not literals and panic if asked;
    /// callers must special-case them before calling this.
    pub fn render_literal(&self, escape: &dyn Fn(&Value) -> String) -> String {
        escape(self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::DateTime(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Raw(s) => write!(f, "{}", s),
            Value::Sub(_) => write!(f, "(subquery)"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}
impl_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Orders two values using Laravel-style loose "is this an ordered scalar"
/// comparisons; used only by cursor pagination's lexicographic comparisons
/// over the *original* caller-supplied values (never over Raw or Sub).
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}
