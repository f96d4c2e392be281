//! `lihtne-core` — the dialect-independent query IR, fluent builder and base
//! grammar shared by every `lihtne-*` dialect crate.

pub mod builder;
pub mod connection;
pub mod cursor;
pub mod dialect;
pub mod error;
pub mod expression;
pub mod grammar;
pub mod identifier;
pub mod ir;
pub mod json_path;
pub mod paginator;
pub mod processor;
pub mod tracing;
pub mod value;

pub mod prelude {
    pub use crate::builder::{Builder, JoinBuilder};
    pub use crate::connection::{Connection, Row};
    pub use crate::cursor::Cursor;
    pub use crate::dialect::Dialect;
    pub use crate::error::{LihtneError, Result};
    pub use crate::expression::Expression;
    pub use crate::grammar::{Grammar, GrammarConfig, InsertRow};
    pub use crate::identifier::Identifier;
    pub use crate::ir::*;
    pub use crate::json_path::JsonPath;
    pub use crate::paginator::{CursorPaginator, LengthAwarePaginator};
    pub use crate::processor::{AnsiProcessor, Processor};
    pub use crate::value::Value;
}
