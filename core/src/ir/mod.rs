//! The dialect-independent intermediate representation (§3 of the spec).

pub mod bindings;
pub mod join_ir;
pub mod order_ir;
pub mod query;
pub mod where_ir;

pub use bindings::{BindingsBag, Section};
pub use join_ir::{JoinIR, JoinKind};
pub use order_ir::{Direction, OrderIR};
pub use query::{
    Aggregate, AggregateFn, BeforeQueryCallback, ColumnItem, Distinct, FromSource, IndexHint,
    IndexHintKind, Lock, QueryIR, UnionIR,
};
pub use where_ir::{BoolOp, DateUnit, FulltextMode, FulltextOptions, HavingIR, WhereIR};
