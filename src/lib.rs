//! `lihtne` is a multi-dialect SQL query builder: a fluent API that
//! accumulates a dialect-independent representation of a query, compiled by
//! a per-dialect [`Grammar`](lihtne_core::grammar::Grammar) into parameterised
//! SQL plus an ordered binding list.
//!
//! This crate is a thin facade over [`lihtne_core`] and the per-dialect
//! crates, enabled with the `mysql`, `postgres`, `sqlite` and `mssql`
//! features (all on by default).

pub use lihtne_core::*;

#[cfg(feature = "mysql")]
pub use lihtne_mysql as mysql;

#[cfg(feature = "postgres")]
pub use lihtne_postgres as postgres;

#[cfg(feature = "sqlite")]
pub use lihtne_sqlite as sqlite;

#[cfg(feature = "mssql")]
pub use lihtne_mssql as mssql;

/// Re-exports the core builder/IR types plus whichever dialect grammars are
/// enabled, so `use lihtne::prelude::*;` is enough for most callers.
pub mod prelude {
    pub use lihtne_core::prelude::*;

    #[cfg(feature = "mysql")]
    pub use lihtne_mysql::{MySqlGrammar, MySqlProcessor};

    #[cfg(feature = "postgres")]
    pub use lihtne_postgres::{PostgresGrammar, PostgresProcessor};

    #[cfg(feature = "sqlite")]
    pub use lihtne_sqlite::{SqliteGrammar, SqliteProcessor};

    #[cfg(feature = "mssql")]
    pub use lihtne_mssql::{MsSqlGrammar, MsSqlProcessor};
}
