//! [`Dialect`] — a runtime tag identifying which concrete [`crate::grammar::Grammar`]
//! a caller is targeting. The grammars themselves are dispatched statically
//! (dialect crates each expose their own `Grammar` type); this enum exists
//! for callers that need to branch on "which dialect am I compiling for"
//! without downcasting a `dyn Grammar` (diagnostics, config loading,
//! connection factories).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    MySql,
    MariaDb,
    Postgres,
    Sqlite,
    SqlServer,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::MariaDb => "mariadb",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::SqlServer => "sqlserver",
        }
    }

    /// MariaDB shares MySQL's grammar entirely except it refuses lateral
    /// joins (§4.2 "lateral joins... MariaDB and SQLite raise").
    pub fn supports_lateral_joins(self) -> bool {
        !matches!(self, Dialect::MariaDb | Dialect::Sqlite)
    }
}
