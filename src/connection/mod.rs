use crate::error::Result;
use std::collections::HashMap;

pub mod dryrun;
pub mod snowflake;
pub mod sql;
#[cfg(test)]
pub(crate) mod testing;

pub use dryrun::DryRunConnection;
pub use snowflake::SnowflakeConnection;

/// One result row, keyed by lower-cased column name.
pub type Row = HashMap<String, String>;

/// The statement execution boundary the manager talks to.
///
/// Both calls block until the warehouse answers. Failures come back as
/// [crate::Error::Execution] carrying the SQL text.
pub trait Connection {
    /// Execute a statement, dropping the result.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Execute a query and return its rows.
    fn fetch_rows(&mut self, sql: &str) -> Result<Vec<Row>>;

    fn quote_identifier(&self, raw: &str) -> String {
        quote_identifier(raw)
    }

    fn quote_literal(&self, raw: &str) -> String {
        quote_literal(raw)
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn execute(&mut self, sql: &str) -> Result<()> {
        (**self).execute(sql)
    }

    fn fetch_rows(&mut self, sql: &str) -> Result<Vec<Row>> {
        (**self).fetch_rows(sql)
    }
}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn execute(&mut self, sql: &str) -> Result<()> {
        (**self).execute(sql)
    }

    fn fetch_rows(&mut self, sql: &str) -> Result<Vec<Row>> {
        (**self).fetch_rows(sql)
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_identifier(raw: &str) -> String {
    format!("\"{}\"", raw.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes.
pub fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// A row of `SHOW GRANTS TO ROLE` / `SHOW GRANTS OF ROLE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grant {
    pub privilege: String,
    /// Object type the privilege is on, `ROLE` for role grants.
    pub granted_on: String,
    /// Qualified name of the object, e.g. `DB."SCHEMA"`.
    pub name: String,
    pub granted_to: String,
    pub grantee_name: String,
    pub granted_by: String,
}

impl Grant {
    pub fn from_row(row: &Row) -> Self {
        let get = |key: &str| row.get(key).cloned().unwrap_or_default();

        Self {
            privilege: get("privilege"),
            granted_on: get("granted_on"),
            name: get("name"),
            granted_to: get("granted_to"),
            grantee_name: get("grantee_name"),
            granted_by: get("granted_by"),
        }
    }
}
