use super::{Connection, Row};
use crate::error::Result;
use ansi_term::Colour::Purple;
use log::info;

/// Forwards read-only queries to the wrapped connection but only records
/// everything else.
///
/// Reads still hit the warehouse, so a dry run sees the real state while
/// changing nothing.
pub struct DryRunConnection<C> {
    inner: C,
    statements: Vec<String>,
}

impl<C: Connection> DryRunConnection<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            statements: vec![],
        }
    }

    /// Statements that would have been executed, in order.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Connection> Connection for DryRunConnection<C> {
    fn execute(&mut self, sql: &str) -> Result<()> {
        info!("{}: {}", Purple.paint("Dry-run"), Purple.paint(sql));
        self.statements.push(sql.to_string());
        Ok(())
    }

    fn fetch_rows(&mut self, sql: &str) -> Result<Vec<Row>> {
        if is_read_only(sql) {
            self.inner.fetch_rows(sql)
        } else {
            self.execute(sql)?;
            Ok(vec![])
        }
    }

    fn quote_identifier(&self, raw: &str) -> String {
        self.inner.quote_identifier(raw)
    }

    fn quote_literal(&self, raw: &str) -> String {
        self.inner.quote_literal(raw)
    }
}

/// `SHOW`, `DESCRIBE` and `SELECT` statements change nothing.
pub(crate) fn is_read_only(sql: &str) -> bool {
    let keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase();
    matches!(keyword.as_str(), "SHOW" | "DESCRIBE" | "DESC" | "SELECT")
}
