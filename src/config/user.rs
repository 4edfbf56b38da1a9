use super::schema::{default_statement_timeout, is_schema_name_valid, DEFAULT_STATEMENT_TIMEOUT};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "write", alias = "readwrite")]
    Write,
}

/// A schema the user should get access to.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SchemaPermission {
    pub name: String,
    pub permission: Permission,
}

/// User declaration.
///
/// For example:
///
/// ```yaml
/// user:
///   email: user@example.com
///   business_schemas:
///     - dwh1
///   schemas:
///     - name: dwh2
///       permission: read
///     - name: dwh3
///       permission: write
///   disabled: false
/// ```
///
/// `business_schemas` is the older read-only list; it is merged with the
/// `read` entries of `schemas`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub email: String,
    #[serde(default)]
    pub business_schemas: Vec<String>,
    #[serde(default)]
    pub schemas: Vec<SchemaPermission>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub reset_password: bool,
    #[serde(default)]
    pub reset_mfa: bool,
    #[serde(default)]
    pub person_type: bool,
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout: u64,
}

impl User {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            business_schemas: vec![],
            schemas: vec![],
            disabled: false,
            reset_password: false,
            reset_mfa: false,
            person_type: false,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Schemas the user reads, legacy list first, without duplicates.
    pub fn read_only_schema_names(&self) -> Vec<String> {
        let names = self
            .business_schemas
            .iter()
            .cloned()
            .chain(self.schema_names_by_permission(Permission::Read));
        unique(names)
    }

    pub fn write_schema_names(&self) -> Vec<String> {
        unique(self.schema_names_by_permission(Permission::Write))
    }

    fn schema_names_by_permission(
        &self,
        permission: Permission,
    ) -> impl Iterator<Item = String> + '_ {
        self.schemas
            .iter()
            .filter(move |s| s.permission == permission)
            .map(|s| s.name.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            return Err(anyhow!("user email is empty"));
        }

        let names = self
            .business_schemas
            .iter()
            .chain(self.schemas.iter().map(|s| &s.name));
        for name in names {
            if !is_schema_name_valid(name) {
                return Err(anyhow!(
                    "invalid schema name \"{}\" in user \"{}\": schema name can only contain alphanumeric characters and underscores",
                    name,
                    self.email
                ));
            }
        }

        Ok(())
    }
}

fn unique(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut result: Vec<String> = vec![];
    for name in names {
        if !result.contains(&name) {
            result.push(name);
        }
    }
    result
}
