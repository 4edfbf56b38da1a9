use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Default `STATEMENT_TIMEOUT_IN_SECONDS` for generated users (3 hours).
pub const DEFAULT_STATEMENT_TIMEOUT: u64 = 10800;

pub(crate) fn default_statement_timeout() -> u64 {
    DEFAULT_STATEMENT_TIMEOUT
}

/// Schema names may only contain `[A-Za-z0-9_]`.
pub fn is_schema_name_valid(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Business schema declaration.
///
/// For example:
///
/// ```yaml
/// business_schema:
///   schema_name: my_dwh_schema
///   statement_timeout: 10800
///   reset_password: false
///   public_key: MIIBIjANBgkqhki...
///   reset_public_key: false
/// ```
///
/// The schema gets a read-write role, a read-only role and a read-write
/// service user. With a `public_key` the user authenticates with a key pair,
/// otherwise with a generated password.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Schema {
    pub schema_name: String,
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout: u64,
    #[serde(default)]
    pub reset_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default)]
    pub reset_public_key: bool,
}

impl Schema {
    pub fn new(schema_name: &str) -> Self {
        Self {
            schema_name: schema_name.to_string(),
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
            reset_password: false,
            public_key: None,
            reset_public_key: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.schema_name
    }

    pub fn has_key_pair(&self) -> bool {
        self.public_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn public_key(&self) -> Option<&str> {
        if self.has_key_pair() {
            self.public_key.as_deref()
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_schema_name_valid(&self.schema_name) {
            return Err(anyhow!(
                "invalid schema name \"{}\": schema name can only contain alphanumeric characters and underscores",
                self.schema_name
            ));
        }

        if self.reset_public_key && !self.has_key_pair() {
            return Err(anyhow!(
                "Cannot reset public key when public key is not set"
            ));
        }

        Ok(())
    }
}
