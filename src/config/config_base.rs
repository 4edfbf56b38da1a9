use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{fmt, fs};

pub use super::connection::{Auth, Connection, ConnectionType};
pub use super::{Schema, User};

/// Configuration of one provisioning row: the connection plus exactly one
/// of a business schema or a user.
///
///  - `connection`: the Snowflake account, master user, warehouse and database.
///  - `business_schema`: a [Schema] to provision with its RW/RO roles and RW user.
///  - `user`: a [User] to provision with its own schema and role.
///
/// For example:
///
/// ```yaml
/// connection:
///   type: snowflake
///   account: xy12345
///   user: DWH_MANAGER
///   warehouse: DEV
///   database: DWHM_TEST
///   auth:
///     type: oauth
///     token: ${SNOWFLAKE_TOKEN}
///
/// user:
///   email: user@example.com
///   business_schemas:
///     - my_dwh_schema
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub connection: Connection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// The declaration carried by a config row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row<'a> {
    Schema(&'a Schema),
    User(&'a User),
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut masked = self.clone();
        masked.connection = self.connection.masked();
        let yaml = serde_yaml::to_string(&masked).map_err(|_| fmt::Error)?;
        write!(f, "{}", yaml)
    }
}

impl std::str::FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(s)?;

        // Validate
        config.validate()?;

        Ok(config)
    }
}

impl Config {
    pub fn new(config_path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;
        let config: Config = serde_yaml::from_str(&config_str)?;

        config.validate()?;

        // expand env variables
        let config = config.expand_env_vars()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;

        match (&self.business_schema, &self.user) {
            (Some(_), Some(_)) => {
                return Err(anyhow!(
                    "The \"user\" and \"business_schema\" options are mutually exclusive."
                ))
            }
            (None, None) => {
                return Err(anyhow!(
                    "Either \"user\" or \"business_schema\" must be present."
                ))
            }
            _ => (),
        }

        if let Some(schema) = &self.business_schema {
            schema.validate()?;
        }
        if let Some(user) = &self.user {
            user.validate()?;
        }

        Ok(())
    }

    pub fn row(&self) -> Result<Row<'_>> {
        match (&self.business_schema, &self.user) {
            (Some(schema), None) => Ok(Row::Schema(schema)),
            (None, Some(user)) => Ok(Row::User(user)),
            _ => Err(anyhow!(
                "config must contain exactly one of \"user\" or \"business_schema\""
            )),
        }
    }

    pub fn is_schema_row(&self) -> bool {
        matches!(self.row(), Ok(Row::Schema(_)))
    }

    pub fn is_user_row(&self) -> bool {
        matches!(self.row(), Ok(Row::User(_)))
    }

    // Expand env variables in config
    fn expand_env_vars(&self) -> Result<Self> {
        let mut config = self.clone();

        // expand connection
        config.connection = config.connection.expand_env_vars()?;

        Ok(config)
    }
}
