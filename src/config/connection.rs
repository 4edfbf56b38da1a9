use anyhow::{anyhow, Result};
use envmnt::{ExpandOptions, ExpansionType};
use log::warn;
use serde::{Deserialize, Serialize};

/// Connection type. Supported values: Snowflake
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ConnectionType {
    #[serde(rename = "snowflake")]
    Snowflake,
}

/// How the master user authenticates against the Snowflake SQL API.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Auth {
    /// Key-pair authentication, signs a JWT with the private key (PEM).
    #[serde(rename = "key_pair")]
    KeyPair {
        private_key: String,
        /// `SHA256:...` fingerprint of the registered public key.
        public_key_fingerprint: String,
    },
    #[serde(rename = "oauth")]
    OAuth { token: String },
}

/// Connection configuration section.
/// The user on the connection should have the permission to create roles,
/// users and schemas, and to grant privileges.
///
/// For example:
/// ```yaml
/// connection:
///   type: snowflake
///   account: xy12345.eu-central-1
///   user: DWH_MANAGER
///   warehouse: DEV
///   database: DWHM_TEST
///   auth:
///     type: key_pair
///     private_key: ${SNOWFLAKE_PRIVATE_KEY}
///     public_key_fingerprint: SHA256:jPi8kzWq...
/// ```
///
/// `unique_prefix` defaults to the database name.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Connection {
    #[serde(rename = "type")]
    pub type_: ConnectionType,
    pub account: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub warehouse: String,
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub auth: Auth,
}

impl Connection {
    pub fn validate(&self) -> Result<()> {
        match self.type_ {
            ConnectionType::Snowflake => (),
        }

        let required = [
            ("connection.account", &self.account),
            ("connection.user", &self.user),
            ("connection.warehouse", &self.warehouse),
            ("connection.database", &self.database),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(anyhow!("{} is empty", field));
            }
        }

        match &self.auth {
            Auth::KeyPair {
                private_key,
                public_key_fingerprint,
            } => {
                if private_key.trim().is_empty() {
                    return Err(anyhow!("connection.auth.private_key is empty"));
                }
                if public_key_fingerprint.trim().is_empty() {
                    return Err(anyhow!("connection.auth.public_key_fingerprint is empty"));
                }
            }
            Auth::OAuth { token } => {
                if token.trim().is_empty() {
                    return Err(anyhow!("connection.auth.token is empty"));
                }
            }
        }

        Ok(())
    }

    /// Prefix of every generated role and user name.
    pub fn unique_prefix(&self) -> &str {
        match self.unique_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => prefix,
            _ => &self.database,
        }
    }

    /// The run id, if one survived env expansion.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref().filter(|id| !id.is_empty())
    }

    // Expand environment variables in every string field.
    // For example: private_key: ${SNOWFLAKE_PRIVATE_KEY}
    pub fn expand_env_vars(&self) -> Result<Self> {
        let mut connection = self.clone();

        connection.account = expand(&self.account);
        connection.user = expand(&self.user);
        connection.role = self.role.as_deref().map(expand);
        connection.warehouse = expand(&self.warehouse);
        connection.database = expand(&self.database);
        connection.unique_prefix = self.unique_prefix.as_deref().map(expand);
        connection.url = self.url.as_deref().map(expand);
        connection.run_id = self.run_id.as_deref().map(expand);
        connection.auth = match &self.auth {
            Auth::KeyPair {
                private_key,
                public_key_fingerprint,
            } => Auth::KeyPair {
                private_key: expand(private_key),
                public_key_fingerprint: expand(public_key_fingerprint),
            },
            Auth::OAuth { token } => Auth::OAuth {
                token: expand(token),
            },
        };

        Ok(connection)
    }

    /// Copy with credentials replaced, for printing.
    pub fn masked(&self) -> Self {
        let mut connection = self.clone();
        connection.auth = match &self.auth {
            Auth::KeyPair {
                public_key_fingerprint,
                ..
            } => Auth::KeyPair {
                private_key: "****".to_string(),
                public_key_fingerprint: public_key_fingerprint.clone(),
            },
            Auth::OAuth { .. } => Auth::OAuth {
                token: "****".to_string(),
            },
        };
        connection
    }
}

fn expand(value: &str) -> String {
    let options = ExpandOptions {
        expansion_type: Some(ExpansionType::UnixBracketsWithDefaults),
        default_to_empty: false,
    };

    let expanded = envmnt::expand(value, Some(options));

    // Most likely, the user forgot to export the environment variables.
    if expanded.contains("${") {
        warn!(
            "The connection config may not have fully expanded environment variables: {}",
            value
        );
    }

    expanded
}
