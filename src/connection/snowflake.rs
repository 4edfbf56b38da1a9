//! Snowflake SQL API (`/api/v2/statements`) driver.

use super::dryrun::is_read_only;
use super::{Connection, Row};
use crate::config;
use crate::error::{Error, Result};
use ansi_term::Colour::{Green, Purple};
use jsonwebtoken::{encode, get_current_timestamp, Algorithm, EncodingKey, Header};
use log::{debug, info};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

const SNOWFLAKE_AUTH_HEADER: &str = "X-Snowflake-Authorization-Token-Type";
const USER_AGENT: &str = concat!("dwh-manager/", env!("CARGO_PKG_VERSION"));
const JWT_LIFETIME_SECONDS: u64 = 3600;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct JwtClaims {
    exp: usize,
    iat: usize,
    iss: String,
    sub: String,
}

enum Credentials {
    KeyPair {
        key: EncodingKey,
        /// `ACCOUNT.USER`
        qualified_username: String,
        public_key_fingerprint: String,
    },
    OAuth {
        token: String,
    },
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse: &'a str,
    database: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parameters: StatementParameters,
}

#[derive(Debug, Serialize)]
struct StatementParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    query_tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Option<Vec<Vec<Option<String>>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<Column>,
    #[serde(default)]
    partition_info: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
}

/// Blocking connection to one Snowflake account.
///
/// Every statement runs with the configured warehouse, database and role and
/// is tagged with `{"runId":"..."}` when a run id is set. Statements are not
/// retried.
pub struct SnowflakeConnection {
    client: Client,
    url: String,
    warehouse: String,
    database: String,
    role: Option<String>,
    query_tag: Option<String>,
    credentials: Credentials,
    poll_interval: Duration,
}

impl SnowflakeConnection {
    pub fn new(config: &config::Connection) -> Result<Self> {
        let credentials = match &config.auth {
            config::Auth::KeyPair {
                private_key,
                public_key_fingerprint,
            } => {
                let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| {
                    Error::configuration(format!("connection.auth.private_key is invalid: {}", e))
                })?;
                Credentials::KeyPair {
                    key,
                    qualified_username: format!(
                        "{}.{}",
                        jwt_account(&config.account),
                        config.user.to_uppercase()
                    ),
                    public_key_fingerprint: public_key_fingerprint.clone(),
                }
            }
            config::Auth::OAuth { token } => Credentials::OAuth {
                token: token.clone(),
            },
        };

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;

        let url = config.url.clone().unwrap_or_else(|| {
            format!(
                "https://{}.snowflakecomputing.com/api/v2/statements",
                config.account
            )
        });

        info!(
            "Connecting to Snowflake account {} as {}",
            config.account, config.user
        );

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            warehouse: config.warehouse.clone(),
            database: config.database.clone(),
            role: config.role.clone(),
            query_tag: config
                .run_id()
                .map(|run_id| serde_json::json!({ "runId": run_id }).to_string()),
            credentials,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// How long to wait between polls of a statement still in progress.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn authorize(&self, request: RequestBuilder, sql: &str) -> Result<RequestBuilder> {
        let (token, token_type) = match &self.credentials {
            Credentials::KeyPair {
                key,
                qualified_username,
                public_key_fingerprint,
            } => {
                let now = get_current_timestamp();
                let claims = JwtClaims {
                    exp: (now + JWT_LIFETIME_SECONDS) as usize,
                    iat: now as usize,
                    iss: format!("{}.{}", qualified_username, public_key_fingerprint),
                    sub: qualified_username.clone(),
                };
                let token = encode(&Header::new(Algorithm::RS256), &claims, key).map_err(|e| {
                    Error::execution(sql, format!("failed to sign JWT: {}", e), None)
                })?;
                (token, "KEYPAIR_JWT")
            }
            Credentials::OAuth { token } => (token.clone(), "OAUTH"),
        };

        Ok(request
            .bearer_auth(token)
            .header(SNOWFLAKE_AUTH_HEADER, token_type)
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    fn send(&self, request: RequestBuilder, sql: &str) -> Result<(StatusCode, StatementResponse)> {
        let response = self
            .authorize(request, sql)?
            .send()
            .map_err(|e| Error::execution(sql, format!("request failed: {}", e), None))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| Error::execution(sql, format!("failed to read response: {}", e), None))?;

        let body: StatementResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => StatementResponse {
                message: Some(if text.is_empty() {
                    status.to_string()
                } else {
                    text
                }),
                ..Default::default()
            },
            Err(e) => {
                return Err(Error::execution(
                    sql,
                    format!("failed to parse response: {}", e),
                    None,
                ))
            }
        };

        if status.is_success() {
            Ok((status, body))
        } else {
            let message = body.message.unwrap_or_else(|| status.to_string());
            Err(Error::execution(sql, message, body.code))
        }
    }

    fn run(&self, sql: &str) -> Result<StatementResponse> {
        debug!("Executing: {}", sql);

        let payload = StatementRequest {
            statement: sql,
            warehouse: &self.warehouse,
            database: &self.database,
            role: self.role.as_deref(),
            parameters: StatementParameters {
                query_tag: self.query_tag.clone(),
            },
        };

        let (mut status, mut body) = self.send(self.client.post(&self.url).json(&payload), sql)?;

        while status == StatusCode::ACCEPTED {
            let handle = body.statement_handle.clone().ok_or_else(|| {
                Error::execution(sql, "statement in progress without a handle", None)
            })?;
            debug!("Statement {} still running", handle);
            thread::sleep(self.poll_interval);

            let poll = self.client.get(format!("{}/{}", self.url, handle));
            (status, body) = self.send(poll, sql)?;
        }

        Ok(body)
    }
}

impl Connection for SnowflakeConnection {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.run(sql)?;
        info!("{}: {}", Green.paint("Success"), Purple.paint(sql));
        Ok(())
    }

    fn fetch_rows(&mut self, sql: &str) -> Result<Vec<Row>> {
        let body = self.run(sql)?;
        if !is_read_only(sql) {
            info!("{}: {}", Green.paint("Success"), Purple.paint(sql));
        }
        let meta = body.result_set_meta_data.unwrap_or_default();
        let columns: Vec<String> = meta
            .row_type
            .iter()
            .map(|column| column.name.to_lowercase())
            .collect();

        let mut data = body.data.unwrap_or_default();

        if meta.partition_info.len() > 1 {
            let handle = body.statement_handle.ok_or_else(|| {
                Error::execution(sql, "partitioned result without a handle", None)
            })?;
            for partition in 1..meta.partition_info.len() {
                let request = self
                    .client
                    .get(format!("{}/{}", self.url, handle))
                    .query(&[("partition", partition)]);
                let (_, page) = self.send(request, sql)?;
                data.extend(page.data.unwrap_or_default());
            }
        }

        Ok(data
            .into_iter()
            .map(|values| {
                columns
                    .iter()
                    .cloned()
                    .zip(values.into_iter().map(Option::unwrap_or_default))
                    .collect()
            })
            .collect())
    }
}

/// Account locator as it appears in JWT claims: upper-cased, without the
/// region suffix.
fn jwt_account(account: &str) -> String {
    account
        .split('.')
        .next()
        .unwrap_or(account)
        .to_uppercase()
}
