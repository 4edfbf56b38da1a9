use thiserror::Error;

/// Errors raised while reconciling a schema or user row.
///
/// `Configuration` is user-facing and never worth retrying: the row itself
/// has to be fixed. `Execution` wraps a failed statement together with the
/// SQL text so operators can tell a missing privilege from a syntax error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Configuration(String),

    #[error("Error \"{message}\" while executing query \"{sql}\"")]
    Execution {
        sql: String,
        message: String,
        /// Snowflake error code, e.g. `002003`, when the driver reports one.
        code: Option<String>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Snowflake reports missing objects (and objects we are not allowed to see)
/// with this code.
const OBJECT_DOES_NOT_EXIST_CODE: &str = "002003";

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub fn execution(sql: &str, message: impl Into<String>, code: Option<String>) -> Self {
        Error::Execution {
            sql: sql.to_string(),
            message: message.into(),
            code,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// True only for the warehouse's "object does not exist" signal.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Execution { message, code, .. } => {
                code.as_deref() == Some(OBJECT_DOES_NOT_EXIST_CODE)
                    || message.contains("does not exist")
            }
            Error::Configuration(_) => false,
        }
    }
}
