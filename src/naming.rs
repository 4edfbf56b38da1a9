use crate::config::{Schema, User};
use crate::error::{Error, Result};
use regex::Regex;

/// Longest identifier Snowflake accepts.
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

const SUFFIX_ROLE_RO: &str = "_RO";
const SUFFIX_ROLE_RW: &str = "_RW";

const MESSAGE_SCHEMA_NAME: &str = "Maximum schema name length is {} characters";
const MESSAGE_EMAIL: &str = "Maximum email length is {} characters";

/// Derives the names of everything the manager creates from the unique
/// prefix and the schema or user declaration.
///
/// All names are upper-cased and checked against [MAX_IDENTIFIER_LENGTH].
#[derive(Debug, Clone)]
pub struct NamingConventions {
    unique_prefix: String,
    invalid_characters: Regex,
}

impl NamingConventions {
    pub fn new(unique_prefix: &str) -> Self {
        Self {
            unique_prefix: unique_prefix.to_string(),
            invalid_characters: Regex::new("[^a-z0-9]+").expect("static regex is valid"),
        }
    }

    pub fn unique_prefix(&self) -> &str {
        &self.unique_prefix
    }

    pub fn own_schema_name_from_user(&self, user: &User) -> Result<String> {
        let schema_name = self.sanitize_as_identifier(user.email());
        check_length(&schema_name, user.email(), MESSAGE_EMAIL)?;
        Ok(schema_name.to_uppercase())
    }

    pub fn ro_role_from_schema_name(&self, schema_name: &str) -> Result<String> {
        let role = format!("{}_{}{}", self.unique_prefix, schema_name, SUFFIX_ROLE_RO);
        check_length(&role, schema_name, MESSAGE_SCHEMA_NAME)?;
        Ok(role.to_uppercase())
    }

    pub fn rw_role_from_schema_name(&self, schema_name: &str) -> Result<String> {
        let role = format!("{}_{}{}", self.unique_prefix, schema_name, SUFFIX_ROLE_RW);
        check_length(&role, schema_name, MESSAGE_SCHEMA_NAME)?;
        Ok(role.to_uppercase())
    }

    pub fn ro_role_from_schema(&self, schema: &Schema) -> Result<String> {
        self.ro_role_from_schema_name(schema.name())
    }

    pub fn rw_role_from_schema(&self, schema: &Schema) -> Result<String> {
        self.rw_role_from_schema_name(schema.name())
    }

    pub fn rw_user_from_schema(&self, schema: &Schema) -> Result<String> {
        let user = format!("{}_{}", self.unique_prefix, schema.name());
        check_length(&user, schema.name(), MESSAGE_SCHEMA_NAME)?;
        Ok(user.to_uppercase())
    }

    pub fn schema_name_from_schema(&self, schema: &Schema) -> Result<String> {
        check_length(schema.name(), schema.name(), MESSAGE_SCHEMA_NAME)?;
        Ok(schema.name().to_uppercase())
    }

    pub fn role_name_from_user(&self, user: &User) -> Result<String> {
        self.prefixed_email(user)
    }

    pub fn username_from_user(&self, user: &User) -> Result<String> {
        self.prefixed_email(user)
    }

    fn prefixed_email(&self, user: &User) -> Result<String> {
        let name = format!(
            "{}_{}",
            self.unique_prefix,
            self.sanitize_as_identifier(user.email())
        );
        check_length(&name, user.email(), MESSAGE_EMAIL)?;
        Ok(name.to_uppercase())
    }

    /// Lower-case, then collapse every run of characters outside `[a-z0-9]`
    /// into one underscore.
    pub fn sanitize_as_identifier(&self, value: &str) -> String {
        self.invalid_characters
            .replace_all(&value.to_lowercase(), "_")
            .into_owned()
    }
}

/// How long `source` may be given the fixed decoration around it.
pub fn allowed_source_length(candidate_len: usize, source_len: usize, max: usize) -> usize {
    let decoration = candidate_len.saturating_sub(source_len);
    max.saturating_sub(decoration)
}

/// Fails when `candidate` is longer than [MAX_IDENTIFIER_LENGTH]. The message
/// template gets the allowed length of `source` in place of `{}`.
pub fn check_length(candidate: &str, source: &str, message: &str) -> Result<()> {
    if candidate.len() > MAX_IDENTIFIER_LENGTH {
        let allowed = allowed_source_length(candidate.len(), source.len(), MAX_IDENTIFIER_LENGTH);
        return Err(Error::configuration(
            message.replacen("{}", &allowed.to_string(), 1),
        ));
    }
    Ok(())
}
