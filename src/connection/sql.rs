//! Statement templates.
//!
//! Every function takes raw (unquoted) names and quotes them itself.

use super::{quote_identifier, quote_literal};
use crate::privilege::ObjectType;

/// Value of a `CREATE USER` / `ALTER USER` property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserOptionValue {
    /// Quoted as a string literal.
    Literal(String),
    Int(u64),
    Bool(bool),
    /// A keyword emitted verbatim, e.g. `SERVICE`.
    Expr(String),
}

impl UserOptionValue {
    fn render(&self) -> String {
        match self {
            UserOptionValue::Literal(value) => quote_literal(value),
            UserOptionValue::Int(value) => value.to_string(),
            UserOptionValue::Bool(true) => "TRUE".to_string(),
            UserOptionValue::Bool(false) => "FALSE".to_string(),
            UserOptionValue::Expr(value) => value.clone(),
        }
    }
}

/// A user property, the name is upper-cased on render.
pub type UserOption = (&'static str, UserOptionValue);

fn render_options(options: &[UserOption]) -> String {
    options
        .iter()
        .map(|(name, value)| format!("{}={}", name.to_uppercase(), value.render()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `"DB"."SCHEMA"`
pub fn qualified_schema(database: &str, schema: &str) -> String {
    format!("{}.{}", quote_identifier(database), quote_identifier(schema))
}

pub fn create_role(role: &str) -> String {
    format!("CREATE ROLE IF NOT EXISTS {}", quote_identifier(role))
}

pub fn create_schema(database: &str, schema: &str) -> String {
    format!(
        "CREATE SCHEMA IF NOT EXISTS {} WITH MANAGED ACCESS",
        qualified_schema(database, schema)
    )
}

pub fn enable_managed_access(database: &str, schema: &str) -> String {
    format!(
        "ALTER SCHEMA IF EXISTS {} ENABLE MANAGED ACCESS",
        qualified_schema(database, schema)
    )
}

pub fn create_user(user: &str, options: &[UserOption]) -> String {
    let mut sql = format!("CREATE USER IF NOT EXISTS {}", quote_identifier(user));
    if !options.is_empty() {
        sql += " ";
        sql += &render_options(options);
    }
    sql
}

/// `ALTER USER IF EXISTS <user> SET ...`, `options` must not be empty.
pub fn alter_user(user: &str, options: &[UserOption]) -> String {
    format!(
        "ALTER USER IF EXISTS {} SET {}",
        quote_identifier(user),
        render_options(options)
    )
}

pub fn alter_user_unset(user: &str, properties: &[&str]) -> String {
    format!(
        "ALTER USER IF EXISTS {} UNSET {}",
        quote_identifier(user),
        properties.join(", ")
    )
}

/// Generates a one-time URL; the current password stays valid until used.
pub fn reset_user_password(user: &str) -> String {
    format!("ALTER USER IF EXISTS {} RESET PASSWORD", quote_identifier(user))
}

/// `GRANT <privileges> ON <type> <object> TO ROLE <role>`, `object` is already quoted.
pub fn grant_on_object(
    privileges: &[&str],
    object_type: ObjectType,
    object: &str,
    role: &str,
) -> String {
    format!(
        "GRANT {} ON {} {} TO ROLE {}",
        privileges.join(","),
        object_type,
        object,
        quote_identifier(role)
    )
}

pub fn grant_on_all_in_schema(
    privileges: &[&str],
    object_type: ObjectType,
    database: &str,
    schema: &str,
    role: &str,
) -> String {
    format!(
        "GRANT {} ON ALL {} IN SCHEMA {} TO ROLE {}",
        privileges.join(","),
        object_type.plural(),
        qualified_schema(database, schema),
        quote_identifier(role)
    )
}

pub fn grant_on_future_in_schema(
    privileges: &[&str],
    object_type: ObjectType,
    database: &str,
    schema: &str,
    role: &str,
) -> String {
    format!(
        "GRANT {} ON FUTURE {} IN SCHEMA {} TO ROLE {}",
        privileges.join(","),
        object_type.plural(),
        qualified_schema(database, schema),
        quote_identifier(role)
    )
}

/// `GRANT ROLE <role> TO {USER|ROLE} <grantee>`
pub fn grant_role(role: &str, grantee_type: ObjectType, grantee: &str) -> String {
    format!(
        "GRANT ROLE {} TO {} {}",
        quote_identifier(role),
        grantee_type,
        quote_identifier(grantee)
    )
}

/// `REVOKE ROLE <role> FROM {USER|ROLE} <grantee>`
pub fn revoke_role(role: &str, grantee_type: ObjectType, grantee: &str) -> String {
    format!(
        "REVOKE ROLE {} FROM {} {}",
        quote_identifier(role),
        grantee_type,
        quote_identifier(grantee)
    )
}

pub fn show_roles_like(role: &str) -> String {
    format!("SHOW ROLES LIKE {}", quote_literal(role))
}

pub fn show_schemas_like(database: &str, schema: &str) -> String {
    format!(
        "SHOW SCHEMAS LIKE {} IN DATABASE {}",
        quote_literal(schema),
        quote_identifier(database)
    )
}

pub fn describe_user(user: &str) -> String {
    format!("DESCRIBE USER {}", quote_identifier(user))
}

/// Who holds the role.
pub fn show_grants_of_role(role: &str) -> String {
    format!("SHOW GRANTS OF ROLE {}", quote_identifier(role))
}

/// What the role holds, including granted roles.
pub fn show_grants_to_role(role: &str) -> String {
    format!("SHOW GRANTS TO ROLE {}", quote_identifier(role))
}

pub fn current_role() -> String {
    "SELECT CURRENT_ROLE() AS \"name\"".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_statements() {
        assert_eq!(create_role("R_RW"), "CREATE ROLE IF NOT EXISTS \"R_RW\"");
        assert_eq!(
            create_schema("DB", "MY_SCHEMA"),
            "CREATE SCHEMA IF NOT EXISTS \"DB\".\"MY_SCHEMA\" WITH MANAGED ACCESS"
        );
    }

    #[test]
    fn test_create_user_renders_options_in_order() {
        let sql = create_user(
            "DWHM_MY_SCHEMA",
            &[
                ("password", UserOptionValue::Literal("pa'ss".to_string())),
                ("default_role", UserOptionValue::Literal("DWHM_MY_SCHEMA_RW".to_string())),
                ("type", UserOptionValue::Expr("LEGACY_SERVICE".to_string())),
                ("must_change_password", UserOptionValue::Bool(true)),
                ("statement_timeout_in_seconds", UserOptionValue::Int(10800)),
            ],
        );

        assert_eq!(
            sql,
            "CREATE USER IF NOT EXISTS \"DWHM_MY_SCHEMA\" PASSWORD='pa''ss' \
             DEFAULT_ROLE='DWHM_MY_SCHEMA_RW' TYPE=LEGACY_SERVICE \
             MUST_CHANGE_PASSWORD=TRUE STATEMENT_TIMEOUT_IN_SECONDS=10800"
        );
    }

    #[test]
    fn test_alter_user() {
        assert_eq!(
            alter_user("U", &[("disabled", UserOptionValue::Bool(false))]),
            "ALTER USER IF EXISTS \"U\" SET DISABLED=FALSE"
        );
        assert_eq!(
            alter_user_unset("U", &["MINS_TO_BYPASS_MFA"]),
            "ALTER USER IF EXISTS \"U\" UNSET MINS_TO_BYPASS_MFA"
        );
        assert_eq!(
            reset_user_password("U"),
            "ALTER USER IF EXISTS \"U\" RESET PASSWORD"
        );
    }

    #[test]
    fn test_grant_statements() {
        assert_eq!(
            grant_on_object(&["USAGE"], ObjectType::Warehouse, &quote_identifier("DEV"), "R"),
            "GRANT USAGE ON WAREHOUSE \"DEV\" TO ROLE \"R\""
        );
        assert_eq!(
            grant_on_future_in_schema(&["SELECT", "INSERT"], ObjectType::Table, "DB", "S", "R"),
            "GRANT SELECT,INSERT ON FUTURE TABLES IN SCHEMA \"DB\".\"S\" TO ROLE \"R\""
        );
        assert_eq!(
            grant_on_all_in_schema(&["READ"], ObjectType::Stage, "DB", "S", "R"),
            "GRANT READ ON ALL STAGES IN SCHEMA \"DB\".\"S\" TO ROLE \"R\""
        );
        assert_eq!(
            grant_role("R_RO", ObjectType::Role, "R_RW"),
            "GRANT ROLE \"R_RO\" TO ROLE \"R_RW\""
        );
        assert_eq!(
            revoke_role("A", ObjectType::Role, "P"),
            "REVOKE ROLE \"A\" FROM ROLE \"P\""
        );
    }

    #[test]
    fn test_enable_managed_access() {
        assert_eq!(
            enable_managed_access("DB", "S"),
            "ALTER SCHEMA IF EXISTS \"DB\".\"S\" ENABLE MANAGED ACCESS"
        );
    }

    #[test]
    fn test_show_statements() {
        assert_eq!(show_roles_like("R"), "SHOW ROLES LIKE 'R'");
        assert_eq!(
            show_schemas_like("DB", "S"),
            "SHOW SCHEMAS LIKE 'S' IN DATABASE \"DB\""
        );
        assert_eq!(describe_user("U"), "DESCRIBE USER \"U\"");
        assert_eq!(show_grants_of_role("R"), "SHOW GRANTS OF ROLE \"R\"");
        assert_eq!(show_grants_to_role("R"), "SHOW GRANTS TO ROLE \"R\"");
    }
}
