use crate::connection::{sql, Connection, Grant, Row};
use crate::error::{Error, Result};
use crate::privilege::ObjectType;
use log::debug;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Read-only questions about the current warehouse state.
pub struct Checker<'a> {
    conn: &'a mut dyn Connection,
}

impl<'a> Checker<'a> {
    pub fn new(conn: &'a mut dyn Connection) -> Self {
        Self { conn }
    }

    pub fn role_exists(&mut self, role: &str) -> Result<bool> {
        let roles = self.conn.fetch_rows(&sql::show_roles_like(role))?;
        Ok(count_named(&roles, role) == 1)
    }

    pub fn schema_exists(&mut self, database: &str, schema: &str) -> Result<bool> {
        let schemas = self
            .conn
            .fetch_rows(&sql::show_schemas_like(database, schema))?;
        Ok(count_named(&schemas, schema) == 1)
    }

    /// Only a "does not exist" answer means the user is missing, any other
    /// failure is returned.
    pub fn user_exists(&mut self, user: &str) -> Result<bool> {
        match self.conn.fetch_rows(&sql::describe_user(user)) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                debug!("User \"{}\" not found: {}", user, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn current_role(&mut self) -> Result<String> {
        let query = sql::current_role();
        let rows = self.conn.fetch_rows(&query)?;
        rows.into_iter()
            .next()
            .and_then(|mut row| row.remove("name"))
            .filter(|role| !role.is_empty())
            .ok_or_else(|| Error::execution(&query, "no current role in session", None))
    }

    /// Is `role` granted to the role `grantee_role`?
    pub fn is_role_granted_to_role(&mut self, role: &str, grantee_role: &str) -> Result<bool> {
        self.is_role_granted_to(role, ObjectType::Role, grantee_role)
    }

    pub fn is_role_granted_to_user(&mut self, role: &str, user: &str) -> Result<bool> {
        self.is_role_granted_to(role, ObjectType::User, user)
    }

    fn is_role_granted_to(
        &mut self,
        role: &str,
        grantee_type: ObjectType,
        grantee: &str,
    ) -> Result<bool> {
        let grants = self.grants_of_role(role)?;
        Ok(grants
            .iter()
            .any(|grant| grant.granted_to == grantee_type.as_str() && grant.grantee_name == grantee))
    }

    /// Names of the roles granted to `role`.
    pub fn granted_roles_of_role(&mut self, role: &str) -> Result<BTreeSet<String>> {
        let grants = self.grants_to_role(role)?;
        let role_grants = filter_grants_by_granted_on(ObjectType::Role, &grants);

        Ok(grant_names(&role_grants)
            .into_iter()
            .map(|name| strip_to_unquoted_name(&name))
            .collect())
    }

    /// Grants of `role` to users and roles. A missing role has none.
    pub fn grants_of_role(&mut self, role: &str) -> Result<Vec<Grant>> {
        self.fetch_grants(&sql::show_grants_of_role(role))
    }

    /// Privileges and roles granted to `role`. A missing role has none.
    pub fn grants_to_role(&mut self, role: &str) -> Result<Vec<Grant>> {
        self.fetch_grants(&sql::show_grants_to_role(role))
    }

    fn fetch_grants(&mut self, query: &str) -> Result<Vec<Grant>> {
        match self.conn.fetch_rows(query) {
            Ok(rows) => Ok(rows.iter().map(Grant::from_row).collect()),
            Err(e) if e.is_not_found() => Ok(vec![]),
            Err(e) => Err(e),
        }
    }
}

/// `_` in a `LIKE` pattern matches any character, so `SHOW ... LIKE` can
/// return neighbours of `name` as well.
fn count_named(rows: &[Row], name: &str) -> usize {
    rows.iter()
        .filter(|row| {
            row.get("name")
                .map_or(false, |found| found.eq_ignore_ascii_case(name))
        })
        .count()
}

pub fn filter_grants_by_granted_on(object_type: ObjectType, grants: &[Grant]) -> Vec<Grant> {
    grants
        .iter()
        .filter(|grant| grant.granted_on == object_type.as_str())
        .cloned()
        .collect()
}

pub fn grant_names(grants: &[Grant]) -> Vec<String> {
    grants.iter().map(|grant| grant.name.clone()).collect()
}

/// Strip database/schema qualification and quotes from a grant name.
///
/// `"my_schema"`, `my_schema`, `some."my_schema"` and `"some"."my_schema"`
/// all become `my_schema`.
pub fn strip_to_unquoted_name(value: &str) -> String {
    static QUALIFIED: OnceLock<Regex> = OnceLock::new();
    let qualified = QUALIFIED.get_or_init(|| {
        Regex::new(r#"^(?:"?[^"]+"?\.)*"([^"]+)"$"#).expect("static regex is valid")
    });

    match qualified.captures(value) {
        Some(captures) => captures[1].to_string(),
        None => value.rsplit('.').next().unwrap_or(value).to_string(),
    }
}
