//! In-memory stand-in for a Snowflake account.
//!
//! Understands exactly the statements produced by [super::sql] and keeps just
//! enough state (roles, schemas, users, role grants) to answer the checker's
//! queries.

use super::{Connection, Row};
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

const NOT_FOUND_CODE: &str = "002003";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct RoleGrant {
    pub role: String,
    /// `USER` or `ROLE`
    pub granted_to: String,
    pub grantee: String,
}

#[derive(Debug, Clone)]
pub(crate) struct PrivilegeGrant {
    pub privileges: String,
    pub granted_on: String,
    pub name: String,
    pub role: String,
}

pub(crate) struct FakeWarehouse {
    pub database: String,
    pub current_role: String,
    pub roles: BTreeSet<String>,
    pub schemas: BTreeSet<String>,
    /// Schemas with managed access enabled.
    pub managed_schemas: BTreeSet<String>,
    pub users: BTreeMap<String, BTreeMap<String, String>>,
    pub role_grants: BTreeSet<RoleGrant>,
    pub privilege_grants: Vec<PrivilegeGrant>,
    /// Statements prefixed by a key fail with the given message.
    pub failures: Vec<(String, String)>,
    executed: Vec<String>,
    queries: Vec<String>,
}

fn rx(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn not_found(sql: &str, kind: &str, name: &str) -> Error {
    Error::execution(
        sql,
        format!("{} '\"{}\"' does not exist or not authorized.", kind, name),
        Some(NOT_FOUND_CODE.to_string()),
    )
}

/// Case-insensitive `LIKE`: `_` matches one character, `%` any run.
fn like(pattern: &str) -> Regex {
    let mut regex = String::from("(?i)^");
    for c in pattern.chars() {
        match c {
            '_' => regex.push('.'),
            '%' => regex.push_str(".*"),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');
    rx(&regex)
}

fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<HashMap<_, _>>()
}

fn parse_options(text: &str) -> Vec<(String, String)> {
    rx(r#"([A-Z_]+)=('(?:[^']|'')*'|[^ ]+)"#)
        .captures_iter(text)
        .map(|c| {
            let value = &c[2];
            let value = if value.starts_with('\'') {
                value[1..value.len() - 1].replace("''", "'")
            } else {
                value.to_string()
            };
            (c[1].to_string(), value)
        })
        .collect()
}

impl FakeWarehouse {
    pub fn new(database: &str) -> Self {
        let current_role = "DWH_MANAGER".to_string();
        Self {
            database: database.to_string(),
            roles: BTreeSet::from([current_role.clone()]),
            current_role,
            schemas: BTreeSet::new(),
            managed_schemas: BTreeSet::new(),
            users: BTreeMap::new(),
            role_grants: BTreeSet::new(),
            privilege_grants: vec![],
            failures: vec![],
            executed: vec![],
            queries: vec![],
        }
    }

    /// Every statement passed to `execute`, plus mutations run through `fetch_rows`.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn clear_log(&mut self) {
        self.executed.clear();
        self.queries.clear();
    }

    pub fn has_role_grant(&self, role: &str, granted_to: &str, grantee: &str) -> bool {
        self.role_grants.contains(&RoleGrant {
            role: role.to_string(),
            granted_to: granted_to.to_string(),
            grantee: grantee.to_string(),
        })
    }

    pub fn add_role_grant(&mut self, role: &str, granted_to: &str, grantee: &str) {
        self.role_grants.insert(RoleGrant {
            role: role.to_string(),
            granted_to: granted_to.to_string(),
            grantee: grantee.to_string(),
        });
    }

    pub fn user_property(&self, user: &str, property: &str) -> Option<&str> {
        self.users
            .get(user)
            .and_then(|properties| properties.get(property))
            .map(String::as_str)
    }

    fn check_failure(&self, sql: &str) -> Result<()> {
        for (prefix, message) in &self.failures {
            if sql.starts_with(prefix.as_str()) {
                return Err(Error::execution(sql, message.clone(), None));
            }
        }
        Ok(())
    }

    fn require_role(&self, sql: &str, role: &str) -> Result<()> {
        if self.roles.contains(role) {
            Ok(())
        } else {
            Err(not_found(sql, "Role", role))
        }
    }

    fn require_grantee(&self, sql: &str, granted_to: &str, grantee: &str) -> Result<()> {
        match granted_to {
            "USER" if !self.users.contains_key(grantee) => Err(not_found(sql, "User", grantee)),
            "ROLE" => self.require_role(sql, grantee),
            _ => Ok(()),
        }
    }

    fn mutate(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.check_failure(sql)?;
        self.executed.push(sql.to_string());

        if let Some(c) = rx(r#"^CREATE ROLE IF NOT EXISTS "([^"]+)"$"#).captures(sql) {
            self.roles.insert(c[1].to_string());
        } else if let Some(c) =
            rx(r#"^CREATE SCHEMA IF NOT EXISTS "([^"]+)"\."([^"]+)" WITH MANAGED ACCESS$"#)
                .captures(sql)
        {
            if c[1] != self.database {
                return Err(not_found(sql, "Database", &c[1]));
            }
            self.schemas.insert(c[2].to_string());
            self.managed_schemas.insert(c[2].to_string());
        } else if let Some(c) =
            rx(r#"^ALTER SCHEMA IF EXISTS "([^"]+)"\."([^"]+)" ENABLE MANAGED ACCESS$"#)
                .captures(sql)
        {
            if c[1] == self.database && self.schemas.contains(&c[2]) {
                self.managed_schemas.insert(c[2].to_string());
            }
        } else if let Some(c) = rx(r#"^CREATE USER IF NOT EXISTS "([^"]+)"(.*)$"#).captures(sql) {
            let name = c[1].to_string();
            if !self.users.contains_key(&name) {
                self.users.insert(name, parse_options(&c[2]).into_iter().collect());
            }
        } else if let Some(c) =
            rx(r#"^ALTER USER IF EXISTS "([^"]+)" RESET PASSWORD$"#).captures(sql)
        {
            if self.users.contains_key(&c[1]) {
                let status = format!(
                    "{} reset password URL: https://example.snowflakecomputing.com/reset/{}",
                    &c[1], &c[1]
                );
                return Ok(vec![row(&[("status", status.as_str())])]);
            }
        } else if let Some(c) = rx(r#"^ALTER USER IF EXISTS "([^"]+)" SET (.*)$"#).captures(sql) {
            if let Some(properties) = self.users.get_mut(&c[1]) {
                properties.extend(parse_options(&c[2]));
            }
        } else if let Some(c) = rx(r#"^ALTER USER IF EXISTS "([^"]+)" UNSET (.*)$"#).captures(sql)
        {
            if let Some(properties) = self.users.get_mut(&c[1]) {
                for property in c[2].split(',') {
                    properties.remove(property.trim());
                }
            }
        } else if let Some(c) =
            rx(r#"^GRANT ROLE "([^"]+)" TO (USER|ROLE) "([^"]+)"$"#).captures(sql)
        {
            self.require_role(sql, &c[1])?;
            self.require_grantee(sql, &c[2], &c[3])?;
            self.add_role_grant(&c[1], &c[2], &c[3]);
        } else if let Some(c) =
            rx(r#"^REVOKE ROLE "([^"]+)" FROM (USER|ROLE) "([^"]+)"$"#).captures(sql)
        {
            self.require_role(sql, &c[1])?;
            self.role_grants.remove(&RoleGrant {
                role: c[1].to_string(),
                granted_to: c[2].to_string(),
                grantee: c[3].to_string(),
            });
        } else if let Some(c) =
            rx(r#"^GRANT (.+?) ON ((?:FUTURE |ALL )?\w+)(?: IN SCHEMA)? (.+) TO ROLE "([^"]+)"$"#)
                .captures(sql)
        {
            self.require_role(sql, &c[4])?;
            self.privilege_grants.push(PrivilegeGrant {
                privileges: c[1].to_string(),
                granted_on: c[2].to_string(),
                name: c[3].to_string(),
                role: c[4].to_string(),
            });
        } else {
            return Err(Error::execution(sql, "unsupported statement", None));
        }

        Ok(vec![])
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        if let Some(c) = rx(r#"^SHOW ROLES LIKE '([^']+)'$"#).captures(sql) {
            let pattern = like(&c[1]);
            return Ok(self
                .roles
                .iter()
                .filter(|role| pattern.is_match(role))
                .map(|role| row(&[("name", role.as_str())]))
                .collect());
        }

        if let Some(c) = rx(r#"^SHOW SCHEMAS LIKE '([^']+)' IN DATABASE "([^"]+)"$"#).captures(sql)
        {
            if c[2] != self.database {
                return Err(not_found(sql, "Database", &c[2]));
            }
            let pattern = like(&c[1]);
            return Ok(self
                .schemas
                .iter()
                .filter(|schema| pattern.is_match(schema))
                .map(|schema| {
                    row(&[("name", schema.as_str()), ("database_name", self.database.as_str())])
                })
                .collect());
        }

        if let Some(c) = rx(r#"^DESCRIBE USER "([^"]+)"$"#).captures(sql) {
            let properties = self
                .users
                .get(&c[1])
                .ok_or_else(|| not_found(sql, "User", &c[1]))?;
            let mut rows = vec![row(&[("property", "NAME"), ("value", &c[1])])];
            rows.extend(
                properties
                    .iter()
                    .map(|(property, value)| {
                        row(&[("property", property.as_str()), ("value", value.as_str())])
                    }),
            );
            return Ok(rows);
        }

        if let Some(c) = rx(r#"^SHOW GRANTS OF ROLE "([^"]+)"$"#).captures(sql) {
            self.require_role(sql, &c[1])?;
            return Ok(self
                .role_grants
                .iter()
                .filter(|grant| grant.role == c[1])
                .map(|grant| {
                    row(&[
                        ("role", grant.role.as_str()),
                        ("granted_to", grant.granted_to.as_str()),
                        ("grantee_name", grant.grantee.as_str()),
                        ("granted_by", self.current_role.as_str()),
                    ])
                })
                .collect());
        }

        if let Some(c) = rx(r#"^SHOW GRANTS TO ROLE "([^"]+)"$"#).captures(sql) {
            self.require_role(sql, &c[1])?;
            let current = self.current_role.as_str();
            let privileges = self
                .privilege_grants
                .iter()
                .filter(|grant| grant.role == c[1] && !grant.granted_on.contains(' '))
                .map(|grant| {
                    row(&[
                        ("privilege", grant.privileges.as_str()),
                        ("granted_on", grant.granted_on.as_str()),
                        ("name", grant.name.as_str()),
                        ("granted_to", "ROLE"),
                        ("grantee_name", grant.role.as_str()),
                        ("granted_by", current),
                    ])
                });
            let roles = self
                .role_grants
                .iter()
                .filter(|grant| grant.granted_to == "ROLE" && grant.grantee == c[1])
                .map(|grant| {
                    row(&[
                        ("privilege", "USAGE"),
                        ("granted_on", "ROLE"),
                        ("name", grant.role.as_str()),
                        ("granted_to", "ROLE"),
                        ("grantee_name", grant.grantee.as_str()),
                        ("granted_by", current),
                    ])
                });
            return Ok(privileges.chain(roles).collect());
        }

        if sql == super::sql::current_role() {
            return Ok(vec![row(&[("name", self.current_role.as_str())])]);
        }

        Err(Error::execution(sql, "unsupported query", None))
    }
}

impl Connection for FakeWarehouse {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.mutate(sql).map(|_| ())
    }

    fn fetch_rows(&mut self, sql: &str) -> Result<Vec<Row>> {
        if sql.starts_with("ALTER ") {
            return self.mutate(sql);
        }
        self.check_failure(sql)?;
        self.queries.push(sql.to_string());
        self.query(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::sql;
    use crate::privilege::ObjectType;

    #[test]
    fn test_fake_warehouse_tracks_roles_and_grants() {
        let mut fake = FakeWarehouse::new("DB");

        fake.execute(&sql::create_role("A")).unwrap();
        fake.execute(&sql::create_role("P")).unwrap();
        fake.execute(&sql::grant_role("A", ObjectType::Role, "P"))
            .unwrap();

        let rows = fake.fetch_rows(&sql::show_grants_to_role("P")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "A");

        let err = fake
            .execute(&sql::grant_role("MISSING", ObjectType::Role, "P"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_fake_warehouse_show_like_uses_wildcards() {
        let mut fake = FakeWarehouse::new("DB");
        for role in ["A_B_RO", "A1B_RO", "AB_RO"] {
            fake.roles.insert(role.to_string());
        }

        let rows = fake.fetch_rows(&sql::show_roles_like("a_b_ro")).unwrap();
        let names: Vec<_> = rows.iter().map(|row| row["name"].as_str()).collect();
        assert_eq!(names, vec!["A1B_RO", "A_B_RO"]);

        let rows = fake.fetch_rows(&sql::show_roles_like("A%")).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_fake_warehouse_user_options() {
        let mut fake = FakeWarehouse::new("DB");
        fake.execute(&sql::create_user(
            "U",
            &[(
                "default_namespace",
                sql::UserOptionValue::Literal("\"DB\".\"S\"".to_string()),
            )],
        ))
        .unwrap();

        assert_eq!(fake.user_property("U", "DEFAULT_NAMESPACE"), Some("\"DB\".\"S\""));
        assert!(fake.fetch_rows(&sql::describe_user("X")).unwrap_err().is_not_found());
    }
}
