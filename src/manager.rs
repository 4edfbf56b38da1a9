use crate::checker::Checker;
use crate::config::{Row as ConfigRow, Schema, User};
use crate::connection::sql::{self, UserOption, UserOptionValue};
use crate::connection::{quote_identifier, Connection, Row};
use crate::error::{Error, Result};
use crate::gen::{generate_password, DEFAULT_PASSWORD_LENGTH};
use crate::naming::NamingConventions;
use crate::privilege::{ObjectPrivileges, ObjectType, PrivilegePolicy};
use log::{info, warn};
use std::collections::BTreeSet;
use std::fmt;

/// One decision taken while reconciling, e.g. `("DWHM_S_RW", "created role")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub subject: String,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Password,
    PasswordReset,
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SecretKind::Password => write!(f, "password"),
            SecretKind::PasswordReset => write!(f, "password reset"),
        }
    }
}

/// A credential the operator has to pass on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub user: String,
    pub kind: SecretKind,
    pub value: String,
}

/// Outcome of `check_schema` / `check_user`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub actions: Vec<Action>,
    pub secrets: Vec<Secret>,
}

/// Difference between the child roles a role has and the ones it should have.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDiff {
    pub to_revoke: BTreeSet<String>,
    pub to_grant: BTreeSet<String>,
}

impl RoleDiff {
    pub fn compute(granted: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            to_revoke: granted.difference(desired).cloned().collect(),
            to_grant: desired.difference(granted).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_revoke.is_empty() && self.to_grant.is_empty()
    }
}

/// Reconciles schema and user declarations against the warehouse.
///
/// Each step checks the current state first and only changes what differs,
/// so both entry points can be re-run any number of times. A failure leaves
/// whatever was already done in place; running again picks up from there.
pub struct DwhManager<C: Connection> {
    conn: C,
    naming: NamingConventions,
    policy: PrivilegePolicy,
    warehouse: String,
    database: String,
    /// Role every generated role is granted to, so the provisioning user
    /// keeps control over what it created.
    acting_role: String,
    report: Report,
}

impl<C: Connection> DwhManager<C> {
    pub fn new(
        conn: C,
        naming: NamingConventions,
        policy: PrivilegePolicy,
        warehouse: &str,
        database: &str,
        acting_role: &str,
    ) -> Self {
        Self {
            conn,
            naming,
            policy,
            warehouse: warehouse.to_string(),
            database: database.to_string(),
            acting_role: acting_role.to_string(),
            report: Report::default(),
        }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Business schema with its RW and RO roles and the RW service user.
    pub fn check_schema(&mut self, schema: &Schema) -> Result<Report> {
        let schema_name = self.naming.schema_name_from_schema(schema)?;
        let rw_role = self.naming.rw_role_from_schema(schema)?;
        let ro_role = self.naming.ro_role_from_schema(schema)?;
        let rw_user = self.naming.rw_user_from_schema(schema)?;

        info!("Checking schema \"{}\"", schema.name());

        self.ensure_schema(&schema_name)?;

        self.ensure_role(&rw_role)?;
        self.grant_schema_privileges(&rw_role, &schema_name, true)?;

        self.ensure_role(&ro_role)?;
        self.grant_schema_privileges(&ro_role, &schema_name, false)?;

        let created = self.ensure_schema_user(schema, &rw_user, &rw_role, &schema_name)?;

        if schema.reset_password {
            if schema.has_key_pair() {
                warn!(
                    "User \"{}\" authenticates with a key pair, not resetting password",
                    rw_user
                );
            } else {
                self.reset_password(&rw_user)?;
            }
        }

        if schema.reset_public_key && !created {
            if let Some(public_key) = schema.public_key() {
                self.execute(&sql::alter_user(
                    &rw_user,
                    &[(
                        "rsa_public_key",
                        UserOptionValue::Literal(public_key.to_string()),
                    )],
                ))?;
                self.record(&rw_user, "public key reset");
            }
        }

        self.ensure_role_granted_to_user(&rw_role, &rw_user)?;
        self.ensure_role_granted_to_role(&ro_role, &rw_role)?;
        let acting_role = self.acting_role.clone();
        self.ensure_role_granted_to_role(&rw_role, &acting_role)?;
        self.ensure_role_granted_to_role(&ro_role, &acting_role)?;

        Ok(std::mem::take(&mut self.report))
    }

    /// Personal schema, role and user, plus access to the declared schemas.
    pub fn check_user(&mut self, user: &User) -> Result<Report> {
        let own_schema = self.naming.own_schema_name_from_user(user)?;
        let role = self.naming.role_name_from_user(user)?;
        let username = self.naming.username_from_user(user)?;

        info!("Checking user \"{}\"", user.email());

        // Referenced schemas must exist before anything is granted.
        let mut desired = BTreeSet::new();
        for name in user.read_only_schema_names() {
            let ro_role = self.naming.ro_role_from_schema_name(&name)?;
            self.require_schema_role(&ro_role, &name, user)?;
            desired.insert(ro_role);
        }
        for name in user.write_schema_names() {
            let rw_role = self.naming.rw_role_from_schema_name(&name)?;
            self.require_schema_role(&rw_role, &name, user)?;
            desired.insert(rw_role);
        }

        self.ensure_schema(&own_schema)?;
        self.ensure_role(&role)?;
        self.grant_schema_privileges(&role, &own_schema, true)?;

        let created = self.ensure_personal_user(user, &username, &role, &own_schema)?;

        if user.reset_password {
            self.reset_password(&username)?;
        }
        if user.reset_mfa {
            self.reset_mfa(&username)?;
        }
        if user.person_type && !created {
            self.execute(&sql::alter_user(
                &username,
                &[("type", UserOptionValue::Expr("PERSON".to_string()))],
            ))?;
            self.record(&username, "type set to PERSON");
        }

        self.ensure_role_granted_to_user(&role, &username)?;
        let acting_role = self.acting_role.clone();
        self.ensure_role_granted_to_role(&role, &acting_role)?;

        for schema_role in &desired {
            self.ensure_role_granted_to_role(schema_role, &acting_role)?;
        }

        self.reconcile_child_roles(&role, &desired)?;

        Ok(std::mem::take(&mut self.report))
    }

    /// Reset the password of the user behind `row` and return the reset URL.
    ///
    /// Nothing else is reconciled. The user has to exist already.
    pub fn reset_password_of(&mut self, row: ConfigRow) -> Result<String> {
        let username = match row {
            ConfigRow::Schema(schema) => {
                let rw_user = self.naming.rw_user_from_schema(schema)?;
                if schema.has_key_pair() {
                    return Err(Error::configuration(format!(
                        "User \"{}\" authenticates with a key pair and has no password",
                        rw_user
                    )));
                }
                rw_user
            }
            ConfigRow::User(user) => self.naming.username_from_user(user)?,
        };
        self.require_user(&username)?;

        let status = self.reset_password(&username)?;
        if status.is_empty() {
            return Err(Error::execution(
                &sql::reset_user_password(&username),
                "no reset URL returned",
                None,
            ));
        }
        Ok(reset_url(&status).to_string())
    }

    /// Drop the user's MFA enrollment so they enroll again on next login.
    pub fn reset_mfa_of(&mut self, user: &User) -> Result<Report> {
        let username = self.naming.username_from_user(user)?;
        self.require_user(&username)?;
        self.reset_mfa(&username)?;
        Ok(std::mem::take(&mut self.report))
    }

    fn checker(&mut self) -> Checker<'_> {
        Checker::new(&mut self.conn)
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        self.conn.execute(sql)
    }

    fn record(&mut self, subject: &str, action: impl Into<String>) {
        let action = action.into();
        info!("{}: {}", subject, action);
        self.report.actions.push(Action {
            subject: subject.to_string(),
            action,
        });
    }

    fn require_schema_role(&mut self, schema_role: &str, schema_name: &str, user: &User) -> Result<()> {
        if self.checker().role_exists(schema_role)? {
            Ok(())
        } else {
            Err(Error::configuration(format!(
                "Schema \"{}\" used in user \"{}\" does not exist",
                schema_name,
                user.email()
            )))
        }
    }

    fn require_user(&mut self, username: &str) -> Result<()> {
        if self.checker().user_exists(username)? {
            Ok(())
        } else {
            Err(Error::configuration(format!(
                "User \"{}\" does not exist, apply the config first",
                username
            )))
        }
    }

    fn ensure_schema(&mut self, schema_name: &str) -> Result<()> {
        let database = self.database.clone();
        if self.checker().schema_exists(&database, schema_name)? {
            self.execute(&sql::enable_managed_access(&database, schema_name))?;
            self.record(schema_name, "schema exists, managed access enabled");
        } else {
            self.execute(&sql::create_schema(&database, schema_name))?;
            self.record(schema_name, "created schema");
        }
        Ok(())
    }

    fn ensure_role(&mut self, role: &str) -> Result<()> {
        if self.checker().role_exists(role)? {
            self.record(role, "role exists");
        } else {
            self.execute(&sql::create_role(role))?;
            self.record(role, "created role");
        }
        Ok(())
    }

    /// Warehouse, database and schema privileges plus future and current
    /// object privileges, the write set when `write` is true.
    fn grant_schema_privileges(&mut self, role: &str, schema_name: &str, write: bool) -> Result<()> {
        let policy = self.policy.clone();
        let (schema_privileges, object_privileges) = if write {
            (&policy.schema_write_access, &policy.object_write)
        } else {
            (&policy.schema_read_only, &policy.object_read)
        };

        let warehouse = quote_identifier(&self.warehouse);
        let database = quote_identifier(&self.database);
        let schema = sql::qualified_schema(&self.database, schema_name);

        self.grant_on_object(&policy.warehouse_minimal, ObjectType::Warehouse, &warehouse, role)?;
        self.grant_on_object(&policy.database_minimal, ObjectType::Database, &database, role)?;
        self.grant_on_object(schema_privileges, ObjectType::Schema, &schema, role)?;
        self.grant_on_objects_in_schema(object_privileges, schema_name, role)?;

        Ok(())
    }

    fn grant_on_object(
        &mut self,
        privileges: &[&str],
        object_type: ObjectType,
        object: &str,
        role: &str,
    ) -> Result<()> {
        if privileges.is_empty() {
            return Ok(());
        }
        self.execute(&sql::grant_on_object(privileges, object_type, object, role))?;
        self.record(
            role,
            format!("granted {:?} on {} {}", privileges, object_type, object),
        );
        Ok(())
    }

    fn grant_on_objects_in_schema(
        &mut self,
        privileges: &ObjectPrivileges,
        schema_name: &str,
        role: &str,
    ) -> Result<()> {
        let database = self.database.clone();
        for (object_type, privileges) in privileges {
            if privileges.is_empty() {
                continue;
            }
            self.execute(&sql::grant_on_future_in_schema(
                privileges,
                *object_type,
                &database,
                schema_name,
                role,
            ))?;
            self.execute(&sql::grant_on_all_in_schema(
                privileges,
                *object_type,
                &database,
                schema_name,
                role,
            ))?;
            self.record(
                role,
                format!(
                    "granted {:?} on future and all {} in schema {}",
                    privileges,
                    object_type.plural(),
                    schema_name
                ),
            );
        }
        Ok(())
    }

    fn base_user_options(&self, role: &str, schema_name: &str, statement_timeout: u64) -> Vec<UserOption> {
        vec![
            ("default_role", UserOptionValue::Literal(role.to_string())),
            (
                "default_warehouse",
                UserOptionValue::Literal(self.warehouse.clone()),
            ),
            (
                "default_namespace",
                UserOptionValue::Literal(sql::qualified_schema(&self.database, schema_name)),
            ),
            (
                "statement_timeout_in_seconds",
                UserOptionValue::Int(statement_timeout),
            ),
        ]
    }

    /// Returns true when the user was created by this call.
    fn ensure_schema_user(
        &mut self,
        schema: &Schema,
        user: &str,
        role: &str,
        schema_name: &str,
    ) -> Result<bool> {
        let options = self.base_user_options(role, schema_name, schema.statement_timeout);

        if self.checker().user_exists(user)? {
            self.execute(&sql::alter_user(user, &options))?;
            self.record(user, "user exists, defaults aligned");
            return Ok(false);
        }

        let mut create: Vec<UserOption> = match schema.public_key() {
            Some(public_key) => vec![
                ("type", UserOptionValue::Expr("SERVICE".to_string())),
                (
                    "rsa_public_key",
                    UserOptionValue::Literal(public_key.to_string()),
                ),
            ],
            None => self.password_options(user, "LEGACY_SERVICE"),
        };
        create.extend(options);

        self.execute(&sql::create_user(user, &create))?;
        self.record(user, "created user");
        Ok(true)
    }

    /// Returns true when the user was created by this call.
    fn ensure_personal_user(
        &mut self,
        user: &User,
        username: &str,
        role: &str,
        schema_name: &str,
    ) -> Result<bool> {
        let mut options = self.base_user_options(role, schema_name, user.statement_timeout);
        options.push(("disabled", UserOptionValue::Bool(user.disabled)));
        options.push(("email", UserOptionValue::Literal(user.email().to_string())));

        if self.checker().user_exists(username)? {
            self.execute(&sql::alter_user(username, &options))?;
            self.record(username, "user exists, defaults aligned");
            return Ok(false);
        }

        let user_type = if user.person_type {
            "PERSON"
        } else {
            "LEGACY_SERVICE"
        };
        let mut create = self.password_options(username, user_type);
        create.extend(options);

        self.execute(&sql::create_user(username, &create))?;
        self.record(username, "created user");
        Ok(true)
    }

    fn password_options(&mut self, user: &str, user_type: &str) -> Vec<UserOption> {
        let password = generate_password(DEFAULT_PASSWORD_LENGTH);
        self.report.secrets.push(Secret {
            user: user.to_string(),
            kind: SecretKind::Password,
            value: password.clone(),
        });

        vec![
            ("type", UserOptionValue::Expr(user_type.to_string())),
            ("password", UserOptionValue::Literal(password)),
            ("must_change_password", UserOptionValue::Bool(true)),
        ]
    }

    /// The old password keeps working until the reset URL is used.
    /// Returns the status text, which carries the URL.
    fn reset_password(&mut self, user: &str) -> Result<String> {
        let rows = self.conn.fetch_rows(&sql::reset_user_password(user))?;
        let status = rows
            .first()
            .and_then(|row: &Row| row.get("status"))
            .cloned()
            .unwrap_or_default();

        if !status.is_empty() {
            info!("Password reset for user \"{}\": {}", user, status);
            self.report.secrets.push(Secret {
                user: user.to_string(),
                kind: SecretKind::PasswordReset,
                value: status.clone(),
            });
        }
        self.record(user, "password reset");
        Ok(status)
    }

    fn reset_mfa(&mut self, user: &str) -> Result<()> {
        self.execute(&sql::alter_user_unset(user, &["MINS_TO_BYPASS_MFA"]))?;
        self.execute(&sql::alter_user(
            user,
            &[("disable_mfa", UserOptionValue::Bool(true))],
        ))?;
        self.record(user, "MFA reset");
        Ok(())
    }

    fn ensure_role_granted_to_user(&mut self, role: &str, user: &str) -> Result<()> {
        if self.checker().is_role_granted_to_user(role, user)? {
            self.record(user, format!("role {} already granted", role));
        } else {
            self.execute(&sql::grant_role(role, ObjectType::User, user))?;
            self.record(user, format!("granted role {}", role));
        }
        Ok(())
    }

    fn ensure_role_granted_to_role(&mut self, role: &str, grantee_role: &str) -> Result<()> {
        if self.checker().is_role_granted_to_role(role, grantee_role)? {
            self.record(grantee_role, format!("role {} already granted", role));
        } else {
            self.execute(&sql::grant_role(role, ObjectType::Role, grantee_role))?;
            self.record(grantee_role, format!("granted role {}", role));
        }
        Ok(())
    }

    /// Makes the roles granted to `role` exactly `desired`.
    fn reconcile_child_roles(&mut self, role: &str, desired: &BTreeSet<String>) -> Result<()> {
        let granted = self.checker().granted_roles_of_role(role)?;
        let diff = RoleDiff::compute(&granted, desired);

        info!(
            "Roles of \"{}\": granted {:?}, desired {:?}, to revoke {:?}, to grant {:?}",
            role, granted, desired, diff.to_revoke, diff.to_grant
        );

        for child in &diff.to_revoke {
            self.execute(&sql::revoke_role(child, ObjectType::Role, role))?;
            self.record(role, format!("revoked role {}", child));
        }
        for child in &diff.to_grant {
            self.execute(&sql::grant_role(child, ObjectType::Role, role))?;
            self.record(role, format!("granted role {}", child));
        }

        Ok(())
    }
}

/// The URL inside a `RESET PASSWORD` status, or the whole status.
fn reset_url(status: &str) -> &str {
    status
        .find("https://")
        .map(|start| {
            status[start..]
                .split_whitespace()
                .next()
                .unwrap_or_default()
        })
        .unwrap_or(status)
}
