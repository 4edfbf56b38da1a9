use crate::checker::Checker;
use crate::config::{Config, Row};
use crate::connection::{Connection, SnowflakeConnection};
use crate::manager::RoleDiff;
use crate::naming::NamingConventions;
use anyhow::Result;
use ascii_table::AsciiTable;
use indoc::indoc;
use log::info;
use std::collections::BTreeSet;

pub fn inspect(config: &Config) -> Result<()> {
    let mut conn = SnowflakeConnection::new(&config.connection)?;

    let mut rows = inspect_row(config, &mut conn)?;
    rows.insert(0, vec!["Kind".to_string(), "Name".to_string(), "State".to_string()]);
    rows.insert(1, vec!["---".to_string(), "---".to_string(), "---".to_string()]);

    // Get the terminal width
    let term_width = term_size::dimensions()
        .map(|(w, _)| w)
        .unwrap_or(120)
        .saturating_sub(5);

    let mut table = AsciiTable::default();
    table.set_max_width(term_width);

    info!(
        "Current state in {}.{}:\n{}",
        config.connection.account,
        config.connection.database,
        table.format(rows)
    );

    info!(indoc! { r#"
        == Legend ==

        State:
            exists  = present in the warehouse
            missing = apply would create it (schemas referenced by users must exist)
            granted = role currently granted to the personal role
            +       = apply would grant it
            -       = apply would revoke it
    "#});

    Ok(())
}

/// Rows of `[kind, name, state]` describing what `apply` would work on.
pub fn inspect_row<C: Connection>(config: &Config, conn: &mut C) -> Result<Vec<Vec<String>>> {
    let naming = NamingConventions::new(config.connection.unique_prefix());
    let database = config.connection.database.clone();
    let mut checker = Checker::new(conn);
    let mut rows = vec![];

    let state = |exists: bool| {
        if exists {
            "exists".to_string()
        } else {
            "missing".to_string()
        }
    };

    match config.row()? {
        Row::Schema(schema) => {
            let schema_name = naming.schema_name_from_schema(schema)?;
            let rw_role = naming.rw_role_from_schema(schema)?;
            let ro_role = naming.ro_role_from_schema(schema)?;
            let rw_user = naming.rw_user_from_schema(schema)?;

            let schema_exists = checker.schema_exists(&database, &schema_name)?;
            rows.push(vec!["Schema".to_string(), schema_name, state(schema_exists)]);
            let rw_exists = checker.role_exists(&rw_role)?;
            rows.push(vec!["RW role".to_string(), rw_role, state(rw_exists)]);
            let ro_exists = checker.role_exists(&ro_role)?;
            rows.push(vec!["RO role".to_string(), ro_role, state(ro_exists)]);
            let user_exists = checker.user_exists(&rw_user)?;
            rows.push(vec!["RW user".to_string(), rw_user, state(user_exists)]);
        }

        Row::User(user) => {
            let own_schema = naming.own_schema_name_from_user(user)?;
            let role = naming.role_name_from_user(user)?;
            let username = naming.username_from_user(user)?;

            let schema_exists = checker.schema_exists(&database, &own_schema)?;
            rows.push(vec!["Schema".to_string(), own_schema, state(schema_exists)]);
            let role_exists = checker.role_exists(&role)?;
            rows.push(vec!["Role".to_string(), role.clone(), state(role_exists)]);
            let user_exists = checker.user_exists(&username)?;
            rows.push(vec!["User".to_string(), username, state(user_exists)]);

            let mut desired = BTreeSet::new();
            for name in user.read_only_schema_names() {
                let ro_role = naming.ro_role_from_schema_name(&name)?;
                let exists = checker.role_exists(&ro_role)?;
                rows.push(vec![format!("Read {}", name), ro_role.clone(), state(exists)]);
                desired.insert(ro_role);
            }
            for name in user.write_schema_names() {
                let rw_role = naming.rw_role_from_schema_name(&name)?;
                let exists = checker.role_exists(&rw_role)?;
                rows.push(vec![format!("Write {}", name), rw_role.clone(), state(exists)]);
                desired.insert(rw_role);
            }

            let granted = checker.granted_roles_of_role(&role)?;
            let diff = RoleDiff::compute(&granted, &desired);
            for child in granted.difference(&diff.to_revoke) {
                rows.push(vec!["Child role".to_string(), child.clone(), "granted".to_string()]);
            }
            for child in &diff.to_grant {
                rows.push(vec!["Child role".to_string(), child.clone(), "+".to_string()]);
            }
            for child in &diff.to_revoke {
                rows.push(vec!["Child role".to_string(), child.clone(), "-".to_string()]);
            }
        }
    }

    Ok(rows)
}
