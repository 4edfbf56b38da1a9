use crate::checker::Checker;
use crate::config::{Config, Row};
use crate::connection::{Connection, DryRunConnection, SnowflakeConnection};
use crate::manager::{DwhManager, Report};
use crate::naming::NamingConventions;
use crate::privilege::PrivilegePolicy;
use ansi_term::Colour::{Green, Purple, Yellow};
use anyhow::{anyhow, Context, Result};
use ascii_table::AsciiTable;
use log::info;
use std::path::{Path, PathBuf};

/// Read the config from the given path and apply it to the warehouse.
/// If the dryrun flag is set, the changes will not be applied.
pub fn apply(target: &Path, dryrun: bool) -> Result<()> {
    if target.is_dir() {
        return Err(anyhow!(
            "{} is a directory, use --all to apply every config file in it",
            target.display()
        ));
    }

    let config = Config::new(target)?;
    info!("Applying configuration:\n{}", config);

    apply_config(&config, dryrun)
}

/// Apply all config files from the given directory.
/// Business schemas go first so that users can reference them.
pub fn apply_all(target: &Path, dryrun: bool) -> Result<()> {
    if !target.is_dir() {
        return apply(target, dryrun);
    }

    let mut configs = vec![];
    for path in config_files(target)? {
        let config = Config::new(&path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        configs.push((path, config));
    }

    // stable: keeps file name order within each kind
    configs.sort_by_key(|(_, config)| !config.is_schema_row());

    for (path, config) in configs {
        info!("Applying configuration from {}", path.display());
        apply_config(&config, dryrun)
            .with_context(|| format!("failed to apply {}", path.display()))?;
    }

    Ok(())
}

/// `*.yaml` and `*.yml` files directly in `dir`, sorted by name.
pub fn config_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            if let Some(ext) = path.extension() {
                if ext == "yaml" || ext == "yml" {
                    files.push(path);
                }
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Connect with the config's connection and reconcile its row.
pub fn apply_config(config: &Config, dryrun: bool) -> Result<()> {
    let conn = SnowflakeConnection::new(&config.connection)?;

    let report = if dryrun {
        reconcile(config, DryRunConnection::new(conn))?
    } else {
        reconcile(config, conn)?
    };

    print_summary(&report, dryrun);
    print_secrets(&report, dryrun);

    Ok(())
}

/// A [DwhManager] for `config`, acting as the session's current role.
pub fn manager<C: Connection>(config: &Config, mut conn: C) -> Result<DwhManager<C>> {
    let acting_role = Checker::new(&mut conn)
        .current_role()
        .context("failed to read the current role")?;
    info!("Acting as role {}", acting_role);

    Ok(DwhManager::new(
        conn,
        NamingConventions::new(config.connection.unique_prefix()),
        PrivilegePolicy::default(),
        &config.connection.warehouse,
        &config.connection.database,
        &acting_role,
    ))
}

/// Run the row of `config` through a [DwhManager] on `conn`.
pub fn reconcile<C: Connection>(config: &Config, conn: C) -> Result<Report> {
    let mut manager = manager(config, conn)?;

    let report = match config.row()? {
        Row::Schema(schema) => manager.check_schema(schema)?,
        Row::User(user) => manager.check_user(user)?,
    };

    Ok(report)
}

/// Print summary table
fn print_summary(report: &Report, dryrun: bool) {
    let status = if dryrun {
        Purple.paint("dry-run").to_string()
    } else {
        Green.paint("done").to_string()
    };

    let mut summary = vec![
        vec!["Object".to_string(), "Action".to_string(), "Status".to_string()],
        vec!["---".to_string(), "---".to_string(), "---".to_string()],
    ];
    for action in &report.actions {
        summary.push(vec![
            action.subject.clone(),
            action.action.clone(),
            status.clone(),
        ]);
    }

    let term_width = term_size::dimensions()
        .map(|(w, _)| w)
        .unwrap_or(120)
        .saturating_sub(5);

    let mut table = AsciiTable::default();
    table.set_max_width(term_width);

    info!("Summary:\n{}", table.format(summary));
}

fn print_secrets(report: &Report, dryrun: bool) {
    if dryrun {
        if !report.secrets.is_empty() {
            info!(
                "{}: {} credential(s) would be generated",
                Purple.paint("Dry-run"),
                report.secrets.len()
            );
        }
        return;
    }

    for secret in &report.secrets {
        println!(
            "{} {} for user {}: {}",
            Yellow.paint("Generated"),
            secret.kind,
            secret.user,
            secret.value
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::FakeWarehouse;
    use indoc::indoc;
    use std::fs;
    use std::str::FromStr;

    const CONNECTION: &str = indoc! {"
        connection:
          type: snowflake
          account: xy12345
          user: DWH_MANAGER
          warehouse: DEV
          database: DWHM_TEST
          unique_prefix: DWHM
          auth:
            type: oauth
            token: abc
    "};

    #[test]
    fn test_apply_directory_without_all() {
        let dir = tempfile::tempdir().unwrap();

        let err = apply(dir.path(), true).unwrap_err();
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn test_config_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.yaml", "a.yml", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("nested.yaml")).unwrap();

        let files = config_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.yml", "b.yaml"]);
    }

    #[test]
    fn test_reconcile_uses_prefix_and_current_role() {
        let text = format!(
            "{}{}",
            CONNECTION,
            indoc! {"
                business_schema:
                  schema_name: sales
            "}
        );
        let config = Config::from_str(&text).unwrap();

        let mut fake = FakeWarehouse::new("DWHM_TEST");
        fake.current_role = "PROVISIONER".to_string();
        fake.roles.insert("PROVISIONER".to_string());

        let report = reconcile(&config, &mut fake).unwrap();

        assert!(fake.roles.contains("DWHM_SALES_RW"));
        assert!(fake.has_role_grant("DWHM_SALES_RW", "ROLE", "PROVISIONER"));
        assert!(!report.actions.is_empty());
    }

    #[test]
    fn test_reconcile_dry_run_changes_nothing() {
        let text = format!(
            "{}{}",
            CONNECTION,
            indoc! {"
                user:
                  email: user@example.com
            "}
        );
        let config = Config::from_str(&text).unwrap();

        let mut fake = FakeWarehouse::new("DWHM_TEST");
        let report = reconcile(&config, DryRunConnection::new(&mut fake)).unwrap();

        assert!(fake.executed().is_empty());
        assert!(fake.roles.len() == 1);
        assert!(report
            .actions
            .iter()
            .any(|a| a.subject == "DWHM_USER_EXAMPLE_COM" && a.action == "created role"));
    }
}
