use crate::apply::manager;
use crate::config::{Config, Row, User};
use crate::connection::{Connection, SnowflakeConnection};
use crate::manager::Report;
use ansi_term::Colour::{Green, Yellow};
use anyhow::{anyhow, Result};
use log::info;
use std::path::Path;

/// Reset the password of the user behind the config file and print the
/// reset URL. Nothing else is applied.
pub fn reset_password(target: &Path) -> Result<()> {
    let config = Config::new(target)?;
    let conn = SnowflakeConnection::new(&config.connection)?;

    let url = reset_password_with(&config, conn)?;
    println!("{}: \"{}\"", Yellow.paint("Password reset URL"), url);

    Ok(())
}

pub fn reset_password_with<C: Connection>(config: &Config, conn: C) -> Result<String> {
    let row = config.row()?;
    let mut manager = manager(config, conn)?;

    Ok(manager.reset_password_of(row)?)
}

/// Make the user of the config file enroll into MFA again.
pub fn enroll_mfa(target: &Path) -> Result<()> {
    let config = Config::new(target)?;
    let conn = SnowflakeConnection::new(&config.connection)?;

    enroll_mfa_with(&config, conn)?;
    info!("{}: MFA enrollment reset", Green.paint("Success"));

    Ok(())
}

pub fn enroll_mfa_with<C: Connection>(config: &Config, conn: C) -> Result<Report> {
    // checked before the first query, schema rows have no personal user
    let user = user_of(config)?;
    let mut manager = manager(config, conn)?;

    Ok(manager.reset_mfa_of(user)?)
}

fn user_of(config: &Config) -> Result<&User> {
    match config.row()? {
        Row::User(user) => Ok(user),
        Row::Schema(_) => Err(anyhow!(
            "enroll-mfa needs a \"user\" config, \"business_schema\" users have no MFA"
        )),
    }
}
