use anyhow::Result;
use dwh_manager::cli::{self, Command};
use dwh_manager::config::Config;
use dwh_manager::{apply, gen, inspect, reset, validate};
use env_logger::Env;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = cli::parse();

    match args.cmd {
        Command::GenPass { length } => gen::gen_password(length),

        Command::Apply { file, dryrun, all } => {
            if all {
                apply::apply_all(&file, dryrun)?
            } else {
                apply::apply(&file, dryrun)?
            }
        }

        Command::Validate { file } => {
            let target = file.unwrap_or_else(|| PathBuf::from("."));
            validate::validate_target(&target)?
        }

        Command::ResetPassword { file } => reset::reset_password(&file)?,

        Command::EnrollMfa { file } => reset::enroll_mfa(&file)?,

        Command::Inspect { file } => {
            let config = Config::new(&file)?;
            inspect::inspect(&config)?
        }
    }

    Ok(())
}
