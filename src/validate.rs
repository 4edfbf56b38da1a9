use crate::config::Config;
use ansi_term::Colour::{Green, Red};
use anyhow::{anyhow, Result};
use std::path::Path;
use walkdir::WalkDir;

/// Validate the target file, or every config file below a directory.
pub fn validate_target(target: &Path) -> Result<()> {
    if !target.exists() {
        return Err(anyhow!(
            "{:?} ... {} - file/directory does not exist",
            target,
            Red.paint("Failed")
        ));
    }

    // Scan all files recursively that match *.yaml or *.yml and validate them
    if target.is_dir() {
        let mut files = vec![];
        for entry in WalkDir::new(target).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && is_config_file(entry.path()) {
                files.push(entry.into_path());
            }
        }

        for file in files {
            // Validate but do not stop at the first invalid file
            if let Err(e) = validate_file(&file) {
                println!("{}", e);
            }
        }

        return Ok(());
    }

    validate_file(target)
}

/// Validate target yaml file
pub fn validate_file(file: &Path) -> Result<()> {
    let config = Config::new(file)
        .map_err(|e| anyhow!("{:?} ... {} - {}", file, Red.paint("invalid"), e))?;

    config
        .row()
        .map_err(|e| anyhow!("{:?} ... {} - {}", file, Red.paint("invalid"), e))?;

    // "OK" in green color
    println!("{:?} ... {}", file, Green.paint("ok"));

    Ok(())
}

fn is_config_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}
