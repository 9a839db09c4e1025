//! Output directory handling.
//!
//! Output is written to a partial file and renamed into place only after the
//! whole run succeeds. Group files are removed only after a successful merge;
//! after a failure everything is left for inspection.

use crate::config::{DedupConfig, Strategy};
use crate::error::{DedupError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Make the output location ready for a fresh run.
///
/// Creates the output directory, removes stale output from an earlier run,
/// and for the disk strategy recreates an empty group-file directory.
///
/// Fails with [`DedupError::InvalidConfig`], before anything is removed, if
/// the input is one of the paths that would be cleared.
pub fn prepare_output(config: &DedupConfig) -> Result<()> {
    ensure_input_preserved(config)?;
    fs::create_dir_all(&config.output_dir)?;

    remove_file_if_exists(&config.output_path())?;
    remove_file_if_exists(&config.partial_output_path())?;

    let temp_dir = config.temp_dir();
    remove_dir_if_exists(&temp_dir)?;
    if config.strategy == Strategy::Disk {
        fs::create_dir_all(&temp_dir)?;
        debug!("Created group directory {}", temp_dir.display());
    }

    Ok(())
}

/// Move the fully written partial output to its final name.
pub fn promote(partial: &Path, output: &Path) -> Result<()> {
    fs::rename(partial, output)?;
    debug!("Promoted {} to {}", partial.display(), output.display());
    Ok(())
}

/// Remove the group-file directory unless the config asks to keep it.
pub fn discard_temp(config: &DedupConfig) -> Result<()> {
    if config.keep_temp {
        return Ok(());
    }
    remove_dir_if_exists(&config.temp_dir())
}

/// Reject configs whose output, partial file, or group directory would
/// overwrite or remove the input.
pub fn ensure_input_preserved(config: &DedupConfig) -> Result<()> {
    let Ok(input) = fs::canonicalize(&config.input) else {
        return Ok(());
    };

    for path in [config.output_path(), config.partial_output_path()] {
        if fs::canonicalize(&path).is_ok_and(|resolved| resolved == input) {
            return Err(DedupError::InvalidConfig(format!(
                "input {} would be replaced by output {}",
                config.input.display(),
                path.display()
            )));
        }
    }

    let temp_dir = config.temp_dir();
    if fs::canonicalize(&temp_dir).is_ok_and(|dir| input.starts_with(dir)) {
        return Err(DedupError::InvalidConfig(format!(
            "input {} is inside the group directory {}, which is cleared on every run",
            config.input.display(),
            temp_dir.display()
        )));
    }

    Ok(())
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
