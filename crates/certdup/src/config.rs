//! Run configuration.

use crate::error::{DedupError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Default directory for the final output and temporary files.
pub const DEFAULT_OUTPUT_DIR: &str = "output";
/// Default name of the merged output file.
pub const DEFAULT_OUTPUT_NAME: &str = "duplicate_certificates.jsonline";
/// Default name of the group-file directory inside the output directory.
pub const DEFAULT_TEMP_DIR_NAME: &str = "temp";

/// How duplicate groups are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Build each group incrementally in its own file, then merge.
    ///
    /// Memory is bounded by the number of unique fingerprints.
    #[default]
    Disk,
    /// Keep every location in memory and write all groups after the scan.
    ///
    /// No temporary files, but memory grows with the number of records.
    Memory,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Disk => write!(f, "disk"),
            Strategy::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(Strategy::Disk),
            "memory" => Ok(Strategy::Memory),
            other => Err(format!("Unknown strategy: {other} (expected disk or memory)")),
        }
    }
}

/// What to do with a line whose fingerprint cannot be extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Log the line's offset and continue.
    Skip,
}

/// Configuration for a deduplication run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Newline-delimited JSON input.
    pub input: PathBuf,
    /// Directory receiving the output file (and group files).
    pub output_dir: PathBuf,
    /// File name of the final output inside `output_dir`.
    pub output_name: String,
    /// Directory name for group files inside `output_dir`.
    pub temp_dir_name: String,
    /// Group construction strategy.
    pub strategy: Strategy,
    /// Keep group files after a successful merge.
    pub keep_temp: bool,
    /// Handling of lines without a usable fingerprint.
    pub on_malformed: MalformedPolicy,
    /// Records between progress callbacks.
    pub report_interval: u64,
}

impl DedupConfig {
    /// Create a config for `input` with default settings.
    #[must_use]
    pub fn new(input: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            temp_dir_name: DEFAULT_TEMP_DIR_NAME.to_string(),
            strategy: Strategy::default(),
            keep_temp: false,
            on_malformed: MalformedPolicy::default(),
            report_interval: 100_000,
        }
    }

    /// Create a config for `input`, reading overrides from the environment.
    ///
    /// Supported variables:
    /// - `CERTDUP_OUTPUT_DIR`: output directory
    /// - `CERTDUP_STRATEGY`: `disk` or `memory`
    /// - `CERTDUP_KEEP_TEMP`: `1` or `true` to keep group files
    #[must_use]
    pub fn from_env(input: impl AsRef<Path>) -> Self {
        let mut config = Self::new(input);

        if let Ok(dir) = std::env::var("CERTDUP_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        if let Some(strategy) = std::env::var("CERTDUP_STRATEGY")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.strategy = strategy;
        }

        config.keep_temp = std::env::var("CERTDUP_KEEP_TEMP")
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);

        config
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the output file name.
    #[must_use]
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }

    /// Set the group-file directory name.
    #[must_use]
    pub fn with_temp_dir_name(mut self, name: impl Into<String>) -> Self {
        self.temp_dir_name = name.into();
        self
    }

    /// Set the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Keep or discard group files after merging.
    #[must_use]
    pub fn with_keep_temp(mut self, keep: bool) -> Self {
        self.keep_temp = keep;
        self
    }

    /// Set the malformed-line policy.
    #[must_use]
    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    /// Set the progress reporting interval.
    #[must_use]
    pub fn with_report_interval(mut self, interval: u64) -> Self {
        self.report_interval = interval;
        self
    }

    /// Check that the derived paths are usable.
    pub fn validate(&self) -> Result<()> {
        if self.output_name.trim().is_empty() {
            return Err(DedupError::InvalidConfig(
                "output name must not be empty".to_string(),
            ));
        }
        if self.temp_dir_name.trim().is_empty() {
            return Err(DedupError::InvalidConfig(
                "temp directory name must not be empty".to_string(),
            ));
        }
        if self.output_name == self.temp_dir_name {
            return Err(DedupError::InvalidConfig(format!(
                "output name and temp directory name are both '{}'",
                self.output_name
            )));
        }
        for name in [&self.output_name, &self.temp_dir_name] {
            let mut components = Path::new(name).components();
            let plain = matches!(components.next(), Some(Component::Normal(_)))
                && components.next().is_none();
            if !plain {
                return Err(DedupError::InvalidConfig(format!(
                    "'{name}' must be a plain file name"
                )));
            }
        }
        if self.report_interval == 0 {
            return Err(DedupError::InvalidConfig(
                "report interval must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Final output file.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_name)
    }

    /// Output file while it is being written.
    #[must_use]
    pub fn partial_output_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.partial", self.output_name))
    }

    /// Directory holding per-fingerprint group files.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.output_dir.join(&self.temp_dir_name)
    }
}
