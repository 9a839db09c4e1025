//! Run orchestration.
//!
//! A run scans the input once, classifies every record by fingerprint, and
//! produces one output line per fingerprint with two or more records. The
//! [`Strategy`] decides whether groups are built on disk during the scan or
//! from memory after it.
//!
//! ```rust,no_run
//! use certdup::{DedupConfig, Deduplicator, Strategy};
//!
//! let config = DedupConfig::new("ctl_records.jsonlines")
//!     .with_output_dir("output")
//!     .with_strategy(Strategy::Disk);
//! let stats = Deduplicator::new(config).run().unwrap();
//! println!("{} fingerprints have duplicates", stats.duplicated_fingerprints);
//! ```

use crate::config::{DedupConfig, MalformedPolicy, Strategy};
use crate::disk::{merge_groups, DiskResidentWriter};
use crate::error::{DedupError, Result};
use crate::fingerprint::extract_fingerprint;
use crate::index::Occurrence;
use crate::memory::MemoryResidentWriter;
use crate::progress::{Phase, ProgressReporter, TracingReporter};
use crate::scanner::{Record, RecordScanner};
use crate::workspace::{discard_temp, prepare_output, promote};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Statistics from one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DedupStats {
    /// Strategy used.
    pub strategy: Strategy,
    /// Records with a fingerprint.
    pub records: u64,
    /// Distinct fingerprints.
    pub unique_fingerprints: u64,
    /// Fingerprints with two or more records (one output group each).
    pub duplicated_fingerprints: u64,
    /// Records belonging to some output group.
    pub duplicate_records: u64,
    /// Lines skipped under [`MalformedPolicy::Skip`].
    pub malformed_skipped: u64,
    /// Groups in the final output.
    pub groups_written: u64,
    /// Size of the final output in bytes.
    pub bytes_written: u64,
    /// Wall-clock time of the run.
    pub elapsed_secs: f64,
}

impl DedupStats {
    fn count(&mut self, occurrence: Occurrence) {
        match occurrence {
            Occurrence::First => self.unique_fingerprints += 1,
            Occurrence::Second => {
                self.duplicated_fingerprints += 1;
                self.duplicate_records += 2;
            }
            Occurrence::Repeat => self.duplicate_records += 1,
        }
    }

    /// Records per second.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.records as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

/// Finds certificate records that share a fingerprint.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    #[must_use]
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Run with phase boundaries logged through `tracing`.
    pub fn run(&self) -> Result<DedupStats> {
        self.run_with_reporter(&mut TracingReporter)
    }

    /// Run, reporting phase boundaries and progress to `reporter`.
    ///
    /// On success the output file holds every group. On failure no output
    /// file exists at the final path, and any group files are left in place.
    pub fn run_with_reporter(&self, reporter: &mut dyn ProgressReporter) -> Result<DedupStats> {
        let config = &self.config;
        if !config.input.exists() {
            return Err(DedupError::InputNotFound {
                path: config.input.clone(),
            });
        }
        config.validate()?;
        prepare_output(config)?;

        info!(
            input = %config.input.display(),
            output = %config.output_path().display(),
            strategy = %config.strategy,
            "Starting deduplication"
        );

        let start = Instant::now();
        let mut stats = DedupStats {
            strategy: config.strategy,
            ..DedupStats::default()
        };

        let partial = config.partial_output_path();
        match config.strategy {
            Strategy::Disk => self.run_disk(&partial, reporter, &mut stats)?,
            Strategy::Memory => self.run_memory(&partial, reporter, &mut stats)?,
        }

        promote(&partial, &config.output_path())?;
        if config.strategy == Strategy::Disk {
            discard_temp(config)?;
        }

        stats.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            records = stats.records,
            unique = stats.unique_fingerprints,
            duplicated = stats.duplicated_fingerprints,
            elapsed_secs = stats.elapsed_secs,
            "Deduplication finished"
        );
        Ok(stats)
    }

    fn run_disk(
        &self,
        partial: &Path,
        reporter: &mut dyn ProgressReporter,
        stats: &mut DedupStats,
    ) -> Result<()> {
        let config = &self.config;
        let mut writer = DiskResidentWriter::new(&config.input, config.temp_dir())?;

        timed(reporter, Phase::Scan, |reporter| {
            scan_input(config, reporter, stats, |fingerprint, record| {
                writer.observe(fingerprint, record)
            })
        })?;

        let groups = writer.group_paths();
        stats.groups_written = groups.len() as u64;
        stats.bytes_written = timed(reporter, Phase::Merge, |_| merge_groups(&groups, partial))?;
        Ok(())
    }

    fn run_memory(
        &self,
        partial: &Path,
        reporter: &mut dyn ProgressReporter,
        stats: &mut DedupStats,
    ) -> Result<()> {
        let config = &self.config;
        let mut writer = MemoryResidentWriter::new();

        timed(reporter, Phase::Scan, |reporter| {
            scan_input(config, reporter, stats, |fingerprint, record| {
                Ok(writer.observe(fingerprint, record.location))
            })
        })?;

        let summary = timed(reporter, Phase::Write, |_| {
            writer.write_to_path(&config.input, partial)
        })?;
        stats.groups_written = summary.groups;
        stats.bytes_written = summary.bytes;
        Ok(())
    }
}

/// Run with default settings, writing into `output_dir`.
pub fn deduplicate<P: AsRef<Path>>(input: P, output_dir: P) -> Result<DedupStats> {
    Deduplicator::new(DedupConfig::new(input).with_output_dir(output_dir)).run()
}

fn timed<T, F>(reporter: &mut dyn ProgressReporter, phase: Phase, f: F) -> Result<T>
where
    F: FnOnce(&mut dyn ProgressReporter) -> Result<T>,
{
    reporter.phase_started(phase);
    let start = Instant::now();
    let value = f(reporter)?;
    reporter.phase_finished(phase, start.elapsed());
    Ok(value)
}

/// Scan the input, handing each record and its fingerprint to `observe`.
fn scan_input<F>(
    config: &DedupConfig,
    reporter: &mut dyn ProgressReporter,
    stats: &mut DedupStats,
    mut observe: F,
) -> Result<()>
where
    F: FnMut(&str, &Record) -> Result<Occurrence>,
{
    let scanner = RecordScanner::open(&config.input)?;
    let mut seen = 0u64;

    for record in scanner {
        let record = record?;
        seen += 1;

        match extract_fingerprint(&record.bytes) {
            Ok(fingerprint) => {
                stats.records += 1;
                let occurrence = observe(&fingerprint, &record)?;
                stats.count(occurrence);
            }
            Err(reason) => match config.on_malformed {
                MalformedPolicy::Abort => {
                    return Err(DedupError::MalformedRecord {
                        offset: record.location.offset,
                        reason,
                    })
                }
                MalformedPolicy::Skip => {
                    warn!(offset = record.location.offset, %reason, "Skipping malformed record");
                    stats.malformed_skipped += 1;
                }
            },
        }

        if seen % config.report_interval == 0 {
            reporter.records_scanned(seen);
        }
    }

    Ok(())
}
