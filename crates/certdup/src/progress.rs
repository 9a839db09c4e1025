//! Phase and progress reporting.
//!
//! Reporters observe a run at its phase boundaries. They have no effect on
//! the output.

use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Phases of a deduplication run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading the input and building the index. The disk strategy also
    /// writes group files during this phase.
    Scan,
    /// Writing groups from the in-memory index.
    Write,
    /// Concatenating group files into the final output.
    Merge,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Scan => write!(f, "scan"),
            Phase::Write => write!(f, "write"),
            Phase::Merge => write!(f, "merge"),
        }
    }
}

/// Receives phase boundaries and scan progress.
pub trait ProgressReporter {
    fn phase_started(&mut self, _phase: Phase) {}

    /// Called every `report_interval` records during the scan.
    fn records_scanned(&mut self, _records: u64) {}

    fn phase_finished(&mut self, _phase: Phase, _elapsed: Duration) {}
}

/// Reporter that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {}

/// Reporter that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn phase_started(&mut self, phase: Phase) {
        info!(%phase, "Phase started");
    }

    fn records_scanned(&mut self, records: u64) {
        debug!(records, "Scan progress");
    }

    fn phase_finished(&mut self, phase: Phase, elapsed: Duration) {
        info!(%phase, elapsed_secs = elapsed.as_secs_f64(), "Phase finished");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Reporter that records every event, for asserting call order.
    #[derive(Debug, Default)]
    pub struct RecordingReporter {
        pub events: Vec<String>,
    }

    impl ProgressReporter for RecordingReporter {
        fn phase_started(&mut self, phase: Phase) {
            self.events.push(format!("start:{phase}"));
        }

        fn records_scanned(&mut self, records: u64) {
            self.events.push(format!("scanned:{records}"));
        }

        fn phase_finished(&mut self, phase: Phase, _elapsed: Duration) {
            self.events.push(format!("finish:{phase}"));
        }
    }
}
