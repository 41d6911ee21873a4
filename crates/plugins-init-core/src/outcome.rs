//! Result of a single best-effort file operation.
//!
//! Registration never aborts a run because one plugin's file could not be
//! written. Each step reports one of these instead, so callers can tell
//! "nothing to do" apart from "tried and failed".

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The file was written or removed
    Success,
    /// The input the operation needs does not exist
    NotFound,
    /// Nothing to do (unchanged content, empty input, directory entry)
    Skipped,
    /// The operation was attempted and failed; the reason has been logged
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// True when something was actually changed on disk
    pub fn changed(&self) -> bool {
        self.is_success()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NotFound => write!(f, "not found"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Tally of outcomes over a batch of plugins
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub written: usize,
    pub skipped: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success => self.written += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::NotFound => self.not_found += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
