//! crates/essay_core/src/snapshot.rs
//!
//! Decides when a successful autosave should also persist an immutable
//! version snapshot. The trigger is a character-count delta against the
//! body at the last snapshot, a cheap proxy for "meaningful change": it
//! undercounts same-length substitutions and overcounts scattered small
//! insertions, a tradeoff accepted for simplicity.
//!
//! Version numbers are assigned by the store at write time (max + 1), so
//! this policy only answers *whether* to snapshot, never *which number*.

use crate::annotate::char_len;

/// Character-count delta that triggers a new version.
pub const DEFAULT_SNAPSHOT_THRESHOLD: usize = 100;

/// Tracks the body at the last snapshot and applies the delta threshold.
#[derive(Debug, Clone)]
pub struct SnapshotPolicy {
    baseline_len: usize,
    threshold: usize,
}

impl SnapshotPolicy {
    /// Starts from the body the most recent version captured (or the
    /// body at load time for a document with no versions yet).
    pub fn new(baseline_body: &str, threshold: usize) -> Self {
        Self {
            baseline_len: char_len(baseline_body),
            threshold,
        }
    }

    pub fn with_default_threshold(baseline_body: &str) -> Self {
        Self::new(baseline_body, DEFAULT_SNAPSHOT_THRESHOLD)
    }

    /// True when the saved body has drifted far enough from the baseline
    /// to deserve a version. Growth and shrinkage count equally.
    pub fn should_snapshot(&self, saved_body: &str) -> bool {
        let current = char_len(saved_body);
        current.abs_diff(self.baseline_len) >= self.threshold
    }

    /// Advances the baseline after a version was successfully written.
    pub fn record_snapshot(&mut self, snapshot_body: &str) {
        self.baseline_len = char_len(snapshot_body);
    }

    pub fn baseline_len(&self) -> usize {
        self.baseline_len
    }
}
