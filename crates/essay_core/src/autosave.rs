//! crates/essay_core/src/autosave.rs
//!
//! Debounced autosave scheduling: converts keystroke-level edits into a
//! bounded number of durable writes without losing data.
//!
//! The scheduler is a pure state machine. Every operation has an `*_at`
//! variant taking an explicit `Instant`, so debounce behavior is testable
//! without sleeping; the plain variants wrap `Instant::now()`. The caller
//! (see `session::EditorSession`) owns the actual I/O: it asks for a due
//! `SaveTicket`, performs the persistence call, and reports the outcome
//! back here.
//!
//! Saves are tagged with a monotonic sequence number. A still-in-flight
//! older save is never cancelled; if it completes after a newer save has
//! already been applied, its result is discarded rather than allowed to
//! roll the baseline backwards.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::domain::word_count;

/// Delay after the last edit before a save attempt fires. Pure debounce:
/// every edit inside the window restarts it.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(30);

/// Derived save-indicator state. The three states are mutually exclusive
/// and always computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveIndicator {
    /// At least one save request is in flight.
    Saving,
    /// The body differs from the last saved body and nothing is in flight.
    Unsaved,
    /// The body equals the last saved body; carries the save timestamp.
    SavedAt(DateTime<Utc>),
}

/// A save the scheduler has handed out: the body to persist, its derived
/// word count, and the sequence number used to order completions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    pub seq: u64,
    pub body: String,
    pub word_count: usize,
}

/// Debounce state for one open document.
#[derive(Debug)]
pub struct AutosaveScheduler {
    debounce: Duration,
    current_body: String,
    last_saved_body: String,
    last_saved_at: DateTime<Utc>,
    /// Set on every edit, cleared when a save is issued or the timer
    /// fires on a clean body. `None` means no deadline is pending.
    last_edit_at: Option<Instant>,
    in_flight: usize,
    next_seq: u64,
    highest_applied_seq: u64,
}

impl AutosaveScheduler {
    /// Starts clean: the given body is both current and last-saved, with
    /// `saved_at` seeding the indicator (the document's updated-at on load).
    pub fn new(body: String, saved_at: DateTime<Utc>, debounce: Duration) -> Self {
        Self {
            debounce,
            last_saved_body: body.clone(),
            current_body: body,
            last_saved_at: saved_at,
            last_edit_at: None,
            in_flight: 0,
            next_seq: 0,
            highest_applied_seq: 0,
        }
    }

    pub fn with_default_debounce(body: String, saved_at: DateTime<Utc>) -> Self {
        Self::new(body, saved_at, DEFAULT_DEBOUNCE)
    }

    /// Records a new body as the current in-memory state immediately and
    /// restarts the debounce timer.
    pub fn record_edit(&mut self, body: String) {
        self.record_edit_at(body, Instant::now());
    }

    pub fn record_edit_at(&mut self, body: String, now: Instant) {
        self.current_body = body;
        self.last_edit_at = Some(now);
    }

    /// The instant the pending debounce fires, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_edit_at.map(|t| t + self.debounce)
    }

    /// Fires the debounce if its deadline has passed.
    ///
    /// Returns a ticket when the body actually needs saving. A clean body
    /// at fire time clears the timer and yields nothing (idempotent
    /// no-op). Issuing a ticket clears the timer too: the next deadline
    /// comes from the next edit, even if this save ultimately fails.
    pub fn poll(&mut self) -> Option<SaveTicket> {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> Option<SaveTicket> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.last_edit_at = None;
        if !self.is_dirty() {
            return None;
        }
        Some(self.issue_ticket())
    }

    /// Issues a save immediately, bypassing the debounce. Used by
    /// submit-for-review and the explicit save action. `None` when the
    /// body is already saved.
    pub fn save_now(&mut self) -> Option<SaveTicket> {
        self.last_edit_at = None;
        if !self.is_dirty() {
            return None;
        }
        Some(self.issue_ticket())
    }

    fn issue_ticket(&mut self) -> SaveTicket {
        self.next_seq += 1;
        self.in_flight += 1;
        SaveTicket {
            seq: self.next_seq,
            body: self.current_body.clone(),
            word_count: word_count(&self.current_body),
        }
    }

    /// Applies a successful save. Returns `false` when the completion is
    /// stale (a newer save was already applied) and was discarded.
    pub fn complete_success(&mut self, ticket: &SaveTicket) -> bool {
        self.complete_success_at(ticket, Utc::now())
    }

    pub fn complete_success_at(&mut self, ticket: &SaveTicket, saved_at: DateTime<Utc>) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        if ticket.seq <= self.highest_applied_seq {
            return false;
        }
        self.highest_applied_seq = ticket.seq;
        self.last_saved_body = ticket.body.clone();
        self.last_saved_at = saved_at;
        true
    }

    /// Records a failed save. The in-memory body is untouched and stays
    /// dirty; no retry is scheduled until the next edit restarts the
    /// debounce.
    pub fn complete_failure(&mut self, _ticket: &SaveTicket) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// True while the current body differs from the last-saved body.
    /// Backs the host's unsaved-changes navigation guard.
    pub fn is_dirty(&self) -> bool {
        self.current_body != self.last_saved_body
    }

    pub fn indicator(&self) -> SaveIndicator {
        if self.in_flight > 0 {
            SaveIndicator::Saving
        } else if self.is_dirty() {
            SaveIndicator::Unsaved
        } else {
            SaveIndicator::SavedAt(self.last_saved_at)
        }
    }

    pub fn current_body(&self) -> &str {
        &self.current_body
    }

    pub fn last_saved_body(&self) -> &str {
        &self.last_saved_body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn scheduler(body: &str) -> (AutosaveScheduler, Instant) {
        let s = AutosaveScheduler::new(body.to_string(), Utc::now(), 30 * MS);
        (s, Instant::now())
    }

    #[test]
    fn every_edit_restarts_the_debounce() {
        let (mut s, base) = scheduler("");
        s.record_edit_at("a".into(), base);
        assert_eq!(s.deadline(), Some(base + 30 * MS));

        s.record_edit_at("ab".into(), base + 10 * MS);
        assert_eq!(s.deadline(), Some(base + 40 * MS));

        // Not due before the restarted deadline.
        assert!(s.poll_at(base + 35 * MS).is_none());
    }

    #[test]
    fn rapid_edits_collapse_into_one_save_with_last_body() {
        // Edits faster than the window, then a pause.
        let (mut s, base) = scheduler("");
        for i in 0..10 {
            s.record_edit_at(format!("draft {i}"), base + i * MS);
            assert!(s.poll_at(base + i * MS).is_none());
        }

        let ticket = s.poll_at(base + 9 * MS + 30 * MS).unwrap();
        assert_eq!(ticket.body, "draft 9");
        assert_eq!(ticket.word_count, 2);

        // The one fire cleared the timer; nothing further is due.
        s.complete_success(&ticket);
        assert!(s.poll_at(base + 200 * MS).is_none());
    }

    #[test]
    fn clean_body_at_fire_time_is_a_no_op() {
        let (mut s, base) = scheduler("same text");
        s.record_edit_at("same text".into(), base);
        assert!(s.poll_at(base + 30 * MS).is_none());
        assert!(s.deadline().is_none());
        assert_eq!(s.indicator(), SaveIndicator::SavedAt(s.last_saved_at));
    }

    #[test]
    fn indicator_walks_saving_unsaved_saved() {
        let (mut s, base) = scheduler("v1");
        assert!(matches!(s.indicator(), SaveIndicator::SavedAt(_)));

        s.record_edit_at("v2".into(), base);
        assert_eq!(s.indicator(), SaveIndicator::Unsaved);

        let ticket = s.poll_at(base + 30 * MS).unwrap();
        assert_eq!(s.indicator(), SaveIndicator::Saving);

        let saved_at = Utc::now();
        assert!(s.complete_success_at(&ticket, saved_at));
        assert_eq!(s.indicator(), SaveIndicator::SavedAt(saved_at));
        assert!(!s.is_dirty());
    }

    #[test]
    fn failure_leaves_dirty_and_schedules_no_retry() {
        let (mut s, base) = scheduler("v1");
        s.record_edit_at("v2".into(), base);
        let ticket = s.poll_at(base + 30 * MS).unwrap();
        s.complete_failure(&ticket);

        assert!(s.is_dirty());
        assert_eq!(s.indicator(), SaveIndicator::Unsaved);
        assert!(s.deadline().is_none());
        assert!(s.poll_at(base + 500 * MS).is_none());

        // The next edit re-arms the debounce and the save retries.
        s.record_edit_at("v3".into(), base + 600 * MS);
        let retry = s.poll_at(base + 630 * MS).unwrap();
        assert_eq!(retry.body, "v3");
    }

    #[test]
    fn stale_completion_is_discarded() {
        let (mut s, base) = scheduler("v1");
        s.record_edit_at("v2".into(), base);
        let older = s.poll_at(base + 30 * MS).unwrap();

        // A forced save overtakes the still-in-flight debounce save.
        s.record_edit_at("v3".into(), base + 31 * MS);
        let newer = s.save_now().unwrap();
        assert!(newer.seq > older.seq);

        assert!(s.complete_success(&newer));
        assert_eq!(s.last_saved_body(), "v3");

        // The older save completes afterwards; its result must not win.
        assert!(!s.complete_success(&older));
        assert_eq!(s.last_saved_body(), "v3");
        assert!(!s.is_dirty());
    }

    #[test]
    fn save_now_bypasses_the_debounce() {
        let (mut s, base) = scheduler("v1");
        s.record_edit_at("v2".into(), base);

        let ticket = s.save_now().unwrap();
        assert_eq!(ticket.body, "v2");
        // Forced save also cleared the pending deadline.
        assert!(s.deadline().is_none());

        // Clean body: nothing to force.
        s.complete_success(&ticket);
        assert!(s.save_now().is_none());
    }

    #[test]
    fn edit_during_flight_arms_a_second_cycle() {
        let (mut s, base) = scheduler("v1");
        s.record_edit_at("v2".into(), base);
        let first = s.poll_at(base + 30 * MS).unwrap();

        s.record_edit_at("v2 plus".into(), base + 40 * MS);
        assert_eq!(s.deadline(), Some(base + 70 * MS));

        assert!(s.complete_success(&first));
        // Still dirty against the newer edit; the second cycle fires.
        assert!(s.is_dirty());
        let second = s.poll_at(base + 70 * MS).unwrap();
        assert_eq!(second.body, "v2 plus");
    }
}
