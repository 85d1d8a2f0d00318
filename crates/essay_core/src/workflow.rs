//! crates/essay_core/src/workflow.rs
//!
//! The review-status workflow for a document. Pure logic, no I/O.
//!
//! The statuses form an intended order of progression, but transitions are
//! deliberately unrestricted: any authorized actor may move a document from
//! any status to any other (a coach bouncing an essay from `CoachReview`
//! back to `Revision` is a normal event, not an error). No layer below the
//! UI raises an illegal-transition error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The review stage of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EssayStatus {
    Brainstorming,
    Outline,
    FirstDraft,
    Revision,
    CoachReview,
    Final,
}

impl EssayStatus {
    /// All statuses in intended order of progression. Drives status
    /// selector UIs; carries no transition restrictions.
    pub const ALL: [EssayStatus; 6] = [
        EssayStatus::Brainstorming,
        EssayStatus::Outline,
        EssayStatus::FirstDraft,
        EssayStatus::Revision,
        EssayStatus::CoachReview,
        EssayStatus::Final,
    ];

    /// Position in the intended progression, 0-based.
    pub fn progression_index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    /// The wire/storage name of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            EssayStatus::Brainstorming => "brainstorming",
            EssayStatus::Outline => "outline",
            EssayStatus::FirstDraft => "first_draft",
            EssayStatus::Revision => "revision",
            EssayStatus::CoachReview => "coach_review",
            EssayStatus::Final => "final",
        }
    }
}

impl fmt::Display for EssayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a status name that does not exist.
#[derive(Debug, thiserror::Error)]
#[error("Unknown essay status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for EssayStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brainstorming" => Ok(EssayStatus::Brainstorming),
            "outline" => Ok(EssayStatus::Outline),
            "first_draft" => Ok(EssayStatus::FirstDraft),
            "revision" => Ok(EssayStatus::Revision),
            "coach_review" => Ok(EssayStatus::CoachReview),
            "final" => Ok(EssayStatus::Final),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A status change requested by a student or coach.
///
/// Exists so callers can record the prior status for optimistic rollback;
/// the workflow itself imposes no legality check beyond what the type
/// system already guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: EssayStatus,
    pub to: EssayStatus,
}

impl StatusChange {
    pub fn new(from: EssayStatus, to: EssayStatus) -> Self {
        Self { from, to }
    }

    /// The inverse change, applied when persistence fails.
    pub fn rollback(self) -> StatusChange {
        StatusChange {
            from: self.to,
            to: self.from,
        }
    }

    /// True when the change moves backwards in the intended progression.
    pub fn is_regression(self) -> bool {
        self.to.progression_index() < self.from.progression_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_reaches_every_other() {
        for from in EssayStatus::ALL {
            for to in EssayStatus::ALL {
                // Any pair, including self-transitions, is representable
                // and carries no error path.
                let change = StatusChange::new(from, to);
                assert_eq!(change.rollback().to, from);
            }
        }
    }

    #[test]
    fn names_round_trip() {
        for status in EssayStatus::ALL {
            let parsed: EssayStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("peer_review".parse::<EssayStatus>().is_err());
    }

    #[test]
    fn progression_order_is_total() {
        let indices: Vec<usize> = EssayStatus::ALL
            .iter()
            .map(|s| s.progression_index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert!(StatusChange::new(EssayStatus::CoachReview, EssayStatus::Revision).is_regression());
        assert!(!StatusChange::new(EssayStatus::Revision, EssayStatus::Revision).is_regression());
    }
}
