//! crates/essay_core/src/domain.rs
//!
//! Defines the pure, core data structures for the essay subsystem.
//! These structs are independent of any database or serialization format
//! beyond the serde derives used by the surrounding record layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::EssayStatus;

/// Counts the words in a document body by whitespace splitting.
///
/// The stored word count is only ever a cached projection of this function;
/// the body text is the source of truth.
pub fn word_count(body: &str) -> usize {
    body.split_whitespace().count()
}

/// An essay being drafted by a student and reviewed by a coach.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    /// The owning student. Exactly one per document.
    pub student_id: Uuid,
    /// The assigned coach, if any.
    pub coach_id: Option<Uuid>,
    pub title: String,
    /// The prompt the essay responds to. Reference text, not edited here.
    pub prompt: String,
    /// Plain text body. Mutated only by the student's editing session.
    pub body: String,
    /// Cached projection of `word_count(&body)` at last save.
    pub word_count: usize,
    pub status: EssayStatus,
    /// Optional link to a target institution.
    pub school_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An immutable snapshot of a document body, written by the snapshotter.
///
/// Once written a version is never mutated, reordered, or individually
/// deleted; it goes away only when the owning document is deleted.
#[derive(Debug, Clone)]
pub struct Version {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Sequential, 1-based, monotonic per document.
    pub number: u32,
    pub body: String,
    pub word_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Whether a feedback item is anchored to a text range or document-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    General,
    Inline,
}

/// Lifecycle status of a feedback item. The transition is one-way:
/// `Open` -> `Resolved`, no reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    Open,
    Resolved,
}

/// A half-open `[start, end)` character range into the document body as it
/// existed when the annotation was created.
///
/// Offsets are character offsets, not byte offsets, so they stay meaningful
/// for non-ASCII text. They are *not* re-anchored when the body is edited
/// later; the renderer clamps them against the current body instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A feedback item left by a coach: general (document-scoped) or inline
/// (anchored to a `TextRange`). Never edited in place.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub id: Uuid,
    pub document_id: Uuid,
    pub author_id: Uuid,
    pub kind: AnnotationKind,
    pub content: String,
    pub status: AnnotationStatus,
    /// Present iff `kind` is `Inline`.
    pub range: Option<TextRange>,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    pub fn is_inline(&self) -> bool {
        self.kind == AnnotationKind::Inline
    }

    pub fn is_open(&self) -> bool {
        self.status == AnnotationStatus::Open
    }
}

/// The full snapshot returned by a document fetch: the document plus its
/// versions and annotations. Used on load and after any coach mutation.
#[derive(Debug, Clone)]
pub struct DocumentBundle {
    pub document: Document,
    pub versions: Vec<Version>,
    pub annotations: Vec<Annotation>,
}

impl DocumentBundle {
    /// Normalizes ordering after a fetch: versions by number ascending,
    /// annotations by creation time (ties broken by id).
    pub fn normalize(&mut self) {
        self.versions.sort_by_key(|v| v.number);
        self.annotations
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }
}
