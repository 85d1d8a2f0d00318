//! crates/essay_core/src/ports.rs
//!
//! Defines the service contracts (traits) the editor core consumes from the
//! surrounding record-management layer. These traits form the boundary of
//! the hexagonal architecture: the core never sees a database, a transport,
//! or a UI toolkit, only these ports.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Annotation, AnnotationKind, Document, DocumentBundle, TextRange, Version};
use crate::workflow::EssayStatus;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services
/// (database, network) behind the three cases the core cares about.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Terminal within a session: the document is gone or never existed.
    #[error("Item not found: {0}")]
    NotFound(String),
    /// Transient: the call failed but in-memory state is intact and the
    /// action may be retried by the user.
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    /// Terminal within a session: the caller lacks access.
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence operations for documents, their bodies, and their versions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Full snapshot: document plus versions plus annotations. Used on
    /// load and after any coach-side mutation (server-truth refetch).
    async fn fetch_document(&self, document_id: Uuid) -> PortResult<DocumentBundle>;

    /// Creates an empty document owned by `student_id`.
    async fn create_document(
        &self,
        student_id: Uuid,
        title: &str,
        prompt: &str,
    ) -> PortResult<Document>;

    /// Persists the current body and its derived word count.
    /// Idempotent when the body is unchanged.
    async fn save_body(&self, document_id: Uuid, body: &str, word_count: usize)
        -> PortResult<()>;

    /// Appends an immutable version snapshot. The store assigns the next
    /// sequential number at write time (max existing + 1).
    async fn create_version(
        &self,
        document_id: Uuid,
        body: &str,
        word_count: usize,
    ) -> PortResult<Version>;

    /// Writes a new review status. No transition legality is validated.
    async fn set_status(&self, document_id: Uuid, status: EssayStatus) -> PortResult<()>;

    /// Renames the document, independent of the body.
    async fn set_title(&self, document_id: Uuid, title: &str) -> PortResult<()>;

    /// Deletes the document, cascading its versions and annotations.
    async fn delete_document(&self, document_id: Uuid) -> PortResult<()>;
}

/// Persistence operations for feedback items.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Creates a feedback item. `range` must be `Some` iff `kind` is
    /// `Inline`; range validity against the body is the caller's job
    /// (see `annotate::InlineAnchor`).
    async fn create_annotation(
        &self,
        document_id: Uuid,
        author_id: Uuid,
        kind: AnnotationKind,
        content: &str,
        range: Option<TextRange>,
    ) -> PortResult<Annotation>;

    /// One-way `open -> resolved` transition.
    async fn resolve_annotation(&self, annotation_id: Uuid) -> PortResult<()>;
}

//=========================================================================================
// User-Facing Notification Port
//=========================================================================================

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Non-blocking, transient (e.g. a failed autosave).
    Warning,
    /// Terminal for the session (e.g. document not found on load).
    Error,
}

/// Sink for user-visible notifications. Persistence failures never
/// propagate past the call site; they are converted into one of these
/// notices plus a local rollback where an optimistic update was made.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// A `Notifier` that forwards notices to `tracing`. Suitable default for
/// hosts that surface failures through their own log pipeline.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Warning => tracing::warn!(notice = message, "user notice"),
            NoticeLevel::Error => tracing::error!(notice = message, "user notice"),
        }
    }
}

/// A `Notifier` that collects notices in memory so tests (and headless
/// hosts) can assert on what the user would have seen.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notices: std::sync::Mutex<Vec<(NoticeLevel, String)>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns all collected notices.
    pub fn drain(&self) -> Vec<(NoticeLevel, String)> {
        match self.notices.lock() {
            Ok(mut notices) => std::mem::take(&mut *notices),
            Err(_) => Vec::new(),
        }
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push((level, message.to_string()));
        }
    }
}
