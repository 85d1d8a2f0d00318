//! crates/essay_core/src/review.rs
//!
//! The coach-side review session: a read-only view of the document, the
//! two feedback creation paths (inline via text selection, general via a
//! standing composer), and the status selector.
//!
//! The coach never writes the body. After every feedback creation the
//! session refetches the full bundle instead of merging locally, so it
//! converges on server truth regardless of what else changed. Status and
//! resolution use the shared optimistic-write pattern.

use std::sync::Arc;

use uuid::Uuid;

use crate::annotate::{AnchorError, InlineAnchor};
use crate::domain::{Annotation, AnnotationKind, AnnotationStatus, Document, Version};
use crate::optimistic::optimistic_write;
use crate::ports::{DocumentStore, FeedbackStore, Notifier, NoticeLevel, PortError, PortResult};
use crate::render::{render_segments, Segment};
use crate::workflow::EssayStatus;

/// Errors surfaced by review actions. Anchor and empty-comment cases are
/// invalid local preconditions; they never reach the stores.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Invalid selection: {0}")]
    Anchor(#[from] AnchorError),
    #[error("Comment text is empty")]
    EmptyComment,
    #[error(transparent)]
    Port(#[from] PortError),
}

pub type ReviewResult<T> = Result<T, ReviewError>;

/// One coach's active review session for one document.
pub struct ReviewSession {
    documents: Arc<dyn DocumentStore>,
    feedback: Arc<dyn FeedbackStore>,
    notifier: Arc<dyn Notifier>,
    coach_id: Uuid,
    document: Document,
    versions: Vec<Version>,
    annotations: Vec<Annotation>,
    active_annotation: Option<Uuid>,
    /// Set while a submit-style action is in flight so the composer can
    /// disable itself against duplicate submission.
    busy: bool,
}

impl ReviewSession {
    /// Opens a review session by fetching the full document bundle.
    /// A fetch failure is terminal and surfaced as a page-level notice.
    pub async fn open(
        documents: Arc<dyn DocumentStore>,
        feedback: Arc<dyn FeedbackStore>,
        notifier: Arc<dyn Notifier>,
        coach_id: Uuid,
        document_id: Uuid,
    ) -> PortResult<Self> {
        let mut bundle = match documents.fetch_document(document_id).await {
            Ok(bundle) => bundle,
            Err(e) => {
                notifier.notify(NoticeLevel::Error, "This essay could not be loaded.");
                return Err(e);
            }
        };
        bundle.normalize();
        Ok(Self {
            documents,
            feedback,
            notifier,
            coach_id,
            document: bundle.document,
            versions: bundle.versions,
            annotations: bundle.annotations,
            active_annotation: None,
            busy: false,
        })
    }

    //=====================================================================================
    // Feedback Creation
    //=====================================================================================

    /// Creates an inline comment anchored to `[start, end)` character
    /// offsets of the full document text, then refetches the bundle.
    pub async fn comment_on_selection(
        &mut self,
        start: usize,
        end: usize,
        text: &str,
    ) -> ReviewResult<Annotation> {
        let anchor = InlineAnchor::from_selection(&self.document.body, start, end)?;
        self.create_comment(AnnotationKind::Inline, text, Some(anchor))
            .await
    }

    /// Creates a general, document-scoped comment (append-only list,
    /// newest last), then refetches the bundle.
    pub async fn add_general_comment(&mut self, text: &str) -> ReviewResult<Annotation> {
        self.create_comment(AnnotationKind::General, text, None).await
    }

    async fn create_comment(
        &mut self,
        kind: AnnotationKind,
        text: &str,
        anchor: Option<InlineAnchor>,
    ) -> ReviewResult<Annotation> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ReviewError::EmptyComment);
        }
        if self.busy {
            return Err(ReviewError::Port(PortError::Unexpected(
                "A comment is already being submitted".to_string(),
            )));
        }

        self.busy = true;
        let created = self
            .feedback
            .create_annotation(
                self.document.id,
                self.coach_id,
                kind,
                text,
                anchor.map(|a| a.range()),
            )
            .await;
        let result = match created {
            Ok(annotation) => {
                // Server truth, not a local merge: anything else that
                // changed server-side comes along for free.
                self.refresh().await.map(|_| annotation).map_err(Into::into)
            }
            Err(e) => {
                tracing::warn!(document_id = %self.document.id, error = %e, "comment creation failed");
                self.notifier
                    .notify(NoticeLevel::Warning, "Your comment could not be saved.");
                Err(e.into())
            }
        };
        self.busy = false;
        result
    }

    async fn refresh(&mut self) -> PortResult<()> {
        let mut bundle = self.documents.fetch_document(self.document.id).await?;
        bundle.normalize();
        self.document = bundle.document;
        self.versions = bundle.versions;
        self.annotations = bundle.annotations;
        Ok(())
    }

    //=====================================================================================
    // Resolution and Status
    //=====================================================================================

    /// Resolves a feedback item, optimistically. One-way; resolving an
    /// already-resolved item is a local no-op.
    pub async fn resolve_annotation(&mut self, annotation_id: Uuid) -> PortResult<()> {
        let Some(index) = self.annotations.iter().position(|a| a.id == annotation_id) else {
            return Ok(());
        };
        if self.annotations[index].status == AnnotationStatus::Resolved {
            return Ok(());
        }
        let result = optimistic_write(
            &mut self.annotations,
            |a| a[index].status = AnnotationStatus::Resolved,
            |a| a[index].status = AnnotationStatus::Open,
            self.feedback.resolve_annotation(annotation_id),
        )
        .await;
        if let Err(e) = &result {
            tracing::warn!(%annotation_id, error = %e, "resolve rolled back");
            self.notifier
                .notify(NoticeLevel::Warning, "The comment could not be resolved.");
        }
        result
    }

    /// Changes the review status (e.g. bouncing the essay back to
    /// revision), optimistically with rollback. Persists immediately.
    pub async fn set_status(&mut self, to: EssayStatus) -> PortResult<()> {
        let from = self.document.status;
        let document_id = self.document.id;
        let result = optimistic_write(
            &mut self.document,
            |d| d.status = to,
            move |d| d.status = from,
            self.documents.set_status(document_id, to),
        )
        .await;
        if let Err(e) = &result {
            tracing::warn!(%document_id, error = %e, "status change rolled back");
            self.notifier
                .notify(NoticeLevel::Warning, "The status change could not be saved.");
        }
        result
    }

    //=====================================================================================
    // Read Side
    //=====================================================================================

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Read-only body view; the coach never edits it.
    pub fn body(&self) -> &str {
        &self.document.body
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// General feedback in creation order, newest last.
    pub fn general_feedback(&self) -> Vec<&Annotation> {
        self.annotations
            .iter()
            .filter(|a| a.kind == AnnotationKind::General)
            .collect()
    }

    /// Projects inline annotations onto the fetched body.
    pub fn render_annotations(&self) -> Vec<Segment<'_>> {
        render_segments(&self.document.body, &self.annotations, self.active_annotation)
    }

    pub fn set_active_annotation(&mut self, annotation_id: Option<Uuid>) {
        self.active_annotation = annotation_id;
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}
