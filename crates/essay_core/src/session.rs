//! crates/essay_core/src/session.rs
//!
//! The student-side editing session: one explicit state object per open
//! document, constructed by fetching the full bundle and discarded on
//! close. It owns the autosave scheduler and the snapshot policy, applies
//! the optimistic-write pattern to status/title/resolve actions, and
//! converts every persistence failure into a user notice while leaving
//! the in-memory body intact.
//!
//! The host drives autosave by polling: render loops call
//! `next_deadline()` to know when to wake and `flush_due()` once the
//! deadline passes. All methods taking `Instant` have plain wrappers
//! using `Instant::now()`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::autosave::{AutosaveScheduler, SaveIndicator, SaveTicket, DEFAULT_DEBOUNCE};
use crate::domain::{word_count, Annotation, AnnotationStatus, Document, Version};
use crate::optimistic::optimistic_write;
use crate::ports::{DocumentStore, FeedbackStore, Notifier, NoticeLevel, PortResult};
use crate::render::{render_segments, Segment};
use crate::snapshot::{SnapshotPolicy, DEFAULT_SNAPSHOT_THRESHOLD};
use crate::workflow::EssayStatus;

/// Tunables for an editing session. Defaults match the reference
/// behavior: 30 second debounce, 100 character snapshot threshold.
#[derive(Debug, Clone, Copy)]
pub struct EditorOptions {
    pub debounce: Duration,
    pub snapshot_threshold: usize,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            snapshot_threshold: DEFAULT_SNAPSHOT_THRESHOLD,
        }
    }
}

/// One student's active editing session for one document.
pub struct EditorSession {
    documents: Arc<dyn DocumentStore>,
    feedback: Arc<dyn FeedbackStore>,
    notifier: Arc<dyn Notifier>,
    document: Document,
    versions: Vec<Version>,
    annotations: Vec<Annotation>,
    scheduler: AutosaveScheduler,
    snapshots: SnapshotPolicy,
    active_annotation: Option<Uuid>,
    /// Set while a submit-style action is in flight so the host can
    /// disable the triggering control against double submission.
    busy: bool,
}

impl EditorSession {
    /// Opens a session by fetching the full document bundle.
    ///
    /// A fetch failure is terminal for the session: it is surfaced as a
    /// page-level error notice and returned to the caller.
    pub async fn open(
        documents: Arc<dyn DocumentStore>,
        feedback: Arc<dyn FeedbackStore>,
        notifier: Arc<dyn Notifier>,
        document_id: Uuid,
    ) -> PortResult<Self> {
        Self::open_with_options(documents, feedback, notifier, document_id, EditorOptions::default())
            .await
    }

    pub async fn open_with_options(
        documents: Arc<dyn DocumentStore>,
        feedback: Arc<dyn FeedbackStore>,
        notifier: Arc<dyn Notifier>,
        document_id: Uuid,
        options: EditorOptions,
    ) -> PortResult<Self> {
        let bundle = match documents.fetch_document(document_id).await {
            Ok(bundle) => bundle,
            Err(e) => {
                notifier.notify(NoticeLevel::Error, "This essay could not be loaded.");
                return Err(e);
            }
        };

        let scheduler = AutosaveScheduler::new(
            bundle.document.body.clone(),
            bundle.document.updated_at,
            options.debounce,
        );
        // The snapshot baseline is the latest version's body, or the body
        // at load time for a document that has no versions yet.
        let baseline = bundle
            .versions
            .last()
            .map(|v| v.body.as_str())
            .unwrap_or(bundle.document.body.as_str());
        let snapshots = SnapshotPolicy::new(baseline, options.snapshot_threshold);

        Ok(Self {
            documents,
            feedback,
            notifier,
            scheduler,
            snapshots,
            versions: bundle.versions,
            annotations: bundle.annotations,
            document: bundle.document,
            active_annotation: None,
            busy: false,
        })
    }

    //=====================================================================================
    // Editing and Autosave
    //=====================================================================================

    /// Records a new body immediately (live word count and rendering stay
    /// current) and restarts the debounce timer.
    pub fn on_edit(&mut self, body: String) {
        self.scheduler.record_edit(body);
    }

    pub fn on_edit_at(&mut self, body: String, now: Instant) {
        self.scheduler.record_edit_at(body, now);
    }

    /// When the host should next call `flush_due`.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Fires the debounce if due, performing the save (and any snapshot
    /// the policy calls for). Returns whether a save was applied. A save
    /// failure is surfaced as a notice and returned; the body stays in
    /// memory and stays dirty.
    pub async fn flush_due(&mut self) -> PortResult<bool> {
        self.flush_due_at(Instant::now()).await
    }

    pub async fn flush_due_at(&mut self, now: Instant) -> PortResult<bool> {
        match self.scheduler.poll_at(now) {
            Some(ticket) => self.perform_save(ticket).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Saves immediately, bypassing the debounce. No-op on a clean body.
    pub async fn save_now(&mut self) -> PortResult<bool> {
        match self.scheduler.save_now() {
            Some(ticket) => self.perform_save(ticket).await.map(|_| true),
            None => Ok(false),
        }
    }

    async fn perform_save(&mut self, ticket: SaveTicket) -> PortResult<()> {
        let save = self
            .documents
            .save_body(self.document.id, &ticket.body, ticket.word_count)
            .await;

        if let Err(e) = save {
            self.scheduler.complete_failure(&ticket);
            tracing::warn!(document_id = %self.document.id, error = %e, "autosave failed");
            self.notifier.notify(
                NoticeLevel::Warning,
                "Your changes could not be saved. They are kept locally and will retry after your next edit.",
            );
            return Err(e);
        }

        if self.scheduler.complete_success(&ticket) {
            self.document.body = ticket.body.clone();
            self.document.word_count = ticket.word_count;
            self.maybe_snapshot(&ticket).await;
        }
        Ok(())
    }

    /// Evaluates snapshot eligibility after an applied save. A failed
    /// version write is only a notice: the baseline does not advance, so
    /// the next successful save retries it.
    async fn maybe_snapshot(&mut self, ticket: &SaveTicket) {
        if !self.snapshots.should_snapshot(&ticket.body) {
            return;
        }
        match self
            .documents
            .create_version(self.document.id, &ticket.body, ticket.word_count)
            .await
        {
            Ok(version) => {
                tracing::info!(
                    document_id = %self.document.id,
                    number = version.number,
                    "version snapshot created"
                );
                self.snapshots.record_snapshot(&version.body);
                self.versions.push(version);
            }
            Err(e) => {
                tracing::warn!(document_id = %self.document.id, error = %e, "version snapshot failed");
                self.notifier
                    .notify(NoticeLevel::Warning, "A history snapshot could not be saved.");
            }
        }
    }

    //=====================================================================================
    // Status, Title, and Feedback Actions
    //=====================================================================================

    /// Submits the essay for coach review: a dirty body is saved first
    /// (synchronously, bypassing the debounce), and only after that save
    /// completes is the status written. A failed save aborts the submit.
    pub async fn submit_for_review(&mut self) -> PortResult<()> {
        if self.busy {
            return Ok(());
        }
        self.busy = true;
        let result = async {
            if self.scheduler.is_dirty() {
                self.save_now().await?;
            }
            self.set_status(EssayStatus::CoachReview).await
        }
        .await;
        self.busy = false;
        result
    }

    /// Changes the review status, optimistically: the local state updates
    /// immediately and is rolled back if the persistence call fails.
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
            tracing::warn!(document_id = %self.document.id, error = %e, "status change rolled back");
            self.notifier
                .notify(NoticeLevel::Warning, "The status change could not be saved.");
        }
        result
    }

    /// Renames the document. An empty title is an invalid local
    /// precondition and never reaches the store.
    pub async fn set_title(&mut self, title: &str) -> PortResult<()> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(());
        }
        let previous = self.document.title.clone();
        let next = title.to_string();
        let document_id = self.document.id;
        let result = optimistic_write(
            &mut self.document,
            |d| d.title = next,
            move |d| d.title = previous,
            self.documents.set_title(document_id, title),
        )
        .await;
        if let Err(e) = &result {
            tracing::warn!(document_id = %self.document.id, error = %e, "title change rolled back");
            self.notifier
                .notify(NoticeLevel::Warning, "The new title could not be saved.");
        }
        result
    }

    /// Resolves a coach's feedback item. One-way: an already-resolved
    /// annotation is a local no-op with no persistence call.
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

    /// Deletes the document, cascading versions and annotations. Consumes
    /// the session: a deleted document has nothing left to edit.
    pub async fn delete(self) -> PortResult<()> {
        self.documents.delete_document(self.document.id).await
    }

    //=====================================================================================
    // Read Side
    //=====================================================================================

    /// The live body, including edits not yet saved.
    pub fn body(&self) -> &str {
        self.scheduler.current_body()
    }

    /// Word count of the live body (the visible count, always current).
    pub fn live_word_count(&self) -> usize {
        word_count(self.scheduler.current_body())
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Projects the annotations onto the live body as highlight segments.
    pub fn render_annotations(&self) -> Vec<Segment<'_>> {
        render_segments(
            self.scheduler.current_body(),
            &self.annotations,
            self.active_annotation,
        )
    }

    /// Marks the annotation whose popover is open, if any.
    pub fn set_active_annotation(&mut self, annotation_id: Option<Uuid>) {
        self.active_annotation = annotation_id;
    }

    /// Backs the host's best-effort navigation/unload warning.
    pub fn has_unsaved_changes(&self) -> bool {
        self.scheduler.is_dirty()
    }

    pub fn indicator(&self) -> SaveIndicator {
        self.scheduler.indicator()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnnotationKind;
    use crate::memstore::MemoryStore;
    use crate::ports::{CollectingNotifier, PortError};

    const MS: Duration = Duration::from_millis(1);

    struct Fixture {
        store: Arc<MemoryStore>,
        notifier: Arc<CollectingNotifier>,
        session: EditorSession,
        base: Instant,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let doc = store
            .create_document(Uuid::new_v4(), "Why Us", "Tell us why.")
            .await
            .unwrap();
        let session = EditorSession::open_with_options(
            store.clone(),
            store.clone(),
            notifier.clone(),
            doc.id,
            EditorOptions {
                debounce: 30 * MS,
                snapshot_threshold: 100,
            },
        )
        .await
        .unwrap();
        Fixture {
            store,
            notifier,
            session,
            base: Instant::now(),
        }
    }

    #[tokio::test]
    async fn open_missing_document_is_terminal() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let result = EditorSession::open(
            store.clone(),
            store.clone(),
            notifier.clone(),
            Uuid::new_v4(),
        )
        .await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
        let notices = notifier.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn rapid_edits_produce_exactly_one_save_with_last_body() {
        let mut f = fixture().await;
        for i in 0..10 {
            f.session
                .on_edit_at(format!("draft number {i}"), f.base + i * MS);
            assert!(!f.session.flush_due_at(f.base + i * MS).await.unwrap());
        }

        let saved = f.session.flush_due_at(f.base + 9 * MS + 30 * MS).await.unwrap();
        assert!(saved);
        assert_eq!(f.store.calls("save_body"), 1);
        assert_eq!(f.session.document().body, "draft number 9");
        assert_eq!(f.session.document().word_count, 3);
        assert!(!f.session.has_unsaved_changes());
    }

    #[tokio::test]
    async fn save_past_threshold_writes_a_version() {
        let mut f = fixture().await;
        // 120 characters against an empty baseline crosses the threshold.
        let body = "w".repeat(120);
        f.session.on_edit_at(body.clone(), f.base);
        f.session.flush_due_at(f.base + 30 * MS).await.unwrap();

        assert_eq!(f.session.versions().len(), 1);
        assert_eq!(f.session.versions()[0].number, 1);
        assert_eq!(f.session.versions()[0].body, body);

        // Another 40 characters stays below threshold: no second version.
        f.session.on_edit_at("w".repeat(160), f.base + 40 * MS);
        f.session.flush_due_at(f.base + 70 * MS).await.unwrap();
        assert_eq!(f.session.versions().len(), 1);

        // Crossing the threshold against the new baseline snapshots again.
        f.session.on_edit_at("w".repeat(230), f.base + 80 * MS);
        f.session.flush_due_at(f.base + 110 * MS).await.unwrap();
        let numbers: Vec<u32> = f.session.versions().iter().map(|v| v.number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn failed_save_keeps_body_and_notifies() {
        let mut f = fixture().await;
        f.session.on_edit_at("precious words".into(), f.base);
        f.store.fail_next("save_body");

        let result = f.session.flush_due_at(f.base + 30 * MS).await;
        assert!(result.is_err());
        assert_eq!(f.session.body(), "precious words");
        assert!(f.session.has_unsaved_changes());
        assert_eq!(f.session.indicator(), SaveIndicator::Unsaved);
        assert_eq!(f.notifier.drain().len(), 1);

        // No retry until the next edit re-arms the debounce.
        assert!(!f.session.flush_due_at(f.base + 500 * MS).await.unwrap());
        f.session.on_edit_at("precious words!".into(), f.base + 600 * MS);
        assert!(f.session.flush_due_at(f.base + 630 * MS).await.unwrap());
        assert!(!f.session.has_unsaved_changes());
    }

    #[tokio::test]
    async fn submit_for_review_saves_before_status_write() {
        let mut f = fixture().await;
        f.session.on_edit_at("final draft text".into(), f.base);

        f.session.submit_for_review().await.unwrap();

        assert_eq!(f.session.document().status, EssayStatus::CoachReview);
        let ops = f.store.ops();
        let save_pos = ops.iter().position(|o| *o == "save_body").unwrap();
        let status_pos = ops.iter().position(|o| *o == "set_status").unwrap();
        assert!(save_pos < status_pos);
    }

    #[tokio::test]
    async fn submit_for_review_aborts_when_save_fails() {
        let mut f = fixture().await;
        f.session.on_edit_at("unsaved".into(), f.base);
        f.store.fail_next("save_body");

        assert!(f.session.submit_for_review().await.is_err());
        assert_eq!(f.session.document().status, EssayStatus::Brainstorming);
        assert_eq!(f.store.calls("set_status"), 0);
    }

    #[tokio::test]
    async fn status_change_rolls_back_on_failure() {
        let mut f = fixture().await;
        f.store.fail_next("set_status");

        let result = f.session.set_status(EssayStatus::Revision).await;
        assert!(result.is_err());
        assert_eq!(f.session.document().status, EssayStatus::Brainstorming);
        assert_eq!(f.notifier.drain().len(), 1);

        // Retrying by triggering the action again succeeds.
        f.session.set_status(EssayStatus::Revision).await.unwrap();
        assert_eq!(f.session.document().status, EssayStatus::Revision);
    }

    #[tokio::test]
    async fn empty_title_never_reaches_the_store() {
        let mut f = fixture().await;
        f.session.set_title("   ").await.unwrap();
        assert_eq!(f.store.calls("set_title"), 0);
        assert_eq!(f.session.document().title, "Why Us");

        f.session.set_title("Why This College").await.unwrap();
        assert_eq!(f.session.document().title, "Why This College");
    }

    #[tokio::test]
    async fn resolving_twice_issues_one_call() {
        let mut f = fixture().await;
        let doc_id = f.session.document().id;
        let annotation = f
            .store
            .create_annotation(
                doc_id,
                Uuid::new_v4(),
                AnnotationKind::General,
                "tighten this paragraph",
                None,
            )
            .await
            .unwrap();
        // Pick up the coach's annotation the way the UI would: reopen.
        f.session = EditorSession::open(
            f.store.clone(),
            f.store.clone(),
            f.notifier.clone(),
            doc_id,
        )
        .await
        .unwrap();

        f.session.resolve_annotation(annotation.id).await.unwrap();
        assert_eq!(
            f.session.annotations()[0].status,
            AnnotationStatus::Resolved
        );

        f.session.resolve_annotation(annotation.id).await.unwrap();
        assert_eq!(f.store.calls("resolve_annotation"), 1);
    }

    #[tokio::test]
    async fn resolve_rolls_back_on_failure() {
        let mut f = fixture().await;
        let doc_id = f.session.document().id;
        let annotation = f
            .store
            .create_annotation(doc_id, Uuid::new_v4(), AnnotationKind::General, "note", None)
            .await
            .unwrap();
        f.session = EditorSession::open(
            f.store.clone(),
            f.store.clone(),
            f.notifier.clone(),
            doc_id,
        )
        .await
        .unwrap();

        f.store.fail_next("resolve_annotation");
        assert!(f.session.resolve_annotation(annotation.id).await.is_err());
        assert!(f.session.annotations()[0].is_open());
    }

    #[tokio::test]
    async fn live_word_count_tracks_unsaved_edits() {
        let mut f = fixture().await;
        f.session.on_edit_at("one two three".into(), f.base);
        assert_eq!(f.session.live_word_count(), 3);
        assert_eq!(f.session.document().word_count, 0);
        assert!(f.session.has_unsaved_changes());
    }

    #[tokio::test]
    async fn delete_consumes_the_session() {
        let f = fixture().await;
        let store = f.store.clone();
        let doc_id = f.session.document().id;
        f.session.delete().await.unwrap();
        assert!(matches!(
            store.fetch_document(doc_id).await,
            Err(PortError::NotFound(_))
        ));
    }
}
