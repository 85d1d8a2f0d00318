//! End-to-end flow across both session types against one shared store:
//! the student drafts and autosaves, the coach reviews and annotates,
//! the student sees and resolves the feedback.

use std::sync::Arc;
use std::time::{Duration, Instant};

use essay_core::{
    AnnotationStatus, CollectingNotifier, DocumentStore, EditorOptions, EditorSession,
    EssayStatus, MemoryStore, ReviewSession, SaveIndicator, TextRange,
};
use uuid::Uuid;

const MS: Duration = Duration::from_millis(1);

fn options() -> EditorOptions {
    EditorOptions {
        debounce: 30 * MS,
        snapshot_threshold: 100,
    }
}

#[tokio::test]
async fn draft_review_resolve_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(CollectingNotifier::new());
    let student_id = Uuid::new_v4();
    let coach_id = Uuid::new_v4();

    let doc = store
        .create_document(student_id, "Why Us", "Tell us why this school.")
        .await
        .unwrap();

    // --- Student drafts. ---
    let mut editor = EditorSession::open_with_options(
        store.clone(),
        store.clone(),
        notifier.clone(),
        doc.id,
        options(),
    )
    .await
    .unwrap();

    let base = Instant::now();
    editor.on_edit_at("The quick brown fox".to_string(), base);
    assert!(editor.has_unsaved_changes());
    editor.flush_due_at(base + 30 * MS).await.unwrap();
    assert!(matches!(editor.indicator(), SaveIndicator::SavedAt(_)));

    // Submit for review: save-then-status ordering, forced save included.
    editor.on_edit_at("The quick brown fox jumps.".to_string(), base + 40 * MS);
    editor.submit_for_review().await.unwrap();
    assert_eq!(editor.document().status, EssayStatus::CoachReview);
    assert!(!editor.has_unsaved_changes());

    // --- Coach reviews. ---
    let mut review = ReviewSession::open(
        store.clone(),
        store.clone(),
        notifier.clone(),
        coach_id,
        doc.id,
    )
    .await
    .unwrap();
    assert_eq!(review.body(), "The quick brown fox jumps.");
    assert_eq!(review.document().status, EssayStatus::CoachReview);

    let annotation = review
        .comment_on_selection(4, 15, "nice imagery")
        .await
        .unwrap();
    assert_eq!(annotation.range, Some(TextRange { start: 4, end: 15 }));
    review.add_general_comment("Strong start overall.").await.unwrap();
    review.set_status(EssayStatus::Revision).await.unwrap();

    // --- Student reopens and sees the feedback. ---
    let mut editor = EditorSession::open_with_options(
        store.clone(),
        store.clone(),
        notifier.clone(),
        doc.id,
        options(),
    )
    .await
    .unwrap();
    assert_eq!(editor.document().status, EssayStatus::Revision);
    assert_eq!(editor.annotations().len(), 2);

    let segments = editor.render_annotations();
    let concatenated: String = segments.iter().map(|s| s.text).collect();
    assert_eq!(concatenated, "The quick brown fox jumps.");
    let highlighted: Vec<&str> = segments
        .iter()
        .filter(|s| s.highlight.is_some())
        .map(|s| s.text)
        .collect();
    assert_eq!(highlighted, vec!["quick brown"]);

    // Resolve the inline comment; the store reflects it.
    editor.resolve_annotation(annotation.id).await.unwrap();
    let bundle = store.fetch_document(doc.id).await.unwrap();
    let stored = bundle
        .annotations
        .iter()
        .find(|a| a.id == annotation.id)
        .unwrap();
    assert_eq!(stored.status, AnnotationStatus::Resolved);

    // No warnings surfaced anywhere along the happy path.
    assert!(notifier.drain().is_empty());
}

#[tokio::test]
async fn stale_anchor_survives_student_rewrite() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(CollectingNotifier::new());
    let doc = store
        .create_document(Uuid::new_v4(), "Essay", "Prompt")
        .await
        .unwrap();

    // A hundred characters of draft, annotated near the end.
    let long_body = "x".repeat(100);
    store.save_body(doc.id, &long_body, 1).await.unwrap();

    let mut review = ReviewSession::open(
        store.clone(),
        store.clone(),
        notifier.clone(),
        Uuid::new_v4(),
        doc.id,
    )
    .await
    .unwrap();
    review.comment_on_selection(80, 95, "trim this").await.unwrap();

    // The student cuts the draft in half. The anchor now points past the
    // end of the body; rendering must skip it without losing any text.
    let short_body = "y".repeat(50);
    store.save_body(doc.id, &short_body, 1).await.unwrap();

    let editor = EditorSession::open(
        store.clone(),
        store.clone(),
        notifier.clone(),
        doc.id,
    )
    .await
    .unwrap();
    let segments = editor.render_annotations();
    let concatenated: String = segments.iter().map(|s| s.text).collect();
    assert_eq!(concatenated, short_body);
    assert!(segments.iter().all(|s| s.highlight.is_none()));
}
