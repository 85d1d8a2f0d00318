//! crates/essay_core/src/lib.rs
//!
//! The essay drafting & review core: a plain-text document concurrently
//! authored by a student and annotated by a coach, with debounced
//! autosave, durable version history, offset-anchored inline comments,
//! and a free-transition review-status workflow. No operational
//! transform or CRDT: conflict avoidance comes from role separation
//! (only the student writes the body) plus optimistic writes with
//! server-truth refetch on the coach side.
//!
//! The core is I/O-free except through the store ports in [`ports`];
//! the surrounding record-management service provides the adapters.

pub mod annotate;
pub mod autosave;
pub mod domain;
pub mod memstore;
pub mod optimistic;
pub mod ports;
pub mod render;
pub mod review;
pub mod session;
pub mod snapshot;
pub mod workflow;

pub use annotate::{AnchorError, InlineAnchor};
pub use autosave::{AutosaveScheduler, SaveIndicator, SaveTicket, DEFAULT_DEBOUNCE};
pub use domain::{
    word_count, Annotation, AnnotationKind, AnnotationStatus, Document, DocumentBundle, TextRange,
    Version,
};
pub use memstore::MemoryStore;
pub use optimistic::optimistic_write;
pub use ports::{
    CollectingNotifier, DocumentStore, FeedbackStore, Notifier, NoticeLevel, PortError,
    PortResult, TracingNotifier,
};
pub use render::{render_segments, Highlight, Segment};
pub use review::{ReviewError, ReviewResult, ReviewSession};
pub use session::{EditorOptions, EditorSession};
pub use snapshot::{SnapshotPolicy, DEFAULT_SNAPSHOT_THRESHOLD};
pub use workflow::{EssayStatus, StatusChange, UnknownStatus};
