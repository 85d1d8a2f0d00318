//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use essay_core::ports::{DocumentStore, FeedbackStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to
/// all handlers. Both ports are usually the same adapter instance, but
/// handlers only ever see the trait they need.
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub feedback: Arc<dyn FeedbackStore>,
    pub config: Arc<Config>,
}
