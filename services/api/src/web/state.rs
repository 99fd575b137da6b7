//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;
use study_companion_core::generator::StudyItemGenerator;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Generates study content straight from the chat proxy. `None` when no
    /// server-side credential is configured.
    pub generator: Option<Arc<StudyItemGenerator>>,
}
