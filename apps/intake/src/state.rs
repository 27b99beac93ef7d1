use std::sync::Arc;

use crate::config::Config;
use crate::intake::ValidationPolicy;
use crate::session::{Pipeline, SessionStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Built once from config; the intake gate reads it on every upload.
    pub policy: Arc<ValidationPolicy>,
    pub sessions: SessionStore,
    /// Owns the pluggable parser and scorer.
    pub pipeline: Pipeline,
}
