//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use job_tracker_core::ReportService;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
/// Everything mutable lives behind the store; requests share nothing else.
#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<ReportService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(reports: Arc<ReportService>, config: Arc<Config>) -> Self {
        Self { reports, config }
    }
}
