//! crates/job_tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) the reporting core depends on.
//! These traits form the boundary of the hexagonal architecture: the store,
//! the metric aggregator, the text generator and the renderers are all
//! supplied by the `api` service (or by fakes in tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AccessLogEntry, ReportConfiguration, ReportData, SharedReport, SharedReportSummary,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port and core operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// Deliberately carries no reason so callers cannot tell which check failed.
    #[error("Access denied")]
    AccessDenied,
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Operation timed out")]
    Timeout,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for configurations and shares.
#[async_trait]
pub trait ReportStore: Send + Sync {
    // --- Report Configurations ---
    async fn get_configuration(&self, id: Uuid) -> PortResult<ReportConfiguration>;

    /// Configurations owned by the user plus public templates.
    async fn list_configurations_for_user(&self, user_id: Uuid) -> PortResult<Vec<ReportConfiguration>>;

    async fn list_public_templates(&self) -> PortResult<Vec<ReportConfiguration>>;

    async fn count_templates(&self) -> PortResult<i64>;

    async fn insert_configuration(&self, config: &ReportConfiguration) -> PortResult<()>;

    async fn update_configuration(&self, config: &ReportConfiguration) -> PortResult<()>;

    async fn delete_configuration(&self, id: Uuid) -> PortResult<()>;

    /// Atomically increments `generation_count` and sets `last_generated`.
    async fn record_generation(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<()>;

    // --- Shared Reports ---
    /// Fails with `Conflict` when the token is already taken; never overwrites.
    async fn insert_shared_report(&self, share: &SharedReport) -> PortResult<()>;

    async fn get_shared_report(&self, id: Uuid) -> PortResult<SharedReport>;

    async fn get_shared_report_by_token(&self, token: &str) -> PortResult<SharedReport>;

    /// Appends `entry` to the access log, increments the view counter and sets
    /// `last_accessed_at`, as one atomic step. Only applies while the share is
    /// still active and unexpired at `entry.accessed_at`; otherwise fails with
    /// `AccessDenied`. Returns the new view count.
    async fn record_share_access(&self, share_id: Uuid, entry: &AccessLogEntry) -> PortResult<i64>;

    async fn list_share_access(&self, share_id: Uuid) -> PortResult<Vec<AccessLogEntry>>;

    async fn deactivate_shared_report(&self, id: Uuid) -> PortResult<()>;

    async fn list_shared_reports_for_owner(&self, owner_id: Uuid) -> PortResult<Vec<SharedReportSummary>>;
}

/// Turns a configuration into aggregated report data for one user.
#[async_trait]
pub trait MetricAggregator: Send + Sync {
    /// Must have no side effects visible to other requests. `as_of` is used
    /// both to resolve relative date ranges and as the `generated_at` stamp.
    async fn aggregate(
        &self,
        user_id: Uuid,
        config: &ReportConfiguration,
        as_of: DateTime<Utc>,
    ) -> PortResult<ReportData>;
}

/// Sampling bounds for one text-generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// An unreliable external text-generation collaborator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> PortResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// Converts canonical report data into one artifact format. Rendering is
/// synchronous and must be deterministic for identical input.
pub trait ReportRenderer: Send + Sync {
    fn format(&self) -> ExportFormat;

    fn render(&self, data: &ReportData, config: &ReportConfiguration) -> PortResult<Vec<u8>>;
}

/// Source of the current time, injectable so expiration can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
