pub mod domain;
pub mod insights;
pub mod ports;
pub mod service;
pub mod sharing;
pub mod templates;

pub use domain::{
    AccessLogEntry, ConfigOwner, ConfigurationDraft, Insight, InsightKind, FocusArea, ReportConfiguration,
    ReportData, SharedReport, SharedReportSummary,
};
pub use insights::InsightOrchestrator;
pub use ports::{
    Clock, ExportFormat, GenerationOptions, MetricAggregator, PortError, PortResult, ReportRenderer,
    ReportStore, SystemClock, TextGenerator,
};
pub use service::{ExportArtifact, ReportService, ReportSource};
pub use sharing::{ShareReceipt, ShareRequest, SharedView, SharingGateway, ViewRequest};
