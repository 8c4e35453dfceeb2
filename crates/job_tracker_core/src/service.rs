//! crates/job_tracker_core/src/service.rs
//!
//! The report pipeline: configuration → aggregation → optional insights →
//! rendering (export) or snapshot (share). Also enforces the ownership and
//! template rules for saved configurations.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{ConfigOwner, ConfigurationDraft, ReportConfiguration, ReportData};
use crate::insights::InsightOrchestrator;
use crate::ports::{
    Clock, ExportFormat, MetricAggregator, PortError, PortResult, ReportRenderer, ReportStore,
};
use crate::sharing::{ShareReceipt, ShareRequest, SharingGateway};
use crate::templates::default_templates;

/// Where the configuration for a generation request comes from.
#[derive(Debug, Clone)]
pub enum ReportSource {
    Saved(Uuid),
    AdHoc(ConfigurationDraft),
}

impl ReportSource {
    /// A saved configuration id wins over an ad hoc one; neither is a validation error.
    pub fn from_request(
        config_id: Option<Uuid>,
        ad_hoc_config: Option<ConfigurationDraft>,
    ) -> PortResult<Self> {
        match (config_id, ad_hoc_config) {
            (Some(id), _) => Ok(ReportSource::Saved(id)),
            (None, Some(draft)) => Ok(ReportSource::AdHoc(draft)),
            (None, None) => Err(PortError::Validation(
                "either configId or adHocConfig is required".to_string(),
            )),
        }
    }
}

/// A fully rendered export, ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
}

pub struct ReportService {
    store: Arc<dyn ReportStore>,
    aggregator: Arc<dyn MetricAggregator>,
    insights: InsightOrchestrator,
    sharing: SharingGateway,
    renderers: HashMap<ExportFormat, Arc<dyn ReportRenderer>>,
    clock: Arc<dyn Clock>,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn ReportStore>,
        aggregator: Arc<dyn MetricAggregator>,
        insights: InsightOrchestrator,
        sharing: SharingGateway,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            aggregator,
            insights,
            sharing,
            renderers: HashMap::new(),
            clock,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderers.insert(renderer.format(), renderer);
        self
    }

    pub fn sharing(&self) -> &SharingGateway {
        &self.sharing
    }

    //=====================================================================================
    // Generation, Export and Sharing
    //=====================================================================================

    pub async fn generate(&self, user_id: Uuid, source: ReportSource) -> PortResult<ReportData> {
        let now = self.clock.now();
        match source {
            ReportSource::Saved(id) => {
                let config = self.readable_configuration(user_id, id).await?;
                config.date_range.resolve(now)?;
                let data = self.build_report(user_id, &config, now).await?;
                self.store.record_generation(config.id, now).await?;
                Ok(data)
            }
            ReportSource::AdHoc(draft) => {
                draft.validate(now)?;
                let config = ReportConfiguration::from_draft(ConfigOwner::User(user_id), draft, now);
                self.build_report(user_id, &config, now).await
            }
        }
    }

    /// Generates and renders a saved configuration. The artifact is only
    /// returned once the renderer has completed.
    pub async fn export(
        &self,
        user_id: Uuid,
        config_id: Uuid,
        format: ExportFormat,
    ) -> PortResult<ExportArtifact> {
        let renderer = self
            .renderers
            .get(&format)
            .cloned()
            .ok_or_else(|| PortError::Validation(format!("unsupported export format: {:?}", format)))?;

        let now = self.clock.now();
        let config = self.readable_configuration(user_id, config_id).await?;
        config.date_range.resolve(now)?;
        let data = self.build_report(user_id, &config, now).await?;
        self.store.record_generation(config.id, now).await?;

        let filename = export_filename(&config.name, now.date_naive(), format);
        let bytes = tokio::task::spawn_blocking(move || renderer.render(&data, &config))
            .await
            .map_err(|e| PortError::Unexpected(format!("renderer task failed: {}", e)))??;

        info!("Exported {} ({} bytes).", filename, bytes.len());
        Ok(ExportArtifact {
            bytes,
            filename,
            content_type: format.content_type(),
        })
    }

    /// Generates the report once and freezes it behind a new share token.
    pub async fn share(
        &self,
        user_id: Uuid,
        config_id: Uuid,
        request: ShareRequest,
    ) -> PortResult<ShareReceipt> {
        self.sharing.validate(&request)?;

        let now = self.clock.now();
        let config = self.readable_configuration(user_id, config_id).await?;
        config.date_range.resolve(now)?;
        let snapshot = self.build_report(user_id, &config, now).await?;
        self.store.record_generation(config.id, now).await?;

        self.sharing.create(&config, user_id, snapshot, request).await
    }

    async fn build_report(
        &self,
        user_id: Uuid,
        config: &ReportConfiguration,
        now: DateTime<Utc>,
    ) -> PortResult<ReportData> {
        let mut data = self.aggregator.aggregate(user_id, config, now).await?;
        if config.wants_insights() {
            data.ai_insights = Some(self.insights.generate_insights(&data, config).await);
        }
        Ok(data)
    }

    //=====================================================================================
    // Configuration Management
    //=====================================================================================

    pub async fn create_configuration(
        &self,
        user_id: Uuid,
        draft: ConfigurationDraft,
    ) -> PortResult<ReportConfiguration> {
        let now = self.clock.now();
        draft.validate(now)?;
        let config = ReportConfiguration::from_draft(ConfigOwner::User(user_id), draft, now);
        self.store.insert_configuration(&config).await?;
        Ok(config)
    }

    pub async fn get_configuration(&self, user_id: Uuid, id: Uuid) -> PortResult<ReportConfiguration> {
        self.readable_configuration(user_id, id).await
    }

    pub async fn list_configurations(&self, user_id: Uuid) -> PortResult<Vec<ReportConfiguration>> {
        self.store.list_configurations_for_user(user_id).await
    }

    pub async fn list_templates(&self) -> PortResult<Vec<ReportConfiguration>> {
        self.store.list_public_templates().await
    }

    pub async fn update_configuration(
        &self,
        user_id: Uuid,
        id: Uuid,
        draft: ConfigurationDraft,
    ) -> PortResult<ReportConfiguration> {
        let mut config = self.readable_configuration(user_id, id).await?;
        if !config.is_editable_by(user_id) {
            return Err(PortError::AccessDenied);
        }
        let now = self.clock.now();
        draft.validate(now)?;
        config.apply_draft(draft, now);
        self.store.update_configuration(&config).await?;
        Ok(config)
    }

    /// Templates are never deleted, whoever asks.
    pub async fn delete_configuration(&self, user_id: Uuid, id: Uuid) -> PortResult<()> {
        let config = self.readable_configuration(user_id, id).await?;
        if !config.is_editable_by(user_id) {
            return Err(PortError::AccessDenied);
        }
        self.store.delete_configuration(id).await
    }

    /// Inserts the built-in templates unless templates already exist.
    /// Returns how many were inserted.
    pub async fn seed_templates(&self) -> PortResult<usize> {
        if self.store.count_templates().await? > 0 {
            return Ok(0);
        }
        let templates = default_templates(self.clock.now());
        for template in &templates {
            self.store.insert_configuration(template).await?;
        }
        info!("Seeded {} report templates.", templates.len());
        Ok(templates.len())
    }

    /// Configurations the user may not read are reported as not found.
    async fn readable_configuration(&self, user_id: Uuid, id: Uuid) -> PortResult<ReportConfiguration> {
        let config = self.store.get_configuration(id).await?;
        if !config.is_readable_by(user_id) {
            return Err(PortError::NotFound(format!("Report configuration {} not found", id)));
        }
        Ok(config)
    }
}

/// `<sanitized-name>_<YYYY-MM-DD>.<ext>`. Runs of characters outside
/// `[A-Za-z0-9_-]` become a single underscore.
pub fn export_filename(name: &str, date: NaiveDate, format: ExportFormat) -> String {
    let mut stem = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            stem.push(c);
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { "report" } else { stem };
    format!("{}_{}.{}", stem, date.format("%Y-%m-%d"), format.extension())
}
