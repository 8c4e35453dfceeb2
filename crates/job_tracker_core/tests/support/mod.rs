//! In-memory fakes of the core ports, shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use job_tracker_core::domain::{
    AccessLogEntry, ConfigOwner, ConfigurationDraft, CountEntry, DateRange, DateRangeKind,
    FocusArea, MetricToggles, ReportConfiguration, ReportData, ReportSummary, SharedReport,
    SharedReportSummary, TrendPoint,
};
use job_tracker_core::ports::{
    Clock, ExportFormat, GenerationOptions, MetricAggregator, PortError, PortResult,
    ReportRenderer, ReportStore, TextGenerator,
};
use job_tracker_core::{InsightOrchestrator, ReportService, SharingGateway};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const BASE_URL: &str = "https://jobs.example.com";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 10, 30, 0).unwrap()
}

//=========================================================================================
// Clock
//=========================================================================================

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

//=========================================================================================
// Store
//=========================================================================================

#[derive(Default)]
struct StoreState {
    configs: HashMap<Uuid, ReportConfiguration>,
    shares: HashMap<Uuid, SharedReport>,
    access: HashMap<Uuid, Vec<AccessLogEntry>>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    /// The next N share inserts fail as if their token were taken.
    pub forced_conflicts: AtomicUsize,
    pub share_insert_attempts: AtomicUsize,
}

impl InMemoryStore {
    pub fn share_by_token(&self, token: &str) -> SharedReport {
        let state = self.state.lock().unwrap();
        state
            .shares
            .values()
            .find(|s| s.token == token)
            .cloned()
            .expect("share exists")
    }

    pub fn access_log(&self, share_id: Uuid) -> Vec<AccessLogEntry> {
        let state = self.state.lock().unwrap();
        state.access.get(&share_id).cloned().unwrap_or_default()
    }

    pub fn configuration(&self, id: Uuid) -> ReportConfiguration {
        self.state.lock().unwrap().configs[&id].clone()
    }

    pub fn share_count(&self) -> usize {
        self.state.lock().unwrap().shares.len()
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{} {} not found", what, id))
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn get_configuration(&self, id: Uuid) -> PortResult<ReportConfiguration> {
        let state = self.state.lock().unwrap();
        state.configs.get(&id).cloned().ok_or_else(|| not_found("Configuration", id))
    }

    async fn list_configurations_for_user(&self, user_id: Uuid) -> PortResult<Vec<ReportConfiguration>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .configs
            .values()
            .filter(|c| c.owner.is_user(user_id) || (c.is_template && c.is_public))
            .cloned()
            .collect())
    }

    async fn list_public_templates(&self) -> PortResult<Vec<ReportConfiguration>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .configs
            .values()
            .filter(|c| c.is_template && c.is_public)
            .cloned()
            .collect())
    }

    async fn count_templates(&self) -> PortResult<i64> {
        let state = self.state.lock().unwrap();
        Ok(state.configs.values().filter(|c| c.is_template).count() as i64)
    }

    async fn insert_configuration(&self, config: &ReportConfiguration) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state.configs.insert(config.id, config.clone());
        Ok(())
    }

    async fn update_configuration(&self, config: &ReportConfiguration) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.configs.get_mut(&config.id) {
            Some(existing) => {
                *existing = config.clone();
                Ok(())
            }
            None => Err(not_found("Configuration", config.id)),
        }
    }

    async fn delete_configuration(&self, id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state.configs.remove(&id).map(|_| ()).ok_or_else(|| not_found("Configuration", id))
    }

    async fn record_generation(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        let config = state.configs.get_mut(&id).ok_or_else(|| not_found("Configuration", id))?;
        config.generation_count += 1;
        config.last_generated = Some(at);
        Ok(())
    }

    async fn insert_shared_report(&self, share: &SharedReport) -> PortResult<()> {
        self.share_insert_attempts.fetch_add(1, Ordering::SeqCst);
        let forced = self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let mut state = self.state.lock().unwrap();
        if forced || state.shares.values().any(|s| s.token == share.token) {
            return Err(PortError::Conflict("token already exists".to_string()));
        }
        state.shares.insert(share.id, share.clone());
        Ok(())
    }

    async fn get_shared_report(&self, id: Uuid) -> PortResult<SharedReport> {
        let state = self.state.lock().unwrap();
        state.shares.get(&id).cloned().ok_or_else(|| not_found("Share", id))
    }

    async fn get_shared_report_by_token(&self, token: &str) -> PortResult<SharedReport> {
        let state = self.state.lock().unwrap();
        state
            .shares
            .values()
            .find(|s| s.token == token)
            .cloned()
            .ok_or_else(|| not_found("Share", token))
    }

    async fn record_share_access(&self, share_id: Uuid, entry: &AccessLogEntry) -> PortResult<i64> {
        let mut state = self.state.lock().unwrap();
        let share = state.shares.get_mut(&share_id).ok_or_else(|| not_found("Share", share_id))?;
        if !share.is_valid(entry.accessed_at) {
            return Err(PortError::AccessDenied);
        }
        share.view_count += 1;
        share.last_accessed_at = Some(entry.accessed_at);
        let view_count = share.view_count;
        state.access.entry(share_id).or_default().push(entry.clone());
        Ok(view_count)
    }

    async fn list_share_access(&self, share_id: Uuid) -> PortResult<Vec<AccessLogEntry>> {
        Ok(self.access_log(share_id))
    }

    async fn deactivate_shared_report(&self, id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        let share = state.shares.get_mut(&id).ok_or_else(|| not_found("Share", id))?;
        share.is_active = false;
        Ok(())
    }

    async fn list_shared_reports_for_owner(&self, owner_id: Uuid) -> PortResult<Vec<SharedReportSummary>> {
        let state = self.state.lock().unwrap();
        let mut summaries: Vec<SharedReportSummary> = state
            .shares
            .values()
            .filter(|s| s.owner_id == owner_id)
            .map(SharedReport::summary)
            .collect();
        summaries.sort_by_key(|s| s.created_at);
        Ok(summaries)
    }
}

//=========================================================================================
// Aggregator
//=========================================================================================

/// Returns the same sample metrics for every request, honouring the toggles
/// for the scalar metrics.
#[derive(Default)]
pub struct SampleAggregator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl MetricAggregator for SampleAggregator {
    async fn aggregate(
        &self,
        _user_id: Uuid,
        config: &ReportConfiguration,
        as_of: DateTime<Utc>,
    ) -> PortResult<ReportData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let range = config.date_range.resolve(as_of)?;
        let mut data = sample_report(&config.name, as_of);
        data.date_range = range;
        let toggles = &config.metrics;
        data.summary = ReportSummary {
            total_applications: toggles.total_applications.then_some(42),
            active_applications: toggles.active_applications.then_some(17),
            response_rate: toggles.response_rate.then_some(23.8),
            interview_rate: toggles.interview_rate.then_some(9.5),
            offer_rate: toggles.offer_rate.then_some(2.4),
            average_response_days: toggles.average_response_time.then_some(6.5),
        };
        Ok(data)
    }
}

pub fn sample_report(name: &str, generated_at: DateTime<Utc>) -> ReportData {
    let end = generated_at.date_naive();
    let mut data = ReportData::empty(
        name,
        generated_at,
        job_tracker_core::domain::ResolvedRange { start: Some(end - Duration::days(30)), end },
    );
    data.summary.total_applications = Some(42);
    data.status_breakdown = vec![
        CountEntry { label: "applied".into(), count: 25 },
        CountEntry { label: "interviewing".into(), count: 4 },
        CountEntry { label: "rejected".into(), count: 13 },
    ];
    data.industry_breakdown = vec![
        CountEntry { label: "Software".into(), count: 30 },
        CountEntry { label: "Finance".into(), count: 12 },
    ];
    data.company_breakdown = vec![CountEntry { label: "Initech".into(), count: 3 }];
    data.application_trend = vec![
        TrendPoint { period: NaiveDate::from_ymd_opt(2024, 5, 13).unwrap(), count: 9 },
        TrendPoint { period: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(), count: 14 },
    ];
    data
}

//=========================================================================================
// Text Generator
//=========================================================================================

#[derive(Clone)]
pub enum Reply {
    Text(String),
    Fail,
    /// Replies after a delay, to shuffle completion order.
    Delayed(u64, String),
    Hang,
}

/// Recognises the focus area from the prompt and answers per a script.
/// Unscripted areas reply with "insight about <area>".
#[derive(Default)]
pub struct ScriptedGenerator {
    script: HashMap<FocusArea, Reply>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<(FocusArea, GenerationOptions)>>,
}

impl ScriptedGenerator {
    pub fn with(mut self, area: FocusArea, reply: Reply) -> Self {
        self.script.insert(area, reply);
        self
    }

    pub fn failing_everything() -> Self {
        FocusArea::ALL
            .into_iter()
            .fold(Self::default(), |g, area| g.with(area, Reply::Fail))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn classify(prompt: &str) -> FocusArea {
    if prompt.contains("application activity") {
        FocusArea::Trends
    } else if prompt.contains("actionable recommendations") {
        FocusArea::Recommendations
    } else if prompt.contains("doing well") {
        FocusArea::Strengths
    } else if prompt.contains("weakest stage") {
        FocusArea::Improvements
    } else if prompt.contains("notable pattern") {
        FocusArea::Patterns
    } else {
        panic!("unrecognised prompt: {}", prompt)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let area = classify(prompt);
        self.seen.lock().unwrap().push((area, options));
        match self.script.get(&area).cloned() {
            None => Ok(format!("  insight about {}\n", area.as_str())),
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail) => Err(PortError::Unexpected("upstream unavailable".to_string())),
            Some(Reply::Delayed(ms, text)) => {
                tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                Ok(text)
            }
            Some(Reply::Hang) => {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok("too late".to_string())
            }
        }
    }
}

//=========================================================================================
// Renderer
//=========================================================================================

pub struct EchoRenderer;

impl ReportRenderer for EchoRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn render(&self, data: &ReportData, _config: &ReportConfiguration) -> PortResult<Vec<u8>> {
        serde_json::to_vec(data).map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// Wiring
//=========================================================================================

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub aggregator: Arc<SampleAggregator>,
    pub generator: Arc<ScriptedGenerator>,
    pub clock: Arc<ManualClock>,
    pub service: ReportService,
}

impl Harness {
    pub fn new(generator: ScriptedGenerator) -> Self {
        let store = Arc::new(InMemoryStore::default());
        let aggregator = Arc::new(SampleAggregator::default());
        let generator = Arc::new(generator);
        let clock = Arc::new(ManualClock::new(start_time()));
        let insights = InsightOrchestrator::new(generator.clone())
            .with_call_timeout(std::time::Duration::from_millis(200));
        let sharing = SharingGateway::new(store.clone(), clock.clone(), BASE_URL);
        let service = ReportService::new(store.clone(), aggregator.clone(), insights, sharing, clock.clone())
            .with_renderer(Arc::new(EchoRenderer));
        Self { store, aggregator, generator, clock, service }
    }

    pub fn sharing(&self) -> &SharingGateway {
        self.service.sharing()
    }

    /// Saves a configuration owned by `owner` and returns it.
    pub async fn saved_config(&self, owner: Uuid, draft: ConfigurationDraft) -> ReportConfiguration {
        self.service.create_configuration(owner, draft).await.unwrap()
    }
}

pub fn draft(name: &str) -> ConfigurationDraft {
    ConfigurationDraft {
        name: name.to_string(),
        date_range: DateRange { kind: DateRangeKind::Last30Days, start_date: None, end_date: None },
        metrics: MetricToggles { total_applications: true, ..Default::default() },
        ..Default::default()
    }
}

pub fn config_with_focus(focus: Vec<FocusArea>) -> ReportConfiguration {
    let mut draft = draft("Focus test");
    draft.include_ai_insights = true;
    draft.insights_focus = focus;
    ReportConfiguration::from_draft(ConfigOwner::User(Uuid::new_v4()), draft, start_time())
}
