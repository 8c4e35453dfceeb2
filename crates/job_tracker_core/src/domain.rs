//! crates/job_tracker_core/src/domain.rs
//!
//! Defines the core data structures for the reporting pipeline: saved report
//! configurations, the canonical aggregated `ReportData`, narrative insights and
//! shared report snapshots. The JSON shape (camelCase) is the one the web client
//! and the snapshot column both use.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ports::{PortError, PortResult};

/// Owner tag stored for built-in templates.
pub const SYSTEM_OWNER: &str = "system";

//=========================================================================================
// Report Configuration
//=========================================================================================

/// Who owns a configuration: a user, or the system for seeded templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ConfigOwner {
    System,
    User(Uuid),
}

impl ConfigOwner {
    pub fn is_user(&self, user_id: Uuid) -> bool {
        matches!(self, ConfigOwner::User(id) if *id == user_id)
    }
}

impl fmt::Display for ConfigOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOwner::System => f.write_str(SYSTEM_OWNER),
            ConfigOwner::User(id) => write!(f, "{}", id),
        }
    }
}

impl From<ConfigOwner> for String {
    fn from(owner: ConfigOwner) -> Self {
        owner.to_string()
    }
}

impl TryFrom<String> for ConfigOwner {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == SYSTEM_OWNER {
            return Ok(ConfigOwner::System);
        }
        Uuid::parse_str(&value)
            .map(ConfigOwner::User)
            .map_err(|_| format!("'{}' is neither a user id nor '{}'", value, SYSTEM_OWNER))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportCategory {
    Summary,
    Performance,
    Analysis,
    #[default]
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateRangeKind {
    #[serde(rename = "custom")]
    Custom,
    #[serde(rename = "last7days")]
    Last7Days,
    #[default]
    #[serde(rename = "last30days")]
    Last30Days,
    #[serde(rename = "last90days")]
    Last90Days,
    #[serde(rename = "thisMonth")]
    ThisMonth,
    #[serde(rename = "lastMonth")]
    LastMonth,
    #[serde(rename = "thisYear")]
    ThisYear,
    #[serde(rename = "allTime")]
    AllTime,
}

/// The date-range selector of a configuration. Explicit dates are only read
/// when `kind` is `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[serde(rename = "type")]
    pub kind: DateRangeKind,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// Concrete inclusive bounds of a date range. `start` is `None` for all-time reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRange {
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

impl fmt::Display for ResolvedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start {
            Some(start) => write!(f, "{} to {}", start, self.end),
            None => write!(f, "All time to {}", self.end),
        }
    }
}

impl DateRange {
    /// Resolves the selector against `now` into concrete bounds.
    pub fn resolve(&self, now: DateTime<Utc>) -> PortResult<ResolvedRange> {
        let today = now.date_naive();
        let first_of_month = today.with_day(1).unwrap_or(today);
        let range = match self.kind {
            DateRangeKind::Custom => {
                let (start, end) = match (self.start_date, self.end_date) {
                    (Some(start), Some(end)) => (start, end),
                    _ => {
                        return Err(PortError::Validation(
                            "custom date ranges require both startDate and endDate".to_string(),
                        ))
                    }
                };
                if start > end {
                    return Err(PortError::Validation(
                        "startDate must not be after endDate".to_string(),
                    ));
                }
                ResolvedRange { start: Some(start), end }
            }
            DateRangeKind::Last7Days => ResolvedRange {
                start: Some(today - Duration::days(7)),
                end: today,
            },
            DateRangeKind::Last30Days => ResolvedRange {
                start: Some(today - Duration::days(30)),
                end: today,
            },
            DateRangeKind::Last90Days => ResolvedRange {
                start: Some(today - Duration::days(90)),
                end: today,
            },
            DateRangeKind::ThisMonth => ResolvedRange {
                start: Some(first_of_month),
                end: today,
            },
            DateRangeKind::LastMonth => {
                let last_of_previous = first_of_month - Duration::days(1);
                ResolvedRange {
                    start: Some(last_of_previous.with_day(1).unwrap_or(last_of_previous)),
                    end: last_of_previous,
                }
            }
            DateRangeKind::ThisYear => ResolvedRange {
                start: NaiveDate::from_ymd_opt(today.year(), 1, 1),
                end: today,
            },
            DateRangeKind::AllTime => ResolvedRange { start: None, end: today },
        };
        Ok(range)
    }
}

/// Named metric toggles. Disabled metrics are left out of `ReportData` entirely.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricToggles {
    pub total_applications: bool,
    pub response_rate: bool,
    pub interview_rate: bool,
    pub offer_rate: bool,
    pub average_response_time: bool,
    pub active_applications: bool,
    pub status_breakdown: bool,
    pub industry_breakdown: bool,
    pub company_breakdown: bool,
    pub application_trend: bool,
    pub raw_data: bool,
}

impl MetricToggles {
    pub fn all() -> Self {
        Self {
            total_applications: true,
            response_rate: true,
            interview_rate: true,
            offer_rate: true,
            average_response_time: true,
            active_applications: true,
            status_breakdown: true,
            industry_breakdown: true,
            company_breakdown: true,
            application_trend: true,
            raw_data: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportFilters {
    pub companies: Vec<String>,
    pub industries: Vec<String>,
    pub roles: Vec<String>,
    pub statuses: Vec<String>,
    pub locations: Vec<String>,
    pub exclude_archived: bool,
    pub exclude_ghosted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartStyle {
    #[default]
    Bar,
    Line,
    Pie,
    Doughnut,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Default,
    Professional,
    Vibrant,
    Monochrome,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualizationPrefs {
    pub status_chart: ChartStyle,
    pub industry_chart: ChartStyle,
    pub company_chart: ChartStyle,
    pub trend_chart: ChartStyle,
    pub color_scheme: ColorScheme,
}

/// One of the fixed narrative insight categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusArea {
    Trends,
    Recommendations,
    Strengths,
    Improvements,
    Patterns,
}

impl FocusArea {
    pub const ALL: [FocusArea; 5] = [
        FocusArea::Trends,
        FocusArea::Recommendations,
        FocusArea::Strengths,
        FocusArea::Improvements,
        FocusArea::Patterns,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusArea::Trends => "trends",
            FocusArea::Recommendations => "recommendations",
            FocusArea::Strengths => "strengths",
            FocusArea::Improvements => "improvements",
            FocusArea::Patterns => "patterns",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|area| area.as_str() == tag)
    }
}

/// Reads a focus list, dropping tags that are not known focus areas.
fn lenient_focus_areas<'de, D>(deserializer: D) -> Result<Vec<FocusArea>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = Vec::<String>::deserialize(deserializer)?;
    Ok(tags.iter().filter_map(|tag| FocusArea::parse(tag)).collect())
}

/// The user-editable part of a configuration. Used for create, update and
/// ad hoc generation requests.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationDraft {
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub category: ReportCategory,
    pub date_range: DateRange,
    pub metrics: MetricToggles,
    pub filters: ReportFilters,
    pub visualization: VisualizationPrefs,
    #[serde(rename = "includeAIInsights")]
    pub include_ai_insights: bool,
    #[serde(deserialize_with = "lenient_focus_areas")]
    pub insights_focus: Vec<FocusArea>,
}

impl ConfigurationDraft {
    pub fn validate(&self, now: DateTime<Utc>) -> PortResult<()> {
        if self.name.trim().is_empty() {
            return Err(PortError::Validation("name is required".to_string()));
        }
        self.date_range.resolve(now).map(|_| ())
    }
}

/// A saved report configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfiguration {
    pub id: Uuid,
    pub owner: ConfigOwner,
    pub name: String,
    pub description: Option<String>,
    pub is_template: bool,
    pub is_public: bool,
    pub category: ReportCategory,
    pub date_range: DateRange,
    pub metrics: MetricToggles,
    pub filters: ReportFilters,
    pub visualization: VisualizationPrefs,
    #[serde(rename = "includeAIInsights")]
    pub include_ai_insights: bool,
    pub insights_focus: Vec<FocusArea>,
    pub last_generated: Option<DateTime<Utc>>,
    pub generation_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportConfiguration {
    /// Builds a fresh configuration from a draft. Ad hoc configurations use the
    /// same constructor but are never persisted.
    pub fn from_draft(owner: ConfigOwner, draft: ConfigurationDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            name: draft.name.trim().to_string(),
            description: draft.description,
            is_template: false,
            is_public: draft.is_public,
            category: draft.category,
            date_range: draft.date_range,
            metrics: draft.metrics,
            filters: draft.filters,
            visualization: draft.visualization,
            include_ai_insights: draft.include_ai_insights,
            insights_focus: draft.insights_focus,
            last_generated: None,
            generation_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the editable fields, leaving identity and generation metadata alone.
    pub fn apply_draft(&mut self, draft: ConfigurationDraft, now: DateTime<Utc>) {
        self.name = draft.name.trim().to_string();
        self.description = draft.description;
        self.is_public = draft.is_public;
        self.category = draft.category;
        self.date_range = draft.date_range;
        self.metrics = draft.metrics;
        self.filters = draft.filters;
        self.visualization = draft.visualization;
        self.include_ai_insights = draft.include_ai_insights;
        self.insights_focus = draft.insights_focus;
        self.updated_at = now;
    }

    pub fn is_readable_by(&self, user_id: Uuid) -> bool {
        self.owner.is_user(user_id) || self.is_public
    }

    /// Templates are immutable to everyone; other configurations only to non-owners.
    pub fn is_editable_by(&self, user_id: Uuid) -> bool {
        !self.is_template && self.owner.is_user(user_id)
    }

    pub fn wants_insights(&self) -> bool {
        self.include_ai_insights && !self.insights_focus.is_empty()
    }
}

//=========================================================================================
// Report Data
//=========================================================================================

/// Scalar metrics. `None` means the metric was not requested.
/// Rates are percentages in `0..=100`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_applications: Option<i64>,
    pub active_applications: Option<i64>,
    pub response_rate: Option<f64>,
    pub interview_rate: Option<f64>,
    pub offer_rate: Option<f64>,
    pub average_response_days: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Count(i64),
    Percent(f64),
    Days(f64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Count(n) => write!(f, "{}", n),
            MetricValue::Percent(p) => write!(f, "{:.1}%", p),
            MetricValue::Days(d) => write!(f, "{:.1} days", d),
        }
    }
}

impl ReportSummary {
    /// The metrics that are present, labelled, in display order.
    pub fn present_metrics(&self) -> Vec<(&'static str, MetricValue)> {
        let mut metrics = Vec::new();
        if let Some(n) = self.total_applications {
            metrics.push(("Total Applications", MetricValue::Count(n)));
        }
        if let Some(n) = self.active_applications {
            metrics.push(("Active Applications", MetricValue::Count(n)));
        }
        if let Some(p) = self.response_rate {
            metrics.push(("Response Rate", MetricValue::Percent(p)));
        }
        if let Some(p) = self.interview_rate {
            metrics.push(("Interview Rate", MetricValue::Percent(p)));
        }
        if let Some(p) = self.offer_rate {
            metrics.push(("Offer Rate", MetricValue::Percent(p)));
        }
        if let Some(d) = self.average_response_days {
            metrics.push(("Average Response Time", MetricValue::Days(d)));
        }
        metrics
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountEntry {
    pub label: String,
    pub count: i64,
}

/// Applications submitted in the week starting at `period`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub period: NaiveDate,
    pub count: i64,
}

/// One underlying job application, as exported on the raw data sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub company: String,
    pub position: String,
    pub status: String,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub applied_date: Option<NaiveDate>,
}

/// The canonical aggregated view consumed by the insight orchestrator and both
/// renderers. Empty collections mean the section is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub report_name: String,
    pub generated_at: DateTime<Utc>,
    pub date_range: ResolvedRange,
    pub summary: ReportSummary,
    #[serde(default)]
    pub status_breakdown: Vec<CountEntry>,
    #[serde(default)]
    pub industry_breakdown: Vec<CountEntry>,
    #[serde(default)]
    pub company_breakdown: Vec<CountEntry>,
    #[serde(default)]
    pub application_trend: Vec<TrendPoint>,
    #[serde(default)]
    pub raw_data: Vec<JobRecord>,
    #[serde(rename = "aiInsights", default, skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<Vec<Insight>>,
}

impl ReportData {
    /// An empty report shell with no sections present.
    pub fn empty(report_name: &str, generated_at: DateTime<Utc>, date_range: ResolvedRange) -> Self {
        Self {
            report_name: report_name.to_string(),
            generated_at,
            date_range,
            summary: ReportSummary::default(),
            status_breakdown: Vec::new(),
            industry_breakdown: Vec::new(),
            company_breakdown: Vec::new(),
            application_trend: Vec::new(),
            raw_data: Vec::new(),
            ai_insights: None,
        }
    }

    /// Checks that the aggregated numbers are internally sane before they are
    /// embedded in prompts.
    pub fn check_consistency(&self) -> Result<(), String> {
        let summary = &self.summary;
        for (name, rate) in [
            ("responseRate", summary.response_rate),
            ("interviewRate", summary.interview_rate),
            ("offerRate", summary.offer_rate),
        ] {
            if let Some(rate) = rate {
                if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
                    return Err(format!("{} is out of range: {}", name, rate));
                }
            }
        }
        if let Some(days) = summary.average_response_days {
            if !days.is_finite() || days < 0.0 {
                return Err(format!("averageResponseDays is invalid: {}", days));
            }
        }
        if summary.total_applications.is_some_and(|n| n < 0)
            || summary.active_applications.is_some_and(|n| n < 0)
        {
            return Err("application counts must not be negative".to_string());
        }
        let negative_bucket = self
            .status_breakdown
            .iter()
            .chain(&self.industry_breakdown)
            .chain(&self.company_breakdown)
            .any(|entry| entry.count < 0)
            || self.application_trend.iter().any(|point| point.count < 0);
        if negative_bucket {
            return Err("distribution counts must not be negative".to_string());
        }
        Ok(())
    }

    pub fn insights(&self) -> &[Insight] {
        self.ai_insights.as_deref().unwrap_or(&[])
    }
}

//=========================================================================================
// Insights
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Trends,
    Recommendations,
    Strengths,
    Improvements,
    Patterns,
    /// Synthetic entry used when insight generation as a whole could not run.
    Unavailable,
}

impl From<FocusArea> for InsightKind {
    fn from(area: FocusArea) -> Self {
        match area {
            FocusArea::Trends => InsightKind::Trends,
            FocusArea::Recommendations => InsightKind::Recommendations,
            FocusArea::Strengths => InsightKind::Strengths,
            FocusArea::Improvements => InsightKind::Improvements,
            FocusArea::Patterns => InsightKind::Patterns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: InsightKind,
}

impl Insight {
    pub fn unavailable() -> Self {
        Self {
            title: "AI Insights Unavailable".to_string(),
            content: "Insights could not be generated for this report. The report data above is complete."
                .to_string(),
            kind: InsightKind::Unavailable,
        }
    }
}

//=========================================================================================
// Shared Reports
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

/// Observable lifecycle state of a share at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareState {
    ActiveValid,
    ActiveExpired,
    Revoked,
}

/// A frozen report snapshot plus its access policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedReport {
    pub id: Uuid,
    pub configuration_id: Uuid,
    pub owner_id: Uuid,
    pub token: String,
    pub report_name: String,
    pub snapshot: ReportData,
    pub expiration_date: DateTime<Utc>,
    pub is_active: bool,
    /// Argon2 PHC string; the plaintext is never stored.
    pub password_hash: Option<String>,
    /// Normalised (trimmed, lowercase) addresses.
    pub allowed_emails: Vec<String>,
    pub view_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub share_message: Option<String>,
    pub shared_with: Vec<Recipient>,
    pub created_at: DateTime<Utc>,
}

impl SharedReport {
    pub fn state(&self, now: DateTime<Utc>) -> ShareState {
        if !self.is_active {
            ShareState::Revoked
        } else if now < self.expiration_date {
            ShareState::ActiveValid
        } else {
            ShareState::ActiveExpired
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == ShareState::ActiveValid
    }

    pub fn allows_email(&self, email: &str) -> bool {
        let email = normalize_email(email);
        self.allowed_emails.iter().any(|allowed| *allowed == email)
    }

    pub fn summary(&self) -> SharedReportSummary {
        SharedReportSummary {
            id: self.id,
            configuration_id: self.configuration_id,
            token: self.token.clone(),
            report_name: self.report_name.clone(),
            expiration_date: self.expiration_date,
            is_active: self.is_active,
            password_protected: self.password_hash.is_some(),
            allowed_emails: self.allowed_emails.clone(),
            view_count: self.view_count,
            last_accessed_at: self.last_accessed_at,
            share_message: self.share_message.clone(),
            shared_with: self.shared_with.clone(),
            created_at: self.created_at,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Listing projection of a share: no snapshot, no access log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedReportSummary {
    pub id: Uuid,
    pub configuration_id: Uuid,
    pub token: String,
    pub report_name: String,
    pub expiration_date: DateTime<Utc>,
    pub is_active: bool,
    pub password_protected: bool,
    pub allowed_emails: Vec<String>,
    pub view_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub share_message: Option<String>,
    pub shared_with: Vec<Recipient>,
    pub created_at: DateTime<Utc>,
}

/// One authorized view of a share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub accessed_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub email: Option<String>,
}
