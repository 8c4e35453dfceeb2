//! services/api/src/adapters/aggregator.rs
//!
//! The Postgres-backed implementation of the `MetricAggregator` port. Rows are
//! selected by user and date range in SQL; the configuration's filters and the
//! metric arithmetic are applied in Rust by `summarize`, which is pure.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use job_tracker_core::domain::{
    CountEntry, JobRecord, ReportConfiguration, ReportData, ReportFilters, ResolvedRange,
    TrendPoint,
};
use job_tracker_core::ports::{MetricAggregator, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Statuses that count as "no answer yet".
const UNANSWERED: &[&str] = &["wishlist", "applied", "ghosted"];
/// Statuses that mean the application reached an interview.
const INTERVIEWED: &[&str] = &["interview", "interviewing", "offer", "accepted"];
const OFFERED: &[&str] = &["offer", "accepted"];
/// Statuses that close an application.
const CLOSED: &[&str] = &["rejected", "withdrawn", "ghosted", "accepted", "declined"];

const UNKNOWN_INDUSTRY: &str = "Unknown";

#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub company: String,
    pub position: String,
    pub status: String,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub applied_date: Option<NaiveDate>,
    pub response_date: Option<NaiveDate>,
    pub archived: bool,
}

impl JobRow {
    fn status_is(&self, set: &[&str]) -> bool {
        let status = self.status.to_lowercase();
        set.contains(&status.as_str())
    }

    fn to_record(&self) -> JobRecord {
        JobRecord {
            company: self.company.clone(),
            position: self.position.clone(),
            status: self.status.clone(),
            industry: self.industry.clone(),
            location: self.location.clone(),
            applied_date: self.applied_date,
        }
    }
}

pub struct PgMetricAggregator {
    pool: PgPool,
}

impl PgMetricAggregator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricAggregator for PgMetricAggregator {
    async fn aggregate(
        &self,
        user_id: Uuid,
        config: &ReportConfiguration,
        as_of: DateTime<Utc>,
    ) -> PortResult<ReportData> {
        let range = config.date_range.resolve(as_of)?;

        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT company, position, status, industry, location, applied_date, response_date, archived \
             FROM jobs \
             WHERE user_id = $1 \
               AND ($2::date IS NULL OR COALESCE(applied_date, created_at::date) >= $2) \
               AND COALESCE(applied_date, created_at::date) <= $3",
        )
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!("Aggregating {} job rows for configuration {}.", rows.len(), config.id);
        Ok(summarize(rows, config, range, as_of))
    }
}

//=========================================================================================
// Pure Aggregation
//=========================================================================================

/// Builds `ReportData` from the rows in range. Disabled metrics stay absent.
pub fn summarize(
    rows: Vec<JobRow>,
    config: &ReportConfiguration,
    range: ResolvedRange,
    generated_at: DateTime<Utc>,
) -> ReportData {
    let rows: Vec<JobRow> = rows
        .into_iter()
        .filter(|row| passes_filters(row, &config.filters))
        .collect();
    let toggles = &config.metrics;
    let mut data = ReportData::empty(&config.name, generated_at, range);

    let total = rows.len() as i64;
    let count = |set: &[&str]| rows.iter().filter(|row| row.status_is(set)).count() as i64;
    let responded = rows.iter().filter(|row| !row.status_is(UNANSWERED)).count() as i64;

    let summary = &mut data.summary;
    summary.total_applications = toggles.total_applications.then_some(total);
    summary.active_applications = toggles
        .active_applications
        .then(|| rows.iter().filter(|row| !row.archived && !row.status_is(CLOSED)).count() as i64);
    summary.response_rate = toggles.response_rate.then(|| percent(responded, total));
    summary.interview_rate = toggles.interview_rate.then(|| percent(count(INTERVIEWED), total));
    summary.offer_rate = toggles.offer_rate.then(|| percent(count(OFFERED), total));
    summary.average_response_days = toggles.average_response_time.then(|| average_response_days(&rows));

    if toggles.status_breakdown {
        data.status_breakdown = breakdown(rows.iter().map(|row| row.status.to_lowercase()));
    }
    if toggles.industry_breakdown {
        data.industry_breakdown = breakdown(
            rows.iter()
                .map(|row| row.industry.clone().unwrap_or_else(|| UNKNOWN_INDUSTRY.to_string())),
        );
    }
    if toggles.company_breakdown {
        data.company_breakdown = breakdown(rows.iter().map(|row| row.company.clone()));
    }
    if toggles.application_trend {
        data.application_trend = weekly_trend(&rows);
    }
    if toggles.raw_data {
        let mut records: Vec<JobRecord> = rows.iter().map(JobRow::to_record).collect();
        records.sort_by(|a, b| {
            b.applied_date
                .cmp(&a.applied_date)
                .then_with(|| a.company.cmp(&b.company))
                .then_with(|| a.position.cmp(&b.position))
        });
        data.raw_data = records;
    }
    data
}

fn matches_any(value: Option<&str>, allowed: &[String], partial: bool) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    let value = value.to_lowercase();
    allowed.iter().any(|candidate| {
        let candidate = candidate.to_lowercase();
        if partial {
            value.contains(&candidate)
        } else {
            value == candidate
        }
    })
}

fn passes_filters(row: &JobRow, filters: &ReportFilters) -> bool {
    if filters.exclude_archived && row.archived {
        return false;
    }
    if filters.exclude_ghosted && row.status.eq_ignore_ascii_case("ghosted") {
        return false;
    }
    matches_any(Some(&row.company), &filters.companies, false)
        && matches_any(row.industry.as_deref(), &filters.industries, false)
        && matches_any(Some(&row.position), &filters.roles, true)
        && matches_any(Some(&row.status), &filters.statuses, false)
        && matches_any(row.location.as_deref(), &filters.locations, true)
}

/// A percentage rounded to one decimal; zero when there is nothing to divide.
fn percent(part: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / total as f64).round() / 10.0
}

fn average_response_days(rows: &[JobRow]) -> f64 {
    let waits: Vec<i64> = rows
        .iter()
        .filter_map(|row| Some((row.response_date? - row.applied_date?).num_days()))
        .filter(|days| *days >= 0)
        .collect();
    if waits.is_empty() {
        return 0.0;
    }
    let mean = waits.iter().sum::<i64>() as f64 / waits.len() as f64;
    (mean * 10.0).round() / 10.0
}

/// Counts per label, largest first, ties broken alphabetically.
fn breakdown(labels: impl Iterator<Item = String>) -> Vec<CountEntry> {
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(label, count)| CountEntry { label, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries
}

/// Applications per ISO week, keyed by the week's Monday.
fn weekly_trend(rows: &[JobRow]) -> Vec<TrendPoint> {
    let mut weeks: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for date in rows.iter().filter_map(|row| row.applied_date) {
        let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
        *weeks.entry(monday).or_default() += 1;
    }
    weeks
        .into_iter()
        .map(|(period, count)| TrendPoint { period, count })
        .collect()
}
