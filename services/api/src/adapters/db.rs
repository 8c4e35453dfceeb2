//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ReportStore` port from the `core` crate. It handles all interactions
//! with the report tables in PostgreSQL using `sqlx`.
//!
//! Structured columns (metric toggles, filters, snapshots, ...) are stored as
//! JSONB in the same camelCase shape the web client sees.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use job_tracker_core::domain::{
    AccessLogEntry, ConfigOwner, DateRange, FocusArea, MetricToggles, Recipient, ReportCategory,
    ReportConfiguration, ReportData, ReportFilters, SharedReport, SharedReportSummary,
    VisualizationPrefs,
};
use job_tracker_core::ports::{PortError, PortResult, ReportStore};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ReportStore` port.
#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    /// Creates a new `PgReportStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

/// Plain enums are stored as their serde tag in a TEXT column.
fn enum_to_text<T: Serialize>(value: &T) -> PortResult<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(tag)) => Ok(tag),
        Ok(other) => Err(PortError::Unexpected(format!("expected a string tag, got {}", other))),
        Err(e) => Err(PortError::Unexpected(e.to_string())),
    }
}

fn text_to_enum<T: DeserializeOwned>(tag: String) -> PortResult<T> {
    serde_json::from_value(serde_json::Value::String(tag))
        .map_err(|e| PortError::Unexpected(format!("corrupt enum column: {}", e)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const CONFIGURATION_COLUMNS: &str = "id, owner, name, description, is_template, is_public, category, \
     date_range, metrics, filters, visualization, include_ai_insights, insights_focus, \
     last_generated, generation_count, created_at, updated_at";

#[derive(FromRow)]
struct ConfigurationRecord {
    id: Uuid,
    owner: String,
    name: String,
    description: Option<String>,
    is_template: bool,
    is_public: bool,
    category: String,
    date_range: Json<DateRange>,
    metrics: Json<MetricToggles>,
    filters: Json<ReportFilters>,
    visualization: Json<VisualizationPrefs>,
    include_ai_insights: bool,
    insights_focus: Json<Vec<FocusArea>>,
    last_generated: Option<DateTime<Utc>>,
    generation_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConfigurationRecord {
    fn to_domain(self) -> PortResult<ReportConfiguration> {
        let owner = ConfigOwner::try_from(self.owner).map_err(PortError::Unexpected)?;
        let category: ReportCategory = text_to_enum(self.category)?;
        Ok(ReportConfiguration {
            id: self.id,
            owner,
            name: self.name,
            description: self.description,
            is_template: self.is_template,
            is_public: self.is_public,
            category,
            date_range: self.date_range.0,
            metrics: self.metrics.0,
            filters: self.filters.0,
            visualization: self.visualization.0,
            include_ai_insights: self.include_ai_insights,
            insights_focus: self.insights_focus.0,
            last_generated: self.last_generated,
            generation_count: self.generation_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SHARE_COLUMNS: &str = "id, configuration_id, owner_id, token, report_name, snapshot, \
     expiration_date, is_active, password_hash, allowed_emails, view_count, last_accessed_at, \
     share_message, shared_with, created_at";

#[derive(FromRow)]
struct SharedReportRecord {
    id: Uuid,
    configuration_id: Uuid,
    owner_id: Uuid,
    token: String,
    report_name: String,
    snapshot: Json<ReportData>,
    expiration_date: DateTime<Utc>,
    is_active: bool,
    password_hash: Option<String>,
    allowed_emails: Json<Vec<String>>,
    view_count: i64,
    last_accessed_at: Option<DateTime<Utc>>,
    share_message: Option<String>,
    shared_with: Json<Vec<Recipient>>,
    created_at: DateTime<Utc>,
}

impl SharedReportRecord {
    fn to_domain(self) -> SharedReport {
        SharedReport {
            id: self.id,
            configuration_id: self.configuration_id,
            owner_id: self.owner_id,
            token: self.token,
            report_name: self.report_name,
            snapshot: self.snapshot.0,
            expiration_date: self.expiration_date,
            is_active: self.is_active,
            password_hash: self.password_hash,
            allowed_emails: self.allowed_emails.0,
            view_count: self.view_count,
            last_accessed_at: self.last_accessed_at,
            share_message: self.share_message,
            shared_with: self.shared_with.0,
            created_at: self.created_at,
        }
    }
}

/// The listing projection. The snapshot column is never selected.
#[derive(FromRow)]
struct SharedReportSummaryRecord {
    id: Uuid,
    configuration_id: Uuid,
    token: String,
    report_name: String,
    expiration_date: DateTime<Utc>,
    is_active: bool,
    password_protected: bool,
    allowed_emails: Json<Vec<String>>,
    view_count: i64,
    last_accessed_at: Option<DateTime<Utc>>,
    share_message: Option<String>,
    shared_with: Json<Vec<Recipient>>,
    created_at: DateTime<Utc>,
}

impl SharedReportSummaryRecord {
    fn to_domain(self) -> SharedReportSummary {
        SharedReportSummary {
            id: self.id,
            configuration_id: self.configuration_id,
            token: self.token,
            report_name: self.report_name,
            expiration_date: self.expiration_date,
            is_active: self.is_active,
            password_protected: self.password_protected,
            allowed_emails: self.allowed_emails.0,
            view_count: self.view_count,
            last_accessed_at: self.last_accessed_at,
            share_message: self.share_message,
            shared_with: self.shared_with.0,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AccessLogRecord {
    accessed_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    email: Option<String>,
}

impl AccessLogRecord {
    fn to_domain(self) -> AccessLogEntry {
        AccessLogEntry {
            accessed_at: self.accessed_at,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            email: self.email,
        }
    }
}

//=========================================================================================
// `ReportStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReportStore for PgReportStore {
    async fn get_configuration(&self, id: Uuid) -> PortResult<ReportConfiguration> {
        let sql = format!("SELECT {} FROM report_configurations WHERE id = $1", CONFIGURATION_COLUMNS);
        let record = sqlx::query_as::<_, ConfigurationRecord>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected(format!("Configuration {} not found", id)))?;
        record.to_domain()
    }

    async fn list_configurations_for_user(&self, user_id: Uuid) -> PortResult<Vec<ReportConfiguration>> {
        let sql = format!(
            "SELECT {} FROM report_configurations \
             WHERE owner = $1 OR (is_template AND is_public) \
             ORDER BY is_template DESC, created_at ASC",
            CONFIGURATION_COLUMNS
        );
        let records = sqlx::query_as::<_, ConfigurationRecord>(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_public_templates(&self) -> PortResult<Vec<ReportConfiguration>> {
        let sql = format!(
            "SELECT {} FROM report_configurations WHERE is_template AND is_public ORDER BY created_at ASC, name ASC",
            CONFIGURATION_COLUMNS
        );
        let records = sqlx::query_as::<_, ConfigurationRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn count_templates(&self) -> PortResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM report_configurations WHERE is_template")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count)
    }

    async fn insert_configuration(&self, config: &ReportConfiguration) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO report_configurations \
             (id, owner, name, description, is_template, is_public, category, date_range, metrics, \
              filters, visualization, include_ai_insights, insights_focus, last_generated, \
              generation_count, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(config.id)
        .bind(config.owner.to_string())
        .bind(&config.name)
        .bind(&config.description)
        .bind(config.is_template)
        .bind(config.is_public)
        .bind(enum_to_text(&config.category)?)
        .bind(Json(&config.date_range))
        .bind(Json(&config.metrics))
        .bind(Json(&config.filters))
        .bind(Json(&config.visualization))
        .bind(config.include_ai_insights)
        .bind(Json(&config.insights_focus))
        .bind(config.last_generated)
        .bind(config.generation_count)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn update_configuration(&self, config: &ReportConfiguration) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE report_configurations SET \
             name = $2, description = $3, is_public = $4, category = $5, date_range = $6, \
             metrics = $7, filters = $8, visualization = $9, include_ai_insights = $10, \
             insights_focus = $11, updated_at = $12 \
             WHERE id = $1",
        )
        .bind(config.id)
        .bind(&config.name)
        .bind(&config.description)
        .bind(config.is_public)
        .bind(enum_to_text(&config.category)?)
        .bind(Json(&config.date_range))
        .bind(Json(&config.metrics))
        .bind(Json(&config.filters))
        .bind(Json(&config.visualization))
        .bind(config.include_ai_insights)
        .bind(Json(&config.insights_focus))
        .bind(config.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Configuration {} not found", config.id)));
        }
        Ok(())
    }

    async fn delete_configuration(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM report_configurations WHERE id = $1 AND NOT is_template")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Configuration {} not found", id)));
        }
        Ok(())
    }

    async fn record_generation(&self, id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        sqlx::query(
            "UPDATE report_configurations \
             SET generation_count = generation_count + 1, last_generated = $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn insert_shared_report(&self, share: &SharedReport) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO shared_reports \
             (id, configuration_id, owner_id, token, report_name, snapshot, expiration_date, \
              is_active, password_hash, allowed_emails, view_count, last_accessed_at, \
              share_message, shared_with, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(share.id)
        .bind(share.configuration_id)
        .bind(share.owner_id)
        .bind(&share.token)
        .bind(&share.report_name)
        .bind(Json(&share.snapshot))
        .bind(share.expiration_date)
        .bind(share.is_active)
        .bind(&share.password_hash)
        .bind(Json(&share.allowed_emails))
        .bind(share.view_count)
        .bind(share.last_accessed_at)
        .bind(&share.share_message)
        .bind(Json(&share.shared_with))
        .bind(share.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict("share token already in use".to_string())
            }
            other => PortError::Unexpected(other.to_string()),
        })?;
        Ok(())
    }

    async fn get_shared_report(&self, id: Uuid) -> PortResult<SharedReport> {
        let sql = format!("SELECT {} FROM shared_reports WHERE id = $1", SHARE_COLUMNS);
        let record = sqlx::query_as::<_, SharedReportRecord>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected(format!("Share {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn get_shared_report_by_token(&self, token: &str) -> PortResult<SharedReport> {
        let sql = format!("SELECT {} FROM shared_reports WHERE token = $1", SHARE_COLUMNS);
        let record = sqlx::query_as::<_, SharedReportRecord>(&sql)
            .bind(token)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected("Shared report not found".to_string()))?;
        Ok(record.to_domain())
    }

    async fn record_share_access(&self, share_id: Uuid, entry: &AccessLogEntry) -> PortResult<i64> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // The row lock taken by this UPDATE serialises concurrent views of one share.
        let updated: Option<(i64,)> = sqlx::query_as(
            "UPDATE shared_reports \
             SET view_count = view_count + 1, last_accessed_at = $2 \
             WHERE id = $1 AND is_active AND expiration_date > $2 \
             RETURNING view_count",
        )
        .bind(share_id)
        .bind(entry.accessed_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;

        let Some((view_count,)) = updated else {
            tx.rollback().await.map_err(unexpected)?;
            return Err(PortError::AccessDenied);
        };

        sqlx::query(
            "INSERT INTO share_access_log (share_id, accessed_at, ip_address, user_agent, email) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(share_id)
        .bind(entry.accessed_at)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.email)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(view_count)
    }

    async fn list_share_access(&self, share_id: Uuid) -> PortResult<Vec<AccessLogEntry>> {
        let records = sqlx::query_as::<_, AccessLogRecord>(
            "SELECT accessed_at, ip_address, user_agent, email FROM share_access_log \
             WHERE share_id = $1 ORDER BY accessed_at ASC, id ASC",
        )
        .bind(share_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn deactivate_shared_report(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE shared_reports SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_shared_reports_for_owner(&self, owner_id: Uuid) -> PortResult<Vec<SharedReportSummary>> {
        let records = sqlx::query_as::<_, SharedReportSummaryRecord>(
            "SELECT id, configuration_id, token, report_name, expiration_date, is_active, \
             password_hash IS NOT NULL AS password_protected, allowed_emails, view_count, \
             last_accessed_at, share_message, shared_with, created_at \
             FROM shared_reports WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
