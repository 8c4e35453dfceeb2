//! crates/job_tracker_core/src/sharing.rs
//!
//! The sharing gateway: mints tokenized, immutable report snapshots and gates
//! every view behind the share's access policy (active flag, expiration,
//! optional password, optional email allow-list).
//!
//! A view never touches aggregation or insight generation; it is a lookup, a
//! policy check and one atomic access-log append.

use argon2::{
    password_hash::{rand_core::OsRng as SaltRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    normalize_email, AccessLogEntry, Recipient, ReportConfiguration, ReportData, SharedReport,
    SharedReportSummary,
};
use crate::ports::{Clock, PortError, PortResult, ReportStore};

const TOKEN_BYTES: usize = 32;
const MAX_TOKEN_ATTEMPTS: usize = 3;
pub const DEFAULT_MAX_EXPIRATION_DAYS: i64 = 365;
/// Hard ceiling on any configured share lifetime.
pub const EXPIRATION_DAYS_CEILING: i64 = 3650;

//=========================================================================================
// Request and Response Types
//=========================================================================================

/// Owner-supplied access policy and metadata for a new share.
#[derive(Debug, Clone, Default)]
pub struct ShareRequest {
    pub expiration_days: i64,
    pub password: Option<String>,
    pub allowed_emails: Vec<String>,
    pub share_message: Option<String>,
    pub shared_with: Vec<Recipient>,
}

/// What the owner gets back after sharing.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareReceipt {
    pub share_id: Uuid,
    pub token: String,
    pub share_url: String,
    pub expiration_date: DateTime<Utc>,
}

/// An incoming public view attempt.
#[derive(Debug, Clone, Default)]
pub struct ViewRequest {
    pub token: String,
    pub password: Option<String>,
    pub email: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// The frozen snapshot plus display metadata returned to an authorized viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedView {
    pub report_name: String,
    pub snapshot: ReportData,
    pub share_message: Option<String>,
    pub expiration_date: DateTime<Utc>,
    pub view_count: i64,
}

/// Owner-facing detail of one share, including its access log.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareDetails {
    pub summary: SharedReportSummary,
    pub access_log: Vec<AccessLogEntry>,
}

//=========================================================================================
// The Gateway
//=========================================================================================

#[derive(Clone)]
pub struct SharingGateway {
    store: Arc<dyn ReportStore>,
    clock: Arc<dyn Clock>,
    public_base_url: String,
    max_expiration_days: i64,
}

impl SharingGateway {
    pub fn new(store: Arc<dyn ReportStore>, clock: Arc<dyn Clock>, public_base_url: &str) -> Self {
        Self {
            store,
            clock,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_expiration_days: DEFAULT_MAX_EXPIRATION_DAYS,
        }
    }

    /// Caps share lifetimes; the value is clamped to `1..=EXPIRATION_DAYS_CEILING`.
    pub fn with_max_expiration_days(mut self, days: i64) -> Self {
        self.max_expiration_days = days.clamp(1, EXPIRATION_DAYS_CEILING);
        self
    }

    pub fn share_url(&self, token: &str) -> String {
        format!("{}/shared/{}", self.public_base_url, token)
    }

    /// Rejects a malformed share request before any report work is done.
    pub fn validate(&self, request: &ShareRequest) -> PortResult<()> {
        if request.expiration_days < 1 || request.expiration_days > self.max_expiration_days {
            return Err(PortError::Validation(format!(
                "expirationDays must be between 1 and {}",
                self.max_expiration_days
            )));
        }
        if request.password.as_deref().is_some_and(|p| p.is_empty()) {
            return Err(PortError::Validation("password must not be empty".to_string()));
        }
        if request.allowed_emails.iter().any(|e| !looks_like_email(e))
            || request.shared_with.iter().any(|r| !looks_like_email(&r.email))
        {
            return Err(PortError::Validation("invalid email address".to_string()));
        }
        Ok(())
    }

    /// Freezes `snapshot` behind a fresh token and persists the share.
    ///
    /// Token collisions are detected by the store; a colliding insert is retried
    /// with a new token a bounded number of times and never overwrites.
    pub async fn create(
        &self,
        config: &ReportConfiguration,
        owner_id: Uuid,
        snapshot: ReportData,
        request: ShareRequest,
    ) -> PortResult<ShareReceipt> {
        self.validate(&request)?;

        let now = self.clock.now();
        let expiration_date = now
            .checked_add_signed(Duration::days(request.expiration_days))
            .ok_or_else(|| PortError::Validation("expirationDays is out of range".to_string()))?;
        let password_hash = request.password.as_deref().map(hash_password).transpose()?;
        let mut share = SharedReport {
            id: Uuid::new_v4(),
            configuration_id: config.id,
            owner_id,
            token: String::new(),
            report_name: config.name.clone(),
            snapshot,
            expiration_date,
            is_active: true,
            password_hash,
            allowed_emails: request.allowed_emails.iter().map(|e| normalize_email(e)).collect(),
            view_count: 0,
            last_accessed_at: None,
            share_message: request.share_message,
            shared_with: request.shared_with,
            created_at: now,
        };

        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            share.token = mint_token();
            match self.store.insert_shared_report(&share).await {
                Ok(()) => {
                    info!(
                        "Created share {} for configuration {} (expires {}).",
                        share.id, config.id, share.expiration_date
                    );
                    return Ok(ShareReceipt {
                        share_id: share.id,
                        share_url: self.share_url(&share.token),
                        token: share.token,
                        expiration_date: share.expiration_date,
                    });
                }
                Err(PortError::Conflict(reason)) => {
                    warn!("Share token collision on attempt {}: {}", attempt, reason);
                }
                Err(e) => return Err(e),
            }
        }

        Err(PortError::Unexpected(format!(
            "could not mint a unique share token after {} attempts",
            MAX_TOKEN_ATTEMPTS
        )))
    }

    /// Evaluates a view attempt against the share's policy. Every policy
    /// failure is reported as the same `AccessDenied`; denied attempts leave
    /// the share untouched.
    pub async fn view(&self, request: ViewRequest) -> PortResult<SharedView> {
        let share = self.store.get_shared_report_by_token(&request.token).await?;
        let now = self.clock.now();

        if !share.is_valid(now) {
            info!("Denied view of share {}: {:?}.", share.id, share.state(now));
            return Err(PortError::AccessDenied);
        }

        if let Some(hash) = &share.password_hash {
            let matches = request
                .password
                .as_deref()
                .is_some_and(|candidate| verify_password(candidate, hash));
            if !matches {
                info!("Denied view of share {}: password check failed.", share.id);
                return Err(PortError::AccessDenied);
            }
        }

        if !share.allowed_emails.is_empty() {
            let allowed = request
                .email
                .as_deref()
                .is_some_and(|email| share.allows_email(email));
            if !allowed {
                info!("Denied view of share {}: email not on the allow-list.", share.id);
                return Err(PortError::AccessDenied);
            }
        }

        let entry = AccessLogEntry {
            accessed_at: now,
            ip_address: request.ip_address,
            user_agent: request.user_agent,
            email: request.email.as_deref().map(normalize_email),
        };
        let view_count = self.store.record_share_access(share.id, &entry).await?;

        Ok(SharedView {
            report_name: share.report_name,
            snapshot: share.snapshot,
            share_message: share.share_message,
            expiration_date: share.expiration_date,
            view_count,
        })
    }

    /// Deactivates a share. Idempotent; shares of other owners are reported as
    /// not found.
    pub async fn revoke(&self, share_id: Uuid, owner_id: Uuid) -> PortResult<()> {
        let share = self.owned_share(share_id, owner_id).await?;
        if !share.is_active {
            return Ok(());
        }
        self.store.deactivate_shared_report(share_id).await?;
        info!("Share {} revoked by its owner.", share_id);
        Ok(())
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> PortResult<Vec<SharedReportSummary>> {
        self.store.list_shared_reports_for_owner(owner_id).await
    }

    pub async fn details(&self, share_id: Uuid, owner_id: Uuid) -> PortResult<ShareDetails> {
        let share = self.owned_share(share_id, owner_id).await?;
        let access_log = self.store.list_share_access(share_id).await?;
        Ok(ShareDetails {
            summary: share.summary(),
            access_log,
        })
    }

    async fn owned_share(&self, share_id: Uuid, owner_id: Uuid) -> PortResult<SharedReport> {
        let share = self.store.get_shared_report(share_id).await?;
        if share.owner_id != owner_id {
            return Err(PortError::NotFound(format!("Share {} not found", share_id)));
        }
        Ok(share)
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// 32 bytes from the OS CSPRNG, hex encoded.
fn mint_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut SaltRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortError::Unexpected(format!("failed to hash share password: {}", e)))
}

fn verify_password(candidate: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored share password hash is unreadable: {}", e);
            false
        }
    }
}

fn looks_like_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_hex_and_unique() {
        let a = mint_token();
        let b = mint_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("hunter2").unwrap();
        assert!(!hash.contains("hunter2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email(" ada@example.com "));
        assert!(!looks_like_email("ada.example.com"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ada@localhost"));
    }
}
