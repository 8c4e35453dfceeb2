//! services/api/src/web/shares.rs
//!
//! Handlers for creating, listing and revoking report shares (owner-scoped),
//! and the public, unauthenticated view of a shared snapshot.

use crate::error::http_error;
use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;
use axum::{
    body,
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use job_tracker_core::domain::{AccessLogEntry, Recipient, SharedReportSummary};
use job_tracker_core::{ReportData, ShareRequest, ViewRequest};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// Upper bound on the public view request body ({password?, email?}).
const VIEW_BODY_LIMIT: usize = 16 * 1024;

//=========================================================================================
// API Payload Structs
//=========================================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateShareRequest {
    /// Days until the link expires. Defaults to the server's configured value.
    pub expiration_days: Option<i64>,
    pub password: Option<String>,
    pub allowed_emails: Vec<String>,
    pub share_message: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub shared_with: Vec<Recipient>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareResponse {
    pub share_id: Uuid,
    pub token: String,
    pub share_url: String,
    pub expiration_date: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ViewSharedReportRequest {
    pub password: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SharedReportResponse {
    pub report_name: String,
    #[schema(value_type = Object)]
    pub report_data: ReportData,
    pub share_message: Option<String>,
    pub expiration_date: DateTime<Utc>,
    pub view_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareDetailsResponse {
    #[schema(value_type = Object)]
    pub share: SharedReportSummary,
    #[schema(value_type = Vec<Object>)]
    pub access_log: Vec<AccessLogEntry>,
}

//=========================================================================================
// Owner Handlers
//=========================================================================================

/// Freeze the current report for a configuration behind a new share link.
#[utoipa::path(
    post,
    path = "/reports/configurations/{id}/share",
    request_body = CreateShareRequest,
    responses(
        (status = 201, description = "Share created", body = CreateShareResponse),
        (status = 400, description = "Invalid expiration, password or email list"),
        (status = 404, description = "No such configuration")
    ),
    params(
        ("id" = Uuid, Path, description = "Configuration id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn create_share_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateShareRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = ShareRequest {
        expiration_days: request
            .expiration_days
            .unwrap_or(state.config.default_share_expiration_days),
        password: request.password,
        allowed_emails: request.allowed_emails,
        share_message: request.share_message,
        shared_with: request.shared_with,
    };

    let receipt = state.reports.share(user_id, id, request).await.map_err(http_error)?;
    let response = CreateShareResponse {
        share_id: receipt.share_id,
        token: receipt.token,
        share_url: receipt.share_url,
        expiration_date: receipt.expiration_date,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the caller's shares without their snapshots.
#[utoipa::path(
    get,
    path = "/reports/shares",
    responses((status = 200, description = "Share summaries, newest first", body = Vec<Object>)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn list_shares_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let shares = state
        .reports
        .sharing()
        .list_for_owner(user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(shares))
}

/// One share with its access log.
#[utoipa::path(
    get,
    path = "/reports/shares/{id}",
    responses(
        (status = 200, description = "Share summary and access log", body = ShareDetailsResponse),
        (status = 404, description = "No such share")
    ),
    params(
        ("id" = Uuid, Path, description = "Share id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_share_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let details = state.reports.sharing().details(id, user_id).await.map_err(http_error)?;
    Ok(Json(ShareDetailsResponse {
        share: details.summary,
        access_log: details.access_log,
    }))
}

/// Revoke a share. Revoking twice is not an error.
#[utoipa::path(
    delete,
    path = "/reports/shares/{id}",
    responses(
        (status = 204, description = "Revoked"),
        (status = 404, description = "No such share")
    ),
    params(
        ("id" = Uuid, Path, description = "Share id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn revoke_share_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.reports.sharing().revoke(id, user_id).await.map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Public Handler
//=========================================================================================

/// View a shared report. Any policy failure is the same 403.
#[utoipa::path(
    post,
    path = "/shared/{token}",
    request_body(content = ViewSharedReportRequest, description = "Credentials, when the share requires them. May be empty."),
    responses(
        (status = 200, description = "The frozen report snapshot", body = SharedReportResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "No such share")
    ),
    params(("token" = String, Path, description = "The share token."))
)]
pub async fn view_shared_report_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    request: Request,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (parts, body) = request.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let bytes = body::to_bytes(body, VIEW_BODY_LIMIT)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read request body: {}", e)))?;
    let credentials: ViewSharedReportRequest = if bytes.iter().all(u8::is_ascii_whitespace) {
        ViewSharedReportRequest::default()
    } else {
        serde_json::from_slice(&bytes)
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e)))?
    };

    let view = ViewRequest {
        token,
        password: credentials.password,
        email: credentials.email,
        ip_address: client_ip(&parts.headers, peer),
        user_agent: parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    debug!("Shared report view from {:?}.", view.ip_address);

    let shared = state.reports.sharing().view(view).await.map_err(http_error)?;
    Ok(Json(SharedReportResponse {
        report_name: shared.report_name,
        report_data: shared.snapshot,
        share_message: shared.share_message,
        expiration_date: shared.expiration_date,
        view_count: shared.view_count,
    }))
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header_value("x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty())
        .or_else(|| header_value("x-real-ip").map(str::to_string))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}
