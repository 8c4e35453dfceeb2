//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the report configuration, generation and
//! export endpoints, and the master definition for the OpenAPI specification.

use crate::error::http_error;
use crate::web::middleware::CurrentUser;
use crate::web::shares;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use bytes::Bytes;
use job_tracker_core::{ConfigurationDraft, ExportFormat, ReportSource};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_templates_handler,
        list_configurations_handler,
        create_configuration_handler,
        get_configuration_handler,
        update_configuration_handler,
        delete_configuration_handler,
        generate_report_handler,
        export_report_handler,
        shares::create_share_handler,
        shares::list_shares_handler,
        shares::get_share_handler,
        shares::revoke_share_handler,
        shares::view_shared_report_handler,
    ),
    components(
        schemas(
            GenerateReportRequest,
            shares::CreateShareRequest,
            shares::CreateShareResponse,
            shares::ViewSharedReportRequest,
            shares::SharedReportResponse,
            shares::ShareDetailsResponse,
        )
    ),
    tags(
        (name = "Job Tracker Reports API", description = "Custom reports, exports and secure report sharing.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

/// Either a saved configuration id or an inline, unsaved configuration.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportRequest {
    pub config_id: Option<Uuid>,
    #[schema(value_type = Option<Object>)]
    pub ad_hoc_config: Option<ConfigurationDraft>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    /// `pdf` or `xlsx`.
    #[param(value_type = String)]
    pub format: ExportFormat,
}

//=========================================================================================
// Configuration Handlers
//=========================================================================================

/// List the built-in public templates.
#[utoipa::path(
    get,
    path = "/reports/templates",
    responses(
        (status = 200, description = "Template configurations", body = Vec<Object>),
        (status = 401, description = "Missing or invalid x-user-id header")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn list_templates_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let templates = state.reports.list_templates().await.map_err(http_error)?;
    Ok(Json(templates))
}

/// List the caller's configurations together with the public templates.
#[utoipa::path(
    get,
    path = "/reports/configurations",
    responses(
        (status = 200, description = "Configurations visible to the caller", body = Vec<Object>),
        (status = 401, description = "Missing or invalid x-user-id header")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn list_configurations_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let configurations = state.reports.list_configurations(user_id).await.map_err(http_error)?;
    Ok(Json(configurations))
}

/// Save a new report configuration owned by the caller.
#[utoipa::path(
    post,
    path = "/reports/configurations",
    request_body(content = Object, description = "The configuration draft (name, dateRange, metrics, filters, ...)."),
    responses(
        (status = 201, description = "Configuration created", body = Object),
        (status = 400, description = "Invalid configuration"),
        (status = 401, description = "Missing or invalid x-user-id header")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn create_configuration_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(draft): Json<ConfigurationDraft>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let config = state
        .reports
        .create_configuration(user_id, draft)
        .await
        .map_err(http_error)?;
    info!("User {} created configuration {}.", user_id, config.id);
    Ok((StatusCode::CREATED, Json(config)))
}

/// Fetch one configuration the caller owns, or a public one.
#[utoipa::path(
    get,
    path = "/reports/configurations/{id}",
    responses(
        (status = 200, description = "The configuration", body = Object),
        (status = 404, description = "No such configuration")
    ),
    params(
        ("id" = Uuid, Path, description = "Configuration id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_configuration_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let config = state.reports.get_configuration(user_id, id).await.map_err(http_error)?;
    Ok(Json(config))
}

/// Replace the editable fields of a configuration. Templates cannot be edited.
#[utoipa::path(
    put,
    path = "/reports/configurations/{id}",
    request_body(content = Object, description = "The full configuration draft."),
    responses(
        (status = 200, description = "The updated configuration", body = Object),
        (status = 400, description = "Invalid configuration"),
        (status = 403, description = "Templates and other users' configurations are read-only"),
        (status = 404, description = "No such configuration")
    ),
    params(
        ("id" = Uuid, Path, description = "Configuration id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn update_configuration_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(draft): Json<ConfigurationDraft>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let config = state
        .reports
        .update_configuration(user_id, id, draft)
        .await
        .map_err(http_error)?;
    Ok(Json(config))
}

/// Delete a configuration. Templates are never deleted.
#[utoipa::path(
    delete,
    path = "/reports/configurations/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Templates and other users' configurations cannot be deleted"),
        (status = 404, description = "No such configuration")
    ),
    params(
        ("id" = Uuid, Path, description = "Configuration id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_configuration_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .reports
        .delete_configuration(user_id, id)
        .await
        .map_err(http_error)?;
    info!("User {} deleted configuration {}.", user_id, id);
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Generation and Export Handlers
//=========================================================================================

/// Generate report data from a saved or an inline configuration.
#[utoipa::path(
    post,
    path = "/reports/generate",
    request_body = GenerateReportRequest,
    responses(
        (status = 200, description = "The aggregated report data, with insights when requested", body = Object),
        (status = 400, description = "Neither configId nor adHocConfig given, or the configuration is invalid"),
        (status = 404, description = "No such configuration")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn generate_report_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(request): Json<GenerateReportRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let source = ReportSource::from_request(request.config_id, request.ad_hoc_config).map_err(http_error)?;
    let data = state.reports.generate(user_id, source).await.map_err(http_error)?;
    Ok(Json(data))
}

/// Render a saved configuration as a PDF document or an XLSX workbook.
#[utoipa::path(
    get,
    path = "/reports/configurations/{id}/export",
    responses(
        (status = 200, description = "The rendered artifact as an attachment", content_type = "application/octet-stream"),
        (status = 400, description = "Unknown format"),
        (status = 404, description = "No such configuration"),
        (status = 500, description = "Rendering failed")
    ),
    params(
        ("id" = Uuid, Path, description = "Configuration id."),
        ExportQuery,
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn export_report_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let artifact = state
        .reports
        .export(user_id, id, query.format)
        .await
        .map_err(http_error)?;

    let headers = [
        (header::CONTENT_TYPE, artifact.content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.filename),
        ),
    ];
    Ok((headers, Bytes::from(artifact.bytes)))
}
