//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DisabledTextGenerator, OpenAiTextAdapter, PdfReportRenderer, PgMetricAggregator, PgReportStore,
        XlsxReportRenderer,
    },
    config::Config,
    error::ApiError,
    web::{self, ApiDoc, AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    Router,
};
use job_tracker_core::{
    InsightOrchestrator, ReportService, SharingGateway, SystemClock, TextGenerator,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgReportStore::new(db_pool.clone()));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let generator: Arc<dyn TextGenerator> = match &config.openai_api_key {
        Some(key) => {
            let client = Client::with_config(OpenAIConfig::new().with_api_key(key));
            Arc::new(OpenAiTextAdapter::new(client, config.insight_model.clone()))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; reports will be generated without AI insights.");
            Arc::new(DisabledTextGenerator)
        }
    };
    let aggregator = Arc::new(PgMetricAggregator::new(db_pool));
    let clock = Arc::new(SystemClock);

    // --- 4. Build the Report Service ---
    let insights = InsightOrchestrator::new(generator).with_call_timeout(config.insight_timeout);
    let sharing = SharingGateway::new(store.clone(), clock.clone(), &config.public_base_url)
        .with_max_expiration_days(config.max_share_expiration_days);
    let reports = ReportService::new(store, aggregator, insights, sharing, clock)
        .with_renderer(Arc::new(PdfReportRenderer::new()))
        .with_renderer(Arc::new(XlsxReportRenderer::new()));

    reports.seed_templates().await?;

    let app_state = Arc::new(AppState::new(Arc::new(reports), config.clone()));

    // --- 5. Create the Web Router ---
    let origin = config
        .cors_allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ALLOWED_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static(web::middleware::USER_ID_HEADER)]);

    let app = Router::new()
        .merge(web::router(app_state))
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
