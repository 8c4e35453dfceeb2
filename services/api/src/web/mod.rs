pub mod middleware;
pub mod rest;
pub mod shares;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_user;
pub use rest::ApiDoc;
pub use state::AppState;

/// Builds the API routes. Everything under `/reports` requires an `x-user-id`;
/// `/shared/{token}` is public.
pub fn router(state: Arc<AppState>) -> Router {
    let owner_routes = Router::new()
        .route("/reports/templates", get(rest::list_templates_handler))
        .route(
            "/reports/configurations",
            get(rest::list_configurations_handler).post(rest::create_configuration_handler),
        )
        .route(
            "/reports/configurations/{id}",
            get(rest::get_configuration_handler)
                .put(rest::update_configuration_handler)
                .delete(rest::delete_configuration_handler),
        )
        .route("/reports/configurations/{id}/export", get(rest::export_report_handler))
        .route("/reports/configurations/{id}/share", post(shares::create_share_handler))
        .route("/reports/generate", post(rest::generate_report_handler))
        .route("/reports/shares", get(shares::list_shares_handler))
        .route(
            "/reports/shares/{id}",
            get(shares::get_share_handler).delete(shares::revoke_share_handler),
        )
        .layer(axum_middleware::from_fn(require_user));

    let public_routes = Router::new().route("/shared/{token}", post(shares::view_shared_report_handler));

    Router::new()
        .merge(owner_routes)
        .merge(public_routes)
        .with_state(state)
}
