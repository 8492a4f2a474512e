use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use reporting_cell::router::dashboard_routes;
use shared_config::AppConfig;
use visit_cell::router::visit_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic operations API is running!" }))
        .nest("/visits", visit_routes(state.clone()))
        .nest("/dashboard", dashboard_routes(state))
}
