// libs/reporting-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::get,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn dashboard_routes(state: Arc<AppConfig>) -> Router {
    // Role checks happen in the handler; the middleware only authenticates
    let protected_routes = Router::new()
        .route("/", get(handlers::get_dashboard))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
