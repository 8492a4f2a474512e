// libs/visit-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn visit_routes(state: Arc<AppConfig>) -> Router {
    // Every visit operation is performed by authenticated staff
    let protected_routes = Router::new()
        .route("/", post(handlers::check_in_visit))
        .route("/{visit_id}", get(handlers::get_visit))
        .route("/{visit_id}/history", get(handlers::get_status_history))
        .route("/{visit_id}/balance", get(handlers::get_balance))
        .route("/{visit_id}/transitions", get(handlers::get_valid_transitions))
        .route("/{visit_id}/advance", post(handlers::advance_visit))
        .route("/{visit_id}/transition", post(handlers::transition_visit))
        .route("/{visit_id}/cancel", post(handlers::cancel_visit))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
