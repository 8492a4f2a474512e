// libs/visit-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CheckInRequest, TransitionOutcome, TransitionRequest};
use crate::services::visit::VisitService;

fn staff_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid staff ID".to_string()))
}

fn transition_response(outcome: TransitionOutcome) -> Json<Value> {
    let visit = outcome.visit();
    let status = visit.visit_status;

    Json(json!({
        "status_label": status.label(),
        "changed": outcome.is_applied(),
        "result": outcome,
    }))
}

#[axum::debug_handler]
pub async fn check_in_visit(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = staff_id(&user)?;
    let service = VisitService::new(&config);

    let visit = service.check_in(request, Some(actor), auth.token()).await?;

    Ok(Json(json!(visit)))
}

#[axum::debug_handler]
pub async fn get_visit(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = VisitService::new(&config);

    let visit = service.get_visit_with_financials(visit_id, auth.token()).await?;

    Ok(Json(json!(visit)))
}

#[axum::debug_handler]
pub async fn get_status_history(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = VisitService::new(&config);

    let history = service.status_history(visit_id, auth.token()).await?;

    Ok(Json(json!({
        "visit_id": visit_id,
        "history": history,
        "total": history.len()
    })))
}

#[axum::debug_handler]
pub async fn get_balance(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = VisitService::new(&config);

    let balance = service.compute_balance(visit_id, auth.token()).await?;

    Ok(Json(json!(balance)))
}

#[axum::debug_handler]
pub async fn get_valid_transitions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = VisitService::new(&config);

    let (visit, targets) = service.valid_targets(visit_id, auth.token()).await?;

    Ok(Json(json!({
        "visit_id": visit.id,
        "current_status": visit.visit_status,
        "next_status": service.transition_table().successor_of(visit.visit_status),
        "valid_targets": targets,
        "table_version": service.transition_table().version()
    })))
}

#[axum::debug_handler]
pub async fn advance_visit(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = staff_id(&user)?;
    let service = VisitService::new(&config);

    let outcome = service.advance_to_next(visit_id, Some(actor), auth.token()).await?;

    Ok(transition_response(outcome))
}

#[axum::debug_handler]
pub async fn transition_visit(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(visit_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = staff_id(&user)?;
    let service = VisitService::new(&config);

    let outcome = service.advance_to(visit_id, request.target_status, Some(actor), auth.token()).await?;

    Ok(transition_response(outcome))
}

#[axum::debug_handler]
pub async fn cancel_visit(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = staff_id(&user)?;
    let service = VisitService::new(&config);

    let outcome = service.cancel(visit_id, Some(actor), auth.token()).await?;

    Ok(transition_response(outcome))
}
