// libs/reporting-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{StaffRole, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::Timespan;
use crate::services::report::ReportService;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default, alias = "timespans")]
    pub timespan: Option<String>,
}

#[axum::debug_handler]
pub async fn get_dashboard(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[StaffRole::Admin])?;

    let timespan = match query.timespan.as_deref() {
        Some(value) => value.parse::<Timespan>()?,
        None => Timespan::default(),
    };

    let service = ReportService::new(&config);
    let report = service.timespan_report(timespan, auth.token()).await?;

    Ok(Json(json!(report)))
}
