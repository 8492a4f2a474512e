use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};
use tracing::warn;

use shared_models::auth::{StaffRole, User};
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

// Validates the bearer token and stores the staff identity in request extensions
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Rejects staff whose role is not among `allowed`.
pub fn require_role(user: &User, allowed: &[StaffRole]) -> Result<StaffRole, AppError> {
    let role = user.staff_role();
    if allowed.contains(&role) {
        Ok(role)
    } else {
        warn!("Staff {} with role {} denied access", user.id, role);
        Err(AppError::Forbidden(format!("Role {} is not permitted to perform this action", role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::test_utils::TestUser;

    #[test]
    fn test_require_role_allows_listed_role() {
        let user = TestUser::admin("admin@clinic.test").to_user();
        assert_eq!(require_role(&user, &[StaffRole::Admin]).unwrap(), StaffRole::Admin);
    }

    #[test]
    fn test_require_role_rejects_other_roles() {
        let user = TestUser::nurse("nurse@clinic.test").to_user();
        assert_matches!(require_role(&user, &[StaffRole::Admin]), Err(AppError::Forbidden(_)));
    }
}
