use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{JwtClaims, JwtHeader, User};

type HmacSha256 = Hmac<Sha256>;

/// Validates an HS256 token issued by Supabase Auth and returns the staff identity it carries.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(claims), Some(signature), None) => (header, claims, signature),
        _ => return Err("Invalid token format".to_string()),
    };

    let header: JwtHeader = decode_segment(header_b64)
        .map_err(|e| {
            debug!("Failed to parse header: {}", e);
            "Invalid header format".to_string()
        })?;
    if header.alg != "HS256" {
        return Err(format!("Unsupported token algorithm: {}", header.alg));
    }

    let signature = URL_SAFE_NO_PAD.decode(signature_b64)
        .map_err(|e| {
            debug!("Failed to decode signature: {}", e);
            "Invalid signature encoding".to_string()
        })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims: JwtClaims = decode_segment(claims_b64)
        .map_err(|e| {
            debug!("Failed to parse claims: {}", e);
            "Invalid claims format".to_string()
        })?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp().max(0) as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let created_at = claims.iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, String> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    #[test]
    fn test_valid_token_round_trips_identity() {
        let staff = TestUser::admin("admin@clinic.test");
        let token = JwtTestUtils::create_test_token(&staff, SECRET, Some(1));

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.id, staff.id);
        assert_eq!(user.role.as_deref(), Some("ADMIN"));
    }

    #[test]
    fn test_rejects_expired_token() {
        let token = JwtTestUtils::create_expired_token(&TestUser::default(), SECRET);
        assert_eq!(validate_token(&token, SECRET).unwrap_err(), "Token expired");
    }

    #[test]
    fn test_rejects_wrong_signature() {
        let token = JwtTestUtils::create_invalid_signature_token(&TestUser::default());
        assert_eq!(validate_token(&token, SECRET).unwrap_err(), "Invalid token signature");
    }

    #[test]
    fn test_rejects_malformed_token() {
        let token = JwtTestUtils::create_malformed_token();
        assert!(validate_token(&token, SECRET).is_err());
        assert!(validate_token("a.b.c.d", SECRET).is_err());
    }

    #[test]
    fn test_requires_secret() {
        let token = JwtTestUtils::create_test_token(&TestUser::default(), SECRET, None);
        assert_eq!(validate_token(&token, "").unwrap_err(), "JWT secret is not set");
    }
}
