use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub clinic_utc_offset_minutes: i32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            clinic_utc_offset_minutes: 0,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            clinic_utc_offset_minutes: self.clinic_utc_offset_minutes,
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "reception@clinic.test".to_string(),
            role: "RECEPTION".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "ADMIN")
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "DOCTOR")
    }

    pub fn nurse(email: &str) -> Self {
        Self::new(email, "NURSE")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row shapes returned by the PostgREST tables the clinic backend reads.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn visit_response(visit_id: &str, patient_id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": visit_id,
            "patient_id": patient_id,
            "visit_category": "HISTORY_AND_PHYSICAL",
            "visit_status": status,
            "chief_complaint": "Headache for three days",
            "current_status_since": "2024-03-04T09:15:00Z",
            "created_at": "2024-03-04T09:00:00Z",
            "updated_at": "2024-03-04T09:15:00Z"
        })
    }

    pub fn status_log_response(visit_id: &str, status: &str, changed_by: Option<&str>) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "visit_id": visit_id,
            "status": status,
            "changed_at": Utc::now().to_rfc3339(),
            "changed_by": changed_by
        })
    }

    pub fn amount_response(amount: &str) -> serde_json::Value {
        json!({ "amount": amount })
    }

    pub fn visit_activity_response(
        created_at: &str,
        payments: &[&str],
        charges: &[(&str, &str)],
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "created_at": created_at,
            "payments": payments.iter().map(|amount| json!({ "amount": amount })).collect::<Vec<_>>(),
            "charges": charges.iter()
                .map(|(amount, charge_type)| json!({ "amount": amount, "charge_type": charge_type }))
                .collect::<Vec<_>>()
        })
    }

    pub fn lab_test_request_response(lab_test_id: &str, name: &str, created_at: &str) -> serde_json::Value {
        json!({
            "lab_test_id": lab_test_id,
            "created_at": created_at,
            "lab_tests": { "id": lab_test_id, "name": name }
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert_eq!(app_config.clinic_utc_offset_minutes, 0);
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@clinic.test");
        assert_eq!(user.email, "doc@clinic.test");
        assert_eq!(user.role, "DOCTOR");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(user.role.clone()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
