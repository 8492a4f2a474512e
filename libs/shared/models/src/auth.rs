use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Staff role carried in the token; unknown or missing roles map to `Other`.
    pub fn staff_role(&self) -> StaffRole {
        self.role
            .as_deref()
            .and_then(|role| role.parse().ok())
            .unwrap_or(StaffRole::Other)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaffRole {
    Admin,
    Doctor,
    Nurse,
    Laboratory,
    Reception,
    Other,
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffRole::Admin => write!(f, "ADMIN"),
            StaffRole::Doctor => write!(f, "DOCTOR"),
            StaffRole::Nurse => write!(f, "NURSE"),
            StaffRole::Laboratory => write!(f, "LABORATORY"),
            StaffRole::Reception => write!(f, "RECEPTION"),
            StaffRole::Other => write!(f, "OTHER"),
        }
    }
}

impl FromStr for StaffRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(StaffRole::Admin),
            "DOCTOR" => Ok(StaffRole::Doctor),
            "NURSE" => Ok(StaffRole::Nurse),
            "LABORATORY" => Ok(StaffRole::Laboratory),
            "RECEPTION" => Ok(StaffRole::Reception),
            "OTHER" => Ok(StaffRole::Other),
            other => Err(format!("Unknown staff role: {}", other)),
        }
    }
}
