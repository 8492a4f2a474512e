use std::env;
use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Offset of the clinic's wall clock from UTC, used for dashboard calendar windows.
    pub clinic_utc_offset_minutes: i32,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|value| match value.parse::<i32>() {
                    Ok(minutes) => Some(minutes),
                    Err(_) => {
                        warn!("CLINIC_UTC_OFFSET_MINUTES is not a number: {}", value);
                        None
                    }
                })
                .unwrap_or(0),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Falls back to UTC when the configured offset is out of range.
    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!("Clinic UTC offset {} minutes out of range, using UTC", self.clinic_utc_offset_minutes);
            Utc.fix()
        })
    }
}
