use log::warn;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::env;
use std::path::PathBuf;

pub use crate::db::DbPool;
pub use crate::errors::ApiError;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub jwt_expiry: i64,     // In hours
    pub refresh_expiry: i64, // In days
    pub otp_step_secs: u64,
    pub media_root: PathBuf,
    pub max_upload_bytes: usize,
    pub web_app_url: String,
    pub email_from: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(val) if !val.trim().is_empty() => val,
            _ => {
                warn!("JWT_SECRET is not set; generating an ephemeral secret");
                warn!("Issued tokens and OTP codes will not survive a restart!");
                Self::generate_secure_secret()
            }
        };

        Self {
            jwt_secret,
            jwt_expiry: env_or("JWT_EXPIRY_HOURS", 24),
            refresh_expiry: env_or("REFRESH_EXPIRY_DAYS", 30),
            otp_step_secs: env_or("OTP_STEP_SECS", 300),
            media_root: PathBuf::from(
                env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string()),
            ),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            web_app_url: env::var("WEB_APP_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "no-reply@rde-roster.local".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.len() < 16 {
            return Err("JWT_SECRET must be at least 16 characters".to_string());
        }

        if self.jwt_expiry <= 0 {
            return Err("JWT_EXPIRY_HOURS must be positive".to_string());
        }

        if self.refresh_expiry <= 0 {
            return Err("REFRESH_EXPIRY_DAYS must be positive".to_string());
        }

        if self.otp_step_secs == 0 {
            return Err("OTP_STEP_SECS must be positive".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("MAX_UPLOAD_BYTES must be positive".to_string());
        }

        Ok(())
    }

    pub fn generate_secure_secret() -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect()
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            jwt_secret: "test-secret-0123456789abcdef".to_string(),
            jwt_expiry: 1,
            refresh_expiry: 1,
            otp_step_secs: 300,
            media_root: std::env::temp_dir().join("rde-roster-tests"),
            max_upload_bytes: 1024,
            web_app_url: "http://localhost:3000".to_string(),
            email_from: "tests@rde-roster.local".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_is_long_enough() {
        let secret = AppConfig::generate_secure_secret();
        assert_eq!(secret.len(), 48);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn validate_rejects_non_positive_durations() {
        let mut config = AppConfig::for_tests();
        assert!(config.validate().is_ok());

        config.jwt_expiry = 0;
        assert!(config.validate().is_err());

        config = AppConfig::for_tests();
        config.otp_step_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_short_secret() {
        let mut config = AppConfig::for_tests();
        config.jwt_secret = "short".to_string();
        assert_eq!(
            config.validate().unwrap_err(),
            "JWT_SECRET must be at least 16 characters"
        );
    }
}
