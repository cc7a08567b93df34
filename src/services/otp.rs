//! One-time codes for email confirmation and password reset.
//!
//! The code for a user is a TOTP value whose secret is derived from the
//! username, so re-issuing within the same time step yields the same code.
//! Codes are single use: the `otp_used` flag on the account is set as soon
//! as one is redeemed. A code is only accepted for `OTP_STEP_SECS` after it
//! was issued, and it is burned after `MAX_OTP_ATTEMPTS` wrong guesses.

use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use log::{debug, info};
use sha2::{Digest, Sha256};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::config::{ApiError, AppConfig, DbPool};
use crate::db;
use crate::models::UserAccount;
use crate::schema::user_account;
use crate::services::auth::AuthService;

const OTP_DIGITS: usize = 6;

pub const MAX_OTP_ATTEMPTS: i32 = 5;

pub struct OtpService;

impl OtpService {
    /// Derives the code for `username` at unix time `at`.
    pub fn generate_at(
        username: &str,
        server_secret: &str,
        step_secs: u64,
        at: u64,
    ) -> Result<String, ApiError> {
        let mut hasher = Sha256::new();
        hasher.update(server_secret.as_bytes());
        hasher.update(b":");
        hasher.update(username.as_bytes());
        let digest = hasher.finalize();

        let encoded = Secret::Raw(digest.to_vec()).to_encoded();
        let key = encoded
            .to_bytes()
            .map_err(|e| ApiError::InternalError(format!("Invalid OTP secret: {:?}", e)))?;

        let totp = TOTP::new(Algorithm::SHA1, OTP_DIGITS, 1, step_secs, key)
            .map_err(|e| ApiError::InternalError(format!("Failed to build OTP generator: {}", e)))?;
        Ok(totp.generate(at))
    }

    pub fn generate(username: &str, config: &AppConfig) -> Result<String, ApiError> {
        let now = Utc::now().timestamp().max(0) as u64;
        Self::generate_at(username, &config.jwt_secret, config.otp_step_secs, now)
    }

    /// Checks a supplied code against the one stored on `user` at time `now`.
    pub fn verify(user: &UserAccount, supplied: &str, now: NaiveDateTime, ttl: Duration) -> Result<(), ApiError> {
        if user.otp_used {
            return Err(ApiError::validation("This code has already been used"));
        }
        if user.otp_attempts >= MAX_OTP_ATTEMPTS {
            return Err(ApiError::validation("Too many attempts, request a new code"));
        }
        match user.otp_issued_at {
            Some(issued) if now - issued <= ttl => {}
            _ => return Err(ApiError::validation("This code has expired, request a new one")),
        }
        match user.otp.as_deref() {
            Some(code) if !code.is_empty() && code == supplied.trim() => Ok(()),
            _ => Err(ApiError::validation("Invalid verification code")),
        }
    }

    /// Locks the account, checks the code and hands the account to `apply`.
    ///
    /// A rejected code is counted and committed even though the request fails.
    async fn redeem<T, F>(
        username: &str,
        otp: &str,
        config: &AppConfig,
        pool: &DbPool,
        apply: F,
    ) -> Result<T, ApiError>
    where
        F: FnOnce(&mut PgConnection, &UserAccount) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let username = username.to_string();
        let otp = otp.to_string();
        let ttl = Duration::seconds(config.otp_step_secs.min(i64::MAX as u64 / 1_000) as i64);

        db::run_tx(pool, move |conn| {
            let user = find_for_update(conn, &username)?;
            if let Err(rejected) = Self::verify(&user, &otp, Utc::now().naive_utc(), ttl) {
                let attempts = user.otp_attempts.saturating_add(1);
                diesel::update(user_account::table.find(user.id))
                    .set((
                        user_account::otp_attempts.eq(attempts),
                        user_account::otp_used.eq(user.otp_used || attempts >= MAX_OTP_ATTEMPTS),
                    ))
                    .execute(conn)?;
                debug!("Rejected code for user {} ({} attempts)", user.username, attempts);
                return Ok(Err(rejected));
            }
            apply(conn, &user).map(Ok)
        })
        .await?
    }

    /// Generates a fresh code for the account and stores it as unused.
    pub async fn issue(user: &UserAccount, config: &AppConfig, pool: &DbPool) -> Result<String, ApiError> {
        let code = Self::generate(&user.username, config)?;
        let user_id = user.id;
        let stored = code.clone();

        db::run(pool, move |conn| {
            diesel::update(user_account::table.find(user_id))
                .set((
                    user_account::otp.eq(Some(stored)),
                    user_account::otp_used.eq(false),
                    user_account::otp_issued_at.eq(Some(Utc::now().naive_utc())),
                    user_account::otp_attempts.eq(0),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await?;

        info!("Issued verification code for user {}", user.username);
        Ok(code)
    }

    /// Redeems a code to verify the account's email address.
    pub async fn confirm_email(
        username: &str,
        otp: &str,
        config: &AppConfig,
        pool: &DbPool,
    ) -> Result<UserAccount, ApiError> {
        Self::redeem(username, otp, config, pool, |conn, user| {
            let updated = diesel::update(user_account::table.find(user.id))
                .set((
                    user_account::otp_used.eq(true),
                    user_account::is_active.eq(true),
                    user_account::email_verified.eq(true),
                ))
                .returning(UserAccount::as_returning())
                .get_result(conn)?;
            debug!("Email verified for user {}", updated.username);
            Ok(updated)
        })
        .await
    }

    /// Redeems a code to replace the account password.
    pub async fn complete_password_change(
        username: &str,
        otp: &str,
        new_password: &str,
        config: &AppConfig,
        pool: &DbPool,
    ) -> Result<(), ApiError> {
        AuthService::validate_password(new_password)?;
        let new_password = new_password.to_string();

        Self::redeem(username, otp, config, pool, move |conn, user| {
            if AuthService::verify_password(&new_password, &user.password_hash)? {
                return Err(ApiError::validation(
                    "The new password must differ from the current one",
                ));
            }

            let password_hash = AuthService::hash_password(&new_password)?;
            diesel::update(user_account::table.find(user.id))
                .set((
                    user_account::password_hash.eq(password_hash),
                    user_account::otp_used.eq(true),
                ))
                .execute(conn)?;
            info!("Password changed for user {}", user.username);
            Ok(())
        })
        .await
    }
}

fn find_for_update(conn: &mut PgConnection, username: &str) -> Result<UserAccount, ApiError> {
    user_account::table
        .filter(user_account::username.eq(username))
        .select(UserAccount::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::validation("Invalid verification code"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserLevel;
    use chrono::NaiveDate;

    const SECRET: &str = "test-secret-0123456789abcdef";

    #[test]
    fn code_is_deterministic_within_a_step() {
        let a = OtpService::generate_at("jdoe", SECRET, 300, 1_700_000_000).unwrap();
        let b = OtpService::generate_at("jdoe", SECRET, 300, 1_700_000_010).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
        assert!(a.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn code_depends_on_username_and_secret() {
        let base = OtpService::generate_at("jdoe", SECRET, 300, 1_700_000_000).unwrap();
        let other_user = OtpService::generate_at("asmith", SECRET, 300, 1_700_000_000).unwrap();
        let other_secret =
            OtpService::generate_at("jdoe", "another-secret-abcdef012345", 300, 1_700_000_000).unwrap();
        // Six digit codes can collide, but not for both at once with these inputs.
        assert!(base != other_user || base != other_secret);
    }

    fn holder(code: Option<&str>, issued_at: Option<NaiveDateTime>) -> UserAccount {
        let joined = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        UserAccount {
            id: 7,
            username: "jdoe".to_string(),
            email: "jdoe@example.org".to_string(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            phone_number: None,
            staff_number: None,
            level: UserLevel::Rde,
            is_staff: false,
            is_superuser: false,
            is_active: false,
            email_verified: false,
            attached_region_id: None,
            otp: code.map(str::to_string),
            otp_used: false,
            otp_issued_at: issued_at,
            otp_attempts: 0,
            last_login: None,
            date_joined: joined,
        }
    }

    fn issued() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    fn ttl() -> Duration {
        Duration::seconds(300)
    }

    #[test]
    fn verify_accepts_matching_fresh_code() {
        let user = holder(Some("123456"), Some(issued()));
        let now = issued() + Duration::seconds(299);
        assert!(OtpService::verify(&user, "123456", now, ttl()).is_ok());
        assert!(OtpService::verify(&user, " 123456 ", now, ttl()).is_ok());
    }

    #[test]
    fn verify_rejects_replay_even_with_correct_code() {
        let mut user = holder(Some("123456"), Some(issued()));
        user.otp_used = true;
        let err = OtpService::verify(&user, "123456", issued(), ttl()).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn verify_rejects_mismatch_and_missing_code() {
        let user = holder(Some("123456"), Some(issued()));
        assert!(OtpService::verify(&user, "654321", issued(), ttl()).is_err());
        assert!(OtpService::verify(&holder(None, Some(issued())), "123456", issued(), ttl()).is_err());
        assert!(OtpService::verify(&holder(Some(""), Some(issued())), "", issued(), ttl()).is_err());
    }

    #[test]
    fn verify_rejects_expired_code() {
        let user = holder(Some("123456"), Some(issued()));
        let late = issued() + Duration::seconds(301);
        let err = OtpService::verify(&user, "123456", late, ttl()).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(ref m) if m.contains("expired")));

        let never_issued = holder(Some("123456"), None);
        assert!(OtpService::verify(&never_issued, "123456", issued(), ttl()).is_err());
    }

    #[test]
    fn verify_rejects_correct_code_once_attempts_are_exhausted() {
        let mut user = holder(Some("123456"), Some(issued()));
        user.otp_attempts = MAX_OTP_ATTEMPTS - 1;
        assert!(OtpService::verify(&user, "123456", issued(), ttl()).is_ok());

        user.otp_attempts = MAX_OTP_ATTEMPTS;
        let err = OtpService::verify(&user, "123456", issued(), ttl()).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(ref m) if m.contains("Too many")));
    }
}
