use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error, info};
use uuid::Uuid;

use crate::config::{ApiError, AppConfig, DbPool};
use crate::db;
use crate::models::*;

pub struct AuthService;

impl AuthService {
    pub fn hash_password(password: &str) -> Result<String, ApiError> {
        hash(password, DEFAULT_COST).map_err(|e| {
            error!("Failed to hash password: {}", e);
            ApiError::InternalError("Failed to hash password".to_string())
        })
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
        verify(password, hash).map_err(|e| {
            error!("Failed to verify password: {}", e);
            ApiError::InternalError("Failed to verify password".to_string())
        })
    }

    pub fn validate_password(password: &str) -> Result<(), ApiError> {
        if password.chars().count() < 8 {
            return Err(ApiError::validation("Password must be at least 8 characters long"));
        }
        if password.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::validation("Password cannot be entirely numeric"));
        }
        Ok(())
    }

    /// Signs an access token carrying the role and region claims used for scoping.
    pub fn generate_token(
        user: &UserAccount,
        attached_country_id: Option<i32>,
        config: &AppConfig,
    ) -> Result<String, ApiError> {
        let now = Utc::now();
        let iat = now.timestamp() as usize;
        let exp = (now + Duration::hours(config.jwt_expiry)).timestamp() as usize;

        let claims = Claims {
            sub: user.id.to_string(),
            exp,
            iat,
            user_id: user.id,
            username: user.username.clone(),
            level: user.level,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            attached_region_id: user.attached_region_id,
            attached_country_id,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .map_err(|e| {
            error!("Failed to generate token: {}", e);
            ApiError::InternalError("Failed to generate token".to_string())
        })
    }

    pub fn decode_token(token: &str, config: &AppConfig) -> Result<Claims, ApiError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            ApiError::AuthError("Invalid or expired token".to_string())
        })
    }

    pub fn generate_refresh_token() -> String {
        Uuid::new_v4().to_string()
    }

    pub async fn store_refresh_token(
        user_id: i32,
        token: &str,
        config: &AppConfig,
        pool: &DbPool,
    ) -> Result<(), ApiError> {
        let new_token = NewRefreshToken {
            user_id,
            token: token.to_string(),
            expires_at: (Utc::now() + Duration::days(config.refresh_expiry)).naive_utc(),
        };

        db::run(pool, move |conn| {
            use crate::schema::refresh_token::dsl::*;
            diesel::insert_into(refresh_token)
                .values(&new_token)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    /// Consumes a live refresh token and returns its owner's id.
    pub async fn consume_refresh_token(token_str: &str, pool: &DbPool) -> Result<i32, ApiError> {
        let token_str = token_str.to_string();
        db::run_tx(pool, move |conn| {
            use crate::schema::refresh_token::dsl::*;
            let record = refresh_token
                .filter(token.eq(&token_str))
                .filter(expires_at.gt(Utc::now().naive_utc()))
                .select(RefreshToken::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| {
                    ApiError::AuthError("Invalid or expired refresh token".to_string())
                })?;

            diesel::delete(refresh_token.find(record.token_id)).execute(conn)?;
            Ok(record.user_id)
        })
        .await
    }

    pub async fn update_last_login(user_id_param: i32, pool: &DbPool) -> Result<(), ApiError> {
        db::run(pool, move |conn| {
            use crate::schema::user_account::dsl::*;
            diesel::update(user_account.find(user_id_param))
                .set(last_login.eq(Some(Utc::now().naive_utc())))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    /// Issues an access/refresh pair for an already authenticated user.
    pub async fn issue_tokens(
        user: &UserAccount,
        config: &AppConfig,
        pool: &DbPool,
    ) -> Result<LoginResponse, ApiError> {
        let attached_country_id = match user.attached_region_id {
            Some(region_id) => Some(super::reference::country_of_region(region_id, pool).await?),
            None => None,
        };

        let token = Self::generate_token(user, attached_country_id, config)?;
        let refresh_token = Self::generate_refresh_token();
        Self::store_refresh_token(user.id, &refresh_token, config, pool).await?;

        info!("Issued tokens for user {}", user.username);
        Ok(LoginResponse {
            token,
            refresh_token,
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            level: user.level,
            is_staff: user.is_staff,
            attached_region_id: user.attached_region_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn user() -> UserAccount {
        let joined = NaiveDate::from_ymd_opt(2022, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        UserAccount {
            id: 12,
            username: "admin.ke".to_string(),
            email: "admin@example.org".to_string(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            phone_number: None,
            staff_number: Some("KE-001".to_string()),
            level: UserLevel::Country,
            is_staff: true,
            is_superuser: false,
            is_active: true,
            email_verified: true,
            attached_region_id: Some(5),
            otp: None,
            otp_used: false,
            otp_issued_at: None,
            otp_attempts: 0,
            last_login: None,
            date_joined: joined,
        }
    }

    #[test]
    fn token_carries_scope_claims() {
        let config = AppConfig::for_tests();
        let token = AuthService::generate_token(&user(), Some(3), &config).unwrap();
        let claims = AuthService::decode_token(&token, &config).unwrap();

        assert_eq!(claims.user_id, 12);
        assert_eq!(claims.level, UserLevel::Country);
        assert!(claims.is_staff);
        assert_eq!(claims.attached_region_id, Some(5));
        assert_eq!(claims.attached_country_id, Some(3));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = AppConfig::for_tests();
        let token = AuthService::generate_token(&user(), None, &config).unwrap();

        let mut other = AppConfig::for_tests();
        other.jwt_secret = "a-completely-different-secret".to_string();
        let err = AuthService::decode_token(&token, &other).unwrap_err();
        assert!(matches!(err, ApiError::AuthError(_)));
    }

    #[test]
    fn password_rules() {
        assert!(AuthService::validate_password("short").is_err());
        assert!(AuthService::validate_password("1234567890").is_err());
        assert!(AuthService::validate_password("correct horse").is_ok());
    }
}
