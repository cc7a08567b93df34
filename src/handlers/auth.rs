use actix_web::{get, post, web, HttpResponse, Responder};
use log::{debug, info};
use serde_json::json;

use crate::config::{ApiError, AppConfig, DbPool};
use crate::models::{
    CompletePasswordChangeRequest, LoginRequest, PasswordChangeRequest, RefreshRequest,
    SendEmailRequest,
};
use crate::notifications::Notifier;
use crate::services::{AuthService, OtpService, UserService};

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn login(
    pool: &DbPool,
    config: &AppConfig,
    login_data: &LoginRequest,
) -> Result<HttpResponse, ApiError> {
    debug!("Login attempt for user: {}", login_data.username);
    let user = UserService::authenticate(&login_data.username, &login_data.password, pool).await?;
    AuthService::update_last_login(user.id, pool).await?;
    let response = AuthService::issue_tokens(&user, config, pool).await?;
    info!("User {} logged in", user.username);
    Ok(HttpResponse::Ok().json(response))
}

#[post("/token")]
pub async fn token(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    login_data: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    login(&pool, &config, &login_data).await
}

#[post("/request-token")]
pub async fn request_token(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    login_data: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    login(&pool, &config, &login_data).await
}

#[post("/token/refresh")]
pub async fn refresh_token(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    refresh_req: web::Json<RefreshRequest>,
) -> Result<HttpResponse, ApiError> {
    if refresh_req.refresh_token.trim().is_empty() {
        return Err(ApiError::validation("Refresh token is required"));
    }

    let user_id = AuthService::consume_refresh_token(&refresh_req.refresh_token, &pool).await?;
    let user = UserService::get_user_by_id(user_id, &pool).await?;
    if !user.is_active {
        return Err(ApiError::AuthError("Account is not active".to_string()));
    }

    let response = AuthService::issue_tokens(&user, &config, &pool).await?;
    info!("Token refreshed for user {}", user.username);
    Ok(HttpResponse::Ok().json(response))
}

#[post("/send-email")]
pub async fn send_email(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    notifier: web::Data<Notifier>,
    body: web::Json<SendEmailRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = UserService::find_by_username(&body.username, &pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let code = OtpService::issue(&user, &config, &pool).await?;
    notifier.email_verification(&user.email, &user.username, &code).await;

    Ok(HttpResponse::Ok().json(json!({
        "message": "A verification code has been sent to your email address"
    })))
}

#[get("/confirm-email/{username}/{otp}")]
pub async fn confirm_email(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (username, otp) = path.into_inner();
    let user = OtpService::confirm_email(&username, &otp, &config, &pool).await?;
    info!("User {} confirmed their email", user.username);
    Ok(HttpResponse::Ok().json(user))
}

#[post("/request-password-change")]
pub async fn request_password_change(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    notifier: web::Data<Notifier>,
    body: web::Json<PasswordChangeRequest>,
) -> Result<HttpResponse, ApiError> {
    // Same answer whether or not the address is registered.
    match UserService::find_by_email(&body.email, &pool).await? {
        Some(user) => {
            let code = OtpService::issue(&user, &config, &pool).await?;
            notifier.password_reset(&user.email, &user.username, &code).await;
        }
        None => debug!("Password change requested for unknown email"),
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "If the address is registered, a reset code has been sent to it"
    })))
}

#[post("/complete-password-change")]
pub async fn complete_password_change(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    body: web::Json<CompletePasswordChangeRequest>,
) -> Result<HttpResponse, ApiError> {
    OtpService::complete_password_change(&body.username, &body.otp, &body.new_password, &config, &pool).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Password changed successfully"
    })))
}
