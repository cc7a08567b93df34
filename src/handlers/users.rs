use actix_web::{delete, get, patch, post, web, HttpResponse};
use log::debug;

use crate::access::Requester;
use crate::config::{ApiError, AppConfig, DbPool};
use crate::models::{CreateUserRequest, UpdateUserRequest};
use crate::notifications::Notifier;
use crate::services::{OtpService, UserService};

#[get("/users")]
pub async fn list_users(requester: Requester, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let users = UserService::list(&requester, &pool).await?;
    debug!("Listed {} users", users.len());
    Ok(HttpResponse::Ok().json(users))
}

/// Self-registration when anonymous, account provisioning when called by staff.
#[post("/users")]
pub async fn create_user(
    requester: Option<Requester>,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    notifier: web::Data<Notifier>,
    user_data: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    debug!("Create user request received for username: {}", user_data.username);
    let user = UserService::create(&user_data, requester.as_ref(), &pool).await?;

    if !user.is_active {
        let code = OtpService::issue(&user, &config, &pool).await?;
        notifier.email_verification(&user.email, &user.username, &code).await;
    }

    Ok(HttpResponse::Created().json(user))
}

#[get("/users/{id}")]
pub async fn get_user(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let user = UserService::get(path.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[patch("/users/{id}")]
pub async fn update_user(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = UserService::update(path.into_inner(), body.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[delete("/users/{id}")]
pub async fn delete_user(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    UserService::delete(path.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::NoContent().finish())
}
