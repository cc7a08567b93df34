use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use log::info;

use super::{attachment, store_upload, UploadQuery};
use crate::access::Requester;
use crate::config::{ApiError, AppConfig, DbPool};
use crate::models::{OutbreakInput, OutbreakUpdate};
use crate::services::storage::{self, OUTBREAK_REPORT_DIR};
use crate::services::OutbreakService;

#[get("/outbreak_options")]
pub async fn outbreak_options(_requester: Requester, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(OutbreakService::options(&pool).await?))
}

#[get("/outbreak")]
pub async fn list_outbreaks(_requester: Requester, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(OutbreakService::list(&pool).await?))
}

#[post("/outbreak")]
pub async fn create_outbreak(
    requester: Requester,
    pool: web::Data<DbPool>,
    body: web::Json<OutbreakInput>,
) -> Result<HttpResponse, ApiError> {
    let view = OutbreakService::create(body.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Created().json(view))
}

#[get("/outbreak/{id}")]
pub async fn get_outbreak(
    _requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(OutbreakService::get(path.into_inner(), &pool).await?))
}

#[patch("/outbreak/{id}")]
pub async fn update_outbreak(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<OutbreakUpdate>,
) -> Result<HttpResponse, ApiError> {
    let view = OutbreakService::update(path.into_inner(), body.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[delete("/outbreak/{id}")]
pub async fn delete_outbreak(
    requester: Requester,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let removed = OutbreakService::delete(path.into_inner(), &requester, &pool).await?;
    if let Some(report) = removed.report_path.as_deref() {
        storage::remove(&config, report).await;
    }
    Ok(HttpResponse::NoContent().finish())
}

#[put("/outbreak/{id}/report")]
pub async fn upload_report(
    requester: Requester,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    requester.require_admin()?;
    OutbreakService::get(id, &pool).await?;

    let stored = store_upload(&config, OUTBREAK_REPORT_DIR, id, &query, &body).await?;
    let previous = match OutbreakService::set_report_path(id, stored.clone(), &requester, &pool).await {
        Ok(previous) => previous,
        Err(e) => {
            storage::remove(&config, &stored).await;
            return Err(e);
        }
    };
    if let Some(old) = previous.as_deref() {
        storage::remove(&config, old).await;
    }

    info!("Report for outbreak {} uploaded by {}", id, requester.username);
    Ok(HttpResponse::Ok().json(OutbreakService::get(id, &pool).await?))
}

#[get("/outbreak/{id}/report")]
pub async fn download_report(
    _requester: Requester,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let relative = OutbreakService::report_path(path.into_inner(), &pool).await?;
    attachment(&config, relative, "Outbreak report").await
}
