use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use log::info;

use super::{attachment, store_upload, UploadQuery};
use crate::access::Requester;
use crate::config::{ApiError, AppConfig, DbPool};
use crate::models::{DeploymentUpdate, NewDeployment};
use crate::notifications::Notifier;
use crate::services::storage::{self, DEPLOYMENT_REPORT_DIR};
use crate::services::{DeploymentFilter, DeploymentService, SavedDeployment};

async fn notify_saved(notifier: &Notifier, saved: &SavedDeployment) {
    if let Some(to) = saved.recipient.as_deref() {
        notifier
            .deployment_saved(to, &saved.view.deployment, &saved.view.outbreak.name)
            .await;
    }
}

#[get("/deployment")]
pub async fn list_deployments(
    requester: Requester,
    pool: web::Data<DbPool>,
    filter: web::Query<DeploymentFilter>,
) -> Result<HttpResponse, ApiError> {
    let rows = DeploymentService::list(filter.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[post("/deployment")]
pub async fn create_deployment(
    requester: Requester,
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    body: web::Json<NewDeployment>,
) -> Result<HttpResponse, ApiError> {
    let saved = DeploymentService::create(body.into_inner(), &requester, &pool).await?;
    notify_saved(&notifier, &saved).await;
    Ok(HttpResponse::Created().json(saved.view))
}

#[get("/deployment/{id}")]
pub async fn get_deployment(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let view = DeploymentService::get(path.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[patch("/deployment/{id}")]
pub async fn update_deployment(
    requester: Requester,
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    path: web::Path<i32>,
    body: web::Json<DeploymentUpdate>,
) -> Result<HttpResponse, ApiError> {
    let saved = DeploymentService::update(path.into_inner(), body.into_inner(), &requester, &pool).await?;
    notify_saved(&notifier, &saved).await;
    Ok(HttpResponse::Ok().json(saved.view))
}

#[delete("/deployment/{id}")]
pub async fn delete_deployment(
    requester: Requester,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let removed = DeploymentService::delete(path.into_inner(), &requester, &pool).await?;
    if let Some(report) = removed.report_path.as_deref() {
        storage::remove(&config, report).await;
    }
    Ok(HttpResponse::NoContent().finish())
}

#[put("/deployment/{id}/report")]
pub async fn upload_report(
    requester: Requester,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    DeploymentService::get(id, &requester, &pool).await?;

    let stored = store_upload(&config, DEPLOYMENT_REPORT_DIR, id, &query, &body).await?;
    let previous = match DeploymentService::set_report_path(id, stored.clone(), &requester, &pool).await {
        Ok(previous) => previous,
        Err(e) => {
            storage::remove(&config, &stored).await;
            return Err(e);
        }
    };
    if let Some(old) = previous.as_deref() {
        storage::remove(&config, old).await;
    }

    info!("Report for deployment {} uploaded by {}", id, requester.username);
    let view = DeploymentService::get(id, &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[get("/deployment/{id}/report")]
pub async fn download_report(
    requester: Requester,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let relative = DeploymentService::report_path(path.into_inner(), &requester, &pool).await?;
    attachment(&config, relative, "Deployment report").await
}

#[get("/get_profile_deployments/{profile_id}")]
pub async fn profile_deployments(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let rows = DeploymentService::for_profile(path.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(rows))
}
