use actix_web::http::header::ContentDisposition;
use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use chrono::Utc;
use log::{debug, info};

use super::{attachment, store_upload, ProfileIdQuery, UploadQuery};
use crate::access::Requester;
use crate::config::{ApiError, AppConfig, DbPool};
use crate::models::*;
use crate::notifications::Notifier;
use crate::services::export::profiles_csv;
use crate::services::storage::{self, CV_DIR};
use crate::services::{
    ProfileLanguageService, ProfileService, QualificationService, RecommendationService,
    StatsService,
};

#[get("/profile")]
pub async fn list_profiles(
    requester: Requester,
    pool: web::Data<DbPool>,
    filter: web::Query<ProfileFilter>,
) -> Result<HttpResponse, ApiError> {
    let page = ProfileService::list(filter.into_inner(), &requester, &pool).await?;
    debug!("Returning page {} of profiles ({} total)", page.page, page.count);
    Ok(HttpResponse::Ok().json(page))
}

/// The filtered list as CSV, ignoring pagination.
#[get("/profile/export")]
pub async fn export_profiles(
    requester: Requester,
    pool: web::Data<DbPool>,
    filter: web::Query<ProfileFilter>,
) -> Result<HttpResponse, ApiError> {
    let rows = ProfileService::list_all(filter.into_inner(), &requester, &pool).await?;
    let body = profiles_csv(&rows)?;
    let filename = format!("rde_profiles_{}.csv", Utc::now().format("%Y%m%d%H%M%S"));

    info!("User {} exported {} profiles", requester.username, rows.len());
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(ContentDisposition::attachment(filename))
        .body(body))
}

#[post("/profile")]
pub async fn create_profile(
    requester: Requester,
    pool: web::Data<DbPool>,
    body: web::Json<ProfileInput>,
) -> Result<HttpResponse, ApiError> {
    let view = ProfileService::create(body.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Created().json(view))
}

#[get("/profile/{id}")]
pub async fn get_profile(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let view = ProfileService::get(path.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[patch("/profile/{id}")]
pub async fn update_profile(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, ApiError> {
    let view = ProfileService::update(path.into_inner(), body.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[delete("/profile/{id}")]
pub async fn delete_profile(
    requester: Requester,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let removed = ProfileService::delete(path.into_inner(), &requester, &pool).await?;
    if let Some(cv) = removed.cv_path.as_deref() {
        storage::remove(&config, cv).await;
    }
    Ok(HttpResponse::NoContent().finish())
}

#[put("/profile/{id}/cv")]
pub async fn upload_cv(
    requester: Requester,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    ProfileService::ensure_visible(id, &requester, &pool).await?;

    let stored = store_upload(&config, CV_DIR, id, &query, &body).await?;
    let previous = match ProfileService::set_cv_path(id, stored.clone(), &requester, &pool).await {
        Ok(previous) => previous,
        Err(e) => {
            storage::remove(&config, &stored).await;
            return Err(e);
        }
    };
    if let Some(old) = previous.as_deref() {
        storage::remove(&config, old).await;
    }

    info!("CV for profile {} uploaded by {}", id, requester.username);
    let view = ProfileService::get(id, &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[get("/profile/{id}/cv")]
pub async fn download_cv(
    requester: Requester,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let relative = ProfileService::cv_path(path.into_inner(), &requester, &pool).await?;
    attachment(&config, relative, "CV").await
}

#[get("/profile-academic-qualification")]
pub async fn list_qualifications(
    requester: Requester,
    pool: web::Data<DbPool>,
    query: web::Query<ProfileIdQuery>,
) -> Result<HttpResponse, ApiError> {
    let rows = QualificationService::list(query.profile_id, &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[post("/profile-academic-qualification")]
pub async fn create_qualification(
    requester: Requester,
    pool: web::Data<DbPool>,
    body: web::Json<AcademicQualificationInput>,
) -> Result<HttpResponse, ApiError> {
    let row = QualificationService::create(body.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Created().json(row))
}

#[get("/profile-academic-qualification/{id}")]
pub async fn get_qualification(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let row = QualificationService::get(path.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[put("/profile-academic-qualification/{id}")]
pub async fn update_qualification(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<AcademicQualificationInput>,
) -> Result<HttpResponse, ApiError> {
    let row = QualificationService::update(path.into_inner(), body.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[delete("/profile-academic-qualification/{id}")]
pub async fn delete_qualification(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    QualificationService::delete(path.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/profile-language")]
pub async fn list_languages(
    requester: Requester,
    pool: web::Data<DbPool>,
    query: web::Query<ProfileIdQuery>,
) -> Result<HttpResponse, ApiError> {
    let rows = ProfileLanguageService::list(query.profile_id, &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[post("/profile-language")]
pub async fn create_language(
    requester: Requester,
    pool: web::Data<DbPool>,
    body: web::Json<ProfileLanguageInput>,
) -> Result<HttpResponse, ApiError> {
    let row = ProfileLanguageService::create(body.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Created().json(row))
}

#[get("/profile-language/{id}")]
pub async fn get_language(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let row = ProfileLanguageService::get(path.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[put("/profile-language/{id}")]
pub async fn update_language(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<ProfileLanguageInput>,
) -> Result<HttpResponse, ApiError> {
    let row = ProfileLanguageService::update(path.into_inner(), body.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[delete("/profile-language/{id}")]
pub async fn delete_language(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    ProfileLanguageService::delete(path.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/recommendation")]
pub async fn list_recommendations(
    requester: Requester,
    pool: web::Data<DbPool>,
    query: web::Query<ProfileIdQuery>,
) -> Result<HttpResponse, ApiError> {
    let rows = RecommendationService::list(query.profile_id, &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[post("/recommendation")]
pub async fn create_recommendation(
    requester: Requester,
    pool: web::Data<DbPool>,
    notifier: web::Data<Notifier>,
    body: web::Json<RecommendationInput>,
) -> Result<HttpResponse, ApiError> {
    let (view, recipient) = RecommendationService::create(body.into_inner(), &requester, &pool).await?;
    if let Some(to) = recipient.as_deref() {
        notifier.profile_recommended(to).await;
    }
    Ok(HttpResponse::Created().json(view))
}

#[get("/recommendation/{id}")]
pub async fn get_recommendation(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let row = RecommendationService::get(path.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[delete("/recommendation/{id}")]
pub async fn delete_recommendation(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    RecommendationService::delete(path.into_inner(), &requester, &pool).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/fetch_stats")]
pub async fn fetch_stats(requester: Requester, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let stats = StatsService::fetch(&requester, &pool).await?;
    Ok(HttpResponse::Ok().json(stats))
}
