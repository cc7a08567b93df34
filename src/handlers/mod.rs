//! HTTP surface. Every route lives under `/api`.

use actix_web::http::header::{ContentDisposition, ContentType};
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::config::{ApiError, AppConfig};
use crate::services::storage;

pub mod auth;
pub mod deployments;
pub mod outbreaks;
pub mod profiles;
pub mod reference;
pub mod users;

/// Query string of raw-body uploads (`PUT ...?filename=cv.pdf`).
#[derive(Deserialize, Debug, Default)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// `?profile_id=` filter shared by the profile sub-resources.
#[derive(Deserialize, Debug, Default)]
pub struct ProfileIdQuery {
    pub profile_id: Option<i32>,
}

pub(crate) async fn store_upload(
    config: &AppConfig,
    kind: &str,
    owner_id: i32,
    query: &UploadQuery,
    body: &web::Bytes,
) -> Result<String, ApiError> {
    let filename = query.filename.as_deref().unwrap_or("upload");
    storage::save(config, kind, owner_id, filename, body).await
}

/// Streams a stored file back as a download.
pub(crate) async fn attachment(config: &AppConfig, relative: Option<String>, what: &str) -> Result<HttpResponse, ApiError> {
    let relative = relative.ok_or_else(|| ApiError::not_found(what))?;
    let bytes = storage::read(config, &relative).await?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::octet_stream())
        .insert_header(ContentDisposition::attachment(storage::download_name(&relative)))
        .body(bytes))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(auth::health_check)
            .service(auth::token)
            .service(auth::request_token)
            .service(auth::refresh_token)
            .service(auth::send_email)
            .service(auth::confirm_email)
            .service(auth::request_password_change)
            .service(auth::complete_password_change)
            .service(users::list_users)
            .service(users::create_user)
            .service(users::get_user)
            .service(users::update_user)
            .service(users::delete_user)
            .configure(reference::configure)
            // `/profile/export` must be matched before `/profile/{id}`.
            .service(profiles::export_profiles)
            .service(profiles::list_profiles)
            .service(profiles::create_profile)
            .service(profiles::get_profile)
            .service(profiles::update_profile)
            .service(profiles::delete_profile)
            .service(profiles::upload_cv)
            .service(profiles::download_cv)
            .service(profiles::list_qualifications)
            .service(profiles::create_qualification)
            .service(profiles::get_qualification)
            .service(profiles::update_qualification)
            .service(profiles::delete_qualification)
            .service(profiles::list_languages)
            .service(profiles::create_language)
            .service(profiles::get_language)
            .service(profiles::update_language)
            .service(profiles::delete_language)
            .service(profiles::list_recommendations)
            .service(profiles::create_recommendation)
            .service(profiles::get_recommendation)
            .service(profiles::delete_recommendation)
            .service(profiles::fetch_stats)
            .service(outbreaks::outbreak_options)
            .service(outbreaks::list_outbreaks)
            .service(outbreaks::create_outbreak)
            .service(outbreaks::get_outbreak)
            .service(outbreaks::update_outbreak)
            .service(outbreaks::delete_outbreak)
            .service(outbreaks::upload_report)
            .service(outbreaks::download_report)
            .service(deployments::list_deployments)
            .service(deployments::create_deployment)
            .service(deployments::get_deployment)
            .service(deployments::update_deployment)
            .service(deployments::delete_deployment)
            .service(deployments::upload_report)
            .service(deployments::download_report)
            .service(deployments::profile_deployments),
    );
}
