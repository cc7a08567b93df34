//! Reference data. Anyone may read it; only staff may change it.

use actix_web::{delete, get, post, put, web, HttpResponse};
use log::info;
use serde::Deserialize;

use crate::access::Requester;
use crate::config::{ApiError, DbPool};
use crate::models::*;
use crate::services::reference::*;

#[derive(Deserialize, Debug, Default)]
pub struct RegionQuery {
    pub country_id: Option<i32>,
}

#[get("/country")]
pub async fn list_countries(pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(CountryService::list(&pool).await?))
}

#[post("/country")]
pub async fn create_country(
    requester: Requester,
    pool: web::Data<DbPool>,
    body: web::Json<CountryInput>,
) -> Result<HttpResponse, ApiError> {
    requester.require_admin()?;
    let country = CountryService::create(body.into_inner(), &pool).await?;
    info!("Country {} created by {}", country.label, requester.username);
    Ok(HttpResponse::Created().json(country))
}

#[get("/country/{id}")]
pub async fn get_country(pool: web::Data<DbPool>, path: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(CountryService::get(path.into_inner(), &pool).await?))
}

#[put("/country/{id}")]
pub async fn update_country(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<CountryInput>,
) -> Result<HttpResponse, ApiError> {
    requester.require_admin()?;
    let country = CountryService::update(path.into_inner(), body.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(country))
}

#[delete("/country/{id}")]
pub async fn delete_country(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    requester.require_admin()?;
    CountryService::delete(path.into_inner(), &pool).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/region")]
pub async fn list_regions(
    pool: web::Data<DbPool>,
    query: web::Query<RegionQuery>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(RegionService::list(query.country_id, &pool).await?))
}

#[post("/region")]
pub async fn create_region(
    requester: Requester,
    pool: web::Data<DbPool>,
    body: web::Json<RegionInput>,
) -> Result<HttpResponse, ApiError> {
    requester.require_admin()?;
    let region = RegionService::create(body.into_inner(), &pool).await?;
    info!("Region {} created by {}", region.name, requester.username);
    Ok(HttpResponse::Created().json(region))
}

#[get("/region/{id}")]
pub async fn get_region(pool: web::Data<DbPool>, path: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(RegionService::get(path.into_inner(), &pool).await?))
}

#[put("/region/{id}")]
pub async fn update_region(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<RegionInput>,
) -> Result<HttpResponse, ApiError> {
    requester.require_admin()?;
    let region = RegionService::update(path.into_inner(), body.into_inner(), &pool).await?;
    Ok(HttpResponse::Ok().json(region))
}

#[delete("/region/{id}")]
pub async fn delete_region(
    requester: Requester,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    requester.require_admin()?;
    RegionService::delete(path.into_inner(), &pool).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// CRUD routes for a name/label lookup table.
macro_rules! lookup_routes {
    ($module:ident, $collection:tt, $item:tt, $service:ident, $input:ident) => {
        pub mod $module {
            use super::*;

            #[get($collection)]
            pub async fn list_rows(pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
                Ok(HttpResponse::Ok().json($service::list(&pool).await?))
            }

            #[post($collection)]
            pub async fn create_row(
                requester: Requester,
                pool: web::Data<DbPool>,
                body: web::Json<$input>,
            ) -> Result<HttpResponse, ApiError> {
                requester.require_admin()?;
                let row = $service::create(body.into_inner(), &pool).await?;
                info!("{} {} created by {}", stringify!($module), row.label, requester.username);
                Ok(HttpResponse::Created().json(row))
            }

            #[get($item)]
            pub async fn get_row(pool: web::Data<DbPool>, path: web::Path<i32>) -> Result<HttpResponse, ApiError> {
                Ok(HttpResponse::Ok().json($service::get(path.into_inner(), &pool).await?))
            }

            #[put($item)]
            pub async fn update_row(
                requester: Requester,
                pool: web::Data<DbPool>,
                path: web::Path<i32>,
                body: web::Json<$input>,
            ) -> Result<HttpResponse, ApiError> {
                requester.require_admin()?;
                let row = $service::update(path.into_inner(), body.into_inner(), &pool).await?;
                Ok(HttpResponse::Ok().json(row))
            }

            #[delete($item)]
            pub async fn delete_row(
                requester: Requester,
                pool: web::Data<DbPool>,
                path: web::Path<i32>,
            ) -> Result<HttpResponse, ApiError> {
                requester.require_admin()?;
                $service::delete(path.into_inner(), &pool).await?;
                Ok(HttpResponse::NoContent().finish())
            }

            pub fn configure(cfg: &mut web::ServiceConfig) {
                cfg.service(list_rows)
                    .service(create_row)
                    .service(get_row)
                    .service(update_row)
                    .service(delete_row);
            }
        }
    };
}

lookup_routes!(competence, "/competence", "/competence/{id}", CompetenceService, CompetenceInput);
lookup_routes!(occupation, "/occupation", "/occupation/{id}", OccupationService, OccupationInput);
lookup_routes!(
    occupation_category,
    "/occupation-category",
    "/occupation-category/{id}",
    OccupationCategoryService,
    OccupationCategoryInput
);
lookup_routes!(
    specialization,
    "/specialization",
    "/specialization/{id}",
    SpecializationService,
    SpecializationInput
);
lookup_routes!(language, "/language", "/language/{id}", LanguageService, LanguageInput);
lookup_routes!(
    academic_qualification_type,
    "/academic-qualification-type",
    "/academic-qualification-type/{id}",
    AcademicQualificationTypeService,
    AcademicQualificationTypeInput
);
lookup_routes!(outbreak_type, "/outbreak-type", "/outbreak-type/{id}", OutbreakTypeService, OutbreakTypeInput);

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_countries)
        .service(create_country)
        .service(get_country)
        .service(update_country)
        .service(delete_country)
        .service(list_regions)
        .service(create_region)
        .service(get_region)
        .service(update_region)
        .service(delete_region)
        .configure(competence::configure)
        .configure(occupation::configure)
        .configure(occupation_category::configure)
        .configure(specialization::configure)
        .configure(language::configure)
        .configure(academic_qualification_type::configure)
        .configure(outbreak_type::configure);
}
