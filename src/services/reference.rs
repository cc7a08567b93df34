use chrono::Utc;
use diesel::prelude::*;
use log::{debug, info};
use std::collections::HashMap;

use crate::config::{ApiError, DbPool};
use crate::db;
use crate::models::*;
use crate::schema::{
    academic_qualification_type, competence, country, language, occupation, occupation_category,
    outbreak_type, region, specialization,
};

/// Country a region belongs to; unknown regions are a client error.
pub async fn country_of_region(region_id: i32, pool: &DbPool) -> Result<i32, ApiError> {
    db::run(pool, move |conn| region_country(conn, region_id)).await
}

pub fn region_country(conn: &mut PgConnection, region_id: i32) -> Result<i32, ApiError> {
    region::table
        .find(region_id)
        .select(region::country_id)
        .first::<i32>(conn)
        .optional()?
        .ok_or_else(|| ApiError::validation(format!("Region {} does not exist", region_id)))
}

/// Loads the given regions with their countries, keyed by region id.
pub fn region_views(
    conn: &mut PgConnection,
    ids: &[i32],
) -> QueryResult<HashMap<i32, RegionView>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = region::table
        .inner_join(country::table)
        .filter(region::id.eq_any(ids))
        .select((Region::as_select(), Country::as_select()))
        .load::<(Region, Country)>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(r, c)| (r.id, RegionView::new(r, c)))
        .collect())
}

pub fn competence_objects(
    conn: &mut PgConnection,
    ids: &[i32],
) -> QueryResult<HashMap<i32, Competence>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = competence::table
        .filter(competence::id.eq_any(ids))
        .select(Competence::as_select())
        .load::<Competence>(conn)?;
    Ok(rows.into_iter().map(|c| (c.id, c)).collect())
}

pub struct CountryService;

impl CountryService {
    pub async fn list(pool: &DbPool) -> Result<Vec<Labeled<Country>>, ApiError> {
        let rows = db::run(pool, |conn| {
            Ok(country::table
                .order(country::name.asc())
                .select(Country::as_select())
                .load::<Country>(conn)?)
        })
        .await?;
        Ok(rows.into_iter().map(Labeled::new).collect())
    }

    pub async fn get(id: i32, pool: &DbPool) -> Result<Labeled<Country>, ApiError> {
        db::run(pool, move |conn| {
            country::table
                .find(id)
                .select(Country::as_select())
                .first(conn)
                .optional()?
                .map(Labeled::new)
                .ok_or_else(|| ApiError::not_found("Country"))
        })
        .await
    }

    pub async fn create(input: CountryInput, pool: &DbPool) -> Result<Labeled<Country>, ApiError> {
        let created = db::run(pool, move |conn| {
            Ok(diesel::insert_into(country::table)
                .values(&input)
                .returning(Country::as_returning())
                .get_result::<Country>(conn)?)
        })
        .await?;
        info!("Created country {}", created.name);
        Ok(Labeled::new(created))
    }

    pub async fn update(id: i32, input: CountryInput, pool: &DbPool) -> Result<Labeled<Country>, ApiError> {
        db::run(pool, move |conn| {
            diesel::update(country::table.find(id))
                .set(&input)
                .returning(Country::as_returning())
                .get_result(conn)
                .optional()?
                .map(Labeled::new)
                .ok_or_else(|| ApiError::not_found("Country"))
        })
        .await
    }

    pub async fn delete(id: i32, pool: &DbPool) -> Result<(), ApiError> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(country::table.find(id)).execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(ApiError::not_found("Country"));
        }
        info!("Deleted country {}", id);
        Ok(())
    }
}

pub struct RegionService;

impl RegionService {
    pub async fn list(country_id: Option<i32>, pool: &DbPool) -> Result<Vec<RegionView>, ApiError> {
        db::run(pool, move |conn| {
            let mut query = region::table
                .inner_join(country::table)
                .select((Region::as_select(), Country::as_select()))
                .order(region::name.asc())
                .into_boxed();
            if let Some(cid) = country_id {
                query = query.filter(region::country_id.eq(cid));
            }
            let rows = query.load::<(Region, Country)>(conn)?;
            debug!("Listed {} regions", rows.len());
            Ok(rows.into_iter().map(|(r, c)| RegionView::new(r, c)).collect())
        })
        .await
    }

    pub async fn get(id: i32, pool: &DbPool) -> Result<RegionView, ApiError> {
        db::run(pool, move |conn| {
            region_views(conn, &[id])?
                .remove(&id)
                .ok_or_else(|| ApiError::not_found("Region"))
        })
        .await
    }

    pub async fn create(input: RegionInput, pool: &DbPool) -> Result<RegionView, ApiError> {
        let view = db::run(pool, move |conn| {
            let created = diesel::insert_into(region::table)
                .values(&input)
                .returning(Region::as_returning())
                .get_result::<Region>(conn)?;
            let parent = country::table
                .find(created.country_id)
                .select(Country::as_select())
                .first(conn)?;
            Ok(RegionView::new(created, parent))
        })
        .await?;
        info!("Created region {} ({})", view.name, view.country.label);
        Ok(view)
    }

    pub async fn update(id: i32, input: RegionInput, pool: &DbPool) -> Result<RegionView, ApiError> {
        db::run(pool, move |conn| {
            let updated = diesel::update(region::table.find(id))
                .set((&input, region::updated_at.eq(Utc::now().naive_utc())))
                .returning(Region::as_returning())
                .get_result::<Region>(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("Region"))?;
            let parent = country::table
                .find(updated.country_id)
                .select(Country::as_select())
                .first(conn)?;
            Ok(RegionView::new(updated, parent))
        })
        .await
    }

    pub async fn delete(id: i32, pool: &DbPool) -> Result<(), ApiError> {
        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(region::table.find(id)).execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(ApiError::not_found("Region"));
        }
        info!("Deleted region {}", id);
        Ok(())
    }
}

/// CRUD for lookup tables that carry `name`, `created_at` and `updated_at`.
macro_rules! lookup_service {
    ($service:ident, $row:ident, $input:ident, $table:ident, $what:literal) => {
        pub struct $service;

        impl $service {
            pub async fn list(pool: &DbPool) -> Result<Vec<Labeled<$row>>, ApiError> {
                let rows = db::run(pool, |conn| {
                    Ok($table::table
                        .order($table::name.asc())
                        .select($row::as_select())
                        .load::<$row>(conn)?)
                })
                .await?;
                debug!("Listed {} {} rows", rows.len(), $what);
                Ok(rows.into_iter().map(Labeled::new).collect())
            }

            pub async fn get(id: i32, pool: &DbPool) -> Result<Labeled<$row>, ApiError> {
                db::run(pool, move |conn| {
                    $table::table
                        .find(id)
                        .select($row::as_select())
                        .first(conn)
                        .optional()?
                        .map(Labeled::new)
                        .ok_or_else(|| ApiError::not_found($what))
                })
                .await
            }

            pub async fn create(input: $input, pool: &DbPool) -> Result<Labeled<$row>, ApiError> {
                let created = db::run(pool, move |conn| {
                    Ok(diesel::insert_into($table::table)
                        .values(&input)
                        .returning($row::as_returning())
                        .get_result::<$row>(conn)?)
                })
                .await?;
                info!("Created {} {}", $what, created.id);
                Ok(Labeled::new(created))
            }

            pub async fn update(id: i32, input: $input, pool: &DbPool) -> Result<Labeled<$row>, ApiError> {
                db::run(pool, move |conn| {
                    diesel::update($table::table.find(id))
                        .set((&input, $table::updated_at.eq(Utc::now().naive_utc())))
                        .returning($row::as_returning())
                        .get_result(conn)
                        .optional()?
                        .map(Labeled::new)
                        .ok_or_else(|| ApiError::not_found($what))
                })
                .await
            }

            pub async fn delete(id: i32, pool: &DbPool) -> Result<(), ApiError> {
                let deleted = db::run(pool, move |conn| {
                    Ok(diesel::delete($table::table.find(id)).execute(conn)?)
                })
                .await?;
                if deleted == 0 {
                    return Err(ApiError::not_found($what));
                }
                info!("Deleted {} {}", $what, id);
                Ok(())
            }
        }
    };
}

lookup_service!(OccupationCategoryService, OccupationCategory, OccupationCategoryInput, occupation_category, "Occupation category");
lookup_service!(OccupationService, Occupation, OccupationInput, occupation, "Occupation");
lookup_service!(SpecializationService, Specialization, SpecializationInput, specialization, "Specialization");
lookup_service!(CompetenceService, Competence, CompetenceInput, competence, "Competence");
lookup_service!(LanguageService, Language, LanguageInput, language, "Language");
lookup_service!(
    AcademicQualificationTypeService,
    AcademicQualificationType,
    AcademicQualificationTypeInput,
    academic_qualification_type,
    "Academic qualification type"
);
lookup_service!(OutbreakTypeService, OutbreakType, OutbreakTypeInput, outbreak_type, "Outbreak type");
