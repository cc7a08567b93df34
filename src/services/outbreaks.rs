use chrono::Utc;
use diesel::prelude::*;
use log::{debug, info};
use std::collections::HashMap;

use crate::access::Requester;
use crate::config::{ApiError, DbPool};
use crate::db;
use crate::models::*;
use crate::schema::{outbreak, outbreak_competence, outbreak_region, outbreak_type};
use crate::services::reference::{competence_objects, region_views};

fn validate_dates(start: chrono::NaiveDate, end: Option<chrono::NaiveDate>) -> Result<(), ApiError> {
    match end {
        Some(end) if end < start => Err(ApiError::validation(
            "An outbreak cannot end before it starts",
        )),
        _ => Ok(()),
    }
}

fn unique(ids: &[i32]) -> Vec<i32> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn replace_links(
    conn: &mut PgConnection,
    outbreak_id: i32,
    competencies: Option<&[i32]>,
    regions: Option<&[i32]>,
) -> QueryResult<()> {
    if let Some(ids) = competencies {
        diesel::delete(outbreak_competence::table.filter(outbreak_competence::outbreak_id.eq(outbreak_id)))
            .execute(conn)?;
        let rows: Vec<_> = unique(ids)
            .into_iter()
            .map(|cid| {
                (
                    outbreak_competence::outbreak_id.eq(outbreak_id),
                    outbreak_competence::competence_id.eq(cid),
                )
            })
            .collect();
        if !rows.is_empty() {
            diesel::insert_into(outbreak_competence::table).values(&rows).execute(conn)?;
        }
    }

    if let Some(ids) = regions {
        diesel::delete(outbreak_region::table.filter(outbreak_region::outbreak_id.eq(outbreak_id)))
            .execute(conn)?;
        let rows: Vec<_> = unique(ids)
            .into_iter()
            .map(|rid| {
                (
                    outbreak_region::outbreak_id.eq(outbreak_id),
                    outbreak_region::region_id.eq(rid),
                )
            })
            .collect();
        if !rows.is_empty() {
            diesel::insert_into(outbreak_region::table).values(&rows).execute(conn)?;
        }
    }

    Ok(())
}

/// Region ids an outbreak may deploy to.
pub fn affected_region_ids(conn: &mut PgConnection, outbreak_id: i32) -> QueryResult<Vec<i32>> {
    outbreak_region::table
        .filter(outbreak_region::outbreak_id.eq(outbreak_id))
        .select(outbreak_region::region_id)
        .load(conn)
}

fn hydrate(conn: &mut PgConnection, rows: Vec<Outbreak>) -> QueryResult<Vec<OutbreakView>> {
    let ids: Vec<i32> = rows.iter().map(|o| o.id).collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let type_ids = unique(&rows.iter().filter_map(|o| o.outbreak_type_id).collect::<Vec<_>>());
    let types: HashMap<i32, OutbreakType> = outbreak_type::table
        .filter(outbreak_type::id.eq_any(&type_ids))
        .select(OutbreakType::as_select())
        .load::<OutbreakType>(conn)?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();

    let competence_links: Vec<(i32, i32)> = outbreak_competence::table
        .filter(outbreak_competence::outbreak_id.eq_any(&ids))
        .select((outbreak_competence::outbreak_id, outbreak_competence::competence_id))
        .load(conn)?;
    let region_links: Vec<(i32, i32)> = outbreak_region::table
        .filter(outbreak_region::outbreak_id.eq_any(&ids))
        .select((outbreak_region::outbreak_id, outbreak_region::region_id))
        .load(conn)?;

    let competences = competence_objects(
        conn,
        &unique(&competence_links.iter().map(|(_, c)| *c).collect::<Vec<_>>()),
    )?;
    let regions = region_views(
        conn,
        &unique(&region_links.iter().map(|(_, r)| *r).collect::<Vec<_>>()),
    )?;

    let mut competencies_by: HashMap<i32, Vec<i32>> = HashMap::new();
    for (oid, cid) in competence_links {
        competencies_by.entry(oid).or_default().push(cid);
    }
    let mut regions_by: HashMap<i32, Vec<i32>> = HashMap::new();
    for (oid, rid) in region_links {
        regions_by.entry(oid).or_default().push(rid);
    }

    Ok(rows
        .into_iter()
        .map(|o| {
            let competencies = competencies_by.remove(&o.id).unwrap_or_default();
            let affected_regions = regions_by.remove(&o.id).unwrap_or_default();
            OutbreakView {
                outbreak_type: o
                    .outbreak_type_id
                    .and_then(|id| types.get(&id).cloned())
                    .map(Labeled::new),
                competencies_objects: competencies
                    .iter()
                    .filter_map(|id| competences.get(id).cloned())
                    .map(Labeled::new)
                    .collect(),
                affected_regions_objects: affected_regions
                    .iter()
                    .filter_map(|id| regions.get(id).cloned())
                    .collect(),
                competencies,
                affected_regions,
                has_report: o.report_path.is_some(),
                value: o.id,
                label: o.name.clone(),
                outbreak: o,
            }
        })
        .collect())
}

fn hydrate_one(conn: &mut PgConnection, row: Outbreak) -> Result<OutbreakView, ApiError> {
    hydrate(conn, vec![row])?
        .pop()
        .ok_or_else(|| ApiError::InternalError("Failed to load outbreak details".to_string()))
}

fn find(conn: &mut PgConnection, id: i32) -> Result<Outbreak, ApiError> {
    outbreak::table
        .find(id)
        .select(Outbreak::as_select())
        .first::<Outbreak>(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Outbreak"))
}

pub struct OutbreakService;

impl OutbreakService {
    pub async fn list(pool: &DbPool) -> Result<Vec<OutbreakView>, ApiError> {
        db::run(pool, |conn| {
            let rows = outbreak::table
                .select(Outbreak::as_select())
                .order((outbreak::start_date.desc(), outbreak::id.desc()))
                .load::<Outbreak>(conn)?;
            debug!("Listed {} outbreaks", rows.len());
            Ok(hydrate(conn, rows)?)
        })
        .await
    }

    pub async fn options(pool: &DbPool) -> Result<Vec<OutbreakOption>, ApiError> {
        db::run(pool, |conn| {
            Ok(outbreak::table
                .select((outbreak::id, outbreak::name))
                .order(outbreak::name.asc())
                .load::<OutbreakOption>(conn)?)
        })
        .await
    }

    pub async fn get(id: i32, pool: &DbPool) -> Result<OutbreakView, ApiError> {
        db::run(pool, move |conn| {
            let row = find(conn, id)?;
            hydrate_one(conn, row)
        })
        .await
    }

    pub async fn create(input: OutbreakInput, requester: &Requester, pool: &DbPool) -> Result<OutbreakView, ApiError> {
        requester.require_admin()?;
        if input.name.trim().is_empty() {
            return Err(ApiError::validation("Outbreak name is required"));
        }
        validate_dates(input.start_date, input.end_date)?;

        let (row, competencies, regions) = input.split();
        let view = db::run_tx(pool, move |conn| {
            let created = diesel::insert_into(outbreak::table)
                .values(&row)
                .returning(Outbreak::as_returning())
                .get_result::<Outbreak>(conn)?;
            replace_links(conn, created.id, Some(&competencies), Some(&regions))?;
            hydrate_one(conn, created)
        })
        .await?;

        info!("Outbreak {} ({}) created by {}", view.outbreak.id, view.outbreak.name, requester.username);
        Ok(view)
    }

    pub async fn update(
        id: i32,
        update: OutbreakUpdate,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<OutbreakView, ApiError> {
        requester.require_admin()?;
        let (changes, competencies, regions) = update.split(Utc::now().naive_utc());

        let view = db::run_tx(pool, move |conn| {
            let current = find(conn, id)?;
            validate_dates(
                changes.start_date.unwrap_or(current.start_date),
                changes.end_date.or(current.end_date),
            )?;

            let updated = diesel::update(outbreak::table.find(id))
                .set(&changes)
                .returning(Outbreak::as_returning())
                .get_result::<Outbreak>(conn)?;
            replace_links(conn, id, competencies.as_deref(), regions.as_deref())?;
            hydrate_one(conn, updated)
        })
        .await?;

        info!("Outbreak {} updated by {}", id, requester.username);
        Ok(view)
    }

    /// Deletes the outbreak and returns it so its report can be removed.
    pub async fn delete(id: i32, requester: &Requester, pool: &DbPool) -> Result<Outbreak, ApiError> {
        requester.require_admin()?;
        let removed = db::run_tx(pool, move |conn| {
            let current = find(conn, id)?;
            diesel::delete(outbreak::table.find(id)).execute(conn)?;
            Ok(current)
        })
        .await?;
        info!("Outbreak {} deleted by {}", id, requester.username);
        Ok(removed)
    }

    pub async fn report_path(id: i32, pool: &DbPool) -> Result<Option<String>, ApiError> {
        db::run(pool, move |conn| Ok(find(conn, id)?.report_path)).await
    }

    /// Stores a new report location and returns the previous one.
    pub async fn set_report_path(
        id: i32,
        path: String,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<Option<String>, ApiError> {
        requester.require_admin()?;
        db::run_tx(pool, move |conn| {
            let current = find(conn, id)?;
            diesel::update(outbreak::table.find(id))
                .set((
                    outbreak::report_path.eq(Some(path)),
                    outbreak::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;
            Ok(current.report_path)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn end_date_must_follow_start() {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(validate_dates(start, None).is_ok());
        assert!(validate_dates(start, Some(start)).is_ok());
        assert!(validate_dates(start, NaiveDate::from_ymd_opt(2024, 4, 30)).is_err());
    }

    #[test]
    fn link_ids_are_deduplicated() {
        assert_eq!(unique(&[5, 2, 5, 9]), vec![2, 5, 9]);
    }
}
