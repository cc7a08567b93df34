use chrono::Utc;
use diesel::prelude::*;
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;

use crate::access::{Requester, Scope};
use crate::config::{ApiError, DbPool};
use crate::db;
use crate::lifecycle::{validate_transition, DeploymentState};
use crate::models::*;
use crate::schema::{outbreak, profile, profile_deployment};
use crate::services::outbreaks::affected_region_ids;
use crate::services::profile_extras::profile_recipient;
use crate::services::profiles::{find_visible, restrict_to_visible_profiles};
use crate::services::reference::region_views;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct DeploymentFilter {
    pub profile_id: Option<i32>,
    pub outbreak_id: Option<i32>,
    pub status: Option<DeploymentStatus>,
}

fn validate_dates(start: chrono::NaiveDate, end: Option<chrono::NaiveDate>) -> Result<(), ApiError> {
    match end {
        Some(end) if end < start => Err(ApiError::validation(
            "A deployment cannot end before it starts",
        )),
        _ => Ok(()),
    }
}

fn ensure_affected_region(conn: &mut PgConnection, outbreak_id: i32, region_id: i32) -> Result<(), ApiError> {
    if !affected_region_ids(conn, outbreak_id)?.contains(&region_id) {
        return Err(ApiError::validation(
            "The selected region is not affected by this outbreak",
        ));
    }
    Ok(())
}

fn ensure_no_open_deployment(conn: &mut PgConnection, profile_id: i32) -> Result<(), ApiError> {
    let open = profile_deployment::table
        .filter(profile_deployment::profile_id.eq(profile_id))
        .filter(profile_deployment::status.eq(DeploymentStatus::Initiated))
        // A rejected deployment is closed even though its status stays initiated.
        .filter(profile_deployment::rejected_by_user.eq(false))
        .select(profile_deployment::id)
        .first::<i32>(conn)
        .optional()?;
    if open.is_some() {
        return Err(ApiError::validation(
            "This profile already has an initiated deployment",
        ));
    }
    Ok(())
}

fn find_visible_deployment(conn: &mut PgConnection, scope: Scope, id: i32) -> Result<ProfileDeployment, ApiError> {
    let mut query = profile_deployment::table
        .filter(profile_deployment::id.eq(id))
        .select(ProfileDeployment::as_select())
        .into_boxed();
    query = restrict_to_visible_profiles!(query, profile_deployment::profile_id, scope);
    query
        .first::<ProfileDeployment>(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Deployment"))
}

fn hydrate(conn: &mut PgConnection, rows: Vec<ProfileDeployment>) -> QueryResult<Vec<DeploymentView>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let profile_ids: Vec<i32> = rows.iter().map(|d| d.profile_id).collect();
    let outbreak_ids: Vec<i32> = rows.iter().map(|d| d.outbreak_id).collect();
    let region_ids: Vec<i32> = rows.iter().map(|d| d.region_id).collect();

    let profiles: HashMap<i32, ProfileSummary> = profile::table
        .filter(profile::id.eq_any(&profile_ids))
        .select((
            profile::id,
            profile::first_name,
            profile::last_name,
            profile::email,
            profile::user_id,
            profile::region_of_residence_id,
        ))
        .load::<ProfileSummary>(conn)?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let outbreaks: HashMap<i32, OutbreakSummary> = outbreak::table
        .filter(outbreak::id.eq_any(&outbreak_ids))
        .select((
            outbreak::id,
            outbreak::name,
            outbreak::severity,
            outbreak::start_date,
            outbreak::end_date,
        ))
        .load::<OutbreakSummary>(conn)?
        .into_iter()
        .map(|o| (o.id, o))
        .collect();
    let regions = region_views(conn, &region_ids)?;

    // Foreign keys cascade, so every reference resolves.
    Ok(rows
        .into_iter()
        .filter_map(|d| {
            Some(DeploymentView {
                profile: profiles.get(&d.profile_id).cloned()?,
                outbreak: outbreaks.get(&d.outbreak_id).cloned()?,
                region: regions.get(&d.region_id).cloned()?,
                has_report: d.report_path.is_some(),
                deployment: d,
            })
        })
        .collect())
}

fn hydrate_one(conn: &mut PgConnection, row: ProfileDeployment) -> Result<DeploymentView, ApiError> {
    hydrate(conn, vec![row])?
        .pop()
        .ok_or_else(|| ApiError::InternalError("Failed to load deployment details".to_string()))
}

/// A saved deployment and the address its RDE should be notified on.
pub struct SavedDeployment {
    pub view: DeploymentView,
    pub recipient: Option<String>,
}

fn saved(conn: &mut PgConnection, row: ProfileDeployment) -> Result<SavedDeployment, ApiError> {
    let owner = find_visible(conn, Scope::Global, row.profile_id)?;
    let recipient = profile_recipient(conn, &owner)?;
    Ok(SavedDeployment {
        view: hydrate_one(conn, row)?,
        recipient,
    })
}

pub struct DeploymentService;

impl DeploymentService {
    pub async fn list(
        filter: DeploymentFilter,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<Vec<DeploymentView>, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            let mut query = profile_deployment::table
                .select(ProfileDeployment::as_select())
                .order((profile_deployment::created_at.desc(), profile_deployment::id.desc()))
                .into_boxed();
            if let Some(pid) = filter.profile_id {
                query = query.filter(profile_deployment::profile_id.eq(pid));
            }
            if let Some(oid) = filter.outbreak_id {
                query = query.filter(profile_deployment::outbreak_id.eq(oid));
            }
            if let Some(status) = filter.status {
                query = query.filter(profile_deployment::status.eq(status));
            }
            query = restrict_to_visible_profiles!(query, profile_deployment::profile_id, scope);

            let rows = query.load::<ProfileDeployment>(conn)?;
            debug!("Listed {} deployments", rows.len());
            Ok(hydrate(conn, rows)?)
        })
        .await
    }

    /// Deployments of one profile; an invisible profile is a 404.
    pub async fn for_profile(
        profile_id: i32,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<Vec<DeploymentView>, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            find_visible(conn, scope, profile_id)?;
            let rows = profile_deployment::table
                .filter(profile_deployment::profile_id.eq(profile_id))
                .select(ProfileDeployment::as_select())
                .order(profile_deployment::start_date.desc())
                .load::<ProfileDeployment>(conn)?;
            Ok(hydrate(conn, rows)?)
        })
        .await
    }

    pub async fn get(id: i32, requester: &Requester, pool: &DbPool) -> Result<DeploymentView, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            let row = find_visible_deployment(conn, scope, id)?;
            hydrate_one(conn, row)
        })
        .await
    }

    pub async fn create(
        input: NewDeployment,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<SavedDeployment, ApiError> {
        requester.require_admin()?;
        let scope = requester.scope()?;
        validate_dates(input.start_date, input.end_date)?;

        let result = db::run_tx(pool, move |conn| {
            let target = find_visible(conn, scope, input.profile_id)?;
            outbreak::table
                .find(input.outbreak_id)
                .select(outbreak::id)
                .first::<i32>(conn)
                .optional()?
                .ok_or_else(|| ApiError::validation("Outbreak does not exist"))?;
            ensure_affected_region(conn, input.outbreak_id, input.region_id)?;

            // Serialises concurrent creations for the same profile.
            profile::table
                .find(target.id)
                .select(profile::id)
                .for_update()
                .first::<i32>(conn)?;
            ensure_no_open_deployment(conn, target.id)?;

            let created = diesel::insert_into(profile_deployment::table)
                .values(&input)
                .returning(ProfileDeployment::as_returning())
                .get_result::<ProfileDeployment>(conn)?;
            saved(conn, created)
        })
        .await?;

        info!(
            "Deployment {} created for profile {} by {}",
            result.view.deployment.id, result.view.deployment.profile_id, requester.username
        );
        Ok(result)
    }

    pub async fn update(
        id: i32,
        update: DeploymentUpdate,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<SavedDeployment, ApiError> {
        let scope = requester.scope()?;
        if !requester.is_admin() && !update.is_owner_response() {
            return Err(ApiError::forbidden(
                "You may only accept or reject your own deployments",
            ));
        }

        let result = db::run_tx(pool, move |conn| {
            let current = find_visible_deployment(conn, scope, id)?;

            let from = DeploymentState::of(&current);
            validate_transition(from, from.apply(&update))?;

            if let Some(region_id) = update.region_id {
                ensure_affected_region(conn, current.outbreak_id, region_id)?;
            }
            validate_dates(
                update.start_date.unwrap_or(current.start_date),
                update.end_date.or(current.end_date),
            )?;

            let updated = diesel::update(profile_deployment::table.find(id))
                .set((&update, profile_deployment::updated_at.eq(Utc::now().naive_utc())))
                .returning(ProfileDeployment::as_returning())
                .get_result::<ProfileDeployment>(conn)?;
            saved(conn, updated)
        })
        .await?;

        info!(
            "Deployment {} saved by {} (status {})",
            id, requester.username, result.view.deployment.status
        );
        Ok(result)
    }

    /// Deletes the deployment and returns it so its report can be removed.
    pub async fn delete(id: i32, requester: &Requester, pool: &DbPool) -> Result<ProfileDeployment, ApiError> {
        requester.require_admin()?;
        let scope = requester.scope()?;
        let removed = db::run_tx(pool, move |conn| {
            let current = find_visible_deployment(conn, scope, id)?;
            diesel::delete(profile_deployment::table.find(id)).execute(conn)?;
            Ok(current)
        })
        .await?;
        info!("Deployment {} deleted by {}", id, requester.username);
        Ok(removed)
    }

    pub async fn report_path(id: i32, requester: &Requester, pool: &DbPool) -> Result<Option<String>, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| Ok(find_visible_deployment(conn, scope, id)?.report_path)).await
    }

    /// Stores a new report location and returns the previous one.
    pub async fn set_report_path(
        id: i32,
        path: String,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<Option<String>, ApiError> {
        let scope = requester.scope()?;
        db::run_tx(pool, move |conn| {
            let current = find_visible_deployment(conn, scope, id)?;
            diesel::update(profile_deployment::table.find(id))
                .set((
                    profile_deployment::report_path.eq(Some(path)),
                    profile_deployment::updated_at.eq(Utc::now().naive_utc()),
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
    fn deployment_dates_are_ordered() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        assert!(validate_dates(start, None).is_ok());
        assert!(validate_dates(start, NaiveDate::from_ymd_opt(2024, 2, 9)).is_err());
    }

    #[test]
    fn filter_parses_status() {
        let filter: DeploymentFilter =
            serde_json::from_str(r#"{"profile_id": 3, "status": "pre_deployment"}"#).unwrap();
        assert_eq!(filter.profile_id, Some(3));
        assert_eq!(filter.status, Some(DeploymentStatus::PreDeployment));
    }
}
