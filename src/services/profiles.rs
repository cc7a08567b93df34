use chrono::{Datelike, NaiveDate, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};

use crate::access::{Requester, Scope};
use crate::config::{ApiError, DbPool};
use crate::db;
use crate::models::*;
use crate::schema::{occupation, profile, profile_competence, region};
use crate::services::profile_extras::recommendation_views;
use crate::services::reference::{competence_objects, region_country, region_views};

pub const MIN_AGE: i32 = 18;
pub const MAX_AGE: i32 = 70;

type ProfileQuery = profile::BoxedQuery<'static, Pg>;

/// Completed years between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

pub fn validate_age(dob: NaiveDate, today: NaiveDate) -> Result<(), ApiError> {
    let age = age_on(dob, today);
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(ApiError::validation(format!(
            "RDEs must be between {} and {} years old",
            MIN_AGE, MAX_AGE
        )));
    }
    Ok(())
}

fn validate_names(first: &str, last: &str) -> Result<(), ApiError> {
    if first.trim().is_empty() || last.trim().is_empty() {
        return Err(ApiError::validation("First and last name are required"));
    }
    Ok(())
}

fn dedup(ids: &[i32]) -> Vec<i32> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Profiles the scope can see, as a boxed query other filters build on.
pub fn visible_profiles(scope: Scope) -> ProfileQuery {
    let query = profile::table.into_boxed();
    match scope {
        Scope::Global => query,
        Scope::Country(country_id) => query.filter(
            profile::region_of_residence_id.eq_any(
                region::table
                    .filter(region::country_id.eq(country_id))
                    .select(region::id.nullable()),
            ),
        ),
        Scope::Owner(user_id) => query.filter(profile::user_id.eq(user_id)),
    }
}

/// Narrows a boxed query to rows whose profile column points at a profile
/// visible to the scope.
macro_rules! restrict_to_visible_profiles {
    ($query:expr, $profile_col:expr, $scope:expr) => {
        match $scope {
            $crate::access::Scope::Global => $query,
            $crate::access::Scope::Country(country_id) => $query.filter(
                $profile_col.eq_any(
                    $crate::schema::profile::table
                        .filter($crate::schema::profile::region_of_residence_id.eq_any(
                            $crate::schema::region::table
                                .filter($crate::schema::region::country_id.eq(country_id))
                                .select($crate::schema::region::id.nullable()),
                        ))
                        .select($crate::schema::profile::id),
                ),
            ),
            $crate::access::Scope::Owner(user_id) => $query.filter(
                $profile_col.eq_any(
                    $crate::schema::profile::table
                        .filter($crate::schema::profile::user_id.eq(user_id))
                        .select($crate::schema::profile::id),
                ),
            ),
        }
    };
}

pub(crate) use restrict_to_visible_profiles;

fn filtered(scope: Scope, filter: &ProfileFilter) -> ProfileQuery {
    let mut query = visible_profiles(scope);

    if let Some(status) = filter.application_status {
        query = query.filter(profile::application_status.eq(status));
    }
    if let Some(region_id) = filter.region_id {
        query = query.filter(profile::region_of_residence_id.eq(region_id));
    }
    if let Some(country_id) = filter.country_id {
        query = query.filter(
            profile::region_of_residence_id.eq_any(
                region::table
                    .filter(region::country_id.eq(country_id))
                    .select(region::id.nullable()),
            ),
        );
    }
    if let Some(occupation_id) = filter.occupation_id {
        query = query.filter(profile::occupation_id.eq(occupation_id));
    }
    if let Some(competence_id) = filter.competence_id {
        query = query.filter(
            profile::id.eq_any(
                profile_competence::table
                    .filter(profile_competence::competence_id.eq(competence_id))
                    .select(profile_competence::profile_id),
            ),
        );
    }
    if let Some(gender) = filter.gender {
        query = query.filter(profile::gender.eq(gender));
    }
    if let Some(available) = filter.available {
        query = query.filter(profile::available.eq(available));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", term);
        query = query.filter(
            profile::first_name
                .ilike(pattern.clone())
                .or(profile::middle_name.ilike(pattern.clone()))
                .or(profile::last_name.ilike(pattern.clone()))
                .or(profile::email.ilike(pattern)),
        );
    }

    query
}

/// Loads one profile if the scope can see it; otherwise it does not exist.
pub fn find_visible(conn: &mut PgConnection, scope: Scope, id: i32) -> Result<Profile, ApiError> {
    visible_profiles(scope)
        .filter(profile::id.eq(id))
        .select(Profile::as_select())
        .first::<Profile>(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Profile"))
}

/// Attaches the nested read-only objects to a batch of profiles.
pub fn hydrate(conn: &mut PgConnection, profiles: Vec<Profile>) -> QueryResult<Vec<ProfileView>> {
    let ids: Vec<i32> = profiles.iter().map(|p| p.id).collect();
    let occupation_ids = dedup(&profiles.iter().filter_map(|p| p.occupation_id).collect::<Vec<_>>());
    let region_ids = dedup(&profiles.iter().filter_map(|p| p.region_of_residence_id).collect::<Vec<_>>());

    let occupations: HashMap<i32, Occupation> = if occupation_ids.is_empty() {
        HashMap::new()
    } else {
        occupation::table
            .filter(occupation::id.eq_any(&occupation_ids))
            .select(Occupation::as_select())
            .load::<Occupation>(conn)?
            .into_iter()
            .map(|o| (o.id, o))
            .collect()
    };
    let regions = region_views(conn, &region_ids)?;

    let links: Vec<(i32, i32)> = if ids.is_empty() {
        Vec::new()
    } else {
        profile_competence::table
            .filter(profile_competence::profile_id.eq_any(&ids))
            .select((profile_competence::profile_id, profile_competence::competence_id))
            .load(conn)?
    };
    let competence_ids = dedup(&links.iter().map(|(_, c)| *c).collect::<Vec<_>>());
    let competences = competence_objects(conn, &competence_ids)?;

    let mut by_profile: HashMap<i32, Vec<i32>> = HashMap::new();
    for (profile_id, competence_id) in links {
        by_profile.entry(profile_id).or_default().push(competence_id);
    }

    let mut recommendations = recommendation_views(conn, &ids)?;

    Ok(profiles
        .into_iter()
        .map(|p| {
            let competencies = by_profile.remove(&p.id).unwrap_or_default();
            let competencies_objects = competencies
                .iter()
                .filter_map(|id| competences.get(id).cloned())
                .map(Labeled::new)
                .collect();
            ProfileView {
                occupation: p
                    .occupation_id
                    .and_then(|id| occupations.get(&id).cloned())
                    .map(Labeled::new),
                region_of_residence: p.region_of_residence_id.and_then(|id| regions.get(&id).cloned()),
                competencies,
                competencies_objects,
                recommendations: recommendations.remove(&p.id).unwrap_or_default(),
                has_cv: p.cv_path.is_some(),
                profile: p,
            }
        })
        .collect())
}

fn hydrate_one(conn: &mut PgConnection, profile: Profile) -> Result<ProfileView, ApiError> {
    hydrate(conn, vec![profile])?
        .pop()
        .ok_or_else(|| ApiError::InternalError("Failed to load profile details".to_string()))
}

fn replace_competencies(conn: &mut PgConnection, profile_id: i32, ids: &[i32]) -> QueryResult<()> {
    diesel::delete(profile_competence::table.filter(profile_competence::profile_id.eq(profile_id)))
        .execute(conn)?;

    let rows: Vec<_> = dedup(ids)
        .into_iter()
        .map(|competence_id| {
            (
                profile_competence::profile_id.eq(profile_id),
                profile_competence::competence_id.eq(competence_id),
            )
        })
        .collect();
    if !rows.is_empty() {
        diesel::insert_into(profile_competence::table)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(())
}

fn ensure_unique_identity(
    conn: &mut PgConnection,
    id_type: IdType,
    id_number: &str,
    except: Option<i32>,
) -> Result<(), ApiError> {
    let mut query = profile::table
        .filter(profile::id_type.eq(id_type))
        .filter(profile::id_number.eq(id_number.to_string()))
        .select(profile::id)
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(profile::id.ne(id));
    }
    if query.first::<i32>(conn).optional()?.is_some() {
        return Err(ApiError::validation(
            "A profile with this ID type and number already exists",
        ));
    }
    Ok(())
}

fn ensure_user_free(conn: &mut PgConnection, user_id: i32, except: Option<i32>) -> Result<(), ApiError> {
    let mut query = profile::table
        .filter(profile::user_id.eq(user_id))
        .select(profile::id)
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(profile::id.ne(id));
    }
    if query.first::<i32>(conn).optional()?.is_some() {
        return Err(ApiError::validation("This user already has a profile"));
    }
    Ok(())
}

fn ensure_placement(conn: &mut PgConnection, scope: Scope, region_id: i32) -> Result<(), ApiError> {
    let country_id = region_country(conn, region_id)?;
    if !scope.may_place_in(country_id) {
        return Err(ApiError::forbidden(
            "You can only place profiles in your own country",
        ));
    }
    Ok(())
}

pub struct ProfileService;

impl ProfileService {
    pub async fn list(
        filter: ProfileFilter,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<Page<ProfileView>, ApiError> {
        let scope = requester.scope()?;
        let (page, page_size, offset) = page_window(filter.page, filter.page_size)?;

        db::run(pool, move |conn| {
            let count = filtered(scope, &filter).count().get_result::<i64>(conn)?;
            let rows = filtered(scope, &filter)
                .select(Profile::as_select())
                .order((profile::created_at.desc(), profile::id.desc()))
                .limit(page_size)
                .offset(offset)
                .load::<Profile>(conn)?;
            debug!("Listed {} of {} profiles", rows.len(), count);

            Ok(Page {
                count,
                page,
                page_size,
                results: hydrate(conn, rows)?,
            })
        })
        .await
    }

    /// Every profile matching the filter, ignoring pagination.
    pub async fn list_all(
        filter: ProfileFilter,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<Vec<ProfileView>, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            let rows = filtered(scope, &filter)
                .select(Profile::as_select())
                .order(profile::id.asc())
                .load::<Profile>(conn)?;
            Ok(hydrate(conn, rows)?)
        })
        .await
    }

    pub async fn count(filter: ProfileFilter, requester: &Requester, pool: &DbPool) -> Result<i64, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            Ok(filtered(scope, &filter).count().get_result::<i64>(conn)?)
        })
        .await
    }

    pub async fn get(id: i32, requester: &Requester, pool: &DbPool) -> Result<ProfileView, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            let found = find_visible(conn, scope, id)?;
            hydrate_one(conn, found)
        })
        .await
    }

    pub async fn create(
        input: ProfileInput,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<ProfileView, ApiError> {
        let scope = requester.scope()?;
        validate_names(&input.first_name, &input.last_name)?;
        validate_age(input.date_of_birth, Utc::now().date_naive())?;

        let is_admin = requester.is_admin();
        let owner = match scope {
            Scope::Owner(user_id) => Some(user_id),
            _ => input.user_id,
        };
        let application_status = if is_admin {
            input.application_status.unwrap_or_default()
        } else {
            ApplicationStatus::default()
        };

        let view = db::run_tx(pool, move |conn| {
            ensure_placement(conn, scope, input.region_of_residence_id)?;
            ensure_unique_identity(conn, input.id_type, &input.id_number, None)?;
            if let Some(user_id) = owner {
                ensure_user_free(conn, user_id, None)?;
            }

            let row = NewProfile {
                first_name: input.first_name.trim().to_string(),
                middle_name: input.middle_name.trim().to_string(),
                last_name: input.last_name.trim().to_string(),
                gender: input.gender,
                occupation_id: input.occupation_id,
                date_of_birth: input.date_of_birth,
                next_of_kin_name: input.next_of_kin_name,
                next_of_kin_phone: input.next_of_kin_phone,
                email: input.email,
                phone: input.phone,
                user_id: owner,
                id_type: input.id_type,
                id_number: input.id_number.trim().to_string(),
                region_of_residence_id: Some(input.region_of_residence_id),
                active: is_admin,
                available: input.available,
                note: input.note,
                application_status,
                managerial_experience: input.managerial_experience,
                detailed_experience: input.detailed_experience,
                reference_contacts: input.reference_contacts,
            };

            let created = diesel::insert_into(profile::table)
                .values(&row)
                .returning(Profile::as_returning())
                .get_result::<Profile>(conn)?;
            replace_competencies(conn, created.id, &input.competencies)?;
            hydrate_one(conn, created)
        })
        .await?;

        info!("Profile {} created by user {}", view.profile.id, requester.username);
        Ok(view)
    }

    pub async fn update(
        id: i32,
        update: ProfileUpdate,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<ProfileView, ApiError> {
        let scope = requester.scope()?;
        if !requester.is_admin() && update.touches_admin_fields() {
            return Err(ApiError::forbidden(
                "Only administrators may change application status, activity or the linked user",
            ));
        }
        if let Some(dob) = update.date_of_birth {
            validate_age(dob, Utc::now().date_naive())?;
        }

        let view = db::run_tx(pool, move |conn| {
            let current = find_visible(conn, scope, id)?;

            if let Some(region_id) = update.region_of_residence_id {
                ensure_placement(conn, scope, region_id)?;
            }
            if update.id_type.is_some() || update.id_number.is_some() {
                let id_type = update.id_type.unwrap_or(current.id_type);
                let id_number = update.id_number.clone().unwrap_or_else(|| current.id_number.clone());
                ensure_unique_identity(conn, id_type, &id_number, Some(id))?;
            }
            if let Some(user_id) = update.user_id {
                ensure_user_free(conn, user_id, Some(id))?;
            }
            let first = update.first_name.as_deref().unwrap_or(&current.first_name);
            let last = update.last_name.as_deref().unwrap_or(&current.last_name);
            validate_names(first, last)?;

            let (changes, competencies) = update.into_changeset(Utc::now().naive_utc());
            let updated = diesel::update(profile::table.find(id))
                .set(&changes)
                .returning(Profile::as_returning())
                .get_result::<Profile>(conn)?;
            if let Some(ids) = competencies {
                replace_competencies(conn, id, &ids)?;
            }
            hydrate_one(conn, updated)
        })
        .await?;

        info!("Profile {} updated by user {}", id, requester.username);
        Ok(view)
    }

    /// Deletes the profile and returns it so attached files can be removed.
    pub async fn delete(id: i32, requester: &Requester, pool: &DbPool) -> Result<Profile, ApiError> {
        requester.require_admin()?;
        let scope = requester.scope()?;

        let removed = db::run_tx(pool, move |conn| {
            let found = find_visible(conn, scope, id)?;
            diesel::delete(profile::table.find(id)).execute(conn)?;
            Ok(found)
        })
        .await?;

        info!("Profile {} deleted by user {}", id, requester.username);
        Ok(removed)
    }

    pub async fn cv_path(id: i32, requester: &Requester, pool: &DbPool) -> Result<Option<String>, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| Ok(find_visible(conn, scope, id)?.cv_path)).await
    }

    /// Stores a new CV location and returns the previous one.
    pub async fn set_cv_path(
        id: i32,
        path: String,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<Option<String>, ApiError> {
        let scope = requester.scope()?;
        db::run_tx(pool, move |conn| {
            let current = find_visible(conn, scope, id)?;
            diesel::update(profile::table.find(id))
                .set((
                    profile::cv_path.eq(Some(path)),
                    profile::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;
            Ok(current.cv_path)
        })
        .await
    }

    /// Checks visibility of a profile without loading its details.
    pub async fn ensure_visible(id: i32, requester: &Requester, pool: &DbPool) -> Result<Profile, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| find_visible(conn, scope, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_completed_years() {
        assert_eq!(age_on(date(2000, 6, 15), date(2018, 6, 14)), 17);
        assert_eq!(age_on(date(2000, 6, 15), date(2018, 6, 15)), 18);
        assert_eq!(age_on(date(2000, 2, 29), date(2018, 2, 28)), 17);
    }

    #[test]
    fn age_window_is_inclusive() {
        let today = date(2024, 1, 1);
        assert!(validate_age(date(2006, 1, 1), today).is_ok());
        assert!(validate_age(date(2006, 1, 2), today).is_err());
        assert!(validate_age(date(1954, 1, 1), today).is_ok());
        assert!(validate_age(date(1953, 12, 31), today).is_err());
    }

    #[test]
    fn names_are_required() {
        assert!(validate_names("Amina", "Odhiambo").is_ok());
        assert!(validate_names("  ", "Odhiambo").is_err());
        assert!(validate_names("Amina", "").is_err());
    }

    #[test]
    fn dedup_sorts_and_removes_repeats() {
        assert_eq!(dedup(&[3, 1, 3, 2, 1]), vec![1, 2, 3]);
        assert!(dedup(&[]).is_empty());
    }
}
