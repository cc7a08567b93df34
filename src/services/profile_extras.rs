//! Records hanging off a profile: recommendations, academic
//! qualifications and spoken languages.

use chrono::Utc;
use diesel::prelude::*;
use log::info;
use std::collections::HashMap;

use crate::access::{Requester, Scope};
use crate::config::{ApiError, DbPool};
use crate::db;
use crate::models::*;
use crate::schema::{
    academic_qualification_type, language, profile_academic_qualification, profile_language,
    profile_recommendation, user_account,
};
use crate::services::profiles::{find_visible, restrict_to_visible_profiles};

type RecommendationRow = (Recommendation, (i32, String, Option<String>, Option<String>));

fn recommendation_view((rec, (id, username, first_name, last_name)): RecommendationRow) -> RecommendationView {
    RecommendationView {
        id: rec.id,
        profile: rec.profile_id,
        comment: rec.comment,
        author: AuthorSummary {
            id,
            username,
            first_name,
            last_name,
        },
        created_at: rec.created_at,
    }
}

/// Recommendations with their authors, grouped by profile, newest first.
pub fn recommendation_views(
    conn: &mut PgConnection,
    profile_ids: &[i32],
) -> QueryResult<HashMap<i32, Vec<RecommendationView>>> {
    if profile_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = profile_recommendation::table
        .inner_join(user_account::table)
        .filter(profile_recommendation::profile_id.eq_any(profile_ids))
        .order(profile_recommendation::created_at.desc())
        .select((
            Recommendation::as_select(),
            (
                user_account::id,
                user_account::username,
                user_account::first_name,
                user_account::last_name,
            ),
        ))
        .load::<RecommendationRow>(conn)?;

    let mut grouped: HashMap<i32, Vec<RecommendationView>> = HashMap::new();
    for row in rows {
        let view = recommendation_view(row);
        grouped.entry(view.profile).or_default().push(view);
    }
    Ok(grouped)
}

/// Where a notification about a profile should go: the linked account's
/// address, falling back to the one on the profile.
pub fn profile_recipient(conn: &mut PgConnection, found: &Profile) -> QueryResult<Option<String>> {
    let account_email = match found.user_id {
        Some(user_id) => user_account::table
            .find(user_id)
            .select(user_account::email)
            .first::<String>(conn)
            .optional()?,
        None => None,
    };
    Ok(account_email.or_else(|| found.email.clone()))
}

pub struct RecommendationService;

impl RecommendationService {
    pub async fn list(
        profile_id: Option<i32>,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<Vec<RecommendationView>, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            let mut query = profile_recommendation::table
                .inner_join(user_account::table)
                .select((
                    Recommendation::as_select(),
                    (
                        user_account::id,
                        user_account::username,
                        user_account::first_name,
                        user_account::last_name,
                    ),
                ))
                .order(profile_recommendation::created_at.desc())
                .into_boxed();
            if let Some(pid) = profile_id {
                query = query.filter(profile_recommendation::profile_id.eq(pid));
            }
            query = restrict_to_visible_profiles!(query, profile_recommendation::profile_id, scope);

            let rows = query.load::<RecommendationRow>(conn)?;
            Ok(rows.into_iter().map(recommendation_view).collect())
        })
        .await
    }

    pub async fn get(id: i32, requester: &Requester, pool: &DbPool) -> Result<RecommendationView, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            let row = profile_recommendation::table
                .inner_join(user_account::table)
                .filter(profile_recommendation::id.eq(id))
                .select((
                    Recommendation::as_select(),
                    (
                        user_account::id,
                        user_account::username,
                        user_account::first_name,
                        user_account::last_name,
                    ),
                ))
                .first::<RecommendationRow>(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("Recommendation"))?;

            // Hidden profiles hide their recommendations too.
            find_visible(conn, scope, row.0.profile_id)
                .map_err(|e| e.not_found_as("Recommendation"))?;
            Ok(recommendation_view(row))
        })
        .await
    }

    /// Adds a staff recommendation; returns it with the address to notify.
    pub async fn create(
        input: RecommendationInput,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<(RecommendationView, Option<String>), ApiError> {
        requester.require_admin()?;
        let scope = requester.scope()?;
        if input.comment.trim().is_empty() {
            return Err(ApiError::validation("A recommendation needs a comment"));
        }
        let author_id = requester.user_id;

        let (view, recipient) = db::run_tx(pool, move |conn| {
            let target = find_visible(conn, scope, input.profile_id)?;
            let created = diesel::insert_into(profile_recommendation::table)
                .values(&NewRecommendation {
                    profile_id: target.id,
                    author_id,
                    comment: input.comment.trim().to_string(),
                })
                .returning(Recommendation::as_returning())
                .get_result::<Recommendation>(conn)?;
            let author = user_account::table
                .find(author_id)
                .select((
                    user_account::id,
                    user_account::username,
                    user_account::first_name,
                    user_account::last_name,
                ))
                .first::<(i32, String, Option<String>, Option<String>)>(conn)?;
            let recipient = profile_recipient(conn, &target)?;
            Ok((recommendation_view((created, author)), recipient))
        })
        .await?;

        info!("Recommendation {} added to profile {} by {}", view.id, view.profile, requester.username);
        Ok((view, recipient))
    }

    pub async fn delete(id: i32, requester: &Requester, pool: &DbPool) -> Result<(), ApiError> {
        requester.require_admin()?;
        let scope = requester.scope()?;
        db::run_tx(pool, move |conn| {
            let rec = profile_recommendation::table
                .find(id)
                .select(Recommendation::as_select())
                .first::<Recommendation>(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("Recommendation"))?;
            find_visible(conn, scope, rec.profile_id)
                .map_err(|e| e.not_found_as("Recommendation"))?;
            diesel::delete(profile_recommendation::table.find(id)).execute(conn)?;
            Ok(())
        })
        .await?;
        info!("Recommendation {} deleted by {}", id, requester.username);
        Ok(())
    }
}

fn qualification_views(
    conn: &mut PgConnection,
    rows: Vec<AcademicQualification>,
) -> QueryResult<Vec<AcademicQualificationView>> {
    let type_ids: Vec<i32> = rows.iter().filter_map(|q| q.qualification_type_id).collect();
    let types: HashMap<i32, AcademicQualificationType> = if type_ids.is_empty() {
        HashMap::new()
    } else {
        academic_qualification_type::table
            .filter(academic_qualification_type::id.eq_any(&type_ids))
            .select(AcademicQualificationType::as_select())
            .load::<AcademicQualificationType>(conn)?
            .into_iter()
            .map(|t| (t.id, t))
            .collect()
    };

    Ok(rows
        .into_iter()
        .map(|q| AcademicQualificationView {
            qualification_type: q
                .qualification_type_id
                .and_then(|id| types.get(&id).cloned())
                .map(Labeled::new),
            qualification: q,
        })
        .collect())
}

fn validate_period(start: chrono::NaiveDate, end: Option<chrono::NaiveDate>) -> Result<(), ApiError> {
    match end {
        Some(end) if end < start => Err(ApiError::validation("End date cannot be before start date")),
        _ => Ok(()),
    }
}

pub struct QualificationService;

impl QualificationService {
    pub async fn list(
        profile_id: Option<i32>,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<Vec<AcademicQualificationView>, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            let mut query = profile_academic_qualification::table
                .select(AcademicQualification::as_select())
                .order(profile_academic_qualification::start_date.desc())
                .into_boxed();
            if let Some(pid) = profile_id {
                query = query.filter(profile_academic_qualification::profile_id.eq(pid));
            }
            query = restrict_to_visible_profiles!(query, profile_academic_qualification::profile_id, scope);
            let rows = query.load::<AcademicQualification>(conn)?;
            Ok(qualification_views(conn, rows)?)
        })
        .await
    }

    fn load_visible(
        conn: &mut PgConnection,
        requester_scope: Scope,
        id: i32,
    ) -> Result<AcademicQualification, ApiError> {
        let row = profile_academic_qualification::table
            .find(id)
            .select(AcademicQualification::as_select())
            .first::<AcademicQualification>(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Academic qualification"))?;
        find_visible(conn, requester_scope, row.profile_id)
            .map_err(|e| e.not_found_as("Academic qualification"))?;
        Ok(row)
    }

    pub async fn get(id: i32, requester: &Requester, pool: &DbPool) -> Result<AcademicQualificationView, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            let row = Self::load_visible(conn, scope, id)?;
            let mut views = qualification_views(conn, vec![row])?;
            views.pop().ok_or_else(|| ApiError::not_found("Academic qualification"))
        })
        .await
    }

    pub async fn create(
        input: AcademicQualificationInput,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<AcademicQualificationView, ApiError> {
        let scope = requester.scope()?;
        validate_period(input.start_date, input.end_date)?;
        db::run_tx(pool, move |conn| {
            find_visible(conn, scope, input.profile_id)?;
            let created = diesel::insert_into(profile_academic_qualification::table)
                .values(&input)
                .returning(AcademicQualification::as_returning())
                .get_result::<AcademicQualification>(conn)?;
            let mut views = qualification_views(conn, vec![created])?;
            views.pop().ok_or_else(|| ApiError::InternalError("Failed to load qualification".to_string()))
        })
        .await
    }

    pub async fn update(
        id: i32,
        input: AcademicQualificationInput,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<AcademicQualificationView, ApiError> {
        let scope = requester.scope()?;
        validate_period(input.start_date, input.end_date)?;
        db::run_tx(pool, move |conn| {
            Self::load_visible(conn, scope, id)?;
            find_visible(conn, scope, input.profile_id)?;
            let updated = diesel::update(profile_academic_qualification::table.find(id))
                .set((
                    &input,
                    profile_academic_qualification::updated_at.eq(Utc::now().naive_utc()),
                ))
                .returning(AcademicQualification::as_returning())
                .get_result::<AcademicQualification>(conn)?;
            let mut views = qualification_views(conn, vec![updated])?;
            views.pop().ok_or_else(|| ApiError::not_found("Academic qualification"))
        })
        .await
    }

    pub async fn delete(id: i32, requester: &Requester, pool: &DbPool) -> Result<(), ApiError> {
        let scope = requester.scope()?;
        db::run_tx(pool, move |conn| {
            Self::load_visible(conn, scope, id)?;
            diesel::delete(profile_academic_qualification::table.find(id)).execute(conn)?;
            Ok(())
        })
        .await
    }
}

fn language_views(conn: &mut PgConnection, rows: Vec<ProfileLanguage>) -> QueryResult<Vec<ProfileLanguageView>> {
    let ids: Vec<i32> = rows.iter().map(|r| r.language_id).collect();
    let languages: HashMap<i32, Language> = if ids.is_empty() {
        HashMap::new()
    } else {
        language::table
            .filter(language::id.eq_any(&ids))
            .select(Language::as_select())
            .load::<Language>(conn)?
            .into_iter()
            .map(|l| (l.id, l))
            .collect()
    };

    // language_id is a non-null foreign key, so every entry resolves.
    Ok(rows
        .into_iter()
        .filter_map(|entry| {
            let lang = languages.get(&entry.language_id).cloned()?;
            Some(ProfileLanguageView {
                language: Labeled::new(lang),
                entry,
            })
        })
        .collect())
}

pub struct ProfileLanguageService;

impl ProfileLanguageService {
    pub async fn list(
        profile_id: Option<i32>,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<Vec<ProfileLanguageView>, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            let mut query = profile_language::table
                .select(ProfileLanguage::as_select())
                .order(profile_language::id.asc())
                .into_boxed();
            if let Some(pid) = profile_id {
                query = query.filter(profile_language::profile_id.eq(pid));
            }
            query = restrict_to_visible_profiles!(query, profile_language::profile_id, scope);
            let rows = query.load::<ProfileLanguage>(conn)?;
            Ok(language_views(conn, rows)?)
        })
        .await
    }

    fn load_visible(
        conn: &mut PgConnection,
        requester_scope: Scope,
        id: i32,
    ) -> Result<ProfileLanguage, ApiError> {
        let row = profile_language::table
            .find(id)
            .select(ProfileLanguage::as_select())
            .first::<ProfileLanguage>(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Profile language"))?;
        find_visible(conn, requester_scope, row.profile_id)
            .map_err(|e| e.not_found_as("Profile language"))?;
        Ok(row)
    }

    // A language appears at most once per profile; `except` is the row being edited.
    fn ensure_new_language(
        conn: &mut PgConnection,
        input: &ProfileLanguageInput,
        except: Option<i32>,
    ) -> Result<(), ApiError> {
        let mut query = profile_language::table
            .filter(profile_language::profile_id.eq(input.profile_id))
            .filter(profile_language::language_id.eq(input.language_id))
            .select(profile_language::id)
            .into_boxed();
        if let Some(id) = except {
            query = query.filter(profile_language::id.ne(id));
        }
        if query.first::<i32>(conn).optional()?.is_some() {
            return Err(ApiError::validation("This language is already on the profile"));
        }
        Ok(())
    }

    pub async fn get(id: i32, requester: &Requester, pool: &DbPool) -> Result<ProfileLanguageView, ApiError> {
        let scope = requester.scope()?;
        db::run(pool, move |conn| {
            let row = Self::load_visible(conn, scope, id)?;
            language_views(conn, vec![row])?
                .pop()
                .ok_or_else(|| ApiError::not_found("Profile language"))
        })
        .await
    }

    pub async fn create(
        input: ProfileLanguageInput,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<ProfileLanguageView, ApiError> {
        let scope = requester.scope()?;
        db::run_tx(pool, move |conn| {
            find_visible(conn, scope, input.profile_id)?;
            Self::ensure_new_language(conn, &input, None)?;
            let created = diesel::insert_into(profile_language::table)
                .values(&input)
                .returning(ProfileLanguage::as_returning())
                .get_result::<ProfileLanguage>(conn)?;
            language_views(conn, vec![created])?
                .pop()
                .ok_or_else(|| ApiError::InternalError("Failed to load profile language".to_string()))
        })
        .await
    }

    pub async fn update(
        id: i32,
        input: ProfileLanguageInput,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<ProfileLanguageView, ApiError> {
        let scope = requester.scope()?;
        db::run_tx(pool, move |conn| {
            Self::load_visible(conn, scope, id)?;
            find_visible(conn, scope, input.profile_id)?;
            Self::ensure_new_language(conn, &input, Some(id))?;
            let updated = diesel::update(profile_language::table.find(id))
                .set((&input, profile_language::updated_at.eq(Utc::now().naive_utc())))
                .returning(ProfileLanguage::as_returning())
                .get_result::<ProfileLanguage>(conn)?;
            language_views(conn, vec![updated])?
                .pop()
                .ok_or_else(|| ApiError::not_found("Profile language"))
        })
        .await
    }

    pub async fn delete(id: i32, requester: &Requester, pool: &DbPool) -> Result<(), ApiError> {
        let scope = requester.scope()?;
        db::run_tx(pool, move |conn| {
            Self::load_visible(conn, scope, id)?;
            diesel::delete(profile_language::table.find(id)).execute(conn)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn period_end_cannot_precede_start() {
        let start = NaiveDate::from_ymd_opt(2015, 9, 1).unwrap();
        assert!(validate_period(start, None).is_ok());
        assert!(validate_period(start, NaiveDate::from_ymd_opt(2019, 7, 1)).is_ok());
        assert!(validate_period(start, NaiveDate::from_ymd_opt(2014, 7, 1)).is_err());
    }

    #[test]
    fn recommendation_view_nests_author() {
        let stamp = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let view = recommendation_view((
            Recommendation {
                id: 4,
                profile_id: 9,
                author_id: 2,
                comment: "Reliable in the field".to_string(),
                created_at: stamp,
                updated_at: stamp,
            },
            (2, "admin.ug".to_string(), Some("Grace".to_string()), None),
        ));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["profile"], 9);
        assert_eq!(json["author"]["username"], "admin.ug");
        assert_eq!(json["author"]["first_name"], "Grace");
    }
}
