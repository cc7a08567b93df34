use diesel::prelude::*;
use log::{debug, info};

use crate::access::Requester;
use crate::config::{ApiError, DbPool};
use crate::db;
use crate::models::*;
use crate::schema::user_account;
use crate::services::auth::AuthService;

pub struct UserService;

fn validate_email(email: &str) -> Result<(), ApiError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::validation("Enter a valid email address")),
    }
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() || username.chars().count() > 150 {
        return Err(ApiError::validation("Username must be between 1 and 150 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(ApiError::validation(
            "Username may only contain letters, digits and @/./+/-/_",
        ));
    }
    Ok(())
}

/// Builds the row for a new account. Staff-only fields are dropped unless
/// `created_by_staff`; self-registered accounts stay inactive until the
/// email is confirmed.
pub fn new_account(
    req: &CreateUserRequest,
    password_hash: String,
    created_by_staff: bool,
) -> Result<NewUserAccount, ApiError> {
    validate_username(req.username.trim())?;
    validate_email(&req.email)?;

    let mut row = NewUserAccount {
        username: req.username.trim().to_string(),
        email: req.email.trim().to_lowercase(),
        password_hash,
        first_name: req.first_name.clone(),
        last_name: req.last_name.clone(),
        phone_number: req.phone_number.clone(),
        staff_number: None,
        level: UserLevel::Rde,
        is_staff: false,
        is_active: false,
        attached_region_id: None,
    };

    if created_by_staff {
        row.staff_number = req.staff_number.clone();
        row.level = req.level.unwrap_or_default();
        row.is_staff = req.is_staff.unwrap_or(false);
        row.attached_region_id = req.attached_region_id;
        row.is_active = true;

        if row.is_staff && row.attached_region_id.is_none() {
            return Err(ApiError::validation(
                "Staff accounts must be attached to a region",
            ));
        }
    }

    Ok(row)
}

impl UserService {
    pub async fn create(
        req: &CreateUserRequest,
        requester: Option<&Requester>,
        pool: &DbPool,
    ) -> Result<UserAccount, ApiError> {
        AuthService::validate_password(&req.password)?;
        let created_by_staff = requester.map(Requester::is_admin).unwrap_or(false);
        let password_hash = AuthService::hash_password(&req.password)?;
        let row = new_account(req, password_hash, created_by_staff)?;

        let user = db::run(pool, move |conn| {
            let taken = user_account::table
                .filter(user_account::username.eq(&row.username))
                .select(user_account::id)
                .first::<i32>(conn)
                .optional()?;
            if taken.is_some() {
                return Err(ApiError::validation("A user with that username already exists"));
            }

            Ok(diesel::insert_into(user_account::table)
                .values(&row)
                .returning(UserAccount::as_returning())
                .get_result::<UserAccount>(conn)?)
        })
        .await?;

        info!("Created user {} (staff: {})", user.username, user.is_staff);
        Ok(user)
    }

    pub async fn get_user_by_id(id: i32, pool: &DbPool) -> Result<UserAccount, ApiError> {
        db::run(pool, move |conn| {
            user_account::table
                .find(id)
                .select(UserAccount::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("User"))
        })
        .await
    }

    pub async fn find_by_username(username: &str, pool: &DbPool) -> Result<Option<UserAccount>, ApiError> {
        let username = username.trim().to_string();
        db::run(pool, move |conn| {
            Ok(user_account::table
                .filter(user_account::username.eq(username))
                .select(UserAccount::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    pub async fn find_by_email(email: &str, pool: &DbPool) -> Result<Option<UserAccount>, ApiError> {
        let email = email.trim().to_lowercase();
        db::run(pool, move |conn| {
            Ok(user_account::table
                .filter(user_account::email.eq(email))
                .order(user_account::id.asc())
                .select(UserAccount::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    /// Checks credentials; unknown users and bad passwords look the same.
    pub async fn authenticate(username: &str, password: &str, pool: &DbPool) -> Result<UserAccount, ApiError> {
        let user = match Self::find_by_username(username, pool).await? {
            Some(user) => user,
            None => {
                debug!("Login failed: no user named {}", username);
                return Err(ApiError::AuthError("Invalid credentials".to_string()));
            }
        };

        if !AuthService::verify_password(password, &user.password_hash)? {
            debug!("Login failed: invalid password for user {}", username);
            return Err(ApiError::AuthError("Invalid credentials".to_string()));
        }

        if !user.is_active {
            return Err(ApiError::AuthError(
                "Account is not active; confirm your email address first".to_string(),
            ));
        }

        Ok(user)
    }

    /// Staff see every active account, everyone else only themselves.
    pub async fn list(requester: &Requester, pool: &DbPool) -> Result<Vec<UserAccount>, ApiError> {
        let is_admin = requester.is_admin();
        let own_id = requester.user_id;
        db::run(pool, move |conn| {
            let mut query = user_account::table
                .select(UserAccount::as_select())
                .order(user_account::id.asc())
                .into_boxed();
            if is_admin {
                query = query.filter(user_account::is_active.eq(true));
            } else {
                query = query.filter(user_account::id.eq(own_id));
            }
            Ok(query.load::<UserAccount>(conn)?)
        })
        .await
    }

    pub async fn get(id: i32, requester: &Requester, pool: &DbPool) -> Result<UserAccount, ApiError> {
        if !requester.is_admin() && requester.user_id != id {
            return Err(ApiError::not_found("User"));
        }
        Self::get_user_by_id(id, pool).await
    }

    pub async fn update(
        id: i32,
        req: UpdateUserRequest,
        requester: &Requester,
        pool: &DbPool,
    ) -> Result<UserAccount, ApiError> {
        if !requester.is_admin() {
            if requester.user_id != id {
                return Err(ApiError::not_found("User"));
            }
            if req.touches_staff_fields() {
                return Err(ApiError::forbidden(
                    "Only administrators may change level, staff or region fields",
                ));
            }
        }

        let password_hash = match req.password.as_deref() {
            Some(password) => {
                AuthService::validate_password(password)?;
                Some(AuthService::hash_password(password)?)
            }
            None => None,
        };

        if let Some(email) = req.email.as_deref() {
            validate_email(email)?;
        }

        let changes = UserChangeset {
            email: req.email.map(|e| e.trim().to_lowercase()),
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            phone_number: req.phone_number,
            staff_number: req.staff_number,
            level: req.level,
            is_staff: req.is_staff,
            is_active: req.is_active,
            attached_region_id: req.attached_region_id,
        };

        let user = db::run_tx(pool, move |conn| {
            let current = user_account::table
                .find(id)
                .select(UserAccount::as_select())
                .for_update()
                .first::<UserAccount>(conn)
                .optional()?
                .ok_or_else(|| ApiError::not_found("User"))?;

            let becomes_staff = changes.is_staff.unwrap_or(current.is_staff);
            let region = changes.attached_region_id.or(current.attached_region_id);
            if becomes_staff && region.is_none() {
                return Err(ApiError::validation(
                    "Staff accounts must be attached to a region",
                ));
            }

            if !changes.has_changes() {
                return Ok(current);
            }

            Ok(diesel::update(user_account::table.find(id))
                .set(&changes)
                .returning(UserAccount::as_returning())
                .get_result::<UserAccount>(conn)?)
        })
        .await?;

        info!("Updated user {}", user.username);
        Ok(user)
    }

    pub async fn delete(id: i32, requester: &Requester, pool: &DbPool) -> Result<(), ApiError> {
        requester.require_admin()?;
        if requester.user_id == id {
            return Err(ApiError::validation("You cannot delete your own account"));
        }

        let deleted = db::run(pool, move |conn| {
            Ok(diesel::delete(user_account::table.find(id)).execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(ApiError::not_found("User"));
        }
        info!("Deleted user {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            username: "jane.rde".to_string(),
            email: "Jane@Example.org".to_string(),
            password: "long enough".to_string(),
            first_name: Some("Jane".to_string()),
            last_name: None,
            phone_number: None,
            staff_number: Some("X-1".to_string()),
            level: Some(UserLevel::Eac),
            is_staff: Some(true),
            attached_region_id: Some(3),
        }
    }

    #[test]
    fn self_registration_drops_staff_fields() {
        let row = new_account(&request(), "hash".to_string(), false).unwrap();
        assert_eq!(row.level, UserLevel::Rde);
        assert!(!row.is_staff);
        assert!(!row.is_active);
        assert_eq!(row.staff_number, None);
        assert_eq!(row.attached_region_id, None);
        assert_eq!(row.email, "jane@example.org");
    }

    #[test]
    fn staff_created_accounts_keep_staff_fields() {
        let row = new_account(&request(), "hash".to_string(), true).unwrap();
        assert_eq!(row.level, UserLevel::Eac);
        assert!(row.is_staff);
        assert!(row.is_active);
        assert_eq!(row.attached_region_id, Some(3));
    }

    #[test]
    fn staff_account_requires_region() {
        let mut req = request();
        req.attached_region_id = None;
        let err = new_account(&req, "hash".to_string(), true).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn rejects_bad_username_and_email() {
        let mut req = request();
        req.username = "has space".to_string();
        assert!(new_account(&req, "hash".to_string(), false).is_err());

        let mut req = request();
        req.email = "not-an-email".to_string();
        assert!(new_account(&req, "hash".to_string(), false).is_err());
    }
}
