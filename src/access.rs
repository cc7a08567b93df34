//! Who is calling, and which rows they may see.
//!
//! Visibility rules:
//! - staff and superusers must have an attached region; `eac` level sees
//!   everything, any other level sees its region's country;
//! - everyone else sees only the rows they own.

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use log::debug;
use std::future::{ready, Ready};

use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::models::{Claims, UserLevel};
use crate::services::auth::AuthService;

#[derive(Debug, Clone, PartialEq)]
pub struct Requester {
    pub user_id: i32,
    pub username: String,
    pub level: UserLevel,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub attached_region_id: Option<i32>,
    pub attached_country_id: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Country(i32),
    Owner(i32),
}

impl Requester {
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only administrators may perform this action"))
        }
    }

    /// Visibility for profiles and deployments.
    pub fn scope(&self) -> Result<Scope, ApiError> {
        if !self.is_admin() {
            return Ok(Scope::Owner(self.user_id));
        }

        let country_id = match (self.attached_region_id, self.attached_country_id) {
            (Some(_), Some(country_id)) => country_id,
            _ => {
                return Err(ApiError::validation(
                    "Staff account has no attached region; contact an administrator",
                ))
            }
        };

        if self.level == UserLevel::Eac {
            Ok(Scope::Global)
        } else {
            Ok(Scope::Country(country_id))
        }
    }
}

impl Scope {
    /// Checks a single row given its owning user and country.
    pub fn permits(&self, owner_id: Option<i32>, country_id: Option<i32>) -> bool {
        match *self {
            Scope::Global => true,
            Scope::Country(id) => country_id == Some(id),
            Scope::Owner(user_id) => owner_id == Some(user_id),
        }
    }

    /// Whether rows may be placed in `country_id` by this requester.
    pub fn may_place_in(&self, country_id: i32) -> bool {
        match *self {
            Scope::Global | Scope::Owner(_) => true,
            Scope::Country(id) => id == country_id,
        }
    }
}

impl From<Claims> for Requester {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            level: claims.level,
            is_staff: claims.is_staff,
            is_superuser: claims.is_superuser,
            attached_region_id: claims.attached_region_id,
            attached_country_id: claims.attached_country_id,
        }
    }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl Requester {
    fn from_request_parts(req: &HttpRequest) -> Result<Self, ApiError> {
        let config = req.app_data::<web::Data<AppConfig>>().ok_or_else(|| {
            ApiError::InternalError("Application configuration is missing".to_string())
        })?;

        let token = bearer_token(req)
            .ok_or_else(|| ApiError::AuthError("Missing or invalid Authorization header".to_string()))?;

        let claims = AuthService::decode_token(token, config)?;
        debug!("Authenticated request from user {}", claims.username);
        Ok(claims.into())
    }
}

impl FromRequest for Requester {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_request_parts(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requester(is_staff: bool, level: UserLevel, region: Option<(i32, i32)>) -> Requester {
        Requester {
            user_id: 7,
            username: "someone".to_string(),
            level,
            is_staff,
            is_superuser: false,
            attached_region_id: region.map(|(r, _)| r),
            attached_country_id: region.map(|(_, c)| c),
        }
    }

    #[test]
    fn non_staff_only_sees_own_rows() {
        let scope = requester(false, UserLevel::Rde, None).scope().unwrap();
        assert_eq!(scope, Scope::Owner(7));
        assert!(scope.permits(Some(7), Some(1)));
        assert!(!scope.permits(Some(8), Some(1)));
        assert!(!scope.permits(None, Some(1)));
    }

    #[test]
    fn eac_staff_sees_everything() {
        let scope = requester(true, UserLevel::Eac, Some((4, 2))).scope().unwrap();
        assert_eq!(scope, Scope::Global);
        assert!(scope.permits(None, Some(99)));
        assert!(scope.permits(Some(1), None));
    }

    #[test]
    fn regional_staff_sees_same_country_only() {
        let scope = requester(true, UserLevel::Country, Some((4, 2))).scope().unwrap();
        assert_eq!(scope, Scope::Country(2));
        assert!(scope.permits(Some(100), Some(2)));
        assert!(!scope.permits(Some(100), Some(3)));
        assert!(!scope.permits(Some(100), None));
        assert!(scope.may_place_in(2));
        assert!(!scope.may_place_in(5));
    }

    #[test]
    fn staff_without_region_is_rejected() {
        let err = requester(true, UserLevel::Eac, None).scope().unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        let err = requester(true, UserLevel::Country, None).scope().unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn require_admin_rejects_rde() {
        assert!(requester(false, UserLevel::Rde, None).require_admin().is_err());
        assert!(requester(true, UserLevel::Country, Some((1, 1))).require_admin().is_ok());
    }
}
