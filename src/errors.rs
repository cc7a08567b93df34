use actix_web::http::StatusCode;
use actix_web::{error::ResponseError, HttpResponse};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use log::{debug, error, warn};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Authentication error: {0}")]
    AuthError(String),
    #[error("Permission denied: {0}")]
    ForbiddenError(String),
    #[error("Not found: {0}")]
    NotFoundError(String),
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::ForbiddenError(msg.into())
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFoundError(format!("{} not found", what))
    }

    /// Rewords a not-found error as `what` not found; other errors pass through.
    pub fn not_found_as(self, what: &str) -> Self {
        match self {
            ApiError::NotFoundError(_) => ApiError::not_found(what),
            other => other,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::DatabaseError(msg)
            | ApiError::ValidationError(msg)
            | ApiError::AuthError(msg)
            | ApiError::ForbiddenError(msg)
            | ApiError::NotFoundError(msg)
            | ApiError::InternalError(msg) => msg,
        }
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ApiError::NotFoundError("Record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                debug!("Unique constraint violated: {}", info.message());
                let constraint = info.constraint_name().unwrap_or("unique constraint");
                ApiError::ValidationError(format!("Duplicate value violates {}", constraint))
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                debug!("Foreign key violated: {}", info.message());
                ApiError::ValidationError("Referenced record does not exist".to_string())
            }
            DieselError::RollbackTransaction => {
                ApiError::InternalError("Transaction rolled back".to_string())
            }
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(err: r2d2::Error) -> Self {
        error!("Failed to get database connection: {}", err);
        ApiError::DatabaseError(err.to_string())
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        error!("Database operation error: {}", err);
        ApiError::DatabaseError(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let msg = self.message();
        match self {
            ApiError::DatabaseError(_) => {
                error!("\x1B[1;31mDATABASE ERROR:\x1B[0m {}", msg);
            }
            ApiError::ValidationError(_) => {
                warn!("\x1B[1;33mVALIDATION ERROR:\x1B[0m {}", msg);
            }
            ApiError::AuthError(_) => {
                warn!("\x1B[1;33mAUTHENTICATION ERROR:\x1B[0m {}", msg);
            }
            ApiError::ForbiddenError(_) => {
                warn!("\x1B[1;33mPERMISSION ERROR:\x1B[0m {}", msg);
            }
            ApiError::NotFoundError(_) => {
                debug!("\x1B[1;36mNOT FOUND ERROR:\x1B[0m {}", msg);
            }
            ApiError::InternalError(_) => {
                error!("\x1B[1;31mINTERNAL SERVER ERROR:\x1B[0m {}", msg);
            }
        }

        // Storage details stay in the log.
        let body = match self {
            ApiError::DatabaseError(_) => "A database error occurred",
            _ => msg,
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": body }))
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthError(_) => StatusCode::UNAUTHORIZED,
            ApiError::ForbiddenError(_) => StatusCode::FORBIDDEN,
            ApiError::NotFoundError(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("Profile").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::AuthError("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn diesel_not_found_maps_to_404() {
        let err: ApiError = DieselError::NotFound.into();
        assert!(matches!(err, ApiError::NotFoundError(_)));
    }

    #[test]
    fn not_found_as_keeps_storage_failures() {
        let hidden = ApiError::not_found("Profile").not_found_as("Recommendation");
        assert!(matches!(hidden, ApiError::NotFoundError(ref m) if m == "Recommendation not found"));

        let broken = ApiError::DatabaseError("connection reset".into()).not_found_as("Recommendation");
        assert_eq!(broken.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn database_error_body_hides_details() {
        let resp = ApiError::DatabaseError("relation \"profile\" does not exist".into())
            .error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
