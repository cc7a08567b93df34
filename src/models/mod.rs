pub mod deployment;
pub mod enums;
pub mod outbreak;
pub mod profile;
pub mod reference;
pub mod user;

pub use deployment::*;
pub use enums::*;
pub use outbreak::*;
pub use profile::*;
pub use reference::*;
pub use user::*;

use serde::Serialize;

use crate::errors::ApiError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub results: Vec<T>,
}

/// Normalises `page`/`page_size` query values into `(page, size, offset)`.
/// A page whose offset does not fit an `i64` is a bad request.
pub fn page_window(page: Option<i64>, page_size: Option<i64>) -> Result<(i64, i64, i64), ApiError> {
    let size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = page.unwrap_or(1).max(1);
    let offset = (page - 1)
        .checked_mul(size)
        .ok_or_else(|| ApiError::validation("Page number is out of range"))?;
    Ok((page, size, offset))
}

#[derive(Serialize, Debug, Default, PartialEq)]
pub struct DeploymentCounts {
    pub initiated: i64,
    pub pre_deployment: i64,
    pub deployed: i64,
    pub ended: i64,
    pub total: i64,
}

#[derive(Serialize, Debug, Default, PartialEq)]
pub struct Stats {
    pub total_rdes: i64,
    pub pending_approval: i64,
    pub approved_by_partner_state: i64,
    pub approval_complete: i64,
    pub rejected: i64,
    pub available_rdes: i64,
    pub active_outbreaks: i64,
    pub deployments: DeploymentCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_clamps() {
        assert_eq!(page_window(None, None).unwrap(), (1, 20, 0));
        assert_eq!(page_window(Some(3), Some(10)).unwrap(), (3, 10, 20));
        assert_eq!(page_window(Some(0), Some(10_000)).unwrap(), (1, 100, 0));
        assert_eq!(page_window(Some(-4), Some(0)).unwrap(), (1, 1, 0));
    }

    #[test]
    fn huge_page_number_is_rejected() {
        let err = page_window(Some(i64::MAX), Some(100)).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
        // The last page whose offset still fits is served.
        assert!(page_window(Some(i64::MAX), Some(1)).is_ok());
    }
}
