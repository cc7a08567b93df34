use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::{DeploymentStatus, Severity};
use super::reference::RegionView;
use crate::schema::profile_deployment;

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = profile_deployment)]
pub struct ProfileDeployment {
    pub id: i32,
    pub profile_id: i32,
    pub outbreak_id: i32,
    pub region_id: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: DeploymentStatus,
    pub accepted_by_user: bool,
    pub rejected_by_user: bool,
    #[serde(skip_serializing)]
    pub report_path: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = profile_deployment)]
pub struct NewDeployment {
    pub profile_id: i32,
    pub outbreak_id: i32,
    pub region_id: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize, AsChangeset, Debug, Default, Clone)]
#[diesel(table_name = profile_deployment)]
pub struct DeploymentUpdate {
    pub region_id: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<DeploymentStatus>,
    pub accepted_by_user: Option<bool>,
    pub rejected_by_user: Option<bool>,
}

impl DeploymentUpdate {
    /// True when only the RDE's accept/reject answer is present.
    pub fn is_owner_response(&self) -> bool {
        self.region_id.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.status.is_none()
    }
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct ProfileSummary {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub user_id: Option<i32>,
    pub region_of_residence_id: Option<i32>,
}

#[derive(Queryable, Serialize, Debug, Clone)]
pub struct OutbreakSummary {
    pub id: i32,
    pub name: String,
    pub severity: Severity,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize, Debug)]
pub struct DeploymentView {
    #[serde(flatten)]
    pub deployment: ProfileDeployment,
    pub profile: ProfileSummary,
    pub outbreak: OutbreakSummary,
    pub region: RegionView,
    pub has_report: bool,
}
