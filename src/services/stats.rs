use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use log::debug;

use crate::access::{Requester, Scope};
use crate::config::{ApiError, DbPool};
use crate::db;
use crate::models::*;
use crate::schema::{outbreak, profile, profile_deployment};
use crate::services::profiles::{restrict_to_visible_profiles, visible_profiles};

/// Folds per-status profile counts into the dashboard totals.
pub fn tally_profiles(by_status: &[(ApplicationStatus, i64)], available: i64) -> Stats {
    let mut stats = Stats {
        available_rdes: available,
        ..Default::default()
    };
    for &(status, n) in by_status {
        stats.total_rdes += n;
        match status {
            ApplicationStatus::PendingApproval => stats.pending_approval += n,
            ApplicationStatus::ApprovedByPartnerState => stats.approved_by_partner_state += n,
            ApplicationStatus::ApprovalComplete => stats.approval_complete += n,
            ApplicationStatus::Rejected => stats.rejected += n,
        }
    }
    stats
}

pub fn tally_deployments(by_status: &[(DeploymentStatus, i64)]) -> DeploymentCounts {
    let mut counts = DeploymentCounts::default();
    for &(status, n) in by_status {
        counts.total += n;
        match status {
            DeploymentStatus::Initiated => counts.initiated += n,
            DeploymentStatus::PreDeployment => counts.pre_deployment += n,
            DeploymentStatus::Deployed => counts.deployed += n,
            DeploymentStatus::Ended => counts.ended += n,
        }
    }
    counts
}

fn visible_deployments(scope: Scope) -> profile_deployment::BoxedQuery<'static, Pg> {
    let query = profile_deployment::table.into_boxed();
    restrict_to_visible_profiles!(query, profile_deployment::profile_id, scope)
}

pub struct StatsService;

impl StatsService {
    /// Dashboard counters over what the requester can see. Every figure is a
    /// `COUNT` in the database.
    pub async fn fetch(requester: &Requester, pool: &DbPool) -> Result<Stats, ApiError> {
        let scope = requester.scope()?;
        let today = Utc::now().date_naive();

        db::run(pool, move |conn| {
            let mut profiles = Vec::with_capacity(ApplicationStatus::ALL.len());
            for &status in ApplicationStatus::ALL {
                let n = visible_profiles(scope)
                    .filter(profile::application_status.eq(status))
                    .count()
                    .get_result::<i64>(conn)?;
                profiles.push((status, n));
            }
            let available = visible_profiles(scope)
                .filter(profile::available.eq(true))
                .count()
                .get_result::<i64>(conn)?;

            let mut deployments = Vec::with_capacity(DeploymentStatus::ALL.len());
            for &status in DeploymentStatus::ALL {
                let n = visible_deployments(scope)
                    .filter(profile_deployment::status.eq(status))
                    .count()
                    .get_result::<i64>(conn)?;
                deployments.push((status, n));
            }

            let active_outbreaks = outbreak::table
                .filter(outbreak::start_date.le(today))
                .filter(outbreak::end_date.is_null().or(outbreak::end_date.ge(today)))
                .count()
                .get_result::<i64>(conn)?;

            let mut stats = tally_profiles(&profiles, available);
            stats.deployments = tally_deployments(&deployments);
            stats.active_outbreaks = active_outbreaks;
            debug!("Computed stats over {} profiles", stats.total_rdes);
            Ok(stats)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_counts_by_status_and_availability() {
        let stats = tally_profiles(
            &[
                (ApplicationStatus::PendingApproval, 2),
                (ApplicationStatus::ApprovedByPartnerState, 0),
                (ApplicationStatus::ApprovalComplete, 1),
                (ApplicationStatus::Rejected, 1),
            ],
            2,
        );
        assert_eq!(stats.total_rdes, 4);
        assert_eq!(stats.pending_approval, 2);
        assert_eq!(stats.approval_complete, 1);
        assert_eq!(stats.approved_by_partner_state, 0);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.available_rdes, 2);
    }

    #[test]
    fn deployment_counts_sum_to_total() {
        let counts = tally_deployments(&[
            (DeploymentStatus::Initiated, 1),
            (DeploymentStatus::Deployed, 2),
            (DeploymentStatus::Ended, 1),
        ]);
        assert_eq!(
            counts,
            DeploymentCounts {
                initiated: 1,
                pre_deployment: 0,
                deployed: 2,
                ended: 1,
                total: 4,
            }
        );
    }
}
