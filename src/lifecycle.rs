//! Deployment status rules.
//!
//! `initiated -> pre_deployment -> deployed -> ended`, with the RDE's answer
//! recorded in `accepted_by_user` / `rejected_by_user`. A rejected
//! deployment is terminal.

use crate::errors::ApiError;
use crate::models::{DeploymentStatus, DeploymentUpdate, ProfileDeployment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentState {
    pub status: DeploymentStatus,
    pub accepted: bool,
    pub rejected: bool,
}

impl DeploymentState {
    pub fn of(deployment: &ProfileDeployment) -> Self {
        Self {
            status: deployment.status,
            accepted: deployment.accepted_by_user,
            rejected: deployment.rejected_by_user,
        }
    }

    /// State after applying `update`; absent fields keep their value.
    pub fn apply(&self, update: &DeploymentUpdate) -> Self {
        Self {
            status: update.status.unwrap_or(self.status),
            accepted: update.accepted_by_user.unwrap_or(self.accepted),
            rejected: update.rejected_by_user.unwrap_or(self.rejected),
        }
    }
}

pub fn validate_transition(from: DeploymentState, to: DeploymentState) -> Result<(), ApiError> {
    if to.accepted && to.rejected {
        return Err(ApiError::validation(
            "A deployment cannot be both accepted and rejected",
        ));
    }

    if from.rejected && to != from {
        return Err(ApiError::validation(
            "This deployment was rejected and can no longer change",
        ));
    }

    if to.status.rank() < from.status.rank() {
        return Err(ApiError::validation(format!(
            "Deployment status cannot move from {} back to {}",
            from.status, to.status
        )));
    }

    if from.accepted && !to.accepted && from.status != DeploymentStatus::Initiated {
        return Err(ApiError::validation(
            "Acceptance cannot be withdrawn once the deployment has progressed",
        ));
    }

    if to.rejected && !from.rejected && from.status != DeploymentStatus::Initiated {
        return Err(ApiError::validation(
            "Only initiated deployments can be rejected",
        ));
    }

    if matches!(to.status, DeploymentStatus::PreDeployment | DeploymentStatus::Deployed) && !to.accepted {
        return Err(ApiError::validation(format!(
            "The RDE must accept the deployment before it can be {}",
            to.status
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeploymentStatus::*;

    fn state(status: DeploymentStatus, accepted: bool, rejected: bool) -> DeploymentState {
        DeploymentState { status, accepted, rejected }
    }

    #[test]
    fn happy_path_is_allowed() {
        let steps = [
            state(Initiated, false, false),
            state(Initiated, true, false),
            state(PreDeployment, true, false),
            state(Deployed, true, false),
            state(Ended, true, false),
        ];
        for pair in steps.windows(2) {
            assert!(validate_transition(pair[0], pair[1]).is_ok(), "{:?}", pair);
        }
    }

    #[test]
    fn accepted_initiated_can_jump_to_deployed() {
        assert!(validate_transition(state(Initiated, true, false), state(Deployed, true, false)).is_ok());
    }

    #[test]
    fn deploying_requires_acceptance() {
        assert!(validate_transition(state(Initiated, false, false), state(Deployed, false, false)).is_err());
        assert!(validate_transition(state(Initiated, false, false), state(PreDeployment, false, false)).is_err());
    }

    #[test]
    fn unanswered_deployment_can_be_ended() {
        assert!(validate_transition(state(Initiated, false, false), state(Ended, false, false)).is_ok());
    }

    #[test]
    fn rejection_is_terminal() {
        let rejected = state(Initiated, false, true);
        assert!(validate_transition(state(Initiated, false, false), rejected).is_ok());
        assert!(validate_transition(rejected, state(Ended, false, true)).is_err());
        assert!(validate_transition(rejected, state(Initiated, true, false)).is_err());
        assert!(validate_transition(rejected, rejected).is_ok());
    }

    #[test]
    fn cannot_be_both_accepted_and_rejected() {
        assert!(validate_transition(state(Initiated, false, false), state(Initiated, true, true)).is_err());
    }

    #[test]
    fn status_never_moves_backwards() {
        assert!(validate_transition(state(Deployed, true, false), state(Initiated, true, false)).is_err());
        assert!(validate_transition(state(Ended, true, false), state(Deployed, true, false)).is_err());
    }

    #[test]
    fn late_rejection_or_withdrawal_is_refused() {
        assert!(validate_transition(state(Deployed, true, false), state(Deployed, false, true)).is_err());
        assert!(validate_transition(state(Deployed, true, false), state(Deployed, false, false)).is_err());
        // Still initiated: the RDE may change their mind.
        assert!(validate_transition(state(Initiated, true, false), state(Initiated, false, true)).is_ok());
    }

    #[test]
    fn apply_keeps_absent_fields() {
        let current = state(Initiated, false, false);
        let update = DeploymentUpdate {
            accepted_by_user: Some(true),
            ..Default::default()
        };
        assert_eq!(current.apply(&update), state(Initiated, true, false));
    }
}
