// ABOUTME: Deployment lifecycle states and the static transition table.
// ABOUTME: `can_transition` is the guard checked before every state mutation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a deployment run currently is.
///
/// `Complete`, `Failed`, and `RolledBack` are terminal. Rollback is reachable
/// only from the three states that create external resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    Pending,
    Validating,
    Provisioning,
    Deploying,
    Verifying,
    Complete,
    Failed,
    RollingBack,
    RolledBack,
}

impl DeploymentState {
    pub const ALL: [DeploymentState; 9] = [
        DeploymentState::Pending,
        DeploymentState::Validating,
        DeploymentState::Provisioning,
        DeploymentState::Deploying,
        DeploymentState::Verifying,
        DeploymentState::Complete,
        DeploymentState::Failed,
        DeploymentState::RollingBack,
        DeploymentState::RolledBack,
    ];

    /// Legal next states from `self`.
    pub fn allowed_transitions(self) -> &'static [DeploymentState] {
        use DeploymentState::*;
        match self {
            Pending => &[Validating],
            Validating => &[Provisioning, Failed],
            Provisioning => &[Deploying, Failed, RollingBack],
            Deploying => &[Verifying, Failed, RollingBack],
            Verifying => &[Complete, Failed, RollingBack],
            RollingBack => &[RolledBack, Failed],
            Complete | Failed | RolledBack => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// States whose step may have created external resources.
    pub fn creates_resources(self) -> bool {
        matches!(
            self,
            DeploymentState::Provisioning | DeploymentState::Deploying | DeploymentState::Verifying
        )
    }

    /// Pipeline step name recorded as `error_step` for failures in this state.
    pub fn step_name(self) -> &'static str {
        match self {
            DeploymentState::Pending => "pending",
            DeploymentState::Validating => "validation",
            DeploymentState::Provisioning => "provisioning",
            DeploymentState::Deploying => "deploying",
            DeploymentState::Verifying => "verifying",
            DeploymentState::Complete => "complete",
            DeploymentState::Failed => "failed",
            DeploymentState::RollingBack => "rolling_back",
            DeploymentState::RolledBack => "rolled_back",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentState::Pending => "PENDING",
            DeploymentState::Validating => "VALIDATING",
            DeploymentState::Provisioning => "PROVISIONING",
            DeploymentState::Deploying => "DEPLOYING",
            DeploymentState::Verifying => "VERIFYING",
            DeploymentState::Complete => "COMPLETE",
            DeploymentState::Failed => "FAILED",
            DeploymentState::RollingBack => "ROLLING_BACK",
            DeploymentState::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure lookup in the transition table.
pub fn can_transition(from: DeploymentState, to: DeploymentState) -> bool {
    from.allowed_transitions().contains(&to)
}
