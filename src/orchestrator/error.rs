// ABOUTME: Typed failure taxonomy for the deployment pipeline.
// ABOUTME: The discriminant decides whether a failure triggers rollback or is itself a rollback failure.

use super::context::ResourceType;
use super::state::DeploymentState;

/// A failure raised by one pipeline step.
///
/// Every collaborator failure reaches the orchestrator as one of the first
/// five variants. `InvalidStateTransition` signals a driver bug and is never
/// converted into a state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeploymentError {
    /// Spec failed schema or semantic checks.
    #[error("{message}")]
    Validation { message: String, field: String },

    /// DNS or other supporting infrastructure could not be created.
    #[error("{message}")]
    Provisioning {
        message: String,
        resource_type: ResourceType,
    },

    /// The hosting platform rejected or failed the deployment.
    #[error("{message}")]
    Deploy {
        message: String,
        platform_error: String,
    },

    /// The deployed application did not pass post-deploy checks.
    #[error("{message}")]
    Verification { message: String, check_type: String },

    /// A compensating teardown call failed.
    #[error("{message}")]
    Rollback {
        message: String,
        resource_type: ResourceType,
    },

    #[error("invalid state transition: {from_state} -> {to_state}")]
    InvalidStateTransition {
        from_state: DeploymentState,
        to_state: DeploymentState,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentErrorKind {
    Validation,
    Provisioning,
    Deploy,
    Verification,
    Rollback,
    InvalidStateTransition,
}

impl DeploymentError {
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        DeploymentError::Validation {
            message: message.into(),
            field: field.into(),
        }
    }

    pub fn provisioning(message: impl Into<String>, resource_type: ResourceType) -> Self {
        DeploymentError::Provisioning {
            message: message.into(),
            resource_type,
        }
    }

    pub fn deploy(message: impl Into<String>, platform_error: impl Into<String>) -> Self {
        DeploymentError::Deploy {
            message: message.into(),
            platform_error: platform_error.into(),
        }
    }

    pub fn verification(message: impl Into<String>, check_type: impl Into<String>) -> Self {
        DeploymentError::Verification {
            message: message.into(),
            check_type: check_type.into(),
        }
    }

    pub fn rollback(message: impl Into<String>, resource_type: ResourceType) -> Self {
        DeploymentError::Rollback {
            message: message.into(),
            resource_type,
        }
    }

    pub fn invalid_transition(from_state: DeploymentState, to_state: DeploymentState) -> Self {
        DeploymentError::InvalidStateTransition {
            from_state,
            to_state,
        }
    }

    pub fn kind(&self) -> DeploymentErrorKind {
        match self {
            DeploymentError::Validation { .. } => DeploymentErrorKind::Validation,
            DeploymentError::Provisioning { .. } => DeploymentErrorKind::Provisioning,
            DeploymentError::Deploy { .. } => DeploymentErrorKind::Deploy,
            DeploymentError::Verification { .. } => DeploymentErrorKind::Verification,
            DeploymentError::Rollback { .. } => DeploymentErrorKind::Rollback,
            DeploymentError::InvalidStateTransition { .. } => {
                DeploymentErrorKind::InvalidStateTransition
            }
        }
    }

    /// Pipeline step the failure belongs to.
    pub fn step(&self) -> &'static str {
        match self {
            DeploymentError::Validation { .. } => "validation",
            DeploymentError::Provisioning { .. } => "provisioning",
            DeploymentError::Deploy { .. } => "deploying",
            DeploymentError::Verification { .. } => "verifying",
            DeploymentError::Rollback { .. } => "rolling_back",
            DeploymentError::InvalidStateTransition { .. } => "state_transition",
        }
    }

    /// Whether this failure may start compensating rollback.
    pub fn triggers_rollback(&self) -> bool {
        matches!(
            self.kind(),
            DeploymentErrorKind::Validation
                | DeploymentErrorKind::Provisioning
                | DeploymentErrorKind::Deploy
                | DeploymentErrorKind::Verification
        )
    }

    /// Fatal failures abort the run instead of becoming a state transition.
    pub fn is_fatal(&self) -> bool {
        self.kind() == DeploymentErrorKind::InvalidStateTransition
    }
}
