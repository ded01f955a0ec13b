// ABOUTME: Deployment state machine, failure taxonomy, run context, and the driver that ties them together.
// ABOUTME: Collaborators are injected through the traits in `crate::provider`.

mod context;
mod driver;
mod error;
mod rollback;
mod state;
mod store;

pub use context::{
    DeployStatus, DeploymentContext, ResourceRecord, ResourceType, SecretMap, TeardownOutcome,
};
pub use driver::Orchestrator;
pub use error::{DeploymentError, DeploymentErrorKind};
pub use rollback::{
    Compensators, RollbackReport, ZONE_ID_KEY, roll_back_live, roll_back_resources,
};
pub use state::{DeploymentState, can_transition};
pub use store::ContextStore;
