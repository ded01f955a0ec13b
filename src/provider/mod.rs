// ABOUTME: Capability traits the orchestrator calls, plus the bundled implementations.
// ABOUTME: Every trait is object-safe so collaborators can be injected as boxed values.

mod cloudflare;
mod coolify;
mod error;
mod secrets;
mod validator;
mod verifier;

pub use cloudflare::CloudflareDns;
pub use coolify::CoolifyDeployer;
pub use error::{ProviderError, ProviderErrorKind};
pub use secrets::{SecretsManager, generate_secret, load_dotenv};
pub use validator::{DEFAULT_TEMPLATES_DIR, FileSpecValidator, compute_spec_hash};
pub use verifier::HttpHealthVerifier;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::orchestrator::{DeploymentError, SecretMap};
use crate::spec::{DnsRecordType, Spec};
use crate::types::{AppName, AppUuid, DnsRecordId, Domain, MonitorId, ZoneId};

/// Output of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidatedSpec {
    pub spec: Spec,
    pub spec_hash: String,
    pub secrets: SecretMap,
    pub warnings: Vec<String>,
}

/// Loads and checks a spec document. Failures are always `DeploymentError::Validation`.
#[async_trait]
pub trait SpecValidator: Send + Sync {
    async fn validate(&self, spec_path: &Path) -> Result<ValidatedSpec, DeploymentError>;
}

/// A DNS record the orchestrator wants to exist.
#[derive(Debug, Clone)]
pub struct DnsRequest {
    pub domain: Domain,
    pub target: String,
    pub record_type: DnsRecordType,
    pub proxied: bool,
}

/// The record backing a `DnsRequest`.
#[derive(Debug, Clone)]
pub struct ProvisionedRecord {
    pub record_id: DnsRecordId,
    pub zone_id: Option<ZoneId>,
    /// False when an existing record was reused or updated in place.
    pub created: bool,
}

#[async_trait]
pub trait DnsProvisioner: Send + Sync {
    async fn provision(&self, request: &DnsRequest) -> Result<ProvisionedRecord, ProviderError>;

    /// Delete a record. A record that no longer exists counts as deleted.
    async fn teardown(
        &self,
        record_id: &DnsRecordId,
        zone_id: Option<&ZoneId>,
    ) -> Result<(), ProviderError>;
}

/// An application known to the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub uuid: AppUuid,
    pub name: String,
    pub url: Option<String>,
}

/// What to deploy. `env` includes resolved secrets, so `Debug` only lists keys.
#[derive(Clone)]
pub struct DeployRequest {
    pub name: AppName,
    pub fqdn: String,
    pub template: String,
    pub artifact: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl fmt::Debug for DeployRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployRequest")
            .field("name", &self.name)
            .field("fqdn", &self.fqdn)
            .field("template", &self.template)
            .field("artifact", &self.artifact)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Hosting platform operations.
///
/// The orchestrator looks up an existing application by name before
/// creating one, so repeated runs for the same spec redeploy in place.
#[async_trait]
pub trait HostingDeployer: Send + Sync {
    async fn find_application(&self, name: &AppName)
    -> Result<Option<Application>, ProviderError>;

    /// Create the application and return as soon as the platform has assigned
    /// it a uuid. Nothing else happens here, so the caller can record the new
    /// application before any follow-up call can fail.
    async fn create_application(
        &self,
        request: &DeployRequest,
    ) -> Result<Application, ProviderError>;

    async fn update_application(
        &self,
        app: &Application,
        request: &DeployRequest,
    ) -> Result<(), ProviderError>;

    /// Replace the application's environment variables. An empty map is a no-op.
    async fn configure_environment(
        &self,
        app: &Application,
        env: &BTreeMap<String, String>,
    ) -> Result<(), ProviderError>;

    /// Kick off a build/deploy of an already configured application.
    async fn start_deployment(&self, app: &Application) -> Result<(), ProviderError>;

    /// Delete an application. An application that no longer exists counts as deleted.
    async fn teardown(&self, app_uuid: &AppUuid) -> Result<(), ProviderError>;
}

/// Post-deploy availability check.
#[async_trait]
pub trait HealthVerifier: Send + Sync {
    async fn verify(&self, url: &str) -> Result<(), ProviderError>;
}

/// Uptime monitoring registration.
#[async_trait]
pub trait MonitorRegistrar: Send + Sync {
    async fn register(&self, name: &AppName, url: &str) -> Result<MonitorId, ProviderError>;

    async fn teardown(&self, monitor_id: &MonitorId) -> Result<(), ProviderError>;
}
