// ABOUTME: Test support utilities.
// ABOUTME: Recording fakes for every collaborator trait, plus spec file helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use fabrik::orchestrator::{DeploymentError, SecretMap};
use fabrik::provider::{
    Application, DeployRequest, DnsProvisioner, DnsRequest, HealthVerifier, HostingDeployer,
    MonitorRegistrar, ProviderError, ProvisionedRecord, SpecValidator, ValidatedSpec,
};
use fabrik::spec::Spec;
use fabrik::types::{AppName, AppUuid, DnsRecordId, MonitorId, ZoneId};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("fabrik=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Shared, ordered record of every collaborator call.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Calls whose name starts with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

fn failure(what: &str) -> ProviderError {
    ProviderError::unavailable(format!("{what} unavailable"))
}

pub fn validated(name: &str, domain: &str) -> ValidatedSpec {
    ValidatedSpec {
        spec: Spec::template(name, domain).unwrap(),
        spec_hash: "0123456789abcdef".to_string(),
        secrets: SecretMap::new(),
        warnings: Vec::new(),
    }
}

pub struct FakeValidator {
    pub log: CallLog,
    pub outcome: Result<ValidatedSpec, DeploymentError>,
}

impl FakeValidator {
    pub fn ok(log: &CallLog, spec: ValidatedSpec) -> Self {
        Self {
            log: log.clone(),
            outcome: Ok(spec),
        }
    }

    pub fn failing(log: &CallLog, message: &str, field: &str) -> Self {
        Self {
            log: log.clone(),
            outcome: Err(DeploymentError::validation(message, field)),
        }
    }
}

#[async_trait]
impl SpecValidator for FakeValidator {
    async fn validate(&self, spec_path: &Path) -> Result<ValidatedSpec, DeploymentError> {
        self.log.push(format!("validate:{}", spec_path.display()));
        self.outcome.clone()
    }
}

#[derive(Default)]
pub struct FakeDns {
    pub log: CallLog,
    pub fail_provision: bool,
    pub fail_teardown: bool,
    /// Report the record as pre-existing instead of freshly created.
    pub reuse_existing: bool,
}

impl FakeDns {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl DnsProvisioner for FakeDns {
    async fn provision(&self, request: &DnsRequest) -> Result<ProvisionedRecord, ProviderError> {
        self.log.push(format!("dns.provision:{}", request.domain));
        if self.fail_provision {
            return Err(failure("dns"));
        }
        Ok(ProvisionedRecord {
            record_id: DnsRecordId::new("rec-1"),
            zone_id: Some(ZoneId::new("zone-1")),
            created: !self.reuse_existing,
        })
    }

    async fn teardown(
        &self,
        record_id: &DnsRecordId,
        zone_id: Option<&ZoneId>,
    ) -> Result<(), ProviderError> {
        let zone = zone_id.map(|z| z.as_str()).unwrap_or("-");
        self.log.push(format!("dns.teardown:{record_id}@{zone}"));
        if self.fail_teardown {
            return Err(failure("dns"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeHosting {
    pub log: CallLog,
    pub existing: Option<Application>,
    pub fail_find: bool,
    pub fail_create: bool,
    pub fail_configure: bool,
    pub fail_start: bool,
    pub fail_teardown: bool,
}

impl FakeHosting {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn with_existing(log: &CallLog, uuid: &str, name: &str) -> Self {
        Self {
            existing: Some(Application {
                uuid: AppUuid::new(uuid),
                name: name.to_string(),
                url: None,
            }),
            ..Self::new(log)
        }
    }
}

#[async_trait]
impl HostingDeployer for FakeHosting {
    async fn find_application(
        &self,
        name: &AppName,
    ) -> Result<Option<Application>, ProviderError> {
        self.log.push(format!("hosting.find:{name}"));
        if self.fail_find {
            return Err(failure("hosting"));
        }
        Ok(self.existing.clone())
    }

    async fn create_application(
        &self,
        request: &DeployRequest,
    ) -> Result<Application, ProviderError> {
        self.log.push(format!("hosting.create:{}", request.name));
        if self.fail_create {
            return Err(failure("hosting"));
        }
        Ok(Application {
            uuid: AppUuid::new("app-1"),
            name: request.name.to_string(),
            url: Some(request.fqdn.clone()),
        })
    }

    async fn update_application(
        &self,
        app: &Application,
        _request: &DeployRequest,
    ) -> Result<(), ProviderError> {
        self.log.push(format!("hosting.update:{}", app.uuid));
        Ok(())
    }

    async fn configure_environment(
        &self,
        app: &Application,
        env: &BTreeMap<String, String>,
    ) -> Result<(), ProviderError> {
        self.log.push(format!("hosting.env:{}:{}", app.uuid, env.len()));
        if self.fail_configure {
            return Err(failure("hosting"));
        }
        Ok(())
    }

    async fn start_deployment(&self, app: &Application) -> Result<(), ProviderError> {
        self.log.push(format!("hosting.start:{}", app.uuid));
        if self.fail_start {
            return Err(failure("hosting"));
        }
        Ok(())
    }

    async fn teardown(&self, app_uuid: &AppUuid) -> Result<(), ProviderError> {
        self.log.push(format!("hosting.teardown:{app_uuid}"));
        if self.fail_teardown {
            return Err(failure("hosting"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeVerifier {
    pub log: CallLog,
    pub fail: bool,
}

impl FakeVerifier {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail: false,
        }
    }

    pub fn failing(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail: true,
        }
    }
}

#[async_trait]
impl HealthVerifier for FakeVerifier {
    async fn verify(&self, url: &str) -> Result<(), ProviderError> {
        self.log.push(format!("verify:{url}"));
        if self.fail {
            return Err(ProviderError::Unhealthy {
                check: "health".to_string(),
                attempts: 1,
                detail: "HTTP 503".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMonitors {
    pub log: CallLog,
    pub fail_register: bool,
    pub fail_teardown: bool,
}

impl FakeMonitors {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl MonitorRegistrar for FakeMonitors {
    async fn register(&self, name: &AppName, url: &str) -> Result<MonitorId, ProviderError> {
        self.log.push(format!("monitor.register:{name}:{url}"));
        if self.fail_register {
            return Err(failure("monitor"));
        }
        Ok(MonitorId::new("mon-1"))
    }

    async fn teardown(&self, monitor_id: &MonitorId) -> Result<(), ProviderError> {
        self.log.push(format!("monitor.teardown:{monitor_id}"));
        if self.fail_teardown {
            return Err(failure("monitor"));
        }
        Ok(())
    }
}

/// Write `content` to `<dir>/<file>` and return the path.
pub fn write_spec(dir: &Path, file: &str, content: &str) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, content).unwrap();
    path
}

pub const MINIMAL_SPEC: &str = "\
name: my-api
template: python-api
domain: api.example.com
";
