// ABOUTME: Typed form of the declarative application spec (name, template, domain, ...).
// ABOUTME: Produced by the validator; carried in the deployment context.

mod env_value;
mod healthcheck;

pub use env_value::{EnvValue, resolve_env_map};
pub use healthcheck::{DEFAULT_HEALTHCHECK_PATH, DnsRecordType, DnsSpec, HealthcheckSpec};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{AppName, Domain};

/// Fields every spec must carry.
pub const REQUIRED_FIELDS: [&str; 3] = ["name", "template", "domain"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    pub name: AppName,

    pub template: String,

    pub domain: Domain,

    /// Image or repository reference handed to the hosting platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,

    #[serde(default)]
    pub secrets: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthcheckSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsSpec>,

    #[serde(default = "default_monitor")]
    pub monitor: bool,
}

fn default_monitor() -> bool {
    true
}

impl Spec {
    /// Path of the health endpoint, `/health` unless the spec says otherwise.
    pub fn healthcheck_path(&self) -> &str {
        self.healthcheck
            .as_ref()
            .map(|hc| hc.path.as_str())
            .unwrap_or(DEFAULT_HEALTHCHECK_PATH)
    }

    /// Full health check URL on the public domain.
    pub fn healthcheck_url(&self) -> String {
        let path = self.healthcheck_path();
        if path.starts_with('/') {
            format!("{}{}", self.domain.https_url(), path)
        } else {
            format!("{}/{}", self.domain.https_url(), path)
        }
    }

    pub fn resolved_env(&self) -> Result<BTreeMap<String, String>> {
        resolve_env_map(&self.env)
    }

    /// A minimal valid spec for the given name and domain.
    pub fn template(name: &str, domain: &str) -> std::result::Result<Self, String> {
        Ok(Spec {
            name: AppName::new(name).map_err(|e| e.to_string())?,
            template: "python-api".to_string(),
            domain: Domain::parse(domain).map_err(|e| e.to_string())?,
            artifact: None,
            env: BTreeMap::new(),
            secrets: Vec::new(),
            healthcheck: None,
            dns: None,
            monitor: true,
        })
    }
}

/// Write a starter spec to `<dir>/<name>.yaml`.
pub fn init_spec(
    dir: &Path,
    name: &str,
    domain: &str,
    template: Option<&str>,
    force: bool,
) -> Result<PathBuf> {
    let mut spec = Spec::template(name, domain).map_err(Error::InvalidConfig)?;
    if let Some(t) = template {
        spec.template = t.to_string();
    }

    let spec_path = dir.join(format!("{name}.yaml"));
    if spec_path.exists() && !force {
        return Err(Error::AlreadyExists(spec_path));
    }

    std::fs::create_dir_all(dir)?;
    std::fs::write(&spec_path, serde_yaml::to_string(&spec)?)?;
    Ok(spec_path)
}
