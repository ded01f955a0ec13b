// ABOUTME: Operator settings for fabrik: platform credentials, DNS target, state and template dirs.
// ABOUTME: Discovered from fabrik.yml; every value may reference an environment variable.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::orchestrator::ContextStore;
use crate::provider::{CloudflareDns, CoolifyDeployer, FileSpecValidator, HttpHealthVerifier};
use crate::spec::EnvValue;

pub const CONFIG_FILENAME: &str = "fabrik.yml";
pub const CONFIG_FILENAME_ALT: &str = "fabrik.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".fabrik/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub coolify: CoolifySettings,

    #[serde(default)]
    pub cloudflare: CloudflareSettings,

    /// Where DNS records point when a spec does not say.
    #[serde(default = "default_dns_target")]
    pub dns_target: EnvValue,

    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Directory for context snapshots and deploy locks.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub verify: VerifySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoolifySettings {
    #[serde(default = "default_coolify_url")]
    pub url: EnvValue,
    #[serde(default = "default_coolify_token")]
    pub token: EnvValue,
    #[serde(default = "default_project_uuid")]
    pub project_uuid: EnvValue,
    #[serde(default = "default_server_uuid")]
    pub server_uuid: EnvValue,
    #[serde(default = "default_environment")]
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudflareSettings {
    #[serde(default = "default_cloudflare_token")]
    pub token: EnvValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifySettings {
    #[serde(default = "default_verify_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coolify: CoolifySettings::default(),
            cloudflare: CloudflareSettings::default(),
            dns_target: default_dns_target(),
            templates_dir: default_templates_dir(),
            state_dir: default_state_dir(),
            verify: VerifySettings::default(),
        }
    }
}

impl Default for CoolifySettings {
    fn default() -> Self {
        Self {
            url: default_coolify_url(),
            token: default_coolify_token(),
            project_uuid: default_project_uuid(),
            server_uuid: default_server_uuid(),
            environment: default_environment(),
        }
    }
}

impl Default for CloudflareSettings {
    fn default() -> Self {
        Self {
            token: default_cloudflare_token(),
        }
    }
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            timeout: default_verify_timeout(),
            retry_interval: default_retry_interval(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_coolify_url() -> EnvValue {
    EnvValue::from_env("COOLIFY_API_URL")
}

fn default_coolify_token() -> EnvValue {
    EnvValue::from_env("COOLIFY_API_TOKEN")
}

fn default_project_uuid() -> EnvValue {
    EnvValue::from_env("COOLIFY_PROJECT_UUID")
}

fn default_server_uuid() -> EnvValue {
    EnvValue::from_env("COOLIFY_SERVER_UUID")
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_cloudflare_token() -> EnvValue {
    EnvValue::from_env("CLOUDFLARE_API_TOKEN")
}

fn default_dns_target() -> EnvValue {
    EnvValue::from_env("FABRIK_DNS_TARGET")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from(crate::provider::DEFAULT_TEMPLATES_DIR)
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".fabrik/state")
}

fn default_verify_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_retries() -> u32 {
    6
}

/// Resolve a value, treating an unset variable without default as absent.
fn resolve_optional(value: &EnvValue) -> Result<Option<String>> {
    match value.resolve() {
        Ok(v) if v.is_empty() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(Error::MissingEnvVar(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn resolve_required(value: &EnvValue, setting: &str) -> Result<String> {
    resolve_optional(value)?.ok_or_else(|| Error::MissingSetting(setting.to_string()))
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading settings");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like `discover`, but falls back to environment-variable defaults.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn dns_target(&self) -> Result<Option<String>> {
        resolve_optional(&self.dns_target)
    }

    pub fn context_store(&self) -> ContextStore {
        ContextStore::new(&self.state_dir)
    }

    pub fn validator(&self) -> FileSpecValidator {
        FileSpecValidator::new(&self.templates_dir)
    }

    pub fn coolify(&self) -> Result<CoolifyDeployer> {
        let url = resolve_required(&self.coolify.url, "coolify.url (COOLIFY_API_URL)")?;
        let token = resolve_required(&self.coolify.token, "coolify.token (COOLIFY_API_TOKEN)")?;

        let mut deployer =
            CoolifyDeployer::new(&url, token)?.with_environment(&self.coolify.environment);
        let project = resolve_optional(&self.coolify.project_uuid)?;
        let server = resolve_optional(&self.coolify.server_uuid)?;
        if let (Some(project), Some(server)) = (project, server) {
            deployer = deployer.with_target(project, server);
        }
        Ok(deployer)
    }

    /// DNS provisioner, if a Cloudflare token is configured.
    pub fn cloudflare(&self) -> Result<Option<CloudflareDns>> {
        match resolve_optional(&self.cloudflare.token)? {
            Some(token) => Ok(Some(CloudflareDns::new(token)?)),
            None => Ok(None),
        }
    }

    pub fn verifier(&self) -> Result<HttpHealthVerifier> {
        Ok(HttpHealthVerifier::new(
            self.verify.timeout,
            self.verify.retry_interval,
            self.verify.max_retries,
        )?)
    }
}
