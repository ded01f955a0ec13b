// ABOUTME: Loads a YAML spec from disk, checks it, fingerprints it, and resolves its secrets.
// ABOUTME: Every rejection is a validation error naming the offending field.

use async_trait::async_trait;
use serde_yaml::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::secrets::SecretsManager;
use super::{SpecValidator, ValidatedSpec};
use crate::orchestrator::DeploymentError;
use crate::spec::{REQUIRED_FIELDS, Spec};
use crate::types::{AppName, Domain};

pub const DEFAULT_TEMPLATES_DIR: &str = "/opt/fabrik/templates";

/// Validator for spec files on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSpecValidator {
    templates_dir: PathBuf,
    generate_missing_secrets: bool,
}

impl Default for FileSpecValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATES_DIR)
    }
}

impl FileSpecValidator {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            generate_missing_secrets: true,
        }
    }

    /// Fail validation instead of generating secrets that are not set anywhere.
    pub fn require_existing_secrets(mut self) -> Self {
        self.generate_missing_secrets = false;
        self
    }

    /// Read and parse the document, requiring a YAML mapping.
    pub fn load_document(&self, spec_path: &Path) -> Result<Value, DeploymentError> {
        if !spec_path.exists() {
            return Err(DeploymentError::validation(
                format!("spec file not found: {}", spec_path.display()),
                "path",
            ));
        }

        let content = std::fs::read_to_string(spec_path).map_err(|e| {
            DeploymentError::validation(
                format!("cannot read spec file {}: {}", spec_path.display(), e),
                "path",
            )
        })?;

        let document: Value = serde_yaml::from_str(&content)
            .map_err(|e| DeploymentError::validation(format!("invalid YAML: {e}"), "syntax"))?;

        if !document.is_mapping() {
            return Err(DeploymentError::validation(
                "spec must be a YAML mapping",
                "type",
            ));
        }

        Ok(document)
    }

    /// Check a parsed document and convert it to a typed spec.
    ///
    /// Returns non-fatal warnings alongside the spec.
    pub fn check_document(&self, document: &Value) -> Result<(Spec, Vec<String>), DeploymentError> {
        let mut warnings = Vec::new();

        for field in REQUIRED_FIELDS {
            if document.get(field).is_none() {
                return Err(DeploymentError::validation(
                    format!("missing required field: {field}"),
                    field,
                ));
            }
        }

        let name = document.get("name").and_then(Value::as_str).ok_or_else(|| {
            DeploymentError::validation("name must be a string", "name")
        })?;
        AppName::new(name).map_err(|e| {
            DeploymentError::validation(
                format!("name must be alphanumeric with hyphens/underscores: {e}"),
                "name",
            )
        })?;

        let domain = document
            .get("domain")
            .and_then(Value::as_str)
            .ok_or_else(|| DeploymentError::validation("domain must be a string", "domain"))?;
        Domain::parse(domain).map_err(|e| DeploymentError::validation(e.to_string(), "domain"))?;

        if let Some(secrets) = document.get("secrets")
            && !secrets.is_sequence()
        {
            return Err(DeploymentError::validation(
                "secrets must be a list",
                "secrets",
            ));
        }

        if let Some(healthcheck) = document.get("healthcheck") {
            if !healthcheck.is_mapping() {
                return Err(DeploymentError::validation(
                    "healthcheck must be a mapping",
                    "healthcheck",
                ));
            }
            if healthcheck.get("path").is_none() {
                warnings.push("healthcheck missing 'path', using /health".to_string());
            }
        }

        let spec: Spec = serde_yaml::from_value(document.clone())
            .map_err(|e| DeploymentError::validation(format!("invalid spec: {e}"), "schema"))?;

        if !self.templates_dir.join(&spec.template).exists() {
            warnings.push(format!("template not found: {}", spec.template));
        }

        for (key, value) in &spec.env {
            value.resolve().map_err(|e| {
                DeploymentError::validation(e.to_string(), format!("env.{key}"))
            })?;
        }

        Ok((spec, warnings))
    }
}

#[async_trait]
impl SpecValidator for FileSpecValidator {
    async fn validate(&self, spec_path: &Path) -> Result<ValidatedSpec, DeploymentError> {
        let document = self.load_document(spec_path)?;
        let (spec, warnings) = self.check_document(&document)?;
        let spec_hash = compute_spec_hash(&document);

        let project_dir = spec_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let secrets_manager = SecretsManager::new(project_dir);

        if !self.generate_missing_secrets {
            let missing = secrets_manager.missing(&spec.secrets);
            if let Some(first) = missing.first() {
                return Err(DeploymentError::validation(
                    format!("secret not set: {}", missing.join(", ")),
                    format!("secrets.{first}"),
                ));
            }
        }

        let secrets = secrets_manager.load_all(&spec.secrets, self.generate_missing_secrets);

        tracing::info!(name = %spec.name, hash = %spec_hash, "spec validated");
        Ok(ValidatedSpec {
            spec,
            spec_hash,
            secrets,
            warnings,
        })
    }
}

/// First 16 hex chars of SHA-256 over the key-sorted JSON form of the document.
pub fn compute_spec_hash(document: &Value) -> String {
    let canonical = canonical_json(document).to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(16);
    hash
}

fn canonical_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::to_value(n).unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Sequence(items) => {
            serde_json::Value::Array(items.iter().map(canonical_json).collect())
        }
        Value::Mapping(map) => {
            let sorted: BTreeMap<String, serde_json::Value> = map
                .iter()
                .map(|(k, v)| (key_string(k), canonical_json(v)))
                .collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        Value::Tagged(tagged) => canonical_json(&tagged.value),
    }
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
