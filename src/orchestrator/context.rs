// ABOUTME: Run-scoped deployment context: state, spec, secrets, and the resource undo log.
// ABOUTME: Owned by exactly one orchestrator run; snapshots serialize with stable field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use super::error::DeploymentError;
use super::state::{DeploymentState, can_transition};
use crate::spec::Spec;
use crate::types::AppName;

/// Kind of externally created side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Dns,
    Hosting,
    Monitor,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Dns => "dns",
            ResourceType::Hosting => "hosting",
            ResourceType::Monitor => "monitor",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One external side effect that rollback must undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ResourceRecord {
    pub fn new(resource_type: ResourceType, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// String metadata value, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    fn same_resource(&self, resource_type: ResourceType, resource_id: &str) -> bool {
        self.resource_type == resource_type && self.resource_id == resource_id
    }
}

/// Result of one teardown attempt during rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownOutcome {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub attempted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TeardownOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// How the deploy step reached the hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Created,
    Redeployed,
}

impl DeployStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeployStatus::Created => "created",
            DeployStatus::Redeployed => "redeployed",
        }
    }
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved secret values keyed by name.
///
/// Values never appear in `Debug` output or serialized snapshots.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretMap(BTreeMap<String, String>);

const REDACTED: &str = "***";

impl SecretMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Exposes the values. Callers must not log what they get back.
    pub fn expose(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for SecretMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Debug for SecretMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, REDACTED)))
            .finish()
    }
}

impl Serialize for SecretMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.keys().map(|k| (k, REDACTED)))
    }
}

impl<'de> Deserialize<'de> for SecretMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::<String, String>::deserialize(deserializer).map(SecretMap)
    }
}

/// The single mutable aggregate for one deployment run.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeploymentContext {
    pub spec_path: PathBuf,
    pub spec: Option<Spec>,
    /// Content fingerprint, set once validation succeeds.
    pub spec_hash: Option<String>,

    state: DeploymentState,
    #[serde(default)]
    state_history: Vec<DeploymentState>,
    pub dry_run: bool,

    #[serde(default)]
    pub secrets: SecretMap,

    #[serde(default)]
    created_resources: Vec<ResourceRecord>,

    pub coolify_uuid: Option<String>,
    pub dns_record_id: Option<String>,
    #[serde(default)]
    pub monitor_id: Option<String>,
    pub deployed_url: Option<String>,
    #[serde(default)]
    pub deploy_status: Option<DeployStatus>,

    error: Option<String>,
    error_step: Option<String>,
    #[serde(default)]
    rollback_errors: Vec<String>,
    #[serde(default)]
    teardowns: Vec<TeardownOutcome>,
    #[serde(default)]
    pub warnings: Vec<String>,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentContext {
    pub fn new(spec_path: impl Into<PathBuf>, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            spec_path: spec_path.into(),
            spec: None,
            spec_hash: None,
            state: DeploymentState::Pending,
            state_history: vec![DeploymentState::Pending],
            dry_run,
            secrets: SecretMap::new(),
            created_resources: Vec::new(),
            coolify_uuid: None,
            dns_record_id: None,
            monitor_id: None,
            deployed_url: None,
            deploy_status: None,
            error: None,
            error_step: None,
            rollback_errors: Vec::new(),
            teardowns: Vec::new(),
            warnings: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> DeploymentState {
        self.state
    }

    /// Every state this run has been in, starting with `Pending`.
    pub fn state_history(&self) -> &[DeploymentState] {
        &self.state_history
    }

    /// Move to `next`, refusing anything the transition table does not allow.
    pub fn transition(&mut self, next: DeploymentState) -> Result<(), DeploymentError> {
        if !can_transition(self.state, next) {
            return Err(DeploymentError::invalid_transition(self.state, next));
        }

        tracing::debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        self.state_history.push(next);
        self.touch();
        Ok(())
    }

    /// Application name, once the spec has been validated.
    pub fn app_name(&self) -> Option<&AppName> {
        self.spec.as_ref().map(|s| &s.name)
    }

    /// Append a created resource to the undo log. Ignored in dry-run mode.
    pub fn record_resource(&mut self, record: ResourceRecord) {
        if self.dry_run {
            tracing::warn!(
                resource_type = %record.resource_type,
                resource_id = %record.resource_id,
                "dry run must not create resources; record ignored"
            );
            return;
        }

        tracing::info!(
            resource_type = %record.resource_type,
            resource_id = %record.resource_id,
            "recorded created resource"
        );
        self.created_resources.push(record);
        self.touch();
    }

    pub fn created_resources(&self) -> &[ResourceRecord] {
        &self.created_resources
    }

    pub fn resources_by_type(&self, resource_type: ResourceType) -> Vec<&ResourceRecord> {
        self.created_resources
            .iter()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }

    /// Record the root cause of a failure. Only the first call has any effect.
    pub fn record_failure(&mut self, message: impl Into<String>, step: impl Into<String>) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.error = Some(message.into());
        self.error_step = Some(step.into());
        self.touch();
        true
    }

    pub fn record_error(&mut self, err: &DeploymentError) -> bool {
        self.record_failure(err.to_string(), err.step())
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_step(&self) -> Option<&str> {
        self.error_step.as_deref()
    }

    /// Start a new rollback pass. Failures from earlier passes stop being
    /// reported; their outcomes stay in `teardowns`.
    pub fn begin_rollback_pass(&mut self) {
        self.rollback_errors.clear();
        self.touch();
    }

    pub fn record_teardown(&mut self, outcome: TeardownOutcome) {
        if let Some(ref err) = outcome.error {
            self.rollback_errors.push(format!(
                "failed to roll back {}/{}: {}",
                outcome.resource_type, outcome.resource_id, err
            ));
        }
        self.teardowns.push(outcome);
        self.touch();
    }

    /// Teardown failures of the latest rollback pass, kept apart from the root cause.
    pub fn rollback_errors(&self) -> &[String] {
        &self.rollback_errors
    }

    pub fn teardowns(&self) -> &[TeardownOutcome] {
        &self.teardowns
    }

    /// Resources that still exist externally after this run.
    pub fn live_resources(&self) -> Vec<&ResourceRecord> {
        match self.state {
            DeploymentState::RolledBack => Vec::new(),
            DeploymentState::Complete => self.created_resources.iter().collect(),
            _ => self
                .created_resources
                .iter()
                .filter(|r| {
                    !self.teardowns.iter().any(|t| {
                        t.succeeded() && r.same_resource(t.resource_type, &t.resource_id)
                    })
                })
                .collect(),
        }
    }

    /// True when the run stopped short of COMPLETE with resources still live.
    /// A new run over this snapshot would lose the only record of them.
    pub fn has_unresolved_resources(&self) -> bool {
        self.state != DeploymentState::Complete && !self.live_resources().is_empty()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
