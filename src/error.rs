// ABOUTME: Application-wide error types for fabrik.
// ABOUTME: Uses thiserror; deployment and provider failures convert in with `?`.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

use crate::orchestrator::{DeploymentError, DeploymentState};
use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("missing setting: {0}")]
    MissingSetting(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no recorded deployment for {0}")]
    NoRecordedRun(PathBuf),

    #[error(
        "previous run of {} is {state} with {live} live resource(s); run `fabrik rollback` first or pass --force",
        spec.display()
    )]
    UnresolvedRun {
        spec: PathBuf,
        state: DeploymentState,
        live: usize,
    },

    #[error("deploy lock held by {holder} (pid {pid}) since {since}")]
    LockHeld {
        holder: String,
        pid: u32,
        since: DateTime<Utc>,
    },

    #[error("lock error: {0}")]
    Lock(String),

    #[error("deployment ended in {state}: {message}")]
    RunFailed {
        state: DeploymentState,
        message: String,
    },

    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
