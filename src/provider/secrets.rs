// ABOUTME: Resolves secret values from the environment, a project .env file, or a fresh CSPRNG value.
// ABOUTME: Values are returned to the caller only; nothing here logs a secret.

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::orchestrator::SecretMap;

pub const GENERATED_SECRET_LENGTH: usize = 32;

/// Generate an alphanumeric secret from the thread-local CSPRNG.
pub fn generate_secret(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Parse `KEY=value` lines, skipping blanks and `#` comments and stripping quotes.
///
/// A missing or unreadable file yields an empty map.
pub fn load_dotenv(path: &Path) -> BTreeMap<String, String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return BTreeMap::new();
    };

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Secret lookup in priority order: process env, `<project>/.env`, generated.
#[derive(Debug)]
pub struct SecretsManager {
    project_dir: PathBuf,
    dotenv: OnceLock<BTreeMap<String, String>>,
}

impl SecretsManager {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            dotenv: OnceLock::new(),
        }
    }

    fn dotenv(&self) -> &BTreeMap<String, String> {
        self.dotenv
            .get_or_init(|| load_dotenv(&self.project_dir.join(".env")))
    }

    pub fn get(&self, key: &str, generate_if_missing: bool) -> Option<String> {
        if let Ok(value) = std::env::var(key)
            && !value.is_empty()
        {
            tracing::debug!(secret = key, "secret loaded from environment");
            return Some(value);
        }

        if let Some(value) = self.dotenv().get(key).filter(|v| !v.is_empty()) {
            tracing::debug!(secret = key, "secret loaded from .env");
            return Some(value.clone());
        }

        if generate_if_missing {
            tracing::info!(secret = key, "secret auto-generated");
            return Some(generate_secret(GENERATED_SECRET_LENGTH));
        }

        None
    }

    pub fn load_all(&self, keys: &[String], generate_if_missing: bool) -> SecretMap {
        keys.iter()
            .filter_map(|key| {
                self.get(key, generate_if_missing)
                    .map(|value| (key.clone(), value))
            })
            .collect()
    }

    /// Keys found neither in the environment nor in `.env`.
    pub fn missing(&self, keys: &[String]) -> Vec<String> {
        keys.iter()
            .filter(|key| std::env::var(key).is_err() && !self.dotenv().contains_key(*key))
            .cloned()
            .collect()
    }
}
