// ABOUTME: Persists deployment context snapshots as JSON, one file per spec.
// ABOUTME: Writes go through a temp file and rename so readers never see a partial snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use super::context::DeploymentContext;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ContextStore {
    dir: PathBuf,
}

impl ContextStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot location for a spec: `<dir>/<spec file stem>.json`.
    pub fn path_for(&self, spec_path: &Path) -> PathBuf {
        let stem = spec_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "deployment".to_string());
        self.dir.join(format!("{stem}.json"))
    }

    pub fn save(&self, ctx: &DeploymentContext) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&ctx.spec_path);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_vec_pretty(ctx)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(path = %path.display(), state = %ctx.state(), "context saved");
        Ok(path)
    }

    /// Load the last snapshot for a spec, if one exists.
    pub fn load(&self, spec_path: &Path) -> Result<Option<DeploymentContext>> {
        let path = self.path_for(spec_path);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let ctx = serde_json::from_str(&content)?;
        Ok(Some(ctx))
    }

    /// Move the current snapshot aside as `<stem>.<started_at>.json` so a new
    /// run cannot overwrite it. Returns the new location.
    pub fn archive(&self, spec_path: &Path) -> Result<Option<PathBuf>> {
        let Some(ctx) = self.load(spec_path)? else {
            return Ok(None);
        };
        let path = self.path_for(spec_path);
        let stamp = ctx.started_at.format("%Y%m%dT%H%M%SZ");
        let archived = path.with_extension(format!("{stamp}.json"));
        fs::rename(&path, &archived)?;

        tracing::info!(from = %path.display(), to = %archived.display(), "snapshot archived");
        Ok(Some(archived))
    }

    pub fn remove(&self, spec_path: &Path) -> Result<bool> {
        let path = self.path_for(spec_path);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
