// ABOUTME: Non-fatal warnings gathered while a command runs.
// ABOUTME: Sources are the deployment run itself and CLI-side housekeeping like lock release.

use std::fmt;

use crate::orchestrator::DeploymentContext;

/// Where a warning came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSource {
    /// Recorded by the orchestrator on the deployment context.
    Run,
    /// The deploy lock file could not be removed.
    LockRelease,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub source: WarningSource,
    pub message: String,
}

impl Warning {
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            source: WarningSource::LockRelease,
            message: message.into(),
        }
    }

    pub fn run(message: impl Into<String>) -> Self {
        Self {
            source: WarningSource::Run,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            WarningSource::Run => f.write_str(&self.message),
            WarningSource::LockRelease => {
                write!(f, "{} (remove it by hand or pass --force)", self.message)
            }
        }
    }
}

/// Warnings for one command, in the order they occurred.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Seed with the warnings a run already recorded. These were logged when they happened.
    pub fn from_run(ctx: &DeploymentContext) -> Self {
        Self {
            warnings: ctx.warnings.iter().cloned().map(Warning::run).collect(),
        }
    }

    /// Add a warning raised outside the run and log it.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(source = ?warning.source, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}
