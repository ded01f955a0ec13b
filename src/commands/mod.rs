// ABOUTME: Command handlers for the fabrik CLI.
// ABOUTME: Wires settings into an orchestrator and reports outcomes through `Output`.

mod deploy;
mod rollback;
mod spec;

pub use deploy::deploy;
pub use rollback::rollback;
pub use spec::{new_spec, status, validate};

use fabrik::config::Settings;
use fabrik::diagnostics::{Diagnostics, Warning};
use fabrik::error::{Error, Result};
use fabrik::lock::DeployLock;
use fabrik::orchestrator::{DeploymentContext, Orchestrator};
use fabrik::output::Output;

/// Build an orchestrator from operator settings.
fn build_orchestrator(settings: &Settings) -> Result<Orchestrator> {
    let mut orchestrator = Orchestrator::new(
        Box::new(settings.validator()),
        Box::new(settings.coolify()?),
        Box::new(settings.verifier()?),
    )
    .with_store(settings.context_store());

    if let Some(dns) = settings.cloudflare()? {
        orchestrator = orchestrator.with_dns(Box::new(dns));
    }
    if let Some(target) = settings.dns_target()? {
        orchestrator = orchestrator.with_dns_target(target);
    }
    Ok(orchestrator)
}

/// Print the outcome, release the lock, and turn an unsuccessful run into an error.
fn finish(
    ctx: &DeploymentContext,
    lock: DeployLock,
    succeeded: bool,
    output: &Output,
) -> Result<()> {
    let mut diag = Diagnostics::from_run(ctx);
    if let Err(e) = lock.release() {
        diag.warn(Warning::lock_release(format!("failed to release deploy lock: {e}")));
    }

    output.report(ctx);
    for warning in diag.warnings() {
        output.warning(&warning.to_string());
    }

    if succeeded {
        Ok(())
    } else {
        Err(Error::RunFailed {
            state: ctx.state(),
            message: ctx.error().unwrap_or("no error recorded").to_string(),
        })
    }
}
