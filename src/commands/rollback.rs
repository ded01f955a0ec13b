// ABOUTME: Rollback command implementation.
// ABOUTME: Resumes a persisted run so resources it created, or left live, are torn down.

use std::path::Path;

use fabrik::config::Settings;
use fabrik::error::{Error, Result};
use fabrik::lock::DeployLock;
use fabrik::orchestrator::DeploymentState;
use fabrik::output::Output;

pub async fn rollback(
    settings: &Settings,
    spec_path: &Path,
    force: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();

    let lock = DeployLock::acquire(&settings.state_dir, spec_path, force)?;
    let ctx = settings
        .context_store()
        .load(spec_path)?
        .ok_or_else(|| Error::NoRecordedRun(spec_path.to_path_buf()))?;

    let before = ctx.state();
    let attempts_before = ctx.teardowns().len();
    output.progress(&format!("Resuming {} from {}", spec_path.display(), before));

    let orchestrator = super::build_orchestrator(settings)?;
    let ctx = orchestrator.resume(ctx).await?;

    let after = ctx.state();
    let settled = match after {
        DeploymentState::RolledBack | DeploymentState::Complete => true,
        DeploymentState::Failed => ctx.live_resources().is_empty(),
        _ => false,
    };
    super::finish(&ctx, lock, settled, &output)?;

    if before == after && ctx.teardowns().len() == attempts_before {
        output.success(&format!("Nothing to roll back ({after})"));
    } else {
        output.success(&format!("Rollback finished: {after}"));
    }
    Ok(())
}
