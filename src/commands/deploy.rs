// ABOUTME: Deploy command implementation.
// ABOUTME: Takes the single-flight lock, runs the orchestrator, and reports live resources.

use std::path::Path;

use fabrik::config::Settings;
use fabrik::error::{Error, Result};
use fabrik::lock::DeployLock;
use fabrik::orchestrator::DeploymentState;
use fabrik::output::Output;

pub async fn deploy(
    settings: &Settings,
    spec_path: &Path,
    dry_run: bool,
    force: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();

    let lock = DeployLock::acquire(&settings.state_dir, spec_path, force)?;
    if !dry_run {
        guard_previous_run(settings, spec_path, force, &output)?;
    }
    let orchestrator = super::build_orchestrator(settings)?;

    if dry_run {
        output.progress(&format!("Planning {} (dry run)", spec_path.display()));
    } else {
        output.progress(&format!("Deploying {}", spec_path.display()));
    }

    let ctx = orchestrator.run(spec_path, dry_run).await?;
    let complete = ctx.state() == DeploymentState::Complete;
    super::finish(&ctx, lock, complete, &output)?;

    if dry_run {
        output.success("Dry run complete, nothing was changed");
    } else {
        output.success("Deployment complete!");
    }
    Ok(())
}

/// Refuse to start over a snapshot that still tracks live resources. With
/// `force`, archive it so the record survives.
fn guard_previous_run(
    settings: &Settings,
    spec_path: &Path,
    force: bool,
    output: &Output,
) -> Result<()> {
    let store = settings.context_store();
    let Some(previous) = store.load(spec_path)? else {
        return Ok(());
    };
    if !previous.has_unresolved_resources() {
        return Ok(());
    }

    if !force {
        return Err(Error::UnresolvedRun {
            spec: spec_path.to_path_buf(),
            state: previous.state(),
            live: previous.live_resources().len(),
        });
    }

    if let Some(archived) = store.archive(spec_path)? {
        output.warning(&format!(
            "previous run left resources live; its snapshot was moved to {}",
            archived.display()
        ));
    }
    Ok(())
}
