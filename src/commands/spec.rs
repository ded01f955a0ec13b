// ABOUTME: Spec-level commands: scaffold a new spec, validate one, show its last run.
// ABOUTME: None of these talk to a hosting platform.

use serde::Serialize;
use std::path::Path;

use fabrik::config::Settings;
use fabrik::error::{Error, Result};
use fabrik::output::Output;
use fabrik::provider::SpecValidator;
use fabrik::spec::init_spec;

pub fn new_spec(
    dir: &Path,
    name: &str,
    domain: &str,
    template: Option<&str>,
    force: bool,
    output: Output,
) -> Result<()> {
    let path = init_spec(dir, name, domain, template, force)?;
    output.success(&format!("Created spec: {}", path.display()));
    output.progress(&format!("Next: fabrik deploy {} --dry-run", path.display()));
    Ok(())
}

#[derive(Serialize)]
struct ValidationSummary<'a> {
    name: &'a str,
    domain: &'a str,
    template: &'a str,
    spec_hash: &'a str,
    secrets: Vec<&'a str>,
    warnings: &'a [String],
}

pub async fn validate(settings: &Settings, spec_path: &Path, output: Output) -> Result<()> {
    let validated = settings.validator().validate(spec_path).await?;
    let spec = &validated.spec;

    output.document(&ValidationSummary {
        name: spec.name.as_str(),
        domain: spec.domain.as_str(),
        template: &spec.template,
        spec_hash: &validated.spec_hash,
        secrets: validated.secrets.keys().collect(),
        warnings: &validated.warnings,
    });

    output.progress(&format!("name:     {}", spec.name));
    output.progress(&format!("domain:   {}", spec.domain));
    output.progress(&format!("template: {}", spec.template));
    output.progress(&format!("hash:     {}", validated.spec_hash));
    if !validated.secrets.is_empty() {
        let keys: Vec<&str> = validated.secrets.keys().collect();
        output.progress(&format!("secrets:  {}", keys.join(", ")));
    }
    for warning in &validated.warnings {
        output.warning(warning);
    }

    output.success(&format!("{} is valid", spec_path.display()));
    Ok(())
}

pub fn status(settings: &Settings, spec_path: &Path, output: Output) -> Result<()> {
    let ctx = settings
        .context_store()
        .load(spec_path)?
        .ok_or_else(|| Error::NoRecordedRun(spec_path.to_path_buf()))?;

    output.report(&ctx);
    Ok(())
}
