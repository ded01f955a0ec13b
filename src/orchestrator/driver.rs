// ABOUTME: The deployment driver: runs validate, provision, deploy, verify as guarded transitions.
// ABOUTME: Typed step failures become FAILED or a compensating rollback; only bad transitions escape.

use std::path::Path;

use super::context::{DeployStatus, DeploymentContext, ResourceRecord, ResourceType};
use super::error::DeploymentError;
use super::rollback::{Compensators, ZONE_ID_KEY, roll_back_live, roll_back_resources};
use super::state::DeploymentState;
use super::store::ContextStore;
use crate::provider::{
    DeployRequest, DnsProvisioner, DnsRequest, HealthVerifier, HostingDeployer,
    MonitorRegistrar, ProviderError, SpecValidator,
};
use crate::spec::{DnsRecordType, Spec};

/// Drives one deployment run at a time through the state machine.
///
/// Collaborators are injected; nothing here talks to the network directly.
pub struct Orchestrator {
    validator: Box<dyn SpecValidator>,
    hosting: Box<dyn HostingDeployer>,
    verifier: Box<dyn HealthVerifier>,
    dns: Option<Box<dyn DnsProvisioner>>,
    monitors: Option<Box<dyn MonitorRegistrar>>,
    store: Option<ContextStore>,
    dns_target: Option<String>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("dns", &self.dns.is_some())
            .field("monitors", &self.monitors.is_some())
            .field("store", &self.store)
            .field("dns_target", &self.dns_target)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        validator: Box<dyn SpecValidator>,
        hosting: Box<dyn HostingDeployer>,
        verifier: Box<dyn HealthVerifier>,
    ) -> Self {
        Self {
            validator,
            hosting,
            verifier,
            dns: None,
            monitors: None,
            store: None,
            dns_target: None,
        }
    }

    pub fn with_dns(mut self, dns: Box<dyn DnsProvisioner>) -> Self {
        self.dns = Some(dns);
        self
    }

    pub fn with_monitors(mut self, monitors: Box<dyn MonitorRegistrar>) -> Self {
        self.monitors = Some(monitors);
        self
    }

    /// Persist the context after every transition and resource append.
    /// Dry runs are never written.
    pub fn with_store(mut self, store: ContextStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Default DNS record target when the spec does not name one.
    pub fn with_dns_target(mut self, target: impl Into<String>) -> Self {
        self.dns_target = Some(target.into());
        self
    }

    /// Run a full deployment of the spec at `spec_path`.
    ///
    /// Returns the final context in COMPLETE, FAILED, or ROLLED_BACK. The
    /// only error is `InvalidStateTransition`, which means the driver itself
    /// is broken.
    pub async fn run(
        &self,
        spec_path: impl AsRef<Path>,
        dry_run: bool,
    ) -> Result<DeploymentContext, DeploymentError> {
        let spec_path = spec_path.as_ref();
        tracing::info!(spec = %spec_path.display(), dry_run, "starting deployment");

        let mut ctx = DeploymentContext::new(spec_path, dry_run);
        self.persist(&mut ctx);
        self.drive(&mut ctx).await?;

        tracing::info!(
            state = %ctx.state(),
            error = ctx.error().unwrap_or(""),
            "deployment finished"
        );
        Ok(ctx)
    }

    /// Continue a persisted run that stopped before reaching a terminal state.
    ///
    /// A FAILED run whose rollback left resources live gets another teardown
    /// attempt for just those resources. It stays FAILED either way.
    pub async fn resume(
        &self,
        mut ctx: DeploymentContext,
    ) -> Result<DeploymentContext, DeploymentError> {
        let state = ctx.state();
        tracing::info!(spec = %ctx.spec_path.display(), %state, "resuming deployment");

        match state {
            DeploymentState::Pending
            | DeploymentState::Complete
            | DeploymentState::RolledBack => {
                tracing::info!(%state, "nothing to resume");
            }
            DeploymentState::Failed => self.retry_teardown(&mut ctx).await,
            DeploymentState::Validating => {
                ctx.record_failure("run interrupted during validation", state.step_name());
                self.advance(&mut ctx, DeploymentState::Failed)?;
            }
            DeploymentState::Provisioning
            | DeploymentState::Deploying
            | DeploymentState::Verifying => {
                ctx.record_failure(
                    format!("run interrupted during {}", state.step_name()),
                    state.step_name(),
                );
                self.recover(&mut ctx).await?;
            }
            DeploymentState::RollingBack => self.roll_back(&mut ctx).await?,
        }
        Ok(ctx)
    }

    async fn drive(&self, ctx: &mut DeploymentContext) -> Result<(), DeploymentError> {
        self.advance(ctx, DeploymentState::Validating)?;
        if let Err(err) = self.validate(ctx).await {
            return self.fail(ctx, err).await;
        }

        self.advance(ctx, DeploymentState::Provisioning)?;
        if let Err(err) = self.provision(ctx).await {
            return self.fail(ctx, err).await;
        }

        self.advance(ctx, DeploymentState::Deploying)?;
        if let Err(err) = self.deploy(ctx).await {
            return self.fail(ctx, err).await;
        }

        self.advance(ctx, DeploymentState::Verifying)?;
        if let Err(err) = self.verify(ctx).await {
            return self.fail(ctx, err).await;
        }

        self.advance(ctx, DeploymentState::Complete)
    }

    fn advance(
        &self,
        ctx: &mut DeploymentContext,
        next: DeploymentState,
    ) -> Result<(), DeploymentError> {
        if let Err(err) = ctx.transition(next) {
            tracing::error!(error = %err, "refusing state transition");
            return Err(err);
        }
        self.persist(ctx);
        Ok(())
    }

    fn persist(&self, ctx: &mut DeploymentContext) {
        let Some(ref store) = self.store else {
            return;
        };
        if ctx.dry_run {
            return;
        }
        if let Err(e) = store.save(ctx) {
            ctx.warn(format!("failed to persist deployment state: {e}"));
        }
    }

    fn record(&self, ctx: &mut DeploymentContext, record: ResourceRecord) {
        ctx.record_resource(record);
        self.persist(ctx);
    }

    /// Handle a typed step failure: record the root cause, then fail or roll back.
    async fn fail(
        &self,
        ctx: &mut DeploymentContext,
        err: DeploymentError,
    ) -> Result<(), DeploymentError> {
        if err.is_fatal() {
            return Err(err);
        }

        tracing::error!(step = err.step(), state = %ctx.state(), error = %err, "deployment step failed");
        ctx.record_error(&err);
        self.recover(ctx).await
    }

    async fn recover(&self, ctx: &mut DeploymentContext) -> Result<(), DeploymentError> {
        if ctx.state().creates_resources() && !ctx.created_resources().is_empty() {
            self.advance(ctx, DeploymentState::RollingBack)?;
            self.roll_back(ctx).await
        } else {
            self.advance(ctx, DeploymentState::Failed)
        }
    }

    fn compensators(&self) -> Compensators<'_> {
        Compensators {
            hosting: self.hosting.as_ref(),
            dns: self.dns.as_deref(),
            monitors: self.monitors.as_deref(),
        }
    }

    async fn roll_back(&self, ctx: &mut DeploymentContext) -> Result<(), DeploymentError> {
        let report = roll_back_resources(ctx, self.compensators()).await;
        self.persist(ctx);

        if report.is_clean() {
            tracing::info!(count = report.attempted, "rollback complete");
            self.advance(ctx, DeploymentState::RolledBack)
        } else {
            tracing::error!(
                failed = report.failures.len(),
                attempted = report.attempted,
                "rollback incomplete; resources remain live"
            );
            self.advance(ctx, DeploymentState::Failed)
        }
    }

    /// FAILED is terminal, so outcomes are recorded without a transition.
    async fn retry_teardown(&self, ctx: &mut DeploymentContext) {
        if ctx.live_resources().is_empty() {
            tracing::info!("nothing to resume");
            return;
        }

        let report = roll_back_live(ctx, self.compensators()).await;
        self.persist(ctx);

        if report.is_clean() {
            tracing::info!(count = report.attempted, "live resources torn down");
        } else {
            tracing::error!(
                failed = report.failures.len(),
                attempted = report.attempted,
                "teardown retry incomplete; resources remain live"
            );
        }
    }

    async fn validate(&self, ctx: &mut DeploymentContext) -> Result<(), DeploymentError> {
        let validated = self
            .validator
            .validate(&ctx.spec_path)
            .await
            .map_err(as_validation_error)?;

        for warning in validated.warnings {
            ctx.warn(warning);
        }
        tracing::info!(name = %validated.spec.name, hash = %validated.spec_hash, "validation passed");
        ctx.spec = Some(validated.spec);
        ctx.spec_hash = Some(validated.spec_hash);
        ctx.secrets = validated.secrets;
        Ok(())
    }

    async fn provision(&self, ctx: &mut DeploymentContext) -> Result<(), DeploymentError> {
        let spec = loaded_spec(ctx)
            .ok_or_else(|| DeploymentError::provisioning("no validated spec", ResourceType::Dns))?;

        if let Some(ref dns) = self.dns {
            self.provision_dns(ctx, &**dns, &spec).await?;
        }

        if spec.monitor
            && let Some(ref monitors) = self.monitors
        {
            let url = spec.healthcheck_url();
            if ctx.dry_run {
                tracing::info!(%url, "[dry run] would register monitor");
            } else {
                let monitor_id = monitors.register(&spec.name, &url).await.map_err(|e| {
                    DeploymentError::provisioning(
                        format!("monitor registration failed for {url}: {e}"),
                        ResourceType::Monitor,
                    )
                })?;
                ctx.monitor_id = Some(monitor_id.to_string());
                self.record(
                    ctx,
                    ResourceRecord::new(ResourceType::Monitor, monitor_id.as_str())
                        .with_metadata("url", url),
                );
            }
        }
        Ok(())
    }

    async fn provision_dns(
        &self,
        ctx: &mut DeploymentContext,
        dns: &dyn DnsProvisioner,
        spec: &Spec,
    ) -> Result<(), DeploymentError> {
        let dns_spec = spec.dns.as_ref();
        let Some(target) = dns_spec
            .and_then(|d| d.target.clone())
            .or_else(|| self.dns_target.clone())
        else {
            ctx.warn(format!("no DNS target configured; skipping record for {}", spec.domain));
            return Ok(());
        };

        let request = DnsRequest {
            domain: spec.domain.clone(),
            record_type: dns_spec
                .and_then(|d| d.record_type)
                .unwrap_or_else(|| DnsRecordType::for_target(&target)),
            proxied: dns_spec.map(|d| d.proxied).unwrap_or(true),
            target,
        };

        if ctx.dry_run {
            tracing::info!(
                domain = %request.domain,
                record_type = %request.record_type,
                target = %request.target,
                "[dry run] would provision DNS record"
            );
            return Ok(());
        }

        let record = dns.provision(&request).await.map_err(|e| {
            DeploymentError::provisioning(
                format!("DNS provisioning failed for {}: {e}", request.domain),
                ResourceType::Dns,
            )
        })?;

        ctx.dns_record_id = Some(record.record_id.to_string());
        if record.created {
            let mut resource = ResourceRecord::new(ResourceType::Dns, record.record_id.as_str())
                .with_metadata("domain", request.domain.as_str());
            if let Some(ref zone_id) = record.zone_id {
                resource = resource.with_metadata(ZONE_ID_KEY, zone_id.as_str());
            }
            self.record(ctx, resource);
        } else {
            tracing::info!(record = %record.record_id, "reusing existing DNS record");
        }
        Ok(())
    }

    async fn deploy(&self, ctx: &mut DeploymentContext) -> Result<(), DeploymentError> {
        let spec = loaded_spec(ctx)
            .ok_or_else(|| DeploymentError::deploy("no validated spec", "none"))?;

        let mut env = spec.resolved_env().map_err(|e| {
            DeploymentError::deploy(format!("cannot resolve environment: {e}"), e.to_string())
        })?;
        for (key, value) in ctx.secrets.expose() {
            env.insert(key.to_string(), value.to_string());
        }

        let request = DeployRequest {
            name: spec.name.clone(),
            fqdn: spec.domain.https_url(),
            template: spec.template.clone(),
            artifact: spec.artifact.clone(),
            env,
        };

        if ctx.dry_run {
            tracing::info!(name = %spec.name, domain = %spec.domain, "[dry run] would deploy");
            return Ok(());
        }

        let existing = self
            .hosting
            .find_application(&spec.name)
            .await
            .map_err(|e| deploy_failure("failed to look up existing application", e))?;

        match existing {
            Some(app) => {
                tracing::info!(uuid = %app.uuid, "redeploying existing application");
                ctx.coolify_uuid = Some(app.uuid.to_string());
                self.hosting
                    .update_application(&app, &request)
                    .await
                    .map_err(|e| deploy_failure("failed to update application", e))?;
                self.hosting
                    .configure_environment(&app, &request.env)
                    .await
                    .map_err(|e| deploy_failure("failed to configure environment", e))?;
                self.hosting
                    .start_deployment(&app)
                    .await
                    .map_err(|e| deploy_failure("failed to start deployment", e))?;
                ctx.deploy_status = Some(DeployStatus::Redeployed);
            }
            None => {
                tracing::info!(name = %spec.name, "creating application");
                let app = self
                    .hosting
                    .create_application(&request)
                    .await
                    .map_err(|e| deploy_failure("failed to create application", e))?;
                ctx.coolify_uuid = Some(app.uuid.to_string());
                self.record(
                    ctx,
                    ResourceRecord::new(ResourceType::Hosting, app.uuid.as_str())
                        .with_metadata("name", spec.name.as_str()),
                );
                self.hosting
                    .configure_environment(&app, &request.env)
                    .await
                    .map_err(|e| deploy_failure("failed to configure environment", e))?;
                self.hosting
                    .start_deployment(&app)
                    .await
                    .map_err(|e| deploy_failure("failed to start deployment", e))?;
                ctx.deploy_status = Some(DeployStatus::Created);
            }
        }
        Ok(())
    }

    async fn verify(&self, ctx: &mut DeploymentContext) -> Result<(), DeploymentError> {
        let spec = loaded_spec(ctx)
            .ok_or_else(|| DeploymentError::verification("no validated spec", "health"))?;
        ctx.deployed_url = Some(spec.domain.https_url());

        let url = spec.healthcheck_url();
        if ctx.dry_run {
            tracing::info!(%url, "[dry run] would verify deployment");
            return Ok(());
        }

        self.verifier.verify(&url).await.map_err(|e| {
            DeploymentError::verification(
                format!("verification failed for {url}: {e}"),
                e.check_type().unwrap_or("health"),
            )
        })
    }
}

fn loaded_spec(ctx: &DeploymentContext) -> Option<Spec> {
    ctx.spec.clone()
}

fn deploy_failure(action: &str, err: ProviderError) -> DeploymentError {
    DeploymentError::deploy(format!("{action}: {err}"), err.platform_detail())
}

/// Validators are expected to fail with `Validation`; anything else is re-tagged.
fn as_validation_error(err: DeploymentError) -> DeploymentError {
    match err {
        DeploymentError::Validation { .. } | DeploymentError::InvalidStateTransition { .. } => err,
        other => DeploymentError::validation(other.to_string(), "spec"),
    }
}
