// ABOUTME: Integration tests for the deployment driver against recording fakes.
// ABOUTME: Covers the happy path, redeploys, rollback triggers, dry runs, and mid-run persistence.

mod support;

use fabrik::orchestrator::{
    ContextStore, DeployStatus, DeploymentState, Orchestrator, ResourceType,
};
use support::{
    CallLog, FakeDns, FakeHosting, FakeMonitors, FakeValidator, FakeVerifier, validated,
};

use DeploymentState::*;

const DNS_TARGET: &str = "203.0.113.10";

fn orchestrator(log: &CallLog, hosting: FakeHosting, verifier: FakeVerifier) -> Orchestrator {
    Orchestrator::new(
        Box::new(FakeValidator::ok(log, validated("my-api", "api.example.com"))),
        Box::new(hosting),
        Box::new(verifier),
    )
    .with_dns_target(DNS_TARGET)
}

fn resource_types(ctx: &fabrik::orchestrator::DeploymentContext) -> Vec<ResourceType> {
    ctx.created_resources()
        .iter()
        .map(|r| r.resource_type)
        .collect()
}

mod success {
    use super::*;

    #[tokio::test]
    async fn new_application_is_created() {
        support::init_tracing();
        let log = CallLog::default();
        let orch = orchestrator(&log, FakeHosting::new(&log), FakeVerifier::new(&log))
            .with_dns(Box::new(FakeDns::new(&log)));

        let ctx = orch.run("specs/my-api.yaml", false).await.unwrap();

        assert_eq!(
            ctx.state_history(),
            &[Pending, Validating, Provisioning, Deploying, Verifying, Complete]
        );
        assert_eq!(ctx.deploy_status, Some(DeployStatus::Created));
        assert_eq!(ctx.coolify_uuid.as_deref(), Some("app-1"));
        assert_eq!(ctx.dns_record_id.as_deref(), Some("rec-1"));
        assert_eq!(ctx.deployed_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(
            resource_types(&ctx),
            vec![ResourceType::Dns, ResourceType::Hosting]
        );
        assert!(ctx.error().is_none());
        assert_eq!(
            log.calls(),
            vec![
                "validate:specs/my-api.yaml",
                "dns.provision:api.example.com",
                "hosting.find:my-api",
                "hosting.create:my-api",
                "hosting.env:app-1:0",
                "hosting.start:app-1",
                "verify:https://api.example.com/health",
            ]
        );
    }

    #[tokio::test]
    async fn existing_application_is_redeployed() {
        let log = CallLog::default();
        let hosting = FakeHosting::with_existing(&log, "app-existing", "my-api");
        let orch = orchestrator(&log, hosting, FakeVerifier::new(&log));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(ctx.state(), Complete);
        assert_eq!(ctx.deploy_status, Some(DeployStatus::Redeployed));
        assert_eq!(ctx.coolify_uuid.as_deref(), Some("app-existing"));
        assert!(log.matching("hosting.create").is_empty());
        assert_eq!(
            log.matching("hosting."),
            vec![
                "hosting.find:my-api",
                "hosting.update:app-existing",
                "hosting.env:app-existing:0",
                "hosting.start:app-existing",
            ]
        );
        assert!(
            ctx.resources_by_type(ResourceType::Hosting).is_empty(),
            "a redeployed application must never be scheduled for teardown"
        );
    }

    #[tokio::test]
    async fn complete_run_reports_all_resources_live() {
        let log = CallLog::default();
        let orch = orchestrator(&log, FakeHosting::new(&log), FakeVerifier::new(&log))
            .with_dns(Box::new(FakeDns::new(&log)));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();
        assert_eq!(ctx.live_resources().len(), 2);
    }

    #[tokio::test]
    async fn monitor_is_registered_after_dns() {
        let log = CallLog::default();
        let orch = orchestrator(&log, FakeHosting::new(&log), FakeVerifier::new(&log))
            .with_dns(Box::new(FakeDns::new(&log)))
            .with_monitors(Box::new(FakeMonitors::new(&log)));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(ctx.monitor_id.as_deref(), Some("mon-1"));
        assert_eq!(
            resource_types(&ctx),
            vec![ResourceType::Dns, ResourceType::Monitor, ResourceType::Hosting]
        );
        assert_eq!(
            log.matching("monitor."),
            vec!["monitor.register:my-api:https://api.example.com/health"]
        );
    }

    #[tokio::test]
    async fn dns_is_skipped_without_target() {
        let log = CallLog::default();
        let orch = Orchestrator::new(
            Box::new(FakeValidator::ok(&log, validated("my-api", "api.example.com"))),
            Box::new(FakeHosting::new(&log)),
            Box::new(FakeVerifier::new(&log)),
        )
        .with_dns(Box::new(FakeDns::new(&log)));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(ctx.state(), Complete);
        assert!(log.matching("dns.").is_empty());
        assert!(ctx.warnings.iter().any(|w| w.contains("no DNS target")));
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn validation_failure_never_rolls_back() {
        let log = CallLog::default();
        let orch = Orchestrator::new(
            Box::new(FakeValidator::failing(&log, "missing required field: domain", "domain")),
            Box::new(FakeHosting::new(&log)),
            Box::new(FakeVerifier::new(&log)),
        )
        .with_dns(Box::new(FakeDns::new(&log)))
        .with_dns_target(DNS_TARGET);

        let ctx = orch.run("bad.yaml", false).await.unwrap();

        assert_eq!(ctx.state_history(), &[Pending, Validating, Failed]);
        assert_eq!(ctx.error(), Some("missing required field: domain"));
        assert_eq!(ctx.error_step(), Some("validation"));
        assert_eq!(log.calls(), vec!["validate:bad.yaml"]);
    }

    #[tokio::test]
    async fn deploy_failure_rolls_back_dns() {
        let log = CallLog::default();
        let hosting = FakeHosting {
            fail_create: true,
            ..FakeHosting::new(&log)
        };
        let orch = orchestrator(&log, hosting, FakeVerifier::new(&log))
            .with_dns(Box::new(FakeDns::new(&log)));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(
            ctx.state_history(),
            &[Pending, Validating, Provisioning, Deploying, RollingBack, RolledBack]
        );
        assert_eq!(ctx.error_step(), Some("deploying"));
        assert!(ctx.error().unwrap().contains("failed to create application"));
        assert_eq!(log.matching("dns.teardown"), vec!["dns.teardown:rec-1@zone-1"]);
        assert!(ctx.rollback_errors().is_empty());
        assert!(ctx.live_resources().is_empty());
    }

    #[tokio::test]
    async fn failed_dns_teardown_keeps_deploy_as_root_cause() {
        let log = CallLog::default();
        let hosting = FakeHosting {
            fail_create: true,
            ..FakeHosting::new(&log)
        };
        let dns = FakeDns {
            fail_teardown: true,
            ..FakeDns::new(&log)
        };
        let orch = orchestrator(&log, hosting, FakeVerifier::new(&log)).with_dns(Box::new(dns));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(
            ctx.state_history(),
            &[Pending, Validating, Provisioning, Deploying, RollingBack, Failed]
        );
        assert_eq!(ctx.error_step(), Some("deploying"));
        assert!(ctx.error().unwrap().contains("failed to create application"));
        assert_eq!(ctx.rollback_errors().len(), 1);
        let live: Vec<_> = ctx.live_resources().iter().map(|r| r.resource_id.clone()).collect();
        assert_eq!(live, vec!["rec-1"]);
    }

    #[tokio::test]
    async fn failure_without_created_resources_goes_straight_to_failed() {
        let log = CallLog::default();
        let hosting = FakeHosting {
            fail_create: true,
            ..FakeHosting::new(&log)
        };
        let orch = orchestrator(&log, hosting, FakeVerifier::new(&log));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(
            ctx.state_history(),
            &[Pending, Validating, Provisioning, Deploying, Failed]
        );
        assert_eq!(ctx.error_step(), Some("deploying"));
    }

    #[tokio::test]
    async fn verification_failure_tears_down_in_reverse_order() {
        let log = CallLog::default();
        let orch = orchestrator(&log, FakeHosting::new(&log), FakeVerifier::failing(&log))
            .with_dns(Box::new(FakeDns::new(&log)))
            .with_monitors(Box::new(FakeMonitors::new(&log)));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(ctx.state(), RolledBack);
        assert_eq!(ctx.error_step(), Some("verifying"));
        let teardowns: Vec<_> = log
            .calls()
            .into_iter()
            .filter(|c| c.contains(".teardown:"))
            .collect();
        assert_eq!(
            teardowns,
            vec![
                "hosting.teardown:app-1",
                "monitor.teardown:mon-1",
                "dns.teardown:rec-1@zone-1",
            ]
        );
    }

    #[tokio::test]
    async fn start_failure_after_create_tears_down_the_new_app() {
        let log = CallLog::default();
        let hosting = FakeHosting {
            fail_start: true,
            ..FakeHosting::new(&log)
        };
        let orch = orchestrator(&log, hosting, FakeVerifier::new(&log));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(ctx.state(), RolledBack);
        assert_eq!(log.matching("hosting.teardown"), vec!["hosting.teardown:app-1"]);
    }

    #[tokio::test]
    async fn env_failure_after_create_tears_down_the_new_app() {
        let log = CallLog::default();
        let hosting = FakeHosting {
            fail_configure: true,
            ..FakeHosting::new(&log)
        };
        let orch = orchestrator(&log, hosting, FakeVerifier::new(&log));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(ctx.state(), RolledBack);
        assert_eq!(resource_types(&ctx), vec![ResourceType::Hosting]);
        assert!(ctx.error().unwrap().contains("failed to configure environment"));
        assert!(log.matching("hosting.start").is_empty());
        assert_eq!(log.matching("hosting.teardown"), vec!["hosting.teardown:app-1"]);
    }

    #[tokio::test]
    async fn lookup_failure_is_a_deploy_error_not_a_create() {
        let log = CallLog::default();
        let hosting = FakeHosting {
            fail_find: true,
            ..FakeHosting::new(&log)
        };
        let orch = orchestrator(&log, hosting, FakeVerifier::new(&log));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(ctx.state(), Failed);
        assert_eq!(ctx.error_step(), Some("deploying"));
        assert!(log.matching("hosting.create").is_empty());
    }

    #[tokio::test]
    async fn reused_dns_record_is_never_deleted() {
        let log = CallLog::default();
        let hosting = FakeHosting {
            fail_create: true,
            ..FakeHosting::new(&log)
        };
        let dns = FakeDns {
            reuse_existing: true,
            ..FakeDns::new(&log)
        };
        let orch = orchestrator(&log, hosting, FakeVerifier::new(&log)).with_dns(Box::new(dns));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(ctx.state(), Failed);
        assert_eq!(ctx.dns_record_id.as_deref(), Some("rec-1"));
        assert!(ctx.created_resources().is_empty());
        assert!(log.matching("dns.teardown").is_empty());
    }

    #[tokio::test]
    async fn dns_failure_is_a_provisioning_error() {
        let log = CallLog::default();
        let dns = FakeDns {
            fail_provision: true,
            ..FakeDns::new(&log)
        };
        let orch = orchestrator(&log, FakeHosting::new(&log), FakeVerifier::new(&log))
            .with_dns(Box::new(dns));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(ctx.state_history(), &[Pending, Validating, Provisioning, Failed]);
        assert_eq!(ctx.error_step(), Some("provisioning"));
        assert!(log.matching("hosting.").is_empty());
    }
}

mod dry_run {
    use super::*;

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let log = CallLog::default();
        let orch = orchestrator(&log, FakeHosting::new(&log), FakeVerifier::new(&log))
            .with_dns(Box::new(FakeDns::new(&log)))
            .with_monitors(Box::new(FakeMonitors::new(&log)));

        let ctx = orch.run("my-api.yaml", true).await.unwrap();

        assert_eq!(ctx.state(), Complete);
        assert!(ctx.dry_run);
        assert!(ctx.created_resources().is_empty());
        assert_eq!(ctx.deployed_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(log.calls(), vec!["validate:my-api.yaml"]);
    }
}

mod persistence {
    use super::*;
    use async_trait::async_trait;
    use fabrik::orchestrator::{DeploymentContext, ResourceRecord};
    use fabrik::provider::{Application, DeployRequest, HostingDeployer, ProviderError};
    use fabrik::types::{AppName, AppUuid};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Arc;

    /// Reads the stored snapshot at the moment the application is created.
    struct SnapshotOnCreate {
        inner: FakeHosting,
        store: ContextStore,
        seen: Arc<Mutex<Option<DeploymentContext>>>,
    }

    #[async_trait]
    impl HostingDeployer for SnapshotOnCreate {
        async fn find_application(
            &self,
            name: &AppName,
        ) -> Result<Option<Application>, ProviderError> {
            self.inner.find_application(name).await
        }

        async fn create_application(
            &self,
            request: &DeployRequest,
        ) -> Result<Application, ProviderError> {
            let snapshot = self.store.load(Path::new("my-api.yaml")).unwrap();
            *self.seen.lock() = snapshot;
            self.inner.create_application(request).await
        }

        async fn update_application(
            &self,
            app: &Application,
            request: &DeployRequest,
        ) -> Result<(), ProviderError> {
            self.inner.update_application(app, request).await
        }

        async fn configure_environment(
            &self,
            app: &Application,
            env: &BTreeMap<String, String>,
        ) -> Result<(), ProviderError> {
            self.inner.configure_environment(app, env).await
        }

        async fn start_deployment(&self, app: &Application) -> Result<(), ProviderError> {
            self.inner.start_deployment(app).await
        }

        async fn teardown(&self, app_uuid: &AppUuid) -> Result<(), ProviderError> {
            self.inner.teardown(app_uuid).await
        }
    }

    #[tokio::test]
    async fn snapshot_is_current_before_the_app_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path());
        let seen = Arc::new(Mutex::new(None));
        let log = CallLog::default();
        let hosting = SnapshotOnCreate {
            inner: FakeHosting::new(&log),
            store: store.clone(),
            seen: Arc::clone(&seen),
        };
        let orch = Orchestrator::new(
            Box::new(FakeValidator::ok(&log, validated("my-api", "api.example.com"))),
            Box::new(hosting),
            Box::new(FakeVerifier::new(&log)),
        )
        .with_dns(Box::new(FakeDns::new(&log)))
        .with_dns_target(DNS_TARGET)
        .with_store(store);

        let ctx = orch.run("my-api.yaml", false).await.unwrap();
        assert_eq!(ctx.state(), Complete);

        let snapshot = seen.lock().take().expect("snapshot should exist mid-run");
        assert_eq!(snapshot.state(), Deploying);
        let dns: Vec<&ResourceRecord> = snapshot.resources_by_type(ResourceType::Dns);
        assert_eq!(dns.len(), 1);
        assert_eq!(dns[0].resource_id, "rec-1");
        assert!(snapshot.resources_by_type(ResourceType::Hosting).is_empty());
    }

    #[tokio::test]
    async fn dry_run_leaves_previous_snapshot_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path());
        let log = CallLog::default();
        let hosting = FakeHosting {
            fail_create: true,
            ..FakeHosting::new(&log)
        };
        let dns = FakeDns {
            fail_teardown: true,
            ..FakeDns::new(&log)
        };
        let failed = orchestrator(&log, hosting, FakeVerifier::new(&log))
            .with_dns(Box::new(dns))
            .with_store(store.clone())
            .run("my-api.yaml", false)
            .await
            .unwrap();
        assert_eq!(failed.state(), Failed);

        let planned = orchestrator(&log, FakeHosting::new(&log), FakeVerifier::new(&log))
            .with_dns(Box::new(FakeDns::new(&log)))
            .with_store(store.clone())
            .run("my-api.yaml", true)
            .await
            .unwrap();
        assert_eq!(planned.state(), Complete);

        let loaded = store.load(Path::new("my-api.yaml")).unwrap().unwrap();
        assert_eq!(loaded.state(), Failed);
        assert!(!loaded.dry_run);
        assert!(loaded.has_unresolved_resources());
        assert_eq!(loaded.live_resources().len(), 1);
    }

    #[tokio::test]
    async fn final_context_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path());
        let log = CallLog::default();
        let orch = orchestrator(&log, FakeHosting::new(&log), FakeVerifier::new(&log))
            .with_dns(Box::new(FakeDns::new(&log)))
            .with_store(store.clone());

        let ctx = orch.run("specs/my-api.yaml", false).await.unwrap();
        let loaded = store
            .load(std::path::Path::new("specs/my-api.yaml"))
            .unwrap()
            .expect("snapshot should exist");

        assert_eq!(loaded.state(), Complete);
        assert_eq!(loaded.state_history(), ctx.state_history());
        assert_eq!(loaded.created_resources(), ctx.created_resources());
        assert_eq!(loaded.spec_hash, ctx.spec_hash);
    }

    #[tokio::test]
    async fn unwritable_store_becomes_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let log = CallLog::default();
        let orch = orchestrator(&log, FakeHosting::new(&log), FakeVerifier::new(&log))
            .with_store(ContextStore::new(&blocker));

        let ctx = orch.run("my-api.yaml", false).await.unwrap();

        assert_eq!(ctx.state(), Complete);
        assert!(
            ctx.warnings
                .iter()
                .any(|w| w.contains("failed to persist deployment state"))
        );
    }
}
