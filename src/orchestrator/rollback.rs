// ABOUTME: Compensating rollback: tears down recorded resources last-created-first.
// ABOUTME: Best-effort; a failed teardown is recorded and the loop moves on to the next record.

use chrono::Utc;

use super::context::{DeploymentContext, ResourceRecord, ResourceType, TeardownOutcome};
use super::error::DeploymentError;
use crate::provider::{DnsProvisioner, HostingDeployer, MonitorRegistrar};
use crate::types::{AppUuid, DnsRecordId, MonitorId, ZoneId};

/// Metadata key under which DNS records keep their zone.
pub const ZONE_ID_KEY: &str = "zone_id";

/// Teardown capabilities, one per resource type.
#[derive(Clone, Copy)]
pub struct Compensators<'a> {
    pub hosting: &'a dyn HostingDeployer,
    pub dns: Option<&'a dyn DnsProvisioner>,
    pub monitors: Option<&'a dyn MonitorRegistrar>,
}

/// What a rollback pass did.
#[derive(Debug, Default)]
pub struct RollbackReport {
    pub attempted: usize,
    pub failures: Vec<DeploymentError>,
}

impl RollbackReport {
    /// True when every teardown succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Tear down every record in `ctx.created_resources`, newest first.
///
/// Each attempt is stored on the context as a `TeardownOutcome`; the root
/// cause in `ctx.error` is left untouched.
pub async fn roll_back_resources(
    ctx: &mut DeploymentContext,
    compensators: Compensators<'_>,
) -> RollbackReport {
    let records: Vec<ResourceRecord> = ctx.created_resources().iter().rev().cloned().collect();
    tracing::info!(count = records.len(), "rolling back created resources");
    tear_down_all(ctx, records, compensators).await
}

/// Retry teardown of the records an earlier pass left live, newest first.
pub async fn roll_back_live(
    ctx: &mut DeploymentContext,
    compensators: Compensators<'_>,
) -> RollbackReport {
    let records: Vec<ResourceRecord> = ctx.live_resources().into_iter().rev().cloned().collect();
    tracing::info!(count = records.len(), "retrying teardown of live resources");
    tear_down_all(ctx, records, compensators).await
}

async fn tear_down_all(
    ctx: &mut DeploymentContext,
    records: Vec<ResourceRecord>,
    compensators: Compensators<'_>,
) -> RollbackReport {
    let mut report = RollbackReport::default();
    ctx.begin_rollback_pass();

    for record in records {
        report.attempted += 1;
        let result = teardown(&record, compensators).await;

        let error = match result {
            Ok(()) => {
                tracing::info!(
                    resource_type = %record.resource_type,
                    resource_id = %record.resource_id,
                    "rolled back"
                );
                None
            }
            Err(err) => {
                tracing::error!(
                    resource_type = %record.resource_type,
                    resource_id = %record.resource_id,
                    error = %err,
                    "rollback failed"
                );
                let message = err.to_string();
                report.failures.push(err);
                Some(message)
            }
        };

        ctx.record_teardown(TeardownOutcome {
            resource_type: record.resource_type,
            resource_id: record.resource_id.clone(),
            attempted_at: Utc::now(),
            error,
        });
    }

    report
}

async fn teardown(
    record: &ResourceRecord,
    compensators: Compensators<'_>,
) -> Result<(), DeploymentError> {
    let resource_type = record.resource_type;
    let fail = |detail: String| {
        DeploymentError::rollback(
            format!(
                "failed to tear down {} {}: {}",
                resource_type, record.resource_id, detail
            ),
            resource_type,
        )
    };

    match resource_type {
        ResourceType::Hosting => compensators
            .hosting
            .teardown(&AppUuid::new(record.resource_id.as_str()))
            .await
            .map_err(|e| fail(e.to_string())),
        ResourceType::Dns => {
            let dns = compensators
                .dns
                .ok_or_else(|| fail("no DNS provisioner configured".to_string()))?;
            let zone_id = record.metadata_str(ZONE_ID_KEY).map(ZoneId::new);
            dns.teardown(&DnsRecordId::new(record.resource_id.as_str()), zone_id.as_ref())
                .await
                .map_err(|e| fail(e.to_string()))
        }
        ResourceType::Monitor => {
            let monitors = compensators
                .monitors
                .ok_or_else(|| fail("no monitor registrar configured".to_string()))?;
            monitors
                .teardown(&MonitorId::new(record.resource_id.as_str()))
                .await
                .map_err(|e| fail(e.to_string()))
        }
    }
}
