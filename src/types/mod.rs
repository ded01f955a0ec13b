// ABOUTME: Validated domain types and phantom-typed resource identifiers.
// ABOUTME: Construction fails fast so invalid names never reach a collaborator.

mod app_name;
mod domain;
mod id;

pub use app_name::{AppName, AppNameError};
pub use domain::{Domain, DomainError};
pub use id::{AppUuid, DnsRecordId, Id, MonitorId, ZoneId};
