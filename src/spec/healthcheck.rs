// ABOUTME: Health check and DNS sections of the spec document.
// ABOUTME: Both are optional; defaults match what the verifier and provisioner expect.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

pub const DEFAULT_HEALTHCHECK_PATH: &str = "/health";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthcheckSpec {
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for HealthcheckSpec {
    fn default() -> Self {
        Self {
            path: default_path(),
        }
    }
}

fn default_path() -> String {
    DEFAULT_HEALTHCHECK_PATH.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsSpec {
    /// Address or hostname the record points at. Falls back to the operator default.
    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub record_type: Option<DnsRecordType>,

    #[serde(default = "default_proxied")]
    pub proxied: bool,
}

fn default_proxied() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    A,
    Aaaa,
    Cname,
}

impl DnsRecordType {
    /// Infer the record type from what the record points at.
    pub fn for_target(target: &str) -> Self {
        match target.parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => DnsRecordType::A,
            Ok(IpAddr::V6(_)) => DnsRecordType::Aaaa,
            Err(_) => DnsRecordType::Cname,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DnsRecordType::A => "A",
            DnsRecordType::Aaaa => "AAAA",
            DnsRecordType::Cname => "CNAME",
        }
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
