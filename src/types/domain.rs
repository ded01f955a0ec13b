// ABOUTME: Public domain name validation for deployment targets.
// ABOUTME: Rejects loopback names, raw IPs, and reserved TLDs before any request is made.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

const BLOCKED_HOSTNAMES: [&str; 4] = [
    "localhost",
    "localhost.localdomain",
    "ip6-localhost",
    "ip6-loopback",
];

const RESERVED_TLDS: [&str; 4] = [".local", ".internal", ".test", ".invalid"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("blocked hostname: {0}")]
    Blocked(String),

    #[error("raw IP addresses not allowed, use a domain: {0}")]
    RawIp(String),

    #[error("invalid domain format: {0}")]
    InvalidFormat(String),

    #[error("internal/reserved TLD not allowed: {0}")]
    ReservedTld(String),
}

/// A lowercase, publicly routable domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain(String);

impl Domain {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let domain = input.trim().to_ascii_lowercase();

        if BLOCKED_HOSTNAMES.contains(&domain.as_str()) {
            return Err(DomainError::Blocked(input.to_string()));
        }

        if domain.parse::<IpAddr>().is_ok() {
            return Err(DomainError::RawIp(input.to_string()));
        }

        if !has_valid_labels(&domain) {
            return Err(DomainError::InvalidFormat(input.to_string()));
        }

        if RESERVED_TLDS.iter().any(|tld| domain.ends_with(tld)) {
            return Err(DomainError::ReservedTld(input.to_string()));
        }

        Ok(Self(domain))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `https://` origin for this domain.
    pub fn https_url(&self) -> String {
        format!("https://{}", self.0)
    }
}

/// At least two labels; each 1-63 chars of `[a-z0-9-]` without edge hyphens;
/// the last label alphabetic and at least two chars long.
fn has_valid_labels(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let valid_label = |label: &str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    };

    let (tld, rest) = match labels.split_last() {
        Some(split) => split,
        None => return false,
    };

    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_lowercase()) && rest.iter().all(|l| valid_label(l))
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Domain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Domain::parse(&s).map_err(serde::de::Error::custom)
    }
}
