// ABOUTME: Cloudflare v4 DNS adapter implementing the DNS provisioner trait.
// ABOUTME: Records are upserted by (type, name); only freshly created records are reported as created.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use super::error::ProviderError;
use super::{DnsProvisioner, DnsRequest, ProvisionedRecord};
use crate::types::{DnsRecordId, ZoneId};

pub const CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Cloudflare's "automatic" TTL.
const AUTO_TTL: u32 = 1;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    proxied: bool,
}

#[derive(Debug, Clone)]
pub struct CloudflareDns {
    client: Client,
    base_url: String,
    token: String,
}

impl CloudflareDns {
    pub fn new(token: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_base_url(CLOUDFLARE_API_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ProviderError::Request {
                operation: "build cloudflare client".to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "cloudflare request");
        self.client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
    }

    /// Send a request and unwrap the `{success, errors, result}` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<Option<T>, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                operation: operation.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> =
            response
                .json()
                .await
                .map_err(|source| ProviderError::Request {
                    operation: operation.to_string(),
                    source,
                })?;

        if !envelope.success {
            let message = envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProviderError::Api {
                operation: operation.to_string(),
                message,
            });
        }
        Ok(envelope.result)
    }

    /// Zone for the closest enclosing registered domain.
    async fn find_zone(&self, domain: &str) -> Result<ZoneId, ProviderError> {
        let labels: Vec<&str> = domain.split('.').collect();
        for start in 0..labels.len().saturating_sub(1) {
            let candidate = labels[start..].join(".");
            let zones: Vec<Zone> = self
                .call(
                    "list zones",
                    self.request(Method::GET, "/zones")
                        .query(&[("name", candidate.as_str())]),
                )
                .await?
                .unwrap_or_default();
            if let Some(zone) = zones.into_iter().next() {
                tracing::debug!(domain, zone = %candidate, "resolved dns zone");
                return Ok(ZoneId::new(zone.id));
            }
        }

        Err(ProviderError::Api {
            operation: "list zones".to_string(),
            message: format!("zone not found for domain: {domain}"),
        })
    }
}

#[async_trait]
impl DnsProvisioner for CloudflareDns {
    async fn provision(&self, request: &DnsRequest) -> Result<ProvisionedRecord, ProviderError> {
        let name = request.domain.as_str();
        let zone_id = self.find_zone(name).await?;
        let records_path = format!("/zones/{zone_id}/dns_records");
        let record_type = request.record_type.as_str();

        let existing: Vec<DnsRecord> = self
            .call(
                "list dns records",
                self.request(Method::GET, &records_path)
                    .query(&[("type", record_type), ("name", name)]),
            )
            .await?
            .unwrap_or_default();

        let body = json!({
            "type": record_type,
            "name": name,
            "content": request.target,
            "ttl": AUTO_TTL,
            "proxied": request.proxied,
        });

        if let Some(record) = existing.into_iter().next() {
            if record.content != request.target || record.proxied != request.proxied {
                self.call::<DnsRecord>(
                    "update dns record",
                    self.request(Method::PUT, &format!("{records_path}/{}", record.id))
                        .json(&body),
                )
                .await?;
                tracing::info!(name, record = %record.id, "dns record updated");
            } else {
                tracing::info!(name, record = %record.id, "dns record unchanged");
            }
            return Ok(ProvisionedRecord {
                record_id: DnsRecordId::new(record.id),
                zone_id: Some(zone_id),
                created: false,
            });
        }

        let operation = "create dns record";
        let created: DnsRecord = self
            .call(operation, self.request(Method::POST, &records_path).json(&body))
            .await?
            .ok_or_else(|| ProviderError::MissingField {
                operation: operation.to_string(),
                field: "result".to_string(),
            })?;
        tracing::info!(name, record = %created.id, "dns record created");

        Ok(ProvisionedRecord {
            record_id: DnsRecordId::new(created.id),
            zone_id: Some(zone_id),
            created: true,
        })
    }

    async fn teardown(
        &self,
        record_id: &DnsRecordId,
        zone_id: Option<&ZoneId>,
    ) -> Result<(), ProviderError> {
        let zone_id = zone_id.ok_or_else(|| ProviderError::MissingConfig {
            setting: format!("zone id for dns record {record_id}"),
        })?;

        let result = self
            .call::<serde_json::Value>(
                "delete dns record",
                self.request(
                    Method::DELETE,
                    &format!("/zones/{zone_id}/dns_records/{record_id}"),
                ),
            )
            .await;

        match result {
            Ok(_) => {
                tracing::info!(record = %record_id, "dns record deleted");
                Ok(())
            }
            Err(ProviderError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                tracing::info!(record = %record_id, "dns record already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
