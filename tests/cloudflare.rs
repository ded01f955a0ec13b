// ABOUTME: Integration tests for the Cloudflare DNS adapter against a mock HTTP server.
// ABOUTME: Covers zone lookup, record upsert semantics, API error envelopes, and teardown.

use fabrik::provider::{CloudflareDns, DnsProvisioner, DnsRequest, ProviderError};
use fabrik::spec::DnsRecordType;
use fabrik::types::{DnsRecordId, Domain, ZoneId};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dns(server: &MockServer) -> CloudflareDns {
    CloudflareDns::with_base_url(&server.uri(), "cf-token").unwrap()
}

fn request() -> DnsRequest {
    DnsRequest {
        domain: Domain::parse("api.example.com").unwrap(),
        target: "203.0.113.10".to_string(),
        record_type: DnsRecordType::A,
        proxied: true,
    }
}

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "result": result
    }))
}

/// `api.example.com` has no zone of its own; `example.com` is zone-1.
async fn mount_zones(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(query_param("name", "api.example.com"))
        .respond_with(ok(json!([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(query_param("name", "example.com"))
        .respond_with(ok(json!([{ "id": "zone-1" }])))
        .mount(server)
        .await;
}

async fn mount_existing(server: &MockServer, records: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/zones/zone-1/dns_records"))
        .and(query_param("type", "A"))
        .and(query_param("name", "api.example.com"))
        .respond_with(ok(records))
        .mount(server)
        .await;
}

mod provision {
    use super::*;

    #[tokio::test]
    async fn creates_record_in_enclosing_zone() {
        let server = MockServer::start().await;
        mount_zones(&server).await;
        mount_existing(&server, json!([])).await;
        Mock::given(method("POST"))
            .and(path("/zones/zone-1/dns_records"))
            .and(body_partial_json(json!({
                "type": "A",
                "name": "api.example.com",
                "content": "203.0.113.10",
                "ttl": 1,
                "proxied": true
            })))
            .respond_with(ok(json!({ "id": "rec-9", "content": "203.0.113.10", "proxied": true })))
            .expect(1)
            .mount(&server)
            .await;

        let record = dns(&server).provision(&request()).await.unwrap();

        assert!(record.created);
        assert_eq!(record.record_id.as_str(), "rec-9");
        assert_eq!(record.zone_id.as_ref().map(|z| z.as_str()), Some("zone-1"));
    }

    #[tokio::test]
    async fn matching_record_is_reused_untouched() {
        let server = MockServer::start().await;
        mount_zones(&server).await;
        mount_existing(
            &server,
            json!([{ "id": "rec-1", "content": "203.0.113.10", "proxied": true }]),
        )
        .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let record = dns(&server).provision(&request()).await.unwrap();

        assert!(!record.created);
        assert_eq!(record.record_id.as_str(), "rec-1");
    }

    #[tokio::test]
    async fn stale_record_is_updated_in_place() {
        let server = MockServer::start().await;
        mount_zones(&server).await;
        mount_existing(
            &server,
            json!([{ "id": "rec-1", "content": "198.51.100.1", "proxied": true }]),
        )
        .await;
        Mock::given(method("PUT"))
            .and(path("/zones/zone-1/dns_records/rec-1"))
            .and(body_partial_json(json!({ "content": "203.0.113.10" })))
            .respond_with(ok(json!({ "id": "rec-1", "content": "203.0.113.10", "proxied": true })))
            .expect(1)
            .mount(&server)
            .await;

        let record = dns(&server).provision(&request()).await.unwrap();

        assert!(!record.created);
        assert_eq!(record.record_id.as_str(), "rec-1");
    }

    #[tokio::test]
    async fn unknown_zone_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ok(json!([])))
            .mount(&server)
            .await;

        let err = dns(&server).provision(&request()).await.unwrap_err();
        assert!(err.to_string().contains("zone not found"));
    }

    #[tokio::test]
    async fn api_errors_are_surfaced() {
        let server = MockServer::start().await;
        mount_zones(&server).await;
        mount_existing(&server, json!([])).await;
        Mock::given(method("POST"))
            .and(path("/zones/zone-1/dns_records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 81057, "message": "Record already exists." }],
                "result": null
            })))
            .mount(&server)
            .await;

        let err = dns(&server).provision(&request()).await.unwrap_err();
        match err {
            ProviderError::Api { message, .. } => assert_eq!(message, "Record already exists."),
            other => panic!("expected api error, got {other:?}"),
        }
    }
}

mod teardown {
    use super::*;

    #[tokio::test]
    async fn deletes_record_in_zone() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/zones/zone-1/dns_records/rec-1"))
            .respond_with(ok(json!({ "id": "rec-1" })))
            .expect(1)
            .mount(&server)
            .await;

        dns(&server)
            .teardown(&DnsRecordId::new("rec-1"), Some(&ZoneId::new("zone-1")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_record_counts_as_deleted() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/zones/zone-1/dns_records/rec-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        dns(&server)
            .teardown(&DnsRecordId::new("rec-1"), Some(&ZoneId::new("zone-1")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn zone_is_required() {
        let server = MockServer::start().await;
        let err = dns(&server)
            .teardown(&DnsRecordId::new("rec-1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingConfig { .. }));
    }
}
