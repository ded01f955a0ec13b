// ABOUTME: Coolify v4 REST adapter implementing the hosting deployer trait.
// ABOUTME: Applications are looked up by name, created from a container image, configured, and deleted by uuid.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

use super::error::ProviderError;
use super::{Application, DeployRequest, HostingDeployer};
use crate::types::{AppName, AppUuid};

const API_PREFIX: &str = "/api/v1";
const DEFAULT_ENVIRONMENT: &str = "production";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct RawApplication {
    uuid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    fqdn: Option<String>,
}

impl From<RawApplication> for Application {
    fn from(raw: RawApplication) -> Self {
        Application {
            uuid: AppUuid::new(raw.uuid),
            name: raw.name,
            url: raw.fqdn,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedApplication {
    uuid: Option<String>,
}

/// Client for one Coolify instance.
#[derive(Debug, Clone)]
pub struct CoolifyDeployer {
    client: Client,
    base_url: String,
    token: String,
    project_uuid: Option<String>,
    server_uuid: Option<String>,
    environment: String,
}

impl CoolifyDeployer {
    /// `base_url` may be given with or without the `/api/v1` suffix.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ProviderError::Request {
                operation: "build coolify client".to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
            token: token.into(),
            project_uuid: None,
            server_uuid: None,
            environment: DEFAULT_ENVIRONMENT.to_string(),
        })
    }

    /// Project and server new applications are created under.
    pub fn with_target(
        mut self,
        project_uuid: impl Into<String>,
        server_uuid: impl Into<String>,
    ) -> Self {
        self.project_uuid = Some(project_uuid.into());
        self.server_uuid = Some(server_uuid.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "coolify request");
        self.client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::ACCEPT, "application/json")
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, ProviderError> {
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
        Ok(response)
    }

    fn target(&self) -> Result<(&str, &str), ProviderError> {
        let project = self
            .project_uuid
            .as_deref()
            .ok_or_else(|| ProviderError::MissingConfig {
                setting: "coolify project_uuid".to_string(),
            })?;
        let server = self
            .server_uuid
            .as_deref()
            .ok_or_else(|| ProviderError::MissingConfig {
                setting: "coolify server_uuid".to_string(),
            })?;
        Ok((project, server))
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with(API_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{API_PREFIX}")
    }
}

#[async_trait]
impl HostingDeployer for CoolifyDeployer {
    async fn find_application(
        &self,
        name: &AppName,
    ) -> Result<Option<Application>, ProviderError> {
        let operation = "list applications";
        let response = self
            .send(operation, self.request(reqwest::Method::GET, "/applications"))
            .await?;
        let apps: Vec<RawApplication> =
            response
                .json()
                .await
                .map_err(|source| ProviderError::Request {
                    operation: operation.to_string(),
                    source,
                })?;

        let found = apps
            .into_iter()
            .find(|app| app.name == name.as_str())
            .map(Application::from);
        if let Some(ref app) = found {
            tracing::info!(name = %name, uuid = %app.uuid, "found existing application");
        }
        Ok(found)
    }

    async fn create_application(
        &self,
        request: &DeployRequest,
    ) -> Result<Application, ProviderError> {
        let operation = "create application";
        let image = request
            .artifact
            .as_deref()
            .ok_or_else(|| ProviderError::MissingConfig {
                setting: "artifact".to_string(),
            })?;
        let (project_uuid, server_uuid) = self.target()?;

        let payload = json!({
            "project_uuid": project_uuid,
            "server_uuid": server_uuid,
            "environment_name": self.environment,
            "name": request.name.as_str(),
            "description": format!("template: {}", request.template),
            "docker_registry_image_name": image,
            "domains": request.fqdn,
            "instant_deploy": false,
        });

        let response = self
            .send(
                operation,
                self.request(reqwest::Method::POST, "/applications/dockerimage")
                    .json(&payload),
            )
            .await?;
        let created: CreatedApplication =
            response
                .json()
                .await
                .map_err(|source| ProviderError::Request {
                    operation: operation.to_string(),
                    source,
                })?;
        let uuid = created.uuid.ok_or_else(|| ProviderError::MissingField {
            operation: operation.to_string(),
            field: "uuid".to_string(),
        })?;

        let app = Application {
            uuid: AppUuid::new(uuid),
            name: request.name.as_str().to_string(),
            url: Some(request.fqdn.clone()),
        };
        tracing::info!(name = %request.name, uuid = %app.uuid, "application created");
        Ok(app)
    }

    async fn update_application(
        &self,
        app: &Application,
        request: &DeployRequest,
    ) -> Result<(), ProviderError> {
        let mut payload = json!({ "domains": request.fqdn });
        if let Some(ref image) = request.artifact {
            payload["docker_registry_image_name"] = json!(image);
        }

        self.send(
            "update application",
            self.request(reqwest::Method::PATCH, &format!("/applications/{}", app.uuid))
                .json(&payload),
        )
        .await?;
        tracing::info!(uuid = %app.uuid, "application updated");
        Ok(())
    }

    async fn configure_environment(
        &self,
        app: &Application,
        env: &BTreeMap<String, String>,
    ) -> Result<(), ProviderError> {
        if env.is_empty() {
            return Ok(());
        }

        let data: Vec<_> = env
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();
        let request = self
            .request(
                reqwest::Method::PATCH,
                &format!("/applications/{}/envs/bulk", app.uuid),
            )
            .json(&json!({ "data": data }));
        self.send("update environment", request).await?;
        tracing::debug!(app = %app.uuid, count = env.len(), "environment updated");
        Ok(())
    }

    async fn start_deployment(&self, app: &Application) -> Result<(), ProviderError> {
        self.send(
            "start deployment",
            self.request(
                reqwest::Method::POST,
                &format!("/applications/{}/deploy", app.uuid),
            ),
        )
        .await?;
        tracing::info!(uuid = %app.uuid, "deployment started");
        Ok(())
    }

    async fn teardown(&self, app_uuid: &AppUuid) -> Result<(), ProviderError> {
        let result = self
            .send(
                "delete application",
                self.request(reqwest::Method::DELETE, &format!("/applications/{app_uuid}")),
            )
            .await;

        match result {
            Ok(_) => {
                tracing::info!(uuid = %app_uuid, "application deleted");
                Ok(())
            }
            Err(ProviderError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                tracing::info!(uuid = %app_uuid, "application already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
