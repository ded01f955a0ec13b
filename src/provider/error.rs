// ABOUTME: Adapter-level error shared by every collaborator implementation.
// ABOUTME: The orchestrator maps these onto the deployment taxonomy per pipeline step.

use snafu::Snafu;

/// Failure of a single collaborator call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    #[snafu(display("{operation} request failed: {source}"))]
    Request {
        operation: String,
        source: reqwest::Error,
    },

    #[snafu(display("{operation} returned HTTP {status}: {body}"))]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[snafu(display("{operation} response missing {field}"))]
    MissingField { operation: String, field: String },

    #[snafu(display("{operation} rejected by API: {message}"))]
    Api { operation: String, message: String },

    #[snafu(display("{check} check failed after {attempts} attempt(s): {detail}"))]
    Unhealthy {
        check: String,
        attempts: u32,
        detail: String,
    },

    #[snafu(display("only https:// URLs may be checked: {url}"))]
    InsecureUrl { url: String },

    #[snafu(display("missing configuration: {setting}"))]
    MissingConfig { setting: String },

    #[snafu(display("{message}"))]
    Unavailable { message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The request never produced a usable response.
    Transport,
    /// The API answered with an error status or an error payload.
    Rejected,
    /// The API answered 404.
    NotFound,
    /// The response did not have the expected shape.
    MalformedResponse,
    /// A health check did not pass.
    Unhealthy,
    /// The adapter is not configured for this call.
    Misconfigured,
    /// Any other collaborator failure.
    Unavailable,
}

impl ProviderError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        ProviderError::Unavailable {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::Request { source, .. } if source.is_decode() => {
                ProviderErrorKind::MalformedResponse
            }
            ProviderError::Request { .. } => ProviderErrorKind::Transport,
            ProviderError::Status { status: 404, .. } => ProviderErrorKind::NotFound,
            ProviderError::Status { .. } | ProviderError::Api { .. } => {
                ProviderErrorKind::Rejected
            }
            ProviderError::MissingField { .. } => ProviderErrorKind::MalformedResponse,
            ProviderError::Unhealthy { .. } => ProviderErrorKind::Unhealthy,
            ProviderError::InsecureUrl { .. } | ProviderError::MissingConfig { .. } => {
                ProviderErrorKind::Misconfigured
            }
            ProviderError::Unavailable { .. } => ProviderErrorKind::Unavailable,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ProviderErrorKind::NotFound
    }

    /// Name of the failed check, for health-check failures.
    pub fn check_type(&self) -> Option<&str> {
        match self {
            ProviderError::Unhealthy { check, .. } => Some(check),
            _ => None,
        }
    }

    /// Short platform-side detail, e.g. the HTTP status or API message.
    pub fn platform_detail(&self) -> String {
        match self {
            ProviderError::Status { status, body, .. } => format!("HTTP {status}: {body}"),
            ProviderError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
