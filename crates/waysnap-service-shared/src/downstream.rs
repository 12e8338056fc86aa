//! Delivery of route handoff documents to the next pipeline stage.
//!
//! Without `service.downstream_url` the service runs in loopback mode and
//! returns the handoff document to the caller. With a URL configured the
//! document is POSTed there and the downstream status and body are relayed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::{debug, warn};
use waysnap_lib::ServiceSettings;

use crate::metrics::record_downstream_forward;
use crate::middleware::{RequestId, REQUEST_ID_HEADER};
use crate::response::{ServiceResponse, JSON_CONTENT_TYPE};

#[derive(Debug)]
pub enum DownstreamError {
    /// `service.downstream_url` is not an absolute http(s) URL.
    InvalidUrl { url: String, reason: String },
    /// The HTTP client could not be built.
    Client(reqwest::Error),
    /// The handoff could not be delivered or its reply could not be read.
    Request(reqwest::Error),
    /// The handoff document could not be encoded.
    Encode(serde_json::Error),
}

impl std::fmt::Display for DownstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl { url, reason } => {
                write!(f, "invalid downstream url '{}': {}", url, reason)
            }
            Self::Client(e) => write!(f, "failed to build downstream client: {}", e),
            Self::Request(e) => write!(f, "downstream request failed: {}", e),
            Self::Encode(e) => write!(f, "failed to encode handoff document: {}", e),
        }
    }
}

impl std::error::Error for DownstreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Client(e) | Self::Request(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::InvalidUrl { .. } => None,
        }
    }
}

/// Where handoff documents go.
#[derive(Debug, Clone)]
pub enum Downstream {
    /// Return the document to the caller.
    Loopback,
    /// POST the document to the next stage and relay its reply.
    Http {
        client: reqwest::Client,
        url: reqwest::Url,
    },
}

/// A downstream reply, ready to send back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relayed {
    pub status: StatusCode,
    pub body: String,
    pub content_type: String,
}

impl IntoResponse for Relayed {
    fn into_response(self) -> Response {
        ServiceResponse::new(self.body)
            .with_status(self.status)
            .with_content_type(self.content_type)
            .into_response()
    }
}

impl Downstream {
    pub fn from_settings(settings: &ServiceSettings) -> Result<Self, DownstreamError> {
        match settings.downstream_url.as_deref() {
            None => Ok(Self::Loopback),
            Some(url) => Self::http(url),
        }
    }

    pub fn http(url: &str) -> Result<Self, DownstreamError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| DownstreamError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownstreamError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("waysnap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DownstreamError::Client)?;
        Ok(Self::Http {
            client,
            url: parsed,
        })
    }

    /// Metric label for this target.
    pub fn target(&self) -> &'static str {
        match self {
            Self::Loopback => "loopback",
            Self::Http { .. } => "http",
        }
    }

    /// Deliver a handoff document.
    pub async fn forward(
        &self,
        document: &Value,
        request_id: &RequestId,
    ) -> Result<Relayed, DownstreamError> {
        let result = self.deliver(document, request_id).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        record_downstream_forward(self.target(), outcome);
        result
    }

    async fn deliver(
        &self,
        document: &Value,
        request_id: &RequestId,
    ) -> Result<Relayed, DownstreamError> {
        let body = serde_json::to_string(document).map_err(DownstreamError::Encode)?;
        match self {
            Self::Loopback => Ok(Relayed {
                status: StatusCode::OK,
                body,
                content_type: JSON_CONTENT_TYPE.to_string(),
            }),
            Self::Http { client, url } => {
                debug!(url = %url, bytes = body.len(), "forwarding handoff");
                let response = client
                    .post(url.clone())
                    .header(reqwest::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
                    .header(REQUEST_ID_HEADER, request_id.as_str())
                    .body(body)
                    .send()
                    .await
                    .map_err(DownstreamError::Request)?;

                let status = response.status();
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or(JSON_CONTENT_TYPE)
                    .to_string();
                let body = response.text().await.map_err(DownstreamError::Request)?;
                if !status.is_success() {
                    warn!(status = status.as_u16(), "downstream rejected handoff");
                }
                Ok(Relayed {
                    status,
                    body,
                    content_type,
                })
            }
        }
    }
}
