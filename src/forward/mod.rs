//! HTTP relay to the local agent and remote handlers.
//!
//! The original webhook body is POSTed unchanged and the target's status and
//! body are handed back verbatim. Unreachable targets and timeouts become
//! [`ForwardError`], which the API maps to 502.

use axum::body::Bytes;
use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Default per-request timeout for forwards
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// A named webhook endpoint
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardTarget {
    /// Short name used in logs and the 502 body ("agent", "FC")
    pub name: String,
    pub url: String,
}

impl ForwardTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// `http://<host>:<port>/webhook`
    pub fn webhook(name: impl Into<String>, host: &str, port: u16) -> Self {
        Self::new(name, format!("http://{}:{}/webhook", host, port))
    }
}

/// Response relayed from a forward target
#[derive(Debug)]
pub struct Relayed {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("{target} unavailable: {reason}")]
    Unavailable { target: String, reason: String },
}

impl ForwardError {
    pub fn target(&self) -> &str {
        match self {
            ForwardError::Unavailable { target, .. } => target,
        }
    }
}

/// Forwards raw webhook bodies with a bounded timeout.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub async fn forward(&self, target: &ForwardTarget, body: Bytes) -> Result<Relayed, ForwardError> {
        debug!(target = %target.name, url = %target.url, bytes = body.len(), "Forwarding webhook");

        let unavailable = |e: reqwest::Error| {
            error!(target = %target.name, url = %target.url, error = %e, "Error forwarding webhook");
            ForwardError::Unavailable {
                target: target.name.clone(),
                reason: e.to_string(),
            }
        };

        let response = self
            .client
            .post(&target.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(unavailable)?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(unavailable)?;

        Ok(Relayed {
            status,
            content_type,
            body,
        })
    }
}
