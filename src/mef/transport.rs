use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use tracing::debug;

use crate::config::TransmitterConfig;

pub type TransportResult = Result<String, TransportError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("endpoint returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("endpoint refused credentials (HTTP {0})")]
    Unauthorized(u16),
}

/// Carries one SOAP exchange to the MeF endpoint.
///
/// Returns the raw response envelope; SOAP faults are returned as bodies,
/// not errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, action: &str, envelope: String) -> TransportResult;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn call(&self, action: &str, envelope: String) -> TransportResult {
        (**self).call(action, envelope).await
    }
}

/// HTTPS transport posting SOAP 1.1 envelopes
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn from_config(config: &TransmitterConfig) -> Result<Self, TransportError> {
        Self::new(config.endpoint(), config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, action: &str, envelope: String) -> TransportResult {
        let request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{action}\""))
            .body(envelope);

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.timeout, exchange).await {
            Err(_) => return Err(TransportError::Timeout(self.timeout)),
            Ok(Err(e)) if e.is_timeout() => return Err(TransportError::Timeout(self.timeout)),
            Ok(Err(e)) => return Err(TransportError::Connect(e.to_string())),
            Ok(Ok(exchange)) => exchange,
        };
        debug!(action, status = status.as_u16(), bytes = body.len(), "MeF response");

        match status {
            s if s.is_success() => Ok(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(TransportError::Unauthorized(status.as_u16()))
            }
            // SOAP 1.1 delivers faults with a 500
            StatusCode::INTERNAL_SERVER_ERROR if body.contains("Fault>") => Ok(body),
            _ => Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}
