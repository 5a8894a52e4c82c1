use crate::mef::transport::TransportError;
use crate::soap::Fault;
use crate::validation::{ValidationError, ValidationResult};

/// Coarse grouping used by callers to decide how to surface a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MefErrorCategory {
    Authentication,
    Validation,
    Transmission,
    System,
}

#[derive(Debug, thiserror::Error)]
pub enum MefError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("session expired")]
    SessionExpired,

    #[error("return failed validation with {} error(s)", .0.errors.len())]
    Validation(Box<ValidationResult>),

    #[error(transparent)]
    Schema(#[from] ValidationError),

    #[error("request rejected [{code}]: {message}")]
    RequestRejected { code: String, message: String },

    #[error("transmission failed: {0}")]
    Transmission(String),

    #[error("unknown submission: {0}")]
    UnknownSubmission(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl MefError {
    pub fn category(&self) -> MefErrorCategory {
        match self {
            MefError::Authentication(_) | MefError::SessionExpired => {
                MefErrorCategory::Authentication
            }
            MefError::Validation(_) | MefError::Schema(_) | MefError::RequestRejected { .. } => {
                MefErrorCategory::Validation
            }
            MefError::Transmission(_) => MefErrorCategory::Transmission,
            MefError::UnknownSubmission(_) | MefError::Protocol(_) | MefError::Config(_) => {
                MefErrorCategory::System
            }
        }
    }

    /// Only transmission failures are retried
    pub fn is_retryable(&self) -> bool {
        self.category() == MefErrorCategory::Transmission
    }

    /// Classify a SOAP fault returned by the endpoint
    pub fn from_fault(fault: &Fault) -> Self {
        let code = fault.error_code().unwrap_or_else(|| fault.local_code());
        let message = fault
            .detail
            .as_ref()
            .and_then(|d| d.mef.as_ref())
            .and_then(|m| m.error_text.clone())
            .unwrap_or_else(|| fault.message.clone());

        if is_session_expiry(code, &message) {
            return MefError::SessionExpired;
        }

        match fault.classification() {
            Some("AUTHENTICATION_ERROR") => MefError::Authentication(message),
            Some("REQUEST_ERROR") => MefError::RequestRejected {
                code: code.to_owned(),
                message,
            },
            Some("SYSTEM_ERROR") => MefError::Transmission(message),
            _ => match fault.local_code() {
                "Client" => MefError::RequestRejected {
                    code: code.to_owned(),
                    message,
                },
                "Server" => MefError::Transmission(message),
                other => MefError::Protocol(format!("unrecognized fault {other}: {message}")),
            },
        }
    }
}

fn is_session_expiry(code: &str, message: &str) -> bool {
    if matches!(code, "SESSION_EXPIRED" | "INVALID_SESSION_TOKEN") {
        return true;
    }
    let message = message.to_ascii_lowercase();
    message.contains("session") && (message.contains("expired") || message.contains("not valid"))
}

impl From<TransportError> for MefError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Unauthorized(status) => {
                MefError::Authentication(format!("endpoint refused credentials (HTTP {status})"))
            }
            TransportError::Status { status, .. } if status < 500 => {
                MefError::Protocol(error.to_string())
            }
            other => MefError::Transmission(other.to_string()),
        }
    }
}
