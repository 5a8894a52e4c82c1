use crate::mef::MefError;
use crate::serializer::SerializationError;
use crate::signature::SignatureError;
use crate::validation::{ValidationError, ValidationResult};

pub type Result<T> = std::result::Result<T, Error>;

/// Any failure along serialize, sign, validate and transmit
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Crypto(#[from] crate::crypto::Error),

    #[error(transparent)]
    Schema(#[from] ValidationError),

    #[error("return failed validation with {} error(s)", .0.errors.len())]
    Validation(Box<ValidationResult>),

    #[error(transparent)]
    Mef(#[from] MefError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<ValidationResult> for Error {
    fn from(result: ValidationResult) -> Self {
        Error::Validation(Box::new(result))
    }
}

impl Error {
    /// Whether retrying the same operation could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Mef(e) if e.is_retryable())
    }
}
