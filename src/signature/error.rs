/// Error raised while producing a signature. Never retryable.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("XML processing error: {0}")]
    Xml(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crate::crypto::Error),

    #[error("Invalid signing certificate: {0}")]
    Certificate(String),

    #[error("Private key does not match the signing certificate")]
    KeyMismatch,

    #[error("Document already carries an enveloped signature")]
    AlreadySigned,

    #[error("Parent element '{0}' not found in document")]
    ParentNotFound(String),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl From<quick_xml::Error> for SignatureError {
    fn from(err: quick_xml::Error) -> Self {
        SignatureError::Xml(err.to_string())
    }
}

impl From<quick_xml::DeError> for SignatureError {
    fn from(err: quick_xml::DeError) -> Self {
        SignatureError::Xml(err.to_string())
    }
}

impl From<quick_xml::SeError> for SignatureError {
    fn from(err: quick_xml::SeError) -> Self {
        SignatureError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SignatureError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        SignatureError::Xml(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for SignatureError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        SignatureError::Utf8(err.utf8_error())
    }
}
