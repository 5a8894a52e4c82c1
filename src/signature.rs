//! Enveloped XMLDSig signatures over return XML.

mod c14n;
mod error;
mod signer;
mod utils;
mod verifier;

pub use c14n::{C14nOptions, canonicalize};
pub use error::SignatureError;
pub use signer::sign;
pub use verifier::verify;

use serde::{Deserialize, Serialize};

use crate::crypto::HashAlg;

pub type Result<T> = std::result::Result<T, SignatureError>;

pub mod algorithms {
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}

pub mod ns {
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
}

/// Signing parameters
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    /// Digest and signature hash
    pub hash: HashAlg,
    /// Local name of the element receiving the signature, document root when `None`
    pub parent_element: Option<String>,
    /// Prefixes listed in the reference transform's `InclusiveNamespaces`
    pub inclusive_prefixes: Vec<String>,
}

/// Material produced by one signing operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBlock {
    canonicalized_bytes: Vec<u8>,
    digest_value: String,
    signature_value: String,
    certificate: Vec<u8>,
}

impl SignatureBlock {
    /// Canonical document bytes the digest was computed over
    pub fn canonicalized_bytes(&self) -> &[u8] {
        &self.canonicalized_bytes
    }

    /// Base64 reference digest
    pub fn digest_value(&self) -> &str {
        &self.digest_value
    }

    /// Base64 RSA signature over the canonical SignedInfo
    pub fn signature_value(&self) -> &str {
        &self.signature_value
    }

    /// DER encoded signing certificate
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }
}

/// Signed return XML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedXml {
    xml: String,
    block: SignatureBlock,
    tax_year: Option<u16>,
}

impl SignedXml {
    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn block(&self) -> &SignatureBlock {
        &self.block
    }

    /// `TaxYr` read from the signed document header
    pub fn tax_year(&self) -> Option<u16> {
        self.tax_year
    }

    pub fn into_xml(self) -> String {
        self.xml
    }
}

impl AsRef<str> for SignedXml {
    fn as_ref(&self) -> &str {
        &self.xml
    }
}

/// Why a signature did not verify
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationFailure {
    #[error("document carries no enveloped signature")]
    MissingSignature,

    #[error("malformed signature: {0}")]
    Malformed(String),

    #[error("document cannot be canonicalized: {0}")]
    Canonicalization(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("reference digest does not match document content")]
    DigestMismatch,

    #[error("signature value does not match SignedInfo")]
    SignatureMismatch,

    #[error("invalid certificate: {0}")]
    Certificate(String),
}

/// Outcome of [`verify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub valid: bool,
    pub reason: Option<VerificationFailure>,
}

impl VerificationResult {
    pub(crate) fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub(crate) fn failed(reason: VerificationFailure) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Signature {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,

    #[serde(rename = "SignedInfo")]
    pub signed_info: SignedInfo,

    #[serde(rename = "SignatureValue")]
    pub signature_value: String,

    #[serde(rename = "KeyInfo")]
    pub key_info: KeyInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SignedInfo {
    /// Carried on SignedInfo itself so its canonical form is the same detached or embedded
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,

    #[serde(rename = "CanonicalizationMethod")]
    pub canon_method: AlgorithmRef,

    #[serde(rename = "SignatureMethod")]
    pub signature_method: AlgorithmRef,

    #[serde(rename = "Reference", default)]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AlgorithmRef {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

impl AlgorithmRef {
    pub fn new(algorithm: &str) -> Self {
        Self {
            algorithm: algorithm.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Reference {
    #[serde(rename = "@URI", default)]
    pub uri: String,

    #[serde(rename = "Transforms", default, skip_serializing_if = "Option::is_none")]
    pub transforms: Option<Transforms>,

    #[serde(rename = "DigestMethod")]
    pub digest_method: AlgorithmRef,

    #[serde(rename = "DigestValue")]
    pub digest_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Transforms {
    #[serde(rename = "Transform", default)]
    pub transform: Vec<Transform>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Transform {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,

    #[serde(rename = "InclusiveNamespaces", default, skip_serializing_if = "Option::is_none")]
    pub inclusive_ns: Option<InclusiveNamespaces>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct InclusiveNamespaces {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,

    #[serde(rename = "@PrefixList")]
    pub prefix_list: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct KeyInfo {
    #[serde(rename = "X509Data")]
    pub x509_data: X509Data,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct X509Data {
    #[serde(rename = "X509SubjectName", default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,

    #[serde(rename = "X509IssuerSerial", default, skip_serializing_if = "Option::is_none")]
    pub issuer_serial: Option<X509IssuerSerial>,

    #[serde(rename = "X509Certificate")]
    pub certificate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct X509IssuerSerial {
    #[serde(rename = "X509IssuerName")]
    pub issuer_name: String,

    #[serde(rename = "X509SerialNumber")]
    pub serial_number: String,
}
