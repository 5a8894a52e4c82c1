use crate::crypto::HashAlg;
use crate::crypto::errors::{CryptoResult, Error};
use crate::crypto::keys::SecureBytes;
use openssl::pkey::{PKey, Private, Public};
use openssl::rsa::Rsa;
use openssl::sign::{Signer, Verifier};
use openssl::x509::X509;
use std::fmt;

/// XMLDSig signature method URIs
pub mod uri {
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
    pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";
}

/// RSA key sizes accepted for return signing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaKeySize {
    Rsa2048,
    Rsa3072,
    Rsa4096,
}

impl RsaKeySize {
    /// Get the key size in bits
    pub fn bits(&self) -> u32 {
        match self {
            RsaKeySize::Rsa2048 => 2048,
            RsaKeySize::Rsa3072 => 3072,
            RsaKeySize::Rsa4096 => 4096,
        }
    }

    /// Get the key size in bytes, which is also the signature length
    pub fn bytes(&self) -> usize {
        self.bits() as usize / 8
    }
}

impl TryFrom<u32> for RsaKeySize {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            2048 => Ok(Self::Rsa2048),
            3072 => Ok(Self::Rsa3072),
            4096 => Ok(Self::Rsa4096),
            _ => Err(Error::Invalid(format!("unsupported RSA key size: {bits} bits"))),
        }
    }
}

/// Signature method URI for an RSA signature over the given hash
pub fn signature_uri(hash_alg: HashAlg) -> &'static str {
    match hash_alg {
        HashAlg::Sha256 => uri::RSA_SHA256,
        HashAlg::Sha384 => uri::RSA_SHA384,
        HashAlg::Sha512 => uri::RSA_SHA512,
    }
}

/// Resolve a `SignatureMethod` algorithm URI to its hash
pub fn hash_for_signature_uri(uri: &str) -> Option<HashAlg> {
    match uri {
        uri::RSA_SHA256 => Some(HashAlg::Sha256),
        uri::RSA_SHA384 => Some(HashAlg::Sha384),
        uri::RSA_SHA512 => Some(HashAlg::Sha512),
        _ => None,
    }
}

/// An RSA PKCS#1 v1.5 signature
#[derive(Clone)]
pub struct RsaSignature {
    data: SecureBytes,
}

impl RsaSignature {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: SecureBytes::new(data.into()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for RsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaSignature")
            .field("size", &self.len())
            .field("hex", &self.data.to_hex())
            .finish()
    }
}

/// RSA private key wrapper
#[derive(Debug, Clone)]
pub struct RsaPrivateKey {
    key: PKey<Private>,
    key_size: RsaKeySize,
}

impl RsaPrivateKey {
    /// Generate a new RSA private key
    pub fn generate(key_size: RsaKeySize) -> CryptoResult<Self> {
        let rsa = Rsa::generate(key_size.bits())?;
        let key = PKey::from_rsa(rsa)?;
        Ok(Self { key, key_size })
    }

    /// Load from PEM-encoded PKCS#1/PKCS#8.
    pub fn from_pem(pem_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let key = PKey::private_key_from_pem(pem_bytes.as_ref())?;
        Self::from_pkey(key)
    }

    /// Load from DER-encoded PKCS#1/PKCS#8.
    pub fn from_der(der_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let key = PKey::private_key_from_der(der_bytes.as_ref())?;
        Self::from_pkey(key)
    }

    fn from_pkey(key: PKey<Private>) -> CryptoResult<Self> {
        let rsa = key
            .rsa()
            .map_err(|_| Error::Invalid("private key is not an RSA key".into()))?;
        let key_size = RsaKeySize::try_from(rsa.size() * 8)?;
        Ok(Self { key, key_size })
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> CryptoResult<RsaPublicKey> {
        let key = PKey::public_key_from_der(&self.key.public_key_to_der()?)?;
        Ok(RsaPublicKey {
            key,
            key_size: self.key_size,
        })
    }

    pub fn key_size(&self) -> RsaKeySize {
        self.key_size
    }

    pub(crate) fn pkey(&self) -> &PKey<Private> {
        &self.key
    }
}

/// RSA public key wrapper
#[derive(Debug, Clone)]
pub struct RsaPublicKey {
    key: PKey<Public>,
    key_size: RsaKeySize,
}

impl RsaPublicKey {
    /// Load from DER-encoded SubjectPublicKeyInfo
    pub fn from_der(der_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        Self::from_pkey(PKey::public_key_from_der(der_bytes.as_ref())?)
    }

    /// Extract the subject public key of a DER-encoded X.509 certificate
    pub fn from_certificate_der(cert_der: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let cert = X509::from_der(cert_der.as_ref())?;
        Self::from_pkey(cert.public_key()?)
    }

    fn from_pkey(key: PKey<Public>) -> CryptoResult<Self> {
        let rsa = key
            .rsa()
            .map_err(|_| Error::Invalid("public key is not an RSA key".into()))?;
        let key_size = RsaKeySize::try_from(rsa.size() * 8)?;
        Ok(Self { key, key_size })
    }

    /// Export key in SubjectPublicKeyInfo DER format
    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        Ok(self.key.public_key_to_der()?)
    }

    pub fn key_size(&self) -> RsaKeySize {
        self.key_size
    }
}

/// Sign data using RSA PKCS#1 v1.5 with the given hash
pub fn sign(
    private_key: &RsaPrivateKey,
    data: impl AsRef<[u8]>,
    hash_alg: HashAlg,
) -> CryptoResult<RsaSignature> {
    let mut signer = Signer::new(hash_alg.into(), private_key.pkey())?;
    let signature = signer.sign_oneshot_to_vec(data.as_ref())?;
    Ok(RsaSignature::new(signature))
}

/// Verify an RSA PKCS#1 v1.5 signature
///
/// Returns `Ok(false)` for a well-formed signature that does not match.
pub fn verify(
    public_key: &RsaPublicKey,
    data: impl AsRef<[u8]>,
    signature: &RsaSignature,
    hash_alg: HashAlg,
) -> CryptoResult<bool> {
    if signature.len() != public_key.key_size().bytes() {
        return Ok(false);
    }
    let mut verifier = Verifier::new(hash_alg.into(), &public_key.key)?;
    // openssl reports some malformed signatures as errors rather than a mismatch
    Ok(verifier
        .verify_oneshot(signature.as_bytes(), data.as_ref())
        .unwrap_or(false))
}
