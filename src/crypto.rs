mod errors;
mod keys;
pub mod rsa;

pub use errors::Error;
pub use keys::SecureBytes;

use errors::CryptoResult;
use openssl::hash::{Hasher, MessageDigest as Digest};
use std::fmt;

/// XMLDSig digest algorithm URIs
pub mod uri {
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
    pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";
}

/// Hash algorithms usable for reference digests and RSA signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlg {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlg {
    /// Hash the given data with this hash algorithm
    pub fn hash(&self, data: impl AsRef<[u8]>) -> CryptoResult<Vec<u8>> {
        let mut hasher = Hasher::new(self.into())?;
        hasher.update(data.as_ref())?;
        Ok(hasher.finish()?.to_vec())
    }

    /// Get the output size in bytes
    pub fn output_size(self) -> usize {
        match self {
            HashAlg::Sha256 => 32,
            HashAlg::Sha384 => 48,
            HashAlg::Sha512 => 64,
        }
    }

    /// The `DigestMethod` algorithm URI for this hash
    pub fn digest_uri(self) -> &'static str {
        match self {
            HashAlg::Sha256 => uri::SHA256,
            HashAlg::Sha384 => uri::SHA384,
            HashAlg::Sha512 => uri::SHA512,
        }
    }

    /// Resolve a `DigestMethod` algorithm URI
    pub fn from_digest_uri(uri: &str) -> Option<Self> {
        match uri {
            uri::SHA256 => Some(HashAlg::Sha256),
            uri::SHA384 => Some(HashAlg::Sha384),
            uri::SHA512 => Some(HashAlg::Sha512),
            _ => None,
        }
    }
}

impl From<&HashAlg> for Digest {
    fn from(hash_alg: &HashAlg) -> Self {
        match hash_alg {
            HashAlg::Sha256 => Digest::sha256(),
            HashAlg::Sha384 => Digest::sha384(),
            HashAlg::Sha512 => Digest::sha512(),
        }
    }
}

impl From<HashAlg> for Digest {
    fn from(hash_alg: HashAlg) -> Self {
        (&hash_alg).into()
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlg::Sha256 => "SHA-256",
            HashAlg::Sha384 => "SHA-384",
            HashAlg::Sha512 => "SHA-512",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_output_sizes() {
        for alg in [HashAlg::Sha256, HashAlg::Sha384, HashAlg::Sha512] {
            let digest = alg.hash(b"return data").unwrap();
            assert_eq!(digest.len(), alg.output_size());
        }
    }

    #[test]
    fn test_digest_uri_lookup() {
        for alg in [HashAlg::Sha256, HashAlg::Sha384, HashAlg::Sha512] {
            assert_eq!(HashAlg::from_digest_uri(alg.digest_uri()), Some(alg));
        }
        assert_eq!(
            HashAlg::from_digest_uri("http://www.w3.org/2000/09/xmldsig#sha1"),
            None
        );
    }

    #[test]
    fn test_sha256_known_vector() {
        let digest = HashAlg::Sha256.hash(b"abc").unwrap();
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
