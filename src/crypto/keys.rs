use secrecy::{ExposeSecret, SecretSlice};

/// Secure wrapper for sensitive byte data that zeroizes on drop
#[derive(Debug, Clone, Default)]
pub struct SecureBytes(SecretSlice<u8>);

impl SecureBytes {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self(SecretSlice::new(data.into().into()))
    }

    /// Expose the secret data
    pub fn expose_secret(&self) -> &[u8] {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    /// Returns the hex representation of the data
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.expose_secret())
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&[u8]> for SecureBytes {
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}
