//! Serialize, sign, validate and transmit in one pass.

use std::path::Path;

use openssl::x509::X509;
use tracing::{info, instrument, warn};

use crate::config::{Config, SigningConfig};
use crate::crypto::{self, rsa::RsaPrivateKey};
use crate::error::{Error, Result};
use crate::mef::{MefClient, SubmissionPayload, SubmissionResult, Transport};
use crate::model::ReturnDocument;
use crate::serializer::{self, SerializerConfig};
use crate::signature::{self, SignOptions, SignatureBlock};
use crate::validation::{FormType, SchemaValidator};

/// Private key and certificate used to sign returns
#[derive(Debug, Clone)]
pub struct SigningIdentity {
    key: RsaPrivateKey,
    certificate_der: Vec<u8>,
}

impl SigningIdentity {
    pub fn new(key: RsaPrivateKey, certificate_der: Vec<u8>) -> Self {
        Self {
            key,
            certificate_der,
        }
    }

    /// Load a PEM private key and a PEM or DER certificate
    pub fn load(key_path: &Path, certificate_path: &Path) -> Result<Self> {
        let key = RsaPrivateKey::from_pem(read(key_path)?)?;
        let certificate = read(certificate_path)?;
        let certificate_der = if certificate.starts_with(b"-----BEGIN") {
            X509::from_pem(&certificate)
                .and_then(|cert| cert.to_der())
                .map_err(crypto::Error::from)?
        } else {
            certificate
        };
        Ok(Self::new(key, certificate_der))
    }

    /// `None` when no key material is configured
    pub fn from_config(config: &SigningConfig) -> Result<Option<Self>> {
        match (&config.private_key_path, &config.certificate_path) {
            (Some(key), Some(cert)) => Self::load(key, cert).map(Some),
            _ => Ok(None),
        }
    }

    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

/// A return ready for transmission
#[derive(Debug, Clone)]
pub struct PreparedReturn {
    xml: String,
    tax_year: u16,
    form_type: FormType,
    document_count: usize,
    signature: Option<SignatureBlock>,
}

impl PreparedReturn {
    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn tax_year(&self) -> u16 {
        self.tax_year
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// Signature material, when the return was signed
    pub fn signature(&self) -> Option<&SignatureBlock> {
        self.signature.as_ref()
    }

    pub fn payload(&self) -> SubmissionPayload {
        SubmissionPayload::new(self.xml.clone(), self.tax_year).with_form_type(self.form_type)
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    serializer: SerializerConfig,
    form_type: FormType,
    sign_options: SignOptions,
    identity: Option<SigningIdentity>,
}

impl Pipeline {
    pub fn new(serializer: SerializerConfig) -> Self {
        Self {
            serializer,
            form_type: FormType::Return1040,
            sign_options: SignOptions::default(),
            identity: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut pipeline = Self::new(SerializerConfig::from(&config.efile));
        pipeline.identity = SigningIdentity::from_config(&config.signing)?;
        Ok(pipeline)
    }

    pub fn with_identity(mut self, identity: SigningIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_sign_options(mut self, options: SignOptions) -> Self {
        self.sign_options = options;
        self
    }

    pub fn with_form_type(mut self, form_type: FormType) -> Self {
        self.form_type = form_type;
        self
    }

    pub fn signs(&self) -> bool {
        self.identity.is_some()
    }

    /// Serialize, sign when an identity is set, and validate
    #[instrument(skip_all, fields(tax_year = self.serializer.tax_year))]
    pub fn prepare(&self, doc: &ReturnDocument) -> Result<PreparedReturn> {
        let serialized = serializer::serialize(doc, &self.serializer)?;
        let tax_year = serialized.tax_year();
        let document_count = serialized.document_count();

        let (xml, signature) = match &self.identity {
            Some(identity) => {
                let signed = signature::sign(
                    serialized.xml(),
                    &identity.key,
                    &identity.certificate_der,
                    &self.sign_options,
                )?;
                let block = signed.block().clone();
                (signed.into_xml(), Some(block))
            }
            None => (serialized.into_xml(), None),
        };

        let result = SchemaValidator::new(tax_year)?.validate(&xml, self.form_type);
        if !result.valid {
            for error in &result.errors {
                warn!(%error, "Validation error");
            }
            return Err(result.into());
        }

        info!(
            documents = document_count,
            signed = signature.is_some(),
            "Return prepared"
        );
        Ok(PreparedReturn {
            xml,
            tax_year,
            form_type: self.form_type,
            document_count,
            signature,
        })
    }

    /// Prepare and transmit
    pub async fn submit<T: Transport>(
        &self,
        client: &MefClient<T>,
        doc: &ReturnDocument,
    ) -> Result<SubmissionResult> {
        let prepared = self.prepare(doc)?;
        Ok(client.submit_return(&prepared.payload()).await?)
    }
}
