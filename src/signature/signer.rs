use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use quick_xml::se::to_string_with_root as xml_to_string;
use tracing::debug;

use crate::crypto::rsa::{self, RsaPrivateKey, RsaPublicKey};
use crate::signature::utils::{self, CertificateInfo};
use crate::signature::*;

/// Sign a return with an enveloped XMLDSig signature.
///
/// The document is canonicalized, digested and referenced with `URI=""`; the
/// resulting `Signature` element is appended to the configured parent.
pub fn sign(
    xml: &str,
    key: &RsaPrivateKey,
    cert_der: &[u8],
    options: &SignOptions,
) -> Result<SignedXml> {
    if utils::extract_signature(xml)?.is_some() {
        return Err(SignatureError::AlreadySigned);
    }

    let cert = CertificateInfo::from_der(cert_der)?;
    let cert_key = RsaPublicKey::from_certificate_der(cert_der)
        .map_err(|e| SignatureError::Certificate(e.to_string()))?;
    if cert_key.to_der()? != key.public_key()?.to_der()? {
        return Err(SignatureError::KeyMismatch);
    }

    let c14n_options = C14nOptions {
        inclusive_prefixes: &options.inclusive_prefixes,
        exclude_signature: true,
    };
    let canonical = canonicalize(xml, &c14n_options)?;
    let digest = options.hash.hash(canonical.as_bytes())?;
    let digest_value = BASE64.encode(&digest);
    debug!(
        bytes = canonical.len(),
        hash = %options.hash,
        digest = %digest_value,
        "Computed document digest"
    );

    let signed_info = SignedInfo {
        xmlns: Some(ns::DS.into()),
        canon_method: AlgorithmRef::new(algorithms::EXCLUSIVE_C14N),
        signature_method: AlgorithmRef::new(rsa::signature_uri(options.hash)),
        references: vec![Reference {
            uri: String::new(),
            transforms: Some(Transforms {
                transform: vec![
                    Transform {
                        algorithm: algorithms::ENVELOPED_SIGNATURE.into(),
                        inclusive_ns: None,
                    },
                    Transform {
                        algorithm: algorithms::EXCLUSIVE_C14N.into(),
                        inclusive_ns: inclusive_namespaces(&options.inclusive_prefixes),
                    },
                ],
            }),
            digest_method: AlgorithmRef::new(options.hash.digest_uri()),
            digest_value: digest_value.clone(),
        }],
    };

    let signed_info_xml = xml_to_string("SignedInfo", &signed_info)?;
    let signed_info_c14n = canonicalize(&signed_info_xml, &C14nOptions::default())?;
    let signature = rsa::sign(key, signed_info_c14n.as_bytes(), options.hash)?;
    let signature_value = BASE64.encode(signature.as_bytes());

    let element = Signature {
        xmlns: Some(ns::DS.into()),
        signed_info,
        signature_value: signature_value.clone(),
        key_info: KeyInfo {
            x509_data: X509Data {
                subject_name: Some(cert.subject),
                issuer_serial: Some(X509IssuerSerial {
                    issuer_name: cert.issuer,
                    serial_number: cert.serial_number,
                }),
                certificate: BASE64.encode(cert_der),
            },
        },
    };
    let signature_xml = xml_to_string("Signature", &element)?;
    let signed = utils::insert_before_close(xml, options.parent_element.as_deref(), &signature_xml)?;

    let tax_year = utils::element_text(xml, "TaxYr")?.and_then(|year| year.parse().ok());
    debug!(parent = ?options.parent_element, "Embedded enveloped signature");

    Ok(SignedXml {
        xml: signed,
        block: SignatureBlock {
            canonicalized_bytes: canonical.into_bytes(),
            digest_value,
            signature_value,
            certificate: cert_der.to_vec(),
        },
        tax_year,
    })
}

fn inclusive_namespaces(prefixes: &[String]) -> Option<InclusiveNamespaces> {
    if prefixes.is_empty() {
        return None;
    }
    Some(InclusiveNamespaces {
        xmlns: Some(algorithms::EXCLUSIVE_C14N.into()),
        prefix_list: prefixes.join(" "),
    })
}
