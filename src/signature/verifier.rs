use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use quick_xml::de::from_str as xml_from_str;
use tracing::{debug, warn};

use crate::crypto::HashAlg;
use crate::crypto::rsa::{self, RsaPublicKey, RsaSignature};
use crate::signature::utils::{self, CertificateInfo};
use crate::signature::*;

type Check<T> = std::result::Result<T, VerificationFailure>;

/// Verify the enveloped signature of a signed return.
///
/// Never fails: every problem is reported through [`VerificationResult::reason`].
pub fn verify(signed_xml: &str) -> VerificationResult {
    match verify_inner(signed_xml) {
        Ok(()) => {
            debug!("Signature verified");
            VerificationResult::valid()
        }
        Err(reason) => {
            warn!(%reason, "Signature verification failed");
            VerificationResult::failed(reason)
        }
    }
}

fn verify_inner(xml: &str) -> Check<()> {
    let signature_xml = utils::extract_signature(xml)
        .map_err(|e| VerificationFailure::Malformed(e.to_string()))?
        .ok_or(VerificationFailure::MissingSignature)?;
    let signature: Signature = xml_from_str(&signature_xml)
        .map_err(|e| VerificationFailure::Malformed(e.to_string()))?;
    let signed_info = &signature.signed_info;

    if signed_info.canon_method.algorithm != algorithms::EXCLUSIVE_C14N {
        return Err(VerificationFailure::UnsupportedAlgorithm(
            signed_info.canon_method.algorithm.clone(),
        ));
    }
    let signature_hash = rsa::hash_for_signature_uri(&signed_info.signature_method.algorithm)
        .ok_or_else(|| {
            VerificationFailure::UnsupportedAlgorithm(signed_info.signature_method.algorithm.clone())
        })?;

    let [reference] = signed_info.references.as_slice() else {
        return Err(VerificationFailure::Malformed(format!(
            "expected one Reference, found {}",
            signed_info.references.len()
        )));
    };
    verify_reference(xml, reference)?;

    let signed_info_xml = utils::extract_element(&signature_xml, "SignedInfo")
        .map_err(|e| VerificationFailure::Malformed(e.to_string()))?
        .ok_or_else(|| VerificationFailure::Malformed("SignedInfo not found".into()))?;
    let signed_info_c14n = canonicalize(&signed_info_xml, &C14nOptions::default())
        .map_err(|e| VerificationFailure::Canonicalization(e.to_string()))?;

    let cert_der = decode_base64(&signature.key_info.x509_data.certificate)
        .map_err(VerificationFailure::Certificate)?;
    CertificateInfo::from_der(&cert_der)
        .map_err(|e| VerificationFailure::Certificate(e.to_string()))?;
    let public_key = RsaPublicKey::from_certificate_der(&cert_der)
        .map_err(|e| VerificationFailure::Certificate(e.to_string()))?;

    let signature_bytes =
        decode_base64(&signature.signature_value).map_err(VerificationFailure::Malformed)?;
    let valid = rsa::verify(
        &public_key,
        signed_info_c14n.as_bytes(),
        &RsaSignature::new(signature_bytes),
        signature_hash,
    )
    .map_err(|e| VerificationFailure::Certificate(e.to_string()))?;

    if !valid {
        return Err(VerificationFailure::SignatureMismatch);
    }
    Ok(())
}

/// Recompute the whole-document digest named by a `URI=""` reference
fn verify_reference(xml: &str, reference: &Reference) -> Check<()> {
    if !reference.uri.is_empty() {
        return Err(VerificationFailure::UnsupportedAlgorithm(format!(
            "reference URI '{}'",
            reference.uri
        )));
    }

    let mut enveloped = false;
    let mut inclusive_prefixes = Vec::new();
    for transform in reference.transforms.iter().flat_map(|t| &t.transform) {
        match transform.algorithm.as_str() {
            algorithms::ENVELOPED_SIGNATURE => enveloped = true,
            algorithms::EXCLUSIVE_C14N => {
                if let Some(inclusive) = &transform.inclusive_ns {
                    inclusive_prefixes
                        .extend(inclusive.prefix_list.split_whitespace().map(str::to_owned));
                }
            }
            other => return Err(VerificationFailure::UnsupportedAlgorithm(other.to_owned())),
        }
    }
    if !enveloped {
        return Err(VerificationFailure::Malformed(
            "reference lacks the enveloped-signature transform".into(),
        ));
    }

    let digest_hash = HashAlg::from_digest_uri(&reference.digest_method.algorithm).ok_or_else(
        || VerificationFailure::UnsupportedAlgorithm(reference.digest_method.algorithm.clone()),
    )?;

    let options = C14nOptions {
        inclusive_prefixes: &inclusive_prefixes,
        exclude_signature: true,
    };
    let canonical = canonicalize(xml, &options)
        .map_err(|e| VerificationFailure::Canonicalization(e.to_string()))?;
    let computed = digest_hash
        .hash(canonical.as_bytes())
        .map_err(|e| VerificationFailure::Canonicalization(e.to_string()))?;
    let expected = decode_base64(&reference.digest_value).map_err(VerificationFailure::Malformed)?;

    if computed != expected {
        return Err(VerificationFailure::DigestMismatch);
    }
    Ok(())
}

/// Base64 values may be wrapped across lines by other producers
fn decode_base64(value: &str) -> std::result::Result<Vec<u8>, String> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64.decode(compact).map_err(|e| e.to_string())
}
