use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use x509_parser::prelude::{FromDer, X509Certificate};

use crate::signature::{Result, SignatureError, ns};

/// Identity fields of a signing certificate
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
}

impl CertificateInfo {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| SignatureError::Certificate(e.to_string()))?;
        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial_number: cert.tbs_certificate.serial.to_string(),
        })
    }
}

/// Byte range of the first element matching `predicate`, start tag through end tag
fn element_span<F>(xml: &str, mut predicate: F) -> Result<Option<(usize, usize)>>
where
    F: FnMut(&BytesStart<'_>) -> bool,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut depth = 0usize;
    let mut start = None;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if start.is_some() {
                    depth += 1;
                } else if predicate(&e) {
                    start = Some(before);
                    depth = 1;
                }
            }
            Ok(Event::Empty(e)) if start.is_none() && predicate(&e) => {
                return Ok(Some((before, reader.buffer_position() as usize)));
            }
            Ok(Event::End(_)) if start.is_some() => {
                depth -= 1;
                if depth == 0 {
                    let end = reader.buffer_position() as usize;
                    return Ok(start.map(|s| (s, end)));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(SignatureError::Xml(e.to_string())),
        }
    }
}

/// Extract the first element with the given local name, verbatim
pub fn extract_element(xml: &str, local_name: &str) -> Result<Option<String>> {
    let target = local_name.as_bytes();
    let span = element_span(xml, |e| e.local_name().as_ref() == target)?;
    Ok(span.map(|(start, end)| xml[start..end].to_owned()))
}

/// Text content of the first element with the given local name
pub fn element_text(xml: &str, local_name: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let target = local_name.as_bytes();
    let mut inside = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => inside = e.local_name().as_ref() == target,
            Ok(Event::Text(t)) if inside => return Ok(Some(t.unescape()?.into_owned())),
            Ok(Event::End(_)) if inside => return Ok(Some(String::new())),
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(SignatureError::Xml(e.to_string())),
        }
    }
}

/// Whether the element declares the XMLDSig namespace for its own prefix
fn is_dsig_signature(e: &BytesStart<'_>) -> bool {
    if e.local_name().as_ref() != b"Signature" {
        return false;
    }
    let qname = e.name();
    let decl_key: Vec<u8> = match qname.prefix() {
        Some(prefix) => [b"xmlns:".as_slice(), prefix.as_ref()].concat(),
        None => b"xmlns".to_vec(),
    };
    e.attributes()
        .with_checks(false)
        .filter_map(|a| a.ok())
        .any(|attr| attr.key.as_ref() == decl_key.as_slice() && attr.value.as_ref() == ns::DS.as_bytes())
}

/// Extract the enveloped `Signature` element, if any
pub fn extract_signature(xml: &str) -> Result<Option<String>> {
    let span = element_span(xml, is_dsig_signature)?;
    Ok(span.map(|(start, end)| xml[start..end].to_owned()))
}

/// Insert `fragment` as the last child of `parent`, or of the root element
pub fn insert_before_close(xml: &str, parent: Option<&str>, fragment: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut depth = 0usize;
    let mut target_depth = None;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let matches = match parent {
                    Some(name) => e.local_name().as_ref() == name.as_bytes(),
                    None => depth == 1,
                };
                if target_depth.is_none() && matches {
                    target_depth = Some(depth);
                }
            }
            Ok(Event::End(_)) => {
                if target_depth == Some(depth) {
                    let mut out = String::with_capacity(xml.len() + fragment.len());
                    out.push_str(&xml[..before]);
                    out.push_str(fragment);
                    out.push_str(&xml[before..]);
                    return Ok(out);
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SignatureError::Xml(e.to_string())),
        }
    }

    Err(SignatureError::ParentNotFound(
        parent.unwrap_or("document root").to_owned(),
    ))
}
