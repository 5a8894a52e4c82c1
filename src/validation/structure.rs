use quick_xml::events::Event;
use quick_xml::Reader;

use crate::validation::{FieldError, codes};

/// Well-formedness checks run before any content rule.
///
/// Stops at the first defect; content rules are meaningless on a broken tree.
pub(crate) fn check(xml: &str) -> Option<FieldError> {
    if xml.trim().is_empty() {
        return Some(FieldError::new(codes::EMPTY_XML, "document is empty", None));
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    // tag matching is reported here with a precise code instead of a reader error
    reader.config_mut().check_end_names = false;
    reader.config_mut().allow_unmatched_ends = true;

    let mut open: Vec<String> = Vec::new();
    let mut roots = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if let Some(err) = e.attributes().find_map(Result::err) {
                    return Some(malformed_attribute(err));
                }
                if open.is_empty() {
                    roots += 1;
                }
                open.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Empty(e)) => {
                if let Some(err) = e.attributes().find_map(Result::err) {
                    return Some(malformed_attribute(err));
                }
                if open.is_empty() {
                    roots += 1;
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match open.pop() {
                    Some(expected) if expected == name => {}
                    Some(expected) => return Some(mismatched(&open, &name, &expected)),
                    None => {
                        return Some(FieldError::new(
                            codes::UNBALANCED_TAG,
                            format!("closing tag </{name}> has no opening tag"),
                            None,
                        ));
                    }
                }
            }
            Ok(Event::Text(_)) | Ok(Event::CData(_)) if open.is_empty() => {
                return Some(FieldError::new(
                    codes::MALFORMED_XML,
                    "text outside the root element",
                    None,
                ));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Some(FieldError::new(
                    codes::MALFORMED_XML,
                    format!("XML is not well-formed at byte {}: {e}", reader.error_position()),
                    None,
                ));
            }
        }
    }

    if !open.is_empty() {
        let unclosed = open.join(", ");
        return Some(FieldError::new(
            codes::UNCLOSED_TAGS,
            format!("document ended with unclosed elements: {unclosed}"),
            None,
        ));
    }
    match roots {
        0 => Some(FieldError::new(codes::EMPTY_XML, "document has no root element", None)),
        1 => None,
        n => Some(FieldError::new(
            codes::MALFORMED_XML,
            format!("document has {n} root elements"),
            None,
        )),
    }
}

/// `found` closes an element that is not the innermost open one
fn mismatched(open: &[String], found: &str, expected: &str) -> FieldError {
    FieldError::new(
        codes::UNBALANCED_TAG,
        format!("found </{found}> while <{expected}> is open"),
        Some(format!("</{expected}>")),
    )
    .at(path(open, expected))
}

fn malformed_attribute(err: quick_xml::events::attributes::AttrError) -> FieldError {
    FieldError::new(codes::MALFORMED_XML, format!("malformed attribute: {err}"), None)
}

fn path(open: &[String], leaf: &str) -> String {
    let mut path = String::new();
    for name in open.iter().map(String::as_str).chain(std::iter::once(leaf)) {
        path.push('/');
        path.push_str(name);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(xml: &str) -> Option<&'static str> {
        check(xml).map(|e| e.code)
    }

    #[test]
    fn test_well_formed() {
        assert_eq!(code(r#"<?xml version="1.0"?><Return><A>1</A><B/></Return>"#), None);
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(code(""), Some(codes::EMPTY_XML));
        assert_eq!(code("  \n\t"), Some(codes::EMPTY_XML));
        assert_eq!(code(r#"<?xml version="1.0"?>"#), Some(codes::EMPTY_XML));
    }

    #[test]
    fn test_unbalanced_tags() {
        let err = check("<Return><A>1</B></Return>").unwrap();
        assert_eq!(err.code, codes::UNBALANCED_TAG);
        assert_eq!(err.path.as_deref(), Some("/Return/A"));
        assert_eq!(code("<Return></Return></Extra>"), Some(codes::UNBALANCED_TAG));
    }

    #[test]
    fn test_closing_tag_without_opening() {
        let err = check("</Return>").unwrap();
        assert_eq!(err.code, codes::UNBALANCED_TAG);
        assert!(err.message.contains("</Return>"));
        assert_eq!(err.path, None);
    }

    #[test]
    fn test_unclosed_tags() {
        let err = check("<Return><ReturnHeader><TaxYr>2024</TaxYr>").unwrap();
        assert_eq!(err.code, codes::UNCLOSED_TAGS);
        assert!(err.message.contains("Return, ReturnHeader"));
    }

    #[test]
    fn test_malformed() {
        assert_eq!(code(r#"<Return><A attr=></A></Return>"#), Some(codes::MALFORMED_XML));
        assert_eq!(code(r#"<Return a="1" a="2"></Return>"#), Some(codes::MALFORMED_XML));
        assert_eq!(code("<Return><!-- never closed </Return>"), Some(codes::MALFORMED_XML));
        assert_eq!(code("<A></A><B></B>"), Some(codes::MALFORMED_XML));
        assert_eq!(code("stray<A></A>"), Some(codes::MALFORMED_XML));
    }
}
