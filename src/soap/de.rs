use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::{DeError, Reader, Writer};
use serde::de::DeserializeOwned;

/// Deserialize a SOAP payload.
///
/// Indentation and comments are removed first so pretty-printed responses map
/// onto the same types as compact ones.
pub fn from_str<T>(xml: &str) -> Result<T, DeError>
where
    T: DeserializeOwned,
{
    quick_xml::de::from_str(&compact(xml)?)
}

fn compact(xml: &str) -> Result<Cow<'_, str>, DeError> {
    if !xml.contains(['\n', '\r', '\t']) && !xml.contains("<!--") {
        return Ok(Cow::Borrowed(xml));
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Comment(_) => {}
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {}
            event => writer
                .write_event(event)
                .map_err(|e| DeError::Custom(e.to_string()))?,
        }
    }

    String::from_utf8(writer.into_inner())
        .map(Cow::Owned)
        .map_err(|e| DeError::Custom(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_input_is_borrowed() {
        let xml = "<a><b>1</b></a>";
        assert!(matches!(compact(xml).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_indentation_and_comments_are_dropped() {
        let xml = "<a>\n  <!-- generated -->\n  <b> keep me </b>\n</a>";
        assert_eq!(compact(xml).unwrap(), "<a><b> keep me </b></a>");
    }
}
