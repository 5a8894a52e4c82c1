use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::{Reader, SeError, Writer};
use serde::Serialize;
use serde::ser::SerializeStruct;

use crate::soap::Envelope;
use crate::soap::config::XmlConfig;

const ENVELOPE: &str = "SOAP-ENV:Envelope";
const HEADER: &str = "SOAP-ENV:Header";
const BODY: &str = "SOAP-ENV:Body";

/// Serialize a value to XML, declaring the configured namespaces on its root
pub fn to_string<T>(config: &XmlConfig, value: &T) -> Result<String, SeError>
where
    T: Serialize,
{
    let raw = quick_xml::se::to_string(value)?;
    if !config.pretty && !config.xml_decl && config.namespaces.is_empty() {
        return Ok(raw);
    }
    decorate(&raw, config)
}

/// Re-emit serialized XML with the declaration, root namespaces and indentation
fn decorate(raw: &str, config: &XmlConfig) -> Result<String, SeError> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let capacity = raw.len() + 64 * config.namespaces.len() + 64;
    let mut writer = if config.pretty {
        Writer::new_with_indent(Vec::with_capacity(capacity), b' ', config.indent_size)
    } else {
        Writer::new(Vec::with_capacity(capacity))
    };

    if config.xml_decl {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    }

    let mut root_seen = false;
    loop {
        match reader.read_event().map_err(|e| SeError::Custom(e.to_string()))? {
            Event::Eof => break,
            Event::Start(start) if !root_seen => {
                root_seen = true;
                writer.write_event(Event::Start(declare(start, config)))?;
            }
            Event::Empty(start) if !root_seen => {
                root_seen = true;
                writer.write_event(Event::Empty(declare(start, config)))?;
            }
            event => writer.write_event(event)?,
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|e| SeError::Custom(e.to_string()))
}

fn declare<'a>(mut start: BytesStart<'a>, config: &XmlConfig) -> BytesStart<'a> {
    for (prefix, uri) in &config.namespaces {
        if prefix.is_empty() {
            start.push_attribute(("xmlns", uri.as_str()));
        } else {
            start.push_attribute((format!("xmlns:{prefix}").as_str(), uri.as_str()));
        }
    }
    start
}

/// Envelope view that names the SOAP elements with the `SOAP-ENV` prefix
pub(crate) struct Prefixed<'a, T>(pub &'a Envelope<T>);

impl<T: Serialize> Serialize for Prefixed<'_, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let header = self.0.header();
        let mut state = serializer.serialize_struct(ENVELOPE, 1 + usize::from(header.is_some()))?;
        if let Some(header) = header {
            state.serialize_field(HEADER, header)?;
        }
        state.serialize_field(BODY, &self.0.body)?;
        state.end()
    }
}
