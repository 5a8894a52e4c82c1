use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;

use crate::serializer::SerializationError;
use crate::serializer::format::{escape_xml, format_amount};

type Result<T> = std::result::Result<T, SerializationError>;

/// Thin element builder over a quick-xml writer.
///
/// Text goes through [`escape_xml`] and is handed to the writer pre-escaped.
pub(crate) struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl XmlBuilder {
    pub fn new(pretty: bool) -> Self {
        let writer = if pretty {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };
        Self { writer }
    }

    pub fn declaration(&mut self) -> Result<()> {
        let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
        self.writer.write_event(Event::Decl(decl))?;
        Ok(())
    }

    pub fn open(&mut self, name: &str) -> Result<()> {
        self.open_with(name, &[])
    }

    pub fn open_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    pub fn close(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// `<name>text</name>`
    pub fn text(&mut self, name: &str, text: &str) -> Result<()> {
        self.open(name)?;
        let escaped = escape_xml(text);
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(escaped)))?;
        self.close(name)
    }

    /// Writes the element only for present, non-blank text
    pub fn opt_text(&mut self, name: &str, text: Option<&str>) -> Result<()> {
        match text.map(str::trim) {
            Some(text) if !text.is_empty() => self.text(name, text),
            _ => Ok(()),
        }
    }

    /// Always writes the amount, `0` when undefined
    pub fn amount(&mut self, name: &str, amount: Option<Decimal>) -> Result<()> {
        self.text(name, &format_amount(amount))
    }

    /// Writes the amount only when defined
    pub fn opt_amount(&mut self, name: &str, amount: Option<Decimal>) -> Result<()> {
        match amount {
            Some(_) => self.amount(name, amount),
            None => Ok(()),
        }
    }

    /// Checkbox elements carry `X` when set and are omitted otherwise
    pub fn checkbox(&mut self, name: &str, checked: bool) -> Result<()> {
        if checked { self.text(name, "X") } else { Ok(()) }
    }

    pub fn finish(self) -> Result<String> {
        Ok(String::from_utf8(self.writer.into_inner())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_builder_output() {
        let mut xml = XmlBuilder::new(false);
        xml.open_with("Doc", &[("documentId", "D-1")]).unwrap();
        xml.text("NameLine1Txt", "JOHN & JANE DOE").unwrap();
        xml.amount("WagesAmt", Some(dec!(100.5))).unwrap();
        xml.opt_amount("RefundAmt", None).unwrap();
        xml.opt_text("EmailAddressTxt", Some("  ")).unwrap();
        xml.checkbox("SomeInd", false).unwrap();
        xml.close("Doc").unwrap();

        assert_eq!(
            xml.finish().unwrap(),
            r#"<Doc documentId="D-1"><NameLine1Txt>JOHN &amp; JANE DOE</NameLine1Txt><WagesAmt>101</WagesAmt></Doc>"#
        );
    }

    #[test]
    fn test_pretty_output_keeps_text_inline() {
        let mut xml = XmlBuilder::new(true);
        xml.open("Doc").unwrap();
        xml.text("TaxYr", "2024").unwrap();
        xml.close("Doc").unwrap();

        let out = xml.finish().unwrap();
        assert!(out.contains("\n  <TaxYr>2024</TaxYr>\n"));
    }
}
