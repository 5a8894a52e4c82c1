//! Rendering of a computed return into MeF return XML.

pub mod format;
mod forms;
mod header;
mod writer;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EfileConfig;
use crate::model::ReturnDocument;
use writer::XmlBuilder;

pub mod ns {
    pub const EFILE: &str = "http://www.irs.gov/efile";
}

/// Error raised when a return cannot be rendered. Never retryable.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("required field is missing: {0}")]
    MissingField(&'static str),

    #[error("{field} is not a valid 9 digit identifier")]
    InvalidIdentifier { field: &'static str },

    #[error("invalid serializer configuration: {0}")]
    InvalidConfig(String),

    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialized XML is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Signature PIN scheme declared in the return header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PinType {
    #[default]
    SelfSelectOnline,
    SelfSelectPractitioner,
    Practitioner,
}

impl PinType {
    pub fn code(self) -> &'static str {
        match self {
            PinType::SelfSelectOnline => "Self-Select On-Line",
            PinType::SelfSelectPractitioner => "Self-Select Practitioner",
            PinType::Practitioner => "Practitioner",
        }
    }

    pub fn jurat_code(self) -> &'static str {
        match self {
            PinType::SelfSelectOnline => "Online Self Select PIN",
            PinType::SelfSelectPractitioner => "Self Select Practitioner PIN",
            PinType::Practitioner => "Practitioner PIN",
        }
    }
}

/// Tax-year and transmitter settings the serializer needs
#[derive(Debug, Clone)]
pub struct SerializerConfig {
    pub tax_year: u16,
    pub schema_version: String,
    pub software_id: String,
    pub software_version: String,
    pub originator_efin: String,
    pub originator_type: String,
    pub pin_type: PinType,
    /// `ReturnTs`; omitted when unset so output stays a pure function of inputs
    pub return_timestamp: Option<DateTime<FixedOffset>>,
    pub pretty: bool,
}

impl SerializerConfig {
    pub fn new(tax_year: u16, schema_version: impl Into<String>) -> Self {
        Self {
            tax_year,
            schema_version: schema_version.into(),
            software_id: String::new(),
            software_version: String::new(),
            originator_efin: String::new(),
            originator_type: "OnlineFiler".into(),
            pin_type: PinType::default(),
            return_timestamp: None,
            pretty: false,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.return_timestamp = Some(timestamp);
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl From<&EfileConfig> for SerializerConfig {
    fn from(config: &EfileConfig) -> Self {
        Self {
            tax_year: config.tax_year,
            schema_version: config.schema_version.clone(),
            software_id: config.software_id.clone(),
            software_version: config.software_version.clone(),
            originator_efin: config.efin.clone(),
            originator_type: config.originator_type.clone(),
            pin_type: config.pin_type,
            return_timestamp: None,
            pretty: false,
        }
    }
}

/// Return XML together with the metadata it was produced for.
///
/// Immutable: re-serialize to change it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedReturn {
    xml: String,
    tax_year: u16,
    schema_version: String,
    document_count: usize,
}

impl SerializedReturn {
    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn tax_year(&self) -> u16 {
        self.tax_year
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Number of documents under `ReturnData`
    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn into_xml(self) -> String {
        self.xml
    }
}

/// Serialize a computed return into MeF XML.
///
/// Fails without side effects when a schema-required field is absent.
pub fn serialize(
    doc: &ReturnDocument,
    config: &SerializerConfig,
) -> Result<SerializedReturn, SerializationError> {
    let filer = header::Filer::resolve(doc)?;
    let documents = forms::plan(doc);
    let document_count = documents.len();
    let document_cnt = document_count.to_string();

    let mut xml = XmlBuilder::new(config.pretty);
    xml.declaration()?;
    xml.open_with(
        "Return",
        &[
            ("xmlns", ns::EFILE),
            ("xmlns:efile", ns::EFILE),
            ("returnVersion", config.schema_version.as_str()),
        ],
    )?;
    header::write(&mut xml, doc, &filer, config)?;
    xml.open_with("ReturnData", &[("documentCnt", document_cnt.as_str())])?;
    forms::write(&mut xml, doc, &filer, &documents)?;
    xml.close("ReturnData")?;
    xml.close("Return")?;

    let xml = xml.finish()?;
    debug!(
        tax_year = config.tax_year,
        documents = document_count,
        bytes = xml.len(),
        "Serialized return"
    );

    Ok(SerializedReturn {
        xml,
        tax_year: config.tax_year,
        schema_version: config.schema_version.clone(),
        document_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use rust_decimal_macros::dec;

    fn config() -> SerializerConfig {
        let mut config = SerializerConfig::new(2024, "2024v5.0");
        config.software_id = "12345678".into();
        config.software_version = "1.0".into();
        config.originator_efin = "123456".into();
        config
    }

    fn single_filer() -> ReturnDocument {
        ReturnDocument {
            taxpayer: Taxpayer {
                primary: Person {
                    first_name: "Ada".into(),
                    last_name: "Lovelace".into(),
                    ssn: Some("123-45-6789".into()),
                    ..Default::default()
                },
                address: Some(Address {
                    line1: "1 Engine Way".into(),
                    line2: None,
                    city: "Springfield".into(),
                    state: "IL".into(),
                    zip: "62701".into(),
                }),
                ..Default::default()
            },
            filing_status: Some(FilingStatus::Single),
            form_1040: Form1040 {
                wages: Some(dec!(75000)),
                w2_withholding: Some(dec!(9500)),
                total_withholding: Some(dec!(9500)),
                ..Default::default()
            },
            w2s: vec![FormW2 {
                employer_ein: "98-7654321".into(),
                employer_name: "Analytical Engines Ltd".into(),
                wages: Some(dec!(75000)),
                federal_withholding: Some(dec!(9500)),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_serialize_single_filer() {
        let serialized = serialize(&single_filer(), &config()).unwrap();
        let xml = serialized.xml();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"returnVersion="2024v5.0""#));
        assert!(xml.contains("<PrimarySSN>123456789</PrimarySSN>"));
        assert!(xml.contains("<IndividualReturnFilingStatusCd>1</IndividualReturnFilingStatusCd>"));
        assert!(xml.contains("<WagesAmt>75000</WagesAmt>"));
        assert!(xml.contains(r#"<ReturnData documentCnt="2">"#));
        assert_eq!(serialized.document_count(), 2);
        assert_eq!(serialized.tax_year(), 2024);
        assert!(!xml.contains("IRS1040ScheduleB"));
        assert!(!xml.contains("SpouseSSN"));
        assert!(!xml.contains("ReturnTs"));
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let doc = single_filer();
        let a = serialize(&doc, &config()).unwrap();
        let b = serialize(&doc, &config()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_primary_ssn() {
        let mut doc = single_filer();
        doc.taxpayer.primary.ssn = None;
        assert!(matches!(
            serialize(&doc, &config()),
            Err(SerializationError::MissingField("PrimarySSN"))
        ));
    }

    #[test]
    fn test_malformed_primary_ssn() {
        let mut doc = single_filer();
        doc.taxpayer.primary.ssn = Some("123-45".into());
        assert!(matches!(
            serialize(&doc, &config()),
            Err(SerializationError::InvalidIdentifier { field: "PrimarySSN" })
        ));
    }

    #[test]
    fn test_missing_filing_status() {
        let mut doc = single_filer();
        doc.filing_status = None;
        assert!(matches!(
            serialize(&doc, &config()),
            Err(SerializationError::MissingField("IndividualReturnFilingStatusCd"))
        ));
    }

    #[test]
    fn test_return_timestamp_is_emitted_when_configured() {
        let ts = DateTime::parse_from_rfc3339("2025-02-03T09:30:00-05:00").unwrap();
        let serialized = serialize(&single_filer(), &config().with_timestamp(ts)).unwrap();
        assert!(
            serialized
                .xml()
                .contains("<ReturnTs>2025-02-03T09:30:00-05:00</ReturnTs>")
        );
    }

    #[test]
    fn test_pretty_and_compact_carry_same_content() {
        let doc = single_filer();
        let compact = serialize(&doc, &config()).unwrap();
        let pretty = serialize(&doc, &config().pretty(true)).unwrap();
        assert_ne!(compact.xml(), pretty.xml());
        let squash = |s: &str| s.split_whitespace().collect::<String>();
        assert_eq!(squash(compact.xml()), squash(pretty.xml()));
    }
}
