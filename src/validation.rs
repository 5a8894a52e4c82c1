//! Local wire-constraint checks gating transmission.

mod schema;
mod structure;
mod types;

pub use schema::{SUPPORTED_TAX_YEARS, SchemaDefinitions, clear_cache};
pub use types::{FormContext, STATE_CODES, validate_field_value};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub mod codes {
    pub const PATTERN_MISMATCH: &str = "PATTERN_MISMATCH";
    pub const ENUMERATION_ERROR: &str = "ENUMERATION_ERROR";
    pub const LENGTH_ERROR: &str = "LENGTH_ERROR";
    pub const UNKNOWN_TYPE: &str = "UNKNOWN_TYPE";
    pub const EMPTY_XML: &str = "EMPTY_XML";
    pub const UNBALANCED_TAG: &str = "UNBALANCED_TAG";
    pub const UNCLOSED_TAGS: &str = "UNCLOSED_TAGS";
    pub const MALFORMED_XML: &str = "MALFORMED_XML";
    pub const MISSING_REQUIRED_ELEMENT: &str = "MISSING_REQUIRED_ELEMENT";
    pub const DOCUMENT_COUNT_MISMATCH: &str = "DOCUMENT_COUNT_MISMATCH";
}

/// Validator construction errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("no schema definitions for tax year {0}")]
    UnsupportedTaxYear(u16),

    #[error("unknown form type: {0}")]
    UnknownFormType(String),
}

/// One constraint violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub code: &'static str,
    pub message: String,
    /// What would have been accepted
    pub expected: Option<String>,
    /// Element path, `/Return/ReturnHeader/Filer/PrimarySSN`
    pub path: Option<String>,
}

impl FieldError {
    pub fn new(code: &'static str, message: impl Into<String>, expected: Option<String>) -> Self {
        Self {
            code,
            message: message.into(),
            expected,
            path: None,
        }
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.code)?;
        if let Some(path) = &self.path {
            write!(f, "{path}: ")?;
        }
        f.write_str(&self.message)?;
        if let Some(expected) = &self.expected {
            write!(f, " (expected {expected})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<FieldError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Whether any error carries `code`
    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormType {
    Return1040,
    Return1040SR,
    Return1040NR,
}

impl FormType {
    /// `ReturnTypeCd` value
    pub fn return_type_code(self) -> &'static str {
        match self {
            FormType::Return1040 => "1040",
            FormType::Return1040SR => "1040-SR",
            FormType::Return1040NR => "1040-NR",
        }
    }

    /// Main document element under `ReturnData`
    pub fn document_element(self) -> &'static str {
        match self {
            FormType::Return1040 | FormType::Return1040SR => "IRS1040",
            FormType::Return1040NR => "IRS1040NR",
        }
    }
}

impl FromStr for FormType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1040" => Ok(FormType::Return1040),
            "1040-SR" | "1040SR" => Ok(FormType::Return1040SR),
            "1040-NR" | "1040NR" => Ok(FormType::Return1040NR),
            _ => Err(ValidationError::UnknownFormType(s.to_owned())),
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.return_type_code())
    }
}

/// Validator bound to one tax year's definitions
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    definitions: Arc<SchemaDefinitions>,
}

impl SchemaValidator {
    pub fn new(tax_year: u16) -> Result<Self, ValidationError> {
        Ok(Self {
            definitions: SchemaDefinitions::for_tax_year(tax_year)?,
        })
    }

    pub fn tax_year(&self) -> u16 {
        self.definitions.tax_year()
    }

    pub fn definitions(&self) -> &SchemaDefinitions {
        &self.definitions
    }

    /// Validate return XML; structural defects short-circuit content checks
    pub fn validate(&self, xml: &str, form_type: FormType) -> ValidationResult {
        if let Some(error) = structure::check(xml) {
            debug!(code = error.code, "Structural validation failed");
            return ValidationResult::from_errors(vec![error]);
        }

        let errors = ContentCheck::new(&self.definitions, form_type).run(xml);
        debug!(
            tax_year = self.tax_year(),
            form = %form_type,
            errors = errors.len(),
            "Validated return"
        );
        ValidationResult::from_errors(errors)
    }
}

/// Open element during the content walk
struct Frame {
    name: String,
    path: String,
    text: String,
    has_children: bool,
}

struct ContentCheck<'a> {
    definitions: &'a SchemaDefinitions,
    form_type: FormType,
    stack: Vec<Frame>,
    seen: HashSet<String>,
    declared_documents: Option<(String, String)>,
    return_data_children: usize,
    errors: Vec<FieldError>,
}

impl<'a> ContentCheck<'a> {
    fn new(definitions: &'a SchemaDefinitions, form_type: FormType) -> Self {
        Self {
            definitions,
            form_type,
            stack: Vec::new(),
            seen: HashSet::new(),
            declared_documents: None,
            return_data_children: 0,
            errors: Vec::new(),
        }
    }

    fn run(mut self, xml: &str) -> Vec<FieldError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => self.open(&e),
                Ok(Event::Empty(e)) => {
                    self.open(&e);
                    self.close();
                }
                Ok(Event::Text(t)) => {
                    if let Some(frame) = self.stack.last_mut() {
                        match t.unescape() {
                            Ok(text) => frame.text.push_str(&text),
                            Err(e) => {
                                let path = frame.path.clone();
                                self.errors.push(
                                    FieldError::new(codes::MALFORMED_XML, e.to_string(), None).at(path),
                                );
                            }
                        }
                    }
                }
                Ok(Event::End(_)) => self.close(),
                Ok(Event::Eof) => break,
                Ok(_) => {}
                // structure::check already accepted this document
                Err(e) => {
                    self.errors
                        .push(FieldError::new(codes::MALFORMED_XML, e.to_string(), None));
                    break;
                }
            }
        }

        self.check_required();
        self.check_document_count();
        self.errors
    }

    fn open(&mut self, e: &BytesStart<'_>) {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let parent_path = self.stack.last().map(|f| f.path.as_str()).unwrap_or_default();
        let path = format!("{parent_path}/{name}");

        if let Some(parent) = self.stack.last_mut() {
            parent.has_children = true;
            if parent.name == "ReturnData" && self.stack.len() == 2 {
                self.return_data_children += 1;
            }
        }
        if name == "ReturnData" {
            let declared = e
                .attributes()
                .filter_map(Result::ok)
                .find(|a| a.key.local_name().as_ref() == b"documentCnt")
                .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
            if let Some(count) = declared {
                self.declared_documents = Some((count, path.clone()));
            }
        }

        self.seen.insert(name.clone());
        self.stack.push(Frame {
            name,
            path,
            text: String::new(),
            has_children: false,
        });
    }

    fn close(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        if frame.has_children {
            return;
        }
        let Some(type_name) = self.definitions.type_of(&frame.name) else {
            return;
        };

        let ctx = FormContext::new(self.definitions.tax_year(), self.form_type).for_element(&frame.name);
        if let Some(error) = validate_field_value(frame.text.trim(), type_name, &ctx) {
            self.errors.push(error.at(frame.path));
        }
    }

    fn check_required(&mut self) {
        for element in self.definitions.required_elements(self.form_type) {
            if !self.seen.contains(*element) {
                self.errors.push(FieldError::new(
                    codes::MISSING_REQUIRED_ELEMENT,
                    format!("{element} is required for form {}", self.form_type),
                    Some((*element).to_owned()),
                ));
            }
        }
    }

    fn check_document_count(&mut self) {
        let Some((declared, path)) = self.declared_documents.take() else {
            return;
        };
        match declared.trim().parse::<usize>() {
            Ok(count) if count == self.return_data_children => {}
            Ok(count) => self.errors.push(
                FieldError::new(
                    codes::DOCUMENT_COUNT_MISMATCH,
                    format!(
                        "documentCnt is {count} but ReturnData holds {} documents",
                        self.return_data_children
                    ),
                    Some(self.return_data_children.to_string()),
                )
                .at(path),
            ),
            Err(_) => self.errors.push(
                FieldError::new(
                    codes::PATTERN_MISMATCH,
                    format!("documentCnt '{declared}' is not a number"),
                    Some("non-negative integer".into()),
                )
                .at(path),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        r#"<Return xmlns="http://www.irs.gov/efile" returnVersion="2024v5.0">"#,
        r#"<ReturnHeader binaryAttachmentCnt="0"><TaxYr>2024</TaxYr>"#,
        r#"<TaxPeriodBeginDt>2024-01-01</TaxPeriodBeginDt><ReturnTypeCd>1040</ReturnTypeCd>"#,
        r#"<Filer><PrimarySSN>123456789</PrimarySSN><NameLine1Txt>Ada Lovelace</NameLine1Txt>"#,
        r#"<USAddress><StateAbbreviationCd>IL</StateAbbreviationCd><ZIPCd>62701</ZIPCd></USAddress>"#,
        r#"</Filer></ReturnHeader>"#,
        r#"<ReturnData documentCnt="1"><IRS1040 documentId="IRS1040-1">"#,
        r#"<IndividualReturnFilingStatusCd>1</IndividualReturnFilingStatusCd><WagesAmt>75000</WagesAmt>"#,
        r#"</IRS1040></ReturnData></Return>"#
    );

    fn validator() -> SchemaValidator {
        SchemaValidator::new(2024).unwrap()
    }

    #[test]
    fn test_valid_return() {
        let result = validator().validate(VALID, FormType::Return1040);
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_empty_xml() {
        let result = validator().validate("", FormType::Return1040);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, codes::EMPTY_XML);
    }

    #[test]
    fn test_structural_failure_short_circuits() {
        let broken = "<Return><PrimarySSN>12</PrimarySSN><ZIPCd>1</Return>";
        let result = validator().validate(broken, FormType::Return1040);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, codes::UNBALANCED_TAG);
    }

    #[test]
    fn test_field_errors_carry_path() {
        let xml = VALID.replace("<PrimarySSN>123456789</PrimarySSN>", "<PrimarySSN>12345</PrimarySSN>");
        let result = validator().validate(&xml, FormType::Return1040);
        assert!(!result.valid);
        let error = &result.errors[0];
        assert_eq!(error.code, codes::PATTERN_MISMATCH);
        assert_eq!(error.path.as_deref(), Some("/Return/ReturnHeader/Filer/PrimarySSN"));
    }

    #[test]
    fn test_invalid_state() {
        let xml = VALID.replace(">IL<", ">XX<");
        let result = validator().validate(&xml, FormType::Return1040);
        assert!(result.has_code(codes::ENUMERATION_ERROR));
    }

    #[test]
    fn test_missing_required_element() {
        let xml = VALID.replace(
            "<IndividualReturnFilingStatusCd>1</IndividualReturnFilingStatusCd>",
            "",
        );
        let result = validator().validate(&xml, FormType::Return1040);
        assert!(result.has_code(codes::MISSING_REQUIRED_ELEMENT));
    }

    #[test]
    fn test_form_type_selects_document() {
        let result = validator().validate(VALID, FormType::Return1040NR);
        let missing: Vec<_> = result
            .errors
            .iter()
            .filter(|e| e.code == codes::MISSING_REQUIRED_ELEMENT)
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].expected.as_deref(), Some("IRS1040NR"));
    }

    #[test]
    fn test_document_count_mismatch() {
        let xml = VALID.replace(r#"documentCnt="1""#, r#"documentCnt="3""#);
        let result = validator().validate(&xml, FormType::Return1040);
        assert!(result.has_code(codes::DOCUMENT_COUNT_MISMATCH));
    }

    #[test]
    fn test_empty_typed_element() {
        let xml = VALID.replace("<ZIPCd>62701</ZIPCd>", "<ZIPCd/>");
        let result = validator().validate(&xml, FormType::Return1040);
        assert!(result.has_code(codes::PATTERN_MISMATCH));
    }

    #[test]
    fn test_form_type_parsing() {
        assert_eq!("1040".parse::<FormType>().unwrap(), FormType::Return1040);
        assert_eq!("1040-sr".parse::<FormType>().unwrap(), FormType::Return1040SR);
        assert_eq!("1040-NR".parse::<FormType>().unwrap(), FormType::Return1040NR);
        assert!("941".parse::<FormType>().is_err());
    }

    #[test]
    fn test_unsupported_tax_year() {
        assert!(matches!(
            SchemaValidator::new(2010),
            Err(ValidationError::UnsupportedTaxYear(2010))
        ));
    }
}
