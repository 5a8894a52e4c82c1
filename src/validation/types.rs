use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::validation::{FieldError, FormType, codes};

static NINE_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{9}$").expect("Invalid regex pattern for 9 digit identifiers"));
static ZIP_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{5}(-?[0-9]{4})?$").expect("Invalid regex pattern for ZIP codes")
});
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("Invalid regex pattern for phone numbers"));
static US_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]{1,15}$").expect("Invalid regex pattern for amounts"));
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}$").expect("Invalid regex pattern for years"));
static EFIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("Invalid regex pattern for EFINs"));

/// USPS codes accepted for `StateAbbreviationCd`
pub const STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC", "AS", "FM", "GU", "MH", "MP", "PW", "PR", "VI", "AA",
    "AE", "AP",
];

const FILING_STATUS_CODES: &[&str] = &["1", "2", "3", "4", "5"];

const PERSON_NAME_MAX: usize = 35;

/// Where a value sits, used to word errors
#[derive(Debug, Clone, Copy)]
pub struct FormContext<'a> {
    pub tax_year: u16,
    pub form_type: FormType,
    /// Local name of the element holding the value
    pub element: Option<&'a str>,
}

impl<'a> FormContext<'a> {
    pub fn new(tax_year: u16, form_type: FormType) -> Self {
        Self {
            tax_year,
            form_type,
            element: None,
        }
    }

    pub fn for_element(self, element: &'a str) -> Self {
        Self {
            element: Some(element),
            ..self
        }
    }

    fn subject(&self, type_name: &str) -> String {
        match self.element {
            Some(element) => element.to_owned(),
            None => format!("{type_name} value"),
        }
    }
}

/// Check one value against a schema simple type.
///
/// Returns `None` when the value conforms.
pub fn validate_field_value(value: &str, type_name: &str, ctx: &FormContext<'_>) -> Option<FieldError> {
    let subject = ctx.subject(type_name);
    let pattern = |regex: &Regex, expected: &str| {
        (!regex.is_match(value)).then(|| {
            FieldError::new(
                codes::PATTERN_MISMATCH,
                format!("{subject} '{value}' does not match {type_name}"),
                Some(expected.to_owned()),
            )
        })
    };

    match type_name {
        "SSNType" | "EINType" => pattern(&*NINE_DIGITS, "exactly 9 digits"),
        "ZIPCodeType" => pattern(&*ZIP_CODE, "5 digits or ZIP+4"),
        "PhoneNumberType" => pattern(&*PHONE, "exactly 10 digits"),
        "USAmountType" => pattern(&*US_AMOUNT, "whole dollars, up to 15 digits"),
        "YearType" => pattern(&*YEAR, "4 digit year"),
        "EFINType" => pattern(&*EFIN, "exactly 6 digits"),
        "StateType" => enumeration(value, STATE_CODES, &subject, type_name),
        "FilingStatusType" => enumeration(value, FILING_STATUS_CODES, &subject, type_name),
        "CheckboxType" => enumeration(value, &["X"], &subject, type_name),
        "PersonNameType" => {
            let len = value.chars().count();
            (len == 0 || len > PERSON_NAME_MAX).then(|| {
                FieldError::new(
                    codes::LENGTH_ERROR,
                    format!("{subject} is {len} characters long"),
                    Some(format!("1 to {PERSON_NAME_MAX} characters")),
                )
            })
        }
        "DateType" => {
            let valid = value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
            (!valid).then(|| {
                FieldError::new(
                    codes::PATTERN_MISMATCH,
                    format!("{subject} '{value}' is not a calendar date"),
                    Some("YYYY-MM-DD".into()),
                )
            })
        }
        unknown => Some(FieldError::new(
            codes::UNKNOWN_TYPE,
            format!("no schema type named {unknown}"),
            None,
        )),
    }
}

fn enumeration(value: &str, allowed: &[&str], subject: &str, type_name: &str) -> Option<FieldError> {
    if allowed.contains(&value) {
        return None;
    }
    Some(FieldError::new(
        codes::ENUMERATION_ERROR,
        format!("{subject} '{value}' is not a valid {type_name}"),
        Some(allowed.join(", ")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> FormContext<'static> {
        FormContext::new(2024, FormType::Return1040)
    }

    fn code(value: &str, type_name: &str) -> Option<&'static str> {
        validate_field_value(value, type_name, &ctx()).map(|e| e.code)
    }

    #[test]
    fn test_nine_digit_identifiers() {
        assert_eq!(code("123456789", "SSNType"), None);
        assert_eq!(code("987654321", "EINType"), None);
        assert_eq!(code("123-45-6789", "SSNType"), Some(codes::PATTERN_MISMATCH));
        assert_eq!(code("12345678", "EINType"), Some(codes::PATTERN_MISMATCH));
    }

    #[test]
    fn test_zip_codes() {
        assert_eq!(code("62701", "ZIPCodeType"), None);
        assert_eq!(code("12345-6789", "ZIPCodeType"), None);
        assert_eq!(code("123456789", "ZIPCodeType"), None);
        assert_eq!(code("1234", "ZIPCodeType"), Some(codes::PATTERN_MISMATCH));
        assert_eq!(code("12345-67", "ZIPCodeType"), Some(codes::PATTERN_MISMATCH));
    }

    #[test]
    fn test_state_enumeration() {
        assert_eq!(code("CA", "StateType"), None);
        assert_eq!(code("PR", "StateType"), None);
        assert_eq!(code("AE", "StateType"), None);

        let err = validate_field_value("XX", "StateType", &ctx()).unwrap();
        assert_eq!(err.code, codes::ENUMERATION_ERROR);
        let expected = err.expected.unwrap();
        assert!(expected.contains("CA"));
        assert!(expected.contains("WY"));
    }

    #[test]
    fn test_filing_status() {
        for status in ["1", "2", "3", "4", "5"] {
            assert_eq!(code(status, "FilingStatusType"), None);
        }
        assert_eq!(code("6", "FilingStatusType"), Some(codes::ENUMERATION_ERROR));
        assert_eq!(code("0", "FilingStatusType"), Some(codes::ENUMERATION_ERROR));
    }

    #[test]
    fn test_person_name_length() {
        assert_eq!(code("Ada Lovelace", "PersonNameType"), None);
        assert_eq!(code(&"A".repeat(35), "PersonNameType"), None);
        assert_eq!(code(&"A".repeat(36), "PersonNameType"), Some(codes::LENGTH_ERROR));
        assert_eq!(code("", "PersonNameType"), Some(codes::LENGTH_ERROR));
    }

    #[test]
    fn test_phone_number() {
        assert_eq!(code("2175550100", "PhoneNumberType"), None);
        assert_eq!(code("217-555-0100", "PhoneNumberType"), Some(codes::PATTERN_MISMATCH));
    }

    #[test]
    fn test_amounts_and_dates() {
        assert_eq!(code("75000", "USAmountType"), None);
        assert_eq!(code("-1200", "USAmountType"), None);
        assert_eq!(code("75000.00", "USAmountType"), Some(codes::PATTERN_MISMATCH));
        assert_eq!(code("2024-02-29", "DateType"), None);
        assert_eq!(code("2023-02-29", "DateType"), Some(codes::PATTERN_MISMATCH));
        assert_eq!(code("2024-2-1", "DateType"), Some(codes::PATTERN_MISMATCH));
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(code("anything", "FooType"), Some(codes::UNKNOWN_TYPE));
    }

    #[test]
    fn test_message_names_element() {
        let ctx = ctx().for_element("PrimarySSN");
        let err = validate_field_value("12", "SSNType", &ctx).unwrap();
        assert!(err.message.starts_with("PrimarySSN"));
    }
}
