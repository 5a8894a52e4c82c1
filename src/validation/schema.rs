use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::validation::{FormType, ValidationError};

/// Tax years with shipped definitions, oldest first
pub const SUPPORTED_TAX_YEARS: std::ops::RangeInclusive<u16> = 2022..=2025;

static CACHE: OnceLock<DashMap<u16, Arc<SchemaDefinitions>>> = OnceLock::new();

fn cache() -> &'static DashMap<u16, Arc<SchemaDefinitions>> {
    CACHE.get_or_init(DashMap::new)
}

/// Element-to-type mapping and required elements for one tax year
#[derive(Debug)]
pub struct SchemaDefinitions {
    tax_year: u16,
    schema_version: String,
    element_types: HashMap<&'static str, &'static str>,
    /// Type applied by element name suffix when no explicit mapping exists
    suffix_types: Vec<(&'static str, &'static str)>,
    required: HashMap<FormType, Vec<&'static str>>,
}

impl SchemaDefinitions {
    /// Definitions for `tax_year`, loaded once per process
    pub fn for_tax_year(tax_year: u16) -> Result<Arc<Self>, ValidationError> {
        if !SUPPORTED_TAX_YEARS.contains(&tax_year) {
            return Err(ValidationError::UnsupportedTaxYear(tax_year));
        }
        let definitions = cache()
            .entry(tax_year)
            .or_insert_with(|| {
                debug!(tax_year, "Loading schema definitions");
                Arc::new(Self::build(tax_year))
            })
            .clone();
        Ok(definitions)
    }

    fn build(tax_year: u16) -> Self {
        let mut element_types = HashMap::new();
        for (element, type_name) in [
            ("PrimarySSN", "SSNType"),
            ("SpouseSSN", "SSNType"),
            ("EmployeeSSN", "SSNType"),
            ("RecipientSSN", "SSNType"),
            ("EmployerEIN", "EINType"),
            ("PayerEIN", "EINType"),
            ("ZIPCd", "ZIPCodeType"),
            ("StateAbbreviationCd", "StateType"),
            ("IndividualReturnFilingStatusCd", "FilingStatusType"),
            ("NameLine1Txt", "PersonNameType"),
            ("EmployeeNm", "PersonNameType"),
            ("RecipientNm", "PersonNameType"),
            ("PhoneNum", "PhoneNumberType"),
            ("TaxYr", "YearType"),
            ("EFIN", "EFINType"),
            ("ForeignAccountsQuestionInd", "CheckboxType"),
            ("IRASEPSIMPLEInd", "CheckboxType"),
        ] {
            element_types.insert(element, type_name);
        }

        let header = [
            "ReturnHeader",
            "TaxYr",
            "ReturnTypeCd",
            "Filer",
            "PrimarySSN",
            "NameLine1Txt",
            "ReturnData",
        ];
        let mut required = HashMap::new();
        for form_type in [FormType::Return1040, FormType::Return1040SR, FormType::Return1040NR] {
            let mut elements = header.to_vec();
            elements.push(form_type.document_element());
            elements.push("IndividualReturnFilingStatusCd");
            required.insert(form_type, elements);
        }

        Self {
            tax_year,
            schema_version: format!("{tax_year}v5.0"),
            element_types,
            suffix_types: vec![("Amt", "USAmountType"), ("Dt", "DateType")],
            required,
        }
    }

    pub fn tax_year(&self) -> u16 {
        self.tax_year
    }

    /// `returnVersion` these definitions describe
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Schema type of an element, by local name
    pub fn type_of(&self, element: &str) -> Option<&'static str> {
        self.element_types.get(element).copied().or_else(|| {
            self.suffix_types
                .iter()
                .find(|(suffix, _)| element.ends_with(suffix))
                .map(|(_, type_name)| *type_name)
        })
    }

    /// Elements that must appear at least once in a return of this form type
    pub fn required_elements(&self, form_type: FormType) -> &[&'static str] {
        self.required.get(&form_type).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Drop every cached definition; the next validator reloads
pub fn clear_cache() {
    if let Some(cache) = CACHE.get() {
        cache.clear();
    }
}
