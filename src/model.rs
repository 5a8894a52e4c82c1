//! Computed return handed over by the calculation engine.
//!
//! Everything here is read-only input to the serializer. Monetary values are
//! kept as [`Decimal`] so the serializer owns rounding; absent lines are `None`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Filing status as carried in `IndividualReturnFilingStatusCd`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    MarriedFilingJointly,
    MarriedFilingSeparately,
    HeadOfHousehold,
    QualifyingSurvivingSpouse,
}

impl FilingStatus {
    /// The numeric MeF code (1..=5)
    pub fn code(self) -> u8 {
        match self {
            FilingStatus::Single => 1,
            FilingStatus::MarriedFilingJointly => 2,
            FilingStatus::MarriedFilingSeparately => 3,
            FilingStatus::HeadOfHousehold => 4,
            FilingStatus::QualifyingSurvivingSpouse => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FilingStatus::Single),
            2 => Some(FilingStatus::MarriedFilingJointly),
            3 => Some(FilingStatus::MarriedFilingSeparately),
            4 => Some(FilingStatus::HeadOfHousehold),
            5 => Some(FilingStatus::QualifyingSurvivingSpouse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub first_name: String,
    #[serde(default)]
    pub middle_initial: Option<String>,
    pub last_name: String,
    /// SSN as entered, punctuation allowed
    #[serde(default)]
    pub ssn: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub occupation: Option<String>,
}

impl Person {
    pub fn full_name(&self) -> String {
        match self.middle_initial.as_deref().map(str::trim) {
            Some(mi) if !mi.is_empty() => {
                format!("{} {} {}", self.first_name.trim(), mi, self.last_name.trim())
            }
            _ => format!("{} {}", self.first_name.trim(), self.last_name.trim()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxpayer {
    pub primary: Person,
    #[serde(default)]
    pub spouse: Option<Person>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Self-select signature PINs and signature date
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signatures {
    #[serde(default)]
    pub primary_pin: Option<String>,
    #[serde(default)]
    pub spouse_pin: Option<String>,
    #[serde(default)]
    pub signature_date: Option<NaiveDate>,
}

/// Form 1040 line values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Form1040 {
    /// Line 1a
    pub wages: Option<Decimal>,
    /// Line 2a
    pub tax_exempt_interest: Option<Decimal>,
    /// Line 2b
    pub taxable_interest: Option<Decimal>,
    /// Line 3a
    pub qualified_dividends: Option<Decimal>,
    /// Line 3b
    pub ordinary_dividends: Option<Decimal>,
    /// Line 4a
    pub ira_distributions: Option<Decimal>,
    /// Line 4b
    pub taxable_ira: Option<Decimal>,
    /// Line 5a
    pub pensions_annuities: Option<Decimal>,
    /// Line 5b
    pub taxable_pensions: Option<Decimal>,
    /// Line 6a
    pub social_security_benefits: Option<Decimal>,
    /// Line 6b
    pub taxable_social_security: Option<Decimal>,
    /// Line 7
    pub capital_gain_loss: Option<Decimal>,
    /// Line 8
    pub additional_income: Option<Decimal>,
    /// Line 9
    pub total_income: Option<Decimal>,
    /// Line 10
    pub adjustments: Option<Decimal>,
    /// Line 11
    pub adjusted_gross_income: Option<Decimal>,
    /// Line 12
    pub standard_or_itemized_deduction: Option<Decimal>,
    /// Line 13
    pub qbi_deduction: Option<Decimal>,
    /// Line 14
    pub total_deductions: Option<Decimal>,
    /// Line 15
    pub taxable_income: Option<Decimal>,
    /// Line 16
    pub tax: Option<Decimal>,
    /// Line 19
    pub child_tax_credit: Option<Decimal>,
    /// Line 21
    pub total_credits: Option<Decimal>,
    /// Line 24
    pub total_tax: Option<Decimal>,
    /// Line 25a
    pub w2_withholding: Option<Decimal>,
    /// Line 25b
    pub form_1099_withholding: Option<Decimal>,
    /// Line 25d
    pub total_withholding: Option<Decimal>,
    /// Line 26
    pub estimated_payments: Option<Decimal>,
    /// Line 27
    pub earned_income_credit: Option<Decimal>,
    /// Line 33
    pub total_payments: Option<Decimal>,
    /// Line 34
    pub overpaid: Option<Decimal>,
    /// Line 35a
    pub refund: Option<Decimal>,
    /// Line 37
    pub amount_owed: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectDeposit {
    pub routing_number: String,
    pub account_number: String,
    pub account_type: AccountType,
}

/// Whose form a W-2 or 1099 is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    #[default]
    Primary,
    Spouse,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormW2 {
    #[serde(default)]
    pub owner: Owner,
    pub employer_ein: String,
    pub employer_name: String,
    #[serde(default)]
    pub employer_address: Option<Address>,
    /// Box 1
    #[serde(default)]
    pub wages: Option<Decimal>,
    /// Box 2
    #[serde(default)]
    pub federal_withholding: Option<Decimal>,
    /// Box 3
    #[serde(default)]
    pub social_security_wages: Option<Decimal>,
    /// Box 4
    #[serde(default)]
    pub social_security_tax: Option<Decimal>,
    /// Box 5
    #[serde(default)]
    pub medicare_wages: Option<Decimal>,
    /// Box 6
    #[serde(default)]
    pub medicare_tax: Option<Decimal>,
    /// Box 15
    #[serde(default)]
    pub state: Option<String>,
    /// Box 16
    #[serde(default)]
    pub state_wages: Option<Decimal>,
    /// Box 17
    #[serde(default)]
    pub state_withholding: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Form1099R {
    #[serde(default)]
    pub owner: Owner,
    pub payer_ein: String,
    pub payer_name: String,
    /// Box 1
    #[serde(default)]
    pub gross_distribution: Option<Decimal>,
    /// Box 2a
    #[serde(default)]
    pub taxable_amount: Option<Decimal>,
    /// Box 4
    #[serde(default)]
    pub federal_withholding: Option<Decimal>,
    /// Box 7
    #[serde(default)]
    pub distribution_code: Option<String>,
    #[serde(default)]
    pub ira_sep_simple: bool,
}

/// Schedule 1 additional income and adjustments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule1 {
    pub taxable_refunds: Option<Decimal>,
    pub business_income: Option<Decimal>,
    pub unemployment_compensation: Option<Decimal>,
    pub other_income: Option<Decimal>,
    pub total_additional_income: Option<Decimal>,
    pub educator_expenses: Option<Decimal>,
    pub hsa_deduction: Option<Decimal>,
    pub student_loan_interest: Option<Decimal>,
    pub ira_deduction: Option<Decimal>,
    pub total_adjustments: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayerAmount {
    pub payer_name: String,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleB {
    pub interest: Vec<PayerAmount>,
    pub total_interest: Option<Decimal>,
    pub taxable_interest: Option<Decimal>,
    pub dividends: Vec<PayerAmount>,
    pub total_ordinary_dividends: Option<Decimal>,
    pub foreign_account: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleD {
    pub short_term_gain_loss: Option<Decimal>,
    pub short_term_carryover: Option<Decimal>,
    pub net_short_term: Option<Decimal>,
    pub long_term_gain_loss: Option<Decimal>,
    pub capital_gain_distributions: Option<Decimal>,
    pub long_term_carryover: Option<Decimal>,
    pub net_long_term: Option<Decimal>,
    pub net_gain_loss: Option<Decimal>,
}

/// A fully computed individual return
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnDocument {
    pub taxpayer: Taxpayer,
    #[serde(default)]
    pub filing_status: Option<FilingStatus>,
    #[serde(default)]
    pub form_1040: Form1040,
    #[serde(default)]
    pub w2s: Vec<FormW2>,
    #[serde(default)]
    pub form_1099rs: Vec<Form1099R>,
    #[serde(default)]
    pub schedule_1: Option<Schedule1>,
    #[serde(default)]
    pub schedule_b: Option<ScheduleB>,
    #[serde(default)]
    pub schedule_d: Option<ScheduleD>,
    #[serde(default)]
    pub direct_deposit: Option<DirectDeposit>,
    #[serde(default)]
    pub signatures: Signatures,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filing_status_codes() {
        for code in 1..=5 {
            let status = FilingStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert!(FilingStatus::from_code(0).is_none());
        assert!(FilingStatus::from_code(6).is_none());
    }

    #[test]
    fn test_deserialize_minimal_return() {
        let json = r#"{
            "taxpayer": {
                "primary": { "first_name": "Ada", "last_name": "Lovelace", "ssn": "123-45-6789" }
            },
            "filing_status": "single",
            "form_1040": { "wages": "75000.00" },
            "w2s": [{ "employer_ein": "12-3456789", "employer_name": "Analytical Engines", "wages": 75000 }]
        }"#;

        let doc: ReturnDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.filing_status, Some(FilingStatus::Single));
        assert_eq!(doc.form_1040.wages, Some(Decimal::new(75000, 0)));
        assert_eq!(doc.w2s.len(), 1);
        assert_eq!(doc.w2s[0].owner, Owner::Primary);
        assert!(doc.schedule_b.is_none());
    }

    #[test]
    fn test_full_name() {
        let person = Person {
            first_name: "Grace".into(),
            middle_initial: Some("B".into()),
            last_name: "Hopper".into(),
            ..Default::default()
        };
        assert_eq!(person.full_name(), "Grace B Hopper");
    }
}
