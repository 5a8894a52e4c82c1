use chrono::NaiveDate;

use crate::model::{FilingStatus, Person, ReturnDocument};
use crate::serializer::format::{digits_only, format_date, format_id, name_control, normalize_text};
use crate::serializer::writer::XmlBuilder;
use crate::serializer::{SerializationError, SerializerConfig};

type Result<T> = std::result::Result<T, SerializationError>;

/// Identity data resolved once and shared by the header and the forms
pub(crate) struct Filer {
    pub filing_status: FilingStatus,
    pub primary_ssn: String,
    pub spouse_ssn: Option<String>,
    pub primary_name: String,
    pub spouse_name: Option<String>,
}

impl Filer {
    pub fn resolve(doc: &ReturnDocument) -> Result<Self> {
        let primary = &doc.taxpayer.primary;
        let raw_ssn = primary
            .ssn
            .as_deref()
            .filter(|ssn| !ssn.trim().is_empty())
            .ok_or(SerializationError::MissingField("PrimarySSN"))?;
        let primary_ssn = format_id(raw_ssn).ok_or(SerializationError::InvalidIdentifier {
            field: "PrimarySSN",
        })?;

        if primary.first_name.trim().is_empty() || primary.last_name.trim().is_empty() {
            return Err(SerializationError::MissingField("NameLine1Txt"));
        }

        let filing_status = doc
            .filing_status
            .ok_or(SerializationError::MissingField("IndividualReturnFilingStatusCd"))?;

        let spouse = doc.taxpayer.spouse.as_ref();
        let spouse_ssn = spouse.and_then(|s| s.ssn.as_deref()).and_then(format_id);
        if filing_status == FilingStatus::MarriedFilingJointly && spouse_ssn.is_none() {
            return Err(SerializationError::MissingField("SpouseSSN"));
        }

        Ok(Self {
            filing_status,
            primary_ssn,
            spouse_ssn,
            primary_name: normalize_text(&primary.full_name()),
            spouse_name: spouse.map(|s| normalize_text(&s.full_name())),
        })
    }

    /// Joint returns carry both names on the first name line
    fn name_line(&self, primary: &Person, spouse: Option<&Person>) -> String {
        match (self.filing_status, spouse) {
            (FilingStatus::MarriedFilingJointly, Some(spouse))
                if spouse.last_name.trim() == primary.last_name.trim() =>
            {
                normalize_text(&format!(
                    "{} & {} {}",
                    primary.first_name,
                    spouse.first_name,
                    primary.last_name
                ))
            }
            (FilingStatus::MarriedFilingJointly, Some(_)) => format!(
                "{} & {}",
                self.primary_name,
                self.spouse_name.as_deref().unwrap_or_default()
            ),
            _ => self.primary_name.clone(),
        }
    }
}

pub(crate) fn write(
    xml: &mut XmlBuilder,
    doc: &ReturnDocument,
    filer: &Filer,
    config: &SerializerConfig,
) -> Result<()> {
    let year = i32::from(config.tax_year);
    let period_begin = NaiveDate::from_ymd_opt(year, 1, 1);
    let period_end = NaiveDate::from_ymd_opt(year, 12, 31);
    if period_begin.is_none() || period_end.is_none() {
        return Err(SerializationError::InvalidConfig(format!(
            "tax year {year} has no calendar period"
        )));
    }

    xml.open_with("ReturnHeader", &[("binaryAttachmentCnt", "0")])?;
    if let Some(ts) = config.return_timestamp {
        xml.text("ReturnTs", &ts.to_rfc3339())?;
    }
    xml.text("TaxYr", &config.tax_year.to_string())?;
    xml.text("TaxPeriodBeginDt", &format_date(period_begin))?;
    xml.text("TaxPeriodEndDt", &format_date(period_end))?;
    xml.opt_text("SoftwareId", Some(config.software_id.as_str()))?;
    xml.opt_text("SoftwareVersionNum", Some(config.software_version.as_str()))?;

    xml.open("OriginatorGrp")?;
    xml.opt_text("EFIN", Some(digits_only(&config.originator_efin).as_str()))?;
    xml.text("OriginatorTypeCd", &config.originator_type)?;
    xml.close("OriginatorGrp")?;

    xml.text("PINTypeCd", config.pin_type.code())?;
    xml.text("JuratDisclosureCd", config.pin_type.jurat_code())?;
    let signatures = &doc.signatures;
    xml.opt_text("PrimarySignaturePINTxt", signatures.primary_pin.as_deref())?;
    if signatures.primary_pin.is_some() {
        xml.opt_text(
            "PrimarySignatureDt",
            Some(format_date(signatures.signature_date).as_str()),
        )?;
    }
    if filer.spouse_ssn.is_some() {
        xml.opt_text("SpouseSignaturePINTxt", signatures.spouse_pin.as_deref())?;
        if signatures.spouse_pin.is_some() {
            xml.opt_text(
                "SpouseSignatureDt",
                Some(format_date(signatures.signature_date).as_str()),
            )?;
        }
    }
    xml.text("ReturnTypeCd", "1040")?;

    write_filer(xml, doc, filer)?;
    xml.close("ReturnHeader")
}

fn write_filer(xml: &mut XmlBuilder, doc: &ReturnDocument, filer: &Filer) -> Result<()> {
    let taxpayer = &doc.taxpayer;
    let spouse = taxpayer.spouse.as_ref();

    xml.open("Filer")?;
    xml.text("PrimarySSN", &filer.primary_ssn)?;
    xml.opt_text("SpouseSSN", filer.spouse_ssn.as_deref())?;
    xml.text("NameLine1Txt", &filer.name_line(&taxpayer.primary, spouse))?;
    xml.text(
        "PrimaryNameControlTxt",
        &name_control(&taxpayer.primary.last_name),
    )?;
    if filer.spouse_ssn.is_some() {
        let control = spouse.map(|s| name_control(&s.last_name));
        xml.opt_text("SpouseNameControlTxt", control.as_deref())?;
    }

    if let Some(address) = &taxpayer.address {
        xml.open("USAddress")?;
        xml.text("AddressLine1Txt", &normalize_text(&address.line1))?;
        xml.opt_text(
            "AddressLine2Txt",
            address.line2.as_deref().map(normalize_text).as_deref(),
        )?;
        xml.text("CityNm", &normalize_text(&address.city))?;
        xml.text("StateAbbreviationCd", &address.state.trim().to_uppercase())?;
        xml.text("ZIPCd", &digits_only(&address.zip))?;
        xml.close("USAddress")?;
    }

    let phone = taxpayer.phone.as_deref().map(digits_only);
    xml.opt_text("PhoneNum", phone.as_deref())?;
    xml.opt_text("EmailAddressTxt", taxpayer.email.as_deref())?;
    xml.close("Filer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Taxpayer;

    fn person(first: &str, last: &str, ssn: &str) -> Person {
        Person {
            first_name: first.into(),
            last_name: last.into(),
            ssn: Some(ssn.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_joint_name_line_shares_last_name() {
        let doc = ReturnDocument {
            taxpayer: Taxpayer {
                primary: person("John", "Doe", "111-22-3333"),
                spouse: Some(person("Jane", "Doe", "444-55-6666")),
                ..Default::default()
            },
            filing_status: Some(FilingStatus::MarriedFilingJointly),
            ..Default::default()
        };
        let filer = Filer::resolve(&doc).unwrap();
        let line = filer.name_line(&doc.taxpayer.primary, doc.taxpayer.spouse.as_ref());
        assert_eq!(line, "John & Jane Doe");
        assert_eq!(filer.spouse_ssn.as_deref(), Some("444556666"));
    }

    #[test]
    fn test_joint_return_requires_spouse_ssn() {
        let doc = ReturnDocument {
            taxpayer: Taxpayer {
                primary: person("John", "Doe", "111-22-3333"),
                spouse: Some(person("Jane", "Doe", "bad")),
                ..Default::default()
            },
            filing_status: Some(FilingStatus::MarriedFilingJointly),
            ..Default::default()
        };
        assert!(matches!(
            Filer::resolve(&doc),
            Err(SerializationError::MissingField("SpouseSSN"))
        ));
    }

    #[test]
    fn test_invalid_spouse_ssn_is_omitted_for_separate_return() {
        let doc = ReturnDocument {
            taxpayer: Taxpayer {
                primary: person("John", "Doe", "111-22-3333"),
                spouse: Some(person("Jane", "Doe", "12345")),
                ..Default::default()
            },
            filing_status: Some(FilingStatus::MarriedFilingSeparately),
            ..Default::default()
        };
        let filer = Filer::resolve(&doc).unwrap();
        assert!(filer.spouse_ssn.is_none());
    }
}
