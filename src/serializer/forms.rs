use rust_decimal::Decimal;

use crate::model::{
    AccountType, Form1040, Form1099R, FormW2, Owner, PayerAmount, ReturnDocument, Schedule1,
    ScheduleB, ScheduleD,
};
use crate::serializer::SerializationError;
use crate::serializer::format::{digits_only, format_id, name_control, normalize_text};
use crate::serializer::header::Filer;
use crate::serializer::writer::XmlBuilder;

type Result<T> = std::result::Result<T, SerializationError>;

/// One document under `ReturnData`, in schema order
pub(crate) enum Document<'a> {
    Irs1040,
    Schedule1(&'a Schedule1),
    ScheduleB(&'a ScheduleB),
    ScheduleD(&'a ScheduleD),
    W2(&'a FormW2),
    Irs1099R(&'a Form1099R),
}

impl Document<'_> {
    fn element(&self) -> &'static str {
        match self {
            Document::Irs1040 => "IRS1040",
            Document::Schedule1(_) => "IRS1040Schedule1",
            Document::ScheduleB(_) => "IRS1040ScheduleB",
            Document::ScheduleD(_) => "IRS1040ScheduleD",
            Document::W2(_) => "IRSW2",
            Document::Irs1099R(_) => "IRS1099R",
        }
    }
}

/// Lay out the documents that have data. Empty schedules are dropped.
pub(crate) fn plan(doc: &ReturnDocument) -> Vec<Document<'_>> {
    let mut documents = vec![Document::Irs1040];
    if let Some(schedule) = doc.schedule_1.as_ref().filter(|s| !schedule_1_is_empty(s)) {
        documents.push(Document::Schedule1(schedule));
    }
    if let Some(schedule) = doc.schedule_b.as_ref().filter(|s| !schedule_b_is_empty(s)) {
        documents.push(Document::ScheduleB(schedule));
    }
    if let Some(schedule) = doc.schedule_d.as_ref().filter(|s| !schedule_d_is_empty(s)) {
        documents.push(Document::ScheduleD(schedule));
    }
    documents.extend(doc.w2s.iter().map(Document::W2));
    documents.extend(doc.form_1099rs.iter().map(Document::Irs1099R));
    documents
}

fn any_amount(amounts: &[Option<Decimal>]) -> bool {
    amounts.iter().any(Option::is_some)
}

fn schedule_1_is_empty(s: &Schedule1) -> bool {
    !any_amount(&[
        s.taxable_refunds,
        s.business_income,
        s.unemployment_compensation,
        s.other_income,
        s.total_additional_income,
        s.educator_expenses,
        s.hsa_deduction,
        s.student_loan_interest,
        s.ira_deduction,
        s.total_adjustments,
    ])
}

fn schedule_b_is_empty(s: &ScheduleB) -> bool {
    s.interest.is_empty()
        && s.dividends.is_empty()
        && !s.foreign_account
        && !any_amount(&[s.total_interest, s.taxable_interest, s.total_ordinary_dividends])
}

fn schedule_d_is_empty(s: &ScheduleD) -> bool {
    !any_amount(&[
        s.short_term_gain_loss,
        s.short_term_carryover,
        s.net_short_term,
        s.long_term_gain_loss,
        s.capital_gain_distributions,
        s.long_term_carryover,
        s.net_long_term,
        s.net_gain_loss,
    ])
}

pub(crate) fn write(
    xml: &mut XmlBuilder,
    doc: &ReturnDocument,
    filer: &Filer,
    documents: &[Document<'_>],
) -> Result<()> {
    for (index, document) in documents.iter().enumerate() {
        let element = document.element();
        let document_id = format!("{element}-{}", index + 1);
        xml.open_with(element, &[("documentId", document_id.as_str())])?;
        match document {
            Document::Irs1040 => write_1040(xml, doc, filer)?,
            Document::Schedule1(schedule) => write_schedule_1(xml, schedule)?,
            Document::ScheduleB(schedule) => write_schedule_b(xml, schedule)?,
            Document::ScheduleD(schedule) => write_schedule_d(xml, schedule)?,
            Document::W2(w2) => write_w2(xml, doc, filer, w2)?,
            Document::Irs1099R(form) => write_1099r(xml, doc, filer, form)?,
        }
        xml.close(element)?;
    }
    Ok(())
}

fn write_1040(xml: &mut XmlBuilder, doc: &ReturnDocument, filer: &Filer) -> Result<()> {
    let f: &Form1040 = &doc.form_1040;
    xml.text(
        "IndividualReturnFilingStatusCd",
        &filer.filing_status.code().to_string(),
    )?;
    xml.amount("WagesAmt", f.wages)?;
    xml.opt_amount("TaxExemptInterestAmt", f.tax_exempt_interest)?;
    xml.opt_amount("TaxableInterestAmt", f.taxable_interest)?;
    xml.opt_amount("QualifiedDividendsAmt", f.qualified_dividends)?;
    xml.opt_amount("OrdinaryDividendsAmt", f.ordinary_dividends)?;
    xml.opt_amount("IRADistributionsAmt", f.ira_distributions)?;
    xml.opt_amount("TaxableIRAAmt", f.taxable_ira)?;
    xml.opt_amount("PensionsAnnuitiesAmt", f.pensions_annuities)?;
    xml.opt_amount("TotalTaxablePensionsAmt", f.taxable_pensions)?;
    xml.opt_amount("SocSecBnftAmt", f.social_security_benefits)?;
    xml.opt_amount("TaxableSocSecAmt", f.taxable_social_security)?;
    xml.opt_amount("CapitalGainLossAmt", f.capital_gain_loss)?;
    xml.opt_amount("TotalAdditionalIncomeAmt", f.additional_income)?;
    xml.amount("TotalIncomeAmt", f.total_income)?;
    xml.opt_amount("TotalAdjustmentsAmt", f.adjustments)?;
    xml.amount("AdjustedGrossIncomeAmt", f.adjusted_gross_income)?;
    xml.opt_amount("TotalItemizedOrStandardDedAmt", f.standard_or_itemized_deduction)?;
    xml.opt_amount("QualifiedBusinessIncomeDedAmt", f.qbi_deduction)?;
    xml.opt_amount("TotalDeductionsAmt", f.total_deductions)?;
    xml.amount("TaxableIncomeAmt", f.taxable_income)?;
    xml.opt_amount("TaxAmt", f.tax)?;
    xml.opt_amount("CTCODCAmt", f.child_tax_credit)?;
    xml.opt_amount("TotalCreditsAmt", f.total_credits)?;
    xml.amount("TotalTaxAmt", f.total_tax)?;
    xml.opt_amount("FormW2WithheldTaxAmt", f.w2_withholding)?;
    xml.opt_amount("Form1099WithheldTaxAmt", f.form_1099_withholding)?;
    xml.amount("WithholdingTaxAmt", f.total_withholding)?;
    xml.opt_amount("EstimatedTaxPaymentsAmt", f.estimated_payments)?;
    xml.opt_amount("EarnedIncomeCreditAmt", f.earned_income_credit)?;
    xml.amount("TotalPaymentsAmt", f.total_payments)?;
    xml.opt_amount("OverpaidAmt", f.overpaid)?;
    xml.opt_amount("RefundAmt", f.refund)?;

    let has_refund = f.refund.is_some_and(|refund| refund > Decimal::ZERO);
    if let Some(deposit) = doc.direct_deposit.as_ref().filter(|_| has_refund) {
        xml.text("RoutingTransitNum", &digits_only(&deposit.routing_number))?;
        let account_type = match deposit.account_type {
            AccountType::Checking => "1",
            AccountType::Savings => "2",
        };
        xml.text("BankAccountTypeCd", account_type)?;
        xml.text("DepositorAccountNum", deposit.account_number.trim())?;
    }
    xml.opt_amount("OwedAmt", f.amount_owed)
}

fn write_schedule_1(xml: &mut XmlBuilder, s: &Schedule1) -> Result<()> {
    xml.opt_amount("TaxableRefundsCreditsOffsetsAmt", s.taxable_refunds)?;
    xml.opt_amount("BusinessIncomeLossAmt", s.business_income)?;
    xml.opt_amount("UnemploymentCompAmt", s.unemployment_compensation)?;
    xml.opt_amount("TotalOtherIncomeAmt", s.other_income)?;
    xml.amount("TotalAdditionalIncomeAmt", s.total_additional_income)?;
    xml.opt_amount("EducatorExpensesAmt", s.educator_expenses)?;
    xml.opt_amount("HealthSavingsAccountDedAmt", s.hsa_deduction)?;
    xml.opt_amount("StudentLoanInterestDedAmt", s.student_loan_interest)?;
    xml.opt_amount("IRADeductionAmt", s.ira_deduction)?;
    xml.amount("TotalAdjustmentsAmt", s.total_adjustments)
}

fn write_payers(xml: &mut XmlBuilder, group: &str, amount: &str, payers: &[PayerAmount]) -> Result<()> {
    for payer in payers {
        xml.open(group)?;
        xml.text("PayerName", &normalize_text(&payer.payer_name))?;
        xml.amount(amount, payer.amount)?;
        xml.close(group)?;
    }
    Ok(())
}

fn write_schedule_b(xml: &mut XmlBuilder, s: &ScheduleB) -> Result<()> {
    write_payers(xml, "InterestPayerGrp", "InterestAmt", &s.interest)?;
    if !s.interest.is_empty() || s.total_interest.is_some() {
        xml.amount("TotalInterestAmt", s.total_interest)?;
        xml.amount("TaxableInterestAmt", s.taxable_interest.or(s.total_interest))?;
    }
    write_payers(xml, "DividendPayerGrp", "OrdinaryDividendsAmt", &s.dividends)?;
    if !s.dividends.is_empty() || s.total_ordinary_dividends.is_some() {
        xml.amount("TotalOrdinaryDividendsAmt", s.total_ordinary_dividends)?;
    }
    xml.checkbox("ForeignAccountsQuestionInd", s.foreign_account)
}

fn write_schedule_d(xml: &mut XmlBuilder, s: &ScheduleD) -> Result<()> {
    xml.opt_amount("ShortTermGainLossAmt", s.short_term_gain_loss)?;
    xml.opt_amount("ShortTermCapitalLossCarryoverAmt", s.short_term_carryover)?;
    xml.amount("NetSTCapitalGainOrLossAmt", s.net_short_term)?;
    xml.opt_amount("LongTermGainLossAmt", s.long_term_gain_loss)?;
    xml.opt_amount("CapitalGainDistributionsAmt", s.capital_gain_distributions)?;
    xml.opt_amount("LongTermCapitalLossCarryoverAmt", s.long_term_carryover)?;
    xml.amount("NetLTCapitalGainOrLossAmt", s.net_long_term)?;
    xml.amount("NetCapitalGainOrLossAmt", s.net_gain_loss)
}

/// SSN and display name of the owner of an information return
fn recipient<'a>(doc: &'a ReturnDocument, filer: &'a Filer, owner: Owner) -> (Option<&'a str>, Option<String>) {
    match owner {
        Owner::Primary => (
            Some(filer.primary_ssn.as_str()),
            Some(normalize_text(&doc.taxpayer.primary.full_name())),
        ),
        Owner::Spouse => (filer.spouse_ssn.as_deref(), filer.spouse_name.clone()),
    }
}

fn write_w2(xml: &mut XmlBuilder, doc: &ReturnDocument, filer: &Filer, w2: &FormW2) -> Result<()> {
    let (ssn, name) = recipient(doc, filer, w2.owner);
    xml.opt_text("EmployeeSSN", ssn)?;
    xml.opt_text("EmployerEIN", format_id(&w2.employer_ein).as_deref())?;
    let employer_name = normalize_text(&w2.employer_name);
    xml.text("EmployerNameControlTxt", &name_control(&employer_name))?;
    xml.open("EmployerName")?;
    xml.text("BusinessNameLine1Txt", &employer_name)?;
    xml.close("EmployerName")?;
    if let Some(address) = &w2.employer_address {
        xml.open("EmployerUSAddress")?;
        xml.text("AddressLine1Txt", &normalize_text(&address.line1))?;
        xml.text("CityNm", &normalize_text(&address.city))?;
        xml.text("StateAbbreviationCd", &address.state.trim().to_uppercase())?;
        xml.text("ZIPCd", &digits_only(&address.zip))?;
        xml.close("EmployerUSAddress")?;
    }
    xml.opt_text("EmployeeNm", name.as_deref())?;
    xml.amount("WagesAmt", w2.wages)?;
    xml.amount("WithholdingAmt", w2.federal_withholding)?;
    xml.opt_amount("SocialSecurityWagesAmt", w2.social_security_wages)?;
    xml.opt_amount("SocialSecurityTaxAmt", w2.social_security_tax)?;
    xml.opt_amount("MedicareWagesAndTipsAmt", w2.medicare_wages)?;
    xml.opt_amount("MedicareTaxWithheldAmt", w2.medicare_tax)?;

    if let Some(state) = w2.state.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        xml.open("W2StateLocalTaxGrp")?;
        xml.open("W2StateTaxGrp")?;
        xml.text("StateAbbreviationCd", &state.to_uppercase())?;
        xml.opt_amount("StateWagesAmt", w2.state_wages)?;
        xml.opt_amount("StateIncomeTaxAmt", w2.state_withholding)?;
        xml.close("W2StateTaxGrp")?;
        xml.close("W2StateLocalTaxGrp")?;
    }
    Ok(())
}

fn write_1099r(
    xml: &mut XmlBuilder,
    doc: &ReturnDocument,
    filer: &Filer,
    form: &Form1099R,
) -> Result<()> {
    let payer_name = normalize_text(&form.payer_name);
    xml.text("PayerNameControlTxt", &name_control(&payer_name))?;
    xml.open("PayerName")?;
    xml.text("BusinessNameLine1Txt", &payer_name)?;
    xml.close("PayerName")?;
    xml.opt_text("PayerEIN", format_id(&form.payer_ein).as_deref())?;
    let (ssn, name) = recipient(doc, filer, form.owner);
    xml.opt_text("RecipientSSN", ssn)?;
    xml.opt_text("RecipientNm", name.as_deref())?;
    xml.amount("GrossDistributionAmt", form.gross_distribution)?;
    xml.opt_amount("TaxableAmt", form.taxable_amount)?;
    xml.opt_amount("FederalIncomeTaxWithheldAmt", form.federal_withholding)?;
    xml.opt_text("F1099RDistributionCd", form.distribution_code.as_deref())?;
    xml.checkbox("IRASEPSIMPLEInd", form.ira_sep_simple)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FilingStatus, Person, Taxpayer};
    use rust_decimal_macros::dec;

    fn doc() -> ReturnDocument {
        ReturnDocument {
            taxpayer: Taxpayer {
                primary: Person {
                    first_name: "Ada".into(),
                    last_name: "Lovelace".into(),
                    ssn: Some("123456789".into()),
                    ..Default::default()
                },
                ..Default::default()
            },
            filing_status: Some(FilingStatus::Single),
            ..Default::default()
        }
    }

    fn render(doc: &ReturnDocument) -> String {
        let filer = Filer::resolve(doc).unwrap();
        let documents = plan(doc);
        let mut xml = XmlBuilder::new(false);
        xml.open("ReturnData").unwrap();
        write(&mut xml, doc, &filer, &documents).unwrap();
        xml.close("ReturnData").unwrap();
        xml.finish().unwrap()
    }

    #[test]
    fn test_empty_schedules_are_omitted() {
        let mut doc = doc();
        doc.schedule_b = Some(ScheduleB::default());
        doc.schedule_d = Some(ScheduleD::default());
        doc.schedule_1 = Some(Schedule1::default());

        let documents = plan(&doc);
        assert_eq!(documents.len(), 1);
        let xml = render(&doc);
        assert!(!xml.contains("IRS1040ScheduleB"));
        assert!(!xml.contains("IRS1040ScheduleD"));
    }

    #[test]
    fn test_schedule_b_payers() {
        let mut doc = doc();
        doc.schedule_b = Some(ScheduleB {
            interest: vec![
                PayerAmount {
                    payer_name: "First Bank".into(),
                    amount: Some(dec!(1200.40)),
                },
                PayerAmount {
                    payer_name: "Credit Union".into(),
                    amount: Some(dec!(300.60)),
                },
            ],
            total_interest: Some(dec!(1501)),
            ..Default::default()
        });

        let xml = render(&doc);
        assert!(xml.contains(r#"<IRS1040ScheduleB documentId="IRS1040ScheduleB-2">"#));
        assert_eq!(xml.matches("<InterestPayerGrp>").count(), 2);
        assert!(xml.contains("<InterestAmt>1200</InterestAmt>"));
        assert!(xml.contains("<InterestAmt>301</InterestAmt>"));
        assert!(xml.contains("<TaxableInterestAmt>1501</TaxableInterestAmt>"));
        assert!(!xml.contains("TotalOrdinaryDividendsAmt"));
    }

    #[test]
    fn test_1040_element_order_is_fixed() {
        let mut doc = doc();
        doc.form_1040 = Form1040 {
            total_payments: Some(dec!(10)),
            wages: Some(dec!(20)),
            adjusted_gross_income: Some(dec!(30)),
            ..Default::default()
        };
        let xml = render(&doc);
        let pos = |needle: &str| xml.find(needle).unwrap();
        assert!(pos("<IndividualReturnFilingStatusCd>") < pos("<WagesAmt>"));
        assert!(pos("<WagesAmt>") < pos("<AdjustedGrossIncomeAmt>"));
        assert!(pos("<AdjustedGrossIncomeAmt>") < pos("<TotalPaymentsAmt>"));
    }

    #[test]
    fn test_direct_deposit_requires_refund() {
        let mut doc = doc();
        doc.direct_deposit = Some(crate::model::DirectDeposit {
            routing_number: "021000021".into(),
            account_number: "000123456789".into(),
            account_type: AccountType::Savings,
        });
        assert!(!render(&doc).contains("RoutingTransitNum"));

        doc.form_1040.refund = Some(dec!(250));
        let xml = render(&doc);
        assert!(xml.contains("<RoutingTransitNum>021000021</RoutingTransitNum>"));
        assert!(xml.contains("<BankAccountTypeCd>2</BankAccountTypeCd>"));
    }

    #[test]
    fn test_w2_with_invalid_ein_omits_field() {
        let mut doc = doc();
        doc.w2s.push(FormW2 {
            employer_ein: "12-34".into(),
            employer_name: "Smith & Sons".into(),
            wages: Some(dec!(100)),
            ..Default::default()
        });
        let xml = render(&doc);
        assert!(!xml.contains("EmployerEIN"));
        assert!(xml.contains("<BusinessNameLine1Txt>Smith &amp; Sons</BusinessNameLine1Txt>"));
        assert!(xml.contains("<EmployerNameControlTxt>SMIT</EmployerNameControlTxt>"));
        assert!(xml.contains("<EmployeeSSN>123456789</EmployeeSSN>"));
    }

    #[test]
    fn test_1099r_document() {
        let mut doc = doc();
        doc.form_1099rs.push(Form1099R {
            payer_ein: "11-1111111".into(),
            payer_name: "Pension Trust".into(),
            gross_distribution: Some(dec!(5000)),
            taxable_amount: Some(dec!(5000)),
            distribution_code: Some("7".into()),
            ira_sep_simple: true,
            ..Default::default()
        });
        let xml = render(&doc);
        assert!(xml.contains(r#"<IRS1099R documentId="IRS1099R-2">"#));
        assert!(xml.contains("<F1099RDistributionCd>7</F1099RDistributionCd>"));
        assert!(xml.contains("<IRASEPSIMPLEInd>X</IRASEPSIMPLEInd>"));
    }
}
