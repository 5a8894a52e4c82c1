#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, SecondsFormat, Utc};
use mef_efile::{
    crypto::rsa::RsaPrivateKey,
    mef::{
        ClientSettings, Credentials, MefClient, PollOptions, RetryPolicy, SubmissionPayload,
        Transport, TransportError, TransportResult,
        messages::{
            GetAckResponse, LoginResponse, LogoutResponse, Response, SendSubmissionsResponse,
            ValidationErrorGrp, ValidationErrorList,
        },
    },
    model::{Address, FilingStatus, Form1040, FormW2, Owner, Person, ReturnDocument, Signatures, Taxpayer},
    pipeline::{Pipeline, SigningIdentity},
    serializer::SerializerConfig,
    soap::{Envelope, Fault, FaultDetail, MeFErrorDetail},
};
use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    hash::MessageDigest,
    pkey::PKey,
    rsa::Rsa,
    x509::{X509Builder, X509NameBuilder},
};
use rust_decimal_macros::dec;

pub const EFIN: &str = "123456";
pub const ETIN: &str = "54321";

pub fn serializer_config() -> SerializerConfig {
    let mut config = SerializerConfig::new(2024, "2024v5.0");
    config.software_id = "12345678".into();
    config.software_version = "1.0".into();
    config.originator_efin = EFIN.into();
    config
}

/// Fresh RSA key and matching self-signed certificate
pub fn signing_identity() -> SigningIdentity {
    let rsa = Rsa::generate(2048).unwrap();
    let pkey = PKey::from_rsa(rsa).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "Test Transmitter").unwrap();
    name.append_entry_by_text("O", "MeF Test").unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(7).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();
    let certificate = builder.build().to_der().unwrap();

    let key = RsaPrivateKey::from_pem(pkey.private_key_to_pem_pkcs8().unwrap()).unwrap();
    SigningIdentity::new(key, certificate)
}

fn address() -> Address {
    Address {
        line1: "1 Engine Way".into(),
        line2: None,
        city: "Springfield".into(),
        state: "IL".into(),
        zip: "62701".into(),
    }
}

pub fn single_filer() -> ReturnDocument {
    ReturnDocument {
        taxpayer: Taxpayer {
            primary: Person {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                ssn: Some("123-45-6789".into()),
                ..Default::default()
            },
            address: Some(address()),
            phone: Some("(217) 555-0100".into()),
            ..Default::default()
        },
        filing_status: Some(FilingStatus::Single),
        form_1040: Form1040 {
            wages: Some(dec!(75000)),
            total_income: Some(dec!(75000)),
            adjusted_gross_income: Some(dec!(75000)),
            standard_or_itemized_deduction: Some(dec!(14600)),
            total_deductions: Some(dec!(14600)),
            taxable_income: Some(dec!(60400)),
            tax: Some(dec!(8341)),
            total_tax: Some(dec!(8341)),
            w2_withholding: Some(dec!(9500)),
            total_withholding: Some(dec!(9500)),
            total_payments: Some(dec!(9500)),
            overpaid: Some(dec!(1159)),
            refund: Some(dec!(1159)),
            ..Default::default()
        },
        w2s: vec![FormW2 {
            employer_ein: "98-7654321".into(),
            employer_name: "Analytical Engines Ltd".into(),
            wages: Some(dec!(75000)),
            federal_withholding: Some(dec!(9500)),
            state: Some("IL".into()),
            state_wages: Some(dec!(75000)),
            state_withholding: Some(dec!(3712.50)),
            ..Default::default()
        }],
        signatures: Signatures {
            primary_pin: Some("12345".into()),
            spouse_pin: None,
            signature_date: NaiveDate::from_ymd_opt(2025, 2, 3),
        },
        ..Default::default()
    }
}

pub fn joint_filers() -> ReturnDocument {
    let mut doc = single_filer();
    doc.filing_status = Some(FilingStatus::MarriedFilingJointly);
    doc.taxpayer.spouse = Some(Person {
        first_name: "Charles".into(),
        last_name: "Babbage".into(),
        ssn: Some("234 56 7890".into()),
        ..Default::default()
    });
    doc.signatures.spouse_pin = Some("54321".into());
    doc.form_1040.wages = Some(dec!(130000));
    doc.w2s.push(FormW2 {
        owner: Owner::Spouse,
        employer_ein: "11-2223333".into(),
        employer_name: "Difference Works".into(),
        wages: Some(dec!(55000)),
        federal_withholding: Some(dec!(6100)),
        ..Default::default()
    });
    doc
}

/// Valid, unsigned payload for the single filer
pub fn payload() -> SubmissionPayload {
    Pipeline::new(serializer_config())
        .prepare(&single_filer())
        .unwrap()
        .payload()
}

pub fn settings() -> ClientSettings {
    let mut settings = ClientSettings::new(EFIN, ETIN);
    settings.app_sys_id = "APP01".into();
    settings.retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        multiplier: 2.0,
    };
    settings.poll = PollOptions {
        interval: Duration::from_millis(10),
        max_duration: Duration::from_millis(200),
    };
    settings
}

pub fn client(fake: &Arc<FakeMef>) -> MefClient<Arc<FakeMef>> {
    MefClient::new(
        Arc::clone(fake),
        settings(),
        Credentials::new("transmitter", "s3cret"),
    )
    .unwrap()
}

#[derive(Debug, Clone)]
pub struct Call {
    pub action: String,
    pub envelope: String,
}

/// Scripted behavior of [`FakeMef`]
#[derive(Debug, Default)]
pub struct Script {
    pub reject_login: bool,
    /// Stated lifetime of issued sessions; none stated when unset
    pub session_lifetime: Option<Duration>,
    /// Returned, in order, before any reply
    pub transport_failures: VecDeque<TransportError>,
    /// Session-bound calls answered with a session-expired fault
    pub expire_sessions: usize,
    /// Acceptance status per GetAck; the last one repeats, `Pending` when empty
    pub ack_statuses: VecDeque<&'static str>,
    pub ack_errors: Vec<ValidationErrorGrp>,
    pub fail_logout: bool,
}

/// In-memory MeF endpoint
#[derive(Debug, Default)]
pub struct FakeMef {
    calls: Mutex<Vec<Call>>,
    script: Mutex<Script>,
    logins: Mutex<usize>,
}

impl FakeMef {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.action.clone())
            .collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.action == action)
            .count()
    }

    pub fn envelopes(&self, action: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.action == action)
            .map(|c| c.envelope.clone())
            .collect()
    }

    fn reply(&self, action: &str, envelope: &str) -> Result<Response, TransportError> {
        let mut script = self.script.lock().unwrap();
        if let Some(error) = script.transport_failures.pop_front() {
            return Err(error);
        }

        let response = match action {
            "Login" if script.reject_login => fault(
                "Client",
                "INVALID_CREDENTIALS",
                "AUTHENTICATION_ERROR",
                "User ID or password is incorrect",
            ),
            "Login" => {
                let mut logins = self.logins.lock().unwrap();
                *logins += 1;
                Response::LoginResponse(LoginResponse {
                    status: Some("Success".into()),
                    session_token: format!("token-{logins}"),
                    expires_at: script.session_lifetime.map(|lifetime| {
                        (Utc::now() + lifetime).to_rfc3339_opts(SecondsFormat::Secs, true)
                    }),
                })
            }
            "SendSubmissions" | "GetAck" if script.expire_sessions > 0 => {
                script.expire_sessions -= 1;
                fault(
                    "Client",
                    "SESSION_EXPIRED",
                    "AUTHENTICATION_ERROR",
                    "The session has expired",
                )
            }
            "SendSubmissions" => Response::SendSubmissionsResponse(SendSubmissionsResponse {
                submission_id: element_text(envelope, "trans:SubmissionId"),
                received_at: Some("2025-02-03T09:30:00Z".into()),
            }),
            "GetAck" => {
                let status = if script.ack_statuses.len() > 1 {
                    script.ack_statuses.pop_front()
                } else {
                    script.ack_statuses.front().copied()
                }
                .unwrap_or("Pending");
                let errors = (status == "Rejected").then(|| ValidationErrorList {
                    groups: script.ack_errors.clone(),
                });
                Response::GetAckResponse(GetAckResponse {
                    submission_id: element_text(envelope, "trans:SubmissionId"),
                    status: status.into(),
                    errors,
                    dcn: (status == "Accepted").then(|| "00123456789012".into()),
                })
            }
            "Logout" if script.fail_logout => fault(
                "Client",
                "LOGOUT_FAILED",
                "REQUEST_ERROR",
                "Unable to close session",
            ),
            "Logout" => Response::LogoutResponse(LogoutResponse {
                status: Some("Success".into()),
            }),
            other => fault("Client", "UNKNOWN_ACTION", "REQUEST_ERROR", other),
        };
        Ok(response)
    }
}

#[async_trait]
impl Transport for FakeMef {
    async fn call(&self, action: &str, envelope: String) -> TransportResult {
        let response = self.reply(action, &envelope);
        self.calls.lock().unwrap().push(Call {
            action: action.to_owned(),
            envelope,
        });
        Envelope::new(response?)
            .serialize_soap(false)
            .map_err(|e| TransportError::Connect(e.to_string()))
    }
}

pub fn fault(code: &str, error_code: &str, classification: &str, text: &str) -> Response {
    Response::Fault(Fault {
        code: format!("SOAP-ENV:{code}"),
        message: text.into(),
        detail: Some(FaultDetail {
            mef: Some(MeFErrorDetail {
                error_code: Some(error_code.into()),
                error_text: Some(text.into()),
                classification: Some(classification.into()),
            }),
        }),
    })
}

/// Text of the first `name` element, empty when absent
pub fn element_text(xml: &str, name: &str) -> String {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    xml.split_once(open.as_str())
        .and_then(|(_, rest)| rest.split_once(close.as_str()))
        .map(|(text, _)| text.to_owned())
        .unwrap_or_default()
}
