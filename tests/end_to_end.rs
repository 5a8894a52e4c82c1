mod common;

use common::{FakeMef, client, joint_filers, serializer_config, signing_identity, single_filer};
use mef_efile::{
    Error,
    mef::{AckStatus, ClientState},
    pipeline::Pipeline,
    signature,
    validation::{FormType, SchemaValidator, codes},
};

#[test]
fn test_single_w2_single_filer_prepares_signed_return() {
    let pipeline = Pipeline::new(serializer_config()).with_identity(signing_identity());
    let prepared = pipeline.prepare(&single_filer()).unwrap();
    let xml = prepared.xml();

    assert!(xml.contains("<PrimarySSN>123456789</PrimarySSN>"));
    assert!(xml.contains("<IndividualReturnFilingStatusCd>1</IndividualReturnFilingStatusCd>"));
    assert!(xml.contains("<EmployerEIN>987654321</EmployerEIN>"));
    assert!(xml.contains("<StateIncomeTaxAmt>3713</StateIncomeTaxAmt>"));
    assert!(xml.contains(r#"<ReturnData documentCnt="2">"#));
    assert_eq!(prepared.document_count(), 2);
    assert_eq!(prepared.tax_year(), 2024);

    let block = prepared.signature().expect("return should be signed");
    assert!(!block.digest_value().is_empty());
    assert!(signature::verify(xml).valid);

    let result = SchemaValidator::new(2024).unwrap().validate(xml, FormType::Return1040);
    assert!(result.valid, "{:?}", result.errors);
}

#[test]
fn test_joint_filers_with_two_w2s() {
    let prepared = Pipeline::new(serializer_config())
        .prepare(&joint_filers())
        .unwrap();
    let xml = prepared.xml();

    assert!(xml.contains("<IndividualReturnFilingStatusCd>2</IndividualReturnFilingStatusCd>"));
    assert!(xml.contains("<SpouseSSN>234567890</SpouseSSN>"));
    assert_eq!(xml.matches("<IRSW2").count(), 2);
    assert!(xml.contains("<EmployeeSSN>123456789</EmployeeSSN>"));
    assert!(xml.contains("<EmployeeSSN>234567890</EmployeeSSN>"));
    assert!(xml.contains(r#"<ReturnData documentCnt="3">"#));
    assert!(prepared.signature().is_none());

    let result = SchemaValidator::new(2024).unwrap().validate(xml, FormType::Return1040);
    assert!(result.valid, "{:?}", result.errors);
}

#[test]
fn test_invalid_return_never_reaches_the_wire() {
    let mut doc = single_filer();
    doc.taxpayer.address.as_mut().unwrap().state = "XX".into();

    let err = Pipeline::new(serializer_config()).prepare(&doc).unwrap_err();
    let Error::Validation(result) = err else {
        panic!("expected a validation failure, got {err:?}");
    };
    assert!(result.has_code(codes::ENUMERATION_ERROR));
}

#[test]
fn test_missing_primary_ssn_is_a_serialization_error() {
    let mut doc = single_filer();
    doc.taxpayer.primary.ssn = None;
    assert!(matches!(
        Pipeline::new(serializer_config()).prepare(&doc),
        Err(Error::Serialization(_))
    ));
}

#[tokio::test]
async fn test_prepare_submit_and_acknowledge() {
    let fake = FakeMef::new();
    fake.script(|s| s.ack_statuses.extend(["Pending", "Accepted"]));
    let client = client(&fake);

    let pipeline = Pipeline::new(serializer_config()).with_identity(signing_identity());
    let receipt = pipeline.submit(&client, &single_filer()).await.unwrap();
    assert_eq!(receipt.submission_id().len(), 20);
    assert_eq!(client.state().await, ClientState::Submitted);

    let ack = client
        .poll_acknowledgment(receipt.submission_id(), std::future::pending())
        .await
        .unwrap();
    assert_eq!(ack.status(), AckStatus::Accepted);
    assert_eq!(ack.dcn(), Some("00123456789012"));
    assert_eq!(client.state().await, ClientState::Acknowledged);

    client.shutdown().await;
    assert_eq!(
        fake.actions(),
        ["Login", "SendSubmissions", "GetAck", "GetAck", "Logout"]
    );
}
