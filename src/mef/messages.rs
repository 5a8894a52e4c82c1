//! Request and response bodies of the MeF services used by the client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::soap::Fault;

/// Outgoing body, serialized as the element of the variant
#[derive(Debug, Clone, Serialize)]
pub enum Request {
    #[serde(rename = "msi:LoginRequest")]
    Login(LoginRequest),
    #[serde(rename = "trans:SendSubmissionsRequest")]
    SendSubmissions(SendSubmissionsRequest),
    #[serde(rename = "trans:GetAckRequest")]
    GetAck(GetAckRequest),
    #[serde(rename = "msi:LogoutRequest")]
    Logout(LogoutRequest),
}

impl Request {
    /// `Action` header and `SOAPAction` value
    pub fn action(&self) -> &'static str {
        match self {
            Request::Login(_) => "Login",
            Request::SendSubmissions(_) => "SendSubmissions",
            Request::GetAck(_) => "GetAck",
            Request::Logout(_) => "Logout",
        }
    }
}

/// Incoming body, matched on the element's local name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    LoginResponse(LoginResponse),
    SendSubmissionsResponse(SendSubmissionsResponse),
    GetAckResponse(GetAckResponse),
    LogoutResponse(LogoutResponse),
    Fault(Fault),
}

impl Response {
    pub fn name(&self) -> &'static str {
        match self {
            Response::LoginResponse(_) => "LoginResponse",
            Response::SendSubmissionsResponse(_) => "SendSubmissionsResponse",
            Response::GetAckResponse(_) => "GetAckResponse",
            Response::LogoutResponse(_) => "LogoutResponse",
            Response::Fault(_) => "Fault",
        }
    }
}

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    #[serde(rename = "msi:UserId")]
    pub user_id: String,
    #[serde(rename = "msi:Password")]
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("user_id", &self.user_id)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginResponse {
    #[serde(rename = "StatusTxt", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "SessionToken")]
    pub session_token: String,
    /// RFC 3339
    #[serde(rename = "SessionExpirationTs", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendSubmissionsRequest {
    #[serde(rename = "trans:SubmissionId")]
    pub submission_id: String,
    #[serde(rename = "trans:TaxYr")]
    pub tax_year: u16,
    /// Base64 of the return XML
    #[serde(rename = "trans:SubmissionDataTxt")]
    pub payload: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendSubmissionsResponse {
    #[serde(rename = "SubmissionId")]
    pub submission_id: String,
    #[serde(rename = "SubmissionReceivedTs", skip_serializing_if = "Option::is_none")]
    pub received_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetAckRequest {
    #[serde(rename = "trans:SubmissionId")]
    pub submission_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetAckResponse {
    #[serde(rename = "SubmissionId")]
    pub submission_id: String,
    /// `Accepted`, `Rejected`, `Exception` or `Pending`
    #[serde(rename = "AcceptanceStatusTxt")]
    pub status: String,
    #[serde(rename = "ValidationErrorList", skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrorList>,
    #[serde(rename = "DCN", skip_serializing_if = "Option::is_none")]
    pub dcn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorList {
    #[serde(rename = "ValidationErrorGrp", default)]
    pub groups: Vec<ValidationErrorGrp>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationErrorGrp {
    #[serde(rename = "RuleNum")]
    pub rule_number: String,
    #[serde(rename = "SeverityCd")]
    pub severity: String,
    #[serde(rename = "ErrorMessageTxt")]
    pub message: String,
    #[serde(rename = "FieldValueTxt", skip_serializing_if = "Option::is_none")]
    pub field_value: Option<String>,
    #[serde(rename = "XpathContentTxt", skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LogoutRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoutResponse {
    #[serde(rename = "StatusTxt", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::{Envelope, Header, MeFHeader};

    #[test]
    fn test_request_uses_service_prefixes() {
        let request = Request::GetAck(GetAckRequest {
            submission_id: "12345620250340000abc".into(),
        });
        let xml = Envelope::new(&request)
            .with_header(Header::mef(MeFHeader::default()))
            .serialize_soap(false)
            .unwrap();

        assert_eq!(request.action(), "GetAck");
        assert!(xml.contains(
            "<trans:GetAckRequest><trans:SubmissionId>12345620250340000abc</trans:SubmissionId></trans:GetAckRequest>"
        ));
    }

    #[test]
    fn test_login_request_debug_redacts_password() {
        let request = LoginRequest {
            user_id: "user".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{request:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_parse_ack_response() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <trans:GetAckResponse xmlns:trans="http://www.irs.gov/a2a/mef/MeFTransmitterService.xsd">
      <trans:SubmissionId>12345620250340000abc</trans:SubmissionId>
      <trans:AcceptanceStatusTxt>Rejected</trans:AcceptanceStatusTxt>
      <trans:ValidationErrorList>
        <trans:ValidationErrorGrp>
          <trans:RuleNum>IND-031-04</trans:RuleNum>
          <trans:SeverityCd>Reject and Stop</trans:SeverityCd>
          <trans:ErrorMessageTxt>Primary SSN and name control do not match</trans:ErrorMessageTxt>
        </trans:ValidationErrorGrp>
        <trans:ValidationErrorGrp>
          <trans:RuleNum>R0000-504-02</trans:RuleNum>
          <trans:SeverityCd>Reject</trans:SeverityCd>
          <trans:ErrorMessageTxt>Dependent SSN already used</trans:ErrorMessageTxt>
          <trans:XpathContentTxt>/Return/ReturnData/IRS1040</trans:XpathContentTxt>
        </trans:ValidationErrorGrp>
      </trans:ValidationErrorList>
    </trans:GetAckResponse>
  </soapenv:Body>
</soapenv:Envelope>"#;

        let Response::GetAckResponse(ack) = Envelope::<Response>::parse(xml).unwrap().into_body()
        else {
            panic!("expected an acknowledgment");
        };
        assert_eq!(ack.status, "Rejected");
        assert!(ack.dcn.is_none());

        let groups = ack.errors.unwrap().groups;
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].rule_number, "IND-031-04");
        assert_eq!(groups[1].xpath.as_deref(), Some("/Return/ReturnData/IRS1040"));
    }

    #[test]
    fn test_response_round_trip() {
        let response = Response::LoginResponse(LoginResponse {
            status: Some("Success".into()),
            session_token: "abc".into(),
            expires_at: Some("2025-02-03T10:00:00Z".into()),
        });
        let xml = Envelope::new(response.clone()).serialize_soap(true).unwrap();
        let parsed = Envelope::<Response>::parse(&xml).unwrap();
        assert_eq!(parsed.into_body(), response);
    }
}
