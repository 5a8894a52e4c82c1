mod config;
mod de;
mod ser;

pub use config::XmlConfig;
pub use de::from_str;
pub use ser::to_string;

use serde::{Deserialize, Serialize};

pub mod ns {
    pub const SOAP_ENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";
    pub const MEF_HEADER: &str = "http://www.irs.gov/a2a/mef/MeFHeader.xsd";
    pub const MEF_MSI: &str = "http://www.irs.gov/a2a/mef/MeFMSIServices.xsd";
    pub const MEF_TRANSMITTER: &str = "http://www.irs.gov/a2a/mef/MeFTransmitterService.xsd";
}

pub mod prefix {
    pub const SOAP_ENV: &str = "SOAP-ENV";
    pub const MEF_HEADER: &str = "mef";
    pub const MEF_MSI: &str = "msi";
    pub const MEF_TRANSMITTER: &str = "trans";
}

/// A SOAP 1.1 envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "Header", default)]
    header: Option<Header>,
    #[serde(rename = "Body")]
    body: Body<T>,
}

impl<T> Envelope<T> {
    pub fn new(body: T) -> Self {
        Self {
            header: None,
            body: Body { content: body },
        }
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.header = Some(header);
        self
    }

    pub fn body(&self) -> &T {
        &self.body.content
    }

    pub fn into_body(self) -> T {
        self.body.content
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// The `MeFHeader` block, when present
    pub fn mef_header(&self) -> Option<&MeFHeader> {
        self.header.as_ref().and_then(|h| h.mef_header.as_ref())
    }
}

impl<T: for<'a> Deserialize<'a>> Envelope<T> {
    /// Parse the envelope from a SOAP payload
    pub fn parse(xml: &str) -> Result<Self, quick_xml::DeError> {
        from_str(xml)
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serialize with the SOAP and MeF namespaces declared on the root
    pub fn serialize_soap(&self, pretty: bool) -> Result<String, quick_xml::SeError> {
        let config = XmlConfig::mef().pretty(pretty);
        to_string(&config, &ser::Prefixed(self))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Header {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename(serialize = "mef:MeFHeader", deserialize = "MeFHeader"), default)]
    pub mef_header: Option<MeFHeader>,
}

impl Header {
    pub fn mef(header: MeFHeader) -> Self {
        Self {
            mef_header: Some(header),
        }
    }
}

/// Routing and session data carried on every MeF message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeFHeader {
    #[serde(rename(serialize = "mef:MessageID", deserialize = "MessageID"))]
    pub message_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename(serialize = "mef:RelatesTo", deserialize = "RelatesTo"))]
    pub relates_to: Option<String>,

    #[serde(rename(serialize = "mef:Action", deserialize = "Action"))]
    pub action: String,

    /// RFC 3339 send time
    #[serde(rename(serialize = "mef:Timestamp", deserialize = "Timestamp"))]
    pub timestamp: String,

    #[serde(rename(serialize = "mef:ETIN", deserialize = "ETIN"))]
    pub etin: String,

    /// `Y` when the message rides on an established session
    #[serde(rename(serialize = "mef:SessionKeyCd", deserialize = "SessionKeyCd"))]
    pub session_indicator: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename(serialize = "mef:SessionToken", deserialize = "SessionToken"))]
    pub session_token: Option<String>,

    /// `T` on the assurance testing system, absent in production
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename(serialize = "mef:TestCd", deserialize = "TestCd"))]
    pub test_cd: Option<String>,

    #[serde(rename(serialize = "mef:AppSysID", deserialize = "AppSysID"))]
    pub app_sys_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body<T> {
    #[serde(rename = "$value")]
    pub content: T,
}

/// SOAP 1.1 fault
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    #[serde(rename = "faultcode", default)]
    pub code: String,

    #[serde(rename = "faultstring", default)]
    pub message: String,

    #[serde(rename = "detail", default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<FaultDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultDetail {
    #[serde(rename = "MeFErrorDetail", default, skip_serializing_if = "Option::is_none")]
    pub mef: Option<MeFErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeFErrorDetail {
    #[serde(rename = "ErrorMessageCd", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(rename = "ErrorMessageTxt", skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,

    /// `AUTHENTICATION_ERROR`, `REQUEST_ERROR`, `SYSTEM_ERROR`, ...
    #[serde(rename = "ErrorClassificationCd", skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
}

impl Fault {
    /// Fault code with any namespace prefix removed
    pub fn local_code(&self) -> &str {
        self.code
            .rsplit_once(':')
            .map_or(self.code.as_str(), |(_, local)| local)
    }

    pub fn error_code(&self) -> Option<&str> {
        self.mef_detail().and_then(|d| d.error_code.as_deref())
    }

    pub fn classification(&self) -> Option<&str> {
        self.mef_detail().and_then(|d| d.classification.as_deref())
    }

    fn mef_detail(&self) -> Option<&MeFErrorDetail> {
        self.detail.as_ref().and_then(|d| d.mef.as_ref())
    }
}
