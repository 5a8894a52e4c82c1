use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::PollConfig;
use crate::mef::MefError;
use crate::mef::messages::{GetAckResponse, ValidationErrorGrp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Accepted,
    Rejected,
    Pending,
}

impl AckStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AckStatus::Pending)
    }

    /// Map an `AcceptanceStatusTxt` value
    pub fn from_status_text(text: &str) -> Option<Self> {
        match text.trim() {
            // accepted with an alert on a non-fatal rule
            "Accepted" | "A" | "Exception" | "E" => Some(AckStatus::Accepted),
            "Rejected" | "R" => Some(AckStatus::Rejected),
            "Pending" | "Received" | "P" | "" => Some(AckStatus::Pending),
            _ => None,
        }
    }
}

/// One business-rule failure reported in an acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcknowledgmentError {
    pub rule_number: String,
    pub severity: String,
    pub message: String,
    pub field_value: Option<String>,
    pub xpath: Option<String>,
}

impl From<ValidationErrorGrp> for AcknowledgmentError {
    fn from(group: ValidationErrorGrp) -> Self {
        Self {
            rule_number: group.rule_number,
            severity: group.severity,
            message: group.message,
            field_value: group.field_value,
            xpath: group.xpath,
        }
    }
}

/// Result of processing one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    submission_id: String,
    status: AckStatus,
    errors: Vec<AcknowledgmentError>,
    dcn: Option<String>,
}

impl Acknowledgment {
    pub(crate) fn from_response(
        submission_id: &str,
        response: GetAckResponse,
    ) -> Result<Self, MefError> {
        if !response.submission_id.is_empty() && response.submission_id != submission_id {
            return Err(MefError::Protocol(format!(
                "acknowledgment for {} returned while polling {submission_id}",
                response.submission_id
            )));
        }
        let status = AckStatus::from_status_text(&response.status).ok_or_else(|| {
            MefError::Protocol(format!("unknown acceptance status {:?}", response.status))
        })?;

        Ok(Self {
            submission_id: submission_id.to_owned(),
            status,
            errors: response
                .errors
                .map(|list| list.groups.into_iter().map(Into::into).collect())
                .unwrap_or_default(),
            dcn: response.dcn.filter(|dcn| !dcn.is_empty()),
        })
    }

    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    pub fn status(&self) -> AckStatus {
        self.status
    }

    pub fn errors(&self) -> &[AcknowledgmentError] {
        &self.errors
    }

    /// Document control number assigned to an accepted return
    pub fn dcn(&self) -> Option<&str> {
        self.dcn.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Client-side record of a transmitted return
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    submission_id: String,
    status: AckStatus,
    created_at: DateTime<Utc>,
}

impl Submission {
    pub(crate) fn new(submission_id: impl Into<String>) -> Self {
        Self {
            submission_id: submission_id.into(),
            status: AckStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    pub fn status(&self) -> AckStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Move from `Pending` to a terminal status; returns whether it changed
    pub(crate) fn advance(&mut self, status: AckStatus) -> bool {
        if self.status.is_terminal() || status == self.status {
            return false;
        }
        self.status = status;
        true
    }
}

/// Receipt of a transmitted return
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    submission_id: String,
}

impl SubmissionResult {
    pub(crate) fn new(submission_id: String) -> Self {
        Self { submission_id }
    }

    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_duration: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_duration: Duration::from_secs(30 * 60),
        }
    }
}

impl From<&PollConfig> for PollOptions {
    fn from(config: &PollConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            max_duration: Duration::from_secs(config.max_duration_secs),
        }
    }
}
