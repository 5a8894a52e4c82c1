use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{Datelike, NaiveDate, SecondsFormat, Utc};
use rand::Rng;
use secrecy::ExposeSecret;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{Config, MefEnvironment};
use crate::mef::ack::{Acknowledgment, PollOptions, Submission, SubmissionResult};
use crate::mef::messages::{GetAckRequest, LogoutRequest, Request, Response, SendSubmissionsRequest};
use crate::mef::retry::RetryPolicy;
use crate::mef::session::{Credentials, Session};
use crate::mef::transport::{HttpTransport, Transport};
use crate::mef::MefError;
use crate::serializer::SerializedReturn;
use crate::signature::SignedXml;
use crate::soap::{Envelope, Header, MeFHeader};
use crate::validation::{FormType, SchemaValidator};

const SUBMISSION_SUFFIX_LEN: usize = 7;
const SUBMISSION_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unauthenticated,
    Authenticated,
    Submitted,
    Acknowledged,
    Error,
}

/// Transmitter identity and protocol tuning
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub efin: String,
    pub etin: String,
    pub app_sys_id: String,
    pub environment: MefEnvironment,
    /// Session lifetime assumed when the login response states none
    pub session_ttl: Duration,
    /// Sessions expiring within this window are renewed before use
    pub session_refresh_skew: Duration,
    pub retry: RetryPolicy,
    pub poll: PollOptions,
}

impl ClientSettings {
    pub fn new(efin: impl Into<String>, etin: impl Into<String>) -> Self {
        Self {
            efin: efin.into(),
            etin: etin.into(),
            app_sys_id: String::new(),
            environment: MefEnvironment::default(),
            session_ttl: Duration::from_secs(30 * 60),
            session_refresh_skew: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            poll: PollOptions::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let transmitter = &config.transmitter;
        Self {
            efin: config.efile.efin.clone(),
            etin: transmitter.etin.clone(),
            app_sys_id: transmitter.app_sys_id.clone(),
            environment: transmitter.environment,
            session_ttl: transmitter.session_ttl(),
            session_refresh_skew: transmitter.session_refresh_skew(),
            retry: RetryPolicy::from(&transmitter.retry),
            poll: PollOptions::from(&transmitter.poll),
        }
    }

    fn check(&self) -> Result<(), MefError> {
        if self.efin.len() != 6 || !self.efin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MefError::Config(format!(
                "EFIN must be 6 digits, got {:?}",
                self.efin
            )));
        }
        if self.etin.is_empty() {
            return Err(MefError::Config("ETIN is required".into()));
        }
        Ok(())
    }
}

/// Return XML handed to the transmitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPayload {
    xml: String,
    tax_year: u16,
    form_type: FormType,
}

impl SubmissionPayload {
    pub fn new(xml: impl Into<String>, tax_year: u16) -> Self {
        Self {
            xml: xml.into(),
            tax_year,
            form_type: FormType::Return1040,
        }
    }

    pub fn with_form_type(mut self, form_type: FormType) -> Self {
        self.form_type = form_type;
        self
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn tax_year(&self) -> u16 {
        self.tax_year
    }

    pub fn form_type(&self) -> FormType {
        self.form_type
    }
}

impl From<SerializedReturn> for SubmissionPayload {
    fn from(serialized: SerializedReturn) -> Self {
        let tax_year = serialized.tax_year();
        Self::new(serialized.into_xml(), tax_year)
    }
}

impl SubmissionPayload {
    /// Wrap a signed return; `tax_year` is used when the document carries no `TaxYr`
    pub fn from_signed(signed: SignedXml, tax_year: u16) -> Self {
        let tax_year = signed.tax_year().unwrap_or(tax_year);
        Self::new(signed.into_xml(), tax_year)
    }
}

struct Inner {
    state: ClientState,
    session: Option<Session>,
    submissions: HashMap<String, Submission>,
    /// Terminal acknowledgments, never refetched
    acks: HashMap<String, Acknowledgment>,
}

/// MeF transmitter client for one credential set.
///
/// All protocol state sits behind a single mutex held for the whole of each
/// operation, so requests through one client never interleave.
pub struct MefClient<T: Transport = HttpTransport> {
    transport: T,
    settings: ClientSettings,
    credentials: Credentials,
    inner: Mutex<Inner>,
}

impl MefClient<HttpTransport> {
    /// Client over HTTPS against the configured endpoint
    pub fn from_config(config: &Config) -> Result<Self, MefError> {
        let credentials = config
            .credentials
            .as_ref()
            .ok_or_else(|| MefError::Config("credentials are not configured".into()))?;
        let transport = HttpTransport::from_config(&config.transmitter)?;
        Self::new(
            transport,
            ClientSettings::from_config(config),
            Credentials::from(credentials),
        )
    }
}

impl<T: Transport> MefClient<T> {
    pub fn new(
        transport: T,
        settings: ClientSettings,
        credentials: Credentials,
    ) -> Result<Self, MefError> {
        settings.check()?;
        Ok(Self {
            transport,
            settings,
            credentials,
            inner: Mutex::new(Inner {
                state: ClientState::Unauthenticated,
                session: None,
                submissions: HashMap::new(),
                acks: HashMap::new(),
            }),
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub async fn state(&self) -> ClientState {
        self.inner.lock().await.state
    }

    /// The current session, if logged in
    pub async fn session(&self) -> Option<Session> {
        self.inner.lock().await.session.clone()
    }

    /// Locally recorded submission
    pub async fn submission(&self, submission_id: &str) -> Option<Submission> {
        self.inner.lock().await.submissions.get(submission_id).cloned()
    }

    #[instrument(skip(self), fields(user = %self.credentials.username()))]
    pub async fn login(&self) -> Result<Session, MefError> {
        let mut inner = self.inner.lock().await;
        match self.login_locked(&mut inner).await {
            Ok(()) => inner
                .session
                .clone()
                .ok_or_else(|| MefError::Protocol("login stored no session".into())),
            Err(e) => Err(fail(&mut inner, e)),
        }
    }

    /// Replace the current session with a fresh login
    #[instrument(skip(self), fields(user = %self.credentials.username()))]
    pub async fn refresh(&self) -> Result<Session, MefError> {
        let mut inner = self.inner.lock().await;
        inner.session = None;
        match self.login_locked(&mut inner).await {
            Ok(()) => inner
                .session
                .clone()
                .ok_or_else(|| MefError::Protocol("login stored no session".into())),
            Err(e) => Err(fail(&mut inner, e)),
        }
    }

    /// Validate and transmit a return.
    ///
    /// Validation runs before any network traffic; an expired session is
    /// renewed transparently.
    #[instrument(skip_all, fields(tax_year = payload.tax_year(), form = %payload.form_type()))]
    pub async fn submit_return(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionResult, MefError> {
        let validator = SchemaValidator::new(payload.tax_year())?;
        let result = validator.validate(payload.xml(), payload.form_type());
        if !result.valid {
            warn!(errors = result.errors.len(), "Return failed validation, not transmitting");
            return Err(MefError::Validation(Box::new(result)));
        }

        let mut inner = self.inner.lock().await;
        let submission_id = submission_id(&self.settings.efin, Utc::now().date_naive());
        let request = Request::SendSubmissions(SendSubmissionsRequest {
            submission_id: submission_id.clone(),
            tax_year: payload.tax_year(),
            payload: BASE64.encode(payload.xml()),
        });

        let receipt = match self.authenticated_exchange(&mut inner, &request).await {
            Ok(Response::SendSubmissionsResponse(receipt)) => receipt,
            Ok(other) => return Err(fail(&mut inner, unexpected("SendSubmissions", &other))),
            Err(e) => return Err(fail(&mut inner, e)),
        };
        if receipt.submission_id != submission_id {
            let e = MefError::Protocol(format!(
                "receipt echoed submission {} instead of {submission_id}",
                receipt.submission_id
            ));
            return Err(fail(&mut inner, e));
        }

        inner
            .submissions
            .insert(submission_id.clone(), Submission::new(submission_id.clone()));
        inner.state = ClientState::Submitted;
        info!(%submission_id, "Return submitted");
        Ok(SubmissionResult::new(submission_id))
    }

    /// Adopt a submission made elsewhere, e.g. by an earlier process, so its
    /// acknowledgment can be fetched through this client
    #[instrument(skip(self))]
    pub async fn track_submission(&self, submission_id: &str) -> Result<(), MefError> {
        if !is_submission_id(submission_id) {
            return Err(MefError::UnknownSubmission(submission_id.to_owned()));
        }
        let mut inner = self.inner.lock().await;
        if !inner.submissions.contains_key(submission_id) {
            debug!("Tracking submission");
            inner
                .submissions
                .insert(submission_id.to_owned(), Submission::new(submission_id.to_owned()));
        }
        Ok(())
    }

    /// Fetch the acknowledgment of a submission made or tracked by this client
    #[instrument(skip(self))]
    pub async fn get_acknowledgment(&self, submission_id: &str) -> Result<Acknowledgment, MefError> {
        let mut inner = self.inner.lock().await;

        if let Some(ack) = inner.acks.get(submission_id) {
            debug!("Returning cached acknowledgment");
            return Ok(ack.clone());
        }
        if !inner.submissions.contains_key(submission_id) {
            return Err(MefError::UnknownSubmission(submission_id.to_owned()));
        }

        let request = Request::GetAck(GetAckRequest {
            submission_id: submission_id.to_owned(),
        });
        let response = match self.authenticated_exchange(&mut inner, &request).await {
            Ok(Response::GetAckResponse(response)) => response,
            Ok(other) => return Err(fail(&mut inner, unexpected("GetAck", &other))),
            Err(e) => return Err(fail(&mut inner, e)),
        };
        let ack = match Acknowledgment::from_response(submission_id, response) {
            Ok(ack) => ack,
            Err(e) => return Err(fail(&mut inner, e)),
        };

        if let Some(submission) = inner.submissions.get_mut(submission_id) {
            submission.advance(ack.status());
        }
        if ack.is_terminal() {
            info!(status = ?ack.status(), errors = ack.errors().len(), "Acknowledgment received");
            inner.acks.insert(submission_id.to_owned(), ack.clone());
            inner.state = ClientState::Acknowledged;
        } else {
            debug!("Acknowledgment pending");
        }
        Ok(ack)
    }

    /// Poll until the acknowledgment is terminal, the poll window closes or
    /// `cancel` resolves; the last pending acknowledgment is returned in the
    /// latter two cases.
    #[instrument(skip(self, cancel))]
    pub async fn poll_acknowledgment<F>(
        &self,
        submission_id: &str,
        cancel: F,
    ) -> Result<Acknowledgment, MefError>
    where
        F: Future<Output = ()>,
    {
        let PollOptions {
            interval,
            max_duration,
        } = self.settings.poll;
        let deadline = Instant::now() + max_duration;
        tokio::pin!(cancel);

        loop {
            let ack = self.get_acknowledgment(submission_id).await?;
            if ack.is_terminal() {
                return Ok(ack);
            }

            let now = Instant::now();
            if now >= deadline {
                info!("Poll window closed with acknowledgment still pending");
                return Ok(ack);
            }

            tokio::select! {
                _ = tokio::time::sleep(interval.min(deadline - now)) => {}
                _ = &mut cancel => {
                    info!("Polling cancelled");
                    return Ok(ack);
                }
            }
        }
    }

    /// End the session. Failures are logged and swallowed.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.session.take() {
            let token = session.token().expose_secret().to_owned();
            let request = Request::Logout(LogoutRequest::default());
            match self.exchange(&request, Some(&token)).await {
                Ok(_) => info!("Logged out"),
                Err(e) => warn!(error = %e, "Logout failed, discarding session"),
            }
        }
        inner.state = ClientState::Unauthenticated;
    }

    /// Log out and drop the client
    pub async fn shutdown(self) {
        self.logout().await;
    }

    async fn login_locked(&self, inner: &mut Inner) -> Result<(), MefError> {
        let request = Request::Login(self.credentials.login_request());
        let response = match self.exchange(&request, None).await? {
            Response::LoginResponse(response) => response,
            other => return Err(unexpected("Login", &other)),
        };

        let session = Session::from_response(
            response,
            self.credentials.username(),
            self.settings.session_ttl,
        )?;
        info!(expires_at = %session.expires_at(), "Logged in");
        inner.session = Some(session);
        if matches!(inner.state, ClientState::Unauthenticated | ClientState::Error) {
            inner.state = ClientState::Authenticated;
        }
        Ok(())
    }

    /// Token of a live session, logging in when there is none or it is
    /// about to expire
    async fn session_token(&self, inner: &mut Inner) -> Result<String, MefError> {
        let skew = self.settings.session_refresh_skew;
        let live = inner.session.as_ref().filter(|s| !s.needs_refresh(skew));
        if let Some(session) = live {
            return Ok(session.token().expose_secret().to_owned());
        }
        if inner.session.is_some() {
            info!("Session expired or expiring, logging in again");
        }
        self.login_locked(inner).await?;
        inner
            .session
            .as_ref()
            .map(|s| s.token().expose_secret().to_owned())
            .ok_or_else(|| MefError::Protocol("login stored no session".into()))
    }

    /// Exchange on a session; one re-login when the endpoint reports the
    /// session expired
    async fn authenticated_exchange(
        &self,
        inner: &mut Inner,
        request: &Request,
    ) -> Result<Response, MefError> {
        let token = self.session_token(inner).await?;
        match self.exchange(request, Some(&token)).await {
            Err(MefError::SessionExpired) => {
                info!(action = request.action(), "Endpoint reported session expired, logging in again");
                inner.session = None;
                let token = self.session_token(inner).await?;
                self.exchange(request, Some(&token)).await
            }
            result => result,
        }
    }

    /// One request with retries on transmission failures
    async fn exchange(&self, request: &Request, token: Option<&str>) -> Result<Response, MefError> {
        let action = request.action();
        let mut backoff = self.settings.retry.backoff();
        loop {
            match self.send(request, token).await {
                Err(e) if e.is_retryable() => match backoff.next() {
                    Some(delay) => {
                        warn!(action, attempt = backoff.attempt(), ?delay, error = %e, "Retrying MeF request");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(action, attempts = backoff.attempt(), error = %e, "MeF request failed");
                        return Err(e);
                    }
                },
                result => return result,
            }
        }
    }

    async fn send(&self, request: &Request, token: Option<&str>) -> Result<Response, MefError> {
        let action = request.action();
        let envelope = Envelope::new(request)
            .with_header(Header::mef(self.header(action, token)))
            .serialize_soap(false)
            .map_err(|e| MefError::Protocol(format!("cannot serialize {action} request: {e}")))?;

        let body = self.transport.call(action, envelope).await?;
        let response = Envelope::<Response>::parse(&body)
            .map_err(|e| MefError::Protocol(format!("unparseable {action} response: {e}")))?
            .into_body();

        match response {
            Response::Fault(fault) => {
                let e = MefError::from_fault(&fault);
                debug!(action, fault = %fault.code, error = %e, "Endpoint returned a fault");
                Err(e)
            }
            response => Ok(response),
        }
    }

    fn header(&self, action: &str, token: Option<&str>) -> MeFHeader {
        MeFHeader {
            message_id: format!("urn:uuid:{}", Uuid::new_v4()),
            relates_to: None,
            action: action.to_owned(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            etin: self.settings.etin.clone(),
            session_indicator: if token.is_some() { "Y" } else { "N" }.to_owned(),
            session_token: token.map(str::to_owned),
            test_cd: self.settings.environment.test_cd().map(str::to_owned),
            app_sys_id: self.settings.app_sys_id.clone(),
        }
    }
}

/// Record an unrecoverable failure on the client
fn fail(inner: &mut Inner, error: MefError) -> MefError {
    error!(error = %error, "MeF operation failed");
    inner.state = ClientState::Error;
    error
}

fn unexpected(action: &str, response: &Response) -> MefError {
    MefError::Protocol(format!("{action} answered with {}", response.name()))
}

/// MeF submission ID: EFIN, `ccyyddd` of `date`, 7 lowercase alphanumerics
pub(crate) fn submission_id(efin: &str, date: NaiveDate) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUBMISSION_SUFFIX_LEN)
        .map(|_| char::from(SUBMISSION_ALPHABET[rng.random_range(0..SUBMISSION_ALPHABET.len())]))
        .collect();
    format!("{efin}{:04}{:03}{suffix}", date.year(), date.ordinal())
}

fn is_submission_id(id: &str) -> bool {
    let prefix = 6 + 4 + 3;
    id.len() == prefix + SUBMISSION_SUFFIX_LEN
        && id.bytes().take(prefix).all(|b| b.is_ascii_digit())
        && id.bytes().skip(prefix).all(|b| SUBMISSION_ALPHABET.contains(&b))
}
