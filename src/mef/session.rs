use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::config::CredentialsConfig;
use crate::mef::MefError;
use crate::mef::messages::{LoginRequest, LoginResponse};

/// Login credentials of the transmitter account
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn login_request(&self) -> LoginRequest {
        LoginRequest {
            user_id: self.username.clone(),
            password: self.password.expose_secret().to_owned(),
        }
    }
}

impl From<&CredentialsConfig> for Credentials {
    fn from(config: &CredentialsConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

/// An authenticated MeF session
#[derive(Debug, Clone)]
pub struct Session {
    token: SecretString,
    expires_at: DateTime<Utc>,
    username: String,
}

impl Session {
    /// Build a session from a login response; falls back to `ttl` when the
    /// endpoint does not state an expiry
    pub(crate) fn from_response(
        response: LoginResponse,
        username: &str,
        ttl: Duration,
    ) -> Result<Self, MefError> {
        if response.session_token.trim().is_empty() {
            return Err(MefError::Authentication(
                "login response carried no session token".into(),
            ));
        }

        let expires_at = match response.expires_at.as_deref() {
            Some(ts) => DateTime::parse_from_rfc3339(ts)
                .map_err(|e| MefError::Protocol(format!("invalid SessionExpirationTs {ts}: {e}")))?
                .with_timezone(&Utc),
            None => {
                let ttl = chrono::Duration::from_std(ttl)
                    .map_err(|e| MefError::Config(format!("session ttl out of range: {e}")))?;
                Utc::now() + ttl
            }
        };

        Ok(Self {
            token: SecretString::from(response.session_token),
            expires_at,
            username: username.to_owned(),
        })
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Expired, or expiring within `skew`
    pub fn needs_refresh(&self, skew: Duration) -> bool {
        match chrono::Duration::from_std(skew) {
            Ok(skew) => Utc::now() + skew >= self.expires_at,
            Err(_) => true,
        }
    }
}
