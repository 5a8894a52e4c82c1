use std::{collections::HashMap, path::PathBuf, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::serializer::PinType;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub efile: EfileConfig,
    pub transmitter: TransmitterConfig,
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
    #[serde(default)]
    pub signing: SigningConfig,
}

/// Return-level settings written into every `ReturnHeader`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfileConfig {
    pub tax_year: u16,
    pub schema_version: String,
    pub software_id: String,
    pub software_version: String,
    pub efin: String,
    pub originator_type: String,
    pub pin_type: PinType,
}

/// Target MeF system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MefEnvironment {
    /// Assurance testing system
    #[default]
    Ats,
    Production,
}

impl MefEnvironment {
    pub fn default_endpoint(self) -> &'static str {
        match self {
            MefEnvironment::Ats => "https://la.alt.www4.irs.gov/a2a/mef",
            MefEnvironment::Production => "https://la.www4.irs.gov/a2a/mef",
        }
    }

    /// `TestCd` header value
    pub fn test_cd(self) -> Option<&'static str> {
        match self {
            MefEnvironment::Ats => Some("T"),
            MefEnvironment::Production => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmitterConfig {
    pub environment: MefEnvironment,
    /// Overrides the environment's endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    pub etin: String,
    pub app_sys_id: String,
    pub timeout_secs: u64,
    pub session_ttl_secs: u64,
    /// Renew a session this long before it expires
    pub session_refresh_skew_secs: u64,
    pub retry: RetryConfig,
    pub poll: PollConfig,
}

impl TransmitterConfig {
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.environment.default_endpoint())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn session_refresh_skew(&self) -> Duration {
        Duration::from_secs(self.session_refresh_skew_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub max_duration_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: SecretString,
}

/// Key material for the return signature; signing is skipped when unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigningConfig {
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default)]
    pub certificate_path: Option<PathBuf>,
}

impl SigningConfig {
    pub fn is_configured(&self) -> bool {
        self.private_key_path.is_some() && self.certificate_path.is_some()
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("efile.tax_year", 2024)?
            .set_default("efile.schema_version", "2024v5.0")?
            .set_default("efile.software_id", "00000000")?
            .set_default("efile.software_version", env!("CARGO_PKG_VERSION"))?
            .set_default("efile.efin", "000000")?
            .set_default("efile.originator_type", "OnlineFiler")?
            .set_default("efile.pin_type", "self-select-online")?
            .set_default("transmitter.environment", "ats")?
            .set_default("transmitter.etin", "00000")?
            .set_default("transmitter.app_sys_id", "")?
            .set_default("transmitter.timeout_secs", 60)?
            .set_default("transmitter.session_ttl_secs", 1800)?
            .set_default("transmitter.session_refresh_skew_secs", 60)?
            .set_default("transmitter.retry.max_attempts", 3)?
            .set_default("transmitter.retry.initial_backoff_ms", 500)?
            .set_default("transmitter.retry.max_backoff_ms", 10_000)?
            .set_default("transmitter.retry.multiplier", 2.0)?
            .set_default("transmitter.poll.interval_secs", 60)?
            .set_default("transmitter.poll.max_duration_secs", 1800)?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_TRANSMITTER__ETIN or APP_CREDENTIALS__PASSWORD
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
