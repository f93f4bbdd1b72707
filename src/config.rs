//! Runtime settings loaded from the environment (and `.env`).

use std::net::SocketAddr;
use std::time::Duration;

use crate::data::{DEFAULT_API_URL, DEFAULT_TIMEOUT};
use crate::error::AppError;
use crate::request::SexPolicy;
use crate::scheduler::FieldBindings;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub api_timeout: Duration,
    pub host: String,
    pub port: u16,
    pub target_instruments: TargetInstruments,
    pub sex_policy: SexPolicy,
    pub field_bindings: FieldBindings,
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_timeout = match get("GROWTH_API_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|_| {
                    AppError::new(2, format!("Invalid GROWTH_API_TIMEOUT_SECS '{raw}': expected whole seconds."))
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::new(2, format!("Invalid PORT '{raw}'.")))?,
            None => DEFAULT_PORT,
        };

        let strict = match get("STRICT_SEX_CODES").as_deref() {
            None => false,
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            Some(other) => {
                return Err(AppError::new(2, format!("Invalid STRICT_SEX_CODES '{other}'.")));
            }
        };
        let male_code = get("SEX_MALE_CODE").unwrap_or_else(|| "1".to_string());
        let sex_policy = if strict {
            SexPolicy::Strict {
                male_code,
                female_code: get("SEX_FEMALE_CODE").unwrap_or_else(|| "2".to_string()),
            }
        } else {
            SexPolicy::FemaleFallback { male_code }
        };

        let field_bindings =
            FieldBindings::resolve(|setting| get(&format!("AUTOCENTILE_{}", setting.to_ascii_uppercase())));

        Ok(Self {
            api_url: get("GROWTH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: get("RCPCH_API_KEY"),
            api_timeout,
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            target_instruments: TargetInstruments::parse(&get("TARGET_INSTRUMENTS").unwrap_or_default()),
            sex_policy,
            field_bindings,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::new(2, format!("Invalid bind address {}:{}: {e}", self.host, self.port)))
    }
}

/// Allow-list of form instruments the scheduler attaches to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetInstruments(Vec<String>);

impl TargetInstruments {
    /// Parse a comma-separated list; entries are trimmed and blanks dropped.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn contains(&self, instrument: &str) -> bool {
        self.0.iter().any(|name| name == instrument)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
