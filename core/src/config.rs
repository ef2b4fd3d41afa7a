//! Endpoint configuration for `Transport` and `ApiClient`.
//!
//! A config can be built in code, parsed from a URL, read from the
//! environment, or deserialized with serde (`timeout_ms` on the wire).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::ConfigError;

pub const ENV_URL: &str = "CLOUD_API_URL";
pub const ENV_TOKEN: &str = "CLOUD_API_TOKEN";
pub const ENV_TIMEOUT_MS: &str = "CLOUD_API_TIMEOUT_MS";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Credential passed through to every request as a header.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// `Authorization: Bearer <token>`.
    Bearer { token: String },
    /// An arbitrary header such as `X-Api-Key`.
    Header { name: String, value: String },
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Credential::Bearer { token: token.into() }
    }

    pub fn header(&self) -> (String, String) {
        match self {
            Credential::Bearer { token } => ("authorization".to_string(), format!("Bearer {token}")),
            Credential::Header { name, value } => (name.clone(), value.clone()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Bearer { .. } => f.debug_struct("Bearer").field("token", &"<redacted>").finish(),
            Credential::Header { name, .. } => f
                .debug_struct("Header")
                .field("name", name)
                .field("value", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Fixed prefix in front of every resource path, e.g. `/api/v1`.
    #[serde(default)]
    pub api_prefix: Option<String>,
    /// Applied to each request as a whole.
    #[serde(default, rename = "timeout_ms", deserialize_with = "millis")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub credential: Option<Credential>,
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}

impl EndpointConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: Scheme::Http,
            host: host.into(),
            port,
            api_prefix: None,
            timeout: None,
            credential: None,
        }
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = Some(prefix.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Splits an absolute URL such as `https://api.example.com/api/v1` into
    /// scheme, host, port and API prefix.
    pub fn from_url(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw).map_err(|e| ConfigError::new("url", e.to_string()))?;
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(ConfigError::new("scheme", format!("unsupported scheme {other:?}"))),
        };
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::new("host", format!("{raw} has no host")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ConfigError::new("port", format!("{raw} has no port")))?;
        let mut config = Self::new(host, port).with_scheme(scheme);
        let prefix = url.path().trim_end_matches('/');
        if !prefix.is_empty() {
            config.api_prefix = Some(prefix.to_string());
        }
        Ok(config)
    }

    /// Reads `CLOUD_API_URL` (required), `CLOUD_API_TOKEN` and
    /// `CLOUD_API_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = var(ENV_URL).ok_or_else(|| ConfigError::new("url", format!("{ENV_URL} is not set")))?;
        let mut config = Self::from_url(&url)?;
        if let Some(token) = var(ENV_TOKEN).filter(|token| !token.is_empty()) {
            config.credential = Some(Credential::bearer(token));
        }
        if let Some(raw) = var(ENV_TIMEOUT_MS) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                ConfigError::new("timeout", format!("{ENV_TIMEOUT_MS}={raw:?} is not a number of milliseconds"))
            })?;
            config.timeout = Some(Duration::from_millis(millis));
        }
        Ok(config)
    }

    /// Absolute base address: scheme, host, port and normalized API prefix.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::new("host", "host is empty"));
        }
        if self.port == 0 {
            return Err(ConfigError::new("port", "port 0 is not addressable"));
        }
        let mut url = Url::parse(&format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port))
            .map_err(|e| ConfigError::new("host", e.to_string()))?;
        let prefix = self.api_prefix.as_deref().unwrap_or("").trim_matches('/');
        if !prefix.is_empty() {
            url.set_path(&format!("/{prefix}"));
        }
        Ok(url)
    }
}
