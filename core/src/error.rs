//! Error types for the cloud API client.
//!
//! # Design
//! Every failure surfaced by the client is one `ApiError` variant wrapping a
//! structured detail type. Callers match on the kind and can still read the
//! status code, violation list or allowed values as data; the `Display`
//! output is only a convenience for logs.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::http::HttpMethod;

/// Errors returned by the transport, the resource clients and `ApiClient`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A raw value is not a member of a closed set.
    #[error(transparent)]
    InvalidValue(#[from] InvalidValueError),

    /// A record failed model validation. Carries every violation found.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A path template was bound with missing or unexpected parameters.
    #[error(transparent)]
    Path(#[from] PathError),

    /// No response was obtained (refused, unreachable, timed out).
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A response was obtained but its status was not 2xx.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The client was closed before the operation was attempted.
    #[error(transparent)]
    Closed(#[from] ClosedClientError),

    /// The endpoint configuration cannot produce a usable base address.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ApiError {
    /// HTTP status of a non-success response, if this is a transport error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport(err) => Some(err.status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{raw:?} is not a valid {type_name}; expected one of {allowed:?}")]
pub struct InvalidValueError {
    pub type_name: &'static str,
    pub raw: String,
    pub allowed: Vec<&'static str>,
}

/// One field that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Location of the field inside the raw record, e.g. `data[1][0]`.
    /// Empty for the record itself.
    pub path: String,
    /// Description of the accepted shape.
    pub expected: String,
    /// The raw value found, or `None` when the field was missing.
    pub actual: Option<Value>,
}

impl Violation {
    pub fn missing(path: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            actual: None,
        }
    }

    pub fn mismatch(path: impl Into<String>, expected: impl Into<String>, actual: &Value) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            actual: Some(actual.clone()),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        match &self.actual {
            Some(actual) => write!(f, "{path}: expected {}, got {actual}", self.expected),
            None => write!(f, "{path}: missing, expected {}", self.expected),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {model}: {}", list_violations(.violations))]
pub struct ValidationError {
    pub model: &'static str,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(model: &'static str, violations: Vec<Violation>) -> Self {
        Self { model, violations }
    }

    /// Paths of all offending fields, in the order they were found.
    pub fn paths(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }

    pub fn violation(&self, path: &str) -> Option<&Violation> {
        self.violations.iter().find(|v| v.path == path)
    }
}

fn list_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Misuse of a `PathTemplate`. These are programming errors: they are raised
/// before any request leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("placeholder {{{placeholder}}} of {template} is not bound")]
    UnboundPlaceholder { template: String, placeholder: String },

    #[error("parameter {parameter:?} has no placeholder in {template}")]
    UnknownParameter { template: String, parameter: String },

    /// `.` and `..` would be resolved away instead of staying one segment.
    #[error("value {value:?} for placeholder {{{placeholder}}} of {template} is a dot segment")]
    DotSegment {
        template: String,
        placeholder: String,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// The configured timeout elapsed before a response arrived.
    Timeout,
    /// Any other network-level failure.
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("connection to {url} failed: {message}")]
pub struct ConnectionError {
    pub url: String,
    pub kind: ConnectionErrorKind,
    pub message: String,
}

impl ConnectionError {
    pub fn is_timeout(&self) -> bool {
        self.kind == ConnectionErrorKind::Timeout
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{method} {path} returned HTTP {status}: {raw_body}")]
pub struct TransportError {
    pub method: HttpMethod,
    pub path: String,
    pub status: u16,
    pub raw_body: String,
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("client is closed; refusing to request {path}")]
pub struct ClosedClientError {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid endpoint configuration ({field}): {message}")]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl ConfigError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}
