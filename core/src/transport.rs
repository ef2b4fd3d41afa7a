//! The single place that knows HTTP mechanics.
//!
//! # Design
//! `Transport` joins the base endpoint with resource paths, encodes query
//! strings and JSON bodies, checks status codes and decodes response bodies
//! into an untyped JSON tree. It knows nothing about resources or models.
//!
//! The network itself sits behind the `Connector` trait. `UreqConnector` is
//! the production implementation; tests plug in scripted connectors. The
//! connector lives in a lock-protected slot: requests share the lock, `close`
//! takes it exclusively and drops the connector exactly once.

use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Credential, EndpointConfig};
use crate::error::{
    ApiError, ClosedClientError, ConnectionError, ConnectionErrorKind, TransportError, ValidationError, Violation,
};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// The connection primitive the transport runs on. Opening happens when the
/// connector is constructed. Implementations must be safe to share between
/// threads issuing requests concurrently.
pub trait Connector: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ConnectionError>;

    /// Releases pooled connections. Called once, by `Transport::close`.
    fn close(&self) {}
}

/// `Connector` backed by a pooled `ureq::Agent`.
pub struct UreqConnector {
    agent: ureq::Agent,
}

impl UreqConnector {
    pub fn new(timeout: Option<Duration>) -> Self {
        // Status codes are interpreted by the transport, not by ureq.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }

    fn with_headers<B>(builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
        request
            .headers
            .iter()
            .fold(builder, |builder, (name, value)| builder.header(name.as_str(), value.as_str()))
    }
}

impl Connector for UreqConnector {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ConnectionError> {
        let url = request.url.as_str();
        let body = request.body.as_deref().map(str::as_bytes);
        let result = match (request.method, body) {
            (HttpMethod::Get, _) => Self::with_headers(self.agent.get(url), request).call(),
            (HttpMethod::Delete, _) => Self::with_headers(self.agent.delete(url), request).call(),
            (HttpMethod::Post, Some(body)) => Self::with_headers(self.agent.post(url), request).send(body),
            (HttpMethod::Post, None) => Self::with_headers(self.agent.post(url), request).send_empty(),
            (HttpMethod::Put, Some(body)) => Self::with_headers(self.agent.put(url), request).send(body),
            (HttpMethod::Put, None) => Self::with_headers(self.agent.put(url), request).send_empty(),
        };
        let mut response = result.map_err(|e| connection_error(url, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| connection_error(url, e))?;

        Ok(HttpResponse { status, headers, body })
    }
}

fn connection_error(url: &str, error: ureq::Error) -> ConnectionError {
    let kind = match &error {
        ureq::Error::Timeout(_) => ConnectionErrorKind::Timeout,
        ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => ConnectionErrorKind::Timeout,
        _ => ConnectionErrorKind::Network,
    };
    ConnectionError {
        url: url.to_string(),
        kind,
        message: error.to_string(),
    }
}

pub struct Transport {
    base_url: Url,
    credential: Option<Credential>,
    connector: RwLock<Option<Box<dyn Connector>>>,
}

impl Transport {
    /// Opens a transport over a pooled HTTP agent.
    pub fn open(config: &EndpointConfig) -> Result<Self, ApiError> {
        Self::with_connector(config, Box::new(UreqConnector::new(config.timeout)))
    }

    pub fn with_connector(config: &EndpointConfig, connector: Box<dyn Connector>) -> Result<Self, ApiError> {
        let base_url = config.base_url()?;
        debug!(base_url = %base_url, "transport opened");
        Ok(Self {
            base_url,
            credential: config.credential.clone(),
            connector: RwLock::new(Some(connector)),
        })
    }

    /// Opens a transport, runs `body`, and closes the transport whether
    /// `body` succeeded or not.
    pub fn scoped<T>(
        config: &EndpointConfig,
        body: impl FnOnce(&Transport) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let transport = Self::open(config)?;
        let result = body(&transport);
        transport.close();
        result
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the request for `path` (relative to the API prefix) without
    /// sending it.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> HttpRequest {
        let mut url = self.base_url.clone();
        let prefix = self.base_url.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}/{}", path.trim_start_matches('/')));
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        if let Some(credential) = &self.credential {
            headers.push(credential.header());
        }

        HttpRequest {
            method,
            url: url.into(),
            headers,
            body: body.map(Value::to_string),
        }
    }

    /// Checks the status and decodes the body. An empty success body yields
    /// `None`.
    pub fn parse_response(
        &self,
        method: HttpMethod,
        path: &str,
        response: HttpResponse,
    ) -> Result<Option<Value>, ApiError> {
        if !response.is_success() {
            warn!(%method, path, status = response.status, body = %response.body, "request failed");
            return Err(TransportError {
                method,
                path: path.to_string(),
                status: response.status,
                raw_body: response.body,
            }
            .into());
        }
        if response.body.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str(&response.body) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(%method, path, payload = %response.body, error = %err, "response body is not JSON");
                Err(ValidationError::new(
                    "response body",
                    vec![Violation::mismatch("", "JSON document", &Value::String(response.body))],
                )
                .into())
            }
        }
    }

    /// Sends one request and returns the decoded body. Never retries.
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let slot = self.connector.read().unwrap_or_else(PoisonError::into_inner);
        let connector = slot.as_ref().ok_or_else(|| ClosedClientError {
            path: path.to_string(),
        })?;

        let request = self.build_request(method, path, query, body);
        debug!(%method, url = %request.url, "sending request");
        let response = connector.send(&request).map_err(|err| {
            warn!(%method, url = %err.url, timeout = err.is_timeout(), error = %err.message, "connection failed");
            err
        })?;
        debug!(%method, path, status = response.status, "received response");
        self.parse_response(method, path, response)
    }

    /// Releases the connector. Returns `true` for the call that released it;
    /// later calls are no-ops.
    pub fn close(&self) -> bool {
        let mut slot = self.connector.write().unwrap_or_else(PoisonError::into_inner);
        match slot.take() {
            Some(connector) => {
                connector.close();
                info!(base_url = %self.base_url, "transport closed");
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.connector
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url.as_str())
            .field("credential", &self.credential)
            .field("closed", &self.is_closed())
            .finish()
    }
}
