//! Typed clients for each API resource.
//!
//! # Design
//! A resource client holds only a shared handle to the `Transport`. Each
//! operation binds one of the resource's path templates, issues one request
//! and parses the response through the resource's model. Callers never see
//! untyped JSON. Resource clients never close the transport; `ApiClient`
//! does.

use serde_json::Value;
use tracing::warn;

use crate::error::ApiError;
use crate::model::Model;

pub mod servers;
pub mod users;

pub use servers::ServersClient;
pub use users::UsersClient;

/// Parses a response body into one model. The raw payload is logged before a
/// validation failure propagates, since the error only keeps the offending
/// fields.
pub(crate) fn expect_model<M: Model>(body: Option<Value>) -> Result<M, ApiError> {
    let body = body.unwrap_or(Value::Null);
    M::parse(&body).map_err(|err| {
        warn!(model = M::NAME, payload = %body, error = %err, "response failed validation");
        err.into()
    })
}

pub(crate) fn expect_list<M: Model>(body: Option<Value>) -> Result<Vec<M>, ApiError> {
    let body = body.unwrap_or(Value::Null);
    M::parse_list(&body).map_err(|err| {
        warn!(model = M::NAME, payload = %body, error = %err, "response failed validation");
        err.into()
    })
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::types::{Server, User};

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_warnings<T>(body: impl FnOnce() -> T) -> (T, String) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, body);
        (result, captured.text())
    }

    #[test]
    fn validation_failure_logs_raw_payload() {
        let payload = json!({"id": "u-1", "username": "ada", "email": "ada@example.com", "role": "overlord"});
        let (result, logs) = capture_warnings(|| expect_model::<User>(Some(payload)));

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert!(logs.contains("response failed validation"), "logs: {logs}");
        assert!(logs.contains("overlord"), "logs: {logs}");
        assert!(logs.contains("model=\"User\"") || logs.contains("model=User"), "logs: {logs}");
    }

    #[test]
    fn list_validation_failure_logs_raw_payload() {
        let payload = json!([{"id": "s-1", "name": "web-1", "status": "melting"}]);
        let (result, logs) = capture_warnings(|| expect_list::<Server>(Some(payload)));

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert!(logs.contains("melting"), "logs: {logs}");
    }

    #[test]
    fn valid_payload_logs_nothing() {
        let payload = json!({
            "id": "00000000-0000-0000-0000-0000000000aa",
            "username": "ada",
            "email": "ada@example.com",
            "role": "admin"
        });
        let (result, logs) = capture_warnings(|| expect_model::<User>(Some(payload)));

        assert_eq!(result.unwrap().name, "ada");
        assert!(logs.is_empty(), "logs: {logs}");
    }
}
