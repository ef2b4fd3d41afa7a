//! In-memory connector for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{ConnectionError, ConnectionErrorKind};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Connector;

#[derive(Default)]
struct Script {
    replies: VecDeque<Result<HttpResponse, ConnectionError>>,
    requests: Vec<HttpRequest>,
    closed: usize,
}

/// Replays queued replies in order and records every request it receives.
/// Clones share the same script, so a test can keep one handle after boxing
/// another into a `Transport`.
#[derive(Clone, Default)]
pub(crate) struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, status: u16, body: &str) {
        self.script.lock().unwrap().replies.push_back(Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }));
    }

    pub(crate) fn fail(&self, kind: ConnectionErrorKind) {
        self.script.lock().unwrap().replies.push_back(Err(ConnectionError {
            url: "scripted".to_string(),
            kind,
            message: "scripted failure".to_string(),
        }));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.script.lock().unwrap().closed
    }
}

impl Connector for ScriptedConnector {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ConnectionError> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request.clone());
        script
            .replies
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted reply for {} {}", request.method, request.url))
    }

    fn close(&self) {
        self.script.lock().unwrap().closed += 1;
    }
}
