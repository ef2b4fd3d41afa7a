//! Servers: listing, lifecycle actions and installation progress.

use std::sync::Arc;

use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::closed_set::ClosedSet;
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::path::PathTemplate;
use crate::resources::{expect_list, expect_model};
use crate::transport::Transport;
use crate::types::{NewServer, Progress, Server, ServerStatus};

static COLLECTION: Lazy<PathTemplate> = Lazy::new(|| PathTemplate::new("/servers"));
static ITEM: Lazy<PathTemplate> = Lazy::new(|| COLLECTION.join("{id}"));
static PROGRESS: Lazy<PathTemplate> = Lazy::new(|| ITEM.join("progress"));
static START: Lazy<PathTemplate> = Lazy::new(|| ITEM.join("start"));
static STOP: Lazy<PathTemplate> = Lazy::new(|| ITEM.join("stop"));
static SUSPEND: Lazy<PathTemplate> = Lazy::new(|| ITEM.join("suspend"));

#[derive(Debug, Clone)]
pub struct ServersClient {
    transport: Arc<Transport>,
}

impl ServersClient {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn list(&self) -> Result<Vec<Server>, ApiError> {
        let body = self
            .transport
            .request(HttpMethod::Get, &COLLECTION.bind(&[])?, &[], None)?;
        expect_list(body)
    }

    /// Servers currently in `status`, filtered by the API.
    pub fn list_by_status(&self, status: ServerStatus) -> Result<Vec<Server>, ApiError> {
        let query = [("status", status.value())];
        let body = self
            .transport
            .request(HttpMethod::Get, &COLLECTION.bind(&[])?, &query, None)?;
        expect_list(body)
    }

    pub fn get(&self, id: Uuid) -> Result<Server, ApiError> {
        let id = id.to_string();
        let body = self
            .transport
            .request(HttpMethod::Get, &ITEM.bind(&[("id", id.as_str())])?, &[], None)?;
        expect_model(body)
    }

    pub fn create(&self, input: &NewServer) -> Result<Server, ApiError> {
        let payload = input.to_record();
        let body = self
            .transport
            .request(HttpMethod::Post, &COLLECTION.bind(&[])?, &[], Some(&payload))?;
        expect_model(body)
    }

    pub fn delete(&self, server: &Server) -> Result<(), ApiError> {
        let id = server.id.to_string();
        self.transport
            .request(HttpMethod::Delete, &ITEM.bind(&[("id", id.as_str())])?, &[], None)?;
        Ok(())
    }

    pub fn start(&self, server: &Server) -> Result<Server, ApiError> {
        self.action(&START, server)
    }

    pub fn stop(&self, server: &Server) -> Result<Server, ApiError> {
        self.action(&STOP, server)
    }

    pub fn suspend(&self, server: &Server) -> Result<Server, ApiError> {
        self.action(&SUSPEND, server)
    }

    pub fn progress(&self, server: &Server) -> Result<Progress, ApiError> {
        let id = server.id.to_string();
        let body = self
            .transport
            .request(HttpMethod::Get, &PROGRESS.bind(&[("id", id.as_str())])?, &[], None)?;
        expect_model(body)
    }

    /// Lifecycle actions are bodiless POSTs answered with the updated server.
    fn action(&self, template: &PathTemplate, server: &Server) -> Result<Server, ApiError> {
        let id = server.id.to_string();
        let body = self
            .transport
            .request(HttpMethod::Post, &template.bind(&[("id", id.as_str())])?, &[], None)?;
        expect_model(body)
    }
}
