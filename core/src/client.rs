//! Composition root for the cloud API.
//!
//! # Design
//! `ApiClient` builds one `Transport` and binds every resource client to it.
//! The resource clients share the transport but only `ApiClient` releases it,
//! either through `close` or when it is dropped. Adding a resource area means
//! one new module under `resources` and one new field here.

use std::sync::Arc;

use tracing::info;

use crate::config::EndpointConfig;
use crate::error::ApiError;
use crate::resources::{ServersClient, UsersClient};
use crate::transport::{Connector, Transport};

#[derive(Debug)]
pub struct ApiClient {
    transport: Arc<Transport>,
    servers: ServersClient,
    users: UsersClient,
}

impl ApiClient {
    /// Opens a pooled HTTP transport for `config` and assembles every
    /// resource client on top of it.
    pub fn from_endpoint(config: &EndpointConfig) -> Result<Self, ApiError> {
        Ok(Self::assemble(Transport::open(config)?))
    }

    /// Same as `from_endpoint`, over a caller-supplied connector.
    pub fn with_connector(config: &EndpointConfig, connector: Box<dyn Connector>) -> Result<Self, ApiError> {
        Ok(Self::assemble(Transport::with_connector(config, connector)?))
    }

    /// Builds a client, runs `body` with it, and closes the client on every
    /// exit path.
    pub fn scoped<T>(
        config: &EndpointConfig,
        body: impl FnOnce(&ApiClient) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let client = Self::from_endpoint(config)?;
        let result = body(&client);
        client.close();
        result
    }

    fn assemble(transport: Transport) -> Self {
        let transport = Arc::new(transport);
        Self {
            servers: ServersClient::new(Arc::clone(&transport)),
            users: UsersClient::new(Arc::clone(&transport)),
            transport,
        }
    }

    pub fn servers(&self) -> &ServersClient {
        &self.servers
    }

    pub fn users(&self) -> &UsersClient {
        &self.users
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Releases the transport. Every later operation on any resource client,
    /// including clones taken earlier, fails with `ApiError::Closed`.
    pub fn close(&self) -> bool {
        let released = self.transport.close();
        if released {
            info!("api client closed");
        }
        released
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }
}

impl Drop for ApiClient {
    fn drop(&mut self) {
        self.close();
    }
}
