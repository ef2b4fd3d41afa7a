//! Typed, blocking client for the cloud API.
//!
//! # Overview
//! `ApiClient` owns one `Transport` and exposes one typed client per API
//! resource (`servers()`, `users()`). Every operation returns validated
//! models, never raw JSON.
//!
//! # Design
//! - `closed_set!` declares enums of canonical wire values with checked
//!   membership (`ClosedSet::from_value`, `ClosedSet::contains`).
//! - `Model` turns an untyped JSON record into a typed value in one
//!   validation pass, reporting every violation at once.
//! - `PathTemplate` builds request paths; child paths are joined onto their
//!   parent resource's template.
//! - `Transport` is the only component that knows HTTP: address joining,
//!   status checks and body decoding. The network sits behind `Connector`.
//!
//! ```no_run
//! use cloud_core::{ApiClient, EndpointConfig};
//!
//! let config = EndpointConfig::new("localhost", 3000).with_api_prefix("/api/v1");
//! let servers = ApiClient::scoped(&config, |client| client.servers().list())?;
//! for server in servers {
//!     println!("{} is {}", server.name, server.status);
//! }
//! # Ok::<(), cloud_core::ApiError>(())
//! ```

pub mod client;
pub mod closed_set;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod path;
pub mod resources;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::ApiClient;
pub use closed_set::ClosedSet;
pub use config::{Credential, EndpointConfig, Scheme};
pub use error::{
    ApiError, ClosedClientError, ConfigError, ConnectionError, ConnectionErrorKind, InvalidValueError, PathError,
    TransportError, ValidationError, Violation,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use model::{FieldValue, Fields, Model, RecordWriter};
pub use path::PathTemplate;
pub use resources::{ServersClient, UsersClient};
pub use transport::{Connector, Transport, UreqConnector};
pub use types::{Flavor, NewServer, NewUser, Percent, Progress, Server, ServerStatus, Stage, User, UserRole, UserUpdate};
