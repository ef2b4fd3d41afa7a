//! Users: account CRUD.

use std::sync::Arc;

use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::path::PathTemplate;
use crate::resources::{expect_list, expect_model};
use crate::transport::Transport;
use crate::types::{NewUser, User, UserUpdate};

static COLLECTION: Lazy<PathTemplate> = Lazy::new(|| PathTemplate::new("/users"));
static ITEM: Lazy<PathTemplate> = Lazy::new(|| COLLECTION.join("{id}"));

#[derive(Debug, Clone)]
pub struct UsersClient {
    transport: Arc<Transport>,
}

impl UsersClient {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn list(&self) -> Result<Vec<User>, ApiError> {
        let body = self
            .transport
            .request(HttpMethod::Get, &COLLECTION.bind(&[])?, &[], None)?;
        expect_list(body)
    }

    pub fn get(&self, id: Uuid) -> Result<User, ApiError> {
        let id = id.to_string();
        let body = self
            .transport
            .request(HttpMethod::Get, &ITEM.bind(&[("id", id.as_str())])?, &[], None)?;
        expect_model(body)
    }

    pub fn create(&self, input: &NewUser) -> Result<User, ApiError> {
        let payload = input.to_record();
        let body = self
            .transport
            .request(HttpMethod::Post, &COLLECTION.bind(&[])?, &[], Some(&payload))?;
        expect_model(body)
    }

    pub fn update(&self, user: &User, changes: &UserUpdate) -> Result<User, ApiError> {
        let id = user.id.to_string();
        let payload = changes.to_record();
        let body = self.transport.request(
            HttpMethod::Put,
            &ITEM.bind(&[("id", id.as_str())])?,
            &[],
            Some(&payload),
        )?;
        expect_model(body)
    }

    pub fn delete(&self, user: &User) -> Result<(), ApiError> {
        let id = user.id.to_string();
        self.transport
            .request(HttpMethod::Delete, &ITEM.bind(&[("id", id.as_str())])?, &[], None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::config::EndpointConfig;
    use crate::testing::ScriptedConnector;
    use crate::types::UserRole;

    const ID: &str = "00000000-0000-0000-0000-0000000000aa";

    fn client(connector: &ScriptedConnector) -> UsersClient {
        let config = EndpointConfig::new("localhost", 3000);
        let transport = Transport::with_connector(&config, Box::new(connector.clone())).unwrap();
        UsersClient::new(Arc::new(transport))
    }

    fn user_json(role: &str) -> String {
        json!({"id": ID, "username": "ada", "email": "ada@example.com", "role": role}).to_string()
    }

    fn user() -> User {
        User {
            id: ID.parse().unwrap(),
            name: "ada".to_string(),
            email: "ada@example.com".to_string(),
            role: UserRole::Member,
            display_name: None,
        }
    }

    #[test]
    fn list_returns_users() {
        let connector = ScriptedConnector::new();
        connector.respond(200, &format!("[{}]", user_json("member")));
        assert_eq!(client(&connector).list().unwrap(), vec![user()]);
        assert_eq!(connector.requests()[0].url, "http://localhost:3000/users");
    }

    #[test]
    fn create_sends_username_key() {
        let connector = ScriptedConnector::new();
        connector.respond(201, &user_json("member"));
        let input = NewUser {
            name: "ada".to_string(),
            email: "ada@example.com".to_string(),
            role: UserRole::Member,
            display_name: None,
        };
        assert_eq!(client(&connector).create(&input).unwrap(), user());

        let requests = connector.requests();
        let sent: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(
            sent,
            json!({"username": "ada", "email": "ada@example.com", "role": "member"})
        );
    }

    #[test]
    fn update_puts_only_changed_fields() {
        let connector = ScriptedConnector::new();
        connector.respond(200, &user_json("admin"));
        let changes = UserUpdate {
            role: Some(UserRole::Admin),
            ..UserUpdate::default()
        };
        let updated = client(&connector).update(&user(), &changes).unwrap();
        assert_eq!(updated.role, UserRole::Admin);

        let requests = connector.requests();
        assert_eq!(requests[0].method, HttpMethod::Put);
        assert_eq!(requests[0].url, format!("http://localhost:3000/users/{ID}"));
        let sent: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, json!({"role": "admin"}));
    }

    #[test]
    fn get_rejects_unknown_role() {
        let connector = ScriptedConnector::new();
        connector.respond(200, &user_json("root"));
        let err = client(&connector).get(ID.parse().unwrap()).unwrap_err();
        let ApiError::Validation(err) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(err.model, "User");
        assert_eq!(err.paths(), vec!["role"]);
    }

    #[test]
    fn delete_not_found_is_transport_error() {
        let connector = ScriptedConnector::new();
        connector.respond(404, "");
        let err = client(&connector).delete(&user()).unwrap_err();
        assert!(matches!(err, ApiError::Transport(ref e) if e.is_not_found()));
    }
}
