use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub cpus: u32,
    pub memory_mb: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Server {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub flavor: Flavor,
    pub owner_id: Option<Uuid>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Progress {
    pub current_stage: Option<String>,
    pub data: Vec<(String, u8)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateServer {
    pub name: String,
    pub flavor: Flavor,
    pub owner_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ServerFilter {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub role: String,
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub role: Option<String>,
    pub display_name: Option<String>,
}

const ROLES: [&str; 3] = ["admin", "member", "viewer"];

#[derive(Default)]
pub struct Store {
    servers: HashMap<Uuid, Server>,
    progress: HashMap<Uuid, Progress>,
    users: HashMap<Uuid, User>,
}

pub type Db = Arc<RwLock<Store>>;

/// Router serving the API under `API_PREFIX` without authentication.
pub fn app() -> Router {
    Router::new().nest(API_PREFIX, api())
}

/// Router that rejects requests lacking `Authorization: Bearer <token>`.
pub fn app_with_token(token: impl Into<String>) -> Router {
    let token = Arc::new(token.into());
    let api = api().route_layer(middleware::from_fn_with_state(token, require_token));
    Router::new().nest(API_PREFIX, api)
}

fn api() -> Router {
    let db: Db = Arc::default();
    Router::new()
        .route("/servers", get(list_servers).post(create_server))
        .route("/servers/{id}", get(get_server).delete(delete_server))
        .route("/servers/{id}/progress", get(server_progress))
        .route("/servers/{id}/start", post(start_server))
        .route("/servers/{id}/stop", post(stop_server))
        .route("/servers/{id}/suspend", post(suspend_server))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_token(listener: TcpListener, token: String) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_token(token)).await
}

async fn require_token(
    State(token): State<Arc<String>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = format!("Bearer {token}");
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if presented != Some(expected.as_str()) {
        tracing::warn!(uri = %request.uri(), "rejected unauthenticated request");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}

// --- servers ---

async fn list_servers(State(db): State<Db>, Query(filter): Query<ServerFilter>) -> Json<Vec<Server>> {
    let store = db.read().await;
    let servers = store
        .servers
        .values()
        .filter(|server| filter.status.as_deref().is_none_or(|status| server.status == status))
        .cloned()
        .collect();
    Json(servers)
}

async fn create_server(State(db): State<Db>, Json(input): Json<CreateServer>) -> (StatusCode, Json<Server>) {
    let server = Server {
        id: Uuid::new_v4(),
        name: input.name,
        status: "provisioning".to_string(),
        flavor: input.flavor,
        owner_id: input.owner_id,
    };
    let progress = Progress {
        current_stage: Some("installing".to_string()),
        data: vec![("unpacking".to_string(), 100), ("installing".to_string(), 37)],
    };
    let mut store = db.write().await;
    store.progress.insert(server.id, progress);
    store.servers.insert(server.id, server.clone());
    tracing::info!(id = %server.id, name = %server.name, "server created");
    (StatusCode::CREATED, Json(server))
}

async fn get_server(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Server>, StatusCode> {
    let store = db.read().await;
    store.servers.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn delete_server(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    store.progress.remove(&id);
    store
        .servers
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn server_progress(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Progress>, StatusCode> {
    let store = db.read().await;
    store.progress.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn start_server(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Server>, StatusCode> {
    transition(&db, id, &["provisioning", "stopped", "suspended"], "running").await
}

async fn stop_server(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Server>, StatusCode> {
    transition(&db, id, &["running", "suspended"], "stopped").await
}

async fn suspend_server(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Server>, StatusCode> {
    transition(&db, id, &["running"], "suspended").await
}

/// Moves a server to `to` if its current status is one of `from`; 409 otherwise.
async fn transition(db: &Db, id: Uuid, from: &[&str], to: &str) -> Result<Json<Server>, StatusCode> {
    let mut store = db.write().await;
    let server = store.servers.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if !from.contains(&server.status.as_str()) {
        return Err(StatusCode::CONFLICT);
    }
    server.status = to.to_string();
    let server = server.clone();
    if to == "running" {
        store.progress.insert(
            id,
            Progress {
                current_stage: None,
                data: ["unpacking", "installing", "configuring", "booting"]
                    .iter()
                    .map(|stage| (stage.to_string(), 100))
                    .collect(),
            },
        );
    }
    Ok(Json(server))
}

// --- users ---

async fn list_users(State(db): State<Db>) -> Json<Vec<User>> {
    let store = db.read().await;
    Json(store.users.values().cloned().collect())
}

async fn create_user(State(db): State<Db>, Json(input): Json<CreateUser>) -> Result<(StatusCode, Json<User>), StatusCode> {
    if !ROLES.contains(&input.role.as_str()) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let user = User {
        id: Uuid::new_v4(),
        username: input.username,
        email: input.email,
        role: input.role,
        display_name: input.display_name,
    };
    db.write().await.users.insert(user.id, user.clone());
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<User>, StatusCode> {
    let store = db.read().await;
    store.users.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_user(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUser>,
) -> Result<Json<User>, StatusCode> {
    if input.role.as_deref().is_some_and(|role| !ROLES.contains(&role)) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut store = db.write().await;
    let user = store.users.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(email) = input.email {
        user.email = email;
    }
    if let Some(role) = input.role {
        user.role = role;
    }
    if let Some(display_name) = input.display_name {
        user.display_name = Some(display_name);
    }
    Ok(Json(user.clone()))
}

async fn delete_user(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    store
        .users
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}
