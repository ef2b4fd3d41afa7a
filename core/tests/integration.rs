//! Lifecycle tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every resource
//! operation through `ApiClient` over real HTTP. Validates that path
//! building, body encoding, status handling and model validation agree with
//! an actual server.

use std::net::SocketAddr;
use std::time::Duration;

use cloud_core::{
    ApiClient, ApiError, ConnectionErrorKind, Credential, EndpointConfig, Flavor, NewServer, NewUser, ServerStatus,
    Stage, UserRole, UserUpdate,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Spawns the mock server on its own runtime thread; `token` turns on the
/// bearer guard.
fn spawn_server(token: Option<&str>) -> SocketAddr {
    init_tracing();
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let token = token.map(str::to_string);

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            match token {
                Some(token) => mock_server::run_with_token(listener, token).await,
                None => mock_server::run(listener).await,
            }
        })
        .unwrap();
    });

    addr
}

fn endpoint(addr: SocketAddr) -> EndpointConfig {
    EndpointConfig::new("127.0.0.1", addr.port())
        .with_api_prefix(mock_server::API_PREFIX)
        .with_timeout(Duration::from_secs(5))
}

fn new_server(name: &str) -> NewServer {
    NewServer {
        name: name.to_string(),
        flavor: Flavor {
            cpus: 2,
            memory_mb: 2048,
        },
        owner_id: None,
    }
}

// ---------------------------------------------------------------------------
// Servers
// ---------------------------------------------------------------------------

#[test]
fn server_lifecycle() {
    let addr = spawn_server(None);
    let client = ApiClient::from_endpoint(&endpoint(addr)).unwrap();
    let servers = client.servers();

    // Empty to begin with.
    assert!(servers.list().unwrap().is_empty());

    // Create.
    let created = servers.create(&new_server("web-1")).unwrap();
    assert_eq!(created.name, "web-1");
    assert_eq!(created.status, ServerStatus::Provisioning);
    assert_eq!(created.flavor.memory_mb, 2048);
    assert_eq!(created.owner_id, None);

    // Get returns the same record.
    assert_eq!(servers.get(created.id).unwrap(), created);

    // Progress while installing: mean of 100 and 37 rounds half to even.
    let progress = servers.progress(&created).unwrap();
    assert_eq!(progress.current_stage, Some(Stage::Installing));
    let stages: Vec<(Stage, u8)> = progress.stages.iter().map(|(stage, pct)| (*stage, pct.value())).collect();
    assert_eq!(stages, vec![(Stage::Unpacking, 100), (Stage::Installing, 37)]);
    assert_eq!(progress.total_progress(), 68);

    // Suspending a provisioning server is rejected by the server.
    let err = servers.suspend(&created).unwrap_err();
    assert_eq!(err.status(), Some(409));

    // Start, suspend, stop.
    let running = servers.start(&created).unwrap();
    assert_eq!(running.status, ServerStatus::Running);
    let progress = servers.progress(&running).unwrap();
    assert_eq!(progress.current_stage, None);
    assert_eq!(progress.total_progress(), 100);

    let suspended = servers.suspend(&running).unwrap();
    assert_eq!(suspended.status, ServerStatus::Suspended);
    let stopped = servers.stop(&suspended).unwrap();
    assert_eq!(stopped.status, ServerStatus::Stopped);

    // Filter by status.
    servers.create(&new_server("web-2")).unwrap();
    let only_stopped = servers.list_by_status(ServerStatus::Stopped).unwrap();
    assert_eq!(only_stopped, vec![stopped.clone()]);
    assert_eq!(servers.list().unwrap().len(), 2);

    // Delete, then the record is gone.
    servers.delete(&stopped).unwrap();
    let err = servers.get(stopped.id).unwrap_err();
    match err {
        ApiError::Transport(e) => {
            assert!(e.is_not_found());
            assert_eq!(e.path, format!("/servers/{}", stopped.id));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[test]
fn concurrent_requests_share_one_client() {
    let addr = spawn_server(None);
    let client = ApiClient::from_endpoint(&endpoint(addr)).unwrap();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let client = &client;
            scope.spawn(move || {
                for n in 0..5 {
                    let name = format!("worker-{worker}-{n}");
                    let server = client.servers().create(&new_server(&name)).unwrap();
                    assert_eq!(client.servers().get(server.id).unwrap().name, name);
                }
            });
        }
    });

    assert_eq!(client.servers().list().unwrap().len(), 20);
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[test]
fn user_lifecycle() {
    let addr = spawn_server(None);
    let client = ApiClient::from_endpoint(&endpoint(addr)).unwrap();
    let users = client.users();

    let created = users
        .create(&NewUser {
            name: "ada".to_string(),
            email: "ada@example.com".to_string(),
            role: UserRole::Member,
            display_name: Some("Ada".to_string()),
        })
        .unwrap();
    assert_eq!(created.name, "ada");
    assert_eq!(created.role, UserRole::Member);
    assert_eq!(users.list().unwrap(), vec![created.clone()]);

    let changes = UserUpdate {
        role: Some(UserRole::Admin),
        ..UserUpdate::default()
    };
    let updated = users.update(&created, &changes).unwrap();
    assert_eq!(updated.role, UserRole::Admin);
    assert_eq!(updated.email, created.email);
    assert_eq!(updated.display_name.as_deref(), Some("Ada"));
    assert_eq!(users.get(created.id).unwrap(), updated);

    users.delete(&updated).unwrap();
    assert!(users.list().unwrap().is_empty());
    let err = users.delete(&updated).unwrap_err();
    assert_eq!(err.status(), Some(404));
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[test]
fn bearer_credential_is_sent() {
    let addr = spawn_server(Some("s3cret"));

    let anonymous = ApiClient::from_endpoint(&endpoint(addr)).unwrap();
    let err = anonymous.servers().list().unwrap_err();
    assert_eq!(err.status(), Some(401));

    let config = endpoint(addr).with_credential(Credential::bearer("s3cret"));
    let authed = ApiClient::from_endpoint(&config).unwrap();
    assert!(authed.servers().list().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Lifetime
// ---------------------------------------------------------------------------

#[test]
fn closed_client_refuses_requests() {
    let addr = spawn_server(None);
    let client = ApiClient::from_endpoint(&endpoint(addr)).unwrap();
    let servers = client.servers().clone();
    assert!(servers.list().unwrap().is_empty());

    assert!(client.close());
    let err = servers.list().unwrap_err();
    assert!(matches!(err, ApiError::Closed(ref e) if e.path == "/servers"));
}

#[test]
fn scoped_client_returns_body_result() {
    let addr = spawn_server(None);
    let config = endpoint(addr);

    let created = ApiClient::scoped(&config, |client| client.servers().create(&new_server("scoped"))).unwrap();
    let fetched = ApiClient::scoped(&config, |client| client.servers().get(created.id)).unwrap();
    assert_eq!(fetched, created);

    let err = ApiClient::scoped(&config, |client| client.servers().get(uuid::Uuid::nil())).unwrap_err();
    assert_eq!(err.status(), Some(404));
}

// ---------------------------------------------------------------------------
// Connection failures
// ---------------------------------------------------------------------------

#[test]
fn refused_connection_is_network_error() {
    init_tracing();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = EndpointConfig::new("127.0.0.1", port).with_timeout(Duration::from_secs(2));
    let client = ApiClient::from_endpoint(&config).unwrap();

    match client.servers().list().unwrap_err() {
        ApiError::Connection(e) => {
            assert_eq!(e.kind, ConnectionErrorKind::Network);
            assert!(e.url.starts_with(&format!("http://127.0.0.1:{port}/servers")));
        }
        other => panic!("expected connection error, got {other:?}"),
    }
}

#[test]
fn silent_server_times_out() {
    init_tracing();
    // Accepted by the kernel backlog but never answered.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = EndpointConfig::new("127.0.0.1", port).with_timeout(Duration::from_millis(200));
    let client = ApiClient::from_endpoint(&config).unwrap();

    match client.users().list().unwrap_err() {
        ApiError::Connection(e) => assert!(e.is_timeout(), "expected timeout, got {e:?}"),
        other => panic!("expected connection error, got {other:?}"),
    }
    drop(listener);
}

#[test]
fn one_millisecond_timeout_fails_every_call() {
    init_tracing();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = EndpointConfig::new("127.0.0.1", port).with_timeout(Duration::from_millis(1));
    let client = ApiClient::from_endpoint(&config).unwrap();

    for _ in 0..3 {
        assert!(matches!(client.servers().list(), Err(ApiError::Connection(_))));
    }
    assert!(matches!(client.users().get(uuid::Uuid::nil()), Err(ApiError::Connection(_))));
    drop(listener);
}
