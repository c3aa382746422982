//! Shared integration-test harness: in-process state and routers with
//! memory-backed collaborators, plus a helper for running the binary.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use slimy::config::ServerConfig;
use slimy::durable::{MemorySlimeCatalog, MemoryUserStore, UserStore};
use slimy::fight::SlimeFight;
use slimy::server::{AppState, Server};
use slimy::transport::{HttpConfig, SESSION_COOKIE, build_router};

/// Wild slime used by most tests.
pub const WILD_ID: u64 = 7;

/// Slime owned by [`HUNTER`].
pub const HUNTER_SLIME_ID: u64 = 1;

/// Hunter that owns [`HUNTER_SLIME_ID`].
pub const HUNTER: &str = "alice";

/// Default timeout for waiting on asynchronous side effects.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wild slime `{attack 5, def 3, max_hp 15}`.
pub const fn wild_stats() -> SlimeFight {
    SlimeFight::new(5, 3, 15)
}

/// Attacker `{attack 10, def 2, max_hp 20}`.
pub const fn attacker_stats() -> SlimeFight {
    SlimeFight::new(10, 2, 20)
}

/// Catalog holding the wild slime and the hunter's slime.
pub fn seeded_catalog() -> MemorySlimeCatalog {
    let catalog = MemorySlimeCatalog::new();
    catalog.insert_wild(WILD_ID, wild_stats());
    catalog.set_hunter_slime(HUNTER, HUNTER_SLIME_ID, attacker_stats());
    catalog
}

/// Application state over memory stores. The user store is returned so
/// tests can inspect mirrored writes.
pub fn test_state(config: &ServerConfig) -> (Arc<AppState>, Arc<MemoryUserStore>) {
    let users = Arc::new(MemoryUserStore::new());
    users.register(HUNTER, "Alice");
    users.register("bob", "Bob");
    let store: Arc<dyn UserStore> = Arc::clone(&users) as Arc<dyn UserStore>;
    let state = Arc::new(AppState::new(config, store, Arc::new(seeded_catalog())));
    (state, users)
}

/// Router over a fresh default-config state.
pub fn test_router() -> (Router, Arc<AppState>, Arc<MemoryUserStore>) {
    let config = ServerConfig::default();
    let (state, users) = test_state(&config);
    let router = build_router(Arc::clone(&state), config.http.max_body_bytes);
    (router, state, users)
}

/// A parsed response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Sends one request through the router.
///
/// A non-JSON or empty body comes back as `Value::Null`.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    session: Option<&str>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(identity) = session {
        builder = builder.header(header::COOKIE, format!("{SESSION_COOKIE}={identity}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse { status, body }
}

/// `POST` with a JSON body.
pub async fn post_json(router: &Router, uri: &str, body: Value) -> TestResponse {
    send(router, Method::POST, uri, Some(body), None).await
}

/// `GET` without a session.
pub async fn get(router: &Router, uri: &str) -> TestResponse {
    send(router, Method::GET, uri, None, None).await
}

/// Polls `condition` until it holds or [`DEFAULT_TIMEOUT`] elapses.
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// An in-process server listening on an ephemeral port.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub users: Arc<MemoryUserStore>,
    cancel: CancellationToken,
    done: JoinHandle<()>,
}

impl RunningServer {
    /// Starts the full server (listener plus background jobs).
    pub async fn start(mut config: ServerConfig) -> Self {
        config.http.bind = "127.0.0.1:0".to_string();
        let (state, users) = test_state(&config);
        let http = HttpConfig::from_section(&config.http).unwrap();
        let cancel = CancellationToken::new();
        let server = Server::new(&config, http, Arc::clone(&state), cancel.clone());
        let (addr, done) = server.start().await.unwrap();
        Self {
            addr,
            state,
            users,
            cancel,
            done,
        }
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Cancels and waits for shutdown.
    pub async fn stop(self) {
        self.cancel.cancel();
        tokio::time::timeout(DEFAULT_TIMEOUT, self.done)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked");
    }
}

/// Runs the `slimy` binary to completion.
pub fn spawn_command(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_slimy"))
        .args(args)
        .arg("--quiet")
        .output()
        .expect("failed to run slimy")
}
