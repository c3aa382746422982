//! HTTP routes for fights and presence.
//!
//! Fight rejections answer with the error code and the unchanged fight, so
//! a client can resynchronize from a single response:
//!
//! ```json
//! { "error": "invalid_state", "message": "...", "fight": { ... } }
//! ```
//!
//! Bodies that fail to parse use the same shape with `invalid_request`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{MatchedPath, Path, Query, Request, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{HttpConfig, Result, SESSION_COOKIE};
use crate::error::{FightError, StoreError, TransportError};
use crate::fight::{Fight, FightAck, FightId, FightInit, FightMove};
use crate::observability::metrics;
use crate::server::AppState;

// ============================================================================
// Listener
// ============================================================================

/// Binds the listener and serves the router until `cancel` fires.
///
/// Returns the server task and the address actually bound.
///
/// # Errors
///
/// Returns [`TransportError::BindFailed`] if the address cannot be bound.
pub async fn serve(
    config: &HttpConfig,
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> Result<(JoinHandle<()>, SocketAddr)> {
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| TransportError::BindFailed(format!("{}: {e}", config.bind_addr)))?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| TransportError::BindFailed(format!("local_addr failed: {e}")))?;

    let router = build_router(state, config.max_body_bytes);
    let handle = tokio::spawn(async move {
        info!(%bound_addr, "HTTP server started");
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
        {
            warn!(error = %e, "HTTP server stopped with error");
        }
        debug!("HTTP server shut down");
    });

    Ok((handle, bound_addr))
}

// ============================================================================
// Router
// ============================================================================

/// Builds the axum router over shared application state.
pub fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/fight/{wild_slime_id}", post(start_fight).get(get_fight))
        .route("/fight_move/{wild_slime_id}", post(submit_move))
        .route("/fight_ack/{wild_slime_id}", post(acknowledge_turn))
        .route("/heartbeatz", post(heartbeat))
        .route("/online", get(online_list))
        .route("/online/{identity}", get(online_check))
        .route_layer(middleware::from_fn(track_request))
        .layer(axum::extract::DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Records the request duration under a closed-set route name.
async fn track_request(request: Request, next: Next) -> Response {
    let route = route_name(
        request.method(),
        request.extensions().get::<MatchedPath>().map(MatchedPath::as_str),
    );
    let start = Instant::now();
    let response = next.run(request).await;
    metrics::record_request_duration(route, response.status().as_u16(), start.elapsed());
    response
}

fn route_name(method: &Method, path: Option<&str>) -> &'static str {
    match (path, *method == Method::GET) {
        (Some("/fight/{wild_slime_id}"), false) => "fight_start",
        (Some("/fight/{wild_slime_id}"), true) => "fight_get",
        (Some("/fight_move/{wild_slime_id}"), _) => "fight_move",
        (Some("/fight_ack/{wild_slime_id}"), _) => "fight_ack",
        (Some("/heartbeatz"), _) => "heartbeat",
        (Some("/online/{identity}"), _) => "online_check",
        (Some("/online"), _) => "online_list",
        _ => "__unknown__",
    }
}

// ============================================================================
// Error Responses
// ============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    fight: Option<Fight>,
}

/// Failures a handler can answer with.
#[derive(Debug)]
enum ApiError {
    Fight(FightError),
    Store(StoreError),
    InvalidRequest(JsonRejection),
    MissingSession,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection)
    }
}

impl From<FightError> for ApiError {
    fn from(err: FightError) -> Self {
        Self::Fight(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Fight(err) => {
                let status = match err {
                    FightError::NotFound { .. } => StatusCode::NOT_FOUND,
                    FightError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                    FightError::InvalidState { .. } | FightError::Conflict { .. } => {
                        StatusCode::CONFLICT
                    }
                    FightError::IllegalMove { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                };
                let body = ErrorBody {
                    error: err.code(),
                    message: err.to_string(),
                    fight: err.current().cloned(),
                };
                (status, body)
            }
            Self::Store(StoreError::NotFound(what)) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: "not_found",
                    message: format!("not found: {what}"),
                    fight: None,
                },
            ),
            Self::Store(err) => {
                warn!(error = %err, "store lookup failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        error: "store_unavailable",
                        message: err.to_string(),
                        fight: None,
                    },
                )
            }
            Self::InvalidRequest(rejection) => (
                rejection.status(),
                ErrorBody {
                    error: "invalid_request",
                    message: rejection.body_text(),
                    fight: None,
                },
            ),
            Self::MissingSession => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: "unauthenticated",
                    message: format!("missing {SESSION_COOKIE} cookie"),
                    fight: None,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ============================================================================
// Fight Handlers
// ============================================================================

/// `POST /fight/{wild_slime_id}`: opens an encounter against the wild
/// slime, fought with the hunter's slime `slime_id`.
async fn start_fight(
    State(state): State<Arc<AppState>>,
    Path(key): Path<FightId>,
    init: std::result::Result<Json<FightInit>, JsonRejection>,
) -> ApiResult<Json<Fight>> {
    let Json(init) = init?;
    // Store lookups finish before any fight lock is taken.
    let wild = state.catalog.wild_slime(key).await?;
    let attacker = state
        .catalog
        .hunter_slime(&init.hunter, init.slime_id)
        .await?;
    debug!(key, hunter = %init.hunter, slime_id = init.slime_id, "opening encounter");

    state.fights.create(key, wild, attacker, &init.hunter)?;
    Ok(Json(state.fights.get(key)?))
}

/// `GET /fight/{wild_slime_id}`
async fn get_fight(
    State(state): State<Arc<AppState>>,
    Path(key): Path<FightId>,
) -> ApiResult<Json<Fight>> {
    Ok(Json(state.fights.get(key)?))
}

/// `POST /fight_move/{wild_slime_id}`
async fn submit_move(
    State(state): State<Arc<AppState>>,
    Path(key): Path<FightId>,
    submission: std::result::Result<Json<FightMove>, JsonRejection>,
) -> ApiResult<Json<Fight>> {
    let Json(submission) = submission?;
    let fight = state
        .fights
        .apply_move(key, &submission.hunter, submission.move_picked)?;
    Ok(Json(fight))
}

/// `POST /fight_ack/{wild_slime_id}`
async fn acknowledge_turn(
    State(state): State<Arc<AppState>>,
    Path(key): Path<FightId>,
    ack: std::result::Result<Json<FightAck>, JsonRejection>,
) -> ApiResult<Json<Fight>> {
    let Json(ack) = ack?;
    Ok(Json(state.fights.acknowledge(key, &ack.hunter)?))
}

// ============================================================================
// Presence Handlers
// ============================================================================

/// `POST /heartbeatz`: the durable mirror never changes the status code.
async fn heartbeat(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let identity = session_identity(&headers).ok_or(ApiError::MissingSession)?;
    state.presence.touch(&identity);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    window_ms: Option<u64>,
}

impl WindowQuery {
    fn window(&self, default: Duration) -> Duration {
        self.window_ms.map_or(default, Duration::from_millis)
    }
}

#[derive(Debug, Serialize)]
struct OnlineStatus {
    identity: String,
    online: bool,
}

#[derive(Debug, Serialize)]
struct OnlineList {
    list: Vec<String>,
}

/// `GET /online/{identity}`
async fn online_check(
    State(state): State<Arc<AppState>>,
    Path(identity): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Json<OnlineStatus> {
    let online = state
        .presence
        .is_online(&identity, query.window(state.online_window));
    Json(OnlineStatus { identity, online })
}

/// `GET /online`
async fn online_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> Json<OnlineList> {
    Json(OnlineList {
        list: state.presence.online(query.window(state.online_window)),
    })
}

/// Extracts the session identity from the `Cookie` headers.
fn session_identity(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

// ============================================================================
// Tests
// ============================================================================
