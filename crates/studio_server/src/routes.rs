//! Public HTTP API.

use crate::state::AppState;
use angle_render::{displayed_index, presets, RenderError, RunRequest, RunSnapshot};
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use persona_chat::{ChatError, Session, CHARACTERS};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/angles/runs", post(start_run).delete(cancel_run))
        .route("/api/angles/runs/current", get(current_run))
        .route("/api/characters", get(characters))
        .route("/api/chat", post(chat))
        .with_state(state)
}

/// Library errors mapped onto HTTP status codes.
#[derive(Debug)]
pub enum ApiError {
    Render(RenderError),
    Chat(ChatError),
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError::Render(err)
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        ApiError::Chat(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Render(RenderError::EmptyImage) => StatusCode::BAD_REQUEST,
            ApiError::Render(_) => StatusCode::BAD_GATEWAY,
            ApiError::Chat(err) => match err {
                ChatError::AuthRequired => StatusCode::UNAUTHORIZED,
                ChatError::EmptyMessage => StatusCode::BAD_REQUEST,
                ChatError::UnknownCharacter(_) => StatusCode::NOT_FOUND,
                ChatError::Upstream { .. } | ChatError::Transport(_) | ChatError::EmptyReply => {
                    StatusCode::BAD_GATEWAY
                }
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Render(err) => err.to_string(),
            ApiError::Chat(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "Request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct StartRunBody {
    image: String,
    /// Only picks which view to display first; every azimuth is rendered.
    #[serde(default)]
    azimuth: f64,
    #[serde(default)]
    elevation: f64,
    #[serde(default = "default_distance")]
    distance: f64,
    #[serde(default)]
    prompt: String,
}

fn default_distance() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
struct RunStarted {
    epoch: u64,
    selected: usize,
}

async fn start_run(
    State(state): State<AppState>,
    Json(body): Json<StartRunBody>,
) -> Result<(StatusCode, Json<RunStarted>), ApiError> {
    state.metrics.request("start_run");
    let handle = state.renderer.start_run(RunRequest {
        image: body.image,
        elevation: body.elevation,
        distance: body.distance,
        prompt_suffix: body.prompt,
    })?;
    let started = RunStarted {
        epoch: handle.epoch(),
        selected: presets::nearest_index(&presets::AZIMUTHS, body.azimuth),
    };
    tokio::spawn(handle.wait());
    Ok((StatusCode::ACCEPTED, Json(started)))
}

async fn cancel_run(State(state): State<AppState>) -> Json<RunSnapshot> {
    state.metrics.request("cancel_run");
    state.renderer.cancel();
    Json(state.renderer.snapshot())
}

#[derive(Debug, Deserialize)]
struct CurrentQuery {
    #[serde(default)]
    selected: usize,
}

#[derive(Debug, Serialize)]
struct CurrentRun {
    #[serde(flatten)]
    snapshot: RunSnapshot,
    displayed: Option<usize>,
}

async fn current_run(
    State(state): State<AppState>,
    Query(query): Query<CurrentQuery>,
) -> Json<CurrentRun> {
    state.metrics.request("current_run");
    let snapshot = state.renderer.snapshot();
    let displayed = displayed_index(&snapshot.results, query.selected);
    Json(CurrentRun {
        snapshot,
        displayed,
    })
}

async fn characters(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.request("characters");
    Json(CHARACTERS)
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    character_id: String,
    message: String,
}

/// Resolves the caller from request headers and the peer address.
///
/// A bearer token plus user id is a signed-in session. Anything else is
/// anonymous and gated on the peer address as well as the session id; a fresh
/// session id is issued when the caller sent none.
fn session_from_headers(headers: &HeaderMap, peer: SocketAddr) -> (Session, Option<String>) {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let bearer = text(header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let (Some(bearer), Some(user_id)) = (bearer, text(USER_ID_HEADER)) {
        let session = Session::SignedIn {
            user_id: user_id.to_string(),
            bearer: bearer.to_string(),
        };
        return (session, None);
    }

    let (session_id, issued) = match text(SESSION_ID_HEADER) {
        Some(id) => (id.to_string(), None),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            (id.clone(), Some(id))
        }
    };
    let session = Session::Anonymous {
        session_id,
        client: peer.ip().to_string(),
    };
    (session, issued)
}

async fn chat(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Result<Response, ApiError> {
    state.metrics.request("chat");
    state.metrics.chat_turns_total.inc();

    let (session, issued) = session_from_headers(&headers, peer);
    let reply = match state
        .chat
        .send(&session, &body.character_id, &body.message)
        .await
    {
        Err(ChatError::AuthRequired) if session.user_id().is_none() => {
            state.metrics.chat_gated_total.inc();
            return Err(ChatError::AuthRequired.into());
        }
        other => other?,
    };

    let mut response = Json(reply).into_response();
    if let Some(id) = issued.and_then(|id| HeaderValue::from_str(&id).ok()) {
        response.headers_mut().insert(SESSION_ID_HEADER, id);
    }
    Ok(response)
}
