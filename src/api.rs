use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::body::Bytes;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{header, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use tower::ServiceExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::bridge::handle_socket;
use crate::errors::{ApiError, ApiResult, ErrorBody};
use crate::models::{
    CreateWindowRequest, CreatedSession, HealthResponse, NameRequest, SessionSummary,
    SuccessResponse, WindowSummary,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "tmux-web",
        description = "Manage tmux sessions and windows over HTTP. Terminal I/O runs over \
            the WebSocket at `/` or `/ws`."
    ),
    paths(
        health,
        list_sessions,
        create_session,
        delete_session,
        rename_session,
        list_windows,
        create_window,
        delete_window,
        rename_window,
    ),
    components(schemas(
        SessionSummary,
        WindowSummary,
        NameRequest,
        CreateWindowRequest,
        CreatedSession,
        SuccessResponse,
        HealthResponse,
        ErrorBody
    )),
    tags(
        (name = "sessions", description = "tmux sessions"),
        (name = "windows", description = "Windows of a tmux session")
    )
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE]);
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", any(root))
        .route("/ws", any(terminal_websocket))
        .route("/healthz", get(health))
        .route("/openapi.json", get(openapi))
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/{session}", axum::routing::delete(delete_session))
        .route("/api/sessions/{session}/name", put(rename_session))
        .route(
            "/api/sessions/{session}/windows",
            get(list_windows).post(create_window),
        )
        .route(
            "/api/sessions/{session}/windows/{window}",
            axum::routing::delete(delete_window),
        )
        .route(
            "/api/sessions/{session}/windows/{window}/name",
            put(rename_window),
        )
        .fallback_service(static_files)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// JSON request body. An empty body reads as `T::default()` and the
/// `Content-Type` is not checked, so clients may omit both. Malformed bodies
/// become 400 `{error}` responses instead of axum's plain-text rejections.
struct JsonBody<T>(T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
        decode_body(&bytes).map(JsonBody)
    }
}

fn decode_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> ApiResult<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid request body: {e}")))
}

fn parse_window_index(window: &str) -> ApiResult<u32> {
    window
        .parse::<u32>()
        .map_err(|_| ApiError::InvalidRequest(format!("invalid window index: {window}")))
}

fn required_name(request: &NameRequest) -> ApiResult<&str> {
    request
        .required_name()
        .ok_or_else(|| ApiError::InvalidRequest("name is required".to_string()))
}

/// `/` is both the browser client and the terminal socket.
async fn root(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    request: Request,
) -> Response {
    match ws {
        Ok(ws) => upgrade(ws, state),
        Err(_) => match ServeDir::new(&state.static_dir).oneshot(request).await {
            Ok(response) => response.into_response(),
            Err(never) => match never {},
        },
    }
}

async fn terminal_websocket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    upgrade(ws, state)
}

fn upgrade(ws: WebSocketUpgrade, state: AppState) -> Response {
    let multiplexer = state.multiplexer.clone();
    let config = state.bridge.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, multiplexer, config))
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Server is healthy", body = HealthResponse))
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    get,
    path = "/api/sessions",
    tag = "sessions",
    responses(
        (status = 200, description = "Sessions known to tmux (empty when no server runs)", body = [SessionSummary])
    )
)]
async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.multiplexer.list_sessions().await)
}

#[utoipa::path(
    post,
    path = "/api/sessions",
    tag = "sessions",
    request_body = NameRequest,
    responses(
        (status = 200, description = "Session created", body = CreatedSession),
        (status = 400, description = "Missing name", body = ErrorBody),
        (status = 500, description = "tmux failed", body = ErrorBody)
    )
)]
async fn create_session(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<NameRequest>,
) -> ApiResult<Json<CreatedSession>> {
    let name = required_name(&request)?;
    state.multiplexer.create_session(name).await?;
    Ok(Json(CreatedSession {
        name: name.to_string(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{session}",
    tag = "sessions",
    params(("session" = String, Path, description = "Session name")),
    responses(
        (status = 200, description = "Session killed", body = SuccessResponse),
        (status = 500, description = "tmux failed", body = ErrorBody)
    )
)]
async fn delete_session(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    state.multiplexer.kill_session(&session).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    put,
    path = "/api/sessions/{session}/name",
    tag = "sessions",
    params(("session" = String, Path, description = "Current session name")),
    request_body = NameRequest,
    responses(
        (status = 200, description = "Session renamed", body = SuccessResponse),
        (status = 400, description = "Missing name", body = ErrorBody),
        (status = 500, description = "tmux failed", body = ErrorBody)
    )
)]
async fn rename_session(
    State(state): State<AppState>,
    Path(session): Path<String>,
    JsonBody(request): JsonBody<NameRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let name = required_name(&request)?;
    state.multiplexer.rename_session(&session, name).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{session}/windows",
    tag = "windows",
    params(("session" = String, Path, description = "Session name")),
    responses(
        (status = 200, description = "Windows of the session", body = [WindowSummary]),
        (status = 500, description = "tmux failed", body = ErrorBody)
    )
)]
async fn list_windows(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> ApiResult<Json<Vec<WindowSummary>>> {
    Ok(Json(state.multiplexer.list_windows(&session).await?))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{session}/windows",
    tag = "windows",
    params(("session" = String, Path, description = "Session name")),
    request_body = CreateWindowRequest,
    responses(
        (status = 200, description = "Window created", body = SuccessResponse),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 500, description = "tmux failed", body = ErrorBody)
    )
)]
async fn create_window(
    State(state): State<AppState>,
    Path(session): Path<String>,
    JsonBody(request): JsonBody<CreateWindowRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let name = request.name.as_deref().filter(|name| !name.is_empty());
    state.multiplexer.create_window(&session, name).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{session}/windows/{window}",
    tag = "windows",
    params(
        ("session" = String, Path, description = "Session name"),
        ("window" = u32, Path, description = "Window index")
    ),
    responses(
        (status = 200, description = "Window killed", body = SuccessResponse),
        (status = 400, description = "Invalid window index", body = ErrorBody),
        (status = 500, description = "tmux failed", body = ErrorBody)
    )
)]
async fn delete_window(
    State(state): State<AppState>,
    Path((session, window)): Path<(String, String)>,
) -> ApiResult<Json<SuccessResponse>> {
    let index = parse_window_index(&window)?;
    state.multiplexer.kill_window(&session, index).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    put,
    path = "/api/sessions/{session}/windows/{window}/name",
    tag = "windows",
    params(
        ("session" = String, Path, description = "Session name"),
        ("window" = u32, Path, description = "Window index")
    ),
    request_body = NameRequest,
    responses(
        (status = 200, description = "Window renamed", body = SuccessResponse),
        (status = 400, description = "Missing name or invalid window index", body = ErrorBody),
        (status = 500, description = "tmux failed", body = ErrorBody)
    )
)]
async fn rename_window(
    State(state): State<AppState>,
    Path((session, window)): Path<(String, String)>,
    JsonBody(request): JsonBody<NameRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let name = required_name(&request)?;
    let index = parse_window_index(&window)?;
    state.multiplexer.rename_window(&session, index, name).await?;
    Ok(Json(SuccessResponse::ok()))
}
