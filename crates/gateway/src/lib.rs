//! HTTP API gateway for tutorflow.
//!
//! Endpoints:
//!
//! - `GET  /`                — Service banner
//! - `GET  /health`          — Liveness
//! - `GET  /user/{user_id}`  — Stored learning profile
//! - `POST /chat`            — Route a student message to a tool
//! - `GET  /tools`           — Registered tools and their schemas
//! - `POST /tools/reload`    — Re-read the tool registry
//!
//! Built on Axum. The pipeline runs inside the request future, so a dropped
//! connection abandons every pending external call with it.

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::{
    Router,
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use tutorflow_config::{AppConfig, GatewayConfig};
use tutorflow_core::error::ProfileError;
use tutorflow_core::message::ChatTurn;
use tutorflow_core::profile::LearningProfile;
use tutorflow_core::schema::describe;
use tutorflow_pipeline::{ChatReply, ChatRequest, Pipeline};

/// Shared application state for the gateway.
pub struct GatewayState {
    /// Used to re-read the registry on reload.
    pub config: AppConfig,
    pub pipeline: Arc<Pipeline>,
}

pub type SharedState = Arc<GatewayState>;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Build the router with every route and the trace layer.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/user/{user_id}", get(user_handler))
        .route("/chat", post(chat_handler))
        .route("/tools", get(list_tools_handler))
        .route("/tools/reload", post(reload_tools_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// The router plus CORS and a request body limit from `[gateway]`.
pub fn build_full_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    build_router(state)
        .layer(DefaultBodyLimit::max(gateway.body_limit_bytes))
        .layer(cors_layer(&gateway.cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let pipeline = Arc::new(Pipeline::from_config(&config).await?);
    let tools = pipeline.registry().snapshot().ids().join(", ");

    let gateway = config.gateway.clone();
    let state = Arc::new(GatewayState { config, pipeline });
    let app = build_full_router(state, &gateway);

    info!(addr = %addr, tools = %tools, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn root_handler(State(state): State<SharedState>) -> Json<Value> {
    let registry = state.pipeline.registry().snapshot();
    Json(json!({
        "service": "tutorflow",
        "description": "Routes student messages to educational tools",
        "version": env!("CARGO_PKG_VERSION"),
        "tools": registry.ids(),
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "tutorflow",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn user_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<LearningProfile>, ApiError> {
    match state.pipeline.profiles().profile(&user_id).await {
        Ok(profile) => Ok(Json(profile)),
        Err(ProfileError::NotFound(_)) => Err(error(
            StatusCode::NOT_FOUND,
            format!("User not found: {user_id}"),
        )),
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Profile lookup failed");
            Err(error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}

/// Wire shape of `POST /chat`. Fields are optional here so a missing one
/// can be reported by name.
#[derive(Deserialize)]
struct ChatPayload {
    user_id: Option<String>,
    session_id: Option<String>,
    message: Option<String>,
    chat_history: Option<Vec<ChatTurn>>,
}

impl ChatPayload {
    fn into_request(self) -> Result<ChatRequest, String> {
        fn required(field: &str, value: Option<String>) -> Result<String, String> {
            match value {
                Some(v) if !v.trim().is_empty() => Ok(v),
                Some(_) => Err(format!("'{field}' must not be empty")),
                None => Err(format!("'{field}' is required")),
            }
        }
        Ok(ChatRequest {
            user_id: required("user_id", self.user_id)?,
            session_id: required("session_id", self.session_id)?,
            message: required("message", self.message)?,
            chat_history: self.chat_history,
        })
    }
}

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| error(rejection.status(), rejection.body_text()))?;
    let request = payload
        .into_request()
        .map_err(|reason| error(StatusCode::UNPROCESSABLE_ENTITY, reason))?;

    info!(
        user_id = %request.user_id,
        message_len = request.message.len(),
        "Chat request received"
    );
    Ok(Json(state.pipeline.handle(request).await))
}

#[derive(Serialize, Deserialize)]
struct ToolListResponse {
    tools: Vec<ToolDto>,
    count: usize,
}

#[derive(Serialize, Deserialize)]
struct ToolDto {
    id: String,
    display_name: String,
    description: String,
    keywords: Vec<String>,
    endpoint: String,
    parameters: Value,
}

async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let registry = state.pipeline.registry().snapshot();
    let tools: Vec<ToolDto> = registry
        .iter()
        .map(|t| ToolDto {
            id: t.id.to_string(),
            display_name: t.display_name.clone(),
            description: t.description.clone(),
            keywords: t.keywords.clone(),
            endpoint: t.endpoint.clone(),
            parameters: describe(&t.params),
        })
        .collect();

    Json(ToolListResponse {
        count: tools.len(),
        tools,
    })
}

async fn reload_tools_handler(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let registry = state.config.registry().map_err(|e| {
        warn!(error = %e, "Registry reload rejected");
        error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    })?;

    let ids: Vec<String> = registry.ids().into_iter().map(String::from).collect();
    state.pipeline.registry().replace(registry);
    info!(tools = %ids.join(", "), "Tool registry reloaded");

    Ok(Json(json!({ "reloaded": true, "count": ids.len(), "tools": ids })))
}
