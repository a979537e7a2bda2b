use crate::activity::ActivityEvent;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use writerly_core::{
    validate_no_tool_injection, GenerationRequest, GenerationResult, MetricSummary, Task, VoiceSettings,
};

/// Header carrying the authenticated user id.
pub const USER_HEADER: &str = "x-user-id";

/// User id for unauthenticated callers.
pub const ANONYMOUS_USER: &str = "anon";

pub struct WriterlyServer {
    state: AppState,
}

impl WriterlyServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// All routes with shared state attached.
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub async fn start(self, port: u16) -> std::io::Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        tracing::info!("Writerly API listening on http://localhost:{}", port);
        axum::serve(listener, app).await
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/metrics", get(metrics))
        .route("/api/activity", get(activity))
        .route("/api/settings/voice", get(get_voice).put(put_voice))
        .route("/api/ai/generate", post(generate))
        .route("/api/rewrite", post(rewrite))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_string()
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "providers": state.orchestrator.registry().names(),
    }))
}

async fn metrics(State(state): State<AppState>) -> Json<BTreeMap<String, MetricSummary>> {
    Json(state.metrics().snapshot())
}

#[derive(Debug, Deserialize)]
struct ActivityQuery {
    limit: Option<usize>,
}

async fn activity(State(state): State<AppState>, Query(query): Query<ActivityQuery>) -> Json<Vec<ActivityEvent>> {
    Json(state.activity.recent(query.limit.unwrap_or(50)))
}

fn voice_body(stored: VoiceSettings) -> Json<Value> {
    Json(json!({
        "voice": stored,
        "effective": stored.effective(),
    }))
}

async fn get_voice(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    voice_body(state.stored_voice(&user_id(&headers)))
}

async fn put_voice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let user = user_id(&headers);
    let settings = VoiceSettings::from_value(&body);
    state.store_voice(&user, settings);
    tracing::debug!(user = %user, "Stored voice defaults");
    voice_body(settings)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateBody {
    task: Task,
    instruction: Option<String>,
    /// Older clients send `text` instead of `instruction`.
    text: Option<String>,
    context: Option<String>,
    settings: Value,
    provider: Option<String>,
}

async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<GenerationResult>, ApiError> {
    validate_no_tool_injection(&body)?;
    let body: GenerateBody = serde_json::from_value(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let instruction = body.instruction.or(body.text).unwrap_or_default();
    let context = body.context.unwrap_or_default();
    if instruction.trim().is_empty() && context.trim().is_empty() {
        return Err(ApiError::BadRequest("instruction or context is required".to_string()));
    }

    let user = user_id(&headers);
    let voice = VoiceSettings::from_value(&body.settings).merged_over(&state.stored_voice(&user));

    let mut request = GenerationRequest::new(user)
        .with_task(body.task)
        .with_instruction(instruction)
        .with_context(context)
        .with_voice(voice);
    if let Some(provider) = body.provider.filter(|p| !p.trim().is_empty()) {
        request = request.with_provider(provider);
    }

    let result = state.orchestrator.generate(request).await?;
    Ok(Json(result))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("application/json"))
}

/// Rewrite `text` from a JSON body, or a raw non-JSON body taken as the text.
async fn rewrite(
    State(state): State<AppState>,
    headers: HeaderMap,
    raw: Bytes,
) -> Result<Json<GenerationResult>, ApiError> {
    let (text, body) = if is_json(&headers) {
        let body: Value = serde_json::from_slice(&raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        validate_no_tool_injection(&body)?;
        let text = state
            .sanitizer
            .sanitize_value(body.get("text").unwrap_or(&Value::Null))?;
        (text, body)
    } else {
        (state.sanitizer.sanitize_bytes(&raw)?, Value::Null)
    };

    let user = user_id(&headers);
    let settings = body.get("settings").map(VoiceSettings::from_value).unwrap_or_default();
    let voice = settings.merged_over(&state.stored_voice(&user));

    let mut request = GenerationRequest::new(user)
        .with_task(Task::Rewrite)
        .with_context(text)
        .with_voice(voice);
    if let Some(provider) = body.get("provider").and_then(Value::as_str).filter(|p| !p.trim().is_empty()) {
        request = request.with_provider(provider);
    }

    let result = state.orchestrator.generate(request).await?;
    Ok(Json(result))
}
