use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use kanban_config::{merge_settings, ConnectionDefaults, Settings, SettingsStore};
use kanban_domain::{default_color_rules, default_columns, ColorRule, ColumnConfig};
use kanban_jira::JiraClient;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::ApiError,
    telemetry::observe,
    views::{analytics_view, board_view, search_request, SearchBody, SearchPage},
};

pub type Clock = fn() -> DateTime<Utc>;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub store: SettingsStore,
    pub connection_defaults: ConnectionDefaults,
    pub default_columns: Vec<ColumnConfig>,
    pub default_rules: Vec<ColorRule>,
    pub clock: Clock,
}

impl AppState {
    pub fn new(store: SettingsStore, connection_defaults: ConnectionDefaults) -> Self {
        Self {
            store,
            connection_defaults,
            default_columns: default_columns(),
            default_rules: default_color_rules(),
            clock: Utc::now,
        }
    }

    pub fn with_clock(self, clock: Clock) -> Self {
        Self { clock, ..self }
    }
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBody {
    pub to_status: String,
    pub fields: Option<Value>,
}

#[derive(Deserialize)]
pub struct CommentBody {
    pub body: String,
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/health", get(health).post(health_probe))
        .route("/api/settings", get(get_settings).post(save_settings))
        .route("/api/settings/export", post(export_settings))
        .route("/api/settings/import", post(save_settings))
        .route("/api/search", post(search))
        .route("/api/issue/{key}", get(get_issue))
        .route("/api/issue/{key}/transition", post(transition_issue))
        .route(
            "/api/issue/{key}/comments",
            get(list_comments).post(add_comment),
        )
        .route("/api/board", post(board))
        .route("/api/analytics", post(analytics))
}

pub fn build_router(state: SharedState) -> Router {
    api_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Helpers ───────────────────────────────────────────────────────────

async fn load_settings(state: &SharedState) -> Result<Settings, ApiError> {
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || store.load())
        .await
        .map_err(|error| ApiError::internal(error.to_string()))?
        .map_err(ApiError::from)
}

async fn store_settings(state: &SharedState, settings: Settings) -> Result<Settings, ApiError> {
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || store.save(&settings).map(|()| settings))
        .await
        .map_err(|error| ApiError::internal(error.to_string()))?
        .map_err(ApiError::from)
}

fn jira_client(state: &SharedState, settings: &Settings) -> Result<JiraClient, ApiError> {
    let connection = settings.connection(&state.connection_defaults)?;
    Ok(JiraClient::new(&connection)?)
}

/// Decodes a JSON body; an empty body reads as `{}`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let payload: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(payload)
        .map_err(|error| ApiError::bad_request(format!("invalid request body: {error}")))
}

async fn search_issues(
    state: &SharedState,
    settings: &Settings,
    body: SearchBody,
) -> Result<Value, ApiError> {
    let client = jira_client(state, settings)?;
    let request = search_request(settings, body);
    Ok(observe("search", None, client.search(&request)).await?)
}

async fn search_page(state: &SharedState, body: &Bytes) -> Result<(Settings, SearchPage), ApiError> {
    let settings = load_settings(state).await?;
    let query: SearchBody = parse_body(body)?;
    let payload = search_issues(state, &settings, query).await?;
    let page = SearchPage::from_value(payload)
        .map_err(|error| ApiError::internal(format!("failed to decode Jira search response: {error}")))?;
    Ok((settings, page))
}

async fn connectivity(state: &SharedState, settings: &Settings) -> Response {
    let result = match jira_client(state, settings) {
        Ok(client) => observe("myself", None, client.myself())
            .await
            .map_err(ApiError::from),
        Err(error) => Err(error),
    };

    match result {
        Ok(user) => Json(json!({ "ok": true, "user": user })).into_response(),
        Err(error) => health_failure(error),
    }
}

fn health_failure(error: ApiError) -> Response {
    (
        error.status(),
        Json(json!({ "ok": false, "error": error.message() })),
    )
        .into_response()
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health(State(state): State<SharedState>) -> Response {
    match load_settings(&state).await {
        Ok(settings) => connectivity(&state, &settings).await,
        Err(error) => health_failure(error),
    }
}

/// Connectivity check with unsaved settings layered over the stored ones.
async fn health_probe(State(state): State<SharedState>, body: Bytes) -> Response {
    let probe = async {
        let stored = load_settings(&state).await?;
        let overlay: Value = parse_body(&body)?;
        Ok::<_, ApiError>(merge_settings(&stored, overlay)?)
    };

    match probe.await {
        Ok(settings) => connectivity(&state, &settings).await,
        Err(error) => health_failure(error),
    }
}

async fn get_settings(State(state): State<SharedState>) -> Result<Json<Settings>, ApiError> {
    Ok(Json(load_settings(&state).await?))
}

async fn save_settings(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<Settings>, ApiError> {
    let settings: Settings = parse_body(&body)?;
    let saved = store_settings(&state, settings).await?;
    tracing::info!(path = %state.store.path().display(), "settings saved");
    Ok(Json(saved))
}

async fn export_settings(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let settings = load_settings(&state).await?;
    Ok(Json(json!({ "export": settings })))
}

async fn search(State(state): State<SharedState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let settings = load_settings(&state).await?;
    let query: SearchBody = parse_body(&body)?;
    Ok(Json(search_issues(&state, &settings, query).await?))
}

async fn get_issue(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let settings = load_settings(&state).await?;
    let client = jira_client(&state, &settings)?;
    Ok(Json(observe("issue", Some(&key), client.issue(&key)).await?))
}

async fn transition_issue(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let settings = load_settings(&state).await?;
    let payload: TransitionBody = parse_body(&body)?;
    let client = jira_client(&state, &settings)?;

    observe(
        "transition",
        Some(&key),
        client.transition_to_status(&key, &payload.to_status, payload.fields),
    )
    .await
    .map_err(ApiError::with_details)?;

    tracing::info!(key = %key, to_status = %payload.to_status, "issue transitioned");
    Ok(Json(json!({ "ok": true })))
}

async fn list_comments(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let settings = load_settings(&state).await?;
    let client = jira_client(&state, &settings)?;
    Ok(Json(
        observe("comments", Some(&key), client.comments(&key)).await?,
    ))
}

async fn add_comment(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let settings = load_settings(&state).await?;
    let payload: CommentBody = parse_body(&body)?;
    let client = jira_client(&state, &settings)?;

    observe(
        "comment.add",
        Some(&key),
        client.add_comment(&key, &payload.body),
    )
    .await?;
    Ok(Json(json!({ "ok": true })))
}

async fn board(State(state): State<SharedState>, body: Bytes) -> Result<Response, ApiError> {
    let (settings, page) = search_page(&state, &body).await?;
    let view = board_view(
        &settings,
        &page.issues,
        page.total,
        &state.default_columns,
        &state.default_rules,
        (state.clock)(),
    );
    Ok(Json(view).into_response())
}

async fn analytics(State(state): State<SharedState>, body: Bytes) -> Result<Response, ApiError> {
    let (settings, page) = search_page(&state, &body).await?;
    Ok(Json(analytics_view(&settings, &page.issues)).into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use kanban_config::{ConnectionDefaults, SettingsStore};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::{build_router, AppState};

    fn test_router() -> (Router, TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let state = AppState::new(store, ConnectionDefaults::default());
        (build_router(Arc::new(state)), dir)
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn settings_are_created_with_defaults() {
        let (app, dir) = test_router();
        let (status, body) = send(app, "GET", "/api/settings", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dueDateField"], json!("duedate"));
        assert_eq!(body["statuses"][0]["name"], json!("To Do"));
        assert_eq!(body["colorRules"].as_array().map(Vec::len), Some(5));
        assert!(dir.path().join("settings.json").exists());
    }

    #[tokio::test]
    async fn saved_settings_are_served_and_exported() {
        let (app, _dir) = test_router();
        let (status, saved) = send(
            app.clone(),
            "POST",
            "/api/settings",
            Some(json!({"baseUrl": "https://jira.example.com", "jql": "project = OPS"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["baseUrl"], json!("https://jira.example.com"));

        let (_, loaded) = send(app.clone(), "GET", "/api/settings", None).await;
        assert_eq!(loaded["jql"], json!("project = OPS"));
        assert_eq!(loaded["statuses"][3]["id"], json!("done"));

        let (status, exported) = send(app, "POST", "/api/settings/export", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(exported["export"]["jql"], json!("project = OPS"));
    }

    #[tokio::test]
    async fn import_replaces_settings() {
        let (app, _dir) = test_router();
        let (status, _) = send(
            app.clone(),
            "POST",
            "/api/settings/import",
            Some(json!({"jql": "project = IMP", "colorRules": []})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, loaded) = send(app, "GET", "/api/settings", None).await;
        assert_eq!(loaded["jql"], json!("project = IMP"));
        assert_eq!(loaded["colorRules"], json!([]));
    }

    #[tokio::test]
    async fn health_reports_missing_base_url() {
        let (app, _dir) = test_router();
        let (status, body) = send(app, "GET", "/api/health", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"ok": false, "error": "Missing Jira baseUrl"}));
    }

    #[tokio::test]
    async fn proxy_routes_require_base_url_before_any_call() {
        let (app, _dir) = test_router();
        let (status, body) = send(app.clone(), "POST", "/api/search", Some(json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], json!("Missing Jira baseUrl"));

        let (status, _) = send(app, "GET", "/api/issue/DEMO-1/comments", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn malformed_transition_body_is_rejected() {
        let (app, _dir) = test_router();
        let (status, body) = send(
            app,
            "POST",
            "/api/issue/DEMO-1/transition",
            Some(json!({"fields": {}})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"]
            .as_str()
            .is_some_and(|message| message.contains("toStatus")));
    }
}
