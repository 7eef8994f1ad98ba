use crate::types::*;
use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use toolgate_core::{CallContext, Envelope, ErrorBody, ErrorCode};
use toolgate_openapi::{ToolDescription, ToolRegistry, ToolSummary};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
}

pub fn create_router(registry: Arc<ToolRegistry>) -> Router {
    let state = AppState { registry };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/tools", get(list_tools))
        .route("/api/v1/tools/describe", get(describe_all))
        .route("/api/v1/tools/:name", get(describe_tool))
        .route("/api/v1/tools/:name/call", post(call_tool))
        // Middleware layers (applied in reverse order)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C.
pub async fn serve_http(registry: Arc<ToolRegistry>, addr: &str) -> anyhow::Result<()> {
    let app = create_router(registry.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        "Serving {} tools for {} on http://{}",
        registry.len(),
        registry.title(),
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down HTTP transport");
        })
        .await
        .context("HTTP server failed")
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    tracing::debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        api: state.registry.title().to_string(),
        version: state.registry.version().to_string(),
        tools: state.registry.len(),
    })
}

async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSummary>> {
    Json(state.registry.list())
}

async fn describe_all(State(state): State<AppState>) -> Json<Vec<ToolDescription>> {
    Json(state.registry.describe_all())
}

async fn describe_tool(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ToolDescription>, AppError> {
    state
        .registry
        .describe_tool(&name)
        .map(Json)
        .ok_or_else(|| AppError::unknown_tool(&name))
}

async fn call_tool(
    Path(name): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<CallToolRequest>>,
) -> Result<Json<Envelope>, AppError> {
    if state.registry.get(&name).is_none() {
        return Err(AppError::unknown_tool(&name));
    }

    let request = body.map(|Json(b)| b).unwrap_or_default();
    let mut ctx = CallContext::new();
    if let Some(credentials) = request.credentials {
        ctx = ctx.with_credentials(credentials);
    }

    Ok(Json(
        state
            .registry
            .call_with(&ctx, &name, request.arguments)
            .await,
    ))
}

// Error handling
pub struct AppError {
    status: StatusCode,
    body: ErrorBody,
}

impl AppError {
    fn unknown_tool(name: &str) -> Self {
        AppError {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody::new(ErrorCode::UnknownTool, format!("Unknown tool '{name}'"))
                .with_suggestion("GET /api/v1/tools lists the available tools."),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(Envelope::error(self.body))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use toolgate_openapi::{EngineOptions, load_from_str};
    use tower::ServiceExt;

    const SPEC: &str = r#"
openapi: 3.0.3
info:
  title: Notes
  version: 0.3.0
paths:
  /notes/{id}:
    get:
      operationId: getNote
      summary: Fetch a note
      tags: [notes]
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: integer
      responses:
        '200':
          description: ok
"#;

    fn router() -> Router {
        let spec = load_from_str(SPEC).unwrap();
        let options = EngineOptions {
            dry_run: true,
            ..Default::default()
        };
        create_router(Arc::new(ToolRegistry::from_spec(&spec, options).unwrap()))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["api"], "Notes");
        assert_eq!(body["tools"], 3);
    }

    #[tokio::test]
    async fn test_list_tools() {
        let (status, body) = send(get("/api/v1/tools")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "getNote");
        assert_eq!(body[0]["description"], "Fetch a note");
        assert_eq!(body[0]["tags"], json!(["notes"]));
    }

    #[tokio::test]
    async fn test_describe_routes() {
        let (status, body) = send(get("/api/v1/tools/describe")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, body) = send(get("/api/v1/tools/getNote")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["inputSchema"]["required"], json!(["id"]));
        assert_eq!(body["examples"][0], json!({"id": 1}));

        let (status, body) = send(get("/api/v1/tools/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "UnknownTool");
    }

    #[tokio::test]
    async fn test_call_routes() {
        let (status, body) = send(post_json("/api/v1/tools/info/call", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "json");
        assert_eq!(body["data"]["version"], "0.3.0");

        let (status, body) = send(post_json(
            "/api/v1/tools/getNote/call",
            json!({"arguments": {"id": 1}}),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["code"], "NotExecutable");

        let (status, body) = send(post_json("/api/v1/tools/nope/call", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "error");
    }
}
