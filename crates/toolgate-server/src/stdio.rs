//! Line-delimited JSON-RPC 2.0 transport.
//!
//! One request per line in, one response per line out. Every request runs on
//! its own task; a single writer task owns the output so responses never
//! interleave. Logs go to stderr, never to the protocol stream.

use crate::types::*;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use toolgate_core::{CallContext, Credentials};
use toolgate_openapi::ToolRegistry;
use tracing::{debug, error, info, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Serve the registry over the process's stdin/stdout until stdin closes.
pub async fn serve_stdio(registry: Arc<ToolRegistry>) -> anyhow::Result<()> {
    serve_stream(registry, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve the registry over any line-oriented byte stream.
///
/// Returns once `reader` reaches EOF and every in-flight request has been
/// answered.
pub async fn serve_stream<R, W>(
    registry: Arc<ToolRegistry>,
    reader: R,
    writer: W,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);
        while let Some(line) = rx.recv().await {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    info!("stdio transport ready with {} tools", registry.len());

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let registry = registry.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let Some(response) = handle_line(&registry, &line).await else {
                return;
            };
            match serde_json::to_string(&response) {
                Ok(encoded) => {
                    if tx.send(encoded).is_err() {
                        warn!("Writer closed before response was sent");
                    }
                }
                Err(e) => error!("Failed to encode response: {}", e),
            }
        });
    }

    info!("stdin closed, waiting for in-flight requests");
    // The writer stops once every request task has dropped its sender.
    drop(tx);
    writer_task.await??;
    Ok(())
}

/// Handle one raw line. Notifications produce no response.
pub async fn handle_line(registry: &ToolRegistry, line: &str) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            debug!("Unparseable request: {}", e);
            return Some(JsonRpcResponse::failure(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {e}"),
            ));
        }
    };

    let Some(id) = request.id.clone() else {
        debug!(method = %request.method, "Notification received");
        return None;
    };

    if request.jsonrpc != "2.0" {
        return Some(JsonRpcResponse::failure(
            id,
            INVALID_REQUEST,
            "jsonrpc must be \"2.0\"",
        ));
    }

    Some(dispatch(registry, id, &request.method, request.params).await)
}

async fn dispatch(
    registry: &ToolRegistry,
    id: Value,
    method: &str,
    params: Option<Value>,
) -> JsonRpcResponse {
    match method {
        "initialize" => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {
                    "name": "toolgate",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "instructions": format!(
                    "Tools for {} {}. Mutating calls must be repeated with \"__confirmed\": true.",
                    registry.title(),
                    registry.version()
                ),
            }),
        ),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => {
            let tools: Vec<Value> = registry
                .entries()
                .iter()
                .map(|entry| {
                    json!({
                        "name": entry.name,
                        "description": entry.description,
                        "tags": entry.tags,
                        "inputSchema": entry.input_schema,
                    })
                })
                .collect();
            JsonRpcResponse::success(id, json!({ "tools": tools }))
        }
        "tools/call" => call_tool(registry, id, params.unwrap_or(Value::Null)).await,
        other => {
            JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}"))
        }
    }
}

async fn call_tool(registry: &ToolRegistry, id: Value, params: Value) -> JsonRpcResponse {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::failure(id, INVALID_PARAMS, "tools/call requires a tool name");
    };
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    let mut ctx = CallContext::new();
    if let Some(raw) = params.get("credentials") {
        match serde_json::from_value::<Credentials>(raw.clone()) {
            Ok(credentials) => ctx = ctx.with_credentials(credentials),
            Err(e) => {
                return JsonRpcResponse::failure(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid credentials: {e}"),
                );
            }
        }
    }

    let envelope = registry.call_with(&ctx, name, arguments).await;
    let text = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());

    JsonRpcResponse::success(
        id,
        json!({
            "content": [{"type": "text", "text": text}],
            "structuredContent": envelope,
            "isError": envelope.is_error(),
        }),
    )
}
