//! HTTP front end: JSON and SSE endpoints over [`ChatApi`].

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::ChatApi;
use crate::error::Result;
use crate::types::Message;

/// Sentinel sent as the last SSE payload of every streamed turn.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stream: bool,
}

/// Build the router. Exposed separately from [`serve`] for in-process testing.
pub fn router(api: Arc<ChatApi>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/tools", get(handle_tools))
        .route("/chat", post(handle_chat))
        .route("/chat/conversation", post(handle_conversation))
        .layer(CorsLayer::permissive())
        .with_state(api)
}

/// Connect the tool registry, then serve until Ctrl-C.
pub async fn serve(api: Arc<ChatApi>, host: &str, port: u16) -> Result<()> {
    let info = api.connect().await;
    if info.success {
        info!(tools = info.tool_count, "tool registry connected");
    } else {
        warn!(error = info.error.as_deref(), "tool registry unavailable; chat endpoints will return 503");
    }

    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    info!(%host, port, "HTTP server listening");
    axum::serve(listener, router(api.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    api.disconnect().await;
    Ok(())
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

/// Chat endpoints need a connected registry; try once more before refusing.
async fn ensure_connected(api: &ChatApi) -> std::result::Result<(), Response> {
    if api.is_connected().await {
        return Ok(());
    }
    let info = api.connect().await;
    if info.success {
        Ok(())
    } else {
        let reason = info.error.unwrap_or_else(|| "unknown error".into());
        Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("MCP server not connected: {reason}"),
        ))
    }
}

async fn handle_health(State(api): State<Arc<ChatApi>>) -> Response {
    let health = api.health_check().await;
    let status = if health.connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health)).into_response()
}

async fn handle_tools(State(api): State<Arc<ChatApi>>) -> Response {
    if let Err(resp) = ensure_connected(&api).await {
        return resp;
    }
    let tools = api.available_tools().await;
    Json(json!({ "tools": tools })).into_response()
}

async fn handle_chat(State(api): State<Arc<ChatApi>>, Json(req): Json<ChatRequest>) -> Response {
    let request_id = Uuid::new_v4();
    info!(%request_id, stream = req.stream, "POST /chat");
    if let Err(resp) = ensure_connected(&api).await {
        return resp;
    }
    respond(&api, req.message, req.messages, req.stream).await
}

async fn handle_conversation(
    State(api): State<Arc<ChatApi>>,
    Json(req): Json<ConversationRequest>,
) -> Response {
    let request_id = Uuid::new_v4();
    info!(%request_id, stream = req.stream, messages = req.messages.len(), "POST /chat/conversation");
    let Some((prompt, history)) = split_conversation(req.messages) else {
        return error_response(StatusCode::BAD_REQUEST, "No user message found in conversation");
    };
    if let Err(resp) = ensure_connected(&api).await {
        return resp;
    }
    respond(&api, prompt, Some(history), req.stream).await
}

async fn respond(
    api: &ChatApi,
    message: String,
    history: Option<Vec<Message>>,
    streaming: bool,
) -> Response {
    if !streaming {
        return Json(api.chat(&message, history).await).into_response();
    }

    let events = api.chat_stream(message, history).await.map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|e| {
            json!({ "type": "complete", "content": format!("Error: {e}") }).to_string()
        });
        Ok::<_, Infallible>(Event::default().data(data))
    });
    let done = stream::once(async { Ok::<_, Infallible>(Event::default().data(DONE_SENTINEL)) });

    Sse::new(events.chain(done))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Last user message becomes the prompt; the messages before it are history.
pub fn split_conversation(mut messages: Vec<Message>) -> Option<(String, Vec<Message>)> {
    let last_user = messages
        .iter()
        .rposition(|m| matches!(m, Message::User { .. }))?;
    messages.truncate(last_user + 1);
    match messages.pop() {
        Some(Message::User { content }) => Some((content, messages)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn conversation_split_takes_last_user_message() {
        let (prompt, history) = split_conversation(vec![
            Message::system("sys"),
            Message::user("first"),
            Message::assistant("reply", Vec::new()),
            Message::user("second"),
        ])
        .unwrap();
        assert_eq!(prompt, "second");
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], Message::user("first"));
    }

    #[test]
    fn conversation_without_user_message_is_rejected() {
        assert!(split_conversation(vec![Message::system("sys")]).is_none());
        assert!(split_conversation(Vec::new()).is_none());
    }

    #[test]
    fn chat_request_defaults_to_non_streaming() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(!req.stream);
        assert!(req.messages.is_none());
    }
}
