//! REST endpoints for the mailbox, manual drafting/sending and auto-reply.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::inbox::InboxContext;
use crate::pipeline::{BatchResult, DraftReply, SendRequest};

const MAILBOX_ERROR: &str = "Unable to load mailbox. Check server logs for details.";
const DRAFT_ERROR: &str = "Unable to generate reply draft.";
const SEND_ERROR: &str = "Unable to send reply.";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct ApiState {
    pub ctx: Arc<InboxContext>,
}

/// Build the router with all HTTP routes.
pub fn api_routes(ctx: Arc<InboxContext>) -> Router {
    let state = ApiState { ctx };

    Router::new()
        .route("/health", get(health))
        .route("/api/mailbox", get(list_mailbox))
        .route("/api/draft", post(generate_draft))
        .route("/api/send", post(send_reply))
        .route("/api/auto-reply", post(auto_reply))
        .route("/api/status", get(status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// First missing or blank required field.
fn require(fields: &[(&str, &str)]) -> Result<(), String> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(format!("{name} is required")),
        None => Ok(()),
    }
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "inbox-agent"
    }))
}

// ── Mailbox ─────────────────────────────────────────────────────────

async fn list_mailbox(State(state): State<ApiState>) -> Response {
    match state.ctx.refresh().await {
        Ok(messages) => (StatusCode::OK, Json(json!({ "messages": messages }))).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to load mailbox");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, MAILBOX_ERROR)
        }
    }
}

// ── Draft ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftPayload {
    #[serde(default)]
    message_id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    from: String,
    #[serde(default)]
    body_text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DraftResponse {
    draft: DraftReply,
    recommended_subject: String,
}

async fn generate_draft(
    State(state): State<ApiState>,
    payload: Result<Json<DraftPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected draft request body");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, DRAFT_ERROR);
        }
    };
    if let Err(message) = require(&[
        ("messageId", payload.message_id.as_str()),
        ("threadId", payload.thread_id.as_str()),
        ("from", payload.from.as_str()),
        ("bodyText", payload.body_text.as_str()),
    ]) {
        warn!(%message, "Invalid draft request");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, DRAFT_ERROR);
    }

    match state
        .ctx
        .draft(
            &payload.message_id,
            payload.subject.as_deref(),
            &payload.from,
            &payload.body_text,
        )
        .await
    {
        Ok(draft) => {
            let response = DraftResponse {
                recommended_subject: draft.subject,
                draft: DraftReply {
                    reply: draft.reply,
                    auto_send: draft.auto_send,
                    reasoning: draft.reasoning,
                },
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to draft reply");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, DRAFT_ERROR)
        }
    }
}

// ── Send ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendPayload {
    #[serde(default)]
    to: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    in_reply_to: Option<String>,
    #[serde(default)]
    subject: Option<String>,
}

async fn send_reply(
    State(state): State<ApiState>,
    payload: Result<Json<SendPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected send request body");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, SEND_ERROR);
        }
    };
    if let Err(message) = require(&[
        ("to", payload.to.as_str()),
        ("body", payload.body.as_str()),
        ("threadId", payload.thread_id.as_str()),
    ]) {
        warn!(%message, "Invalid send request");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, SEND_ERROR);
    }

    let request = SendRequest {
        to: payload.to,
        body: payload.body,
        thread_id: payload.thread_id,
        message_id: payload.message_id,
        in_reply_to: payload.in_reply_to,
        subject: payload.subject,
    };

    match state.ctx.send_manual(request).await {
        Ok(report) => {
            info!(to = %report.to, "Manual reply sent");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "sent",
                    "markedAsReplied": report.marked_as_replied(),
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to send reply");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, SEND_ERROR)
        }
    }
}

// ── Auto-reply ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AutoReplyResponse {
    #[serde(flatten)]
    result: BatchResult,
    summary: String,
}

async fn auto_reply(State(state): State<ApiState>) -> Response {
    match state.ctx.run_auto_reply().await {
        Ok(result) => {
            let summary = result.summary();
            (StatusCode::OK, Json(AutoReplyResponse { result, summary })).into_response()
        }
        Err(PipelineError::BatchInProgress) => {
            warn!("Auto reply requested while a run is in progress");
            error_response(
                StatusCode::CONFLICT,
                PipelineError::BatchInProgress.to_string(),
            )
        }
        Err(e) => {
            error!(error = %e, "Auto reply failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ── Status ──────────────────────────────────────────────────────────

async fn status(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.ctx.snapshot().await;
    Json(json!({
        "running": state.ctx.is_running(),
        "messageCount": snapshot.messages.len(),
        "lastUpdated": snapshot.fetched_at,
        "lastError": snapshot.last_error,
    }))
}
