//! Inbound webhook transport.
//!
//! Deliberately thin: it parses interaction payloads, resolves the command
//! and target alias, spawns orchestration, and returns the synchronous
//! acknowledgment. Authenticity verification of inbound requests belongs to
//! the fronting gateway, not this service.

use crate::app_state::AppState;
use crate::domain::{Action, ActionRequest, ReplyChannel};
use crate::status;
use crate::telemetry::counters;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

const INTERACTION_PING: u8 = 1;
const INTERACTION_COMMAND: u8 = 2;
const RESPONSE_PONG: u8 = 1;
const RESPONSE_MESSAGE: u8 = 4;

#[derive(Debug, Deserialize)]
pub struct InboundInteraction {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    data: Option<CommandData>,
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommandData {
    name: String,
    #[serde(default)]
    options: Vec<CommandOption>,
}

#[derive(Debug, Deserialize)]
struct CommandOption {
    name: String,
    #[serde(default)]
    value: JsonValue,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/interactions", post(handle_interaction))
        .route("/health", get(health))
        .with_state(state)
}

async fn handle_interaction(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InboundInteraction>,
) -> Json<JsonValue> {
    counters().record_webhook_request("/interactions");

    let body = match payload.kind {
        INTERACTION_PING => json!({ "type": RESPONSE_PONG }),
        INTERACTION_COMMAND => handle_command(&state, payload),
        other => {
            tracing::debug!(kind = other, "ignoring unsupported interaction type");
            message_reply("unsupported interaction")
        }
    };

    Json(body)
}

fn handle_command(state: &Arc<AppState>, payload: InboundInteraction) -> JsonValue {
    let Some(data) = payload.data else {
        return message_reply("malformed command payload");
    };

    let Some(action) = Action::parse(&data.name) else {
        tracing::info!(command = %data.name, "unknown command");
        return message_reply(&format!("meh, what is `{}`?", data.name));
    };

    let alias = data
        .options
        .iter()
        .find(|option| option.name == "server")
        .and_then(|option| option.value.as_str());

    let Some(target) = state.fleet.resolve_target(alias) else {
        let label = alias.unwrap_or("(default)");
        tracing::info!(alias = label, "command names an unconfigured server");
        return message_reply(&format!("unknown server `{label}`, please pick a configured one"));
    };

    let Some(channel_id) = payload.channel_id.filter(|id| !id.is_empty()) else {
        return message_reply("cannot determine a reply channel for this command");
    };

    let request = ActionRequest {
        action,
        target: target.clone(),
        channel: ReplyChannel::new(channel_id),
    };
    state.orchestrator.dispatch(request);

    message_reply(status::acknowledgement(action))
}

fn message_reply(text: &str) -> JsonValue {
    json!({ "type": RESPONSE_MESSAGE, "data": { "content": text } })
}

async fn health(State(_state): State<Arc<AppState>>) -> Json<JsonValue> {
    counters().record_webhook_request("/health");
    Json(json!({ "status": "ok", "counters": counters().snapshot() }))
}
