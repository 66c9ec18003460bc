use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Form, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use orderly_agent::OrderAgent;
use orderly_core::domain::session::SenderId;
use orderly_core::reply::Reply;

#[derive(Clone)]
pub struct WebhookState {
    agent: Arc<OrderAgent>,
}

/// The messaging gateway posts `From` / `Body` pairs, form-encoded.
#[derive(Clone, Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

/// Ordered reply parts for the gateway to deliver back to the sender.
#[derive(Clone, Debug, Serialize)]
pub struct OutboundMessages {
    pub messages: Vec<Reply>,
}

pub fn router(agent: Arc<OrderAgent>) -> Router {
    Router::new().route("/webhook", post(receive)).with_state(WebhookState { agent })
}

pub async fn receive(
    State(state): State<WebhookState>,
    Form(inbound): Form<InboundMessage>,
) -> (StatusCode, Json<OutboundMessages>) {
    if inbound.from.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(OutboundMessages { messages: Vec::new() }));
    }

    let sender = SenderId(inbound.from);
    match state.agent.handle_message(&sender, &inbound.body).await {
        Ok(replies) => (StatusCode::OK, Json(OutboundMessages { messages: replies })),
        Err(agent_error) => {
            error!(
                event_name = "webhook.message.failed",
                sender = %sender.0,
                error = %agent_error,
                "inbound message could not be processed"
            );
            let fallback =
                Reply::text("The service is temporarily unavailable. Please retry shortly.");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(OutboundMessages { messages: vec![fallback] }),
            )
        }
    }
}
