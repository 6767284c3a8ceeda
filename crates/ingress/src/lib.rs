//! Webhook ingress: one HTTP endpoint that validates, normalizes, and
//! appends inbound activity events.
//!
//! The append happens synchronously inside the request: a 200 response
//! means the row is on disk. A malformed payload is rejected with 400
//! before any store mutation; an append failure maps to 500 and ingestion
//! continues for later requests.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::post;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use feedpulse_event::{NormalizeError, WebhookPayload, normalize};
use feedpulse_store::EventStore;

#[derive(Clone)]
pub struct IngressState {
    pub store: Arc<EventStore>,
}

/// Response envelope for every webhook outcome.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl WebhookResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

pub fn router(state: IngressState) -> Router {
    Router::new()
        .route("/webhook/twitter", post(receive_webhook))
        .with_state(state)
}

/// Run the listener until the shutdown channel flips.
pub async fn serve(
    bind: &str,
    state: IngressState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(addr = %listener.local_addr()?, "webhook listener started");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;
    info!("webhook listener stopped");
    Ok(())
}

async fn receive_webhook(
    State(state): State<IngressState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    debug!(?headers, body_len = body.len(), "webhook request received");
    let (status, response) = handle_payload(&state, &body).await;
    (status, Json(response))
}

/// The endpoint's whole decision tree, separated from axum so tests can
/// drive it directly.
pub async fn handle_payload(state: &IngressState, body: &[u8]) -> (StatusCode, WebhookResponse) {
    let payload: WebhookPayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "rejecting unparseable webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                WebhookResponse::error(format!("invalid payload: {err}")),
            );
        }
    };

    let record = match normalize(&payload, Utc::now()) {
        Ok(record) => record,
        Err(err @ NormalizeError::MissingKind) => {
            warn!(error = %err, "rejecting untagged webhook payload");
            return (StatusCode::BAD_REQUEST, WebhookResponse::error(err.to_string()));
        }
    };

    match state.store.append(&record).await {
        Ok(()) => {
            info!(
                event_type = %record.event_type,
                user = %record.user_name,
                "event appended"
            );
            (
                StatusCode::OK,
                WebhookResponse::success("event processed and saved"),
            )
        }
        Err(err) => {
            error!(error = ?err, event_type = %record.event_type, "event append failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                WebhookResponse::error("failed to persist event"),
            )
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
