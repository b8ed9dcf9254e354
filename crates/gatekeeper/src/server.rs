//! HTTP server and delivery queue.
//!
//! The webhook handler only verifies and decodes a delivery, then queues it.
//! A fixed pool of workers drains the queue, one pipeline run at a time each.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::github::events::WebhookEvent;
use crate::pipeline::Orchestrator;
use crate::webhooks::{verify_webhook_signature, DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};

/// GitHub caps webhook payloads at 25 MB.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// A verified, decoded delivery waiting for a worker.
#[derive(Debug)]
pub struct Delivery {
    pub id: String,
    pub event: WebhookEvent,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Signing secret; signatures are not checked when unset.
    pub webhook_secret: Option<Arc<str>>,
    /// Producer side of the delivery queue.
    pub queue: mpsc::Sender<Delivery>,
}

/// Bounded delivery queue.
#[must_use]
pub fn delivery_queue(depth: usize) -> (mpsc::Sender<Delivery>, mpsc::Receiver<Delivery>) {
    mpsc::channel(depth.max(1))
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/github", post(github_webhook_handler))
        .route("/health", get(health_check))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start `workers` tasks draining the queue. They stop once every sender
/// is dropped and the queue is empty.
pub fn spawn_workers(
    orchestrator: Arc<Orchestrator>,
    receiver: mpsc::Receiver<Delivery>,
    workers: usize,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    (0..workers.max(1))
        .map(|worker| {
            let receiver = Arc::clone(&receiver);
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(delivery) = next else {
                        debug!(worker, "Delivery queue closed, worker exiting");
                        break;
                    };
                    let span = info_span!("delivery", id = %delivery.id, worker);
                    orchestrator.handle(&delivery.event).instrument(span).await;
                }
            })
        })
        .collect()
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Verify, decode and queue a GitHub delivery.
async fn github_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let delivery_id = header_value(&headers, DELIVERY_HEADER).unwrap_or("unknown").to_string();
    let Some(event_type) = header_value(&headers, EVENT_HEADER) else {
        warn!(delivery_id = %delivery_id, "Missing X-GitHub-Event header");
        return Err(StatusCode::BAD_REQUEST);
    };

    info!(delivery_id = %delivery_id, event_type = %event_type, "Received GitHub webhook");

    if let Some(secret) = &state.webhook_secret {
        let Some(signature) = header_value(&headers, SIGNATURE_HEADER) else {
            warn!(delivery_id = %delivery_id, "Missing X-Hub-Signature-256 header");
            return Err(StatusCode::UNAUTHORIZED);
        };
        if !verify_webhook_signature(&body, signature, secret) {
            warn!(delivery_id = %delivery_id, "Invalid webhook signature");
            return Err(StatusCode::UNAUTHORIZED);
        }
        debug!("Webhook signature verified");
    }

    let event = WebhookEvent::parse(event_type, &body).map_err(|e| {
        error!(delivery_id = %delivery_id, error = %e, "Failed to parse webhook payload");
        StatusCode::BAD_REQUEST
    })?;

    match event {
        WebhookEvent::Ping => {
            return Ok((StatusCode::OK, Json(json!({ "status": "pong" }))));
        }
        WebhookEvent::Unsupported { .. } => {
            debug!(event_type = %event_type, "Ignoring unsupported event");
            return Ok((
                StatusCode::OK,
                Json(json!({ "status": "ignored", "reason": "unsupported_event" })),
            ));
        }
        _ => {}
    }

    let delivery = Delivery {
        id: delivery_id.clone(),
        event,
    };
    match state.queue.try_send(delivery) {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "queued", "delivery": delivery_id })),
        )),
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(delivery_id = %delivery_id, "Delivery queue is full");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            error!(delivery_id = %delivery_id, "Delivery queue is closed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
