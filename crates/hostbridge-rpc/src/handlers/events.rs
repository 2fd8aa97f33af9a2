//! Event delivery endpoints: long-poll and a persistent stream.

use crate::server::AppState;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hostbridge_core::{Delivery, Event, EventFanout, PollConfig, StreamConfig, Subscriber};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error};

const HEARTBEAT_FRAME: &str = ": heartbeat\n\n";

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Long-poll: wait until at least one event is buffered or the timeout
/// passes, then hand back (and clear) the whole polling buffer.
pub async fn handle_poll(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PollQuery>,
) -> impl IntoResponse {
    let wait = query
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(PollConfig::DEFAULT_WAIT)
        .min(PollConfig::MAX_WAIT);
    let deadline = tokio::time::Instant::now() + wait;

    let events = &state.context.events;
    while !events.has_events() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(PollConfig::POLL_INTERVAL).await;
    }

    Json(json!({
        "events": events.pop_all(),
        "dropped": events.dropped(),
    }))
}

/// Open a `text/event-stream` for this client.
///
/// The subscriber is served from its own OS thread, which blocks on the
/// subscriber's condition variable and forwards frames into the response body.
pub async fn handle_stream(State(state): State<Arc<AppState>>) -> Response {
    let fanout = state.context.fanout().clone();
    let subscriber = fanout.subscribe();
    let id = subscriber.id();
    let heartbeat = state.options.heartbeat_interval;
    let (tx, rx) = mpsc::channel::<String>(StreamConfig::CHANNEL_CAPACITY);

    let serving_fanout = fanout.clone();
    let spawned = thread::Builder::new()
        .name(format!("event-stream-{}", id))
        .spawn(move || serve_subscriber(serving_fanout, subscriber, tx, heartbeat));
    if let Err(e) = spawned {
        error!("Failed to start stream thread for subscriber {}: {}", id, e);
        fanout.unsubscribe(id);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "stream unavailable"})),
        )
            .into_response();
    }

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|frame| (Ok::<String, Infallible>(frame), rx))
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

fn data_frame(message: &str) -> String {
    format!("data: {}\n\n", message)
}

/// Serving loop for one streaming connection.
///
/// Ends when the subscriber is closed or the client goes away (a send fails),
/// and always unsubscribes on the way out.
fn serve_subscriber(
    fanout: Arc<EventFanout>,
    subscriber: Arc<Subscriber>,
    tx: mpsc::Sender<String>,
    heartbeat: Duration,
) {
    let id = subscriber.id();
    debug!("Stream subscriber {} connected", id);

    let hello = Event::new("connected", json!({ "subscriber_id": id }));
    let mut open = match serde_json::to_string(&hello) {
        Ok(message) => tx.blocking_send(data_frame(&message)).is_ok(),
        Err(_) => true,
    };

    while open {
        match subscriber.wait(heartbeat) {
            Delivery::Closed => break,
            Delivery::Heartbeat => {
                open = tx.blocking_send(HEARTBEAT_FRAME.to_string()).is_ok();
            }
            Delivery::Messages(messages) => {
                for message in messages {
                    if tx.blocking_send(data_frame(&message)).is_err() {
                        open = false;
                        break;
                    }
                }
            }
        }
    }

    fanout.unsubscribe(id);
    debug!("Stream subscriber {} disconnected", id);
}
