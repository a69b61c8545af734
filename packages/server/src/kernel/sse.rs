//! Lightweight SSE server for streaming job events to clients.
//!
//! Subscribes to a job's event topic and forwards events as SSE, named after
//! their `type` tag. The stream ends after the job's terminal event.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::domains::materials::{MaterialsEvent, MaterialsService};

/// Shared state for the SSE server.
#[derive(Clone)]
pub struct SseState {
    pub materials: Arc<MaterialsService>,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(rename = "jobId")]
    job_id: Option<String>,
}

/// Build the axum router for SSE endpoints.
pub fn router(state: SseState) -> Router {
    Router::new()
        .route("/api/materials/events", get(events_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn to_sse(event: &MaterialsEvent) -> Event {
    let sse = Event::default().event(event.payload.name());
    match serde_json::to_string(event) {
        Ok(json) => sse.data(json),
        Err(e) => {
            warn!(error = %e, "failed to serialize materials event");
            sse.data("{}")
        }
    }
}

/// SSE handler: subscribes to the job's topic and streams its events.
async fn events_handler(
    State(state): State<SseState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let Some(job_id) = query.job_id.filter(|id| !id.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "jobId is required").into_response();
    };

    let stream = state
        .materials
        .subscribe(&job_id)
        .await
        .map(|event| Ok::<_, Infallible>(to_sse(&event)));

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}
