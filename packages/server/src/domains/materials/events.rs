//! Materials job events
//!
//! Progress of a crawl job is pushed to live subscribers over a per-job
//! topic. Delivery is best-effort: subscribers only see events published
//! after they attached, and the job queue stays the source of truth.

use futures::stream::{BoxStream, StreamExt};
use mediacrawler_client::Platform;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use crate::kernel::stream_hub::StreamHub;

/// Topic for events published without a job id.
pub const UNKNOWN_TOPIC: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Status {
        state: String,
        progress: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Log {
        level: String,
        message: String,
        timestamp: String,
    },
    Result {
        count: u64,
        preview: serde_json::Value,
    },
    Error {
        state: String,
        message: String,
    },
    LoginQrcode {
        platform: Platform,
        base64_image: String,
        message: String,
    },
    LoginSuccess {
        platform: Platform,
    },
}

impl EventPayload {
    pub fn status(state: &str, progress: f64, message: Option<String>) -> Self {
        EventPayload::Status {
            state: state.to_string(),
            progress,
            message,
        }
    }

    /// Wire name, equal to the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::Status { .. } => "status",
            EventPayload::Log { .. } => "log",
            EventPayload::Result { .. } => "result",
            EventPayload::Error { .. } => "error",
            EventPayload::LoginQrcode { .. } => "login_qrcode",
            EventPayload::LoginSuccess { .. } => "login_success",
        }
    }

    /// Last event of a job.
    pub fn is_terminal(&self) -> bool {
        match self {
            EventPayload::Status { state, .. } => state == "succeeded" || state == "failed",
            EventPayload::Error { .. } => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialsEvent {
    #[serde(rename = "jobId", default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Per-job event bus over a [`StreamHub`].
#[derive(Clone, Default)]
pub struct MaterialsEvents {
    hub: StreamHub<MaterialsEvent>,
}

fn topic(job_id: &str) -> &str {
    if job_id.is_empty() {
        UNKNOWN_TOPIC
    } else {
        job_id
    }
}

impl MaterialsEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish to the job's topic. A terminal event closes the topic.
    pub async fn publish(&self, job_id: &str, payload: EventPayload) {
        let terminal = payload.is_terminal();
        let event = MaterialsEvent {
            job_id: (!job_id.is_empty()).then(|| job_id.to_string()),
            payload,
        };

        let topic = topic(job_id);
        self.hub.publish(topic, event).await;
        if terminal {
            self.hub.close(topic).await;
        }
    }

    /// Live events of a job. The stream ends after the job's terminal event.
    pub async fn subscribe(&self, job_id: &str) -> BoxStream<'static, MaterialsEvent> {
        let rx = self.hub.subscribe(topic(job_id)).await;
        let job_id = job_id.to_string();

        BroadcastStream::new(rx)
            .filter_map(move |item| {
                let event = match item {
                    Ok(event) => Some(event),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(job_id = %job_id, skipped, "materials subscriber lagged");
                        None
                    }
                };
                futures::future::ready(event)
            })
            .scan(false, |finished, event| {
                if *finished {
                    return futures::future::ready(None);
                }
                *finished = event.payload.is_terminal();
                futures::future::ready(Some(event))
            })
            .boxed()
    }

    /// Drop topics nobody listens to.
    pub async fn cleanup(&self) {
        self.hub.cleanup().await;
    }
}
