/// Progress pub/sub collaborator (spec §4.6, §6).
///
/// The executor publishes one `ProgressPayload` per task-progress event to
/// the `task:progress` topic; the admin dashboard and any other observer are
/// independent subscribers. Best-effort: a publish failure (no subscribers,
/// a lagged receiver) is never allowed to affect the in-memory task
/// transition that triggered it — see the executor's use of this trait.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

pub const TASK_PROGRESS_TOPIC: &str = "task:progress";

#[derive(Debug, Clone, Serialize)]
pub struct ProgressPayload {
    pub task_id: String,
    pub status: String,
    pub message: Option<String>,
    pub progress_percent: u8,
    pub screenshots: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_screenshot: Option<String>,
}

#[async_trait]
pub trait ProgressChannel: Send + Sync {
    async fn publish(&self, topic: &str, payload: ProgressPayload);
    fn subscribe(&self) -> broadcast::Receiver<ProgressPayload>;
}

/// `tokio::sync::broadcast`-backed channel. Subscribers that lag behind are
/// dropped by the broadcast primitive itself; this is fine for an
/// observability side-channel where missing an intermediate percentage is
/// harmless (spec §1: "progress is observable only through" this channel,
/// not authoritative).
pub struct InMemoryProgressChannel {
    sender: broadcast::Sender<ProgressPayload>,
}

impl InMemoryProgressChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }
}

impl Default for InMemoryProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressChannel for InMemoryProgressChannel {
    async fn publish(&self, _topic: &str, payload: ProgressPayload) {
        // No subscribers is not an error: `send` only fails when the
        // channel has zero receivers, which is the common case in tests.
        let _ = self.sender.send(payload);
    }

    fn subscribe(&self) -> broadcast::Receiver<ProgressPayload> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(task_id: &str, percent: u8) -> ProgressPayload {
        ProgressPayload {
            task_id: task_id.to_string(),
            status: "RUNNING".to_string(),
            message: Some("working".to_string()),
            progress_percent: percent,
            screenshots: Vec::new(),
            timestamp: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            new_screenshot: None,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let channel = InMemoryProgressChannel::new();
        let mut rx = channel.subscribe();
        channel.publish(TASK_PROGRESS_TOPIC, payload("t1", 50)).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.task_id, "t1");
        assert_eq!(received.progress_percent, 50);
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic_or_error() {
        let channel = InMemoryProgressChannel::new();
        channel.publish(TASK_PROGRESS_TOPIC, payload("t2", 10)).await;
    }

    #[tokio::test]
    async fn events_are_observed_in_emission_order_per_task() {
        let channel = InMemoryProgressChannel::new();
        let mut rx = channel.subscribe();
        channel.publish(TASK_PROGRESS_TOPIC, payload("t1", 10)).await;
        channel.publish(TASK_PROGRESS_TOPIC, payload("t1", 50)).await;
        channel.publish(TASK_PROGRESS_TOPIC, payload("t1", 90)).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        assert_eq!(
            [first.progress_percent, second.progress_percent, third.progress_percent],
            [10, 50, 90]
        );
    }
}
