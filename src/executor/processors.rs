/// Task-type sub-processors (spec §4.6).
///
/// A `TaskProcessor` is the long-running counterpart to a synchronous tool
/// handler: it drives one task to completion, emitting progress events and
/// checking the cancellation token between its own suspension points. The
/// executor never calls a processor directly by type — it looks one up by
/// the task's `taskType` string in a `ProcessorRegistry`, the same
/// name-keyed dispatch shape the synchronous `ToolRegistry` uses.
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use super::cancellation::CancellationToken;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: Option<String>,
    pub new_screenshot: Option<String>,
}

/// Handed to a processor so it can stream progress without knowing
/// anything about task storage or pub/sub — those concerns stay in the
/// executor.
#[derive(Clone)]
pub struct ProgressReporter {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }

    pub fn report(&self, percent: u8, message: impl Into<String>) {
        let _ = self.sender.send(ProgressEvent {
            percent,
            message: Some(message.into()),
            new_screenshot: None,
        });
    }

    pub fn report_with_screenshot(&self, percent: u8, message: impl Into<String>, screenshot: impl Into<String>) {
        let _ = self.sender.send(ProgressEvent {
            percent,
            message: Some(message.into()),
            new_screenshot: Some(screenshot.into()),
        });
    }
}

pub struct ProcessorContext {
    pub task_id: String,
    pub original_query: String,
    pub cancellation: CancellationToken,
    pub progress: ProgressReporter,
}

pub type ProcessorFuture = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;

/// Implemented by every registered task type. `process` owns the full
/// lifecycle of the work; the executor only wraps it with the task-level
/// timeout and the pre/post-dispatch cancellation checks (spec §4.6).
pub trait TaskProcessor: Send + Sync {
    fn process(&self, ctx: ProcessorContext) -> ProcessorFuture;
}

#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn TaskProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task_type: impl Into<String>, processor: Arc<dyn TaskProcessor>) {
        self.processors.insert(task_type.into(), processor);
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskProcessor>> {
        self.processors.get(task_type).cloned()
    }
}
