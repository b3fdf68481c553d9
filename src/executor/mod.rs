/// Async Task Executor (spec §4.6, §5).
///
/// The bounded-concurrency scheduler: a shared FIFO queue of task ids drained
/// by `worker_parallelism` worker loops, each serialising transitions for
/// whatever task it currently holds. Per-task mutation always goes through
/// `DashMap::get_mut`, which is the same "small per-task lock" shape §5 asks
/// for — two workers can never touch the same task concurrently because a
/// task id is only ever in the queue once at a time.
pub mod cancellation;
pub mod processors;
pub mod task;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use dashmap::DashMap;

use crate::collaborators::persistence::TaskStore;
use crate::collaborators::pubsub::{ProgressChannel, ProgressPayload, TASK_PROGRESS_TOPIC};
use crate::core::error::ExecutorError;
use cancellation::CancellationToken;
use processors::{ProcessorContext, ProcessorRegistry, ProgressEvent, ProgressReporter};
use task::{TaskExecution, TaskStatus};

/// Tunables the executor needs, lifted out of `core::config::Config` at
/// construction time so this module has no compile-time dependency on the
/// config layer (spec §9: "scoped to the Executor ... object").
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub worker_parallelism: usize,
    pub default_timeout_seconds: u64,
    pub default_max_retries: u32,
    /// `None` = unbounded dispatch queue (spec Open Question #2 default).
    pub queue_capacity: Option<usize>,
    pub stuck_task_threshold: Duration,
    pub retention: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_parallelism: 4,
            default_timeout_seconds: 300,
            default_max_retries: 0,
            queue_capacity: None,
            stuck_task_threshold: Duration::from_secs(30 * 60),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub requester_id: Option<String>,
}

/// The dispatch queue's sending half. Unbounded by default; bounded when
/// `queue_capacity` is configured, in which case a full queue rejects the
/// submission synchronously instead of applying backpressure (spec §5,
/// Open Question #2).
#[derive(Clone)]
enum QueueSender {
    Unbounded(mpsc::UnboundedSender<String>),
    Bounded {
        tx: mpsc::Sender<String>,
        capacity: usize,
    },
}

impl QueueSender {
    fn enqueue(&self, task_id: String) -> Result<(), ExecutorError> {
        match self {
            QueueSender::Unbounded(tx) => {
                // Only fails if every receiver has been dropped, i.e. the
                // executor itself is shutting down; nothing useful to do.
                let _ = tx.send(task_id);
                Ok(())
            }
            QueueSender::Bounded { tx, capacity } => {
                tx.try_send(task_id)
                    .map_err(|_| ExecutorError::QueueFull { capacity: *capacity })
            }
        }
    }
}

/// The receiving half, shared across `worker_parallelism` worker loops via a
/// `tokio::sync::Mutex` — the standard "single shared consumer" pattern for
/// turning an mpsc channel into a worker pool while keeping draw order FIFO.
#[derive(Clone)]
enum QueueReceiver {
    Unbounded(Arc<AsyncMutex<mpsc::UnboundedReceiver<String>>>),
    Bounded(Arc<AsyncMutex<mpsc::Receiver<String>>>),
}

impl QueueReceiver {
    async fn recv(&self) -> Option<String> {
        match self {
            QueueReceiver::Unbounded(rx) => rx.lock().await.recv().await,
            QueueReceiver::Bounded(rx) => rx.lock().await.recv().await,
        }
    }
}

fn build_queue(capacity: Option<usize>) -> (QueueSender, QueueReceiver) {
    match capacity {
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                QueueSender::Unbounded(tx),
                QueueReceiver::Unbounded(Arc::new(AsyncMutex::new(rx))),
            )
        }
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (
                QueueSender::Bounded { tx, capacity },
                QueueReceiver::Bounded(Arc::new(AsyncMutex::new(rx))),
            )
        }
    }
}

/// Bounded-concurrency scheduler for long-running task-type work (spec
/// §4.6). Synchronous MCP tools never touch this — they're invoked directly
/// by the Dispatcher (`core::dispatcher`).
pub struct TaskExecutor {
    tasks: DashMap<String, TaskExecution>,
    tokens: DashMap<String, CancellationToken>,
    processors: ProcessorRegistry,
    store: Arc<dyn TaskStore>,
    progress_channel: Arc<dyn ProgressChannel>,
    queue_tx: QueueSender,
    config: ExecutorConfig,
}

impl TaskExecutor {
    /// Build the executor and spawn its worker pool and the two housekeeping
    /// sweeps (spec §4.6 "Housekeeping"). Must be called from within a Tokio
    /// runtime.
    pub fn start(
        processors: ProcessorRegistry,
        store: Arc<dyn TaskStore>,
        progress_channel: Arc<dyn ProgressChannel>,
        config: ExecutorConfig,
    ) -> Arc<Self> {
        let (queue_tx, queue_rx) = build_queue(config.queue_capacity);
        let executor = Arc::new(Self {
            tasks: DashMap::new(),
            tokens: DashMap::new(),
            processors,
            store,
            progress_channel,
            queue_tx,
            config,
        });

        for _ in 0..executor.config.worker_parallelism.max(1) {
            let executor = Arc::clone(&executor);
            let queue_rx = queue_rx.clone();
            tokio::spawn(async move {
                while let Some(task_id) = queue_rx.recv().await {
                    executor.run_task(task_id).await;
                }
            });
        }

        executor.spawn_housekeeping();
        executor
    }

    /// Create a `TaskExecution` in QUEUED, mirror it, and enqueue it for
    /// dispatch. Fails synchronously only when a bounded queue is full.
    pub async fn submit(
        &self,
        task_type: impl Into<String>,
        query: impl Into<String>,
        options: SubmitOptions,
    ) -> Result<String, ExecutorError> {
        let now = Utc::now();
        let task = TaskExecution::new(
            task_type,
            query,
            options
                .timeout_seconds
                .unwrap_or(self.config.default_timeout_seconds),
            options.max_retries.unwrap_or(self.config.default_max_retries),
            options.requester_id,
            now,
        );
        let task_id = task.task_id.clone();

        // Reject before any state is created so a full queue never leaves a
        // dangling QUEUED task behind.
        self.queue_tx.enqueue(task_id.clone())?;

        self.tokens.insert(task_id.clone(), CancellationToken::new());
        self.store.save(&task).await;
        self.tasks.insert(task_id.clone(), task);
        Ok(task_id)
    }

    /// Idempotent cancellation (spec §5). Always succeeds for a known task
    /// id; a QUEUED task is transitioned to CANCELLED immediately, a RUNNING
    /// one on the worker's next observation.
    pub async fn cancel(&self, task_id: &str) -> Result<(), ExecutorError> {
        let token = self
            .tokens
            .get(task_id)
            .ok_or_else(|| ExecutorError::TaskNotFound {
                task_id: task_id.to_string(),
            })?
            .clone();
        token.cancel();

        let snapshot = {
            let mut entry = match self.tasks.get_mut(task_id) {
                Some(entry) => entry,
                None => return Ok(()),
            };
            if entry.status != TaskStatus::Queued {
                return Ok(());
            }
            entry.cancel(Utc::now());
            entry.clone()
        };
        self.store.save(&snapshot).await;
        self.publish_progress(&snapshot, None).await;
        Ok(())
    }

    pub fn get(&self, task_id: &str) -> Option<TaskExecution> {
        self.tasks.get(task_id).map(|r| r.value().clone())
    }

    /// Number of tasks currently sitting in QUEUED — the backpressure
    /// metric §5 requires regardless of whether the queue is bounded.
    pub fn queued_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|r| r.value().status == TaskStatus::Queued)
            .count()
    }

    pub fn running_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|r| r.value().status == TaskStatus::Running)
            .count()
    }

    async fn run_task(self: &Arc<Self>, task_id: String) {
        let Some(token) = self.tokens.get(&task_id).map(|t| t.clone()) else {
            return;
        };

        if token.is_cancelled() {
            self.mark_cancelled_if_queued(&task_id).await;
            return;
        }

        let Some(task_type) = self.tasks.get(&task_id).map(|r| r.value().task_type.clone()) else {
            return;
        };

        let Some(processor) = self.processors.get(&task_type) else {
            self.mark_failed_no_retry(&task_id, format!("Unknown task type: {task_type}"))
                .await;
            return;
        };

        let task_snapshot = {
            let mut entry = match self.tasks.get_mut(&task_id) {
                Some(entry) => entry,
                None => return,
            };
            if !entry.start(Utc::now()) {
                return;
            }
            entry.clone()
        };
        self.store.save(&task_snapshot).await;

        if token.is_cancelled() {
            self.mark_cancelled(&task_id).await;
            return;
        }

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressEvent>();
        let reporter = ProgressReporter::new(progress_tx);
        let ctx = ProcessorContext {
            task_id: task_id.clone(),
            original_query: task_snapshot.original_query.clone(),
            cancellation: token.clone(),
            progress: reporter,
        };

        let forwarder_executor = Arc::clone(self);
        let forwarder_task_id = task_id.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = progress_rx.recv().await {
                forwarder_executor
                    .record_progress(&forwarder_task_id, event)
                    .await;
            }
        });

        let timeout = Duration::from_secs(task_snapshot.timeout_seconds);
        let outcome = tokio::time::timeout(timeout, processor.process(ctx)).await;
        let _ = forwarder.await;

        if token.is_cancelled() {
            self.mark_cancelled(&task_id).await;
            return;
        }

        match outcome {
            Ok(Ok(value)) => self.mark_completed(&task_id, value).await,
            Ok(Err(message)) => self.mark_failed_with_retry(&task_id, message).await,
            Err(_elapsed) => self.mark_timeout(&task_id).await,
        }
    }

    async fn record_progress(&self, task_id: &str, event: ProgressEvent) {
        let snapshot = {
            let mut entry = match self.tasks.get_mut(task_id) {
                Some(entry) => entry,
                None => return,
            };
            if entry.status.is_terminal() {
                return;
            }
            entry.record_progress(event.percent, event.message, event.new_screenshot.clone(), Utc::now());
            entry.clone()
        };
        self.store.save(&snapshot).await;
        self.publish_progress(&snapshot, event.new_screenshot).await;
    }

    async fn mark_completed(&self, task_id: &str, value: Value) {
        let snapshot = {
            let mut entry = match self.tasks.get_mut(task_id) {
                Some(entry) => entry,
                None => return,
            };
            entry.complete(Some(value), Utc::now());
            entry.clone()
        };
        self.store.save(&snapshot).await;
        self.publish_progress(&snapshot, None).await;
    }

    async fn mark_cancelled(&self, task_id: &str) {
        let snapshot = {
            let mut entry = match self.tasks.get_mut(task_id) {
                Some(entry) => entry,
                None => return,
            };
            if !entry.cancel(Utc::now()) {
                return;
            }
            entry.clone()
        };
        self.store.save(&snapshot).await;
        self.publish_progress(&snapshot, None).await;
    }

    /// Only cancels a still-QUEUED task; used for the pre-dispatch
    /// cancellation check where RUNNING is impossible yet.
    async fn mark_cancelled_if_queued(&self, task_id: &str) {
        let snapshot = {
            let mut entry = match self.tasks.get_mut(task_id) {
                Some(entry) => entry,
                None => return,
            };
            if entry.status != TaskStatus::Queued {
                return;
            }
            entry.cancel(Utc::now());
            entry.clone()
        };
        self.store.save(&snapshot).await;
        self.publish_progress(&snapshot, None).await;
    }

    async fn mark_timeout(&self, task_id: &str) {
        let snapshot = {
            let mut entry = match self.tasks.get_mut(task_id) {
                Some(entry) => entry,
                None => return,
            };
            let message = format!("task exceeded timeout of {}s", entry.timeout_seconds);
            entry.timeout(message, Utc::now());
            entry.clone()
        };
        self.store.save(&snapshot).await;
        self.publish_progress(&snapshot, None).await;
    }

    /// A handler-reported failure: marks FAILED, then re-queues immediately
    /// if retries remain (spec §4.6 "Retries" — no backoff, per
    /// SPEC_FULL.md's Open Question decision).
    async fn mark_failed_with_retry(&self, task_id: &str, message: String) {
        let (snapshot, can_retry) = {
            let mut entry = match self.tasks.get_mut(task_id) {
                Some(entry) => entry,
                None => return,
            };
            entry.fail(message, Utc::now());
            let can_retry = entry.retry_count < entry.max_retries;
            (entry.clone(), can_retry)
        };
        self.store.save(&snapshot).await;
        self.publish_progress(&snapshot, None).await;

        if !can_retry {
            return;
        }

        let requeued = {
            let mut entry = match self.tasks.get_mut(task_id) {
                Some(entry) => entry,
                None => return,
            };
            if !entry.requeue_for_retry(Utc::now()) {
                return;
            }
            entry.clone()
        };
        self.store.save(&requeued).await;

        if self.queue_tx.enqueue(task_id.to_string()).is_err() {
            if let Some(mut entry) = self.tasks.get_mut(task_id) {
                entry.fail("retry re-queue failed: task queue is full", Utc::now());
            }
        }
    }

    /// A configuration-level failure (unknown task type) — no retry, since
    /// retrying would just fail again.
    async fn mark_failed_no_retry(&self, task_id: &str, message: String) {
        let snapshot = {
            let mut entry = match self.tasks.get_mut(task_id) {
                Some(entry) => entry,
                None => return,
            };
            entry.fail(message, Utc::now());
            entry.clone()
        };
        self.store.save(&snapshot).await;
        self.publish_progress(&snapshot, None).await;
    }

    async fn publish_progress(&self, snapshot: &TaskExecution, new_screenshot: Option<String>) {
        let payload = ProgressPayload {
            task_id: snapshot.task_id.clone(),
            status: snapshot.status.as_str().to_string(),
            message: snapshot.progress_message.clone(),
            progress_percent: snapshot.progress_percent,
            screenshots: snapshot.screenshots.clone(),
            timestamp: snapshot.updated,
            new_screenshot,
        };
        self.progress_channel.publish(TASK_PROGRESS_TOPIC, payload).await;
    }

    fn spawn_housekeeping(self: &Arc<Self>) {
        let stuck_sweep_executor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5 * 60));
            loop {
                interval.tick().await;
                stuck_sweep_executor.sweep_stuck_tasks().await;
            }
        });

        let retention_sweep_executor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
            loop {
                interval.tick().await;
                retention_sweep_executor.sweep_retention();
            }
        });
    }

    /// Every 5 minutes: force-timeout any RUNNING task whose `startedAt` is
    /// older than the stuck threshold, regardless of whether its own
    /// sub-processor ever observed cancellation (spec §4.6).
    async fn sweep_stuck_tasks(&self) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.stuck_task_threshold).unwrap_or_default();
        let stuck: Vec<String> = self
            .tasks
            .iter()
            .filter(|r| {
                r.value().status == TaskStatus::Running
                    && r.value().started_at.is_some_and(|s| s < cutoff)
            })
            .map(|r| r.key().clone())
            .collect();
        for task_id in stuck {
            self.mark_timeout(&task_id).await;
        }
    }

    /// Every hour: evict terminal tasks older than the retention window from
    /// the in-memory map (persistence keeps its own copy for audit, per
    /// spec §4.6).
    fn sweep_retention(&self) {
        let cutoff =
            Utc::now() - chrono::Duration::from_std(self.config.retention).unwrap_or_default();
        let expired: Vec<String> = self
            .tasks
            .iter()
            .filter(|r| {
                r.value().status.is_terminal() && r.value().completed_at.is_some_and(|c| c < cutoff)
            })
            .map(|r| r.key().clone())
            .collect();
        for task_id in expired {
            self.tasks.remove(&task_id);
            self.tokens.remove(&task_id);
        }
    }
}
