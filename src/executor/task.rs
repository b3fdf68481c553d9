/// Task lifecycle record (spec §3, §4.6).
///
/// `TaskExecution` is the authoritative in-memory representation of a
/// submitted task; the persistence collaborator is a write-through mirror,
/// never the source of truth. All state transitions go through
/// `TaskExecution`'s own methods so the invariants (terminal stickiness,
/// timestamp ordering, `progressPercent == 100` iff COMPLETED) can't be
/// violated by a caller poking fields directly from outside this module.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Timeout | TaskStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Timeout => "TIMEOUT",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecution {
    pub task_id: String,
    pub task_type: String,
    pub original_query: String,
    pub status: TaskStatus,
    pub progress_percent: u8,
    pub progress_message: Option<String>,
    pub screenshots: Vec<String>,
    pub extracted_results: Option<serde_json::Value>,
    pub error_details: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout_seconds: u64,
    pub actual_duration_seconds: Option<f64>,
    #[serde(default)]
    pub requester_id: Option<String>,
}

impl TaskExecution {
    pub fn new(
        task_type: impl Into<String>,
        original_query: impl Into<String>,
        timeout_seconds: u64,
        max_retries: u32,
        requester_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            task_type: task_type.into(),
            original_query: original_query.into(),
            status: TaskStatus::Queued,
            progress_percent: 0,
            progress_message: None,
            screenshots: Vec::new(),
            extracted_results: None,
            error_details: None,
            created: now,
            updated: now,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries,
            timeout_seconds,
            actual_duration_seconds: None,
            requester_id,
        }
    }

    /// QUEUED → RUNNING. No-op (returns false) if already terminal or
    /// already running, since terminal statuses are sticky.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() || self.status == TaskStatus::Running {
            return false;
        }
        self.status = TaskStatus::Running;
        self.started_at = Some(now);
        self.updated = now;
        true
    }

    pub fn record_progress(
        &mut self,
        percent: u8,
        message: Option<String>,
        new_screenshot: Option<String>,
        now: DateTime<Utc>,
    ) {
        if self.status.is_terminal() {
            return;
        }
        self.progress_percent = percent.min(99);
        self.progress_message = message;
        if let Some(shot) = new_screenshot {
            self.screenshots.push(shot);
        }
        self.updated = now;
    }

    pub fn complete(&mut self, results: Option<serde_json::Value>, now: DateTime<Utc>) -> bool {
        if !self.transition_to_terminal(TaskStatus::Completed, now) {
            return false;
        }
        self.progress_percent = 100;
        self.extracted_results = results;
        true
    }

    pub fn fail(&mut self, error_details: impl Into<String>, now: DateTime<Utc>) -> bool {
        self.transition_to_terminal_with_error(TaskStatus::Failed, error_details, now)
    }

    pub fn timeout(&mut self, error_details: impl Into<String>, now: DateTime<Utc>) -> bool {
        self.transition_to_terminal_with_error(TaskStatus::Timeout, error_details, now)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        self.transition_to_terminal(TaskStatus::Cancelled, now)
    }

    /// Reset a FAILED task back to QUEUED for an immediate retry. Preserves
    /// creation timestamp and prior screenshots; `startedAt`/`completedAt`
    /// are cleared so the next dispatch re-sets them.
    pub fn requeue_for_retry(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Failed || self.retry_count >= self.max_retries {
            return false;
        }
        self.retry_count += 1;
        self.status = TaskStatus::Queued;
        self.started_at = None;
        self.completed_at = None;
        self.progress_percent = 0;
        self.error_details = None;
        self.updated = now;
        true
    }

    fn transition_to_terminal(&mut self, target: TaskStatus, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = target;
        self.completed_at = Some(now);
        self.updated = now;
        if let Some(started) = self.started_at {
            self.actual_duration_seconds = Some((now - started).num_milliseconds() as f64 / 1000.0);
        }
        true
    }

    fn transition_to_terminal_with_error(
        &mut self,
        target: TaskStatus,
        error_details: impl Into<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let ok = self.transition_to_terminal(target, now);
        if ok {
            self.error_details = Some(error_details.into());
        }
        ok
    }
}
