/// Task persistence collaborator (spec §4.6, §7).
///
/// A write-through mirror of the executor's authoritative in-memory task
/// map, never the source of truth. The reference implementation keeps
/// everything in a `DashMap`, following the same lock-free concurrent-map
/// shape used for the tool registry and the cache collaborator below —
/// a real deployment would swap this for a database-backed implementation
/// behind the same trait.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::executor::task::{TaskExecution, TaskStatus};

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn save(&self, task: &TaskExecution);
    async fn find_by_id(&self, task_id: &str) -> Option<TaskExecution>;
    async fn find_timed_out(&self, older_than: DateTime<Utc>) -> Vec<TaskExecution>;
    async fn find_for_cleanup(&self, older_than: DateTime<Utc>) -> Vec<TaskExecution>;
    async fn count_by_status(&self, status: TaskStatus) -> usize;
    async fn remove(&self, task_id: &str);
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<String, TaskExecution>,
}

impl InMemoryTaskStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: &TaskExecution) {
        self.tasks.insert(task.task_id.clone(), task.clone());
    }

    async fn find_by_id(&self, task_id: &str) -> Option<TaskExecution> {
        self.tasks.get(task_id).map(|r| r.value().clone())
    }

    async fn find_timed_out(&self, older_than: DateTime<Utc>) -> Vec<TaskExecution> {
        self.tasks
            .iter()
            .filter(|r| {
                r.value().status == TaskStatus::Running
                    && r.value().started_at.is_some_and(|s| s < older_than)
            })
            .map(|r| r.value().clone())
            .collect()
    }

    async fn find_for_cleanup(&self, older_than: DateTime<Utc>) -> Vec<TaskExecution> {
        self.tasks
            .iter()
            .filter(|r| {
                r.value().status.is_terminal()
                    && r.value().completed_at.is_some_and(|c| c < older_than)
            })
            .map(|r| r.value().clone())
            .collect()
    }

    async fn count_by_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|r| r.value().status == status).count()
    }

    async fn remove(&self, task_id: &str) {
        self.tasks.remove(task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn save_then_find_round_trips() {
        let store = InMemoryTaskStore::new();
        let task = TaskExecution::new("demo", "q", 60, 0, None, now());
        let id = task.task_id.clone();
        store.save(&task).await;
        let found = store.find_by_id(&id).await.unwrap();
        assert_eq!(found.task_id, id);
    }

    #[tokio::test]
    async fn find_timed_out_only_returns_stale_running_tasks() {
        let store = InMemoryTaskStore::new();
        let mut stale = TaskExecution::new("demo", "q", 60, 0, None, now());
        stale.start(now());
        store.save(&stale).await;

        let mut fresh = TaskExecution::new("demo", "q", 60, 0, None, now());
        fresh.start(now() + ChronoDuration::minutes(40));
        store.save(&fresh).await;

        let cutoff = now() + ChronoDuration::minutes(30);
        let timed_out = store.find_timed_out(cutoff).await;
        assert_eq!(timed_out.len(), 1);
        assert_eq!(timed_out[0].task_id, stale.task_id);
    }

    #[tokio::test]
    async fn find_for_cleanup_only_returns_old_terminal_tasks() {
        let store = InMemoryTaskStore::new();
        let mut old_done = TaskExecution::new("demo", "q", 60, 0, None, now());
        old_done.start(now());
        old_done.complete(None, now());
        store.save(&old_done).await;

        let mut still_queued = TaskExecution::new("demo", "q", 60, 0, None, now());
        store.save(&still_queued.clone()).await;
        let _ = &mut still_queued;

        let cutoff = now() + ChronoDuration::days(7);
        let for_cleanup = store.find_for_cleanup(cutoff).await;
        assert_eq!(for_cleanup.len(), 1);
        assert_eq!(for_cleanup[0].task_id, old_done.task_id);
    }

    #[tokio::test]
    async fn count_by_status_reflects_current_state() {
        let store = InMemoryTaskStore::new();
        let t1 = TaskExecution::new("demo", "q", 60, 0, None, now());
        let t2 = TaskExecution::new("demo", "q", 60, 0, None, now());
        store.save(&t1).await;
        store.save(&t2).await;
        assert_eq!(store.count_by_status(TaskStatus::Queued).await, 2);
    }
}
