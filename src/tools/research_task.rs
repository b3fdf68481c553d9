/// `research_task` — a demonstration sub-processor registered with the
/// Task Executor (not the synchronous tool registry). Simulates a
/// multi-step research job with streamed progress and an optional
/// injected failure for retry testing (spec §8 scenarios 5 and 6). Stands
/// in for the out-of-scope browser-automation/travel-research workflows
/// named in §1 — it does not implement those workflows itself.
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;

use crate::executor::processors::{ProcessorContext, ProcessorFuture, TaskProcessor};

const STEP_DELAY: Duration = Duration::from_millis(50);

/// Including this marker in the submitted query makes the processor fail
/// its first attempt and succeed on retry, for exercising the executor's
/// retry path end to end.
pub const FAIL_FIRST_ATTEMPT_MARKER: &str = "fail-once";

pub struct ResearchTaskProcessor {
    attempts: DashMap<String, AtomicU32>,
}

impl ResearchTaskProcessor {
    pub fn new() -> Self {
        Self {
            attempts: DashMap::new(),
        }
    }
}

impl Default for ResearchTaskProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskProcessor for ResearchTaskProcessor {
    fn process(&self, ctx: ProcessorContext) -> ProcessorFuture {
        let attempt = self
            .attempts
            .entry(ctx.task_id.clone())
            .or_insert_with(|| AtomicU32::new(0))
            .fetch_add(1, Ordering::SeqCst)
            + 1;

        Box::pin(async move {
            let steps: [(u8, &str); 4] = [
                (25, "gathering sources"),
                (50, "cross-referencing findings"),
                (75, "drafting summary"),
                (99, "finalising report"),
            ];

            for (percent, message) in steps {
                if ctx.cancellation.is_cancelled() {
                    return Err("research task cancelled".to_string());
                }
                tokio::time::sleep(STEP_DELAY).await;
                ctx.progress.report(percent, message);
            }

            if ctx.original_query.contains(FAIL_FIRST_ATTEMPT_MARKER) && attempt == 1 {
                return Err("simulated failure on first attempt".to_string());
            }

            if ctx.cancellation.is_cancelled() {
                return Err("research task cancelled".to_string());
            }

            Ok(Value::String(format!(
                "research complete for: {}",
                ctx.original_query
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::cancellation::CancellationToken;
    use crate::executor::processors::ProgressReporter;
    use tokio::sync::mpsc;

    fn ctx(task_id: &str, query: &str) -> (ProcessorContext, mpsc::UnboundedReceiver<crate::executor::processors::ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ProcessorContext {
                task_id: task_id.to_string(),
                original_query: query.to_string(),
                cancellation: CancellationToken::new(),
                progress: ProgressReporter::new(tx),
            },
            rx,
        )
    }

    #[tokio::test]
    async fn completes_with_streamed_progress() {
        let processor = ResearchTaskProcessor::new();
        let (context, mut rx) = ctx("t1", "plan a trip");
        let result = processor.process(context).await.unwrap();
        assert_eq!(result, Value::String("research complete for: plan a trip".into()));

        let mut percents = Vec::new();
        while let Ok(event) = rx.try_recv() {
            percents.push(event.percent);
        }
        assert_eq!(percents, vec![25, 50, 75, 99]);
    }

    #[tokio::test]
    async fn fails_first_attempt_then_succeeds_on_retry() {
        let processor = ResearchTaskProcessor::new();
        let (first, _rx1) = ctx("t2", "fail-once then succeed");
        assert!(processor.process(first).await.is_err());

        let (second, _rx2) = ctx("t2", "fail-once then succeed");
        assert!(processor.process(second).await.is_ok());
    }
}
