/// Cooperative cancellation token (spec §4.6/§5).
///
/// A cheap, cloneable flag. `cancel()` is idempotent and returns
/// immediately without waiting for the worker to observe it — observation
/// only happens at the checkpoints the worker loop and sub-processors poll
/// explicitly between suspension points.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
