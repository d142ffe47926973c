//! Dispatchers turn "this mailbox has work" into an executed drain

use tokio::runtime::Handle;

/// A unit of mailbox-draining work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Dispatcher: Send + Sync {
    fn schedule(&self, task: Task);

    /// Messages a mailbox may process before yielding its slot
    fn throughput(&self) -> usize;

    /// True if `schedule` runs the task on the calling thread; a yielding
    /// mailbox then keeps draining in place instead of rescheduling itself
    fn runs_inline(&self) -> bool {
        false
    }
}

/// Runs each activation as a task on a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioDispatcher {
    handle: Handle,
    throughput: usize,
}

impl TokioDispatcher {
    pub fn new(handle: Handle, throughput: usize) -> Self {
        Self {
            handle,
            throughput: throughput.max(1),
        }
    }
}

impl Dispatcher for TokioDispatcher {
    fn schedule(&self, task: Task) {
        self.handle.spawn(async move { task() });
    }

    fn throughput(&self) -> usize {
        self.throughput
    }
}

/// Runs activations inline on the scheduling thread.
///
/// Deterministic; intended for tests and single-threaded embedding.
#[derive(Debug, Clone)]
pub struct SynchronizedDispatcher {
    throughput: usize,
}

impl SynchronizedDispatcher {
    pub fn new(throughput: usize) -> Self {
        Self {
            throughput: throughput.max(1),
        }
    }
}

impl Default for SynchronizedDispatcher {
    fn default() -> Self {
        Self::new(300)
    }
}

impl Dispatcher for SynchronizedDispatcher {
    fn schedule(&self, task: Task) {
        task();
    }

    fn throughput(&self) -> usize {
        self.throughput
    }

    fn runs_inline(&self) -> bool {
        true
    }
}
