//! One-shot futures for the ask pattern
//!
//! A [`Future`] registers a short-lived process in the registry and hands its
//! PID out as the sender of a request. The first message it receives
//! resolves it; an optional timer resolves it with [`FutureError::Timeout`]
//! instead. On resolution the process is deregistered, pipe targets receive
//! the result, and continuations run.
//!
//! ```rust,ignore
//! let future = system.request_future(&pid, Ping, Duration::from_secs(1));
//! let pong = future.result_async().await?;
//! ```

use crate::dead_letter::DeadLetterResponse;
use crate::error::FutureError;
use crate::message::{AnyMessage, Message, MessageEnvelope, SystemMessage};
use crate::pid::Pid;
use crate::process::Process;
use crate::system::{ActorSystem, WeakActorSystem};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::AbortHandle;

pub type FutureResult = Result<AnyMessage, FutureError>;

type Completion = Box<dyn FnOnce(&FutureResult) + Send>;

#[derive(Default)]
struct FutureState {
    result: Option<FutureResult>,
    /// The result as delivered to pipe targets, built once on completion
    piped: Option<AnyMessage>,
    pipes: Vec<Pid>,
    completions: Vec<Completion>,
}

struct FutureInner {
    pid: Pid,
    system: WeakActorSystem,
    state: Mutex<FutureState>,
    resolved: Condvar,
    notify: Notify,
    timer: Mutex<Option<AbortHandle>>,
}

impl FutureInner {
    fn complete(&self, result: FutureResult) {
        let piped = match &result {
            Ok(message) => message.clone(),
            Err(error) => AnyMessage::new(*error),
        };

        let (pipes, completions) = {
            let mut state = self.state.lock();
            if state.result.is_some() {
                return;
            }
            state.result = Some(result.clone());
            state.piped = Some(piped.clone());
            (
                std::mem::take(&mut state.pipes),
                std::mem::take(&mut state.completions),
            )
        };

        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }

        if let Some(system) = self.system.upgrade() {
            system.registry().remove(&self.pid);
            for pid in &pipes {
                system.send_user_message(pid, MessageEnvelope::new(Message::User(piped.clone())));
            }
        }

        for completion in completions {
            completion(&result);
        }

        self.resolved.notify_all();
        self.notify.notify_waiters();
    }
}

#[derive(Clone)]
pub struct Future {
    inner: Arc<FutureInner>,
}

impl Future {
    /// Register a new future; `None` waits indefinitely
    pub fn new(system: &ActorSystem, timeout: Option<Duration>) -> Self {
        let id = format!("future{}", system.registry().next_id());
        let inner = Arc::new(FutureInner {
            pid: Pid::new(system.address(), id.as_str()),
            system: system.downgrade(),
            state: Mutex::new(FutureState::default()),
            resolved: Condvar::new(),
            notify: Notify::new(),
            timer: Mutex::new(None),
        });

        system
            .registry()
            .add(Arc::new(FutureProcess { inner: inner.clone() }), &id);

        if let Some(timeout) = timeout {
            let weak = Arc::downgrade(&inner);
            let task = system.runtime().spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some(inner) = weak.upgrade() {
                    inner.complete(Err(FutureError::Timeout));
                }
            });
            *inner.timer.lock() = Some(task.abort_handle());
        }

        Self { inner }
    }

    /// PID to use as the sender of the request
    pub fn pid(&self) -> &Pid {
        &self.inner.pid
    }

    pub fn is_done(&self) -> bool {
        self.inner.state.lock().result.is_some()
    }

    /// Resolve with `message`; later resolutions are ignored
    pub fn complete(&self, message: AnyMessage) {
        self.inner.complete(Ok(message));
    }

    /// Block the calling thread until resolved.
    ///
    /// Do not call from an async task; use [`Future::result_async`].
    pub fn result(&self) -> FutureResult {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(result) = state.result.clone() {
                return result;
            }
            self.inner.resolved.wait(&mut state);
        }
    }

    /// Block until resolved, discarding the value
    pub fn wait(&self) -> Result<(), FutureError> {
        self.result().map(|_| ())
    }

    pub async fn result_async(&self) -> FutureResult {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = self.inner.state.lock().result.clone() {
                return result;
            }
            notified.await;
        }
    }

    /// Forward the result (or error) to `pids` once resolved.
    ///
    /// Every target receives the same message object.
    pub fn pipe_to(&self, pids: &[Pid]) {
        let piped = {
            let mut state = self.inner.state.lock();
            match state.piped.clone() {
                Some(piped) => piped,
                None => {
                    state.pipes.extend_from_slice(pids);
                    return;
                }
            }
        };

        if let Some(system) = self.inner.system.upgrade() {
            for pid in pids {
                system.send_user_message(pid, MessageEnvelope::new(Message::User(piped.clone())));
            }
        }
    }

    /// Run `completion` on the resolving thread (or now, if already resolved)
    pub fn continue_with<F>(&self, completion: F)
    where
        F: FnOnce(&FutureResult) + Send + 'static,
    {
        let result = {
            let mut state = self.inner.state.lock();
            match state.result.clone() {
                Some(result) => result,
                None => {
                    state.completions.push(Box::new(completion));
                    return;
                }
            }
        };
        completion(&result);
    }
}

impl std::fmt::Debug for Future {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future")
            .field("pid", &self.inner.pid)
            .field("done", &self.is_done())
            .finish()
    }
}

struct FutureProcess {
    inner: Arc<FutureInner>,
}

impl Process for FutureProcess {
    fn send_user_message(&self, _pid: &Pid, envelope: MessageEnvelope) {
        let result = match envelope.message {
            Message::User(message) if message.is::<DeadLetterResponse>() => {
                Err(FutureError::DeadLetter)
            }
            other => Ok(other.into_any()),
        };
        self.inner.complete(result);
    }

    fn send_system_message(&self, pid: &Pid, message: SystemMessage) {
        match message {
            SystemMessage::Terminated(terminated) => {
                self.inner.complete(Ok(AnyMessage::new(terminated)));
            }
            other => {
                tracing::debug!(
                    future = %pid,
                    message = other.type_name(),
                    "Future ignored system message"
                );
            }
        }
    }

    fn stop(&self, _pid: &Pid) {}

    fn is_dead(&self) -> bool {
        self.inner.state.lock().result.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_complete_resolves_and_deregisters() {
        let system = ActorSystem::new().unwrap();
        let future = Future::new(&system, Some(Duration::from_secs(5)));
        assert!(system.registry().get_local(future.pid().id()).is_some());

        system.send(future.pid(), 42u32);

        let result = future.result_async().await.unwrap();
        assert_eq!(result.downcast_ref::<u32>(), Some(&42));
        assert!(future.is_done());
        assert!(system.registry().get_local(future.pid().id()).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout() {
        let system = ActorSystem::new().unwrap();
        let future = Future::new(&system, Some(Duration::from_millis(10)));

        let started = Instant::now();
        let waiter = future.clone();
        let result = tokio::task::spawn_blocking(move || waiter.result())
            .await
            .unwrap();

        assert_eq!(result.unwrap_err(), FutureError::Timeout);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dead_letter_response_fails_future() {
        let system = ActorSystem::new().unwrap();
        let future = Future::new(&system, Some(Duration::from_secs(5)));

        system.send(future.pid(), DeadLetterResponse { target: None });
        assert_eq!(
            future.result_async().await.unwrap_err(),
            FutureError::DeadLetter
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_continue_with_after_completion_runs_immediately() {
        let system = ActorSystem::new().unwrap();
        let future = Future::new(&system, None);
        future.complete(AnyMessage::new("done"));

        let (tx, rx) = std::sync::mpsc::channel();
        future.continue_with(move |result| {
            let _ = tx.send(result.is_ok());
        });
        assert_eq!(rx.try_recv(), Ok(true));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_completion_ignored() {
        let system = ActorSystem::new().unwrap();
        let future = Future::new(&system, None);
        future.complete(AnyMessage::new(1u8));
        future.complete(AnyMessage::new(2u8));

        let result = future.result_async().await.unwrap();
        assert_eq!(result.downcast_ref::<u8>(), Some(&1));
    }
}
