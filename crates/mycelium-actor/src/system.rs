//! The actor system
//!
//! [`ActorSystem`] is a cheap handle (an `Arc`) to one runtime instance: the
//! process registry, the event stream, dead letters, guardians, and the
//! default dispatcher. Root-level operations (spawning top-level actors,
//! sending from outside any actor) live here.
//!
//! # Example
//!
//! ```rust,ignore
//! let system = ActorSystem::new()?;
//! let pid = system.spawn(&Props::from_producer(Counter::default))?;
//! system.send(&pid, Increment);
//! let total = system.request_future(&pid, Get, Duration::from_secs(1)).result_async().await?;
//! ```

use crate::dead_letter::{self, DeadLetterProcess};
use crate::error::{Result, SpawnError};
use crate::event_stream::{EventStream, EventStreamProcess, Subscription};
use crate::future::Future;
use crate::guardian::Guardians;
use crate::mailbox::{Dispatcher, TokioDispatcher};
use crate::message::{Message, MessageEnvelope, SystemMessage};
use crate::pid::Pid;
use crate::props::Props;
use crate::registry::ProcessRegistry;
use crate::supervision::{self, SupervisorStrategy};
use mycelium_config::ActorSystemConfig;
use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::runtime::Handle;

/// How long stop/poison futures wait for `Terminated`
pub const STOP_FUTURE_TIMEOUT: Duration = Duration::from_secs(10);

const DEAD_LETTER_ID: &str = "deadletter";
const EVENT_STREAM_ID: &str = "eventstream";

struct SystemInner {
    config: ActorSystemConfig,
    registry: ProcessRegistry,
    event_stream: Arc<EventStream>,
    dead_letter: Arc<DeadLetterProcess>,
    dead_letter_pid: Pid,
    event_stream_pid: Pid,
    guardians: Guardians,
    runtime: Handle,
    dispatcher: Arc<dyn Dispatcher>,
    default_strategy: Arc<dyn SupervisorStrategy>,
    dead_letter_logging: OnceLock<Arc<Subscription>>,
}

#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

/// Non-owning handle, held by processes the system itself owns
#[derive(Clone)]
pub struct WeakActorSystem {
    inner: Weak<SystemInner>,
}

impl WeakActorSystem {
    pub fn upgrade(&self) -> Option<ActorSystem> {
        self.inner.upgrade().map(|inner| ActorSystem { inner })
    }
}

impl ActorSystem {
    /// System with default config on the current tokio runtime
    pub fn new() -> Result<Self> {
        Self::with_config(ActorSystemConfig::default())
    }

    /// Must be called from within a tokio runtime
    pub fn with_config(config: ActorSystemConfig) -> Result<Self> {
        let runtime = Handle::try_current()?;
        Self::with_runtime(config, runtime)
    }

    pub fn with_runtime(config: ActorSystemConfig, runtime: Handle) -> Result<Self> {
        config.validate()?;

        let dispatcher: Arc<dyn Dispatcher> =
            Arc::new(TokioDispatcher::new(runtime.clone(), config.throughput));

        let inner = Arc::new_cyclic(|weak: &Weak<SystemInner>| {
            let dead_letter = Arc::new(DeadLetterProcess::new(WeakActorSystem {
                inner: weak.clone(),
            }));
            let registry = ProcessRegistry::new(
                config.address.as_str(),
                config.registry_shards,
                dead_letter.clone(),
            );
            let (dead_letter_pid, _) = registry.add(dead_letter.clone(), DEAD_LETTER_ID);

            let event_stream = Arc::new(EventStream::new());
            let (event_stream_pid, _) = registry.add(
                Arc::new(EventStreamProcess::new(event_stream.clone())),
                EVENT_STREAM_ID,
            );

            SystemInner {
                config,
                registry,
                event_stream,
                dead_letter,
                dead_letter_pid,
                event_stream_pid,
                guardians: Guardians::default(),
                runtime,
                dispatcher,
                default_strategy: supervision::default_strategy(),
                dead_letter_logging: OnceLock::new(),
            }
        });

        let system = Self { inner };
        let subscription = dead_letter::install_logging(&system);
        let _ = system.inner.dead_letter_logging.set(subscription);

        tracing::info!(
            address = system.address(),
            throughput = system.config().throughput,
            "Actor system started"
        );
        Ok(system)
    }

    /// System configured from a TOML file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = ActorSystemConfig::load(path)?;
        Self::with_config(config)
    }

    pub fn downgrade(&self) -> WeakActorSystem {
        WeakActorSystem {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &ActorSystemConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.inner.registry
    }

    pub fn event_stream(&self) -> &Arc<EventStream> {
        &self.inner.event_stream
    }

    pub fn address(&self) -> &str {
        self.inner.registry.address()
    }

    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.inner.dispatcher
    }

    /// Strategy for actors whose props set none, and for root actors
    /// spawned without a guardian
    pub fn default_strategy(&self) -> &Arc<dyn SupervisorStrategy> {
        &self.inner.default_strategy
    }

    pub fn dead_letter_process(&self) -> &Arc<DeadLetterProcess> {
        &self.inner.dead_letter
    }

    pub fn dead_letter_pid(&self) -> &Pid {
        &self.inner.dead_letter_pid
    }

    /// Messages sent here are published on the event stream
    pub fn event_stream_pid(&self) -> &Pid {
        &self.inner.event_stream_pid
    }

    // ===== Raw delivery =====

    pub fn send_user_message(&self, pid: &Pid, envelope: MessageEnvelope) {
        self.inner.registry.get(pid).send_user_message(pid, envelope);
    }

    pub fn send_system_message(&self, pid: &Pid, message: SystemMessage) {
        self.inner.registry.get(pid).send_system_message(pid, message);
    }

    // ===== Root operations =====

    /// Spawn a top-level actor with a generated name
    pub fn spawn(&self, props: &Props) -> std::result::Result<Pid, SpawnError> {
        let name = self.inner.registry.next_id();
        self.spawn_named(props, &name)
    }

    pub fn spawn_prefix(&self, props: &Props, prefix: &str) -> std::result::Result<Pid, SpawnError> {
        let name = format!("{prefix}{}", self.inner.registry.next_id());
        self.spawn_named(props, &name)
    }

    /// Spawn a top-level actor; fails if `name` is taken
    pub fn spawn_named(&self, props: &Props, name: &str) -> std::result::Result<Pid, SpawnError> {
        let parent = props
            .guardian_strategy()
            .map(|strategy| self.inner.guardians.pid_for(self, strategy));
        props.spawn(self, name, parent)
    }

    pub fn send<M: Any + Send + Sync>(&self, pid: &Pid, message: M) {
        self.send_user_message(pid, MessageEnvelope::new(Message::from_any(message)));
    }

    pub fn request_with_sender<M: Any + Send + Sync>(&self, pid: &Pid, message: M, sender: &Pid) {
        let envelope =
            MessageEnvelope::new(Message::from_any(message)).with_sender(Some(sender.clone()));
        self.send_user_message(pid, envelope);
    }

    /// Ask `pid`; the future resolves with the first reply or times out
    pub fn request_future<M: Any + Send + Sync>(
        &self,
        pid: &Pid,
        message: M,
        timeout: Duration,
    ) -> Future {
        let future = Future::new(self, Some(timeout));
        self.request_with_sender(pid, message, future.pid());
        future
    }

    /// Stop `pid` after its current message
    pub fn stop(&self, pid: &Pid) {
        self.inner.registry.get(pid).stop(pid);
    }

    /// Stop `pid`; the future resolves with `Terminated` once it is gone
    pub fn stop_future(&self, pid: &Pid) -> Future {
        let future = self.watch_future(pid);
        self.stop(pid);
        future
    }

    /// Stop `pid` once it has processed what is already queued
    pub fn poison(&self, pid: &Pid) {
        self.send(pid, Message::PoisonPill);
    }

    pub fn poison_future(&self, pid: &Pid) -> Future {
        let future = self.watch_future(pid);
        self.poison(pid);
        future
    }

    fn watch_future(&self, pid: &Pid) -> Future {
        let future = Future::new(self, Some(STOP_FUTURE_TIMEOUT));
        self.send_system_message(
            pid,
            SystemMessage::Watch {
                watcher: future.pid().clone(),
            },
        );
        future
    }

    /// Stop every locally registered actor
    pub fn shutdown(&self) {
        tracing::info!(address = self.address(), "Actor system shutting down");
        for id in self.inner.registry.local_ids() {
            if let Some(process) = self.inner.registry.get_local(&id) {
                process.stop(&Pid::new(self.address(), id.as_str()));
            }
        }
        if let Some(subscription) = self.inner.dead_letter_logging.get() {
            self.inner.event_stream.unsubscribe(subscription);
        }
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("address", &self.address())
            .field("processes", &self.inner.registry.len())
            .finish()
    }
}
