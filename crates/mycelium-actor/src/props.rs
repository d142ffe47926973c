//! Spawn recipes
//!
//! [`Props`] bundle everything needed to create (and re-create, on restart)
//! an actor: its producer, mailbox flavor, dispatcher, supervision, and
//! the middleware wrapped around its receive and send paths.

use crate::actor::{Actor, FnActor, ReceiveFn};
use crate::context::{ActorCell, Context};
use crate::error::SpawnError;
use crate::mailbox::{
    BoundedQueue, Dispatcher, Mailbox, MailboxQueue, MailboxStatistics, OverflowPolicy,
    PriorityQueue, UnboundedQueue,
};
use crate::message::{MessageEnvelope, SystemMessage};
use crate::middleware::{InitHook, ReceiveNext, ReceiverMiddleware, SendNext, SenderMiddleware};
use crate::pid::Pid;
use crate::process::{ActorProcess, Process};
use crate::supervision::SupervisorStrategy;
use crate::system::ActorSystem;
use std::fmt;
use std::sync::Arc;

/// Creates a fresh actor instance; called at spawn and on every restart
pub type Producer = Arc<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

/// User queue flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailboxKind {
    #[default]
    Unbounded,
    Bounded {
        capacity: usize,
        policy: OverflowPolicy,
    },
    /// Higher [`AnyMessage::priority`](crate::message::AnyMessage::priority) first
    Priority,
}

impl MailboxKind {
    fn build(self) -> Box<dyn MailboxQueue> {
        match self {
            MailboxKind::Unbounded => Box::new(UnboundedQueue::new()),
            MailboxKind::Bounded { capacity, policy } => {
                Box::new(BoundedQueue::new(capacity, policy))
            }
            MailboxKind::Priority => Box::new(PriorityQueue::new()),
        }
    }
}

#[derive(Clone)]
pub struct Props {
    producer: Producer,
    mailbox: MailboxKind,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    supervisor: Option<Arc<dyn SupervisorStrategy>>,
    guardian: Option<Arc<dyn SupervisorStrategy>>,
    statistics: Vec<Arc<dyn MailboxStatistics>>,
    receiver_middleware: Arc<[ReceiverMiddleware]>,
    sender_middleware: Arc<[SenderMiddleware]>,
    on_init: Arc<[InitHook]>,
}

fn appended<T: Clone>(chain: &Arc<[T]>, item: T) -> Arc<[T]> {
    chain.iter().cloned().chain(std::iter::once(item)).collect()
}

impl Props {
    /// Props for actors built by `producer`
    ///
    /// ```rust,ignore
    /// let props = Props::from_producer(|| Counter::default());
    /// ```
    pub fn from_producer<A, F>(producer: F) -> Self
    where
        A: Actor,
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self::new(Arc::new(move || Box::new(producer()) as Box<dyn Actor>))
    }

    /// Props for a stateless actor defined by a closure
    pub fn from_fn<F>(receive: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let receive: Arc<ReceiveFn> = Arc::new(receive);
        Self::new(Arc::new(move || {
            Box::new(FnActor::new(receive.clone())) as Box<dyn Actor>
        }))
    }

    pub fn new(producer: Producer) -> Self {
        Self {
            producer,
            mailbox: MailboxKind::Unbounded,
            dispatcher: None,
            supervisor: None,
            guardian: None,
            statistics: Vec::new(),
            receiver_middleware: Arc::from(Vec::new()),
            sender_middleware: Arc::from(Vec::new()),
            on_init: Arc::from(Vec::new()),
        }
    }

    pub fn with_mailbox(mut self, mailbox: MailboxKind) -> Self {
        self.mailbox = mailbox;
        self
    }

    pub fn with_bounded_mailbox(self, capacity: usize, policy: OverflowPolicy) -> Self {
        self.with_mailbox(MailboxKind::Bounded { capacity, policy })
    }

    pub fn with_priority_mailbox(self) -> Self {
        self.with_mailbox(MailboxKind::Priority)
    }

    /// Run this actor on `dispatcher` instead of the system's
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Strategy applied to this actor's children
    pub fn with_supervisor(mut self, strategy: Arc<dyn SupervisorStrategy>) -> Self {
        self.supervisor = Some(strategy);
        self
    }

    /// Supervise this (root) actor with a guardian running `strategy`.
    ///
    /// Only valid for actors spawned from the system; spawning a child with
    /// these props fails with [`SpawnError::GuardianOnChild`].
    pub fn with_guardian(mut self, strategy: Arc<dyn SupervisorStrategy>) -> Self {
        self.guardian = Some(strategy);
        self
    }

    pub fn with_mailbox_statistics(mut self, statistics: Arc<dyn MailboxStatistics>) -> Self {
        self.statistics.push(statistics);
        self
    }

    /// Wrap every delivery into the actor, lifecycle messages included.
    ///
    /// Middleware runs in registration order; each one continues the chain
    /// with `next.run(ctx)` or swallows the message by not calling it.
    pub fn with_receiver_middleware<F>(mut self, middleware: F) -> Self
    where
        F: Fn(&mut Context, ReceiveNext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let middleware: ReceiverMiddleware = Arc::new(middleware);
        self.receiver_middleware = appended(&self.receiver_middleware, middleware);
        self
    }

    /// Wrap every user message the actor sends through its context
    pub fn with_sender_middleware<F>(mut self, middleware: F) -> Self
    where
        F: Fn(&Context, &Pid, MessageEnvelope, SendNext<'_>) + Send + Sync + 'static,
    {
        let middleware: SenderMiddleware = Arc::new(middleware);
        self.sender_middleware = appended(&self.sender_middleware, middleware);
        self
    }

    /// Run `hook` on the context of every actor spawned from these props,
    /// before it receives `Started`. Restarts do not re-run it.
    pub fn with_on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        let hook: InitHook = Arc::new(hook);
        self.on_init = appended(&self.on_init, hook);
        self
    }

    pub fn mailbox(&self) -> MailboxKind {
        self.mailbox
    }

    pub fn supervisor_strategy(&self) -> Option<&Arc<dyn SupervisorStrategy>> {
        self.supervisor.as_ref()
    }

    pub fn guardian_strategy(&self) -> Option<&Arc<dyn SupervisorStrategy>> {
        self.guardian.as_ref()
    }

    pub(crate) fn receiver_middleware(&self) -> &Arc<[ReceiverMiddleware]> {
        &self.receiver_middleware
    }

    pub(crate) fn sender_middleware(&self) -> &Arc<[SenderMiddleware]> {
        &self.sender_middleware
    }

    pub(crate) fn on_init(&self) -> &Arc<[InitHook]> {
        &self.on_init
    }

    pub(crate) fn produce(&self) -> Box<dyn Actor> {
        (self.producer)()
    }

    /// Create the mailbox, register the process, and start the actor.
    ///
    /// `Started` is queued before the mailbox can be reached through the
    /// registry, so it is always the first message the actor sees.
    pub(crate) fn spawn(
        &self,
        system: &ActorSystem,
        id: &str,
        parent: Option<Pid>,
    ) -> Result<Pid, SpawnError> {
        let dispatcher = self
            .dispatcher
            .clone()
            .unwrap_or_else(|| system.dispatcher().clone());
        let mailbox = Mailbox::new(self.mailbox.build(), dispatcher, self.statistics.clone());
        mailbox.prime(SystemMessage::Started);

        let process: Arc<dyn Process> = Arc::new(ActorProcess::new(mailbox.clone()));
        let (pid, added) = system.registry().add(process, id);
        if !added {
            return Err(SpawnError::NameExists(pid));
        }

        let ctx = Context::new(system.clone(), self.clone(), parent, pid.clone());
        mailbox.register_invoker(Arc::new(ActorCell::new(ctx)));
        mailbox.start();

        tracing::debug!(pid = %pid, "Actor spawned");
        Ok(pid)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("mailbox", &self.mailbox)
            .field("custom_dispatcher", &self.dispatcher.is_some())
            .field("supervisor", &self.supervisor.is_some())
            .field("guardian", &self.guardian.is_some())
            .field("receiver_middleware", &self.receiver_middleware.len())
            .field("sender_middleware", &self.sender_middleware.len())
            .field("on_init", &self.on_init.len())
            .finish()
    }
}
