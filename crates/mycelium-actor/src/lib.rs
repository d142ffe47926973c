pub mod actor;
pub mod behavior;
pub mod context;
pub mod dead_letter;
pub mod error;
pub mod event_stream;
pub mod future;
pub mod mailbox;
pub mod message;
pub mod middleware;
pub mod pid;
pub mod process;
pub mod props;
pub mod registry;
pub mod supervision;
pub mod system;
pub mod throttle;

mod guardian;

pub use actor::{Actor, FnActor};
pub use behavior::{Behavior, BehaviorFn};
pub use context::{Context, ContextState};
pub use dead_letter::{DeadLetterEvent, DeadLetterProcess, DeadLetterResponse};
pub use error::{ActorError, FutureError, Result, SpawnError};
pub use event_stream::{EventStream, Subscription};
pub use future::{Future, FutureResult};
pub use mailbox::{
    Dispatcher, MailboxMetrics, MailboxStatistics, OverflowPolicy, SynchronizedDispatcher,
    TokioDispatcher,
};
pub use message::{
    AnyMessage, Failure, FailureReason, Message, MessageEnvelope, MessageHeader, SystemMessage,
    Terminated,
};
pub use middleware::{InitHook, ReceiveNext, ReceiverMiddleware, SendNext, SenderMiddleware};
pub use pid::{Pid, PidSet};
pub use process::Process;
pub use props::{MailboxKind, Props, Producer};
pub use registry::ProcessRegistry;
pub use supervision::{
    AllForOneStrategy, Decider, Directive, ExponentialBackoffStrategy, OneForOneStrategy,
    RestartStatistics, RestartingStrategy, Supervisor, SupervisorEvent, SupervisorStrategy,
};
pub use system::{ActorSystem, WeakActorSystem};

pub use mycelium_config::ActorSystemConfig;
