//! Message taxonomy
//!
//! Three kinds of traffic reach an actor:
//! - user messages, carried type-erased in [`AnyMessage`]
//! - lifecycle ("auto-receive") messages the runtime delivers through the
//!   same receive path, such as [`Message::Started`]
//! - control-plane [`SystemMessage`]s, which always overtake user messages
//!
//! User-facing traffic is the closed [`Message`] enum, so dispatch is an
//! exhaustive `match` rather than a type switch.

use crate::actor::Actor;
use crate::context::Context;
use crate::pid::Pid;
use crate::supervision::RestartStatistics;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Priority given to messages that do not declare one
pub const DEFAULT_PRIORITY: u8 = 4;

/// Highest priority level accepted by priority mailboxes
pub const MAX_PRIORITY: u8 = 7;

/// A type-erased user message.
///
/// Cloning shares the payload, so every recipient of a broadcast observes the
/// same object (see [`AnyMessage::ptr_eq`]).
#[derive(Clone)]
pub struct AnyMessage {
    payload: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    priority: u8,
    influences_receive_timeout: bool,
}

impl AnyMessage {
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self {
            payload: Arc::new(payload),
            type_name: std::any::type_name::<T>(),
            priority: DEFAULT_PRIORITY,
            influences_receive_timeout: true,
        }
    }

    fn from_boxed(payload: Box<dyn Any + Send + Sync>, type_name: &'static str) -> Self {
        Self {
            payload: Arc::from(payload),
            type_name,
            priority: DEFAULT_PRIORITY,
            influences_receive_timeout: true,
        }
    }

    /// Set the priority used by priority mailboxes (clamped to 0..=7)
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(MAX_PRIORITY);
        self
    }

    /// Mark this message as not resetting the receiver's receive timeout
    pub fn not_influence_receive_timeout(mut self) -> Self {
        self.influences_receive_timeout = false;
        self
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn influences_receive_timeout(&self) -> bool {
        self.influences_receive_timeout
    }

    /// True if both handles share the same payload allocation
    pub fn ptr_eq(&self, other: &AnyMessage) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for AnyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyMessage({})", self.type_name)
    }
}

/// Notification that an actor has stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminated {
    pub who: Pid,
}

/// Everything delivered to [`Actor::receive`]
#[derive(Debug, Clone)]
pub enum Message {
    /// The actor instance was (re)incarnated
    Started,
    /// The actor is about to be restarted
    Restarting,
    /// The actor is about to stop
    Stopping,
    /// The actor has stopped; last message it will see
    Stopped,
    /// Stop after the messages already queued ahead of this one
    PoisonPill,
    /// No influencing message arrived within the receive timeout
    ReceiveTimeout,
    /// A watched actor or child has stopped
    Terminated(Terminated),
    User(AnyMessage),
}

impl Message {
    /// Convert any value into a message.
    ///
    /// `Message` and `AnyMessage` values pass through unchanged; anything else
    /// becomes a user message.
    pub fn from_any<T: Any + Send + Sync>(value: T) -> Message {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(value);
        let boxed = match boxed.downcast::<Message>() {
            Ok(message) => return *message,
            Err(boxed) => boxed,
        };
        match boxed.downcast::<AnyMessage>() {
            Ok(message) => Message::User(*message),
            Err(boxed) => Message::User(AnyMessage::from_boxed(
                boxed,
                std::any::type_name::<T>(),
            )),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Message::User(message) => message.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    pub fn as_user(&self) -> Option<&AnyMessage> {
        match self {
            Message::User(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Message::User(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Started => "Started",
            Message::Restarting => "Restarting",
            Message::Stopping => "Stopping",
            Message::Stopped => "Stopped",
            Message::PoisonPill => "PoisonPill",
            Message::ReceiveTimeout => "ReceiveTimeout",
            Message::Terminated(_) => "Terminated",
            Message::User(message) => message.type_name(),
        }
    }

    pub fn priority(&self) -> u8 {
        match self {
            Message::User(message) => message.priority(),
            _ => DEFAULT_PRIORITY,
        }
    }

    pub fn influences_receive_timeout(&self) -> bool {
        match self {
            Message::User(message) => message.influences_receive_timeout(),
            Message::ReceiveTimeout => false,
            _ => true,
        }
    }

    /// Wrap the message as a user payload, unwrapping `User` to avoid double boxing
    pub fn into_any(self) -> AnyMessage {
        match self {
            Message::User(message) => message,
            Message::Terminated(terminated) => AnyMessage::new(terminated),
            other => AnyMessage::new(other),
        }
    }
}

impl From<AnyMessage> for Message {
    fn from(message: AnyMessage) -> Self {
        Message::User(message)
    }
}

/// String key/value metadata attached to an envelope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeader(HashMap<String, String>);

impl MessageHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A message plus its routing metadata
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    pub message: Message,
    pub sender: Option<Pid>,
    pub header: MessageHeader,
}

impl MessageEnvelope {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            sender: None,
            header: MessageHeader::default(),
        }
    }

    pub fn with_sender(mut self, sender: Option<Pid>) -> Self {
        self.sender = sender;
        self
    }

    pub fn with_header(mut self, header: MessageHeader) -> Self {
        self.header = header;
        self
    }
}

/// Why an actor failed
#[derive(Clone)]
pub enum FailureReason {
    /// The handler panicked; carries the panic payload text
    Panic(Arc<str>),
    /// The handler returned an error
    Error(Arc<anyhow::Error>),
}

impl FailureReason {
    /// Build a reason from a `catch_unwind` payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let text = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "Unknown panic".to_string()
        };
        FailureReason::Panic(text.into())
    }

    /// Downcast the underlying error, if this failure was an `Err`
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        match self {
            FailureReason::Error(error) => error.downcast_ref::<E>(),
            FailureReason::Panic(_) => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, FailureReason::Panic(_))
    }
}

impl From<anyhow::Error> for FailureReason {
    fn from(error: anyhow::Error) -> Self {
        FailureReason::Error(Arc::new(error))
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Panic(text) => write!(f, "panic: {text}"),
            FailureReason::Error(error) => write!(f, "{error:#}"),
        }
    }
}

impl fmt::Debug for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Panic(text) => f.debug_tuple("Panic").field(text).finish(),
            FailureReason::Error(error) => f.debug_tuple("Error").field(error).finish(),
        }
    }
}

/// A child's failure report, sent to its supervisor
#[derive(Debug, Clone)]
pub struct Failure {
    pub who: Pid,
    pub reason: FailureReason,
    pub restart_stats: RestartStatistics,
    pub message: Option<Message>,
}

type ContinuationFn = Box<dyn FnOnce(&mut dyn Actor, &mut Context) -> anyhow::Result<()> + Send>;

/// Work resumed inside an actor once an awaited future resolves
pub struct Continuation {
    pub(crate) message: Option<MessageEnvelope>,
    pub(crate) callback: ContinuationFn,
}

impl Continuation {
    pub(crate) fn new(message: Option<MessageEnvelope>, callback: ContinuationFn) -> Self {
        Self { message, callback }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Control-plane messages, always processed before queued user messages
#[derive(Debug)]
pub enum SystemMessage {
    Started,
    Watch { watcher: Pid },
    Unwatch { watcher: Pid },
    Terminated(Terminated),
    Failure(Failure),
    Restart,
    Stop,
    ResumeMailbox,
    SuspendMailbox,
    Continuation(Continuation),
    /// Receive-timeout timer expiry, tagged with the arming generation
    #[doc(hidden)]
    ReceiveTimeoutElapsed(u64),
}

impl SystemMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            SystemMessage::Started => "Started",
            SystemMessage::Watch { .. } => "Watch",
            SystemMessage::Unwatch { .. } => "Unwatch",
            SystemMessage::Terminated(_) => "Terminated",
            SystemMessage::Failure(_) => "Failure",
            SystemMessage::Restart => "Restart",
            SystemMessage::Stop => "Stop",
            SystemMessage::ResumeMailbox => "ResumeMailbox",
            SystemMessage::SuspendMailbox => "SuspendMailbox",
            SystemMessage::Continuation(_) => "Continuation",
            SystemMessage::ReceiveTimeoutElapsed(_) => "ReceiveTimeoutElapsed",
        }
    }
}
