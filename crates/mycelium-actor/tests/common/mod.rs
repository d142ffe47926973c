#![allow(dead_code)]

use mycelium_actor::{Actor, Context, Message, Pid};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Lifecycle messages by name, `&'static str` payloads by value
pub fn describe(message: &Message) -> String {
    match message.downcast_ref::<&'static str>() {
        Some(text) => (*text).to_string(),
        None => message.type_name().to_string(),
    }
}

/// Shared, clonable event log
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.count(entry) > 0
    }
}

/// Slot for handing a PID out of an actor
#[derive(Clone, Default)]
pub struct PidSlot(Arc<Mutex<Option<Pid>>>);

impl PidSlot {
    pub fn set(&self, pid: Pid) {
        *self.0.lock() = Some(pid);
    }

    pub fn get(&self) -> Option<Pid> {
        self.0.lock().clone()
    }
}

/// Records every message it sees
pub struct RecordingActor {
    pub log: Recorder,
}

impl Actor for RecordingActor {
    fn receive(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
        if let Some(message) = ctx.message() {
            self.log.push(describe(message));
        }
        Ok(())
    }
}

/// Replies to every user message with the same message
pub fn echo(ctx: &mut Context) -> anyhow::Result<()> {
    if let Some(message) = ctx.message().and_then(Message::as_user).cloned() {
        ctx.respond(message);
    }
    Ok(())
}
