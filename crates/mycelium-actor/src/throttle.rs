//! Event-rate throttling for noisy log sites

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::time::{Duration, Instant};

/// State of the throttle after counting one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valve {
    /// Under the limit
    Open,
    /// This event hit the limit exactly
    Closing,
    /// Over the limit; the event should be suppressed
    Closed,
}

struct Window {
    started: Option<Instant>,
    count: u32,
}

/// Allows `max_events` per `period`.
///
/// When a new window opens, the number of events suppressed in the previous
/// one is passed to the `on_throttled` callback.
pub struct Throttle {
    max_events: u32,
    period: Duration,
    window: Mutex<Window>,
    on_throttled: Box<dyn Fn(u32) + Send + Sync>,
}

impl Throttle {
    pub fn new<F>(max_events: u32, period: Duration, on_throttled: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        Self {
            max_events,
            period,
            window: Mutex::new(Window {
                started: None,
                count: 0,
            }),
            on_throttled: Box::new(on_throttled),
        }
    }

    /// Count one event and report whether it may pass
    pub fn should_throttle(&self) -> Valve {
        let (valve, suppressed) = {
            let mut window = self.window.lock();
            let now = Instant::now();

            let mut suppressed = 0;
            match window.started {
                Some(started) if now.duration_since(started) < self.period => {}
                _ => {
                    suppressed = window.count.saturating_sub(self.max_events);
                    window.started = Some(now);
                    window.count = 0;
                }
            }

            window.count = window.count.saturating_add(1);
            let valve = match window.count.cmp(&self.max_events) {
                Ordering::Less => Valve::Open,
                Ordering::Equal => Valve::Closing,
                Ordering::Greater => Valve::Closed,
            };
            (valve, suppressed)
        };

        if suppressed > 0 {
            (self.on_throttled)(suppressed);
        }
        valve
    }
}
