use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use crossterm::event::{self, Event as CtEvent, KeyEvent};

use crate::error::EvidenceError;
use crate::evidence::StoredEvidence;
use crate::lifecycle::PendingSubmission;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    /// A background evidence upload has resolved
    Upload {
        pending: PendingSubmission,
        result: Result<StoredEvidence, EvidenceError>,
    },
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let key_tx = tx.clone();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if key_tx.send(AppEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if key_tx.send(AppEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { tx, rx }
    }

    /// Handle for background workers to post events into the loop.
    pub fn sender(&self) -> Sender<AppEvent> {
        self.tx.clone()
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    pub fn event_source(&self) -> &E {
        &self.event_source
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> AppEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => AppEvent::Tick,
        }
    }
}

/// Wall-clock source for countdowns
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        if let Ok(mut now) = self.now.lock() {
            *now += step;
        }
    }

    pub fn set(&self, to: DateTime<Local>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Repeating timer driven by the event loop's ticks.
///
/// Fires at most once per period; a cancelled interval never fires again until
/// restarted.
#[derive(Clone, Copy, Debug, Default)]
pub struct Interval {
    period: Duration,
    next_due: Option<DateTime<Local>>,
}

impl Interval {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
        }
    }

    pub fn start(&mut self, now: DateTime<Local>) {
        self.next_due = Some(now);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// True when the interval is due at `now`; schedules the following firing.
    pub fn fire(&mut self, now: DateTime<Local>) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                let period = chrono::Duration::from_std(self.period)
                    .unwrap_or_else(|_| chrono::Duration::seconds(1));
                let mut next = due + period;
                while next <= now {
                    next += period;
                }
                self.next_due = Some(next);
                true
            }
            _ => false,
        }
    }
}
