use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

/// Events that drive the rest countdown loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RestEvent {
    Tick,
    /// App became active again; timer state must be reloaded from storage.
    Foreground,
    Background,
    /// User cut the rest short.
    Dismiss,
}

/// Source of lifecycle and user events
pub trait RestEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<RestEvent, RecvTimeoutError>;
}

/// Production event source: any line on stdin dismisses the rest
pub struct StdinEventSource {
    rx: Receiver<RestEvent>,
}

impl StdinEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if line.is_err() || tx.send(RestEvent::Dismiss).is_err() {
                    break;
                }
            }
        });

        Self { rx }
    }
}

impl Default for StdinEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RestEventSource for StdinEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<RestEvent, RecvTimeoutError> {
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

    pub fn every_second() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed event source for tests
pub struct TestEventSource {
    rx: Receiver<RestEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<RestEvent>) -> Self {
        Self { rx }
    }
}

impl RestEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<RestEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the countdown one event/tick at a time
pub struct Runner<E: RestEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: RestEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout.
    /// A closed source still paces ticks at the interval.
    pub fn step(&self) -> RestEvent {
        let interval = self.ticker.interval();
        match self.event_source.recv_timeout(interval) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => RestEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(interval);
                RestEvent::Tick
            }
        }
    }
}
