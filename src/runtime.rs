use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum ChronoEvent {
    Key(KeyEvent),
    Resize,
    /// A display frame is due
    Frame,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait ChronoEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<ChronoEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<ChronoEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                // key release events would otherwise double every press on
                // terminals that report them
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    if tx.send(ChronoEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(ChronoEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(%e, "terminal event stream failed");
                    break;
                }
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ChronoEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<ChronoEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable frame cadence
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
    rx: Receiver<ChronoEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<ChronoEvent>) -> Self {
        Self { rx }
    }
}

impl ChronoEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<ChronoEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/frame at a time.
///
/// Frames are due one interval after the previous one, measured from when it
/// was handed out. Key events no longer push that deadline back; events
/// already queued are still handed out first, and an overdue frame follows
/// as soon as the queue is empty.
pub struct Runner<E: ChronoEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_frame: Instant,
}

impl<E: ChronoEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_frame = Instant::now() + ticker.interval();
        Self {
            event_source,
            ticker,
            next_frame,
        }
    }

    /// Blocks until the next frame is due and returns the next event, or Frame on timeout
    pub fn step(&mut self) -> ChronoEvent {
        let timeout = self.next_frame.saturating_duration_since(Instant::now());
        match self.event_source.recv_timeout(timeout) {
            Ok(ev) => ev,
            Err(err) => {
                if err == RecvTimeoutError::Disconnected {
                    // no more input; keep the frame cadence instead of spinning
                    std::thread::sleep(timeout);
                }
                self.next_frame = Instant::now() + self.ticker.interval();
                ChronoEvent::Frame
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn step_returns_frame_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let mut runner = Runner::new(es, ticker);

        // With no events available, step should yield Frame
        let ev = runner.step();
        match ev {
            ChronoEvent::Frame => {}
            _ => panic!("expected Frame on timeout"),
        }
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(ChronoEvent::Resize).unwrap();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(10));
        let mut runner = Runner::new(es, ticker);

        match runner.step() {
            ChronoEvent::Resize => {}
            _ => panic!("expected Resize event"),
        }
    }

    #[test]
    fn events_do_not_starve_frames() {
        let (tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(5));
        let mut runner = Runner::new(es, ticker);

        std::thread::sleep(Duration::from_millis(10));
        tx.send(ChronoEvent::Resize).unwrap();

        // the frame deadline has passed; the queued event is still delivered
        // first, and a frame follows once the queue is drained
        assert!(matches!(runner.step(), ChronoEvent::Resize));
        assert!(matches!(runner.step(), ChronoEvent::Frame));
    }
}
