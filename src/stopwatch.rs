use crate::clock::{Millis, Timestamp};
use crate::session::{Lap, NewSession};

pub const DEFAULT_LAP_PREFIX: &str = "Lap";

/// One timer: a start reference plus an accumulator of finished segments.
///
/// Every timing operation takes the timestamp it should act at. Reads never
/// advance `accumulated`; only `stop` does.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    start_reference: Option<Timestamp>,
    accumulated: Millis,
    session_start: Option<Timestamp>,
    laps: Vec<Lap>,
    lap_prefix: String,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::with_lap_prefix(DEFAULT_LAP_PREFIX)
    }

    pub fn with_lap_prefix(prefix: impl Into<String>) -> Self {
        Self {
            start_reference: None,
            accumulated: 0,
            session_start: None,
            laps: Vec::new(),
            lap_prefix: prefix.into(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.start_reference.is_some()
    }

    pub fn accumulated(&self) -> Millis {
        self.accumulated
    }

    pub fn start_reference(&self) -> Option<Timestamp> {
        self.start_reference
    }

    /// First start since the last reset
    pub fn session_start(&self) -> Option<Timestamp> {
        self.session_start
    }

    pub fn laps(&self) -> &[Lap] {
        &self.laps
    }

    /// Returns whether the stopwatch went from stopped to running
    pub fn start(&mut self, at: Timestamp) -> bool {
        if self.is_running() {
            return false;
        }

        if self.accumulated == 0 && self.session_start.is_none() {
            self.session_start = Some(at);
        }
        self.start_reference = Some(at);
        true
    }

    /// Returns whether the stopwatch went from running to stopped
    pub fn stop(&mut self, at: Timestamp) -> bool {
        match self.start_reference.take() {
            Some(started) => {
                // a timestamp from before the segment began adds nothing
                self.accumulated += (at - started).max(0);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self, at: Timestamp) {
        self.stop(at);
        self.accumulated = 0;
        self.laps.clear();
        self.session_start = None;
    }

    pub fn elapsed_time(&self, at: Timestamp) -> Millis {
        match self.start_reference {
            Some(started) => self.accumulated + (at - started).max(0),
            None => self.accumulated,
        }
    }

    /// Record a lap at exactly `at`. An empty label becomes "<prefix> N".
    pub fn add_lap(&mut self, label: &str, at: Timestamp) -> &Lap {
        let current = self.elapsed_time(at);
        let last_lap_end = self.laps.last().map_or(0, |lap| lap.total_time);

        let label = if label.is_empty() {
            format!("{} {}", self.lap_prefix, self.laps.len() + 1)
        } else {
            label.to_string()
        };

        self.laps
            .push(Lap::new(current, current - last_lap_end, label));
        &self.laps[self.laps.len() - 1]
    }

    /// Remove the lap at `index`.
    ///
    /// The remaining laps keep the `lap_time` they were recorded with, so
    /// removing anything but the last lap leaves the following split
    /// measured against a lap that no longer exists.
    pub fn delete_lap(&mut self, index: usize) -> Option<Lap> {
        if index < self.laps.len() {
            Some(self.laps.remove(index))
        } else {
            None
        }
    }

    /// Snapshot the current run for archiving; `None` if nothing was timed
    /// since the last reset.
    pub fn finalize(&self, label: &str, at: Timestamp) -> Option<NewSession> {
        let start_time = self.session_start?;
        Some(NewSession {
            start_time,
            end_time: at,
            total_time: self.elapsed_time(at),
            laps: self.laps.clone(),
            label: label.to_string(),
        })
    }
}
