use crate::clock::{Millis, Timestamp};
use crate::error::RegistryError;
use crate::refresh::{FrameQueue, RefreshLoop};
use crate::session::{Lap, NewSession};
use crate::stopwatch::Stopwatch;

pub const DEFAULT_TIMER_COUNT: usize = 4;

/// A stopwatch together with the loop that keeps its display current
#[derive(Debug, Clone)]
pub struct Timer {
    stopwatch: Stopwatch,
    refresh: RefreshLoop,
}

impl Timer {
    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn refresh(&self) -> &RefreshLoop {
        &self.refresh
    }

    pub fn is_running(&self) -> bool {
        self.stopwatch.is_running()
    }

    /// Elapsed time at the last published frame. For display only.
    pub fn display_elapsed(&self) -> Millis {
        self.stopwatch.elapsed_time(self.refresh.now())
    }
}

/// Fixed set of independent timers, addressed by index for the life of the
/// app. Timers share nothing but the frame queue.
#[derive(Debug)]
pub struct TimerRegistry {
    timers: Vec<Timer>,
    frames: FrameQueue,
}

impl TimerRegistry {
    pub fn new(count: usize, lap_prefix: &str, now: Timestamp) -> Self {
        let timers = (0..count)
            .map(|_| Timer {
                stopwatch: Stopwatch::with_lap_prefix(lap_prefix),
                refresh: RefreshLoop::new(now),
            })
            .collect();

        Self {
            timers,
            frames: FrameQueue::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Timer> {
        self.timers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Timer> {
        self.timers.iter()
    }

    pub fn any_running(&self) -> bool {
        self.timers.iter().any(Timer::is_running)
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.pending()
    }

    fn timer_mut(&mut self, index: usize) -> Result<&mut Timer, RegistryError> {
        let len = self.timers.len();
        self.timers
            .get_mut(index)
            .ok_or(RegistryError::NoSuchTimer { index, len })
    }

    pub fn start(&mut self, index: usize, at: Timestamp) -> Result<bool, RegistryError> {
        let frames = &mut self.frames;
        let len = self.timers.len();
        let timer = self
            .timers
            .get_mut(index)
            .ok_or(RegistryError::NoSuchTimer { index, len })?;

        let started = timer.stopwatch.start(at);
        if started {
            timer.refresh.begin(frames, index, at);
            tracing::debug!(timer = index, at = at.as_millis(), "timer started");
        }
        Ok(started)
    }

    pub fn stop(&mut self, index: usize, at: Timestamp) -> Result<bool, RegistryError> {
        let frames = &mut self.frames;
        let len = self.timers.len();
        let timer = self
            .timers
            .get_mut(index)
            .ok_or(RegistryError::NoSuchTimer { index, len })?;

        let stopped = timer.stopwatch.stop(at);
        if stopped {
            timer.refresh.cancel(frames);
            timer.refresh.publish(at);
            tracing::debug!(
                timer = index,
                accumulated = timer.stopwatch.accumulated(),
                "timer stopped"
            );
        }
        Ok(stopped)
    }

    /// Start a stopped timer, stop a running one
    pub fn toggle(&mut self, index: usize, at: Timestamp) -> Result<bool, RegistryError> {
        if self.timer_mut(index)?.is_running() {
            self.stop(index, at)?;
            Ok(false)
        } else {
            self.start(index, at)?;
            Ok(true)
        }
    }

    pub fn reset(&mut self, index: usize, at: Timestamp) -> Result<(), RegistryError> {
        self.stop(index, at)?;
        let timer = self.timer_mut(index)?;
        timer.stopwatch.reset(at);
        timer.refresh.publish(at);
        tracing::debug!(timer = index, "timer reset");
        Ok(())
    }

    pub fn add_lap(
        &mut self,
        index: usize,
        label: &str,
        at: Timestamp,
    ) -> Result<Lap, RegistryError> {
        let lap = self.timer_mut(index)?.stopwatch.add_lap(label, at).clone();
        tracing::debug!(
            timer = index,
            total = lap.total_time,
            split = lap.lap_time,
            "lap recorded"
        );
        Ok(lap)
    }

    pub fn delete_lap(
        &mut self,
        index: usize,
        lap_index: usize,
    ) -> Result<Option<Lap>, RegistryError> {
        Ok(self.timer_mut(index)?.stopwatch.delete_lap(lap_index))
    }

    pub fn finalize(
        &mut self,
        index: usize,
        label: &str,
        at: Timestamp,
    ) -> Result<Option<NewSession>, RegistryError> {
        Ok(self.timer_mut(index)?.stopwatch.finalize(label, at))
    }

    /// Display frame: fire every frame callback that was due. Returns how
    /// many timers published a new timestamp.
    pub fn on_frame(&mut self, now: Timestamp) -> usize {
        let due = self.frames.take_due();
        let mut published = 0;
        for (id, owner) in due {
            if let Some(timer) = self.timers.get_mut(owner) {
                let running = timer.stopwatch.is_running();
                if timer
                    .refresh
                    .on_frame(&mut self.frames, id, owner, running, now)
                {
                    published += 1;
                }
            }
        }
        published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn registry() -> TimerRegistry {
        TimerRegistry::new(DEFAULT_TIMER_COUNT, "Lap", ts(0))
    }

    #[test]
    fn holds_fixed_number_of_stopped_timers() {
        let reg = registry();
        assert_eq!(reg.len(), 4);
        assert!(reg.iter().all(|t| !t.is_running()));
        assert!(reg.get(4).is_none());
    }

    #[test]
    fn unknown_index_is_an_error() {
        let mut reg = registry();
        assert_matches!(
            reg.start(9, ts(0)),
            Err(RegistryError::NoSuchTimer { index: 9, len: 4 })
        );
        assert_matches!(reg.add_lap(4, "", ts(0)), Err(RegistryError::NoSuchTimer { .. }));
    }

    #[test]
    fn timers_are_independent() {
        let mut reg = registry();
        reg.start(0, ts(0)).unwrap();
        reg.start(2, ts(100)).unwrap();
        reg.add_lap(2, "", ts(150)).unwrap();
        reg.stop(0, ts(300)).unwrap();
        reg.reset(2, ts(400)).unwrap();

        let first = reg.get(0).unwrap().stopwatch();
        assert_eq!(first.accumulated(), 300);
        assert!(first.laps().is_empty());

        let third = reg.get(2).unwrap().stopwatch();
        assert_eq!(third.accumulated(), 0);
        assert!(third.laps().is_empty());

        assert_eq!(reg.get(1).unwrap().stopwatch().session_start(), None);
    }

    #[test]
    fn running_timers_refresh_on_every_frame() {
        let mut reg = registry();
        reg.start(1, ts(0)).unwrap();
        reg.start(3, ts(5)).unwrap();
        assert_eq!(reg.pending_frames(), 2);

        assert_eq!(reg.on_frame(ts(16)), 2);
        assert_eq!(reg.on_frame(ts(33)), 2);
        assert_eq!(reg.get(1).unwrap().display_elapsed(), 33);
        assert_eq!(reg.get(3).unwrap().display_elapsed(), 28);
        assert_eq!(reg.get(0).unwrap().display_elapsed(), 0);
    }

    #[test]
    fn stop_cancels_pending_frame() {
        let mut reg = registry();
        reg.start(0, ts(0)).unwrap();
        reg.on_frame(ts(16));
        reg.stop(0, ts(20)).unwrap();

        assert_eq!(reg.pending_frames(), 0);
        assert_eq!(reg.on_frame(ts(5000)), 0);
        assert_eq!(reg.get(0).unwrap().display_elapsed(), 20);
    }

    #[test]
    fn toggle_flips_state() {
        let mut reg = registry();
        assert!(reg.toggle(0, ts(0)).unwrap());
        assert!(reg.get(0).unwrap().is_running());
        assert!(!reg.toggle(0, ts(10)).unwrap());
        assert_eq!(reg.get(0).unwrap().stopwatch().accumulated(), 10);
    }

    #[test]
    fn reset_while_running_stops_refresh() {
        let mut reg = registry();
        reg.start(0, ts(0)).unwrap();
        reg.reset(0, ts(50)).unwrap();
        assert!(!reg.any_running());
        assert_eq!(reg.pending_frames(), 0);
        assert_eq!(reg.get(0).unwrap().display_elapsed(), 0);
    }

    #[test]
    fn lap_capture_ignores_stale_display_value() {
        let mut reg = registry();
        reg.start(0, ts(0)).unwrap();
        reg.on_frame(ts(16));
        let lap = reg.add_lap(0, "", ts(29)).unwrap();
        assert_eq!(lap.total_time, 29);
        assert_eq!(reg.get(0).unwrap().display_elapsed(), 16);
    }

    #[test]
    fn finalize_and_delete_lap_by_index() {
        let mut reg = registry();
        assert_eq!(reg.finalize(0, "", ts(0)).unwrap(), None);

        reg.start(0, ts(0)).unwrap();
        reg.add_lap(0, "", ts(10)).unwrap();
        reg.add_lap(0, "", ts(30)).unwrap();
        let removed = reg.delete_lap(0, 0).unwrap().unwrap();
        assert_eq!(removed.label, "Lap 1");
        assert_eq!(reg.delete_lap(0, 5).unwrap(), None);

        let session = reg.finalize(0, "x", ts(40)).unwrap().unwrap();
        assert_eq!(session.total_time, 40);
        assert_eq!(session.laps.len(), 1);
        assert_eq!(session.laps[0].lap_time, 20);
    }
}
