use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::archive::SessionArchive;
use crate::clock::{Clock, SystemClock, Timestamp};
use crate::config::Config;
use crate::haptics::Haptics;
use crate::registry::TimerRegistry;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Screen {
    Timers,
    History,
}

/// What a label being typed will be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTarget {
    Lap,
    Session,
}

/// Result of archiving the selected timer's run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    NothingToSave,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInput {
    pub target: LabelTarget,
    pub buffer: String,
}

/// Application state and key handling, independent of the terminal.
///
/// Owns the timer registry for the whole run. Every action samples the
/// clock once and hands that timestamp down, so what a key press records is
/// the moment it was handled, not the last frame drawn.
pub struct App<C: Clock = SystemClock> {
    clock: C,
    registry: TimerRegistry,
    archive: Option<Box<dyn SessionArchive>>,
    haptics: Box<dyn Haptics>,
    config: Config,
    pub screen: Screen,
    pub selected: usize,
    pub selected_lap: Option<usize>,
    pub history: Vec<Session>,
    pub history_cursor: usize,
    pub history_lap_cursor: Option<usize>,
    pub input: Option<LabelInput>,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl<C: Clock> App<C> {
    pub fn new(
        config: Config,
        clock: C,
        archive: Option<Box<dyn SessionArchive>>,
        haptics: Box<dyn Haptics>,
    ) -> Self {
        let config = config.sanitized();
        let registry =
            TimerRegistry::new(config.timer_count, &config.lap_label_prefix, clock.now());

        Self {
            clock,
            registry,
            archive,
            haptics,
            config,
            screen: Screen::Timers,
            selected: 0,
            selected_lap: None,
            history: Vec::new(),
            history_cursor: 0,
            history_lap_cursor: None,
            input: None,
            status: None,
            should_quit: false,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn registry(&self) -> &TimerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn archive(&self) -> Option<&dyn SessionArchive> {
        self.archive.as_deref()
    }

    pub fn has_archive(&self) -> bool {
        self.archive.is_some()
    }

    /// Display frame. Returns whether anything needs redrawing.
    pub fn on_frame(&mut self) -> bool {
        let now = self.clock.now();
        self.registry.on_frame(now) > 0
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.input.is_some() {
            self.on_input_key(key);
            return;
        }

        match self.screen {
            Screen::Timers => self.on_timers_key(key),
            Screen::History => self.on_history_key(key),
        }
    }

    fn on_timers_key(&mut self, key: KeyEvent) {
        let at = self.clock.now();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected(at),
            KeyCode::Char('l') => self.lap_selected("", at),
            KeyCode::Char('L') => self.begin_input(LabelTarget::Lap),
            KeyCode::Char('r') => self.reset_selected(at),
            KeyCode::Char('s') => {
                self.save_selected("", at);
            }
            KeyCode::Char('S') => self.begin_input(LabelTarget::Session),
            KeyCode::Char('d') | KeyCode::Delete => self.delete_selected_lap(),
            KeyCode::Char('h') => self.show_history(),
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                if index < self.registry.len() {
                    self.select(index);
                }
            }
            KeyCode::Left | KeyCode::BackTab => {
                let len = self.registry.len();
                self.select((self.selected + len - 1) % len);
            }
            KeyCode::Right | KeyCode::Tab => {
                self.select((self.selected + 1) % self.registry.len());
            }
            KeyCode::Up => self.move_lap_cursor(-1),
            KeyCode::Down => self.move_lap_cursor(1),
            _ => {}
        }
    }

    fn on_history_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc | KeyCode::Left if self.history_lap_cursor.is_some() => {
                self.history_lap_cursor = None;
            }
            KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('h') | KeyCode::Left => {
                self.screen = Screen::Timers;
            }
            KeyCode::Enter | KeyCode::Right => {
                let has_laps = self
                    .history
                    .get(self.history_cursor)
                    .is_some_and(|s| !s.laps.is_empty());
                if has_laps {
                    self.history_lap_cursor = Some(0);
                }
            }
            KeyCode::Up => self.move_history_cursor(-1),
            KeyCode::Down => self.move_history_cursor(1),
            KeyCode::Char('d') | KeyCode::Delete => self.delete_in_history(),
            _ => {}
        }
    }

    fn on_input_key(&mut self, key: KeyEvent) {
        let Some(input) = self.input.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.input = None,
            KeyCode::Backspace => {
                input.buffer.pop();
            }
            KeyCode::Char(c) => input.buffer.push(c),
            KeyCode::Enter => {
                // timestamp of the confirming key press, not of when typing began
                let at = self.clock.now();
                if let Some(input) = self.input.take() {
                    let label = input.buffer.trim().to_string();
                    match input.target {
                        LabelTarget::Lap => self.lap_selected(&label, at),
                        LabelTarget::Session => {
                            self.save_selected(&label, at);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn begin_input(&mut self, target: LabelTarget) {
        self.input = Some(LabelInput {
            target,
            buffer: String::new(),
        });
    }

    fn select(&mut self, index: usize) {
        if index != self.selected {
            self.selected = index;
            self.selected_lap = None;
        }
    }

    fn buzz(&mut self) {
        if self.config.haptics {
            self.haptics.trigger(&[self.config.haptic_pattern_ms]);
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub fn toggle_selected(&mut self, at: Timestamp) {
        match self.registry.toggle(self.selected, at) {
            Ok(_) => {
                self.status = None;
                self.buzz();
            }
            Err(e) => tracing::error!(%e, "toggle failed"),
        }
    }

    pub fn lap_selected(&mut self, label: &str, at: Timestamp) {
        match self.registry.add_lap(self.selected, label, at) {
            Ok(lap) => {
                self.buzz();
                self.set_status(format!("{} recorded", lap.label));
            }
            Err(e) => tracing::error!(%e, "lap failed"),
        }
    }

    /// With `archive_on_reset` the run is archived first, and a run that
    /// could not be archived is not reset.
    pub fn reset_selected(&mut self, at: Timestamp) {
        if self.config.archive_on_reset {
            match self.archive_selected("", at) {
                SaveOutcome::Saved => self.set_status("Saved to history"),
                SaveOutcome::NothingToSave => {}
                SaveOutcome::Failed(reason) => {
                    self.set_status(format!("Not reset: {reason}"));
                    return;
                }
            }
        }
        match self.registry.reset(self.selected, at) {
            Ok(()) => {
                self.selected_lap = None;
                self.buzz();
            }
            Err(e) => tracing::error!(%e, "reset failed"),
        }
    }

    /// Archive the selected timer's run. The timer itself is left untouched
    /// whatever the archive does.
    pub fn save_selected(&mut self, label: &str, at: Timestamp) -> SaveOutcome {
        let outcome = self.archive_selected(label, at);
        match &outcome {
            SaveOutcome::Saved => self.set_status("Saved to history"),
            SaveOutcome::NothingToSave => self.set_status("Nothing to save yet"),
            SaveOutcome::Failed(reason) => self.set_status(reason.clone()),
        }
        outcome
    }

    fn archive_selected(&mut self, label: &str, at: Timestamp) -> SaveOutcome {
        let session = match self.registry.finalize(self.selected, label, at) {
            Ok(Some(session)) => session,
            Ok(None) => return SaveOutcome::NothingToSave,
            Err(e) => {
                tracing::error!(%e, "finalize failed");
                return SaveOutcome::Failed(e.to_string());
            }
        };

        let Some(archive) = self.archive.as_mut() else {
            return SaveOutcome::Failed("History is unavailable".to_string());
        };

        match archive.append(session, at) {
            Ok(stored) => {
                tracing::info!(timer = self.selected, id = %stored.id, "run saved");
                self.buzz();
                SaveOutcome::Saved
            }
            Err(e) => {
                tracing::error!(%e, "could not save session");
                SaveOutcome::Failed(format!("Save failed: {e}"))
            }
        }
    }

    pub fn delete_selected_lap(&mut self) {
        let Some(lap_index) = self.selected_lap else {
            return;
        };
        match self.registry.delete_lap(self.selected, lap_index) {
            Ok(Some(lap)) => {
                self.set_status(format!("{} deleted", lap.label));
                let remaining = self
                    .registry
                    .get(self.selected)
                    .map_or(0, |t| t.stopwatch().laps().len());
                self.selected_lap = if remaining == 0 {
                    None
                } else {
                    Some(lap_index.min(remaining - 1))
                };
            }
            Ok(None) => self.selected_lap = None,
            Err(e) => tracing::error!(%e, "lap delete failed"),
        }
    }

    fn move_lap_cursor(&mut self, delta: isize) {
        let count = self
            .registry
            .get(self.selected)
            .map_or(0, |t| t.stopwatch().laps().len());
        self.selected_lap = step_cursor(self.selected_lap, delta, count);
    }

    pub fn show_history(&mut self) {
        self.refresh_history();
        self.screen = Screen::History;
    }

    fn refresh_history(&mut self) {
        let Some(archive) = self.archive.as_ref() else {
            self.history.clear();
            self.set_status("History is unavailable");
            return;
        };

        match archive.list() {
            Ok(sessions) => self.history = sessions,
            Err(e) => {
                tracing::error!(%e, "could not load history");
                self.set_status(format!("Could not load history: {e}"));
            }
        }

        if self.history_cursor >= self.history.len() {
            self.history_cursor = self.history.len().saturating_sub(1);
        }
        let lap_count = self
            .history
            .get(self.history_cursor)
            .map_or(0, |s| s.laps.len());
        self.history_lap_cursor = match self.history_lap_cursor {
            Some(_) if lap_count == 0 => None,
            Some(i) => Some(i.min(lap_count - 1)),
            None => None,
        };
    }

    fn move_history_cursor(&mut self, delta: isize) {
        match self.history_lap_cursor {
            Some(_) => {
                let count = self
                    .history
                    .get(self.history_cursor)
                    .map_or(0, |s| s.laps.len());
                self.history_lap_cursor =
                    step_cursor(self.history_lap_cursor, delta, count).or(Some(0));
            }
            None => {
                if let Some(i) = step_cursor(Some(self.history_cursor), delta, self.history.len()) {
                    self.history_cursor = i;
                }
            }
        }
    }

    fn delete_in_history(&mut self) {
        let Some(session) = self.history.get(self.history_cursor) else {
            return;
        };
        let session_id = session.id.clone();
        let lap_id = self
            .history_lap_cursor
            .and_then(|i| session.laps.get(i))
            .map(|lap| lap.id.clone());

        let Some(archive) = self.archive.as_mut() else {
            return;
        };

        let result = match &lap_id {
            Some(lap_id) => archive.delete_lap(&session_id, lap_id),
            None => archive.delete(&session_id),
        };

        match result {
            Ok(true) => {
                self.buzz();
                self.set_status(if lap_id.is_some() {
                    "Lap deleted"
                } else {
                    "Session deleted"
                });
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(%e, session = %session_id, "delete failed");
                self.set_status(format!("Delete failed: {e}"));
            }
        }
        self.refresh_history();
    }
}

/// Move an optional cursor over `count` items, clamping at the ends
fn step_cursor(current: Option<usize>, delta: isize, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let next = match current {
        None if delta < 0 => count - 1,
        None => 0,
        Some(i) => i.saturating_add_signed(delta).min(count - 1),
    };
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;
    use crate::clock::ManualClock;
    use crate::error::ArchiveError;
    use crate::haptics::NoHaptics;

    fn app() -> App<ManualClock> {
        App::new(
            Config::default(),
            ManualClock::new(0),
            Some(Box::new(MemoryArchive::new())),
            Box::new(NoHaptics),
        )
    }

    fn press(app: &mut App<ManualClock>, code: KeyCode) {
        app.on_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App<ManualClock>, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn space_toggles_selected_timer() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        assert!(app.registry().get(0).unwrap().is_running());

        app.clock().advance(1_250);
        press(&mut app, KeyCode::Char(' '));
        let sw = app.registry().get(0).unwrap().stopwatch();
        assert!(!sw.is_running());
        assert_eq!(sw.accumulated(), 1_250);
    }

    #[test]
    fn number_keys_select_timer() {
        let mut app = app();
        press(&mut app, KeyCode::Char('3'));
        assert_eq!(app.selected, 2);
        press(&mut app, KeyCode::Char('9'));
        assert_eq!(app.selected, 2);
        press(&mut app, KeyCode::Right);
        assert_eq!(app.selected, 3);
        press(&mut app, KeyCode::Right);
        assert_eq!(app.selected, 0);
        press(&mut app, KeyCode::Left);
        assert_eq!(app.selected, 3);
    }

    #[test]
    fn labelled_lap_uses_confirm_time() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        app.clock().advance(500);
        press(&mut app, KeyCode::Char('L'));
        type_text(&mut app, "turn");
        app.clock().advance(100);
        press(&mut app, KeyCode::Enter);

        let laps = app.registry().get(0).unwrap().stopwatch().laps();
        assert_eq!(laps.len(), 1);
        assert_eq!(laps[0].label, "turn");
        assert_eq!(laps[0].total_time, 600);
        assert!(app.input.is_none());
    }

    #[test]
    fn keys_while_typing_a_label_do_not_control_timers() {
        let mut app = app();
        press(&mut app, KeyCode::Char('L'));
        type_text(&mut app, "q r");
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.input.as_ref().unwrap().buffer, "q ");
        press(&mut app, KeyCode::Esc);
        assert!(app.input.is_none());
        assert!(app.registry().get(0).unwrap().stopwatch().laps().is_empty());
    }

    #[test]
    fn delete_lap_via_cursor() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        app.clock().advance(100);
        press(&mut app, KeyCode::Char('l'));
        app.clock().advance(100);
        press(&mut app, KeyCode::Char('l'));

        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected_lap, Some(0));
        press(&mut app, KeyCode::Char('d'));

        let laps = app.registry().get(0).unwrap().stopwatch().laps();
        assert_eq!(laps.len(), 1);
        assert_eq!(laps[0].label, "Lap 2");
        assert_eq!(app.selected_lap, Some(0));

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.selected_lap, None);
    }

    #[test]
    fn save_appends_to_history_without_touching_timer() {
        let mut app = app();
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.status.as_deref(), Some("Nothing to save yet"));

        press(&mut app, KeyCode::Char(' '));
        app.clock().advance(2_000);
        press(&mut app, KeyCode::Char('S'));
        type_text(&mut app, "tempo");
        press(&mut app, KeyCode::Enter);

        let sessions = app.archive().unwrap().list().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].label, "tempo");
        assert_eq!(sessions[0].total_time, 2_000);
        assert!(app.registry().get(0).unwrap().is_running());
    }

    #[test]
    fn reset_can_archive_first() {
        let config = Config {
            archive_on_reset: true,
            ..Config::default()
        };
        let mut app = App::new(
            config,
            ManualClock::new(0),
            Some(Box::new(MemoryArchive::new())),
            Box::new(NoHaptics),
        );
        press(&mut app, KeyCode::Char(' '));
        app.clock().advance(300);
        press(&mut app, KeyCode::Char('r'));

        assert_eq!(app.archive().unwrap().list().unwrap()[0].total_time, 300);
        assert_eq!(app.registry().get(0).unwrap().stopwatch().accumulated(), 0);
        assert_eq!(app.status.as_deref(), Some("Saved to history"));
    }

    #[test]
    fn reset_keeps_run_when_archiving_fails() {
        let config = Config {
            archive_on_reset: true,
            ..Config::default()
        };
        let mut app = App::new(config, ManualClock::new(0), None, Box::new(NoHaptics));
        press(&mut app, KeyCode::Char(' '));
        app.clock().advance(5_000);
        press(&mut app, KeyCode::Char('r'));

        assert_eq!(
            app.status.as_deref(),
            Some("Not reset: History is unavailable")
        );
        let sw = app.registry().get(0).unwrap().stopwatch();
        assert_eq!(sw.elapsed_time(app.clock().now()), 5_000);
        assert_eq!(sw.session_start(), Some(Timestamp::from_millis(0)));
    }

    #[test]
    fn reset_keeps_run_when_append_errors() {
        struct Broken;
        impl SessionArchive for Broken {
            fn append(
                &mut self,
                _: crate::session::NewSession,
                _: Timestamp,
            ) -> Result<Session, ArchiveError> {
                Err(ArchiveError::Io(std::io::Error::other("disk full")))
            }
            fn delete(&mut self, _: &str) -> Result<bool, ArchiveError> {
                Ok(false)
            }
            fn delete_lap(&mut self, _: &str, _: &str) -> Result<bool, ArchiveError> {
                Ok(false)
            }
            fn list(&self) -> Result<Vec<Session>, ArchiveError> {
                Ok(Vec::new())
            }
            fn get(&self, _: &str) -> Result<Option<Session>, ArchiveError> {
                Ok(None)
            }
            fn clear(&mut self) -> Result<(), ArchiveError> {
                Ok(())
            }
        }

        let config = Config {
            archive_on_reset: true,
            ..Config::default()
        };
        let mut app = App::new(
            config,
            ManualClock::new(0),
            Some(Box::new(Broken)),
            Box::new(NoHaptics),
        );
        press(&mut app, KeyCode::Char(' '));
        app.clock().advance(700);
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char('r'));

        assert!(app.status.as_deref().unwrap().starts_with("Not reset: Save failed"));
        assert_eq!(app.registry().get(0).unwrap().stopwatch().accumulated(), 700);
    }

    #[test]
    fn idle_reset_with_archiving_stays_quiet() {
        let config = Config {
            archive_on_reset: true,
            ..Config::default()
        };
        let mut app = App::new(
            config,
            ManualClock::new(0),
            Some(Box::new(MemoryArchive::new())),
            Box::new(NoHaptics),
        );
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.status, None);
        assert!(app.archive().unwrap().list().unwrap().is_empty());
    }

    #[test]
    fn save_reports_outcome() {
        let mut app = app();
        let at = app.clock().now();
        assert_eq!(app.save_selected("", at), SaveOutcome::NothingToSave);
        assert_eq!(app.status.as_deref(), Some("Nothing to save yet"));

        press(&mut app, KeyCode::Char(' '));
        app.clock().advance(40);
        let at = app.clock().now();
        assert_eq!(app.save_selected("", at), SaveOutcome::Saved);
        assert_eq!(app.status.as_deref(), Some("Saved to history"));
    }

    #[test]
    fn missing_archive_is_reported_not_fatal() {
        let mut app = App::new(
            Config::default(),
            ManualClock::new(0),
            None,
            Box::new(NoHaptics),
        );
        press(&mut app, KeyCode::Char(' '));
        app.clock().advance(10);
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.status.as_deref(), Some("History is unavailable"));
        assert!(app.registry().get(0).unwrap().is_running());
    }

    #[test]
    fn history_deletes_lap_then_session() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        app.clock().advance(100);
        press(&mut app, KeyCode::Char('l'));
        app.clock().advance(100);
        press(&mut app, KeyCode::Char('l'));
        press(&mut app, KeyCode::Char('s'));

        press(&mut app, KeyCode::Char('h'));
        assert_eq!(app.screen, Screen::History);
        assert_eq!(app.history.len(), 1);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.history_lap_cursor, Some(0));
        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.history[0].laps.len(), 1);
        assert_eq!(app.history[0].laps[0].lap_time, 100);

        press(&mut app, KeyCode::Left);
        assert_eq!(app.history_lap_cursor, None);
        press(&mut app, KeyCode::Char('d'));
        assert!(app.history.is_empty());

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.screen, Screen::Timers);
    }

    #[test]
    fn frames_refresh_only_running_timers() {
        let mut app = app();
        assert!(!app.on_frame());
        press(&mut app, KeyCode::Char(' '));
        app.clock().advance(16);
        assert!(app.on_frame());
        assert_eq!(app.registry().get(0).unwrap().display_elapsed(), 16);
    }

    #[test]
    fn ctrl_c_quits_even_while_typing() {
        let mut app = app();
        press(&mut app, KeyCode::Char('L'));
        app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn step_cursor_clamps() {
        assert_eq!(step_cursor(None, 1, 0), None);
        assert_eq!(step_cursor(None, 1, 3), Some(0));
        assert_eq!(step_cursor(None, -1, 3), Some(2));
        assert_eq!(step_cursor(Some(2), 1, 3), Some(2));
        assert_eq!(step_cursor(Some(0), -1, 3), Some(0));
    }
}
