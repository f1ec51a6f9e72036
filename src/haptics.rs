use std::io::{self, Write};

/// Default pulse length for a button press, in milliseconds
pub const DEFAULT_PATTERN_MS: u64 = 15;

/// Best-effort tactile/audible feedback. Never fails; returns whether the
/// request was accepted.
pub trait Haptics {
    fn trigger(&mut self, pattern: &[u64]) -> bool;
}

/// No feedback channel available
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn trigger(&mut self, _pattern: &[u64]) -> bool {
        false
    }
}

/// Rings the terminal bell, the nearest thing a terminal has to a vibration
/// motor. The pattern only decides whether to ring: an empty or all-zero
/// pattern is a no-op.
#[derive(Debug)]
pub struct TerminalBell<W: Write> {
    out: W,
}

impl TerminalBell<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> TerminalBell<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Haptics for TerminalBell<W> {
    fn trigger(&mut self, pattern: &[u64]) -> bool {
        if pattern.iter().all(|&ms| ms == 0) {
            return false;
        }

        match self.out.write_all(b"\x07").and_then(|_| self.out.flush()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%e, "haptic feedback failed");
                false
            }
        }
    }
}
