use crate::clock::Millis;
use std::fmt;

/// A duration broken down for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedTime {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub centiseconds: i64,
    /// `SS`, `MM:SS` or `HH:MM:SS`
    pub main_text: String,
    /// Two-digit centiseconds
    pub sub_text: String,
}

impl fmt::Display for FormattedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.main_text, self.sub_text)
    }
}

/// Hours and minutes are only shown once they are non-zero, except that a
/// zero duration reads `00:00`. Negative durations display as zero.
pub fn format_duration(ms: Millis) -> FormattedTime {
    let ms = ms.max(0);

    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let centiseconds = (ms % 1000) / 10;

    let mut main_text = format!("{seconds:02}");
    if minutes > 0 || hours > 0 || ms == 0 {
        main_text = format!("{minutes:02}:{main_text}");
    }
    if hours > 0 {
        main_text = format!("{hours:02}:{main_text}");
    }

    FormattedTime {
        hours,
        minutes,
        seconds,
        centiseconds,
        main_text,
        sub_text: format!("{centiseconds:02}"),
    }
}

/// Lap splits can be negative after deletions; keep the sign visible
pub fn format_signed(ms: Millis) -> String {
    if ms < 0 {
        format!("-{}", format_duration(-ms))
    } else {
        format_duration(ms).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_shows_minutes() {
        let t = format_duration(0);
        assert_eq!(t.main_text, "00:00");
        assert_eq!(t.sub_text, "00");
    }

    #[test]
    fn hours_minutes_seconds() {
        let t = format_duration(3_661_000);
        assert_eq!(t.main_text, "01:01:01");
        assert_eq!(t.sub_text, "00");
        assert_eq!((t.hours, t.minutes, t.seconds), (1, 1, 1));
    }

    #[test]
    fn under_a_minute_shows_seconds_only() {
        let t = format_duration(12_345);
        assert_eq!(t.main_text, "12");
        assert_eq!(t.sub_text, "34");
        assert_eq!(t.to_string(), "12.34");
    }

    #[test]
    fn sub_second_is_not_zero_duration() {
        let t = format_duration(90);
        assert_eq!(t.main_text, "00");
        assert_eq!(t.sub_text, "09");
    }

    #[test]
    fn hour_with_zero_minutes_keeps_minutes_field() {
        let t = format_duration(3_600_000 + 5_000);
        assert_eq!(t.main_text, "01:00:05");
    }

    #[test]
    fn minutes_and_seconds() {
        assert_eq!(format_duration(61_990).to_string(), "01:01.99");
    }

    #[test]
    fn negative_clamps_to_zero() {
        assert_eq!(format_duration(-500), format_duration(0));
    }

    #[test]
    fn signed_keeps_minus() {
        assert_eq!(format_signed(-1_500), "-01.50");
        assert_eq!(format_signed(1_500), "01.50");
    }
}
