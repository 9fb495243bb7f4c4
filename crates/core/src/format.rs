/// How close the countdown is to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUrgency {
    Normal,
    Warning,
    Critical,
}

impl TimeUrgency {
    #[must_use]
    pub fn for_remaining(seconds: u64) -> Self {
        if seconds < 300 {
            TimeUrgency::Critical
        } else if seconds < 900 {
            TimeUrgency::Warning
        } else {
            TimeUrgency::Normal
        }
    }
}

/// `1h 2m 3s`, `2m 3s` or `3s`.
#[must_use]
pub fn format_time_spent(seconds: u64) -> String {
    let (hours, minutes, secs) = split(seconds);
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// `H:MM:SS` once an hour is involved, `M:SS` otherwise.
#[must_use]
pub fn format_clock(seconds: u64) -> String {
    let (hours, minutes, secs) = split(seconds);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[must_use]
pub fn time_remaining_text(seconds: u64) -> String {
    if seconds == 0 {
        return "Time's up!".to_string();
    }
    let minutes = seconds / 60;
    let secs = seconds % 60;
    if minutes > 0 {
        format!("{minutes}:{secs:02}")
    } else {
        format!("{secs}s")
    }
}

fn split(seconds: u64) -> (u64, u64, u64) {
    (seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_spent_drops_empty_units() {
        assert_eq!(format_time_spent(3723), "1h 2m 3s");
        assert_eq!(format_time_spent(123), "2m 3s");
        assert_eq!(format_time_spent(3), "3s");
    }

    #[test]
    fn clock_pads_minutes_and_seconds() {
        assert_eq!(format_clock(3723), "1:02:03");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(time_remaining_text(0), "Time's up!");
        assert_eq!(time_remaining_text(42), "42s");
    }

    #[test]
    fn urgency_thresholds() {
        assert_eq!(TimeUrgency::for_remaining(299), TimeUrgency::Critical);
        assert_eq!(TimeUrgency::for_remaining(300), TimeUrgency::Warning);
        assert_eq!(TimeUrgency::for_remaining(900), TimeUrgency::Normal);
    }
}
