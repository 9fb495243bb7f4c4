use std::env;
use std::time::Duration;

const DEFAULT_TIMER_POLL: Duration = Duration::from_secs(1);
const DEFAULT_PROGRESS_POLL: Duration = Duration::from_secs(30);
const DEFAULT_ANSWERS_POLL: Duration = Duration::from_secs(10);
const DEFAULT_DISPLAY_TICK: Duration = Duration::from_secs(1);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Cadences and limits of one running session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub timer_poll: Duration,
    pub progress_poll: Duration,
    pub answers_poll: Duration,
    /// How often the local countdown is republished between timer polls.
    pub display_tick: Duration,
    /// Upper bound on every backend call.
    pub call_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timer_poll: DEFAULT_TIMER_POLL,
            progress_poll: DEFAULT_PROGRESS_POLL,
            answers_poll: DEFAULT_ANSWERS_POLL,
            display_tick: DEFAULT_DISPLAY_TICK,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `EXAM_*_MS` variables.
    ///
    /// Missing, unparsable or zero values keep the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map_or(default, Duration::from_millis)
        };
        Self {
            timer_poll: millis("EXAM_TIMER_POLL_MS", DEFAULT_TIMER_POLL),
            progress_poll: millis("EXAM_PROGRESS_POLL_MS", DEFAULT_PROGRESS_POLL),
            answers_poll: millis("EXAM_ANSWERS_POLL_MS", DEFAULT_ANSWERS_POLL),
            display_tick: millis("EXAM_TICK_MS", DEFAULT_DISPLAY_TICK),
            call_timeout: millis("EXAM_CALL_TIMEOUT_MS", DEFAULT_CALL_TIMEOUT),
        }
    }

    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn overrides_apply_and_bad_values_fall_back() {
        let vars: HashMap<&str, &str> = [
            ("EXAM_TIMER_POLL_MS", "250"),
            ("EXAM_PROGRESS_POLL_MS", "0"),
            ("EXAM_ANSWERS_POLL_MS", "soon"),
        ]
        .into_iter()
        .collect();
        let config = SessionConfig::from_lookup(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.timer_poll, Duration::from_millis(250));
        assert_eq!(config.progress_poll, DEFAULT_PROGRESS_POLL);
        assert_eq!(config.answers_poll, DEFAULT_ANSWERS_POLL);
        assert_eq!(config.call_timeout, DEFAULT_CALL_TIMEOUT);
    }
}
