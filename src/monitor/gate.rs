//! Duplicate suppression for recognised codes.

use std::time::{Duration, Instant};

/// The last code that was typed and when.
///
/// Only the most recent code is remembered: a new code always goes
/// through, and typing it replaces the previous one.
#[derive(Debug, Default, Clone)]
pub struct TriggerState {
    last: Option<(String, Instant)>,
}

impl TriggerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `code`, seen at `now`, should be typed.
    ///
    /// False only when it equals the last typed code and less than
    /// `cooldown` has passed since then.
    pub fn should_trigger(&self, code: &str, now: Instant, cooldown: Duration) -> bool {
        match &self.last {
            Some((last_code, at)) if last_code == code => {
                now.saturating_duration_since(*at) >= cooldown
            }
            _ => true,
        }
    }

    /// Remembers that `code` was typed at `now`.
    pub fn record(&mut self, code: &str, now: Instant) {
        self.last = Some((code.to_string(), now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(1);

    #[test]
    fn test_first_code_always_triggers() {
        let state = TriggerState::new();
        assert!(state.should_trigger("1234", Instant::now(), COOLDOWN));
    }

    #[test]
    fn test_same_code_within_cooldown_is_suppressed() {
        let t0 = Instant::now();
        let mut state = TriggerState::new();
        state.record("1234", t0);

        assert!(!state.should_trigger("1234", t0, COOLDOWN));
        assert!(!state.should_trigger("1234", t0 + Duration::from_millis(200), COOLDOWN));
        assert!(!state.should_trigger("1234", t0 + Duration::from_millis(999), COOLDOWN));
    }

    #[test]
    fn test_same_code_after_cooldown_triggers() {
        let t0 = Instant::now();
        let mut state = TriggerState::new();
        state.record("1234", t0);

        assert!(state.should_trigger("1234", t0 + COOLDOWN, COOLDOWN));
        assert!(state.should_trigger("1234", t0 + Duration::from_secs(5), COOLDOWN));
    }

    #[test]
    fn test_different_code_ignores_cooldown() {
        let t0 = Instant::now();
        let mut state = TriggerState::new();
        state.record("1234", t0);

        assert!(state.should_trigger("5678", t0, COOLDOWN));
        assert!(state.should_trigger("123", t0 + Duration::from_millis(1), COOLDOWN));
    }

    #[test]
    fn test_zero_cooldown_never_suppresses() {
        let t0 = Instant::now();
        let mut state = TriggerState::new();
        state.record("1234", t0);

        assert!(state.should_trigger("1234", t0, Duration::ZERO));
    }

    #[test]
    fn test_record_replaces_previous_code() {
        let t0 = Instant::now();
        let mut state = TriggerState::new();
        state.record("1234", t0);
        state.record("5678", t0 + Duration::from_millis(10));

        assert!(!state.should_trigger("5678", t0 + Duration::from_millis(20), COOLDOWN));
        // The old code is forgotten, so it goes through again immediately
        assert!(state.should_trigger("1234", t0 + Duration::from_millis(20), COOLDOWN));
    }

    #[test]
    fn test_clock_earlier_than_record_counts_as_no_time_elapsed() {
        let t0 = Instant::now() + Duration::from_secs(10);
        let mut state = TriggerState::new();
        state.record("1234", t0);

        assert!(!state.should_trigger("1234", t0 - Duration::from_secs(1), COOLDOWN));
    }
}
