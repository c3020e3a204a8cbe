//! # Repeat Filter
//!
//! A camera decodes the same code on every frame and a reader reports the
//! same card on every poll. The filter tells a fresh sighting apart from a
//! repeat: an identical value that keeps arriving within the hold-off.
//! Once a value has been absent for longer than the hold-off it is fresh
//! again.
//!
//! A repeat is still a reading. The station hands it to the engine so the
//! pending slot keeps the time of the latest sighting; the filter only
//! spares repeats of a rejected payload from repeated failure feedback.

use crate::Timestamp;
use std::time::Duration;

/// Classifies one stream's readings as fresh or repeated.
#[derive(Debug, Clone)]
pub struct RepeatFilter {
    holdoff: Duration,
    last: Option<(String, Timestamp)>,
}

impl RepeatFilter {
    /// Create a filter. A zero hold-off admits everything.
    #[must_use]
    pub fn new(holdoff: Duration) -> Self {
        Self {
            holdoff,
            last: None,
        }
    }

    /// Decide whether `value`, seen at `now`, is a fresh reading.
    ///
    /// Every sighting refreshes the hold-off, so a code held in front of
    /// the camera counts as a repeat for as long as it is visible.
    pub fn admit(&mut self, value: &str, now: Timestamp) -> bool {
        let repeat = self.last.as_ref().is_some_and(|(last, seen_at)| {
            last.as_str() == value && now.saturating_duration_since(*seen_at) <= self.holdoff
        });

        let refreshed = match self.last.as_mut() {
            Some((last, seen_at)) if last.as_str() == value => {
                *seen_at = now;
                true
            }
            _ => false,
        };
        if !refreshed {
            self.last = Some((value.to_string(), now));
        }

        self.holdoff.is_zero() || !repeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn first_sighting_admitted() {
        let mut filter = RepeatFilter::new(Duration::from_secs(2));
        assert!(filter.admit("S123415003270", at(0)));
    }

    #[test]
    fn continuous_repeats_suppressed() {
        let mut filter = RepeatFilter::new(Duration::from_secs(2));
        assert!(filter.admit("A", at(0)));
        // Seen every frame for ten seconds.
        for ms in (100..10_000).step_by(100) {
            assert!(!filter.admit("A", at(ms)));
        }
    }

    #[test]
    fn value_admitted_again_after_absence() {
        let mut filter = RepeatFilter::new(Duration::from_secs(2));
        assert!(filter.admit("A", at(0)));
        assert!(filter.admit("A", at(2_001)));
    }

    #[test]
    fn different_value_admitted_immediately() {
        let mut filter = RepeatFilter::new(Duration::from_secs(2));
        assert!(filter.admit("A", at(0)));
        assert!(filter.admit("B", at(10)));
        assert!(filter.admit("A", at(20)));
    }

    #[test]
    fn zero_holdoff_admits_everything() {
        let mut filter = RepeatFilter::new(Duration::ZERO);
        assert!(filter.admit("A", at(0)));
        assert!(filter.admit("A", at(0)));
    }
}
