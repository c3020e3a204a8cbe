//! # Correlation State
//!
//! The two pending slots of a station and the pure match decision.
//!
//! This type has no lock of its own. The [`crate::engine::CorrelationEngine`]
//! owns it behind its single exclusion domain; everything here is plain
//! `&mut self` logic so it can be tested without threads.

use crate::{BarcodeIdentifier, LinkRecord, PendingReading, RfidUid, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of comparing the two pending slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// At least one slot is empty.
    Incomplete,
    /// Both slots are filled but too far apart; the slots stay as they are.
    OutsideWindow { gap: Duration },
    /// Both slots are filled within the window.
    Within(LinkRecord),
}

/// Read-only copy of both slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSnapshot {
    pub barcode: Option<PendingReading<BarcodeIdentifier>>,
    pub rfid: Option<PendingReading<RfidUid>>,
}

/// Last unconfirmed reading of each stream.
#[derive(Debug, Clone, Default)]
pub struct CorrelationState {
    pending_barcode: Option<PendingReading<BarcodeIdentifier>>,
    pending_rfid: Option<PendingReading<RfidUid>>,
}

impl CorrelationState {
    /// Create a state with both slots empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a barcode in its slot, replacing any older one.
    pub fn set_barcode(&mut self, identifier: BarcodeIdentifier, observed_at: Timestamp) {
        self.pending_barcode = Some(PendingReading::new(identifier, observed_at));
    }

    /// Put a UID in its slot, replacing any older one.
    pub fn set_rfid(&mut self, uid: RfidUid, observed_at: Timestamp) {
        self.pending_rfid = Some(PendingReading::new(uid, observed_at));
    }

    /// Decide whether the two slots form a link.
    ///
    /// The window bound is inclusive: a gap equal to `window` matches.
    #[must_use]
    pub fn candidate(&self, window: Duration) -> Candidate {
        let (Some(barcode), Some(rfid)) = (&self.pending_barcode, &self.pending_rfid) else {
            return Candidate::Incomplete;
        };

        let gap = barcode.observed_at.abs_diff(rfid.observed_at);
        if gap > window {
            return Candidate::OutsideWindow { gap };
        }

        Candidate::Within(LinkRecord::new(barcode.value.clone(), rfid.value.clone()))
    }

    /// Empty both slots.
    pub fn clear(&mut self) {
        self.pending_barcode = None;
        self.pending_rfid = None;
    }

    /// Drop readings older than `max_age` at `now`.
    pub fn expire(&mut self, now: Timestamp, max_age: Duration) {
        let stale = |observed_at: Timestamp| now.saturating_duration_since(observed_at) > max_age;

        if self
            .pending_barcode
            .as_ref()
            .is_some_and(|p| stale(p.observed_at))
        {
            self.pending_barcode = None;
        }
        if self.pending_rfid.as_ref().is_some_and(|p| stale(p.observed_at)) {
            self.pending_rfid = None;
        }
    }

    /// Copy both slots.
    #[must_use]
    pub fn snapshot(&self) -> PendingSnapshot {
        PendingSnapshot {
            barcode: self.pending_barcode.clone(),
            rfid: self.pending_rfid.clone(),
        }
    }

    /// Check whether both slots are empty.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending_barcode.is_none() && self.pending_rfid.is_none()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(3);

    fn barcode(s: &str) -> BarcodeIdentifier {
        BarcodeIdentifier::from_digits(s).expect("digits")
    }

    fn uid(s: &str) -> RfidUid {
        RfidUid::parse(s).expect("uid")
    }

    #[test]
    fn empty_state_is_incomplete() {
        let state = CorrelationState::new();
        assert!(state.is_idle());
        assert_eq!(state.candidate(WINDOW), Candidate::Incomplete);
    }

    #[test]
    fn single_slot_is_incomplete() {
        let mut state = CorrelationState::new();
        state.set_barcode(barcode("150032"), Timestamp::from_secs(10));
        assert_eq!(state.candidate(WINDOW), Candidate::Incomplete);
    }

    #[test]
    fn readings_within_window_form_candidate() {
        let mut state = CorrelationState::new();
        state.set_barcode(barcode("150032"), Timestamp::from_millis(10_000));
        state.set_rfid(uid("04A3F21B"), Timestamp::from_millis(11_500));

        match state.candidate(WINDOW) {
            Candidate::Within(link) => assert_eq!(link.serialize(), "150032;04A3F21B"),
            other => unreachable!("expected a candidate, got {:?}", other),
        }
    }

    #[test]
    fn window_bound_is_inclusive() {
        let mut state = CorrelationState::new();
        state.set_barcode(barcode("150032"), Timestamp::from_micros(10_000_000));
        state.set_rfid(uid("04A3F21B"), Timestamp::from_micros(13_000_000));
        assert!(matches!(state.candidate(WINDOW), Candidate::Within(_)));

        state.set_rfid(uid("04A3F21B"), Timestamp::from_micros(13_000_100));
        assert_eq!(
            state.candidate(WINDOW),
            Candidate::OutsideWindow {
                gap: Duration::from_micros(3_000_100)
            }
        );
    }

    #[test]
    fn newer_reading_overwrites_slot() {
        let mut state = CorrelationState::new();
        state.set_rfid(uid("04A3F21B"), Timestamp::from_secs(1));
        state.set_rfid(uid("DEADBEEF"), Timestamp::from_secs(50));
        state.set_barcode(barcode("150032"), Timestamp::from_secs(51));

        match state.candidate(WINDOW) {
            Candidate::Within(link) => assert_eq!(link.rfid.as_str(), "DEADBEEF"),
            other => unreachable!("expected a candidate, got {:?}", other),
        }
    }

    #[test]
    fn outside_window_leaves_slots_filled() {
        let mut state = CorrelationState::new();
        state.set_barcode(barcode("150032"), Timestamp::from_secs(0));
        state.set_rfid(uid("04A3F21B"), Timestamp::from_secs(100));

        assert!(matches!(
            state.candidate(WINDOW),
            Candidate::OutsideWindow { .. }
        ));
        let snapshot = state.snapshot();
        assert!(snapshot.barcode.is_some());
        assert!(snapshot.rfid.is_some());
    }

    #[test]
    fn expire_drops_only_stale_slots() {
        let mut state = CorrelationState::new();
        state.set_barcode(barcode("150032"), Timestamp::from_secs(0));
        state.set_rfid(uid("04A3F21B"), Timestamp::from_secs(25));

        state.expire(Timestamp::from_secs(31), Duration::from_secs(30));

        let snapshot = state.snapshot();
        assert!(snapshot.barcode.is_none());
        assert!(snapshot.rfid.is_some());
    }

    #[test]
    fn clear_empties_both_slots() {
        let mut state = CorrelationState::new();
        state.set_barcode(barcode("150032"), Timestamp::from_secs(1));
        state.set_rfid(uid("04A3F21B"), Timestamp::from_secs(2));
        state.clear();
        assert!(state.is_idle());
    }
}
