//! # Correlation Engine
//!
//! Turns validated readings from two concurrent streams into links.
//!
//! ## Exclusion Domain
//!
//! One `Mutex` guards both pending slots. It is held across:
//! 1. expiry of stale readings (if configured)
//! 2. the slot update
//! 3. the match decision and `record_link`
//!
//! and released before any sink is called, so a slow publisher or indicator
//! never blocks the other stream. `record_link` is the linearization point:
//! of two submissions that race onto the same pair, only one sees a new link.
//!
//! ## Failure Handling
//!
//! - Rejected payload: Failure feedback, no state change.
//! - Storage failure: Failure feedback, no publish, slots left in place so
//!   the next natural submission retries.

use crate::correlation::{Candidate, CorrelationState, PendingSnapshot};
use crate::dedup::DedupStore;
use crate::primitives::{DEFAULT_MATCH_WINDOW, DEFAULT_TOPIC};
use crate::sinks::{FeedbackSink, PublishSink};
use crate::{
    BarcodeIdentifier, LinkRecord, Outcome, RfidUid, ScanlinkError, StorageError, Stream,
    Timestamp, checksum,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Construction-time parameters of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum gap between the two readings of a link (inclusive).
    pub window: Duration,
    /// Age after which a pending reading is dropped. `None` keeps readings
    /// until they are matched or overwritten.
    pub pending_expiry: Option<Duration>,
    /// Topic for published identifiers and links.
    pub topic: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_MATCH_WINDOW,
            pending_expiry: None,
            topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

// =============================================================================
// SUBMISSION REPORT
// =============================================================================

/// What the match attempt of a submission concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The other slot is empty.
    NoCounterpart,
    /// The other slot holds a reading too far away in time.
    OutsideWindow { gap: Duration },
    /// A new link was recorded and published.
    Linked(LinkRecord),
    /// The pair was linked before; slots were cleared, nothing published.
    AlreadyLinked(LinkRecord),
}

/// Report of one accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Stream the reading came from.
    pub stream: Stream,
    /// The barcode identifier was seen for the first time (always `false`
    /// for RFID readings).
    pub newly_recorded: bool,
    /// Result of the match attempt.
    pub outcome: MatchOutcome,
}

// =============================================================================
// ENGINE
// =============================================================================

/// Correlates barcode and RFID readings into deduplicated links.
///
/// Shared between producers behind an `Arc`; every method takes `&self`.
pub struct CorrelationEngine {
    config: EngineConfig,
    state: Mutex<CorrelationState>,
    store: DedupStore,
    publisher: Arc<dyn PublishSink>,
    feedback: Arc<dyn FeedbackSink>,
}

impl std::fmt::Debug for CorrelationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationEngine")
            .field("config", &self.config)
            .field("identifiers", &self.store.identifier_count())
            .field("links", &self.store.link_count())
            .finish()
    }
}

impl CorrelationEngine {
    /// Create an engine over an opened dedup store.
    pub fn new(
        config: EngineConfig,
        store: DedupStore,
        publisher: Arc<dyn PublishSink>,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        Self {
            config,
            state: Mutex::new(CorrelationState::new()),
            store,
            publisher,
            feedback,
        }
    }

    /// Validate a raw barcode payload and submit its identifier.
    ///
    /// A rejected payload is reported to the feedback sink and returned as
    /// `ScanlinkError::Parse`; it never touches the pending slots.
    pub fn submit_raw_barcode(
        &self,
        raw: &str,
        now: Timestamp,
    ) -> Result<Submission, ScanlinkError> {
        match checksum::validate(raw) {
            Ok(identifier) => self.submit_barcode(identifier, now),
            Err(e) => {
                self.feedback
                    .notify(Outcome::Failure, &format!("{} rejected: {}", raw, e));
                Err(e.into())
            }
        }
    }

    /// Submit a validated barcode identifier observed at `now`.
    pub fn submit_barcode(
        &self,
        identifier: BarcodeIdentifier,
        now: Timestamp,
    ) -> Result<Submission, ScanlinkError> {
        let newly_recorded = if self.store.seen_identifier(identifier.as_str()) {
            false
        } else {
            self.store
                .record_identifier(identifier.as_str())
                .map_err(|e| self.storage_failure(e))?
        };

        if newly_recorded {
            self.publisher
                .publish(&self.config.topic, identifier.as_str());
        }

        let outcome = self.update_and_match(now, |state| state.set_barcode(identifier, now))?;

        Ok(Submission {
            stream: Stream::Barcode,
            newly_recorded,
            outcome,
        })
    }

    /// Submit a card UID observed at `now`.
    ///
    /// UIDs are accepted as they are; there is no validation step.
    pub fn submit_rfid(&self, uid: RfidUid, now: Timestamp) -> Result<Submission, ScanlinkError> {
        let outcome = self.update_and_match(now, |state| state.set_rfid(uid, now))?;

        Ok(Submission {
            stream: Stream::Rfid,
            newly_recorded: false,
            outcome,
        })
    }

    /// Both pending slots as of `now` (stale readings are purged first).
    pub fn pending(&self, now: Timestamp) -> PendingSnapshot {
        let mut state = self.lock_state();
        if let Some(max_age) = self.config.pending_expiry {
            state.expire(now, max_age);
        }
        state.snapshot()
    }

    /// The dedup store backing this engine.
    #[must_use]
    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Update a slot and attempt a match inside the exclusion domain, then
    /// dispatch to the sinks outside it.
    fn update_and_match(
        &self,
        now: Timestamp,
        update: impl FnOnce(&mut CorrelationState),
    ) -> Result<MatchOutcome, ScanlinkError> {
        let decided = {
            let mut state = self.lock_state();

            if let Some(max_age) = self.config.pending_expiry {
                state.expire(now, max_age);
            }
            update(&mut state);

            match state.candidate(self.config.window) {
                Candidate::Incomplete => Ok(MatchOutcome::NoCounterpart),
                Candidate::OutsideWindow { gap } => Ok(MatchOutcome::OutsideWindow { gap }),
                Candidate::Within(link) => match self.store.record_link(&link) {
                    Ok(true) => {
                        state.clear();
                        Ok(MatchOutcome::Linked(link))
                    }
                    Ok(false) => {
                        state.clear();
                        Ok(MatchOutcome::AlreadyLinked(link))
                    }
                    // Slots stay filled: the next submission retries.
                    Err(e) => Err(e),
                },
            }
        };

        let outcome = decided.map_err(|e| self.storage_failure(e))?;

        if let MatchOutcome::Linked(link) = &outcome {
            let payload = link.serialize();
            self.publisher.publish(&self.config.topic, &payload);
            self.feedback
                .notify(Outcome::Success, &format!("linked {}", payload));
        }

        Ok(outcome)
    }

    fn storage_failure(&self, error: StorageError) -> ScanlinkError {
        self.feedback
            .notify(Outcome::Failure, &format!("storage failure: {}", error));
        ScanlinkError::Storage(error)
    }

    fn lock_state(&self) -> MutexGuard<'_, CorrelationState> {
        // Slot updates are single assignments; a poisoned lock still holds
        // a coherent pair.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// TESTS
// =============================================================================
