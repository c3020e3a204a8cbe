//! # Sinks
//!
//! Outbound interfaces of the engine.
//!
//! The engine calls these after it has released its exclusion domain, so
//! implementations may be slow without stalling the other stream. They
//! should still return quickly: the station implementations only enqueue.

use crate::Outcome;
use std::sync::{Mutex, PoisonError};

/// Receives confirmed new identifiers and new links.
///
/// Delivery is best effort and at-least-once; the engine expects no
/// acknowledgment.
pub trait PublishSink: Send + Sync {
    /// Publish `payload` (a bare identifier or `barcode;rfid`) on `topic`.
    fn publish(&self, topic: &str, payload: &str);
}

/// Drives the local light/sound indicator.
pub trait FeedbackSink: Send + Sync {
    /// Report the outcome of a reading, with a human-readable detail.
    fn notify(&self, outcome: Outcome, detail: &str);
}

/// A published message as captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
}

/// In-memory sink that records every call, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    published: Mutex<Vec<Published>>,
    feedback: Mutex<Vec<(Outcome, String)>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every published message, in order.
    #[must_use]
    pub fn published(&self) -> Vec<Published> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payloads only, in order.
    #[must_use]
    pub fn payloads(&self) -> Vec<String> {
        self.published().into_iter().map(|p| p.payload).collect()
    }

    /// Every feedback notification, in order.
    #[must_use]
    pub fn feedback(&self) -> Vec<(Outcome, String)> {
        self.feedback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of notifications with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.feedback().iter().filter(|(o, _)| *o == outcome).count()
    }
}

impl PublishSink for MemorySink {
    fn publish(&self, topic: &str, payload: &str) {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Published {
                topic: topic.to_string(),
                payload: payload.to_string(),
            });
    }
}

impl FeedbackSink for MemorySink {
    fn notify(&self, outcome: Outcome, detail: &str) {
        self.feedback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((outcome, detail.to_string()));
    }
}
