//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use crate::station::IndicatorState;
use scanlink_core::{MatchOutcome, PendingSnapshot, Stream, Submission};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Station status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub identifiers: usize,
    pub links: usize,
    pub pending: PendingSnapshot,
    pub feedback: IndicatorState,
    pub window_ms: u64,
}

// =============================================================================
// SCAN REQUESTS/RESPONSE
// =============================================================================

/// Barcode submission: the raw decoded payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanBarcodeRequest {
    pub payload: String,
}

/// Card submission: an already formatted hex UID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRfidRequest {
    pub uid: String,
}

/// Result of a scan submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<Stream>,
    pub newly_recorded: bool,
    /// `no_counterpart`, `outside_window`, `linked` or `already_linked`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResponse {
    /// Build a response from an engine submission report.
    pub fn from_submission(submission: &Submission) -> Self {
        let (outcome, link, gap_ms) = match &submission.outcome {
            MatchOutcome::NoCounterpart => ("no_counterpart", None, None),
            MatchOutcome::OutsideWindow { gap } => {
                ("outside_window", None, Some(gap.as_millis() as u64))
            }
            MatchOutcome::Linked(link) => ("linked", Some(link.serialize()), None),
            MatchOutcome::AlreadyLinked(link) => ("already_linked", Some(link.serialize()), None),
        };
        Self {
            success: true,
            stream: Some(submission.stream),
            newly_recorded: submission.newly_recorded,
            outcome: Some(outcome.to_string()),
            link,
            gap_ms,
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            stream: None,
            newly_recorded: false,
            outcome: None,
            link: None,
            gap_ms: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// DEDUP QUERIES
// =============================================================================

/// Membership of one identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenResponse {
    pub identifier: String,
    pub seen: bool,
}

/// Every recorded link, serialized as `barcode;rfid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksResponse {
    pub count: usize,
    pub links: Vec<String>,
}
