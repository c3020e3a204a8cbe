//! # scanlink-core
//!
//! The correlation engine of a scanlink station - THE LOGIC.
//!
//! A station watches two independent streams: barcodes decoded from a
//! camera and card UIDs from an RFID reader. This crate decides when a
//! barcode and a card belong to the same physical event, remembers what it
//! has already seen, and tells the outside world about new identifiers and
//! new links.
//!
//! ## Pipeline
//!
//! ```text
//!  raw payload ──► checksum::validate ──┐
//!                                       ├─► CorrelationEngine ⇄ DedupStore
//!  reader bytes ──► RfidUid::from_bytes ┘          │
//!                                                  ├─► PublishSink
//!                                                  └─► FeedbackSink
//! ```
//!
//! ## Architectural Constraints
//!
//! - Synchronous: the app decides where blocking calls run
//! - Time is an input: every submission carries its own `Timestamp`
//! - No ambient state: store and sinks are passed in at construction
//! - No floating point: all window arithmetic is integer microseconds

// =============================================================================
// MODULES
// =============================================================================

pub mod checksum;
pub mod correlation;
pub mod dedup;
pub mod engine;
pub mod primitives;
pub mod repeat;
pub mod sinks;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BarcodeIdentifier, ByteOrder, LinkRecord, Outcome, ParseError, PendingReading, RfidUid,
    ScanlinkError, StorageError, Stream, Timestamp, parse_uid_bytes,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use checksum::validate;
pub use correlation::{Candidate, CorrelationState, PendingSnapshot};
pub use dedup::{DedupLog, DedupStore};
pub use engine::{CorrelationEngine, EngineConfig, MatchOutcome, Submission};
pub use repeat::RepeatFilter;
pub use sinks::{FeedbackSink, MemorySink, PublishSink, Published};
