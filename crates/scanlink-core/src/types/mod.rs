//! # Core Type Definitions
//!
//! This module contains all core types of the scanlink correlation engine:
//! - Reading values (`BarcodeIdentifier`, `RfidUid`, `ByteOrder`)
//! - Time (`Timestamp`, integer microseconds)
//! - Correlation records (`PendingReading`, `LinkRecord`, `Stream`)
//! - Feedback outcome (`Outcome`)
//! - Error types (`ParseError`, `StorageError`, `ScanlinkError`)
//!
//! ## Integer Time
//!
//! All timestamps are integer microseconds since the UNIX epoch. The
//! workspace denies floating-point arithmetic; window comparisons are
//! `Duration` comparisons with microsecond resolution.

use crate::primitives::{LINK_SEPARATOR, MAX_UID_BYTES, MIN_UID_BYTES};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// TIME
// =============================================================================

/// Arrival time of a reading, in microseconds since the UNIX epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp from whole seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000))
    }

    /// Create a timestamp from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000))
    }

    /// Create a timestamp from microseconds.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Get the raw microsecond value.
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Absolute distance between two timestamps.
    #[must_use]
    pub const fn abs_diff(self, other: Self) -> Duration {
        Duration::from_micros(self.0.abs_diff(other.0))
    }

    /// Time elapsed since `earlier`, zero if `earlier` lies in the future.
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    /// Shift the timestamp forward by `duration`.
    #[must_use]
    pub fn after(self, duration: Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

// =============================================================================
// BARCODE IDENTIFIER
// =============================================================================

/// A validated barcode identifier.
///
/// Equality is exact string equality: `"0150032"` and `"150032"` are
/// different identifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BarcodeIdentifier(String);

impl BarcodeIdentifier {
    /// Wrap a digit string without checking a checksum.
    ///
    /// Used for identifiers read back from the persisted record, which were
    /// validated when they were first accepted. Use
    /// [`crate::checksum::validate`] for raw payloads.
    pub fn from_digits(digits: impl Into<String>) -> Result<Self, ParseError> {
        let digits = digits.into();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::NotNumeric);
        }
        Ok(Self(digits))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BarcodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// RFID UID
// =============================================================================

/// Order in which UID bytes are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Most-significant byte first: the reverse of acquisition order.
    #[default]
    MsbFirst,
    /// Bytes in the order the reader delivered them.
    AsRead,
}

/// An RFID card UID as an uppercase hexadecimal string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RfidUid(String);

impl RfidUid {
    /// Format raw UID bytes, as delivered by the reader, into a UID.
    ///
    /// Returns `ScanlinkError::InvalidUid` if the byte count is outside
    /// the range a card can report.
    pub fn from_bytes(bytes: &[u8], order: ByteOrder) -> Result<Self, ScanlinkError> {
        check_uid_len(bytes.len())?;

        let mut hex = String::with_capacity(bytes.len() * 2);
        let mut push = |b: &u8| {
            hex.push(hex_digit(b >> 4));
            hex.push(hex_digit(b & 0x0F));
        };
        match order {
            ByteOrder::MsbFirst => bytes.iter().rev().for_each(&mut push),
            ByteOrder::AsRead => bytes.iter().for_each(&mut push),
        }
        Ok(Self(hex))
    }

    /// Parse an already formatted UID string.
    ///
    /// Lowercase digits are normalized to uppercase. The byte order is
    /// taken as given.
    pub fn parse(s: &str) -> Result<Self, ScanlinkError> {
        let trimmed = s.trim();
        if trimmed.len() % 2 != 0 || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ScanlinkError::InvalidUid(format!(
                "'{}' is not an even-length hex string",
                s
            )));
        }
        check_uid_len(trimmed.len() / 2)?;
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Get the UID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RfidUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a reader line of UID bytes.
///
/// Accepts space-, colon- or dash-separated bytes (`04 A3 F2 1B`,
/// `04:a3:f2:1b`) as well as a contiguous hex run (`04A3F21B`). Bytes are
/// returned in the order they appear in the line.
pub fn parse_uid_bytes(line: &str) -> Result<Vec<u8>, ScanlinkError> {
    let digits: String = line
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | '-' | '\t'))
        .collect();

    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(ScanlinkError::InvalidUid(format!(
            "'{}' does not contain whole hex bytes",
            line.trim()
        )));
    }

    let bytes = digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| {
                    ScanlinkError::InvalidUid(format!("'{}' contains non-hex data", line.trim()))
                })
        })
        .collect::<Result<Vec<u8>, ScanlinkError>>()?;

    check_uid_len(bytes.len())?;
    Ok(bytes)
}

fn check_uid_len(len: usize) -> Result<(), ScanlinkError> {
    if !(MIN_UID_BYTES..=MAX_UID_BYTES).contains(&len) {
        return Err(ScanlinkError::InvalidUid(format!(
            "UID has {} bytes (expected {}..={})",
            len, MIN_UID_BYTES, MAX_UID_BYTES
        )));
    }
    Ok(())
}

const fn hex_digit(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        _ => (b'A' + nibble - 10) as char,
    }
}

// =============================================================================
// CORRELATION RECORDS
// =============================================================================

/// The two input streams of a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Barcode,
    Rfid,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Barcode => f.write_str("barcode"),
            Self::Rfid => f.write_str("rfid"),
        }
    }
}

/// A reading waiting for its counterpart from the other stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReading<T> {
    /// The reading value.
    pub value: T,
    /// When the reading arrived.
    pub observed_at: Timestamp,
}

impl<T> PendingReading<T> {
    /// Create a new pending reading.
    #[must_use]
    pub const fn new(value: T, observed_at: Timestamp) -> Self {
        Self { value, observed_at }
    }
}

/// A confirmed pairing of a barcode identifier with a card UID.
///
/// The barcode is always first; `(A, B)` serializes as `A;B`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkRecord {
    pub barcode: BarcodeIdentifier,
    pub rfid: RfidUid,
}

impl LinkRecord {
    /// Create a new link record.
    #[must_use]
    pub const fn new(barcode: BarcodeIdentifier, rfid: RfidUid) -> Self {
        Self { barcode, rfid }
    }

    /// Serialize as `barcode;rfid`.
    #[must_use]
    pub fn serialize(&self) -> String {
        format!("{}{}{}", self.barcode, LINK_SEPARATOR, self.rfid)
    }

    /// Parse a persisted `barcode;rfid` line.
    pub fn parse(line: &str) -> Result<Self, ScanlinkError> {
        let (barcode, rfid) = line
            .trim()
            .split_once(LINK_SEPARATOR)
            .ok_or_else(|| ScanlinkError::InvalidLink(line.to_string()))?;
        Ok(Self {
            barcode: BarcodeIdentifier::from_digits(barcode)?,
            rfid: RfidUid::parse(rfid)?,
        })
    }
}

impl fmt::Display for LinkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.barcode, LINK_SEPARATOR, self.rfid)
    }
}

// =============================================================================
// FEEDBACK OUTCOME
// =============================================================================

/// Outcome reported to the feedback sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Why a barcode payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The payload does not start with the station prefix.
    #[error("Payload does not start with the required prefix")]
    BadPrefix,

    /// The payload is too short (or too long) to hold header and check digits.
    #[error("Payload length {0} is out of range")]
    BadLength(usize),

    /// Identifier or check digits are empty or not decimal digits.
    #[error("Identifier or check digits are not numeric")]
    NotNumeric,

    /// The check digits do not match the identifier.
    #[error("Checksum mismatch: check {check}, computed {computed}")]
    ChecksumMismatch {
        /// The check value embedded in the payload.
        check: u32,
        /// `identifier mod 97` as computed by the validator.
        computed: u32,
    },
}

/// A durable write to the dedup record failed.
///
/// The value that triggered the failure is NOT recorded in memory.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The record file could not be opened or repaired.
    #[error("Cannot open dedup record {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The record file could not be read at startup.
    #[error("Cannot load dedup record {}: {source}", path.display())]
    Load {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Appending a value failed.
    #[error("Cannot append to dedup record {}: {source}", path.display())]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A value would corrupt the line-based record.
    #[error("Value {0:?} cannot be stored as a single line")]
    InvalidValue(String),
}

/// Errors that can occur in the scanlink system.
///
/// - No silent failures
/// - Use `Result<T, ScanlinkError>` for fallible operations
/// - The CORE should never panic; all errors must be recoverable
#[derive(Debug, Error)]
pub enum ScanlinkError {
    /// A barcode payload failed validation.
    #[error("Invalid barcode: {0}")]
    Parse(#[from] ParseError),

    /// A dedup record could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A card UID could not be parsed or formatted.
    #[error("Invalid UID: {0}")]
    InvalidUid(String),

    /// A persisted link line is malformed.
    #[error("Invalid link record: {0:?}")]
    InvalidLink(String),

    /// The configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred outside the dedup record.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
