//! # Station Primitives
//!
//! Hardcoded constants of the barcode format, the matching rules and the
//! persisted record layout.
//!
//! Everything here is compiled into the binary. Values that a deployment
//! may tune (window, paths, cadence) have a runtime counterpart in the
//! station configuration; these constants are only their defaults.

use std::time::Duration;

// =============================================================================
// BARCODE PAYLOAD LAYOUT
// =============================================================================

/// Required first character of every barcode payload.
pub const BARCODE_PREFIX: char = 'S';

/// Length of the fixed header (prefix + 4 unused characters).
///
/// The identifier starts right after the header.
pub const BARCODE_HEADER_LEN: usize = 5;

/// Length of the trailing check digits.
pub const BARCODE_CHECK_LEN: usize = 2;

/// Modulus of the embedded check digits.
pub const CHECK_MODULUS: u32 = 97;

/// Maximum accepted payload length.
///
/// Anything longer is not a station barcode and is rejected before parsing.
pub const MAX_PAYLOAD_LENGTH: usize = 128;

// =============================================================================
// RFID UID LAYOUT
// =============================================================================

/// Smallest UID the reader can report (single size, 4 bytes).
pub const MIN_UID_BYTES: usize = 4;

/// Largest UID the reader can report (triple size, 10 bytes).
pub const MAX_UID_BYTES: usize = 10;

// =============================================================================
// MATCHING
// =============================================================================

/// Default matching window in milliseconds (inclusive bound).
pub const DEFAULT_WINDOW_MS: u64 = 3_000;

/// Default matching window.
pub const DEFAULT_MATCH_WINDOW: Duration = Duration::from_millis(DEFAULT_WINDOW_MS);

/// Default cadence of the RFID poll loop in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Default delay before the feedback indicator falls back to neutral.
pub const DEFAULT_FEEDBACK_RESET_MS: u64 = 3_000;

/// Default topic for published identifiers and links.
pub const DEFAULT_TOPIC: &str = "studenten";

// =============================================================================
// PERSISTED RECORDS
// =============================================================================

/// Separator between barcode and UID in a serialized link.
pub const LINK_SEPARATOR: char = ';';

/// Default file holding every identifier seen so far.
pub const DEFAULT_IDENTIFIERS_FILE: &str = "barcodes.txt";

/// Default file holding every link recorded so far.
pub const DEFAULT_LINKS_FILE: &str = "barcode_rfid_links.txt";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_trailer_fit_minimum_payload() {
        assert_eq!(BARCODE_HEADER_LEN + BARCODE_CHECK_LEN, 7);
        assert!(MAX_PAYLOAD_LENGTH > BARCODE_HEADER_LEN + BARCODE_CHECK_LEN);
    }

    #[test]
    fn default_window_is_three_seconds() {
        assert_eq!(DEFAULT_MATCH_WINDOW, Duration::from_secs(3));
    }
}
