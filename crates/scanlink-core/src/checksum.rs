//! # Checksum Validator
//!
//! Parses a raw barcode payload and checks its embedded mod-97 digits.
//!
//! ```text
//!   S 1 2 3 4 1 5 0 0 3 2 7 0
//!   └─header──┘└identifier─┘└ck┘
//! ```
//!
//! The identifier may be arbitrarily long; the remainder is folded digit by
//! digit so no integer width limits the accepted payloads.

use crate::primitives::{
    BARCODE_CHECK_LEN, BARCODE_HEADER_LEN, BARCODE_PREFIX, CHECK_MODULUS, MAX_PAYLOAD_LENGTH,
};
use crate::{BarcodeIdentifier, ParseError};

/// Validate a raw payload and extract its identifier.
///
/// Checks, in order: prefix, length, digits, checksum. A mismatch carries
/// the computed remainder for diagnostics.
pub fn validate(raw: &str) -> Result<BarcodeIdentifier, ParseError> {
    if !raw.starts_with(BARCODE_PREFIX) {
        return Err(ParseError::BadPrefix);
    }

    let len = raw.len();
    if len < BARCODE_HEADER_LEN + BARCODE_CHECK_LEN || len > MAX_PAYLOAD_LENGTH {
        return Err(ParseError::BadLength(len));
    }

    // `get` refuses to split inside a multi-byte character.
    let identifier = raw
        .get(BARCODE_HEADER_LEN..len - BARCODE_CHECK_LEN)
        .ok_or(ParseError::NotNumeric)?;
    let check = raw
        .get(len - BARCODE_CHECK_LEN..)
        .ok_or(ParseError::NotNumeric)?;

    let computed = remainder(identifier).ok_or(ParseError::NotNumeric)?;
    let check = check_value(check).ok_or(ParseError::NotNumeric)?;

    if computed != check {
        return Err(ParseError::ChecksumMismatch { check, computed });
    }

    BarcodeIdentifier::from_digits(identifier)
}

/// `digits mod 97`, or `None` if `digits` is empty or not all decimal.
pub fn remainder(digits: &str) -> Option<u32> {
    if digits.is_empty() {
        return None;
    }
    digits.bytes().try_fold(0u32, |acc, b| {
        b.is_ascii_digit()
            .then(|| (acc * 10 + u32::from(b - b'0')) % CHECK_MODULUS)
    })
}

fn check_value(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Check digits for an identifier (zero-padded, two digits).
///
/// Used by the `check` command to show what a rejected code should have
/// ended in.
pub fn check_digits(identifier: &str) -> Option<String> {
    remainder(identifier).map(|r| format!("{:02}", r))
}

// =============================================================================
// TESTS
// =============================================================================
