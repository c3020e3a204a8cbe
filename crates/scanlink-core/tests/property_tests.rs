//! # Property-Based Tests
//!
//! Invariants of the checksum, the link record and the matching window.

use scanlink_core::checksum::{check_digits, remainder};
use scanlink_core::{
    BarcodeIdentifier, ByteOrder, Candidate, CorrelationState, LinkRecord, ParseError, RfidUid,
    Timestamp, validate,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(3);

// =============================================================================
// CHECKSUM
// =============================================================================

proptest! {
    /// A payload built with the right check digits always validates to its
    /// identifier.
    #[test]
    fn well_formed_payload_validates(
        header in "[0-9A-Z]{4}",
        identifier in "[0-9]{1,40}",
    ) {
        let check = check_digits(&identifier).expect("digits");
        let raw = format!("S{}{}{}", header, identifier, check);

        let parsed = validate(&raw).expect("valid payload");
        prop_assert_eq!(parsed.as_str(), identifier.as_str());
    }

    /// Any other two-digit trailer is reported as a mismatch carrying the
    /// computed remainder.
    #[test]
    fn wrong_check_digits_rejected(
        identifier in "[0-9]{1,40}",
        check in 0u32..100,
    ) {
        let computed = remainder(&identifier).expect("remainder");
        prop_assume!(check != computed);

        let raw = format!("S1234{}{:02}", identifier, check);
        prop_assert_eq!(
            validate(&raw),
            Err(ParseError::ChecksumMismatch { check, computed })
        );
    }

    /// Validation never panics, whatever the input.
    #[test]
    fn validate_total_on_arbitrary_input(raw in "\\PC{0,200}") {
        let _ = validate(&raw);
    }

    /// Folding digit by digit agrees with plain integer arithmetic where
    /// the value fits.
    #[test]
    fn remainder_matches_integer_modulo(n in 0u64..u64::MAX) {
        let digits = n.to_string();
        prop_assert_eq!(remainder(&digits), Some((n % 97) as u32));
    }
}

// =============================================================================
// LINK RECORD
// =============================================================================

proptest! {
    /// The serialized link is `barcode;uid` no matter which reading came
    /// first.
    #[test]
    fn link_independent_of_arrival_order(
        identifier in "[0-9]{1,20}",
        uid_bytes in vec(any::<u8>(), 4..=10),
        first in 0u64..1_000_000_000,
        gap in 0u64..=3_000_000,
    ) {
        let barcode = BarcodeIdentifier::from_digits(identifier.clone()).expect("digits");
        let uid = RfidUid::from_bytes(&uid_bytes, ByteOrder::AsRead).expect("uid");

        let mut barcode_first = CorrelationState::new();
        barcode_first.set_barcode(barcode.clone(), Timestamp::from_micros(first));
        barcode_first.set_rfid(uid.clone(), Timestamp::from_micros(first + gap));

        let mut rfid_first = CorrelationState::new();
        rfid_first.set_rfid(uid.clone(), Timestamp::from_micros(first));
        rfid_first.set_barcode(barcode.clone(), Timestamp::from_micros(first + gap));

        let expected = LinkRecord::new(barcode, uid);
        prop_assert_eq!(barcode_first.candidate(WINDOW), Candidate::Within(expected.clone()));
        prop_assert_eq!(rfid_first.candidate(WINDOW), Candidate::Within(expected.clone()));
        let prefix = format!("{};", identifier);
        prop_assert!(expected.serialize().starts_with(&prefix));
    }

    /// A serialized link parses back to the same record.
    #[test]
    fn serialized_link_parses(
        identifier in "[0-9]{1,20}",
        uid_bytes in vec(any::<u8>(), 4..=10),
    ) {
        let link = LinkRecord::new(
            BarcodeIdentifier::from_digits(identifier).expect("digits"),
            RfidUid::from_bytes(&uid_bytes, ByteOrder::MsbFirst).expect("uid"),
        );
        prop_assert_eq!(LinkRecord::parse(&link.serialize()).expect("parse"), link);
    }
}

// =============================================================================
// MATCHING WINDOW
// =============================================================================

proptest! {
    /// Gaps up to and including the window match; anything beyond does not.
    #[test]
    fn window_bound_is_inclusive(
        start in 0u64..1_000_000_000,
        gap in 0u64..6_000_000,
    ) {
        let mut state = CorrelationState::new();
        state.set_barcode(
            BarcodeIdentifier::from_digits("150032").expect("digits"),
            Timestamp::from_micros(start),
        );
        state.set_rfid(
            RfidUid::parse("04A3F21B").expect("uid"),
            Timestamp::from_micros(start + gap),
        );

        let within = matches!(state.candidate(WINDOW), Candidate::Within(_));
        prop_assert_eq!(within, gap <= 3_000_000);
    }

    /// UIDs are uppercase hex, two characters per byte.
    #[test]
    fn uid_is_uppercase_hex(bytes in vec(any::<u8>(), 4..=10)) {
        let uid = RfidUid::from_bytes(&bytes, ByteOrder::AsRead).expect("uid");
        prop_assert_eq!(uid.as_str().len(), bytes.len() * 2);
        prop_assert!(uid.as_str().chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    /// MSB-first is the byte-reversal of as-read.
    #[test]
    fn byte_orders_are_mirror_images(bytes in vec(any::<u8>(), 4..=10)) {
        let as_read = RfidUid::from_bytes(&bytes, ByteOrder::AsRead).expect("uid");
        let reversed: Vec<u8> = bytes.iter().rev().copied().collect();
        let msb_first = RfidUid::from_bytes(&reversed, ByteOrder::MsbFirst).expect("uid");
        prop_assert_eq!(as_read, msb_first);
    }
}
