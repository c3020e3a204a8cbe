//! # Engine Scenario Tests
//!
//! End-to-end behaviour of the correlation engine over real dedup files.
//!
//! ## Groups
//! - Station scenarios (first link, repeat visit, restart)
//! - Matching window
//! - Concurrent producers

use scanlink_core::{
    BarcodeIdentifier, CorrelationEngine, DedupStore, EngineConfig, LinkRecord, MatchOutcome,
    MemorySink, Outcome, PendingSnapshot, RfidUid, Timestamp,
};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

// =============================================================================
// HELPERS
// =============================================================================

fn open_engine(dir: &Path, sink: &Arc<MemorySink>) -> CorrelationEngine {
    let store =
        DedupStore::open(dir.join("barcodes.txt"), dir.join("links.txt")).expect("open store");
    CorrelationEngine::new(EngineConfig::default(), store, sink.clone(), sink.clone())
}

fn uid(s: &str) -> RfidUid {
    RfidUid::parse(s).expect("uid")
}

fn id(s: &str) -> BarcodeIdentifier {
    BarcodeIdentifier::from_digits(s).expect("digits")
}

// =============================================================================
// STATION SCENARIOS
// =============================================================================

mod station {
    use super::*;

    /// A valid barcode followed by a card 1.5 s later forms one link.
    #[test]
    fn first_visit_links_once() {
        let dir = TempDir::new().expect("tempdir");
        let sink = Arc::new(MemorySink::new());
        let engine = open_engine(dir.path(), &sink);

        let scan = engine
            .submit_raw_barcode("S123415003270", Timestamp::from_millis(10_000))
            .expect("barcode");
        assert!(scan.newly_recorded);
        assert_eq!(scan.outcome, MatchOutcome::NoCounterpart);

        let card = engine
            .submit_rfid(uid("04A3F21B"), Timestamp::from_millis(11_500))
            .expect("rfid");

        let expected = LinkRecord::new(id("150032"), uid("04A3F21B"));
        assert_eq!(card.outcome, MatchOutcome::Linked(expected.clone()));

        assert_eq!(
            sink.payloads(),
            vec!["150032".to_string(), "150032;04A3F21B".to_string()]
        );
        assert_eq!(sink.count(Outcome::Success), 1);
        assert_eq!(sink.count(Outcome::Failure), 0);

        assert!(engine.store().seen_identifier("150032"));
        assert!(engine.store().seen_link(&expected));
        assert_eq!(
            engine.pending(Timestamp::from_millis(11_500)),
            PendingSnapshot::default()
        );
    }

    /// The same pair scanned again publishes nothing new.
    #[test]
    fn repeat_visit_publishes_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let sink = Arc::new(MemorySink::new());
        let engine = open_engine(dir.path(), &sink);

        engine
            .submit_raw_barcode("S123415003270", Timestamp::from_millis(10_000))
            .expect("barcode");
        engine
            .submit_rfid(uid("04A3F21B"), Timestamp::from_millis(11_500))
            .expect("rfid");
        let before = sink.published().len();

        let again = engine
            .submit_raw_barcode("S123415003270", Timestamp::from_secs(600))
            .expect("barcode again");
        assert!(!again.newly_recorded);
        let card = engine
            .submit_rfid(uid("04A3F21B"), Timestamp::from_secs(601))
            .expect("rfid again");
        assert!(matches!(card.outcome, MatchOutcome::AlreadyLinked(_)));

        assert_eq!(sink.published().len(), before);
        assert!(engine.store().seen_identifier("150032"));
        assert!(
            engine
                .store()
                .seen_link(&LinkRecord::new(id("150032"), uid("04A3F21B")))
        );
    }

    /// History is reloaded from disk after a restart.
    #[test]
    fn history_survives_restart() {
        let dir = TempDir::new().expect("tempdir");

        {
            let sink = Arc::new(MemorySink::new());
            let engine = open_engine(dir.path(), &sink);
            engine
                .submit_raw_barcode("S123415003270", Timestamp::from_secs(10))
                .expect("barcode");
            engine
                .submit_rfid(uid("04A3F21B"), Timestamp::from_secs(11))
                .expect("rfid");
        }

        let sink = Arc::new(MemorySink::new());
        let engine = open_engine(dir.path(), &sink);
        engine
            .submit_rfid(uid("04A3F21B"), Timestamp::from_secs(100))
            .expect("rfid");
        engine
            .submit_raw_barcode("S123415003270", Timestamp::from_secs(101))
            .expect("barcode");

        assert!(sink.published().is_empty());
        assert_eq!(sink.count(Outcome::Success), 0);
        assert_eq!(engine.store().link_count(), 1);
    }

    /// Rejected payloads only produce failure feedback.
    #[test]
    fn bad_checksum_reports_failure_only() {
        let dir = TempDir::new().expect("tempdir");
        let sink = Arc::new(MemorySink::new());
        let engine = open_engine(dir.path(), &sink);

        engine
            .submit_rfid(uid("04A3F21B"), Timestamp::from_secs(10))
            .expect("rfid");
        assert!(
            engine
                .submit_raw_barcode("S123415003271", Timestamp::from_secs(11))
                .is_err()
        );

        assert!(sink.published().is_empty());
        assert_eq!(sink.count(Outcome::Failure), 1);
        assert_eq!(engine.store().identifier_count(), 0);
        assert!(
            engine
                .pending(Timestamp::from_secs(11))
                .barcode
                .is_none()
        );
    }

    /// A second card replaces the first before the barcode arrives.
    #[test]
    fn latest_card_wins() {
        let dir = TempDir::new().expect("tempdir");
        let sink = Arc::new(MemorySink::new());
        let engine = open_engine(dir.path(), &sink);

        engine
            .submit_rfid(uid("04A3F21B"), Timestamp::from_secs(10))
            .expect("rfid");
        engine
            .submit_rfid(uid("DEADBEEF"), Timestamp::from_secs(11))
            .expect("rfid");
        let scan = engine
            .submit_raw_barcode("S123415003270", Timestamp::from_secs(12))
            .expect("barcode");

        assert_eq!(
            scan.outcome,
            MatchOutcome::Linked(LinkRecord::new(id("150032"), uid("DEADBEEF")))
        );
    }
}

// =============================================================================
// MATCHING WINDOW
// =============================================================================

mod window {
    use super::*;

    #[test]
    fn exactly_three_seconds_matches() {
        let dir = TempDir::new().expect("tempdir");
        let sink = Arc::new(MemorySink::new());
        let engine = open_engine(dir.path(), &sink);

        engine
            .submit_barcode(id("150032"), Timestamp::from_micros(10_000_000))
            .expect("barcode");
        let card = engine
            .submit_rfid(uid("04A3F21B"), Timestamp::from_micros(13_000_000))
            .expect("rfid");

        assert!(matches!(card.outcome, MatchOutcome::Linked(_)));
    }

    #[test]
    fn just_over_three_seconds_does_not_match() {
        let dir = TempDir::new().expect("tempdir");
        let sink = Arc::new(MemorySink::new());
        let engine = open_engine(dir.path(), &sink);

        engine
            .submit_barcode(id("150032"), Timestamp::from_micros(10_000_000))
            .expect("barcode");
        let card = engine
            .submit_rfid(uid("04A3F21B"), Timestamp::from_micros(13_000_100))
            .expect("rfid");

        assert!(matches!(card.outcome, MatchOutcome::OutsideWindow { .. }));
        assert_eq!(sink.count(Outcome::Success), 0);
        let pending = engine.pending(Timestamp::from_micros(13_000_100));
        assert!(pending.barcode.is_some());
        assert!(pending.rfid.is_some());
    }

    #[test]
    fn order_of_arrival_does_not_change_link() {
        let dir_a = TempDir::new().expect("tempdir");
        let dir_b = TempDir::new().expect("tempdir");
        let sink_a = Arc::new(MemorySink::new());
        let sink_b = Arc::new(MemorySink::new());
        let a = open_engine(dir_a.path(), &sink_a);
        let b = open_engine(dir_b.path(), &sink_b);

        a.submit_barcode(id("150032"), Timestamp::from_secs(10))
            .expect("barcode");
        let from_rfid = a
            .submit_rfid(uid("04A3F21B"), Timestamp::from_secs(11))
            .expect("rfid");

        b.submit_rfid(uid("04A3F21B"), Timestamp::from_secs(11))
            .expect("rfid");
        let from_barcode = b
            .submit_barcode(id("150032"), Timestamp::from_secs(10))
            .expect("barcode");

        assert_eq!(from_rfid.outcome, from_barcode.outcome);
        assert_eq!(
            sink_a.payloads().last(),
            Some(&"150032;04A3F21B".to_string())
        );
        assert_eq!(sink_a.payloads().last(), sink_b.payloads().last());
    }
}

// =============================================================================
// CONCURRENT PRODUCERS
// =============================================================================

mod concurrency {
    use super::*;

    /// N concurrent submissions of one new identifier: one winner.
    #[test]
    fn same_identifier_recorded_once() {
        let dir = TempDir::new().expect("tempdir");
        let sink = Arc::new(MemorySink::new());
        let engine = Arc::new(open_engine(dir.path(), &sink));

        let handles: Vec<_> = (0..12u64)
            .map(|i| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    engine
                        .submit_raw_barcode("S123415003270", Timestamp::from_millis(i))
                        .expect("barcode")
                        .newly_recorded
                })
            })
            .collect();

        let results: Vec<bool> = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .collect();

        assert_eq!(results.iter().filter(|&&new| new).count(), 1);
        assert_eq!(results.iter().filter(|&&new| !new).count(), 11);
        assert_eq!(sink.payloads(), vec!["150032".to_string()]);

        let file = std::fs::read_to_string(dir.path().join("barcodes.txt")).expect("read");
        assert_eq!(file, "150032\n");
    }

    /// Two streams hammering the engine still link the pair exactly once.
    #[test]
    fn racing_streams_link_once() {
        let dir = TempDir::new().expect("tempdir");
        let sink = Arc::new(MemorySink::new());
        let engine = Arc::new(open_engine(dir.path(), &sink));

        let barcodes = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..200u64 {
                    engine
                        .submit_barcode(id("150032"), Timestamp::from_millis(10_000 + i))
                        .expect("barcode");
                }
            })
        };
        let cards = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..200u64 {
                    engine
                        .submit_rfid(uid("04A3F21B"), Timestamp::from_millis(10_000 + i))
                        .expect("rfid");
                }
            })
        };

        barcodes.join().expect("join barcodes");
        cards.join().expect("join cards");

        assert_eq!(sink.count(Outcome::Success), 1);
        assert_eq!(
            sink.payloads()
                .iter()
                .filter(|p| p.as_str() == "150032;04A3F21B")
                .count(),
            1
        );
        let links = std::fs::read_to_string(dir.path().join("links.txt")).expect("read");
        assert_eq!(links, "150032;04A3F21B\n");
    }
}
