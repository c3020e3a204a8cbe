//! # Stream Loops
//!
//! One long-lived task per input stream. Each loop reads raw readings from
//! its source and submits them to the shared engine on tokio's blocking
//! pool. Repeats of a held code or card are submitted too, so the pending
//! slot always carries the time of the latest sighting.
//!
//! Both loops stop when their source is exhausted or the shutdown signal
//! flips, whichever comes first. A reading already handed to the engine is
//! always completed.

use super::now;
use super::sources::ReadingSource;
use scanlink_core::{
    ByteOrder, CorrelationEngine, MatchOutcome, RepeatFilter, RfidUid, ScanlinkError, Submission,
    checksum, parse_uid_bytes,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Back-off after a failed read on an event-driven source.
const READ_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Counters reported when a loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Fresh readings handed to the engine.
    pub submitted: u64,
    /// Repeats that refreshed their pending slot.
    pub refreshed: u64,
    /// Repeats of a rejected payload, dropped without feedback.
    pub suppressed: u64,
    /// Readings that failed parsing (checksum, bad UID bytes).
    pub rejected: u64,
    /// Submissions that failed in storage or on the blocking pool.
    pub failed: u64,
    /// Transient source read errors.
    pub read_errors: u64,
}

/// Settings of the RFID poll loop.
#[derive(Debug, Clone, Copy)]
pub struct RfidSettings {
    pub byte_order: ByteOrder,
    pub poll_interval: Duration,
    pub holdoff: Duration,
}

enum Next {
    Reading(String),
    Idle,
    Stop,
}

/// Wait for the next reading or for shutdown.
async fn next<S: ReadingSource>(
    source: &mut S,
    shutdown: &mut watch::Receiver<bool>,
    stats: &mut LoopStats,
    stream: &'static str,
) -> Next {
    if *shutdown.borrow() {
        return Next::Stop;
    }
    tokio::select! {
        biased;
        _ = shutdown.changed() => Next::Stop,
        reading = source.next_reading() => match reading {
            Ok(Some(raw)) => Next::Reading(raw),
            Ok(None) => {
                tracing::info!(stream, "Input closed");
                Next::Stop
            }
            Err(e) => {
                stats.read_errors += 1;
                tracing::warn!(stream, "Read failed: {}", e);
                Next::Idle
            }
        },
    }
}

/// Sleep for `delay` unless shutdown comes first. Returns `false` on shutdown.
async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.changed() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

fn log_submission(submission: &Submission) {
    match &submission.outcome {
        MatchOutcome::NoCounterpart => {
            tracing::debug!(stream = %submission.stream, "Waiting for counterpart");
        }
        MatchOutcome::OutsideWindow { gap } => {
            tracing::debug!(
                stream = %submission.stream,
                gap_ms = gap.as_millis() as u64,
                "Counterpart outside window"
            );
        }
        MatchOutcome::Linked(link) => tracing::info!(link = %link, "Linked"),
        MatchOutcome::AlreadyLinked(link) => tracing::info!(link = %link, "Already linked"),
    }
}

/// Record the result of one engine call.
fn account(
    stats: &mut LoopStats,
    fresh: bool,
    result: Result<Result<Submission, ScanlinkError>, tokio::task::JoinError>,
) {
    match result {
        Ok(Ok(submission)) => {
            if fresh {
                stats.submitted += 1;
            } else {
                stats.refreshed += 1;
            }
            log_submission(&submission);
        }
        Ok(Err(ScanlinkError::Parse(e))) => {
            stats.rejected += 1;
            tracing::warn!("Barcode rejected: {}", e);
        }
        Ok(Err(e)) => {
            stats.failed += 1;
            tracing::error!("Submission failed: {}", e);
        }
        Err(e) => {
            stats.failed += 1;
            tracing::error!("Engine task failed: {}", e);
        }
    }
}

// =============================================================================
// BARCODE LOOP
// =============================================================================

/// Run the barcode stream until its source ends or shutdown.
///
/// Driven by input availability: the loop waits on the source and does no
/// polling of its own.
pub async fn barcode_loop<S: ReadingSource>(
    mut source: S,
    engine: Arc<CorrelationEngine>,
    holdoff: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> LoopStats {
    let mut stats = LoopStats::default();
    let mut filter = RepeatFilter::new(holdoff);

    loop {
        let raw = match next(&mut source, &mut shutdown, &mut stats, "barcode").await {
            Next::Reading(raw) => raw,
            Next::Idle => {
                if pause(READ_RETRY_DELAY, &mut shutdown).await {
                    continue;
                }
                break;
            }
            Next::Stop => break,
        };

        let observed_at = now();
        let engine = Arc::clone(&engine);
        if filter.admit(&raw, observed_at) {
            let result =
                tokio::task::spawn_blocking(move || engine.submit_raw_barcode(&raw, observed_at))
                    .await;
            account(&mut stats, true, result);
            continue;
        }

        // A rejected code held in front of the camera was reported once.
        match checksum::validate(&raw) {
            Ok(identifier) => {
                let result = tokio::task::spawn_blocking(move || {
                    engine.submit_barcode(identifier, observed_at)
                })
                .await;
                account(&mut stats, false, result);
            }
            Err(_) => stats.suppressed += 1,
        }
    }

    tracing::info!(?stats, "Barcode loop stopped");
    stats
}

// =============================================================================
// RFID LOOP
// =============================================================================

/// Run the RFID stream until its source ends or shutdown.
///
/// Sleeps `poll_interval` between polls, like a reader that is asked for a
/// card a few times per second.
pub async fn rfid_loop<S: ReadingSource>(
    mut source: S,
    engine: Arc<CorrelationEngine>,
    settings: RfidSettings,
    mut shutdown: watch::Receiver<bool>,
) -> LoopStats {
    let mut stats = LoopStats::default();
    let mut filter = RepeatFilter::new(settings.holdoff);

    loop {
        match next(&mut source, &mut shutdown, &mut stats, "rfid").await {
            Next::Reading(line) => {
                let parsed = parse_uid_bytes(&line)
                    .and_then(|bytes| RfidUid::from_bytes(&bytes, settings.byte_order));
                match parsed {
                    Ok(uid) => {
                        let observed_at = now();
                        let fresh = filter.admit(uid.as_str(), observed_at);
                        let engine = Arc::clone(&engine);
                        let result = tokio::task::spawn_blocking(move || {
                            engine.submit_rfid(uid, observed_at)
                        })
                        .await;
                        account(&mut stats, fresh, result);
                    }
                    Err(e) => {
                        stats.rejected += 1;
                        tracing::warn!("Unreadable card: {}", e);
                    }
                }
            }
            Next::Idle => {}
            Next::Stop => break,
        }

        if !pause(settings.poll_interval, &mut shutdown).await {
            break;
        }
    }

    tracing::info!(?stats, "RFID loop stopped");
    stats
}
