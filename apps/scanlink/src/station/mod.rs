//! # Station Runtime
//!
//! Wires the correlation engine to its inputs and outputs.
//!
//! ```text
//!  barcode input ─► barcode_loop ─┐                 ┌─► ChannelPublisher ─► run_publisher ─► HTTP
//!                                 ├─► CorrelationEngine
//!  rfid input ────► rfid_loop ────┘        ▲        └─► FeedbackController ─► Indicator
//!                                          │
//!                               HTTP API (/scan/*)
//! ```
//!
//! Shutdown is a single `watch` channel flipped by Ctrl+C. The stream loops
//! and the API watch it and stop at their next safe point. The publisher
//! does not: it drains until the engine, its last producer, is dropped, so
//! a submission that finished during shutdown is still published. The
//! indicator is reset to neutral before `run` returns.

pub mod feedback;
pub mod loops;
pub mod publisher;
pub mod sources;

pub use feedback::{FeedbackController, Indicator, IndicatorState, LogIndicator};
pub use loops::{LoopStats, RfidSettings, barcode_loop, rfid_loop};
pub use publisher::{ChannelPublisher, PublishBody, PublishTarget, PublisherStats, run_publisher};
pub use sources::{LineSource, ReadingSource, open_input};

use crate::api::{self, AppState};
use crate::config::StationConfig;
use scanlink_core::{CorrelationEngine, DedupStore, ScanlinkError, Timestamp};
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Wall clock and tokio clock at the first call to [`now`].
static CLOCK_ORIGIN: OnceLock<(Timestamp, tokio::time::Instant)> = OnceLock::new();

/// Arrival time of a reading.
///
/// Anchored to the wall clock once, then advanced by tokio's monotonic
/// clock: a wall-clock step never reorders two readings, and paused test
/// runtimes control the elapsed time.
pub fn now() -> Timestamp {
    let (wall, origin) =
        *CLOCK_ORIGIN.get_or_init(|| (wall_clock(), tokio::time::Instant::now()));
    wall.after(tokio::time::Instant::now().saturating_duration_since(origin))
}

fn wall_clock() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| Timestamp::from_micros(u64::try_from(d.as_micros()).unwrap_or(u64::MAX)))
        .unwrap_or_default()
}

/// Open the dedup store named in `config` and build the engine.
pub fn build_engine(
    config: &StationConfig,
    publisher: ChannelPublisher,
    feedback: FeedbackController,
) -> Result<Arc<CorrelationEngine>, ScanlinkError> {
    let store = DedupStore::open(&config.storage.identifiers_path, &config.storage.links_path)?;
    tracing::info!(
        identifiers = store.identifier_count(),
        links = store.link_count(),
        "Dedup store loaded"
    );
    Ok(Arc::new(CorrelationEngine::new(
        config.engine_config(),
        store,
        Arc::new(publisher),
        Arc::new(feedback),
    )))
}

/// Run a station until Ctrl+C.
pub async fn run(config: StationConfig) -> Result<(), ScanlinkError> {
    // Inputs first: a missing device fails startup before any task runs.
    let barcode_source = match &config.barcode.input {
        Some(path) => Some(open_input(path).await?),
        None => None,
    };
    let rfid_source = match &config.rfid.input {
        Some(path) => Some(open_input(path).await?),
        None => None,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let (publisher, queue) = ChannelPublisher::channel();
    let feedback = FeedbackController::new(
        Arc::new(LogIndicator),
        config.feedback_reset(),
        tokio::runtime::Handle::current(),
    );
    let engine = build_engine(&config, publisher, feedback.clone())?;

    let publisher_task = tokio::spawn(run_publisher(queue, PublishTarget::from(&config.publish)));

    let mut loops: Vec<JoinHandle<LoopStats>> = Vec::new();

    if let Some(source) = barcode_source {
        tracing::info!("Barcode stream started");
        loops.push(tokio::spawn(barcode_loop(
            source,
            Arc::clone(&engine),
            config.repeat_holdoff(),
            shutdown_rx.clone(),
        )));
    } else {
        tracing::info!("Barcode input disabled");
    }

    if let Some(source) = rfid_source {
        tracing::info!(byte_order = ?config.rfid.byte_order, "RFID stream started");
        loops.push(tokio::spawn(rfid_loop(
            source,
            Arc::clone(&engine),
            RfidSettings {
                byte_order: config.rfid.byte_order,
                poll_interval: config.poll_interval(),
                holdoff: config.repeat_holdoff(),
            },
            shutdown_rx.clone(),
        )));
    } else {
        tracing::info!("RFID input disabled");
    }

    let signal_tx = Arc::clone(&shutdown_tx);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown requested"),
            Err(e) => tracing::error!("Cannot listen for Ctrl+C: {}", e),
        }
        let _ = signal_tx.send(true);
    });

    let state = AppState::new(Arc::clone(&engine), feedback.clone(), config.server.clone());
    let served = api::run_server(&config.bind_address(), state, shutdown_rx).await;
    // A server that failed to start takes the rest of the station down.
    let _ = shutdown_tx.send(true);

    for handle in loops {
        if let Err(e) = handle.await {
            tracing::error!("Stream loop failed: {}", e);
        }
    }
    // The engine holds the last publish sender; the publisher stops once
    // its queue is empty.
    drop(engine);
    match publisher_task.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::error!("Publisher failed: {}", e),
        Err(e) => tracing::error!("Publisher task failed: {}", e),
    }
    feedback.shutdown();

    served
}
