//! # Feedback Controller
//!
//! Drives the station's light and buzzer from engine outcomes.
//!
//! Every outcome switches the indicator immediately and schedules a reset
//! to neutral after a fixed delay. A later outcome aborts the pending
//! reset and schedules its own, so the indicator always shows the most
//! recent outcome for the full delay.

use scanlink_core::{FeedbackSink, Outcome};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Buzzer tone on success.
pub const SUCCESS_TONE: Duration = Duration::from_millis(400);

/// Buzzer tone on failure.
pub const FAILURE_TONE: Duration = Duration::from_millis(150);

/// What the indicator currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorState {
    Neutral,
    Success,
    Failure,
}

impl From<Outcome> for IndicatorState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self::Success,
            Outcome::Failure => Self::Failure,
        }
    }
}

/// Physical (or simulated) light/sound output.
pub trait Indicator: Send + Sync {
    fn show(&self, state: IndicatorState);
}

/// Indicator that logs what a station light and buzzer would do.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn show(&self, state: IndicatorState) {
        match state {
            IndicatorState::Neutral => tracing::debug!(light = "off", "Indicator reset"),
            IndicatorState::Success => tracing::info!(
                light = "green",
                tone_ms = SUCCESS_TONE.as_millis() as u64,
                "Indicator: success"
            ),
            IndicatorState::Failure => tracing::info!(
                light = "red",
                tone_ms = FAILURE_TONE.as_millis() as u64,
                "Indicator: failure"
            ),
        }
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

struct Shared {
    indicator: Arc<dyn Indicator>,
    reset_after: Duration,
    runtime: Handle,
    state: Mutex<ControllerState>,
}

struct ControllerState {
    current: IndicatorState,
    last_detail: Option<String>,
    generation: u64,
    pending_reset: Option<JoinHandle<()>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset_if_current(&self, generation: u64) {
        let mut state = self.lock();
        // An outcome that arrived after this reset was scheduled owns the
        // indicator now.
        if state.generation == generation {
            state.current = IndicatorState::Neutral;
            state.pending_reset = None;
            self.indicator.show(IndicatorState::Neutral);
        }
    }
}

/// [`FeedbackSink`] with a timed auto-reset.
///
/// Cheap to clone; all clones drive the same indicator. `notify` may be
/// called from any thread, including tokio's blocking pool.
#[derive(Clone)]
pub struct FeedbackController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for FeedbackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackController")
            .field("state", &self.state())
            .field("reset_after", &self.shared.reset_after)
            .finish()
    }
}

impl FeedbackController {
    /// Create a controller whose reset timers run on `runtime`.
    pub fn new(indicator: Arc<dyn Indicator>, reset_after: Duration, runtime: Handle) -> Self {
        indicator.show(IndicatorState::Neutral);
        Self {
            shared: Arc::new(Shared {
                indicator,
                reset_after,
                runtime,
                state: Mutex::new(ControllerState {
                    current: IndicatorState::Neutral,
                    last_detail: None,
                    generation: 0,
                    pending_reset: None,
                }),
            }),
        }
    }

    /// What the indicator shows right now.
    pub fn state(&self) -> IndicatorState {
        self.shared.lock().current
    }

    /// Detail of the most recent outcome, if any.
    pub fn last_detail(&self) -> Option<String> {
        self.shared.lock().last_detail.clone()
    }

    /// Cancel any pending reset and switch the indicator off.
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        if let Some(task) = state.pending_reset.take() {
            task.abort();
        }
        state.generation = state.generation.wrapping_add(1);
        state.current = IndicatorState::Neutral;
        self.shared.indicator.show(IndicatorState::Neutral);
    }
}

impl FeedbackSink for FeedbackController {
    fn notify(&self, outcome: Outcome, detail: &str) {
        let shown = IndicatorState::from(outcome);
        let mut state = self.shared.lock();

        if let Some(task) = state.pending_reset.take() {
            task.abort();
        }
        state.generation = state.generation.wrapping_add(1);
        state.current = shown;
        state.last_detail = Some(detail.to_string());
        self.shared.indicator.show(shown);

        let generation = state.generation;
        let shared = Arc::clone(&self.shared);
        state.pending_reset = Some(self.shared.runtime.spawn(async move {
            tokio::time::sleep(shared.reset_after).await;
            shared.reset_if_current(generation);
        }));

        match outcome {
            Outcome::Success => tracing::info!(detail, "Feedback: success"),
            Outcome::Failure => tracing::warn!(detail, "Feedback: failure"),
        }
    }
}
