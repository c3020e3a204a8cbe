//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Scan submissions run on the blocking pool: a new identifier or link is
//! fsynced before the engine returns.

use super::{
    AppState,
    types::{
        HealthResponse, LinksResponse, ScanBarcodeRequest, ScanResponse, ScanRfidRequest,
        SeenResponse, StatusResponse,
    },
};
use crate::station::now;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use scanlink_core::{RfidUid, ScanlinkError, Submission};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Dedup counts, pending slots and indicator state.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = &state.engine;
    let response = StatusResponse {
        identifiers: engine.store().identifier_count(),
        links: engine.store().link_count(),
        pending: engine.pending(now()),
        feedback: state.feedback.state(),
        window_ms: engine.config().window.as_millis() as u64,
    };

    (StatusCode::OK, Json(response))
}

// =============================================================================
// SCAN HANDLERS
// =============================================================================

/// HTTP status for a failed submission.
fn error_status(error: &ScanlinkError) -> StatusCode {
    match error {
        ScanlinkError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ScanlinkError::InvalidUid(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(
    result: Result<Result<Submission, ScanlinkError>, tokio::task::JoinError>,
) -> (StatusCode, Json<ScanResponse>) {
    match result {
        Ok(Ok(submission)) => (
            StatusCode::OK,
            Json(ScanResponse::from_submission(&submission)),
        ),
        Ok(Err(e)) => (error_status(&e), Json(ScanResponse::error(e.to_string()))),
        Err(e) => {
            tracing::error!("Engine task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ScanResponse::error("Engine task failed")),
            )
        }
    }
}

/// Submit a raw barcode payload.
pub async fn scan_barcode_handler(
    State(state): State<AppState>,
    Json(request): Json<ScanBarcodeRequest>,
) -> impl IntoResponse {
    let observed_at = now();
    let engine = state.engine.clone();
    let result =
        tokio::task::spawn_blocking(move || engine.submit_raw_barcode(&request.payload, observed_at))
            .await;
    respond(result)
}

/// Submit a formatted card UID.
pub async fn scan_rfid_handler(
    State(state): State<AppState>,
    Json(request): Json<ScanRfidRequest>,
) -> impl IntoResponse {
    let uid = match RfidUid::parse(&request.uid) {
        Ok(uid) => uid,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ScanResponse::error(e.to_string())),
            );
        }
    };

    let observed_at = now();
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.submit_rfid(uid, observed_at)).await;
    respond(result)
}

// =============================================================================
// DEDUP QUERY HANDLERS
// =============================================================================

/// Has this identifier been seen before?
pub async fn seen_handler(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> impl IntoResponse {
    let seen = state.engine.store().seen_identifier(&identifier);
    Json(SeenResponse { identifier, seen })
}

/// All recorded links.
pub async fn links_handler(State(state): State<AppState>) -> impl IntoResponse {
    let links: Vec<String> = state
        .engine
        .store()
        .links()
        .iter()
        .map(|link| link.serialize())
        .collect();
    Json(LinksResponse {
        count: links.len(),
        links,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanlink_core::{ParseError, StorageError};

    #[test]
    fn parse_errors_are_unprocessable() {
        let e = ScanlinkError::Parse(ParseError::BadPrefix);
        assert_eq!(error_status(&e), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn storage_errors_are_internal() {
        let e = ScanlinkError::Storage(StorageError::InvalidValue("x".to_string()));
        assert_eq!(error_status(&e), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_uid_is_bad_request() {
        let e = ScanlinkError::InvalidUid("zz".to_string());
        assert_eq!(error_status(&e), StatusCode::BAD_REQUEST);
    }
}
