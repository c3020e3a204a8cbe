//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::StationConfig;
use crate::station;
use scanlink_core::checksum::{check_digits, validate};
use scanlink_core::primitives::{BARCODE_CHECK_LEN, BARCODE_HEADER_LEN};
use scanlink_core::{ByteOrder, DedupStore, ParseError, RfidUid, ScanlinkError, parse_uid_bytes};

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Start the station.
pub async fn cmd_run(config: StationConfig) -> Result<(), ScanlinkError> {
    println!("Scanlink Station Starting...");
    println!();
    println!("Configuration:");
    println!("  API:          {}", config.bind_address());
    println!("  Window:       {} ms", config.matching.window_ms);
    println!("  Identifiers:  {}", config.storage.identifiers_path.display());
    println!("  Links:        {}", config.storage.links_path.display());
    println!(
        "  Publish:      {} (topic {})",
        config.publish.url.as_deref().unwrap_or("log only"),
        config.publish.topic
    );
    println!(
        "  Barcode in:   {}",
        config
            .barcode
            .input
            .as_ref()
            .map_or_else(|| "disabled".to_string(), |p| p.display().to_string())
    );
    println!(
        "  RFID in:      {}",
        config
            .rfid
            .input
            .as_ref()
            .map_or_else(|| "disabled".to_string(), |p| p.display().to_string())
    );
    println!();
    println!("Endpoints:");
    println!("  POST /scan/barcode    - Submit a barcode payload");
    println!("  POST /scan/rfid       - Submit a card UID");
    println!("  GET  /seen/{{id}}       - Identifier membership");
    println!("  GET  /links           - Recorded links");
    println!("  GET  /status          - Station status");
    println!("  GET  /health          - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    station::run(config).await
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Validate a barcode payload without touching the dedup store.
pub fn cmd_check(payload: &str, json_mode: bool) -> Result<(), ScanlinkError> {
    match validate(payload) {
        Ok(identifier) => {
            if json_mode {
                print_json(&serde_json::json!({
                    "valid": true,
                    "identifier": identifier.as_str(),
                }));
            } else {
                println!("Valid: identifier {}", identifier);
            }
            Ok(())
        }
        Err(e) => {
            let expected = expected_check_digits(payload, &e);
            if json_mode {
                print_json(&serde_json::json!({
                    "valid": false,
                    "error": e.to_string(),
                    "expected_check": expected,
                }));
            } else {
                println!("Invalid: {}", e);
                if let Some(expected) = &expected {
                    println!("Expected check digits: {}", expected);
                }
            }
            Err(e.into())
        }
    }
}

/// The check digits a mismatching payload should have ended in.
fn expected_check_digits(payload: &str, error: &ParseError) -> Option<String> {
    if !matches!(error, ParseError::ChecksumMismatch { .. }) {
        return None;
    }
    let end = payload.len().checked_sub(BARCODE_CHECK_LEN)?;
    payload
        .get(BARCODE_HEADER_LEN..end)
        .and_then(check_digits)
}

// =============================================================================
// UID COMMAND
// =============================================================================

/// Format reader bytes as a UID.
pub fn cmd_uid(bytes: &str, order: ByteOrder, json_mode: bool) -> Result<(), ScanlinkError> {
    let raw = parse_uid_bytes(bytes)?;
    let uid = RfidUid::from_bytes(&raw, order)?;

    if json_mode {
        print_json(&serde_json::json!({
            "uid": uid.as_str(),
            "byte_order": order,
            "bytes": raw.len(),
        }));
    } else {
        println!("{}", uid);
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show dedup store counts and recorded links.
pub fn cmd_status(config: &StationConfig, json_mode: bool) -> Result<(), ScanlinkError> {
    let store = DedupStore::open(&config.storage.identifiers_path, &config.storage.links_path)?;
    let links: Vec<String> = store.links().iter().map(|l| l.serialize()).collect();

    if json_mode {
        print_json(&serde_json::json!({
            "identifiers_path": config.storage.identifiers_path.to_string_lossy(),
            "links_path": config.storage.links_path.to_string_lossy(),
            "identifiers": store.identifier_count(),
            "links": store.link_count(),
            "recorded_links": links,
        }));
        return Ok(());
    }

    println!("Scanlink Station Status");
    println!("=======================");
    println!("Identifiers file: {}", config.storage.identifiers_path.display());
    println!("Links file:       {}", config.storage.links_path.display());
    println!();
    println!("Identifiers: {}", store.identifier_count());
    println!("Links:       {}", store.link_count());
    if !links.is_empty() {
        println!();
        for link in &links {
            println!("  {}", link);
        }
    }

    Ok(())
}

// =============================================================================
// CONFIG COMMAND
// =============================================================================

/// Print the effective configuration, secrets redacted.
pub fn cmd_config(config: &StationConfig, json_mode: bool) -> Result<(), ScanlinkError> {
    let redacted = config.redacted();
    if json_mode {
        let value = serde_json::to_value(&redacted)
            .map_err(|e| ScanlinkError::Config(format!("Cannot render config: {}", e)))?;
        print_json(&value);
    } else {
        print!("{}", redacted.to_toml()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_digits_only_for_mismatch() {
        let mismatch = validate("S123415003271").expect_err("mismatch");
        assert_eq!(
            expected_check_digits("S123415003271", &mismatch),
            Some("70".to_string())
        );

        let prefix = validate("X123415003270").expect_err("prefix");
        assert_eq!(expected_check_digits("X123415003270", &prefix), None);
    }

    #[test]
    fn check_rejects_bad_payload() {
        assert!(cmd_check("S123415003270", true).is_ok());
        assert!(matches!(
            cmd_check("S123415003271", true),
            Err(ScanlinkError::Parse(_))
        ));
    }

    #[test]
    fn uid_rejects_short_input() {
        assert!(cmd_uid("04 A3", ByteOrder::MsbFirst, true).is_err());
        assert!(cmd_uid("04 A3 F2 1B", ByteOrder::AsRead, true).is_ok());
    }
}
