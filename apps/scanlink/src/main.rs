//! # Scanlink - Barcode/RFID Linking Station
//!
//! The main binary of a scanlink station.
//!
//! This application provides:
//! - Station runtime (camera + reader stream loops)
//! - HTTP REST API server (axum-based)
//! - CLI interface for offline checks and status
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     apps/scanlink (THE BINARY)                  │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐    │
//! │  │   CLI       │    │   HTTP API  │    │  Stream loops    │    │
//! │  │  (clap)     │    │   (axum)    │    │  publisher, LEDs │    │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘    │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                    ┌───────────────┐                           │
//! │                    │ scanlink-core │                           │
//! │                    │  (THE LOGIC)  │                           │
//! │                    └───────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the station
//! scanlink run --barcode-input /run/scanlink/camera.fifo --rfid-input /dev/ttyUSB0
//!
//! # Offline tools
//! scanlink check S123415003270
//! scanlink uid "04 A3 F2 1B" --byte-order as-read
//! scanlink status
//! ```

use clap::Parser;
use scanlink::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // SCANLINK_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("SCANLINK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scanlink=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ┌─┐┌─┐┌─┐┌┐┌┬  ┬┌┐┌┬┌─
  └─┐│  ├─┤│││││  ││││├┴┐
  └─┘└─┘┴ ┴┘└┘┴─┘┴┘└┘┴ ┴

  Barcode/RFID Linking Station v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
