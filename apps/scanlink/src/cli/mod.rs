//! # Scanlink CLI Module
//!
//! This module implements the CLI interface for the station.
//!
//! ## Available Commands
//!
//! - `run` - Start the station (stream loops, publisher, HTTP API)
//! - `check` - Validate a barcode payload offline
//! - `uid` - Format raw reader bytes as a card UID
//! - `status` - Show dedup store counts and recorded links
//! - `config` - Print the effective configuration

mod commands;

use crate::config::StationConfig;
use clap::{Parser, Subcommand, ValueEnum};
use scanlink_core::{ByteOrder, ScanlinkError};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Scanlink - barcode/RFID linking station
///
/// Pairs checksummed barcodes from a camera with RFID card UIDs scanned
/// within a short window, and publishes every new identifier and link once.
#[derive(Parser, Debug)]
#[command(name = "scanlink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the station configuration file
    #[arg(short, long, global = true, default_value = "scanlink.toml")]
    pub config: PathBuf,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// UID byte order as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ByteOrderArg {
    /// Most-significant byte first (reverse of reader order)
    MsbFirst,
    /// Bytes in the order the reader delivered them
    AsRead,
}

impl From<ByteOrderArg> for ByteOrder {
    fn from(arg: ByteOrderArg) -> Self {
        match arg {
            ByteOrderArg::MsbFirst => Self::MsbFirst,
            ByteOrderArg::AsRead => Self::AsRead,
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the station
    Run {
        /// Host to bind the HTTP API to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind the HTTP API to
        #[arg(short, long)]
        port: Option<u16>,

        /// Barcode input (file, FIFO, or "-" for stdin)
        #[arg(long)]
        barcode_input: Option<PathBuf>,

        /// RFID input (file, FIFO, or "-" for stdin)
        #[arg(long)]
        rfid_input: Option<PathBuf>,
    },

    /// Validate a barcode payload
    Check {
        /// Raw payload as decoded by the camera, e.g. S123415003270
        payload: String,
    },

    /// Format raw reader bytes as a card UID
    Uid {
        /// UID bytes in reader order, e.g. "04 A3 F2 1B" or 04A3F21B
        bytes: String,

        /// Byte order (defaults to the configured one)
        #[arg(short, long, value_enum)]
        byte_order: Option<ByteOrderArg>,
    },

    /// Show dedup store counts and recorded links
    Status,

    /// Print the effective configuration (secrets redacted)
    Config,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), ScanlinkError> {
    let mut config = StationConfig::load(&cli.config)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Run {
            host,
            port,
            barcode_input,
            rfid_input,
        }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if barcode_input.is_some() {
                config.barcode.input = barcode_input;
            }
            if rfid_input.is_some() {
                config.rfid.input = rfid_input;
            }
            cmd_run(config).await
        }
        Some(Commands::Check { payload }) => cmd_check(&payload, json_mode),
        Some(Commands::Uid { bytes, byte_order }) => {
            let order = byte_order.map_or(config.rfid.byte_order, ByteOrder::from);
            cmd_uid(&bytes, order, json_mode)
        }
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::Config) => cmd_config(&config, json_mode),
        None => {
            // No subcommand - show status by default
            cmd_status(&config, json_mode)
        }
    }
}
