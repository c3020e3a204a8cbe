//! # scanlink
//!
//! The station application around `scanlink-core`: configuration, the
//! stream loops feeding the engine, outbound publishing, the feedback
//! indicator, the HTTP API, and the CLI.

pub mod api;
pub mod cli;
pub mod config;
pub mod station;
