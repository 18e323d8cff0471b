//! Shared building blocks for the `gummy` workspace.
//!
//! * [`model`]: the canonical host/port records exchanged between the parser,
//!   the store and the orchestrator.
//! * [`config`]: the TOML backed runtime configuration.
//! * [`network`]: target specifications and LAN detection.

pub mod config;
pub mod model;
pub mod network;
