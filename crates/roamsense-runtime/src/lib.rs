//! `roamsense-runtime` – process wiring.
//!
//! # Modules
//!
//! - [`config`] – TOML configuration at `~/.roamsense/config.toml` with
//!   `ROAMSENSE_*` environment overrides.
//! - [`stack`] – [`PerceptionStack`][stack::PerceptionStack]: builds,
//!   starts and stops the configured providers and reports a combined
//!   [`StackStatus`][stack::StackStatus].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP span export.

pub mod config;
pub mod stack;
pub mod telemetry;

pub use config::Config;
pub use stack::{PerceptionStack, StackStatus};
