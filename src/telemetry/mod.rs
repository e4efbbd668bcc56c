//! Tracing subscriber setup for the binary and embedding applications.

pub mod config;
pub mod subscriber;

pub use config::TelemetryConfig;
pub use subscriber::{init_telemetry, TelemetryGuard};
