use super::config::TelemetryConfig;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Returned by [`init_telemetry`]; hold it for the lifetime of the process.
#[must_use]
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

static TELEMETRY_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber once; later calls only return a guard.
///
/// `RUST_LOG` takes precedence over `config.log_filter`.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    TELEMETRY_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_ansi(config.enable_console_colors);

        // A subscriber installed by the host application wins.
        if tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
        {
            tracing::debug!(service = %config.service_name, "Telemetry initialized");
        }
    });

    TelemetryGuard {
        service_name: config.service_name,
    }
}
