/// Configuration for the telemetry subsystem.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Reported in the startup event.
    pub service_name: String,
    /// Filter used when `RUST_LOG` is unset (e.g. "info", "solana_domain_indexer=debug,warn").
    pub log_filter: String,
    pub enable_console_colors: bool,
    /// Whether to include the target module in output.
    pub show_target: bool,
    pub show_thread_ids: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "solana-domain-indexer".into(),
            log_filter: "info".into(),
            enable_console_colors: true,
            show_target: false,
            show_thread_ids: false,
        }
    }
}

impl TelemetryConfig {
    /// Plain output for redirected or collected logs.
    #[must_use]
    pub fn plain(mut self) -> Self {
        self.enable_console_colors = false;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }
}
