//! Logging helpers on top of `tracing`.
//!
//! Setting `DOMAIN_INDEXER_SILENT` suppresses helper output (startup banner,
//! batch summaries) without touching the subscriber configuration.

const SILENT_VAR: &str = "DOMAIN_INDEXER_SILENT";

/// Log levels for the indexer
#[derive(Clone, Copy, Debug)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

fn silenced() -> bool {
    std::env::var(SILENT_VAR).is_ok()
}

/// Logs a message
pub fn log(level: LogLevel, message: &str) {
    if silenced() {
        return;
    }

    match level {
        LogLevel::Info | LogLevel::Success => tracing::info!("{}", message),
        LogLevel::Warning => tracing::warn!("{}", message),
        LogLevel::Error => tracing::error!("{}", message),
        LogLevel::Debug => tracing::debug!("{}", message),
    }
}

/// Replaces the value of an `api-key=` query parameter with `[REDACTED]`.
pub fn redact_api_key(url: &str) -> String {
    const MARKER: &str = "api-key=";
    match url.find(MARKER) {
        Some(pos) => {
            let before = &url[..pos + MARKER.len()];
            let after = &url[pos + MARKER.len()..];
            let end_pos = after.find('&').unwrap_or(after.len());
            format!("{}[REDACTED]{}", before, &after[end_pos..])
        }
        None => url.to_string(),
    }
}

/// Logs indexer startup information
pub fn log_startup(program_id: &str, rpc_url: &str, poll_interval: u64) {
    if silenced() {
        return;
    }

    tracing::info!(
        program_id = program_id,
        rpc_url = redact_api_key(rpc_url),
        poll_interval_s = poll_interval,
        "Domain indexer startup"
    );
}

/// Logs an accepted registration
pub fn log_registration(signature: &str, name: &str, owner: &str) {
    tracing::info!(
        signature = signature,
        name = name,
        owner = owner,
        "New domain registered"
    );
}

/// Logs batch processing summary
pub fn log_batch(processed: usize, total: usize, duration_ms: u64) {
    if silenced() {
        return;
    }

    if processed > 0 {
        tracing::info!(
            processed = processed,
            total = total,
            duration_ms = duration_ms,
            "Batch processed"
        );
    }
}

/// Logs an error with context
pub fn log_error(context: &str, error: &str) {
    tracing::error!(context = context, error = error, "Indexer error");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_helius_key() {
        assert_eq!(
            redact_api_key("https://mainnet.helius-rpc.com/?api-key=abc123"),
            "https://mainnet.helius-rpc.com/?api-key=[REDACTED]"
        );
        assert_eq!(
            redact_api_key("https://rpc.example/?api-key=abc&cluster=main"),
            "https://rpc.example/?api-key=[REDACTED]&cluster=main"
        );
        assert_eq!(
            redact_api_key("https://api.mainnet-beta.solana.com"),
            "https://api.mainnet-beta.solana.com"
        );
    }
}
