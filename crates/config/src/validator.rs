use crate::config::Config;
use log::{error, info, warn};

pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

pub const VALID_LIVENESS_MODES: &[&str] = &["always", "probed"];

pub fn validate(config: &Config) -> bool {
    info!("Starting configuration validation...");

    // --- Validate Log level ---
    if !VALID_LOG_LEVELS
        .iter()
        .any(|lvl| lvl.eq_ignore_ascii_case(&config.log.level))
    {
        error!("Invalid log level: {}", config.log.level);
        return false;
    }

    // --- Validate liveness mode ---
    if !VALID_LIVENESS_MODES
        .iter()
        .any(|mode| mode.eq_ignore_ascii_case(&config.liveness))
    {
        error!("Invalid liveness mode: {}", config.liveness);
        return false;
    }

    // --- Validate listen address ---
    if config.listen.address.is_empty() {
        error!("Listen address is empty");
        return false;
    }

    // --- Validate listen port ---
    if config.listen.port == 0 {
        error!("Invalid listen port: 0 (must be between 1 and 65535)");
        return false;
    }

    if config.max_inflight == 0 {
        error!("max_inflight must be at least 1");
        return false;
    }

    // --- Validate backends ---
    // An empty pool is legal: every request is answered with 503.
    if config.backends.is_empty() {
        warn!("No backends configured, every request will be rejected");
    }

    for (position, backend) in config.backends.iter().enumerate() {
        if backend.address().trim().is_empty() {
            error!("Backend address is missing at position {}", position);
            return false;
        }
    }

    // --- Validate health checks ---
    if config.is_probed() {
        let health = &config.health_check;

        if health.interval == 0 {
            error!("Health check interval is invalid (0)");
            return false;
        }

        if health.timeout_ms == 0 {
            error!("Health check timeout is invalid (0)");
            return false;
        }

        if health.failure_threshold == 0 {
            error!("Health check failure threshold is invalid (0)");
            return false;
        }

        if health.success_threshold == 0 {
            error!("Health check success threshold is invalid (0)");
            return false;
        }
    }

    info!("Configuration validation passed successfully");

    true
}
