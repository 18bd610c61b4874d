//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full directive
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to include worker thread ids in log lines
    pub thread_ids: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "zk-prover".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            thread_ids: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ZK_SERVICE_NAME`: Service name (default: zk-prover)
    /// - `ZK_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `ZK_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `ZK_JSON_LOGS`: Enable JSON logs (default: false outside containers)
    /// - `ZK_THREAD_IDS`: Include thread ids (default: false)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("ZK_SERVICE_NAME").unwrap_or_else(|_| "zk-prover".to_string()),

            log_level: env::var("ZK_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("ZK_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v, true))
                .unwrap_or(true),

            json_logs: env::var("ZK_JSON_LOGS")
                .map(|v| parse_flag(&v, false))
                .unwrap_or(is_container),

            thread_ids: env::var("ZK_THREAD_IDS")
                .map(|v| parse_flag(&v, false))
                .unwrap_or(false),
        }
    }

    /// Builder-style method to set the log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Builder-style method to switch JSON output
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Parse a boolean-ish environment flag; unknown spellings fall back to `default`.
pub fn parse_flag(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "zk-prover");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_builder_methods() {
        let config = TelemetryConfig::default()
            .with_log_level("zk_pool=debug")
            .with_json_logs(true);
        assert_eq!(config.log_level, "zk_pool=debug");
        assert!(config.json_logs);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE", false));
        assert!(parse_flag("1", false));
        assert!(!parse_flag("off", true));
        assert!(parse_flag("maybe", true));
    }
}
