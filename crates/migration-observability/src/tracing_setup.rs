//! `tracing-subscriber` initialization: `EnvFilter` + JSON-or-pretty `fmt`
//! layer. No OpenTelemetry/Jaeger/tonic exporter wiring — this system has
//! no collector to export spans to (see DESIGN.md).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// How the process should format its log output.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub json_logs: bool,
    pub log_level: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "migration-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()),
            json_logs: std::env::var("JSON_LOGS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

/// Installs the global `tracing` subscriber. Call once, at process start.
pub fn init_tracing(config: &TracingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = Registry::default().with(env_filter);

    if config.json_logs {
        let fmt_layer = fmt::layer()
            .json()
            .with_thread_ids(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        registry.with(fmt_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(true);
        registry.with(fmt_layer).init();
    }

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = %config.environment,
        "tracing initialized"
    );
}

/// Correlation-id helpers: generic over the transport, so this crate
/// stays free of an `axum` dependency — `migration-server` pulls the
/// header value and passes it in as a plain `Option<&str>`.
pub mod correlation {
    use uuid::Uuid;

    pub fn generate() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn get_or_generate(header_value: Option<&str>) -> String {
        header_value.map(str::to_string).unwrap_or_else(generate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_picks_a_service_name_and_a_log_level() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name, "migration-core");
        assert!(!config.log_level.is_empty());
    }

    #[test]
    fn correlation_ids_are_unique_and_valid_uuids() {
        let a = correlation::generate();
        let b = correlation::generate();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn an_existing_header_value_is_reused_instead_of_generated() {
        assert_eq!(correlation::get_or_generate(Some("existing-id")), "existing-id");
    }
}
