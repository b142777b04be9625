//! Structured logging and metrics setup for the migration platform: a
//! `tracing_subscriber::Registry` + `EnvFilter` + fmt-layer stack, a
//! correlation-id helper, and a `prometheus` metrics collector. No OTLP
//! exporter or trace-context propagation — this system exposes HTTP/JSON
//! only and has no collector to export spans to (see DESIGN.md).

pub mod logging;
pub mod metrics;
pub mod tracing_setup;

pub use logging::{LogContext, ModuleLogLevels};
pub use metrics::MetricsCollector;
pub use tracing_setup::{correlation, init_tracing, TracingConfig};
