//! Prometheus metrics: the RED metrics every `axum` service here carries
//! (request count, error count, duration) plus the business metrics this
//! system has: migrations executed, backups taken/restored, and queue
//! depth.

use std::sync::Arc;

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec, Registry, TextEncoder,
};

const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

pub struct MetricsCollector {
    pub registry: Registry,

    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub http_requests_in_flight: IntGaugeVec,

    pub migrations_executed_total: IntCounterVec,
    pub migration_duration_seconds: HistogramVec,
    pub migrations_rolled_back_total: IntCounterVec,

    pub backups_created_total: IntCounterVec,
    pub backups_restored_total: IntCounterVec,
    pub backups_swept_total: IntCounterVec,

    pub queue_jobs_waiting: IntGaugeVec,
    pub queue_jobs_active: IntGaugeVec,
    pub queue_job_attempts_total: IntCounterVec,

    pub db_query_duration_seconds: HistogramVec,
    pub db_errors_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = register_int_counter_vec!(
            "migration_http_requests_total",
            "Total HTTP requests by method, path, and status",
            &["method", "path", "status"]
        )?;
        let http_request_duration_seconds = register_histogram_vec!(
            "migration_http_request_duration_seconds",
            "HTTP request duration in seconds",
            &["method", "path"],
            DURATION_BUCKETS.to_vec()
        )?;
        let http_requests_in_flight = register_int_gauge_vec!(
            "migration_http_requests_in_flight",
            "Current number of HTTP requests being processed",
            &["method", "path"]
        )?;

        let migrations_executed_total = register_int_counter_vec!(
            "migration_migrations_executed_total",
            "Total primitive schema operations executed, by type and outcome",
            &["migration_type", "success"]
        )?;
        let migration_duration_seconds = register_histogram_vec!(
            "migration_migration_duration_seconds",
            "Time spent inside the DDL Executor's transactional envelope",
            &["migration_type"],
            DURATION_BUCKETS.to_vec()
        )?;
        let migrations_rolled_back_total = register_int_counter_vec!(
            "migration_migrations_rolled_back_total",
            "Total migrations rolled back, by original migration type",
            &["migration_type"]
        )?;

        let backups_created_total = register_int_counter_vec!(
            "migration_backups_created_total",
            "Total data backups taken, by backup type",
            &["backup_type"]
        )?;
        let backups_restored_total = register_int_counter_vec!(
            "migration_backups_restored_total",
            "Total data backups restored",
            &["outcome"]
        )?;
        let backups_swept_total = register_int_counter_vec!(
            "migration_backups_swept_total",
            "Total expired backups deleted by the retention sweeper",
            &["trigger"]
        )?;

        let queue_jobs_waiting = register_int_gauge_vec!(
            "migration_queue_jobs_waiting",
            "Waiting jobs per form",
            &["form_id"]
        )?;
        let queue_jobs_active = register_int_gauge_vec!(
            "migration_queue_jobs_active",
            "Active jobs per form (0 or 1, strict per-form FIFO)",
            &["form_id"]
        )?;
        let queue_job_attempts_total = register_int_counter_vec!(
            "migration_queue_job_attempts_total",
            "Total job execution attempts, by outcome",
            &["outcome"]
        )?;

        let db_query_duration_seconds = register_histogram_vec!(
            "migration_db_query_duration_seconds",
            "Database query duration in seconds",
            &["operation"],
            DURATION_BUCKETS.to_vec()
        )?;
        let db_errors_total = register_int_counter_vec!(
            "migration_db_errors_total",
            "Total database errors, by operation",
            &["operation"]
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(migrations_executed_total.clone()))?;
        registry.register(Box::new(migration_duration_seconds.clone()))?;
        registry.register(Box::new(migrations_rolled_back_total.clone()))?;
        registry.register(Box::new(backups_created_total.clone()))?;
        registry.register(Box::new(backups_restored_total.clone()))?;
        registry.register(Box::new(backups_swept_total.clone()))?;
        registry.register(Box::new(queue_jobs_waiting.clone()))?;
        registry.register(Box::new(queue_jobs_active.clone()))?;
        registry.register(Box::new(queue_job_attempts_total.clone()))?;
        registry.register(Box::new(db_query_duration_seconds.clone()))?;
        registry.register(Box::new(db_errors_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            migrations_executed_total,
            migration_duration_seconds,
            migrations_rolled_back_total,
            backups_created_total,
            backups_restored_total,
            backups_swept_total,
            queue_jobs_waiting,
            queue_jobs_active,
            queue_job_attempts_total,
            db_query_duration_seconds,
            db_errors_total,
        }))
    }

    pub fn metric_count(&self) -> usize {
        self.registry.gather().len()
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_registers_at_least_one_metric_family() {
        let collector = MetricsCollector::new().unwrap();
        assert!(collector.metric_count() > 0);
    }

    #[test]
    fn export_produces_prometheus_text_format() {
        let collector = MetricsCollector::new().unwrap();
        collector
            .migrations_executed_total
            .with_label_values(&["ADD_COLUMN", "true"])
            .inc();
        let exported = collector.export().unwrap();
        assert!(exported.contains("migration_migrations_executed_total"));
    }
}
