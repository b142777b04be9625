use std::sync::Arc;

use migration_controller::MigrationController;
use migration_observability::MetricsCollector;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub controller: Arc<MigrationController>,
    pub metrics: Arc<MetricsCollector>,
}
