//! The durable job representation: explicit `attempts`/`next_run_at`
//! columns instead of an opaque queue library object.

use chrono::{DateTime, Duration, Utc};
use migration_engine::SchemaOperation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a queued job does once claimed: either a primitive schema
/// operation, or a restore of a previously captured backup. A restore is
/// enqueued on the same per-form queue as any other migration, so it is
/// strictly ordered after whatever else is already waiting for that
/// form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobAction {
    Migrate(SchemaOperation),
    Restore { backup_id: Uuid },
}

/// A form's queued unit of work, executed in order by that form's worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub action: JobAction,
    pub requested_by: String,
}

/// lifecycle: `waiting -> active -> (completed|failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => JobStatus::Active,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Waiting,
        }
    }
}

/// A row in the durable `migration_jobs` table.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub form_id: Uuid,
    pub action: JobAction,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// exponential backoff starting at 2s, doubling, capped at
/// 60s, so attempt 1 waits 2s, attempt 2 waits 4s, attempt 3 waits 8s...
/// up to the cap.
pub const BACKOFF_BASE_SECS: i64 = 2;
pub const BACKOFF_CAP_SECS: i64 = 60;
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

pub fn backoff_for_attempt(attempt: i32) -> Duration {
    let secs = BACKOFF_BASE_SECS.saturating_mul(1i64 << attempt.max(0).min(20));
    Duration::seconds(secs.min(BACKOFF_CAP_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_the_base_and_caps_at_sixty_seconds() {
        assert_eq!(backoff_for_attempt(0), Duration::seconds(2));
        assert_eq!(backoff_for_attempt(1), Duration::seconds(4));
        assert_eq!(backoff_for_attempt(2), Duration::seconds(8));
        assert_eq!(backoff_for_attempt(3), Duration::seconds(16));
        assert_eq!(backoff_for_attempt(4), Duration::seconds(32));
        assert_eq!(backoff_for_attempt(5), Duration::seconds(60));
        assert_eq!(backoff_for_attempt(10), Duration::seconds(60));
    }

    #[test]
    fn status_round_trips_through_its_string_form() {
        for status in [
            JobStatus::Waiting,
            JobStatus::Active,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), status);
        }
    }
}
