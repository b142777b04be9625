//! Route handlers for the `/migrations/*` surface: `State(state)` plus a
//! typed body/query extractor, returning `Result<Json<_>, ApiError>`.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{AuthContext, Role};
use crate::dto::*;
use crate::error::{ApiError, Result};
use crate::state::AppState;

fn require_role(auth: &AuthContext, required: Role) -> Result<()> {
    if auth.satisfies(required) {
        Ok(())
    } else {
        Err(ApiError::InvalidChanges("insufficient role for this operation".to_string()))
    }
}

fn operations_from_changes(changes: &[ChangeRequest]) -> Result<Vec<migration_engine::SchemaOperation>> {
    changes
        .iter()
        .map(|c| change_to_operation(c).map_err(ApiError::InvalidChanges))
        .collect()
}

#[tracing::instrument(skip(state, auth, body))]
pub async fn preview(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>> {
    require_role(&auth, Role::Admin)?;
    let ops = operations_from_changes(&body.changes)?;
    let previewed = state.controller.preview_operations(&ops);

    let total_changes = previewed.len();
    let requires_backup = previewed.iter().any(|p| p.requires_backup);
    let response = PreviewResponse {
        preview: previewed.iter().map(PreviewedChangeDto::from).collect(),
        summary: PreviewSummary {
            total_changes,
            valid_changes: total_changes,
            invalid_changes: 0,
            requires_backup,
        },
    };
    Ok(Json(response))
}

#[tracing::instrument(skip(state, auth, body))]
pub async fn execute(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<ExecuteRequest>,
) -> Result<(axum::http::StatusCode, Json<ExecuteResponse>)> {
    require_role(&auth, Role::Admin)?;
    let ops = operations_from_changes(&body.changes)?;

    let labels: Vec<(&'static str, String)> = ops
        .iter()
        .map(|op| {
            (
                job_action_label(&migration_queue::JobAction::Migrate(op.clone())),
                job_action_column(&migration_queue::JobAction::Migrate(op.clone())),
            )
        })
        .collect();

    let job_ids = state
        .controller
        .execute_plan(body.form_id, ops, &body.requested_by)
        .await?;

    let queued_jobs = job_ids
        .into_iter()
        .zip(labels)
        .enumerate()
        .map(|(i, (job_id, (job_type, column_name)))| {
            state
                .metrics
                .migrations_executed_total
                .with_label_values(&[job_type, "queued"])
                .inc();
            QueuedJobDto {
                job_id,
                job_type,
                column_name,
                status: "queued",
                queue_position: i,
            }
        })
        .collect::<Vec<_>>();

    Ok((
        axum::http::StatusCode::CREATED,
        Json(ExecuteResponse {
            message: format!("queued {} migration job(s)", queued_jobs.len()),
            queued_jobs,
        }),
    ))
}

#[tracing::instrument(skip(state, auth))]
pub async fn history(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(form_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    let limit = query.limit.clamp(1, MAX_HISTORY_LIMIT);
    let filter = parse_history_filter(query.status.as_deref());

    let (migrations, total) = state
        .controller
        .list_history(form_id, filter, limit, query.offset)
        .await?;

    let has_more = query.offset + (migrations.len() as i64) < total;
    Ok(Json(HistoryResponse {
        migrations: migrations.iter().map(FieldMigrationDto::from).collect(),
        total,
        limit,
        offset: query.offset,
        has_more,
    }))
}

#[tracing::instrument(skip(state, auth, form))]
pub async fn rollback(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(migration_id): Path<Uuid>,
    Json(form): Json<migration_core::Form>,
) -> Result<Json<RollbackResponse>> {
    require_role(&auth, Role::Highest)?;
    let rollback_migration_id = state
        .controller
        .rollback(migration_id, &form, &auth.actor)
        .await?;

    state.metrics.migrations_rolled_back_total.with_label_values(&["UNKNOWN"]).inc();

    Ok(Json(RollbackResponse {
        migration_id,
        rollback_migration_id,
        description: "inverse SQL applied and recorded as a new journal entry".to_string(),
        message: "rollback completed".to_string(),
    }))
}

#[tracing::instrument(skip(state, auth))]
pub async fn backups(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(form_id): Path<Uuid>,
    Query(query): Query<BackupsQuery>,
) -> Result<Json<BackupsResponse>> {
    let all = state.controller.list_backups(form_id).await?;
    let now = Utc::now();
    let filtered: Vec<_> = all
        .iter()
        .filter(|b| query.include_expired || !b.is_expired_at(now))
        .collect();

    let total = filtered.len() as i64;
    let limit = query.limit.max(1);
    let page: Vec<_> = filtered
        .into_iter()
        .skip(query.offset.max(0) as usize)
        .take(limit as usize)
        .map(FieldDataBackupDto::from)
        .collect();

    let has_more = query.offset + (page.len() as i64) < total;
    Ok(Json(BackupsResponse {
        backups: page,
        total,
        limit,
        offset: query.offset,
        has_more,
    }))
}

#[tracing::instrument(skip(state, auth, body))]
pub async fn restore(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(backup_id): Path<Uuid>,
    Json(body): Json<RestoreRequest>,
) -> Result<Json<RestoreResponse>> {
    require_role(&auth, Role::Highest)?;
    let job_id = state
        .controller
        .restore(backup_id, body.form_id, &body.requested_by)
        .await?;

    Ok(Json(RestoreResponse {
        backup_id,
        job_id,
        message: "restore enqueued behind this form's other pending migrations".to_string(),
    }))
}

#[tracing::instrument(skip(state, auth))]
pub async fn queue_status(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<QueueStatusQuery>,
) -> Result<Json<QueueStatusResponse>> {
    let form_id = query
        .form_id
        .ok_or_else(|| ApiError::InvalidChanges("formId is required".to_string()))?;
    let jobs = state.controller.queue_status(form_id).await?;
    Ok(Json(QueueStatusResponse {
        queue: summarize_jobs(&jobs),
        form_id: Some(form_id),
    }))
}

#[tracing::instrument(skip(state, auth))]
pub async fn cleanup(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<CleanupResponse>> {
    require_role(&auth, Role::Highest)?;
    let started = Instant::now();
    let report = state.controller.cleanup(query.days, query.dry_run).await?;
    state
        .metrics
        .db_query_duration_seconds
        .with_label_values(&["cleanup"])
        .observe(started.elapsed().as_secs_f64());

    let (deleted_count, would_delete_count) = if report.dry_run {
        (None, Some(report.expired_backups))
    } else {
        (Some(report.deleted_backups), None)
    };

    Ok(Json(CleanupResponse {
        deleted_count,
        would_delete_count,
        days: report.days,
        cutoff_date: report.cutoff,
        message: if report.dry_run {
            format!("would delete {} expired backup(s)", report.expired_backups)
        } else {
            format!(
                "deleted {} expired backup(s) and {} journal entries",
                report.deleted_backups, report.deleted_journal_entries
            )
        },
    }))
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    sqlx::query("SELECT 1").fetch_one(&state.db).await?;
    Ok(Json(HealthResponse {
        status: "healthy",
        database: "up",
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    match state.metrics.export() {
        Ok(body) => (
            axum::http::StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(err) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; version=0.0.4")],
            err.to_string(),
        ),
    }
}
