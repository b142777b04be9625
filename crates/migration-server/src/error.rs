//! The HTTP-facing error type: maps every collaborator crate's error onto
//! a `{code, message}` JSON envelope and an HTTP status via
//! `IntoResponse`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Controller(#[from] migration_controller::Error),

    #[error("{0}")]
    InvalidChanges(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// error code table, derived from the originating crate's
    /// error category rather than hand-assigned per handler.
    fn code_and_status(&self) -> (&'static str, StatusCode) {
        match self {
            ApiError::InvalidChanges(_) => ("INVALID_CHANGES", StatusCode::BAD_REQUEST),

            ApiError::Controller(migration_controller::Error::NotRollbackable(_, _)) => {
                ("ROLLBACK_NOT_ALLOWED", StatusCode::CONFLICT)
            }

            ApiError::Controller(migration_controller::Error::InvalidCleanupDays(_)) => {
                ("VALIDATION_ERROR", StatusCode::BAD_REQUEST)
            }

            ApiError::Controller(migration_controller::Error::Core(core_err)) => core_err_code(core_err),
            ApiError::Controller(migration_controller::Error::Engine(migration_engine::Error::Core(core_err))) => {
                core_err_code(core_err)
            }
            ApiError::Controller(migration_controller::Error::Engine(
                migration_engine::Error::UnsupportedConversion { .. }
                | migration_engine::Error::LossyNarrowing { .. }
                | migration_engine::Error::UnparsableValue { .. },
            )) => ("VALIDATION_ERROR", StatusCode::BAD_REQUEST),
            ApiError::Controller(migration_controller::Error::Engine(_)) => {
                ("QUEUE_ERROR", StatusCode::INTERNAL_SERVER_ERROR)
            }

            ApiError::Controller(migration_controller::Error::Store(_))
            | ApiError::Controller(migration_controller::Error::Queue(_))
            | ApiError::Controller(migration_controller::Error::Database(_)) => {
                ("QUEUE_ERROR", StatusCode::INTERNAL_SERVER_ERROR)
            }

            ApiError::Database(_) => ("QUEUE_ERROR", StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

fn core_err_code(err: &migration_core::Error) -> (&'static str, StatusCode) {
    match err {
        migration_core::Error::MigrationNotFound(_) => ("MIGRATION_NOT_FOUND", StatusCode::NOT_FOUND),
        migration_core::Error::BackupNotFound(_) => ("BACKUP_NOT_FOUND", StatusCode::NOT_FOUND),
        migration_core::Error::BackupExpired(_) => ("BACKUP_EXPIRED", StatusCode::GONE),
        migration_core::Error::TableMissing(_) => ("NO_TABLE", StatusCode::NOT_FOUND),
        migration_core::Error::ColumnMissing(_, _) | migration_core::Error::ColumnAlreadyExists(_, _) => {
            ("INVALID_CHANGES", StatusCode::CONFLICT)
        }
        err if err.is_input_error() => ("VALIDATION_ERROR", StatusCode::BAD_REQUEST),
        _ => ("QUEUE_ERROR", StatusCode::INTERNAL_SERVER_ERROR),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status) = self.code_and_status();
        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code,
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
