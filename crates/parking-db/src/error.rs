//! sqlx error classification

use parking_core::AppError;
use tracing::error;

/// SQLSTATE unique_violation
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE serialization_failure
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE deadlock_detected
const DEADLOCK_DETECTED: &str = "40P01";

/// Map a sqlx error to the engine taxonomy
pub(crate) fn map_sqlx(context: &str, err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return AppError::Conflict(format!("{}: {}", context, db_err.message()));
            }
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                return AppError::Contention(format!("{}: {}", context, db_err.message()));
            }
            _ => {}
        }
    }

    error!("Database error while trying to {}: {}", context, err);
    AppError::Database(format!("Failed to {}: {}", context, err))
}

/// Whether the error is a unique constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
    )
}
