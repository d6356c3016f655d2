//! HTTP request handlers
//!
//! Every handler is generic over the store so the same routes serve
//! PostgreSQL in production and the in-memory store in tests.

pub mod clients;
pub mod places;
pub mod stats;
pub mod tariffs;
pub mod tickets;

use parking_core::AppError;
use tracing::warn;
use validator::Validate;

pub use clients::configure as configure_clients;
pub use places::configure as configure_places;
pub use stats::configure as configure_stats;
pub use tariffs::configure as configure_tariffs;
pub use tickets::configure as configure_tickets;

/// Run validator rules, reporting failures as `AppError::Validation`
pub(crate) fn validate<T: Validate>(req: &T) -> Result<(), AppError> {
    req.validate().map_err(|e| {
        warn!("Request validation failed: {}", e);
        AppError::Validation(e.to_string())
    })
}
