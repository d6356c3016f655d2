//! API layer for the parking engine
//!
//! HTTP handlers for gates (entry, exit) and for the back office (clients,
//! subscriptions, tariffs, listings, statistics).

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod dto;
pub mod handlers;

use actix_web::web;
use parking_core::traits::ParkingStore;
use parking_core::AppError;

// Re-export DTOs (common types)
pub use dto::{ApiResponse, PaginationParams};

pub use handlers::{
    configure_clients, configure_places, configure_stats, configure_tariffs, configure_tickets,
};

/// Mount every route under `/api/v1`
///
/// The engine must be registered as `web::Data<ParkingEngine<S>>`, and the
/// token verifier as `web::Data<Arc<JwtService>>`.
pub fn configure<S: ParkingStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(configure_stats::<S>)
            .configure(configure_clients::<S>)
            .configure(configure_places::<S>)
            .configure(configure_tickets::<S>)
            .configure(configure_tariffs::<S>),
    );
}

/// Query string errors rendered like every other API error
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

/// JSON body errors rendered like every other API error
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}
