//! Health and statistics handlers

use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use parking_auth::{AuthenticatedUser, Capability};
use parking_core::traits::ParkingStore;
use parking_core::AppError;
use parking_services::ParkingEngine;
use serde_json::json;
use tracing::{instrument, warn};

/// Liveness check, including a store round trip
///
/// GET /api/v1/health
pub async fn health<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
) -> HttpResponse {
    match engine.health().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": "parking-engine",
            "version": env!("CARGO_PKG_VERSION"),
        })),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "error": e.error_code(),
            }))
        }
    }
}

/// Occupancy and revenue snapshot
///
/// GET /api/v1/statistics
#[instrument(skip(engine, user))]
pub async fn statistics<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ViewRecords)?;

    let stats = engine.statistics().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

pub fn configure<S: ParkingStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::<S>))
        .route("/statistics", web::get().to(statistics::<S>));
}
