//! Tariff handlers

use crate::dto::{ApiResponse, TariffListParams, TariffUpdateRequest};
use actix_web::{web, HttpResponse};
use parking_auth::{AuthenticatedUser, Capability};
use parking_core::traits::ParkingStore;
use parking_core::AppError;
use parking_services::ParkingEngine;
use tracing::{info, instrument};

/// GET /api/v1/tariffs?history=
#[instrument(skip(engine, user))]
pub async fn list_tariffs<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    query: web::Query<TariffListParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ViewRecords)?;

    let tariffs = engine.list_tariffs(query.history).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(tariffs)))
}

/// GET /api/v1/tariffs/current
#[instrument(skip(engine, user))]
pub async fn current_tariffs<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ViewRecords)?;

    let schedule = engine.current_tariffs().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(schedule)))
}

/// Replace both hourly rates; tickets already closed keep their amount
///
/// PUT /api/v1/tariffs
#[instrument(skip(engine, user, req))]
pub async fn update_tariffs<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    user: AuthenticatedUser,
    req: web::Json<TariffUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ManageTariffs)?;

    let schedule = engine
        .update_tariffs(req.subscriber_rate, req.non_subscriber_rate)
        .await?;

    info!(
        subscriber_rate = %schedule.subscriber.hourly_rate,
        non_subscriber_rate = %schedule.non_subscriber.hourly_rate,
        operator = %user.username,
        "Tariffs updated"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(schedule, "Tariffs updated")))
}

/// Configure tariff routes
pub fn configure<S: ParkingStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tariffs")
            .route("", web::get().to(list_tariffs::<S>))
            .route("", web::put().to(update_tariffs::<S>))
            .route("/current", web::get().to(current_tariffs::<S>)),
    );
}
