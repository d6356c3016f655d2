//! Place inventory handlers

use crate::dto::{ApiResponse, PlaceListParams};
use actix_web::{web, HttpResponse};
use parking_auth::{AuthenticatedUser, Capability};
use parking_core::traits::ParkingStore;
use parking_core::AppError;
use parking_services::ParkingEngine;
use tracing::instrument;

/// GET /api/v1/places?type=
#[instrument(skip(engine, user))]
pub async fn list_places<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    query: web::Query<PlaceListParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ViewRecords)?;

    let places = engine.list_places(query.place_type).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(places)))
}

/// Free places, ordered by type then number
///
/// GET /api/v1/places/available?type=
#[instrument(skip(engine, user))]
pub async fn available_places<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    query: web::Query<PlaceListParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ViewRecords)?;

    let places = engine.available_places(query.place_type).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(places)))
}

pub fn configure<S: ParkingStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/places")
            .route("", web::get().to(list_places::<S>))
            .route("/available", web::get().to(available_places::<S>)),
    );
}
