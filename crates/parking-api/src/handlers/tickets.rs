//! Gate handlers (entry and exit) and ticket/payment listings

use crate::dto::{
    ApiResponse, ClientRequest, CloseTicketRequest, PaginationParams, PaymentFilterParams,
    ReceiptResponse, TicketFilterParams,
};
use actix_web::{web, HttpResponse};
use parking_auth::{AuthenticatedUser, Capability};
use parking_core::models::{PaymentFilter, TicketFilter};
use parking_core::traits::ParkingStore;
use parking_core::AppError;
use parking_services::ParkingEngine;
use tracing::{debug, info, instrument};

use super::validate;

/// Register an entry: resolve the client, allocate a place, open a ticket
///
/// POST /api/v1/tickets
#[instrument(skip(engine, user, req), fields(phone = %req.phone))]
pub async fn open_ticket<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    user: AuthenticatedUser,
    req: web::Json<ClientRequest>,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::OperateGate)?;
    validate(&*req)?;

    let ticket = engine.open_ticket(&req.identity(), req.mobility()).await?;

    info!(
        ticket_id = ticket.id,
        place_id = ticket.place_id,
        operator = %user.username,
        "Entry registered"
    );

    let record = engine.get_ticket(ticket.id).await?;
    Ok(HttpResponse::Created().json(ApiResponse::with_message(record, "Ticket opened")))
}

/// Register an exit: bill, record the payment, release the place
///
/// POST /api/v1/tickets/{id}/close
#[instrument(skip(engine, user, req))]
pub async fn close_ticket<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
    req: Option<web::Json<CloseTicketRequest>>,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::OperateGate)?;

    let mode = req.map(|r| r.into_inner().mode).unwrap_or_default();
    let closed = engine.close_ticket(path.into_inner(), mode).await?;

    info!(
        ticket_id = closed.ticket.id,
        amount = %closed.payment.amount,
        operator = %user.username,
        "Exit registered"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(ReceiptResponse::from(closed))))
}

/// GET /api/v1/tickets/{id}
#[instrument(skip(engine, user))]
pub async fn get_ticket<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ViewRecords)?;

    let record = engine.get_ticket(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(record)))
}

/// List tickets, newest entry first
///
/// GET /api/v1/tickets?open=&client_id=&from=&to=
#[instrument(skip(engine, user))]
pub async fn list_tickets<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    query: web::Query<PaginationParams>,
    filters: web::Query<TicketFilterParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ViewRecords)?;
    validate(&*query)?;

    let (entered_from, entered_until) = engine.day_window(filters.from, filters.to)?;
    let filter = TicketFilter {
        open_only: filters.open.unwrap_or(false),
        client_id: filters.client_id,
        entered_from,
        entered_until,
    };

    debug!(?filter, page = query.page, "Listing tickets");

    let (records, total) = engine
        .list_tickets(&filter, &query.to_pagination())
        .await?;

    Ok(HttpResponse::Ok().json(query.paginate(records, total)))
}

/// List payments, most recent first
///
/// GET /api/v1/payments?from=&to=&client_id=
#[instrument(skip(engine, user))]
pub async fn list_payments<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    query: web::Query<PaginationParams>,
    filters: web::Query<PaymentFilterParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ViewRecords)?;
    validate(&*query)?;

    let (paid_from, paid_until) = engine.day_window(filters.from, filters.to)?;
    let filter = PaymentFilter {
        client_id: filters.client_id,
        paid_from,
        paid_until,
    };

    let (records, total) = engine
        .list_payments(&filter, &query.to_pagination())
        .await?;

    Ok(HttpResponse::Ok().json(query.paginate(records, total)))
}

/// Configure ticket and payment routes
pub fn configure<S: ParkingStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tickets")
            .route("", web::get().to(list_tickets::<S>))
            .route("", web::post().to(open_ticket::<S>))
            .route("/{id}", web::get().to(get_ticket::<S>))
            .route("/{id}/close", web::post().to(close_ticket::<S>)),
    )
    .route("/payments", web::get().to(list_payments::<S>));
}
