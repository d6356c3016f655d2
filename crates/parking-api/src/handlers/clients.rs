//! Client and subscription handlers
//!
//! Registration is idempotent on the phone number: posting a known phone
//! returns the existing client unchanged.

use crate::dto::{
    ApiResponse, ClientRequest, ClientResponse, PaginationParams, SubscribeIdentityRequest,
    SubscribeRequest, SubscriptionListParams, SubscriptionResponse,
};
use actix_web::{web, HttpResponse};
use parking_auth::{AuthenticatedUser, Capability};
use parking_core::traits::ParkingStore;
use parking_core::AppError;
use parking_services::ParkingEngine;
use tracing::{debug, info, instrument};

use super::validate;

/// Register a client, or resolve the one owning the phone
///
/// POST /api/v1/clients
#[instrument(skip(engine, user, req))]
pub async fn register_client<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    user: AuthenticatedUser,
    req: web::Json<ClientRequest>,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ManageClients)?;
    validate(&*req)?;

    let client = engine
        .register_client(&req.identity(), req.mobility())
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ClientResponse::from(client))))
}

/// List clients ordered by name
///
/// GET /api/v1/clients
#[instrument(skip(engine, user))]
pub async fn list_clients<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    query: web::Query<PaginationParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ViewRecords)?;
    validate(&*query)?;

    debug!(page = query.page, per_page = query.per_page, "Listing clients");

    let (clients, total) = engine.list_clients(&query.to_pagination()).await?;
    let data: Vec<ClientResponse> = clients.into_iter().map(ClientResponse::from).collect();

    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

/// GET /api/v1/clients/{id}
#[instrument(skip(engine, user))]
pub async fn get_client<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ViewRecords)?;

    let client = engine.get_client(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ClientResponse::from(client))))
}

/// PUT /api/v1/clients/{id}
#[instrument(skip(engine, user, req))]
pub async fn update_client<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
    req: web::Json<ClientRequest>,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ManageClients)?;
    validate(&*req)?;

    let client = engine
        .update_client(path.into_inner(), &req.identity(), req.mobility())
        .await?;

    info!(client_id = client.id, operator = %user.username, "Client updated");
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        ClientResponse::from(client),
        "Client updated successfully",
    )))
}

/// Delete a client with no open ticket
///
/// DELETE /api/v1/clients/{id}
#[instrument(skip(engine, user))]
pub async fn delete_client<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ManageClients)?;

    let client_id = path.into_inner();
    engine.delete_client(client_id).await?;

    info!(client_id, operator = %user.username, "Client deleted");
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/v1/clients/{id}/subscription
#[instrument(skip(engine, user, req))]
pub async fn subscribe<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
    req: Option<web::Json<SubscribeRequest>>,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ManageClients)?;

    let client_id = path.into_inner();
    let since = req.and_then(|r| r.into_inner().since);
    let outcome = engine.subscribe(client_id, since).await?;

    Ok(subscription_response(client_id, outcome))
}

/// DELETE /api/v1/clients/{id}/subscription
#[instrument(skip(engine, user))]
pub async fn cancel_subscription<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ManageClients)?;

    let subscription = engine.cancel_subscription(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        subscription,
        "Subscription cancelled",
    )))
}

/// Subscribe by identity, registering the client when unknown
///
/// POST /api/v1/subscriptions
#[instrument(skip(engine, user, req))]
pub async fn subscribe_identity<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    user: AuthenticatedUser,
    req: web::Json<SubscribeIdentityRequest>,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ManageClients)?;
    validate(&*req)?;

    let (client, outcome) = engine
        .subscribe_identity(&req.client.identity(), req.client.mobility(), req.since)
        .await?;

    Ok(subscription_response(client.id, outcome))
}

/// GET /api/v1/subscriptions
#[instrument(skip(engine, user))]
pub async fn list_subscriptions<S: ParkingStore + 'static>(
    engine: web::Data<ParkingEngine<S>>,
    query: web::Query<SubscriptionListParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    user.require(Capability::ViewRecords)?;

    let subscriptions = engine.list_subscriptions(query.active).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(subscriptions)))
}

fn subscription_response(
    client_id: i64,
    outcome: parking_core::models::SubscribeOutcome,
) -> HttpResponse {
    let response = SubscriptionResponse::from_outcome(client_id, outcome);
    if response.created {
        HttpResponse::Created().json(ApiResponse::with_message(response, "Subscription activated"))
    } else {
        HttpResponse::Ok().json(ApiResponse::with_message(response, "Already subscribed"))
    }
}

/// Configure client and subscription routes
pub fn configure<S: ParkingStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/clients")
            .route("", web::get().to(list_clients::<S>))
            .route("", web::post().to(register_client::<S>))
            .route("/{id}", web::get().to(get_client::<S>))
            .route("/{id}", web::put().to(update_client::<S>))
            .route("/{id}", web::delete().to(delete_client::<S>))
            .route("/{id}/subscription", web::post().to(subscribe::<S>))
            .route("/{id}/subscription", web::delete().to(cancel_subscription::<S>)),
    )
    .service(
        web::scope("/subscriptions")
            .route("", web::get().to(list_subscriptions::<S>))
            .route("", web::post().to(subscribe_identity::<S>)),
    );
}
