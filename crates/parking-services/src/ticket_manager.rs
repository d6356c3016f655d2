//! Ticket Lifecycle Manager
//!
//! A ticket is Open from entry until exit and Closed afterwards; there is no
//! way back. Opening binds an allocated place to the ticket, closing bills
//! the stay, records the payment and releases the place. Each of the two
//! transitions runs in the caller's transaction, so a failure anywhere
//! leaves nothing behind.

use chrono::{DateTime, Utc};
use parking_core::models::{
    Client, ClientIdentity, ClosedTicket, MobilityFlag, NewPayment, PaymentMode, Ticket,
};
use parking_core::traits::ParkingTx;
use parking_core::{AppError, AppResult};
use tracing::{info, instrument, warn};

use crate::billing::BillingPolicy;
use crate::client_registry::ClientRegistry;
use crate::place_pool::PlacePool;
use crate::subscription_registry::SubscriptionRegistry;
use crate::tariff_registry::TariffRegistry;

#[derive(Debug, Clone, Copy)]
pub struct TicketManager {
    places: PlacePool,
    billing: BillingPolicy,
    single_open_ticket_per_client: bool,
}

impl TicketManager {
    pub fn new(places: PlacePool, billing: BillingPolicy, single_open_ticket_per_client: bool) -> Self {
        Self {
            places,
            billing,
            single_open_ticket_per_client,
        }
    }

    /// Entry: resolve the client, allocate a place and open a ticket
    #[instrument(skip(self, tx, identity), fields(phone = %identity.phone))]
    pub async fn open<T: ParkingTx>(
        &self,
        tx: &mut T,
        identity: &ClientIdentity,
        mobility: MobilityFlag,
        now: DateTime<Utc>,
    ) -> AppResult<Ticket> {
        let client = ClientRegistry.resolve(tx, identity, mobility, now).await?;
        self.open_for_client(tx, &client, mobility, now).await
    }

    /// Entry for an already resolved client
    pub async fn open_for_client<T: ParkingTx>(
        &self,
        tx: &mut T,
        client: &Client,
        mobility: MobilityFlag,
        now: DateTime<Utc>,
    ) -> AppResult<Ticket> {
        if self.single_open_ticket_per_client {
            // Serialises entries of the same client
            tx.lock_client(client.id).await?;

            if let Some(open) = tx.open_ticket_for_client(client.id).await? {
                warn!(client_id = client.id, ticket_id = open.id, "Client already parked");
                return Err(AppError::AlreadyParked {
                    client_id: client.id,
                    ticket_id: open.id,
                });
            }
        }

        let place = self.places.allocate_for(tx, mobility).await?;
        let ticket = tx
            .insert_ticket(&Ticket::open(client.id, place.id, now))
            .await?;

        info!(
            ticket_id = ticket.id,
            client_id = client.id,
            place_number = place.number,
            place_type = %place.place_type,
            "Ticket opened"
        );

        Ok(ticket)
    }

    /// Exit: bill the stay, record the payment, release the place
    #[instrument(skip(self, tx))]
    pub async fn close<T: ParkingTx>(
        &self,
        tx: &mut T,
        ticket_id: i64,
        mode: PaymentMode,
        now: DateTime<Utc>,
    ) -> AppResult<ClosedTicket> {
        let ticket = tx
            .lock_ticket(ticket_id)
            .await?
            .ok_or_else(|| AppError::TicketNotFound(ticket_id.to_string()))?;

        if !ticket.is_open() {
            warn!(ticket_id, "Ticket already closed");
            return Err(AppError::AlreadyClosed(ticket_id));
        }

        let is_subscriber = SubscriptionRegistry
            .is_subscriber(tx, ticket.client_id)
            .await?;
        let class = BillingPolicy::class_for(is_subscriber);
        let tariff = TariffRegistry.rate_for(tx, class).await?;
        let amount = self
            .billing
            .fare(ticket.entry_time, now, tariff.hourly_rate)?;

        let mut closing = ticket.clone();
        closing.exit_time = Some(now);
        closing.tariff_id = Some(tariff.id);
        closing.hourly_rate = Some(tariff.hourly_rate);
        closing.amount = Some(amount);

        let closed = tx.close_ticket(&closing).await?;
        let payment = tx
            .insert_payment(&NewPayment {
                ticket_id,
                amount,
                mode,
                paid_at: now,
            })
            .await?;
        self.places.release(tx, ticket.place_id).await?;

        info!(
            ticket_id,
            client_class = %class,
            rate = %tariff.hourly_rate,
            amount = %amount,
            mode = %mode,
            "Ticket closed"
        );

        Ok(ClosedTicket {
            ticket: closed,
            payment,
        })
    }
}
