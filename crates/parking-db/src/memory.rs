//! In-memory storage backend
//!
//! All state lives behind one async mutex. A transaction holds the lock for
//! its whole lifetime and works on a private copy of the state; `commit`
//! publishes the copy, dropping the transaction discards it. Transactions
//! are therefore fully serialised, which gives the same guarantees as the
//! row locks of the PostgreSQL backend with none of the parallelism.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_core::{
    models::{
        Client, ClientClass, ClientIdentity, MobilityFlag, NewPayment, Occupancy, Payment,
        PaymentFilter, PaymentRecord, Place, PlaceType, Subscription, SubscriptionRecord, Tariff,
        Ticket, TicketFilter, TicketRecord,
    },
    traits::{Pagination, ParkingStore, ParkingTx},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct Sequences {
    client: i64,
    place: i64,
    tariff: i64,
    subscription: i64,
    ticket: i64,
    payment: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    clients: BTreeMap<i64, Client>,
    places: BTreeMap<i64, Place>,
    tariffs: BTreeMap<i64, Tariff>,
    subscriptions: BTreeMap<i64, Subscription>,
    tickets: BTreeMap<i64, Ticket>,
    payments: BTreeMap<i64, Payment>,
    seq: Sequences,
}

impl MemoryState {
    fn ticket_record(&self, ticket: &Ticket) -> AppResult<TicketRecord> {
        let client = self
            .clients
            .get(&ticket.client_id)
            .ok_or_else(|| AppError::Internal(format!("ticket {} has no client", ticket.id)))?;
        let place = self
            .places
            .get(&ticket.place_id)
            .ok_or_else(|| AppError::Internal(format!("ticket {} has no place", ticket.id)))?;

        Ok(TicketRecord {
            ticket: ticket.clone(),
            status: ticket.status(),
            surname: client.surname.clone(),
            given_name: client.given_name.clone(),
            place_number: place.number,
            place_type: place.place_type,
        })
    }

    fn payment_record(&self, payment: &Payment) -> AppResult<PaymentRecord> {
        let ticket = self.tickets.get(&payment.ticket_id).ok_or_else(|| {
            AppError::Internal(format!("payment {} has no ticket", payment.id))
        })?;
        let client = self
            .clients
            .get(&ticket.client_id)
            .ok_or_else(|| AppError::Internal(format!("ticket {} has no client", ticket.id)))?;

        Ok(PaymentRecord {
            payment: payment.clone(),
            client_id: ticket.client_id,
            surname: client.surname.clone(),
            given_name: client.given_name.clone(),
            entry_time: ticket.entry_time,
            exit_time: ticket.exit_time,
        })
    }

    fn phone_taken(&self, phone: &str, except: Option<i64>) -> bool {
        self.clients
            .values()
            .any(|c| c.phone == phone && Some(c.id) != except)
    }
}

/// In-memory implementation of ParkingStore
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParkingStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Exclusive transaction over the in-memory state
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl ParkingTx for MemoryTx {
    // ==================== Clients ====================

    async fn find_client(&mut self, id: i64) -> AppResult<Option<Client>> {
        Ok(self.work.clients.get(&id).cloned())
    }

    async fn find_client_by_phone(&mut self, phone: &str) -> AppResult<Option<Client>> {
        Ok(self.work.clients.values().find(|c| c.phone == phone).cloned())
    }

    async fn lock_client(&mut self, id: i64) -> AppResult<Option<Client>> {
        self.find_client(id).await
    }

    async fn insert_client(
        &mut self,
        identity: &ClientIdentity,
        mobility: MobilityFlag,
        now: DateTime<Utc>,
    ) -> AppResult<Client> {
        if self.work.phone_taken(&identity.phone, None) {
            return Err(AppError::DuplicatePhone(identity.phone.clone()));
        }

        let client = Client {
            id: next(&mut self.work.seq.client),
            surname: identity.surname.clone(),
            given_name: identity.given_name.clone(),
            phone: identity.phone.clone(),
            mobility,
            created_at: now,
            updated_at: now,
        };
        self.work.clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn update_client(&mut self, client: &Client) -> AppResult<Client> {
        if !self.work.clients.contains_key(&client.id) {
            return Err(AppError::ClientNotFound(client.id.to_string()));
        }
        if self.work.phone_taken(&client.phone, Some(client.id)) {
            return Err(AppError::DuplicatePhone(client.phone.clone()));
        }

        self.work.clients.insert(client.id, client.clone());
        Ok(client.clone())
    }

    async fn delete_client(&mut self, id: i64) -> AppResult<bool> {
        if self.work.clients.remove(&id).is_none() {
            return Ok(false);
        }

        let state = &mut self.work;
        let removed: Vec<i64> = state
            .tickets
            .values()
            .filter(|t| t.client_id == id)
            .map(|t| t.id)
            .collect();
        state.tickets.retain(|_, t| t.client_id != id);
        state.payments.retain(|_, p| !removed.contains(&p.ticket_id));
        state.subscriptions.retain(|_, s| s.client_id != id);

        Ok(true)
    }

    async fn list_clients(&mut self, page: &Pagination) -> AppResult<(Vec<Client>, i64)> {
        let mut clients: Vec<Client> = self.work.clients.values().cloned().collect();
        clients.sort_by(|a, b| {
            (&a.surname, &a.given_name, a.id).cmp(&(&b.surname, &b.given_name, b.id))
        });

        let total = clients.len() as i64;
        Ok((page.apply(clients), total))
    }

    async fn count_clients(&mut self) -> AppResult<i64> {
        Ok(self.work.clients.len() as i64)
    }

    // ==================== Places ====================

    async fn insert_place(&mut self, number: i32, place_type: PlaceType) -> AppResult<Place> {
        if self.work.places.values().any(|p| p.number == number) {
            return Err(AppError::Conflict(format!("place number {} exists", number)));
        }

        let place = Place {
            id: next(&mut self.work.seq.place),
            number,
            place_type,
            available: true,
        };
        self.work.places.insert(place.id, place.clone());
        Ok(place)
    }

    async fn find_place(&mut self, id: i64) -> AppResult<Option<Place>> {
        Ok(self.work.places.get(&id).cloned())
    }

    async fn list_places(
        &mut self,
        place_type: Option<PlaceType>,
        available_only: bool,
    ) -> AppResult<Vec<Place>> {
        let mut places: Vec<Place> = self
            .work
            .places
            .values()
            .filter(|p| place_type.map_or(true, |t| p.place_type == t))
            .filter(|p| !available_only || p.available)
            .cloned()
            .collect();
        places.sort_by_key(|p| p.number);
        Ok(places)
    }

    async fn claim_free_place(&mut self, place_type: PlaceType) -> AppResult<Option<Place>> {
        let chosen = self
            .work
            .places
            .values_mut()
            .filter(|p| p.place_type == place_type && p.available)
            .min_by_key(|p| p.number);

        Ok(chosen.map(|place| {
            place.available = false;
            place.clone()
        }))
    }

    async fn release_place(&mut self, id: i64) -> AppResult<bool> {
        let place = self
            .work
            .places
            .get_mut(&id)
            .ok_or_else(|| AppError::PlaceNotFound(id.to_string()))?;

        if place.available {
            return Ok(false);
        }
        place.available = true;
        Ok(true)
    }

    async fn occupancy(&mut self) -> AppResult<Occupancy> {
        let total = self.work.places.len() as i64;
        let occupied = self.work.places.values().filter(|p| !p.available).count() as i64;
        Ok(Occupancy { total, occupied })
    }

    // ==================== Tariffs ====================

    async fn active_tariff(&mut self, class: ClientClass) -> AppResult<Option<Tariff>> {
        Ok(self
            .work
            .tariffs
            .values()
            .find(|t| t.client_class == class && t.active)
            .cloned())
    }

    async fn insert_tariff_version(
        &mut self,
        class: ClientClass,
        hourly_rate: Decimal,
        now: DateTime<Utc>,
    ) -> AppResult<Tariff> {
        let mut version = 0;
        for tariff in self
            .work
            .tariffs
            .values_mut()
            .filter(|t| t.client_class == class)
        {
            tariff.active = false;
            version = version.max(tariff.version);
        }

        let tariff = Tariff {
            id: next(&mut self.work.seq.tariff),
            client_class: class,
            hourly_rate,
            active: true,
            version: version + 1,
            created_at: now,
        };
        self.work.tariffs.insert(tariff.id, tariff.clone());
        Ok(tariff)
    }

    async fn list_tariffs(&mut self, include_history: bool) -> AppResult<Vec<Tariff>> {
        let mut tariffs: Vec<Tariff> = self
            .work
            .tariffs
            .values()
            .filter(|t| include_history || t.active)
            .cloned()
            .collect();
        tariffs.sort_by(|a, b| {
            (b.client_class.to_string(), b.version).cmp(&(a.client_class.to_string(), a.version))
        });
        Ok(tariffs)
    }

    // ==================== Subscriptions ====================

    async fn active_subscription(&mut self, client_id: i64) -> AppResult<Option<Subscription>> {
        Ok(self
            .work
            .subscriptions
            .values()
            .find(|s| s.client_id == client_id && s.active)
            .cloned())
    }

    async fn insert_subscription(
        &mut self,
        client_id: i64,
        since: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        if !self.work.clients.contains_key(&client_id) {
            return Err(AppError::ClientNotFound(client_id.to_string()));
        }
        if self.active_subscription(client_id).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "client {} already has an active subscription",
                client_id
            )));
        }

        let subscription = Subscription {
            id: next(&mut self.work.seq.subscription),
            client_id,
            since,
            active: true,
            created_at: now,
        };
        self.work
            .subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn deactivate_subscription(&mut self, id: i64) -> AppResult<bool> {
        match self.work.subscriptions.get_mut(&id) {
            Some(s) if s.active => {
                s.active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_subscriptions(&mut self, active_only: bool) -> AppResult<Vec<SubscriptionRecord>> {
        let mut records = Vec::new();
        for subscription in self.work.subscriptions.values() {
            if active_only && !subscription.active {
                continue;
            }
            if let Some(client) = self.work.clients.get(&subscription.client_id) {
                records.push(SubscriptionRecord {
                    subscription: subscription.clone(),
                    surname: client.surname.clone(),
                    given_name: client.given_name.clone(),
                    phone: client.phone.clone(),
                });
            }
        }
        records.sort_by(|a, b| {
            (b.subscription.since, b.subscription.id).cmp(&(a.subscription.since, a.subscription.id))
        });
        Ok(records)
    }

    async fn count_subscribers(&mut self) -> AppResult<i64> {
        Ok(self
            .work
            .subscriptions
            .values()
            .filter(|s| s.active)
            .count() as i64)
    }

    // ==================== Tickets ====================

    async fn insert_ticket(&mut self, ticket: &Ticket) -> AppResult<Ticket> {
        if !self.work.clients.contains_key(&ticket.client_id) {
            return Err(AppError::ClientNotFound(ticket.client_id.to_string()));
        }
        if self
            .work
            .tickets
            .values()
            .any(|t| t.place_id == ticket.place_id && t.is_open())
        {
            return Err(AppError::Conflict(format!(
                "place {} already has an open ticket",
                ticket.place_id
            )));
        }

        let mut stored = ticket.clone();
        stored.id = next(&mut self.work.seq.ticket);
        self.work.tickets.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn lock_ticket(&mut self, id: i64) -> AppResult<Option<Ticket>> {
        Ok(self.work.tickets.get(&id).cloned())
    }

    async fn ticket_record(&mut self, id: i64) -> AppResult<Option<TicketRecord>> {
        match self.work.tickets.get(&id) {
            Some(ticket) => Ok(Some(self.work.ticket_record(ticket)?)),
            None => Ok(None),
        }
    }

    async fn open_ticket_for_client(&mut self, client_id: i64) -> AppResult<Option<Ticket>> {
        Ok(self
            .work
            .tickets
            .values()
            .filter(|t| t.client_id == client_id && t.is_open())
            .min_by_key(|t| t.entry_time)
            .cloned())
    }

    async fn close_ticket(&mut self, ticket: &Ticket) -> AppResult<Ticket> {
        let stored = self
            .work
            .tickets
            .get_mut(&ticket.id)
            .ok_or_else(|| AppError::TicketNotFound(ticket.id.to_string()))?;

        if !stored.is_open() {
            return Err(AppError::AlreadyClosed(ticket.id));
        }

        stored.exit_time = ticket.exit_time;
        stored.tariff_id = ticket.tariff_id;
        stored.hourly_rate = ticket.hourly_rate;
        stored.amount = ticket.amount;
        Ok(stored.clone())
    }

    async fn list_tickets(
        &mut self,
        filter: &TicketFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<TicketRecord>, i64)> {
        let mut tickets: Vec<&Ticket> = self
            .work
            .tickets
            .values()
            .filter(|t| filter.matches(t))
            .collect();
        tickets.sort_by(|a, b| (b.entry_time, b.id).cmp(&(a.entry_time, a.id)));

        let total = tickets.len() as i64;
        let records = page
            .apply(tickets)
            .into_iter()
            .map(|t| self.work.ticket_record(t))
            .collect::<AppResult<Vec<_>>>()?;

        Ok((records, total))
    }

    async fn count_open_tickets(&mut self) -> AppResult<i64> {
        Ok(self.work.tickets.values().filter(|t| t.is_open()).count() as i64)
    }

    // ==================== Payments ====================

    async fn insert_payment(&mut self, payment: &NewPayment) -> AppResult<Payment> {
        if !self.work.tickets.contains_key(&payment.ticket_id) {
            return Err(AppError::TicketNotFound(payment.ticket_id.to_string()));
        }
        if self
            .work
            .payments
            .values()
            .any(|p| p.ticket_id == payment.ticket_id)
        {
            return Err(AppError::Conflict(format!(
                "ticket {} is already paid",
                payment.ticket_id
            )));
        }

        let stored = Payment {
            id: next(&mut self.work.seq.payment),
            ticket_id: payment.ticket_id,
            amount: payment.amount,
            mode: payment.mode,
            paid_at: payment.paid_at,
        };
        self.work.payments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_payments(
        &mut self,
        filter: &PaymentFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<PaymentRecord>, i64)> {
        let mut records = self
            .work
            .payments
            .values()
            .filter(|p| filter.matches_window(p.paid_at))
            .map(|p| self.work.payment_record(p))
            .collect::<AppResult<Vec<_>>>()?;

        if let Some(client_id) = filter.client_id {
            records.retain(|r| r.client_id == client_id);
        }
        records.sort_by(|a, b| {
            (b.payment.paid_at, b.payment.id).cmp(&(a.payment.paid_at, a.payment.id))
        });

        let total = records.len() as i64;
        Ok((page.apply(records), total))
    }

    async fn sum_payments(&mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> AppResult<Decimal> {
        Ok(self
            .work
            .payments
            .values()
            .filter(|p| p.paid_at >= from && p.paid_at < until)
            .map(|p| p.amount)
            .sum())
    }

    async fn count_valid_payments(&mut self) -> AppResult<i64> {
        Ok(self.work.payments.len() as i64)
    }

    // ==================== Lifecycle ====================

    async fn commit(self) -> AppResult<()> {
        let MemoryTx { mut guard, work } = self;
        *guard = work;
        Ok(())
    }
}
