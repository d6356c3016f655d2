//! Occupancy & Billing Engine facade
//!
//! [`ParkingEngine`] exposes every operation of the car park. Each call runs
//! in exactly one storage transaction: it either commits all of its effects
//! or none of them.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use parking_core::config::{BillingConfig, InventoryConfig, PolicyConfig};
use parking_core::models::{
    Client, ClientIdentity, ClosedTicket, MobilityFlag, ParkingStatistics, PaymentFilter,
    PaymentMode, PaymentRecord, Place, PlaceType, SubscribeOutcome, Subscription,
    SubscriptionRecord, Tariff, TariffSchedule, Ticket, TicketFilter, TicketRecord,
};
use parking_core::traits::{Pagination, ParkingStore, ParkingTx};
use parking_core::{AppError, AppResult};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::billing::BillingPolicy;
use crate::client_registry::ClientRegistry;
use crate::clock::{Clock, SystemClock};
use crate::place_pool::{Eligibility, PlacePool};
use crate::statistics::{day_start, StatisticsAggregator};
use crate::subscription_registry::SubscriptionRegistry;
use crate::tariff_registry::TariffRegistry;
use crate::ticket_manager::TicketManager;

/// Base delay between two attempts of a contended operation
const RETRY_BACKOFF_MS: u64 = 10;

/// Engine policies
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub billing: BillingPolicy,
    pub eligibility: Eligibility,
    pub single_open_ticket_per_client: bool,
    /// Attempts made by an operation that hits `Contention`
    pub allocation_retries: u32,
    /// Zone of the calendar day for daily revenue and date filters
    pub timezone: Tz,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            billing: BillingPolicy::default(),
            eligibility: Eligibility::default(),
            single_open_ticket_per_client: true,
            allocation_retries: 3,
            timezone: chrono_tz::UTC,
        }
    }
}

impl EngineSettings {
    pub fn from_config(billing: &BillingConfig, policy: &PolicyConfig) -> AppResult<Self> {
        Ok(Self {
            billing: BillingPolicy::from_config(billing)?,
            eligibility: Eligibility::from_config(policy),
            single_open_ticket_per_client: policy.single_open_ticket_per_client,
            allocation_retries: policy.allocation_retries.max(1),
            timezone: policy.tz()?,
        })
    }
}

/// The parking engine
pub struct ParkingEngine<S: ParkingStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    places: PlacePool,
    tickets: TicketManager,
    statistics: StatisticsAggregator,
}

impl<S: ParkingStore> ParkingEngine<S> {
    pub fn new(store: Arc<S>, settings: EngineSettings, clock: Arc<dyn Clock>) -> Self {
        let places = PlacePool::new(settings.eligibility);
        let tickets = TicketManager::new(
            places,
            settings.billing,
            settings.single_open_ticket_per_client,
        );
        let statistics = StatisticsAggregator::new(settings.timezone);

        Self {
            store,
            clock,
            settings,
            places,
            tickets,
            statistics,
        }
    }

    /// Engine on the wall clock
    pub fn with_system_clock(store: Arc<S>, settings: EngineSettings) -> Self {
        Self::new(store, settings, Arc::new(SystemClock))
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current calendar day in the configured zone
    pub fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.settings.timezone).date_naive()
    }

    /// Convert an inclusive day range into a `[from, until)` instant window
    pub fn day_window(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        if let (Some(from), Some(to)) = (from, to) {
            if to < from {
                return Err(AppError::InvalidInput(format!(
                    "date range ends ({}) before it starts ({})",
                    to, from
                )));
            }
        }

        let tz = &self.settings.timezone;
        let start = from.map(|d| day_start(tz, d));
        let end = to.map(|d| day_start(tz, d.succ_opt().unwrap_or(d)));
        Ok((start, end))
    }

    pub async fn health(&self) -> AppResult<()> {
        self.store.ping().await
    }

    /// Run `op` again while it fails with `Contention`
    async fn retrying<T, F, Fut>(&self, operation: &str, op: F) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let attempts = self.settings.allocation_retries.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Err(e) if e.is_contention() && attempt < attempts => {
                    warn!(operation, attempt, error = %e, "Contention, retrying");
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64))
                        .await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    // ==================== Clients ====================

    /// Register a client, or resolve the one already owning the phone
    #[instrument(skip(self, identity), fields(phone = %identity.phone))]
    pub async fn register_client(
        &self,
        identity: &ClientIdentity,
        mobility: MobilityFlag,
    ) -> AppResult<Client> {
        self.retrying("register_client", || async move {
            let mut tx = self.store.begin().await?;
            let client = ClientRegistry
                .resolve(&mut tx, identity, mobility, self.now())
                .await?;
            tx.commit().await?;
            Ok(client)
        })
        .await
    }

    pub async fn get_client(&self, client_id: i64) -> AppResult<Client> {
        let mut tx = self.store.begin().await?;
        ClientRegistry.get(&mut tx, client_id).await
    }

    pub async fn list_clients(&self, page: &Pagination) -> AppResult<(Vec<Client>, i64)> {
        let mut tx = self.store.begin().await?;
        ClientRegistry.list(&mut tx, page).await
    }

    pub async fn update_client(
        &self,
        client_id: i64,
        identity: &ClientIdentity,
        mobility: MobilityFlag,
    ) -> AppResult<Client> {
        let mut tx = self.store.begin().await?;
        let client = ClientRegistry
            .update(&mut tx, client_id, identity, mobility, self.now())
            .await?;
        tx.commit().await?;
        Ok(client)
    }

    pub async fn delete_client(&self, client_id: i64) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        ClientRegistry.delete(&mut tx, client_id).await?;
        tx.commit().await
    }

    // ==================== Subscriptions ====================

    /// Subscribe a client; idempotent for an active subscriber
    ///
    /// The activation date defaults to today.
    pub async fn subscribe(
        &self,
        client_id: i64,
        since: Option<NaiveDate>,
    ) -> AppResult<SubscribeOutcome> {
        let since = since.unwrap_or_else(|| self.today());
        let mut tx = self.store.begin().await?;
        let outcome = SubscriptionRegistry
            .subscribe(&mut tx, client_id, since, self.now())
            .await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Resolve or create the client, then subscribe it
    #[instrument(skip(self, identity), fields(phone = %identity.phone))]
    pub async fn subscribe_identity(
        &self,
        identity: &ClientIdentity,
        mobility: MobilityFlag,
        since: Option<NaiveDate>,
    ) -> AppResult<(Client, SubscribeOutcome)> {
        let since = since.unwrap_or_else(|| self.today());

        self.retrying("subscribe_identity", || async move {
            let now = self.now();
            let mut tx = self.store.begin().await?;
            let client = ClientRegistry
                .resolve(&mut tx, identity, mobility, now)
                .await?;
            let outcome = SubscriptionRegistry
                .subscribe(&mut tx, client.id, since, now)
                .await?;
            tx.commit().await?;
            Ok((client, outcome))
        })
        .await
    }

    pub async fn cancel_subscription(&self, client_id: i64) -> AppResult<Subscription> {
        let mut tx = self.store.begin().await?;
        let subscription = SubscriptionRegistry.cancel(&mut tx, client_id).await?;
        tx.commit().await?;
        Ok(subscription)
    }

    pub async fn is_subscriber(&self, client_id: i64) -> AppResult<bool> {
        let mut tx = self.store.begin().await?;
        SubscriptionRegistry.is_subscriber(&mut tx, client_id).await
    }

    pub async fn list_subscriptions(&self, active_only: bool) -> AppResult<Vec<SubscriptionRecord>> {
        let mut tx = self.store.begin().await?;
        SubscriptionRegistry.list(&mut tx, active_only).await
    }

    // ==================== Places ====================

    pub async fn list_places(&self, place_type: Option<PlaceType>) -> AppResult<Vec<Place>> {
        let mut tx = self.store.begin().await?;
        self.places.list(&mut tx, place_type).await
    }

    pub async fn available_places(&self, place_type: Option<PlaceType>) -> AppResult<Vec<Place>> {
        let mut tx = self.store.begin().await?;
        self.places.available(&mut tx, place_type).await
    }

    // ==================== Tickets ====================

    /// Entry: allocate a place and open a ticket
    ///
    /// Fails with `NoAvailability` when no eligible place is free, and with
    /// `AlreadyParked` when the client already holds an open ticket.
    #[instrument(skip(self, identity), fields(phone = %identity.phone, mobility = %mobility))]
    pub async fn open_ticket(
        &self,
        identity: &ClientIdentity,
        mobility: MobilityFlag,
    ) -> AppResult<Ticket> {
        self.retrying("open_ticket", || async move {
            let mut tx = self.store.begin().await?;
            let ticket = self
                .tickets
                .open(&mut tx, identity, mobility, self.now())
                .await?;
            tx.commit().await?;
            Ok(ticket)
        })
        .await
    }

    /// Exit: bill the stay, record the payment and release the place
    ///
    /// Concurrent exits of the same ticket are serialised by the ticket lock;
    /// all but the first fail with `AlreadyClosed`.
    #[instrument(skip(self))]
    pub async fn close_ticket(&self, ticket_id: i64, mode: PaymentMode) -> AppResult<ClosedTicket> {
        let mut tx = self.store.begin().await?;
        let closed = self
            .tickets
            .close(&mut tx, ticket_id, mode, self.now())
            .await?;
        tx.commit().await?;
        Ok(closed)
    }

    pub async fn get_ticket(&self, ticket_id: i64) -> AppResult<TicketRecord> {
        let mut tx = self.store.begin().await?;
        tx.ticket_record(ticket_id)
            .await?
            .ok_or_else(|| AppError::TicketNotFound(ticket_id.to_string()))
    }

    pub async fn list_tickets(
        &self,
        filter: &TicketFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<TicketRecord>, i64)> {
        let mut tx = self.store.begin().await?;
        tx.list_tickets(filter, page).await
    }

    pub async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<PaymentRecord>, i64)> {
        let mut tx = self.store.begin().await?;
        tx.list_payments(filter, page).await
    }

    // ==================== Tariffs ====================

    /// Replace both hourly rates; `InvalidRate` leaves the current ones
    pub async fn update_tariffs(
        &self,
        subscriber_rate: Decimal,
        non_subscriber_rate: Decimal,
    ) -> AppResult<TariffSchedule> {
        let mut tx = self.store.begin().await?;
        let schedule = TariffRegistry
            .update(&mut tx, subscriber_rate, non_subscriber_rate, self.now())
            .await?;
        tx.commit().await?;
        Ok(schedule)
    }

    pub async fn current_tariffs(&self) -> AppResult<TariffSchedule> {
        let mut tx = self.store.begin().await?;
        TariffRegistry.current(&mut tx).await
    }

    pub async fn list_tariffs(&self, include_history: bool) -> AppResult<Vec<Tariff>> {
        let mut tx = self.store.begin().await?;
        TariffRegistry.list(&mut tx, include_history).await
    }

    // ==================== Statistics ====================

    pub async fn statistics(&self) -> AppResult<ParkingStatistics> {
        let mut tx = self.store.begin().await?;
        self.statistics.snapshot(&mut tx, self.now()).await
    }

    // ==================== Bootstrap ====================

    /// Seed places and tariffs into an empty store
    ///
    /// Places are created only when there are none; tariffs only when both
    /// initial rates are configured and no tariff is active yet.
    pub async fn bootstrap(&self, inventory: &InventoryConfig) -> AppResult<()> {
        let mut tx = self.store.begin().await?;

        let created = self
            .places
            .seed(&mut tx, inventory.standard_places, inventory.pmr_places)
            .await?;

        let mut tariffs_seeded = false;
        if let (Some(subscriber), Some(non_subscriber)) =
            (inventory.subscriber_rate, inventory.non_subscriber_rate)
        {
            if tx.list_tariffs(false).await?.is_empty() {
                TariffRegistry
                    .update(&mut tx, subscriber, non_subscriber, self.now())
                    .await?;
                tariffs_seeded = true;
            }
        }

        tx.commit().await?;
        info!(places_created = created, tariffs_seeded, "Bootstrap complete");
        Ok(())
    }
}
