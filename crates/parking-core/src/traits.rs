//! Storage abstractions
//!
//! The engine talks to storage through a unit of work: [`ParkingStore::begin`]
//! opens a [`ParkingTx`], every read and write of one engine operation goes
//! through that transaction, and nothing becomes visible to other callers
//! until [`ParkingTx::commit`]. Dropping a transaction without committing
//! rolls it back.

use crate::error::AppError;
use crate::models::{
    Client, ClientClass, ClientIdentity, MobilityFlag, NewPayment, Occupancy, Payment,
    PaymentFilter, PaymentRecord, Place, PlaceType, Subscription, SubscriptionRecord, Tariff,
    Ticket, TicketFilter, TicketRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Transactional storage backend
#[async_trait]
pub trait ParkingStore: Send + Sync {
    /// Transaction type produced by this store
    type Tx: ParkingTx;

    /// Start a transaction
    async fn begin(&self) -> Result<Self::Tx, AppError>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<(), AppError>;
}

/// One open transaction against the store
///
/// Row-locking methods (`lock_*`, `claim_free_place`) hold their lock until
/// the transaction ends, so two transactions can never both observe the same
/// place as free or the same ticket as open.
#[async_trait]
pub trait ParkingTx: Send {
    // ==================== Clients ====================

    /// Find client by ID
    async fn find_client(&mut self, id: i64) -> Result<Option<Client>, AppError>;

    /// Find client by phone number
    async fn find_client_by_phone(&mut self, phone: &str) -> Result<Option<Client>, AppError>;

    /// Find client by ID and lock it for the rest of the transaction
    async fn lock_client(&mut self, id: i64) -> Result<Option<Client>, AppError>;

    /// Create a client; fails with `DuplicatePhone` when the phone is taken
    async fn insert_client(
        &mut self,
        identity: &ClientIdentity,
        mobility: MobilityFlag,
        now: DateTime<Utc>,
    ) -> Result<Client, AppError>;

    /// Overwrite identity fields and mobility flag
    async fn update_client(&mut self, client: &Client) -> Result<Client, AppError>;

    /// Delete a client with its closed history and subscriptions
    async fn delete_client(&mut self, id: i64) -> Result<bool, AppError>;

    /// List clients ordered by surname, given name
    async fn list_clients(&mut self, page: &Pagination) -> Result<(Vec<Client>, i64), AppError>;

    async fn count_clients(&mut self) -> Result<i64, AppError>;

    // ==================== Places ====================

    async fn insert_place(&mut self, number: i32, place_type: PlaceType)
        -> Result<Place, AppError>;

    async fn find_place(&mut self, id: i64) -> Result<Option<Place>, AppError>;

    /// List places ordered by number
    async fn list_places(
        &mut self,
        place_type: Option<PlaceType>,
        available_only: bool,
    ) -> Result<Vec<Place>, AppError>;

    /// Pick the free place of `place_type` with the lowest number and mark it
    /// occupied. `None` when every place of that type is taken.
    async fn claim_free_place(&mut self, place_type: PlaceType)
        -> Result<Option<Place>, AppError>;

    /// Mark a place free. Returns `false` if it was already free.
    async fn release_place(&mut self, id: i64) -> Result<bool, AppError>;

    async fn occupancy(&mut self) -> Result<Occupancy, AppError>;

    // ==================== Tariffs ====================

    async fn active_tariff(&mut self, class: ClientClass) -> Result<Option<Tariff>, AppError>;

    /// Retire the active tariff of `class` and insert the next version
    async fn insert_tariff_version(
        &mut self,
        class: ClientClass,
        hourly_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Tariff, AppError>;

    /// Active tariffs, or every version when `include_history`
    async fn list_tariffs(&mut self, include_history: bool) -> Result<Vec<Tariff>, AppError>;

    // ==================== Subscriptions ====================

    async fn active_subscription(
        &mut self,
        client_id: i64,
    ) -> Result<Option<Subscription>, AppError>;

    async fn insert_subscription(
        &mut self,
        client_id: i64,
        since: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Subscription, AppError>;

    async fn deactivate_subscription(&mut self, id: i64) -> Result<bool, AppError>;

    /// List subscriptions, newest activation first
    async fn list_subscriptions(
        &mut self,
        active_only: bool,
    ) -> Result<Vec<SubscriptionRecord>, AppError>;

    /// Number of clients holding an active subscription
    async fn count_subscribers(&mut self) -> Result<i64, AppError>;

    // ==================== Tickets ====================

    async fn insert_ticket(&mut self, ticket: &Ticket) -> Result<Ticket, AppError>;

    /// Find ticket by ID and lock it for the rest of the transaction
    async fn lock_ticket(&mut self, id: i64) -> Result<Option<Ticket>, AppError>;

    async fn ticket_record(&mut self, id: i64) -> Result<Option<TicketRecord>, AppError>;

    async fn open_ticket_for_client(&mut self, client_id: i64)
        -> Result<Option<Ticket>, AppError>;

    /// Persist exit time, tariff, rate and amount of a ticket that is still open
    async fn close_ticket(&mut self, ticket: &Ticket) -> Result<Ticket, AppError>;

    /// List tickets, newest entry first
    async fn list_tickets(
        &mut self,
        filter: &TicketFilter,
        page: &Pagination,
    ) -> Result<(Vec<TicketRecord>, i64), AppError>;

    async fn count_open_tickets(&mut self) -> Result<i64, AppError>;

    // ==================== Payments ====================

    /// Record a payment; a ticket can be paid only once
    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<Payment, AppError>;

    /// List payments, newest first
    async fn list_payments(
        &mut self,
        filter: &PaymentFilter,
        page: &Pagination,
    ) -> Result<(Vec<PaymentRecord>, i64), AppError>;

    /// Sum of amounts paid in `[from, until)`
    async fn sum_payments(
        &mut self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Decimal, AppError>;

    /// Number of payments carrying an amount
    async fn count_valid_payments(&mut self) -> Result<i64, AppError>;

    // ==================== Lifecycle ====================

    /// Make every write of this transaction visible atomically
    async fn commit(self) -> Result<(), AppError>;
}

/// Pagination parameters
#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 1000),
        }
    }

    /// Rows to skip; saturates for page numbers past any real listing
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    /// Slice an already-ordered collection
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(self.limit()).unwrap_or(0))
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 50)
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination() {
        let p = Pagination::new(1, 10);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(), 10);

        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
    }

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination::new(0, 10); // page 0 becomes 1
        assert_eq!(p.page, 1);

        let p = Pagination::new(1, 2000); // per_page capped at 1000
        assert_eq!(p.per_page, 1000);
    }

    #[test]
    fn test_pagination_huge_page() {
        let p = Pagination::new(i64::MAX, 50);
        assert_eq!(p.offset(), i64::MAX);
        assert!(p.apply((1..=10).collect::<Vec<i32>>()).is_empty());
    }

    #[test]
    fn test_pagination_apply() {
        let p = Pagination::new(2, 3);
        assert_eq!(p.apply((1..=10).collect()), vec![4, 5, 6]);

        let p = Pagination::new(5, 3);
        assert!(p.apply((1..=10).collect::<Vec<i32>>()).is_empty());
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(95, 1, 10);
        assert_eq!(meta.total_pages, 10);

        let meta = PaginationMeta::new(100, 1, 10);
        assert_eq!(meta.total_pages, 10);

        let meta = PaginationMeta::new(101, 1, 10);
        assert_eq!(meta.total_pages, 11);
    }
}
