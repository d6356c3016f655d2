//! PostgreSQL storage backend
//!
//! Every engine operation runs in one database transaction. Allocation
//! claims a place with `FOR UPDATE SKIP LOCKED`, so concurrent entries never
//! wait on each other and never receive the same place; closing locks the
//! reservation row, so a second close of the same ticket blocks until the
//! first commits and then observes it closed.

use crate::error::{is_unique_violation, map_sqlx};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_core::{
    models::{
        Client, ClientClass, ClientIdentity, MobilityFlag, NewPayment, Occupancy, Payment,
        PaymentFilter, PaymentMode, PaymentRecord, Place, PlaceType, Subscription,
        SubscriptionRecord, Tariff, Ticket, TicketFilter, TicketRecord,
    },
    traits::{Pagination, ParkingStore, ParkingTx},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of ParkingStore
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ParkingStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> AppResult<PgTx> {
        let tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        Ok(PgTx { tx })
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx("ping database", e))?;
        Ok(())
    }
}

/// One open PostgreSQL transaction
///
/// Dropping it without calling `commit` rolls back.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ParkingTx for PgTx {
    // ==================== Clients ====================

    async fn find_client(&mut self, id: i64) -> AppResult<Option<Client>> {
        let row = sqlx::query_as::<Postgres, ClientRow>(
            r#"
            SELECT id, surname, given_name, phone, mobility, created_at, updated_at
            FROM clients
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("find client", e))?;

        Ok(row.map(Into::into))
    }

    async fn find_client_by_phone(&mut self, phone: &str) -> AppResult<Option<Client>> {
        let row = sqlx::query_as::<Postgres, ClientRow>(
            r#"
            SELECT id, surname, given_name, phone, mobility, created_at, updated_at
            FROM clients
            WHERE phone = $1
            "#,
        )
        .bind(phone)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("find client by phone", e))?;

        Ok(row.map(Into::into))
    }

    async fn lock_client(&mut self, id: i64) -> AppResult<Option<Client>> {
        let row = sqlx::query_as::<Postgres, ClientRow>(
            r#"
            SELECT id, surname, given_name, phone, mobility, created_at, updated_at
            FROM clients
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("lock client", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, identity))]
    async fn insert_client(
        &mut self,
        identity: &ClientIdentity,
        mobility: MobilityFlag,
        now: DateTime<Utc>,
    ) -> AppResult<Client> {
        debug!("Creating client with phone {}", identity.phone);

        let row = sqlx::query_as::<Postgres, ClientRow>(
            r#"
            INSERT INTO clients (surname, given_name, phone, mobility, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, surname, given_name, phone, mobility, created_at, updated_at
            "#,
        )
        .bind(&identity.surname)
        .bind(&identity.given_name)
        .bind(&identity.phone)
        .bind(mobility.to_string())
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicatePhone(identity.phone.clone())
            } else {
                map_sqlx("create client", e)
            }
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self, client), fields(client_id = client.id))]
    async fn update_client(&mut self, client: &Client) -> AppResult<Client> {
        let row = sqlx::query_as::<Postgres, ClientRow>(
            r#"
            UPDATE clients
            SET surname = $2,
                given_name = $3,
                phone = $4,
                mobility = $5,
                updated_at = $6
            WHERE id = $1
            RETURNING id, surname, given_name, phone, mobility, created_at, updated_at
            "#,
        )
        .bind(client.id)
        .bind(&client.surname)
        .bind(&client.given_name)
        .bind(&client.phone)
        .bind(client.mobility.to_string())
        .bind(client.updated_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicatePhone(client.phone.clone())
            } else {
                map_sqlx("update client", e)
            }
        })?;

        row.map(Into::into)
            .ok_or_else(|| AppError::ClientNotFound(client.id.to_string()))
    }

    #[instrument(skip(self))]
    async fn delete_client(&mut self, id: i64) -> AppResult<bool> {
        // reservations, their payments and subscriptions cascade
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("delete client", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_clients(&mut self, page: &Pagination) -> AppResult<(Vec<Client>, i64)> {
        let rows = sqlx::query_as::<Postgres, ClientRow>(
            r#"
            SELECT id, surname, given_name, phone, mobility, created_at, updated_at
            FROM clients
            ORDER BY surname, given_name, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("list clients", e))?;

        let total = self.count_clients().await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn count_clients(&mut self) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clients")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("count clients", e))?;

        Ok(count)
    }

    // ==================== Places ====================

    async fn insert_place(&mut self, number: i32, place_type: PlaceType) -> AppResult<Place> {
        let row = sqlx::query_as::<Postgres, PlaceRow>(
            r#"
            INSERT INTO places (number, place_type, available)
            VALUES ($1, $2, TRUE)
            RETURNING id, number, place_type, available
            "#,
        )
        .bind(number)
        .bind(place_type.to_string())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("create place", e))?;

        Ok(row.into())
    }

    async fn find_place(&mut self, id: i64) -> AppResult<Option<Place>> {
        let row = sqlx::query_as::<Postgres, PlaceRow>(
            "SELECT id, number, place_type, available FROM places WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("find place", e))?;

        Ok(row.map(Into::into))
    }

    async fn list_places(
        &mut self,
        place_type: Option<PlaceType>,
        available_only: bool,
    ) -> AppResult<Vec<Place>> {
        let rows = sqlx::query_as::<Postgres, PlaceRow>(
            r#"
            SELECT id, number, place_type, available
            FROM places
            WHERE ($1::TEXT IS NULL OR place_type = $1)
              AND (NOT $2 OR available)
            ORDER BY number
            "#,
        )
        .bind(place_type.map(|t| t.to_string()))
        .bind(available_only)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("list places", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn claim_free_place(&mut self, place_type: PlaceType) -> AppResult<Option<Place>> {
        let row = sqlx::query_as::<Postgres, PlaceRow>(
            r#"
            UPDATE places
            SET available = FALSE
            WHERE id = (
                SELECT id
                FROM places
                WHERE place_type = $1 AND available
                ORDER BY number
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, number, place_type, available
            "#,
        )
        .bind(place_type.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("claim free place", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn release_place(&mut self, id: i64) -> AppResult<bool> {
        let released = sqlx::query(
            "UPDATE places SET available = TRUE WHERE id = $1 AND NOT available",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("release place", e))?;

        if released.rows_affected() > 0 {
            return Ok(true);
        }

        match self.find_place(id).await? {
            Some(_) => Ok(false),
            None => Err(AppError::PlaceNotFound(id.to_string())),
        }
    }

    async fn occupancy(&mut self) -> AppResult<Occupancy> {
        let (total, occupied): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE NOT available)
            FROM places
            "#,
        )
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("compute occupancy", e))?;

        Ok(Occupancy { total, occupied })
    }

    // ==================== Tariffs ====================

    async fn active_tariff(&mut self, class: ClientClass) -> AppResult<Option<Tariff>> {
        let row = sqlx::query_as::<Postgres, TariffRow>(
            r#"
            SELECT id, client_class, hourly_rate, active, version, created_at
            FROM tariffs
            WHERE client_class = $1 AND active
            "#,
        )
        .bind(class.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("find active tariff", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn insert_tariff_version(
        &mut self,
        class: ClientClass,
        hourly_rate: Decimal,
        now: DateTime<Utc>,
    ) -> AppResult<Tariff> {
        // Serialises concurrent tariff updates; plain readers are not blocked
        sqlx::query("LOCK TABLE tariffs IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("lock tariffs", e))?;

        sqlx::query("UPDATE tariffs SET active = FALSE WHERE client_class = $1 AND active")
            .bind(class.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("retire tariff", e))?;

        let row = sqlx::query_as::<Postgres, TariffRow>(
            r#"
            INSERT INTO tariffs (client_class, hourly_rate, active, version, created_at)
            VALUES (
                $1, $2, TRUE,
                COALESCE((SELECT MAX(version) FROM tariffs WHERE client_class = $1), 0) + 1,
                $3
            )
            RETURNING id, client_class, hourly_rate, active, version, created_at
            "#,
        )
        .bind(class.to_string())
        .bind(hourly_rate)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("insert tariff", e))?;

        Ok(row.into())
    }

    async fn list_tariffs(&mut self, include_history: bool) -> AppResult<Vec<Tariff>> {
        let rows = sqlx::query_as::<Postgres, TariffRow>(
            r#"
            SELECT id, client_class, hourly_rate, active, version, created_at
            FROM tariffs
            WHERE $1 OR active
            ORDER BY client_class DESC, version DESC
            "#,
        )
        .bind(include_history)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("list tariffs", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ==================== Subscriptions ====================

    async fn active_subscription(&mut self, client_id: i64) -> AppResult<Option<Subscription>> {
        let row = sqlx::query_as::<Postgres, SubscriptionRow>(
            r#"
            SELECT id, client_id, since, active, created_at
            FROM subscriptions
            WHERE client_id = $1 AND active
            "#,
        )
        .bind(client_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("find active subscription", e))?;

        Ok(row.map(Into::into))
    }

    async fn insert_subscription(
        &mut self,
        client_id: i64,
        since: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        let row = sqlx::query_as::<Postgres, SubscriptionRow>(
            r#"
            INSERT INTO subscriptions (client_id, since, active, created_at)
            VALUES ($1, $2, TRUE, $3)
            RETURNING id, client_id, since, active, created_at
            "#,
        )
        .bind(client_id)
        .bind(since)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("create subscription", e))?;

        Ok(row.into())
    }

    async fn deactivate_subscription(&mut self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("UPDATE subscriptions SET active = FALSE WHERE id = $1 AND active")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("deactivate subscription", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_subscriptions(&mut self, active_only: bool) -> AppResult<Vec<SubscriptionRecord>> {
        let rows = sqlx::query_as::<Postgres, SubscriptionRecordRow>(
            r#"
            SELECT s.id, s.client_id, s.since, s.active, s.created_at,
                   c.surname, c.given_name, c.phone
            FROM subscriptions s
            JOIN clients c ON c.id = s.client_id
            WHERE (NOT $1 OR s.active)
            ORDER BY s.since DESC, s.id DESC
            "#,
        )
        .bind(active_only)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("list subscriptions", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_subscribers(&mut self) -> AppResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT client_id) FROM subscriptions WHERE active")
                .fetch_one(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx("count subscribers", e))?;

        Ok(count)
    }

    // ==================== Tickets ====================

    #[instrument(skip(self, ticket), fields(client_id = ticket.client_id, place_id = ticket.place_id))]
    async fn insert_ticket(&mut self, ticket: &Ticket) -> AppResult<Ticket> {
        let row = sqlx::query_as::<Postgres, TicketRow>(
            r#"
            INSERT INTO reservations (client_id, place_id, entry_time)
            VALUES ($1, $2, $3)
            RETURNING id, client_id, place_id, entry_time, exit_time,
                      tariff_id, hourly_rate, amount
            "#,
        )
        .bind(ticket.client_id)
        .bind(ticket.place_id)
        .bind(ticket.entry_time)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("create ticket", e))?;

        Ok(row.into())
    }

    async fn lock_ticket(&mut self, id: i64) -> AppResult<Option<Ticket>> {
        let row = sqlx::query_as::<Postgres, TicketRow>(
            r#"
            SELECT id, client_id, place_id, entry_time, exit_time,
                   tariff_id, hourly_rate, amount
            FROM reservations
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("lock ticket", e))?;

        Ok(row.map(Into::into))
    }

    async fn ticket_record(&mut self, id: i64) -> AppResult<Option<TicketRecord>> {
        let row = sqlx::query_as::<Postgres, TicketRecordRow>(
            r#"
            SELECT r.id, r.client_id, r.place_id, r.entry_time, r.exit_time,
                   r.tariff_id, r.hourly_rate, r.amount,
                   c.surname, c.given_name, p.number AS place_number, p.place_type
            FROM reservations r
            JOIN clients c ON c.id = r.client_id
            JOIN places p ON p.id = r.place_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("find ticket", e))?;

        Ok(row.map(Into::into))
    }

    async fn open_ticket_for_client(&mut self, client_id: i64) -> AppResult<Option<Ticket>> {
        let row = sqlx::query_as::<Postgres, TicketRow>(
            r#"
            SELECT id, client_id, place_id, entry_time, exit_time,
                   tariff_id, hourly_rate, amount
            FROM reservations
            WHERE client_id = $1 AND exit_time IS NULL
            ORDER BY entry_time
            LIMIT 1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("find open ticket", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, ticket), fields(ticket_id = ticket.id))]
    async fn close_ticket(&mut self, ticket: &Ticket) -> AppResult<Ticket> {
        let row = sqlx::query_as::<Postgres, TicketRow>(
            r#"
            UPDATE reservations
            SET exit_time = $2,
                tariff_id = $3,
                hourly_rate = $4,
                amount = $5
            WHERE id = $1 AND exit_time IS NULL
            RETURNING id, client_id, place_id, entry_time, exit_time,
                      tariff_id, hourly_rate, amount
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.exit_time)
        .bind(ticket.tariff_id)
        .bind(ticket.hourly_rate)
        .bind(ticket.amount)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("close ticket", e))?;

        row.map(Into::into)
            .ok_or(AppError::AlreadyClosed(ticket.id))
    }

    async fn list_tickets(
        &mut self,
        filter: &TicketFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<TicketRecord>, i64)> {
        let rows = sqlx::query_as::<Postgres, TicketRecordRow>(
            r#"
            SELECT r.id, r.client_id, r.place_id, r.entry_time, r.exit_time,
                   r.tariff_id, r.hourly_rate, r.amount,
                   c.surname, c.given_name, p.number AS place_number, p.place_type
            FROM reservations r
            JOIN clients c ON c.id = r.client_id
            JOIN places p ON p.id = r.place_id
            WHERE (NOT $1 OR r.exit_time IS NULL)
              AND ($2::BIGINT IS NULL OR r.client_id = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR r.entry_time >= $3)
              AND ($4::TIMESTAMPTZ IS NULL OR r.entry_time < $4)
            ORDER BY r.entry_time DESC, r.id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.open_only)
        .bind(filter.client_id)
        .bind(filter.entered_from)
        .bind(filter.entered_until)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("list tickets", e))?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM reservations r
            WHERE (NOT $1 OR r.exit_time IS NULL)
              AND ($2::BIGINT IS NULL OR r.client_id = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR r.entry_time >= $3)
              AND ($4::TIMESTAMPTZ IS NULL OR r.entry_time < $4)
            "#,
        )
        .bind(filter.open_only)
        .bind(filter.client_id)
        .bind(filter.entered_from)
        .bind(filter.entered_until)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("count tickets", e))?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn count_open_tickets(&mut self) -> AppResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM reservations WHERE exit_time IS NULL")
                .fetch_one(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx("count open tickets", e))?;

        Ok(count)
    }

    // ==================== Payments ====================

    #[instrument(skip(self, payment), fields(ticket_id = payment.ticket_id))]
    async fn insert_payment(&mut self, payment: &NewPayment) -> AppResult<Payment> {
        let row = sqlx::query_as::<Postgres, PaymentRow>(
            r#"
            INSERT INTO payments (reservation_id, amount, mode, paid_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, reservation_id AS ticket_id, amount, mode, paid_at
            "#,
        )
        .bind(payment.ticket_id)
        .bind(payment.amount)
        .bind(payment.mode.to_string())
        .bind(payment.paid_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("ticket {} is already paid", payment.ticket_id))
            } else {
                map_sqlx("record payment", e)
            }
        })?;

        Ok(row.into())
    }

    async fn list_payments(
        &mut self,
        filter: &PaymentFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<PaymentRecord>, i64)> {
        let rows = sqlx::query_as::<Postgres, PaymentRecordRow>(
            r#"
            SELECT p.id, p.reservation_id AS ticket_id, p.amount, p.mode, p.paid_at,
                   r.client_id, c.surname, c.given_name, r.entry_time, r.exit_time
            FROM payments p
            JOIN reservations r ON r.id = p.reservation_id
            JOIN clients c ON c.id = r.client_id
            WHERE ($1::BIGINT IS NULL OR r.client_id = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR p.paid_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR p.paid_at < $3)
            ORDER BY p.paid_at DESC, p.id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.client_id)
        .bind(filter.paid_from)
        .bind(filter.paid_until)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("list payments", e))?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM payments p
            JOIN reservations r ON r.id = p.reservation_id
            WHERE ($1::BIGINT IS NULL OR r.client_id = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR p.paid_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR p.paid_at < $3)
            "#,
        )
        .bind(filter.client_id)
        .bind(filter.paid_from)
        .bind(filter.paid_until)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("count payments", e))?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn sum_payments(&mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> AppResult<Decimal> {
        let (sum,): (Decimal,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM payments
            WHERE paid_at >= $1 AND paid_at < $2
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("sum payments", e))?;

        Ok(sum)
    }

    async fn count_valid_payments(&mut self) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(amount) FROM payments")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("count payments", e))?;

        Ok(count)
    }

    // ==================== Lifecycle ====================

    async fn commit(self) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx("commit transaction", e))
    }
}

// ==================== Row types ====================

#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    id: i64,
    surname: String,
    given_name: String,
    phone: String,
    mobility: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Self {
            id: row.id,
            surname: row.surname,
            given_name: row.given_name,
            phone: row.phone,
            mobility: MobilityFlag::from_str(&row.mobility).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlaceRow {
    id: i64,
    number: i32,
    place_type: String,
    available: bool,
}

impl From<PlaceRow> for Place {
    fn from(row: PlaceRow) -> Self {
        Self {
            id: row.id,
            number: row.number,
            place_type: PlaceType::from_str(&row.place_type).unwrap_or(PlaceType::Standard),
            available: row.available,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TariffRow {
    id: i64,
    client_class: String,
    hourly_rate: Decimal,
    active: bool,
    version: i32,
    created_at: DateTime<Utc>,
}

impl From<TariffRow> for Tariff {
    fn from(row: TariffRow) -> Self {
        Self {
            id: row.id,
            client_class: ClientClass::from_str(&row.client_class)
                .unwrap_or(ClientClass::NonSubscriber),
            hourly_rate: row.hourly_rate,
            active: row.active,
            version: row.version,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    client_id: i64,
    since: NaiveDate,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            since: row.since,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRecordRow {
    #[sqlx(flatten)]
    subscription: SubscriptionRow,
    surname: String,
    given_name: String,
    phone: String,
}

impl From<SubscriptionRecordRow> for SubscriptionRecord {
    fn from(row: SubscriptionRecordRow) -> Self {
        Self {
            subscription: row.subscription.into(),
            surname: row.surname,
            given_name: row.given_name,
            phone: row.phone,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: i64,
    client_id: i64,
    place_id: i64,
    entry_time: DateTime<Utc>,
    exit_time: Option<DateTime<Utc>>,
    tariff_id: Option<i64>,
    hourly_rate: Option<Decimal>,
    amount: Option<Decimal>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            place_id: row.place_id,
            entry_time: row.entry_time,
            exit_time: row.exit_time,
            tariff_id: row.tariff_id,
            hourly_rate: row.hourly_rate,
            amount: row.amount,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketRecordRow {
    #[sqlx(flatten)]
    ticket: TicketRow,
    surname: String,
    given_name: String,
    place_number: i32,
    place_type: String,
}

impl From<TicketRecordRow> for TicketRecord {
    fn from(row: TicketRecordRow) -> Self {
        let ticket: Ticket = row.ticket.into();
        Self {
            status: ticket.status(),
            ticket,
            surname: row.surname,
            given_name: row.given_name,
            place_number: row.place_number,
            place_type: PlaceType::from_str(&row.place_type).unwrap_or(PlaceType::Standard),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    ticket_id: i64,
    amount: Decimal,
    mode: String,
    paid_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            ticket_id: row.ticket_id,
            amount: row.amount,
            mode: PaymentMode::from_str(&row.mode).unwrap_or_default(),
            paid_at: row.paid_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRecordRow {
    #[sqlx(flatten)]
    payment: PaymentRow,
    client_id: i64,
    surname: String,
    given_name: String,
    entry_time: DateTime<Utc>,
    exit_time: Option<DateTime<Utc>>,
}

impl From<PaymentRecordRow> for PaymentRecord {
    fn from(row: PaymentRecordRow) -> Self {
        Self {
            payment: row.payment.into(),
            client_id: row.client_id,
            surname: row.surname,
            given_name: row.given_name,
            entry_time: row.entry_time,
            exit_time: row.exit_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::run_migrations;
    use rust_decimal_macros::dec;

    async fn store() -> PgStore {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/parking_test".to_string());
        let pool = PgPool::connect(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        PgStore::new(pool)
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_claim_skips_locked_place() {
        let store = store().await;

        let mut setup = store.begin().await.unwrap();
        let base = 100_000 + (Utc::now().timestamp_subsec_micros() as i32);
        setup.insert_place(base, PlaceType::Pmr).await.unwrap();
        setup.insert_place(base + 1, PlaceType::Pmr).await.unwrap();
        setup.commit().await.unwrap();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        let a = first.claim_free_place(PlaceType::Pmr).await.unwrap().unwrap();
        let b = second.claim_free_place(PlaceType::Pmr).await.unwrap().unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_tariff_versions() {
        let store = store().await;

        let mut tx = store.begin().await.unwrap();
        let v1 = tx
            .insert_tariff_version(ClientClass::Subscriber, dec!(2.0), Utc::now())
            .await
            .unwrap();
        let v2 = tx
            .insert_tariff_version(ClientClass::Subscriber, dec!(2.5), Utc::now())
            .await
            .unwrap();
        assert_eq!(v2.version, v1.version + 1);

        let active = tx.active_tariff(ClientClass::Subscriber).await.unwrap().unwrap();
        assert_eq!(active.id, v2.id);
        // rolled back on drop
    }
}
