//! Ticket and payment DTOs

use chrono::{DateTime, NaiveDate, Utc};
use parking_core::models::{ClosedTicket, PaymentMode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exit request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseTicketRequest {
    /// Payment mode, cash when omitted
    #[serde(default)]
    pub mode: PaymentMode,
}

/// Receipt returned on exit
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptResponse {
    pub ticket_id: i64,
    pub client_id: i64,
    pub place_id: i64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    /// Parked time in whole minutes
    pub duration_minutes: i64,
    pub hourly_rate: Option<Decimal>,
    pub amount: Decimal,
    pub payment_id: i64,
    pub mode: PaymentMode,
    pub paid_at: DateTime<Utc>,
}

impl From<ClosedTicket> for ReceiptResponse {
    fn from(closed: ClosedTicket) -> Self {
        let ClosedTicket { ticket, payment } = closed;
        let duration_minutes = ticket
            .exit_time
            .map(|exit| (exit - ticket.entry_time).num_minutes())
            .unwrap_or_default();

        Self {
            ticket_id: ticket.id,
            client_id: ticket.client_id,
            place_id: ticket.place_id,
            entry_time: ticket.entry_time,
            exit_time: ticket.exit_time,
            duration_minutes,
            hourly_rate: ticket.hourly_rate,
            amount: payment.amount,
            payment_id: payment.id,
            mode: payment.mode,
            paid_at: payment.paid_at,
        }
    }
}

/// Ticket listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilterParams {
    /// Only open tickets
    pub open: Option<bool>,
    pub client_id: Option<i64>,
    /// First entry day, inclusive
    pub from: Option<NaiveDate>,
    /// Last entry day, inclusive
    pub to: Option<NaiveDate>,
}

/// Payment listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilterParams {
    pub client_id: Option<i64>,
    /// First payment day, inclusive
    pub from: Option<NaiveDate>,
    /// Last payment day, inclusive
    pub to: Option<NaiveDate>,
}
