//! Ticket (reservation) model
//!
//! A ticket records one stay: it opens at entry against an allocated place
//! and closes at exit, when the fare is computed and paid. The lifecycle has
//! exactly two states:
//! 1. Open: entry recorded, place occupied, no payment
//! 2. Closed: exit recorded, payment recorded, place released

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Payment, PlaceType};

/// Ticket state, derived from the exit timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::Open => write!(f, "open"),
            TicketStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Ticket entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique identifier
    pub id: i64,

    /// Parked client
    pub client_id: i64,

    /// Allocated place
    pub place_id: i64,

    /// Entry timestamp
    pub entry_time: DateTime<Utc>,

    /// Exit timestamp; `None` while the ticket is open
    pub exit_time: Option<DateTime<Utc>>,

    /// Tariff version used for billing, assigned at close
    pub tariff_id: Option<i64>,

    /// Hourly rate resolved at close
    pub hourly_rate: Option<Decimal>,

    /// Amount charged at close
    pub amount: Option<Decimal>,
}

impl Ticket {
    /// Create an open ticket (id assigned by the store)
    pub fn open(client_id: i64, place_id: i64, entry_time: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            client_id,
            place_id,
            entry_time,
            exit_time: None,
            tariff_id: None,
            hourly_rate: None,
            amount: None,
        }
    }

    #[inline]
    pub fn status(&self) -> TicketStatus {
        if self.exit_time.is_some() {
            TicketStatus::Closed
        } else {
            TicketStatus::Open
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }
}

/// Ticket joined with client and place details, for listings
#[derive(Debug, Clone, Serialize)]
pub struct TicketRecord {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub status: TicketStatus,
    pub surname: String,
    pub given_name: String,
    pub place_number: i32,
    pub place_type: PlaceType,
}

/// Filters for ticket listings
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Only tickets without exit timestamp
    pub open_only: bool,

    pub client_id: Option<i64>,

    /// Entry at or after this instant
    pub entered_from: Option<DateTime<Utc>>,

    /// Entry strictly before this instant
    pub entered_until: Option<DateTime<Utc>>,
}

impl TicketFilter {
    /// Whether a ticket passes this filter
    pub fn matches(&self, ticket: &Ticket) -> bool {
        if self.open_only && !ticket.is_open() {
            return false;
        }
        if let Some(client_id) = self.client_id {
            if ticket.client_id != client_id {
                return false;
            }
        }
        if let Some(from) = self.entered_from {
            if ticket.entry_time < from {
                return false;
            }
        }
        if let Some(until) = self.entered_until {
            if ticket.entry_time >= until {
                return false;
            }
        }
        true
    }
}

/// Result of a successful exit
#[derive(Debug, Clone, Serialize)]
pub struct ClosedTicket {
    pub ticket: Ticket,
    pub payment: Payment,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_follows_exit_time() {
        let mut ticket = Ticket::open(1, 2, Utc::now());
        assert_eq!(ticket.status(), TicketStatus::Open);
        assert!(ticket.is_open());

        ticket.exit_time = Some(Utc::now());
        assert_eq!(ticket.status(), TicketStatus::Closed);
    }

    #[test]
    fn test_filter_matches() {
        let now = Utc::now();
        let mut ticket = Ticket::open(7, 1, now);

        let filter = TicketFilter {
            open_only: true,
            client_id: Some(7),
            entered_from: Some(now - Duration::hours(1)),
            entered_until: Some(now + Duration::hours(1)),
        };
        assert!(filter.matches(&ticket));

        ticket.exit_time = Some(now);
        assert!(!filter.matches(&ticket));

        let other_client = TicketFilter {
            client_id: Some(8),
            ..Default::default()
        };
        assert!(!other_client.matches(&ticket));

        let until_is_exclusive = TicketFilter {
            entered_until: Some(now),
            ..Default::default()
        };
        assert!(!until_is_exclusive.matches(&ticket));
    }
}
