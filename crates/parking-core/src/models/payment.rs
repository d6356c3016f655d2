//! Payment model
//!
//! A payment is created exactly once, when its ticket closes, and is never
//! modified afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the fare was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    #[default]
    Cash,
    Card,
    Check,
    Mobile,
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMode::Cash => write!(f, "cash"),
            PaymentMode::Card => write!(f, "card"),
            PaymentMode::Check => write!(f, "check"),
            PaymentMode::Mobile => write!(f, "mobile"),
        }
    }
}

impl PaymentMode {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Some(PaymentMode::Cash),
            "card" => Some(PaymentMode::Card),
            "check" | "cheque" => Some(PaymentMode::Check),
            "mobile" => Some(PaymentMode::Mobile),
            _ => None,
        }
    }
}

/// Payment entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,

    /// Ticket this payment settles
    pub ticket_id: i64,

    pub amount: Decimal,

    pub mode: PaymentMode,

    pub paid_at: DateTime<Utc>,
}

/// Payment to be recorded (id assigned by the store)
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub ticket_id: i64,
    pub amount: Decimal,
    pub mode: PaymentMode,
    pub paid_at: DateTime<Utc>,
}

/// Payment joined with the stay it settles, for listings
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecord {
    #[serde(flatten)]
    pub payment: Payment,
    pub client_id: i64,
    pub surname: String,
    pub given_name: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
}

/// Filters for payment listings
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub client_id: Option<i64>,

    /// Paid at or after this instant
    pub paid_from: Option<DateTime<Utc>>,

    /// Paid strictly before this instant
    pub paid_until: Option<DateTime<Utc>>,
}

impl PaymentFilter {
    /// Whether a payment passes the time window of this filter
    pub fn matches_window(&self, paid_at: DateTime<Utc>) -> bool {
        self.paid_from.map_or(true, |from| paid_at >= from)
            && self.paid_until.map_or(true, |until| paid_at < until)
    }
}
