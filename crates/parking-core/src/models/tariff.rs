//! Tariff model
//!
//! Hourly rates per client class. Tariffs are versioned: an update retires
//! the active pair and inserts a new one, so a closed ticket keeps pointing
//! at the rate it was billed with.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client class used to pick a rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientClass {
    Subscriber,
    NonSubscriber,
}

impl fmt::Display for ClientClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientClass::Subscriber => write!(f, "subscriber"),
            ClientClass::NonSubscriber => write!(f, "non_subscriber"),
        }
    }
}

impl ClientClass {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "subscriber" => Some(ClientClass::Subscriber),
            "non_subscriber" => Some(ClientClass::NonSubscriber),
            _ => None,
        }
    }

    /// Class of a client given its subscription state
    pub fn for_subscription(is_subscriber: bool) -> Self {
        if is_subscriber {
            ClientClass::Subscriber
        } else {
            ClientClass::NonSubscriber
        }
    }
}

/// Tariff entity (one row per class per version)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    pub id: i64,
    pub client_class: ClientClass,
    pub hourly_rate: Decimal,
    /// Only the latest version of each class is active
    pub active: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// The pair of active rates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffSchedule {
    pub subscriber: Tariff,
    pub non_subscriber: Tariff,
}

impl TariffSchedule {
    /// Active tariff for a class
    pub fn for_class(&self, class: ClientClass) -> &Tariff {
        match class {
            ClientClass::Subscriber => &self.subscriber,
            ClientClass::NonSubscriber => &self.non_subscriber,
        }
    }
}
