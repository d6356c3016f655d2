//! Subscription model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Subscription entity
///
/// A client holds at most one active subscription at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub client_id: i64,
    /// Activation date
    pub since: NaiveDate,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Subscription joined with the subscriber's name, for listings
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRecord {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub surname: String,
    pub given_name: String,
    pub phone: String,
}

/// Result of a subscribe request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "subscription", rename_all = "snake_case")]
pub enum SubscribeOutcome {
    /// A new subscription was created
    Activated(Subscription),
    /// The client was already subscribed; nothing changed
    AlreadyActive(Subscription),
}

impl SubscribeOutcome {
    pub fn subscription(&self) -> &Subscription {
        match self {
            SubscribeOutcome::Activated(s) | SubscribeOutcome::AlreadyActive(s) => s,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, SubscribeOutcome::Activated(_))
    }
}
