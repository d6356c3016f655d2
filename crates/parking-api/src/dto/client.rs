//! Client and subscription DTOs
//!
//! Request and response types for client management endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use parking_core::models::{Client, ClientIdentity, MobilityFlag, SubscribeOutcome, Subscription};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Client identity as sent by gates and back-office tools
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClientRequest {
    /// Family name
    #[validate(length(min = 1, max = 100, message = "Surname is required"))]
    pub surname: String,

    /// First name
    #[validate(length(min = 1, max = 100, message = "Given name is required"))]
    pub given_name: String,

    /// Phone number, the lookup key for returning clients
    #[validate(length(min = 1, max = 30, message = "Phone is required"))]
    pub phone: String,

    /// Reduced mobility
    #[serde(default)]
    pub pmr: bool,
}

impl ClientRequest {
    pub fn identity(&self) -> ClientIdentity {
        ClientIdentity::new(&self.surname, &self.given_name, &self.phone)
    }

    pub fn mobility(&self) -> MobilityFlag {
        MobilityFlag::from_pmr(self.pmr)
    }
}

/// Client response
#[derive(Debug, Clone, Serialize)]
pub struct ClientResponse {
    pub id: i64,
    pub surname: String,
    pub given_name: String,
    pub phone: String,
    pub mobility: MobilityFlag,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Client> for ClientResponse {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            surname: client.surname,
            given_name: client.given_name,
            phone: client.phone,
            mobility: client.mobility,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}

/// Subscribe an existing client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeRequest {
    /// Activation date, today when omitted
    pub since: Option<NaiveDate>,
}

/// Subscribe by identity, registering the client when unknown
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubscribeIdentityRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub client: ClientRequest,

    /// Activation date, today when omitted
    pub since: Option<NaiveDate>,
}

/// Result of a subscribe request
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    pub client_id: i64,
    pub subscription: Subscription,
    /// `false` when the client already had an active subscription
    pub created: bool,
}

impl SubscriptionResponse {
    pub fn from_outcome(client_id: i64, outcome: SubscribeOutcome) -> Self {
        let created = outcome.was_created();
        let subscription = match outcome {
            SubscribeOutcome::Activated(s) | SubscribeOutcome::AlreadyActive(s) => s,
        };
        Self {
            client_id,
            subscription,
            created,
        }
    }
}
