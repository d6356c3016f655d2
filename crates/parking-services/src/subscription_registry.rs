//! Subscription Registry

use chrono::{DateTime, NaiveDate, Utc};
use parking_core::models::{SubscribeOutcome, Subscription, SubscriptionRecord};
use parking_core::traits::ParkingTx;
use parking_core::{AppError, AppResult};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionRegistry;

impl SubscriptionRegistry {
    pub async fn is_subscriber<T: ParkingTx>(&self, tx: &mut T, client_id: i64) -> AppResult<bool> {
        Ok(tx.active_subscription(client_id).await?.is_some())
    }

    /// Activate a subscription; a client that already holds one keeps it
    #[instrument(skip(self, tx))]
    pub async fn subscribe<T: ParkingTx>(
        &self,
        tx: &mut T,
        client_id: i64,
        since: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<SubscribeOutcome> {
        tx.lock_client(client_id)
            .await?
            .ok_or_else(|| AppError::ClientNotFound(client_id.to_string()))?;

        if let Some(existing) = tx.active_subscription(client_id).await? {
            debug!(subscription_id = existing.id, "Client already subscribed");
            return Ok(SubscribeOutcome::AlreadyActive(existing));
        }

        let subscription = tx.insert_subscription(client_id, since, now).await?;
        info!(subscription_id = subscription.id, %since, "Subscription activated");

        Ok(SubscribeOutcome::Activated(subscription))
    }

    /// Deactivate the active subscription of a client
    #[instrument(skip(self, tx))]
    pub async fn cancel<T: ParkingTx>(&self, tx: &mut T, client_id: i64) -> AppResult<Subscription> {
        tx.lock_client(client_id)
            .await?
            .ok_or_else(|| AppError::ClientNotFound(client_id.to_string()))?;

        let mut subscription = tx
            .active_subscription(client_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("active subscription of client {}", client_id)))?;

        tx.deactivate_subscription(subscription.id).await?;
        subscription.active = false;
        info!(subscription_id = subscription.id, "Subscription cancelled");

        Ok(subscription)
    }

    pub async fn list<T: ParkingTx>(
        &self,
        tx: &mut T,
        active_only: bool,
    ) -> AppResult<Vec<SubscriptionRecord>> {
        tx.list_subscriptions(active_only).await
    }
}
