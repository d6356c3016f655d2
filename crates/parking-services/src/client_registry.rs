//! Client Registry
//!
//! Clients are keyed by phone number: an entry or registration with a known
//! phone resolves to the existing client.

use chrono::{DateTime, Utc};
use parking_core::models::{Client, ClientIdentity, MobilityFlag};
use parking_core::traits::{Pagination, ParkingTx};
use parking_core::{AppError, AppResult};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientRegistry;

impl ClientRegistry {
    /// Find the client owning `identity.phone`, creating it if absent
    ///
    /// A concurrent creation of the same phone surfaces as `Contention` so
    /// that the enclosing operation can be retried and resolve the winner.
    #[instrument(skip(self, tx, identity), fields(phone = %identity.phone))]
    pub async fn resolve<T: ParkingTx>(
        &self,
        tx: &mut T,
        identity: &ClientIdentity,
        mobility: MobilityFlag,
        now: DateTime<Utc>,
    ) -> AppResult<Client> {
        let identity = identity.normalized()?;

        if let Some(client) = tx.find_client_by_phone(&identity.phone).await? {
            debug!(client_id = client.id, "Resolved existing client");
            return Ok(client);
        }

        match tx.insert_client(&identity, mobility, now).await {
            Ok(client) => {
                info!(client_id = client.id, "Client created");
                Ok(client)
            }
            Err(AppError::DuplicatePhone(phone)) => Err(AppError::Contention(format!(
                "client with phone {} created concurrently",
                phone
            ))),
            Err(e) => Err(e),
        }
    }

    pub async fn get<T: ParkingTx>(&self, tx: &mut T, client_id: i64) -> AppResult<Client> {
        tx.find_client(client_id)
            .await?
            .ok_or_else(|| AppError::ClientNotFound(client_id.to_string()))
    }

    pub async fn list<T: ParkingTx>(&self, tx: &mut T, page: &Pagination) -> AppResult<(Vec<Client>, i64)> {
        tx.list_clients(page).await
    }

    /// Replace identity fields and mobility flag
    #[instrument(skip(self, tx, identity))]
    pub async fn update<T: ParkingTx>(
        &self,
        tx: &mut T,
        client_id: i64,
        identity: &ClientIdentity,
        mobility: MobilityFlag,
        now: DateTime<Utc>,
    ) -> AppResult<Client> {
        let identity = identity.normalized()?;
        let mut client = tx
            .lock_client(client_id)
            .await?
            .ok_or_else(|| AppError::ClientNotFound(client_id.to_string()))?;

        client.surname = identity.surname;
        client.given_name = identity.given_name;
        client.phone = identity.phone;
        client.mobility = mobility;
        client.updated_at = now;

        let updated = tx.update_client(&client).await?;
        info!(client_id, "Client updated");
        Ok(updated)
    }

    /// Delete a client and its closed history
    ///
    /// A client with an open ticket cannot be deleted.
    #[instrument(skip(self, tx))]
    pub async fn delete<T: ParkingTx>(&self, tx: &mut T, client_id: i64) -> AppResult<()> {
        tx.lock_client(client_id)
            .await?
            .ok_or_else(|| AppError::ClientNotFound(client_id.to_string()))?;

        if let Some(open) = tx.open_ticket_for_client(client_id).await? {
            warn!(ticket_id = open.id, "Refusing to delete client with an open ticket");
            return Err(AppError::ClientHasOpenTicket(client_id));
        }

        tx.delete_client(client_id).await?;
        info!(client_id, "Client deleted");
        Ok(())
    }
}
