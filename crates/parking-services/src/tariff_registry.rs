//! Tariff Registry
//!
//! Hourly rates per client class. Every update writes a new version of both
//! rates; older versions stay in place for history and for the tickets that
//! reference them.

use chrono::{DateTime, Utc};
use parking_core::models::{ClientClass, Tariff, TariffSchedule};
use parking_core::traits::ParkingTx;
use parking_core::{AppError, AppResult};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct TariffRegistry;

impl TariffRegistry {
    /// Active tariff of a class
    pub async fn rate_for<T: ParkingTx>(&self, tx: &mut T, class: ClientClass) -> AppResult<Tariff> {
        tx.active_tariff(class)
            .await?
            .ok_or_else(|| AppError::TariffNotFound(class.to_string()))
    }

    /// Both active tariffs
    pub async fn current<T: ParkingTx>(&self, tx: &mut T) -> AppResult<TariffSchedule> {
        Ok(TariffSchedule {
            subscriber: self.rate_for(tx, ClientClass::Subscriber).await?,
            non_subscriber: self.rate_for(tx, ClientClass::NonSubscriber).await?,
        })
    }

    /// Replace both rates
    ///
    /// Fails with `InvalidRate` before writing anything if either rate is not
    /// strictly positive.
    #[instrument(skip(self, tx))]
    pub async fn update<T: ParkingTx>(
        &self,
        tx: &mut T,
        subscriber_rate: Decimal,
        non_subscriber_rate: Decimal,
        now: DateTime<Utc>,
    ) -> AppResult<TariffSchedule> {
        validate_rate(subscriber_rate)?;
        validate_rate(non_subscriber_rate)?;

        let subscriber = tx
            .insert_tariff_version(ClientClass::Subscriber, subscriber_rate, now)
            .await?;
        let non_subscriber = tx
            .insert_tariff_version(ClientClass::NonSubscriber, non_subscriber_rate, now)
            .await?;

        info!(
            subscriber = %subscriber.hourly_rate,
            non_subscriber = %non_subscriber.hourly_rate,
            version = subscriber.version,
            "Tariffs updated"
        );

        Ok(TariffSchedule {
            subscriber,
            non_subscriber,
        })
    }

    pub async fn list<T: ParkingTx>(&self, tx: &mut T, include_history: bool) -> AppResult<Vec<Tariff>> {
        tx.list_tariffs(include_history).await
    }
}

/// Rates must be strictly positive
pub fn validate_rate(rate: Decimal) -> AppResult<()> {
    if rate <= Decimal::ZERO {
        warn!(%rate, "Rejected non-positive rate");
        return Err(AppError::InvalidRate(rate.to_string()));
    }
    Ok(())
}
