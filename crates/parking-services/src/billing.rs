//! Fare computation
//!
//! Elapsed time is rounded UP to whole billing units, then the unit count is
//! raised to the configured minimum:
//!
//! ```text
//! units  = max(ceil(elapsed / unit), minimum_units)
//! amount = units * (unit_minutes / 60) * hourly_rate
//! ```
//!
//! The amount is rounded to cents, midpoint away from zero. With the default
//! one-hour unit and no minimum, a stay of 2h30 costs 3 hours and a stay of
//! zero length costs nothing.

use chrono::{DateTime, Utc};
use parking_core::config::BillingConfig;
use parking_core::models::ClientClass;
use parking_core::{AppError, AppResult};
use rust_decimal::{Decimal, RoundingStrategy};

/// Pure fare calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPolicy {
    unit_minutes: i64,
    minimum_units: i64,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            unit_minutes: 60,
            minimum_units: 0,
        }
    }
}

impl BillingPolicy {
    pub fn new(unit_minutes: i64, minimum_units: i64) -> AppResult<Self> {
        if unit_minutes <= 0 {
            return Err(AppError::Config(format!(
                "billing unit must be positive, got {} minutes",
                unit_minutes
            )));
        }
        if minimum_units < 0 {
            return Err(AppError::Config(format!(
                "minimum billable units cannot be negative, got {}",
                minimum_units
            )));
        }

        Ok(Self {
            unit_minutes,
            minimum_units,
        })
    }

    pub fn from_config(config: &BillingConfig) -> AppResult<Self> {
        Self::new(config.billing_unit_minutes, config.minimum_billable_units)
    }

    /// Tariff class for a client's subscription state
    pub fn class_for(is_subscriber: bool) -> ClientClass {
        ClientClass::for_subscription(is_subscriber)
    }

    /// Number of units billed for a stay
    pub fn billable_units(&self, entry: DateTime<Utc>, exit: DateTime<Utc>) -> AppResult<i64> {
        if exit < entry {
            return Err(AppError::InvalidInterval {
                entry: entry.to_rfc3339(),
                exit: exit.to_rfc3339(),
            });
        }

        let elapsed_ms = (exit - entry).num_milliseconds();
        let unit_ms = self.unit_minutes * 60_000;
        let units = (elapsed_ms + unit_ms - 1) / unit_ms;

        Ok(units.max(self.minimum_units))
    }

    /// Amount due for a stay at `hourly_rate`
    pub fn fare(
        &self,
        entry: DateTime<Utc>,
        exit: DateTime<Utc>,
        hourly_rate: Decimal,
    ) -> AppResult<Decimal> {
        if hourly_rate <= Decimal::ZERO {
            return Err(AppError::InvalidRate(hourly_rate.to_string()));
        }

        let units = self.billable_units(entry, exit)?;
        let billed_hours = Decimal::from(units * self.unit_minutes) / Decimal::from(60);

        Ok((billed_hours * hourly_rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}
