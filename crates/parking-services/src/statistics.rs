//! Statistics Aggregator
//!
//! Read-only projections over the committed state. Nothing is cached.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use parking_core::models::{Occupancy, ParkingStatistics};
use parking_core::traits::ParkingTx;
use parking_core::AppResult;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy)]
pub struct StatisticsAggregator {
    tz: Tz,
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self { tz: chrono_tz::UTC }
    }
}

impl StatisticsAggregator {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub async fn snapshot<T: ParkingTx>(&self, tx: &mut T, now: DateTime<Utc>) -> AppResult<ParkingStatistics> {
        let occupancy = tx.occupancy().await?;
        let (day_start, day_end) = day_bounds(&self.tz, now.with_timezone(&self.tz).date_naive());

        let (occupancy_rate, free_rate) = rates(&occupancy);

        Ok(ParkingStatistics {
            total_places: occupancy.total,
            occupied_places: occupancy.occupied,
            occupancy_rate,
            free_rate,
            daily_revenue: tx.sum_payments(day_start, day_end).await?,
            total_clients: tx.count_clients().await?,
            total_subscribers: tx.count_subscribers().await?,
            valid_payments: tx.count_valid_payments().await?,
            open_tickets: tx.count_open_tickets().await?,
        })
    }
}

/// Occupancy and free-place percentages, rounded to two decimals
///
/// An empty pool reports 0% for both.
pub fn rates(occupancy: &Occupancy) -> (f64, f64) {
    if occupancy.total <= 0 {
        return (0.0, 0.0);
    }

    let occupied = (Decimal::from(occupancy.occupied) * dec!(100) / Decimal::from(occupancy.total))
        .round_dp(2);
    let free = dec!(100) - occupied;

    (
        occupied.to_f64().unwrap_or_default(),
        free.to_f64().unwrap_or_default(),
    )
}

/// Start of a calendar day in `tz`, as a UTC instant
pub fn day_start(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);

    // Some zones skip midnight on DST changes
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// `[start, end)` of a calendar day in `tz`
pub fn day_bounds(tz: &Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.succ_opt().unwrap_or(date);
    (day_start(tz, date), day_start(tz, next))
}
