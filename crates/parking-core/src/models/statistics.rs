//! Derived statistics

use rust_decimal::Decimal;
use serde::Serialize;

/// Point-in-time snapshot of the car park
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParkingStatistics {
    pub total_places: i64,
    pub occupied_places: i64,
    /// Occupied / total, in percent
    pub occupancy_rate: f64,
    /// 100 - occupancy rate (0 when there are no places)
    pub free_rate: f64,
    /// Sum of payments made during the current calendar day
    pub daily_revenue: Decimal,
    pub total_clients: i64,
    pub total_subscribers: i64,
    pub valid_payments: i64,
    pub open_tickets: i64,
}
