//! Tariff, place and subscription listing DTOs

use parking_core::models::PlaceType;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Replace both hourly rates at once
#[derive(Debug, Clone, Deserialize)]
pub struct TariffUpdateRequest {
    pub subscriber_rate: Decimal,
    pub non_subscriber_rate: Decimal,
}

/// `GET /tariffs?history=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TariffListParams {
    /// Include superseded versions
    #[serde(default)]
    pub history: bool,
}

/// `GET /places?type=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceListParams {
    #[serde(rename = "type")]
    pub place_type: Option<PlaceType>,
}

/// `GET /subscriptions?active=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionListParams {
    /// Only subscriptions still in force
    #[serde(default)]
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tariff_update_accepts_numbers_and_strings() {
        let req: TariffUpdateRequest =
            serde_json::from_str(r#"{"subscriber_rate": 2.5, "non_subscriber_rate": "4.00"}"#)
                .unwrap();
        assert_eq!(req.subscriber_rate, dec!(2.5));
        assert_eq!(req.non_subscriber_rate, dec!(4.00));
    }
}
