//! Raw delivery event, the canonical input of the feature encoder

use crate::error::ValidationError;
use crate::schema::{DeliveryMode, DeliveryPartner, PackageType, Region, VehicleType, WeatherCondition};
use serde::{Deserialize, Serialize};

/// A delivery to be classified for delay risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDeliveryEvent {
    /// Carrier handling the parcel
    pub delivery_partner: DeliveryPartner,

    /// Kind of goods shipped
    pub package_type: PackageType,

    /// Vehicle used for the last mile
    pub vehicle_type: VehicleType,

    /// Promised service level
    pub delivery_mode: DeliveryMode,

    /// Destination region
    pub region: Region,

    /// Weather at dispatch
    pub weather_condition: WeatherCondition,

    /// Route length, (0, 5000]
    pub distance_km: f64,

    /// Parcel weight, (0, 200]
    pub package_weight_kg: f64,

    /// Partner rating, [1, 5]
    pub delivery_rating: f64,

    /// Shipping cost, (0, 200000]
    pub delivery_cost: f64,
}

impl RawDeliveryEvent {
    /// Check the numeric ranges declared by the request schema.
    ///
    /// Categorical fields are closed enums and are already valid once the
    /// event exists. NaN fails every range check.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check(
            "distance_km",
            self.distance_km,
            self.distance_km > 0.0 && self.distance_km <= 5000.0,
            "(0, 5000]",
        )?;
        check(
            "package_weight_kg",
            self.package_weight_kg,
            self.package_weight_kg > 0.0 && self.package_weight_kg <= 200.0,
            "(0, 200]",
        )?;
        check(
            "delivery_rating",
            self.delivery_rating,
            (1.0..=5.0).contains(&self.delivery_rating),
            "[1, 5]",
        )?;
        check(
            "delivery_cost",
            self.delivery_cost,
            self.delivery_cost > 0.0 && self.delivery_cost <= 200_000.0,
            "(0, 200000]",
        )
    }
}

fn check(
    field: &'static str,
    value: f64,
    within: bool,
    constraint: &'static str,
) -> Result<(), ValidationError> {
    if within {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            constraint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawDeliveryEvent {
        RawDeliveryEvent {
            delivery_partner: DeliveryPartner::Delhivery,
            package_type: PackageType::Electronics,
            vehicle_type: VehicleType::Bike,
            delivery_mode: DeliveryMode::SameDay,
            region: Region::West,
            weather_condition: WeatherCondition::Rainy,
            distance_km: 12.5,
            package_weight_kg: 3.0,
            delivery_rating: 4.2,
            delivery_cost: 350.0,
        }
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{
            "delivery_partner": "delhivery",
            "package_type": "electronics",
            "vehicle_type": "bike",
            "delivery_mode": "same day",
            "region": "west",
            "weather_condition": "rainy",
            "distance_km": 12.5,
            "package_weight_kg": 3.0,
            "delivery_rating": 4.2,
            "delivery_cost": 350.0
        }"#;

        let event: RawDeliveryEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, sample());
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_unknown_region_rejected_at_boundary() {
        let json = r#"{
            "delivery_partner": "delhivery",
            "package_type": "electronics",
            "vehicle_type": "bike",
            "delivery_mode": "same day",
            "region": "antarctic",
            "weather_condition": "rainy",
            "distance_km": 12.5,
            "package_weight_kg": 3.0,
            "delivery_rating": 4.2,
            "delivery_cost": 350.0
        }"#;

        let err = serde_json::from_str::<RawDeliveryEvent>(json).unwrap_err();
        assert!(err.to_string().contains("region has unknown value 'antarctic'"));
    }

    #[test]
    fn test_range_validation() {
        let mut event = sample();
        event.distance_km = 0.0;
        assert_eq!(event.validate().unwrap_err().field(), Some("distance_km"));

        let mut event = sample();
        event.package_weight_kg = 200.5;
        assert_eq!(event.validate().unwrap_err().field(), Some("package_weight_kg"));

        let mut event = sample();
        event.delivery_rating = 0.99;
        assert_eq!(event.validate().unwrap_err().field(), Some("delivery_rating"));

        let mut event = sample();
        event.delivery_cost = f64::NAN;
        assert_eq!(event.validate().unwrap_err().field(), Some("delivery_cost"));

        let mut event = sample();
        event.distance_km = 5000.0;
        event.delivery_rating = 1.0;
        event.delivery_cost = 200_000.0;
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_weather_field_name_is_exact() {
        let json = r#"{
            "delivery_partner": "delhivery",
            "package_type": "electronics",
            "vehicle_type": "bike",
            "delivery_mode": "same day",
            "region": "west",
            "weather": "rainy",
            "distance_km": 12.5,
            "package_weight_kg": 3.0,
            "delivery_rating": 4.2,
            "delivery_cost": 350.0
        }"#;

        let err = serde_json::from_str::<RawDeliveryEvent>(json).unwrap_err();
        assert!(err.to_string().contains("missing field `weather_condition`"));
    }
}
