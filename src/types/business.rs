//! Business-facing delivery inputs used by the live form and CSV uploads

use serde::{Deserialize, Serialize};

/// Operational view of an order, expressed in warehouse terms rather than
/// the model's raw schema. Every field is optional; the upload adapter
/// fills the gaps with documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessInput {
    /// Units in the order
    #[serde(default)]
    pub order_volume: Option<f64>,

    /// Hours spent in the warehouse
    #[serde(default)]
    pub warehouse_time: Option<f64>,

    /// Shipment distance in km
    #[serde(default)]
    pub shipment_distance: Option<f64>,

    /// "low", "medium" or "high"
    #[serde(default)]
    pub traffic_level: Option<String>,

    /// Free-form weather indicator ("rain", "fog", "storm", ...)
    #[serde(default)]
    pub weather_indicator: Option<String>,

    /// On-time ratio in [0, 1], or a rating on a 1-5 scale
    #[serde(default)]
    pub historical_performance: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_input_deserialization() {
        let input: BusinessInput =
            serde_json::from_str(r#"{"shipment_distance": 42.0, "traffic_level": "High"}"#)
                .unwrap();

        assert_eq!(input.shipment_distance, Some(42.0));
        assert_eq!(input.traffic_level.as_deref(), Some("High"));
        assert_eq!(input.order_volume, None);
        assert_eq!(input.historical_performance, None);
    }
}
