//! Feature encoding for delivery risk model inference.
//!
//! This module turns raw delivery events into the feature vector the model
//! was trained on. Training and serving both call [`FeatureEncoder::encode`],
//! so the engineered formulas and the column layout exist exactly once.

use crate::schema::{
    Categorical, DeliveryMode, Region, WeatherCondition, FEATURE_COLUMNS, FEATURE_COUNT,
};
use crate::types::event::RawDeliveryEvent;

/// Traffic proxy in [0, 5] derived from weather, service level and region.
pub fn traffic_index(weather: WeatherCondition, mode: DeliveryMode, region: Region) -> u8 {
    let mut index = 0;
    if matches!(
        weather,
        WeatherCondition::Stormy | WeatherCondition::Foggy | WeatherCondition::Rainy
    ) {
        index += 2;
    }
    if mode == DeliveryMode::SameDay {
        index += 2;
    }
    if matches!(region, Region::Central | Region::West) {
        index += 1;
    }
    index
}

/// Engineered numeric features, in model column order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineeredFeatures {
    pub traffic_index: u8,
    pub complexity_score: f64,
    pub distance_weight: f64,
    pub cost_per_km: f64,
    pub cost_per_weight: f64,
    pub log_distance: f64,
    pub log_weight: f64,
    pub log_cost: f64,
}

impl EngineeredFeatures {
    pub fn from_event(event: &RawDeliveryEvent) -> Self {
        let distance = event.distance_km;
        let weight = event.package_weight_kg;
        let cost = event.delivery_cost;

        Self {
            traffic_index: traffic_index(event.weather_condition, event.delivery_mode, event.region),
            complexity_score: distance * 0.4 + weight * 0.3 + cost * 0.3,
            distance_weight: distance * weight,
            // Denominators are shifted by one so zero inputs stay finite
            cost_per_km: cost / (distance + 1.0),
            cost_per_weight: cost / (weight + 1.0),
            log_distance: distance.ln_1p(),
            log_weight: weight.ln_1p(),
            log_cost: cost.ln_1p(),
        }
    }

    pub fn to_array(&self) -> [f64; 8] {
        [
            f64::from(self.traffic_index),
            self.complexity_score,
            self.distance_weight,
            self.cost_per_km,
            self.cost_per_weight,
            self.log_distance,
            self.log_weight,
            self.log_cost,
        ]
    }
}

/// Fixed-width model input. Only [`FeatureEncoder`] can build one, so every
/// instance has the training layout.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatureVector {
    values: Vec<f64>,
}

impl EncodedFeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named column.
    pub fn get(&self, column: &str) -> Option<f64> {
        FEATURE_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|index| self.values[index])
    }

    /// Single-precision copy for float32 runtimes.
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }
}

fn one_hot<C: Categorical>(value: C) -> impl Iterator<Item = f64> {
    let hot = value.one_hot_position();
    (0..C::WIDTH).map(move |column| if Some(column) == hot { 1.0 } else { 0.0 })
}

/// Encoder that transforms raw delivery events into model input features.
///
/// Output order matches `FEATURE_COLUMNS`: 4 passthrough numerics, 8
/// engineered numerics, then one drop-first one-hot block per categorical
/// field.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, event: &RawDeliveryEvent) -> EncodedFeatureVector {
        let engineered = EngineeredFeatures::from_event(event);

        let values: Vec<f64> = [
            event.distance_km,
            event.package_weight_kg,
            event.delivery_rating,
            event.delivery_cost,
        ]
        .into_iter()
        .chain(engineered.to_array())
        .chain(one_hot(event.delivery_partner))
        .chain(one_hot(event.package_type))
        .chain(one_hot(event.vehicle_type))
        .chain(one_hot(event.delivery_mode))
        .chain(one_hot(event.region))
        .chain(one_hot(event.weather_condition))
        .collect();

        debug_assert_eq!(values.len(), FEATURE_COUNT);
        EncodedFeatureVector { values }
    }

    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_COLUMNS
    }
}
