//! Inference service: validate, encode, classify

use crate::error::{DeliveryError, Result};
use crate::feature_encoder::{EncodedFeatureVector, FeatureEncoder};
use crate::labels::ClassLabel;
use crate::models::classifier::argmax;
use crate::models::Classifier;
use crate::schema::FEATURE_COUNT;
use crate::types::{ClassProbabilities, PredictionResult, RawDeliveryEvent};
use std::sync::Arc;
use tracing::{debug, info};

/// Wraps one loaded classifier behind the feature encoder.
///
/// Holds no mutable state, so a single instance serves all workers.
pub struct InferenceService {
    encoder: FeatureEncoder,
    model: Arc<dyn Classifier>,
}

impl InferenceService {
    /// Bind a classifier. Fails if the artifact declares a different width.
    pub fn new(model: Arc<dyn Classifier>) -> Result<Self> {
        let encoder = FeatureEncoder::new();

        if let Some(width) = model.input_width() {
            if width != encoder.feature_count() {
                return Err(DeliveryError::SchemaMismatch {
                    what: "model input width",
                    expected: encoder.feature_count(),
                    actual: width,
                });
            }
        }

        info!(
            model = %model.name(),
            features = encoder.feature_count(),
            "Inference service initialized"
        );

        Ok(Self { encoder, model })
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Classify a single event
    pub fn predict(&self, event: &RawDeliveryEvent) -> Result<PredictionResult> {
        event.validate()?;
        let features = self.encoder.encode(event);
        self.predict_encoded(&features)
    }

    /// Classify an already encoded vector
    pub fn predict_encoded(&self, features: &EncodedFeatureVector) -> Result<PredictionResult> {
        if features.len() != FEATURE_COUNT {
            return Err(DeliveryError::SchemaMismatch {
                what: "feature vector length",
                expected: FEATURE_COUNT,
                actual: features.len(),
            });
        }

        let raw = self.model.predict_proba(features.as_slice())?;
        let probabilities = ClassProbabilities::from_model_output(&raw)?;
        let class_id = argmax(&raw);
        let predicted = ClassLabel::from_id(class_id).ok_or_else(|| {
            DeliveryError::Inference(format!("classifier returned unknown class id {class_id}"))
        })?;

        let result = PredictionResult::new(predicted, probabilities);
        debug!(
            model = %self.model.name(),
            label = %result.predicted_label,
            confidence = result.confidence,
            "Prediction complete"
        );

        Ok(result)
    }

    /// Classify many events, one result per event in input order.
    pub fn predict_batch(&self, events: &[RawDeliveryEvent]) -> Vec<Result<PredictionResult>> {
        events.iter().map(|event| self.predict(event)).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::schema::{
        DeliveryMode, DeliveryPartner, PackageType, Region, VehicleType, WeatherCondition,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Classifier returning a fixed probability vector regardless of input.
    pub(crate) struct StubClassifier {
        pub probabilities: Vec<f64>,
        pub width: Option<usize>,
    }

    impl StubClassifier {
        pub(crate) fn returning(probabilities: &[f64]) -> Arc<dyn Classifier> {
            Arc::new(Self {
                probabilities: probabilities.to_vec(),
                width: Some(FEATURE_COUNT),
            })
        }
    }

    impl Classifier for StubClassifier {
        fn name(&self) -> &str {
            "stub"
        }

        fn input_width(&self) -> Option<usize> {
            self.width
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<Vec<f64>> {
            Ok(self.probabilities.clone())
        }
    }

    pub(crate) fn sample_event() -> RawDeliveryEvent {
        RawDeliveryEvent {
            delivery_partner: DeliveryPartner::Delhivery,
            package_type: PackageType::Electronics,
            vehicle_type: VehicleType::Truck,
            delivery_mode: DeliveryMode::Express,
            region: Region::West,
            weather_condition: WeatherCondition::Clear,
            distance_km: 120.0,
            package_weight_kg: 4.0,
            delivery_rating: 4.2,
            delivery_cost: 650.0,
        }
    }

    #[test]
    fn test_predict_returns_argmax_label() {
        let service = InferenceService::new(StubClassifier::returning(&[0.2, 0.7, 0.1])).unwrap();
        let result = service.predict(&sample_event()).unwrap();

        assert_eq!(result.predicted_label, ClassLabel::AtRisk);
        assert_eq!(result.predicted_class_id, 1);
        assert!((result.confidence - 0.7).abs() < 1e-9);
        assert!((result.probabilities.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_is_max_probability() {
        let service = InferenceService::new(StubClassifier::returning(&[0.1, 0.2, 0.7])).unwrap();
        let result = service.predict(&sample_event()).unwrap();
        assert_eq!(result.predicted_label, ClassLabel::Delayed);
        assert_eq!(result.confidence, result.probabilities.max());
    }

    #[test]
    fn test_invalid_event_never_reaches_model() {
        let service = InferenceService::new(StubClassifier::returning(&[1.0, 0.0, 0.0])).unwrap();
        let mut event = sample_event();
        event.delivery_rating = 7.0;

        let err = service.predict(&event).unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::Validation(ValidationError::OutOfRange { field: "delivery_rating", .. })
        ));
    }

    #[test]
    fn test_width_mismatch_is_rejected_at_startup() {
        let model = Arc::new(StubClassifier {
            probabilities: vec![1.0, 0.0, 0.0],
            width: Some(44),
        });
        let err = InferenceService::new(model).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_dynamic_width_is_accepted() {
        let model = Arc::new(StubClassifier {
            probabilities: vec![1.0, 0.0, 0.0],
            width: None,
        });
        assert!(InferenceService::new(model).is_ok());
    }

    #[test]
    fn test_too_many_classes_is_schema_mismatch() {
        let service =
            InferenceService::new(StubClassifier::returning(&[0.25, 0.25, 0.25, 0.25])).unwrap();
        assert!(matches!(
            service.predict(&sample_event()),
            Err(DeliveryError::SchemaMismatch { what: "class count", .. })
        ));
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let service = InferenceService::new(StubClassifier::returning(&[0.6, 0.3, 0.1])).unwrap();
        let mut bad = sample_event();
        bad.distance_km = 0.0;

        let results = service.predict_batch(&[sample_event(), bad, sample_event()]);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    struct CountingClassifier {
        calls: AtomicUsize,
    }

    impl Classifier for CountingClassifier {
        fn name(&self) -> &str {
            "counting"
        }

        fn input_width(&self) -> Option<usize> {
            Some(FEATURE_COUNT)
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<Vec<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.3, 0.3, 0.4])
        }
    }

    #[test]
    fn test_model_runs_once_per_prediction() {
        let model = Arc::new(CountingClassifier {
            calls: AtomicUsize::new(0),
        });
        let service = InferenceService::new(model.clone()).unwrap();

        let result = service.predict(&sample_event()).unwrap();
        assert_eq!(result.predicted_label, ClassLabel::Delayed);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }
}
