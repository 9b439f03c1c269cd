//! Test Request Producer
//!
//! Generates prediction requests and publishes them to NATS for pipeline testing.
//!
//! Usage: test_producer [nats_url] [subject] [count] [high_risk_rate] [delay_ms]

use delivery_risk_pipeline::schema::{
    Categorical, DeliveryMode, DeliveryPartner, PackageType, Region, VehicleType, WeatherCondition,
};
use delivery_risk_pipeline::types::{BusinessInput, RawDeliveryEvent, RequestEnvelope, ServiceRequest};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Request generator for testing
struct RequestGenerator {
    rng: rand::rngs::ThreadRng,
    request_counter: u64,
}

impl RequestGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            request_counter: 0,
        }
    }

    fn pick<C: Categorical>(&mut self) -> C {
        C::ALL[self.rng.gen_range(0..C::ALL.len())]
    }

    fn envelope(&mut self, request: ServiceRequest) -> RequestEnvelope {
        self.request_counter += 1;
        RequestEnvelope::new(request)
            .with_request_id(format!("req_{:012}", self.request_counter))
            .with_username("test_producer")
    }

    /// A short, well-rated delivery in mild weather
    fn generate_routine(&mut self) -> RequestEnvelope {
        let weather = [WeatherCondition::Clear, WeatherCondition::Cold, WeatherCondition::Hot]
            [self.rng.gen_range(0..3)];
        let event = RawDeliveryEvent {
            delivery_partner: self.pick::<DeliveryPartner>(),
            package_type: self.pick::<PackageType>(),
            vehicle_type: self.pick::<VehicleType>(),
            delivery_mode: self.pick::<DeliveryMode>(),
            region: self.pick::<Region>(),
            weather_condition: weather,
            distance_km: self.rng.gen_range(5.0..150.0),
            package_weight_kg: self.rng.gen_range(0.2..15.0),
            delivery_rating: self.rng.gen_range(3.5..=5.0),
            delivery_cost: self.rng.gen_range(40.0..900.0),
        };
        self.envelope(ServiceRequest::Predict { event })
    }

    /// A long haul in bad weather with a poorly rated partner
    fn generate_high_risk(&mut self) -> RequestEnvelope {
        let weather = [WeatherCondition::Stormy, WeatherCondition::Rainy, WeatherCondition::Foggy]
            [self.rng.gen_range(0..3)];
        let event = RawDeliveryEvent {
            delivery_partner: self.pick::<DeliveryPartner>(),
            package_type: self.pick::<PackageType>(),
            vehicle_type: VehicleType::Truck,
            delivery_mode: DeliveryMode::SameDay,
            region: [Region::West, Region::South][self.rng.gen_range(0..2)],
            weather_condition: weather,
            distance_km: self.rng.gen_range(800.0..3000.0),
            package_weight_kg: self.rng.gen_range(20.0..150.0),
            delivery_rating: self.rng.gen_range(1.0..2.5),
            delivery_cost: self.rng.gen_range(4000.0..20000.0),
        };
        self.envelope(ServiceRequest::Predict { event })
    }

    /// A business-form request, as sent by the live dashboard
    fn generate_live(&mut self) -> RequestEnvelope {
        let input = BusinessInput {
            order_volume: Some(self.rng.gen_range(1.0..200.0)),
            warehouse_time: Some(self.rng.gen_range(1.0..48.0)),
            shipment_distance: Some(self.rng.gen_range(1.0..1500.0)),
            traffic_level: Some(["low", "medium", "high"][self.rng.gen_range(0..3)].to_string()),
            weather_indicator: Some(["clear", "rain", "storm", "fog"][self.rng.gen_range(0..4)].to_string()),
            historical_performance: Some(self.rng.gen_range(0.3..1.0)),
        };
        self.envelope(ServiceRequest::PredictLive { input })
    }

    fn generate(&mut self, high_risk_rate: f64) -> (RequestEnvelope, bool) {
        if self.rng.gen_bool(high_risk_rate) {
            (self.generate_high_risk(), true)
        } else if self.rng.gen_bool(0.2) {
            (self.generate_live(), false)
        } else {
            (self.generate_routine(), false)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Request Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("delivery.requests");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let high_risk_rate: f64 = args
        .get(4)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.2_f64)
        .clamp(0.0, 1.0);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        high_risk_rate = high_risk_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, high_risk_rate, delay_ms).await;
        }
    };

    let mut generator = RequestGenerator::new();

    info!("Starting to publish {} requests...", count);

    let mut routine_count = 0;
    let mut high_risk_count = 0;

    for i in 0..count {
        let (envelope, high_risk) = generator.generate(high_risk_rate);
        if high_risk {
            high_risk_count += 1;
        } else {
            routine_count += 1;
        }

        let payload = serde_json::to_vec(&envelope)?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} requests ({} routine, {} high risk)",
                i + 1,
                count,
                routine_count,
                high_risk_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    client.flush().await?;

    info!(
        "Completed! Published {} requests ({} routine, {} high risk)",
        count, routine_count, high_risk_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, high_risk_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = RequestGenerator::new();

    for i in 0..count {
        let (envelope, _) = generator.generate(high_risk_rate);
        let json = serde_json::to_string_pretty(&envelope)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample request {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
