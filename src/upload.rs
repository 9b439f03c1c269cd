//! CSV batch prediction and business-schema uploads

use crate::error::{DeliveryError, ErrorReply, Result, ValidationError};
use crate::inference::InferenceService;
use crate::schema::{
    DeliveryMode, DeliveryPartner, PackageType, Region, VehicleType, WeatherCondition, RAW_COLUMNS,
};
use crate::types::{BusinessInput, LabelCounts, PredictionResult, RawDeliveryEvent};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io;
use tracing::{debug, info};

/// Columns a business upload must carry
pub const BUSINESS_COLUMNS: [&str; 6] = [
    "order_volume",
    "warehouse_time",
    "shipment_distance",
    "traffic_level",
    "weather_indicator",
    "historical_performance",
];

const PREVIEW_ROWS: usize = 10;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn map_weather(indicator: &str) -> WeatherCondition {
    match indicator {
        "rain" | "rainy" => WeatherCondition::Rainy,
        "storm" | "stormy" => WeatherCondition::Stormy,
        "fog" | "foggy" => WeatherCondition::Foggy,
        _ => WeatherCondition::Clear,
    }
}

/// Translate a business-form input into the canonical event.
///
/// Partner, package and vehicle are fixed; traffic drives mode and region.
pub fn adapt(input: &BusinessInput) -> RawDeliveryEvent {
    let traffic = input
        .traffic_level
        .as_deref()
        .unwrap_or("medium")
        .trim()
        .to_lowercase();
    let weather = input
        .weather_indicator
        .as_deref()
        .unwrap_or("clear")
        .trim()
        .to_lowercase();
    let historical = input.historical_performance.unwrap_or(0.75);

    let rating = if historical <= 1.0 {
        (historical * 5.0).clamp(1.0, 5.0)
    } else {
        historical.clamp(1.0, 5.0)
    };

    let delivery_mode = if traffic == "low" || traffic == "medium" {
        DeliveryMode::SameDay
    } else {
        DeliveryMode::Standard
    };
    let region = if traffic == "high" {
        Region::West
    } else {
        Region::North
    };

    let package_weight = (input.order_volume.unwrap_or(1.0) / 10.0).max(0.5);
    let distance = input.shipment_distance.unwrap_or(1.0).max(1.0);
    let warehouse_time = input.warehouse_time.unwrap_or(1.0).max(1.0);
    let delivery_cost = round2(distance * 4.2 + package_weight * 18.0 + warehouse_time * 5.5);

    RawDeliveryEvent {
        delivery_partner: DeliveryPartner::Delhivery,
        package_type: PackageType::Electronics,
        vehicle_type: VehicleType::Bike,
        delivery_mode,
        region,
        weather_condition: map_weather(&weather),
        distance_km: distance,
        package_weight_kg: package_weight,
        delivery_rating: rating,
        delivery_cost,
    }
}

/// Parsed CSV with header lookup by trimmed column name
pub(crate) struct CsvTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<StringRecord>,
}

impl CsvTable {
    pub(crate) fn from_reader<R: io::Read>(reader: R) -> std::result::Result<Self, ValidationError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::None)
            .from_reader(reader);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| ValidationError::Malformed(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let rows = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        Ok(Self {
            columns,
            index,
            rows,
        })
    }

    pub(crate) fn from_text(text: &str) -> std::result::Result<Self, ValidationError> {
        Self::from_reader(text.as_bytes())
    }

    pub(crate) fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub(crate) fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Required columns absent from the header, in required order
    pub(crate) fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.has_column(name))
            .map(|name| name.to_string())
            .collect()
    }

    pub(crate) fn require(&self, required: &[&str]) -> std::result::Result<(), ValidationError> {
        let missing = self.missing(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingColumns(missing))
        }
    }

    /// Trimmed cell value; absent or short rows read as empty
    pub(crate) fn cell<'a>(&self, row: &'a StringRecord, column: &str) -> &'a str {
        self.index
            .get(column)
            .and_then(|&i| row.get(i))
            .map(str::trim)
            .unwrap_or("")
    }
}

fn parse_number(field: &'static str, cell: &str) -> std::result::Result<f64, ValidationError> {
    cell.parse::<f64>().map_err(|_| ValidationError::InvalidNumber {
        field,
        value: cell.to_string(),
    })
}

fn parse_optional_number(
    field: &'static str,
    cell: &str,
) -> std::result::Result<Option<f64>, ValidationError> {
    if cell.is_empty() {
        Ok(None)
    } else {
        parse_number(field, cell).map(Some)
    }
}

/// Canonical event from one row. Categoricals are matched case-insensitively.
pub(crate) fn canonical_event(
    table: &CsvTable,
    row: &StringRecord,
) -> std::result::Result<RawDeliveryEvent, ValidationError> {
    let [partner, package, vehicle, mode, region, weather, distance, weight, rating, cost] =
        RAW_COLUMNS;

    let event = RawDeliveryEvent {
        delivery_partner: table.cell(row, partner).parse()?,
        package_type: table.cell(row, package).parse()?,
        vehicle_type: table.cell(row, vehicle).parse()?,
        delivery_mode: table.cell(row, mode).parse()?,
        region: table.cell(row, region).parse()?,
        weather_condition: table.cell(row, weather).parse()?,
        distance_km: parse_number(distance, table.cell(row, distance))?,
        package_weight_kg: parse_number(weight, table.cell(row, weight))?,
        delivery_rating: parse_number(rating, table.cell(row, rating))?,
        delivery_cost: parse_number(cost, table.cell(row, cost))?,
    };
    event.validate()?;
    Ok(event)
}

/// Parse a canonical-schema CSV.
///
/// A missing column rejects the whole batch; row errors are kept per row.
pub fn parse_canonical_csv(
    csv_text: &str,
) -> std::result::Result<Vec<std::result::Result<RawDeliveryEvent, ValidationError>>, ValidationError>
{
    let table = CsvTable::from_text(csv_text)?;
    table.require(&RAW_COLUMNS)?;
    Ok(table
        .rows()
        .iter()
        .map(|row| canonical_event(&table, row))
        .collect())
}

fn business_input(
    table: &CsvTable,
    row: &StringRecord,
) -> std::result::Result<BusinessInput, ValidationError> {
    let [volume, warehouse, distance, traffic, weather, historical] = BUSINESS_COLUMNS;
    let text = |column: &str| {
        let cell = table.cell(row, column);
        (!cell.is_empty()).then(|| cell.to_string())
    };

    Ok(BusinessInput {
        order_volume: parse_optional_number(volume, table.cell(row, volume))?,
        warehouse_time: parse_optional_number(warehouse, table.cell(row, warehouse))?,
        shipment_distance: parse_optional_number(distance, table.cell(row, distance))?,
        traffic_level: text(traffic),
        weather_indicator: text(weather),
        historical_performance: parse_optional_number(historical, table.cell(row, historical))?,
    })
}

/// A row the batch could not classify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRejection {
    /// 1-based data row number (header excluded)
    pub row: usize,
    #[serde(flatten)]
    pub reason: ErrorReply,
}

impl RowRejection {
    fn new(row: usize, error: &ValidationError) -> Self {
        Self {
            row,
            reason: DeliveryError::Validation(error.clone()).public_reply(),
        }
    }
}

/// A classified row of a canonical batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRow {
    pub row: usize,
    #[serde(flatten)]
    pub event: RawDeliveryEvent,
    #[serde(flatten)]
    pub prediction: PredictionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Number of classified rows
    pub count: usize,
    pub results: Vec<BatchRow>,
    pub rejected: Vec<RowRejection>,
}

/// Validation failures are recorded against their row; anything else aborts.
fn classify_row(
    service: &InferenceService,
    event: &RawDeliveryEvent,
) -> Result<std::result::Result<PredictionResult, ValidationError>> {
    match service.predict(event) {
        Ok(prediction) => Ok(Ok(prediction)),
        Err(DeliveryError::Validation(err)) => Ok(Err(err)),
        Err(err) => Err(err),
    }
}

/// Classify every row of a canonical-schema CSV
pub fn predict_canonical_csv(service: &InferenceService, csv_text: &str) -> Result<BatchOutcome> {
    let rows = parse_canonical_csv(csv_text)?;

    let mut results = Vec::new();
    let mut rejected = Vec::new();
    for (index, parsed) in rows.into_iter().enumerate() {
        let row = index + 1;
        let outcome = match parsed {
            Ok(event) => classify_row(service, &event)?.map(|prediction| (event, prediction)),
            Err(err) => Err(err),
        };
        match outcome {
            Ok((event, prediction)) => results.push(BatchRow {
                row,
                event,
                prediction,
            }),
            Err(err) => {
                debug!(row, error = %err, "Batch row rejected");
                rejected.push(RowRejection::new(row, &err));
            }
        }
    }

    info!(
        classified = results.len(),
        rejected = rejected.len(),
        "Batch prediction complete"
    );

    Ok(BatchOutcome {
        count: results.len(),
        results,
        rejected,
    })
}

/// Column means of the business upload, rounded to 2 decimals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasicStats {
    pub avg_order_volume: f64,
    pub avg_warehouse_time: f64,
    pub avg_shipment_distance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    /// First rows as uploaded; numeric cells are rendered as numbers
    pub preview: Vec<BTreeMap<String, serde_json::Value>>,
    pub prediction_summary: LabelCounts,
    pub basic_stats: BasicStats,
    pub rejected: Vec<RowRejection>,
}

fn preview_cell(cell: &str) -> serde_json::Value {
    cell.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(cell.to_string()))
}

/// Mean of the present values; empty columns average to zero
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        round2(sum / count as f64)
    }
}

/// Classify a business-schema CSV and summarize the results
pub fn summarize_upload(service: &InferenceService, csv_text: &str) -> Result<UploadSummary> {
    let table = CsvTable::from_text(csv_text)?;
    table.require(&BUSINESS_COLUMNS)?;

    let preview = table
        .rows()
        .iter()
        .take(PREVIEW_ROWS)
        .map(|row| {
            table
                .columns()
                .iter()
                .map(|column| (column.clone(), preview_cell(table.cell(row, column))))
                .collect()
        })
        .collect();

    let mut inputs = Vec::new();
    let mut summary = LabelCounts::default();
    let mut rejected = Vec::new();

    for (index, row) in table.rows().iter().enumerate() {
        let row_number = index + 1;
        let outcome = match business_input(&table, row) {
            Ok(input) => {
                let classified = classify_row(service, &adapt(&input))?;
                inputs.push(input);
                classified
            }
            Err(err) => Err(err),
        };
        match outcome {
            Ok(prediction) => summary.record(prediction.predicted_label),
            Err(err) => rejected.push(RowRejection::new(row_number, &err)),
        }
    }

    let basic_stats = BasicStats {
        avg_order_volume: mean(inputs.iter().filter_map(|i| i.order_volume)),
        avg_warehouse_time: mean(inputs.iter().filter_map(|i| i.warehouse_time)),
        avg_shipment_distance: mean(inputs.iter().filter_map(|i| i.shipment_distance)),
    };

    info!(
        rows = table.rows().len(),
        classified = summary.total(),
        rejected = rejected.len(),
        "Upload summarized"
    );

    Ok(UploadSummary {
        rows: table.rows().len(),
        columns: table.columns().to_vec(),
        preview,
        prediction_summary: summary,
        basic_stats,
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::tests::StubClassifier;
    use crate::labels::ClassLabel;

    const CANONICAL_HEADER: &str = "delivery_partner,package_type,vehicle_type,delivery_mode,region,weather_condition,distance_km,package_weight_kg,delivery_rating,delivery_cost";

    fn service(probabilities: &[f64]) -> InferenceService {
        InferenceService::new(StubClassifier::returning(probabilities)).unwrap()
    }

    #[test]
    fn test_adapt_defaults() {
        let event = adapt(&BusinessInput::default());

        assert_eq!(event.delivery_partner, DeliveryPartner::Delhivery);
        assert_eq!(event.package_type, PackageType::Electronics);
        assert_eq!(event.vehicle_type, VehicleType::Bike);
        assert_eq!(event.delivery_mode, DeliveryMode::SameDay);
        assert_eq!(event.region, Region::North);
        assert_eq!(event.weather_condition, WeatherCondition::Clear);
        assert_eq!(event.distance_km, 1.0);
        assert_eq!(event.package_weight_kg, 0.5);
        assert_eq!(event.delivery_rating, 3.75);
        // 1 * 4.2 + 0.5 * 18 + 1 * 5.5
        assert_eq!(event.delivery_cost, 18.7);
    }

    #[test]
    fn test_adapt_high_traffic_storm() {
        let event = adapt(&BusinessInput {
            order_volume: Some(120.0),
            warehouse_time: Some(6.0),
            shipment_distance: Some(300.0),
            traffic_level: Some(" High ".to_string()),
            weather_indicator: Some("Storm".to_string()),
            historical_performance: Some(4.6),
        });

        assert_eq!(event.delivery_mode, DeliveryMode::Standard);
        assert_eq!(event.region, Region::West);
        assert_eq!(event.weather_condition, WeatherCondition::Stormy);
        assert_eq!(event.package_weight_kg, 12.0);
        assert_eq!(event.delivery_rating, 4.6);
        assert_eq!(event.delivery_cost, 1509.0);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_adapt_rating_rules() {
        let rating = |h: f64| {
            adapt(&BusinessInput {
                historical_performance: Some(h),
                ..Default::default()
            })
            .delivery_rating
        };
        assert_eq!(rating(0.1), 1.0);
        assert_eq!(rating(1.0), 5.0);
        assert_eq!(rating(9.0), 5.0);
        assert_eq!(rating(1.5), 1.5);
    }

    #[test]
    fn test_unknown_weather_maps_to_clear() {
        assert_eq!(map_weather("hail"), WeatherCondition::Clear);
        assert_eq!(map_weather("fog"), WeatherCondition::Foggy);
        assert_eq!(map_weather("rainy"), WeatherCondition::Rainy);
    }

    #[test]
    fn test_canonical_csv_missing_columns() {
        let err = parse_canonical_csv("delivery_partner,region\ndhl,north\n").unwrap_err();
        match err {
            ValidationError::MissingColumns(missing) => {
                assert_eq!(missing.len(), 8);
                assert_eq!(missing[0], "package_type");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_canonical_csv_normalizes_and_reports_rows() {
        let csv = format!(
            "{CANONICAL_HEADER}\n\
             DHL , Documents,Van,Standard,NORTH,Clear,80,1.5,4.8,120\n\
             dhl,documents,van,standard,north,clear,abc,1.5,4.8,120\n\
             dhl,documents,van,standard,antarctic,clear,80,1.5,4.8,120\n"
        );

        let rows = parse_canonical_csv(&csv).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().delivery_partner, DeliveryPartner::Dhl);
        assert!(matches!(
            rows[1],
            Err(ValidationError::InvalidNumber { field: "distance_km", .. })
        ));
        assert!(matches!(
            rows[2],
            Err(ValidationError::UnknownCategory { field: "region", .. })
        ));
    }

    #[test]
    fn test_batch_isolates_bad_rows() {
        let csv = format!(
            "{CANONICAL_HEADER}\n\
             dhl,documents,van,standard,north,clear,80,1.5,4.8,120\n\
             dhl,documents,van,standard,north,clear,80,1.5,9.0,120\n\
             fedex,groceries,truck,express,south,rainy,300,12,3.9,900\n"
        );

        let outcome = predict_canonical_csv(&service(&[0.1, 0.2, 0.7]), &csv).unwrap();
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.results[0].row, 1);
        assert_eq!(outcome.results[1].row, 3);
        assert_eq!(outcome.results[1].prediction.predicted_label, ClassLabel::Delayed);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].row, 2);
        assert_eq!(outcome.rejected[0].reason.field.as_deref(), Some("delivery_rating"));
    }

    #[test]
    fn test_upload_summary() {
        let csv = "order_volume,warehouse_time,shipment_distance,traffic_level,weather_indicator,historical_performance\n\
                   10,2,100,low,clear,0.9\n\
                   30,4,200,high,rain,0.6\n\
                   ,3,,medium,,\n";

        let summary = summarize_upload(&service(&[0.7, 0.2, 0.1]), csv).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.columns.len(), 6);
        assert_eq!(summary.preview.len(), 3);
        assert_eq!(summary.preview[0]["traffic_level"], serde_json::json!("low"));
        assert_eq!(summary.preview[0]["order_volume"], serde_json::json!(10.0));
        assert_eq!(summary.prediction_summary.get(ClassLabel::OnTime), 3);
        assert_eq!(summary.prediction_summary.get(ClassLabel::Delayed), 0);
        assert_eq!(summary.basic_stats.avg_order_volume, 20.0);
        assert_eq!(summary.basic_stats.avg_warehouse_time, 3.0);
        assert_eq!(summary.basic_stats.avg_shipment_distance, 150.0);
        assert!(summary.rejected.is_empty());
    }

    #[test]
    fn test_upload_missing_columns() {
        let err = summarize_upload(&service(&[1.0, 0.0, 0.0]), "order_volume\n3\n").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "validation failed: Missing columns: warehouse_time, shipment_distance, traffic_level, weather_indicator, historical_performance"
        );
    }

    #[test]
    fn test_upload_rejects_unparseable_numbers() {
        let csv = "order_volume,warehouse_time,shipment_distance,traffic_level,weather_indicator,historical_performance\n\
                   lots,2,100,low,clear,0.9\n";
        let summary = summarize_upload(&service(&[1.0, 0.0, 0.0]), csv).unwrap();
        assert_eq!(summary.prediction_summary.total(), 0);
        assert_eq!(summary.rejected[0].row, 1);
        assert_eq!(summary.rejected[0].reason.field.as_deref(), Some("order_volume"));
    }
}
