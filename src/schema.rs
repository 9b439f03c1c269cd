//! Training-time feature schema shared by the trainer and the service.
//!
//! Every categorical field is a closed enumeration whose variants are listed
//! alphabetically. The first variant is the reference level of the
//! drop-first dummy encoding: it owns no column and encodes as an all-zero
//! block. The column layout below is fixed; it must never be derived from
//! observed data.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A categorical input field with a fixed one-hot block.
pub trait Categorical: Copy + Eq + 'static {
    /// Raw column name of the field.
    const FIELD: &'static str;
    /// Every accepted value in column order. `ALL[0]` is the reference level.
    const ALL: &'static [Self];
    /// Number of indicator columns (all values minus the reference).
    const WIDTH: usize = Self::ALL.len() - 1;

    fn as_str(&self) -> &'static str;

    /// Column position inside the field's block, `None` for the reference level.
    fn one_hot_position(&self) -> Option<usize>;
}

macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident => $field:literal {
            $($variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "&'static str")]
        pub enum $name {
            $($variant),+
        }

        impl Categorical for $name {
            const FIELD: &'static str = $field;
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            fn one_hot_position(&self) -> Option<usize> {
                (*self as usize).checked_sub(1)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_lowercase();
                match normalized.as_str() {
                    $($value => Ok($name::$variant),)+
                    _ => Err(ValidationError::UnknownCategory {
                        field: $field,
                        value: s.trim().to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

categorical! {
    /// Carrier handling the delivery
    DeliveryPartner => "delivery_partner" {
        AmazonLogistics => "amazon logistics",
        BlueDart => "blue dart",
        Delhivery => "delhivery",
        Dhl => "dhl",
        EcomExpress => "ecom express",
        Ekart => "ekart",
        Fedex => "fedex",
        Shadowfax => "shadowfax",
        Xpressbees => "xpressbees",
    }
}

categorical! {
    PackageType => "package_type" {
        AutomobileParts => "automobile parts",
        Clothing => "clothing",
        Cosmetics => "cosmetics",
        Documents => "documents",
        Electronics => "electronics",
        FragileItems => "fragile items",
        Furniture => "furniture",
        Groceries => "groceries",
        Pharmacy => "pharmacy",
    }
}

categorical! {
    VehicleType => "vehicle_type" {
        Bike => "bike",
        EvBike => "ev bike",
        EvVan => "ev van",
        Scooter => "scooter",
        Truck => "truck",
        Van => "van",
    }
}

categorical! {
    /// Service level promised to the customer
    DeliveryMode => "delivery_mode" {
        Express => "express",
        SameDay => "same day",
        Standard => "standard",
        TwoDay => "two day",
    }
}

categorical! {
    Region => "region" {
        Central => "central",
        East => "east",
        North => "north",
        South => "south",
        West => "west",
    }
}

categorical! {
    WeatherCondition => "weather_condition" {
        Clear => "clear",
        Cold => "cold",
        Foggy => "foggy",
        Hot => "hot",
        Rainy => "rainy",
        Stormy => "stormy",
    }
}

/// Passthrough and engineered numeric columns, in model order.
pub const NUMERIC_COLUMNS: [&str; 12] = [
    "distance_km",
    "package_weight_kg",
    "delivery_rating",
    "delivery_cost",
    "Traffic_Index",
    "Complexity_Score",
    "Distance_Weight",
    "Cost_per_KM",
    "Cost_per_Weight",
    "Log_Distance",
    "Log_Weight",
    "Log_Cost",
];

/// One-hot block of a categorical field inside the encoded vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneHotBlock {
    pub field: &'static str,
    pub offset: usize,
    pub width: usize,
}

impl OneHotBlock {
    const fn of<C: Categorical>(offset: usize) -> Self {
        Self {
            field: C::FIELD,
            offset,
            width: C::WIDTH,
        }
    }

    const fn end(&self) -> usize {
        self.offset + self.width
    }
}

const PARTNER_BLOCK: OneHotBlock = OneHotBlock::of::<DeliveryPartner>(NUMERIC_COLUMNS.len());
const PACKAGE_BLOCK: OneHotBlock = OneHotBlock::of::<PackageType>(PARTNER_BLOCK.end());
const VEHICLE_BLOCK: OneHotBlock = OneHotBlock::of::<VehicleType>(PACKAGE_BLOCK.end());
const MODE_BLOCK: OneHotBlock = OneHotBlock::of::<DeliveryMode>(VEHICLE_BLOCK.end());
const REGION_BLOCK: OneHotBlock = OneHotBlock::of::<Region>(MODE_BLOCK.end());
const WEATHER_BLOCK: OneHotBlock = OneHotBlock::of::<WeatherCondition>(REGION_BLOCK.end());

/// Categorical blocks in model order.
pub const ONE_HOT_BLOCKS: [OneHotBlock; 6] = [
    PARTNER_BLOCK,
    PACKAGE_BLOCK,
    VEHICLE_BLOCK,
    MODE_BLOCK,
    REGION_BLOCK,
    WEATHER_BLOCK,
];

/// Width of the encoded feature vector.
pub const FEATURE_COUNT: usize = WEATHER_BLOCK.end();

/// Column names exactly as they appear in the training feature matrix.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "distance_km",
    "package_weight_kg",
    "delivery_rating",
    "delivery_cost",
    "Traffic_Index",
    "Complexity_Score",
    "Distance_Weight",
    "Cost_per_KM",
    "Cost_per_Weight",
    "Log_Distance",
    "Log_Weight",
    "Log_Cost",
    "delivery_partner_blue dart",
    "delivery_partner_delhivery",
    "delivery_partner_dhl",
    "delivery_partner_ecom express",
    "delivery_partner_ekart",
    "delivery_partner_fedex",
    "delivery_partner_shadowfax",
    "delivery_partner_xpressbees",
    "package_type_clothing",
    "package_type_cosmetics",
    "package_type_documents",
    "package_type_electronics",
    "package_type_fragile items",
    "package_type_furniture",
    "package_type_groceries",
    "package_type_pharmacy",
    "vehicle_type_ev bike",
    "vehicle_type_ev van",
    "vehicle_type_scooter",
    "vehicle_type_truck",
    "vehicle_type_van",
    "delivery_mode_same day",
    "delivery_mode_standard",
    "delivery_mode_two day",
    "region_east",
    "region_north",
    "region_south",
    "region_west",
    "weather_condition_cold",
    "weather_condition_foggy",
    "weather_condition_hot",
    "weather_condition_rainy",
    "weather_condition_stormy",
];

/// Raw input columns every canonical upload must carry.
pub const RAW_COLUMNS: [&str; 10] = [
    "delivery_partner",
    "package_type",
    "vehicle_type",
    "delivery_mode",
    "region",
    "weather_condition",
    "distance_km",
    "package_weight_kg",
    "delivery_rating",
    "delivery_cost",
];

fn block_columns<C: Categorical>() -> impl Iterator<Item = String> {
    C::ALL
        .iter()
        .skip(1)
        .map(|value| format!("{}_{}", C::FIELD, value.as_str()))
}

/// Rebuilds the column list from the enumerations.
///
/// Used to prove the hand-written [`FEATURE_COLUMNS`] and the enum tables
/// describe the same layout.
pub fn derived_columns() -> Vec<String> {
    NUMERIC_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(block_columns::<DeliveryPartner>())
        .chain(block_columns::<PackageType>())
        .chain(block_columns::<VehicleType>())
        .chain(block_columns::<DeliveryMode>())
        .chain(block_columns::<Region>())
        .chain(block_columns::<WeatherCondition>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_count() {
        assert_eq!(FEATURE_COUNT, 45);
        assert_eq!(FEATURE_COLUMNS.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_enum_tables_match_training_columns() {
        let derived = derived_columns();
        assert_eq!(derived.len(), FEATURE_COUNT);
        for (derived, fixed) in derived.iter().zip(FEATURE_COLUMNS.iter()) {
            assert_eq!(derived, fixed);
        }
    }

    #[test]
    fn test_block_offsets() {
        assert_eq!(ONE_HOT_BLOCKS[0].offset, 12);
        assert_eq!(ONE_HOT_BLOCKS[0].width, 8);
        assert_eq!(ONE_HOT_BLOCKS[2].field, "vehicle_type");
        assert_eq!(ONE_HOT_BLOCKS[5].offset, 40);
        assert_eq!(ONE_HOT_BLOCKS[5].width, 5);

        for block in &ONE_HOT_BLOCKS {
            assert!(FEATURE_COLUMNS[block.offset].starts_with(block.field));
            assert!(FEATURE_COLUMNS[block.end() - 1].starts_with(block.field));
        }
    }

    #[test]
    fn test_reference_levels_have_no_column() {
        assert_eq!(DeliveryPartner::AmazonLogistics.one_hot_position(), None);
        assert_eq!(PackageType::AutomobileParts.one_hot_position(), None);
        assert_eq!(VehicleType::Bike.one_hot_position(), None);
        assert_eq!(DeliveryMode::Express.one_hot_position(), None);
        assert_eq!(Region::Central.one_hot_position(), None);
        assert_eq!(WeatherCondition::Clear.one_hot_position(), None);

        assert_eq!(WeatherCondition::Cold.one_hot_position(), Some(0));
        assert_eq!(Region::West.one_hot_position(), Some(3));
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        assert_eq!("  Same Day ".parse::<DeliveryMode>().unwrap(), DeliveryMode::SameDay);
        assert_eq!("EV VAN".parse::<VehicleType>().unwrap(), VehicleType::EvVan);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let err = "antarctic".parse::<Region>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownCategory {
                field: "region",
                value: "antarctic".to_string()
            }
        );
    }

    #[test]
    fn test_serde_uses_raw_strings() {
        let json = serde_json::to_string(&PackageType::FragileItems).unwrap();
        assert_eq!(json, "\"fragile items\"");

        let parsed: Region = serde_json::from_str("\"west\"").unwrap();
        assert_eq!(parsed, Region::West);

        let err = serde_json::from_str::<Region>("\"antarctic\"").unwrap_err();
        assert!(err.to_string().contains("region has unknown value 'antarctic'"));
    }
}
