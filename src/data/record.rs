//! Typed property record and its conversion into a [`Frame`].

use serde::{Deserialize, Serialize};

use super::frame::{Column, Frame};
use super::schema::{CATEGORICAL_FEATURES, NUMERIC_FEATURES, TARGET_COLUMN};
use crate::error::Result;

/// One flat listing.
///
/// Counts (`year`, `floor`, `rooms_count`, ...) are stored as `f64` so every
/// numeric field flows through the same column type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub kitchen_area: f64,
    pub bath_area: f64,
    pub other_area: f64,
    pub gas: String,
    pub hot_water: String,
    pub central_heating: String,
    pub extra_area: f64,
    pub extra_area_count: f64,
    pub year: f64,
    pub ceil_height: f64,
    pub floor_max: f64,
    pub floor: f64,
    pub total_area: f64,
    pub bath_count: f64,
    pub extra_area_type_name: String,
    pub district_name: String,
    pub rooms_count: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl PropertyRecord {
    /// Value of a numeric field by column name.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        let v = match name {
            "kitchen_area" => self.kitchen_area,
            "bath_area" => self.bath_area,
            "other_area" => self.other_area,
            "extra_area" => self.extra_area,
            "extra_area_count" => self.extra_area_count,
            "year" => self.year,
            "ceil_height" => self.ceil_height,
            "floor_max" => self.floor_max,
            "floor" => self.floor,
            "total_area" => self.total_area,
            "bath_count" => self.bath_count,
            "rooms_count" => self.rooms_count,
            _ => return None,
        };
        Some(v)
    }

    /// Value of a categorical field by column name.
    pub fn categorical(&self, name: &str) -> Option<&str> {
        let v = match name {
            "gas" => &self.gas,
            "hot_water" => &self.hot_water,
            "central_heating" => &self.central_heating,
            "extra_area_type_name" => &self.extra_area_type_name,
            "district_name" => &self.district_name,
            _ => return None,
        };
        Some(v)
    }
}

/// Lay records out as a frame with the canonical raw columns.
///
/// A `price` column is added only when every record carries one.
pub fn records_to_frame(records: &[PropertyRecord]) -> Result<Frame> {
    let mut columns = Vec::with_capacity(NUMERIC_FEATURES.len() + CATEGORICAL_FEATURES.len() + 1);

    for name in NUMERIC_FEATURES {
        let values = records
            .iter()
            .map(|r| r.numeric(name).unwrap_or(f64::NAN))
            .collect();
        columns.push((name.to_string(), Column::Numeric(values)));
    }
    for name in CATEGORICAL_FEATURES {
        let values = records
            .iter()
            .map(|r| r.categorical(name).map(str::to_string))
            .collect();
        columns.push((name.to_string(), Column::Categorical(values)));
    }
    if !records.is_empty() && records.iter().all(|r| r.price.is_some()) {
        let prices = records.iter().map(|r| r.price.unwrap_or(f64::NAN)).collect();
        columns.push((TARGET_COLUMN.to_string(), Column::Numeric(prices)));
    }

    Frame::from_columns(columns)
}
