//! Deterministic derived features.
//!
//! [`engineer`] is a pure, total function of its input frame: it has no
//! learned state, never fails, and never divides by zero. Derived columns
//! that already exist are overwritten, so running it twice is harmless.

use crate::data::{Column, Frame};

/// Year building ages are measured against.
pub const REFERENCE_YEAR: f64 = 2024.0;

/// Names of the derived columns, in output order.
pub const ENGINEERED_FEATURES: [&str; 14] = [
    "building_age",
    "building_age_squared",
    "area_per_room",
    "kitchen_ratio",
    "bath_ratio",
    "living_area",
    "is_first_floor",
    "is_last_floor",
    "floor_ratio",
    "amenities_score",
    "volume",
    "has_extra_area",
    "extra_area_ratio",
    "rooms_floor_interaction",
];

const AMENITY_COLUMNS: [&str; 3] = ["gas", "hot_water", "central_heating"];

/// Raw inputs of one row.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowInputs {
    pub kitchen_area: f64,
    pub bath_area: f64,
    pub other_area: f64,
    pub extra_area: f64,
    pub year: f64,
    pub ceil_height: f64,
    pub floor_max: f64,
    pub floor: f64,
    pub total_area: f64,
    pub rooms_count: f64,
    pub amenities: u8,
}

/// Zero denominators are replaced by 1.
#[inline]
fn nonzero(v: f64) -> f64 {
    if v == 0.0 {
        1.0
    } else {
        v
    }
}

#[inline]
fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Derived values of one row, in [`ENGINEERED_FEATURES`] order.
pub fn derive_row(r: &RowInputs) -> [f64; 14] {
    let building_age = REFERENCE_YEAR - r.year;
    [
        building_age,
        building_age * building_age,
        r.total_area / (r.rooms_count + 1.0),
        r.kitchen_area / nonzero(r.total_area),
        r.bath_area / nonzero(r.total_area),
        r.other_area,
        flag(r.floor == 1.0),
        flag(r.floor == r.floor_max),
        r.floor / nonzero(r.floor_max),
        f64::from(r.amenities),
        r.total_area * r.ceil_height,
        flag(r.extra_area > 0.0),
        r.extra_area / (r.total_area + 1.0),
        r.rooms_count * r.floor,
    ]
}

fn numeric_or<'a>(frame: &'a Frame, name: &str, fallback: &'a [f64]) -> &'a [f64] {
    frame.numeric(name).unwrap_or(fallback)
}

/// Return `frame` plus the engineered columns.
///
/// Missing source columns are read as `NaN` (or "not Yes" for amenities);
/// the cleaner runs first in the pipeline, so this only matters for direct callers.
pub fn engineer(frame: &Frame) -> Frame {
    let n = frame.n_rows();
    let nan = vec![f64::NAN; n];
    let get = |name: &'static str| numeric_or(frame, name, &nan);

    let kitchen_area = get("kitchen_area");
    let bath_area = get("bath_area");
    let other_area = get("other_area");
    let extra_area = get("extra_area");
    let year = get("year");
    let ceil_height = get("ceil_height");
    let floor_max = get("floor_max");
    let floor = get("floor");
    let total_area = get("total_area");
    let rooms_count = get("rooms_count");

    let mut amenities = vec![0u8; n];
    for name in AMENITY_COLUMNS {
        if let Some(values) = frame.categorical(name) {
            for (score, v) in amenities.iter_mut().zip(values) {
                *score += u8::from(v.as_deref() == Some("Yes"));
            }
        }
    }

    let mut derived: Vec<Vec<f64>> = vec![Vec::with_capacity(n); ENGINEERED_FEATURES.len()];
    for i in 0..n {
        let row = derive_row(&RowInputs {
            kitchen_area: kitchen_area[i],
            bath_area: bath_area[i],
            other_area: other_area[i],
            extra_area: extra_area[i],
            year: year[i],
            ceil_height: ceil_height[i],
            floor_max: floor_max[i],
            floor: floor[i],
            total_area: total_area[i],
            rooms_count: rooms_count[i],
            amenities: amenities[i],
        });
        for (column, value) in derived.iter_mut().zip(row) {
            column.push(value);
        }
    }

    let mut out = frame.clone();
    for (name, values) in ENGINEERED_FEATURES.iter().zip(derived) {
        out.set_column(name, Column::Numeric(values));
    }
    out
}
