//! Column names, domains and range rules of the property dataset.

/// Raw numeric fields, in canonical feature order.
pub const NUMERIC_FEATURES: [&str; 12] = [
    "kitchen_area",
    "bath_area",
    "other_area",
    "extra_area",
    "extra_area_count",
    "year",
    "ceil_height",
    "floor_max",
    "floor",
    "total_area",
    "bath_count",
    "rooms_count",
];

/// Raw categorical fields, in canonical feature order.
pub const CATEGORICAL_FEATURES: [&str; 5] = [
    "gas",
    "hot_water",
    "central_heating",
    "extra_area_type_name",
    "district_name",
];

pub const TARGET_COLUMN: &str = "price";

/// Columns that are never features (row ids written by spreadsheet exports).
pub const NON_FEATURE_COLUMNS: [&str; 2] = ["index", "Unnamed: 0"];

pub const YES_NO: [&str; 2] = ["Yes", "No"];

pub const DISTRICTS: [&str; 7] = [
    "Centralnyj",
    "Petrogradskij",
    "Moskovskij",
    "Nevskij",
    "Krasnoselskij",
    "Vyborgskij",
    "Kirovskij",
];

pub const EXTRA_AREA_TYPES: [&str; 2] = ["balcony", "loggia"];

/// Allowed values of a categorical field.
pub fn categorical_domain(field: &str) -> Option<&'static [&'static str]> {
    match field {
        "gas" | "hot_water" | "central_heating" => Some(&YES_NO),
        "district_name" => Some(&DISTRICTS),
        "extra_area_type_name" => Some(&EXTRA_AREA_TYPES),
        _ => None,
    }
}

pub fn is_numeric_field(name: &str) -> bool {
    NUMERIC_FEATURES.contains(&name)
}

pub fn is_categorical_field(name: &str) -> bool {
    CATEGORICAL_FEATURES.contains(&name)
}

/// Inclusive bounds for one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeRule {
    pub column: &'static str,
    pub min: f64,
    pub max: f64,
    pub unit: &'static str,
}

impl RangeRule {
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Range rules enforced at the serving boundary and reported by the validator.
pub const RANGE_RULES: [RangeRule; 6] = [
    RangeRule { column: "total_area", min: 10.0, max: 500.0, unit: " m²" },
    RangeRule { column: "year", min: 1800.0, max: 2025.0, unit: "" },
    RangeRule { column: "ceil_height", min: 1.5, max: 6.0, unit: " meters" },
    RangeRule { column: "rooms_count", min: 0.0, max: 10.0, unit: "" },
    RangeRule { column: "floor", min: 1.0, max: 100.0, unit: "" },
    RangeRule { column: TARGET_COLUMN, min: 1e6, max: 1e8, unit: " RUB" },
];

pub fn range_rule(column: &str) -> Option<&'static RangeRule> {
    RANGE_RULES.iter().find(|r| r.column == column)
}
