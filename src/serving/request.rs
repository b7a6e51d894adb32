//! Field-level validation of prediction requests.
//!
//! Every field is checked and every problem is reported, so a client sees
//! all of its mistakes in one response.

use serde_json::{Map, Value};

use crate::data::schema::{categorical_domain, range_rule, CATEGORICAL_FEATURES, NUMERIC_FEATURES};
use crate::data::PropertyRecord;
use crate::error::FieldError;

fn check_numeric(field: &str, value: Option<&Value>, errors: &mut Vec<FieldError>) -> Option<f64> {
    let Some(value) = value else {
        errors.push(FieldError::new(field, "is required"));
        return None;
    };
    let Some(v) = value.as_f64().filter(|v| v.is_finite()) else {
        errors.push(FieldError::new(field, "must be a number"));
        return None;
    };
    if v < 0.0 {
        errors.push(FieldError::new(field, "must be non-negative"));
        return None;
    }
    if let Some(rule) = range_rule(field).filter(|r| !r.contains(v)) {
        errors.push(FieldError::new(
            field,
            format!("must be between {} and {}{}", rule.min, rule.max, rule.unit),
        ));
        return None;
    }
    Some(v)
}

fn check_categorical<'a>(
    field: &str,
    value: Option<&'a Value>,
    errors: &mut Vec<FieldError>,
) -> Option<&'a str> {
    let Some(value) = value else {
        errors.push(FieldError::new(field, "is required"));
        return None;
    };
    let Some(s) = value.as_str() else {
        errors.push(FieldError::new(field, "must be a string"));
        return None;
    };
    match categorical_domain(field) {
        Some(domain) if !domain.contains(&s) => {
            let message = if domain.len() == 2 {
                format!("must be '{}' or '{}'", domain[0], domain[1])
            } else {
                format!("must be one of: {}", domain.join(", "))
            };
            errors.push(FieldError::new(field, message));
            None
        }
        _ => Some(s),
    }
}

/// Validate a JSON request body and turn it into a record.
///
/// Unknown keys are ignored. A `price` key, if present, is dropped.
///
/// # Errors
///
/// One [`FieldError`] per missing, mistyped, negative, out-of-range or
/// out-of-domain field.
pub fn validate_request(body: &Value) -> Result<PropertyRecord, Vec<FieldError>> {
    let Some(object) = body.as_object() else {
        return Err(vec![FieldError::new("body", "expected a JSON object")]);
    };

    let mut errors = Vec::new();
    let mut clean = Map::new();
    for field in NUMERIC_FEATURES {
        if let Some(v) = check_numeric(field, object.get(field), &mut errors) {
            clean.insert(field.to_string(), Value::from(v));
        }
    }
    for field in CATEGORICAL_FEATURES {
        if let Some(s) = check_categorical(field, object.get(field), &mut errors) {
            clean.insert(field.to_string(), Value::from(s));
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value(Value::Object(clean))
        .map_err(|e| vec![FieldError::new("body", e.to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "kitchen_area": 10.0, "bath_area": 5.0, "other_area": 50.5,
            "gas": "Yes", "hot_water": "Yes", "central_heating": "Yes",
            "extra_area": 10.0, "extra_area_count": 1, "year": 2010,
            "ceil_height": 2.7, "floor_max": 10, "floor": 5, "total_area": 65.0,
            "bath_count": 1, "extra_area_type_name": "balcony",
            "district_name": "Centralnyj", "rooms_count": 3
        })
    }

    #[test]
    fn test_valid_request() {
        let record = validate_request(&valid_body()).unwrap();
        assert_eq!(record.total_area, 65.0);
        assert_eq!(record.district_name, "Centralnyj");
        assert_eq!(record.price, None);
    }

    #[rstest]
    #[case("total_area", json!(5.0), "must be between 10 and 500 m²")]
    #[case("year", json!(2030), "must be between 1800 and 2025")]
    #[case("ceil_height", json!(7.5), "must be between 1.5 and 6 meters")]
    #[case("rooms_count", json!(11), "must be between 0 and 10")]
    #[case("kitchen_area", json!(-1.0), "must be non-negative")]
    #[case("floor", json!("five"), "must be a number")]
    #[case("gas", json!("maybe"), "must be 'Yes' or 'No'")]
    #[case("district_name", json!(3), "must be a string")]
    fn test_rejects_bad_field(#[case] field: &str, #[case] value: Value, #[case] message: &str) {
        let mut body = valid_body();
        body[field] = value;
        let errors = validate_request(&body).unwrap_err();
        assert_eq!(errors, vec![FieldError::new(field, message)]);
    }

    #[test]
    fn test_reports_every_problem() {
        let mut body = valid_body();
        let object = body.as_object_mut().unwrap();
        object.remove("year");
        object.remove("gas");
        object.insert("district_name".into(), json!("Atlantis"));
        let errors = validate_request(&body).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["year", "gas", "district_name"]);
        assert!(errors[2].message.starts_with("must be one of: Centralnyj"));
    }

    #[test]
    fn test_non_object_body() {
        let errors = validate_request(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(errors[0].field, "body");
    }
}
