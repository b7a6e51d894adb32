//! Preprocessing pipeline contract: determinism, frozen schema, unseen
//! categories and the engineered features of a known record.

mod common;

use approx::assert_abs_diff_eq;
use flatprice::config::CleaningConfig;
use flatprice::data::schema::TARGET_COLUMN;
use flatprice::data::{records_to_frame, Column};
use flatprice::preprocessing::ENGINEERED_FEATURES;
use flatprice::{Error, PreprocessingPipeline};

use common::{synthetic_frame, synthetic_records};

fn fitted() -> PreprocessingPipeline {
    let mut pipeline = PreprocessingPipeline::new(CleaningConfig::default());
    pipeline
        .fit_transform(&synthetic_frame(200, 7), TARGET_COLUMN)
        .unwrap();
    pipeline
}

#[test]
fn test_transform_is_bit_identical_across_calls() {
    let pipeline = fitted();
    let batch = synthetic_frame(50, 8);
    let a = pipeline.transform(&batch).unwrap();
    let b = pipeline.transform(&batch).unwrap();
    assert_eq!(a.names(), b.names());
    for (x, y) in a.values().iter().zip(b.values()) {
        assert_eq!(x.to_bits(), y.to_bits());
    }
}

#[test]
fn test_schema_is_frozen_at_fit_time() {
    let pipeline = fitted();
    let names = pipeline.feature_names().unwrap().to_vec();
    assert_eq!(names.len(), 12 + 5 + ENGINEERED_FEATURES.len());
    assert_eq!(names[0], "kitchen_area");
    assert_eq!(names[12], "gas");
    assert_eq!(names[17], "building_age");

    // extra columns and a shuffled column order do not change the output
    let batch = synthetic_frame(20, 9);
    let mut columns: Vec<(String, Column)> = batch
        .columns()
        .map(|(n, c)| (n.to_string(), c.clone()))
        .collect();
    columns.reverse();
    columns.push(("listing_url".into(), Column::Categorical(vec![None; 20])));
    let shuffled = flatprice::Frame::from_columns(columns).unwrap();

    let a = pipeline.transform(&batch).unwrap();
    let b = pipeline.transform(&shuffled).unwrap();
    assert_eq!(a.names(), names.as_slice());
    assert_eq!(b.names(), names.as_slice());
    assert_eq!(a.values(), b.values());
}

#[test]
fn test_unseen_category_maps_to_first_class() {
    let pipeline = fitted();
    let mut records = synthetic_records(2, 10);
    records[0].district_name = "Kirovskij".into();
    records[1].district_name = "Centralnyj".into();
    let matrix = pipeline.transform(&records_to_frame(&records).unwrap()).unwrap();

    // classes are sorted, so "Centralnyj" is code 0
    let district = matrix.column("district_name").unwrap();
    assert_eq!(district[0], 0.0);
    assert_eq!(district[1], 0.0);
    assert_eq!(pipeline.state().unwrap().encoder.aliased_count(), 1);
}

#[test]
fn test_known_record_engineered_features() {
    let pipeline = fitted();
    let body = common::request_body();
    let record = flatprice::serving::validate_request(&body).unwrap();
    let matrix = pipeline.transform(&records_to_frame(&[record]).unwrap()).unwrap();

    let value = |name: &str| matrix.column(name).unwrap()[0];
    assert_abs_diff_eq!(value("building_age"), 14.0);
    assert_abs_diff_eq!(value("building_age_squared"), 196.0);
    assert_abs_diff_eq!(value("amenities_score"), 3.0);
    assert_abs_diff_eq!(value("area_per_room"), 16.25);
    assert_abs_diff_eq!(value("is_first_floor"), 0.0);
    assert_abs_diff_eq!(value("is_last_floor"), 0.0);
    assert_abs_diff_eq!(value("floor_ratio"), 0.5);
    assert_abs_diff_eq!(value("has_extra_area"), 1.0);
    assert_abs_diff_eq!(value("rooms_floor_interaction"), 15.0);
}

#[test]
fn test_transform_before_fit_and_missing_fields() {
    let pipeline = PreprocessingPipeline::new(CleaningConfig::default());
    let frame = synthetic_frame(5, 11);
    assert!(matches!(pipeline.transform(&frame), Err(Error::NotFitted(_))));

    let pipeline = fitted();
    let partial = frame.without_columns(&["total_area", "district_name"]);
    let err = pipeline.transform(&partial).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
    assert!(err.to_string().contains("total_area"));
}
