//! Synthetic listings shared by the integration tests.

#![allow(dead_code)]

use flatprice::config::BoostingConfig;
use flatprice::{Frame, PipelineConfig, PropertyRecord};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde_json::{json, Value};

pub const DISTRICTS: [&str; 4] = ["Centralnyj", "Petrogradskij", "Moskovskij", "Nevskij"];

/// `price = 100_000 * total_area + noise`, other fields random but plausible.
pub fn synthetic_records(n: usize, seed: u64) -> Vec<PropertyRecord> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let total_area: f64 = rng.gen_range(25.0..150.0);
            let rooms_count = rng.gen_range(1..=5) as f64;
            let floor_max = rng.gen_range(5..=25) as f64;
            let yes_no = |rng: &mut Xoshiro256PlusPlus| if rng.gen_bool(0.7) { "Yes" } else { "No" };
            PropertyRecord {
                kitchen_area: total_area * rng.gen_range(0.1..0.2),
                bath_area: total_area * rng.gen_range(0.04..0.08),
                other_area: total_area * rng.gen_range(0.5..0.7),
                gas: yes_no(&mut rng).into(),
                hot_water: yes_no(&mut rng).into(),
                central_heating: yes_no(&mut rng).into(),
                extra_area: rng.gen_range(0.0..15.0),
                extra_area_count: rng.gen_range(0..=2) as f64,
                year: rng.gen_range(1950..=2023) as f64,
                ceil_height: rng.gen_range(2.5..3.2),
                floor_max,
                floor: rng.gen_range(1.0..=floor_max).round(),
                total_area,
                bath_count: rng.gen_range(1..=2) as f64,
                extra_area_type_name: if i % 3 == 0 { "loggia" } else { "balcony" }.into(),
                district_name: DISTRICTS[i % DISTRICTS.len()].into(),
                rooms_count,
                price: Some(100_000.0 * total_area + rng.gen_range(-100_000.0..100_000.0)),
            }
        })
        .collect()
}

pub fn synthetic_frame(n: usize, seed: u64) -> Frame {
    flatprice::data::records_to_frame(&synthetic_records(n, seed)).unwrap()
}

/// Small, single-threaded configuration that still fits the linear signal.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        boosting: BoostingConfig::builder()
            .n_rounds(60)
            .learning_rate(0.2)
            .max_depth(5)
            .max_leaves(16)
            .oblivious_depth(5)
            .n_threads(1)
            .build()
            .unwrap(),
        ..PipelineConfig::default()
    }
}

/// The documented example request.
pub fn request_body() -> Value {
    json!({
        "kitchen_area": 10.0, "bath_area": 5.0, "other_area": 50.5,
        "gas": "Yes", "hot_water": "Yes", "central_heating": "Yes",
        "extra_area": 10.0, "extra_area_count": 1, "year": 2010,
        "ceil_height": 2.7, "floor_max": 10, "floor": 5, "total_area": 65.0,
        "bath_count": 1, "extra_area_type_name": "balcony",
        "district_name": "Centralnyj", "rooms_count": 3
    })
}
