//! Property tests: feature derivation never divides by zero and metrics
//! stay within their bounds.

use proptest::prelude::*;

use flatprice::evaluation::evaluate;
use flatprice::preprocessing::features::{derive_row, RowInputs};

/// `a <= b` up to rounding.
fn le(a: f64, b: f64) -> bool {
    a <= b + 1e-9 * b.abs().max(1.0)
}

fn non_negative() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.0f64..1e4]
}

prop_compose! {
    fn arb_row()(
        kitchen_area in non_negative(),
        bath_area in non_negative(),
        other_area in non_negative(),
        extra_area in non_negative(),
        year in 1800.0f64..=2025.0,
        ceil_height in non_negative(),
        floor_max in non_negative(),
        floor in non_negative(),
        total_area in non_negative(),
        rooms_count in 0.0f64..=10.0,
        amenities in 0u8..=3,
    ) -> RowInputs {
        RowInputs {
            kitchen_area, bath_area, other_area, extra_area, year, ceil_height,
            floor_max, floor, total_area, rooms_count, amenities,
        }
    }
}

proptest! {
    #[test]
    fn test_derived_features_are_finite(row in arb_row()) {
        let derived = derive_row(&row);
        for v in derived {
            prop_assert!(v.is_finite());
        }
        prop_assert!(derived[9] >= 0.0 && derived[9] <= 3.0);
    }

    #[test]
    fn test_metric_bounds(
        pairs in prop::collection::vec((1e5f64..1e8, -1e6f64..1e6), 1..200)
    ) {
        let y_true: Vec<f64> = pairs.iter().map(|(y, _)| *y).collect();
        let y_pred: Vec<f64> = pairs.iter().map(|(y, e)| y + e).collect();
        let m = evaluate(&y_true, &y_pred).unwrap();

        prop_assert!(m.mae >= 0.0);
        prop_assert!(le(m.mae, m.rmse));
        prop_assert!(le(m.r2, 1.0));
        prop_assert!(le(m.median_absolute_error, m.max_error));
        let p = &m.error_percentiles;
        let ladder = [p.p25, p.p50, p.p75, p.p90, p.p95, p.p99, m.max_error];
        for w in ladder.windows(2) {
            prop_assert!(le(w[0], w[1]));
        }

        let within = [m.within_5_pct, m.within_10_pct, m.within_15_pct, m.within_20_pct];
        let within: Vec<f64> = within.into_iter().map(|w| w.unwrap()).collect();
        for w in within.windows(2) {
            prop_assert!(w[0] <= w[1]);
        }
        prop_assert!(within.iter().all(|w| (0.0..=100.0).contains(w)));
        prop_assert!(m.mape.unwrap() >= 0.0);
    }
}
