//! Per-metric bound pairs.

use serde::{Deserialize, Serialize};

/// Whether a bound admits its own value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    #[default]
    Inclusive,
    Exclusive,
}

/// Lower and upper bound on one metric's weight.
///
/// Decoding goes through [`Threshold::new`], so inverted values read from
/// JSON are swapped exactly like builder input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ThresholdRecord")]
pub struct Threshold {
    pub left_bound: Bound,
    #[serde(with = "crate::model::float")]
    pub left_value: f64,
    pub right_bound: Bound,
    #[serde(with = "crate::model::float")]
    pub right_value: f64,
}

/// Wire form of [`Threshold`] before normalization.
#[derive(Deserialize)]
struct ThresholdRecord {
    #[serde(default)]
    left_bound: Bound,
    #[serde(with = "crate::model::float")]
    left_value: f64,
    #[serde(default)]
    right_bound: Bound,
    #[serde(with = "crate::model::float")]
    right_value: f64,
}

impl From<ThresholdRecord> for Threshold {
    fn from(r: ThresholdRecord) -> Self {
        Self::new(r.left_bound, r.left_value, r.right_bound, r.right_value)
    }
}

impl Threshold {
    /// Bounds given in the wrong order are swapped (the bound kinds stay
    /// attached to their side).
    pub fn new(left_bound: Bound, left_value: f64, right_bound: Bound, right_value: f64) -> Self {
        let (left_value, right_value) = if left_value > right_value {
            (right_value, left_value)
        } else {
            (left_value, right_value)
        };
        Self { left_bound, left_value, right_bound, right_value }
    }

    /// `[lo, hi]`
    pub fn inclusive(lo: f64, hi: f64) -> Self {
        Self::new(Bound::Inclusive, lo, Bound::Inclusive, hi)
    }

    /// `(lo, hi)`
    pub fn exclusive(lo: f64, hi: f64) -> Self {
        Self::new(Bound::Exclusive, lo, Bound::Exclusive, hi)
    }

    /// Inclusive range covering `[min, max]`, the permissive default for
    /// a metric whose extrema are known.
    pub fn spanning(min: f64, max: f64) -> Self {
        Self::inclusive(min, max)
    }

    pub fn satisfies(&self, value: f64) -> bool {
        satisfies(value, self)
    }
}

/// Both bounds must hold. Comparisons against NaN are false, so a NaN
/// weight never satisfies any threshold.
pub fn satisfies(value: f64, threshold: &Threshold) -> bool {
    let lower_ok = match threshold.left_bound {
        Bound::Inclusive => value >= threshold.left_value,
        Bound::Exclusive => value > threshold.left_value,
    };
    let upper_ok = match threshold.right_bound {
        Bound::Inclusive => value <= threshold.right_value,
        Bound::Exclusive => value < threshold.right_value,
    };
    lower_ok && upper_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_half_open_boundaries() {
        let t = Threshold::new(Bound::Inclusive, 5.0, Bound::Exclusive, 10.0);
        assert!(t.satisfies(5.0));
        assert!(!t.satisfies(10.0));
        assert!(t.satisfies(7.5));
        assert!(!t.satisfies(f64::NAN));
        assert!(!t.satisfies(4.999));
    }

    #[test]
    fn test_exclusive_both_sides() {
        let t = Threshold::exclusive(0.0, 1.0);
        assert!(!t.satisfies(0.0));
        assert!(!t.satisfies(1.0));
        assert!(t.satisfies(0.5));
    }

    #[test]
    fn test_inverted_values_swapped() {
        let t = Threshold::inclusive(10.0, 2.0);
        assert_eq!(t.left_value, 2.0);
        assert_eq!(t.right_value, 10.0);
        assert!(t.satisfies(3.0));
    }

    #[test]
    fn test_serde_shape() {
        let t = Threshold::new(Bound::Exclusive, f64::NEG_INFINITY, Bound::Inclusive, 0.5);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(
            json,
            r#"{"left_bound":"exclusive","left_value":"-inf","right_bound":"inclusive","right_value":0.5}"#
        );
        let back: Threshold = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_decoded_inverted_values_swapped() {
        let t: Threshold = serde_json::from_str(
            r#"{"left_bound":"inclusive","left_value":10.0,"right_bound":"exclusive","right_value":0.0}"#,
        )
        .unwrap();
        assert_eq!(t, Threshold::new(Bound::Inclusive, 10.0, Bound::Exclusive, 0.0));
        assert_eq!((t.left_value, t.right_value), (0.0, 10.0));
        assert!(t.satisfies(5.0));
    }

    proptest! {
        #[test]
        fn nan_never_satisfies(lo in -1e6f64..1e6, hi in -1e6f64..1e6) {
            for (l, r) in [(Bound::Inclusive, Bound::Inclusive), (Bound::Exclusive, Bound::Exclusive),
                           (Bound::Inclusive, Bound::Exclusive), (Bound::Exclusive, Bound::Inclusive)] {
                prop_assert!(!Threshold::new(l, lo, r, hi).satisfies(f64::NAN));
            }
        }

        #[test]
        fn inclusive_contains_its_endpoints(a in -1e6f64..1e6, b in -1e6f64..1e6) {
            let t = Threshold::inclusive(a, b);
            prop_assert!(t.satisfies(a));
            prop_assert!(t.satisfies(b));
        }
    }
}
