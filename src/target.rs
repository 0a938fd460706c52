//! Target label encoding.

use serde::{Deserialize, Serialize};

use crate::attributes::Bounds;
use crate::normalize::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetMode {
    Regression,
    /// Label is `1` when the raw value reaches the threshold.
    Threshold(f64),
}

impl TargetMode {
    /// Non-positive thresholds select regression.
    pub fn from_threshold(threshold: f64) -> Self {
        if threshold > 0.0 {
            Self::Threshold(threshold)
        } else {
            Self::Regression
        }
    }

    pub fn encode(self, raw_value: f64, column: Bounds) -> f64 {
        match self {
            Self::Regression => normalize(raw_value, column.min, column.max),
            Self::Threshold(threshold) => {
                if raw_value < threshold {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}

pub fn encode_target(raw_value: f64, threshold: f64, column_min: f64, column_max: f64) -> f64 {
    TargetMode::from_threshold(threshold).encode(raw_value, Bounds::new(column_min, column_max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_mode_splits_at_threshold_inclusive() {
        assert_eq!(encode_target(9.0, 10.0, 0.0, 100.0), 0.0);
        assert_eq!(encode_target(10.0, 10.0, 0.0, 100.0), 1.0);
        assert_eq!(encode_target(5_000.0, 10.0, 0.0, 100.0), 1.0);
    }

    #[test]
    fn non_positive_threshold_is_regression() {
        for raw in [0.0, 12.5, 40.0, 100.0, 250.0] {
            assert_eq!(
                encode_target(raw, 0.0, 0.0, 100.0),
                normalize(raw, 0.0, 100.0)
            );
            assert_eq!(
                encode_target(raw, -3.0, 0.0, 100.0),
                normalize(raw, 0.0, 100.0)
            );
        }
        assert_eq!(TargetMode::from_threshold(0.0), TargetMode::Regression);
    }

    #[test]
    fn regression_on_degenerate_column_is_zero() {
        assert_eq!(encode_target(42.0, 0.0, 42.0, 42.0), 0.0);
    }
}
