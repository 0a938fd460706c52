//! Min/max scaling into `[-1, 1]`.

/// Value returned for a zero-width range.
pub const DEGENERATE_RANGE_VALUE: f64 = 0.0;

/// Scales `value` so that `lo` maps to `-1`, `hi` to `1` and the midpoint to `0`.
///
/// A zero-width range (`lo == hi`) is undefined and yields
/// [`DEGENERATE_RANGE_VALUE`]. Any other non-finite result (NaN or infinite
/// inputs) is also replaced by that value.
pub fn normalize(value: f64, lo: f64, hi: f64) -> f64 {
    if hi == lo {
        return DEGENERATE_RANGE_VALUE;
    }
    let half_width = (hi - lo) / 2.0;
    let scaled = (value - (hi + lo) / 2.0) / half_width;
    if scaled.is_finite() {
        scaled
    } else {
        DEGENERATE_RANGE_VALUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_and_midpoint_map_to_unit_interval() {
        assert_eq!(normalize(10.0, 10.0, 30.0), -1.0);
        assert_eq!(normalize(30.0, 10.0, 30.0), 1.0);
        assert_eq!(normalize(20.0, 10.0, 30.0), 0.0);
        assert_eq!(normalize(-5.0, -5.0, 5.0), -1.0);
    }

    #[test]
    fn out_of_range_values_are_not_clamped() {
        assert_eq!(normalize(50.0, 10.0, 30.0), 3.0);
        assert_eq!(normalize(0.0, 10.0, 30.0), -2.0);
    }

    #[test]
    fn degenerate_range_yields_sentinel() {
        assert_eq!(normalize(7.0, 3.0, 3.0), DEGENERATE_RANGE_VALUE);
        assert_eq!(normalize(3.0, 3.0, 3.0), DEGENERATE_RANGE_VALUE);
    }

    #[test]
    fn non_finite_inputs_yield_sentinel() {
        assert_eq!(normalize(f64::NAN, 0.0, 1.0), DEGENERATE_RANGE_VALUE);
        assert_eq!(normalize(f64::INFINITY, 0.0, 1.0), DEGENERATE_RANGE_VALUE);
        assert_eq!(normalize(1.0, 0.0, f64::INFINITY), DEGENERATE_RANGE_VALUE);
    }
}
