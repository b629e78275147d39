//! Numeric utilities
//!
//! Admission filtering for numeric samples and percentile computation with
//! linear interpolation between order statistics.

use crate::types::{LevelValues, StreamValue};

/// Decimal places kept in quantile summaries
pub const QUANTILE_DECIMALS: i32 = 6;

/// True iff the sample is present and numeric.
///
/// Distinguishes a missing reading from a reading of zero.
pub fn is_numeric(value: &StreamValue) -> bool {
    matches!(value, StreamValue::Number(v) if !v.is_nan())
}

/// Numeric samples of a stream in order, gaps dropped
pub fn extract_numeric(data: &[StreamValue]) -> impl Iterator<Item = f64> + '_ {
    data.iter().filter(|v| is_numeric(v)).filter_map(StreamValue::as_f64)
}

/// Percentiles of `values` at each of `levels` (0..=100).
///
/// Uses linear interpolation between the two nearest order statistics.
/// Returns `None` when `values` is empty or a level is above 100.
pub fn quantiles(values: &[f64], levels: &[u32]) -> Option<Vec<f64>> {
    if values.is_empty() || levels.iter().any(|&level| level > 100) {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = (sorted.len() - 1) as f64;

    let result = levels
        .iter()
        .map(|&level| {
            let position = last * (level as f64) / 100.0;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            lerp(sorted[lower], sorted[upper], position - lower as f64)
        })
        .collect();

    Some(result)
}

/// Rounded quantiles keyed by level, or `None` when there are no values
pub fn quantile_levels(values: &[f64], levels: &[u32]) -> Option<LevelValues> {
    let computed = quantiles(values, levels)?;
    Some(
        levels
            .iter()
            .zip(computed)
            .map(|(&level, value)| (level, round_decimals(value, QUANTILE_DECIMALS)))
            .collect(),
    )
}

/// Round half to even at the given number of decimal places
pub fn round_decimals(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Format as the nearest integer, ties to even
pub fn format_rounded(value: f64) -> String {
    (value.round_ties_even() as i64).to_string()
}

/// Interpolate from the nearer endpoint to limit rounding error
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    let diff = b - a;
    if t >= 0.5 {
        b - diff * (1.0 - t)
    } else {
        a + diff * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVELS: [u32; 5] = [5, 25, 50, 75, 95];

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric(&StreamValue::Number(0.0)));
        assert!(!is_numeric(&StreamValue::Missing));
        assert!(!is_numeric(&StreamValue::Text(String::new())));
        assert!(!is_numeric(&StreamValue::Flag(true)));
    }

    #[test]
    fn test_extract_numeric_drops_gaps() {
        let data = vec![
            StreamValue::Number(1.0),
            StreamValue::Missing,
            StreamValue::Number(0.0),
            StreamValue::Text(String::new()),
            StreamValue::Number(3.5),
        ];
        let values: Vec<f64> = extract_numeric(&data).collect();
        assert_eq!(values, vec![1.0, 0.0, 3.5]);

        assert_eq!(extract_numeric(&[]).count(), 0);
    }

    #[test]
    fn test_median_odd_length() {
        let result = quantiles(&[7.0, 1.0, 3.0], &[50]).unwrap();
        assert_eq!(result, vec![3.0]);
    }

    #[test]
    fn test_median_even_length() {
        let result = quantiles(&[4.0, 1.0, 3.0, 2.0], &[50]).unwrap();
        assert_eq!(result, vec![2.5]);
    }

    #[test]
    fn test_linear_interpolation() {
        // Positions over 0..=10: 5% -> 0.5, 25% -> 2.5, 75% -> 7.5, 95% -> 9.5
        let values: Vec<f64> = (0..=10).map(|v| v as f64 * 10.0).collect();
        let result = quantiles(&values, &LEVELS).unwrap();
        assert_eq!(result, vec![5.0, 25.0, 50.0, 75.0, 95.0]);
    }

    #[test]
    fn test_single_value() {
        let result = quantiles(&[42.0], &LEVELS).unwrap();
        assert!(result.iter().all(|&v| v == 42.0));
    }

    #[test]
    fn test_empty_values() {
        assert!(quantiles(&[], &LEVELS).is_none());
        assert!(quantile_levels(&[], &LEVELS).is_none());
    }

    #[test]
    fn test_levels_above_hundred_rejected() {
        assert_eq!(quantiles(&[1.0, 2.0, 3.0], &[50, 101]), None);
        assert_eq!(quantile_levels(&[1.0], &[250]), None);
        assert_eq!(quantiles(&[1.0, 2.0, 3.0], &[0, 100]), Some(vec![1.0, 3.0]));
    }

    #[test]
    fn test_quantile_levels_rounded() {
        let levels = quantile_levels(&[0.0, 1.0 / 3.0], &[50]).unwrap();
        assert_eq!(levels[&50], 0.166667);
    }

    #[test]
    fn test_format_rounded_ties_to_even() {
        assert_eq!(format_rounded(2.5), "2");
        assert_eq!(format_rounded(3.5), "4");
        assert_eq!(format_rounded(140.2), "140");
        assert_eq!(format_rounded(-0.4), "0");
    }
}
