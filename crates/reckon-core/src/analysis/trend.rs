//! Error-trend routines.
//!
//! Two deliberately separate heuristics:
//!
//! - [`slope_trend`]: closed-form least-squares slope over a trailing window,
//!   classified against an absolute threshold. Used by progress and approach
//!   evaluation (with different windows).
//! - [`ratio_trend`]: mean of the trailing window against the window before
//!   it, classified against a relative tolerance. Used by blocker detection.

use crate::domain::TrendDirection;

/// Slope of the least-squares line through `(i, values[i])`.
///
/// Zero for fewer than two points.
pub fn least_squares_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n_f;

    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 { 0.0 } else { num / den }
}

/// Classify the slope of the last `window` values.
///
/// Returns the direction together with the raw slope.
pub fn slope_trend(values: &[f64], window: usize, threshold: f64) -> (TrendDirection, f64) {
    let start = values.len().saturating_sub(window);
    let slope = least_squares_slope(&values[start..]);
    let direction = if slope < -threshold {
        TrendDirection::Decreasing
    } else if slope > threshold {
        TrendDirection::Increasing
    } else {
        TrendDirection::Stable
    };
    (direction, slope)
}

/// Compare the mean of the last `window` values with the `window` before.
pub fn ratio_trend(values: &[f64], window: usize, tolerance: f64) -> TrendDirection {
    if window == 0 || values.len() <= window {
        return TrendDirection::Stable;
    }
    let split = values.len() - window;
    let recent = &values[split..];
    let previous = &values[split.saturating_sub(window)..split];

    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let (recent_mean, previous_mean) = (mean(recent), mean(previous));

    if previous_mean == 0.0 {
        return if recent_mean > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Stable
        };
    }
    if recent_mean > previous_mean * (1.0 + tolerance) {
        TrendDirection::Increasing
    } else if recent_mean < previous_mean * (1.0 - tolerance) {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}
