//! Trend analysis (§4.2): linear regression of a metric's recent history
//! with a projected threshold-crossing date.

use chrono::{DateTime, Utc};

use crate::metrics_provider::MetricPoint;

pub type TrendPoint = MetricPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendAnalysis {
    pub slope: f64,
    pub r_squared: f64,
    pub daily_change_pct: f64,
    pub direction: Direction,
    /// Days until `threshold` is crossed at the current slope, or `-1.0`
    /// when the slope is non-positive or the threshold is already crossed
    /// (§4.2, §8).
    pub days_until_threshold: f64,
    pub confidence: f64,
}

const DIRECTION_THRESHOLD_PCT: f64 = 0.5;
const CONFIDENCE_SAMPLE_BASELINE: f64 = 168.0; // one week of hourly samples
const CONFIDENCE_SPAN_BASELINE_DAYS: f64 = 7.0;

/// Linear regression of `value` against time-in-days since the first
/// point, plus the derived direction/projection/confidence fields.
pub fn analyze_trend(points: &[TrendPoint], threshold: f64) -> TrendAnalysis {
    if points.len() <= 1 {
        return TrendAnalysis {
            slope: 0.0,
            r_squared: 0.0,
            daily_change_pct: 0.0,
            direction: Direction::InsufficientData,
            days_until_threshold: -1.0,
            confidence: 0.0,
        };
    }

    let t0 = points[0].timestamp;
    let xs: Vec<f64> = points.iter().map(|p| days_since(t0, p.timestamp)).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.value).collect();

    let (slope, intercept) = least_squares(&xs, &ys);
    let r_squared = r_squared(&xs, &ys, slope, intercept);

    let current = *ys.last().unwrap();
    let mean = ys.iter().sum::<f64>() / ys.len() as f64;
    let daily_change_pct = if mean.abs() > f64::EPSILON {
        (slope / mean) * 100.0
    } else {
        0.0
    };

    let direction = if daily_change_pct.abs() > DIRECTION_THRESHOLD_PCT {
        if daily_change_pct > 0.0 {
            Direction::Increasing
        } else {
            Direction::Decreasing
        }
    } else {
        Direction::Stable
    };

    let days_until_threshold = if slope > 0.0 && current < threshold {
        (threshold - current) / slope
    } else {
        -1.0
    };

    let span_days = xs.last().copied().unwrap_or(0.0) - xs.first().copied().unwrap_or(0.0);
    let n_term = (points.len() as f64 / CONFIDENCE_SAMPLE_BASELINE).min(1.0);
    let r2_term = r_squared.max(0.0).min(1.0);
    let span_term = (span_days / CONFIDENCE_SPAN_BASELINE_DAYS).min(1.0);
    let confidence = (0.4 * n_term + 0.4 * r2_term + 0.2 * span_term).clamp(0.0, 1.0);

    TrendAnalysis {
        slope,
        r_squared,
        daily_change_pct,
        direction,
        days_until_threshold,
        confidence,
    }
}

fn days_since(t0: DateTime<Utc>, t: DateTime<Utc>) -> f64 {
    (t - t0).num_milliseconds() as f64 / 86_400_000.0
}

fn least_squares(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        numerator += (x - x_mean) * (y - y_mean);
        denominator += (x - x_mean).powi(2);
    }

    if denominator.abs() < f64::EPSILON {
        return (0.0, y_mean);
    }

    let slope = numerator / denominator;
    let intercept = y_mean - slope * x_mean;
    (slope, intercept)
}

fn r_squared(xs: &[f64], ys: &[f64], slope: f64, intercept: f64) -> f64 {
    let y_mean = ys.iter().sum::<f64>() / ys.len() as f64;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let predicted = slope * x + intercept;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - y_mean).powi(2);
    }
    if ss_tot.abs() < f64::EPSILON {
        return 1.0;
    }
    (1.0 - ss_res / ss_tot).max(0.0)
}
