//! Quantile thresholds and the buckets they induce

use serde::{Deserialize, Serialize};

/// Quantile with linear interpolation between order statistics.
///
/// `NaN` values are ignored; returns `NaN` for an empty input.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_sorted(&sorted, q)
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// `(level, threshold)` for each level
pub fn calc_quantiles(values: &[f64], levels: &[f64]) -> Vec<(f64, f64)> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    levels
        .iter()
        .map(|&q| {
            let t = if sorted.is_empty() {
                f64::NAN
            } else {
                quantile_sorted(&sorted, q)
            };
            (q, t)
        })
        .collect()
}

/// Half-open interval of feature values `lower <= x < upper`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub label: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bucket {
    pub fn contains(&self, x: f64) -> bool {
        self.lower.map_or(true, |l| x >= l) && self.upper.map_or(true, |u| x < u)
    }

    /// Membership mask over a column
    pub fn mask(&self, values: &[f64]) -> Vec<bool> {
        values.iter().map(|&v| self.contains(v)).collect()
    }
}

/// Buckets covering the whole line: below the first threshold, between each
/// consecutive pair, and at or above the last one.
pub fn quantile_buckets(quantiles: &[(f64, f64)]) -> Vec<Bucket> {
    let Some(&(first_q, first_t)) = quantiles.first() else {
        return vec![Bucket {
            label: "all".to_string(),
            lower: None,
            upper: None,
        }];
    };

    let mut buckets = Vec::with_capacity(quantiles.len() + 1);
    buckets.push(Bucket {
        label: format!("x<{:.1}", first_q),
        lower: None,
        upper: Some(first_t),
    });
    for pair in quantiles.windows(2) {
        let (q, t) = pair[0];
        let (q_next, t_next) = pair[1];
        buckets.push(Bucket {
            label: format!("{:.1}<=x<{:.1}", q, q_next),
            lower: Some(t),
            upper: Some(t_next),
        });
    }
    if let Some(&(last_q, last_t)) = quantiles.last() {
        buckets.push(Bucket {
            label: format!("x>={:.1}", last_q),
            lower: Some(last_t),
            upper: None,
        });
    }
    buckets
}
