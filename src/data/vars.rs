//! Regression variables built from a feature frame
//!
//! The feature is the age difference `a - b`; targets are forward changes of
//! the weighted mid. Rows with a missing value in any column are dropped and
//! the remainder is split in half, chronologically, into train and test.

use super::frame::FeatureFrame;
use crate::error::{Error, Result};

/// `y[i] = series[i + n] - series[i]`, `NaN` where `i + n` runs off the end
pub fn forward_delta(series: &[f64], n: usize) -> Vec<f64> {
    (0..series.len())
        .map(|i| match series.get(i + n) {
            Some(ahead) => ahead - series[i],
            None => f64::NAN,
        })
        .collect()
}

/// Feature and a single target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegressionVars {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl RegressionVars {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Feature and one target column per forward horizon
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HorizonVars {
    pub x: Vec<f64>,
    pub horizons: Vec<usize>,
    /// `targets[j]` is the column for `horizons[j]`
    pub targets: Vec<Vec<f64>>,
}

impl HorizonVars {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Target column for a horizon
    pub fn target(&self, horizon: usize) -> Option<&[f64]> {
        self.horizons
            .iter()
            .position(|h| *h == horizon)
            .map(|j| self.targets[j].as_slice())
    }

    /// Keep only the rows where `keep` is true
    pub fn filter_rows(&self, keep: &[bool]) -> Self {
        let pick = |col: &[f64]| -> Vec<f64> {
            col.iter()
                .zip(keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| *v)
                .collect()
        };
        Self {
            x: pick(&self.x),
            horizons: self.horizons.clone(),
            targets: self.targets.iter().map(|c| pick(c)).collect(),
        }
    }
}

/// `start, start + step, ...` strictly below `end`
pub fn horizon_grid(start: usize, end: usize, step: usize) -> Result<Vec<usize>> {
    if step == 0 || start == 0 {
        return Err(Error::InvalidInput(
            "horizon grid needs a positive start and step".to_string(),
        ));
    }
    let grid: Vec<usize> = (start..end).step_by(step).collect();
    if grid.is_empty() {
        return Err(Error::InvalidInput(format!(
            "empty horizon grid {}..{} step {}",
            start, end, step
        )));
    }
    Ok(grid)
}

/// One-second rows looking 1, 31, 61, ... seconds ahead, under an hour
pub fn default_horizons() -> Vec<usize> {
    (1..60 * 60).step_by(30).collect()
}

fn split_half<T, F>(n: usize, build: F) -> (T, T)
where
    F: Fn(std::ops::Range<usize>) -> T,
{
    let mid = n / 2;
    (build(0..mid), build(mid..n))
}

/// Feature against the mid change `n` rows ahead, split in half
pub fn regression_vars(
    frame: &FeatureFrame,
    n: usize,
) -> Result<(RegressionVars, RegressionVars)> {
    if n == 0 {
        return Err(Error::InvalidInput("horizon must be positive".to_string()));
    }
    let x_all = frame.age_difference();
    let y_all = forward_delta(&frame.mid(), n);

    let (x, y): (Vec<f64>, Vec<f64>) = x_all
        .into_iter()
        .zip(y_all)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .unzip();

    if x.len() < 2 {
        return Err(Error::InsufficientData(format!(
            "{} complete rows for horizon {} out of {}",
            x.len(),
            n,
            frame.len()
        )));
    }

    Ok(split_half(x.len(), |r| RegressionVars {
        x: x[r.clone()].to_vec(),
        y: y[r].to_vec(),
    }))
}

/// Feature against one forward mid change per horizon, split in half
pub fn multiple_regr_vars(
    frame: &FeatureFrame,
    horizons: &[usize],
) -> Result<(HorizonVars, HorizonVars)> {
    if horizons.is_empty() || horizons.contains(&0) {
        return Err(Error::InvalidInput(
            "horizons must be non-empty and positive".to_string(),
        ));
    }
    let x_all = frame.age_difference();
    let mid = frame.mid();
    let targets_all: Vec<Vec<f64>> = horizons.iter().map(|&n| forward_delta(&mid, n)).collect();

    let keep: Vec<bool> = (0..x_all.len())
        .map(|i| !x_all[i].is_nan() && targets_all.iter().all(|c| !c[i].is_nan()))
        .collect();

    let all = HorizonVars {
        x: x_all,
        horizons: horizons.to_vec(),
        targets: targets_all,
    }
    .filter_rows(&keep);

    if all.len() < 2 {
        return Err(Error::InsufficientData(format!(
            "{} complete rows for the longest horizon {} out of {}",
            all.len(),
            horizons.iter().max().copied().unwrap_or(0),
            frame.len()
        )));
    }

    Ok(split_half(all.len(), |r| HorizonVars {
        x: all.x[r.clone()].to_vec(),
        horizons: all.horizons.clone(),
        targets: all.targets.iter().map(|c| c[r.clone()].to_vec()).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::FeatureRow;

    fn frame_from(mid: &[f64], ages: &[(f64, f64)]) -> FeatureFrame {
        FeatureFrame::from_rows(
            mid.iter()
                .zip(ages)
                .enumerate()
                .map(|(i, (&x, &(b, a)))| FeatureRow {
                    t: i as f64,
                    x,
                    c1: 1.0,
                    c2: 1.0,
                    b,
                    a,
                })
                .collect(),
        )
    }

    #[test]
    fn test_forward_delta() {
        let d = forward_delta(&[1.0, 2.0, 4.0, 7.0], 2);
        assert_eq!(d[0], 3.0);
        assert_eq!(d[1], 5.0);
        assert!(d[2].is_nan() && d[3].is_nan());
    }

    #[test]
    fn test_regression_vars_drops_and_splits() {
        let mid = [10.0, 11.0, 13.0, 16.0, 20.0, 25.0, 31.0];
        let ages = [
            (1.0, 2.0),
            (f64::NAN, 1.0),
            (0.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (0.0, 3.0),
            (0.0, 0.0),
        ];
        let (train, test) = regression_vars(&frame_from(&mid, &ages), 1).unwrap();
        // row 1 has NaN age, row 6 has no forward value
        assert_eq!(train.len() + test.len(), 5);
        assert_eq!(train.len(), 2);
        assert_eq!(train.x, vec![1.0, 0.0]);
        assert_eq!(train.y, vec![1.0, 3.0]);
        assert_eq!(test.x, vec![-1.0, 0.0, 3.0]);
        assert_eq!(test.y, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_regression_vars_too_short() {
        let frame = frame_from(&[1.0, 2.0], &[(0.0, 0.0), (0.0, 0.0)]);
        assert!(matches!(
            regression_vars(&frame, 5),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_multiple_regr_vars_uses_longest_horizon() {
        let mid: Vec<f64> = (0..10).map(|i| (i * i) as f64).collect();
        let ages: Vec<(f64, f64)> = (0..10).map(|i| (0.0, i as f64)).collect();
        let (train, test) = multiple_regr_vars(&frame_from(&mid, &ages), &[1, 3]).unwrap();
        assert_eq!(train.len() + test.len(), 7);
        assert_eq!(train.horizons, vec![1, 3]);
        assert_eq!(train.target(1).unwrap(), &[1.0, 3.0, 5.0]);
        assert_eq!(train.target(3).unwrap(), &[9.0, 15.0, 21.0]);
        assert_eq!(test.x, vec![3.0, 4.0, 5.0, 6.0]);
        assert!(test.target(2).is_none());
    }

    #[test]
    fn test_default_horizons() {
        let h = default_horizons();
        assert_eq!(h.first(), Some(&1));
        assert_eq!(h[1], 31);
        assert_eq!(h.last(), Some(&3571));
        assert_eq!(h.len(), 120);
    }

    #[test]
    fn test_horizon_grid_validation() {
        assert_eq!(horizon_grid(1, 100, 30).unwrap(), vec![1, 31, 61, 91]);
        assert!(horizon_grid(1, 100, 0).is_err());
        assert!(horizon_grid(10, 5, 1).is_err());
    }
}
