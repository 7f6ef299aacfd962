//! Regression quality overall and conditioned on feature quantiles
//!
//! Quantile thresholds are always estimated on the training half and then
//! applied unchanged to the test half.

use super::linregress::{linregress, pearson, LinearFit};
use super::quantiles::{calc_quantiles, quantile_buckets, Bucket};
use super::table::Table;
use crate::data::{HorizonVars, RegressionVars};
use crate::error::{Error, Result};
use tracing::debug;

/// Column label for statistics over the whole sample
pub const FULL: &str = "full";

/// `1 - mean((pred - y)^2) / mean(y^2)`
pub fn rsquared(pred: &[f64], y: &[f64]) -> f64 {
    let n = pred.len().min(y.len()) as f64;
    let mse = pred.iter().zip(y).map(|(p, t)| (p - t).powi(2)).sum::<f64>() / n;
    let msy = y.iter().map(|t| t * t).sum::<f64>() / y.len() as f64;
    1.0 - mse / msy
}

/// `sqrt(1 - SSE / sum(y^2))`; `NaN` when the fit is worse than zero
fn uncentred_r(pred: &[f64], y: &[f64]) -> f64 {
    let sse: f64 = pred.iter().zip(y).map(|(p, t)| (p - t).powi(2)).sum();
    let syy: f64 = y.iter().map(|t| t * t).sum();
    (1.0 - sse / syy).sqrt()
}

fn rms(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v * v, n + 1));
    (sum / n as f64).sqrt()
}

/// Train/test fit quality of the single-horizon regression
#[derive(Debug, Clone, Copy)]
pub struct RegressionSummary {
    pub r_train: f64,
    pub r_test: f64,
    pub fit: LinearFit,
}

/// Fit on train, score both halves with the uncentred `r`
pub fn regression(train: &RegressionVars, test: &RegressionVars) -> Result<RegressionSummary> {
    let fit = linregress(&train.x, &train.y)?;
    let r_train = uncentred_r(&fit.predict_all(&train.x), &train.y);
    let r_test = uncentred_r(&fit.predict_all(&test.x), &test.y);
    Ok(RegressionSummary {
        r_train,
        r_test,
        fit,
    })
}

/// RMS residual of the train-fitted line on train and on test
pub fn regression_with_variance(
    train_x: &[f64],
    train_y: &[f64],
    test_x: &[f64],
    test_y: &[f64],
) -> Result<(f64, f64)> {
    let fit = linregress(train_x, train_y)?;
    let err = |x: &[f64], y: &[f64]| rms(x.iter().zip(y).map(|(&xi, &yi)| yi - fit.predict(xi)));
    Ok((err(train_x, train_y), err(test_x, test_y)))
}

fn select(values: &[f64], mask: &[bool]) -> Vec<f64> {
    values
        .iter()
        .zip(mask)
        .filter(|(_, m)| **m)
        .map(|(v, _)| *v)
        .collect()
}

fn check_horizons(train: &HorizonVars, test: &HorizonVars) -> Result<()> {
    if train.horizons != test.horizons {
        return Err(Error::InvalidInput(
            "train and test must share the same horizons".to_string(),
        ));
    }
    if train.is_empty() {
        return Err(Error::InsufficientData("empty training set".to_string()));
    }
    Ok(())
}

/// Buckets from the train feature, plus the column labels (`full` first)
pub fn train_buckets(train: &HorizonVars, levels: &[f64]) -> (Vec<(f64, f64)>, Vec<Bucket>) {
    let quantiles = calc_quantiles(&train.x, levels);
    let buckets = quantile_buckets(&quantiles);
    (quantiles, buckets)
}

fn table_columns(buckets: &[Bucket]) -> Vec<String> {
    std::iter::once(FULL.to_string())
        .chain(buckets.iter().map(|b| b.label.clone()))
        .collect()
}

/// Correlation of the feature with every target, overall and per bucket.
///
/// Returns `(train, test)` tables indexed by horizon.
pub fn quantile_correlations(
    train: &HorizonVars,
    test: &HorizonVars,
    levels: &[f64],
) -> Result<(Table, Table)> {
    check_horizons(train, test)?;
    let (quantiles, buckets) = train_buckets(train, levels);
    debug!(?quantiles, "correlation thresholds");
    let columns = table_columns(&buckets);

    let mut out = Vec::with_capacity(2);
    for (name, data) in [("train", train), ("test", test)] {
        let mut table = Table::new(
            format!("correlation ({})", name),
            "horizon",
            data.horizons.clone(),
            columns.clone(),
        );
        let full: Vec<f64> = data.targets.iter().map(|y| pearson(&data.x, y)).collect();
        table.set_column(0, &full)?;
        for (j, bucket) in buckets.iter().enumerate() {
            let mask = bucket.mask(&data.x);
            let x = select(&data.x, &mask);
            let col: Vec<f64> = data
                .targets
                .iter()
                .map(|y| pearson(&x, &select(y, &mask)))
                .collect();
            table.set_column(j + 1, &col)?;
        }
        out.push(table);
    }
    let test_table = out.pop().ok_or_else(|| Error::InvalidInput("missing test table".into()))?;
    let train_table = out.pop().ok_or_else(|| Error::InvalidInput("missing train table".into()))?;
    Ok((train_table, test_table))
}

/// Root-mean-square of each target column (the error normaliser)
pub fn target_rms(data: &HorizonVars) -> Vec<f64> {
    data.targets.iter().map(|y| rms(y.iter().copied())).collect()
}

/// RMS error of per-bucket line fits, normalised by the RMS of the target.
///
/// Each bucket is fitted on its training rows and scored on its training and
/// test rows. Errors are divided by the RMS of the whole train (resp. test)
/// target column. Buckets that cannot be fitted are `NaN`.
pub fn quantile_regressions(
    train: &HorizonVars,
    test: &HorizonVars,
    levels: &[f64],
) -> Result<(Table, Table)> {
    check_horizons(train, test)?;
    let (quantiles, buckets) = train_buckets(train, levels);
    debug!(?quantiles, "regression thresholds");
    let columns = table_columns(&buckets);
    let norm_train = target_rms(train);
    let norm_test = target_rms(test);

    let mut train_table = Table::new(
        "normalised RMS error (train)",
        "horizon",
        train.horizons.clone(),
        columns.clone(),
    );
    let mut test_table = Table::new(
        "normalised RMS error (test)",
        "horizon",
        test.horizons.clone(),
        columns,
    );

    let masks: Vec<(Vec<bool>, Vec<bool>)> = std::iter::once((
        vec![true; train.len()],
        vec![true; test.len()],
    ))
    .chain(
        buckets
            .iter()
            .map(|b| (b.mask(&train.x), b.mask(&test.x))),
    )
    .collect();

    for (j, (train_mask, test_mask)) in masks.iter().enumerate() {
        let tx = select(&train.x, train_mask);
        let vx = select(&test.x, test_mask);
        let mut col_train = Vec::with_capacity(train.horizons.len());
        let mut col_test = Vec::with_capacity(train.horizons.len());
        for (h, (ty, vy)) in train.targets.iter().zip(&test.targets).enumerate() {
            let ty = select(ty, train_mask);
            let vy = select(vy, test_mask);
            let (e_train, e_test) = match regression_with_variance(&tx, &ty, &vx, &vy) {
                Ok(errs) => errs,
                Err(Error::InsufficientData(reason)) => {
                    debug!(column = %train_table.columns[j], horizon = train.horizons[h], %reason, "bucket skipped");
                    (f64::NAN, f64::NAN)
                }
                Err(e) => return Err(e),
            };
            col_train.push(e_train / norm_train[h]);
            col_test.push(e_test / norm_test[h]);
        }
        train_table.set_column(j, &col_train)?;
        test_table.set_column(j, &col_test)?;
    }

    Ok((train_table, test_table))
}
