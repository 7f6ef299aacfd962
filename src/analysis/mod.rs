//! Regression analysis
//!
//! - `linregress`: least squares line fit with inference statistics
//! - `quantiles`: quantile thresholds and the buckets they induce
//! - `evaluation`: fit quality overall and per feature bucket
//! - `table`: horizon x bucket result tables

pub mod evaluation;
pub mod linregress;
pub mod quantiles;
pub mod table;

pub use evaluation::{
    quantile_correlations, quantile_regressions, regression, regression_with_variance, rsquared,
    target_rms, RegressionSummary, FULL,
};
pub use linregress::{linregress, pearson, LinearFit};
pub use quantiles::{calc_quantiles, quantile, quantile_buckets, Bucket};
pub use table::Table;
