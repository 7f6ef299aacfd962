//! Data module
//!
//! - Feature frames sampled from the order book (`t x c1 c2 b a`)
//! - Regression variables: age difference vs. forward mid change

pub mod frame;
pub mod vars;

pub use frame::{FeatureFrame, FeatureRow, COLUMNS};
pub use vars::{
    default_horizons, forward_delta, horizon_grid, multiple_regr_vars, regression_vars,
    HorizonVars, RegressionVars,
};
