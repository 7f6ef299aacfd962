//! Simple linear regression and correlation
//!
//! Least squares fit of `y = intercept + slope * x` with the usual inference
//! statistics.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Result of a least squares line fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation between x and y
    pub rvalue: f64,
    /// Two-sided p-value for a zero slope
    pub pvalue: f64,
    /// Standard error of the slope
    pub stderr: f64,
    /// Standard error of the intercept
    pub intercept_stderr: f64,
    /// Number of points
    pub n: usize,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    pub fn predict_all(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&v| self.predict(v)).collect()
    }
}

fn mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / v.len() as f64
}

/// Fit a line by ordinary least squares.
///
/// Fails with `InsufficientData` for fewer than two points or when every
/// `x` is identical.
pub fn linregress(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(Error::ShapeMismatch {
            expected: (x.len(), 1),
            got: (y.len(), 1),
        });
    }
    let n = x.len();
    if n < 2 {
        return Err(Error::InsufficientData(format!(
            "linear regression needs at least 2 points, got {}",
            n
        )));
    }

    let xmean = mean(x);
    let ymean = mean(y);
    let nf = n as f64;
    let mut ssxm = 0.0;
    let mut ssym = 0.0;
    let mut ssxym = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - xmean;
        let dy = yi - ymean;
        ssxm += dx * dx;
        ssym += dy * dy;
        ssxym += dx * dy;
    }
    ssxm /= nf;
    ssym /= nf;
    ssxym /= nf;

    if ssxm == 0.0 {
        return Err(Error::InsufficientData(
            "cannot fit a line when all x values are identical".to_string(),
        ));
    }

    let rvalue = if ssym == 0.0 {
        0.0
    } else {
        (ssxym / (ssxm * ssym).sqrt()).clamp(-1.0, 1.0)
    };
    let slope = ssxym / ssxm;
    let intercept = ymean - slope * xmean;

    let (pvalue, stderr, intercept_stderr) = if n == 2 {
        let p = if y[0] == y[1] { 1.0 } else { 0.0 };
        (p, 0.0, 0.0)
    } else {
        const TINY: f64 = 1.0e-20;
        let df = nf - 2.0;
        let t = rvalue * (df / ((1.0 - rvalue + TINY) * (1.0 + rvalue + TINY))).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| Error::InvalidInput(format!("t distribution: {}", e)))?;
        let p = 2.0 * (1.0 - dist.cdf(t.abs()));
        let slope_stderr = ((1.0 - rvalue * rvalue) * ssym / ssxm / df).sqrt();
        let icpt_stderr = slope_stderr * (ssxm + xmean * xmean).sqrt();
        (p, slope_stderr, icpt_stderr)
    };

    Ok(LinearFit {
        slope,
        intercept,
        rvalue,
        pvalue,
        stderr,
        intercept_stderr,
        n,
    })
}

/// Sample Pearson correlation, `NaN` when undefined
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let xm = mean(x);
    let ym = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        sxy += (xi - xm) * (yi - ym);
        sxx += (xi - xm).powi(2);
        syy += (yi - ym).powi(2);
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 {
        f64::NAN
    } else {
        (sxy / denom).clamp(-1.0, 1.0)
    }
}
