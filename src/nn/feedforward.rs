//! Small tanh networks fitted full-batch to a single regression target
//!
//! `single_tanh` is a linear regression squashed by tanh; `deep_tanh` has two
//! hidden layers of ten units. Both are trained with Adam on the mean squared
//! error until the loss stops moving.

use super::{scalar, tensor_values};
use crate::analysis::rsquared;
use crate::data::RegressionVars;
use crate::error::{Error, Result};
use crate::utils::FitConfig;
use burn::{
    module::Module,
    nn::{
        loss::{MseLoss, Reduction},
        Linear, LinearConfig,
    },
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor, TensorData,
    },
};
use std::fmt;

/// Stack of dense layers, tanh after every one
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    layers: Vec<Linear<B>>,
}

impl<B: Backend> FeedForward<B> {
    /// `Linear(1, 1)` followed by tanh
    pub fn single_tanh(device: &B::Device) -> Self {
        Self::with_sizes(&[1, 1], device)
    }

    /// `1 -> 10 -> 10 -> 1`
    pub fn deep_tanh(device: &B::Device) -> Self {
        Self::with_sizes(&[1, 10, 10, 1], device)
    }

    pub fn with_sizes(sizes: &[usize], device: &B::Device) -> Self {
        let layers = sizes
            .windows(2)
            .map(|w| LinearConfig::new(w[0], w[1]).init(device))
            .collect();
        Self { layers }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// `[n, 1] -> [n, 1]`
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.layers
            .iter()
            .fold(x, |h, layer| layer.forward(h).tanh())
    }

    /// Predictions for a column of inputs
    pub fn predict(&self, x: &[f64], device: &B::Device) -> Result<Vec<f64>> {
        tensor_values(self.forward(column(x, device)))
    }

    /// `(slope, intercept)` of a single-layer net
    pub fn slope_intercept(&self) -> Option<(f64, f64)> {
        match self.layers.as_slice() {
            [layer] if layer.weight.val().dims() == [1, 1] => {
                let slope = scalar(layer.weight.val());
                let intercept = layer.bias.as_ref().map_or(0.0, |b| scalar(b.val()));
                Some((slope, intercept))
            }
            _ => None,
        }
    }
}

fn column<B: Backend>(values: &[f64], device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(values.to_vec(), [values.len(), 1]), device)
}

/// Statistics after one optimisation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitStep {
    pub iteration: usize,
    pub loss: f64,
    /// Train `1 - mse / mean(y^2)`
    pub rs: f64,
    /// Test `1 - mse / mean(y^2)`
    pub rs_test: f64,
    /// Absolute loss change from the previous iteration
    pub diff: f64,
    pub slope: Option<f64>,
    pub intercept: Option<f64>,
}

impl FitStep {
    pub fn r(&self) -> f64 {
        self.rs.abs().sqrt()
    }

    pub fn r_test(&self) -> f64 {
        self.rs_test.abs().sqrt()
    }
}

impl fmt::Display for FitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loss: {:>9.6}, rs:{:>9.6}, r:{:>9.6}, rst:{:>9.6}, rt:{:>9.6}, diff:{:1.3e}",
            self.loss,
            self.rs,
            self.r(),
            self.rs_test,
            self.r_test(),
            self.diff
        )?;
        if let (Some(slope), Some(intercept)) = (self.slope, self.intercept) {
            write!(f, " slope:{:1.3e}, int:{:1.3e}", slope, intercept)?;
        }
        Ok(())
    }
}

/// Outcome of [`fit_until_converged`]
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub iterations: usize,
    pub converged: bool,
    pub last: FitStep,
}

/// Full-batch Adam on MSE until the loss change drops to `cfg.tolerance` or
/// `cfg.max_iterations` is reached. `on_step` sees every iteration.
pub fn fit_until_converged<B, F>(
    net: FeedForward<B>,
    train: &RegressionVars,
    test: &RegressionVars,
    cfg: &FitConfig,
    device: &B::Device,
    mut on_step: F,
) -> Result<(FeedForward<B>, FitReport)>
where
    B: AutodiffBackend,
    F: FnMut(&FitStep),
{
    if train.is_empty() || test.is_empty() {
        return Err(Error::InsufficientData(
            "fit needs non-empty train and test sets".into(),
        ));
    }
    if cfg.max_iterations == 0 {
        return Err(Error::InvalidInput("max_iterations must be positive".into()));
    }

    let x = column::<B>(&train.x, device);
    let y = column::<B>(&train.y, device);
    let x_test = column::<B>(&test.x, device);
    let mut net = net;
    let mut optimizer = AdamConfig::new().with_epsilon(1e-8).init();
    let mut prev_loss = f64::INFINITY;
    let mut last = None;

    for iteration in 1..=cfg.max_iterations {
        let pred = net.forward(x.clone());
        let loss = MseLoss::new().forward(pred.clone(), y.clone(), Reduction::Mean);
        let loss_value = scalar(loss.clone());
        if !loss_value.is_finite() {
            return Err(Error::InvalidInput(format!(
                "loss diverged at iteration {iteration}"
            )));
        }
        let pred_train = tensor_values(pred.detach())?;

        let grads = GradientsParams::from_grads(loss.backward(), &net);
        net = optimizer.step(cfg.learning_rate, net, grads);

        let pred_test = tensor_values(net.forward(x_test.clone()).detach())?;
        let rs = rsquared(&pred_train, &train.y);
        let rs_test = rsquared(&pred_test, &test.y);
        let diff = (prev_loss - loss_value).abs();
        prev_loss = loss_value;

        let (slope, intercept) = match net.slope_intercept() {
            Some((s, i)) => (Some(s), Some(i)),
            None => (None, None),
        };
        let step = FitStep {
            iteration,
            loss: loss_value,
            rs,
            rs_test,
            diff,
            slope,
            intercept,
        };
        on_step(&step);
        last = Some(step);

        if diff <= cfg.tolerance {
            let report = FitReport {
                iterations: iteration,
                converged: true,
                last: step,
            };
            return Ok((net, report));
        }
    }

    let last = last.ok_or_else(|| Error::InvalidInput("no iterations run".into()))?;
    let report = FitReport {
        iterations: cfg.max_iterations,
        converged: false,
        last,
    };
    Ok((net, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{CpuBackend, TrainBackend};

    fn linear_data(n: usize, offset: usize) -> RegressionVars {
        let x: Vec<f64> = (0..n)
            .map(|i| ((i + offset) as f64 * 0.37).sin())
            .collect();
        let y = x.iter().map(|v| (0.6 * v).tanh()).collect();
        RegressionVars { x, y }
    }

    #[test]
    fn test_architectures() {
        let device = Default::default();
        let single = FeedForward::<CpuBackend>::single_tanh(&device);
        assert_eq!(single.num_layers(), 1);
        assert!(single.slope_intercept().is_some());

        let deep = FeedForward::<CpuBackend>::deep_tanh(&device);
        assert_eq!(deep.num_layers(), 3);
        assert_eq!(deep.num_params(), 10 + 10 + 100 + 10 + 10 + 1);
        assert!(deep.slope_intercept().is_none());
        let preds = deep.predict(&[0.0, 1.0], &device).unwrap();
        assert_eq!(preds.len(), 2);
        assert!(preds.iter().all(|p| p.abs() < 1.0));
    }

    #[test]
    fn test_single_tanh_recovers_slope() {
        let device = Default::default();
        let net = FeedForward::<TrainBackend>::single_tanh(&device);
        let cfg = FitConfig {
            learning_rate: 0.02,
            tolerance: 1e-12,
            max_iterations: 10_000,
            ..FitConfig::default()
        };
        let mut seen = 0;
        let (net, report) = fit_until_converged(
            net,
            &linear_data(200, 0),
            &linear_data(100, 500),
            &cfg,
            &device,
            |_| seen += 1,
        )
        .unwrap();
        assert_eq!(seen, report.iterations);
        let (slope, intercept) = net.slope_intercept().unwrap();
        assert!((slope - 0.6).abs() < 0.05, "slope {slope}");
        assert!(intercept.abs() < 0.05, "intercept {intercept}");
        assert!(report.last.rs_test > 0.95);
    }

    #[test]
    fn test_iteration_cap() {
        let device = Default::default();
        let net = FeedForward::<TrainBackend>::deep_tanh(&device);
        let cfg = FitConfig {
            tolerance: 0.0,
            max_iterations: 5,
            ..FitConfig::default()
        };
        let (_, report) = fit_until_converged(
            net,
            &linear_data(50, 0),
            &linear_data(50, 50),
            &cfg,
            &device,
            |_| {},
        )
        .unwrap();
        assert!(!report.converged);
        assert_eq!(report.iterations, 5);
        assert!(report.last.to_string().starts_with("loss:"));
    }

    #[test]
    fn test_empty_input_rejected() {
        let device = Default::default();
        let net = FeedForward::<TrainBackend>::single_tanh(&device);
        let result = fit_until_converged(
            net,
            &RegressionVars::default(),
            &linear_data(5, 0),
            &FitConfig::default(),
            &device,
            |_| {},
        );
        assert!(result.is_err());
    }
}
