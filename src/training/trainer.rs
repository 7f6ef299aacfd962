//! Training loop for the sequence models
//!
//! Every mini-batch runs the model once on `[batch, L, 4]` features; the
//! per-step outputs `(a_i, b_i)` give `y_pred = a_i * x_i + b_i`, and the
//! loss is the MSE over all steps of the batch.

use super::dataset::{Sample, SequenceDataset, HISTORY};
use crate::error::{Error, Result};
use crate::model::{
    CnnModel, GruModel, LstmModel, ModelConfig, ModelKind, RnnModel, SequenceModel,
    TransformerModel,
};
use crate::nn::{array3_to_tensor, matrix_to_tensor, scalar, tensor_values};
use crate::utils::TrainingConfig;
use burn::{
    grad_clipping::GradientClippingConfig,
    module::{AutodiffModule, Module},
    nn::loss::{MseLoss, Reduction},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array2, Array3, Axis};
use std::fmt;
use tracing::{debug, info};

/// Average loss of every epoch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    pub epoch_losses: Vec<f64>,
}

impl TrainingHistory {
    pub fn final_loss(&self) -> Option<f64> {
        self.epoch_losses.last().copied()
    }
}

/// Model output and prediction at one time step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPrediction {
    pub a: f64,
    pub b: f64,
    pub y_true: f64,
    pub y_pred: f64,
}

impl fmt::Display for StepPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a_i = {:.4}, b_i = {:.4}, y_true = {:.4}, y_pred = {:.4}",
            self.a, self.b, self.y_true, self.y_pred
        )
    }
}

/// Samples stacked into `(features [n, L, 4], x [n, L], y [n, L])`
fn stack_samples<B: Backend>(
    samples: &[Sample],
    device: &B::Device,
) -> Result<(Tensor<B, 3>, Tensor<B, 2>, Tensor<B, 2>)> {
    let len = samples.first().map_or(0, Sample::len);
    let mut features = Array3::zeros((samples.len(), len, 1 + HISTORY));
    let mut x = Array2::zeros((samples.len(), len));
    let mut y = Array2::zeros((samples.len(), len));
    for (i, sample) in samples.iter().enumerate() {
        features.index_axis_mut(Axis(0), i).assign(&sample.features()?);
        x.row_mut(i).assign(&sample.x_input.column(0));
        y.row_mut(i).assign(&sample.y.column(0));
    }
    Ok((
        array3_to_tensor(&features, device),
        matrix_to_tensor(&x, device),
        matrix_to_tensor(&y, device),
    ))
}

/// `(y_pred, a, b)`, each `[n, L]`
fn predict<B: Backend, M: SequenceModel<B>>(
    model: &M,
    features: Tensor<B, 3>,
    x: Tensor<B, 2>,
) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>) {
    let out = model.forward(features);
    let [n, len, _] = out.dims();
    let a = out.clone().slice([0..n, 0..len, 0..1]).squeeze::<2>(2);
    let b = out.slice([0..n, 0..len, 1..2]).squeeze::<2>(2);
    (a.clone() * x + b.clone(), a, b)
}

/// Trainer for sequence models
pub struct Trainer {
    config: TrainingConfig,
    show_progress: bool,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            show_progress: false,
        }
    }

    /// Draw a progress bar and print one line per epoch
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train with Adam for `epochs` passes over the dataset
    pub fn train<B, M>(
        &self,
        model: M,
        dataset: &mut SequenceDataset,
        device: &B::Device,
    ) -> Result<(M, TrainingHistory)>
    where
        B: AutodiffBackend,
        M: SequenceModel<B> + AutodiffModule<B>,
    {
        if self.config.batch_size == 0 {
            return Err(Error::InvalidInput("batch_size must be positive".into()));
        }
        if dataset.is_empty() {
            return Err(Error::InsufficientData("dataset has no samples".into()));
        }

        let grad_clipping = self
            .config
            .grad_clip
            .map(|norm| GradientClippingConfig::Norm(norm as f32));
        let mut optimizer = AdamConfig::new()
            .with_epsilon(1e-8)
            .with_grad_clipping(grad_clipping)
            .init();
        let mut model = model;
        let mut history = TrainingHistory::default();
        let epochs = self.config.epochs;

        let pb = if self.show_progress {
            ProgressBar::new(epochs as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );

        info!(
            "Training {} model: {} weights, {} epochs",
            model.kind(),
            model.num_params(),
            epochs
        );

        let total = dataset.len();
        let batch_size = self.config.batch_size;
        for epoch in 0..epochs {
            let mut total_loss = 0.0;
            let mut num_batches = 0;

            let mut start = 0;
            while start < total {
                let n = batch_size.min(total - start);
                start += n;

                let samples: Vec<Sample> = (0..n).map(|_| dataset.sample()).collect();
                let (features, x, y) = stack_samples::<B>(&samples, device)?;
                let (pred, _, _) = predict(&model, features, x);
                let loss = MseLoss::new().forward(pred, y, Reduction::Mean);
                let value = scalar(loss.clone());
                if !value.is_finite() {
                    return Err(Error::InvalidInput("training loss is not finite".into()));
                }

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optimizer.step(self.config.learning_rate, model, grads);

                total_loss += value;
                num_batches += 1;
            }

            let loss = total_loss / num_batches as f64;
            history.epoch_losses.push(loss);
            pb.inc(1);
            let line = format!("Epoch [{}/{}], Loss: {:.4}", epoch + 1, epochs, loss);
            if self.show_progress {
                pb.println(&line);
            }
            debug!("{}", line);
        }

        pb.finish_and_clear();
        Ok((model, history))
    }
}

/// Run the model on one sample without updating it
pub fn evaluate_sample<B: Backend, M: SequenceModel<B>>(
    model: &M,
    sample: &Sample,
    device: &B::Device,
) -> Result<Vec<StepPrediction>> {
    let (features, x, _) = stack_samples::<B>(std::slice::from_ref(sample), device)?;
    let (pred, a, b) = predict(model, features, x);
    let (pred, a, b) = (tensor_values(pred)?, tensor_values(a)?, tensor_values(b)?);
    Ok((0..sample.len())
        .map(|i| StepPrediction {
            a: a[i],
            b: b[i],
            y_true: sample.y[[i, 0]],
            y_pred: pred[i],
        })
        .collect())
}

/// Result of [`train_model`]: loss curve and predictions on a fresh sample
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub kind: ModelKind,
    pub history: TrainingHistory,
    pub predictions: Vec<StepPrediction>,
}

/// Build the chosen architecture, train it, then evaluate one fresh sample
/// with dropout disabled
pub fn train_model<B: AutodiffBackend>(
    kind: ModelKind,
    model_config: &ModelConfig,
    trainer: &Trainer,
    dataset: &mut SequenceDataset,
    device: &B::Device,
) -> Result<TrainingOutcome> {
    model_config.validate()?;
    if model_config.input_size != 1 + HISTORY {
        return Err(Error::ShapeMismatch {
            expected: (dataset.seq_length(), 1 + HISTORY),
            got: (dataset.seq_length(), model_config.input_size),
        });
    }
    if kind == ModelKind::Transformer && dataset.seq_length() > model_config.max_len {
        return Err(Error::InvalidInput(format!(
            "seq_length {} exceeds the positional encoding length {}",
            dataset.seq_length(),
            model_config.max_len
        )));
    }

    match kind {
        ModelKind::Lstm => {
            let model = LstmModel::<B>::new(model_config, device);
            fit_and_evaluate(model, trainer, dataset, device)
        }
        ModelKind::Rnn => {
            let model = RnnModel::<B>::new(model_config, device);
            fit_and_evaluate(model, trainer, dataset, device)
        }
        ModelKind::Gru => {
            let model = GruModel::<B>::new(model_config, device);
            fit_and_evaluate(model, trainer, dataset, device)
        }
        ModelKind::Cnn => {
            let model = CnnModel::<B>::new(model_config, device)?;
            fit_and_evaluate(model, trainer, dataset, device)
        }
        ModelKind::Transformer => {
            let model = TransformerModel::<B>::new(model_config, device)?;
            fit_and_evaluate(model, trainer, dataset, device)
        }
    }
}

fn fit_and_evaluate<B, M>(
    model: M,
    trainer: &Trainer,
    dataset: &mut SequenceDataset,
    device: &B::Device,
) -> Result<TrainingOutcome>
where
    B: AutodiffBackend,
    M: SequenceModel<B> + AutodiffModule<B>,
    M::InnerModule: SequenceModel<B::InnerBackend>,
{
    let kind = model.kind();
    let (model, history) = trainer.train(model, dataset, device)?;
    let sample = dataset.sample();
    let predictions = evaluate_sample(&model.valid(), &sample, device)?;
    Ok(TrainingOutcome {
        kind,
        history,
        predictions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{CpuBackend, TrainBackend};

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            seq_length: 5,
            total_samples: 64,
            batch_size: 16,
            epochs: 8,
            learning_rate: 0.01,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_training_reduces_loss() {
        let device = Default::default();
        let cfg = small_config();
        let model = GruModel::<TrainBackend>::new(&ModelConfig::default(), &device);
        let mut dataset = SequenceDataset::new(cfg.seq_length, cfg.total_samples, 1).unwrap();
        let (_, history) = Trainer::new(cfg).train(model, &mut dataset, &device).unwrap();
        assert_eq!(history.epoch_losses.len(), 8);
        let first = history.epoch_losses[0];
        let last = history.final_loss().unwrap();
        assert!(last < first, "loss went from {first} to {last}");
    }

    #[test]
    fn test_evaluate_sample_consistent() {
        let device = Default::default();
        let model = CnnModel::<CpuBackend>::new(&ModelConfig::default(), &device).unwrap();
        let mut dataset = SequenceDataset::new(6, 1, 3).unwrap();
        let sample = dataset.sample();
        let steps = evaluate_sample(&model, &sample, &device).unwrap();
        assert_eq!(steps.len(), 6);
        for (i, s) in steps.iter().enumerate() {
            let expected = s.a * sample.x_input[[i, 0]] + s.b;
            assert!((s.y_pred - expected).abs() < 1e-12);
            assert_eq!(s.y_true, sample.y[[i, 0]]);
        }
        assert!(steps[0].to_string().starts_with("a_i = "));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let device = Default::default();
        let model = RnnModel::<TrainBackend>::new(&ModelConfig::default(), &device);
        let mut dataset = SequenceDataset::new(4, 8, 0).unwrap();
        let cfg = TrainingConfig {
            batch_size: 0,
            ..small_config()
        };
        assert!(Trainer::new(cfg).train(model, &mut dataset, &device).is_err());
    }

    #[test]
    fn test_clipped_training_stays_finite() {
        let device = Default::default();
        let cfg = TrainingConfig {
            epochs: 2,
            learning_rate: 0.5,
            grad_clip: Some(1.0),
            ..small_config()
        };
        let model = LstmModel::<TrainBackend>::new(&ModelConfig::default(), &device);
        let mut dataset = SequenceDataset::new(cfg.seq_length, cfg.total_samples, 2).unwrap();
        let (_, history) = Trainer::new(cfg).train(model, &mut dataset, &device).unwrap();
        assert!(history.epoch_losses.iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_train_model_dispatch() {
        let device = Default::default();
        let cfg = TrainingConfig {
            epochs: 1,
            total_samples: 8,
            batch_size: 4,
            ..small_config()
        };
        let mut dataset = SequenceDataset::new(cfg.seq_length, cfg.total_samples, 0).unwrap();
        let outcome = train_model::<TrainBackend>(
            ModelKind::Rnn,
            &ModelConfig::default(),
            &Trainer::new(cfg),
            &mut dataset,
            &device,
        )
        .unwrap();
        assert_eq!(outcome.kind, ModelKind::Rnn);
        assert_eq!(outcome.history.epoch_losses.len(), 1);
        assert_eq!(outcome.predictions.len(), 5);
    }

    #[test]
    fn test_train_model_rejects_bad_shapes() {
        let device = Default::default();
        let trainer = Trainer::new(small_config());
        let mut long = SequenceDataset::new(20, 4, 0).unwrap();
        let short_encoding = ModelConfig::default().with_max_len(10);
        assert!(train_model::<TrainBackend>(
            ModelKind::Transformer,
            &short_encoding,
            &trainer,
            &mut long,
            &device,
        )
        .is_err());

        let mut dataset = SequenceDataset::new(5, 4, 0).unwrap();
        let wide = ModelConfig::new(6, 16, 2);
        let err =
            train_model::<TrainBackend>(ModelKind::Gru, &wide, &trainer, &mut dataset, &device);
        assert!(matches!(err, Err(Error::ShapeMismatch { .. })));
    }
}
