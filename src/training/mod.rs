//! Sequence model training
//!
//! - `dataset`: synthetic autoregressive sequences
//! - `trainer`: mini-batch Adam loop, per-step evaluation and the
//!   architecture dispatcher

pub mod dataset;
pub mod trainer;

pub use dataset::{Sample, SequenceDataset, HISTORY};
pub use trainer::{
    evaluate_sample, train_model, StepPrediction, Trainer, TrainingHistory, TrainingOutcome,
};
