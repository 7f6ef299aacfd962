//! # LOB Research
//!
//! Research tooling around a limit order book.
//!
//! This library provides tools for:
//! - Simulating a client population against a price-time matching engine
//!   and recording book features
//! - Replaying recorded order logs through the same engine
//! - Linear and quantile-conditioned regressions of the queue-age feature
//!   against forward mid changes
//! - Small feed-forward nets and sequence models (RNN, LSTM, GRU, CNN,
//!   Transformer) built and trained with burn on the CPU
//!
//! ## Modules
//!
//! - `orderbook`: orders, levels, matching engine and notifications
//! - `simulation`: client population, price makers, event loop, feature
//!   recorder, replay
//! - `data`: feature frames and regression variables
//! - `analysis`: regressions, quantile buckets, result tables
//! - `nn`: backend aliases, tensor conversions, feed-forward nets
//! - `model`: sequence architectures
//! - `training`: synthetic dataset and training loop
//! - `utils`: configuration and logging

pub mod analysis;
pub mod data;
pub mod error;
pub mod model;
pub mod nn;
pub mod orderbook;
pub mod simulation;
pub mod training;
pub mod utils;

pub use analysis::{quantile_correlations, quantile_regressions, regression, Table};
pub use data::{FeatureFrame, FeatureRow};
pub use error::{Error, Result};
pub use model::{ModelConfig, ModelKind, SequenceModel};
pub use nn::{fit_until_converged, FeedForward, TrainBackend};
pub use orderbook::{MatchingEngine, Order, OrderId, Side};
pub use simulation::{Replayer, Simulation};
pub use training::{train_model, SequenceDataset, Trainer};
pub use utils::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
