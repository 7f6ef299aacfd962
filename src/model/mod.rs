//! Sequence models mapping per-step features to `(a_i, b_i)`
//!
//! Every model reads a `[batch, L, input_size]` tensor (the current value
//! followed by its three predecessors) and returns `[batch, L, 2]`: a slope
//! and an offset for each time step, so that the prediction is
//! `a_i * x_i + b_i`.

mod cnn;
mod config;
mod gru;
mod lstm;
mod rnn;
mod transformer;

pub use cnn::CnnModel;
pub use config::ModelConfig;
pub use gru::GruModel;
pub use lstm::LstmModel;
pub use rnn::RnnModel;
pub use transformer::{EncoderLayer, TransformerModel};

use crate::error::{Error, Result};
use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Common interface of the sequence architectures
pub trait SequenceModel<B: Backend>: Module<B> {
    fn kind(&self) -> ModelKind;

    /// `features [batch, L, input_size] -> [batch, L, output_size]`
    fn forward(&self, features: Tensor<B, 3>) -> Tensor<B, 3>;
}

/// Architecture selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Lstm,
    Rnn,
    Gru,
    Cnn,
    Transformer,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Lstm,
        ModelKind::Rnn,
        ModelKind::Gru,
        ModelKind::Cnn,
        ModelKind::Transformer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Lstm => "LSTM",
            ModelKind::Rnn => "RNN",
            ModelKind::Gru => "GRU",
            ModelKind::Cnn => "CNN",
            ModelKind::Transformer => "Transformer",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "invalid model type '{s}'. Choose from 'LSTM', 'RNN', 'GRU', 'CNN', or 'Transformer'"
                ))
            })
    }
}
