//! LSTM over the time axis with a per-step linear head

use super::config::ModelConfig;
use super::{ModelKind, SequenceModel};
use burn::{
    module::Module,
    nn::{Linear, LinearConfig, Lstm, LstmConfig},
    tensor::{backend::Backend, Tensor},
};

#[derive(Module, Debug)]
pub struct LstmModel<B: Backend> {
    lstm: Lstm<B>,
    head: Linear<B>,
}

impl<B: Backend> LstmModel<B> {
    pub fn new(cfg: &ModelConfig, device: &B::Device) -> Self {
        Self {
            lstm: LstmConfig::new(cfg.input_size, cfg.hidden_size, true).init(device),
            head: LinearConfig::new(cfg.hidden_size, cfg.output_size).init(device),
        }
    }
}

impl<B: Backend> SequenceModel<B> for LstmModel<B> {
    fn kind(&self) -> ModelKind {
        ModelKind::Lstm
    }

    fn forward(&self, features: Tensor<B, 3>) -> Tensor<B, 3> {
        let (hidden, _state) = self.lstm.forward(features, None);
        self.head.forward(hidden)
    }
}
