//! GRU over the time axis with a per-step linear head

use super::config::ModelConfig;
use super::{ModelKind, SequenceModel};
use burn::{
    module::Module,
    nn::{
        gru::{Gru, GruConfig},
        Linear, LinearConfig,
    },
    tensor::{backend::Backend, Tensor},
};

#[derive(Module, Debug)]
pub struct GruModel<B: Backend> {
    gru: Gru<B>,
    head: Linear<B>,
}

impl<B: Backend> GruModel<B> {
    pub fn new(cfg: &ModelConfig, device: &B::Device) -> Self {
        Self {
            gru: GruConfig::new(cfg.input_size, cfg.hidden_size, true).init(device),
            head: LinearConfig::new(cfg.hidden_size, cfg.output_size).init(device),
        }
    }
}

impl<B: Backend> SequenceModel<B> for GruModel<B> {
    fn kind(&self) -> ModelKind {
        ModelKind::Gru
    }

    fn forward(&self, features: Tensor<B, 3>) -> Tensor<B, 3> {
        let hidden = self.gru.forward(features, None);
        self.head.forward(hidden)
    }
}
