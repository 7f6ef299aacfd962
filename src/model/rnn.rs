//! Elman RNN: `h_t = tanh(W_ih x_t + W_hh h_{t-1} + b)` followed by a
//! per-step linear head

use super::config::ModelConfig;
use super::{ModelKind, SequenceModel};
use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::{backend::Backend, Tensor},
};

#[derive(Module, Debug)]
pub struct RnnModel<B: Backend> {
    input_to_hidden: Linear<B>,
    hidden_to_hidden: Linear<B>,
    head: Linear<B>,
}

impl<B: Backend> RnnModel<B> {
    pub fn new(cfg: &ModelConfig, device: &B::Device) -> Self {
        Self {
            input_to_hidden: LinearConfig::new(cfg.input_size, cfg.hidden_size).init(device),
            hidden_to_hidden: LinearConfig::new(cfg.hidden_size, cfg.hidden_size).init(device),
            head: LinearConfig::new(cfg.hidden_size, cfg.output_size).init(device),
        }
    }
}

impl<B: Backend> SequenceModel<B> for RnnModel<B> {
    fn kind(&self) -> ModelKind {
        ModelKind::Rnn
    }

    fn forward(&self, features: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, len, _] = features.dims();
        // input projection for every step at once
        let projected = self.input_to_hidden.forward(features);
        let hidden = projected.dims()[2];

        let mut h = Tensor::<B, 2>::zeros([batch, hidden], &projected.device());
        let mut outputs = Vec::with_capacity(len);
        for t in 0..len {
            let x_t = projected
                .clone()
                .slice([0..batch, t..t + 1, 0..hidden])
                .squeeze::<2>(1);
            h = (x_t + self.hidden_to_hidden.forward(h)).tanh();
            outputs.push(h.clone().unsqueeze_dim::<3>(1));
        }

        self.head.forward(Tensor::cat(outputs, 1))
    }
}
