//! Transformer encoder over the time axis
//!
//! `Linear(in -> d) -> + positional encoding -> N x EncoderLayer -> Linear(d -> 2)`.
//! Encoder layers are post-norm: `x = LN(x + attn(x))`, `x = LN(x + ff(x))`.

use super::config::ModelConfig;
use super::{ModelKind, SequenceModel};
use crate::error::Result;
use burn::{
    module::Module,
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig,
        PositionalEncoding, PositionalEncodingConfig, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Position-wise feed-forward block
#[derive(Module, Debug)]
struct FeedForwardBlock<B: Backend> {
    linear1: Linear<B>,
    linear2: Linear<B>,
    dropout: Dropout,
    activation: Relu,
}

impl<B: Backend> FeedForwardBlock<B> {
    fn new(device: &B::Device, d_model: usize, d_ff: usize, dropout: f64) -> Self {
        Self {
            linear1: LinearConfig::new(d_model, d_ff).init(device),
            linear2: LinearConfig::new(d_ff, d_model).init(device),
            dropout: DropoutConfig::new(dropout).init(),
            activation: Relu::new(),
        }
    }

    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.linear1.forward(x);
        let x = self.activation.forward(x);
        let x = self.dropout.forward(x);
        self.linear2.forward(x)
    }
}

/// Self-attention and feed-forward, each with a residual and LayerNorm
#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    attention: MultiHeadAttention<B>,
    feed_forward: FeedForwardBlock<B>,
    norm1: LayerNorm<B>,
    norm2: LayerNorm<B>,
    dropout: Dropout,
}

impl<B: Backend> EncoderLayer<B> {
    pub fn new(device: &B::Device, cfg: &ModelConfig) -> Self {
        let d_model = cfg.hidden_size;
        Self {
            attention: MultiHeadAttentionConfig::new(d_model, cfg.nhead)
                .with_dropout(cfg.dropout)
                .init(device),
            feed_forward: FeedForwardBlock::new(device, d_model, cfg.feedforward_size, cfg.dropout),
            norm1: LayerNormConfig::new(d_model).init(device),
            norm2: LayerNormConfig::new(d_model).init(device),
            dropout: DropoutConfig::new(cfg.dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let residual = x.clone();
        let attended = self.attention.forward(MhaInput::self_attn(x)).context;
        let x = self.norm1.forward(self.dropout.forward(attended) + residual);

        let residual = x.clone();
        let x = self.feed_forward.forward(x);
        self.norm2.forward(self.dropout.forward(x) + residual)
    }
}

#[derive(Module, Debug)]
pub struct TransformerModel<B: Backend> {
    input_projection: Linear<B>,
    positional_encoding: PositionalEncoding<B>,
    layers: Vec<EncoderLayer<B>>,
    head: Linear<B>,
}

impl<B: Backend> TransformerModel<B> {
    pub fn new(cfg: &ModelConfig, device: &B::Device) -> Result<Self> {
        cfg.validate()?;
        let d_model = cfg.hidden_size;
        Ok(Self {
            input_projection: LinearConfig::new(cfg.input_size, d_model).init(device),
            positional_encoding: PositionalEncodingConfig::new(d_model)
                .with_max_sequence_size(cfg.max_len)
                .init(device),
            layers: (0..cfg.num_layers)
                .map(|_| EncoderLayer::new(device, cfg))
                .collect(),
            head: LinearConfig::new(d_model, cfg.output_size).init(device),
        })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

impl<B: Backend> SequenceModel<B> for TransformerModel<B> {
    fn kind(&self) -> ModelKind {
        ModelKind::Transformer
    }

    fn forward(&self, features: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.input_projection.forward(features);
        let mut x = self.positional_encoding.forward(x);
        for layer in &self.layers {
            x = layer.forward(x);
        }
        self.head.forward(x)
    }
}
