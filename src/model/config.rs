//! Sequence model hyperparameters

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Sizes shared by all sequence architectures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Features per time step (`x_i` plus three lagged values)
    pub input_size: usize,
    /// Hidden state / channel / model width
    pub hidden_size: usize,
    /// Outputs per time step (`a_i`, `b_i`)
    pub output_size: usize,
    /// Convolution width; odd so that padding keeps the length
    pub kernel_size: usize,
    /// Encoder layers of the transformer
    pub num_layers: usize,
    /// Attention heads
    pub nhead: usize,
    /// Width of the transformer feed-forward block
    pub feedforward_size: usize,
    /// Longest sequence the positional encoding covers
    pub max_len: usize,
    /// Dropout inside the transformer encoder layers
    pub dropout: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: 4,
            hidden_size: 16,
            output_size: 2,
            kernel_size: 3,
            num_layers: 2,
            nhead: 4,
            feedforward_size: 2048,
            max_len: 5000,
            dropout: 0.1,
        }
    }
}

impl ModelConfig {
    pub fn new(input_size: usize, hidden_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            hidden_size,
            output_size,
            ..Self::default()
        }
    }

    pub fn with_kernel_size(mut self, kernel_size: usize) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    pub fn with_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    pub fn with_heads(mut self, nhead: usize) -> Self {
        self.nhead = nhead;
        self
    }

    pub fn with_feedforward_size(mut self, size: usize) -> Self {
        self.feedforward_size = size;
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Reject sizes the layers cannot be built with
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.hidden_size == 0 || self.output_size == 0 {
            return Err(Error::InvalidInput("model sizes must be positive".into()));
        }
        if self.output_size < 2 {
            return Err(Error::InvalidInput(format!(
                "output_size must cover a_i and b_i, got {}",
                self.output_size
            )));
        }
        if self.kernel_size % 2 == 0 {
            return Err(Error::InvalidInput(format!(
                "kernel_size must be odd to keep the sequence length, got {}",
                self.kernel_size
            )));
        }
        if self.nhead == 0 || self.hidden_size % self.nhead != 0 {
            return Err(Error::InvalidInput(format!(
                "hidden_size {} is not divisible by nhead {}",
                self.hidden_size, self.nhead
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::InvalidInput(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let cfg = ModelConfig::new(4, 8, 2).with_heads(2).with_layers(1);
        assert_eq!(cfg.hidden_size, 8);
        assert_eq!(cfg.nhead, 2);
        assert_eq!(cfg.num_layers, 1);
        assert_eq!(cfg.kernel_size, 3);
    }

    #[test]
    fn test_transformer_defaults() {
        let cfg = ModelConfig::default();
        assert_eq!(cfg.feedforward_size, 2048);
        assert_eq!(cfg.dropout, 0.1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        assert!(ModelConfig::default().with_kernel_size(4).validate().is_err());
        assert!(ModelConfig::default().with_heads(3).validate().is_err());
        assert!(ModelConfig::default().with_dropout(1.0).validate().is_err());
        assert!(ModelConfig::new(4, 0, 2).validate().is_err());
    }
}
