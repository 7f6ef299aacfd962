//! Two-layer 1D convolution over time

use super::config::ModelConfig;
use super::{ModelKind, SequenceModel};
use crate::error::Result;
use burn::{
    module::Module,
    nn::{
        conv::{Conv1d, Conv1dConfig},
        PaddingConfig1d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Convolution padded so that an odd kernel keeps the sequence length
fn same_conv<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    device: &B::Device,
) -> Conv1d<B> {
    Conv1dConfig::new(in_channels, out_channels, kernel_size)
        .with_padding(PaddingConfig1d::Explicit(kernel_size / 2))
        .init(device)
}

/// `Conv1d(in -> hidden) -> ReLU -> Conv1d(hidden -> 2)`
#[derive(Module, Debug)]
pub struct CnnModel<B: Backend> {
    conv1: Conv1d<B>,
    conv2: Conv1d<B>,
    activation: Relu,
}

impl<B: Backend> CnnModel<B> {
    pub fn new(cfg: &ModelConfig, device: &B::Device) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            conv1: same_conv(cfg.input_size, cfg.hidden_size, cfg.kernel_size, device),
            conv2: same_conv(cfg.hidden_size, cfg.output_size, cfg.kernel_size, device),
            activation: Relu::new(),
        })
    }
}

impl<B: Backend> SequenceModel<B> for CnnModel<B> {
    fn kind(&self) -> ModelKind {
        ModelKind::Cnn
    }

    fn forward(&self, features: Tensor<B, 3>) -> Tensor<B, 3> {
        // conv layers want [batch, channels, L]
        let x = features.swap_dims(1, 2);
        let x = self.conv1.forward(x);
        let x = self.activation.forward(x);
        let x = self.conv2.forward(x);
        x.swap_dims(1, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{tensor_values, CpuBackend};
    use approx::assert_abs_diff_eq;
    use burn::module::Param;
    use burn::tensor::TensorData;

    #[test]
    fn test_even_kernel_rejected() {
        let device = Default::default();
        let cfg = ModelConfig::default().with_kernel_size(4);
        assert!(CnnModel::<CpuBackend>::new(&cfg, &device).is_err());
    }

    #[test]
    fn test_conv_same_padding() {
        let device = Default::default();
        let mut conv = same_conv::<CpuBackend>(1, 1, 3, &device);
        // kernel [1, 2, 3], no bias
        conv.weight = Param::from_tensor(Tensor::from_data(
            TensorData::new(vec![1.0, 2.0, 3.0], [1, 1, 3]),
            &device,
        ));
        conv.bias = None;

        let x = Tensor::<CpuBackend, 3>::from_data(
            TensorData::new(vec![1.0, 10.0, 100.0], [1, 1, 3]),
            &device,
        );
        let out = conv.forward(x);
        assert_eq!(out.dims(), [1, 1, 3]);
        let out = tensor_values(out).unwrap();
        // y[t] = 1*x[t-1] + 2*x[t] + 3*x[t+1]
        assert_abs_diff_eq!(out[0], 2.0 + 30.0);
        assert_abs_diff_eq!(out[1], 1.0 + 20.0 + 300.0);
        assert_abs_diff_eq!(out[2], 10.0 + 200.0);
    }

    #[test]
    fn test_receptive_field() {
        let device = Default::default();
        let model = CnnModel::<CpuBackend>::new(&ModelConfig::default(), &device).unwrap();
        let base = Tensor::<CpuBackend, 3>::zeros([1, 8, 4], &device);
        let bumped = base
            .clone()
            .slice_assign([0..1, 0..1, 0..4], Tensor::ones([1, 1, 4], &device));
        let a = tensor_values(model.forward(base)).unwrap();
        let b = tensor_values(model.forward(bumped)).unwrap();
        // two kernel-3 layers reach two steps away
        assert_eq!(&a[6..], &b[6..]);
    }
}
