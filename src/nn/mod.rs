//! Neural Network Module
//!
//! Shared burn plumbing for the feed-forward regressors and the sequence
//! models:
//! - CPU backends over `f64`, with and without autodiff
//! - Conversions between `ndarray` matrices and burn tensors
//! - Small feed-forward regressors with a convergence loop

pub mod feedforward;

pub use feedforward::{fit_until_converged, FeedForward, FitReport, FitStep};

use crate::error::{Error, Result};
use burn::backend::{Autodiff, NdArray};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use ndarray::{Array2, Array3};

/// Inference backend
pub type CpuBackend = NdArray<f64>;

/// Training backend
pub type TrainBackend = Autodiff<CpuBackend>;

/// `[rows, cols]` matrix as a rank-2 tensor
pub fn matrix_to_tensor<B: Backend>(arr: &Array2<f64>, device: &B::Device) -> Tensor<B, 2> {
    let (rows, cols) = arr.dim();
    let data: Vec<f64> = arr.iter().copied().collect();
    Tensor::from_data(TensorData::new(data, [rows, cols]), device)
}

/// `[batch, len, width]` array as a rank-3 tensor
pub fn array3_to_tensor<B: Backend>(arr: &Array3<f64>, device: &B::Device) -> Tensor<B, 3> {
    let (batch, len, width) = arr.dim();
    let data: Vec<f64> = arr.iter().copied().collect();
    Tensor::from_data(TensorData::new(data, [batch, len, width]), device)
}

/// Row-major values of any tensor
pub fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f64>> {
    tensor
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| Error::Tensor(format!("{e:?}")))
}

/// Value of a single-element tensor
pub fn scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> f64 {
    tensor.into_scalar().elem::<f64>()
}
