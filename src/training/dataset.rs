//! Synthetic autoregressive sequences
//!
//! `y_i = 2 x_i + mean(x_{i-1}, x_{i-2}, x_{i-3}) + 2 ε_i` with
//! `x ~ U(-10, 10)` and `ε ~ N(0, 1)`.

use crate::error::{Error, Result};
use ndarray::{concatenate, s, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Lagged values fed alongside the current one
pub const HISTORY: usize = 3;

/// One sequence of length `L`
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// `x_i`, `[L, 1]`
    pub x_input: Array2<f64>,
    /// `x_{i-1}, x_{i-2}, x_{i-3}`, `[L, 3]`
    pub x_history: Array2<f64>,
    /// `[L, 1]`
    pub y: Array2<f64>,
}

impl Sample {
    pub fn len(&self) -> usize {
        self.x_input.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Model input `[L, 4]`: current value then history
    pub fn features(&self) -> Result<Array2<f64>> {
        Ok(concatenate(
            Axis(1),
            &[self.x_input.view(), self.x_history.view()],
        )?)
    }
}

/// Dataset of `total_samples` sequences, redrawn on every access
#[derive(Debug, Clone)]
pub struct SequenceDataset {
    seq_length: usize,
    total_samples: usize,
    rng: StdRng,
}

impl SequenceDataset {
    pub fn new(seq_length: usize, total_samples: usize, seed: u64) -> Result<Self> {
        if seq_length == 0 {
            return Err(Error::InvalidInput("seq_length must be positive".into()));
        }
        Ok(Self {
            seq_length,
            total_samples,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn len(&self) -> usize {
        self.total_samples
    }

    pub fn is_empty(&self) -> bool {
        self.total_samples == 0
    }

    pub fn seq_length(&self) -> usize {
        self.seq_length
    }

    /// Draw a fresh sequence
    pub fn sample(&mut self) -> Sample {
        let len = self.seq_length;
        let x: Array1<f64> = (0..len + HISTORY)
            .map(|_| self.rng.gen_range(-10.0..10.0))
            .collect();

        let mut y = Array2::zeros((len, 1));
        let mut history = Array2::zeros((len, HISTORY));
        for i in 0..len {
            let t = i + HISTORY;
            let prev = x.slice(s![t - HISTORY..t]);
            let noise: f64 = self.rng.sample(StandardNormal);
            y[[i, 0]] = 2.0 * x[t] + prev.sum() / HISTORY as f64 + 2.0 * noise;
            for lag in 1..=HISTORY {
                history[[i, lag - 1]] = x[t - lag];
            }
        }
        let x_input = x.slice(s![HISTORY..]).to_owned().insert_axis(Axis(1));

        Sample {
            x_input,
            x_history: history,
            y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_and_history_alignment() {
        let mut ds = SequenceDataset::new(10, 100, 0).unwrap();
        let s = ds.sample();
        assert_eq!(s.x_input.dim(), (10, 1));
        assert_eq!(s.x_history.dim(), (10, 3));
        assert_eq!(s.y.dim(), (10, 1));
        assert_eq!(s.features().unwrap().dim(), (10, 4));
        // x_{i-1} of step i+1 is x_i
        for i in 0..9 {
            assert_eq!(s.x_history[[i + 1, 0]], s.x_input[[i, 0]]);
            assert_eq!(s.x_history[[i + 1, 1]], s.x_history[[i, 0]]);
        }
        assert!(s.x_input.iter().all(|v| (-10.0..10.0).contains(v)));
    }

    #[test]
    fn test_target_close_to_formula() {
        let mut ds = SequenceDataset::new(200, 1, 5).unwrap();
        let s = ds.sample();
        let resid: Vec<f64> = (0..200)
            .map(|i| {
                let mean = s.x_history.row(i).sum() / 3.0;
                s.y[[i, 0]] - 2.0 * s.x_input[[i, 0]] - mean
            })
            .collect();
        let var = resid.iter().map(|r| r * r).sum::<f64>() / resid.len() as f64;
        // noise variance is 4
        assert!(var > 2.5 && var < 5.5, "residual variance {var}");
    }

    #[test]
    fn test_fresh_draws_and_seeding() {
        let mut a = SequenceDataset::new(5, 10, 42).unwrap();
        let mut b = SequenceDataset::new(5, 10, 42).unwrap();
        let first = a.sample();
        assert_eq!(first, b.sample());
        assert_ne!(first, a.sample());
        assert!(SequenceDataset::new(0, 10, 0).is_err());
    }

    #[test]
    fn test_mismatched_halves_rejected() {
        let mut s = SequenceDataset::new(4, 1, 0).unwrap().sample();
        s.x_history = Array2::zeros((3, HISTORY));
        assert!(matches!(s.features(), Err(Error::Shape(_))));
    }
}
