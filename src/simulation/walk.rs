//! Mean-reverting random walks for the reference price

use crate::utils::ReferenceWalk;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// One step of a stochastic process
pub trait WalkStep {
    /// Advance `x` by `dt` seconds toward `x0` with reversion `k` and
    /// volatility `s`
    fn update<R: Rng + ?Sized>(&self, x: f64, x0: f64, k: f64, s: f64, dt: f64, rng: &mut R) -> f64;
}

/// Ornstein-Uhlenbeck step `x + dt*k*(x0 - x) + sqrt(dt)*s*W`
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanReversion;

impl WalkStep for MeanReversion {
    fn update<R: Rng + ?Sized>(&self, x: f64, x0: f64, k: f64, s: f64, dt: f64, rng: &mut R) -> f64 {
        let w: f64 = StandardNormal.sample(rng);
        x + dt * k * (x0 - x) + dt.sqrt() * s * w
    }
}

/// Reverts to `x0` above zero and to `-x0` at or below it
#[derive(Debug, Clone, Copy, Default)]
pub struct BifurcatingMeanReversion;

impl WalkStep for BifurcatingMeanReversion {
    fn update<R: Rng + ?Sized>(&self, x: f64, x0: f64, k: f64, s: f64, dt: f64, rng: &mut R) -> f64 {
        let target = if x > 0.0 { x0 } else { -x0 };
        MeanReversion.update(x, target, k, s, dt, rng)
    }
}

impl WalkStep for ReferenceWalk {
    fn update<R: Rng + ?Sized>(&self, x: f64, x0: f64, k: f64, s: f64, dt: f64, rng: &mut R) -> f64 {
        match self {
            ReferenceWalk::MeanReversion => MeanReversion.update(x, x0, k, s, dt, rng),
            ReferenceWalk::Bifurcating => BifurcatingMeanReversion.update(x, x0, k, s, dt, rng),
        }
    }
}

/// A walk that carries its own state and parameters
#[derive(Debug, Clone)]
pub struct RandomWalk<W: WalkStep = MeanReversion> {
    step: W,
    x: f64,
    x0: f64,
    k: f64,
    s: f64,
}

impl<W: WalkStep + Default> RandomWalk<W> {
    pub fn new(x: f64, x0: f64, k: f64, s: f64) -> Self {
        Self {
            step: W::default(),
            x,
            x0,
            k,
            s,
        }
    }
}

impl<W: WalkStep> RandomWalk<W> {
    pub fn with_step(step: W, x: f64, x0: f64, k: f64, s: f64) -> Self {
        Self { step, x, x0, k, s }
    }

    pub fn value(&self) -> f64 {
        self.x
    }

    /// Advance by `dt` seconds and return the new value
    pub fn update<R: Rng + ?Sized>(&mut self, dt: f64, rng: &mut R) -> f64 {
        self.x = self.step.update(self.x, self.x0, self.k, self.s, dt, rng);
        self.x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_no_noise_decays_to_target() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut walk: RandomWalk = RandomWalk::new(10.0, 0.0, 1.0, 0.0);
        walk.update(0.5, &mut rng);
        assert_relative_eq!(walk.value(), 5.0);
        for _ in 0..100 {
            walk.update(0.5, &mut rng);
        }
        assert!(walk.value().abs() < 1e-10);
    }

    #[test]
    fn test_bifurcating_target_depends_on_sign() {
        let mut rng = StdRng::seed_from_u64(1);
        let up = BifurcatingMeanReversion.update(1.0, 3.0, 1.0, 0.0, 0.5, &mut rng);
        let down = BifurcatingMeanReversion.update(-1.0, 3.0, 1.0, 0.0, 0.5, &mut rng);
        assert_relative_eq!(up, 2.0);
        assert_relative_eq!(down, -2.0);
    }

    #[test]
    fn test_configured_walk_dispatches() {
        let mut a = StdRng::seed_from_u64(4);
        let mut b = StdRng::seed_from_u64(4);
        let mut walk = RandomWalk::with_step(ReferenceWalk::Bifurcating, -1.0, 3.0, 1.0, 0.5);
        let expected = BifurcatingMeanReversion.update(-1.0, 3.0, 1.0, 0.5, 0.5, &mut b);
        assert_relative_eq!(walk.update(0.5, &mut a), expected);

        let mut walk = RandomWalk::with_step(ReferenceWalk::MeanReversion, -1.0, 3.0, 1.0, 0.0);
        assert_relative_eq!(walk.update(0.5, &mut a), 1.0);
    }

    #[test]
    fn test_stationary_spread() {
        // stationary std of OU is s / sqrt(2k)
        let mut rng = StdRng::seed_from_u64(7);
        let mut walk: RandomWalk = RandomWalk::new(0.0, 0.0, 0.5, 1.0);
        let xs: Vec<f64> = (0..20_000).map(|_| walk.update(0.1, &mut rng)).collect();
        let tail = &xs[1000..];
        let mean = tail.iter().sum::<f64>() / tail.len() as f64;
        let var = tail.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / tail.len() as f64;
        assert!(mean.abs() < 0.2);
        assert!((var.sqrt() - 1.0).abs() < 0.2);
    }
}
