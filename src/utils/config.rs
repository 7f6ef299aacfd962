//! Configuration management
//!
//! All settings live in one TOML file with a section per subsystem. Missing
//! sections and fields fall back to their defaults.

use crate::error::{Error, Result};
use crate::model::ModelConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Regression and quantile analysis settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Forward horizon (rows) for the single-target regression
    pub horizon: usize,
    /// First horizon of the multi-horizon grid
    pub horizon_start: usize,
    /// Exclusive upper bound of the multi-horizon grid
    pub horizon_end: usize,
    /// Step of the multi-horizon grid
    pub horizon_step: usize,
    /// Quantile levels used to bucket the feature
    pub quantile_levels: Vec<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            horizon: 30 * 60,
            horizon_start: 1,
            horizon_end: 60 * 60,
            horizon_step: 30,
            quantile_levels: (1..10).map(|i| i as f64 / 10.0).collect(),
        }
    }
}

/// Feed-forward fit settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FitConfig {
    pub learning_rate: f64,
    /// Stop when the loss changes by no more than this between iterations
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Print every n-th iteration
    pub report_every: usize,
    pub seed: u64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            tolerance: 1e-14,
            max_iterations: 200_000,
            report_every: 1,
            seed: 0,
        }
    }
}

/// Sequence model training settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// One of LSTM, RNN, GRU, CNN, Transformer
    pub model: String,
    pub seq_length: usize,
    pub total_samples: usize,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
    /// Clip the global gradient norm to this value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grad_clip: Option<f64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model: "Transformer".to_string(),
            seq_length: 10,
            total_samples: 1000,
            batch_size: 32,
            epochs: 10,
            learning_rate: 0.001,
            seed: 0,
            grad_clip: None,
        }
    }
}

/// One population of simulated clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientTypeConfig {
    pub tag: String,
    /// Number of clients of this type
    pub count: u32,
    /// Orders per second
    pub placement_rate: f64,
    /// Cancellations per second of order life
    pub cancellation_rate: f64,
    /// Mean of the Poisson part of the order size
    pub size_mean: f64,
    /// Standard deviation of the price offset from the weighted mid
    pub price_std: f64,
    /// Probability that an order is a bid
    pub bid_probability: f64,
    /// Display size; `None` shows the full order
    #[serde(default)]
    pub show: Option<u32>,
}

/// Market makers quoting around the weighted mid with several live orders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceMakerConfig {
    pub tag: String,
    pub count: u32,
    /// Orders per second
    pub placement_rate: f64,
    /// Cancellations per second of order life
    pub cancellation_rate: f64,
    /// Mean of the price offset from the weighted mid
    pub price_mean: f64,
    /// Standard deviation of the price offset
    pub price_std: f64,
    /// Mean of the Poisson part of the order size
    pub size_mean: f64,
    /// Probability of crossing to the aggressive side
    pub aggressive_probability: f64,
    /// Live orders allowed at once
    pub max_orders: usize,
    /// Display size
    #[serde(default = "default_maker_show")]
    pub show: u32,
}

fn default_maker_show() -> u32 {
    2
}

/// Process driving the reference price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceWalk {
    /// Reverts to `reference_price`
    #[default]
    MeanReversion,
    /// Reverts to `reference_price` while positive and to its negative
    /// otherwise
    Bifurcating,
}

impl FromStr for ReferenceWalk {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "mean_reversion" => Ok(ReferenceWalk::MeanReversion),
            "bifurcating" => Ok(ReferenceWalk::Bifurcating),
            _ => Err(Error::InvalidInput(format!(
                "invalid reference walk '{s}'. Choose from 'mean_reversion' or 'bifurcating'"
            ))),
        }
    }
}

/// Order book simulation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Simulated time in seconds
    pub duration_secs: f64,
    /// Feature sampling period in seconds
    pub sample_interval_secs: f64,
    /// Level the reference price reverts to
    pub reference_price: f64,
    /// Mean reversion speed of the reference price
    pub reference_reversion: f64,
    /// Volatility of the reference price per sqrt(second)
    pub reference_volatility: f64,
    pub reference_walk: ReferenceWalk,
    pub client_types: Vec<ClientTypeConfig>,
    pub price_makers: Vec<PriceMakerConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            duration_secs: 4.0 * 60.0 * 60.0,
            sample_interval_secs: 1.0,
            reference_price: 1000.0,
            reference_reversion: 0.01,
            reference_volatility: 0.5,
            reference_walk: ReferenceWalk::MeanReversion,
            client_types: vec![
                ClientTypeConfig {
                    tag: "slow".to_string(),
                    count: 50,
                    placement_rate: 1.0 / 60.0,
                    cancellation_rate: 1.0 / (30.0 * 60.0),
                    size_mean: 100.0,
                    price_std: 5.0,
                    bid_probability: 0.5,
                    show: None,
                },
                ClientTypeConfig {
                    tag: "fast".to_string(),
                    count: 20,
                    placement_rate: 1.0,
                    cancellation_rate: 1.0,
                    size_mean: 10.0,
                    price_std: 2.0,
                    bid_probability: 0.5,
                    show: None,
                },
            ],
            price_makers: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub fit: FitConfig,
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file, or use defaults when the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.analysis.horizon, 1800);
        assert_eq!(config.analysis.quantile_levels.len(), 9);
        assert_eq!(config.training.model, "Transformer");
        assert_eq!(config.simulation.client_types.len(), 2);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = Config::from_toml(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed = Config::from_toml(
            r#"
            [training]
            model = "GRU"
            epochs = 3
            "#,
        )
        .unwrap();
        assert_eq!(parsed.training.model, "GRU");
        assert_eq!(parsed.training.epochs, 3);
        assert_eq!(parsed.training.batch_size, 32);
        assert_eq!(parsed.analysis, AnalysisConfig::default());
        assert_eq!(parsed.training.grad_clip, None);
    }

    #[test]
    fn test_simulation_extras() {
        let parsed = Config::from_toml(
            r#"
            [training]
            grad_clip = 5.0

            [simulation]
            reference_walk = "bifurcating"

            [[simulation.price_makers]]
            tag = "mm"
            count = 2
            placement_rate = 1.0
            cancellation_rate = 0.1
            price_mean = 0.0
            price_std = 1.0
            size_mean = 3.0
            aggressive_probability = 0.1
            max_orders = 10
            "#,
        )
        .unwrap();
        assert_eq!(parsed.training.grad_clip, Some(5.0));
        assert_eq!(parsed.simulation.reference_walk, ReferenceWalk::Bifurcating);
        assert_eq!(parsed.simulation.price_makers.len(), 1);
        assert_eq!(parsed.simulation.price_makers[0].show, 2);
        assert_eq!(
            "Mean-Reversion".parse::<ReferenceWalk>().unwrap(),
            ReferenceWalk::MeanReversion
        );
        assert!("brownian".parse::<ReferenceWalk>().is_err());
        assert_eq!(parsed.simulation.client_types.len(), 2);

        let mut config = parsed.clone();
        config.simulation.price_makers[0].show = 5;
        assert_eq!(Config::from_toml(&config.to_toml().unwrap()).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_default() {
        let config = Config::load_or_default("/nonexistent/lob_research.toml").unwrap();
        assert_eq!(config, Config::default());
    }
}
