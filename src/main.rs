//! LOB Research CLI
//!
//! Command-line interface for order book simulation, feature regressions and
//! model training.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lob_research::analysis::{quantile_correlations, quantile_regressions, regression};
use lob_research::data::{horizon_grid, multiple_regr_vars, regression_vars, FeatureFrame};
use burn::tensor::backend::Backend;
use lob_research::model::ModelKind;
use lob_research::nn::{fit_until_converged, FeedForward, TrainBackend};
use lob_research::orderbook::secs_to_time;
use lob_research::simulation::{load_records, replay, Simulation};
use lob_research::training::{train_model, SequenceDataset, Trainer};
use lob_research::utils::{level_for_verbosity, setup_logging, Config, ReferenceWalk};
use lob_research::VERSION;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "lob_research")]
#[command(about = "Order book simulation, feature regressions and sequence models")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults are used when it does not exist)
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Regress the age difference on the forward mid change
    Regress {
        /// Feature file (t x c1 c2 b a)
        #[arg(short, long)]
        input: PathBuf,

        /// Forward horizon in rows
        #[arg(long)]
        horizon: Option<usize>,
    },

    /// Correlations and regression errors per feature quantile bucket
    ///
    /// The buckets are contiguous: with levels q1..qn the rows fall into
    /// x < q1, q1 <= x < q2, ..., x >= qn, so the nine default levels give
    /// ten buckets.
    Quantiles {
        /// Feature file (t x c1 c2 b a)
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for CSV copies of the tables
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// First horizon
        #[arg(long)]
        start: Option<usize>,

        /// Exclusive last horizon
        #[arg(long)]
        end: Option<usize>,

        /// Horizon step
        #[arg(long)]
        step: Option<usize>,
    },

    /// Fit a feed-forward net from the age difference to the mid change
    FitNn {
        /// Feature file (t x c1 c2 b a)
        #[arg(short, long)]
        input: PathBuf,

        /// Forward horizon in rows
        #[arg(long)]
        horizon: Option<usize>,

        /// Use the 1-10-10-1 net instead of a single tanh unit
        #[arg(long)]
        deep: bool,

        /// Iteration cap
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Adam learning rate
        #[arg(long)]
        learning_rate: Option<f64>,
    },

    /// Train a sequence model on the synthetic autoregressive target
    Train {
        /// LSTM, RNN, GRU, CNN or Transformer
        #[arg(short, long)]
        model: Option<String>,

        /// Number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Sequence length
        #[arg(long)]
        seq_length: Option<usize>,

        /// Samples per epoch
        #[arg(long)]
        samples: Option<usize>,

        /// Mini-batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },

    /// Run the client simulation and record book features
    Simulate {
        /// Output feature file
        #[arg(short, long)]
        output: PathBuf,

        /// Simulated seconds
        #[arg(short, long)]
        duration: Option<f64>,

        /// Sampling period in seconds
        #[arg(long)]
        interval: Option<f64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Reference price walk: mean_reversion or bifurcating
        #[arg(long)]
        walk: Option<String>,
    },

    /// Replay a recorded order log and record book features
    Replay {
        /// Order log (time_ns,order_id,ENTRY|CANCEL|AMEND,price,Bid|Ask,size)
        #[arg(short, long)]
        input: PathBuf,

        /// Output feature file
        #[arg(short, long)]
        output: PathBuf,

        /// Sampling period in seconds
        #[arg(long)]
        interval: Option<f64>,
    },

    /// Show version and the effective configuration
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    setup_logging(&level_for_verbosity(&config.logging.level, cli.verbose))?;

    match cli.command {
        Commands::Regress { input, horizon } => {
            let horizon = horizon.unwrap_or(config.analysis.horizon);
            let frame = load_frame(&input)?;
            let (train, test) = regression_vars(&frame, horizon)?;
            let summary = regression(&train, &test)?;

            println!("Horizon: {} rows", horizon);
            println!("Train rows: {}, test rows: {}", train.len(), test.len());
            println!("r train: {:.6}, r test: {:.6}", summary.r_train, summary.r_test);
            println!(
                "slope: {:.6e}, intercept: {:.6e}, rvalue: {:.6}, pvalue: {:.3e}, stderr: {:.3e}",
                summary.fit.slope,
                summary.fit.intercept,
                summary.fit.rvalue,
                summary.fit.pvalue,
                summary.fit.stderr
            );
        }

        Commands::Quantiles {
            input,
            output_dir,
            start,
            end,
            step,
        } => {
            let a = &config.analysis;
            let horizons = horizon_grid(
                start.unwrap_or(a.horizon_start),
                end.unwrap_or(a.horizon_end),
                step.unwrap_or(a.horizon_step),
            )?;
            let frame = load_frame(&input)?;
            let (train, test) = multiple_regr_vars(&frame, &horizons)?;
            info!(
                "{} horizons, {} train rows, {} test rows",
                horizons.len(),
                train.len(),
                test.len()
            );

            let (corr_train, corr_test) = quantile_correlations(&train, &test, &a.quantile_levels)?;
            let (err_train, err_test) = quantile_regressions(&train, &test, &a.quantile_levels)?;

            for (name, table) in [
                ("correlation_train", &corr_train),
                ("correlation_test", &corr_test),
                ("rms_train", &err_train),
                ("rms_test", &err_test),
            ] {
                println!("{}", table);
                if let Some(dir) = &output_dir {
                    std::fs::create_dir_all(dir)?;
                    let path = dir.join(format!("{name}.csv"));
                    table.save_csv(&path)?;
                    info!("Saved {}", path.display());
                }
            }
        }

        Commands::FitNn {
            input,
            horizon,
            deep,
            max_iterations,
            learning_rate,
        } => {
            if let Some(n) = max_iterations {
                config.fit.max_iterations = n;
            }
            if let Some(lr) = learning_rate {
                config.fit.learning_rate = lr;
            }
            let horizon = horizon.unwrap_or(config.analysis.horizon);
            let frame = load_frame(&input)?;
            let (train, test) = regression_vars(&frame, horizon)?;

            let device = Default::default();
            TrainBackend::seed(config.fit.seed);
            let net = if deep {
                FeedForward::<TrainBackend>::deep_tanh(&device)
            } else {
                FeedForward::<TrainBackend>::single_tanh(&device)
            };
            println!(
                "Fitting {}-layer net on {} rows (horizon {})",
                net.num_layers(),
                train.len(),
                horizon
            );

            let every = config.fit.report_every.max(1);
            let (_, report) =
                fit_until_converged(net, &train, &test, &config.fit, &device, |step| {
                    if step.iteration % every == 0 {
                        println!("{:>7} {}", step.iteration, step);
                    }
                })?;
            println!(
                "{} after {} iterations: {}",
                if report.converged { "Converged" } else { "Stopped" },
                report.iterations,
                report.last
            );
        }

        Commands::Train {
            model,
            epochs,
            seq_length,
            samples,
            batch_size,
            seed,
            quiet,
        } => {
            let t = &mut config.training;
            if let Some(m) = model {
                t.model = m;
            }
            if let Some(e) = epochs {
                t.epochs = e;
            }
            if let Some(l) = seq_length {
                t.seq_length = l;
            }
            if let Some(n) = samples {
                t.total_samples = n;
            }
            if let Some(b) = batch_size {
                t.batch_size = b;
            }
            if let Some(s) = seed {
                t.seed = s;
            }

            let kind: ModelKind = config.training.model.parse()?;
            let device = Default::default();
            TrainBackend::seed(config.training.seed);
            let mut dataset = SequenceDataset::new(
                config.training.seq_length,
                config.training.total_samples,
                config.training.seed.wrapping_add(1),
            )?;

            println!("Training {} model...", kind);
            let trainer = Trainer::new(config.training.clone()).with_progress(!quiet);
            let outcome =
                train_model::<TrainBackend>(kind, &config.model, &trainer, &mut dataset, &device)?;
            if quiet {
                let n = outcome.history.epoch_losses.len();
                for (e, loss) in outcome.history.epoch_losses.iter().enumerate() {
                    println!("Epoch [{}/{}], Loss: {:.4}", e + 1, n, loss);
                }
            }

            println!("Sample predictions:");
            for (i, step) in outcome.predictions.iter().enumerate() {
                println!("Time step {}: {}", i + 1, step);
            }
        }

        Commands::Simulate {
            output,
            duration,
            interval,
            seed,
            walk,
        } => {
            let s = &mut config.simulation;
            if let Some(w) = walk {
                s.reference_walk = w.parse::<ReferenceWalk>()?;
            }
            if let Some(d) = duration {
                s.duration_secs = d;
            }
            if let Some(i) = interval {
                s.sample_interval_secs = i;
            }
            if let Some(seed) = seed {
                s.seed = seed;
            }

            let mut sim = Simulation::new(config.simulation.clone())?;
            let (frame, summary) = sim.run()?;
            frame
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;

            println!("Simulated {:.0}s", summary.duration_secs);
            println!(
                "Actions: {} (placements {}, cancellations {})",
                summary.actions, summary.placements, summary.cancellations
            );
            println!("Trade events: {}", summary.trades);
            println!("Orders cancelled at close: {}", summary.closed_at_end);
            println!("Samples: {} -> {}", summary.samples, output.display());
        }

        Commands::Replay {
            input,
            output,
            interval,
        } => {
            let interval = interval.unwrap_or(config.simulation.sample_interval_secs);
            let records = load_records(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let (frame, summary) = replay(&records, secs_to_time(interval))?;
            frame
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
            println!("Samples written to {}", output.display());
        }

        Commands::Info => {
            println!("lob_research {}", VERSION);
            println!("Config file: {}", cli.config.display());
            println!();
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn load_frame(path: &Path) -> Result<FeatureFrame> {
    let frame = FeatureFrame::load(path).with_context(|| format!("loading {}", path.display()))?;
    info!("Loaded {} rows from {}", frame.len(), path.display());
    Ok(frame)
}
