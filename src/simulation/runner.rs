//! Discrete event loop driving the client pool and the price makers against
//! the engine

use super::client::Action;
use super::handler::ClientPool;
use super::maker::{MakerCommand, MakerDesk, MarketState};
use super::recorder::FeatureRecorder;
use super::walk::RandomWalk;
use crate::data::FeatureFrame;
use crate::error::{Error, Result};
use crate::orderbook::{
    secs_to_time, time_to_secs, ClientId, MatchingEngine, Notifier, OrderEvent, Side, Time,
    NANOS_PER_SEC,
};
use crate::utils::{ReferenceWalk, SimulationConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const PROGRESS_EVERY: Time = 60 * 60 * NANOS_PER_SEC;

/// Counters from one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub duration_secs: f64,
    pub actions: u64,
    pub placements: u64,
    pub cancellations: u64,
    pub trades: u64,
    /// Orders still resting when the session closed
    pub closed_at_end: usize,
    pub samples: usize,
    pub final_reference: f64,
}

/// Routes engine events to whoever owns the order
struct Participants<'a> {
    pool: &'a mut ClientPool,
    makers: &'a mut MakerDesk,
}

impl Notifier for Participants<'_> {
    fn notify(&mut self, event: &OrderEvent) -> Result<()> {
        if self.makers.owns(event.client_id) {
            self.makers.notify(event)
        } else {
            self.pool.notify(event)
        }
    }
}

/// Client population, book and reference price for one session
pub struct Simulation {
    config: SimulationConfig,
    engine: MatchingEngine,
    pool: ClientPool,
    makers: MakerDesk,
    reference: RandomWalk<ReferenceWalk>,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if config.duration_secs.is_nan() || config.duration_secs <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "duration must be positive, got {}",
                config.duration_secs
            )));
        }
        let pool = ClientPool::new(&config.client_types, config.seed)?;
        let makers = MakerDesk::new(
            &config.price_makers,
            pool.len() as ClientId,
            config.seed.wrapping_add(2),
        )?;
        if pool.is_empty() && makers.is_empty() {
            return Err(Error::InvalidInput("no clients configured".to_string()));
        }
        let reference = RandomWalk::with_step(
            config.reference_walk,
            config.reference_price,
            config.reference_price,
            config.reference_reversion,
            config.reference_volatility,
        );
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed.wrapping_add(1)),
            engine: MatchingEngine::new(),
            pool,
            makers,
            reference,
            config,
        })
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }

    pub fn makers(&self) -> &MakerDesk {
        &self.makers
    }

    /// Run to `duration_secs`, then cancel everything left in the book
    pub fn run(&mut self) -> Result<(FeatureFrame, SimulationSummary)> {
        let end = secs_to_time(self.config.duration_secs);
        let mut recorder =
            FeatureRecorder::new(secs_to_time(self.config.sample_interval_secs), 0)?;
        let mut summary = SimulationSummary {
            duration_secs: self.config.duration_secs,
            ..Default::default()
        };

        info!(
            "Simulating {} clients and {} price makers for {:.0}s",
            self.pool.len(),
            self.makers.len(),
            self.config.duration_secs
        );

        self.pool.start(0);
        self.pool.resolve_pending(self.engine.wm(), self.reference.value());

        let mut last_time: Time = 0;
        let mut next_progress = PROGRESS_EVERY;
        loop {
            let pool_next = self.pool.next_action_time();
            let maker_next = self.makers.next_action();
            let time = match (pool_next, maker_next) {
                (Some(p), Some((m, _))) => p.min(m),
                (Some(p), None) => p,
                (None, Some((m, _))) => m,
                (None, None) => break,
            };
            if time >= end {
                break;
            }

            if time > last_time {
                self.reference
                    .update(time_to_secs(time - last_time), &mut self.rng);
                last_time = time;
            }
            recorder.advance_to(time, &self.engine);
            self.engine.set_time(time);

            if time >= next_progress {
                self.log_progress();
                while next_progress <= time {
                    next_progress += PROGRESS_EVERY;
                }
            }

            summary.actions += 1;
            match maker_next {
                // clients go first on a tie
                Some((t, maker_id)) if pool_next.map_or(true, |p| t < p) => {
                    self.maker_step(maker_id, &mut summary)?;
                }
                _ => self.client_step(&mut summary)?,
            }

            if self.pool.has_pending() {
                self.pool
                    .resolve_pending(self.engine.wm(), self.reference.value());
            }
        }

        self.engine.set_time(end);
        recorder.advance_to(end, &self.engine);
        summary.closed_at_end = self.engine.shutdown(&mut Participants {
            pool: &mut self.pool,
            makers: &mut self.makers,
        })?;
        debug!("Cancelled {} orders at close", summary.closed_at_end);

        summary.trades = self.pool.trades();
        summary.samples = recorder.len();
        summary.final_reference = self.reference.value();
        info!(
            "Done: {} actions, {} trades, {} samples",
            summary.actions, summary.trades, summary.samples
        );
        Ok((recorder.finish(), summary))
    }

    fn client_step(&mut self, summary: &mut SimulationSummary) -> Result<()> {
        let Some((_, client_id, action)) = self.pool.pop_action() else {
            return Ok(());
        };
        let mut participants = Participants {
            pool: &mut self.pool,
            makers: &mut self.makers,
        };
        match action {
            Action::Place(p) => {
                self.engine.add_simulation_order(
                    client_id,
                    p.price,
                    p.size,
                    p.show,
                    p.side,
                    false,
                    &mut participants,
                )?;
                summary.placements += 1;
            }
            Action::Cancel(id) => {
                self.engine.cancel_order(id, &mut participants)?;
                summary.cancellations += 1;
            }
            Action::Idle => warn!("client {} scheduled with nothing to do", client_id),
        }
        Ok(())
    }

    fn maker_step(&mut self, maker_id: ClientId, summary: &mut SimulationSummary) -> Result<()> {
        let market = MarketState::capture(&self.engine, self.reference.value());
        let commands = self.makers.act(maker_id, &market)?;
        let mut participants = Participants {
            pool: &mut self.pool,
            makers: &mut self.makers,
        };
        for command in commands {
            match command {
                MakerCommand::Place(p) => {
                    self.engine.add_simulation_order(
                        maker_id,
                        p.price,
                        p.size,
                        p.show,
                        p.side,
                        false,
                        &mut participants,
                    )?;
                    summary.placements += 1;
                }
                MakerCommand::Cancel(id) => {
                    self.engine.cancel_order(id, &mut participants)?;
                    summary.cancellations += 1;
                }
            }
        }
        Ok(())
    }

    fn log_progress(&self) {
        info!(
            "{:.0}s orders:{} active:{} maker_orders:{} bidlevels:{} asklevels:{} scheduled:{} wm:{:.2}",
            time_to_secs(self.engine.time()),
            self.engine.num_orders(),
            self.pool.active_orders(),
            self.makers.live_orders(),
            self.engine.num_levels(Side::Bid),
            self.engine.num_levels(Side::Offer),
            self.pool.scheduled(),
            self.engine.wm()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{ClientTypeConfig, PriceMakerConfig};

    fn small_config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            duration_secs: 300.0,
            sample_interval_secs: 1.0,
            reference_price: 1000.0,
            reference_reversion: 0.01,
            reference_volatility: 0.5,
            reference_walk: ReferenceWalk::MeanReversion,
            client_types: vec![ClientTypeConfig {
                tag: "fast".to_string(),
                count: 10,
                placement_rate: 1.0,
                cancellation_rate: 0.2,
                size_mean: 5.0,
                price_std: 2.0,
                bid_probability: 0.5,
                show: Some(3),
            }],
            price_makers: Vec::new(),
        }
    }

    fn maker_config() -> PriceMakerConfig {
        PriceMakerConfig {
            tag: "mm".to_string(),
            count: 3,
            placement_rate: 0.5,
            cancellation_rate: 0.05,
            price_mean: 0.0,
            price_std: 2.0,
            size_mean: 4.0,
            aggressive_probability: 0.1,
            max_orders: 5,
            show: 2,
        }
    }

    #[test]
    fn test_run_produces_samples_and_closes_book() {
        let mut sim = Simulation::new(small_config(42)).unwrap();
        let (frame, summary) = sim.run().unwrap();
        assert_eq!(frame.len(), 300);
        assert_eq!(summary.samples, 300);
        assert!(summary.placements > 100);
        assert!(summary.trades > 0);
        assert_eq!(sim.engine().num_orders(), 0);
        assert_eq!(sim.pool().active_orders(), 0);
        // mid stays near the reference once both sides are quoted
        let quoted: Vec<f64> = frame.mid().into_iter().filter(|x| !x.is_nan()).collect();
        assert!(!quoted.is_empty());
        assert!(quoted.iter().all(|x| (x - 1000.0).abs() < 250.0));
    }

    #[test]
    fn test_same_seed_same_session() {
        let (a, sa) = Simulation::new(small_config(7)).unwrap().run().unwrap();
        let (b, sb) = Simulation::new(small_config(7)).unwrap().run().unwrap();
        assert_eq!(sa, sb);
        assert_eq!(a.len(), b.len());
        for (ra, rb) in a.rows().iter().zip(b.rows()) {
            assert!(ra.x == rb.x || (ra.x.is_nan() && rb.x.is_nan()));
        }
    }

    #[test]
    fn test_empty_population_rejected() {
        let mut cfg = small_config(0);
        cfg.client_types.clear();
        assert!(Simulation::new(cfg).is_err());
        let mut cfg = small_config(0);
        cfg.duration_secs = 0.0;
        assert!(Simulation::new(cfg).is_err());
    }

    #[test]
    fn test_price_makers_join_the_session() {
        let mut cfg = small_config(5);
        cfg.price_makers.push(maker_config());
        let mut sim = Simulation::new(cfg).unwrap();
        assert_eq!(sim.makers().len(), 3);
        assert!(sim.makers().owns(10));
        let (frame, summary) = sim.run().unwrap();
        assert_eq!(frame.len(), 300);
        assert!(sim.makers().makers().iter().all(|m| m.orders_placed > 0));
        assert!(summary.placements > 100);
        assert_eq!(sim.engine().num_orders(), 0);
        assert_eq!(sim.makers().live_orders(), 0);
    }

    #[test]
    fn test_makers_alone_quote_around_reference() {
        let mut cfg = small_config(6);
        cfg.client_types.clear();
        cfg.price_makers.push(maker_config());
        let (frame, summary) = Simulation::new(cfg).unwrap().run().unwrap();
        assert!(summary.placements > 0);
        let quoted: Vec<f64> = frame.mid().into_iter().filter(|x| !x.is_nan()).collect();
        assert!(quoted.iter().all(|x| (x - 1000.0).abs() < 250.0));
    }

    #[test]
    fn test_bifurcating_reference_walk() {
        let mut cfg = small_config(8);
        cfg.reference_walk = ReferenceWalk::Bifurcating;
        let (_, summary) = Simulation::new(cfg).unwrap().run().unwrap();
        // a positive reference keeps reverting to the positive level
        assert!(summary.final_reference > 0.0);
    }
}
