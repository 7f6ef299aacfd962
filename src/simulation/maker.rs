//! Market makers quoting around the weighted mid
//!
//! A [`PriceMaker`] keeps up to `max_orders` orders in the book. At each
//! placement time it prices a new order at `wm + N(mean, std)`: offers above
//! the mid, bids below, flipped to the aggressive side with a fixed
//! probability. Every acknowledged order gets its own exponential lifetime,
//! after which the maker cancels it.

use super::client::Placement;
use super::scheduler::Scheduler;
use crate::error::{Error, Result};
use crate::orderbook::{
    secs_to_time, ClientId, Level2, MatchingEngine, Notifier, NotifyMessage, OrderEvent, OrderId,
    Price, Side, Size, Time,
};
use crate::utils::PriceMakerConfig;
use rand::distributions::Bernoulli;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal, Poisson};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::trace;

/// Book state a maker decides on
#[derive(Debug, Clone, PartialEq)]
pub struct MarketState {
    pub time: Time,
    pub wm: f64,
    pub level2: Level2,
}

impl MarketState {
    /// Levels per side captured from the book
    pub const DEPTH: usize = 4;

    /// Snapshot of `engine`; `fallback` stands in for the weighted mid while
    /// the book is one-sided
    pub fn capture(engine: &MatchingEngine, fallback: f64) -> Self {
        let wm = engine.wm();
        Self {
            time: engine.time(),
            wm: if wm.is_nan() { fallback } else { wm },
            level2: engine.level2(Self::DEPTH),
        }
    }
}

/// What a maker sends to the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MakerCommand {
    Place(Placement),
    Cancel(OrderId),
}

#[derive(Debug, Clone)]
pub struct PriceMaker {
    pub client_id: ClientId,
    placement: Exp<f64>,
    cancellation: Exp<f64>,
    price_offset: Normal<f64>,
    order_size: Poisson<f64>,
    aggressive: Bernoulli,
    max_orders: usize,
    show: Size,
    placement_time: Time,
    /// Live orders and their cancellation time; `None` once cancelling
    live: BTreeMap<OrderId, Option<Time>>,
    cancel_queue: BTreeSet<(Time, OrderId)>,
    pub orders_placed: u64,
    pub traded_size: u64,
}

impl PriceMaker {
    pub fn new<R: Rng + ?Sized>(
        client_id: ClientId,
        cfg: &PriceMakerConfig,
        now: Time,
        rng: &mut R,
    ) -> Result<Self> {
        let invalid = |what: &str, e: &dyn fmt::Display| {
            Error::InvalidInput(format!("price maker '{}': {what}: {e}", cfg.tag))
        };
        if cfg.placement_rate <= 0.0 || cfg.cancellation_rate <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "price maker '{}': rates must be positive",
                cfg.tag
            )));
        }
        if cfg.show == 0 || cfg.max_orders == 0 {
            return Err(Error::InvalidInput(format!(
                "price maker '{}': show and max_orders must be positive",
                cfg.tag
            )));
        }
        let placement = Exp::new(cfg.placement_rate).map_err(|e| invalid("placement_rate", &e))?;
        let first: f64 = placement.sample(rng);
        Ok(Self {
            client_id,
            placement,
            cancellation: Exp::new(cfg.cancellation_rate)
                .map_err(|e| invalid("cancellation_rate", &e))?,
            price_offset: Normal::new(cfg.price_mean, cfg.price_std)
                .map_err(|e| invalid("price_std", &e))?,
            order_size: Poisson::new(cfg.size_mean).map_err(|e| invalid("size_mean", &e))?,
            aggressive: Bernoulli::new(cfg.aggressive_probability)
                .map_err(|e| invalid("aggressive_probability", &e))?,
            max_orders: cfg.max_orders,
            show: cfg.show,
            placement_time: now + secs_to_time(first),
            live: BTreeMap::new(),
            cancel_queue: BTreeSet::new(),
            orders_placed: 0,
            traded_size: 0,
        })
    }

    /// Orders acknowledged and not yet ended, cancelling ones included
    pub fn live_orders(&self) -> usize {
        self.live.len()
    }

    /// Earliest of the next placement and the next cancellation
    pub fn next_action_time(&self) -> Time {
        match self.cancel_queue.first() {
            Some(&(t, _)) => t.min(self.placement_time),
            None => self.placement_time,
        }
    }

    /// Terms of an order priced around `wm`
    pub fn quote<R: Rng + ?Sized>(&self, wm: f64, rng: &mut R) -> Placement {
        let offset: f64 = self.price_offset.sample(rng);
        let price = wm + offset;
        let passive = if price >= wm { Side::Offer } else { Side::Bid };
        let side = if self.aggressive.sample(rng) {
            passive.opposite()
        } else {
            passive
        };
        let extra: f64 = self.order_size.sample(rng);
        let size = 1 + extra as Size;
        Placement {
            price: price.round() as Price,
            size,
            show: self.show.min(size),
            side,
        }
    }

    /// Cancel expired orders, then place one order if it is time and there
    /// is room
    pub fn on_market<R: Rng + ?Sized>(
        &mut self,
        market: &MarketState,
        rng: &mut R,
    ) -> Vec<MakerCommand> {
        let now = market.time;
        let mut commands = Vec::new();

        while let Some(&(t, id)) = self.cancel_queue.first() {
            if t > now {
                break;
            }
            self.cancel_queue.pop_first();
            self.live.insert(id, None);
            commands.push(MakerCommand::Cancel(id));
        }

        if now >= self.placement_time {
            if self.live.len() < self.max_orders && !market.wm.is_nan() {
                commands.push(MakerCommand::Place(self.quote(market.wm, rng)));
            }
            while self.placement_time <= now {
                let dt: f64 = self.placement.sample(rng);
                self.placement_time += secs_to_time(dt).max(1);
            }
        }
        commands
    }

    pub fn handle<R: Rng + ?Sized>(&mut self, event: &OrderEvent, rng: &mut R) -> Result<()> {
        let id = event.order_id;
        if event.kind != NotifyMessage::Ack && !self.live.contains_key(&id) {
            return Err(Error::Protocol(format!(
                "price maker {} got {} for unknown order {}",
                self.client_id, event.kind, id
            )));
        }
        match event.kind {
            NotifyMessage::Ack => {
                // a replenished slice of a live order keeps its lifetime
                if !self.live.contains_key(&id) {
                    let dt: f64 = self.cancellation.sample(rng);
                    let at = event.time + secs_to_time(dt);
                    self.live.insert(id, Some(at));
                    self.cancel_queue.insert((at, id));
                    self.orders_placed += 1;
                }
            }
            NotifyMessage::Trade => {
                self.traded_size += u64::from(event.traded_size);
            }
            NotifyMessage::Cancel => {
                if let Some(at) = self.live.get_mut(&id).and_then(Option::take) {
                    self.cancel_queue.remove(&(at, id));
                }
            }
            NotifyMessage::End => {
                let cancel_at = self.live.get(&id).copied().flatten();
                if event.remaining_size > 0 && cancel_at.is_some() {
                    return Ok(());
                }
                self.live.remove(&id);
                if let Some(at) = cancel_at {
                    self.cancel_queue.remove(&(at, id));
                }
            }
        }
        Ok(())
    }
}

/// All price makers of a session, with ids following the client pool
#[derive(Debug)]
pub struct MakerDesk {
    makers: Vec<PriceMaker>,
    first_id: ClientId,
    scheduler: Scheduler,
    scheduled: Vec<Time>,
    rng: StdRng,
}

impl MakerDesk {
    pub fn new(configs: &[PriceMakerConfig], first_id: ClientId, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut makers = Vec::new();
        for cfg in configs {
            for _ in 0..cfg.count {
                let id = first_id + makers.len() as ClientId;
                makers.push(PriceMaker::new(id, cfg, 0, &mut rng)?);
            }
        }
        let mut scheduler = Scheduler::new();
        let scheduled: Vec<Time> = makers.iter().map(PriceMaker::next_action_time).collect();
        for (maker, &t) in makers.iter().zip(&scheduled) {
            scheduler.reschedule(maker.client_id, None, Some(t));
        }
        Ok(Self {
            makers,
            first_id,
            scheduler,
            scheduled,
            rng,
        })
    }

    pub fn len(&self) -> usize {
        self.makers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.makers.is_empty()
    }

    pub fn makers(&self) -> &[PriceMaker] {
        &self.makers
    }

    /// Whether `client_id` belongs to this desk
    pub fn owns(&self, client_id: ClientId) -> bool {
        self.index(client_id).is_some()
    }

    pub fn live_orders(&self) -> usize {
        self.makers.iter().map(PriceMaker::live_orders).sum()
    }

    /// Earliest maker action and who takes it
    pub fn next_action(&self) -> Option<(Time, ClientId)> {
        self.scheduler.peek()
    }

    /// Let one maker react to the book
    pub fn act(&mut self, client_id: ClientId, market: &MarketState) -> Result<Vec<MakerCommand>> {
        let index = self
            .index(client_id)
            .ok_or_else(|| Error::Protocol(format!("no price maker {client_id}")))?;
        let commands = self.makers[index].on_market(market, &mut self.rng);
        self.refresh(index);
        Ok(commands)
    }

    fn index(&self, client_id: ClientId) -> Option<usize> {
        let index = client_id.checked_sub(self.first_id)? as usize;
        (index < self.makers.len()).then_some(index)
    }

    fn refresh(&mut self, index: usize) {
        let maker = &self.makers[index];
        let next = maker.next_action_time();
        self.scheduler
            .reschedule(maker.client_id, Some(self.scheduled[index]), Some(next));
        self.scheduled[index] = next;
    }
}

impl Notifier for MakerDesk {
    fn notify(&mut self, event: &OrderEvent) -> Result<()> {
        trace!("{}", event);
        let index = self.index(event.client_id).ok_or_else(|| {
            Error::Protocol(format!("event for unknown price maker {}", event.client_id))
        })?;
        self.makers[index].handle(event, &mut self.rng)?;
        self.refresh(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{NoopNotifier, NANOS_PER_SEC};

    fn config() -> PriceMakerConfig {
        PriceMakerConfig {
            tag: "mm".to_string(),
            count: 1,
            placement_rate: 1.0,
            cancellation_rate: 1e-6,
            price_mean: 0.0,
            price_std: 3.0,
            size_mean: 4.0,
            aggressive_probability: 0.0,
            max_orders: 10,
            show: 2,
        }
    }

    fn market(time: Time, wm: f64) -> MarketState {
        MarketState {
            time,
            wm,
            level2: Level2 {
                bids: Vec::new(),
                asks: Vec::new(),
            },
        }
    }

    fn ack(maker: &PriceMaker, id: u64, time: Time) -> OrderEvent {
        OrderEvent {
            kind: NotifyMessage::Ack,
            order_id: OrderId(id),
            client_id: maker.client_id,
            price: 100,
            side: Side::Bid,
            shown_size: 2,
            remaining_size: 5,
            is_shadow: false,
            time,
            traded_size: 0,
            traded_price: 0,
        }
    }

    /// Step the maker once per placement and acknowledge every order
    fn run(
        maker: &mut PriceMaker,
        wm: f64,
        steps: usize,
        rng: &mut StdRng,
    ) -> Vec<(Time, Placement)> {
        let mut placed = Vec::new();
        let mut next_id = 1;
        for _ in 0..steps {
            let now = maker.next_action_time();
            for command in maker.on_market(&market(now, wm), rng) {
                if let MakerCommand::Place(p) = command {
                    maker.handle(&ack(maker, next_id, now), rng).unwrap();
                    next_id += 1;
                    placed.push((now, p));
                }
            }
        }
        placed
    }

    #[test]
    fn test_caps_live_orders() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut maker = PriceMaker::new(7, &config(), 0, &mut rng).unwrap();
        let placed = run(&mut maker, 0.5, 50, &mut rng);
        assert_eq!(placed.len(), 10);
        assert_eq!(maker.live_orders(), 10);
        assert_eq!(maker.orders_placed, 10);
    }

    #[test]
    fn test_passive_sides_and_show() {
        let mut rng = StdRng::seed_from_u64(2);
        let maker = PriceMaker::new(0, &config(), 0, &mut rng).unwrap();
        for _ in 0..500 {
            let p = maker.quote(100.0, &mut rng);
            match p.side {
                Side::Offer => assert!(p.price >= 100),
                Side::Bid => assert!(p.price <= 100),
            }
            assert!(p.size >= 1);
            assert_eq!(p.show, p.size.min(2));
        }
    }

    #[test]
    fn test_aggressive_flips_side() {
        let cfg = PriceMakerConfig {
            price_mean: 5.0,
            price_std: 0.1,
            aggressive_probability: 1.0,
            ..config()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let maker = PriceMaker::new(0, &cfg, 0, &mut rng).unwrap();
        for _ in 0..100 {
            let p = maker.quote(100.0, &mut rng);
            // priced above the mid but sent as a bid
            assert_eq!(p.side, Side::Bid);
            assert_eq!(p.price, 105);
        }
    }

    #[test]
    fn test_offset_sign_mirrors_prices() {
        let up = PriceMakerConfig {
            price_mean: 2.0,
            ..config()
        };
        let down = PriceMakerConfig {
            price_mean: -2.0,
            ..config()
        };
        let mut rng_up = StdRng::seed_from_u64(9);
        let mut rng_down = StdRng::seed_from_u64(9);
        let mut a = PriceMaker::new(0, &up, 0, &mut rng_up).unwrap();
        let mut b = PriceMaker::new(0, &down, 0, &mut rng_down).unwrap();
        let pa = run(&mut a, 1000.0, 10, &mut rng_up);
        let pb = run(&mut b, 1000.0, 10, &mut rng_down);
        assert_eq!(pa.len(), pb.len());
        for ((ta, a), (tb, b)) in pa.iter().zip(&pb) {
            assert_eq!(ta, tb);
            assert_eq!(a.price - b.price, 4);
        }
    }

    #[test]
    fn test_no_placement_without_mid() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut maker = PriceMaker::new(0, &config(), 0, &mut rng).unwrap();
        let first = maker.next_action_time();
        assert!(maker.on_market(&market(first, f64::NAN), &mut rng).is_empty());
        assert!(maker.next_action_time() > first);
    }

    #[test]
    fn test_expired_orders_cancelled() {
        let cfg = PriceMakerConfig {
            cancellation_rate: 10.0,
            ..config()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let mut maker = PriceMaker::new(0, &cfg, 0, &mut rng).unwrap();
        maker.handle(&ack(&maker, 1, 0), &mut rng).unwrap();
        let later = 1000 * NANOS_PER_SEC;
        let commands = maker.on_market(&market(later, f64::NAN), &mut rng);
        assert_eq!(commands, vec![MakerCommand::Cancel(OrderId(1))]);

        // the engine's Cancel and End close the order
        let mut cancel = ack(&maker, 1, later);
        cancel.kind = NotifyMessage::Cancel;
        maker.handle(&cancel, &mut rng).unwrap();
        let mut end = cancel;
        end.kind = NotifyMessage::End;
        maker.handle(&end, &mut rng).unwrap();
        assert_eq!(maker.live_orders(), 0);

        end.order_id = OrderId(99);
        assert!(maker.handle(&end, &mut rng).is_err());
    }

    #[test]
    fn test_desk_quotes_against_engine() {
        let mut desk = MakerDesk::new(&[config()], 3, 11).unwrap();
        assert!(desk.owns(3));
        assert!(!desk.owns(2));
        let mut engine = MatchingEngine::new();
        // wide two-sided book so the maker sees a mid it never trades through
        engine
            .add_simulation_order(0, 900, 50, 50, Side::Bid, false, &mut NoopNotifier)
            .unwrap();
        engine
            .add_simulation_order(1, 1100, 50, 50, Side::Offer, false, &mut NoopNotifier)
            .unwrap();

        for _ in 0..40 {
            let (time, cid) = desk.next_action().unwrap();
            engine.set_time(time);
            let state = MarketState::capture(&engine, f64::NAN);
            for command in desk.act(cid, &state).unwrap() {
                match command {
                    MakerCommand::Place(p) => {
                        engine
                            .add_simulation_order(
                                cid, p.price, p.size, p.show, p.side, false, &mut desk,
                            )
                            .unwrap();
                    }
                    MakerCommand::Cancel(id) => engine.cancel_order(id, &mut desk).unwrap(),
                }
            }
        }
        let maker = &desk.makers()[0];
        assert!(maker.orders_placed >= 10);
        assert!(desk.live_orders() <= 10);
        assert_eq!(engine.num_orders(), 2 + desk.live_orders());
    }
}
