//! Simulated client populations and per-client state

use crate::error::{Error, Result};
use crate::orderbook::{secs_to_time, ClientId, OrderId, Price, Side, Size, Time};
use crate::utils::ClientTypeConfig;
use rand::distributions::Bernoulli;
use rand::Rng;
use rand_distr::{Distribution, Exp, Normal, Poisson};
use std::fmt;

/// Random behaviour shared by every client of one type
#[derive(Debug, Clone)]
pub struct ClientType {
    pub tag: String,
    placement: Exp<f64>,
    cancellation: Exp<f64>,
    order_size: Poisson<f64>,
    price_offset: Normal<f64>,
    bid: Bernoulli,
    show: Option<Size>,
}

/// An order a client is about to send
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub price: Price,
    pub size: Size,
    pub show: Size,
    pub side: Side,
}

impl ClientType {
    pub fn from_config(cfg: &ClientTypeConfig) -> Result<Self> {
        let invalid = |what: &str, e: &dyn fmt::Display| {
            Error::InvalidInput(format!("client type '{}': {what}: {e}", cfg.tag))
        };
        let positive = |v: f64| v > 0.0;
        if !positive(cfg.placement_rate) || !positive(cfg.cancellation_rate) {
            return Err(Error::InvalidInput(format!(
                "client type '{}': rates must be positive",
                cfg.tag
            )));
        }
        if cfg.show == Some(0) {
            return Err(Error::InvalidInput(format!(
                "client type '{}': show must be positive",
                cfg.tag
            )));
        }
        Ok(Self {
            tag: cfg.tag.clone(),
            placement: Exp::new(cfg.placement_rate).map_err(|e| invalid("placement_rate", &e))?,
            cancellation: Exp::new(cfg.cancellation_rate)
                .map_err(|e| invalid("cancellation_rate", &e))?,
            order_size: Poisson::new(cfg.size_mean).map_err(|e| invalid("size_mean", &e))?,
            price_offset: Normal::new(0.0, cfg.price_std).map_err(|e| invalid("price_std", &e))?,
            bid: Bernoulli::new(cfg.bid_probability)
                .map_err(|e| invalid("bid_probability", &e))?,
            show: cfg.show,
        })
    }

    /// Wait until the next placement
    pub fn placement_dt<R: Rng + ?Sized>(&self, rng: &mut R) -> Time {
        let secs: f64 = self.placement.sample(rng);
        secs_to_time(secs)
    }

    /// Life of an acknowledged order
    pub fn cancellation_dt<R: Rng + ?Sized>(&self, rng: &mut R) -> Time {
        let secs: f64 = self.cancellation.sample(rng);
        secs_to_time(secs)
    }

    /// `1 + Poisson(size_mean)`
    pub fn order_size<R: Rng + ?Sized>(&self, rng: &mut R) -> Size {
        let n: f64 = self.order_size.sample(rng);
        1 + n as Size
    }

    /// Delay and terms of the next order, priced around `base`
    pub fn next_placement<R: Rng + ?Sized>(&self, base: f64, rng: &mut R) -> (Time, Placement) {
        let dt = self.placement_dt(rng);
        let offset: f64 = self.price_offset.sample(rng);
        let size = self.order_size(rng);
        let side = if self.bid.sample(rng) {
            Side::Bid
        } else {
            Side::Offer
        };
        let placement = Placement {
            price: (base + offset).round() as Price,
            size,
            show: self.show.unwrap_or(size),
            side,
        };
        (dt, placement)
    }
}

/// What a client does when its time comes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Idle,
    Place(Placement),
    Cancel(OrderId),
}

#[derive(Debug, Clone)]
pub struct ClientState {
    pub client_id: ClientId,
    /// Index into the pool's client types
    pub type_index: usize,
    pub next_action_time: Option<Time>,
    pub action: Action,
    /// Order acknowledged and not yet ended
    pub active_order: Option<OrderId>,
    pub cancel_requested: bool,
    pub orders_placed: u64,
    pub traded_size: u64,
}

impl ClientState {
    pub fn new(client_id: ClientId, type_index: usize) -> Self {
        Self {
            client_id,
            type_index,
            next_action_time: None,
            action: Action::Idle,
            active_order: None,
            cancel_requested: false,
            orders_placed: 0,
            traded_size: 0,
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = match self.next_action_time {
            Some(t) => format!("{}s", t as f64 * 1e-9),
            None => "-".to_string(),
        };
        let oid = self
            .active_order
            .map_or_else(|| "-".to_string(), |o| o.to_string());
        let action = match self.action {
            Action::Idle => "IDLE".to_string(),
            Action::Place(p) => format!("NEW {} {}@{}", p.side, p.size, p.price),
            Action::Cancel(id) => format!("CANCEL {id}"),
        };
        write!(
            f,
            "<CS type:{} cid:{} time:{} action:{} oid:{}>",
            self.type_index, self.client_id, time, action, oid
        )
    }
}
