//! Price-time priority matching engine
//!
//! An incoming order is acknowledged, matched against the best opposite
//! levels while prices cross, and any remainder rests at the back of its own
//! price level. Every state change is reported through a [`Notifier`].

use super::level::Level;
use super::notify::{Notifier, NotifyMessage, OrderEvent};
use super::order::Order;
use super::types::{time_to_secs, ClientId, OrderId, Price, Side, Size, Time};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Best `depth` levels of each side, best first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Level2 {
    pub bids: Vec<(Price, Size)>,
    pub asks: Vec<(Price, Size)>,
}

/// Orders resting at one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub price: Price,
    pub side: Side,
    pub orders: Vec<Order>,
}

/// Full book at one instant; offers from the highest price down, then bids
/// from the best down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub time: Time,
    pub levels: Vec<LevelSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchingEngine {
    next_order_id: OrderId,
    time: Time,
    bids: BTreeMap<Price, Level>,
    offers: BTreeMap<Price, Level>,
    orders: HashMap<OrderId, Order>,
}

/// Trade `aggressor` against the queue of one level until either runs out
fn match_level<N: Notifier + ?Sized>(
    level: &mut Level,
    orders: &mut HashMap<OrderId, Order>,
    aggressor: &mut Order,
    time: Time,
    notifier: &mut N,
) -> Result<()> {
    while aggressor.remaining_size > 0 {
        let Some(front) = level.front() else {
            break;
        };
        let resting = orders
            .get_mut(&front)
            .ok_or_else(|| Error::UnknownOrder(front.to_string()))?;

        let size = aggressor.shown_size.min(resting.shown_size);
        if size == 0 {
            return Err(Error::Protocol(format!(
                "zero-size match between {} and {}",
                aggressor.id, resting.id
            )));
        }
        let price = resting.price;
        aggressor.traded(size, price, time, resting.is_shadow, notifier)?;
        resting.traded(size, price, time, aggressor.is_shadow, notifier)?;

        if resting.shown_size == 0 {
            level.queue.pop_front();
            if resting.remaining_size != 0 {
                resting.replenish(time, notifier)?;
                level.queue.push_back(front);
            } else {
                orders.remove(&front);
            }
        }
        if aggressor.shown_size == 0 && aggressor.remaining_size != 0 {
            aggressor.replenish(time, notifier)?;
        }
    }
    Ok(())
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn set_time(&mut self, time: Time) {
        self.time = time;
    }

    fn book(&self, side: Side) -> &BTreeMap<Price, Level> {
        match side {
            Side::Bid => &self.bids,
            Side::Offer => &self.offers,
        }
    }

    /// Order for a simulated client; the engine assigns the id
    #[allow(clippy::too_many_arguments)]
    pub fn add_simulation_order<N: Notifier + ?Sized>(
        &mut self,
        client_id: ClientId,
        price: Price,
        size: Size,
        show: Size,
        side: Side,
        is_shadow: bool,
        notifier: &mut N,
    ) -> Result<OrderId> {
        let id = self.next_order_id;
        self.add_order(id, client_id, price, size, show, side, is_shadow, notifier)?;
        self.next_order_id = id.next();
        Ok(id)
    }

    /// Order from a recorded feed, fully shown, with the caller's id
    pub fn add_replay_order<N: Notifier + ?Sized>(
        &mut self,
        id: OrderId,
        client_id: ClientId,
        price: Price,
        size: Size,
        side: Side,
        is_shadow: bool,
        notifier: &mut N,
    ) -> Result<OrderId> {
        self.add_order(id, client_id, price, size, size, side, is_shadow, notifier)?;
        if id >= self.next_order_id {
            self.next_order_id = id.next();
        }
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_order<N: Notifier + ?Sized>(
        &mut self,
        id: OrderId,
        client_id: ClientId,
        price: Price,
        size: Size,
        show: Size,
        side: Side,
        is_shadow: bool,
        notifier: &mut N,
    ) -> Result<()> {
        if size == 0 || show == 0 {
            return Err(Error::InvalidInput(format!(
                "order {id} needs positive size and show, got {size}/{show}"
            )));
        }
        if self.orders.contains_key(&id) {
            return Err(Error::Protocol(format!("order id {id} is already live")));
        }

        let time = self.time;
        let mut order = Order::new(id, time, client_id, price, size, show, side, is_shadow);
        order.replenish(time, notifier)?;

        let opposite = match side {
            Side::Bid => &mut self.offers,
            Side::Offer => &mut self.bids,
        };
        loop {
            let best = match side {
                Side::Bid => opposite.keys().next(),
                Side::Offer => opposite.keys().next_back(),
            };
            let Some(&level_price) = best else {
                break;
            };
            if !side.crosses(price, level_price) {
                break;
            }
            let Some(level) = opposite.get_mut(&level_price) else {
                break;
            };
            match_level(level, &mut self.orders, &mut order, time, notifier)?;
            if level.is_empty() {
                opposite.remove(&level_price);
            }
            if order.remaining_size == 0 {
                break;
            }
        }

        if order.remaining_size > 0 {
            let own = match side {
                Side::Bid => &mut self.bids,
                Side::Offer => &mut self.offers,
            };
            own.entry(price)
                .or_insert_with(|| Level::new(price, side))
                .queue
                .push_back(id);
            self.orders.insert(id, order);
        }
        Ok(())
    }

    /// Remove a resting order; emits `Cancel` then `End`
    pub fn cancel_order<N: Notifier + ?Sized>(&mut self, id: OrderId, notifier: &mut N) -> Result<()> {
        let order = self
            .orders
            .remove(&id)
            .ok_or_else(|| Error::UnknownOrder(id.to_string()))?;
        let book = match order.side {
            Side::Bid => &mut self.bids,
            Side::Offer => &mut self.offers,
        };
        let level = book.get_mut(&order.price).ok_or_else(|| {
            Error::Protocol(format!("no {} level at {} for order {id}", order.side, order.price))
        })?;
        if !level.remove(id) {
            return Err(Error::Protocol(format!(
                "order {id} missing from its level {}",
                order.price
            )));
        }
        if level.is_empty() {
            book.remove(&order.price);
        }
        notifier.notify(&OrderEvent::new(NotifyMessage::Cancel, &order, self.time, 0, 0))?;
        notifier.notify(&OrderEvent::new(NotifyMessage::End, &order, self.time, 0, 0))?;
        Ok(())
    }

    /// Cancel everything still resting, lowest id first
    pub fn shutdown<N: Notifier + ?Sized>(&mut self, notifier: &mut N) -> Result<usize> {
        let mut ids: Vec<OrderId> = self.orders.keys().copied().collect();
        ids.sort_unstable();
        for id in &ids {
            self.cancel_order(*id, notifier)?;
        }
        Ok(ids.len())
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.orders.contains_key(&id)
    }

    /// Number of resting orders
    pub fn num_orders(&self) -> usize {
        self.orders.len()
    }

    pub fn num_levels(&self, side: Side) -> usize {
        self.book(side).len()
    }

    /// Levels of one side from best to worst
    fn levels(&self, side: Side) -> Box<dyn Iterator<Item = &Level> + '_> {
        match side {
            Side::Bid => Box::new(self.bids.values().rev()),
            Side::Offer => Box::new(self.offers.values()),
        }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_offer(&self) -> Option<Price> {
        self.offers.keys().next().copied()
    }

    /// Order at the head of the best level
    pub fn front_order(&self, side: Side) -> Option<&Order> {
        self.levels(side)
            .next()
            .and_then(|level| level.front())
            .and_then(|id| self.orders.get(&id))
    }

    /// Price and total shown size of the best `depth` levels per side
    pub fn level2(&self, depth: usize) -> Level2 {
        let collect = |side: Side| -> Vec<(Price, Size)> {
            self.levels(side)
                .take(depth)
                .map(|l| (l.price, l.total_shown(&self.orders)))
                .collect()
        };
        Level2 {
            bids: collect(Side::Bid),
            asks: collect(Side::Offer),
        }
    }

    /// Size-weighted mid `(bid * ask_size + ask * bid_size) / (bid_size + ask_size)`;
    /// `NaN` unless both sides are quoted
    pub fn wm(&self) -> f64 {
        let l2 = self.level2(1);
        match (l2.bids.first(), l2.asks.first()) {
            (Some(&(bp, bs)), Some(&(ap, asz))) if bs + asz > 0 => {
                (bp as f64 * asz as f64 + ap as f64 * bs as f64) / (bs + asz) as f64
            }
            _ => f64::NAN,
        }
    }

    /// Copy of every non-empty level
    pub fn snapshot(&self, include_shadow: bool) -> BookSnapshot {
        let mut levels = Vec::with_capacity(self.bids.len() + self.offers.len());
        let offers = self.offers.values().rev();
        let bids = self.bids.values().rev();
        for level in offers.chain(bids) {
            let orders: Vec<Order> = level
                .queue
                .iter()
                .filter_map(|id| self.orders.get(id))
                .filter(|o| include_shadow || !o.is_shadow)
                .cloned()
                .collect();
            if !orders.is_empty() {
                levels.push(LevelSnapshot {
                    price: level.price,
                    side: level.side,
                    orders,
                });
            }
        }
        BookSnapshot {
            time: self.time,
            levels,
        }
    }
}

impl fmt::Display for MatchingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "time: {}", time_to_secs(self.time))?;
        for level in self.offers.values().rev().chain(self.bids.values().rev()) {
            write!(f, "<L: {} p: {}", level.side, level.price)?;
            for id in &level.queue {
                if let Some(o) = self.orders.get(id) {
                    write!(f, "(id:{},s:{},rs:{})", o.id, o.shown_size, o.remaining_size)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
