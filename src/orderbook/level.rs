//! FIFO queue of orders at one price

use super::order::Order;
use super::types::{OrderId, Price, Side, Size};
use std::collections::{HashMap, VecDeque};

/// Price level; orders are referenced by id and stored in the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub price: Price,
    pub side: Side,
    pub queue: VecDeque<OrderId>,
}

impl Level {
    pub fn new(price: Price, side: Side) -> Self {
        Self {
            price,
            side,
            queue: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn front(&self) -> Option<OrderId> {
        self.queue.front().copied()
    }

    /// Remove an order from anywhere in the queue
    pub fn remove(&mut self, id: OrderId) -> bool {
        match self.queue.iter().position(|o| *o == id) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Sum of shown sizes, shadow orders included
    pub fn total_shown(&self, orders: &HashMap<OrderId, Order>) -> Size {
        self.queue
            .iter()
            .filter_map(|id| orders.get(id))
            .map(|o| o.shown_size)
            .sum()
    }
}
