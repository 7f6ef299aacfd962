//! Queue of upcoming client actions ordered by `(time, client_id)`

use crate::orderbook::{ClientId, Time};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BTreeSet<(Time, ClientId)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Move a client from `old` (if scheduled) to `new` (if any)
    pub fn reschedule(&mut self, client_id: ClientId, old: Option<Time>, new: Option<Time>) {
        if let Some(t) = old {
            self.queue.remove(&(t, client_id));
        }
        if let Some(t) = new {
            self.queue.insert((t, client_id));
        }
    }

    pub fn peek(&self) -> Option<(Time, ClientId)> {
        self.queue.first().copied()
    }

    pub fn pop(&mut self) -> Option<(Time, ClientId)> {
        self.queue.pop_first()
    }
}
