//! Order lifecycle notifications

use super::order::Order;
use super::types::{ClientId, OrderId, Price, Side, Size, Time};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Kind of order event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotifyMessage {
    /// Order (or a replenished slice of it) became visible in the book
    Ack,
    Trade,
    Cancel,
    /// Shown size reached zero, or the order left the book
    End,
}

impl fmt::Display for NotifyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotifyMessage::Ack => "Ack",
            NotifyMessage::Trade => "Trade",
            NotifyMessage::Cancel => "Cancel",
            NotifyMessage::End => "End",
        };
        f.write_str(s)
    }
}

/// Snapshot of an order at the moment of an event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub kind: NotifyMessage,
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub price: Price,
    pub side: Side,
    pub shown_size: Size,
    pub remaining_size: Size,
    pub is_shadow: bool,
    pub time: Time,
    /// Zero unless `kind` is `Trade`
    pub traded_size: Size,
    pub traded_price: Price,
}

impl OrderEvent {
    pub fn new(kind: NotifyMessage, order: &Order, time: Time, traded_size: Size, traded_price: Price) -> Self {
        Self {
            kind,
            order_id: order.id,
            client_id: order.client_id,
            price: order.price,
            side: order.side,
            shown_size: order.shown_size,
            remaining_size: order.remaining_size,
            is_shadow: order.is_shadow,
            time,
            traded_size,
            traded_price,
        }
    }
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self.kind {
            NotifyMessage::Ack => 'N',
            NotifyMessage::Trade => 'T',
            NotifyMessage::Cancel => 'C',
            NotifyMessage::End => 'D',
        };
        write!(
            f,
            "{:.6}s:{}:{}:{}:{}:{}:{}",
            self.time as f64 * 1e-9,
            code,
            self.order_id,
            self.price,
            self.shown_size,
            self.traded_size,
            self.traded_price
        )
    }
}

/// Receiver of engine events
pub trait Notifier {
    fn notify(&mut self, event: &OrderEvent) -> Result<()>;
}

impl<N: Notifier + ?Sized> Notifier for &mut N {
    fn notify(&mut self, event: &OrderEvent) -> Result<()> {
        (**self).notify(event)
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&mut self, _event: &OrderEvent) -> Result<()> {
        Ok(())
    }
}

/// Keeps every event in order of arrival
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub events: Vec<OrderEvent>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(&self) -> Vec<NotifyMessage> {
        self.events.iter().map(|e| e.kind).collect()
    }

    /// Traded size per client and price
    pub fn fills_by_client(&self) -> HashMap<ClientId, BTreeMap<Price, Size>> {
        let mut fills: HashMap<ClientId, BTreeMap<Price, Size>> = HashMap::new();
        for e in self.events.iter().filter(|e| e.kind == NotifyMessage::Trade) {
            *fills
                .entry(e.client_id)
                .or_default()
                .entry(e.traded_price)
                .or_default() += e.traded_size;
        }
        fills
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, event: &OrderEvent) -> Result<()> {
        self.events.push(*event);
        Ok(())
    }
}
