//! Orders with display size and shadow flag

use super::notify::{Notifier, NotifyMessage, OrderEvent};
use super::types::{ClientId, OrderId, Price, Side, Size, Time};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A limit order.
///
/// Only `shown_size` is visible and tradable at any moment; it is refilled
/// from `remaining_size` up to `show` each time it is exhausted. A shadow
/// order trades like a real one but never reduces a real counterparty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub creation_time: Time,
    pub client_id: ClientId,
    pub price: Price,
    pub total_size: Size,
    pub show: Size,
    pub remaining_size: Size,
    pub shown_size: Size,
    pub side: Side,
    pub is_shadow: bool,
}

impl Order {
    /// New order with nothing shown yet
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        creation_time: Time,
        client_id: ClientId,
        price: Price,
        size: Size,
        show: Size,
        side: Side,
        is_shadow: bool,
    ) -> Self {
        Self {
            id,
            creation_time,
            client_id,
            price,
            total_size: size,
            show,
            remaining_size: size,
            shown_size: 0,
            side,
            is_shadow,
        }
    }

    /// Whether a fill reduces this order, given the counterparty flag.
    ///
    /// | self   | other  | reduce |
    /// |--------|--------|--------|
    /// | real   | real   | yes    |
    /// | real   | shadow | no     |
    /// | shadow | any    | yes    |
    pub fn reduces_size(is_shadow: bool, other_is_shadow: bool) -> bool {
        is_shadow || !other_is_shadow
    }

    /// Show the next slice; emits `Ack` when anything becomes visible
    pub fn replenish<N: Notifier + ?Sized>(&mut self, time: Time, notifier: &mut N) -> Result<()> {
        if self.shown_size != 0 {
            return Err(Error::Protocol(format!(
                "order {} replenished while {} is still shown",
                self.id, self.shown_size
            )));
        }
        self.shown_size = self.show.min(self.remaining_size);
        if self.shown_size != 0 {
            notifier.notify(&OrderEvent::new(NotifyMessage::Ack, self, time, 0, 0))?;
        }
        Ok(())
    }

    /// Apply one side of a fill; emits `Trade` and, when the shown slice is
    /// used up, `End`
    pub fn traded<N: Notifier + ?Sized>(
        &mut self,
        size: Size,
        price: Price,
        time: Time,
        other_is_shadow: bool,
        notifier: &mut N,
    ) -> Result<()> {
        if Self::reduces_size(self.is_shadow, other_is_shadow) {
            if size > self.shown_size {
                return Err(Error::Protocol(format!(
                    "order {} filled {} with only {} shown",
                    self.id, size, self.shown_size
                )));
            }
            self.remaining_size -= size;
            self.shown_size -= size;
        }
        notifier.notify(&OrderEvent::new(NotifyMessage::Trade, self, time, size, price))?;
        if self.shown_size == 0 {
            notifier.notify(&OrderEvent::new(NotifyMessage::End, self, time, 0, 0))?;
        }
        Ok(())
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_size == 0
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<O: c: {} {} oid: {} p: {} show: {} ss: {} shad: {}>",
            self.creation_time as f64 * 1e-9,
            self.side,
            self.id,
            self.price,
            self.show,
            self.shown_size,
            self.is_shadow
        )
    }
}
