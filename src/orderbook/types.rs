//! Primitive order book types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Integer price in ticks
pub type Price = i32;
/// Order size in lots
pub type Size = u32;
/// Nanoseconds since the start of the session
pub type Time = i64;
pub type ClientId = u32;

pub const NANOS_PER_SEC: Time = 1_000_000_000;

/// Seconds to nanoseconds, rounded to the nearest nanosecond
pub fn secs_to_time(secs: f64) -> Time {
    (secs * NANOS_PER_SEC as f64).round() as Time
}

pub fn time_to_secs(time: Time) -> f64 {
    time as f64 / NANOS_PER_SEC as f64
}

/// Side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Offer,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Offer,
            Side::Offer => Side::Bid,
        }
    }

    /// Whether an order on this side at `price` trades against a resting
    /// order at `resting`
    pub fn crosses(self, price: Price, resting: Price) -> bool {
        match self {
            Side::Bid => price >= resting,
            Side::Offer => price <= resting,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Offer => write!(f, "ask"),
        }
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bid" | "buy" => Ok(Side::Bid),
            "ask" | "offer" | "sell" => Ok(Side::Offer),
            other => Err(Error::InvalidInput(format!("unknown side '{other}'"))),
        }
    }
}

/// Engine-assigned order identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl OrderId {
    pub fn next(self) -> OrderId {
        OrderId(self.0 + 1)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossing() {
        assert!(Side::Bid.crosses(101, 100));
        assert!(Side::Bid.crosses(100, 100));
        assert!(!Side::Bid.crosses(99, 100));
        assert!(Side::Offer.crosses(99, 100));
        assert!(!Side::Offer.crosses(101, 100));
    }

    #[test]
    fn test_side_parse_and_display() {
        assert_eq!("Ask".parse::<Side>().unwrap(), Side::Offer);
        assert_eq!("Bid".parse::<Side>().unwrap(), Side::Bid);
        assert!("mid".parse::<Side>().is_err());
        assert_eq!(Side::Offer.to_string(), "ask");
        assert_eq!(Side::Bid.opposite(), Side::Offer);
    }

    #[test]
    fn test_time_conversion() {
        assert_eq!(secs_to_time(1.5), 1_500_000_000);
        assert_eq!(time_to_secs(2_000_000_000), 2.0);
        assert_eq!(OrderId(255).to_string(), "0xff");
        assert_eq!(OrderId(1).next(), OrderId(2));
    }
}
