//! Limit order book
//!
//! - `types`: prices, sizes, sides, ids and time
//! - `order`: iceberg and shadow order accounting
//! - `level`: FIFO queue per price
//! - `notify`: lifecycle events and their receivers
//! - `engine`: price-time matching

pub mod engine;
pub mod level;
pub mod notify;
pub mod order;
pub mod types;

pub use engine::{BookSnapshot, Level2, LevelSnapshot, MatchingEngine};
pub use level::Level;
pub use notify::{NoopNotifier, Notifier, NotifyMessage, OrderEvent, RecordingNotifier};
pub use order::Order;
pub use types::{
    secs_to_time, time_to_secs, ClientId, OrderId, Price, Side, Size, Time, NANOS_PER_SEC,
};
