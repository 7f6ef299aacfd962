//! Order book simulation
//!
//! - `walk`: mean-reverting reference price
//! - `client`: client types and per-client state
//! - `scheduler`: next action per client
//! - `handler`: client pool reacting to engine events
//! - `maker`: price makers quoting around the weighted mid
//! - `recorder`: periodic feature sampling
//! - `runner`: the event loop
//! - `replay`: recorded order logs through the same engine

pub mod client;
pub mod handler;
pub mod maker;
pub mod recorder;
pub mod replay;
pub mod runner;
pub mod scheduler;
pub mod walk;

pub use client::{Action, ClientState, ClientType, Placement};
pub use handler::ClientPool;
pub use maker::{MakerCommand, MakerDesk, MarketState, PriceMaker};
pub use recorder::FeatureRecorder;
pub use replay::{
    decode_order_id, load_records, read_records, replay, ReplayKind, ReplayRecord, ReplaySummary,
    Replayer,
};
pub use runner::{Simulation, SimulationSummary};
pub use scheduler::Scheduler;
pub use walk::{BifurcatingMeanReversion, MeanReversion, RandomWalk, WalkStep};
