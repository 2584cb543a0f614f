//! arena-core: deterministic tick-based arena simulation.
//!
//! A maze grid, precomputed line-of-sight, diffusing beacons and a
//! line-oriented JSON protocol to external bot processes.

pub mod beacon;
pub mod cache;
pub mod channel;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod fov;
pub mod grid;
pub mod maze;
pub mod protocol;
pub mod rng;
pub mod state;
pub mod stats;
pub mod types;
pub mod visibility;
