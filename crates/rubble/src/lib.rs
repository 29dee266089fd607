//! # RUBBLE
//!
//! The driver crate. Steps a [`DestructibleWorld`] frame by frame: queued
//! impacts are applied, debris ages, and destruction events are drained for
//! whoever renders or plays sounds.
//!
//! ```text
//! queue_impact ─> DemolitionLoop::step ─┬─> DestructibleWorld::take_damage_probed
//!                                       ├─> DestructibleWorld::tick
//!                                       └─> EventReceiver::drain ─> FrameStats
//! ```
//!
//! ## Modules
//!
//! - `game_loop`: frame orchestration and timing

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod game_loop;

// Re-export the engine
pub use rubble_core as core;
pub use rubble_destruction as destruction;

pub use game_loop::{DemolitionLoop, FrameStats, FrameStatsAccumulator, LoopConfig, QueuedImpact};
