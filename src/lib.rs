// SPDX-License-Identifier: Apache-2.0

//! Discrete-event core of an energy-harvesting wireless sensor network
//! simulator: a min-heap scheduler, a lossy broadcast medium, a
//! harvest/discharge energy model, and a neighbor-discovery / pairwise
//! clock-synchronization protocol running on top of them.
//!
//! `Simulation` is the single entry point a caller needs: build a
//! `SimConfig`, call `Simulation::new`, then either drive it event-by-event
//! with `run_to` or let `run` walk the whole configured calendar and report
//! one `CheckpointRow` per day.

pub mod base_types;
pub mod clock;
pub mod config;
pub mod energy;
pub mod error;
pub mod kpi;
pub mod medium;
pub mod neighbor;
pub mod node;
pub mod packet;
pub mod scheduler;
pub mod simulation;

pub use base_types::{DurationMs, Joules, Millis, NodeId};
pub use config::SimConfig;
pub use error::SimError;
pub use simulation::{CheckpointRow, NeighborSummary, NodeSnapshot, Simulation};
