//! # Balloon Simulator
//!
//! Synthetic snapshot series for exercising the balloon analytics engine.
//!
//! ## Features
//!
//! - Swarm-based fleet release with Gaussian scatter
//! - Hourly drift along jittered headings
//! - Altitude random walk
//! - Failed and partially corrupted hours

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod fleet;

pub use fleet::{Balloon, FleetConfig, FleetSimulator};
