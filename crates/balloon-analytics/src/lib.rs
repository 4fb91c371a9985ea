//! # Balloon Analytics
//!
//! Analytics engine for hourly balloon fleet snapshots.
//!
//! ## Features
//!
//! - Altitude statistics, histograms and hourly trends
//! - Area-weighted coverage grid with gap sizes and macro-regions
//! - Pairwise distance statistics and fixed-radius density clustering
//! - Automatic-k centroid clustering scored by silhouette
//! - Convex hulls and map overlays for every result
//! - JSON and Markdown fleet reports

#![forbid(unsafe_code)]
#![warn(clippy::all, missing_docs)]

pub mod clustering;
pub mod config;
pub mod coverage;
pub mod density;
pub mod engine;
pub mod error;
pub mod hull;
pub mod overlay;
pub mod reports;
pub mod stats;

pub use config::AnalyticsConfig;
pub use engine::{AnalysisEngine, AnalysisKind, AnalysisResult};
pub use error::AnalyticsError;
pub use reports::FleetReport;
