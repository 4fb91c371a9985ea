//! # Analytics Configuration
//!
//! Tunable parameters for every analysis, with environment overrides.

use crate::error::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Smallest accepted histogram bin width (one metre).
pub const MIN_HISTOGRAM_BIN_WIDTH_KM: f64 = 0.001;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Altitude histogram bin width
    pub histogram_bin_width_km: f64,

    /// Fixed-radius density clustering
    pub density: DensityConfig,

    /// Automatic-k centroid clustering
    pub clustering: ClusteringConfig,

    /// Seed for centroid seeding; `None` draws from OS entropy
    pub seed: Option<u64>,
}

/// Density clustering parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityConfig {
    /// Neighbourhood radius
    pub epsilon_km: f64,
    /// Minimum cluster population including the seed point itself.
    pub min_neighbors: usize,
}

/// Centroid clustering parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Upper bound of the candidate k range
    pub max_k: usize,
    /// The candidate range stops at `floor(N / points_per_k)`
    pub points_per_k: usize,
    /// Cap on refinement iterations per k
    pub max_iterations: usize,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            epsilon_km: 500.0,
            min_neighbors: 3,
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            max_k: 20,
            points_per_k: 10,
            max_iterations: 100,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            histogram_bin_width_km: 2.0,
            density: DensityConfig::default(),
            clustering: ClusteringConfig::default(),
            seed: None,
        }
    }
}

impl AnalyticsConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Unparseable values are ignored.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());
        let parsed_usize = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());

        Self {
            histogram_bin_width_km: parsed("BALLOON_HISTOGRAM_BIN_KM")
                .unwrap_or(defaults.histogram_bin_width_km),

            density: DensityConfig {
                epsilon_km: parsed("BALLOON_DENSITY_EPSILON_KM")
                    .unwrap_or(defaults.density.epsilon_km),
                min_neighbors: parsed_usize("BALLOON_DENSITY_MIN_NEIGHBORS")
                    .unwrap_or(defaults.density.min_neighbors),
            },

            clustering: ClusteringConfig {
                max_k: parsed_usize("BALLOON_CLUSTER_MAX_K").unwrap_or(defaults.clustering.max_k),
                points_per_k: parsed_usize("BALLOON_CLUSTER_POINTS_PER_K")
                    .unwrap_or(defaults.clustering.points_per_k),
                max_iterations: parsed_usize("BALLOON_CLUSTER_MAX_ITERATIONS")
                    .unwrap_or(defaults.clustering.max_iterations),
            },

            seed: lookup("BALLOON_SEED").and_then(|v| v.trim().parse().ok()),
        }
    }

    /// Reject parameters no analysis can run with.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::InvalidParameter`] naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        if !(self.histogram_bin_width_km.is_finite()
            && self.histogram_bin_width_km >= MIN_HISTOGRAM_BIN_WIDTH_KM)
        {
            return Err(AnalyticsError::InvalidParameter(format!(
                "histogram bin width must be at least {MIN_HISTOGRAM_BIN_WIDTH_KM} km, got {}",
                self.histogram_bin_width_km
            )));
        }
        if !(self.density.epsilon_km.is_finite() && self.density.epsilon_km > 0.0) {
            return Err(AnalyticsError::InvalidParameter(format!(
                "density epsilon must be positive, got {}",
                self.density.epsilon_km
            )));
        }
        if self.density.min_neighbors == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "density min_neighbors must be at least 1".to_string(),
            ));
        }
        if self.clustering.points_per_k == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "clustering points_per_k must be at least 1".to_string(),
            ));
        }
        if self.clustering.max_iterations == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "clustering max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
