//! Analysis engine: the context object every analysis request goes through.

use crate::clustering::{CandidateScore, CentroidClusterResult, auto_cluster};
use crate::config::AnalyticsConfig;
use crate::coverage::{CoverageSummary, analyze_coverage};
use crate::density::{DensityAnalyzer, DensitySummary};
use crate::error::{AnalyticsError, Result};
use crate::overlay::{NEUTRAL_COLOR, Overlay, OverlayStyle, altitude_color, cluster_color};
use crate::stats::{
    AltitudeHistogram, AltitudeSummary, RegionalBreakdown, TrendPoint, altitude_histogram,
    altitude_summary, hemisphere_breakdown, temporal_trend,
};
use balloon_domain::{Position, Position2D, Snapshot, SnapshotSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const COVERED_CELL_COLOR: &str = "#3cb44b";
const GAP_COLOR: &str = "#e6194b";

/// Analysis to run for one hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Altitude distribution and trend
    Altitude,
    /// Grid coverage and gaps
    Coverage,
    /// Fixed-radius density clustering
    Density,
    /// Automatic-k centroid clustering
    Clusters,
}

impl AnalysisKind {
    /// Every kind, in report order
    pub const ALL: [Self; 4] = [Self::Altitude, Self::Coverage, Self::Density, Self::Clusters];

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Altitude => "altitude",
            Self::Coverage => "coverage",
            Self::Density => "density",
            Self::Clusters => "clusters",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Altitude distribution of one hour plus the trend across the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeAnalysis {
    /// Hours before the most recent snapshot
    pub hour_offset: u8,
    /// Hour bucket, `%Y-%m-%d %H:00:00`
    pub time_bucket: String,
    /// Summary of the hour's valid altitudes
    pub summary: AltitudeSummary,
    /// Fixed-width altitude histogram
    pub histogram: AltitudeHistogram,
    /// Per-hemisphere means
    pub regional: RegionalBreakdown,
    /// Mean and median altitude per usable hour
    pub trend: Vec<TrendPoint>,
    /// One marker per balloon
    pub overlays: Vec<Overlay>,
}

/// Grid coverage of one hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageAnalysis {
    /// Hours before the most recent snapshot
    pub hour_offset: u8,
    /// Hour bucket, `%Y-%m-%d %H:00:00`
    pub time_bucket: String,
    /// Coverage percent, gaps and regions
    pub summary: CoverageSummary,
    /// Covered cells plus the largest gap
    pub overlays: Vec<Overlay>,
}

/// Density clustering of one hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityAnalysis {
    /// Hours before the most recent snapshot
    pub hour_offset: u8,
    /// Hour bucket, `%Y-%m-%d %H:00:00`
    pub time_bucket: String,
    /// Pair statistics and clusters
    pub summary: DensitySummary,
    /// Cluster circles and hulls plus noise markers
    pub overlays: Vec<Overlay>,
}

/// Selected centroid partition with the per-k scores that led to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAnalysis {
    /// Hours before the most recent snapshot
    pub hour_offset: u8,
    /// Hour bucket, `%Y-%m-%d %H:00:00`
    pub time_bucket: String,
    /// Valid positions clustered
    pub point_count: usize,
    /// Selected partition
    pub result: CentroidClusterResult,
    /// Score of every k tried
    pub candidates: Vec<CandidateScore>,
    /// Cluster hulls and centroid markers
    pub overlays: Vec<Overlay>,
}

/// Result of one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisResult {
    /// See [`AltitudeAnalysis`]
    Altitude(AltitudeAnalysis),
    /// See [`CoverageAnalysis`]
    Coverage(CoverageAnalysis),
    /// See [`DensityAnalysis`]
    Density(DensityAnalysis),
    /// See [`ClusterAnalysis`]
    Clusters(ClusterAnalysis),
}

impl AnalysisResult {
    /// Which analysis produced the result
    pub fn kind(&self) -> AnalysisKind {
        match self {
            Self::Altitude(_) => AnalysisKind::Altitude,
            Self::Coverage(_) => AnalysisKind::Coverage,
            Self::Density(_) => AnalysisKind::Density,
            Self::Clusters(_) => AnalysisKind::Clusters,
        }
    }

    /// Hour the result describes
    pub fn hour_offset(&self) -> u8 {
        match self {
            Self::Altitude(a) => a.hour_offset,
            Self::Coverage(c) => c.hour_offset,
            Self::Density(d) => d.hour_offset,
            Self::Clusters(c) => c.hour_offset,
        }
    }

    /// Map geometry attached to the result
    pub fn overlays(&self) -> &[Overlay] {
        match self {
            Self::Altitude(a) => &a.overlays,
            Self::Coverage(c) => &c.overlays,
            Self::Density(d) => &d.overlays,
            Self::Clusters(c) => &c.overlays,
        }
    }
}

/// Owns the configuration, the random source used for centroid seeding and
/// the currently displayed result. Each request replaces that result.
pub struct AnalysisEngine<R: Rng = StdRng> {
    config: AnalyticsConfig,
    rng: R,
    current: Option<AnalysisResult>,
}

impl AnalysisEngine<StdRng> {
    /// Create an engine seeded from `config.seed`, or from OS entropy when
    /// no seed is set.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::InvalidParameter`] for an invalid config.
    pub fn new(config: AnalyticsConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> AnalysisEngine<R> {
    /// Create an engine with an injected random source.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::InvalidParameter`] for an invalid config.
    pub fn with_rng(config: AnalyticsConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            current: None,
        })
    }

    /// Validated configuration
    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Result of the most recent request.
    pub fn current(&self) -> Option<&AnalysisResult> {
        self.current.as_ref()
    }

    /// Drop the current result.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Run `kind` over snapshot `hour` (0 = most recent) and make it the
    /// current result.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::HourOutOfRange`] when the series has no
    /// snapshot at `hour`.
    pub fn analyze(
        &mut self,
        series: &SnapshotSeries,
        hour: usize,
        kind: AnalysisKind,
    ) -> Result<&AnalysisResult> {
        let result = self.compute(series, hour, kind)?;
        Ok(self.current.insert(result))
    }

    /// Run `kind` without touching the current result.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::HourOutOfRange`] when the series has no
    /// snapshot at `hour`.
    pub fn compute(
        &mut self,
        series: &SnapshotSeries,
        hour: usize,
        kind: AnalysisKind,
    ) -> Result<AnalysisResult> {
        let snapshot = series.get(hour).ok_or(AnalyticsError::HourOutOfRange {
            hour,
            available: series.len(),
        })?;
        let positions = snapshot.valid_positions();

        tracing::debug!(
            hour,
            kind = kind.as_str(),
            status = snapshot.status.as_str(),
            positions = positions.len(),
            "Running analysis"
        );

        Ok(match kind {
            AnalysisKind::Altitude => {
                AnalysisResult::Altitude(self.altitude(series, snapshot, &positions))
            }
            AnalysisKind::Coverage => AnalysisResult::Coverage(Self::coverage(snapshot, &positions)),
            AnalysisKind::Density => AnalysisResult::Density(self.density(snapshot, &positions)),
            AnalysisKind::Clusters => AnalysisResult::Clusters(self.clusters(snapshot, &positions)),
        })
    }

    pub(crate) fn altitude(
        &self,
        series: &SnapshotSeries,
        snapshot: &Snapshot,
        positions: &[Position],
    ) -> AltitudeAnalysis {
        let summary = altitude_summary(positions);
        let overlays = positions
            .iter()
            .map(|p| {
                let color = altitude_color(p.altitude_km, summary.min_km, summary.max_km)
                    .unwrap_or_else(|| NEUTRAL_COLOR.to_string());
                Overlay::Marker {
                    position: p.to_2d(),
                    style: OverlayStyle::new(color, 0.8)
                        .with_label(format!("{:.2} km", p.altitude_km)),
                }
            })
            .collect();

        AltitudeAnalysis {
            hour_offset: snapshot.hour_offset,
            time_bucket: snapshot.time_bucket(),
            summary,
            histogram: altitude_histogram(positions, self.config.histogram_bin_width_km),
            regional: hemisphere_breakdown(positions),
            trend: temporal_trend(series),
            overlays,
        }
    }

    pub(crate) fn coverage(snapshot: &Snapshot, positions: &[Position]) -> CoverageAnalysis {
        let (grid, summary) = analyze_coverage(positions);

        let mut overlays: Vec<Overlay> = grid
            .cells()
            .iter()
            .filter(|cell| cell.covered)
            .map(|cell| {
                Overlay::cell(
                    cell.lat_min,
                    cell.lat_max,
                    cell.lng_min,
                    cell.lng_max,
                    OverlayStyle::new(COVERED_CELL_COLOR, 0.25)
                        .with_label(format!("{} balloons", cell.occupant_count)),
                )
            })
            .collect();

        if let Some(gap) = summary.largest_gap {
            overlays.push(Overlay::Circle {
                center: gap.center,
                radius_km: gap.distance_km,
                style: OverlayStyle::new(GAP_COLOR, 0.1).with_label(format!(
                    "Largest gap: {:.0} km ({})",
                    gap.distance_km,
                    gap.region.as_str()
                )),
            });
        }

        CoverageAnalysis {
            hour_offset: snapshot.hour_offset,
            time_bucket: snapshot.time_bucket(),
            summary,
            overlays,
        }
    }

    pub(crate) fn density(&self, snapshot: &Snapshot, positions: &[Position]) -> DensityAnalysis {
        let summary = DensityAnalyzer::new(self.config.density).analyze(positions);

        let mut overlays = Vec::new();
        for cluster in &summary.clusters {
            let color = cluster_color(cluster.id);
            overlays.push(Overlay::Circle {
                center: cluster.centroid,
                radius_km: cluster.radius_km,
                style: OverlayStyle::new(color, 0.15)
                    .with_label(format!("Cluster {} ({} balloons)", cluster.id, cluster.size)),
            });

            let members: Vec<Position2D> = summary
                .clustering
                .members(cluster.id)
                .map(|i| positions[i].to_2d())
                .collect();
            overlays.extend(Overlay::hull(&members, OverlayStyle::new(color, 0.3)));
        }

        overlays.extend(
            summary
                .clustering
                .assignments
                .iter()
                .zip(positions)
                .filter(|(assignment, _)| assignment.is_none())
                .map(|(_, p)| Overlay::Marker {
                    position: p.to_2d(),
                    style: OverlayStyle::new(NEUTRAL_COLOR, 0.5),
                }),
        );

        DensityAnalysis {
            hour_offset: snapshot.hour_offset,
            time_bucket: snapshot.time_bucket(),
            summary,
            overlays,
        }
    }

    pub(crate) fn clusters(&mut self, snapshot: &Snapshot, positions: &[Position]) -> ClusterAnalysis {
        let points: Vec<Position2D> = positions.iter().map(Position::to_2d).collect();
        let outcome = auto_cluster(&points, &self.config.clustering, &mut self.rng);

        let mut overlays = Vec::new();
        let sizes = outcome.best.cluster_sizes();
        for (id, centroid) in outcome.best.centroids.iter().enumerate() {
            let color = cluster_color(id);
            let members: Vec<Position2D> = points
                .iter()
                .zip(&outcome.best.assignments)
                .filter(|&(_, &a)| a == id)
                .map(|(p, _)| *p)
                .collect();
            overlays.extend(Overlay::hull(&members, OverlayStyle::new(color, 0.3)));
            overlays.push(Overlay::Marker {
                position: *centroid,
                style: OverlayStyle::new(color, 1.0)
                    .with_label(format!("Centroid {id} ({} balloons)", sizes[id])),
            });
        }

        ClusterAnalysis {
            hour_offset: snapshot.hour_offset,
            time_bucket: snapshot.time_bucket(),
            point_count: points.len(),
            result: outcome.best,
            candidates: outcome.candidates,
            overlays,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use balloon_domain::SnapshotStatus;
    use chrono::{TimeZone, Utc};

    fn ts(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    /// Three tight swarms of ten balloons each.
    fn swarm_positions() -> Vec<Position> {
        let centers = [(10.0, 20.0), (-30.0, 120.0), (45.0, -90.0)];
        centers
            .iter()
            .flat_map(|&(lat, lng)| {
                (0..10_i32).map(move |i| {
                    Position::new(
                        lat + f64::from(i % 3) * 0.1,
                        lng + f64::from(i / 3) * 0.1,
                        10.0 + f64::from(i),
                    )
                })
            })
            .collect()
    }

    fn series() -> SnapshotSeries {
        SnapshotSeries::new(vec![
            Snapshot::new(0, ts(12), swarm_positions()),
            Snapshot::failed(1, ts(11), SnapshotStatus::NotFound, "404"),
            Snapshot::new(2, ts(10), vec![Position::new(0.0, 0.0, 12.0)]),
        ])
        .unwrap()
    }

    fn engine() -> AnalysisEngine<StdRng> {
        AnalysisEngine::with_rng(AnalyticsConfig::default(), StdRng::seed_from_u64(5)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = AnalyticsConfig::default();
        config.density.min_neighbors = 0;
        assert!(AnalysisEngine::new(config).is_err());
    }

    #[test]
    fn test_hour_out_of_range() {
        let mut engine = engine();
        let err = engine
            .analyze(&series(), 7, AnalysisKind::Altitude)
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::HourOutOfRange {
                hour: 7,
                available: 3
            }
        ));
        assert!(engine.current().is_none());
    }

    #[test]
    fn test_altitude_analysis() {
        let mut engine = engine();
        let result = engine.analyze(&series(), 0, AnalysisKind::Altitude).unwrap();
        let AnalysisResult::Altitude(altitude) = result else {
            panic!("expected altitude result");
        };
        assert_eq!(altitude.summary.count, 30);
        assert_eq!(altitude.summary.min_km, 10.0);
        assert_eq!(altitude.summary.max_km, 19.0);
        assert_eq!(altitude.overlays.len(), 30);
        // Hours 2 and 0 are usable, oldest first.
        assert_eq!(
            altitude.trend.iter().map(|t| t.hour_offset).collect::<Vec<_>>(),
            vec![2, 0]
        );
    }

    #[test]
    fn test_failed_hour_yields_zeroed_results() {
        let mut engine = engine();
        let series = series();
        for kind in AnalysisKind::ALL {
            let result = engine.analyze(&series, 1, kind).unwrap();
            assert_eq!(result.kind(), kind);
            assert_eq!(result.hour_offset(), 1);
        }

        let Some(AnalysisResult::Clusters(clusters)) = engine.current() else {
            panic!("expected cluster result");
        };
        assert_eq!(clusters.point_count, 0);
        assert_eq!(clusters.result.k, 0);
        assert!(clusters.overlays.is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let mut engine = engine();
        let series = series();
        engine.analyze(&series, 0, AnalysisKind::Coverage).unwrap();
        engine.analyze(&series, 2, AnalysisKind::Density).unwrap();

        let current = engine.current().unwrap();
        assert_eq!(current.kind(), AnalysisKind::Density);
        assert_eq!(current.hour_offset(), 2);

        engine.clear();
        assert!(engine.current().is_none());
    }

    #[test]
    fn test_coverage_overlays() {
        let mut engine = engine();
        let result = engine.analyze(&series(), 0, AnalysisKind::Coverage).unwrap();
        let AnalysisResult::Coverage(coverage) = result else {
            panic!("expected coverage result");
        };
        assert_eq!(coverage.summary.covered_cells, 3);
        assert!(coverage.summary.largest_gap.is_some());
        // One rectangle per covered cell plus the largest-gap circle.
        assert_eq!(coverage.overlays.len(), 4);
    }

    #[test]
    fn test_density_finds_swarms() {
        let mut engine = engine();
        let result = engine.analyze(&series(), 0, AnalysisKind::Density).unwrap();
        let AnalysisResult::Density(density) = result else {
            panic!("expected density result");
        };
        assert_eq!(density.summary.clusters.len(), 3);
        assert_eq!(density.summary.noise_count, 0);
        assert!(
            density
                .overlays
                .iter()
                .any(|o| matches!(o, Overlay::Polygon { .. }))
        );
    }

    #[test]
    fn test_cluster_analysis_selects_three() {
        let mut engine = engine();
        let result = engine.analyze(&series(), 0, AnalysisKind::Clusters).unwrap();
        let AnalysisResult::Clusters(clusters) = result else {
            panic!("expected cluster result");
        };
        assert_eq!(clusters.point_count, 30);
        assert_eq!(clusters.result.k, 3);
        assert_eq!(clusters.candidates.len(), 2);
        assert!(clusters.result.silhouette > 0.9);
    }

    #[test]
    fn test_seeded_engines_agree() {
        let mut config = AnalyticsConfig::default();
        config.seed = Some(17);
        let series = series();

        let mut a = AnalysisEngine::new(config.clone()).unwrap();
        let mut b = AnalysisEngine::new(config).unwrap();
        let ra = a.analyze(&series, 0, AnalysisKind::Clusters).unwrap().clone();
        let rb = b.analyze(&series, 0, AnalysisKind::Clusters).unwrap().clone();
        assert_eq!(ra, rb);
    }

    #[test]
    fn test_result_serializes_with_kind_tag() {
        let mut engine = engine();
        let result = engine.analyze(&series(), 2, AnalysisKind::Altitude).unwrap();
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["kind"], "altitude");
        assert_eq!(json["time_bucket"], "2024-06-01 10:00:00");
    }
}
