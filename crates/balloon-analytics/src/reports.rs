//! Report generation for one hour of fleet data.

use crate::clustering::{CandidateScore, CentroidClusterResult};
use crate::coverage::CoverageSummary;
use crate::density::DensitySummary;
use crate::engine::AnalysisEngine;
use crate::error::{AnalyticsError, Result};
use crate::stats::{AltitudeHistogram, AltitudeSummary, RegionalBreakdown, TrendPoint};
use balloon_domain::{ErrorHour, SnapshotSeries, SnapshotStatus};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// All four analyses of one hour, without map overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetReport {
    /// RFC 3339 generation time
    pub generated_at: String,
    /// Hour reported on
    pub hour_offset: u8,
    /// Hour bucket, `%Y-%m-%d %H:00:00`
    pub time_bucket: String,
    /// Upstream status of the hour
    pub status: SnapshotStatus,
    /// Altitude statistics
    pub altitude: AltitudeSection,
    /// Grid coverage
    pub coverage: CoverageSummary,
    /// Density clustering
    pub density: DensitySummary,
    /// Centroid clustering
    pub clusters: ClusterSection,
    /// Hours that failed upstream
    pub error_hours: Vec<ErrorHour>,
}

/// Altitude part of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeSection {
    /// Summary of the hour's valid altitudes
    pub summary: AltitudeSummary,
    /// Fixed-width altitude histogram
    pub histogram: AltitudeHistogram,
    /// Per-hemisphere means
    pub regional: RegionalBreakdown,
    /// Hourly trend across the series
    pub trend: Vec<TrendPoint>,
}

/// Centroid clustering part of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSection {
    /// Selected partition
    pub best: CentroidClusterResult,
    /// Score of every k tried
    pub candidates: Vec<CandidateScore>,
}

impl<R: Rng> AnalysisEngine<R> {
    /// Generate a report for snapshot `hour`. The current result is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::HourOutOfRange`] when the series has no
    /// snapshot at `hour`.
    pub fn generate_report(&mut self, series: &SnapshotSeries, hour: usize) -> Result<FleetReport> {
        let snapshot = series.get(hour).ok_or(AnalyticsError::HourOutOfRange {
            hour,
            available: series.len(),
        })?;

        let positions = snapshot.valid_positions();
        let altitude = self.altitude(series, snapshot, &positions);
        let coverage = Self::coverage(snapshot, &positions);
        let density = self.density(snapshot, &positions);
        let clusters = self.clusters(snapshot, &positions);

        tracing::debug!(hour, positions = positions.len(), "Generated fleet report");

        Ok(FleetReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            hour_offset: snapshot.hour_offset,
            time_bucket: snapshot.time_bucket(),
            status: snapshot.status,
            altitude: AltitudeSection {
                summary: altitude.summary,
                histogram: altitude.histogram,
                regional: altitude.regional,
                trend: altitude.trend,
            },
            coverage: coverage.summary,
            density: density.summary,
            clusters: ClusterSection {
                best: clusters.result,
                candidates: clusters.candidates,
            },
            error_hours: series.error_hours(),
        })
    }

    /// Generate report as JSON string.
    ///
    /// # Errors
    ///
    /// Fails on a bad `hour` or when serialization fails.
    pub fn generate_report_json(&mut self, series: &SnapshotSeries, hour: usize) -> Result<String> {
        self.generate_report(series, hour)?.to_json()
    }

    /// Generate Markdown report.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::HourOutOfRange`] for a bad `hour`.
    pub fn generate_report_markdown(
        &mut self,
        series: &SnapshotSeries,
        hour: usize,
    ) -> Result<String> {
        Ok(self.generate_report(series, hour)?.to_markdown())
    }
}

fn km_or_na(value: f64, present: bool) -> String {
    if present {
        format!("{value:.2} km")
    } else {
        "N/A".to_string()
    }
}

impl FleetReport {
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Serialization`] when serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render as a Markdown document
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("# Balloon Fleet Analytics Report\n\n");
        let _ = writeln!(md, "**Generated:** {}\n", self.generated_at);
        let _ = writeln!(
            md,
            "**Snapshot:** {} (hour -{}, status `{}`)\n",
            self.time_bucket,
            self.hour_offset,
            self.status.as_str()
        );

        let alt = &self.altitude.summary;
        let has_alt = alt.count > 0;
        md.push_str("## Altitude\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("|--------|-------|\n");
        let _ = writeln!(md, "| Balloons | {} |", alt.count);
        let _ = writeln!(md, "| Min | {} |", km_or_na(alt.min_km, has_alt));
        let _ = writeln!(md, "| Max | {} |", km_or_na(alt.max_km, has_alt));
        let _ = writeln!(md, "| Mean | {} |", km_or_na(alt.mean_km, has_alt));
        let _ = writeln!(md, "| Median | {} |", km_or_na(alt.median_km, has_alt));
        let _ = writeln!(md, "| Std Dev | {} |", km_or_na(alt.std_dev_km, has_alt));
        md.push('\n');

        if !self.altitude.histogram.bins.is_empty() {
            md.push_str("### Altitude Distribution\n\n");
            md.push_str("| Band | Balloons |\n");
            md.push_str("|------|----------|\n");
            for bin in &self.altitude.histogram.bins {
                let _ = writeln!(
                    md,
                    "| {:.1}-{:.1} km | {} |",
                    bin.lower_km, bin.upper_km, bin.count
                );
            }
            md.push('\n');
        }

        let regional = &self.altitude.regional;
        md.push_str("### Hemispheres\n\n");
        md.push_str("| Hemisphere | Balloons | Mean Altitude |\n");
        md.push_str("|------------|----------|---------------|\n");
        for (name, stats) in [
            ("Northern", regional.northern),
            ("Southern", regional.southern),
            ("Eastern", regional.eastern),
            ("Western", regional.western),
        ] {
            let _ = writeln!(
                md,
                "| {name} | {} | {} |",
                stats.count,
                km_or_na(stats.mean_altitude_km, stats.count > 0)
            );
        }
        md.push('\n');

        if !self.altitude.trend.is_empty() {
            md.push_str("### Hourly Trend\n\n");
            md.push_str("| Time | Balloons | Mean | Median |\n");
            md.push_str("|------|----------|------|--------|\n");
            for point in &self.altitude.trend {
                let _ = writeln!(
                    md,
                    "| {} | {} | {:.2} km | {:.2} km |",
                    point.time_bucket, point.count, point.mean_altitude_km, point.median_altitude_km
                );
            }
            md.push('\n');
        }

        let cov = &self.coverage;
        md.push_str("## Coverage\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("|--------|-------|\n");
        let _ = writeln!(md, "| Area Coverage | {:.1}% |", cov.coverage_percent);
        let _ = writeln!(md, "| Covered Cells | {} / {} |", cov.covered_cells, cov.total_cells);
        let _ = writeln!(md, "| Gaps | {} |", cov.gap_count);
        let largest = cov.largest_gap.map_or_else(
            || "N/A".to_string(),
            |gap| format!("{:.0} km ({})", gap.distance_km, gap.region.as_str()),
        );
        let _ = writeln!(md, "| Largest Gap | {largest} |");
        md.push('\n');

        if !cov.uncovered_regions.is_empty() {
            let names: Vec<&str> = cov.uncovered_regions.iter().map(|r| r.as_str()).collect();
            let _ = writeln!(md, "**Uncovered regions:** {}\n", names.join(", "));
        }

        let density = &self.density;
        let has_pairs = density.pairwise.pair_count > 0;
        md.push_str("## Density\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("|--------|-------|\n");
        let _ = writeln!(
            md,
            "| Mean Pair Distance | {} |",
            km_or_na(density.pairwise.mean_distance_km, has_pairs)
        );
        let _ = writeln!(
            md,
            "| Pair Distance Std Dev | {} |",
            km_or_na(density.pairwise.std_dev_km, has_pairs)
        );
        let _ = writeln!(
            md,
            "| Mean Nearest Neighbour | {} |",
            km_or_na(density.pairwise.mean_nearest_neighbor_km, has_pairs)
        );
        let _ = writeln!(md, "| Clusters | {} |", density.clusters.len());
        let _ = writeln!(md, "| Isolated | {} |", density.noise_count);
        md.push('\n');

        if !density.clusters.is_empty() {
            md.push_str("| Cluster | Balloons | Centre | Radius | Mean Altitude |\n");
            md.push_str("|---------|----------|--------|--------|---------------|\n");
            for cluster in &density.clusters {
                let _ = writeln!(
                    md,
                    "| {} | {} | {:.2}, {:.2} | {:.0} km | {:.2} km |",
                    cluster.id,
                    cluster.size,
                    cluster.centroid.latitude,
                    cluster.centroid.longitude,
                    cluster.radius_km,
                    cluster.mean_altitude_km
                );
            }
            md.push('\n');
        }

        let best = &self.clusters.best;
        let clustered = best.k > 0;
        let na_or = |value: f64| {
            if clustered {
                format!("{value:.3}")
            } else {
                "N/A".to_string()
            }
        };
        md.push_str("## Centroid Clustering\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("|--------|-------|\n");
        let optimal_k = if clustered {
            best.k.to_string()
        } else {
            "N/A".to_string()
        };
        let _ = writeln!(md, "| Optimal k | {optimal_k} |");
        let _ = writeln!(md, "| Silhouette | {} |", na_or(best.silhouette));
        let _ = writeln!(md, "| Variance Explained | {} |", na_or(best.variance_explained));
        let _ = writeln!(md, "| Iterations | {} |", best.iterations);
        md.push('\n');

        if !self.clusters.candidates.is_empty() {
            md.push_str("| k | Silhouette | Inertia |\n");
            md.push_str("|---|------------|---------|\n");
            for candidate in &self.clusters.candidates {
                let _ = writeln!(
                    md,
                    "| {} | {:.3} | {:.0} |",
                    candidate.k, candidate.silhouette, candidate.inertia
                );
            }
            md.push('\n');
        }

        if !self.error_hours.is_empty() {
            md.push_str("## Data Errors\n\n");
            md.push_str("| Hour | Status | Message |\n");
            md.push_str("|------|--------|---------|\n");
            for hour in &self.error_hours {
                let _ = writeln!(
                    md,
                    "| -{} | {} | {} |",
                    hour.hour,
                    hour.status.as_str(),
                    hour.message.as_deref().unwrap_or("N/A")
                );
            }
            md.push('\n');
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use balloon_domain::{Position, Snapshot};
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn engine() -> AnalysisEngine<StdRng> {
        AnalysisEngine::with_rng(AnalyticsConfig::default(), StdRng::seed_from_u64(3)).unwrap()
    }

    fn series() -> SnapshotSeries {
        let ts = |h| Utc.with_ymd_and_hms(2024, 6, 1, h, 0, 0).unwrap();
        SnapshotSeries::new(vec![
            Snapshot::new(
                0,
                ts(12),
                vec![
                    Position::new(0.0, 0.0, 10.0),
                    Position::new(0.0, 0.0, 12.0),
                    Position::new(0.0, 0.0, 14.0),
                ],
            ),
            Snapshot::failed(1, ts(11), SnapshotStatus::FormatError, "unexpected token"),
        ])
        .unwrap()
    }

    #[test]
    fn test_report_sections() {
        let report = engine().generate_report(&series(), 0).unwrap();
        assert_eq!(report.altitude.summary.mean_km, 12.0);
        assert_eq!(report.coverage.covered_cells, 1);
        assert_eq!(report.clusters.best.k, 0);
        assert_eq!(report.error_hours.len(), 1);
        assert_eq!(report.error_hours[0].status, SnapshotStatus::FormatError);
    }

    #[test]
    fn test_report_leaves_current_untouched() {
        let mut engine = engine();
        engine.generate_report(&series(), 0).unwrap();
        assert!(engine.current().is_none());
    }

    #[test]
    fn test_markdown_generation() {
        let md = engine().generate_report_markdown(&series(), 0).unwrap();
        assert!(md.contains("# Balloon Fleet Analytics Report"));
        assert!(md.contains("| Mean | 12.00 km |"));
        assert!(md.contains("| Optimal k | N/A |"));
        assert!(md.contains("| -1 | format_error | unexpected token |"));
    }

    #[test]
    fn test_empty_hour_uses_placeholders() {
        let md = engine().generate_report_markdown(&series(), 1).unwrap();
        assert!(md.contains("| Balloons | 0 |"));
        assert!(md.contains("| Mean | N/A |"));
        assert!(md.contains("| Largest Gap | N/A |"));
        assert!(md.contains("| Mean Pair Distance | N/A |"));
    }

    #[test]
    fn test_json_round_trip() {
        let json = engine().generate_report_json(&series(), 0).unwrap();
        let parsed: FleetReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.hour_offset, 0);
        assert_eq!(parsed.time_bucket, "2024-06-01 12:00:00");
    }

    #[test]
    fn test_bad_hour() {
        assert!(matches!(
            engine().generate_report(&series(), 5),
            Err(AnalyticsError::HourOutOfRange { hour: 5, .. })
        ));
    }
}
