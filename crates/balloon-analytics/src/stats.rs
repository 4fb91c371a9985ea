//! Descriptive altitude statistics: summaries, histograms, hemisphere
//! breakdowns and the hourly trend across a snapshot series.

use balloon_domain::{Position, SnapshotSeries};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Altitude summary for one set of positions. All zero when empty.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AltitudeSummary {
    /// Number of altitudes
    pub count: usize,
    /// Lowest altitude
    pub min_km: f64,
    /// Highest altitude
    pub max_km: f64,
    /// Mean altitude
    pub mean_km: f64,
    /// Median altitude
    pub median_km: f64,
    /// Population standard deviation
    pub std_dev_km: f64,
}

/// One histogram bin covering `[lower_km, upper_km)`; the last bin also
/// includes its upper edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    /// Inclusive lower edge
    pub lower_km: f64,
    /// Upper edge
    pub upper_km: f64,
    /// Altitudes in the bin
    pub count: usize,
}

/// Fixed-width altitude histogram.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AltitudeHistogram {
    /// Width actually used
    pub bin_width_km: f64,
    /// Bins from lowest to highest
    pub bins: Vec<HistogramBin>,
}

/// Position count and mean altitude of one hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HemisphereStats {
    /// Positions in the hemisphere
    pub count: usize,
    /// Mean altitude, zero when empty
    pub mean_altitude_km: f64,
}

/// North/south split on latitude sign, east/west split on longitude sign.
/// Zero lies in the southern and western partitions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionalBreakdown {
    /// Latitude above zero
    pub northern: HemisphereStats,
    /// Latitude zero or below
    pub southern: HemisphereStats,
    /// Longitude above zero
    pub eastern: HemisphereStats,
    /// Longitude zero or below
    pub western: HemisphereStats,
}

/// Altitude statistics for one usable hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Hours before the most recent snapshot
    pub hour_offset: u8,
    /// Hour bucket, `%Y-%m-%d %H:00:00`
    pub time_bucket: String,
    /// Valid positions in the hour
    pub count: usize,
    /// Mean altitude
    pub mean_altitude_km: f64,
    /// Median altitude
    pub median_altitude_km: f64,
}

/// Median by sort-and-midpoint. `0.0` for an empty slice.
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Arithmetic mean, `0.0` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        Statistics::mean(values)
    }
}

fn altitudes(positions: &[Position]) -> Vec<f64> {
    positions.iter().map(|p| p.altitude_km).collect()
}

/// Min, max, mean, median and population standard deviation of altitude.
#[must_use]
pub fn altitude_summary(positions: &[Position]) -> AltitudeSummary {
    let values = altitudes(positions);
    if values.is_empty() {
        return AltitudeSummary::default();
    }

    let values = values.as_slice();
    AltitudeSummary {
        count: values.len(),
        min_km: Statistics::min(values),
        max_km: Statistics::max(values),
        mean_km: Statistics::mean(values),
        median_km: median(values),
        std_dev_km: Statistics::population_std_dev(values),
    }
}

/// Upper bound on histogram bins; narrower requested widths are widened.
pub const MAX_HISTOGRAM_BINS: usize = 10_000;

/// Histogram of altitudes with `ceil((max - min) / bin_width)` bins (at least
/// one, at most [`MAX_HISTOGRAM_BINS`]). Empty input or a non-positive width
/// yields no bins.
#[must_use]
pub fn altitude_histogram(positions: &[Position], bin_width_km: f64) -> AltitudeHistogram {
    if positions.is_empty() || !(bin_width_km.is_finite() && bin_width_km > 0.0) {
        return AltitudeHistogram {
            bin_width_km,
            bins: Vec::new(),
        };
    }

    let summary = altitude_summary(positions);
    let span = summary.max_km - summary.min_km;
    let bin_width_km = bin_width_km.max(span / MAX_HISTOGRAM_BINS as f64);
    let bin_count = ((span / bin_width_km).ceil() as usize).clamp(1, MAX_HISTOGRAM_BINS);

    let mut bins: Vec<HistogramBin> = (0..bin_count)
        .map(|i| {
            let lower_km = summary.min_km + i as f64 * bin_width_km;
            HistogramBin {
                lower_km,
                upper_km: lower_km + bin_width_km,
                count: 0,
            }
        })
        .collect();

    for p in positions {
        let index = ((p.altitude_km - summary.min_km) / bin_width_km).floor() as usize;
        bins[index.min(bin_count - 1)].count += 1;
    }

    AltitudeHistogram { bin_width_km, bins }
}

fn hemisphere<'a>(positions: impl Iterator<Item = &'a Position>) -> HemisphereStats {
    let values: Vec<f64> = positions.map(|p| p.altitude_km).collect();
    HemisphereStats {
        count: values.len(),
        mean_altitude_km: mean(&values),
    }
}

/// Mean altitude per hemisphere.
#[must_use]
pub fn hemisphere_breakdown(positions: &[Position]) -> RegionalBreakdown {
    RegionalBreakdown {
        northern: hemisphere(positions.iter().filter(|p| p.latitude > 0.0)),
        southern: hemisphere(positions.iter().filter(|p| p.latitude <= 0.0)),
        eastern: hemisphere(positions.iter().filter(|p| p.longitude > 0.0)),
        western: hemisphere(positions.iter().filter(|p| p.longitude <= 0.0)),
    }
}

/// Hourly mean/median altitude over the usable snapshots of a series, oldest
/// hour first. Hours without usable positions are skipped.
#[must_use]
pub fn temporal_trend(series: &SnapshotSeries) -> Vec<TrendPoint> {
    series
        .iter()
        .rev()
        .filter_map(|snapshot| {
            let positions = snapshot.valid_positions();
            if positions.is_empty() {
                tracing::debug!(
                    hour = snapshot.hour_offset,
                    status = snapshot.status.as_str(),
                    "Skipping hour without usable positions"
                );
                return None;
            }
            let values = altitudes(&positions);
            Some(TrendPoint {
                hour_offset: snapshot.hour_offset,
                time_bucket: snapshot.time_bucket(),
                count: values.len(),
                mean_altitude_km: mean(&values),
                median_altitude_km: median(&values),
            })
        })
        .collect()
}
