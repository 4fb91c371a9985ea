//! # Balloon Fleet - Domain Model
//!
//! Value objects shared by the analytics engine and the simulator: sensor
//! positions, hourly snapshots and the 24-hour snapshot series, plus the
//! geodesy helpers every analysis builds on.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod geodesy;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of hourly snapshots in a full series.
pub const HOURS_PER_DAY: usize = 24;

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// Sensor position. Serialized as the upstream `[lat, lng, alt]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
}

impl Position {
    pub const fn new(lat: f64, lng: f64, alt_km: f64) -> Self {
        Self {
            latitude: lat,
            longitude: lng,
            altitude_km: alt_km,
        }
    }

    /// Build a position, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidPosition`] when the result would fail
    /// [`Position::is_valid`].
    pub fn try_new(lat: f64, lng: f64, alt_km: f64) -> Result<Self, DomainError> {
        let position = Self::new(lat, lng, alt_km);
        if position.is_valid() {
            Ok(position)
        } else {
            Err(DomainError::InvalidPosition { lat, lng, alt_km })
        }
    }

    /// Finite coordinates inside `[-90, 90] x [-180, 180]` and a finite altitude.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.altitude_km.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to another position, ignoring altitude.
    #[must_use]
    pub fn distance_to_km(&self, other: &Self) -> f64 {
        geodesy::distance(self, other)
    }

    /// Drop the altitude.
    #[must_use]
    pub const fn to_2d(&self) -> Position2D {
        Position2D {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

impl From<[f64; 3]> for Position {
    fn from([lat, lng, alt]: [f64; 3]) -> Self {
        Self::new(lat, lng, alt)
    }
}

impl From<Position> for [f64; 3] {
    fn from(p: Position) -> Self {
        [p.latitude, p.longitude, p.altitude_km]
    }
}

/// Latitude/longitude pair used by clustering and hull geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position2D {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position2D {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self {
            latitude: lat,
            longitude: lng,
        }
    }

    #[must_use]
    pub fn distance_to_km(&self, other: &Self) -> f64 {
        geodesy::distance_2d(self, other)
    }
}

impl From<Position> for Position2D {
    fn from(p: Position) -> Self {
        p.to_2d()
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Outcome of resolving one hourly upstream payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Ok,
    /// Some entries were dropped, the rest are valid.
    PartialCorruption,
    /// The payload was not valid JSON but coordinates were recovered from it.
    JsonExtracted,
    NotFound,
    FormatError,
    AllCorrupted,
    HttpError,
    RequestError,
}

impl SnapshotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::PartialCorruption => "partial_corruption",
            Self::JsonExtracted => "json_extracted",
            Self::NotFound => "not_found",
            Self::FormatError => "format_error",
            Self::AllCorrupted => "all_corrupted",
            Self::HttpError => "http_error",
            Self::RequestError => "request_error",
        }
    }

    /// Whether positions of a snapshot with this status may be analyzed.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            Self::Ok | Self::PartialCorruption | Self::JsonExtracted
        )
    }
}

/// One hour of fleet positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Hours before the most recent snapshot (0 = most recent).
    pub hour_offset: u8,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub positions: Vec<Position>,
    pub status: SnapshotStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Snapshot {
    /// A clean snapshot.
    pub fn new(hour_offset: u8, timestamp: DateTime<Utc>, positions: Vec<Position>) -> Self {
        Self {
            hour_offset,
            timestamp,
            positions,
            status: SnapshotStatus::Ok,
            error_message: None,
        }
    }

    /// A snapshot that carries no positions.
    pub fn failed(
        hour_offset: u8,
        timestamp: DateTime<Utc>,
        status: SnapshotStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            hour_offset,
            timestamp,
            positions: Vec::new(),
            status,
            error_message: Some(message.into()),
        }
    }

    /// Override the status, keeping positions.
    #[must_use]
    pub fn with_status(mut self, status: SnapshotStatus, message: Option<String>) -> Self {
        self.status = status;
        self.error_message = message;
        self
    }

    /// Positions that may be analyzed: empty for unusable snapshots, invalid
    /// entries filtered out otherwise.
    #[must_use]
    pub fn valid_positions(&self) -> Vec<Position> {
        if !self.status.is_usable() {
            return Vec::new();
        }
        self.positions.iter().copied().filter(Position::is_valid).collect()
    }

    /// Hourly label, e.g. `2024-03-01 13:00:00`.
    #[must_use]
    pub fn time_bucket(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:00:00").to_string()
    }
}

/// A non-`ok` hour, as listed in fleet reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorHour {
    pub hour: u8,
    pub status: SnapshotStatus,
    pub message: Option<String>,
}

/// Up to 24 hourly snapshots, index 0 = most recent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Snapshot>", into = "Vec<Snapshot>")]
pub struct SnapshotSeries {
    snapshots: Vec<Snapshot>,
}

impl SnapshotSeries {
    /// # Errors
    ///
    /// Fails when more than [`HOURS_PER_DAY`] snapshots are given or when a
    /// snapshot's `hour_offset` does not match its index.
    pub fn new(snapshots: Vec<Snapshot>) -> Result<Self, DomainError> {
        if snapshots.len() > HOURS_PER_DAY {
            return Err(DomainError::TooManySnapshots {
                count: snapshots.len(),
            });
        }
        for (index, snapshot) in snapshots.iter().enumerate() {
            if usize::from(snapshot.hour_offset) != index {
                return Err(DomainError::HourOrder {
                    index,
                    hour_offset: snapshot.hour_offset,
                });
            }
        }
        Ok(Self { snapshots })
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, hour: usize) -> Option<&Snapshot> {
        self.snapshots.get(hour)
    }

    pub fn most_recent(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }

    /// Every hour whose status is not `ok`, most recent first.
    #[must_use]
    pub fn error_hours(&self) -> Vec<ErrorHour> {
        self.snapshots
            .iter()
            .filter(|s| s.status != SnapshotStatus::Ok)
            .map(|s| ErrorHour {
                hour: s.hour_offset,
                status: s.status,
                message: s.error_message.clone(),
            })
            .collect()
    }
}

impl TryFrom<Vec<Snapshot>> for SnapshotSeries {
    type Error = DomainError;

    fn try_from(snapshots: Vec<Snapshot>) -> Result<Self, Self::Error> {
        Self::new(snapshots)
    }
}

impl From<SnapshotSeries> for Vec<Snapshot> {
    fn from(series: SnapshotSeries) -> Self {
        series.snapshots
    }
}

impl<'a> IntoIterator for &'a SnapshotSeries {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid position: lat={lat}, lng={lng}, alt={alt_km}")]
    InvalidPosition { lat: f64, lng: f64, alt_km: f64 },

    #[error("Too many snapshots: {count} (max 24)")]
    TooManySnapshots { count: usize },

    #[error("Snapshot at index {index} has hour offset {hour_offset}")]
    HourOrder { index: usize, hour_offset: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_position_validation() {
        assert!(Position::new(45.0, 100.0, 12.0).is_valid());
        assert!(!Position::new(91.0, 0.0, 12.0).is_valid());
        assert!(!Position::new(0.0, -181.0, 12.0).is_valid());
        assert!(!Position::new(f64::NAN, 0.0, 12.0).is_valid());
        assert!(!Position::new(0.0, 0.0, f64::INFINITY).is_valid());
        assert!(Position::try_new(95.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_position_wire_format() {
        let p: Position = serde_json::from_str("[12.5, -45.25, 17.0]").unwrap();
        assert_eq!(p, Position::new(12.5, -45.25, 17.0));
        assert_eq!(serde_json::to_string(&p).unwrap(), "[12.5,-45.25,17.0]");
    }

    #[test]
    fn test_valid_positions_filters() {
        let snapshot = Snapshot::new(
            0,
            ts(12),
            vec![Position::new(1.0, 2.0, 3.0), Position::new(100.0, 2.0, 3.0)],
        );
        assert_eq!(snapshot.valid_positions().len(), 1);

        let broken = snapshot.with_status(SnapshotStatus::FormatError, None);
        assert!(broken.valid_positions().is_empty());
    }

    #[test]
    fn test_time_bucket() {
        let snapshot = Snapshot::new(3, ts(9), Vec::new());
        assert_eq!(snapshot.time_bucket(), "2024-03-01 09:00:00");
    }

    #[test]
    fn test_series_validation() {
        let ok = SnapshotSeries::new(vec![
            Snapshot::new(0, ts(12), Vec::new()),
            Snapshot::failed(1, ts(11), SnapshotStatus::NotFound, "404"),
        ])
        .unwrap();
        assert_eq!(ok.len(), 2);

        let misordered = SnapshotSeries::new(vec![Snapshot::new(1, ts(11), Vec::new())]);
        assert!(matches!(
            misordered,
            Err(DomainError::HourOrder { index: 0, hour_offset: 1 })
        ));

        let too_many = (0..25u8)
            .map(|h| Snapshot::new(h, ts(0), Vec::new()))
            .collect::<Vec<_>>();
        assert!(SnapshotSeries::new(too_many).is_err());
    }

    #[test]
    fn test_error_hours() {
        let series = SnapshotSeries::new(vec![
            Snapshot::new(0, ts(12), vec![Position::new(1.0, 1.0, 1.0)]),
            Snapshot::failed(1, ts(11), SnapshotStatus::NotFound, "not available"),
            Snapshot::new(2, ts(10), vec![Position::new(1.0, 1.0, 1.0)])
                .with_status(SnapshotStatus::PartialCorruption, Some("2 dropped".into())),
        ])
        .unwrap();

        let errors = series.error_hours();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].hour, 1);
        assert_eq!(errors[0].status, SnapshotStatus::NotFound);
        assert_eq!(errors[1].status, SnapshotStatus::PartialCorruption);
    }

    #[test]
    fn test_series_deserialize_rejects_bad_order() {
        let json = r#"[{"hour_offset":2,"timestamp":"2024-03-01T10:00:00Z","status":"ok"}]"#;
        assert!(serde_json::from_str::<SnapshotSeries>(json).is_err());
    }
}
