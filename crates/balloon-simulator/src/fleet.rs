//! Synthetic balloon fleet generation.
//!
//! Balloons are released around a handful of swarm centres, then drift
//! hour by hour along a jittered heading while their altitude random-walks.
//! Some hours are marked as failed or partially corrupted the way an
//! upstream fetch would report them.

use anyhow::{Result, ensure};
use balloon_domain::geodesy::destination;
use balloon_domain::{HOURS_PER_DAY, Position, Snapshot, SnapshotSeries, SnapshotStatus};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

const MIN_ALTITUDE_KM: f64 = 0.5;
const MAX_ALTITUDE_KM: f64 = 30.0;

/// Statuses a failed hour can report.
const FAILURE_STATUSES: [(SnapshotStatus, &str); 5] = [
    (SnapshotStatus::NotFound, "HTTP 404"),
    (SnapshotStatus::FormatError, "Expected array of coordinates"),
    (SnapshotStatus::AllCorrupted, "All data entries were corrupted"),
    (SnapshotStatus::HttpError, "HTTP 503"),
    (SnapshotStatus::RequestError, "Connection timed out"),
];

/// Fleet generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    pub balloon_count: usize,
    pub swarm_count: usize,
    /// Standard deviation of release distance from a swarm centre
    pub swarm_spread_km: f64,
    pub mean_speed_km_h: f64,
    /// Standard deviation of the hourly heading change
    pub heading_jitter_deg: f64,
    pub mean_altitude_km: f64,
    pub altitude_std_km: f64,
    /// Hourly altitude random-walk step
    pub altitude_step_km: f64,
    /// Probability that an hour fails outright
    pub failure_rate: f64,
    /// Probability that a usable hour loses some entries
    pub corruption_rate: f64,
    pub seed: Option<u64>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            balloon_count: 400,
            swarm_count: 8,
            swarm_spread_km: 300.0,
            mean_speed_km_h: 40.0,
            heading_jitter_deg: 15.0,
            mean_altitude_km: 15.0,
            altitude_std_km: 4.0,
            altitude_step_km: 0.3,
            failure_rate: 0.08,
            corruption_rate: 0.1,
            seed: None,
        }
    }
}

/// One simulated balloon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balloon {
    pub id: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
    pub heading_deg: f64,
    pub speed_km_h: f64,
}

impl Balloon {
    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude, self.altitude_km)
    }
}

/// Seeded fleet simulator.
pub struct FleetSimulator {
    config: FleetConfig,
    rng: StdRng,
    balloons: Vec<Balloon>,
    heading_noise: Normal<f64>,
    altitude_noise: Normal<f64>,
}

impl FleetSimulator {
    /// Release the fleet around randomly placed swarm centres.
    ///
    /// # Errors
    ///
    /// Fails when a count is zero, a rate is outside `[0, 1]` or a spread is
    /// not a valid standard deviation.
    pub fn new(config: FleetConfig) -> Result<Self> {
        ensure!(config.balloon_count > 0, "balloon_count must be positive");
        ensure!(config.swarm_count > 0, "swarm_count must be positive");
        ensure!(
            (0.0..=1.0).contains(&config.failure_rate),
            "failure_rate must be within [0, 1]"
        );
        ensure!(
            (0.0..=1.0).contains(&config.corruption_rate),
            "corruption_rate must be within [0, 1]"
        );

        let release_noise = Normal::new(0.0, config.swarm_spread_km)?;
        let heading_noise = Normal::new(0.0, config.heading_jitter_deg)?;
        let altitude_noise = Normal::new(0.0, config.altitude_step_km)?;
        let initial_altitude = Normal::new(config.mean_altitude_km, config.altitude_std_km)?;
        let speed = Normal::new(config.mean_speed_km_h, config.mean_speed_km_h / 3.0)?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let centres: Vec<(f64, f64)> = (0..config.swarm_count)
            .map(|_| (rng.gen_range(-65.0..65.0), rng.gen_range(-180.0..180.0)))
            .collect();

        let balloons = (0..config.balloon_count)
            .map(|id| {
                let (lat, lng) = centres[id % centres.len()];
                let offset_km = release_noise.sample(&mut rng).abs();
                let bearing = rng.gen_range(0.0..360.0);
                let start = destination(lat, lng, bearing, offset_km);
                Balloon {
                    id,
                    latitude: start.latitude,
                    longitude: start.longitude,
                    altitude_km: initial_altitude
                        .sample(&mut rng)
                        .clamp(MIN_ALTITUDE_KM, MAX_ALTITUDE_KM),
                    heading_deg: rng.gen_range(0.0..360.0),
                    speed_km_h: speed.sample(&mut rng).abs(),
                }
            })
            .collect();

        tracing::debug!(
            balloons = config.balloon_count,
            swarms = config.swarm_count,
            "Fleet released"
        );

        Ok(Self {
            config,
            rng,
            balloons,
            heading_noise,
            altitude_noise,
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn balloons(&self) -> &[Balloon] {
        &self.balloons
    }

    /// Advance every balloon by one hour.
    pub fn step(&mut self) {
        for balloon in &mut self.balloons {
            balloon.heading_deg =
                (balloon.heading_deg + self.heading_noise.sample(&mut self.rng)).rem_euclid(360.0);
            let next = destination(
                balloon.latitude,
                balloon.longitude,
                balloon.heading_deg,
                balloon.speed_km_h,
            );
            balloon.latitude = next.latitude;
            balloon.longitude = next.longitude;
            balloon.altitude_km = (balloon.altitude_km + self.altitude_noise.sample(&mut self.rng))
                .clamp(MIN_ALTITUDE_KM, MAX_ALTITUDE_KM);
        }
    }

    /// Simulate 24 hours ending at `end` and package them as a series,
    /// most recent hour first.
    ///
    /// # Errors
    ///
    /// Propagates series construction errors.
    pub fn generate_series(&mut self, end: DateTime<Utc>) -> Result<SnapshotSeries> {
        let mut snapshots = Vec::with_capacity(HOURS_PER_DAY);

        // Oldest hour first, then reversed into offset order.
        for hour_offset in (0..HOURS_PER_DAY).rev() {
            let timestamp = end - Duration::hours(i64::try_from(hour_offset)?);
            let hour_offset = u8::try_from(hour_offset)?;
            snapshots.push(self.snapshot(hour_offset, timestamp));
            self.step();
        }
        snapshots.reverse();

        let series = SnapshotSeries::new(snapshots)?;
        tracing::info!(
            hours = series.len(),
            error_hours = series.error_hours().len(),
            "Generated snapshot series"
        );
        Ok(series)
    }

    fn snapshot(&mut self, hour_offset: u8, timestamp: DateTime<Utc>) -> Snapshot {
        if self.rng.gen_bool(self.config.failure_rate) {
            let (status, message) =
                FAILURE_STATUSES[self.rng.gen_range(0..FAILURE_STATUSES.len())];
            tracing::debug!(hour = hour_offset, status = status.as_str(), "Simulated failed hour");
            return Snapshot::failed(hour_offset, timestamp, status, message);
        }

        let mut positions: Vec<Position> = self.balloons.iter().map(Balloon::position).collect();

        if self.rng.gen_bool(self.config.corruption_rate) {
            let before = positions.len();
            positions.retain(|_| self.rng.gen_bool(0.9));
            let dropped = before - positions.len();
            return Snapshot::new(hour_offset, timestamp, positions).with_status(
                SnapshotStatus::PartialCorruption,
                Some(format!("Dropped {dropped} corrupted entries")),
            );
        }

        Snapshot::new(hour_offset, timestamp, positions)
    }
}
