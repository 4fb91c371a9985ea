//! Balloon Fleet Simulator CLI
//!
//! Simulates (or loads) a 24-hour snapshot series, replays one analysis over
//! every hour and prints a fleet report.

use anyhow::{Context, Result};
use balloon_analytics::{AnalysisEngine, AnalysisKind, AnalysisResult, AnalyticsConfig};
use balloon_domain::SnapshotSeries;
use balloon_simulator::{FleetConfig, FleetSimulator};
use chrono::{Duration, DurationRound, Utc};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "balloon-sim")]
#[command(about = "Simulate a balloon fleet and analyze its hourly snapshots")]
struct Args {
    /// Number of balloons
    #[arg(short, long, default_value = "400")]
    balloons: usize,

    /// Number of release swarms
    #[arg(short, long, default_value = "8")]
    swarms: usize,

    /// Seed for both the fleet and centroid seeding
    #[arg(long)]
    seed: Option<u64>,

    /// Load the series from a JSON file instead of simulating one
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write the series to a JSON file
    #[arg(long)]
    save_series: Option<PathBuf>,

    /// Analysis replayed over every hour
    #[arg(short, long, value_enum, default_value_t = Kind::Clusters)]
    kind: Kind,

    /// Hour to report on (0 = most recent)
    #[arg(long, default_value = "0")]
    hour: usize,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = Format::Markdown)]
    format: Format,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Altitude,
    Coverage,
    Density,
    Clusters,
}

impl From<Kind> for AnalysisKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Altitude => Self::Altitude,
            Kind::Coverage => Self::Coverage,
            Kind::Density => Self::Density,
            Kind::Clusters => Self::Clusters,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Markdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging on stderr so reports can be piped
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("balloon_sim=info".parse()?)
                .add_directive("balloon_simulator=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let series = match &args.input {
        Some(path) => load_series(path).await?,
        None => simulate_series(&args)?,
    };

    if let Some(path) = &args.save_series {
        tokio::fs::write(path, serde_json::to_string_pretty(&series)?)
            .await
            .with_context(|| format!("writing series to {}", path.display()))?;
        info!("Series written to {}", path.display());
    }

    let mut config = AnalyticsConfig::from_env();
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    let mut engine = AnalysisEngine::new(config)?;
    let kind = AnalysisKind::from(args.kind);
    let series = Arc::new(series);

    info!(
        "Replaying {} analysis over {} hours ({} error hours)",
        kind,
        series.len(),
        series.error_hours().len()
    );

    // Oldest hour first; every result replaces the previous one.
    for hour in (0..series.len()).rev() {
        let task_series = Arc::clone(&series);
        let (returned, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = engine.analyze(&task_series, hour, kind).map(describe);
            (engine, outcome)
        })
        .await?;
        engine = returned;

        match outcome {
            Ok(line) => info!("Hour -{:02} | {}", hour, line),
            Err(err) => warn!("Hour -{:02} | analysis failed: {}", hour, err),
        }
    }

    if let Some(current) = engine.current() {
        info!(
            "Current result: {} for hour -{} with {} overlays",
            current.kind(),
            current.hour_offset(),
            current.overlays().len()
        );
    }

    let report = engine.generate_report(&series, args.hour)?;
    match args.format {
        Format::Json => println!("{}", report.to_json()?),
        Format::Markdown => println!("{}", report.to_markdown()),
    }

    Ok(())
}

/// Read a series from its JSON form.
async fn load_series(path: &Path) -> Result<SnapshotSeries> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading series from {}", path.display()))?;
    let series: SnapshotSeries = serde_json::from_str(&text)
        .with_context(|| format!("parsing series from {}", path.display()))?;
    info!("Loaded {} hours from {}", series.len(), path.display());
    Ok(series)
}

/// Simulate a fresh series ending at the current hour.
fn simulate_series(args: &Args) -> Result<SnapshotSeries> {
    info!(
        "Simulating fleet: {} balloons in {} swarms",
        args.balloons, args.swarms
    );

    let mut simulator = FleetSimulator::new(FleetConfig {
        balloon_count: args.balloons,
        swarm_count: args.swarms,
        seed: args.seed,
        ..FleetConfig::default()
    })?;
    let end = Utc::now().duration_trunc(Duration::hours(1))?;
    simulator.generate_series(end)
}

/// One-line summary of a result for the replay log.
fn describe(result: &AnalysisResult) -> String {
    match result {
        AnalysisResult::Altitude(a) => format!(
            "altitude: {} balloons, mean {:.2} km, median {:.2} km",
            a.summary.count, a.summary.mean_km, a.summary.median_km
        ),
        AnalysisResult::Coverage(c) => format!(
            "coverage: {:.1}% of area, {} gaps",
            c.summary.coverage_percent, c.summary.gap_count
        ),
        AnalysisResult::Density(d) => format!(
            "density: {} clusters, {} isolated",
            d.summary.clusters.len(),
            d.summary.noise_count
        ),
        AnalysisResult::Clusters(c) => format!(
            "clusters: k={} silhouette={:.3} variance explained={:.3}",
            c.result.k, c.result.silhouette, c.result.variance_explained
        ),
    }
}
