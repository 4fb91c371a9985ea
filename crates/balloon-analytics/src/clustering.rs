//! Automatic-k centroid clustering over the latitude/longitude projection.
//!
//! For every candidate k the engine seeds centroids with squared-distance
//! weighted sampling, refines them by alternating assignment and mean
//! updates, and scores the partition by silhouette. The best-scoring k wins;
//! ties go to the smaller k.

use crate::config::ClusteringConfig;
use crate::density::DistanceMatrix;
use balloon_domain::Position2D;
use balloon_domain::geodesy::{distance_2d, mean_position};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Partition for one k.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CentroidClusterResult {
    /// Number of clusters; zero when the candidate range was empty
    pub k: usize,
    /// Cluster centres, indexed by cluster id
    pub centroids: Vec<Position2D>,
    /// Cluster index in `[0, k)` for every input point.
    pub assignments: Vec<usize>,
    /// Sum of squared distances (km²) from points to their centroid.
    pub inertia: f64,
    /// Mean silhouette in `[-1, 1]`
    pub silhouette: f64,
    /// Share of total dispersion accounted for by the partition.
    pub variance_explained: f64,
    /// Refinement iterations run
    pub iterations: usize,
    /// Inertia after every assignment step.
    pub inertia_history: Vec<f64>,
}

impl CentroidClusterResult {
    /// `k = 0`, no clusters.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Population of each cluster
    #[must_use]
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &a in &self.assignments {
            sizes[a] += 1;
        }
        sizes
    }
}

/// Score of one candidate k.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Candidate cluster count
    pub k: usize,
    /// Mean silhouette for this k
    pub silhouette: f64,
    /// Final inertia for this k
    pub inertia: f64,
    /// Refinement iterations run
    pub iterations: usize,
}

/// Selected partition plus the scores of every candidate that was tried.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AutoClusterResult {
    /// Highest-silhouette partition
    pub best: CentroidClusterResult,
    /// Score of every k tried, in order
    pub candidates: Vec<CandidateScore>,
}

/// Candidate k values: `2 ..= min(max_k, floor(n / points_per_k))`.
/// Empty when fewer than `2 * points_per_k` points are available.
#[must_use]
pub fn candidate_range(n: usize, config: &ClusteringConfig) -> RangeInclusive<usize> {
    let upper = config.max_k.min(n / config.points_per_k.max(1));
    2..=upper
}

/// Greedy diversity seeding: the first centroid uniformly at random, each
/// following one with probability proportional to the squared distance to
/// the nearest centroid chosen so far.
pub fn seed_centroids<R: Rng + ?Sized>(
    points: &[Position2D],
    k: usize,
    rng: &mut R,
) -> Vec<Position2D> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }

    let first = points[rng.gen_range(0..points.len())];
    let mut centroids = Vec::with_capacity(k);
    centroids.push(first);

    let mut nearest_sq: Vec<f64> = points
        .iter()
        .map(|p| distance_2d(p, &first).powi(2))
        .collect();

    while centroids.len() < k {
        // All-zero weights (every point already a centroid) fall back to a
        // uniform draw.
        let index = match WeightedIndex::new(&nearest_sq) {
            Ok(weights) => weights.sample(rng),
            Err(_) => rng.gen_range(0..points.len()),
        };
        let chosen = points[index];
        centroids.push(chosen);

        for (p, best) in points.iter().zip(nearest_sq.iter_mut()) {
            *best = best.min(distance_2d(p, &chosen).powi(2));
        }
    }

    centroids
}

/// Nearest centroid for every point; ties go to the lower index.
#[must_use]
pub fn assign(points: &[Position2D], centroids: &[Position2D]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (i, c) in centroids.iter().enumerate() {
                let d = distance_2d(p, c);
                if d < best_distance {
                    best = i;
                    best_distance = d;
                }
            }
            best
        })
        .collect()
}

/// Lat/lng mean of each cluster's points, unwrapped across ±180°. A cluster
/// left without points keeps its previous centroid.
#[must_use]
pub fn update_centroids(
    points: &[Position2D],
    assignments: &[usize],
    previous: &[Position2D],
) -> Vec<Position2D> {
    previous
        .iter()
        .enumerate()
        .map(|(cluster, &old)| {
            let members: Vec<Position2D> = points
                .iter()
                .zip(assignments)
                .filter(|&(_, &a)| a == cluster)
                .map(|(p, _)| *p)
                .collect();
            mean_position(&members).unwrap_or(old)
        })
        .collect()
}

/// Sum of squared distances from every point to its assigned centroid.
#[must_use]
pub fn inertia(points: &[Position2D], centroids: &[Position2D], assignments: &[usize]) -> f64 {
    points
        .iter()
        .zip(assignments)
        .map(|(p, &a)| distance_2d(p, &centroids[a]).powi(2))
        .sum()
}

/// Converged (or iteration-capped) centroids and assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// Final centres
    pub centroids: Vec<Position2D>,
    /// Cluster id of every point
    pub assignments: Vec<usize>,
    /// Mean updates run
    pub iterations: usize,
    /// Inertia after seeding and after every update
    pub inertia_history: Vec<f64>,
}

/// Alternate mean updates and reassignment until the assignment is stable
/// or `max_iterations` updates have run.
#[must_use]
pub fn refine(
    points: &[Position2D],
    mut centroids: Vec<Position2D>,
    max_iterations: usize,
) -> Refinement {
    let mut assignments = assign(points, &centroids);
    let mut inertia_history = vec![inertia(points, &centroids, &assignments)];
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        centroids = update_centroids(points, &assignments, &centroids);
        let next = assign(points, &centroids);
        inertia_history.push(inertia(points, &centroids, &next));

        let stable = next == assignments;
        assignments = next;
        if stable {
            break;
        }
    }

    Refinement {
        centroids,
        assignments,
        iterations,
        inertia_history,
    }
}

/// Mean silhouette over all points.
///
/// Zero for one point or fewer, or when only one cluster is populated.
/// Members of singleton clusters score zero; a point with `a == b == 0`
/// scores zero.
#[must_use]
pub fn silhouette_score(matrix: &DistanceMatrix, assignments: &[usize], k: usize) -> f64 {
    let n = assignments.len();
    if n <= 1 || k < 2 {
        return 0.0;
    }

    let mut sizes = vec![0usize; k];
    for &a in assignments {
        sizes[a] += 1;
    }
    if sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    let mut sums = vec![0.0; k];
    for i in 0..n {
        let own = assignments[i];
        if sizes[own] <= 1 {
            continue;
        }

        sums.iter_mut().for_each(|s| *s = 0.0);
        for (j, &d) in matrix.row(i).iter().enumerate() {
            if j != i {
                sums[assignments[j]] += d;
            }
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    (total / n as f64).clamp(-1.0, 1.0)
}

/// Between-cluster over total sum of squares about the global centroid,
/// `0` when the points have no spread.
#[must_use]
pub fn variance_explained(
    points: &[Position2D],
    centroids: &[Position2D],
    assignments: &[usize],
) -> f64 {
    let Some(global) = mean_position(points) else {
        return 0.0;
    };

    let total: f64 = points.iter().map(|p| distance_2d(p, &global).powi(2)).sum();
    if total <= 0.0 {
        return 0.0;
    }

    let mut sizes = vec![0usize; centroids.len()];
    for &a in assignments {
        sizes[a] += 1;
    }
    let between: f64 = centroids
        .iter()
        .zip(&sizes)
        .map(|(c, &size)| size as f64 * distance_2d(c, &global).powi(2))
        .sum();

    (between / total).clamp(0.0, 1.0)
}

/// Seed, refine and score a single k.
pub fn cluster_with_k<R: Rng + ?Sized>(
    points: &[Position2D],
    matrix: &DistanceMatrix,
    k: usize,
    max_iterations: usize,
    rng: &mut R,
) -> CentroidClusterResult {
    if points.is_empty() || k == 0 {
        return CentroidClusterResult::empty();
    }

    let seeds = seed_centroids(points, k, rng);
    let refinement = refine(points, seeds, max_iterations);
    let inertia = refinement.inertia_history.last().copied().unwrap_or(0.0);
    let silhouette = silhouette_score(matrix, &refinement.assignments, k);
    let variance_explained =
        variance_explained(points, &refinement.centroids, &refinement.assignments);

    tracing::debug!(
        k,
        iterations = refinement.iterations,
        inertia,
        silhouette,
        "Scored candidate partition"
    );

    CentroidClusterResult {
        k,
        centroids: refinement.centroids,
        assignments: refinement.assignments,
        inertia,
        silhouette,
        variance_explained,
        iterations: refinement.iterations,
        inertia_history: refinement.inertia_history,
    }
}

/// Sweep the candidate range and keep the partition with the highest
/// silhouette. An empty range gives `k = 0`.
pub fn auto_cluster<R: Rng + ?Sized>(
    points: &[Position2D],
    config: &ClusteringConfig,
    rng: &mut R,
) -> AutoClusterResult {
    let range = candidate_range(points.len(), config);
    if range.is_empty() {
        tracing::debug!(points = points.len(), "Too few points for centroid clustering");
        return AutoClusterResult::default();
    }

    // Shared by the silhouette scoring of every candidate.
    let matrix = DistanceMatrix::new(points);

    let mut candidates = Vec::with_capacity(range.clone().count());
    let mut best: Option<CentroidClusterResult> = None;
    for k in range {
        let result = cluster_with_k(points, &matrix, k, config.max_iterations, rng);
        candidates.push(CandidateScore {
            k,
            silhouette: result.silhouette,
            inertia: result.inertia,
            iterations: result.iterations,
        });
        if best.as_ref().is_none_or(|b| result.silhouette > b.silhouette) {
            best = Some(result);
        }
    }

    let best = best.unwrap_or_default();
    tracing::debug!(
        k = best.k,
        silhouette = best.silhouette,
        candidates = candidates.len(),
        "Selected cluster count"
    );

    AutoClusterResult { best, candidates }
}
