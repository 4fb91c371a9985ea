//! Pairwise distance statistics and fixed-radius density clustering.
//!
//! Neighbour search is brute force over a precomputed distance matrix,
//! which is fine for fleets of a few hundred units.

use crate::config::DensityConfig;
use balloon_domain::geodesy::{distance_2d, mean_position};
use balloon_domain::{Position, Position2D};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Symmetric great-circle distance matrix, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// Distances between every pair of `points`
    #[must_use]
    pub fn new(points: &[Position2D]) -> Self {
        let n = points.len();
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = distance_2d(&points[i], &points[j]);
                data[i * n + j] = d;
                data[j * n + i] = d;
            }
        }
        Self { n, data }
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether the matrix has no points
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Distance between points `i` and `j`
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    /// Distances from point `i` to every point
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }
}

/// Distance statistics over all ordered pairs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PairwiseStats {
    /// `N * (N - 1)`
    pub pair_count: usize,
    /// Mean distance over ordered pairs
    pub mean_distance_km: f64,
    /// Population standard deviation of pair distances
    pub std_dev_km: f64,
    /// Mean distance to the nearest other point
    pub mean_nearest_neighbor_km: f64,
}

/// Mean, standard deviation and mean nearest-neighbour distance. Zeroed for
/// fewer than two points.
#[must_use]
pub fn pairwise_stats(matrix: &DistanceMatrix) -> PairwiseStats {
    let n = matrix.len();
    if n < 2 {
        return PairwiseStats::default();
    }

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut nearest_sum = 0.0;
    for i in 0..n {
        let mut nearest = f64::INFINITY;
        for (j, &d) in matrix.row(i).iter().enumerate() {
            if i == j {
                continue;
            }
            sum += d;
            sum_sq += d * d;
            nearest = nearest.min(d);
        }
        nearest_sum += nearest;
    }

    let pair_count = n * (n - 1);
    let mean = sum / pair_count as f64;
    let mean_sq = sum_sq / pair_count as f64;

    PairwiseStats {
        pair_count,
        mean_distance_km: mean,
        // Cancellation can leave a tiny negative variance.
        std_dev_km: (mean_sq - mean * mean).max(0.0).sqrt(),
        mean_nearest_neighbor_km: nearest_sum / n as f64,
    }
}

/// Outcome of fixed-radius clustering. `None` marks noise.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NeighborClusterResult {
    /// Cluster id per point; `None` marks noise
    pub assignments: Vec<Option<usize>>,
    /// Population of each cluster
    pub cluster_sizes: Vec<usize>,
}

impl NeighborClusterResult {
    /// Every point marked as noise.
    #[must_use]
    pub fn all_noise(n: usize) -> Self {
        Self {
            assignments: vec![None; n],
            cluster_sizes: Vec::new(),
        }
    }

    /// Number of clusters found
    pub fn cluster_count(&self) -> usize {
        self.cluster_sizes.len()
    }

    /// Number of points left as noise
    pub fn noise_count(&self) -> usize {
        self.assignments.iter().filter(|a| a.is_none()).count()
    }

    /// Integer label: cluster id, or `-1` for noise.
    pub fn label(&self, index: usize) -> i64 {
        self.assignments[index].map_or(-1, |c| c as i64)
    }

    /// Indices of the members of one cluster.
    pub fn members(&self, cluster: usize) -> impl Iterator<Item = usize> + '_ {
        self.assignments
            .iter()
            .enumerate()
            .filter(move |(_, a)| **a == Some(cluster))
            .map(|(i, _)| i)
    }
}

/// Density-reachability clustering with a fixed radius.
///
/// A point with at least `min_neighbors - 1` other points within
/// `epsilon_km` seeds a cluster, which then grows through every reachable
/// point that qualifies the same way. Points that do not qualify stay noise
/// unless they fall inside a growing cluster's neighbourhood.
#[must_use]
pub fn fixed_radius_clusters(
    matrix: &DistanceMatrix,
    epsilon_km: f64,
    min_neighbors: usize,
) -> NeighborClusterResult {
    let n = matrix.len();
    let threshold = min_neighbors.saturating_sub(1);

    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            matrix
                .row(i)
                .iter()
                .enumerate()
                .filter(|&(j, &d)| j != i && d <= epsilon_km)
                .map(|(j, _)| j)
                .collect()
        })
        .collect();

    let mut visited = vec![false; n];
    let mut assignments: Vec<Option<usize>> = vec![None; n];
    let mut cluster_count = 0;

    for p in 0..n {
        if visited[p] {
            continue;
        }
        visited[p] = true;
        if neighbors[p].len() < threshold {
            continue;
        }

        let id = cluster_count;
        cluster_count += 1;
        assignments[p] = Some(id);

        let mut frontier: VecDeque<usize> = neighbors[p].iter().copied().collect();
        while let Some(q) = frontier.pop_front() {
            if assignments[q].is_none() {
                assignments[q] = Some(id);
            }
            if visited[q] {
                continue;
            }
            visited[q] = true;
            if neighbors[q].len() >= threshold {
                frontier.extend(neighbors[q].iter().copied());
            }
        }
    }

    let mut cluster_sizes = vec![0; cluster_count];
    for id in assignments.iter().flatten() {
        cluster_sizes[*id] += 1;
    }

    NeighborClusterResult {
        assignments,
        cluster_sizes,
    }
}

/// Summary of one density cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighborCluster {
    /// Cluster id
    pub id: usize,
    /// Member count
    pub size: usize,
    /// Mean member position
    pub centroid: Position2D,
    /// Distance from the centroid to the farthest member.
    pub radius_km: f64,
    /// Mean member altitude
    pub mean_altitude_km: f64,
}

/// Pairwise statistics plus density clustering for one set of positions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DensitySummary {
    /// Positions analysed
    pub point_count: usize,
    /// Pair distance statistics
    pub pairwise: PairwiseStats,
    /// Per-point labels
    pub clustering: NeighborClusterResult,
    /// Per-cluster summaries
    pub clusters: Vec<NeighborCluster>,
    /// Points in no cluster
    pub noise_count: usize,
}

/// Runs both density passes with a fixed configuration.
#[derive(Debug, Clone, Copy)]
pub struct DensityAnalyzer {
    config: DensityConfig,
}

impl DensityAnalyzer {
    /// Analyzer with the given radius and population threshold
    pub fn new(config: DensityConfig) -> Self {
        Self { config }
    }

    /// Too few points for a meaningful density pass (fewer than twice the
    /// minimum cluster population) yields all noise.
    #[must_use]
    pub fn analyze(&self, positions: &[Position]) -> DensitySummary {
        let points: Vec<Position2D> = positions.iter().map(Position::to_2d).collect();
        let matrix = DistanceMatrix::new(&points);
        let pairwise = pairwise_stats(&matrix);

        let n = positions.len();
        let clustering = if n < 2 * self.config.min_neighbors {
            tracing::debug!(
                points = n,
                min_neighbors = self.config.min_neighbors,
                "Too few points for density clustering"
            );
            NeighborClusterResult::all_noise(n)
        } else {
            fixed_radius_clusters(&matrix, self.config.epsilon_km, self.config.min_neighbors)
        };

        let clusters = (0..clustering.cluster_count())
            .filter_map(|id| {
                let members: Vec<usize> = clustering.members(id).collect();
                let member_points: Vec<Position2D> = members.iter().map(|&i| points[i]).collect();
                let centroid = mean_position(&member_points)?;
                let radius_km = member_points
                    .iter()
                    .map(|p| distance_2d(&centroid, p))
                    .fold(0.0, f64::max);
                let mean_altitude_km = members
                    .iter()
                    .map(|&i| positions[i].altitude_km)
                    .sum::<f64>()
                    / members.len() as f64;
                Some(NeighborCluster {
                    id,
                    size: members.len(),
                    centroid,
                    radius_km,
                    mean_altitude_km,
                })
            })
            .collect();

        let noise_count = clustering.noise_count();
        tracing::debug!(
            points = n,
            clusters = clustering.cluster_count(),
            noise = noise_count,
            "Density clustering complete"
        );

        DensitySummary {
            point_count: n,
            pairwise,
            clustering,
            clusters,
            noise_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_of(points: &[(f64, f64)]) -> DistanceMatrix {
        let points: Vec<Position2D> = points.iter().map(|&(a, b)| Position2D::new(a, b)).collect();
        DistanceMatrix::new(&points)
    }

    #[test]
    fn test_pairwise_stats_two_points() {
        let stats = pairwise_stats(&matrix_of(&[(0.0, 0.0), (0.0, 90.0)]));
        assert_eq!(stats.pair_count, 2);
        assert!((stats.mean_distance_km - 10_007.5).abs() < 0.1);
        assert!(stats.std_dev_km.abs() < 1e-6);
        assert!((stats.mean_nearest_neighbor_km - stats.mean_distance_km).abs() < 1e-9);
    }

    #[test]
    fn test_pairwise_stats_degenerate() {
        assert_eq!(pairwise_stats(&matrix_of(&[])), PairwiseStats::default());
        assert_eq!(
            pairwise_stats(&matrix_of(&[(5.0, 5.0)])),
            PairwiseStats::default()
        );
        // Identical points: zero mean, zero spread, never NaN.
        let same = pairwise_stats(&matrix_of(&[(5.0, 5.0), (5.0, 5.0), (5.0, 5.0)]));
        assert_eq!(same.mean_distance_km, 0.0);
        assert_eq!(same.std_dev_km, 0.0);
    }

    #[test]
    fn test_three_close_points_form_one_cluster() {
        // Roughly 5 km apart.
        let matrix = matrix_of(&[(0.0, 0.0), (0.03, 0.03), (0.0, 0.045)]);
        let result = fixed_radius_clusters(&matrix, 500.0, 3);
        assert_eq!(result.assignments, vec![Some(0), Some(0), Some(0)]);
        assert_eq!(result.cluster_sizes, vec![3]);
        assert_eq!(result.noise_count(), 0);
    }

    #[test]
    fn test_isolated_points_are_noise() {
        let matrix = matrix_of(&[(0.0, 0.0), (0.1, 0.1), (0.2, 0.0), (40.0, 100.0), (-40.0, -100.0)]);
        let result = fixed_radius_clusters(&matrix, 500.0, 3);
        assert_eq!(result.cluster_count(), 1);
        assert_eq!(result.label(3), -1);
        assert_eq!(result.label(4), -1);
        assert_eq!(result.label(0), 0);
        assert_eq!(result.cluster_sizes.iter().sum::<usize>() + result.noise_count(), 5);
    }

    #[test]
    fn test_transitive_expansion() {
        // A chain with 300 km links: the ends are far apart but reachable.
        let step = 300.0 / 111.195;
        let chain: Vec<(f64, f64)> = (0..6).map(|i| (0.0, i as f64 * step)).collect();
        let result = fixed_radius_clusters(&matrix_of(&chain), 350.0, 3);
        assert_eq!(result.cluster_count(), 1);
        assert_eq!(result.cluster_sizes, vec![6]);
    }

    #[test]
    fn test_border_point_absorbed() {
        // Point 3 has a single neighbour (point 2), so it cannot seed a
        // cluster, but it is reachable from the dense group.
        let matrix = matrix_of(&[(0.0, 0.0), (0.0, 1.0), (0.0, 2.0), (0.0, 6.0)]);
        let result = fixed_radius_clusters(&matrix, 450.0, 3);
        assert_eq!(result.assignments, vec![Some(0), Some(0), Some(0), Some(0)]);
    }

    #[test]
    fn test_two_separate_clusters() {
        let matrix = matrix_of(&[
            (10.0, 10.0),
            (10.1, 10.1),
            (10.2, 10.0),
            (-30.0, 120.0),
            (-30.1, 120.1),
            (-30.2, 120.0),
        ]);
        let result = fixed_radius_clusters(&matrix, 500.0, 3);
        assert_eq!(result.cluster_sizes, vec![3, 3]);
        assert_eq!(result.members(1).collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn test_analyzer_guard_and_summaries() {
        let analyzer = DensityAnalyzer::new(DensityConfig::default());

        let few = vec![
            Position::new(0.0, 0.0, 10.0),
            Position::new(0.01, 0.01, 12.0),
            Position::new(0.02, 0.0, 14.0),
        ];
        let summary = analyzer.analyze(&few);
        assert_eq!(summary.clustering.cluster_count(), 0);
        assert_eq!(summary.noise_count, 3);
        assert!(summary.pairwise.mean_distance_km > 0.0);

        let mut many = few.clone();
        many.extend([
            Position::new(0.03, 0.01, 16.0),
            Position::new(0.0, 0.03, 18.0),
            Position::new(0.01, 0.02, 20.0),
        ]);
        let summary = analyzer.analyze(&many);
        assert_eq!(summary.clusters.len(), 1);
        assert_eq!(summary.clusters[0].size, 6);
        assert!((summary.clusters[0].mean_altitude_km - 15.0).abs() < 1e-9);
        assert!(summary.clusters[0].radius_km < 10.0);
    }

    #[test]
    fn test_cluster_across_antimeridian_stays_compact() {
        let analyzer = DensityAnalyzer::new(DensityConfig::default());
        let positions: Vec<Position> = (0..8_i32)
            .map(|i| {
                let lng = if i % 2 == 0 { 179.9 } else { -179.9 };
                Position::new(f64::from(i) * 0.1, lng, 15.0)
            })
            .collect();

        let summary = analyzer.analyze(&positions);
        assert_eq!(summary.clusters.len(), 1);
        let cluster = &summary.clusters[0];
        assert!(cluster.centroid.longitude.abs() > 179.0);
        assert!(cluster.radius_km < 50.0);
    }

    #[test]
    fn test_analyzer_empty() {
        let summary = DensityAnalyzer::new(DensityConfig::default()).analyze(&[]);
        assert_eq!(summary, DensitySummary::default());
    }
}
