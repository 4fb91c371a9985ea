//! Convex hull of a planar (latitude, longitude) point set by Graham scan.

use balloon_domain::Position2D;
use std::cmp::Ordering;

const EPSILON: f64 = 1e-12;

/// Cross product of `o->a` and `o->b` with latitude as x and longitude as y.
/// Positive for a counter-clockwise turn.
fn cross_product(o: &Position2D, a: &Position2D, b: &Position2D) -> f64 {
    (a.latitude - o.latitude) * (b.longitude - o.longitude)
        - (a.longitude - o.longitude) * (b.latitude - o.latitude)
}

fn squared_offset(o: &Position2D, p: &Position2D) -> f64 {
    (p.latitude - o.latitude).powi(2) + (p.longitude - o.longitude).powi(2)
}

/// Counter-clockwise hull vertices starting at the pivot (lowest latitude,
/// then lowest longitude).
///
/// Returns `None` for fewer than three points or when every point is
/// collinear.
#[must_use]
pub fn convex_hull(points: &[Position2D]) -> Option<Vec<Position2D>> {
    if points.len() < 3 {
        return None;
    }

    let pivot_index = points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.latitude
                .total_cmp(&b.latitude)
                .then(a.longitude.total_cmp(&b.longitude))
        })
        .map(|(i, _)| i)?;
    let pivot = points[pivot_index];

    let mut rest: Vec<Position2D> = points
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != pivot_index)
        .map(|(_, p)| *p)
        .collect();

    rest.sort_by(|a, b| {
        let angle_a = (a.longitude - pivot.longitude).atan2(a.latitude - pivot.latitude);
        let angle_b = (b.longitude - pivot.longitude).atan2(b.latitude - pivot.latitude);
        angle_a
            .partial_cmp(&angle_b)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                squared_offset(&pivot, a)
                    .partial_cmp(&squared_offset(&pivot, b))
                    .unwrap_or(Ordering::Equal)
            })
    });

    let mut stack: Vec<Position2D> = Vec::with_capacity(points.len());
    stack.push(pivot);
    for p in rest {
        while stack.len() >= 2
            && cross_product(&stack[stack.len() - 2], &stack[stack.len() - 1], &p) <= 0.0
        {
            stack.pop();
        }
        stack.push(p);
    }

    if stack.len() < 3 {
        return None;
    }
    Some(stack)
}

/// Whether `point` lies inside or on a counter-clockwise hull.
#[must_use]
pub fn contains(hull: &[Position2D], point: &Position2D) -> bool {
    if hull.len() < 3 {
        return false;
    }
    hull.iter()
        .zip(hull.iter().cycle().skip(1))
        .all(|(a, b)| cross_product(a, b, point) >= -EPSILON)
}

/// Polygon area in square degrees (shoelace formula).
#[must_use]
pub fn area(hull: &[Position2D]) -> f64 {
    if hull.len() < 3 {
        return 0.0;
    }
    let twice: f64 = hull
        .iter()
        .zip(hull.iter().cycle().skip(1))
        .map(|(a, b)| a.latitude * b.longitude - b.latitude * a.longitude)
        .sum();
    twice.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn p(lat: f64, lng: f64) -> Position2D {
        Position2D::new(lat, lng)
    }

    #[test]
    fn test_square_returns_corners_in_order() {
        let square = [p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0), p(1.0, 0.0)];
        let hull = convex_hull(&square).unwrap();
        assert_eq!(hull, vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)]);
        assert!((area(&hull) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_interior_and_edge_points_dropped() {
        let points = [
            p(0.0, 0.0),
            p(2.0, 0.0),
            p(2.0, 2.0),
            p(0.0, 2.0),
            p(1.0, 1.0),
            p(1.0, 0.0),
            p(2.0, 1.0),
        ];
        let hull = convex_hull(&points).unwrap();
        assert_eq!(hull.len(), 4);
        assert!(hull.contains(&p(2.0, 2.0)));
        assert!(!hull.contains(&p(1.0, 1.0)));
    }

    #[test]
    fn test_too_few_points() {
        assert!(convex_hull(&[]).is_none());
        assert!(convex_hull(&[p(0.0, 0.0), p(1.0, 1.0)]).is_none());
    }

    #[test]
    fn test_collinear_points_have_no_hull() {
        let line = [p(0.0, 0.0), p(1.0, 1.0), p(2.0, 2.0), p(3.0, 3.0)];
        assert!(convex_hull(&line).is_none());

        let same = [p(5.0, 5.0); 4];
        assert!(convex_hull(&same).is_none());
    }

    #[test]
    fn test_random_points_subset_and_containment() {
        let mut rng = StdRng::seed_from_u64(42);
        let points: Vec<Position2D> = (0..200)
            .map(|_| p(rng.gen_range(-60.0..60.0), rng.gen_range(-170.0..170.0)))
            .collect();

        let hull = convex_hull(&points).unwrap();
        assert!(hull.len() >= 3);
        assert!(hull.iter().all(|v| points.contains(v)));
        assert!(points.iter().all(|q| contains(&hull, q)));
        assert!(!contains(&hull, &p(80.0, 0.0)));
    }

    #[test]
    fn test_contains_degenerate_hull() {
        assert!(!contains(&[p(0.0, 0.0)], &p(0.0, 0.0)));
        assert_eq!(area(&[p(0.0, 0.0), p(1.0, 1.0)]), 0.0);
    }
}
