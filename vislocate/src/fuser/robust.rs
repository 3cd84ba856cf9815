//! Robust statistics over flat lat/long coordinates.
//!
//! Coordinates are treated as points in a plane with Euclidean distance in
//! degrees. This is only accurate over a few hundred meters, which covers a
//! single localization session.

use tracing::warn;

use super::Coordinate;

/// Iteration cap for Weiszfeld's algorithm.
pub const MAX_ITERATIONS: usize = 200;

/// Convergence threshold on the change in summed squared distances.
pub const CONVERGENCE_EPSILON: f64 = 1e-6;

/// Offset applied when the starting centroid sits exactly on an input point.
pub const PERTURBATION: f64 = 1e-4;

/// Number of iterations between convergence comparisons.
const CONVERGENCE_LAG: usize = 3;

/// Consistency constant relating MAD to the standard deviation.
const MAD_SCALE: f64 = 0.6745;

/// Modified z-score above which a point is an outlier.
const OUTLIER_Z_SCORE: f64 = 3.5;

/// Flat Euclidean distance in degrees.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let dlat = a.latitude - b.latitude;
    let dlon = a.longitude - b.longitude;
    (dlat * dlat + dlon * dlon).sqrt()
}

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(points: &[Coordinate]) -> Option<Coordinate> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat, lon) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), p| (lat + p.latitude, lon + p.longitude));
    Some(Coordinate::new(lat / n, lon / n))
}

/// Median of scalar values, averaging the middle pair for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Mean squared distance from the mean.
pub fn population_variance(points: &[Coordinate]) -> Option<f64> {
    let center = mean(points)?;
    let sum: f64 = points
        .iter()
        .map(|p| {
            let d = distance(*p, center);
            d * d
        })
        .sum();
    Some(sum / points.len() as f64)
}

/// Geometric median via Weiszfeld's algorithm.
///
/// Starts from the mean and iterates
/// `centroid = Σ(pᵢ/dᵢ) / Σ(1/dᵢ)`. Convergence is declared when the summed
/// squared distance differs by less than [`CONVERGENCE_EPSILON`] from its
/// value three iterations earlier.
///
/// Numerical trouble (an iterate landing on an input point, a NaN distance,
/// a degenerate denominator) ends the iteration early with the last valid
/// centroid. Running out of iterations yields [`Coordinate::NAN`], as does
/// an empty input.
pub fn geometric_median(points: &[Coordinate]) -> Coordinate {
    let Some(start) = mean(points) else {
        return Coordinate::NAN;
    };
    if points.len() == 1 {
        return points[0];
    }

    let mut centroid = start;
    if points.iter().any(|p| *p == centroid) {
        centroid = Coordinate::new(
            centroid.latitude + PERTURBATION,
            centroid.longitude + PERTURBATION,
        );
    }

    let mut history: Vec<f64> = Vec::with_capacity(MAX_ITERATIONS);
    for iteration in 0..MAX_ITERATIONS {
        let mut lat = 0.0;
        let mut lon = 0.0;
        let mut denominator = 0.0;
        let mut sum_sq = 0.0;

        for p in points {
            let d = distance(*p, centroid);
            if d == 0.0 || d.is_nan() {
                return centroid;
            }
            let weight = 1.0 / d;
            lat += p.latitude * weight;
            lon += p.longitude * weight;
            denominator += weight;
            sum_sq += d * d;
        }

        if denominator == 0.0 || !denominator.is_finite() {
            return centroid;
        }

        let next = Coordinate::new(lat / denominator, lon / denominator);
        if !next.is_finite() {
            return centroid;
        }
        centroid = next;

        history.push(sum_sq);
        if iteration >= CONVERGENCE_LAG
            && (history[iteration] - history[iteration - CONVERGENCE_LAG]).abs()
                < CONVERGENCE_EPSILON
        {
            return centroid;
        }
    }

    warn!(
        points = points.len(),
        iterations = MAX_ITERATIONS,
        "Geometric median did not converge"
    );
    Coordinate::NAN
}

/// Flag each point as an inlier (`true`) or outlier.
///
/// Uses the modified z-score of each point's distance to the geometric
/// median: `0.6745 · d / MAD ≤ 3.5`. With one point or none, a zero MAD, or
/// a failed median, every point is an inlier.
pub fn classify_inliers(points: &[Coordinate]) -> Vec<bool> {
    if points.len() <= 1 {
        return vec![true; points.len()];
    }

    let center = geometric_median(points);
    if !center.is_finite() {
        return vec![true; points.len()];
    }

    let distances: Vec<f64> = points.iter().map(|p| distance(*p, center)).collect();
    let Some(mad) = median(&distances) else {
        return vec![true; points.len()];
    };
    if mad == 0.0 || !mad.is_finite() {
        return vec![true; points.len()];
    }

    distances
        .iter()
        .map(|d| MAD_SCALE * d / mad <= OUTLIER_Z_SCORE)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon)
    }

    fn assert_close(actual: Coordinate, expected: Coordinate, tolerance: f64) {
        assert!(
            distance(actual, expected) < tolerance,
            "expected {:?} within {} of {:?}",
            actual,
            tolerance,
            expected
        );
    }

    #[test]
    fn test_median_scalar() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[c(0.0, 0.0), c(2.0, 4.0)]), Some(c(1.0, 2.0)));
    }

    #[test]
    fn test_population_variance() {
        // distances from (0,5) are both 5
        let variance = population_variance(&[c(0.0, 0.0), c(0.0, 10.0)]).unwrap();
        assert!((variance - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_geometric_median_empty_is_nan() {
        assert!(!geometric_median(&[]).is_finite());
    }

    #[test]
    fn test_geometric_median_single_point() {
        assert_eq!(geometric_median(&[c(48.85, 2.35)]), c(48.85, 2.35));
    }

    #[test]
    fn test_geometric_median_two_points() {
        assert_close(geometric_median(&[c(0.0, 0.0), c(0.0, 10.0)]), c(0.0, 5.0), 1e-6);
    }

    #[test]
    fn test_geometric_median_collinear_on_input_point() {
        let points = [c(0.0, 0.0), c(0.0, 10.0), c(0.0, 20.0)];
        assert_close(geometric_median(&points), c(0.0, 10.0), 1e-3);
    }

    #[test]
    fn test_geometric_median_triangle_is_fermat_point() {
        let points = [c(10.0, 0.0), c(-10.0, 0.0), c(0.0, 10.0)];
        let expected = c(0.0, 10.0 / 3f64.sqrt());
        assert_close(geometric_median(&points), expected, 1e-3);
    }

    #[test]
    fn test_geometric_median_square_with_center() {
        let points = [
            c(10.0, 10.0),
            c(10.0, 20.0),
            c(20.0, 10.0),
            c(20.0, 20.0),
            c(15.0, 15.0),
        ];
        assert_close(geometric_median(&points), c(15.0, 15.0), 1e-3);
    }

    #[test]
    fn test_geometric_median_identical_points() {
        let points = [c(1.0, 1.0), c(1.0, 1.0), c(1.0, 1.0)];
        assert_close(geometric_median(&points), c(1.0, 1.0), 1e-3);
    }

    #[test]
    fn test_classify_inliers_small_sets() {
        assert!(classify_inliers(&[]).is_empty());
        assert_eq!(classify_inliers(&[c(1.0, 1.0)]), vec![true]);
    }

    #[test]
    fn test_classify_inliers_flags_outlier() {
        let points = [c(0.0, 0.0), c(0.0, 0.01), c(0.0, 0.02), c(1.0, 0.0)];
        assert_eq!(classify_inliers(&points), vec![true, true, true, false]);
    }

    #[test]
    fn test_classify_inliers_duplicate_outliers() {
        let points = [
            c(0.0, 0.0),
            c(0.0, 0.01),
            c(0.0, 0.02),
            c(1.0, 0.0),
            c(1.0, 0.0),
        ];
        assert_eq!(
            classify_inliers(&points),
            vec![true, true, true, false, false]
        );
    }

    #[test]
    fn test_classify_inliers_zero_mad() {
        let points = [c(1.0, 1.0), c(1.0, 1.0), c(1.0, 1.0), c(5.0, 5.0)];
        // three of four distances are (near) zero
        let flags = classify_inliers(&points);
        assert_eq!(flags.len(), 4);
        assert!(flags[..3].iter().all(|f| *f));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn coordinate() -> impl Strategy<Value = Coordinate> {
            (-80.0f64..80.0, -170.0f64..170.0).prop_map(|(lat, lon)| Coordinate::new(lat, lon))
        }

        proptest! {
            #[test]
            fn median_stays_within_bounding_box(points in prop::collection::vec(coordinate(), 1..20)) {
                let median = geometric_median(&points);
                prop_assume!(median.is_finite());

                let min_lat = points.iter().map(|p| p.latitude).fold(f64::INFINITY, f64::min);
                let max_lat = points.iter().map(|p| p.latitude).fold(f64::NEG_INFINITY, f64::max);
                let min_lon = points.iter().map(|p| p.longitude).fold(f64::INFINITY, f64::min);
                let max_lon = points.iter().map(|p| p.longitude).fold(f64::NEG_INFINITY, f64::max);

                let slack = 2.0 * PERTURBATION;
                prop_assert!(median.latitude >= min_lat - slack && median.latitude <= max_lat + slack);
                prop_assert!(median.longitude >= min_lon - slack && median.longitude <= max_lon + slack);
            }

            #[test]
            fn inlier_flags_cover_every_point(points in prop::collection::vec(coordinate(), 0..20)) {
                let flags = classify_inliers(&points);
                prop_assert_eq!(flags.len(), points.len());
                if !points.is_empty() {
                    prop_assert!(flags.iter().any(|f| *f), "at least one inlier");
                }
            }

            #[test]
            fn variance_is_non_negative(points in prop::collection::vec(coordinate(), 1..20)) {
                let variance = population_variance(&points).unwrap();
                prop_assert!(variance >= 0.0);
            }
        }
    }
}
