//! Voxel grid downsampling

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Replace every point in each occupied cubic voxel of side `leaf_m` by the
/// centroid of those points.
///
/// The output is ordered by voxel index, so the result does not depend on
/// the order of the input. A non-positive leaf size returns the input
/// unchanged.
pub fn voxel_downsample(points: &[Vector3<f64>], leaf_m: f64) -> Vec<Vector3<f64>> {
    if leaf_m <= 0.0 {
        return points.to_vec();
    }

    let mut voxels: BTreeMap<(i64, i64, i64), (Vector3<f64>, usize)> = BTreeMap::new();

    for p in points {
        let key = (
            (p.x / leaf_m).floor() as i64,
            (p.y / leaf_m).floor() as i64,
            (p.z / leaf_m).floor() as i64,
        );

        let entry = voxels.entry(key).or_insert((Vector3::zeros(), 0));
        entry.0 += p;
        entry.1 += 1;
    }

    voxels
        .values()
        .map(|(sum, count)| sum / (*count as f64))
        .collect()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_one_centroid_per_leaf() {
        let points = vec![
            Vector3::new(0.01, 0.01, 0.01),
            Vector3::new(0.09, 0.05, 0.03),
            Vector3::new(0.55, 0.0, 0.0),
            Vector3::new(-0.05, 0.0, 0.0),
        ];

        let out = voxel_downsample(&points, 0.1);
        assert_eq!(out.len(), 3);

        // The two points sharing the first leaf collapse onto their centroid
        assert!(out
            .iter()
            .any(|p| (p - Vector3::new(0.05, 0.03, 0.02)).norm() < 1e-9));
    }

    #[test]
    fn test_input_order_independent() {
        let a = vec![
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(-1.0, 0.5, 0.2),
            Vector3::new(1.02, 2.01, 3.03),
        ];
        let mut b = a.clone();
        b.reverse();

        assert_eq!(voxel_downsample(&a, 0.1), voxel_downsample(&b, 0.1));
    }

    #[test]
    fn test_zero_leaf_passthrough() {
        let points = vec![Vector3::new(1.0, 1.0, 1.0), Vector3::new(1.0, 1.0, 1.0)];
        assert_eq!(voxel_downsample(&points, 0.0).len(), 2);
    }
}
