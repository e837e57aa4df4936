//! Path library dimensions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::PathLibError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The constants a path library dataset was generated with.
///
/// These must match the dataset exactly, a library is rejected at load if
/// any of its files disagree with them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryDims {
    /// Version of the dataset these dimensions describe
    pub version: u32,

    /// Number of individual paths
    pub path_num: usize,

    /// Number of path groups, one start path each
    pub group_num: usize,

    /// Side of a correspondence grid voxel, in scaled coordinates
    pub grid_voxel_size_m: f64,

    /// Lateral search radius at the vehicle
    pub search_radius_hori_m: f64,

    /// Vertical search radius at the vehicle
    pub search_radius_vert_m: f64,

    /// Distance from the vehicle to the far corner of the grid
    pub grid_voxel_offset_m: [f64; 3],

    /// Number of voxels along each axis
    pub grid_voxel_num: [usize; 3],

    /// One display path record is kept in every `display_path_stride`
    pub display_path_stride: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LibraryDims {
    fn default() -> Self {
        Self {
            version: 1,
            path_num: 4375,
            group_num: 25,
            grid_voxel_size_m: 0.2,
            search_radius_hori_m: 1.2,
            search_radius_vert_m: 0.8,
            grid_voxel_offset_m: [6.4, 9.0, 3.3],
            grid_voxel_num: [33, 91, 34],
            display_path_stride: 15,
        }
    }
}

impl LibraryDims {
    /// Check the dimensions are usable.
    pub fn validate(&self) -> Result<(), PathLibError> {
        let err = |msg: &str| Err(PathLibError::InvalidDims(msg.into()));

        if self.path_num == 0 || self.group_num == 0 {
            return err("path and group numbers must be positive");
        }
        // Path ids are stored as i16 in the correspondence file
        if self.path_num > i16::MAX as usize {
            return err("path number does not fit the correspondence file format");
        }
        if self.group_num > self.path_num {
            return err("more groups than paths");
        }
        if !(self.grid_voxel_size_m > 0.0) {
            return err("grid voxel size must be positive");
        }
        if !(self.search_radius_hori_m > 0.0 && self.search_radius_vert_m > 0.0) {
            return err("search radii must be positive");
        }
        if self.grid_voxel_offset_m.iter().any(|o| !(*o > 0.0)) {
            return err("grid offsets must be positive");
        }
        if self.grid_voxel_num.iter().any(|n| *n == 0) {
            return err("grid voxel numbers must be positive");
        }
        if self.display_path_stride == 0 {
            return err("display path stride must be positive");
        }

        Ok(())
    }

    /// Total number of voxels in the correspondence grid.
    pub fn grid_voxel_count(&self) -> usize {
        self.grid_voxel_num.iter().product()
    }

    /// Flat index of the correspondence grid voxel containing a point, given
    /// in the unit-scale path frame.
    ///
    /// The lateral and vertical coordinates are divided by a factor which
    /// grows linearly from `search_radius / offset` at the vehicle to 1 at
    /// the far edge of the grid, so voxels near the vehicle cover a narrower
    /// slice of space than those far away.
    pub fn voxel_index(&self, point: &Vector3<f64>) -> Option<usize> {
        let [off_x, off_y, off_z] = self.grid_voxel_offset_m;
        let [num_x, num_y, num_z] = self.grid_voxel_num;
        let s = self.grid_voxel_size_m;

        let scale_y = point.x / off_x + self.search_radius_hori_m / off_y * (off_x - point.x) / off_x;
        let scale_z = point.x / off_x + self.search_radius_vert_m / off_z * (off_x - point.x) / off_x;

        let ind_x = (off_x + s / 2.0 - point.x) / s;
        let ind_y = (off_y + s / 2.0 - point.y / scale_y) / s;
        let ind_z = (off_z + s / 2.0 - point.z / scale_z) / s;

        if !(ind_x.is_finite() && ind_y.is_finite() && ind_z.is_finite()) {
            return None;
        }

        // Truncation towards zero
        let (ind_x, ind_y, ind_z) = (ind_x as i64, ind_y as i64, ind_z as i64);

        let in_bounds = |i: i64, n: usize| i >= 0 && (i as usize) < n;
        if in_bounds(ind_x, num_x) && in_bounds(ind_y, num_y) && in_bounds(ind_z, num_z) {
            Some(num_y * num_z * ind_x as usize + num_z * ind_y as usize + ind_z as usize)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
