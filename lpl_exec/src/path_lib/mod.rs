//! # Path library
//!
//! The path library is an offline generated set of candidate paths fanning
//! out in front of the vehicle, in a unit-scale frame with x forward, y left
//! and z up. Paths are bucketed into groups sharing a similar terminal
//! direction. Each group has a short "start path", which is what the vehicle
//! actually follows when the group is selected, while the full individual
//! paths are only used to decide which groups are blocked.
//!
//! Blocking is decided through the correspondence grid: for each voxel of a
//! grid covering the fan, the list of paths passing within the search radius
//! of it. An obstacle point is mapped to its voxel in O(1) with
//! [`LibraryDims::voxel_index`], and every listed path is marked.
//!
//! The library is loaded once from four files in the library folder:
//!
//! - `startPaths.ply`: `x y z group_id` records
//! - `paths.ply`: `x y z path_id intensity` records
//! - `pathList.ply`: `end_x end_y end_z path_id group_id` records
//! - `correspondences.txt`: the binary correspondence grid
//!
//! Any problem with these files is fatal, the library is never partially
//! loaded.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod dims;
pub mod loader;

pub use dims::LibraryDims;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use log::info;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

pub const START_PATHS_FILE: &str = "startPaths.ply";
pub const DISPLAY_PATHS_FILE: &str = "paths.ply";
pub const PATH_LIST_FILE: &str = "pathList.ply";
pub const CORRESPONDENCES_FILE: &str = "correspondences.txt";

/// Shape of the synthetic fan built by [`PathLibrary::generate_fan`].
const FAN_GROUP_YAW_SPAN_DEG: f64 = 60.0;
const FAN_BRANCH_YAW_SPAN_DEG: f64 = 10.0;
const FAN_BRANCH_ELEV_SPAN_DEG: f64 = 10.0;
const FAN_START_LEN_M: f64 = 1.0;
const FAN_BRANCH_LEN_M: f64 = 2.0;
const FAN_SAMPLE_STEP_M: f64 = 0.05;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Path library parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathLibParams {
    /// Folder holding the library files. Relative paths are relative to the
    /// software root.
    pub path_folder: String,

    /// Load the display paths, which are only used for diagnostics
    pub load_display_paths: bool,

    /// Dimensions the library was generated with
    pub dims: LibraryDims,
}

/// Terminal metrics of a single path, derived from its end point.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct PathMetrics {
    /// Group the path belongs to
    pub group_id: usize,

    /// Pitch of the end point from the origin, positive downwards
    pub end_pitch_deg: f64,

    /// Bearing of the end point from the origin, positive left
    pub end_yaw_deg: f64,

    /// Elevation of the end point
    pub end_z_m: f64,

    /// The end point itself
    pub end_m: Vector3<f64>,
}

/// Voxel to path adjacency list.
#[derive(Debug, Clone, Default)]
pub struct CorrespondenceGrid {
    pub voxels: Vec<Vec<u16>>,
}

/// A loaded, validated path library.
#[derive(Debug, Clone, Default)]
pub struct PathLibrary {
    dims: LibraryDims,

    /// One start path per group
    start_paths: Vec<Vec<Vector3<f64>>>,

    /// Decimated display path per path id, empty if not loaded
    display_paths: Vec<Vec<[f64; 4]>>,

    metrics: Vec<PathMetrics>,

    grid: CorrespondenceGrid,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathLibError {
    #[error("Could not read {0:?}: {1}")]
    FileOpen(PathBuf, std::io::Error),

    #[error("Could not parse the PLY header of {0:?}")]
    Header(PathBuf),

    #[error("Unexpected end of file in {0:?}")]
    ShortRead(PathBuf),

    #[error("Malformed record in {0:?}: {1:?}")]
    BadRecord(PathBuf, String),

    #[error("{path:?} holds {found} records but {expected} are expected")]
    CountMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("Path {0} is not described by the path list")]
    MissingPath(usize),

    #[error("Group {0} has an empty start path")]
    EmptyGroup(usize),

    #[error("Invalid library dimensions: {0}")]
    InvalidDims(String),

    #[error("Library data does not match its dimensions: {0}")]
    ShapeMismatch(String),

    #[error("Could not write {0:?}: {1}")]
    FileWrite(PathBuf, std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PathLibParams {
    fn default() -> Self {
        Self {
            path_folder: "paths".into(),
            load_display_paths: true,
            dims: LibraryDims::default(),
        }
    }
}

impl PathLibParams {
    /// Absolute path of the library folder.
    pub fn folder(&self) -> PathBuf {
        let folder = PathBuf::from(&self.path_folder);

        if folder.is_absolute() {
            return folder;
        }

        match util::host::get_sw_root() {
            Ok(root) => root.join(folder),
            Err(_) => folder,
        }
    }
}

impl PathMetrics {
    pub fn from_endpoint(end: &Vector3<f64>, group_id: usize) -> Self {
        Self {
            group_id,
            end_pitch_deg: -end.z.atan2(end.x.hypot(end.y)).to_degrees(),
            end_yaw_deg: end.y.atan2(end.x).to_degrees(),
            end_z_m: end.z,
            end_m: *end,
        }
    }
}

impl CorrespondenceGrid {
    /// Paths listed for a voxel. Out of range voxels list nothing.
    pub fn paths_at(&self, voxel: usize) -> &[u16] {
        self.voxels.get(voxel).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Total number of voxel/path pairs.
    pub fn num_entries(&self) -> usize {
        self.voxels.iter().map(|v| v.len()).sum()
    }

    pub fn num_occupied(&self) -> usize {
        self.voxels.iter().filter(|v| !v.is_empty()).count()
    }
}

impl PathLibrary {
    /// Load and validate a library from its folder.
    pub fn load(params: &PathLibParams) -> Result<Self, PathLibError> {
        let dims = &params.dims;
        dims.validate()?;

        let folder = params.folder();
        info!("Loading path library v{} from {:?}", dims.version, folder);

        let path = folder.join(START_PATHS_FILE);
        let start_paths = loader::parse_start_paths(&loader::read_text_file(&path)?, &path, dims)?;

        let display_paths = if params.load_display_paths {
            let path = folder.join(DISPLAY_PATHS_FILE);
            loader::parse_display_paths(&loader::read_text_file(&path)?, &path, dims)?
        } else {
            Vec::new()
        };

        let path = folder.join(PATH_LIST_FILE);
        let metrics = loader::parse_path_list(&loader::read_text_file(&path)?, &path, dims)?;

        let path = folder.join(CORRESPONDENCES_FILE);
        let grid = loader::parse_correspondences(&loader::read_file(&path)?, &path, dims)?;

        let lib = Self::from_parts(dims.clone(), start_paths, display_paths, metrics, grid)?;

        info!(
            "Path library loaded: {} paths in {} groups, {} occupied voxels, {} correspondences",
            lib.path_num(),
            lib.group_num(),
            lib.grid.num_occupied(),
            lib.grid.num_entries()
        );

        Ok(lib)
    }

    /// Build a library from its parts, checking they are consistent with
    /// each other and with the dimensions.
    ///
    /// `display_paths` may be empty, otherwise it must hold one entry per
    /// path.
    pub fn from_parts(
        dims: LibraryDims,
        start_paths: Vec<Vec<Vector3<f64>>>,
        display_paths: Vec<Vec<[f64; 4]>>,
        metrics: Vec<Option<PathMetrics>>,
        grid: CorrespondenceGrid,
    ) -> Result<Self, PathLibError> {
        dims.validate()?;

        if start_paths.len() != dims.group_num {
            return Err(PathLibError::ShapeMismatch(format!(
                "{} start paths for {} groups",
                start_paths.len(),
                dims.group_num
            )));
        }
        if let Some(g) = start_paths.iter().position(|p| p.is_empty()) {
            return Err(PathLibError::EmptyGroup(g));
        }

        if !display_paths.is_empty() && display_paths.len() != dims.path_num {
            return Err(PathLibError::ShapeMismatch(format!(
                "{} display paths for {} paths",
                display_paths.len(),
                dims.path_num
            )));
        }

        if metrics.len() != dims.path_num {
            return Err(PathLibError::ShapeMismatch(format!(
                "{} path metrics for {} paths",
                metrics.len(),
                dims.path_num
            )));
        }
        let metrics = metrics
            .into_iter()
            .enumerate()
            .map(|(i, m)| m.ok_or(PathLibError::MissingPath(i)))
            .collect::<Result<Vec<_>, _>>()?;

        if grid.voxels.len() != dims.grid_voxel_count() {
            return Err(PathLibError::ShapeMismatch(format!(
                "{} correspondence voxels for a grid of {}",
                grid.voxels.len(),
                dims.grid_voxel_count()
            )));
        }

        Ok(Self {
            dims,
            start_paths,
            display_paths,
            metrics,
            grid,
        })
    }

    /// Generate a synthetic fan shaped library with the given dimensions.
    ///
    /// Groups fan out evenly in yaw over +/-60 degrees. Each path of a group
    /// follows the group's 1 m straight start path, then branches off for
    /// 2 m with a yaw and elevation offset of up to 10 degrees. The
    /// correspondence grid is built by marking the voxel of every path sample,
    /// using the same voxel index function as path selection.
    pub fn generate_fan(dims: LibraryDims) -> Result<Self, PathLibError> {
        dims.validate()?;

        let group_num = dims.group_num;
        let path_num = dims.path_num;

        // Even split of paths into groups
        let group_of = |path_id: usize| path_id * group_num / path_num;
        let mut group_sizes = vec![0usize; group_num];
        for i in 0..path_num {
            group_sizes[group_of(i)] += 1;
        }

        let group_yaws: Vec<f64> = (0..group_num)
            .map(|g| {
                if group_num > 1 {
                    (-FAN_GROUP_YAW_SPAN_DEG
                        + 2.0 * FAN_GROUP_YAW_SPAN_DEG * g as f64 / (group_num - 1) as f64)
                        .to_radians()
                } else {
                    0.0
                }
            })
            .collect();

        let start_paths: Vec<Vec<Vector3<f64>>> = group_yaws
            .iter()
            .map(|yaw| sample_ray(&Vector3::zeros(), *yaw, 0.0, FAN_START_LEN_M, true))
            .collect();

        let mut display_paths = vec![Vec::new(); path_num];
        let mut metrics = vec![None; path_num];
        let mut grid = CorrespondenceGrid {
            voxels: vec![Vec::new(); dims.grid_voxel_count()],
        };

        let mut index_in_group = vec![0usize; group_num];

        for path_id in 0..path_num {
            let g = group_of(path_id);
            let k = index_in_group[g];
            index_in_group[g] += 1;

            let t = if group_sizes[g] > 1 {
                k as f64 / (group_sizes[g] - 1) as f64
            } else {
                0.5
            };
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            let yaw = group_yaws[g] + (FAN_BRANCH_YAW_SPAN_DEG * (2.0 * t - 1.0)).to_radians();
            let elev = (sign * FAN_BRANCH_ELEV_SPAN_DEG * (2.0 * t - 1.0)).to_radians();

            let start = &start_paths[g];
            let junction = start[start.len() - 1];

            let mut samples = start.clone();
            samples.extend(sample_ray(&junction, yaw, elev, FAN_BRANCH_LEN_M, false));

            // Correspondences
            for s in samples.iter() {
                if let Some(v) = dims.voxel_index(s) {
                    let voxel = &mut grid.voxels[v];
                    if voxel.last() != Some(&(path_id as u16)) {
                        voxel.push(path_id as u16);
                    }
                }
            }

            // Decimated display path, intensity is the distance along the path
            let stride = dims.display_path_stride;
            display_paths[path_id] = samples
                .iter()
                .enumerate()
                .filter(|(i, _)| (i + 1) % stride == 0)
                .map(|(i, s)| [s.x, s.y, s.z, i as f64 * FAN_SAMPLE_STEP_M])
                .collect();

            let end = samples[samples.len() - 1];
            metrics[path_id] = Some(PathMetrics::from_endpoint(&end, g));
        }

        Self::from_parts(dims, start_paths, display_paths, metrics, grid)
    }

    /// Write the library files into `folder`, which must exist.
    ///
    /// Display paths are written as stored, so they are decimated again if
    /// loaded with a display path stride above one.
    pub fn write(&self, folder: &Path) -> Result<(), PathLibError> {
        let write = |name: &str, data: &[u8]| -> Result<(), PathLibError> {
            let path = folder.join(name);
            std::fs::write(&path, data).map_err(|e| PathLibError::FileWrite(path, e))
        };

        // Start paths
        let num: usize = self.start_paths.iter().map(|p| p.len()).sum();
        let mut s = ply_header(num, &["float x", "float y", "float z", "int group_id"]);
        for (g, path) in self.start_paths.iter().enumerate() {
            for p in path {
                let _ = writeln!(s, "{} {} {} {}", p.x, p.y, p.z, g);
            }
        }
        write(START_PATHS_FILE, s.as_bytes())?;

        // Display paths
        let num: usize = self.display_paths.iter().map(|p| p.len()).sum();
        let mut s = ply_header(
            num,
            &["float x", "float y", "float z", "int path_id", "float intensity"],
        );
        for (i, path) in self.display_paths.iter().enumerate() {
            for p in path {
                let _ = writeln!(s, "{} {} {} {} {}", p[0], p[1], p[2], i, p[3]);
            }
        }
        write(DISPLAY_PATHS_FILE, s.as_bytes())?;

        // Path list
        let mut s = ply_header(
            self.metrics.len(),
            &["float end_x", "float end_y", "float end_z", "int path_id", "int group_id"],
        );
        for (i, m) in self.metrics.iter().enumerate() {
            let e = m.end_m;
            let _ = writeln!(s, "{} {} {} {} {}", e.x, e.y, e.z, i, m.group_id);
        }
        write(PATH_LIST_FILE, s.as_bytes())?;

        write(CORRESPONDENCES_FILE, &loader::write_correspondences(&self.grid))
    }

    pub fn dims(&self) -> &LibraryDims {
        &self.dims
    }

    pub fn path_num(&self) -> usize {
        self.metrics.len()
    }

    pub fn group_num(&self) -> usize {
        self.start_paths.len()
    }

    pub fn start_path(&self, group: usize) -> &[Vector3<f64>] {
        &self.start_paths[group]
    }

    pub fn has_display_paths(&self) -> bool {
        !self.display_paths.is_empty()
    }

    pub fn display_path(&self, path_id: usize) -> &[[f64; 4]] {
        self.display_paths
            .get(path_id)
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    pub fn metrics(&self) -> &[PathMetrics] {
        &self.metrics
    }

    pub fn grid(&self) -> &CorrespondenceGrid {
        &self.grid
    }

    /// Number of paths in each group.
    pub fn group_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.group_num()];
        for m in self.metrics.iter() {
            sizes[m.group_id] += 1;
        }
        sizes
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Sample a straight segment from `from` with the given yaw and elevation.
fn sample_ray(
    from: &Vector3<f64>,
    yaw_rad: f64,
    elev_rad: f64,
    len_m: f64,
    include_start: bool,
) -> Vec<Vector3<f64>> {
    let dir = Vector3::new(
        elev_rad.cos() * yaw_rad.cos(),
        elev_rad.cos() * yaw_rad.sin(),
        elev_rad.sin(),
    );
    let num = (len_m / FAN_SAMPLE_STEP_M).round() as usize;
    let first = if include_start { 0 } else { 1 };

    (first..=num)
        .map(|i| from + dir * (i as f64 * FAN_SAMPLE_STEP_M))
        .collect()
}

fn ply_header(num_vertices: usize, properties: &[&str]) -> String {
    let mut s = String::from("ply\nformat ascii 1.0\n");
    let _ = writeln!(s, "element vertex {}", num_vertices);
    for p in properties {
        let _ = writeln!(s, "property {}", p);
    }
    s.push_str("end_header\n");
    s
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    pub(crate) fn small_dims() -> LibraryDims {
        LibraryDims {
            path_num: 15,
            group_num: 3,
            display_path_stride: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_fan() {
        let lib = PathLibrary::generate_fan(small_dims()).unwrap();

        assert_eq!(lib.path_num(), 15);
        assert_eq!(lib.group_num(), 3);
        assert_eq!(lib.group_sizes(), vec![5, 5, 5]);

        // Centre group is straight ahead, start path ends at (1, 0, 0)
        let start = lib.start_path(1);
        assert_eq!(start.len(), 21);
        assert!((start[20] - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-12);

        // Every path of the centre group shares the voxel at the junction
        let junction = lib.dims().voxel_index(&start[20]).unwrap();
        let listed = lib.grid().paths_at(junction);
        for i in 5..10 {
            assert!(listed.contains(&(i as u16)));
        }
        assert!(!listed.contains(&0));

        // Terminal yaws of the centre group lie within the branch span
        for m in lib.metrics()[5..10].iter() {
            assert_eq!(m.group_id, 1);
            assert!(m.end_yaw_deg.abs() <= FAN_BRANCH_YAW_SPAN_DEG);
        }
    }

    #[test]
    fn test_from_parts_validation() {
        let dims = small_dims();
        let lib = PathLibrary::generate_fan(dims.clone()).unwrap();

        let mut start_paths = lib.start_paths.clone();
        start_paths[2].clear();
        let metrics: Vec<_> = lib.metrics.iter().map(|m| Some(*m)).collect();

        match PathLibrary::from_parts(
            dims.clone(),
            start_paths,
            Vec::new(),
            metrics.clone(),
            lib.grid.clone(),
        ) {
            Err(PathLibError::EmptyGroup(2)) => (),
            r => panic!("Expected an empty group error, got {:?}", r.map(|_| ())),
        }

        let mut missing = metrics;
        missing[4] = None;
        match PathLibrary::from_parts(
            dims,
            lib.start_paths.clone(),
            Vec::new(),
            missing,
            lib.grid.clone(),
        ) {
            Err(PathLibError::MissingPath(4)) => (),
            r => panic!("Expected a missing path error, got {:?}", r.map(|_| ())),
        }
    }

    #[test]
    fn test_write_then_load() {
        let dims = small_dims();
        let lib = PathLibrary::generate_fan(dims.clone()).unwrap();

        let folder = std::env::temp_dir().join(format!("lpl_path_lib_{}", std::process::id()));
        std::fs::create_dir_all(&folder).unwrap();
        lib.write(&folder).unwrap();

        let params = PathLibParams {
            path_folder: folder.to_string_lossy().into(),
            load_display_paths: true,
            dims,
        };
        let loaded = PathLibrary::load(&params).unwrap();

        assert_eq!(loaded.group_sizes(), lib.group_sizes());
        assert_eq!(loaded.grid().num_entries(), lib.grid().num_entries());
        assert_eq!(loaded.display_path(3).len(), lib.display_path(3).len());
        for (a, b) in loaded.metrics().iter().zip(lib.metrics()) {
            assert!((a.end_yaw_deg - b.end_yaw_deg).abs() < 1e-6);
            assert!((a.end_pitch_deg - b.end_pitch_deg).abs() < 1e-6);
        }

        std::fs::remove_dir_all(&folder).ok();
    }

    #[test]
    fn test_load_missing_folder() {
        let params = PathLibParams {
            path_folder: "/nonexistent/lpl/paths".into(),
            ..Default::default()
        };

        match PathLibrary::load(&params) {
            Err(PathLibError::FileOpen(_, _)) => (),
            r => panic!("Expected a file open error, got {:?}", r.map(|_| ())),
        }
    }
}
