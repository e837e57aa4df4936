//! Path library file parsers
//!
//! The three path files are ASCII PLY: a header terminated by `end_header`
//! giving the record count in an `element vertex N` line, followed by
//! whitespace separated records. The correspondence file is a little endian
//! binary adjacency list.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::io::{Cursor, ErrorKind};
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;
use nalgebra::Vector3;

use super::{CorrespondenceGrid, LibraryDims, PathLibError, PathMetrics};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Terminates each voxel's list in the correspondence file
const CORRESPONDENCE_SENTINEL: i16 = -1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Token reader over the contents of a PLY file.
struct PlyReader<'a> {
    tokens: SplitWhitespace<'a>,
    path: &'a Path,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a> PlyReader<'a> {
    fn new(content: &'a str, path: &'a Path) -> Self {
        Self {
            tokens: content.split_whitespace(),
            path,
        }
    }

    /// Read the header, returning the number of vertex records.
    fn read_header(&mut self) -> Result<usize, PathLibError> {
        let mut last = "";
        let mut count = None;

        loop {
            let token = self
                .tokens
                .next()
                .ok_or_else(|| PathLibError::Header(self.path.into()))?;

            if token == "end_header" {
                break;
            }

            if token == "vertex" && last == "element" {
                let n = self
                    .tokens
                    .next()
                    .and_then(|t| t.parse::<usize>().ok())
                    .ok_or_else(|| PathLibError::Header(self.path.into()))?;
                count = Some(n);
            }

            last = token;
        }

        count.ok_or_else(|| PathLibError::Header(self.path.into()))
    }

    /// Parse the next token of a record.
    fn next<T: FromStr>(&mut self) -> Result<T, PathLibError> {
        let token = self
            .tokens
            .next()
            .ok_or_else(|| PathLibError::ShortRead(self.path.into()))?;

        token
            .parse()
            .map_err(|_| PathLibError::BadRecord(self.path.into(), token.into()))
    }

    fn next_point(&mut self) -> Result<Vector3<f64>, PathLibError> {
        Ok(Vector3::new(self.next()?, self.next()?, self.next()?))
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Read a whole file, tagging any error with its path.
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, PathLibError> {
    std::fs::read(path).map_err(|e| PathLibError::FileOpen(path.into(), e))
}

/// Read a whole text file, tagging any error with its path.
pub(crate) fn read_text_file(path: &Path) -> Result<String, PathLibError> {
    std::fs::read_to_string(path).map_err(|e| PathLibError::FileOpen(path.into(), e))
}

/// Parse the start paths file, records `x y z group_id`.
///
/// Returns one point list per group. Records with an out of range group are
/// skipped.
pub fn parse_start_paths(
    content: &str,
    path: &Path,
    dims: &LibraryDims,
) -> Result<Vec<Vec<Vector3<f64>>>, PathLibError> {
    let mut reader = PlyReader::new(content, path);
    let num_records = reader.read_header()?;

    let mut start_paths = vec![Vec::new(); dims.group_num];
    let mut num_skipped = 0;

    for _ in 0..num_records {
        let point = reader.next_point()?;
        let group_id: i64 = reader.next()?;

        match index_in_range(group_id, dims.group_num) {
            Some(g) => start_paths[g].push(point),
            None => num_skipped += 1,
        }
    }

    warn_skipped(path, num_skipped);

    Ok(start_paths)
}

/// Parse the display paths file, records `x y z path_id intensity`.
///
/// Only one in every `display_path_stride` valid records is kept. Each kept
/// point is `[x, y, z, intensity]`.
pub fn parse_display_paths(
    content: &str,
    path: &Path,
    dims: &LibraryDims,
) -> Result<Vec<Vec<[f64; 4]>>, PathLibError> {
    let mut reader = PlyReader::new(content, path);
    let num_records = reader.read_header()?;

    let mut display_paths = vec![Vec::new(); dims.path_num];
    let mut since_kept = 0;
    let mut num_skipped = 0;

    for _ in 0..num_records {
        let point = reader.next_point()?;
        let path_id: i64 = reader.next()?;
        let intensity: f64 = reader.next()?;

        let id = match index_in_range(path_id, dims.path_num) {
            Some(id) => id,
            None => {
                num_skipped += 1;
                continue;
            }
        };

        since_kept += 1;
        if since_kept >= dims.display_path_stride {
            display_paths[id].push([point.x, point.y, point.z, intensity]);
            since_kept = 0;
        }
    }

    warn_skipped(path, num_skipped);

    Ok(display_paths)
}

/// Parse the path list file, records `end_x end_y end_z path_id group_id`.
///
/// The record count must equal the number of paths. The returned list holds
/// `None` for any path the file never described.
pub fn parse_path_list(
    content: &str,
    path: &Path,
    dims: &LibraryDims,
) -> Result<Vec<Option<PathMetrics>>, PathLibError> {
    let mut reader = PlyReader::new(content, path);
    let num_records = reader.read_header()?;

    if num_records != dims.path_num {
        return Err(PathLibError::CountMismatch {
            path: path.into(),
            expected: dims.path_num,
            found: num_records,
        });
    }

    let mut metrics = vec![None; dims.path_num];
    let mut num_skipped = 0;

    for _ in 0..num_records {
        let end = reader.next_point()?;
        let path_id: i64 = reader.next()?;
        let group_id: i64 = reader.next()?;

        match (
            index_in_range(path_id, dims.path_num),
            index_in_range(group_id, dims.group_num),
        ) {
            (Some(p), Some(g)) => metrics[p] = Some(PathMetrics::from_endpoint(&end, g)),
            _ => num_skipped += 1,
        }
    }

    warn_skipped(path, num_skipped);

    Ok(metrics)
}

/// Parse the binary correspondence file.
///
/// For each voxel in order: an `i32` voxel id followed by `i16` path ids up
/// to a `-1` sentinel. Ids out of range are skipped, running out of data
/// before the last sentinel is an error.
pub fn parse_correspondences(
    data: &[u8],
    path: &Path,
    dims: &LibraryDims,
) -> Result<CorrespondenceGrid, PathLibError> {
    let num_voxels = dims.grid_voxel_count();
    let mut voxels = vec![Vec::new(); num_voxels];
    let mut cursor = Cursor::new(data);
    let short_read = |e: std::io::Error| -> PathLibError {
        if e.kind() == ErrorKind::UnexpectedEof {
            PathLibError::ShortRead(path.into())
        } else {
            PathLibError::FileOpen(path.into(), e)
        }
    };

    let mut num_skipped = 0;

    for _ in 0..num_voxels {
        let voxel_id = cursor.read_i32::<LittleEndian>().map_err(short_read)?;
        let voxel = index_in_range(voxel_id as i64, num_voxels);

        loop {
            let path_id = cursor.read_i16::<LittleEndian>().map_err(short_read)?;
            if path_id == CORRESPONDENCE_SENTINEL {
                break;
            }

            match (voxel, index_in_range(path_id as i64, dims.path_num)) {
                (Some(v), Some(p)) => voxels[v].push(p as u16),
                _ => num_skipped += 1,
            }
        }
    }

    warn_skipped(path, num_skipped);

    Ok(CorrespondenceGrid { voxels })
}

/// Write a correspondence grid in the binary file format.
pub fn write_correspondences(grid: &CorrespondenceGrid) -> Vec<u8> {
    let mut data = Vec::new();

    for (voxel_id, paths) in grid.voxels.iter().enumerate() {
        data.extend_from_slice(&(voxel_id as i32).to_le_bytes());
        for p in paths {
            data.extend_from_slice(&(*p as i16).to_le_bytes());
        }
        data.extend_from_slice(&CORRESPONDENCE_SENTINEL.to_le_bytes());
    }

    data
}

/// Convert a raw id into an index if it is in `[0, num)`.
fn index_in_range(id: i64, num: usize) -> Option<usize> {
    if id >= 0 && (id as usize) < num {
        Some(id as usize)
    } else {
        None
    }
}

fn warn_skipped(path: &Path, num_skipped: usize) {
    if num_skipped > 0 {
        warn!("Skipped {} records with out of range ids in {:?}", num_skipped, path);
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
