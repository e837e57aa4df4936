//! Struct archiving functionality
//!
//! To add archiving functionality to a struct implement the `Archived` trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::path::Path;
use std::fs::{File, OpenOptions};
use csv::WriterBuilder;
pub use csv::Writer;
use serde::Serialize;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
///
/// Each call to [`Archiver::serialise`] appends one row, the header row is
/// derived from the field names of the first record.
#[derive(Default)]
pub struct Archiver {
    writer: Option<Writer<File>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Could not open the archive file: {0}")]
    OpenError(std::io::Error),

    #[error("Could not write the record: {0}")]
    WriteError(csv::Error),

    #[error("Could not flush the archive: {0}")]
    FlushError(std::io::Error),

    #[error("The archiver has not been initialised")]
    NotInitialised
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A trait which enables a struct to be archived as a csv.
///
/// To implement this trait, the struct shall have an `Archiver` member which
/// shall be setup in the struct's `init` or `new` functions. 
pub trait Archived {
    /// Write the archives for this struct
    fn write(&mut self) -> Result<(), ArchiveError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    pub fn from_session<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, ArchiveError> {
        Self::from_path(&session.arch_root, path)
    }

    /// Create a new archiver writing to `path` inside `dir`. Any existing
    /// file at that location is truncated.
    pub fn from_path<D: AsRef<Path>, P: AsRef<Path>>(
        dir: D, path: P
    ) -> Result<Self, ArchiveError> {
        let full_path = dir.as_ref().join(path);
        
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(full_path)
            .map_err(ArchiveError::OpenError)?;

        let w = WriterBuilder::new()
            .has_headers(true)
            .from_writer(file);

        Ok(Self {
            writer: Some(w)
        })
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: Serialize>(
        &mut self, record: T
    ) -> Result<(), ArchiveError> {
        match self.writer {
            Some(ref mut w) => {
                w.serialize(record).map_err(ArchiveError::WriteError)?;
                w.flush().map_err(ArchiveError::FlushError)
            },
            None => Err(ArchiveError::NotInitialised)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        x_m: f64,
        time_s: f64
    }

    #[test]
    fn test_archiver_writes_header_once() {
        let dir = std::env::temp_dir();
        let name = format!("lpl_archive_test_{}.csv", std::process::id());

        let mut arch = Archiver::from_path(&dir, &name).unwrap();
        arch.serialise(Row { x_m: 1.0, time_s: 0.5 }).unwrap();
        arch.serialise(Row { x_m: 2.0, time_s: 0.6 }).unwrap();

        let contents = std::fs::read_to_string(dir.join(&name)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["x_m,time_s", "1.0,0.5", "2.0,0.6"]);

        std::fs::remove_file(dir.join(&name)).ok();
    }

    #[test]
    fn test_uninit_archiver_errors() {
        let mut arch = Archiver::default();
        match arch.serialise(Row { x_m: 0.0, time_s: 0.0 }) {
            Err(ArchiveError::NotInitialised) => (),
            _ => panic!("Expected NotInitialised")
        }
    }
}
