//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (LPL_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot read the parameter file {0:?}: {1}")]
    DeserialiseError(PathBuf, toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the path to the parameters directory, `$LPL_SW_ROOT/params`.
pub fn params_dir() -> Result<PathBuf, LoadError> {
    let mut path = crate::host::get_sw_root()
        .map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");

    Ok(path)
}

/// Load a parameter file
///
/// The file path is relative to the software root's `params` directory.
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError> 
where
    P: DeserializeOwned
{
    let mut path = params_dir()?;
    path.push(param_file_path);

    load_from_path(path)
}

/// Load a parameter file from an explicit path.
pub fn load_from_path<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>
{
    let path = path.as_ref().to_path_buf();

    // Load the file into a string
    let params_str = read_to_string(&path)
        .map_err(|e| LoadError::FileLoadError(path.clone(), e))?;

    // Parse the string into the parameter struct
    toml::from_str(params_str.as_str())
        .map_err(|e| LoadError::DeserialiseError(path, e))
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Dummy {
        gain: f64,
        enabled: bool
    }

    #[test]
    fn test_load_from_path() {
        let mut path = std::env::temp_dir();
        path.push(format!("lpl_params_test_{}.toml", std::process::id()));
        std::fs::write(&path, "gain = 0.4\nenabled = true\n").unwrap();

        let dummy: Dummy = load_from_path(&path).unwrap();
        assert_eq!(dummy.gain, 0.4);
        assert!(dummy.enabled);

        std::fs::write(&path, "gain = \"oops\"\n").unwrap();
        match load_from_path::<Dummy, _>(&path) {
            Err(LoadError::DeserialiseError(_, _)) => (),
            _ => panic!("Expected a deserialise error")
        }

        std::fs::remove_file(&path).ok();
    }
}
