//! # Replay script interpreter module
//!
//! This module provides an interpreter for replay scripts, allowing a
//! recorded or hand-written sequence of inputs (poses, clouds, goals,
//! operator commands) to be fed into the executable without a network.
//!
//! A script is a sequence of entries of the form `<time_s>: <json>;` where
//! the JSON payload is a serialised [`InputMsg`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::fs;
use regex::RegexBuilder;
use thiserror::Error;

// Internal
use comms_if::msg::{InputMsg, MsgParseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An input which is scripted to occur at a specific time.
pub struct ScriptedInput {
    /// The time the input is supposed to be delivered at
    exec_time_s: f64,

    /// The input to deliver
    msg: InputMsg
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use `.get_pending` to
/// acquire a list of inputs that need delivering.
pub struct ScriptInterpreter {
    script_path: PathBuf,
    inputs: VecDeque<ScriptedInput>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an invalid input at {0} s: {1}")]
    InvalidInput(f64, MsgParseError),

    #[error("Script entry at {0} s is earlier than the entry before it")]
    OutOfOrder(f64),

    #[error("Could not build the script pattern: {0}")]
    PatternError(regex::Error)
}

pub enum PendingInputs {
    None,
    Some(Vec<InputMsg>),
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {

        // Get the path in a buffer
        let path = PathBuf::from(script_path.as_ref());
        
        // Check that the script file exists.
        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        // Load the script into a string
        let script = fs::read_to_string(&path)
            .map_err(ScriptError::ScriptLoadError)?;

        let mut si = Self::from_str(&script)?;
        si.script_path = path;

        Ok(si)
    }

    /// Parse a script from a string.
    pub fn from_str(script: &str) -> Result<Self, ScriptError> {
        let mut queue: VecDeque<ScriptedInput> = VecDeque::new();

        // Go through the script executing __the magic regex__.
        let re = RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .map_err(ScriptError::PatternError)?;

        for cap in re.captures_iter(script) {
            let time_str = cap.get(1).map(|m| m.as_str()).unwrap_or("");
            let payload = cap.get(3).map(|m| m.as_str()).unwrap_or("");

            // Parse the exec time
            let exec_time_s: f64 = time_str.parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            if let Some(last) = queue.back() {
                if exec_time_s < last.exec_time_s {
                    return Err(ScriptError::OutOfOrder(exec_time_s))
                }
            }

            // Parse the input from the payload. The scripts contain JSON only.
            let msg = InputMsg::from_json(payload)
                .map_err(|e| ScriptError::InvalidInput(exec_time_s, e))?;

            queue.push_back(ScriptedInput {
                exec_time_s,
                msg
            });
        }

        if queue.is_empty() {
            return Err(ScriptError::ScriptEmpty)
        }

        Ok(ScriptInterpreter {
            script_path: PathBuf::new(),
            inputs: queue
        })
    }

    /// Return the inputs whose time is at or before `current_time_s`.
    pub fn get_pending(&mut self, current_time_s: f64) -> PendingInputs {

        // If the queue is empty the script is over and we return the end of
        // script variant
        if self.inputs.is_empty() {
            return PendingInputs::EndOfScript
        }

        let mut pending: Vec<InputMsg> = vec![];

        // Pop items from the queue until their exec time is in the future
        while let Some(front) = self.inputs.front() {
            if front.exec_time_s > current_time_s {
                break;
            }
            if let Some(input) = self.inputs.pop_front() {
                pending.push(input.msg);
            }
        }

        if pending.is_empty() {
            PendingInputs::None
        }
        else {
            PendingInputs::Some(pending)
        }
    }

    /// Get the path the script was loaded from, empty for scripts parsed
    /// from a string.
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// Get the number of inputs remaining in the script
    pub fn get_num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.inputs.back() {
            Some(c) => c.exec_time_s,
            None => 0f64
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = r#"
        0.0: {"Goal": {"time_s": 0.0, "point": [5.0, 0.0, 1.0]}};
        0.5: {"AutoMode": {"time_s": 0.5, "value": 0.8}};
        0.5: {"ClearCloud": {"time_s": 0.5}};
        2.0: {"Speed": {"time_s": 2.0, "value": 0.5}};
    "#;

    #[test]
    fn test_script_pending() {
        let mut si = ScriptInterpreter::from_str(SCRIPT).unwrap();

        assert_eq!(si.get_num_inputs(), 4);
        assert_eq!(si.get_duration(), 2.0);

        match si.get_pending(0.6) {
            PendingInputs::Some(v) => assert_eq!(v.len(), 3),
            _ => panic!("Expected three pending inputs")
        }
        match si.get_pending(1.0) {
            PendingInputs::None => (),
            _ => panic!("Expected no pending inputs")
        }
        match si.get_pending(2.0) {
            PendingInputs::Some(v) => match v[0] {
                InputMsg::Speed(ref s) => assert_eq!(s.value, 0.5),
                _ => panic!("Expected a speed input")
            },
            _ => panic!("Expected one pending input")
        }
        match si.get_pending(3.0) {
            PendingInputs::EndOfScript => (),
            _ => panic!("Expected the end of the script")
        }
    }

    #[test]
    fn test_script_errors() {
        assert!(matches!(
            ScriptInterpreter::from_str("nothing here"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::from_str("1.0: {\"Bogus\": {}};"),
            Err(ScriptError::InvalidInput(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::from_str(
                "1.0: {\"ClearCloud\": {\"time_s\": 1.0}};\n0.5: {\"ClearCloud\": {\"time_s\": 0.5}};"
            ),
            Err(ScriptError::OutOfOrder(_))
        ));
    }
}
