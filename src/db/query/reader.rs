use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Result, ScriptError};

/// Read a script file in full.
///
/// `None` or an empty path is an invalid argument; a missing path is
/// `NotFound`; directories and unreadable files are `NotReadable`.
pub fn read_script(path: Option<&Path>) -> Result<String> {
    let path = match path {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => {
            return Err(ScriptError::InvalidArgument(
                "script path must not be empty".to_string(),
            ))
        }
    };

    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ScriptError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(err) => {
            return Err(ScriptError::NotReadable {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })
        }
    };

    if metadata.is_dir() {
        return Err(ScriptError::NotReadable {
            path: path.to_path_buf(),
            reason: "is a directory".to_string(),
        });
    }

    fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ScriptError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ScriptError::NotReadable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        },
    })
}
