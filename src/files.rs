//! Save- and config-file path resolution.
use std::path::Path;

use crate::{
    error::{ErrorCode, RuntimeError},
    recoverable_error,
};

/// Finds the first unused numbered filename: `base-01.suffix`,
/// `base-02.suffix`, ...
pub fn first_available(base: &str, suffix: &str) -> Result<String, RuntimeError> {
    let mut n = 1;
    loop {
        let filename = format!("{}-{:02}.{}", base, n, suffix);
        match Path::new(&filename).try_exists() {
            Ok(b) => {
                if !b {
                    return Ok(filename);
                }
            }
            Err(e) => return recoverable_error!(ErrorCode::FileError, "{}", e),
        }

        n += 1;
    }
}

/// Finds the most recent numbered filename, falling back to
/// `base.suffix` when none exist.
pub fn last_existing(base: &str, suffix: &str) -> Result<String, RuntimeError> {
    let mut n = 1;
    loop {
        let filename = format!("{}-{:02}.{}", base, n, suffix);
        match Path::new(&filename).try_exists() {
            Ok(b) => {
                if !b {
                    if n > 1 {
                        return Ok(format!("{}-{:02}.{}", base, n - 1, suffix));
                    } else {
                        return Ok(format!("{}.{}", base, suffix));
                    }
                }
            }
            Err(e) => return recoverable_error!(ErrorCode::FileError, "{}", e),
        }

        n += 1;
    }
}

/// Looks for `name` under the `.gnusto` directory in the user's home.
pub fn config_file(name: &str) -> Option<String> {
    if let Some(home) = dirs::home_dir() {
        let filename = format!("{}/.gnusto/{}", home.display(), name);
        match Path::new(&filename).try_exists() {
            Ok(b) => {
                if b {
                    Some(filename)
                } else {
                    None
                }
            }
            Err(e) => {
                info!(target: "app::trace", "Error checking existence of {}: {}", filename, e);
                None
            }
        }
    } else {
        None
    }
}

/// The autosave path for a story, under the `.gnusto` directory. The
/// file need not exist yet.
pub fn autosave_file(base: &str) -> Option<String> {
    dirs::home_dir().map(|home| format!("{}/.gnusto/autosave-{}.bfzs", home.display(), base))
}

pub fn check_existing(filename: &str) -> Option<String> {
    match Path::new(&filename).try_exists() {
        Ok(b) => {
            if b {
                Some(filename.to_string())
            } else {
                None
            }
        }
        Err(e) => {
            info!(target: "app::trace", "Error checking existence of {}: {}", filename, e);
            None
        }
    }
}
