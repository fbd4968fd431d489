// src/types.rs

//! Small shared types and name validation.

use crate::errors::{MountsyncError, Result};

/// Canonical task name type.
pub type TaskName = String;

/// Canonical location name type.
pub type LocationName = String;

/// Names become file names in the store and arguments on command lines, so
/// they must be non-empty and free of separators and whitespace.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control());
    if bad {
        return Err(MountsyncError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert!(validate_name("photos").is_ok());
        assert!(validate_name("nas-backup_2").is_ok());
    }

    #[test]
    fn rejects_names_that_break_paths_or_args() {
        for bad in ["", ".", "..", "a/b", "a\\b", "two words", "tab\there"] {
            assert!(validate_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
