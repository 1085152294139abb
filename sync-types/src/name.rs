//! File name rules for the flat synchronized folder.

use crate::WireError;

/// Longest accepted file name in bytes.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Check that `name` addresses a single entry directly inside the folder.
///
/// The protocol has no notion of subdirectories, so separators and the
/// `.`/`..` entries are rejected outright.
pub fn validate_file_name(name: &str) -> Result<(), WireError> {
    let reject = |reason| {
        Err(WireError::InvalidFileName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject("empty");
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return reject("too long");
    }
    if name == "." || name == ".." {
        return reject("reserved name");
    }
    if name.contains(['/', '\\']) {
        return reject("contains a path separator");
    }
    if name.contains('\0') {
        return reject("contains NUL");
    }
    Ok(())
}
