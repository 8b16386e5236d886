//! Name validation for every caller-supplied bucket name and object id.
//!
//! Bucket names and object ids become directory and file names under the
//! storage root, so anything that could escape that root or that the host
//! filesystem cannot represent is rejected here, before any filesystem
//! access happens.

use super::object_store::{StoreError, StoreResult};

/// Parent-directory traversal sequence.
const TRAVERSAL: &str = "..";

/// Characters the host platform does not allow inside a single entry name.
#[cfg(windows)]
const ILLEGAL_CHARS: &[char] = &['"', '<', '>', '|', ':', '*', '?', '\\', '/'];
#[cfg(not(windows))]
const ILLEGAL_CHARS: &[char] = &['\0', '/'];

fn is_illegal(c: char) -> bool {
    ILLEGAL_CHARS.contains(&c) || (cfg!(windows) && c.is_ascii_control())
}

/// Reject blank values. `label` names the field in the error message.
pub fn ensure_not_blank(label: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidName(format!(
            "The {label} may not be empty or whitespace"
        )));
    }
    Ok(())
}

/// Validate a value that will be used as a single path component.
pub fn ensure_safe_component(label: &str, value: &str) -> StoreResult<()> {
    ensure_not_blank(label, value)?;

    // `.` resolves to the parent directory itself.
    if value.contains(TRAVERSAL) || value == "." || value.chars().any(is_illegal) {
        return Err(StoreError::InvalidName(format!(
            "The {label} contains invalid characters"
        )));
    }
    Ok(())
}

pub fn ensure_bucket_name(bucket: &str) -> StoreResult<()> {
    ensure_safe_component("bucket name", bucket)
}

pub fn ensure_object_id(id: &str) -> StoreResult<()> {
    ensure_safe_component("object id", id)
}
