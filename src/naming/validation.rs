//! DNS-1123 label validation for logical volume, disk and snapshot names.

use std::sync::LazyLock;

use regex::Regex;

use super::NamingError;

/// Maximum length of a logical volume name.
pub const VOLUME_NAME_MAX_LEN: usize = 16;
/// Maximum length of a disk name.
pub const DISK_NAME_MAX_LEN: usize = 24;
/// Maximum length of a snapshot name.
pub const SNAPSHOT_NAME_MAX_LEN: usize = 24;

static DNS_LABEL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").ok());

fn validate_label(name: &str, max_len: usize, kind: &'static str) -> Result<(), NamingError> {
    let reject = |reason: String| NamingError::InvalidName {
        kind,
        name: name.to_owned(),
        reason,
    };
    if name.is_empty() {
        return Err(reject(String::from("must not be empty")));
    }
    if name.len() > max_len {
        return Err(reject(format!("exceeds {max_len} characters")));
    }
    let matches = DNS_LABEL.as_ref().is_some_and(|re| re.is_match(name));
    if !matches {
        return Err(reject(String::from(
            "must consist of lowercase alphanumerics or '-', and start and end with an alphanumeric",
        )));
    }
    Ok(())
}

/// Validates a logical volume name.
///
/// # Errors
///
/// Returns [`NamingError::InvalidName`] when the name is empty, longer than
/// [`VOLUME_NAME_MAX_LEN`], or not a DNS-1123 label.
pub fn validate_volume_name(name: &str) -> Result<(), NamingError> {
    validate_label(name, VOLUME_NAME_MAX_LEN, "volume")
}

/// Validates a disk name.
///
/// # Errors
///
/// Returns [`NamingError::InvalidName`] when the name is empty, longer than
/// [`DISK_NAME_MAX_LEN`], or not a DNS-1123 label.
pub fn validate_disk_name(name: &str) -> Result<(), NamingError> {
    validate_label(name, DISK_NAME_MAX_LEN, "disk")
}

/// Validates a snapshot name.
///
/// # Errors
///
/// Returns [`NamingError::InvalidName`] when the name is empty, longer than
/// [`SNAPSHOT_NAME_MAX_LEN`], or not a DNS-1123 label.
pub fn validate_snapshot_name(name: &str) -> Result<(), NamingError> {
    validate_label(name, SNAPSHOT_NAME_MAX_LEN, "snapshot")
}
