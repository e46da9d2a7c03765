//! Deterministic identity for cloud resources.
//!
//! Every cloud resource created for an application is addressed by a name
//! derived from a short content hash of the owning workspace, provider,
//! cluster and app. Names are clamped to provider length limits with
//! [`safe_name`], which never truncates the hash suffix.

mod compact_id;
mod validation;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub use compact_id::{compact_id, compact_id_at};
pub use validation::{
    DISK_NAME_MAX_LEN, SNAPSHOT_NAME_MAX_LEN, VOLUME_NAME_MAX_LEN, validate_disk_name,
    validate_snapshot_name, validate_volume_name,
};

/// Hex length of the hashes embedded in resource names.
pub const HASH_LEN: usize = 6;

/// Errors raised while deriving resource names.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum NamingError {
    /// Raised when the hash suffix alone does not fit the length budget.
    #[error("hash `{hash}` does not fit in a {max_len}-character name")]
    HashTooLong {
        /// Hash that had to be preserved.
        hash: String,
        /// Maximum name length requested by the caller.
        max_len: usize,
    },
    /// Raised when a logical name is not a valid DNS-1123 label.
    #[error("invalid {kind} name `{name}`: {reason}")]
    InvalidName {
        /// Kind of name being validated (`volume`, `disk`, `snapshot`).
        kind: &'static str,
        /// Offending name.
        name: String,
        /// Reason the name was rejected.
        reason: String,
    },
    /// Raised when a compact identifier cannot be generated.
    #[error("compact id generation failed: {0}")]
    CompactId(String),
}

/// Returns the first `len` hex characters of the SHA-256 digest of `input`.
///
/// `len` is clamped to the digest length.
#[must_use]
pub fn short_hash(input: &str, len: usize) -> String {
    let digest = hex::encode(Sha256::digest(input.as_bytes()));
    digest.chars().take(len).collect()
}

/// Returns the stable identity token for a resource scope.
///
/// Empty `cluster` or `app` narrow the scope; the same inputs always yield the
/// same token.
#[must_use]
pub fn hash(workspace: &str, provider: &str, cluster: &str, app: &str) -> String {
    short_hash(&format!("{workspace}:{provider}:{cluster}:{app}"), HASH_LEN)
}

/// Joins `base` and `hash` with `_`, truncating `base` so the result fits in
/// `max_len` bytes. The hash suffix is always kept whole.
///
/// # Errors
///
/// Returns [`NamingError::HashTooLong`] when `hash.len() + 1 > max_len`.
pub fn safe_name(base: &str, hash: &str, max_len: usize) -> Result<String, NamingError> {
    let Some(budget) = max_len.checked_sub(hash.len() + 1) else {
        return Err(NamingError::HashTooLong {
            hash: hash.to_owned(),
            max_len,
        });
    };
    let mut cut = base.len().min(budget);
    while !base.is_char_boundary(cut) {
        cut -= 1;
    }
    let kept = base.get(..cut).unwrap_or_default();
    Ok(format!("{kept}_{hash}"))
}

/// Hierarchical short hashes for one (workspace, provider, cluster, app)
/// tuple.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Hashes {
    /// `workspace`
    pub workspace: String,
    /// `workspace:provider`
    pub provider: String,
    /// `workspace:provider:cluster`
    pub cluster: String,
    /// `workspace:provider:app`, independent of the cluster the app runs on.
    pub app_id: String,
    /// `workspace:provider:cluster:app`
    pub app_instance: String,
}

impl Hashes {
    /// Computes all scope hashes for the given identifiers.
    #[must_use]
    pub fn new(workspace: &str, provider: &str, cluster: &str, app: &str) -> Self {
        Self {
            workspace: short_hash(workspace, HASH_LEN),
            provider: short_hash(&format!("{workspace}:{provider}"), HASH_LEN),
            cluster: short_hash(&format!("{workspace}:{provider}:{cluster}"), HASH_LEN),
            app_id: short_hash(&format!("{workspace}:{provider}:{app}"), HASH_LEN),
            app_instance: hash(workspace, provider, cluster, app),
        }
    }

    /// Name shared by the PV and PVC objects rendered for a volume handle:
    /// `kompox-{volume}-{app_id}-{handle hash}`.
    #[must_use]
    pub fn volume_resource_name(&self, volume: &str, handle: &str) -> String {
        format!(
            "kompox-{volume}-{}-{}",
            self.app_id,
            short_hash(handle, HASH_LEN)
        )
    }
}
