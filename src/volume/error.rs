//! Error taxonomy shared by every volume operation.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::azure::ApiError;
use crate::naming::NamingError;

use super::VolumeType;

/// Kind of resource an error refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A logical volume declared by the application.
    Volume,
    /// A disk or file share backing a logical volume.
    Disk,
    /// A point-in-time snapshot of a disk.
    Snapshot,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Volume => "volume",
            Self::Disk => "disk",
            Self::Snapshot => "snapshot",
        })
    }
}

/// Assigned and total resource counts observed for one volume.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AssignmentState {
    /// Logical volume name.
    pub volume: String,
    /// Number of resources tagged as assigned.
    pub assigned: usize,
    /// Number of managed resources found.
    pub total: usize,
}

impl fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(assigned={},total={})",
            self.volume, self.assigned, self.total
        )
    }
}

fn render_states(states: &[AssignmentState]) -> String {
    states
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Errors returned by volume, disk and snapshot operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VolumeError {
    /// Raised before any backend call when an input is malformed.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Raised when the target resource does not exist.
    #[error("{kind} `{name}` not found in volume `{volume}`")]
    NotFound {
        /// Kind of the missing resource.
        kind: ResourceKind,
        /// Owning logical volume.
        volume: String,
        /// Missing resource name or identifier.
        name: String,
    },
    /// Raised when an explicit create collides with an existing name.
    #[error("{kind} `{name}` already exists in volume `{volume}`")]
    AlreadyExists {
        /// Kind of the colliding resource.
        kind: ResourceKind,
        /// Owning logical volume.
        volume: String,
        /// Colliding name.
        name: String,
    },
    /// Raised when the backend has no such operation.
    #[error("{operation} is not supported for type={volume_type} volumes")]
    Unsupported {
        /// Operation that was requested.
        operation: &'static str,
        /// Backend kind that rejected it.
        volume_type: VolumeType,
    },
    /// Raised by bootstrap when assignment counts are mixed across volumes.
    #[error("bootstrap invalid state: {}", render_states(.states))]
    InvalidState {
        /// Per-volume counts, sorted by volume name.
        states: Vec<AssignmentState>,
    },
    /// Raised by bootstrap when a concurrent run assigned a disk first.
    #[error("bootstrap aborted: concurrent assignment detected for volume `{volume}`")]
    BootstrapAborted {
        /// Volume that gained an assigned resource during bootstrap.
        volume: String,
    },
    /// Raised when an operation exceeds its deadline.
    #[error("timed out during {operation} on {target}")]
    Timeout {
        /// Operation that was in flight.
        operation: &'static str,
        /// Resource being operated on.
        target: String,
    },
    /// Wrapper for backend and network failures.
    #[error("{operation} failed for {target}: {source}")]
    Transient {
        /// Operation that failed.
        operation: &'static str,
        /// Resource being operated on.
        target: String,
        /// Underlying cloud API error.
        #[source]
        source: ApiError,
    },
}

impl VolumeError {
    /// Wraps a cloud API error with operation context.
    #[must_use]
    pub fn transient(operation: &'static str, target: impl Into<String>, source: ApiError) -> Self {
        Self::Transient {
            operation,
            target: target.into(),
            source,
        }
    }

    /// Returns true for [`VolumeError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<NamingError> for VolumeError {
    fn from(value: NamingError) -> Self {
        Self::Validation(value.to_string())
    }
}
