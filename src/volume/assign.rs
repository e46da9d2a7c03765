//! Assignment convergence.
//!
//! The "at most one assigned disk per volume" invariant lives in resource tags
//! and cannot be updated atomically across resources. [`plan_assignment`]
//! computes the minimal set of tag writes that converges a volume on a single
//! assigned disk; drivers apply the plan one resource at a time. A failure or
//! crash partway through leaves zero or several disks assigned, and running
//! the same assignment again restores the invariant. Concurrent assignments
//! on one volume race, and the last write per disk wins.

use super::{ResourceKind, VolumeDisk, VolumeError};

/// One tag write required to converge a volume's assignment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AssignmentChange {
    /// Disk whose assigned tag must change.
    pub disk: String,
    /// Value the assigned tag must take.
    pub assigned: bool,
}

/// Computes the tag writes that leave exactly `target` assigned.
///
/// Disks whose tag already matches are skipped, so the plan for an already
/// converged volume is empty.
///
/// # Errors
///
/// Returns [`VolumeError::NotFound`] when `target` is not among `disks`.
pub fn plan_assignment(
    volume: &str,
    disks: &[VolumeDisk],
    target: &str,
) -> Result<Vec<AssignmentChange>, VolumeError> {
    if !disks.iter().any(|disk| disk.name == target) {
        return Err(VolumeError::NotFound {
            kind: ResourceKind::Disk,
            volume: volume.to_owned(),
            name: target.to_owned(),
        });
    }
    Ok(disks
        .iter()
        .filter_map(|disk| {
            let wanted = disk.name == target;
            (disk.assigned != wanted).then(|| AssignmentChange {
                disk: disk.name.clone(),
                assigned: wanted,
            })
        })
        .collect())
}
