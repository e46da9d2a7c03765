//! Logical volumes and the backend-independent volume port.
//!
//! An application declares [`LogicalVolume`]s once. Each one is backed by
//! zero or more physical resources ([`VolumeDisk`]) of which at most one is
//! assigned, plus any number of [`VolumeSnapshot`]s. All operations go through
//! the [`VolumeDriver`] port, implemented per cloud provider.

mod assign;
mod error;
mod options;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::app::App;
use crate::naming::{NamingError, compact_id, validate_volume_name};

pub use assign::{AssignmentChange, plan_assignment};
pub use error::{AssignmentState, ResourceKind, VolumeError};
pub use options::{
    DiskOptions, DiskSku, FilesOptions, FilesProtocol, FilesSku, VolumeOptions, VolumeType,
};

/// Bytes in one gibibyte, the allocation unit of both backends.
pub const GIB: u64 = 1 << 30;

/// A named storage requirement declared by an application.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(try_from = "LogicalVolumeRecord")]
pub struct LogicalVolume {
    /// DNS label, unique within the application.
    pub name: String,
    /// Declared size in bytes.
    pub size_bytes: i64,
    /// Backend kind and its provisioning options.
    pub options: VolumeOptions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogicalVolumeRecord {
    name: String,
    #[serde(alias = "size")]
    size_bytes: i64,
    #[serde(default, rename = "type")]
    volume_type: VolumeType,
    #[serde(default)]
    options: Map<String, Value>,
}

impl TryFrom<LogicalVolumeRecord> for LogicalVolume {
    type Error = VolumeError;

    fn try_from(record: LogicalVolumeRecord) -> Result<Self, Self::Error> {
        let volume = Self {
            name: record.name,
            size_bytes: record.size_bytes,
            options: VolumeOptions::parse(record.volume_type, &record.options)?,
        };
        volume.validate()?;
        Ok(volume)
    }
}

impl LogicalVolume {
    /// Creates a volume declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, size_bytes: i64, options: VolumeOptions) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            options,
        }
    }

    /// Backend kind of this volume.
    #[must_use]
    pub const fn volume_type(&self) -> VolumeType {
        self.options.volume_type()
    }

    /// Checks the name and size.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::Validation`] for an invalid name or a
    /// non-positive size.
    pub fn validate(&self) -> Result<(), VolumeError> {
        validate_volume_name(&self.name)?;
        size_gib_ceil(self.size_bytes)?;
        Ok(())
    }
}

/// Rounds a byte size up to whole gibibytes.
///
/// # Errors
///
/// Returns [`VolumeError::Validation`] when the size is zero, negative, or too
/// large for the backend.
pub fn size_gib_ceil(size_bytes: i64) -> Result<i32, VolumeError> {
    let bytes = u64::try_from(size_bytes)
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| {
            VolumeError::Validation(format!("volume size must be positive, got {size_bytes}"))
        })?;
    i32::try_from(bytes.div_ceil(GIB))
        .map_err(|_| VolumeError::Validation(format!("volume size {size_bytes} is too large")))
}

/// Converts a whole-GiB size reported by a backend to bytes.
#[must_use]
pub fn gib_to_bytes(gib: i32) -> i64 {
    i64::from(gib) << 30
}

/// One physical resource (disk or file share) backing a logical volume.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VolumeDisk {
    /// Name unique within the volume.
    pub name: String,
    /// Owning logical volume.
    pub volume_name: String,
    /// Whether this is the live resource workloads mount.
    pub assigned: bool,
    /// Provisioned size in bytes.
    pub size_bytes: i64,
    /// Availability zone, `None` for regional resources.
    pub zone: Option<String>,
    /// SKU and performance values applied by the backend.
    pub options: VolumeOptions,
    /// Opaque backend identifier.
    pub handle: String,
    /// Creation time reported by the backend.
    pub created_at: DateTime<Utc>,
    /// Last update time reported by the backend.
    pub updated_at: DateTime<Utc>,
}

/// Point-in-time copy of a disk.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VolumeSnapshot {
    /// Name unique within the volume.
    pub name: String,
    /// Owning logical volume.
    pub volume_name: String,
    /// Size of the copied disk in bytes.
    pub size_bytes: i64,
    /// Opaque backend identifier.
    pub handle: String,
    /// Creation time reported by the backend.
    pub created_at: DateTime<Utc>,
    /// Last update time reported by the backend.
    pub updated_at: DateTime<Utc>,
}

/// Provisioning descriptor consumed by the Kubernetes manifest generator.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VolumeClass {
    /// Storage class name.
    pub storage_class_name: String,
    /// CSI driver name.
    pub csi_driver: String,
    /// Filesystem type, `None` when the driver decides.
    pub fs_type: Option<String>,
    /// CSI volume attributes.
    pub attributes: BTreeMap<String, String>,
    /// Access modes such as `ReadWriteOnce`.
    pub access_modes: Vec<String>,
    /// `Retain` or `Delete`.
    pub reclaim_policy: String,
    /// `Filesystem` or `Block`.
    pub volume_mode: String,
}

/// Parameters for creating a disk.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiskCreateRequest {
    /// Explicit disk name; a compact id is generated when absent.
    pub name: Option<String>,
    /// Source to copy from (see [`crate::source`]); blank when absent.
    pub source: Option<String>,
    /// Zone override; defaults to the application deployment zone.
    pub zone: Option<String>,
    /// Options overlaid on the volume's declared options.
    pub options: Option<VolumeOptions>,
}

impl DiskCreateRequest {
    /// Creates an empty request: generated name, blank disk.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the disk name.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = Some(value.into());
        self
    }

    /// Sets the copy source.
    #[must_use]
    pub fn source(mut self, value: impl Into<String>) -> Self {
        self.source = Some(value.into());
        self
    }

    /// Sets the zone override.
    #[must_use]
    pub fn zone(mut self, value: impl Into<String>) -> Self {
        self.zone = Some(value.into());
        self
    }

    /// Sets option overrides.
    #[must_use]
    pub fn options(mut self, value: VolumeOptions) -> Self {
        self.options = Some(value);
        self
    }

    /// Declared options with this request's overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::Validation`] when the overrides belong to a
    /// different backend than the declaration.
    pub fn effective_options(&self, declared: &VolumeOptions) -> Result<VolumeOptions, VolumeError> {
        self.options
            .as_ref()
            .map_or_else(|| Ok(declared.clone()), |extra| declared.overlay(extra))
    }
}

/// Returns the validated explicit name, or a fresh compact id when none was
/// given. The flag reports whether the name was explicit.
pub(crate) fn resource_name(
    explicit: Option<&String>,
    validate: fn(&str) -> Result<(), NamingError>,
) -> Result<(String, bool), VolumeError> {
    non_empty(explicit).map_or_else(
        || Ok((compact_id()?, false)),
        |name| {
            validate(name)?;
            Ok((name.to_owned(), true))
        },
    )
}

/// Parameters for creating a snapshot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SnapshotCreateRequest {
    /// Explicit snapshot name; a compact id is generated when absent.
    pub name: Option<String>,
    /// Disk to snapshot; the assigned disk when absent.
    pub source: Option<String>,
}

/// Returns the trimmed value when it is non-empty.
pub(crate) fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|raw| raw.trim()).filter(|raw| !raw.is_empty())
}

/// Future returned by [`VolumeDriver`] operations.
pub type VolumeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, VolumeError>> + Send + 'a>>;

/// Backend-independent volume port.
///
/// Every operation runs to completion within the call, polling long-running
/// backend mutations until they settle. Dropping the returned future stops
/// waiting but does not roll back a mutation already submitted.
pub trait VolumeDriver: Send + Sync {
    /// Lists the managed resources of a volume, newest first. Resources
    /// without the identity tags are ignored.
    fn disk_list<'a>(&'a self, app: &'a App, volume: &'a str)
    -> VolumeFuture<'a, Vec<VolumeDisk>>;

    /// Creates an unassigned resource for a volume.
    fn disk_create<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        request: &'a DiskCreateRequest,
    ) -> VolumeFuture<'a, VolumeDisk>;

    /// Deletes a resource; deleting a missing resource succeeds.
    fn disk_delete<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        disk: &'a str,
    ) -> VolumeFuture<'a, ()>;

    /// Converges the volume on `disk` being its only assigned resource.
    ///
    /// Not atomic across resources: see [`plan_assignment`]. Safe to re-run.
    fn disk_assign<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        disk: &'a str,
    ) -> VolumeFuture<'a, ()>;

    /// Lists snapshots of a volume, newest first.
    fn snapshot_list<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
    ) -> VolumeFuture<'a, Vec<VolumeSnapshot>>;

    /// Creates a snapshot of one of the volume's disks.
    fn snapshot_create<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        request: &'a SnapshotCreateRequest,
    ) -> VolumeFuture<'a, VolumeSnapshot>;

    /// Deletes a snapshot; deleting a missing snapshot succeeds.
    fn snapshot_delete<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        snapshot: &'a str,
    ) -> VolumeFuture<'a, ()>;

    /// Returns the provisioning descriptor for a volume. Pure.
    fn class(&self, volume: &LogicalVolume) -> VolumeClass;
}

/// Per-operation deadlines.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OperationTimeouts {
    /// Listing and tag reads.
    pub read: Duration,
    /// Creates, deletes and assignment updates.
    pub write: Duration,
    /// Source lookups.
    pub lookup: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(60),
            write: Duration::from_secs(120),
            lookup: Duration::from_secs(30),
        }
    }
}

/// Runs `operation` under `limit`, mapping expiry to [`VolumeError::Timeout`].
pub(crate) async fn with_timeout<T, F>(
    limit: Duration,
    operation: &'static str,
    target: &str,
    future: F,
) -> Result<T, VolumeError>
where
    F: Future<Output = Result<T, VolumeError>>,
{
    tokio::time::timeout(limit, future)
        .await
        .unwrap_or_else(|_| {
            Err(VolumeError::Timeout {
                operation,
                target: target.to_owned(),
            })
        })
}
