//! Cloud API seams used by the Azure volume drivers.
//!
//! [`crate::azure::ArmClient`] implements these against Azure Resource
//! Manager; [`crate::test_support::InMemoryCloud`] implements them in memory.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::metadata::Tags;
use crate::volume::{DiskSku, FilesSku};

use super::ApiError;

/// Future returned by cloud API calls.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// A managed disk as reported by the backend.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiskResource {
    /// Full resource identifier.
    pub id: String,
    /// Resource name.
    pub name: String,
    /// Availability zone, `None` for regional disks.
    pub zone: Option<String>,
    /// Provisioned size in GiB.
    pub size_gib: i32,
    /// SKU wire name.
    pub sku: Option<String>,
    /// Provisioned IOPS.
    pub iops: Option<i64>,
    /// Provisioned throughput in MB/s.
    pub mbps: Option<i64>,
    /// Resource tags.
    pub tags: Tags,
    /// Creation time.
    pub time_created: Option<DateTime<Utc>>,
}

/// How a new disk gets its initial content.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DiskCreation {
    /// Blank disk.
    Empty,
    /// Copy of an existing disk or snapshot.
    Copy {
        /// Resource identifier of the copy source.
        source_id: String,
    },
}

/// Parameters for creating a managed disk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiskSpec {
    /// Azure region.
    pub location: String,
    /// Availability zone, `None` for a regional disk.
    pub zone: Option<String>,
    /// Disk SKU.
    pub sku: DiskSku,
    /// Size in GiB.
    pub size_gib: i32,
    /// Provisioned IOPS.
    pub iops: Option<i64>,
    /// Provisioned throughput in MB/s.
    pub mbps: Option<i64>,
    /// Initial content.
    pub creation: DiskCreation,
    /// Resource tags.
    pub tags: Tags,
}

/// A disk snapshot as reported by the backend.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotResource {
    /// Full resource identifier.
    pub id: String,
    /// Resource name.
    pub name: String,
    /// Size of the source disk in GiB.
    pub size_gib: i32,
    /// Resource tags.
    pub tags: Tags,
    /// Creation time.
    pub time_created: Option<DateTime<Utc>>,
}

/// Parameters for creating a snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotSpec {
    /// Azure region.
    pub location: String,
    /// Resource identifier of the disk to copy.
    pub source_id: String,
    /// Resource tags.
    pub tags: Tags,
}

/// Parameters for creating a storage account.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageAccountSpec {
    /// Azure region.
    pub location: String,
    /// Account SKU.
    pub sku: FilesSku,
    /// Resource tags.
    pub tags: Tags,
}

/// A file share as reported by the backend.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileShareResource {
    /// Full resource identifier.
    pub id: String,
    /// Share name.
    pub name: String,
    /// Quota in GiB.
    pub quota_gib: i32,
    /// Share metadata.
    pub metadata: Tags,
    /// Last modification time.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Parameters for creating a file share.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileShareSpec {
    /// Quota in GiB.
    pub quota_gib: i32,
    /// Share metadata.
    pub metadata: Tags,
}

/// Resource group management shared by every driver.
pub trait ResourceGroupApi: Send + Sync {
    /// Creates the resource group when it does not exist. Existing groups are
    /// left untouched.
    fn ensure_resource_group<'a>(
        &'a self,
        name: &'a str,
        location: &'a str,
        tags: &'a Tags,
    ) -> ApiFuture<'a, ()>;
}

/// Managed disk and snapshot operations.
///
/// Mutations return once the backend reports a terminal state.
pub trait ComputeApi: ResourceGroupApi {
    /// Lists every disk in a resource group. A missing group is
    /// [`ApiError::NotFound`].
    fn list_disks<'a>(&'a self, resource_group: &'a str) -> ApiFuture<'a, Vec<DiskResource>>;

    /// Fetches one disk.
    fn get_disk<'a>(&'a self, resource_group: &'a str, name: &'a str)
    -> ApiFuture<'a, DiskResource>;

    /// Creates a disk and waits for provisioning to finish.
    fn create_disk<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
        spec: &'a DiskSpec,
    ) -> ApiFuture<'a, DiskResource>;

    /// Replaces the tags of a disk.
    fn update_disk_tags<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
        tags: &'a Tags,
    ) -> ApiFuture<'a, ()>;

    /// Deletes a disk. A missing disk is [`ApiError::NotFound`].
    fn delete_disk<'a>(&'a self, resource_group: &'a str, name: &'a str) -> ApiFuture<'a, ()>;

    /// Lists every snapshot in a resource group.
    fn list_snapshots<'a>(
        &'a self,
        resource_group: &'a str,
    ) -> ApiFuture<'a, Vec<SnapshotResource>>;

    /// Fetches one snapshot.
    fn get_snapshot<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
    ) -> ApiFuture<'a, SnapshotResource>;

    /// Creates a snapshot and waits for it to finish.
    fn create_snapshot<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
        spec: &'a SnapshotSpec,
    ) -> ApiFuture<'a, SnapshotResource>;

    /// Deletes a snapshot. A missing snapshot is [`ApiError::NotFound`].
    fn delete_snapshot<'a>(&'a self, resource_group: &'a str, name: &'a str)
    -> ApiFuture<'a, ()>;
}

/// Storage account and file share operations.
pub trait StorageApi: ResourceGroupApi {
    /// Returns whether the storage account exists.
    fn storage_account_exists<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
    ) -> ApiFuture<'a, bool>;

    /// Creates a storage account and waits for provisioning to finish.
    fn create_storage_account<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        spec: &'a StorageAccountSpec,
    ) -> ApiFuture<'a, ()>;

    /// Lists shares with their metadata. A missing account is
    /// [`ApiError::NotFound`].
    fn list_shares<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
    ) -> ApiFuture<'a, Vec<FileShareResource>>;

    /// Fetches one share with its metadata.
    fn get_share<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
    ) -> ApiFuture<'a, FileShareResource>;

    /// Creates a share.
    fn create_share<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
        spec: &'a FileShareSpec,
    ) -> ApiFuture<'a, FileShareResource>;

    /// Replaces the metadata of a share.
    fn update_share_metadata<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
        metadata: &'a Tags,
    ) -> ApiFuture<'a, ()>;

    /// Deletes a share. A missing share is [`ApiError::NotFound`].
    fn delete_share<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
    ) -> ApiFuture<'a, ()>;
}
