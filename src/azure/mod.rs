//! Azure provider for logical volumes.
//!
//! Disk volumes map to managed disks and snapshots; files volumes map to
//! Azure Files shares in a storage account shared by the whole app. Both live
//! in the app's resource group and carry their identity in tags (disks and
//! snapshots) or share metadata (shares).

mod api;
mod client;
mod disk;
mod error;
mod files;
mod naming;
mod volumes;

use crate::config::{AzureConfig, ConfigError, KompoxConfig};
use crate::volume::OperationTimeouts;

pub use api::{
    ApiFuture, ComputeApi, DiskCreation, DiskResource, DiskSpec, FileShareResource, FileShareSpec,
    ResourceGroupApi, SnapshotResource, SnapshotSpec, StorageAccountSpec, StorageApi,
};
pub use client::ArmClient;
pub use disk::DiskDriver;
pub use error::ApiError;
pub use files::FilesDriver;
pub use naming::{
    MAX_RESOURCE_NAME_LEN, MAX_RESOURCE_PREFIX_LEN, MAX_SHARE_NAME_LEN, ResourceNamer,
};
pub use volumes::AzureVolumes;

/// Settings shared by the disk and files drivers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DriverSettings {
    /// Resource naming for the configured workspace and provider.
    pub namer: ResourceNamer,
    /// Region for new resource groups, disks, snapshots and accounts.
    pub location: String,
    /// DNS suffix used to build share handles.
    pub storage_endpoint_suffix: String,
    /// Per-operation deadlines.
    pub timeouts: OperationTimeouts,
}

impl DriverSettings {
    /// Creates settings with default timeouts and the public cloud storage
    /// suffix.
    #[must_use]
    pub fn new(namer: ResourceNamer, location: impl Into<String>) -> Self {
        Self {
            namer,
            location: location.into(),
            storage_endpoint_suffix: String::from("core.windows.net"),
            timeouts: OperationTimeouts::default(),
        }
    }

    /// Overrides the per-operation deadlines.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: OperationTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Builds settings from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when either configuration fails validation.
    pub fn from_config(azure: &AzureConfig, kompox: &KompoxConfig) -> Result<Self, ConfigError> {
        kompox.validate()?;
        azure.validate()?;
        let namer = ResourceNamer::new(
            kompox.workspace_name.as_str(),
            kompox.provider_name.as_str(),
            kompox.resource_prefix.as_str(),
        )
        .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(Self {
            namer,
            location: azure.location.clone(),
            storage_endpoint_suffix: azure.storage_endpoint_suffix.clone(),
            timeouts: kompox.timeouts(),
        })
    }
}
