//! Volume, disk and snapshot lifecycle management for Kompox applications.
//!
//! An application declares logical volumes once; this crate turns each one
//! into cloud resources (managed disks or file shares), keeps exactly one of
//! them assigned, provisions copies from named sources and bootstraps a fresh
//! application exactly once. All state lives in tags on the cloud resources
//! themselves, so every operation is idempotent or safely re-runnable rather
//! than transactional.
//!
//! The backend-independent port is [`VolumeDriver`]; [`AzureVolumes`] is the
//! shipped implementation and [`BootstrapCoordinator`] drives it for first
//! deployments.

pub mod app;
pub mod azure;
pub mod bootstrap;
pub mod config;
pub mod metadata;
pub mod naming;
pub mod source;
pub mod test_support;
pub mod volume;

pub use app::{App, ManifestError};
pub use azure::{ApiError, ArmClient, AzureVolumes, DiskDriver, DriverSettings, FilesDriver};
pub use bootstrap::{BootstrapCoordinator, BootstrapReport, BootstrapRequest};
pub use config::{AzureConfig, ConfigError, KompoxConfig};
pub use naming::{Hashes, NamingError};
pub use source::{Source, SourceResolver};
pub use volume::{
    DiskCreateRequest, LogicalVolume, SnapshotCreateRequest, VolumeClass, VolumeDisk,
    VolumeDriver, VolumeError, VolumeOptions, VolumeSnapshot, VolumeType,
};
