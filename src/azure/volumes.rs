//! Dispatching volume port over the disk and files drivers.

use std::sync::Arc;

use crate::app::App;
use crate::volume::{
    DiskCreateRequest, LogicalVolume, SnapshotCreateRequest, VolumeClass, VolumeDisk,
    VolumeDriver, VolumeError, VolumeFuture, VolumeSnapshot, VolumeType,
};

use super::api::{ComputeApi, StorageApi};
use super::{DiskDriver, DriverSettings, FilesDriver};

/// Routes each operation to the driver for the volume's declared type.
pub struct AzureVolumes<C> {
    disk: DiskDriver<C>,
    files: FilesDriver<C>,
}

impl<C: ComputeApi + StorageApi> AzureVolumes<C> {
    /// Creates the port over one cloud client shared by both drivers.
    #[must_use]
    pub fn new(cloud: Arc<C>, settings: DriverSettings) -> Self {
        Self {
            disk: DiskDriver::new(Arc::clone(&cloud), settings.clone()),
            files: FilesDriver::new(cloud, settings),
        }
    }

    /// The managed disk driver.
    #[must_use]
    pub const fn disk_driver(&self) -> &DiskDriver<C> {
        &self.disk
    }

    /// The Azure Files driver.
    #[must_use]
    pub const fn files_driver(&self) -> &FilesDriver<C> {
        &self.files
    }

    fn driver_for(&self, volume_type: VolumeType) -> &dyn VolumeDriver {
        match volume_type {
            VolumeType::Disk => &self.disk,
            VolumeType::Files => &self.files,
        }
    }

    fn route(&self, app: &App, volume: &str) -> Result<&dyn VolumeDriver, VolumeError> {
        Ok(self.driver_for(app.find_volume(volume)?.volume_type()))
    }
}

impl<C: ComputeApi + StorageApi> VolumeDriver for AzureVolumes<C> {
    fn disk_list<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
    ) -> VolumeFuture<'a, Vec<VolumeDisk>> {
        Box::pin(async move { self.route(app, volume)?.disk_list(app, volume).await })
    }

    fn disk_create<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        request: &'a DiskCreateRequest,
    ) -> VolumeFuture<'a, VolumeDisk> {
        Box::pin(async move {
            self.route(app, volume)?
                .disk_create(app, volume, request)
                .await
        })
    }

    fn disk_delete<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        disk: &'a str,
    ) -> VolumeFuture<'a, ()> {
        Box::pin(async move { self.route(app, volume)?.disk_delete(app, volume, disk).await })
    }

    fn disk_assign<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        disk: &'a str,
    ) -> VolumeFuture<'a, ()> {
        Box::pin(async move { self.route(app, volume)?.disk_assign(app, volume, disk).await })
    }

    fn snapshot_list<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
    ) -> VolumeFuture<'a, Vec<VolumeSnapshot>> {
        Box::pin(async move { self.route(app, volume)?.snapshot_list(app, volume).await })
    }

    fn snapshot_create<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        request: &'a SnapshotCreateRequest,
    ) -> VolumeFuture<'a, VolumeSnapshot> {
        Box::pin(async move {
            self.route(app, volume)?
                .snapshot_create(app, volume, request)
                .await
        })
    }

    fn snapshot_delete<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        snapshot: &'a str,
    ) -> VolumeFuture<'a, ()> {
        Box::pin(async move {
            self.route(app, volume)?
                .snapshot_delete(app, volume, snapshot)
                .await
        })
    }

    fn class(&self, volume: &LogicalVolume) -> VolumeClass {
        self.driver_for(volume.volume_type()).class(volume)
    }
}
