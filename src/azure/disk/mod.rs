//! Managed disk driver for `type: disk` volumes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::App;
use crate::metadata::{DISK_SCHEMA, SNAPSHOT_SCHEMA};
use crate::naming::{validate_disk_name, validate_snapshot_name};
use crate::source::{ManagedLookup, SourceResolver};
use crate::volume::{
    DiskCreateRequest, DiskOptions, DiskSku, LogicalVolume, ResourceKind, SnapshotCreateRequest,
    VolumeClass, VolumeDisk, VolumeDriver, VolumeError, VolumeFuture, VolumeOptions,
    VolumeSnapshot, VolumeType, gib_to_bytes, plan_assignment, resource_name, size_gib_ceil,
    with_timeout,
};

use super::DriverSettings;
use super::api::{ComputeApi, DiskCreation, DiskResource, DiskSpec, SnapshotResource, SnapshotSpec};

/// A listed disk together with the backend resource it was decoded from.
struct ManagedDisk {
    resource: DiskResource,
    disk: VolumeDisk,
}

/// Volume driver backed by Azure managed disks and incremental snapshots.
pub struct DiskDriver<C> {
    cloud: Arc<C>,
    settings: DriverSettings,
}

impl<C: ComputeApi> DiskDriver<C> {
    /// Creates a driver over `cloud`.
    #[must_use]
    pub const fn new(cloud: Arc<C>, settings: DriverSettings) -> Self {
        Self { cloud, settings }
    }

    /// Provisioning descriptor for managed disk volumes.
    #[must_use]
    pub fn disk_class() -> VolumeClass {
        VolumeClass {
            storage_class_name: String::from("managed-csi"),
            csi_driver: String::from("disk.csi.azure.com"),
            fs_type: Some(String::from("ext4")),
            attributes: BTreeMap::from([(String::from("fsType"), String::from("ext4"))]),
            access_modes: vec![String::from("ReadWriteOnce")],
            reclaim_policy: String::from("Retain"),
            volume_mode: String::from("Filesystem"),
        }
    }

    fn declared<'a>(app: &'a App, volume: &str) -> Result<&'a LogicalVolume, VolumeError> {
        let declared = app.find_volume(volume)?;
        if declared.volume_type() != VolumeType::Disk {
            return Err(VolumeError::Validation(format!(
                "volume `{volume}` is type={}, not type=disk",
                declared.volume_type()
            )));
        }
        Ok(declared)
    }

    async fn managed_disks(
        &self,
        app: &App,
        volume: &str,
    ) -> Result<Vec<ManagedDisk>, VolumeError> {
        let resource_group = self.settings.namer.resource_group(app)?;
        let resources = with_timeout(
            self.settings.timeouts.read,
            "disk list",
            &resource_group,
            async {
                match self.cloud.list_disks(&resource_group).await {
                    Ok(resources) => Ok(resources),
                    Err(err) if err.is_not_found() => Ok(Vec::new()),
                    Err(err) => Err(VolumeError::transient("disk list", &resource_group, err)),
                }
            },
        )
        .await?;
        let mut disks: Vec<ManagedDisk> = resources
            .into_iter()
            .filter_map(|resource| {
                to_volume_disk(volume, &resource).map(|disk| ManagedDisk { resource, disk })
            })
            .collect();
        disks.sort_by(|a, b| {
            b.disk
                .created_at
                .cmp(&a.disk.created_at)
                .then_with(|| a.disk.name.cmp(&b.disk.name))
        });
        Ok(disks)
    }

    async fn list(&self, app: &App, volume: &str) -> Result<Vec<VolumeDisk>, VolumeError> {
        Self::declared(app, volume)?;
        let disks = self.managed_disks(app, volume).await?;
        Ok(disks.into_iter().map(|managed| managed.disk).collect())
    }

    async fn create(
        &self,
        app: &App,
        volume: &str,
        request: &DiskCreateRequest,
    ) -> Result<VolumeDisk, VolumeError> {
        let declared = Self::declared(app, volume)?;
        let VolumeOptions::Disk(options) = request.effective_options(&declared.options)? else {
            return Err(VolumeError::Validation(format!(
                "volume `{volume}` requires disk options"
            )));
        };
        let size_gib = size_gib_ceil(declared.size_bytes)?;
        let (disk_name, explicit) = resource_name(request.name.as_ref(), validate_disk_name)?;
        let namer = &self.settings.namer;
        let resource_group = namer.resource_group(app)?;
        let azure_name = namer.disk(app, volume, &disk_name)?;

        if explicit
            && self
                .managed_disks(app, volume)
                .await?
                .iter()
                .any(|managed| managed.disk.name == disk_name)
        {
            return Err(VolumeError::AlreadyExists {
                kind: ResourceKind::Disk,
                volume: volume.to_owned(),
                name: disk_name,
            });
        }

        let raw_source = request.source.as_deref().unwrap_or_default();
        let resolver = SourceResolver::new(self);
        let source = with_timeout(
            self.settings.timeouts.lookup,
            "source lookup",
            raw_source,
            resolver.resolve_as_disk(app, volume, raw_source),
        )
        .await?;
        let creation = source.map_or(DiskCreation::Empty, |source_id| DiskCreation::Copy {
            source_id,
        });

        let mut tags = namer.app_tags(app);
        tags.merge(&DISK_SCHEMA.encode(volume, &disk_name, false));
        let spec = DiskSpec {
            location: self.settings.location.clone(),
            zone: request
                .zone
                .as_deref()
                .or(app.zone.as_deref())
                .map(str::trim)
                .filter(|zone| !zone.is_empty())
                .map(str::to_owned),
            sku: options.sku.unwrap_or_default(),
            size_gib,
            iops: options.iops,
            mbps: options.mbps,
            creation,
            tags,
        };

        let created = with_timeout(
            self.settings.timeouts.write,
            "disk create",
            &azure_name,
            async {
                self.cloud
                    .ensure_resource_group(
                        &resource_group,
                        &self.settings.location,
                        &namer.app_tags(app),
                    )
                    .await
                    .map_err(|err| {
                        VolumeError::transient("resource group ensure", &resource_group, err)
                    })?;
                self.cloud
                    .create_disk(&resource_group, &azure_name, &spec)
                    .await
                    .map_err(|err| VolumeError::transient("disk create", &azure_name, err))
            },
        )
        .await?;
        info!(
            volume,
            disk = %disk_name,
            resource_group = %resource_group,
            size_gib,
            "disk created"
        );
        to_volume_disk(volume, &created).ok_or_else(|| VolumeError::NotFound {
            kind: ResourceKind::Disk,
            volume: volume.to_owned(),
            name: disk_name,
        })
    }

    async fn delete(&self, app: &App, volume: &str, disk: &str) -> Result<(), VolumeError> {
        Self::declared(app, volume)?;
        validate_disk_name(disk)?;
        let resource_group = self.settings.namer.resource_group(app)?;
        let azure_name = self.settings.namer.disk(app, volume, disk)?;
        with_timeout(
            self.settings.timeouts.write,
            "disk delete",
            &azure_name,
            async {
                let resource = match self.cloud.get_disk(&resource_group, &azure_name).await {
                    Ok(resource) => resource,
                    Err(err) if err.is_not_found() => {
                        debug!(volume, disk, "disk already absent");
                        return Ok(());
                    }
                    Err(err) => {
                        return Err(VolumeError::transient("disk delete", &azure_name, err));
                    }
                };
                if DISK_SCHEMA.decode_for(&resource.tags, volume).is_none() {
                    warn!(volume, disk, resource = %resource.id, "skipping unmanaged disk");
                    return Ok(());
                }
                match self.cloud.delete_disk(&resource_group, &azure_name).await {
                    Ok(()) => {
                        info!(volume, disk, "disk deleted");
                        Ok(())
                    }
                    Err(err) if err.is_not_found() => Ok(()),
                    Err(err) => Err(VolumeError::transient("disk delete", &azure_name, err)),
                }
            },
        )
        .await
    }

    async fn assign(&self, app: &App, volume: &str, disk: &str) -> Result<(), VolumeError> {
        Self::declared(app, volume)?;
        let resource_group = self.settings.namer.resource_group(app)?;
        let disks = self.managed_disks(app, volume).await?;
        let listed: Vec<VolumeDisk> = disks.iter().map(|managed| managed.disk.clone()).collect();
        let plan = plan_assignment(volume, &listed, disk)?;
        for change in plan {
            let Some(managed) = disks
                .iter()
                .find(|managed| managed.disk.name == change.disk)
            else {
                continue;
            };
            let tags = DISK_SCHEMA.with_assigned(&managed.resource.tags, change.assigned);
            let azure_name = managed.resource.name.as_str();
            with_timeout(
                self.settings.timeouts.write,
                "disk assign",
                azure_name,
                async {
                    self.cloud
                        .update_disk_tags(&resource_group, azure_name, &tags)
                        .await
                        .map_err(|err| VolumeError::transient("disk assign", azure_name, err))
                },
            )
            .await?;
            info!(
                volume,
                disk = %change.disk,
                assigned = change.assigned,
                "disk assignment updated"
            );
        }
        Ok(())
    }

    async fn managed_snapshots(
        &self,
        app: &App,
        volume: &str,
    ) -> Result<Vec<VolumeSnapshot>, VolumeError> {
        let resource_group = self.settings.namer.resource_group(app)?;
        let resources = with_timeout(
            self.settings.timeouts.read,
            "snapshot list",
            &resource_group,
            async {
                match self.cloud.list_snapshots(&resource_group).await {
                    Ok(resources) => Ok(resources),
                    Err(err) if err.is_not_found() => Ok(Vec::new()),
                    Err(err) => Err(VolumeError::transient("snapshot list", &resource_group, err)),
                }
            },
        )
        .await?;
        let mut snapshots: Vec<VolumeSnapshot> = resources
            .iter()
            .filter_map(|resource| to_volume_snapshot(volume, resource))
            .collect();
        snapshots.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(snapshots)
    }

    async fn snapshot_list_checked(
        &self,
        app: &App,
        volume: &str,
    ) -> Result<Vec<VolumeSnapshot>, VolumeError> {
        Self::declared(app, volume)?;
        self.managed_snapshots(app, volume).await
    }

    async fn assigned_disk_id(&self, app: &App, volume: &str) -> Result<String, VolumeError> {
        self.managed_disks(app, volume)
            .await?
            .into_iter()
            .find(|managed| managed.disk.assigned)
            .map(|managed| managed.resource.id)
            .ok_or_else(|| VolumeError::NotFound {
                kind: ResourceKind::Disk,
                volume: volume.to_owned(),
                name: String::from("(assigned)"),
            })
    }

    async fn snapshot_create_checked(
        &self,
        app: &App,
        volume: &str,
        request: &SnapshotCreateRequest,
    ) -> Result<VolumeSnapshot, VolumeError> {
        Self::declared(app, volume)?;
        let (snapshot_name, explicit) =
            resource_name(request.name.as_ref(), validate_snapshot_name)?;
        let namer = &self.settings.namer;
        let resource_group = namer.resource_group(app)?;
        let azure_name = namer.snapshot(app, volume, &snapshot_name)?;

        if explicit
            && self
                .managed_snapshots(app, volume)
                .await?
                .iter()
                .any(|snapshot| snapshot.name == snapshot_name)
        {
            return Err(VolumeError::AlreadyExists {
                kind: ResourceKind::Snapshot,
                volume: volume.to_owned(),
                name: snapshot_name,
            });
        }

        let raw_source = request.source.as_deref().unwrap_or_default();
        let source_id = if raw_source.trim().is_empty() {
            self.assigned_disk_id(app, volume).await?
        } else {
            let resolver = SourceResolver::new(self);
            with_timeout(
                self.settings.timeouts.lookup,
                "source lookup",
                raw_source,
                resolver.resolve_as_disk(app, volume, raw_source),
            )
            .await?
            .ok_or_else(|| {
                VolumeError::Validation(format!("snapshot source `{raw_source}` is empty"))
            })?
        };

        let mut tags = namer.app_tags(app);
        tags.merge(&SNAPSHOT_SCHEMA.encode(volume, &snapshot_name, false));
        let spec = SnapshotSpec {
            location: self.settings.location.clone(),
            source_id,
            tags,
        };
        let created = with_timeout(
            self.settings.timeouts.write,
            "snapshot create",
            &azure_name,
            async {
                self.cloud
                    .create_snapshot(&resource_group, &azure_name, &spec)
                    .await
                    .map_err(|err| VolumeError::transient("snapshot create", &azure_name, err))
            },
        )
        .await?;
        info!(
            volume,
            snapshot = %snapshot_name,
            source = %spec.source_id,
            "snapshot created"
        );
        to_volume_snapshot(volume, &created).ok_or_else(|| VolumeError::NotFound {
            kind: ResourceKind::Snapshot,
            volume: volume.to_owned(),
            name: snapshot_name,
        })
    }

    async fn snapshot_delete_checked(
        &self,
        app: &App,
        volume: &str,
        snapshot: &str,
    ) -> Result<(), VolumeError> {
        Self::declared(app, volume)?;
        validate_snapshot_name(snapshot)?;
        let resource_group = self.settings.namer.resource_group(app)?;
        let azure_name = self.settings.namer.snapshot(app, volume, snapshot)?;
        with_timeout(
            self.settings.timeouts.write,
            "snapshot delete",
            &azure_name,
            async {
                let resource = match self.cloud.get_snapshot(&resource_group, &azure_name).await {
                    Ok(resource) => resource,
                    Err(err) if err.is_not_found() => {
                        debug!(volume, snapshot, "snapshot already absent");
                        return Ok(());
                    }
                    Err(err) => {
                        return Err(VolumeError::transient("snapshot delete", &azure_name, err));
                    }
                };
                if SNAPSHOT_SCHEMA.decode_for(&resource.tags, volume).is_none() {
                    warn!(volume, snapshot, resource = %resource.id, "skipping unmanaged snapshot");
                    return Ok(());
                }
                match self.cloud.delete_snapshot(&resource_group, &azure_name).await {
                    Ok(()) => {
                        info!(volume, snapshot, "snapshot deleted");
                        Ok(())
                    }
                    Err(err) if err.is_not_found() => Ok(()),
                    Err(err) => Err(VolumeError::transient("snapshot delete", &azure_name, err)),
                }
            },
        )
        .await
    }

    async fn lookup_disk(&self, app: &App, volume: &str, disk: &str) -> Result<String, VolumeError> {
        let resource_group = self.settings.namer.resource_group(app)?;
        let azure_name = self.settings.namer.disk(app, volume, disk)?;
        let not_found = || VolumeError::NotFound {
            kind: ResourceKind::Disk,
            volume: volume.to_owned(),
            name: disk.to_owned(),
        };
        let resource = match self.cloud.get_disk(&resource_group, &azure_name).await {
            Ok(resource) => resource,
            Err(err) if err.is_not_found() => return Err(not_found()),
            Err(err) => return Err(VolumeError::transient("disk lookup", &azure_name, err)),
        };
        DISK_SCHEMA
            .decode_for(&resource.tags, volume)
            .filter(|record| record.name == disk)
            .map(|_| resource.id)
            .ok_or_else(not_found)
    }

    async fn lookup_snapshot(
        &self,
        app: &App,
        volume: &str,
        snapshot: &str,
    ) -> Result<String, VolumeError> {
        let resource_group = self.settings.namer.resource_group(app)?;
        let azure_name = self.settings.namer.snapshot(app, volume, snapshot)?;
        let not_found = || VolumeError::NotFound {
            kind: ResourceKind::Snapshot,
            volume: volume.to_owned(),
            name: snapshot.to_owned(),
        };
        let resource = match self.cloud.get_snapshot(&resource_group, &azure_name).await {
            Ok(resource) => resource,
            Err(err) if err.is_not_found() => return Err(not_found()),
            Err(err) => return Err(VolumeError::transient("snapshot lookup", &azure_name, err)),
        };
        SNAPSHOT_SCHEMA
            .decode_for(&resource.tags, volume)
            .filter(|record| record.name == snapshot)
            .map(|_| resource.id)
            .ok_or_else(not_found)
    }
}

fn to_volume_disk(volume: &str, resource: &DiskResource) -> Option<VolumeDisk> {
    let record = DISK_SCHEMA.decode_for(&resource.tags, volume)?;
    let created_at = resource.time_created.unwrap_or_default();
    Some(VolumeDisk {
        name: record.name,
        volume_name: record.volume,
        assigned: record.assigned,
        size_bytes: gib_to_bytes(resource.size_gib),
        zone: resource.zone.clone(),
        options: VolumeOptions::Disk(DiskOptions {
            sku: resource.sku.as_deref().and_then(DiskSku::from_wire),
            iops: resource.iops,
            mbps: resource.mbps,
        }),
        handle: resource.id.clone(),
        created_at,
        updated_at: created_at,
    })
}

fn to_volume_snapshot(volume: &str, resource: &SnapshotResource) -> Option<VolumeSnapshot> {
    let record = SNAPSHOT_SCHEMA.decode_for(&resource.tags, volume)?;
    let created_at = resource.time_created.unwrap_or_default();
    Some(VolumeSnapshot {
        name: record.name,
        volume_name: record.volume,
        size_bytes: gib_to_bytes(resource.size_gib),
        handle: resource.id.clone(),
        created_at,
        updated_at: created_at,
    })
}

impl<C: ComputeApi> ManagedLookup for DiskDriver<C> {
    fn disk_resource_id<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        disk: &'a str,
    ) -> VolumeFuture<'a, String> {
        Box::pin(self.lookup_disk(app, volume, disk))
    }

    fn snapshot_resource_id<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        snapshot: &'a str,
    ) -> VolumeFuture<'a, String> {
        Box::pin(self.lookup_snapshot(app, volume, snapshot))
    }
}

impl<C: ComputeApi> VolumeDriver for DiskDriver<C> {
    fn disk_list<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
    ) -> VolumeFuture<'a, Vec<VolumeDisk>> {
        Box::pin(self.list(app, volume))
    }

    fn disk_create<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        request: &'a DiskCreateRequest,
    ) -> VolumeFuture<'a, VolumeDisk> {
        Box::pin(self.create(app, volume, request))
    }

    fn disk_delete<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        disk: &'a str,
    ) -> VolumeFuture<'a, ()> {
        Box::pin(self.delete(app, volume, disk))
    }

    fn disk_assign<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        disk: &'a str,
    ) -> VolumeFuture<'a, ()> {
        Box::pin(self.assign(app, volume, disk))
    }

    fn snapshot_list<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
    ) -> VolumeFuture<'a, Vec<VolumeSnapshot>> {
        Box::pin(self.snapshot_list_checked(app, volume))
    }

    fn snapshot_create<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        request: &'a SnapshotCreateRequest,
    ) -> VolumeFuture<'a, VolumeSnapshot> {
        Box::pin(self.snapshot_create_checked(app, volume, request))
    }

    fn snapshot_delete<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        snapshot: &'a str,
    ) -> VolumeFuture<'a, ()> {
        Box::pin(self.snapshot_delete_checked(app, volume, snapshot))
    }

    fn class(&self, _volume: &LogicalVolume) -> VolumeClass {
        Self::disk_class()
    }
}
