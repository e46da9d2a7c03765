//! Azure Files driver for `type: files` volumes.
//!
//! Every files volume of an app shares one storage account, created lazily
//! with the first share. Each volume resource is a share named
//! `{volume}-{disk}` whose identity lives in share metadata. Snapshots are
//! not available for shares.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::App;
use crate::metadata::SHARE_SCHEMA;
use crate::naming::validate_disk_name;
use crate::volume::{
    DiskCreateRequest, FilesOptions, FilesProtocol, LogicalVolume, ResourceKind,
    SnapshotCreateRequest, VolumeClass, VolumeDisk, VolumeDriver, VolumeError, VolumeFuture,
    VolumeOptions, VolumeSnapshot, VolumeType, gib_to_bytes, plan_assignment, resource_name,
    size_gib_ceil, with_timeout,
};

use super::api::{FileShareResource, FileShareSpec, StorageAccountSpec, StorageApi};
use super::{DriverSettings, ResourceNamer};

/// Volume driver backed by Azure Files shares.
pub struct FilesDriver<S> {
    cloud: Arc<S>,
    settings: DriverSettings,
}

/// Location of the shares of one app.
struct ShareScope {
    resource_group: String,
    account: String,
}

impl<S: StorageApi> FilesDriver<S> {
    /// Creates a driver over `cloud`.
    #[must_use]
    pub const fn new(cloud: Arc<S>, settings: DriverSettings) -> Self {
        Self { cloud, settings }
    }

    /// Provisioning descriptor for a files volume.
    #[must_use]
    pub fn files_class(volume: &LogicalVolume) -> VolumeClass {
        let mut attributes = BTreeMap::from([(String::from("protocol"), String::from("smb"))]);
        if let VolumeOptions::Files(FilesOptions { sku: Some(sku), .. }) = &volume.options {
            attributes.insert(String::from("skuName"), sku.as_str().to_owned());
        }
        VolumeClass {
            storage_class_name: String::from("azurefile-csi"),
            csi_driver: String::from("file.csi.azure.com"),
            fs_type: None,
            attributes,
            access_modes: vec![String::from("ReadWriteMany")],
            reclaim_policy: String::from("Retain"),
            volume_mode: String::from("Filesystem"),
        }
    }

    fn declared<'a>(app: &'a App, volume: &str) -> Result<&'a LogicalVolume, VolumeError> {
        let declared = app.find_volume(volume)?;
        if declared.volume_type() != VolumeType::Files {
            return Err(VolumeError::Validation(format!(
                "volume `{volume}` is type={}, not type=files",
                declared.volume_type()
            )));
        }
        Ok(declared)
    }

    fn scope(&self, app: &App) -> Result<ShareScope, VolumeError> {
        Ok(ShareScope {
            resource_group: self.settings.namer.resource_group(app)?,
            account: self.settings.namer.storage_account(app),
        })
    }

    fn handle(&self, account: &str, share: &str) -> String {
        format!(
            "smb://{account}.file.{}/{share}",
            self.settings.storage_endpoint_suffix
        )
    }

    fn to_volume_disk(
        &self,
        volume: &str,
        account: &str,
        share: &FileShareResource,
    ) -> Option<VolumeDisk> {
        let record = SHARE_SCHEMA.decode_for(&share.metadata, volume)?;
        let modified = share.last_modified.unwrap_or_default();
        Some(VolumeDisk {
            name: record.name,
            volume_name: record.volume,
            assigned: record.assigned,
            size_bytes: gib_to_bytes(share.quota_gib),
            zone: None,
            options: VolumeOptions::Files(FilesOptions {
                sku: None,
                protocol: Some(FilesProtocol::Smb),
                quota_gib: Some(share.quota_gib),
            }),
            handle: self.handle(account, &share.name),
            created_at: modified,
            updated_at: modified,
        })
    }

    async fn managed_shares(
        &self,
        app: &App,
        volume: &str,
    ) -> Result<Vec<(FileShareResource, VolumeDisk)>, VolumeError> {
        let scope = self.scope(app)?;
        let shares = with_timeout(
            self.settings.timeouts.read,
            "share list",
            &scope.account,
            async {
                match self
                    .cloud
                    .list_shares(&scope.resource_group, &scope.account)
                    .await
                {
                    Ok(shares) => Ok(shares),
                    Err(err) if err.is_not_found() => Ok(Vec::new()),
                    Err(err) => Err(VolumeError::transient("share list", &scope.account, err)),
                }
            },
        )
        .await?;
        let mut managed: Vec<(FileShareResource, VolumeDisk)> = shares
            .into_iter()
            .filter_map(|share| {
                self.to_volume_disk(volume, &scope.account, &share)
                    .map(|disk| (share, disk))
            })
            .collect();
        managed.sort_by(|(_, a), (_, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(managed)
    }

    async fn list(&self, app: &App, volume: &str) -> Result<Vec<VolumeDisk>, VolumeError> {
        Self::declared(app, volume)?;
        let shares = self.managed_shares(app, volume).await?;
        Ok(shares.into_iter().map(|(_, disk)| disk).collect())
    }

    async fn ensure_account(
        &self,
        app: &App,
        scope: &ShareScope,
        options: &FilesOptions,
    ) -> Result<(), VolumeError> {
        let exists = self
            .cloud
            .storage_account_exists(&scope.resource_group, &scope.account)
            .await
            .map_err(|err| VolumeError::transient("storage account lookup", &scope.account, err))?;
        if exists {
            return Ok(());
        }
        let tags = self.settings.namer.app_tags(app);
        if let Err(err) = self
            .cloud
            .ensure_resource_group(&scope.resource_group, &self.settings.location, &tags)
            .await
        {
            warn!(
                resource_group = %scope.resource_group,
                error = %err,
                "resource group ensure failed, continuing with storage account creation"
            );
        }
        let spec = StorageAccountSpec {
            location: self.settings.location.clone(),
            sku: options.sku.unwrap_or_default(),
            tags,
        };
        self.cloud
            .create_storage_account(&scope.resource_group, &scope.account, &spec)
            .await
            .map_err(|err| VolumeError::transient("storage account create", &scope.account, err))?;
        info!(
            account = %scope.account,
            resource_group = %scope.resource_group,
            sku = spec.sku.as_str(),
            "storage account created"
        );
        Ok(())
    }

    async fn share_exists(
        &self,
        scope: &ShareScope,
        share_name: &str,
    ) -> Result<bool, VolumeError> {
        with_timeout(
            self.settings.timeouts.read,
            "share lookup",
            share_name,
            async {
                match self
                    .cloud
                    .get_share(&scope.resource_group, &scope.account, share_name)
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(err) if err.is_not_found() => Ok(false),
                    Err(err) => Err(VolumeError::transient("share lookup", share_name, err)),
                }
            },
        )
        .await
    }

    async fn create(
        &self,
        app: &App,
        volume: &str,
        request: &DiskCreateRequest,
    ) -> Result<VolumeDisk, VolumeError> {
        let declared = Self::declared(app, volume)?;
        if request
            .source
            .as_deref()
            .is_some_and(|source| !source.trim().is_empty())
        {
            return Err(VolumeError::Unsupported {
                operation: "disk create from source",
                volume_type: VolumeType::Files,
            });
        }
        let VolumeOptions::Files(options) = request.effective_options(&declared.options)? else {
            return Err(VolumeError::Validation(format!(
                "volume `{volume}` requires files options"
            )));
        };
        let quota_gib = options
            .quota_gib
            .map_or_else(|| size_gib_ceil(declared.size_bytes), Ok)?;
        if quota_gib <= 0 {
            return Err(VolumeError::Validation(format!(
                "quotaGiB must be positive, got {quota_gib}"
            )));
        }
        let (disk_name, _) = resource_name(request.name.as_ref(), validate_disk_name)?;
        let share_name = ResourceNamer::share(volume, &disk_name)?;
        let scope = self.scope(app)?;

        // Share names are flat within the account, so `a-b`/`c` and `a`/`b-c`
        // meet at the same share whichever volume owns it.
        if self.share_exists(&scope, &share_name).await? {
            return Err(VolumeError::AlreadyExists {
                kind: ResourceKind::Disk,
                volume: volume.to_owned(),
                name: disk_name,
            });
        }

        let spec = FileShareSpec {
            quota_gib,
            metadata: SHARE_SCHEMA.encode(volume, &disk_name, false),
        };
        let created = with_timeout(
            self.settings.timeouts.write,
            "share create",
            &share_name,
            async {
                self.ensure_account(app, &scope, &options).await?;
                self.cloud
                    .create_share(&scope.resource_group, &scope.account, &share_name, &spec)
                    .await
                    .map_err(|err| VolumeError::transient("share create", &share_name, err))
            },
        )
        .await?;
        info!(
            volume,
            disk = %disk_name,
            share = %share_name,
            quota_gib,
            "file share created"
        );
        self.to_volume_disk(volume, &scope.account, &created)
            .ok_or_else(|| VolumeError::NotFound {
                kind: ResourceKind::Disk,
                volume: volume.to_owned(),
                name: disk_name,
            })
    }

    async fn delete(&self, app: &App, volume: &str, disk: &str) -> Result<(), VolumeError> {
        Self::declared(app, volume)?;
        validate_disk_name(disk)?;
        let share_name = ResourceNamer::share(volume, disk)?;
        let scope = self.scope(app)?;
        with_timeout(
            self.settings.timeouts.write,
            "share delete",
            &share_name,
            async {
                let share = match self
                    .cloud
                    .get_share(&scope.resource_group, &scope.account, &share_name)
                    .await
                {
                    Ok(share) => share,
                    Err(err) if err.is_not_found() => {
                        debug!(volume, disk, "share already absent");
                        return Ok(());
                    }
                    Err(err) => {
                        return Err(VolumeError::transient("share delete", &share_name, err));
                    }
                };
                if SHARE_SCHEMA.decode_for(&share.metadata, volume).is_none() {
                    warn!(volume, disk, share = %share_name, "skipping unmanaged share");
                    return Ok(());
                }
                match self
                    .cloud
                    .delete_share(&scope.resource_group, &scope.account, &share_name)
                    .await
                {
                    Ok(()) => {
                        info!(volume, disk, share = %share_name, "file share deleted");
                        Ok(())
                    }
                    Err(err) if err.is_not_found() => Ok(()),
                    Err(err) => Err(VolumeError::transient("share delete", &share_name, err)),
                }
            },
        )
        .await
    }

    async fn assign(&self, app: &App, volume: &str, disk: &str) -> Result<(), VolumeError> {
        Self::declared(app, volume)?;
        let scope = self.scope(app)?;
        let shares = self.managed_shares(app, volume).await?;
        let listed: Vec<VolumeDisk> = shares.iter().map(|(_, disk)| disk.clone()).collect();
        for change in plan_assignment(volume, &listed, disk)? {
            let Some((share, _)) = shares.iter().find(|(_, listed)| listed.name == change.disk)
            else {
                continue;
            };
            let share_name = share.name.as_str();
            with_timeout(
                self.settings.timeouts.write,
                "share assign",
                share_name,
                async {
                    let current = self
                        .cloud
                        .get_share(&scope.resource_group, &scope.account, share_name)
                        .await
                        .map_err(|err| VolumeError::transient("share assign", share_name, err))?;
                    let metadata = SHARE_SCHEMA.with_assigned(&current.metadata, change.assigned);
                    self.cloud
                        .update_share_metadata(
                            &scope.resource_group,
                            &scope.account,
                            share_name,
                            &metadata,
                        )
                        .await
                        .map_err(|err| VolumeError::transient("share assign", share_name, err))
                },
            )
            .await?;
            info!(
                volume,
                disk = %change.disk,
                assigned = change.assigned,
                "share assignment updated"
            );
        }
        Ok(())
    }

    fn snapshots_unsupported<T>(operation: &'static str) -> Result<T, VolumeError> {
        Err(VolumeError::Unsupported {
            operation,
            volume_type: VolumeType::Files,
        })
    }
}

impl<S: StorageApi> VolumeDriver for FilesDriver<S> {
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
        _app: &'a App,
        _volume: &'a str,
    ) -> VolumeFuture<'a, Vec<VolumeSnapshot>> {
        Box::pin(async { Self::snapshots_unsupported("snapshot list") })
    }

    fn snapshot_create<'a>(
        &'a self,
        _app: &'a App,
        _volume: &'a str,
        _request: &'a SnapshotCreateRequest,
    ) -> VolumeFuture<'a, VolumeSnapshot> {
        Box::pin(async { Self::snapshots_unsupported("snapshot create") })
    }

    fn snapshot_delete<'a>(
        &'a self,
        _app: &'a App,
        _volume: &'a str,
        _snapshot: &'a str,
    ) -> VolumeFuture<'a, ()> {
        Box::pin(async { Self::snapshots_unsupported("snapshot delete") })
    }

    fn class(&self, volume: &LogicalVolume) -> VolumeClass {
        Self::files_class(volume)
    }
}

#[cfg(test)]
mod tests;
