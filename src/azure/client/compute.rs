//! Resource group, managed disk and snapshot endpoints.

use reqwest::{Method, Url};
use serde_json::Value;
use tracing::info;

use crate::azure::ApiError;
use crate::azure::api::{
    ApiFuture, ComputeApi, DiskResource, DiskSpec, ResourceGroupApi, SnapshotResource,
    SnapshotSpec,
};
use crate::metadata::Tags;

use super::models::{DiskWire, ResourceGroupWire, SnapshotWire, TagsPatch};
use super::{ArmClient, COMPUTE_API_VERSION, RESOURCES_API_VERSION};

const COMPUTE: &str = "Microsoft.Compute";

impl ArmClient {
    fn disk_url(&self, resource_group: &str, name: &str) -> Result<Url, ApiError> {
        self.resource_group_url(
            resource_group,
            &["providers", COMPUTE, "disks", name],
            COMPUTE_API_VERSION,
        )
    }

    fn snapshot_url(&self, resource_group: &str, name: &str) -> Result<Url, ApiError> {
        self.resource_group_url(
            resource_group,
            &["providers", COMPUTE, "snapshots", name],
            COMPUTE_API_VERSION,
        )
    }
}

impl ResourceGroupApi for ArmClient {
    fn ensure_resource_group<'a>(
        &'a self,
        name: &'a str,
        location: &'a str,
        tags: &'a Tags,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.resource_url(&["resourcegroups", name], RESOURCES_API_VERSION)?;
            match self.get_json::<ResourceGroupWire>(url.clone()).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
            info!(resource_group = name, location, "creating resource group");
            let body = ResourceGroupWire {
                location: location.to_owned(),
                tags: tags.clone(),
            };
            self.mutate(Method::PUT, url, Some(&body)).await
        })
    }
}

impl ComputeApi for ArmClient {
    fn list_disks<'a>(&'a self, resource_group: &'a str) -> ApiFuture<'a, Vec<DiskResource>> {
        Box::pin(async move {
            let url = self.resource_group_url(
                resource_group,
                &["providers", COMPUTE, "disks"],
                COMPUTE_API_VERSION,
            )?;
            let disks: Vec<DiskWire> = self.list_json(url).await?;
            Ok(disks.into_iter().map(DiskResource::from).collect())
        })
    }

    fn get_disk<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
    ) -> ApiFuture<'a, DiskResource> {
        Box::pin(async move {
            let url = self.disk_url(resource_group, name)?;
            let disk: DiskWire = self.get_json(url).await?;
            Ok(disk.into())
        })
    }

    fn create_disk<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
        spec: &'a DiskSpec,
    ) -> ApiFuture<'a, DiskResource> {
        Box::pin(async move {
            let url = self.disk_url(resource_group, name)?;
            let disk: DiskWire = self.put_and_fetch(url, &DiskWire::from(spec)).await?;
            Ok(disk.into())
        })
    }

    fn update_disk_tags<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
        tags: &'a Tags,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.disk_url(resource_group, name)?;
            self.mutate(Method::PATCH, url, Some(&TagsPatch { tags }))
                .await
        })
    }

    fn delete_disk<'a>(&'a self, resource_group: &'a str, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.disk_url(resource_group, name)?;
            self.mutate::<Value>(Method::DELETE, url, None).await
        })
    }

    fn list_snapshots<'a>(
        &'a self,
        resource_group: &'a str,
    ) -> ApiFuture<'a, Vec<SnapshotResource>> {
        Box::pin(async move {
            let url = self.resource_group_url(
                resource_group,
                &["providers", COMPUTE, "snapshots"],
                COMPUTE_API_VERSION,
            )?;
            let snapshots: Vec<SnapshotWire> = self.list_json(url).await?;
            Ok(snapshots.into_iter().map(SnapshotResource::from).collect())
        })
    }

    fn get_snapshot<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
    ) -> ApiFuture<'a, SnapshotResource> {
        Box::pin(async move {
            let url = self.snapshot_url(resource_group, name)?;
            let snapshot: SnapshotWire = self.get_json(url).await?;
            Ok(snapshot.into())
        })
    }

    fn create_snapshot<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
        spec: &'a SnapshotSpec,
    ) -> ApiFuture<'a, SnapshotResource> {
        Box::pin(async move {
            let url = self.snapshot_url(resource_group, name)?;
            let snapshot: SnapshotWire =
                self.put_and_fetch(url, &SnapshotWire::from(spec)).await?;
            Ok(snapshot.into())
        })
    }

    fn delete_snapshot<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let url = self.snapshot_url(resource_group, name)?;
            self.mutate::<Value>(Method::DELETE, url, None).await
        })
    }
}
