//! Wire shapes of the Resource Manager payloads used by the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::azure::ApiError;
use crate::azure::api::{
    DiskCreation, DiskResource, DiskSpec, FileShareResource, FileShareSpec, SnapshotResource,
    SnapshotSpec, StorageAccountSpec,
};
use crate::metadata::Tags;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub(super) value: Vec<T>,
    #[serde(default)]
    pub(super) next_link: Option<String>,
}

#[derive(Default, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub(super) code: String,
    #[serde(default)]
    pub(super) message: String,
}

#[derive(Deserialize)]
pub(super) struct ErrorEnvelope {
    pub(super) error: ErrorBody,
}

#[derive(Deserialize)]
pub(super) struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ErrorBody>,
}

impl OperationStatus {
    /// Returns the outcome once the operation reached a terminal state.
    pub(super) fn terminal(self) -> Option<Result<(), ApiError>> {
        match self.status.as_str() {
            "Succeeded" => Some(Ok(())),
            "Failed" | "Canceled" => Some(Err(ApiError::OperationFailed {
                message: self.error.unwrap_or_default().message,
                status: self.status,
            })),
            _ => None,
        }
    }
}

#[derive(Deserialize, Serialize)]
pub(super) struct ResourceGroupWire {
    pub(super) location: String,
    #[serde(default)]
    pub(super) tags: Tags,
}

#[derive(Deserialize, Serialize)]
pub(super) struct SkuWire {
    pub(super) name: String,
}

#[derive(Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreationDataWire {
    pub(super) create_option: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) source_resource_id: Option<String>,
}

#[derive(Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DiskPropertiesWire {
    #[serde(default, rename = "diskSizeGB", skip_serializing_if = "Option::is_none")]
    pub(super) disk_size_gb: Option<i32>,
    #[serde(
        default,
        rename = "diskIOPSReadWrite",
        skip_serializing_if = "Option::is_none"
    )]
    pub(super) disk_iops_read_write: Option<i64>,
    #[serde(
        default,
        rename = "diskMBpsReadWrite",
        skip_serializing_if = "Option::is_none"
    )]
    pub(super) disk_mbps_read_write: Option<i64>,
    #[serde(default)]
    pub(super) creation_data: CreationDataWire,
    #[serde(default, skip_serializing)]
    pub(super) time_created: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Serialize)]
pub(super) struct DiskWire {
    #[serde(default, skip_serializing)]
    pub(super) id: String,
    #[serde(default, skip_serializing)]
    pub(super) name: String,
    pub(super) location: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) zones: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) sku: Option<SkuWire>,
    #[serde(default)]
    pub(super) tags: Tags,
    #[serde(default)]
    pub(super) properties: DiskPropertiesWire,
}

impl From<&DiskSpec> for DiskWire {
    fn from(spec: &DiskSpec) -> Self {
        let creation_data = match &spec.creation {
            DiskCreation::Empty => CreationDataWire {
                create_option: String::from("Empty"),
                source_resource_id: None,
            },
            DiskCreation::Copy { source_id } => CreationDataWire {
                create_option: String::from("Copy"),
                source_resource_id: Some(source_id.clone()),
            },
        };
        Self {
            id: String::new(),
            name: String::new(),
            location: spec.location.clone(),
            zones: spec.zone.iter().cloned().collect(),
            sku: Some(SkuWire {
                name: spec.sku.as_str().to_owned(),
            }),
            tags: spec.tags.clone(),
            properties: DiskPropertiesWire {
                disk_size_gb: Some(spec.size_gib),
                disk_iops_read_write: spec.iops,
                disk_mbps_read_write: spec.mbps,
                creation_data,
                time_created: None,
            },
        }
    }
}

impl From<DiskWire> for DiskResource {
    fn from(wire: DiskWire) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            zone: wire.zones.into_iter().next(),
            size_gib: wire.properties.disk_size_gb.unwrap_or_default(),
            sku: wire.sku.map(|sku| sku.name),
            iops: wire.properties.disk_iops_read_write,
            mbps: wire.properties.disk_mbps_read_write,
            tags: wire.tags,
            time_created: wire.properties.time_created,
        }
    }
}

#[derive(Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SnapshotPropertiesWire {
    #[serde(default, rename = "diskSizeGB", skip_serializing)]
    pub(super) disk_size_gb: Option<i32>,
    #[serde(default)]
    pub(super) creation_data: CreationDataWire,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) incremental: Option<bool>,
    #[serde(default, skip_serializing)]
    pub(super) time_created: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Serialize)]
pub(super) struct SnapshotWire {
    #[serde(default, skip_serializing)]
    pub(super) id: String,
    #[serde(default, skip_serializing)]
    pub(super) name: String,
    pub(super) location: String,
    #[serde(default)]
    pub(super) tags: Tags,
    #[serde(default)]
    pub(super) properties: SnapshotPropertiesWire,
}

impl From<&SnapshotSpec> for SnapshotWire {
    fn from(spec: &SnapshotSpec) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            location: spec.location.clone(),
            tags: spec.tags.clone(),
            properties: SnapshotPropertiesWire {
                disk_size_gb: None,
                creation_data: CreationDataWire {
                    create_option: String::from("Copy"),
                    source_resource_id: Some(spec.source_id.clone()),
                },
                incremental: Some(true),
                time_created: None,
            },
        }
    }
}

impl From<SnapshotWire> for SnapshotResource {
    fn from(wire: SnapshotWire) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            size_gib: wire.properties.disk_size_gb.unwrap_or_default(),
            tags: wire.tags,
            time_created: wire.properties.time_created,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StorageAccountPropertiesWire {
    allow_blob_public_access: bool,
    allow_shared_key_access: bool,
    minimum_tls_version: &'static str,
    supports_https_traffic_only: bool,
}

#[derive(Serialize)]
pub(super) struct StorageAccountWire {
    sku: SkuWire,
    kind: &'static str,
    location: String,
    tags: Tags,
    properties: StorageAccountPropertiesWire,
}

impl From<&StorageAccountSpec> for StorageAccountWire {
    fn from(spec: &StorageAccountSpec) -> Self {
        Self {
            sku: SkuWire {
                name: spec.sku.as_str().to_owned(),
            },
            kind: "StorageV2",
            location: spec.location.clone(),
            tags: spec.tags.clone(),
            properties: StorageAccountPropertiesWire {
                allow_blob_public_access: false,
                allow_shared_key_access: true,
                minimum_tls_version: "TLS1_2",
                supports_https_traffic_only: true,
            },
        }
    }
}

#[derive(Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SharePropertiesWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) share_quota: Option<i32>,
    #[serde(default)]
    pub(super) metadata: Tags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) enabled_protocols: Option<String>,
    #[serde(default, skip_serializing)]
    pub(super) last_modified_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Serialize)]
pub(super) struct ShareWire {
    #[serde(default, skip_serializing)]
    pub(super) id: String,
    #[serde(default, skip_serializing)]
    pub(super) name: String,
    #[serde(default)]
    pub(super) properties: SharePropertiesWire,
}

impl ShareWire {
    pub(super) fn create(spec: &FileShareSpec) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            properties: SharePropertiesWire {
                share_quota: Some(spec.quota_gib),
                metadata: spec.metadata.clone(),
                enabled_protocols: Some(String::from("SMB")),
                last_modified_time: None,
            },
        }
    }

    pub(super) fn metadata_only(metadata: &Tags) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            properties: SharePropertiesWire {
                metadata: metadata.clone(),
                ..SharePropertiesWire::default()
            },
        }
    }
}

impl From<ShareWire> for FileShareResource {
    fn from(wire: ShareWire) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            quota_gib: wire.properties.share_quota.unwrap_or_default(),
            metadata: wire.properties.metadata,
            last_modified: wire.properties.last_modified_time,
        }
    }
}

#[derive(Serialize)]
pub(super) struct TagsPatch<'a> {
    pub(super) tags: &'a Tags,
}
