//! Typed provisioning options for each volume backend.
//!
//! Applications declare options as a free-form map; it is parsed once into a
//! backend-specific struct so unknown keys and malformed values fail before
//! any cloud call.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::VolumeError;

/// Storage technology backing a logical volume.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    /// Block storage managed disks.
    #[default]
    Disk,
    /// Network file shares.
    Files,
}

impl fmt::Display for VolumeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disk => "disk",
            Self::Files => "files",
        })
    }
}

/// Managed disk SKUs.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum DiskSku {
    /// Standard HDD, locally redundant.
    #[serde(rename = "Standard_LRS")]
    StandardLrs,
    /// Premium SSD, locally redundant.
    #[default]
    #[serde(rename = "Premium_LRS")]
    PremiumLrs,
    /// Standard SSD, locally redundant.
    #[serde(rename = "StandardSSD_LRS")]
    StandardSsdLrs,
    /// Ultra disk.
    #[serde(rename = "UltraSSD_LRS")]
    UltraSsdLrs,
    /// Premium SSD, zone redundant.
    #[serde(rename = "Premium_ZRS")]
    PremiumZrs,
    /// Standard SSD, zone redundant.
    #[serde(rename = "StandardSSD_ZRS")]
    StandardSsdZrs,
    /// Premium SSD v2.
    #[serde(rename = "PremiumV2_LRS")]
    PremiumV2Lrs,
}

impl DiskSku {
    /// Wire name of the SKU.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StandardLrs => "Standard_LRS",
            Self::PremiumLrs => "Premium_LRS",
            Self::StandardSsdLrs => "StandardSSD_LRS",
            Self::UltraSsdLrs => "UltraSSD_LRS",
            Self::PremiumZrs => "Premium_ZRS",
            Self::StandardSsdZrs => "StandardSSD_ZRS",
            Self::PremiumV2Lrs => "PremiumV2_LRS",
        }
    }

    /// Parses a wire name, returning `None` for unknown SKUs.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        serde_json::from_value(Value::String(value.to_owned())).ok()
    }
}

/// Storage account SKUs used for file shares.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum FilesSku {
    /// Locally redundant.
    #[default]
    #[serde(rename = "Standard_LRS")]
    StandardLrs,
    /// Geo redundant.
    #[serde(rename = "Standard_GRS")]
    StandardGrs,
    /// Read-access geo redundant.
    #[serde(rename = "Standard_RAGRS")]
    StandardRagrs,
    /// Zone redundant.
    #[serde(rename = "Standard_ZRS")]
    StandardZrs,
    /// Premium, locally redundant.
    #[serde(rename = "Premium_LRS")]
    PremiumLrs,
    /// Premium, zone redundant.
    #[serde(rename = "Premium_ZRS")]
    PremiumZrs,
}

impl FilesSku {
    /// Wire name of the SKU.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StandardLrs => "Standard_LRS",
            Self::StandardGrs => "Standard_GRS",
            Self::StandardRagrs => "Standard_RAGRS",
            Self::StandardZrs => "Standard_ZRS",
            Self::PremiumLrs => "Premium_LRS",
            Self::PremiumZrs => "Premium_ZRS",
        }
    }
}

/// File share protocols. Only SMB is provisioned today.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesProtocol {
    /// SMB 3.x.
    #[default]
    Smb,
}

/// Options understood by the disk backend.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiskOptions {
    /// Disk SKU; the backend default is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<DiskSku>,
    /// Provisioned read/write IOPS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iops: Option<i64>,
    /// Provisioned throughput in MB/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbps: Option<i64>,
}

impl DiskOptions {
    /// Returns `self` with every field set in `other` taking precedence.
    #[must_use]
    pub fn overlay(&self, other: &Self) -> Self {
        Self {
            sku: other.sku.or(self.sku),
            iops: other.iops.or(self.iops),
            mbps: other.mbps.or(self.mbps),
        }
    }
}

/// Options understood by the files backend.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilesOptions {
    /// Storage account SKU used when the account is first created.
    #[serde(default, rename = "skuName", skip_serializing_if = "Option::is_none")]
    pub sku: Option<FilesSku>,
    /// Share protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<FilesProtocol>,
    /// Share quota in GiB, overriding the size-derived quota.
    #[serde(default, rename = "quotaGiB", skip_serializing_if = "Option::is_none")]
    pub quota_gib: Option<i32>,
}

impl FilesOptions {
    /// Returns `self` with every field set in `other` taking precedence.
    #[must_use]
    pub fn overlay(&self, other: &Self) -> Self {
        Self {
            sku: other.sku.or(self.sku),
            protocol: other.protocol.or(self.protocol),
            quota_gib: other.quota_gib.or(self.quota_gib),
        }
    }
}

/// Backend-specific options for a logical volume or a provisioned resource.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VolumeOptions {
    /// Options for `type: disk`.
    Disk(DiskOptions),
    /// Options for `type: files`.
    Files(FilesOptions),
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self::Disk(DiskOptions::default())
    }
}

impl VolumeOptions {
    /// Parses a free-form option map for the given backend.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::Validation`] for unknown keys or malformed
    /// values, including any files protocol other than `smb`.
    pub fn parse(volume_type: VolumeType, raw: &Map<String, Value>) -> Result<Self, VolumeError> {
        let value = Value::Object(raw.clone());
        let invalid =
            |err: serde_json::Error| VolumeError::Validation(format!("{volume_type} options: {err}"));
        match volume_type {
            VolumeType::Disk => serde_json::from_value(value).map(Self::Disk).map_err(invalid),
            VolumeType::Files => {
                if let Some(protocol) = raw
                    .get("protocol")
                    .and_then(Value::as_str)
                    .filter(|protocol| *protocol != "smb")
                {
                    return Err(VolumeError::Validation(format!(
                        "only protocol=smb is supported for type=files, got `{protocol}`"
                    )));
                }
                serde_json::from_value(value).map(Self::Files).map_err(invalid)
            }
        }
    }

    /// Backend kind these options belong to.
    #[must_use]
    pub const fn volume_type(&self) -> VolumeType {
        match self {
            Self::Disk(_) => VolumeType::Disk,
            Self::Files(_) => VolumeType::Files,
        }
    }

    /// Overlays `other` on top of `self`.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::Validation`] when the two option sets belong to
    /// different backends.
    pub fn overlay(&self, other: &Self) -> Result<Self, VolumeError> {
        match (self, other) {
            (Self::Disk(base), Self::Disk(extra)) => Ok(Self::Disk(base.overlay(extra))),
            (Self::Files(base), Self::Files(extra)) => Ok(Self::Files(base.overlay(extra))),
            _ => Err(VolumeError::Validation(format!(
                "cannot apply {} options to a {} volume",
                other.volume_type(),
                self.volume_type()
            ))),
        }
    }
}
