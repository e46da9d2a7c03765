//! Tag-backed metadata store contract.
//!
//! Cloud resources carry their own identity and assignment state as string
//! tags (disks, snapshots) or share metadata (file shares). The keys below are
//! the persisted schema: renaming any of them orphans every resource created
//! by an earlier release.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Logical volume that owns the resource.
pub const TAG_VOLUME: &str = "kompox-volume";
/// Disk name within the volume.
pub const TAG_DISK_NAME: &str = "kompox-disk-name";
/// Disk assignment flag, `true` or `false`.
pub const TAG_DISK_ASSIGNED: &str = "kompox-disk-assigned";
/// Snapshot name within the volume.
pub const TAG_SNAPSHOT_NAME: &str = "kompox-snapshot-name";
/// File share name within the volume.
pub const TAG_SHARE_NAME: &str = "kompox-files-share-name";
/// File share assignment flag, `true` or `false`.
pub const TAG_SHARE_ASSIGNED: &str = "kompox-files-share-assigned";
/// Workspace that owns an app-scoped resource.
pub const TAG_WORKSPACE_NAME: &str = "kompox-workspace-name";
/// Provider that owns an app-scoped resource.
pub const TAG_PROVIDER_NAME: &str = "kompox-provider-name";
/// Application that owns an app-scoped resource.
pub const TAG_APP_NAME: &str = "kompox-app-name";
/// Cluster-independent application hash.
pub const TAG_APP_ID_HASH: &str = "kompox-app-id-hash";
/// Marker key present on everything this crate creates.
pub const TAG_MANAGED_BY: &str = "managed-by";
/// Value of [`TAG_MANAGED_BY`].
pub const MANAGED_BY: &str = "kompox";

/// String key/value tags attached to a cloud resource.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Creates an empty tag set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder form of [`Tags::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Copies every entry of `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        self.0
            .extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns true when no tags are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the set, returning the underlying map.
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for Tags {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self(value)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Identity and assignment state decoded from a resource's tags.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManagedRecord {
    /// Owning logical volume.
    pub volume: String,
    /// Resource name within the volume.
    pub name: String,
    /// Assignment flag; always `false` for snapshots.
    pub assigned: bool,
}

/// Key layout for one kind of managed resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MetadataSchema {
    name_key: &'static str,
    assigned_key: Option<&'static str>,
}

/// Layout used on managed disks.
pub const DISK_SCHEMA: MetadataSchema = MetadataSchema {
    name_key: TAG_DISK_NAME,
    assigned_key: Some(TAG_DISK_ASSIGNED),
};

/// Layout used on snapshots.
pub const SNAPSHOT_SCHEMA: MetadataSchema = MetadataSchema {
    name_key: TAG_SNAPSHOT_NAME,
    assigned_key: None,
};

/// Layout used on file share metadata.
pub const SHARE_SCHEMA: MetadataSchema = MetadataSchema {
    name_key: TAG_SHARE_NAME,
    assigned_key: Some(TAG_SHARE_ASSIGNED),
};

impl MetadataSchema {
    /// Tag key holding the resource name.
    #[must_use]
    pub const fn name_key(&self) -> &'static str {
        self.name_key
    }

    /// Tag key holding the assignment flag, if this kind is assignable.
    #[must_use]
    pub const fn assigned_key(&self) -> Option<&'static str> {
        self.assigned_key
    }

    /// Encodes identity and assignment state as tags.
    #[must_use]
    pub fn encode(&self, volume: &str, name: &str, assigned: bool) -> Tags {
        let mut tags = Tags::new()
            .with(TAG_VOLUME, volume)
            .with(self.name_key, name);
        if let Some(key) = self.assigned_key {
            tags.insert(key, format_flag(assigned));
        }
        tags
    }

    /// Decodes a record, returning `None` for resources without the identity
    /// tags. Such resources are foreign and must never be listed or mutated.
    #[must_use]
    pub fn decode(&self, tags: &Tags) -> Option<ManagedRecord> {
        let volume = tags.get(TAG_VOLUME).filter(|v| !v.is_empty())?;
        let name = tags.get(self.name_key).filter(|v| !v.is_empty())?;
        let assigned = self
            .assigned_key
            .and_then(|key| tags.get(key))
            .is_some_and(parse_flag);
        Some(ManagedRecord {
            volume: volume.to_owned(),
            name: name.to_owned(),
            assigned,
        })
    }

    /// Decodes a record only when it belongs to `volume`.
    #[must_use]
    pub fn decode_for(&self, tags: &Tags, volume: &str) -> Option<ManagedRecord> {
        self.decode(tags).filter(|record| record.volume == volume)
    }

    /// Returns `tags` with the assignment flag set to `assigned`. Other tags
    /// are preserved.
    #[must_use]
    pub fn with_assigned(&self, tags: &Tags, assigned: bool) -> Tags {
        let mut updated = tags.clone();
        if let Some(key) = self.assigned_key {
            updated.insert(key, format_flag(assigned));
        }
        updated
    }
}

/// Tags identifying the owner of an app-scoped resource.
#[must_use]
pub fn app_scope_tags(workspace: &str, provider: &str, app: &str, app_id_hash: &str) -> Tags {
    Tags::new()
        .with(TAG_WORKSPACE_NAME, workspace)
        .with(TAG_PROVIDER_NAME, provider)
        .with(TAG_APP_NAME, app)
        .with(TAG_APP_ID_HASH, app_id_hash)
        .with(TAG_MANAGED_BY, MANAGED_BY)
}

/// Wire form of a boolean flag.
#[must_use]
pub const fn format_flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Parses a flag; anything other than `true` (any case) is false.
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests;
