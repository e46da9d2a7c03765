//! Azure resource names for app-scoped volume resources.
//!
//! Every name is derived from the app's cluster-independent hash, so disks
//! and snapshots stay addressable when an app moves between clusters.

use crate::app::App;
use crate::metadata::{Tags, app_scope_tags};
use crate::naming::{
    DISK_NAME_MAX_LEN, HASH_LEN, Hashes, SNAPSHOT_NAME_MAX_LEN, VOLUME_NAME_MAX_LEN, safe_name,
};
use crate::volume::VolumeError;

/// Maximum length of generated resource group, disk and snapshot names.
pub const MAX_RESOURCE_NAME_LEN: usize = 72;
/// Maximum length of the configurable resource prefix.
///
/// Disk and snapshot names built from the longest valid volume and resource
/// names must fit [`MAX_RESOURCE_NAME_LEN`] untruncated, otherwise two
/// logical names sharing a long stem would map to one Azure resource.
pub const MAX_RESOURCE_PREFIX_LEN: usize = MAX_RESOURCE_NAME_LEN
    - (HASH_LEN + 1)
    - "_disk_".len()
    - VOLUME_NAME_MAX_LEN
    - 1
    - max_len(DISK_NAME_MAX_LEN, SNAPSHOT_NAME_MAX_LEN);
/// Maximum length of `{volume}-{disk}` file share names.
pub const MAX_SHARE_NAME_LEN: usize = 41;

const fn max_len(a: usize, b: usize) -> usize {
    if a > b { a } else { b }
}

/// Derives resource names for one workspace and provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceNamer {
    workspace: String,
    provider: String,
    prefix: String,
}

impl ResourceNamer {
    /// Creates a namer.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::Validation`] when `prefix` is empty or longer
    /// than [`MAX_RESOURCE_PREFIX_LEN`].
    pub fn new(
        workspace: impl Into<String>,
        provider: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Result<Self, VolumeError> {
        let prefix_value = prefix.into();
        if prefix_value.is_empty() || prefix_value.len() > MAX_RESOURCE_PREFIX_LEN {
            return Err(VolumeError::Validation(format!(
                "resource prefix `{prefix_value}` must be 1-{MAX_RESOURCE_PREFIX_LEN} characters"
            )));
        }
        Ok(Self {
            workspace: workspace.into(),
            provider: provider.into(),
            prefix: prefix_value,
        })
    }

    /// Scope hashes for `app`, computed without a cluster.
    #[must_use]
    pub fn hashes(&self, app: &App) -> Hashes {
        Hashes::new(&self.workspace, &self.provider, "", &app.name)
    }

    /// Resource group holding the app's volumes.
    ///
    /// # Errors
    ///
    /// Propagates [`safe_name`] failures as [`VolumeError::Validation`].
    pub fn resource_group(&self, app: &App) -> Result<String, VolumeError> {
        if let Some(explicit) = app
            .resource_group
            .as_deref()
            .filter(|name| !name.trim().is_empty())
        {
            return Ok(explicit.to_owned());
        }
        let base = format!("{}_app_{}", self.prefix, app.name);
        Ok(safe_name(&base, &self.hashes(app).app_id, MAX_RESOURCE_NAME_LEN)?)
    }

    /// Azure name of a managed disk.
    ///
    /// # Errors
    ///
    /// Propagates [`safe_name`] failures as [`VolumeError::Validation`].
    pub fn disk(&self, app: &App, volume: &str, disk: &str) -> Result<String, VolumeError> {
        let base = format!("{}_disk_{volume}_{disk}", self.prefix);
        Ok(safe_name(&base, &self.hashes(app).app_id, MAX_RESOURCE_NAME_LEN)?)
    }

    /// Azure name of a snapshot.
    ///
    /// # Errors
    ///
    /// Propagates [`safe_name`] failures as [`VolumeError::Validation`].
    pub fn snapshot(&self, app: &App, volume: &str, snapshot: &str) -> Result<String, VolumeError> {
        let base = format!("{}_snap_{volume}_{snapshot}", self.prefix);
        Ok(safe_name(&base, &self.hashes(app).app_id, MAX_RESOURCE_NAME_LEN)?)
    }

    /// Storage account shared by every files volume of `app`:
    /// `k4x{providerHash}{appIdHash}`.
    #[must_use]
    pub fn storage_account(&self, app: &App) -> String {
        let hashes = self.hashes(app);
        format!("k4x{}{}", hashes.provider, hashes.app_id)
    }

    /// File share name for a volume resource.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::Validation`] when the name exceeds
    /// [`MAX_SHARE_NAME_LEN`]; share names are never truncated.
    pub fn share(volume: &str, disk: &str) -> Result<String, VolumeError> {
        let name = format!("{volume}-{disk}");
        if name.len() > MAX_SHARE_NAME_LEN {
            return Err(VolumeError::Validation(format!(
                "share name `{name}` exceeds {MAX_SHARE_NAME_LEN} characters"
            )));
        }
        Ok(name)
    }

    /// Ownership tags for app-scoped resources.
    #[must_use]
    pub fn app_tags(&self, app: &App) -> Tags {
        app_scope_tags(
            &self.workspace,
            &self.provider,
            &app.name,
            &self.hashes(app).app_id,
        )
    }
}
