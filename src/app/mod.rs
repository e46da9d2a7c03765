//! Application aggregate: the owner of a set of logical volumes.
//!
//! Applications are read from a JSON manifest:
//!
//! ```json
//! {
//!   "name": "web",
//!   "cluster": "prod",
//!   "zone": "1",
//!   "volumes": [
//!     { "name": "data", "size": 34359738368, "type": "disk", "options": { "sku": "Premium_LRS" } }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;
use thiserror::Error;

use crate::volume::{LogicalVolume, ResourceKind, VolumeError};

/// Errors raised while loading an application manifest.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ManifestError {
    /// Raised when the manifest file cannot be read.
    #[error("failed to read app manifest `{path}`: {message}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the manifest is not valid JSON or fails validation.
    #[error("invalid app manifest `{path}`: {message}")]
    Invalid {
        /// Path of the manifest.
        path: String,
        /// Parser or validation message.
        message: String,
    },
}

/// A deployed application and its ordered volume declarations.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(try_from = "AppRecord")]
pub struct App {
    /// Application name.
    pub name: String,
    /// Cluster the application is deployed to, if known.
    pub cluster: Option<String>,
    /// Deployment zone used for new zonal disks.
    pub zone: Option<String>,
    /// Explicit resource group, overriding the derived name.
    pub resource_group: Option<String>,
    /// Volumes in declaration order.
    pub volumes: Vec<LogicalVolume>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AppRecord {
    name: String,
    #[serde(default)]
    cluster: Option<String>,
    #[serde(default)]
    zone: Option<String>,
    #[serde(default)]
    resource_group: Option<String>,
    #[serde(default)]
    volumes: Vec<LogicalVolume>,
}

impl TryFrom<AppRecord> for App {
    type Error = VolumeError;

    fn try_from(record: AppRecord) -> Result<Self, Self::Error> {
        let app = Self {
            name: record.name,
            cluster: record.cluster,
            zone: record.zone,
            resource_group: record.resource_group,
            volumes: record.volumes,
        };
        app.validate()?;
        Ok(app)
    }
}

impl App {
    /// Creates an application with no volumes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cluster: None,
            zone: None,
            resource_group: None,
            volumes: Vec::new(),
        }
    }

    /// Appends a volume declaration.
    #[must_use]
    pub fn with_volume(mut self, volume: LogicalVolume) -> Self {
        self.volumes.push(volume);
        self
    }

    /// Sets the deployment zone.
    #[must_use]
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Sets the cluster name.
    #[must_use]
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// Sets an explicit resource group.
    #[must_use]
    pub fn with_resource_group(mut self, resource_group: impl Into<String>) -> Self {
        self.resource_group = Some(resource_group.into());
        self
    }

    /// Returns the declaration of `volume`.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::NotFound`] when the app declares no such volume.
    pub fn find_volume(&self, volume: &str) -> Result<&LogicalVolume, VolumeError> {
        self.volumes
            .iter()
            .find(|declared| declared.name == volume)
            .ok_or_else(|| VolumeError::NotFound {
                kind: ResourceKind::Volume,
                volume: volume.to_owned(),
                name: volume.to_owned(),
            })
    }

    /// Checks the app name and every volume declaration.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::Validation`] for an empty app name, an invalid
    /// volume, or a duplicated volume name.
    pub fn validate(&self) -> Result<(), VolumeError> {
        if self.name.trim().is_empty() {
            return Err(VolumeError::Validation(String::from(
                "app name must not be empty",
            )));
        }
        let mut seen = BTreeSet::new();
        for volume in &self.volumes {
            volume.validate()?;
            if !seen.insert(volume.name.as_str()) {
                return Err(VolumeError::Validation(format!(
                    "volume `{}` is declared more than once",
                    volume.name
                )));
            }
        }
        Ok(())
    }

    /// Loads and validates a JSON manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] when the file cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, ManifestError> {
        let content = read_to_string_ambient(path).map_err(|message| ManifestError::Read {
            path: path.to_string(),
            message,
        })?;
        serde_json::from_str(&content).map_err(|err| ManifestError::Invalid {
            path: path.to_string(),
            message: err.to_string(),
        })
    }
}

fn read_to_string_ambient(path: &Utf8Path) -> Result<String, String> {
    let (dir_path, file_path) = if path.is_absolute() {
        let parent = path
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path}"))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests;
