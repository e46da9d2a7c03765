//! Provisioning source resolution.
//!
//! A source names an existing artifact to copy when creating a disk or a
//! snapshot. Prefixes are matched case-insensitively in this order:
//!
//! | Input | Meaning |
//! |---|---|
//! | empty | no source, create a blank resource |
//! | `/...` | literal backend resource identifier |
//! | `arm:...`, `resourceid:...` | literal identifier with the prefix stripped |
//! | `disk:<name>` | a managed disk of the same volume |
//! | `snapshot:<name>` | a managed snapshot of the same volume |
//! | anything else | unqualified; see [`SourceResolver::resolve_as_disk`] |

use crate::app::App;
use crate::volume::{VolumeError, VolumeFuture};

const ARM_PREFIX: &str = "arm:";
const RESOURCE_ID_PREFIX: &str = "resourceid:";
const DISK_PREFIX: &str = "disk:";
const SNAPSHOT_PREFIX: &str = "snapshot:";

/// A parsed source string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Source {
    /// No source was given.
    Blank,
    /// A backend identifier to use verbatim.
    ResourceId(String),
    /// A managed disk name.
    ManagedDisk(String),
    /// A managed snapshot name.
    ManagedSnapshot(String),
    /// A bare string whose meaning depends on the caller.
    Unqualified(String),
}

impl Source {
    /// Classifies `raw` by prefix. Surrounding whitespace is ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Blank;
        }
        if trimmed.starts_with('/') {
            return Self::ResourceId(trimmed.to_owned());
        }
        if let Some(id) = strip_prefix_ignore_case(trimmed, ARM_PREFIX)
            .or_else(|| strip_prefix_ignore_case(trimmed, RESOURCE_ID_PREFIX))
        {
            return Self::ResourceId(id.to_owned());
        }
        if let Some(name) = strip_prefix_ignore_case(trimmed, DISK_PREFIX) {
            return Self::ManagedDisk(name.to_owned());
        }
        if let Some(name) = strip_prefix_ignore_case(trimmed, SNAPSHOT_PREFIX) {
            return Self::ManagedSnapshot(name.to_owned());
        }
        Self::Unqualified(trimmed.to_owned())
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    value
        .get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .and_then(|_| value.get(prefix.len()..))
}

/// Looks up backend identifiers of managed resources.
///
/// Implementations return [`VolumeError::NotFound`] when the named resource
/// does not exist.
pub trait ManagedLookup: Send + Sync {
    /// Returns the backend identifier of a managed disk.
    fn disk_resource_id<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        disk: &'a str,
    ) -> VolumeFuture<'a, String>;

    /// Returns the backend identifier of a managed snapshot.
    fn snapshot_resource_id<'a>(
        &'a self,
        app: &'a App,
        volume: &'a str,
        snapshot: &'a str,
    ) -> VolumeFuture<'a, String>;
}

/// Resolves source strings to backend identifiers.
pub struct SourceResolver<'l, L: ManagedLookup + ?Sized> {
    lookup: &'l L,
}

impl<'l, L: ManagedLookup + ?Sized> SourceResolver<'l, L> {
    /// Creates a resolver backed by `lookup`.
    #[must_use]
    pub const fn new(lookup: &'l L) -> Self {
        Self { lookup }
    }

    /// Resolves explicitly prefixed sources.
    ///
    /// Returns `Ok(None)` for blank and unqualified input.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::Validation`] for `arm:`, `resourceid:`, `disk:`
    /// or `snapshot:` with nothing after the prefix, and [`VolumeError::NotFound`] when the referenced managed
    /// resource does not exist.
    pub async fn resolve(
        &self,
        app: &App,
        volume: &str,
        raw: &str,
    ) -> Result<Option<String>, VolumeError> {
        match Source::parse(raw) {
            Source::Blank | Source::Unqualified(_) => Ok(None),
            Source::ResourceId(id) if id.trim().is_empty() => Err(VolumeError::Validation(
                String::from("source resource id cannot be empty"),
            )),
            Source::ResourceId(id) => Ok(Some(id)),
            Source::ManagedDisk(name) => self.disk(app, volume, &name).await.map(Some),
            Source::ManagedSnapshot(name) => self.snapshot(app, volume, &name).await.map(Some),
        }
    }

    /// Resolves a source, treating an unqualified string as a disk name.
    ///
    /// # Errors
    ///
    /// As [`SourceResolver::resolve`].
    pub async fn resolve_as_disk(
        &self,
        app: &App,
        volume: &str,
        raw: &str,
    ) -> Result<Option<String>, VolumeError> {
        match Source::parse(raw) {
            Source::Unqualified(name) => self.disk(app, volume, &name).await.map(Some),
            _ => self.resolve(app, volume, raw).await,
        }
    }

    /// Resolves a source, treating an unqualified string as a snapshot name.
    ///
    /// # Errors
    ///
    /// As [`SourceResolver::resolve`].
    pub async fn resolve_as_snapshot(
        &self,
        app: &App,
        volume: &str,
        raw: &str,
    ) -> Result<Option<String>, VolumeError> {
        match Source::parse(raw) {
            Source::Unqualified(name) => self.snapshot(app, volume, &name).await.map(Some),
            _ => self.resolve(app, volume, raw).await,
        }
    }

    async fn disk(&self, app: &App, volume: &str, name: &str) -> Result<String, VolumeError> {
        if name.trim().is_empty() {
            return Err(VolumeError::Validation(String::from(
                "disk source name cannot be empty",
            )));
        }
        self.lookup.disk_resource_id(app, volume, name).await
    }

    async fn snapshot(&self, app: &App, volume: &str, name: &str) -> Result<String, VolumeError> {
        if name.trim().is_empty() {
            return Err(VolumeError::Validation(String::from(
                "snapshot source name cannot be empty",
            )));
        }
        self.lookup.snapshot_resource_id(app, volume, name).await
    }
}
