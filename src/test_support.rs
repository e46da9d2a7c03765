//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::sync::{Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};

use crate::azure::{
    ApiError, ApiFuture, ComputeApi, DiskCreation, DiskResource, DiskSpec, FileShareResource,
    FileShareSpec, ResourceGroupApi, SnapshotResource, SnapshotSpec, StorageAccountSpec,
    StorageApi,
};
use crate::metadata::Tags;

/// Subscription used in identifiers minted by [`InMemoryCloud`].
pub const TEST_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

const EPOCH_SECONDS: i64 = 1_700_000_000;

#[derive(Default)]
struct CloudState {
    resource_groups: BTreeMap<String, Tags>,
    disks: BTreeMap<(String, String), DiskResource>,
    snapshots: BTreeMap<(String, String), SnapshotResource>,
    accounts: BTreeMap<(String, String), StorageAccountSpec>,
    shares: BTreeMap<(String, String, String), FileShareResource>,
    calls: BTreeMap<String, usize>,
    failures: BTreeMap<String, ApiError>,
    tick: i64,
}

impl CloudState {
    fn record(&mut self, operation: &str) -> Result<(), ApiError> {
        *self.calls.entry(operation.to_owned()).or_default() += 1;
        self.failures
            .get(operation)
            .cloned()
            .map_or(Ok(()), Err)
    }

    fn next_time(&mut self) -> Option<DateTime<Utc>> {
        self.tick += 1;
        DateTime::from_timestamp(EPOCH_SECONDS + self.tick, 0)
    }

    fn require_group(&self, resource_group: &str) -> Result<(), ApiError> {
        if self.resource_groups.contains_key(resource_group) {
            return Ok(());
        }
        Err(not_found(format!("resourceGroups/{resource_group}")))
    }

    fn require_account(&self, resource_group: &str, account: &str) -> Result<(), ApiError> {
        if self
            .accounts
            .contains_key(&(resource_group.to_owned(), account.to_owned()))
        {
            return Ok(());
        }
        Err(not_found(format!("storageAccounts/{account}")))
    }

    fn source_size(&self, source_id: &str) -> Option<i32> {
        self.disks
            .values()
            .find(|disk| disk.id == source_id)
            .map(|disk| disk.size_gib)
            .or_else(|| {
                self.snapshots
                    .values()
                    .find(|snapshot| snapshot.id == source_id)
                    .map(|snapshot| snapshot.size_gib)
            })
    }
}

fn not_found(resource: String) -> ApiError {
    ApiError::NotFound { resource }
}

fn key(resource_group: &str, name: &str) -> (String, String) {
    (resource_group.to_owned(), name.to_owned())
}

/// Builds a compute resource identifier in the test subscription.
#[must_use]
pub fn compute_id(resource_group: &str, kind: &str, name: &str) -> String {
    format!(
        "/subscriptions/{TEST_SUBSCRIPTION}/resourceGroups/{resource_group}/providers/Microsoft.Compute/{kind}/{name}"
    )
}

/// In-memory stand-in for Azure Resource Manager.
///
/// Implements every cloud API seam with ARM-like semantics: creates into a
/// missing resource group or storage account fail with
/// [`ApiError::NotFound`], and creates are create-or-update: a PUT to an
/// existing disk, snapshot or share replaces its properties and tags but
/// keeps its creation time. Every call is counted by operation
/// name (the trait method name, such as `create_disk`), and failures can be
/// injected per operation.
#[derive(Default)]
pub struct InMemoryCloud {
    state: StdMutex<CloudState>,
    latency: StdMutex<Option<Duration>>,
}

impl InMemoryCloud {
    /// Creates an empty cloud.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StdMutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn latency(&self) -> Option<Duration> {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Makes every call sleep for `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = Some(latency);
    }

    /// Makes every call to `operation` fail with `error` until cleared.
    pub fn fail(&self, operation: &str, error: ApiError) {
        self.state().failures.insert(operation.to_owned(), error);
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Number of calls made to `operation`.
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.state().calls.get(operation).copied().unwrap_or_default()
    }

    /// Number of calls to operations that change state.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|(operation, _)| {
                ["create_", "update_", "delete_", "ensure_"]
                    .iter()
                    .any(|prefix| operation.starts_with(prefix))
            })
            .map(|(_, count)| count)
            .sum()
    }

    /// Adds a resource group directly.
    pub fn seed_resource_group(&self, name: &str) {
        self.state()
            .resource_groups
            .insert(name.to_owned(), Tags::new());
    }

    /// Adds a disk directly, bypassing naming and tagging. Creates the
    /// resource group as needed. The disk id is derived from its name when
    /// empty.
    pub fn seed_disk(&self, resource_group: &str, mut disk: DiskResource) {
        let mut state = self.state();
        state
            .resource_groups
            .entry(resource_group.to_owned())
            .or_default();
        if disk.id.is_empty() {
            disk.id = compute_id(resource_group, "disks", &disk.name);
        }
        if disk.time_created.is_none() {
            disk.time_created = state.next_time();
        }
        state.disks.insert(key(resource_group, &disk.name), disk);
    }

    /// Adds a storage account and share directly.
    pub fn seed_share(&self, resource_group: &str, account: &str, share: FileShareResource) {
        let mut state = self.state();
        state
            .resource_groups
            .entry(resource_group.to_owned())
            .or_default();
        state
            .accounts
            .entry(key(resource_group, account))
            .or_insert_with(|| StorageAccountSpec {
                location: String::from("westeurope"),
                sku: crate::volume::FilesSku::default(),
                tags: Tags::new(),
            });
        state.shares.insert(
            (resource_group.to_owned(), account.to_owned(), share.name.clone()),
            share,
        );
    }

    /// Names of existing resource groups.
    #[must_use]
    pub fn resource_groups(&self) -> Vec<String> {
        self.state().resource_groups.keys().cloned().collect()
    }

    /// Disks in `resource_group`, ordered by name.
    #[must_use]
    pub fn disks(&self, resource_group: &str) -> Vec<DiskResource> {
        self.state()
            .disks
            .iter()
            .filter(|((group, _), _)| group == resource_group)
            .map(|(_, disk)| disk.clone())
            .collect()
    }

    /// Snapshots in `resource_group`, ordered by name.
    #[must_use]
    pub fn snapshots(&self, resource_group: &str) -> Vec<SnapshotResource> {
        self.state()
            .snapshots
            .iter()
            .filter(|((group, _), _)| group == resource_group)
            .map(|(_, snapshot)| snapshot.clone())
            .collect()
    }

    /// Storage accounts as `(resource group, account)` pairs.
    #[must_use]
    pub fn storage_accounts(&self) -> Vec<(String, String)> {
        self.state().accounts.keys().cloned().collect()
    }

    /// Spec an account was created with.
    #[must_use]
    pub fn storage_account(&self, resource_group: &str, account: &str) -> Option<StorageAccountSpec> {
        self.state().accounts.get(&key(resource_group, account)).cloned()
    }

    /// Shares in one storage account, ordered by name.
    #[must_use]
    pub fn shares(&self, resource_group: &str, account: &str) -> Vec<FileShareResource> {
        self.state()
            .shares
            .iter()
            .filter(|((group, acct, _), _)| group == resource_group && acct == account)
            .map(|(_, share)| share.clone())
            .collect()
    }
}

impl ResourceGroupApi for InMemoryCloud {
    fn ensure_resource_group<'a>(
        &'a self,
        name: &'a str,
        _location: &'a str,
        tags: &'a Tags,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("ensure_resource_group")?;
            state
                .resource_groups
                .entry(name.to_owned())
                .or_insert_with(|| tags.clone());
            Ok(())
        })
    }
}

impl ComputeApi for InMemoryCloud {
    fn list_disks<'a>(&'a self, resource_group: &'a str) -> ApiFuture<'a, Vec<DiskResource>> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("list_disks")?;
            state.require_group(resource_group)?;
            Ok(state
                .disks
                .iter()
                .filter(|((group, _), _)| group == resource_group)
                .map(|(_, disk)| disk.clone())
                .collect())
        })
    }

    fn get_disk<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
    ) -> ApiFuture<'a, DiskResource> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("get_disk")?;
            state
                .disks
                .get(&key(resource_group, name))
                .cloned()
                .ok_or_else(|| not_found(format!("disks/{name}")))
        })
    }

    fn create_disk<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
        spec: &'a DiskSpec,
    ) -> ApiFuture<'a, DiskResource> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("create_disk")?;
            state.require_group(resource_group)?;
            if let DiskCreation::Copy { source_id } = &spec.creation {
                state
                    .source_size(source_id)
                    .ok_or_else(|| not_found(source_id.clone()))?;
            }
            let previous = state
                .disks
                .get(&key(resource_group, name))
                .map(|existing| existing.time_created);
            let time_created = previous.unwrap_or_else(|| state.next_time());
            let disk = DiskResource {
                id: compute_id(resource_group, "disks", name),
                name: name.to_owned(),
                zone: spec.zone.clone(),
                size_gib: spec.size_gib,
                sku: Some(spec.sku.as_str().to_owned()),
                iops: spec.iops,
                mbps: spec.mbps,
                tags: spec.tags.clone(),
                time_created,
            };
            state.disks.insert(key(resource_group, name), disk.clone());
            Ok(disk)
        })
    }

    fn update_disk_tags<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
        tags: &'a Tags,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("update_disk_tags")?;
            let disk = state
                .disks
                .get_mut(&key(resource_group, name))
                .ok_or_else(|| not_found(format!("disks/{name}")))?;
            disk.tags = tags.clone();
            Ok(())
        })
    }

    fn delete_disk<'a>(&'a self, resource_group: &'a str, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("delete_disk")?;
            state
                .disks
                .remove(&key(resource_group, name))
                .map(|_| ())
                .ok_or_else(|| not_found(format!("disks/{name}")))
        })
    }

    fn list_snapshots<'a>(
        &'a self,
        resource_group: &'a str,
    ) -> ApiFuture<'a, Vec<SnapshotResource>> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("list_snapshots")?;
            state.require_group(resource_group)?;
            Ok(state
                .snapshots
                .iter()
                .filter(|((group, _), _)| group == resource_group)
                .map(|(_, snapshot)| snapshot.clone())
                .collect())
        })
    }

    fn get_snapshot<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
    ) -> ApiFuture<'a, SnapshotResource> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("get_snapshot")?;
            state
                .snapshots
                .get(&key(resource_group, name))
                .cloned()
                .ok_or_else(|| not_found(format!("snapshots/{name}")))
        })
    }

    fn create_snapshot<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
        spec: &'a SnapshotSpec,
    ) -> ApiFuture<'a, SnapshotResource> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("create_snapshot")?;
            state.require_group(resource_group)?;
            let size_gib = state
                .source_size(&spec.source_id)
                .ok_or_else(|| not_found(spec.source_id.clone()))?;
            let previous = state
                .snapshots
                .get(&key(resource_group, name))
                .map(|existing| existing.time_created);
            let time_created = previous.unwrap_or_else(|| state.next_time());
            let snapshot = SnapshotResource {
                id: compute_id(resource_group, "snapshots", name),
                name: name.to_owned(),
                size_gib,
                tags: spec.tags.clone(),
                time_created,
            };
            state
                .snapshots
                .insert(key(resource_group, name), snapshot.clone());
            Ok(snapshot)
        })
    }

    fn delete_snapshot<'a>(
        &'a self,
        resource_group: &'a str,
        name: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("delete_snapshot")?;
            state
                .snapshots
                .remove(&key(resource_group, name))
                .map(|_| ())
                .ok_or_else(|| not_found(format!("snapshots/{name}")))
        })
    }
}

impl StorageApi for InMemoryCloud {
    fn storage_account_exists<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
    ) -> ApiFuture<'a, bool> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("storage_account_exists")?;
            Ok(state.accounts.contains_key(&key(resource_group, account)))
        })
    }

    fn create_storage_account<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        spec: &'a StorageAccountSpec,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("create_storage_account")?;
            state.require_group(resource_group)?;
            state
                .accounts
                .insert(key(resource_group, account), spec.clone());
            Ok(())
        })
    }

    fn list_shares<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
    ) -> ApiFuture<'a, Vec<FileShareResource>> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("list_shares")?;
            state.require_account(resource_group, account)?;
            Ok(state
                .shares
                .iter()
                .filter(|((group, acct, _), _)| group == resource_group && acct == account)
                .map(|(_, share)| share.clone())
                .collect())
        })
    }

    fn get_share<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
    ) -> ApiFuture<'a, FileShareResource> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("get_share")?;
            state
                .shares
                .get(&(resource_group.to_owned(), account.to_owned(), share.to_owned()))
                .cloned()
                .ok_or_else(|| not_found(format!("shares/{share}")))
        })
    }

    fn create_share<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
        spec: &'a FileShareSpec,
    ) -> ApiFuture<'a, FileShareResource> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("create_share")?;
            state.require_account(resource_group, account)?;
            let share_key = (resource_group.to_owned(), account.to_owned(), share.to_owned());
            let previous = state
                .shares
                .get(&share_key)
                .map(|existing| existing.last_modified);
            let last_modified = previous.unwrap_or_else(|| state.next_time());
            let created = FileShareResource {
                id: format!(
                    "/subscriptions/{TEST_SUBSCRIPTION}/resourceGroups/{resource_group}/providers/Microsoft.Storage/storageAccounts/{account}/fileServices/default/shares/{share}"
                ),
                name: share.to_owned(),
                quota_gib: spec.quota_gib,
                metadata: spec.metadata.clone(),
                last_modified,
            };
            state.shares.insert(share_key, created.clone());
            Ok(created)
        })
    }

    fn update_share_metadata<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
        metadata: &'a Tags,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("update_share_metadata")?;
            let existing = state
                .shares
                .get_mut(&(resource_group.to_owned(), account.to_owned(), share.to_owned()))
                .ok_or_else(|| not_found(format!("shares/{share}")))?;
            existing.metadata = metadata.clone();
            Ok(())
        })
    }

    fn delete_share<'a>(
        &'a self,
        resource_group: &'a str,
        account: &'a str,
        share: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.delay().await;
            let mut state = self.state();
            state.record("delete_share")?;
            state
                .shares
                .remove(&(resource_group.to_owned(), account.to_owned(), share.to_owned()))
                .map(|_| ())
                .ok_or_else(|| not_found(format!("shares/{share}")))
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
