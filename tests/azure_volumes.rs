//! Integration tests for the Azure volume port against the in-memory cloud.

use std::sync::Arc;

use kompox_volume::azure::ResourceNamer;
use kompox_volume::metadata::{
    TAG_APP_NAME, TAG_DISK_ASSIGNED, TAG_DISK_NAME, TAG_MANAGED_BY, TAG_VOLUME,
};
use kompox_volume::test_support::InMemoryCloud;
use kompox_volume::volume::{DiskOptions, FilesOptions, ResourceKind};
use kompox_volume::{
    App, AzureVolumes, DiskCreateRequest, DriverSettings, LogicalVolume, SnapshotCreateRequest,
    VolumeDriver, VolumeError, VolumeOptions, VolumeType,
};
use rstest::{fixture, rstest};

struct Harness {
    cloud: Arc<InMemoryCloud>,
    volumes: AzureVolumes<InMemoryCloud>,
    namer: ResourceNamer,
    app: App,
}

#[fixture]
fn harness() -> Harness {
    let cloud = Arc::new(InMemoryCloud::new());
    let namer = ResourceNamer::new("ws", "aks", "kompox")
        .unwrap_or_else(|err| panic!("namer should be valid: {err}"));
    let volumes = AzureVolumes::new(
        Arc::clone(&cloud),
        DriverSettings::new(namer.clone(), "westeurope"),
    );
    let app = App::new("shop")
        .with_cluster("prod")
        .with_zone("2")
        .with_volume(LogicalVolume::new(
            "db",
            20 << 30,
            VolumeOptions::Disk(DiskOptions::default()),
        ))
        .with_volume(LogicalVolume::new(
            "uploads",
            5 << 30,
            VolumeOptions::Files(FilesOptions::default()),
        ))
        .with_volume(LogicalVolume::new(
            "cache",
            1 << 30,
            VolumeOptions::Files(FilesOptions::default()),
        ));
    Harness {
        cloud,
        volumes,
        namer,
        app,
    }
}

impl Harness {
    fn resource_group(&self) -> String {
        self.namer
            .resource_group(&self.app)
            .unwrap_or_else(|err| panic!("resource group: {err}"))
    }

    async fn create(&self, volume: &str, request: DiskCreateRequest) -> String {
        self.volumes
            .disk_create(&self.app, volume, &request)
            .await
            .unwrap_or_else(|err| panic!("create in {volume}: {err}"))
            .name
    }
}

#[rstest]
#[tokio::test]
async fn disk_resources_carry_identity_tags(harness: Harness) {
    harness
        .create("db", DiskCreateRequest::new().name("primary"))
        .await;

    let group = harness.resource_group();
    let disks = harness.cloud.disks(&group);
    let [disk] = disks.as_slice() else {
        panic!("expected one disk, got {disks:?}");
    };
    let expected_name = harness
        .namer
        .disk(&harness.app, "db", "primary")
        .unwrap_or_else(|err| panic!("disk name: {err}"));
    assert_eq!(disk.name, expected_name);
    assert_eq!(disk.size_gib, 20);
    assert_eq!(disk.zone.as_deref(), Some("2"));
    assert_eq!(disk.tags.get(TAG_VOLUME), Some("db"));
    assert_eq!(disk.tags.get(TAG_DISK_NAME), Some("primary"));
    assert_eq!(disk.tags.get(TAG_DISK_ASSIGNED), Some("false"));
    assert_eq!(disk.tags.get(TAG_APP_NAME), Some("shop"));
    assert_eq!(disk.tags.get(TAG_MANAGED_BY), Some("kompox"));
}

#[rstest]
#[tokio::test]
async fn snapshot_restore_round_trip_keeps_a_single_assigned_disk(harness: Harness) {
    let blue = harness
        .create("db", DiskCreateRequest::new().name("blue"))
        .await;
    harness
        .volumes
        .disk_assign(&harness.app, "db", &blue)
        .await
        .unwrap_or_else(|err| panic!("assign blue: {err}"));

    let snapshot = harness
        .volumes
        .snapshot_create(&harness.app, "db", &SnapshotCreateRequest::default())
        .await
        .unwrap_or_else(|err| panic!("snapshot assigned disk: {err}"));
    assert_eq!(snapshot.size_bytes, 20 << 30);

    let green = harness
        .create(
            "db",
            DiskCreateRequest::new().source(format!("snapshot:{}", snapshot.name)),
        )
        .await;
    harness
        .volumes
        .disk_assign(&harness.app, "db", &green)
        .await
        .unwrap_or_else(|err| panic!("assign green: {err}"));

    let disks = harness
        .volumes
        .disk_list(&harness.app, "db")
        .await
        .unwrap_or_else(|err| panic!("list: {err}"));
    let assigned: Vec<&str> = disks
        .iter()
        .filter(|disk| disk.assigned)
        .map(|disk| disk.name.as_str())
        .collect();
    assert_eq!(assigned, [green.as_str()]);
    assert_eq!(disks.len(), 2);
}

#[rstest]
#[tokio::test]
async fn files_volumes_share_one_storage_account(harness: Harness) {
    harness
        .create("uploads", DiskCreateRequest::new().name("a"))
        .await;
    harness
        .create("cache", DiskCreateRequest::new().name("a"))
        .await;

    assert_eq!(harness.cloud.storage_accounts().len(), 1);
    let uploads = harness
        .volumes
        .disk_list(&harness.app, "uploads")
        .await
        .unwrap_or_else(|err| panic!("list uploads: {err}"));
    let cache = harness
        .volumes
        .disk_list(&harness.app, "cache")
        .await
        .unwrap_or_else(|err| panic!("list cache: {err}"));
    assert_eq!((uploads.len(), cache.len()), (1, 1));
    assert_ne!(
        uploads.first().map(|disk| disk.handle.clone()),
        cache.first().map(|disk| disk.handle.clone())
    );
}

#[rstest]
#[tokio::test]
async fn files_volume_has_no_snapshots(harness: Harness) {
    let err = harness
        .volumes
        .snapshot_list(&harness.app, "uploads")
        .await
        .expect_err("files snapshots are unsupported");
    assert_eq!(
        err,
        VolumeError::Unsupported {
            operation: "snapshot list",
            volume_type: VolumeType::Files,
        }
    );
}

#[rstest]
#[tokio::test]
async fn undeclared_volume_is_not_found(harness: Harness) {
    let err = harness
        .volumes
        .disk_list(&harness.app, "logs")
        .await
        .expect_err("undeclared volume");
    assert_eq!(
        err,
        VolumeError::NotFound {
            kind: ResourceKind::Volume,
            volume: String::from("logs"),
            name: String::from("logs"),
        }
    );
    assert_eq!(harness.cloud.mutations(), 0);
}

#[rstest]
#[case("db", "managed-csi", "ReadWriteOnce")]
#[case("uploads", "azurefile-csi", "ReadWriteMany")]
fn class_is_routed_by_volume_type(
    harness: Harness,
    #[case] volume: &str,
    #[case] storage_class: &str,
    #[case] access_mode: &str,
) {
    let declared = harness
        .app
        .find_volume(volume)
        .unwrap_or_else(|err| panic!("volume {volume}: {err}"));
    let class = harness.volumes.class(declared);
    assert_eq!(class.storage_class_name, storage_class);
    assert_eq!(class.access_modes, [access_mode]);
    assert_eq!(class.reclaim_policy, "Retain");
}
