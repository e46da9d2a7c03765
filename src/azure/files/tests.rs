//! Unit tests for the Azure Files driver.

use super::*;
use crate::azure::ApiError;
use crate::metadata::{TAG_SHARE_ASSIGNED, Tags};
use crate::test_support::InMemoryCloud;
use crate::volume::{DiskOptions, FilesSku};
use rstest::rstest;

fn settings() -> DriverSettings {
    let namer = ResourceNamer::new("ws", "aks", "kompox")
        .unwrap_or_else(|err| panic!("namer: {err}"));
    DriverSettings::new(namer, "westeurope")
}

fn files_options(quota_gib: Option<i32>) -> VolumeOptions {
    VolumeOptions::Files(FilesOptions {
        sku: Some(FilesSku::StandardZrs),
        protocol: None,
        quota_gib,
    })
}

fn app() -> App {
    App::new("web")
        .with_volume(LogicalVolume::new("shared", (9 << 30) + 7, files_options(None)))
        .with_volume(LogicalVolume::new("media", 1 << 30, files_options(Some(100))))
        .with_volume(LogicalVolume::new(
            "data",
            1 << 30,
            VolumeOptions::Disk(DiskOptions::default()),
        ))
}

fn driver() -> (Arc<InMemoryCloud>, FilesDriver<InMemoryCloud>) {
    let cloud = Arc::new(InMemoryCloud::new());
    (Arc::clone(&cloud), FilesDriver::new(cloud, settings()))
}

fn scope() -> (String, String) {
    let namer = settings().namer;
    let app = app();
    (
        namer
            .resource_group(&app)
            .unwrap_or_else(|err| panic!("resource group: {err}")),
        namer.storage_account(&app),
    )
}

async fn create_named(driver: &FilesDriver<InMemoryCloud>, volume: &str, name: &str) -> VolumeDisk {
    driver
        .disk_create(&app(), volume, &DiskCreateRequest::new().name(name))
        .await
        .unwrap_or_else(|err| panic!("create {volume}/{name}: {err}"))
}

#[tokio::test]
async fn first_share_creates_the_app_storage_account_once() {
    let (cloud, driver) = driver();
    let share = create_named(&driver, "shared", "a").await;
    create_named(&driver, "shared", "b").await;
    create_named(&driver, "media", "a").await;

    let (group, account) = scope();
    assert_eq!(cloud.storage_accounts(), vec![(group.clone(), account.clone())]);
    assert_eq!(cloud.calls("create_storage_account"), 1);
    let spec = cloud
        .storage_account(&group, &account)
        .unwrap_or_else(|| panic!("account {account} missing"));
    assert_eq!(spec.sku, FilesSku::StandardZrs);

    assert!(!share.assigned);
    assert_eq!(share.size_bytes, 10 << 30);
    assert_eq!(
        share.handle,
        format!("smb://{account}.file.core.windows.net/shared-a")
    );
    assert_eq!(cloud.shares(&group, &account).len(), 3);
}

#[tokio::test]
async fn quota_option_overrides_size() {
    let (_, driver) = driver();
    let share = create_named(&driver, "media", "a").await;
    assert_eq!(share.size_bytes, 100 << 30);
}

#[tokio::test]
async fn resource_group_failure_is_best_effort() {
    let (cloud, driver) = driver();
    let (group, _) = scope();
    cloud.seed_resource_group(&group);
    cloud.fail(
        "ensure_resource_group",
        ApiError::Http {
            status: 403,
            code: String::from("AuthorizationFailed"),
            message: String::from("no write on subscription"),
        },
    );
    create_named(&driver, "shared", "a").await;
    assert_eq!(cloud.calls("create_share"), 1);
}

#[tokio::test]
async fn create_with_source_is_unsupported() {
    let (cloud, driver) = driver();
    let err = driver
        .disk_create(&app(), "shared", &DiskCreateRequest::new().source("disk:a"))
        .await
        .expect_err("files cannot copy");
    assert_eq!(
        err,
        VolumeError::Unsupported {
            operation: "disk create from source",
            volume_type: VolumeType::Files,
        }
    );
    assert_eq!(cloud.mutations(), 0);
}

#[tokio::test]
async fn longest_valid_names_fit_the_share_limit() {
    let long = App::new("web").with_volume(LogicalVolume::new(
        "abcdefghijklmnop",
        1 << 30,
        files_options(None),
    ));
    let (cloud, driver) = driver();
    driver
        .disk_create(
            &long,
            "abcdefghijklmnop",
            &DiskCreateRequest::new().name("abcdefghijklmnopqrstuvwx"),
        )
        .await
        .unwrap_or_else(|err| panic!("41 character share: {err}"));
    let namer = settings().namer;
    let group = namer
        .resource_group(&long)
        .unwrap_or_else(|err| panic!("resource group: {err}"));
    let shares = cloud.shares(&group, &namer.storage_account(&long));
    let [share] = shares.as_slice() else {
        panic!("expected one share, got {shares:?}");
    };
    assert_eq!(share.name.len(), 41);
}

#[tokio::test]
async fn duplicate_share_name_is_rejected() {
    let (_, driver) = driver();
    create_named(&driver, "shared", "a").await;
    let err = driver
        .disk_create(&app(), "shared", &DiskCreateRequest::new().name("a"))
        .await
        .expect_err("duplicate");
    assert!(matches!(err, VolumeError::AlreadyExists { .. }), "{err}");
}

#[tokio::test]
async fn list_is_scoped_to_the_volume_and_tolerates_missing_account() {
    let (cloud, driver) = driver();
    let empty = driver
        .disk_list(&app(), "shared")
        .await
        .unwrap_or_else(|err| panic!("list: {err}"));
    assert!(empty.is_empty());

    create_named(&driver, "shared", "a").await;
    create_named(&driver, "media", "b").await;
    let (group, account) = scope();
    cloud.seed_share(
        &group,
        &account,
        FileShareResource {
            id: String::from("manual"),
            name: String::from("manual"),
            quota_gib: 1,
            metadata: Tags::new(),
            last_modified: None,
        },
    );
    let listed = driver
        .disk_list(&app(), "shared")
        .await
        .unwrap_or_else(|err| panic!("list: {err}"));
    let names: Vec<&str> = listed.iter().map(|disk| disk.name.as_str()).collect();
    assert_eq!(names, ["a"]);
}

#[tokio::test]
async fn assign_flips_share_metadata() {
    let (cloud, driver) = driver();
    create_named(&driver, "shared", "a").await;
    create_named(&driver, "shared", "b").await;
    for target in ["a", "b"] {
        driver
            .disk_assign(&app(), "shared", target)
            .await
            .unwrap_or_else(|err| panic!("assign {target}: {err}"));
    }
    let (group, account) = scope();
    let flags: Vec<(String, Option<String>)> = cloud
        .shares(&group, &account)
        .into_iter()
        .map(|share| {
            let flag = share.metadata.get(TAG_SHARE_ASSIGNED).map(str::to_owned);
            (share.name, flag)
        })
        .collect();
    assert_eq!(
        flags,
        vec![
            (String::from("shared-a"), Some(String::from("false"))),
            (String::from("shared-b"), Some(String::from("true"))),
        ]
    );
    assert_eq!(cloud.calls("update_share_metadata"), 3);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (cloud, driver) = driver();
    create_named(&driver, "shared", "a").await;
    for _ in 0..2 {
        driver
            .disk_delete(&app(), "shared", "a")
            .await
            .unwrap_or_else(|err| panic!("delete: {err}"));
    }
    let (group, account) = scope();
    assert!(cloud.shares(&group, &account).is_empty());
}

#[rstest]
#[case("snapshot list")]
#[case("snapshot create")]
#[case("snapshot delete")]
#[tokio::test]
async fn snapshot_operations_are_unsupported(#[case] operation: &str) {
    let (cloud, driver) = driver();
    let app = app();
    let request = SnapshotCreateRequest::default();
    let err = match operation {
        "snapshot list" => driver.snapshot_list(&app, "shared").await.map(|_| ()),
        "snapshot create" => driver
            .snapshot_create(&app, "shared", &request)
            .await
            .map(|_| ()),
        _ => driver.snapshot_delete(&app, "shared", "s").await,
    }
    .expect_err("unsupported");
    let VolumeError::Unsupported {
        operation: reported,
        volume_type,
    } = &err
    else {
        panic!("expected unsupported, got {err}");
    };
    assert_eq!(*reported, operation);
    assert_eq!(*volume_type, VolumeType::Files);
    assert_eq!(cloud.mutations(), 0);
}

#[rstest]
fn files_class_carries_sku_attribute() {
    let volume = LogicalVolume::new("shared", 1 << 30, files_options(None));
    let class = FilesDriver::<InMemoryCloud>::files_class(&volume);
    assert_eq!(class.storage_class_name, "azurefile-csi");
    assert_eq!(class.csi_driver, "file.csi.azure.com");
    assert_eq!(class.fs_type, None);
    assert_eq!(class.access_modes, vec![String::from("ReadWriteMany")]);
    assert_eq!(
        class.attributes.get("skuName").map(String::as_str),
        Some("Standard_ZRS")
    );
    assert_eq!(
        class.attributes.get("protocol").map(String::as_str),
        Some("smb")
    );
}

#[tokio::test]
async fn share_name_taken_by_another_volume_is_rejected() {
    let app = App::new("web")
        .with_volume(LogicalVolume::new("a-b", 1 << 30, files_options(None)))
        .with_volume(LogicalVolume::new("a", 1 << 30, files_options(None)));
    let (cloud, driver) = driver();
    driver
        .disk_create(&app, "a-b", &DiskCreateRequest::new().name("c"))
        .await
        .unwrap_or_else(|err| panic!("create a-b/c: {err}"));

    let err = driver
        .disk_create(&app, "a", &DiskCreateRequest::new().name("b-c"))
        .await
        .expect_err("share a-b-c is taken");
    assert_eq!(
        err,
        VolumeError::AlreadyExists {
            kind: ResourceKind::Disk,
            volume: String::from("a"),
            name: String::from("b-c"),
        }
    );
    assert_eq!(cloud.calls("create_share"), 1);

    let owner = driver
        .disk_list(&app, "a-b")
        .await
        .unwrap_or_else(|err| panic!("list a-b: {err}"));
    assert_eq!(
        owner.iter().map(|disk| disk.name.as_str()).collect::<Vec<_>>(),
        ["c"]
    );
    let other = driver
        .disk_list(&app, "a")
        .await
        .unwrap_or_else(|err| panic!("list a: {err}"));
    assert!(other.is_empty(), "{other:?}");
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        let bytes = self
            .0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn storage_account_creation_is_logged_once() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _default = tracing::subscriber::set_default(subscriber);

    let (_, driver) = driver();
    create_named(&driver, "shared", "a").await;
    create_named(&driver, "shared", "b").await;

    let text = logs.text();
    assert_eq!(text.matches("storage account created").count(), 1, "{text}");
    assert_eq!(text.matches("file share created").count(), 2, "{text}");
}
