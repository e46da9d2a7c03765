//! Unit tests for the `kompox-volume` CLI binary implementation.
//!
//! Commands run against the in-memory cloud; nothing here needs credentials.

use super::*;
use cli::{DiskTargetArgs, VolumeArg};
use kompox_volume::LogicalVolume;
use kompox_volume::azure::ResourceNamer;
use kompox_volume::test_support::InMemoryCloud;
use kompox_volume::volume::{DiskOptions, FilesOptions};
use rstest::rstest;

fn volumes() -> AzureVolumes<InMemoryCloud> {
    let namer = ResourceNamer::new("ws", "aks", "kompox")
        .unwrap_or_else(|err| panic!("namer: {err}"));
    AzureVolumes::new(
        Arc::new(InMemoryCloud::new()),
        DriverSettings::new(namer, "westeurope"),
    )
}

fn app() -> App {
    App::new("web")
        .with_zone("1")
        .with_volume(LogicalVolume::new(
            "data",
            1 << 30,
            VolumeOptions::Disk(DiskOptions::default()),
        ))
        .with_volume(LogicalVolume::new(
            "shared",
            1 << 30,
            VolumeOptions::Files(FilesOptions::default()),
        ))
}

fn volume(name: &str) -> VolumeArg {
    VolumeArg {
        volume: name.to_owned(),
    }
}

async fn run(driver: &AzureVolumes<InMemoryCloud>, command: Command) -> Value {
    let mut out = Vec::new();
    execute(driver, &app(), command, &mut out)
        .await
        .unwrap_or_else(|err| panic!("command failed: {err}"));
    serde_json::from_slice(&out).unwrap_or_else(|err| panic!("output is not JSON: {err}"))
}

fn create(name: &str, options: &[&str]) -> Command {
    Command::Disk(DiskCommand::Create(DiskCreateArgs {
        volume: volume("data"),
        name: Some(name.to_owned()),
        source: None,
        zone: None,
        options: options.iter().map(|option| (*option).to_owned()).collect(),
    }))
}

#[tokio::test]
async fn disk_create_then_assign_is_visible_in_list() {
    let driver = volumes();
    let created = run(&driver, create("blue", &["sku=Premium_ZRS"])).await;
    assert_eq!(created["name"], "blue");
    assert_eq!(created["assigned"], false);
    assert_eq!(created["options"]["sku"], "Premium_ZRS");

    let assigned = run(
        &driver,
        Command::Disk(DiskCommand::Assign(DiskTargetArgs {
            volume: volume("data"),
            disk: String::from("blue"),
        })),
    )
    .await;
    assert_eq!(assigned, json!({ "volume": "data", "disk": "blue", "assigned": true }));

    let listed = run(&driver, Command::Disk(DiskCommand::List(volume("data")))).await;
    let Some([disk]) = listed.as_array().map(Vec::as_slice) else {
        panic!("expected one disk, got {listed}");
    };
    assert_eq!(disk["assigned"], true);
}

#[tokio::test]
async fn unknown_option_key_is_rejected() {
    let driver = volumes();
    let mut out = Vec::new();
    let err = execute(&driver, &app(), create("blue", &["color=red"]), &mut out)
        .await
        .expect_err("unknown key");
    assert!(
        matches!(err, CliError::Volume(VolumeError::Validation(_))),
        "unexpected error: {err}"
    );
    assert!(out.is_empty());
}

#[tokio::test]
async fn bootstrap_reports_created_then_skipped() {
    let driver = volumes();
    let bootstrap = || {
        Command::Bootstrap(BootstrapArgs {
            zone: Some(String::from("2")),
        })
    };
    let first = run(&driver, bootstrap()).await;
    assert_eq!(first["skipped"], false);
    let created = first["created"]
        .as_array()
        .unwrap_or_else(|| panic!("created list missing: {first}"));
    assert_eq!(created.len(), 2);
    let first_disk = created
        .first()
        .unwrap_or_else(|| panic!("created list empty: {first}"));
    assert_eq!(first_disk["zone"], "2");

    let second = run(&driver, bootstrap()).await;
    assert_eq!(second["skipped"], true);
    assert_eq!(second["reason"], "already initialized");
}

#[tokio::test]
async fn class_follows_the_volume_type() {
    let driver = volumes();
    let class = run(&driver, Command::Class(volume("shared"))).await;
    assert_eq!(class["csi_driver"], "file.csi.azure.com");
    assert_eq!(class["access_modes"], json!(["ReadWriteMany"]));
}

#[tokio::test]
async fn snapshot_restore_creates_a_disk_from_the_snapshot() {
    let driver = volumes();
    run(&driver, create("blue", &[])).await;
    run(
        &driver,
        Command::Snapshot(SnapshotCommand::Create(cli::SnapshotCreateArgs {
            volume: volume("data"),
            name: Some(String::from("nightly")),
            source: Some(String::from("blue")),
        })),
    )
    .await;
    let restored = run(
        &driver,
        Command::Snapshot(SnapshotCommand::Restore(SnapshotRestoreArgs {
            target: cli::SnapshotTargetArgs {
                volume: volume("data"),
                snapshot: String::from("nightly"),
            },
            name: Some(String::from("green")),
            zone: None,
        })),
    )
    .await;
    assert_eq!(restored["name"], "green");
    assert_eq!(restored["assigned"], false);
}

#[rstest]
#[case("iops=3000", "iops", json!(3000))]
#[case("sku=Premium_LRS", "sku", json!("Premium_LRS"))]
#[case(" quotaGiB = 5", "quotaGiB", json!(5))]
#[case("protocol=[\"smb\"]", "protocol", json!("[\"smb\"]"))]
fn parse_options_keeps_scalar_types(
    #[case] pair: &str,
    #[case] key: &str,
    #[case] expected: Value,
) {
    let parsed = parse_options(&[pair.to_owned()])
        .unwrap_or_else(|err| panic!("parse {pair}: {err}"));
    assert_eq!(parsed.get(key), Some(&expected));
}

#[rstest]
#[case("iops")]
#[case("=3000")]
fn parse_options_rejects_malformed_pairs(#[case] pair: &str) {
    let err = parse_options(&[pair.to_owned()]).expect_err("malformed pair");
    assert!(matches!(err, CliError::InvalidOption(_)), "unexpected error: {err}");
}

#[rstest]
fn restore_request_uses_snapshot_prefix() {
    let request = restore_request(&SnapshotRestoreArgs {
        target: cli::SnapshotTargetArgs {
            volume: volume("data"),
            snapshot: String::from("nightly"),
        },
        name: None,
        zone: Some(String::from("3")),
    });
    assert_eq!(request.source.as_deref(), Some("snapshot:nightly"));
    assert_eq!(request.zone.as_deref(), Some("3"));
}

#[rstest]
fn cli_parses_nested_disk_commands() {
    let cli = Cli::try_parse_from([
        "kompox-volume",
        "--app",
        "app.json",
        "disk",
        "create",
        "-V",
        "data",
        "-O",
        "sku=Premium_ZRS",
        "-O",
        "iops=3000",
    ])
    .unwrap_or_else(|err| panic!("parse: {err}"));
    assert_eq!(cli.app, "app.json");
    let Command::Disk(DiskCommand::Create(args)) = cli.command else {
        panic!("expected disk create");
    };
    assert_eq!(args.volume.volume, "data");
    assert_eq!(args.options, ["sku=Premium_ZRS", "iops=3000"]);
}

#[test]
fn write_error_prefixes_message() {
    let mut buf = Vec::new();
    write_error(&mut buf, &CliError::InvalidOption(String::from("bad")));
    let rendered = String::from_utf8(buf).expect("utf8");
    assert_eq!(rendered, "error: invalid option `bad`: expected KEY=VALUE\n");
}

#[tokio::test]
async fn failed_signal_handler_does_not_interrupt_the_command() {
    let outcome = until_interrupted(
        async {
            tokio::task::yield_now().await;
            Ok(())
        },
        async { Err(io::Error::other("signal handler unavailable")) },
    )
    .await;
    assert!(outcome.is_ok(), "{outcome:?}");
}

#[tokio::test]
async fn delivered_signal_interrupts_the_command() {
    let outcome = until_interrupted(std::future::pending(), async { Ok(()) }).await;
    assert!(matches!(outcome, Err(CliError::Interrupted)), "{outcome:?}");
}
