//! Unit tests for the application aggregate.

use std::io::Write as _;

use super::*;
use crate::volume::{VolumeOptions, VolumeType};
use rstest::rstest;

const MANIFEST: &str = r#"{
  "name": "web",
  "zone": "1",
  "volumes": [
    { "name": "data", "size": 34359738368 },
    { "name": "shared", "size": 1073741824, "type": "files", "options": { "quotaGiB": 5 } }
  ]
}"#;

#[rstest]
fn find_volume_reports_missing_volume() {
    let app = App::new("web").with_volume(LogicalVolume::new(
        "data",
        1 << 30,
        VolumeOptions::default(),
    ));
    assert!(app.find_volume("data").is_ok());
    let err = app.find_volume("logs").expect_err("undeclared volume");
    assert_eq!(
        err,
        VolumeError::NotFound {
            kind: ResourceKind::Volume,
            volume: String::from("logs"),
            name: String::from("logs"),
        }
    );
}

#[rstest]
fn manifest_parses_in_declaration_order() {
    let app: App = serde_json::from_str(MANIFEST).expect("manifest parses");
    assert_eq!(app.zone.as_deref(), Some("1"));
    let names: Vec<_> = app.volumes.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["data", "shared"]);
    assert_eq!(
        app.find_volume("shared").expect("declared").volume_type(),
        VolumeType::Files
    );
}

#[rstest]
#[case(r#"{ "name": "web", "volumes": [ { "name": "data", "size": 0 } ] }"#)]
#[case(r#"{ "name": "web", "volumes": [ { "name": "Data", "size": 1 } ] }"#)]
#[case(r#"{ "name": "web", "volumes": [ { "name": "a", "size": 1 }, { "name": "a", "size": 1 } ] }"#)]
#[case(r#"{ "name": " ", "volumes": [] }"#)]
#[case(r#"{ "name": "web", "region": "westeurope" }"#)]
fn invalid_manifests_are_rejected(#[case] raw: &str) {
    assert!(serde_json::from_str::<App>(raw).is_err());
}

#[rstest]
fn load_reads_manifest_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(MANIFEST.as_bytes()).expect("write manifest");
    let path = camino::Utf8PathBuf::from_path_buf(file.path().to_path_buf())
        .expect("temp path is utf-8");
    let app = App::load(&path).expect("manifest loads");
    assert_eq!(app.name, "web");
    assert_eq!(app.volumes.len(), 2);
}

#[rstest]
fn load_reports_missing_file() {
    let err = App::load(Utf8Path::new("/nonexistent/kompox/app.json"))
        .expect_err("file does not exist");
    assert!(matches!(err, ManifestError::Read { .. }), "{err}");
}
