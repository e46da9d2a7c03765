//! Unit tests for the tag schema.

use super::*;
use rstest::rstest;

#[rstest]
fn disk_tags_round_trip_identity() {
    let tags = DISK_SCHEMA.encode("data", "01abc", true);
    assert_eq!(tags.get(TAG_DISK_ASSIGNED), Some("true"));
    assert_eq!(
        DISK_SCHEMA.decode(&tags),
        Some(ManagedRecord {
            volume: String::from("data"),
            name: String::from("01abc"),
            assigned: true,
        })
    );
}

#[rstest]
fn untagged_resources_are_foreign() {
    let foreign = Tags::new().with("owner", "someone-else");
    assert_eq!(DISK_SCHEMA.decode(&foreign), None);

    let half = Tags::new().with(TAG_VOLUME, "data");
    assert_eq!(DISK_SCHEMA.decode(&half), None);

    let empty_name = Tags::new()
        .with(TAG_VOLUME, "data")
        .with(TAG_DISK_NAME, "");
    assert_eq!(DISK_SCHEMA.decode(&empty_name), None);
}

#[rstest]
fn decode_for_filters_other_volumes() {
    let tags = DISK_SCHEMA.encode("cache", "a", false);
    assert!(DISK_SCHEMA.decode_for(&tags, "data").is_none());
    assert!(DISK_SCHEMA.decode_for(&tags, "cache").is_some());
}

#[rstest]
#[case("true", true)]
#[case("TRUE", true)]
#[case(" True ", true)]
#[case("false", false)]
#[case("yes", false)]
#[case("", false)]
fn flag_parsing_is_case_insensitive(#[case] raw: &str, #[case] expected: bool) {
    assert_eq!(parse_flag(raw), expected);
}

#[rstest]
fn missing_assigned_tag_reads_as_unassigned() {
    let tags = Tags::new()
        .with(TAG_VOLUME, "data")
        .with(TAG_SHARE_NAME, "a");
    let record = SHARE_SCHEMA.decode(&tags).expect("identity tags present");
    assert!(!record.assigned);
}

#[rstest]
fn with_assigned_preserves_other_tags() {
    let tags = DISK_SCHEMA
        .encode("data", "a", false)
        .with(TAG_APP_NAME, "web");
    let updated = DISK_SCHEMA.with_assigned(&tags, true);
    assert_eq!(updated.get(TAG_DISK_ASSIGNED), Some("true"));
    assert_eq!(updated.get(TAG_APP_NAME), Some("web"));
}

#[rstest]
fn snapshots_never_carry_an_assignment_flag() {
    let tags = SNAPSHOT_SCHEMA.encode("data", "snap1", true);
    assert_eq!(tags.get(TAG_DISK_ASSIGNED), None);
    assert_eq!(SNAPSHOT_SCHEMA.with_assigned(&tags, true), tags);
}

#[rstest]
fn app_scope_tags_mark_ownership() {
    let tags = app_scope_tags("ws", "aks", "web", "abc123");
    assert_eq!(tags.get(TAG_MANAGED_BY), Some(MANAGED_BY));
    assert_eq!(tags.get(TAG_APP_ID_HASH), Some("abc123"));
}
