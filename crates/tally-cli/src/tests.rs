use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::json;
use tally_core::models::{AuditAction, AuditEntry, AuditEntryId, ChangeOperation};
use tally_core::{LocalState, SyncConflict, SyncRecord};
use tempfile::TempDir;

use crate::commands::audit::list_audit_entries;
use crate::commands::common::{
    format_audit_lines, format_conflict_lines, format_timestamp, normalize_record_id,
    parse_payload, parse_restore_point_id,
};
use crate::commands::config::apply_config_init;
use crate::commands::queue::queue_record_change;
use crate::commands::restore::{
    apply_restore_point, create_restore_point, delete_restore_point, list_restore_points,
};
use crate::commands::status::load_status;
use crate::commands::sync::sync_profile;
use crate::config_profiles::{CliProfile, CliProfilesConfig, ResolvedProfile};
use crate::error::CliError;

fn test_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.db");
    (dir, path)
}

fn profile(settings: CliProfile) -> ResolvedProfile {
    ResolvedProfile {
        name: "household".to_string(),
        settings,
    }
}

fn signed_in() -> CliProfile {
    CliProfile {
        remote_url: None,
        user_id: Some("user-1".to_string()),
        device_id: Some("laptop".to_string()),
    }
}

fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap()
}

#[test]
fn normalize_record_id_rejects_empty() {
    assert!(matches!(
        normalize_record_id(" \n "),
        Err(CliError::EmptyRecordId)
    ));
    assert_eq!(normalize_record_id("  t-1  ").unwrap(), "t-1");
}

#[test]
fn parse_payload_defaults_by_operation() {
    assert_eq!(parse_payload(ChangeOperation::Create, None).unwrap(), json!({}));
    assert_eq!(
        parse_payload(ChangeOperation::Delete, None).unwrap(),
        json!(null)
    );
    assert_eq!(
        parse_payload(ChangeOperation::Update, Some(r#"{"amount": 4}"#)).unwrap(),
        json!({ "amount": 4 })
    );
    assert!(matches!(
        parse_payload(ChangeOperation::Update, Some("{nope")),
        Err(CliError::InvalidPayload(_))
    ));
}

#[test]
fn parse_restore_point_id_rejects_garbage() {
    assert!(matches!(
        parse_restore_point_id("not-an-id"),
        Err(CliError::InvalidRestorePointId(_))
    ));
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(at(0)), "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_audit_lines_include_key_fields() {
    let entries = vec![AuditEntry {
        id: AuditEntryId::new(),
        action: AuditAction::Delete,
        transaction_id: "t-42".to_string(),
        changed_at: at(60),
        changed_by: "laptop".to_string(),
        previous_state: None,
        new_state: None,
    }];

    let rendered = format_audit_lines(&entries);
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].starts_with("1970-01-01 00:01:00 UTC"));
    assert!(rendered[0].contains("delete "));
    assert!(rendered[0].contains("t-42"));
    assert!(rendered[0].ends_with("by laptop"));
}

#[test]
fn format_conflict_lines_show_versions() {
    let conflicts = vec![SyncConflict {
        record_id: "t1".to_string(),
        local: None,
        remote: SyncRecord::new("t1", json!({})).with_version(3),
        local_version: None,
        remote_version: Some(3),
        detected_at: at(0),
    }];

    assert_eq!(
        format_conflict_lines(&conflicts),
        vec!["conflict: t1 local=- remote=3".to_string()]
    );
}

#[test]
fn config_init_validates_and_activates_profile() {
    let mut config = CliProfilesConfig {
        version: 1,
        active_profile: Some("work".to_string()),
        profiles: BTreeMap::new(),
    };

    assert!(matches!(
        apply_config_init(
            &mut config,
            "household",
            Some("ledger.example.com".to_string()),
            None,
            None,
            true,
        ),
        Err(CliError::Config(_))
    ));

    apply_config_init(
        &mut config,
        "household",
        Some(" https://ledger.example.com ".to_string()),
        Some("user-1".to_string()),
        None,
        true,
    )
    .unwrap();
    apply_config_init(
        &mut config,
        "household",
        None,
        None,
        Some("laptop".to_string()),
        false,
    )
    .unwrap();

    let stored = config.profile("household").unwrap();
    assert_eq!(stored.remote_url.as_deref(), Some("https://ledger.example.com"));
    assert_eq!(stored.user_id.as_deref(), Some("user-1"));
    assert_eq!(stored.device_id.as_deref(), Some("laptop"));
    assert_eq!(config.active_profile.as_deref(), Some("household"));
}

#[tokio::test(flavor = "current_thread")]
async fn queued_changes_persist_across_invocations() {
    let (_dir, db_path) = test_db();
    let profile = profile(signed_in());

    let first = queue_record_change(
        "t1",
        ChangeOperation::Create,
        Some(r#"{"amount": 5}"#),
        &db_path,
        &profile,
    )
    .unwrap();
    let second = queue_record_change(
        "t1",
        ChangeOperation::Update,
        Some(r#"{"amount": 6}"#),
        &db_path,
        &profile,
    )
    .unwrap();

    assert_eq!((first, second), (1, 2));
    let status = load_status(&db_path, &profile).unwrap();
    assert_eq!(status.pending_changes, 2);
    assert!(status.last_sync_at.is_none());

    let entries = list_audit_entries(Some(1), &db_path, &profile).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Update);
    assert_eq!(entries[0].changed_by, "laptop");
    assert_eq!(entries[0].new_state, Some(json!({ "amount": 6 })));
}

#[tokio::test(flavor = "current_thread")]
async fn restore_point_lifecycle() {
    let (_dir, db_path) = test_db();
    let profile = profile(signed_in());

    queue_record_change("t1", ChangeOperation::Create, None, &db_path, &profile).unwrap();
    let point = create_restore_point(" Before cleanup ", &db_path, &profile).unwrap();
    assert_eq!(point.label, "Before cleanup");
    assert_eq!(point.snapshot.len(), 1);

    queue_record_change("t2", ChangeOperation::Create, None, &db_path, &profile).unwrap();

    let listed = list_restore_points(&db_path, &profile).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, point.id);

    let restored: LocalState =
        apply_restore_point(&point.id.to_string(), &db_path, &profile).unwrap();
    assert_eq!(restored.len(), 1);
    assert!(restored.get("t2").is_none());
    assert_eq!(load_status(&db_path, &profile).unwrap().pending_changes, 3);

    let entries = list_audit_entries(None, &db_path, &profile).unwrap();
    assert_eq!(entries.last().unwrap().action, AuditAction::Restore);

    delete_restore_point(&point.id.to_string(), &db_path, &profile).unwrap();
    assert!(list_restore_points(&db_path, &profile).unwrap().is_empty());
    assert!(matches!(
        delete_restore_point(&point.id.to_string(), &db_path, &profile),
        Err(CliError::Core(tally_core::Error::NotFound(_)))
    ));
}

#[test]
fn empty_restore_point_label_is_rejected() {
    let (_dir, db_path) = test_db();
    assert!(matches!(
        create_restore_point("  ", &db_path, &profile(signed_in())),
        Err(CliError::EmptyLabel)
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn sync_requires_configured_remote() {
    let (_dir, db_path) = test_db();

    let result = sync_profile(false, &db_path, &profile(signed_in())).await;

    assert!(matches!(result, Err(CliError::RemoteNotConfigured)));
}

#[tokio::test(flavor = "current_thread")]
async fn sync_without_user_fails_before_network() {
    let (_dir, db_path) = test_db();
    let settings = CliProfile {
        remote_url: Some("https://ledger.invalid".to_string()),
        user_id: None,
        device_id: None,
    };

    let result = sync_profile(false, &db_path, &profile(settings)).await;

    assert!(matches!(
        result,
        Err(CliError::Core(tally_core::Error::NotAuthenticated))
    ));
}
