use super::*;
use crate::event::ChannelClass;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const USERS_YAML: &str = r#"
users:
  - name: Dana Reyes
    telegram_id: 1001
    roles: [operator]
  - name: Sam Okafor
    telegram_id: 1002
    roles: [supervisor, operator]
    asset_ids: [EX-001, EX-002]
  - name: Lee Park
    telegram_id: 1003
    roles: [admin]
    asset_ids: ["*"]
"#;

const PERMISSIONS_YAML: &str = r#"
roles:
  operator:
    allowed_intents: [fuel_log, status]
    allowed_channels: [private]
  supervisor:
    allowed_intents: [escalate, status, maintenance]
    allowed_channels: [group, supergroup]
  admin:
    allowed_intents: ["*"]
    allowed_channels: [all]
"#;

fn identity(roles: &[&str], asset_ids: &[&str]) -> Identity {
    Identity {
        name: "test".to_string(),
        telegram_id: 1,
        roles: roles.iter().map(|r| r.to_string()).collect(),
        asset_ids: asset_ids.iter().map(|a| a.to_string()).collect(),
    }
}

fn matrix() -> PermissionMatrix {
    serde_yaml::from_str(PERMISSIONS_YAML).unwrap()
}

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn rewrite(file: &NamedTempFile, contents: &str) {
    std::fs::write(file.path(), contents).unwrap();
}

// ── Asset access ──────────────────────────────────────────────────────────────

#[test]
fn test_empty_asset_list_grants_every_asset() {
    let user = identity(&["operator"], &[]);
    for asset in ["EX-001", "HT-042", "", "*", "anything"] {
        assert!(user.has_asset_access(asset), "denied {}", asset);
    }
}

#[test]
fn test_asset_list_restricts_access() {
    let user = identity(&["operator"], &["EX-001", "EX-002"]);
    assert!(user.has_asset_access("EX-001"));
    assert!(user.has_asset_access("EX-002"));
    assert!(!user.has_asset_access("EX-003"));
    // Case-sensitive
    assert!(!user.has_asset_access("ex-001"));
}

#[test]
fn test_asset_wildcard() {
    let user = identity(&["operator"], &["*"]);
    assert!(user.has_asset_access("EX-999"));
}

// ── Permission evaluation ─────────────────────────────────────────────────────

#[test]
fn test_operator_private_status_allowed() {
    let eval = RoleMatrixEvaluator;
    let user = identity(&["operator"], &[]);
    assert!(eval.is_allowed(&matrix(), &user, "status", ChannelClass::Private));
    assert!(eval.is_allowed(&matrix(), &user, "fuel_log", ChannelClass::Private));
}

#[test]
fn test_operator_denied_in_group_channel() {
    let eval = RoleMatrixEvaluator;
    let user = identity(&["operator"], &[]);
    assert!(!eval.is_allowed(&matrix(), &user, "status", ChannelClass::Group));
}

#[test]
fn test_operator_denied_unlisted_intent() {
    let eval = RoleMatrixEvaluator;
    let user = identity(&["operator"], &[]);
    assert!(!eval.is_allowed(&matrix(), &user, "shutdown", ChannelClass::Private));
}

#[test]
fn test_wildcard_intent_allows_any_intent() {
    let eval = RoleMatrixEvaluator;
    let user = identity(&["admin"], &[]);
    for intent in ["status", "shutdown", "config", "general", "", "made_up_command"] {
        for channel in [
            ChannelClass::Private,
            ChannelClass::Group,
            ChannelClass::Supergroup,
            ChannelClass::Unknown,
        ] {
            assert!(eval.is_allowed(&matrix(), &user, intent, channel));
        }
    }
}

#[test]
fn test_any_permitting_role_wins() {
    let eval = RoleMatrixEvaluator;
    // operator alone denies escalate; supervisor grants it in groups
    let user = identity(&["operator", "supervisor"], &[]);
    assert!(eval.is_allowed(&matrix(), &user, "escalate", ChannelClass::Group));
    // operator still grants private status
    assert!(eval.is_allowed(&matrix(), &user, "status", ChannelClass::Private));
    // role order does not matter
    let reversed = identity(&["supervisor", "operator"], &[]);
    assert!(eval.is_allowed(&matrix(), &reversed, "escalate", ChannelClass::Group));
}

#[test]
fn test_channel_must_match_on_the_same_role() {
    let eval = RoleMatrixEvaluator;
    // fuel_log is only on operator (private); supervisor's group channel
    // must not combine with operator's intent
    let user = identity(&["operator", "supervisor"], &[]);
    assert!(!eval.is_allowed(&matrix(), &user, "fuel_log", ChannelClass::Group));
}

#[test]
fn test_unknown_roles_grant_nothing() {
    let eval = RoleMatrixEvaluator;
    let ghost = identity(&["ghost"], &[]);
    assert!(!eval.is_allowed(&matrix(), &ghost, "status", ChannelClass::Private));

    // Unknown role next to a known one is skipped silently
    let mixed = identity(&["ghost", "operator"], &[]);
    assert!(eval.is_allowed(&matrix(), &mixed, "status", ChannelClass::Private));

    let none = identity(&[], &[]);
    assert!(!eval.is_allowed(&matrix(), &none, "status", ChannelClass::Private));
}

// ── Snapshot & store ──────────────────────────────────────────────────────────

#[test]
fn test_resolve_returns_copy() {
    let users: UserRegistry = serde_yaml::from_str(USERS_YAML).unwrap();
    let store = ConfigStore::new(AccessSnapshot::new(users, matrix()));

    let dana = store.resolve(1001).expect("registered");
    assert_eq!(dana.name, "Dana Reyes");
    assert!(dana.asset_ids.is_empty());

    let sam = store.resolve(1002).unwrap();
    assert_eq!(sam.roles, vec!["supervisor", "operator"]);

    assert!(store.resolve(9999).is_none());

    // Swapping in an empty config doesn't affect the copy already returned
    store.swap(AccessSnapshot::default());
    assert_eq!(dana.name, "Dana Reyes");
    assert!(store.resolve(1001).is_none());
}

#[test]
fn test_load_both_documents() {
    let users = write_temp(USERS_YAML);
    let perms = write_temp(PERMISSIONS_YAML);
    let paths = ConfigPaths::new(users.path(), perms.path());

    let snapshot = ConfigStore::load(&paths).expect("load");
    assert_eq!(snapshot.user_count(), 3);
    assert_eq!(snapshot.role_count(), 3);
    assert_eq!(
        snapshot.matrix.roles["operator"].allowed_channels,
        vec!["private"]
    );
}

#[test]
fn test_load_missing_file_errors() {
    let perms = write_temp(PERMISSIONS_YAML);
    let paths = ConfigPaths::new("/nonexistent/users.yaml", perms.path());

    let result = ConfigStore::load(&paths);
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn test_reload_with_syntax_error_keeps_previous_snapshot() {
    let users = write_temp(USERS_YAML);
    let perms = write_temp(PERMISSIONS_YAML);
    let paths = ConfigPaths::new(users.path(), perms.path());

    let store = ConfigStore::default();
    store.reload(&paths).expect("initial load");
    assert_eq!(store.generation(), 1);
    let before = store.snapshot();

    // Broken permissions document
    rewrite(&perms, "roles:\n  operator: [unclosed\n");
    let result = store.reload(&paths);
    assert!(matches!(result, Err(ConfigError::Parse { .. })));

    assert_eq!(store.generation(), 1);
    assert_eq!(*store.snapshot(), *before);
    assert_eq!(store.snapshot().role_count(), 3);
}

#[test]
fn test_reload_failure_on_users_keeps_matrix_too() {
    let users = write_temp(USERS_YAML);
    let perms = write_temp(PERMISSIONS_YAML);
    let paths = ConfigPaths::new(users.path(), perms.path());

    let store = ConfigStore::default();
    store.reload(&paths).unwrap();

    // Valid new permissions, broken users: nothing may be half-applied
    rewrite(&perms, "roles:\n  viewer:\n    allowed_intents: [status]\n    allowed_channels: [all]\n");
    rewrite(&users, "users: {not: [a list\n");
    assert!(store.reload(&paths).is_err());

    let snapshot = store.snapshot();
    assert!(snapshot.matrix.roles.contains_key("operator"));
    assert!(!snapshot.matrix.roles.contains_key("viewer"));
}

#[test]
fn test_valid_reload_after_failure_is_visible_to_new_readers_only() {
    let users = write_temp(USERS_YAML);
    let perms = write_temp(PERMISSIONS_YAML);
    let paths = ConfigPaths::new(users.path(), perms.path());

    let store = ConfigStore::default();
    store.reload(&paths).unwrap();

    rewrite(&users, "users: [");
    assert!(store.reload(&paths).is_err());

    // A request in the middle of evaluation holds this snapshot
    let in_flight: Arc<AccessSnapshot> = store.snapshot();

    rewrite(
        &users,
        "users:\n  - name: New Hire\n    telegram_id: 2001\n    roles: [operator]\n",
    );
    store.reload(&paths).expect("valid reload");
    assert_eq!(store.generation(), 2);

    // New readers see the new registry
    assert!(store.resolve(2001).is_some());
    assert!(store.resolve(1001).is_none());

    // The in-flight snapshot is unchanged
    assert!(in_flight.resolve(1001).is_some());
    assert!(in_flight.resolve(2001).is_none());
}

#[test]
fn test_concurrent_readers_see_whole_snapshots() {
    let users_a: UserRegistry = serde_yaml::from_str(USERS_YAML).unwrap();
    let snapshot_a = AccessSnapshot::new(users_a, matrix());
    let snapshot_b = AccessSnapshot::default();
    let store = Arc::new(ConfigStore::new(snapshot_a.clone()));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let snap = store.snapshot();
                    // Users and roles always come from the same document pair
                    assert_eq!(snap.user_count() == 0, snap.role_count() == 0);
                }
            })
        })
        .collect();

    for i in 0..200 {
        if i % 2 == 0 {
            store.swap(snapshot_b.clone());
        } else {
            store.swap(snapshot_a.clone());
        }
    }

    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(store.generation(), 200);
}
