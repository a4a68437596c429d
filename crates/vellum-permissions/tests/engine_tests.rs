//! Integration tests for rule loading and evaluation

use std::io::Write;
use std::sync::Arc;

use vellum_permissions::{
    Action, ActionFlags, PermissionConfig, PermissionEngine, PermissionRule, Role,
};

fn site_rules() -> PermissionEngine {
    let json = r#"{
        "rules": [
            {"pattern": "/97. 보안 폴더*", "roles": ["ADMIN"]},
            {"pattern": "/members/*", "roles": ["VERIFIED", "ADMIN"]},
            {"pattern": "/members/welcome.md", "roles": [], "is_public": true},
            {"pattern": "/drafts/*", "roles": ["ADMIN"], "actions": {"write": true, "create": true}},
            {"pattern": "/drafts/archive/*", "roles": ["ADMIN"], "actions": {"delete": true}}
        ]
    }"#;
    PermissionEngine::new(PermissionConfig::from_json_str(json).unwrap()).unwrap()
}

#[test]
fn test_secure_folder_scenario() {
    let engine = site_rules();
    let path = "/97. 보안 폴더/secret.md";

    assert!(!engine.evaluate(Role::Anonymous, path, Action::Read));
    assert!(!engine.evaluate(Role::Guest, path, Action::Read));
    assert!(engine.evaluate(Role::Admin, path, Action::Read));
    // The folder itself is covered by the trailing wildcard.
    assert!(!engine.evaluate(Role::Guest, "/97. 보안 폴더", Action::Read));
}

#[test]
fn test_public_exception_inside_restricted_area() {
    let engine = site_rules();
    assert!(!engine.can_read(Role::Guest, "/members/roster.md"));
    assert!(engine.can_read(Role::Guest, "/members/welcome.md"));
    assert!(engine.can_read(Role::Anonymous, "/members/welcome.md"));
    assert!(engine.can_read(Role::Verified, "/members/roster.md"));
}

#[test]
fn test_explicit_action_flags_follow_specificity() {
    let engine = site_rules();

    let drafts = engine.resolve(Role::Admin, "/drafts/post.md");
    assert!(drafts.read && drafts.write && drafts.create);
    assert!(!drafts.delete);

    // The more specific archive rule only grants delete (and default read).
    let archive = engine.resolve(Role::Admin, "/drafts/archive/old.md");
    assert!(archive.read);
    assert!(archive.delete);
    assert!(!archive.write);
    assert!(!archive.create);
}

#[test]
fn test_unmatched_paths_use_open_posture() {
    let engine = site_rules();
    for role in Role::ALL {
        let resolved = engine.resolve(role, "/guides/intro.md");
        assert!(resolved.read);
        assert!(!resolved.write && !resolved.delete && !resolved.create);
        assert!(resolved.required_roles.is_empty());
    }
}

#[test]
fn test_rules_loaded_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"/private*": ["ADMIN"], "/team/*": ["VERIFIED"]}}"#).unwrap();

    let engine = PermissionEngine::new(PermissionConfig::load(file.path()).unwrap()).unwrap();
    assert_eq!(engine.len(), 2);
    assert!(!engine.can_read(Role::Verified, "/private/keys.md"));
    assert!(engine.can_read(Role::Verified, "/team/plan.md"));
}

#[test]
fn test_compact_rules_tie_goes_to_first_declared() {
    // Both patterns score the same; the document lists the ADMIN rule first.
    let json = r#"{"/b/*": ["ADMIN"], "/*/x": ["GUEST"]}"#;
    let engine = PermissionEngine::new(PermissionConfig::from_json_str(json).unwrap()).unwrap();

    assert_eq!(engine.rules()[0].pattern, "/b/*");
    assert_eq!(engine.matching_rule("/b/x").unwrap().pattern, "/b/*");
    assert!(!engine.evaluate(Role::Guest, "/b/x", Action::Read));
    assert!(engine.evaluate(Role::Admin, "/b/x", Action::Read));
    assert!(engine.evaluate(Role::Guest, "/c/x", Action::Read));
}

#[test]
fn test_engine_shared_across_threads() {
    let mut config = PermissionConfig::new();
    config.add_rule(PermissionRule::new("/ops/*", [Role::Admin]).with_actions(ActionFlags::all()));
    let engine = Arc::new(PermissionEngine::new(config).unwrap());

    let handles: Vec<_> = Role::ALL
        .into_iter()
        .map(|role| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || (role, engine.evaluate(role, "/ops/runbook.md", Action::Write)))
        })
        .collect();

    for handle in handles {
        let (role, allowed) = handle.join().unwrap();
        assert_eq!(allowed, role == Role::Admin);
    }
}
