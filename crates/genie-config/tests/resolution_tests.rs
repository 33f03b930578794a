use genie_config::prelude::*;
use genie_config::{ConfigPath, ErrorKind};
use genie_test_utils::{init_tracing, seed_defaults, TempConfigRoot};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};

#[test]
fn test_model_override_scenario() {
    init_tracing();
    let root = TempConfigRoot::new();
    let manager = &root.manager;

    manager
        .set("models.default", "llama3.1:8b", ConfigScope::Global)
        .unwrap();
    manager
        .set("models.default", "codellama:7b", ConfigScope::User)
        .unwrap();

    assert_eq!(
        manager.get("models.default").unwrap(),
        Some(json!("codellama:7b"))
    );
    assert_eq!(
        manager
            .get_scoped("models.default", ConfigScope::Global, None)
            .unwrap(),
        Some(json!("llama3.1:8b"))
    );
}

#[test]
fn test_full_hierarchy_peels_back_one_scope_at_a_time() {
    let root = TempConfigRoot::with_context("core");
    let manager = &root.manager;

    let order = [
        ConfigScope::Global,
        ConfigScope::User,
        ConfigScope::Team,
        ConfigScope::Project,
        ConfigScope::Session,
    ];
    for scope in order {
        manager.set("editor", scope.as_str(), scope).unwrap();
    }
    assert_eq!(manager.get("editor").unwrap(), Some(json!("session")));

    for (removed, expected) in order.iter().rev().zip(order.iter().rev().skip(1)) {
        assert!(manager.delete("editor", *removed).unwrap());
        assert_eq!(manager.get("editor").unwrap(), Some(json!(expected.as_str())));
    }
}

#[test]
fn test_project_scope_file_lives_in_project_tree() {
    let root = TempConfigRoot::with_context("core");
    root.manager
        .set("lint.strict", true, ConfigScope::Project)
        .unwrap();

    assert!(root.project().join(".codegenie/config.yaml").is_file());
    assert!(!root.base().join("projects").exists());
}

#[test]
fn test_missing_discriminator_is_invalid_argument() {
    let root = TempConfigRoot::new();
    for scope in [ConfigScope::Project, ConfigScope::Team] {
        let err = root.manager.set("x", 1, scope).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    // Hierarchy walk skips scopes with no context
    assert_eq!(root.manager.get("x").unwrap(), None);
}

#[test]
fn test_unknown_scope_tag() {
    let err = "workspace".parse::<ConfigScope>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(" Team ".parse::<ConfigScope>().unwrap(), ConfigScope::Team);
}

#[test]
fn test_set_is_visible_despite_cached_read() {
    let root = TempConfigRoot::new();
    let manager = &root.manager;
    seed_defaults(manager);

    assert_eq!(manager.get("ui.theme").unwrap(), Some(json!("light")));
    assert_eq!(
        manager
            .get_scoped("ui.theme", ConfigScope::Global, None)
            .unwrap(),
        Some(json!("light"))
    );

    manager.set("ui.theme", "dark", ConfigScope::Global).unwrap();
    assert_eq!(manager.get("ui.theme").unwrap(), Some(json!("dark")));
    assert_eq!(
        manager
            .get_scoped("ui.theme", ConfigScope::Global, None)
            .unwrap(),
        Some(json!("dark"))
    );
}

#[test]
fn test_invalidation_is_exact_key() {
    let root = TempConfigRoot::new();
    let manager = &root.manager;
    manager.set("models.default", "a", ConfigScope::Global).unwrap();
    manager.set("default", "b", ConfigScope::Global).unwrap();
    manager.get("models.default").unwrap();
    manager.get("default").unwrap();
    let cached = manager.cache_stats().entry_count;

    manager.set("default", "c", ConfigScope::Global).unwrap();
    assert_eq!(manager.cache_stats().entry_count, cached - 1);
    assert_eq!(manager.get("models.default").unwrap(), Some(json!("a")));
}

#[test]
fn test_delete_returns_default_not_stale_cache() {
    let root = TempConfigRoot::new();
    let manager = &root.manager;
    manager.set("editor", "vim", ConfigScope::User).unwrap();
    assert_eq!(manager.get_or("editor", "nano").unwrap(), json!("vim"));

    assert!(manager.delete("editor", ConfigScope::User).unwrap());
    assert_eq!(manager.get_or("editor", "nano").unwrap(), json!("nano"));
    assert_eq!(
        manager
            .get_scoped("editor", ConfigScope::User, None)
            .unwrap(),
        None
    );
}

#[test]
fn test_delete_is_idempotent() {
    let root = TempConfigRoot::new();
    let manager = &root.manager;
    manager.set("editor", "vim", ConfigScope::User).unwrap();

    assert!(manager.delete("editor", ConfigScope::User).unwrap());
    assert!(!manager.delete("editor", ConfigScope::User).unwrap());
    assert!(!manager.delete("never.there", ConfigScope::Global).unwrap());
}

#[test]
fn test_learning_rate_validator() {
    let root = TempConfigRoot::new();
    let manager = &root.manager;

    manager.set("learning_rate", 0.5, ConfigScope::User).unwrap();
    let err = manager
        .set("learning_rate", 2.0, ConfigScope::User)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert_eq!(manager.get("learning_rate").unwrap(), Some(json!(0.5)));
}

#[test]
fn test_custom_validator_replaces_previous() {
    let root = TempConfigRoot::new();
    let manager = &root.manager;

    manager.register_validator("retries", |v| v.as_u64().is_some_and(|n| n < 3));
    assert!(manager.set("retries", 5, ConfigScope::Global).is_err());

    manager.register_validator("retries", |v| v.as_u64().is_some_and(|n| n < 10));
    manager.set("retries", 5, ConfigScope::Global).unwrap();
    assert_eq!(manager.get("retries").unwrap(), Some(json!(5)));
}

#[test]
fn test_empty_validator_set() {
    let root = TempConfigRoot::new();
    let manager = ConfigManager::new(root.base())
        .with_validators(genie_config::ValidatorRegistry::new());
    manager.set("learning_rate", 5.0, ConfigScope::User).unwrap();
}

#[test]
fn test_documents_are_plain_yaml() {
    let root = TempConfigRoot::new();
    root.manager
        .set("models.default", "mistral", ConfigScope::User)
        .unwrap();
    let text = std::fs::read_to_string(root.manager.paths().user_config()).unwrap();
    let parsed: Value = serde_yaml::from_str(&text).unwrap();
    assert_eq!(parsed, json!({"models": {"default": "mistral"}}));
}

fn scope_strategy() -> impl Strategy<Value = ConfigScope> {
    prop_oneof![
        Just(ConfigScope::Session),
        Just(ConfigScope::Project),
        Just(ConfigScope::Team),
        Just(ConfigScope::User),
        Just(ConfigScope::Global),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_highest_precedence_scope_wins(
        scopes in proptest::collection::btree_set(scope_strategy().prop_map(|s| s.precedence()), 1..=5),
        key in "[a-z]{1,6}(\\.[a-z]{1,6}){0,2}",
    ) {
        let root = TempConfigRoot::with_context("core");
        let scopes: Vec<ConfigScope> = scopes
            .into_iter()
            .map(|p| ConfigScope::RESOLUTION_ORDER[p])
            .collect();

        for scope in &scopes {
            root.manager.set(&key, scope.as_str(), *scope).unwrap();
        }

        let winner = scopes.iter().min_by_key(|s| s.precedence()).unwrap();
        prop_assert_eq!(root.manager.get(&key).unwrap(), Some(json!(winner.as_str())));
        prop_assert!(ConfigPath::parse(&key).is_ok());
    }
}

#[test]
fn test_failed_save_leaves_cache_untouched() {
    let root = TempConfigRoot::new();
    let manager = &root.manager;
    manager.set("x", 1, ConfigScope::Global).unwrap();
    assert_eq!(manager.get("x").unwrap(), Some(json!(1)));

    // A plain file where the global directory should be breaks every load and save
    let global_dir = manager.paths().global_config().parent().unwrap().to_path_buf();
    std::fs::remove_dir_all(&global_dir).unwrap();
    std::fs::write(&global_dir, "not a directory").unwrap();

    let err = manager.set("x", 2, ConfigScope::Global).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(manager.get("x").unwrap(), Some(json!(1)));

    let err = manager.delete("x", ConfigScope::Global).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(manager.get("x").unwrap(), Some(json!(1)));
}

#[test]
fn test_scoped_read_with_default() {
    let root = TempConfigRoot::with_context("core");
    let manager = &root.manager;
    manager.set("lint.strict", true, ConfigScope::Team).unwrap();

    assert_eq!(
        manager
            .get_scoped_or("lint.strict", ConfigScope::Team, None, false)
            .unwrap(),
        json!(true)
    );
    assert_eq!(
        manager
            .get_scoped_or("lint.strict", ConfigScope::Team, Some("other"), false)
            .unwrap(),
        json!(false)
    );

    assert!(manager.delete("lint.strict", ConfigScope::Team).unwrap());
    assert_eq!(
        manager
            .get_scoped_or("lint.strict", ConfigScope::Team, None, false)
            .unwrap(),
        json!(false)
    );
}

#[test]
fn test_parent_delete_needs_cache_clear_for_children() {
    let root = TempConfigRoot::new();
    let manager = &root.manager;
    manager.set("models.default", "a", ConfigScope::User).unwrap();
    assert_eq!(manager.get("models.default").unwrap(), Some(json!("a")));

    // Exact-key invalidation: deleting the parent leaves the child entry cached
    assert!(manager.delete("models", ConfigScope::User).unwrap());
    assert_eq!(manager.get("models.default").unwrap(), Some(json!("a")));

    manager.clear_cache();
    assert_eq!(manager.get("models.default").unwrap(), None);
}
