use genie_config::prelude::*;
use genie_test_utils::{init_tracing, TempConfigRoot};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

type Log = Arc<Mutex<Vec<(String, Option<Value>, ConfigScope)>>>;

fn recorder(log: &Log) -> impl Fn(&ConfigChange) -> anyhow::Result<()> + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |change: &ConfigChange| {
        log.lock()
            .push((change.key.clone(), change.value.clone(), change.scope));
        Ok(())
    }
}

#[test]
fn test_watcher_fires_once_per_set() {
    init_tracing();
    let root = TempConfigRoot::new();
    let log: Log = Arc::default();
    root.manager.watch("x", recorder(&log));

    root.manager.set("x", 1, ConfigScope::User).unwrap();

    assert_eq!(
        *log.lock(),
        vec![("x".to_string(), Some(json!(1)), ConfigScope::User)]
    );
}

#[test]
fn test_failing_watcher_does_not_block_others() {
    let root = TempConfigRoot::new();
    let log: Log = Arc::default();

    root.manager.watch("x", |_| anyhow::bail!("watcher exploded"));
    root.manager.watch("x", |_| panic!("watcher panicked"));
    root.manager.watch("x", recorder(&log));

    root.manager.set("x", 1, ConfigScope::Global).unwrap();
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn test_watchers_fire_in_registration_order() {
    let root = TempConfigRoot::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for n in 0..3 {
        let order = Arc::clone(&order);
        root.manager.watch("x", move |_| {
            order.lock().push(n);
            Ok(())
        });
    }

    root.manager.set("x", true, ConfigScope::Session).unwrap();
    assert_eq!(*order.lock(), vec![0, 1, 2]);
}

#[test]
fn test_delete_notifies_with_none() {
    let root = TempConfigRoot::new();
    let log: Log = Arc::default();
    root.manager.set("x", 1, ConfigScope::Global).unwrap();
    root.manager.watch("x", recorder(&log));

    assert!(root.manager.delete("x", ConfigScope::Global).unwrap());
    assert!(!root.manager.delete("x", ConfigScope::Global).unwrap());

    assert_eq!(
        *log.lock(),
        vec![("x".to_string(), None, ConfigScope::Global)]
    );
}

#[test]
fn test_rejected_write_fires_nothing() {
    let root = TempConfigRoot::new();
    let log: Log = Arc::default();
    root.manager.watch("learning_rate", recorder(&log));

    assert!(root
        .manager
        .set("learning_rate", 7, ConfigScope::User)
        .is_err());
    assert!(log.lock().is_empty());
}

#[test]
fn test_watcher_only_sees_its_key() {
    let root = TempConfigRoot::new();
    let log: Log = Arc::default();
    root.manager.watch("models.default", recorder(&log));

    root.manager.set("models", json!({"default": "x"}), ConfigScope::User).unwrap();
    root.manager.set("models.fallback", "y", ConfigScope::User).unwrap();
    assert!(log.lock().is_empty());
}

#[test]
fn test_unwatch_stops_notifications() {
    let root = TempConfigRoot::new();
    let log: Log = Arc::default();
    let id = root.manager.watch("x", recorder(&log));

    root.manager.set("x", 1, ConfigScope::User).unwrap();
    assert!(root.manager.unwatch(id));
    assert!(!root.manager.unwatch(id));
    root.manager.set("x", 2, ConfigScope::User).unwrap();

    assert_eq!(log.lock().len(), 1);
}

#[test]
fn test_import_does_not_notify() {
    let root = TempConfigRoot::new();
    let log: Log = Arc::default();
    root.manager.set("x", 1, ConfigScope::User).unwrap();
    root.manager.watch("x", recorder(&log));

    let file = root.scratch("user.yaml");
    root.manager.export(ConfigScope::User, &file, None).unwrap();
    root.manager
        .import(&file, ConfigScope::Global, None, true)
        .unwrap();

    assert!(log.lock().is_empty());
}
