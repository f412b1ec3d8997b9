//! Session durability across store instances and backends.

use std::sync::Arc;

use parking_lot::Mutex;
use switchyard_session::{
    DurableStorage, JsonFileStorage, SessionStore, SqliteStorage, CREDENTIAL_KEY, IDENTITY_KEY,
};
use tempfile::TempDir;

#[test]
fn json_file_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");

    let first = SessionStore::new(Arc::new(JsonFileStorage::new(&path)));
    first.establish("abc123", "ops1");
    drop(first);

    let second = SessionStore::new(Arc::new(JsonFileStorage::new(&path)));
    assert_eq!(second.current_credential().as_deref(), Some("abc123"));
    assert_eq!(second.current_identity().as_deref(), Some("ops1"));
    assert!(second.authenticated_signal().get());
}

#[test]
fn sqlite_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.db");

    SessionStore::new(Arc::new(SqliteStorage::open(&path).unwrap())).establish("abc123", "ops1");

    let reopened = SessionStore::new(Arc::new(SqliteStorage::open(&path).unwrap()));
    assert_eq!(reopened.current_credential().as_deref(), Some("abc123"));
    assert_eq!(reopened.current_identity().as_deref(), Some("ops1"));
}

#[test]
fn clear_after_restart_empties_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    SessionStore::new(Arc::new(JsonFileStorage::new(&path))).establish("abc123", "ops1");

    let storage = Arc::new(JsonFileStorage::new(&path));
    let store = SessionStore::new(Arc::clone(&storage) as Arc<dyn DurableStorage>);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _obs = store.observe_authenticated(move |v| sink.lock().push(v));

    store.clear();

    assert!(storage.get(CREDENTIAL_KEY).unwrap().is_none());
    assert!(storage.get(IDENTITY_KEY).unwrap().is_none());
    assert_eq!(*seen.lock(), vec![true, false]);
}

#[test]
fn host_and_fragment_share_one_store() {
    let store = Arc::new(SessionStore::in_memory());
    let fragment_view = Arc::clone(&store);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _obs = fragment_view.observe_authenticated(move |v| sink.lock().push(v));

    store.establish("abc123", "ops1");
    assert_eq!(fragment_view.current_identity().as_deref(), Some("ops1"));

    store.clear();
    assert_eq!(*seen.lock(), vec![false, true, false]);
}
