use std::fs;
use std::path::Path;

use amock_config::{search_conf_in, ConfigStore, Seg, DEFAULT_CONF_PATH, HOST_MOUNT_ROOT};
use tempfile::TempDir;

fn write_conf(root: &Path, prefix: &str, body: &str) -> std::path::PathBuf {
    let rel = DEFAULT_CONF_PATH.trim_start_matches('/');
    let path = root.join(prefix.trim_start_matches('/')).join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn explicit_path_wins_over_mounted_and_default() {
    let sandbox = TempDir::new().unwrap();
    let root = sandbox.path();

    write_conf(root, HOST_MOUNT_ROOT, "[gpus]\ncard_count = 2\n");
    write_conf(root, "", "[gpus]\ncard_count = 3\n");
    let explicit = root.join("explicit.toml");
    fs::write(&explicit, "[gpus]\ncard_count = 1\n").unwrap();

    let found = search_conf_in(Some(&explicit), root).unwrap();
    assert_eq!(found, explicit);

    let store = ConfigStore::load_rooted(Some(&explicit), root);
    assert_eq!(
        store.get_i64(&[Seg::Key("gpus"), Seg::Key("card_count")]),
        Some(1)
    );
}

#[test]
fn mounted_host_path_wins_over_default() {
    let sandbox = TempDir::new().unwrap();
    let root = sandbox.path();

    let host = write_conf(root, HOST_MOUNT_ROOT, "[gpus]\ncard_count = 2\n");
    write_conf(root, "", "[gpus]\ncard_count = 3\n");

    assert_eq!(search_conf_in(None, root).unwrap(), host);
}

#[test]
fn missing_explicit_path_falls_through() {
    let sandbox = TempDir::new().unwrap();
    let root = sandbox.path();

    let default = write_conf(root, "", "[gpus]\ncard_count = 3\n");
    let ghost = root.join("nonexistent.toml");

    assert_eq!(search_conf_in(Some(&ghost), root).unwrap(), default);
}

#[test]
fn no_document_anywhere_degrades_to_failed_store() {
    let sandbox = TempDir::new().unwrap();
    let store = ConfigStore::load_rooted(None, sandbox.path());

    let reason = store.failure().expect("failure reason recorded");
    assert!(reason.contains("gpu_mock_conf.toml"));
    assert_eq!(store.get_i64(&[Seg::Key("gpus"), Seg::Key("card_count")]), None);
}

#[test]
fn parse_error_degrades_to_failed_store_with_location() {
    let sandbox = TempDir::new().unwrap();
    let root = sandbox.path();
    write_conf(root, "", "[gpus\ncard_count = 3\n");

    let store = ConfigStore::load_rooted(None, root);
    let reason = store.failure().expect("failure reason recorded");
    assert!(reason.contains("toml parse error"), "reason: {reason}");
    assert_eq!(store.get_i64(&[Seg::Key("gpus"), Seg::Key("card_count")]), None);
}

#[test]
fn open_reports_source_path() {
    let sandbox = TempDir::new().unwrap();
    let path = sandbox.path().join("conf.toml");
    fs::write(&path, "[ascend_npus]\ncard_count = 8\n").unwrap();

    let store = ConfigStore::open(&path).unwrap();
    assert_eq!(store.source(), Some(path.as_path()));
    assert_eq!(
        store.get_i64(&[Seg::Key("ascend_npus"), Seg::Key("card_count")]),
        Some(8)
    );
}
