#![forbid(unsafe_code)]

use cr_core::{NodePath, StagedNode};
use cr_storage::{
    BackendError, Credentials, DescriptorValue, RepositoryConfig, SqliteStore, StoreError,
};
use std::time::Duration;

fn node(value: &str) -> StagedNode {
    StagedNode::new(NodePath::try_new(value).expect("valid path"))
}

fn admin() -> Credentials {
    Credentials::new("admin", "secret")
}

#[test]
fn config_loads_from_yaml() {
    let config = RepositoryConfig::from_yaml_str(
        "database_path: /var/lib/repo/content.db\n\
         busy_timeout_ms: 250\n\
         default_workspace: live\n\
         check_login_on_server: false\n",
    )
    .expect("parse config");
    assert_eq!(config.database_path.to_str(), Some("/var/lib/repo/content.db"));
    assert_eq!(config.busy_timeout(), Duration::from_millis(250));
    assert_eq!(config.default_workspace, "live");
    assert!(!config.check_login_on_server);
    assert!(config.provision_schema);

    let err = RepositoryConfig::from_yaml_str("database_path: x.db\nunknown_key: 1\n")
        .expect_err("unknown key");
    assert_eq!(err.code(), "BACKEND");
    let err = RepositoryConfig::from_yaml_str("default_workspace: \"bad name\"\n")
        .expect_err("bad workspace");
    assert_eq!(err.code(), "BACKEND");
}

#[test]
fn config_file_is_read_from_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config_path = dir.path().join("repository.yaml");
    let database = dir.path().join("nested").join("repo.db");
    std::fs::write(
        &config_path,
        format!("database_path: {}\n", database.display()),
    )
    .expect("write config");

    let config = RepositoryConfig::load(&config_path).expect("load config");
    let mut store = SqliteStore::open(config).expect("open store");
    store.login(admin(), None).expect("login");
    assert!(database.exists());
}

#[test]
fn operations_require_a_session() {
    let mut store = SqliteStore::open(RepositoryConfig::in_memory()).expect("open store");
    assert!(!store.is_logged_in());
    let err = store.get_node("/").expect_err("no session");
    assert!(matches!(err, StoreError::NotLoggedIn));

    let err = store
        .login(Credentials::new("  ", "secret"), None)
        .expect_err("blank user");
    assert_eq!(err.code(), "AUTHENTICATION");

    store.login(admin(), None).expect("login");
    assert!(store.is_logged_in());
    assert_eq!(store.workspace_name(), Some("default"));
    store.logout().expect("logout");
    assert!(!store.is_logged_in());
    assert_eq!(store.workspace_name(), None);
}

#[test]
fn unknown_workspace_is_not_found() {
    let mut store = SqliteStore::open(RepositoryConfig::in_memory()).expect("open store");
    let err = store
        .login(admin(), Some("elsewhere"))
        .expect_err("missing workspace");
    assert_eq!(err.code(), "NOT_FOUND");
    let err = store
        .login(admin(), Some("not a name"))
        .expect_err("malformed workspace");
    assert_eq!(err.code(), "FORMAT_VIOLATION");
}

#[test]
fn deferred_login_checks_on_first_use() {
    let config = RepositoryConfig {
        check_login_on_server: false,
        ..RepositoryConfig::in_memory()
    };
    let mut store = SqliteStore::open(config).expect("open store");
    store
        .login(admin(), Some("elsewhere"))
        .expect("deferred login");
    assert!(!store.is_logged_in());
    assert_eq!(store.workspace_name(), Some("elsewhere"));

    let err = store.get_node("/").expect_err("workspace checked lazily");
    assert_eq!(err.code(), "NOT_FOUND");

    store.login(admin(), None).expect("deferred default login");
    store.get_node("/").expect("root of default workspace");
    assert!(store.is_logged_in());
}

#[test]
fn missing_schema_is_a_backend_error() {
    let config = RepositoryConfig {
        provision_schema: false,
        ..RepositoryConfig::in_memory()
    };
    let mut store = SqliteStore::open(config).expect("open store");
    let err = store.login(admin(), None).expect_err("no schema");
    assert!(matches!(
        err,
        StoreError::Backend(BackendError::MissingSchema(_))
    ));
}

#[test]
fn workspaces_are_isolated() {
    let mut store = SqliteStore::open(RepositoryConfig::in_memory()).expect("open store");
    store.login(admin(), None).expect("login");
    store.create_workspace("staging", None).expect("create staging");
    store.store_node(&node("/only-here"), false).expect("store");

    assert_eq!(
        store.list_workspaces().expect("list"),
        vec!["default".to_string(), "staging".to_string()]
    );
    assert!(store.workspace_exists("staging").expect("exists"));
    assert!(!store.workspace_exists("other").expect("exists"));

    let err = store
        .create_workspace("staging", None)
        .expect_err("duplicate workspace");
    assert_eq!(err.code(), "ALREADY_EXISTS");
    let err = store
        .create_workspace("clone", Some("default"))
        .expect_err("cloning");
    assert_eq!(err.code(), "NOT_SUPPORTED");

    store.login(admin(), Some("staging")).expect("switch");
    assert!(store.node_exists("/only-here").expect("exists").is_none());
    store.store_node(&node("/only-here"), false).expect("same path elsewhere");

    store.login(admin(), None).expect("back to default");
    store.delete_node("/only-here").expect("delete in default");
    store.login(admin(), Some("staging")).expect("switch again");
    assert!(store.node_exists("/only-here").expect("exists").is_some());
}

#[test]
fn descriptors_advertise_capabilities() {
    let store = SqliteStore::open(RepositoryConfig::in_memory()).expect("open store");
    let descriptors = store.repository_descriptors();
    assert_eq!(
        descriptors.get("option.transactions.supported"),
        Some(&DescriptorValue::Flag(true))
    );
    assert_eq!(
        descriptors.get("option.versioning.supported"),
        Some(&DescriptorValue::Flag(false))
    );
    assert!(matches!(
        descriptors.get("jcr.repository.name"),
        Some(DescriptorValue::Text(_))
    ));
}
