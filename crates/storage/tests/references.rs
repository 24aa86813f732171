#![forbid(unsafe_code)]

use cr_core::{NodePath, Property, StagedNode, Value};
use cr_storage::{Credentials, RepositoryConfig, SqliteStore};
use tempfile::TempDir;

fn open_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store =
        SqliteStore::open(RepositoryConfig::at(dir.path().join("repo.db"))).expect("open store");
    store
        .login(Credentials::new("admin", "secret"), None)
        .expect("login");
    (dir, store)
}

fn path(value: &str) -> NodePath {
    NodePath::try_new(value).expect("valid path")
}

fn referenceable(store: &mut SqliteStore, at: &str) -> String {
    store
        .store_node(
            &StagedNode::new(path(at)).with_mixin("mix:referenceable"),
            false,
        )
        .expect("store target")
}

fn strong(name: &str, target: &str) -> Property {
    Property::single(name, Value::Reference(target.to_string())).expect("reference")
}

fn weak(name: &str, target: &str) -> Property {
    Property::single(name, Value::WeakReference(target.to_string())).expect("weak reference")
}

#[test]
fn reverse_lookup_finds_referencing_properties() {
    let (_dir, mut store) = open_store();
    let target = referenceable(&mut store, "/target");
    store
        .store_node(
            &StagedNode::new(path("/source"))
                .with_property(strong("link", &target))
                .with_property(weak("hint", &target)),
            false,
        )
        .expect("store source");

    assert_eq!(
        store.get_references("/target", None).expect("strong"),
        vec!["/source/link".to_string()]
    );
    assert_eq!(
        store.get_weak_references("/target", None).expect("weak"),
        vec!["/source/hint".to_string()]
    );
    assert!(
        store
            .get_references("/target", Some("other"))
            .expect("filtered")
            .is_empty()
    );
    let err = store.get_references("/absent", None).expect_err("no target");
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn rewriting_a_node_rebuilds_its_edges() {
    let (_dir, mut store) = open_store();
    let first = referenceable(&mut store, "/first");
    let second = referenceable(&mut store, "/second");
    store
        .store_node(
            &StagedNode::new(path("/source")).with_property(strong("link", &first)),
            false,
        )
        .expect("store source");

    store
        .store_node(
            &StagedNode::existing(path("/source")).with_property(strong("link", &second)),
            false,
        )
        .expect("update source");

    assert!(store.get_references("/first", None).expect("first").is_empty());
    assert_eq!(
        store.get_references("/second", None).expect("second"),
        vec!["/source/link".to_string()]
    );
}

#[test]
fn strong_reference_to_missing_node_is_rejected() {
    let (_dir, mut store) = open_store();
    let err = store
        .store_node(
            &StagedNode::new(path("/dangling"))
                .with_property(strong("link", "5f1d3c2e-0000-4000-8000-000000000000")),
            false,
        )
        .expect_err("dangling");
    assert_eq!(err.code(), "INTEGRITY_VIOLATION");
    assert!(store.node_exists("/dangling").expect("exists").is_none());

    store
        .store_node(
            &StagedNode::new(path("/loose"))
                .with_property(weak("hint", "5f1d3c2e-0000-4000-8000-000000000000")),
            false,
        )
        .expect("weak reference to a missing node is allowed");
}

#[test]
fn nodes_stored_together_may_reference_each_other() {
    let (_dir, mut store) = open_store();
    let target_id = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
    let tree = StagedNode::new(path("/pair"))
        .with_property(strong("link", target_id))
        .with_child(
            StagedNode::new(path("/pair/target"))
                .with_mixin("mix:referenceable")
                .with_identifier(target_id),
        );
    store.store_node(&tree, true).expect("store pair");

    assert_eq!(
        store.get_references("/pair/target", None).expect("refs"),
        vec!["/pair/link".to_string()]
    );
}

#[test]
fn strong_references_block_deletion_until_removed() {
    let (_dir, mut store) = open_store();
    store
        .store_node(&StagedNode::new(path("/tree")), false)
        .expect("store tree");
    let leaf = referenceable(&mut store, "/tree/leaf");
    let other = referenceable(&mut store, "/other");
    store
        .store_node(
            &StagedNode::new(path("/holder"))
                .with_property(strong("link", &leaf))
                .with_property(weak("hint", &other)),
            false,
        )
        .expect("store holder");

    let err = store.delete_node("/tree").expect_err("referenced subtree");
    assert_eq!(err.code(), "INTEGRITY_VIOLATION");
    assert!(store.node_exists("/tree/leaf").expect("exists").is_some());

    store.delete_node("/other").expect("weak references do not block");
    assert!(store.node_exists("/other").expect("exists").is_none());

    store.delete_property("/holder/link").expect("drop link");
    assert!(store.get_references("/tree/leaf", None).expect("refs").is_empty());
    store.delete_node("/tree").expect("delete after unlinking");
}

#[test]
fn references_move_with_their_nodes() {
    let (_dir, mut store) = open_store();
    let target = referenceable(&mut store, "/target");
    store
        .store_node(
            &StagedNode::new(path("/source")).with_property(strong("link", &target)),
            false,
        )
        .expect("store source");

    store.move_node("/source", "/renamed").expect("move source");
    store.move_node("/target", "/goal").expect("move target");

    assert_eq!(
        store.get_references("/goal", None).expect("refs"),
        vec!["/renamed/link".to_string()]
    );
}
