#![forbid(unsafe_code)]

use cr_core::{
    BinaryValue, ChildNodeDefinition, NodePath, NodeTypeDefinition, Property, PropertyDefinition,
    PropertyType, StagedNode, Value,
};
use cr_storage::{Credentials, RepositoryConfig, SqliteStore};

fn open_store() -> SqliteStore {
    let mut store = SqliteStore::open(RepositoryConfig::in_memory()).expect("open store");
    store
        .login(Credentials::new("author", "secret"), None)
        .expect("login");
    store.register_namespace("app", "urn:example:app").expect("namespace");
    store
}

fn node(value: &str) -> StagedNode {
    StagedNode::new(NodePath::try_new(value).expect("valid path"))
}

fn article_type() -> NodeTypeDefinition {
    NodeTypeDefinition::new("app:article")
        .supertype("nt:base")
        .supertype("mix:created")
        .orderable()
        .property(PropertyDefinition::new("app:title", PropertyType::String).mandatory())
        .property(
            PropertyDefinition::new("app:status", PropertyType::String)
                .auto_created()
                .default_value("draft"),
        )
        .property(
            PropertyDefinition::new("app:rank", PropertyType::Long)
                .auto_created()
                .default_value("3"),
        )
        .child(ChildNodeDefinition::new("*").default_type("nt:unstructured"))
}

fn title(value: &str) -> Property {
    Property::single("app:title", Value::String(value.to_string())).expect("title")
}

#[test]
fn registered_types_are_listed_and_survive_reload() {
    let mut store = open_store();
    store
        .register_node_types(&[article_type()], false)
        .expect("register");

    let listed = store.node_types(Some(&["app:article"][..])).expect("list");
    assert_eq!(listed.len(), 1);
    let article = &listed[0];
    assert_eq!(article.supertypes, vec!["nt:base".to_string(), "mix:created".to_string()]);
    assert!(article.orderable_child_nodes);
    assert_eq!(article.properties.len(), 3);
    assert_eq!(article.properties[1].default_values, vec!["draft".to_string()]);
    assert_eq!(article.children.len(), 1);

    let all = store.node_types(None).expect("all types");
    assert!(all.iter().any(|definition| definition.name == "nt:folder"));
    assert!(all.iter().any(|definition| definition.name == "app:article"));
}

#[test]
fn registration_conflicts_are_reported() {
    let mut store = open_store();
    store
        .register_node_types(&[article_type()], false)
        .expect("register");

    let err = store
        .register_node_types(&[article_type()], false)
        .expect_err("duplicate");
    assert_eq!(err.code(), "ALREADY_EXISTS");
    store
        .register_node_types(&[article_type().mixin().supertype("mix:referenceable")], true)
        .expect("update");
    let updated = store.node_types(Some(&["app:article"][..])).expect("list");
    assert!(updated[0].is_mixin);

    let err = store
        .register_node_types(&[NodeTypeDefinition::new("nt:folder")], true)
        .expect_err("built-in");
    assert_eq!(err.code(), "ALREADY_EXISTS");
    let err = store
        .register_node_types(
            &[NodeTypeDefinition::new("app:orphan").supertype("app:missing")],
            false,
        )
        .expect_err("unknown supertype");
    assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
    let err = store
        .register_node_types_cnd("[app:x] > nt:base", false)
        .expect_err("cnd");
    assert_eq!(err.code(), "NOT_SUPPORTED");
}

#[test]
fn types_registered_together_may_reference_each_other() {
    let mut store = open_store();
    store
        .register_node_types(
            &[
                NodeTypeDefinition::new("app:special").supertype("app:base"),
                NodeTypeDefinition::new("app:base").supertype("nt:base"),
            ],
            false,
        )
        .expect("register pair");
    assert_eq!(store.node_types(Some(&["app:special", "app:base"][..])).expect("list").len(), 2);
}

#[test]
fn mandatory_properties_are_enforced() {
    let mut store = open_store();
    store
        .register_node_types(&[article_type()], false)
        .expect("register");

    let err = store
        .store_node(&node("/news").with_primary_type("app:article"), false)
        .expect_err("missing title");
    assert_eq!(err.code(), "CONSTRAINT_VIOLATION");

    store
        .store_node(
            &node("/news").with_primary_type("app:article").with_property(title("Hello")),
            false,
        )
        .expect("store article");
}

#[test]
fn auto_created_properties_are_synthesized() {
    let mut store = open_store();
    store
        .register_node_types(&[article_type()], false)
        .expect("register");
    let identifier = store
        .store_node(
            &node("/news")
                .with_primary_type("app:article")
                .with_mixin("mix:referenceable")
                .with_property(title("Hello")),
            false,
        )
        .expect("store");

    let snapshot = store.get_node("/news").expect("get");
    let value = |name: &str| snapshot.property(name).map(|p| p.value().clone());
    assert_eq!(value("app:status"), Some(Value::String("draft".to_string())));
    assert_eq!(value("app:rank"), Some(Value::Long(3)));
    assert_eq!(value("jcr:uuid"), Some(Value::String(identifier)));
    assert_eq!(value("jcr:createdBy"), Some(Value::String("author".to_string())));
    assert!(matches!(value("jcr:created"), Some(Value::Date(_))));
    assert_eq!(value("jcr:primaryType"), Some(Value::Name("app:article".to_string())));
    assert_eq!(snapshot.mixin_types(), vec!["mix:referenceable".to_string()]);
}

#[test]
fn standard_types_are_validated() {
    let mut store = open_store();

    let err = store
        .store_node(&node("/file").with_primary_type("nt:file"), false)
        .expect_err("file without content");
    assert_eq!(err.code(), "CONSTRAINT_VIOLATION");

    let file = node("/file").with_primary_type("nt:file").with_child(
        node("/file/jcr:content")
            .with_primary_type("nt:resource")
            .with_property(
                Property::single("jcr:data", Value::Binary(BinaryValue::Payload(b"hi".to_vec())))
                    .expect("data"),
            ),
    );
    store.store_node(&file, true).expect("store file");
    let content = store.get_node("/file/jcr:content").expect("content");
    assert!(content.property("jcr:lastModified").is_some());

    let err = store
        .store_node(&node("/tagged").with_mixin("mix:etag"), false)
        .expect_err("etag");
    assert_eq!(err.code(), "NOT_SUPPORTED");

    let err = store
        .store_node(&node("/abstract").with_primary_type("nt:hierarchyNode"), false)
        .expect_err("abstract primary");
    assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
    let err = store
        .store_node(&node("/mixin").with_primary_type("mix:created"), false)
        .expect_err("mixin primary");
    assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
    let err = store
        .store_node(&node("/bad").with_mixin("nt:folder"), false)
        .expect_err("primary as mixin");
    assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
    let err = store
        .store_node(&node("/unknown").with_primary_type("app:nothing"), false)
        .expect_err("unregistered type");
    assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
}

#[test]
fn namespace_registry_round_trip() {
    let mut store = open_store();
    let namespaces = store.namespaces().expect("namespaces");
    assert_eq!(namespaces.get("app").map(String::as_str), Some("urn:example:app"));
    assert_eq!(
        namespaces.get("jcr").map(String::as_str),
        Some("http://www.jcp.org/jcr/1.0")
    );

    store.store_node(&node("/app:home"), false).expect("prefixed name");
    let err = store
        .store_node(&node("/zz:home"), false)
        .expect_err("unregistered prefix");
    assert_eq!(err.code(), "FORMAT_VIOLATION");

    let err = store.register_namespace("jcr", "urn:other").expect_err("built-in");
    assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
    let err = store.register_namespace("9bad", "urn:bad").expect_err("bad prefix");
    assert_eq!(err.code(), "FORMAT_VIOLATION");

    store.register_namespace("site", "urn:example:app").expect("remap uri");
    let namespaces = store.namespaces().expect("namespaces");
    assert!(!namespaces.contains_key("app"));
    assert_eq!(namespaces.get("site").map(String::as_str), Some("urn:example:app"));

    store.unregister_namespace("site").expect("unregister");
    assert!(!store.namespaces().expect("namespaces").contains_key("site"));
    let err = store.unregister_namespace("site").expect_err("twice");
    assert_eq!(err.code(), "NOT_FOUND");
    let err = store.unregister_namespace("nt").expect_err("built-in");
    assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
}
