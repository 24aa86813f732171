#![forbid(unsafe_code)]

use cr_core::{
    Column, CompileContext, Constraint, Join, JoinType, NodePath, Operator, OrderDirection,
    Ordering, Property, Query, QueryCompileError, QueryCompiler, QueryObjectModel, Selector,
    Source, StagedNode, Value,
};
use cr_storage::{
    Credentials, QueryColumnValue, QueryResultRow, RepositoryConfig, SelectorSqlCompiler,
    SqliteStore,
};

fn node(value: &str) -> StagedNode {
    StagedNode::new(NodePath::try_new(value).expect("valid path"))
}

fn title(value: &str) -> Property {
    Property::single("title", Value::String(value.to_string())).expect("title")
}

fn populated_store() -> SqliteStore {
    let mut store = SqliteStore::open(RepositoryConfig::in_memory()).expect("open store");
    store
        .login(Credentials::new("admin", "secret"), None)
        .expect("login");
    let content = node("/content")
        .with_child(
            node("/content/a")
                .with_primary_type("nt:folder")
                .with_property(title("Alpha"))
                .with_child(node("/content/a/inner").with_primary_type("nt:folder")),
        )
        .with_child(
            node("/content/b")
                .with_primary_type("nt:folder")
                .with_property(title("Beta")),
        );
    store.store_node(&content, true).expect("store content");
    store
        .store_node(
            &node("/loose")
                .with_mixin("mix:referenceable")
                .with_property(title("Alpha")),
            false,
        )
        .expect("store loose");
    store
}

fn paths(rows: &[QueryResultRow]) -> Vec<&str> {
    rows.iter().map(|row| row.path.as_str()).collect()
}

fn select(node_type: &str) -> QueryObjectModel {
    QueryObjectModel::select(Selector::new(node_type, "s"))
}

fn title_is(operator: Operator, literal: &str) -> Constraint {
    Constraint::Comparison {
        selector: "s".to_string(),
        property: "title".to_string(),
        operator,
        literal: literal.to_string(),
    }
}

fn under(path: &str) -> Constraint {
    Constraint::DescendantNode {
        selector: "s".to_string(),
        ancestor_path: path.to_string(),
    }
}

fn run(store: &mut SqliteStore, model: QueryObjectModel) -> Vec<QueryResultRow> {
    store
        .execute_query(&Query::structured(model))
        .expect("execute query")
}

#[test]
fn selector_matches_subtypes_with_default_columns() {
    let mut store = populated_store();
    let rows = run(&mut store, select("nt:hierarchyNode").with_constraint(under("/content")));
    assert_eq!(paths(&rows), vec!["/content/a", "/content/a/inner", "/content/b"]);

    let first = &rows[0];
    assert_eq!(first.score, 0.0);
    let labels: Vec<&str> = first.columns.iter().map(|(label, _)| label.as_str()).collect();
    assert_eq!(labels, vec!["s.jcr:createdBy", "s.jcr:created", "s.jcr:primaryType"]);
    assert_eq!(
        first.column("s.jcr:createdBy"),
        Some(&QueryColumnValue::Property(
            Property::single("jcr:createdBy", Value::String("admin".to_string())).expect("author")
        ))
    );
    assert_eq!(
        first.column("s.jcr:primaryType"),
        Some(&QueryColumnValue::Property(
            Property::single("jcr:primaryType", Value::Name("nt:folder".to_string()))
                .expect("type")
        ))
    );
}

#[test]
fn property_constraints_filter_rows() {
    let mut store = populated_store();

    let rows = run(
        &mut store,
        select("nt:base").with_constraint(title_is(Operator::EqualTo, "Alpha")),
    );
    assert_eq!(paths(&rows), vec!["/content/a", "/loose"]);

    let rows = run(
        &mut store,
        select("nt:base").with_constraint(title_is(Operator::Like, "B%")),
    );
    assert_eq!(paths(&rows), vec!["/content/b"]);

    let rows = run(
        &mut store,
        select("nt:base").with_constraint(
            Constraint::ChildNode {
                selector: "s".to_string(),
                parent_path: "/content".to_string(),
            }
            .and(title_is(Operator::EqualTo, "Alpha").negate()),
        ),
    );
    assert_eq!(paths(&rows), vec!["/content/b"]);

    let rows = run(
        &mut store,
        select("nt:unstructured").with_constraint(Constraint::PropertyExists {
            selector: "s".to_string(),
            property: "title".to_string(),
        }),
    );
    assert_eq!(paths(&rows), vec!["/loose"]);

    let rows = run(
        &mut store,
        select("nt:base").with_constraint(
            Constraint::SameNode {
                selector: "s".to_string(),
                path: "/content/b".to_string(),
            }
            .or(title_is(Operator::NotEqualTo, "Beta").and(under("/content"))),
        ),
    );
    assert_eq!(paths(&rows), vec!["/content/a", "/content/b"]);
}

#[test]
fn mixin_selector_matches_declared_mixins() {
    let mut store = populated_store();
    let rows = run(&mut store, select("mix:referenceable"));
    assert_eq!(paths(&rows), vec!["/loose"]);
}

#[test]
fn ordering_columns_and_paging() {
    let mut store = populated_store();
    let model = select("nt:folder")
        .with_ordering(Ordering {
            selector: "s".to_string(),
            property: "title".to_string(),
            direction: OrderDirection::Descending,
        })
        .with_column(Column::new(Some("s"), "title"));

    let rows = run(&mut store, model.clone());
    assert_eq!(paths(&rows), vec!["/content/b", "/content/a", "/content/a/inner"]);
    let labels: Vec<&str> = rows[2].columns.iter().map(|(label, _)| label.as_str()).collect();
    assert_eq!(labels, vec!["s.title", "s.jcr:primaryType"]);
    assert_eq!(rows[2].column("s.title"), Some(&QueryColumnValue::Missing));

    let rows = store
        .execute_query(&Query::structured(model.clone()).with_limit(1).with_offset(1))
        .expect("page");
    assert_eq!(paths(&rows), vec!["/content/a"]);
    let rows = store
        .execute_query(&Query::structured(model).with_offset(2))
        .expect("offset only");
    assert_eq!(paths(&rows), vec!["/content/a/inner"]);
}

#[test]
fn unsupported_and_invalid_queries() {
    let mut store = populated_store();

    let join = QueryObjectModel {
        source: Source::Join(Join {
            left: Box::new(Source::Selector(Selector::new("nt:folder", "a"))),
            right: Box::new(Source::Selector(Selector::new("nt:folder", "b"))),
            join_type: JoinType::Inner,
        }),
        constraint: None,
        orderings: Vec::new(),
        columns: Vec::new(),
    };
    let err = store.execute_query(&Query::structured(join)).expect_err("join");
    assert_eq!(err.code(), "NOT_SUPPORTED");

    let err = store
        .execute_query(&Query::structured(select("app:missing")))
        .expect_err("unknown type");
    assert_eq!(err.code(), "INVALID_QUERY");

    let err = store
        .execute_query(&Query::structured(select("nt:base").with_constraint(
            Constraint::PropertyExists {
                selector: "other".to_string(),
                property: "title".to_string(),
            },
        )))
        .expect_err("foreign selector");
    assert_eq!(err.code(), "INVALID_QUERY");

    let err = store
        .execute_query(&Query::statement("JCR-SQL2", "SELECT * FROM [nt:base]"))
        .expect_err("text query");
    assert_eq!(err.code(), "NOT_SUPPORTED");
}

/// Parses any statement into a query over all folders.
struct FolderCompiler;

impl QueryCompiler for FolderCompiler {
    fn parse(
        &self,
        _language: &str,
        _statement: &str,
        _context: &CompileContext<'_>,
    ) -> Result<QueryObjectModel, QueryCompileError> {
        Ok(select("nt:folder"))
    }

    fn compile(
        &self,
        model: &QueryObjectModel,
        context: &CompileContext<'_>,
    ) -> Result<String, QueryCompileError> {
        SelectorSqlCompiler.compile(model, context)
    }
}

#[test]
fn custom_compiler_parses_statements() {
    let mut store = populated_store().with_query_compiler(Box::new(FolderCompiler));
    let rows = store
        .execute_query(&Query::statement("folders", "all of them"))
        .expect("statement");
    assert_eq!(paths(&rows), vec!["/content/a", "/content/a/inner", "/content/b"]);
}
