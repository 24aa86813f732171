#![forbid(unsafe_code)]

//! Single-selector SQL generation over the `nodes` table.
//!
//! Property constraints look inside the JSON property document with
//! `json_each`. Literals are inlined as quoted SQL strings; the workspace is
//! the only bound parameter.

use cr_core::node_types::JCR_MIXIN_TYPES;
use cr_core::{
    CompileContext, Constraint, NodePath, Operator, OrderDirection, QueryCompileError,
    QueryCompiler, QueryObjectModel, Selector,
};

/// Built-in compiler for single-selector queries.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectorSqlCompiler;

impl QueryCompiler for SelectorSqlCompiler {
    fn parse(
        &self,
        language: &str,
        _statement: &str,
        _context: &CompileContext<'_>,
    ) -> Result<QueryObjectModel, QueryCompileError> {
        Err(QueryCompileError::Unsupported(format!(
            "query language {language:?}"
        )))
    }

    fn compile(
        &self,
        model: &QueryObjectModel,
        context: &CompileContext<'_>,
    ) -> Result<String, QueryCompileError> {
        let selector = model
            .source
            .as_selector()
            .ok_or_else(|| QueryCompileError::Unsupported("joins".to_string()))?;

        let types = context.catalogue.subtypes_of(&selector.node_type);
        if types.is_empty() {
            return Err(QueryCompileError::Invalid(format!(
                "unknown node type {}",
                selector.node_type
            )));
        }
        let type_list = types
            .iter()
            .map(|name| quote(name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "SELECT n.path, n.type, n.props FROM nodes n \
             WHERE n.workspace_name = ?1 AND (n.type IN ({type_list})"
        );
        let is_mixin = context
            .catalogue
            .get(&selector.node_type)
            .is_some_and(|definition| definition.is_mixin);
        if is_mixin {
            sql.push_str(" OR ");
            sql.push_str(&values_exist(JCR_MIXIN_TYPES, &format!("v.value IN ({type_list})")));
        }
        sql.push(')');

        if let Some(constraint) = &model.constraint {
            sql.push_str(" AND ");
            sql.push_str(&constraint_sql(selector, constraint)?);
        }

        sql.push_str(" ORDER BY ");
        for ordering in &model.orderings {
            check_selector(selector, &ordering.selector)?;
            let direction = match ordering.direction {
                OrderDirection::Ascending => "ASC",
                OrderDirection::Descending => "DESC",
            };
            sql.push_str(&format!(
                "(SELECT v.value FROM {} LIMIT 1) {direction}, ",
                property_values(&ordering.property)
            ));
        }
        sql.push_str("n.path ASC");
        Ok(sql)
    }
}

fn constraint_sql(
    selector: &Selector,
    constraint: &Constraint,
) -> Result<String, QueryCompileError> {
    Ok(match constraint {
        Constraint::And(left, right) => format!(
            "({} AND {})",
            constraint_sql(selector, left)?,
            constraint_sql(selector, right)?
        ),
        Constraint::Or(left, right) => format!(
            "({} OR {})",
            constraint_sql(selector, left)?,
            constraint_sql(selector, right)?
        ),
        Constraint::Not(inner) => format!("(NOT {})", constraint_sql(selector, inner)?),
        Constraint::SameNode { selector: name, path } => {
            check_selector(selector, name)?;
            format!("n.path = {}", quote(parse_path(path)?.as_str()))
        }
        Constraint::ChildNode {
            selector: name,
            parent_path,
        } => {
            check_selector(selector, name)?;
            format!("n.parent = {}", quote(parse_path(parent_path)?.as_str()))
        }
        Constraint::DescendantNode {
            selector: name,
            ancestor_path,
        } => {
            check_selector(selector, name)?;
            let ancestor = parse_path(ancestor_path)?;
            let prefix = ancestor.descendant_prefix();
            format!(
                "(n.path <> {} AND substr(n.path, 1, {}) = {})",
                quote(ancestor.as_str()),
                prefix.chars().count(),
                quote(&prefix)
            )
        }
        Constraint::PropertyExists {
            selector: name,
            property,
        } => {
            check_selector(selector, name)?;
            format!(
                "EXISTS (SELECT 1 FROM json_each(n.props, '$.properties') p \
                 WHERE json_extract(p.value, '$.name') = {})",
                quote(property)
            )
        }
        Constraint::Comparison {
            selector: name,
            property,
            operator,
            literal,
        } => {
            check_selector(selector, name)?;
            let operator = match operator {
                Operator::EqualTo => "=",
                Operator::NotEqualTo => "<>",
                Operator::Like => "LIKE",
            };
            values_exist(
                property,
                &format!("CAST(v.value AS TEXT) {operator} {}", quote(literal)),
            )
        }
    })
}

/// `json_each` rows holding the values of `property` as `v`.
fn property_values(property: &str) -> String {
    format!(
        "json_each(n.props, '$.properties') p, json_each(p.value, '$.values') v \
         WHERE json_extract(p.value, '$.name') = {}",
        quote(property)
    )
}

fn values_exist(property: &str, predicate: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM {} AND {predicate})",
        property_values(property)
    )
}

fn check_selector(selector: &Selector, name: &str) -> Result<(), QueryCompileError> {
    if selector.name != name {
        return Err(QueryCompileError::Invalid(format!(
            "unknown selector {name:?}, expected {:?}",
            selector.name
        )));
    }
    Ok(())
}

fn parse_path(value: &str) -> Result<NodePath, QueryCompileError> {
    NodePath::try_new(value)
        .map_err(|err| QueryCompileError::Invalid(format!("path {value:?}: {}", err.message())))
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cr_core::namespaces::builtin_namespaces;
    use cr_core::{Column, NodeTypeCatalogue, Ordering};

    fn compile(model: &QueryObjectModel) -> Result<String, QueryCompileError> {
        let namespaces = builtin_namespaces();
        let catalogue = NodeTypeCatalogue::standard();
        SelectorSqlCompiler.compile(
            model,
            &CompileContext {
                namespaces: &namespaces,
                catalogue: &catalogue,
            },
        )
    }

    #[test]
    fn node_type_expands_to_subtypes() {
        let sql = compile(&QueryObjectModel::select(Selector::new("nt:hierarchyNode", "s")))
            .expect("compile");
        assert!(sql.contains("'nt:folder'"), "{sql}");
        assert!(sql.contains("'nt:file'"), "{sql}");
        assert!(!sql.contains("'nt:unstructured'"), "{sql}");
        assert!(sql.ends_with("ORDER BY n.path ASC"), "{sql}");
    }

    #[test]
    fn literals_are_quoted() {
        let model = QueryObjectModel::select(Selector::new("nt:unstructured", "s"))
            .with_constraint(Constraint::Comparison {
                selector: "s".to_string(),
                property: "title".to_string(),
                operator: Operator::EqualTo,
                literal: "it's".to_string(),
            })
            .with_column(Column::new(Some("s"), "title"));
        let sql = compile(&model).expect("compile");
        assert!(sql.contains("'it''s'"), "{sql}");
    }

    #[test]
    fn descendant_constraint_excludes_the_ancestor() {
        let model = QueryObjectModel::select(Selector::new("nt:base", "s")).with_constraint(
            Constraint::DescendantNode {
                selector: "s".to_string(),
                ancestor_path: "/a".to_string(),
            },
        );
        let sql = compile(&model).expect("compile");
        assert!(sql.contains("n.path <> '/a' AND substr(n.path, 1, 3) = '/a/'"), "{sql}");
    }

    #[test]
    fn foreign_selector_is_invalid() {
        let model = QueryObjectModel::select(Selector::new("nt:base", "s")).with_ordering(
            Ordering {
                selector: "other".to_string(),
                property: "title".to_string(),
                direction: OrderDirection::Ascending,
            },
        );
        assert!(matches!(compile(&model), Err(QueryCompileError::Invalid(_))));
    }

    #[test]
    fn unknown_type_is_invalid() {
        let model = QueryObjectModel::select(Selector::new("my:missing", "s"));
        assert!(matches!(compile(&model), Err(QueryCompileError::Invalid(_))));
    }
}
