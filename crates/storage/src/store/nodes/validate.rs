#![forbid(unsafe_code)]

use super::*;
use cr_core::namespaces::split_qualified_name;
use cr_core::node_types::{AutoCreateKind, JCR_MIXIN_TYPES, JCR_PRIMARY_TYPE, auto_create_kind};
use cr_core::{PropertyDefinition, PropertyType, StagedNode, Value};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

static PATH_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:/|/?(?:[^/\[\]*|\x00-\x1f]+(?:\[[1-9][0-9]*\])?)(?:/[^/\[\]*|\x00-\x1f]+(?:\[[1-9][0-9]*\])?)*)$",
    )
    .expect("path value pattern compiles")
});

static URI_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9\-._~:/?#\[\]@!$&'()*+,;=]|%[0-9A-Fa-f]{2})+$")
        .expect("uri value pattern compiles")
});

pub(super) struct ValidationContext<'a> {
    pub catalogue: &'a NodeTypeCatalogue,
    pub namespaces: &'a NamespaceMap,
    pub user_id: &'a str,
    pub identifier: &'a str,
    /// Children already persisted under the node.
    pub persisted_children: &'a [String],
}

/// Checks `node` against its effective types and returns the property set
/// to persist, with absent auto-created properties filled in.
pub(super) fn validate_node(
    node: &StagedNode,
    ctx: &ValidationContext<'_>,
) -> Result<BTreeMap<String, Property>, StoreError> {
    let path = node.path.as_str();
    let mut properties = node.properties.clone();

    if node.mixin_types.is_empty() {
        properties.remove(JCR_MIXIN_TYPES);
    } else {
        let mixins = node
            .mixin_types
            .iter()
            .map(|name| Value::Name(name.clone()))
            .collect();
        let property = Property::multiple(JCR_MIXIN_TYPES, PropertyType::Name, mixins)
            .map_err(|err| StoreError::FormatViolation(format!("{path}: {}", err.message())))?;
        properties.insert(JCR_MIXIN_TYPES.to_string(), property);
    }

    if let Some(declared) = properties.get(JCR_PRIMARY_TYPE) {
        if declared.value().as_str() != Some(node.primary_type.as_str()) {
            return Err(StoreError::ConstraintViolation(format!(
                "{JCR_PRIMARY_TYPE} of {path} does not match primary type {}",
                node.primary_type
            )));
        }
    }

    let effective = effective_types(node, ctx.catalogue)?;
    let present_children: BTreeSet<&str> = node
        .child_names()
        .chain(ctx.persisted_children.iter().map(String::as_str))
        .collect();

    for definition in &effective {
        for child in &definition.children {
            if child.is_residual() || present_children.contains(child.name.as_str()) {
                continue;
            }
            if child.auto_created {
                return Err(StoreError::NotSupported(format!(
                    "auto-created child node {} of {} at {path}",
                    child.name, definition.name
                )));
            }
            if child.mandatory {
                return Err(StoreError::ConstraintViolation(format!(
                    "child {} is mandatory for {} at {path}",
                    child.name, definition.name
                )));
            }
        }

        for property in &definition.properties {
            if property.is_residual() || properties.contains_key(&property.name) {
                continue;
            }
            if property.auto_created {
                let value = synthesize(node, property, &definition.name, ctx)?;
                properties.insert(property.name.clone(), value);
            } else if property.mandatory {
                return Err(StoreError::ConstraintViolation(format!(
                    "property {} is mandatory for {} at {path}",
                    property.name, definition.name
                )));
            }
        }
    }

    for property in properties.values() {
        check_values(path, property, ctx.namespaces)?;
    }
    Ok(properties)
}

fn effective_types<'a>(
    node: &StagedNode,
    catalogue: &'a NodeTypeCatalogue,
) -> Result<Vec<&'a NodeTypeDefinition>, StoreError> {
    let path = node.path.as_str();
    let primary = catalogue.get(&node.primary_type).ok_or_else(|| {
        StoreError::ConstraintViolation(format!(
            "primary type {} of {path} is not registered",
            node.primary_type
        ))
    })?;
    if primary.is_mixin || primary.is_abstract {
        return Err(StoreError::ConstraintViolation(format!(
            "{} cannot be the primary type of {path}",
            node.primary_type
        )));
    }
    for mixin in &node.mixin_types {
        match catalogue.get(mixin) {
            Some(definition) if definition.is_mixin => {}
            Some(_) => {
                return Err(StoreError::ConstraintViolation(format!(
                    "{mixin} assigned to {path} is not a mixin type"
                )));
            }
            None => {
                return Err(StoreError::ConstraintViolation(format!(
                    "mixin type {mixin} of {path} is not registered"
                )));
            }
        }
    }

    catalogue
        .effective_types(&node.primary_type, &node.mixin_types)
        .map_err(|err| StoreError::ConstraintViolation(format!("{path}: {}", err.message())))
}

fn synthesize(
    node: &StagedNode,
    definition: &PropertyDefinition,
    owner: &str,
    ctx: &ValidationContext<'_>,
) -> Result<Property, StoreError> {
    let path = node.path.as_str();
    let texts = match auto_create_kind(&definition.name) {
        AutoCreateKind::Identifier => vec![ctx.identifier.to_string()],
        AutoCreateKind::Principal => vec![ctx.user_id.to_string()],
        AutoCreateKind::PrimaryType => vec![node.primary_type.clone()],
        AutoCreateKind::Timestamp => {
            let now = OffsetDateTime::now_utc();
            if definition.required_type == PropertyType::Date {
                return single_or_multiple(definition, vec![Value::Date(now)], path);
            }
            vec![now.format(&Rfc3339).map_err(|err| {
                StoreError::FormatViolation(format!("{path}: current time: {err}"))
            })?]
        }
        AutoCreateKind::Unsupported => {
            return Err(StoreError::NotSupported(format!(
                "auto-creating {} of {owner} at {path}",
                definition.name
            )));
        }
        AutoCreateKind::Default if definition.default_values.is_empty() => {
            return Err(StoreError::NotSupported(format!(
                "auto-created property {} of {owner} at {path} has no default value",
                definition.name
            )));
        }
        AutoCreateKind::Default if definition.multiple => definition.default_values.clone(),
        AutoCreateKind::Default => definition.default_values[..1].to_vec(),
    };

    let values = texts
        .iter()
        .map(|text| Value::parse(definition.required_type, text))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            StoreError::FormatViolation(format!(
                "default of {} at {path}: {}",
                definition.name,
                err.message()
            ))
        })?;
    single_or_multiple(definition, values, path)
}

fn single_or_multiple(
    definition: &PropertyDefinition,
    values: Vec<Value>,
    path: &str,
) -> Result<Property, StoreError> {
    Property::try_new(
        definition.name.as_str(),
        definition.required_type,
        definition.multiple,
        values,
    )
    .map_err(|err| StoreError::FormatViolation(format!("{path}: {}", err.message())))
}

fn check_values(
    path: &str,
    property: &Property,
    namespaces: &NamespaceMap,
) -> Result<(), StoreError> {
    for value in property.values() {
        match value {
            Value::Name(name) => {
                let (prefix, local) = split_qualified_name(name);
                if local.is_empty() || !namespaces.contains_key(prefix) {
                    return Err(StoreError::FormatViolation(format!(
                        "name value {name:?} of {path}/{} uses an unregistered prefix",
                        property.name()
                    )));
                }
            }
            Value::Path(value) if !PATH_VALUE.is_match(value) => {
                return Err(StoreError::FormatViolation(format!(
                    "path value {value:?} of {path}/{} is malformed",
                    property.name()
                )));
            }
            Value::Uri(value) if !URI_VALUE.is_match(value) => {
                return Err(StoreError::FormatViolation(format!(
                    "uri value {value:?} of {path}/{} is malformed",
                    property.name()
                )));
            }
            _ => {}
        }
    }
    Ok(())
}
