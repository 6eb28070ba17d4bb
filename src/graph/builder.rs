//! Resource graph construction
//!
//! Converts a parsed `Document` into a `ResourceGraph`: folds `Globals`
//! category defaults into matching resources, checks logical-name
//! uniqueness, and classifies every intrinsic reference as an edge
//! (target exists among resources) or an unresolved reference (target
//! exists nowhere).

use std::collections::HashSet;

use tracing::debug;

use crate::error::GraphError;
use crate::template::{Document, TemplateValue, ValueMap};

use super::types::{ReferenceEdge, Resource, ResourceGraph, UnresolvedReference};

/// Globals categories and the resource type each one defaults.
const GLOBAL_CATEGORIES: &[(&str, &str)] = &[
    ("Function", "AWS::Serverless::Function"),
    ("Api", "AWS::Serverless::Api"),
    ("HttpApi", "AWS::Serverless::HttpApi"),
    ("StateMachine", "AWS::Serverless::StateMachine"),
    ("SimpleTable", "AWS::Serverless::SimpleTable"),
];

/// Build the resource graph for a document.
///
/// Fails with `GraphError` when two resources share a logical name.
pub fn build(document: &Document) -> Result<ResourceGraph, GraphError> {
    let mut graph = ResourceGraph {
        parameter_names: document.parameters.keys().map(String::from).collect(),
        ..ResourceGraph::default()
    };

    let mut seen = HashSet::new();
    for decl in &document.resources {
        if !seen.insert(decl.name.clone()) {
            return Err(GraphError::DuplicateLogicalName {
                name: decl.name.clone(),
            });
        }

        let properties = apply_globals(&document.globals, &decl.type_tag, &decl.properties);
        let merge_definitions = properties
            .get("MergeDefinitions")
            .and_then(TemplateValue::as_bool)
            .unwrap_or(false);

        graph.resources.push(Resource {
            name: decl.name.clone(),
            type_tag: decl.type_tag.clone(),
            properties,
            metadata: decl.metadata.clone(),
            merge_definitions,
        });
    }

    classify_references(&mut graph);

    debug!(
        resources = graph.resources.len(),
        edges = graph.edges.len(),
        unresolved = graph.unresolved.len(),
        "built resource graph"
    );
    Ok(graph)
}

/// Fold Globals defaults for the matching category into a resource's
/// properties. The resource's own value always wins.
fn apply_globals(globals: &ValueMap, type_tag: &str, properties: &ValueMap) -> ValueMap {
    let category = GLOBAL_CATEGORIES
        .iter()
        .find(|(_, tag)| *tag == type_tag)
        .map(|(category, _)| *category);

    let defaults = category.and_then(|c| globals.get_map(c));
    let mut merged = properties.clone();
    if let Some(defaults) = defaults {
        for (key, value) in defaults.iter() {
            merged.insert_if_absent(key, value.clone());
        }
    }
    merged
}

fn classify_references(graph: &mut ResourceGraph) {
    let resource_names: HashSet<&str> =
        graph.resources.iter().map(|r| r.name.as_str()).collect();
    let parameter_names: HashSet<&str> =
        graph.parameter_names.iter().map(String::as_str).collect();

    let mut edges = Vec::new();
    let mut unresolved = Vec::new();

    for resource in &graph.resources {
        let root = format!("Resources.{}.Properties", resource.name);
        let visit = &mut |path: &str, intrinsic: &crate::template::IntrinsicReference| {
            for target in intrinsic.targets() {
                if resource_names.contains(target.as_str()) {
                    edges.push(ReferenceEdge {
                        from: resource.name.clone(),
                        to: target,
                        path: path.to_string(),
                        kind: intrinsic.kind().to_string(),
                    });
                } else if !parameter_names.contains(target.as_str()) {
                    unresolved.push(UnresolvedReference {
                        resource: resource.name.clone(),
                        path: path.to_string(),
                        kind: intrinsic.kind().to_string(),
                        target,
                    });
                }
                // Parameter references resolve but are not resource edges.
            }
        };
        for (key, value) in resource.properties.iter() {
            value.for_each_intrinsic(&format!("{}.{}", root, key), visit);
        }
    }

    graph.edges = edges;
    graph.unresolved = unresolved;
}
