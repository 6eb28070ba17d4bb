//! Resource graph types

use crate::template::ValueMap;

/// A resource with its declared type and typed properties.
///
/// Properties already include any `Globals` category defaults (the
/// resource's own values win).
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub type_tag: String,
    pub properties: ValueMap,
    pub metadata: ValueMap,
    /// Value of the `MergeDefinitions` boolean property (false when absent)
    pub merge_definitions: bool,
}

/// A resolved reference from one resource to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEdge {
    pub from: String,
    pub to: String,
    /// Property path of the referencing intrinsic
    pub path: String,
    /// Intrinsic operator kind ("Ref", "Fn::GetAtt", "Fn::Sub")
    pub kind: String,
}

/// An intrinsic whose target exists in neither Parameters nor Resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub resource: String,
    /// Property path of the referencing intrinsic
    pub path: String,
    /// Intrinsic operator kind
    pub kind: String,
    pub target: String,
}

/// The built graph: named resources plus reference edges between them.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    pub resources: Vec<Resource>,
    /// Declared parameter names, used for reference resolution
    pub parameter_names: Vec<String>,
    pub edges: Vec<ReferenceEdge>,
    /// Computed by the builder; the validator promotes each entry to
    /// exactly one diagnostic, so the report never double-counts.
    pub unresolved: Vec<UnresolvedReference>,
}

impl ResourceGraph {
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn has_resource(&self, name: &str) -> bool {
        self.resource(name).is_some()
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameter_names.iter().any(|p| p == name)
    }

    /// Edges originating at the named resource
    pub fn edges_from<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ReferenceEdge> {
        self.edges.iter().filter(move |e| e.from == name)
    }
}
