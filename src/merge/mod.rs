//! Definition-fragment merging
//!
//! An API's method definitions can be contributed from more than one
//! source: the resource's own external definition document
//! (`DefinitionBody.paths`) and inline `Api`-type events declared on
//! function resources that point at it. Fragments are indexed by their
//! natural key (HTTP path + method) and combined under the resource's
//! declared merge policy:
//!
//! - `MergeDefinitions: true` — structurally equal duplicates collapse to
//!   one; any field-level divergence is a `ConflictRecord` and that key is
//!   not merged.
//! - merge disabled — any duplicate key is a conflict outright, with no
//!   reconciliation attempt.
//!
//! The resolver never fails fast: it returns the full conflict set so a
//! caller can report every problem in one pass.

use tracing::debug;

use crate::graph::{Resource, ResourceGraph};
use crate::report::{ConflictRecord, FieldDiff};
use crate::template::{IntrinsicReference, TemplateValue, ValueMap};

/// Natural key aligning fragments from multiple sources
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeKey {
    /// HTTP path (e.g. "/test")
    pub path: String,
    /// HTTP method, lowercased
    pub method: String,
}

impl MergeKey {
    pub fn new(path: impl Into<String>, method: &str) -> Self {
        Self {
            path: path.into(),
            method: method.to_ascii_lowercase(),
        }
    }
}

impl std::fmt::Display for MergeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Where a fragment was contributed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSource {
    /// Logical name of the contributing resource
    pub resource: String,
    /// Key path within that resource (e.g. "Events.GetHtml")
    pub detail: String,
}

impl std::fmt::Display for FragmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.resource, self.detail)
    }
}

/// A partial method definition contributed by one source
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionFragment {
    pub source: FragmentSource,
    pub key: MergeKey,
    pub content: ValueMap,
}

/// Merged method definitions for one API resource
#[derive(Debug, Clone, Default)]
pub struct ApiDefinition {
    pub api: String,
    /// One fragment per merge key that merged cleanly
    pub methods: Vec<DefinitionFragment>,
}

/// Result of the merge stage
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub definitions: Vec<ApiDefinition>,
    pub conflicts: Vec<ConflictRecord>,
}

/// Resolve definition fragments across the whole graph.
pub fn resolve(graph: &ResourceGraph) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for api in &graph.resources {
        let mut fragments = external_fragments(api);
        fragments.extend(inline_fragments(graph, &api.name));
        if fragments.is_empty() {
            continue;
        }

        let (definition, conflicts) = merge_resource(api, fragments);
        outcome.definitions.push(definition);
        outcome.conflicts.extend(conflicts);
    }

    debug!(
        apis = outcome.definitions.len(),
        conflicts = outcome.conflicts.len(),
        "resolved definition fragments"
    );
    outcome
}

/// Fragments from the resource's own external definition document.
fn external_fragments(api: &Resource) -> Vec<DefinitionFragment> {
    let mut fragments = Vec::new();
    let paths = api
        .properties
        .get_map("DefinitionBody")
        .and_then(|body| body.get_map("paths"));
    let Some(paths) = paths else {
        return fragments;
    };

    for (path, methods) in paths.iter() {
        let Some(methods) = methods.as_map() else {
            continue;
        };
        for (method, spec) in methods.iter() {
            let content = match spec {
                TemplateValue::Map(m) => m.clone(),
                // A non-mapping method spec has no fields to merge.
                _ => ValueMap::new(),
            };
            fragments.push(DefinitionFragment {
                source: FragmentSource {
                    resource: api.name.clone(),
                    detail: format!("DefinitionBody.paths.{}.{}", path, method),
                },
                key: MergeKey::new(path, method),
                content,
            });
        }
    }
    fragments
}

/// Fragments synthesized from inline `Api` events on other resources that
/// reference this API. An event with no `RestApiId` attaches to an
/// implicit API and does not participate here.
fn inline_fragments(graph: &ResourceGraph, api_name: &str) -> Vec<DefinitionFragment> {
    let mut fragments = Vec::new();

    for resource in &graph.resources {
        let Some(events) = resource.properties.get_map("Events") else {
            continue;
        };
        for (event_name, event) in events.iter() {
            let Some(event) = event.as_map() else {
                continue;
            };
            if event.get_str("Type") != Some("Api") {
                continue;
            }
            let Some(props) = event.get_map("Properties") else {
                continue;
            };
            if referenced_api(props.get("RestApiId")).as_deref() != Some(api_name) {
                continue;
            }
            let (Some(path), Some(method)) = (props.get_str("Path"), props.get_str("Method"))
            else {
                continue;
            };

            fragments.push(DefinitionFragment {
                source: FragmentSource {
                    resource: resource.name.clone(),
                    detail: format!("Events.{}", event_name),
                },
                key: MergeKey::new(path, method),
                content: synthesize_method_spec(props),
            });
        }
    }
    fragments
}

fn referenced_api(rest_api_id: Option<&TemplateValue>) -> Option<String> {
    match rest_api_id? {
        TemplateValue::String(s) => Some(s.clone()),
        TemplateValue::Intrinsic(i) => match i.as_ref() {
            IntrinsicReference::Ref { target } => Some(target.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Build the method-spec contribution an inline event makes, in the same
/// shape an external definition document uses, so the two compare
/// field-for-field.
fn synthesize_method_spec(event_props: &ValueMap) -> ValueMap {
    let mut content = ValueMap::new();
    if let Some(authorizer) = event_props
        .get_map("Auth")
        .and_then(|auth| auth.get_str("Authorizer"))
    {
        let requirement: ValueMap = std::iter::once((
            authorizer.to_string(),
            TemplateValue::List(Vec::new()),
        ))
        .collect();
        content.insert(
            "security",
            TemplateValue::List(vec![TemplateValue::Map(requirement)]),
        );
    }
    content
}

/// Merge one resource's fragments under its declared policy.
fn merge_resource(
    api: &Resource,
    fragments: Vec<DefinitionFragment>,
) -> (ApiDefinition, Vec<ConflictRecord>) {
    let mut definition = ApiDefinition {
        api: api.name.clone(),
        methods: Vec::new(),
    };
    let mut conflicts = Vec::new();

    // Group by key, preserving first-seen order for stable reports.
    let mut groups: Vec<(MergeKey, Vec<DefinitionFragment>)> = Vec::new();
    for fragment in fragments {
        match groups.iter_mut().find(|(k, _)| *k == fragment.key) {
            Some((_, group)) => group.push(fragment),
            None => groups.push((fragment.key.clone(), vec![fragment])),
        }
    }

    for (key, group) in groups {
        if group.len() == 1 {
            definition.methods.push(group.into_iter().next().expect("one fragment"));
            continue;
        }

        if !api.merge_definitions {
            let first = &group[0];
            let second = &group[1];
            conflicts.push(ConflictRecord {
                code: "MERGE031".to_string(),
                path: key.path.clone(),
                method: key.method.clone(),
                first_source: first.source.to_string(),
                second_source: second.source.to_string(),
                diff: Vec::new(),
                message: format!(
                    "duplicate definition for '{}' on '{}' and merging is not enabled",
                    key, api.name
                ),
            });
            continue;
        }

        match first_divergent_pair(&group) {
            None => {
                // All fragments structurally equal: keep one.
                definition
                    .methods
                    .push(group.into_iter().next().expect("non-empty group"));
            }
            Some((first, second)) => {
                let mut diff = Vec::new();
                diff_maps("", &first.content, &second.content, &mut diff);
                conflicts.push(ConflictRecord {
                    code: "MERGE030".to_string(),
                    path: key.path.clone(),
                    method: key.method.clone(),
                    first_source: first.source.to_string(),
                    second_source: second.source.to_string(),
                    diff,
                    message: format!(
                        "conflicting definitions for '{}' on '{}'",
                        key, api.name
                    ),
                });
            }
        }
    }

    (definition, conflicts)
}

fn first_divergent_pair(
    group: &[DefinitionFragment],
) -> Option<(&DefinitionFragment, &DefinitionFragment)> {
    let first = group.first()?;
    group
        .iter()
        .skip(1)
        .find(|f| f.content != first.content)
        .map(|divergent| (first, divergent))
}

/// Field-level diff over the union of keys. Missing keys count as
/// differences; nested mappings recurse so diffs point at the exact field.
fn diff_maps(prefix: &str, left: &ValueMap, right: &ValueMap, out: &mut Vec<FieldDiff>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", prefix, key)
        }
    };

    for (key, lv) in left.iter() {
        match right.get(key) {
            Some(rv) => diff_values(&join(key), lv, rv, out),
            None => out.push(FieldDiff {
                path: join(key),
                left: Some(lv.render()),
                right: None,
            }),
        }
    }
    for (key, rv) in right.iter() {
        if left.get(key).is_none() {
            out.push(FieldDiff {
                path: join(key),
                left: None,
                right: Some(rv.render()),
            });
        }
    }
}

fn diff_values(path: &str, left: &TemplateValue, right: &TemplateValue, out: &mut Vec<FieldDiff>) {
    if left == right {
        return;
    }
    match (left, right) {
        (TemplateValue::Map(lm), TemplateValue::Map(rm)) => diff_maps(path, lm, rm, out),
        _ => out.push(FieldDiff {
            path: path.to_string(),
            left: Some(left.render()),
            right: Some(right.render()),
        }),
    }
}
