//! Typed property values for parsed templates
//!
//! Property values keep intrinsic-function markers as a distinct variant
//! instead of flattening them to strings, and mappings preserve key order
//! so diagnostics read in author order. Structural equality deliberately
//! ignores mapping key order (list order stays significant).

use serde_yaml::Value as YamlValue;

use super::intrinsic::IntrinsicReference;

/// A property value in a parsed template
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    List(Vec<TemplateValue>),
    Map(ValueMap),
    Intrinsic(Box<IntrinsicReference>),
}

impl TemplateValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TemplateValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TemplateValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            TemplateValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TemplateValue]> {
        match self {
            TemplateValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_intrinsic(&self) -> Option<&IntrinsicReference> {
        match self {
            TemplateValue::Intrinsic(i) => Some(i),
            _ => None,
        }
    }

    /// Total node count of this subtree, for the pipeline node budget.
    pub fn node_count(&self) -> usize {
        match self {
            TemplateValue::List(items) => 1 + items.iter().map(TemplateValue::node_count).sum::<usize>(),
            TemplateValue::Map(map) => {
                1 + map.iter().map(|(_, v)| v.node_count()).sum::<usize>()
            }
            _ => 1,
        }
    }

    /// Convert back to a serde_yaml value for re-serialization.
    ///
    /// Intrinsics serialize in their canonical long form (`Fn::GetAtt` etc.)
    /// so the output round-trips through any YAML/JSON parser.
    pub fn to_yaml(&self) -> YamlValue {
        match self {
            TemplateValue::Null => YamlValue::Null,
            TemplateValue::Bool(b) => YamlValue::Bool(*b),
            TemplateValue::Integer(i) => YamlValue::Number((*i).into()),
            TemplateValue::Number(n) => {
                YamlValue::Number(serde_yaml::Number::from(*n))
            }
            TemplateValue::String(s) => YamlValue::String(s.clone()),
            TemplateValue::List(items) => {
                YamlValue::Sequence(items.iter().map(TemplateValue::to_yaml).collect())
            }
            TemplateValue::Map(map) => YamlValue::Mapping(
                map.iter()
                    .map(|(k, v)| (YamlValue::String(k.to_string()), v.to_yaml()))
                    .collect(),
            ),
            TemplateValue::Intrinsic(i) => i.to_yaml(),
        }
    }

    /// Visit every intrinsic node in this subtree with its key path.
    ///
    /// A Sub's local substitution values may themselves be intrinsics, so
    /// the walk descends into them too.
    pub fn for_each_intrinsic(&self, path: &str, visit: &mut dyn FnMut(&str, &IntrinsicReference)) {
        match self {
            TemplateValue::Intrinsic(i) => {
                visit(path, i);
                if let IntrinsicReference::Sub { substitutions, .. } = i.as_ref() {
                    for (key, value) in substitutions.iter() {
                        value.for_each_intrinsic(&format!("{}.{}", path, key), visit);
                    }
                }
            }
            TemplateValue::List(items) => {
                for (idx, item) in items.iter().enumerate() {
                    item.for_each_intrinsic(&format!("{}[{}]", path, idx), visit);
                }
            }
            TemplateValue::Map(map) => {
                for (key, value) in map.iter() {
                    value.for_each_intrinsic(&format!("{}.{}", path, key), visit);
                }
            }
            _ => {}
        }
    }

    /// Render as a compact single-document YAML string for diffs.
    pub fn render(&self) -> String {
        serde_yaml::to_string(&self.to_yaml())
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| "<unrenderable>".to_string())
    }
}

/// Insertion-order-preserving string-keyed mapping.
///
/// Equality ignores key order: two maps are equal when they hold the same
/// key set with structurally equal values.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: Vec<(String, TemplateValue)>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&TemplateValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a key, replacing any existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: TemplateValue) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Insert only if the key is absent (used when folding in Globals defaults).
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: TemplateValue) {
        let key = key.into();
        if !self.contains_key(&key) {
            self.entries.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<TemplateValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TemplateValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nested lookup: `get_str("Auth")` style convenience for string leaves.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(TemplateValue::as_str)
    }

    pub fn get_map(&self, key: &str) -> Option<&ValueMap> {
        self.get(key).and_then(TemplateValue::as_map)
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| ov == v))
    }
}

impl FromIterator<(String, TemplateValue)> for ValueMap {
    fn from_iter<T: IntoIterator<Item = (String, TemplateValue)>>(iter: T) -> Self {
        let mut map = ValueMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
