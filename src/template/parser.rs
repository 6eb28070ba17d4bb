//! Template document parser
//!
//! Pure transformation from raw text (plus a format hint) into a
//! `Document`. Syntax failures are fatal with line/column; top-level
//! schema violations are fatal; per-resource schema problems are
//! collected as diagnostics and the offending resource is dropped so the
//! rest of the document still flows through the pipeline.

use serde_yaml::Value as YamlValue;
use tracing::debug;

use crate::error::{ParseError, SchemaError, TemplateError, TemplateResult};
use crate::report::Diagnostic;

use super::intrinsic::IntrinsicReference;
use super::value::{TemplateValue, ValueMap};

/// Format hint for the raw document text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Yaml,
    Json,
}

/// Top-level sections the schema accepts. Anything else is a SchemaError.
const KNOWN_TOP_LEVEL_KEYS: &[&str] = &[
    "AWSTemplateFormatVersion",
    "Description",
    "Transform",
    "Globals",
    "Parameters",
    "Resources",
    "Outputs",
    "Metadata",
    "Conditions",
];

/// Sections carried through untouched (not interpreted by the pipeline)
const PASSTHROUGH_KEYS: &[&str] = &[
    "AWSTemplateFormatVersion",
    "Description",
    "Outputs",
    "Metadata",
    "Conditions",
];

/// One resource declaration that survived schema checks
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDecl {
    pub name: String,
    pub type_tag: String,
    pub properties: ValueMap,
    pub metadata: ValueMap,
}

/// Root parse result. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// Transform declarations, normalized to a list
    pub transforms: Vec<String>,
    /// Category → default property map
    pub globals: ValueMap,
    /// Parameter name → declaration, in declaration order
    pub parameters: ValueMap,
    /// Resource declarations, in declaration order
    pub resources: Vec<ResourceDecl>,
    /// Uninterpreted sections, carried for re-serialization
    pub passthrough: ValueMap,
    /// Per-resource schema findings collected during parsing
    pub schema_diagnostics: Vec<Diagnostic>,
}

impl Document {
    pub fn resource(&self, name: &str) -> Option<&ResourceDecl> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Total node count across all interpreted sections, for the node budget.
    pub fn node_count(&self) -> usize {
        let section = |m: &ValueMap| m.iter().map(|(_, v)| v.node_count()).sum::<usize>();
        section(&self.globals)
            + section(&self.parameters)
            + section(&self.passthrough)
            + self
                .resources
                .iter()
                .map(|r| section(&r.properties) + section(&r.metadata) + 1)
                .sum::<usize>()
    }

    /// Re-serialize to YAML. Sections emit in canonical order; mapping keys
    /// keep their parse order. Intrinsics come out in long form, so the
    /// output re-parses to a structurally equal document.
    pub fn to_yaml_string(&self) -> TemplateResult<String> {
        let mut root = serde_yaml::Mapping::new();
        if !self.transforms.is_empty() {
            let value = if self.transforms.len() == 1 {
                YamlValue::String(self.transforms[0].clone())
            } else {
                YamlValue::Sequence(
                    self.transforms
                        .iter()
                        .map(|t| YamlValue::String(t.clone()))
                        .collect(),
                )
            };
            root.insert(YamlValue::String("Transform".to_string()), value);
        }
        for (key, value) in self.passthrough.iter() {
            root.insert(YamlValue::String(key.to_string()), value.to_yaml());
        }
        if !self.globals.is_empty() {
            root.insert(
                YamlValue::String("Globals".to_string()),
                map_to_yaml(&self.globals),
            );
        }
        if !self.parameters.is_empty() {
            root.insert(
                YamlValue::String("Parameters".to_string()),
                map_to_yaml(&self.parameters),
            );
        }
        let mut resources = serde_yaml::Mapping::new();
        for r in &self.resources {
            let mut decl = serde_yaml::Mapping::new();
            decl.insert(
                YamlValue::String("Type".to_string()),
                YamlValue::String(r.type_tag.clone()),
            );
            if !r.properties.is_empty() {
                decl.insert(
                    YamlValue::String("Properties".to_string()),
                    map_to_yaml(&r.properties),
                );
            }
            if !r.metadata.is_empty() {
                decl.insert(
                    YamlValue::String("Metadata".to_string()),
                    map_to_yaml(&r.metadata),
                );
            }
            resources.insert(YamlValue::String(r.name.clone()), YamlValue::Mapping(decl));
        }
        root.insert(
            YamlValue::String("Resources".to_string()),
            YamlValue::Mapping(resources),
        );
        Ok(serde_yaml::to_string(&YamlValue::Mapping(root))?)
    }
}

fn map_to_yaml(map: &ValueMap) -> YamlValue {
    YamlValue::Mapping(
        map.iter()
            .map(|(k, v)| (YamlValue::String(k.to_string()), v.to_yaml()))
            .collect(),
    )
}

/// Parse raw document text into a `Document`.
pub fn parse_document(text: &str, format: DocumentFormat) -> TemplateResult<Document> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty.into());
    }

    let raw: YamlValue = match format {
        DocumentFormat::Yaml => {
            serde_yaml::from_str(text).map_err(|e| ParseError::from_yaml(&e))?
        }
        DocumentFormat::Json => {
            let json: serde_json::Value =
                serde_json::from_str(text).map_err(|e| ParseError::from_json(&e))?;
            json_to_yaml(&json)
        }
    };

    let top = match raw {
        YamlValue::Mapping(m) => m,
        _ => return Err(SchemaError::NotAMapping.into()),
    };

    let mut doc = Document::default();
    let mut saw_resources = false;

    for (key, value) in &top {
        let key = key
            .as_str()
            .ok_or_else(|| SchemaError::UnknownTopLevelKey {
                key: "<non-string key>".to_string(),
            })?
            .to_string();
        if !KNOWN_TOP_LEVEL_KEYS.contains(&key.as_str()) {
            return Err(SchemaError::UnknownTopLevelKey { key }.into());
        }
        match key.as_str() {
            "Transform" => parse_transform(value, &mut doc),
            "Globals" => {
                doc.globals = expect_section_map(&key, value)?;
            }
            "Parameters" => {
                doc.parameters = expect_section_map(&key, value)?;
            }
            "Resources" => {
                saw_resources = true;
                parse_resources(value, &mut doc)?;
            }
            _ if PASSTHROUGH_KEYS.contains(&key.as_str()) => {
                doc.passthrough.insert(key, convert(value));
            }
            _ => unreachable!("key set checked above"),
        }
    }

    if !saw_resources {
        return Err(SchemaError::MissingResources.into());
    }

    debug!(
        resources = doc.resources.len(),
        parameters = doc.parameters.len(),
        schema_findings = doc.schema_diagnostics.len(),
        "parsed template document"
    );
    Ok(doc)
}

fn parse_transform(value: &YamlValue, doc: &mut Document) {
    match value {
        YamlValue::String(s) => doc.transforms.push(s.clone()),
        YamlValue::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                match item.as_str() {
                    Some(s) => doc.transforms.push(s.to_string()),
                    None => doc.schema_diagnostics.push(Diagnostic::error(
                        "TPL013",
                        format!("Transform[{}]", i),
                        "Transform entries must be strings",
                    )),
                }
            }
        }
        _ => doc.schema_diagnostics.push(Diagnostic::error(
            "TPL013",
            "Transform",
            "Transform must be a string or a list of strings",
        )),
    }
}

fn expect_section_map(section: &str, value: &YamlValue) -> Result<ValueMap, TemplateError> {
    match convert(value) {
        TemplateValue::Map(m) => Ok(m),
        _ => Err(SchemaError::SectionNotAMapping {
            section: section.to_string(),
        }
        .into()),
    }
}

fn parse_resources(value: &YamlValue, doc: &mut Document) -> TemplateResult<()> {
    let entries = match value {
        YamlValue::Mapping(m) => m,
        _ => {
            return Err(SchemaError::SectionNotAMapping {
                section: "Resources".to_string(),
            }
            .into())
        }
    };

    for (name, decl) in entries {
        let name = match name.as_str() {
            Some(s) => s.to_string(),
            None => {
                doc.schema_diagnostics.push(Diagnostic::error(
                    "TPL010",
                    "Resources",
                    "Logical names must be strings",
                ));
                continue;
            }
        };
        let path = format!("Resources.{}", name);

        let decl = match convert(decl) {
            TemplateValue::Map(m) => m,
            _ => {
                doc.schema_diagnostics.push(Diagnostic::error(
                    "TPL010",
                    &path,
                    "Resource declaration must be a mapping",
                ));
                continue;
            }
        };

        let type_tag = match decl.get_str("Type") {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => {
                doc.schema_diagnostics.push(
                    Diagnostic::error("TPL011", &path, "Resource has no 'Type' tag")
                        .with_hint("Add: Type: AWS::Serverless::Function"),
                );
                continue;
            }
        };

        let properties = match decl.get("Properties") {
            None => ValueMap::new(),
            Some(TemplateValue::Map(m)) => m.clone(),
            Some(_) => {
                doc.schema_diagnostics.push(Diagnostic::error(
                    "TPL012",
                    format!("{}.Properties", path),
                    "Properties must be a mapping",
                ));
                continue;
            }
        };

        let metadata = decl.get_map("Metadata").cloned().unwrap_or_default();

        doc.resources.push(ResourceDecl {
            name,
            type_tag,
            properties,
            metadata,
        });
    }
    Ok(())
}

/// Convert a raw YAML node into a typed value, recognizing intrinsic markers.
fn convert(value: &YamlValue) -> TemplateValue {
    match value {
        YamlValue::Null => TemplateValue::Null,
        YamlValue::Bool(b) => TemplateValue::Bool(*b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                TemplateValue::Integer(i)
            } else {
                TemplateValue::Number(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        YamlValue::String(s) => TemplateValue::String(s.clone()),
        YamlValue::Sequence(items) => {
            TemplateValue::List(items.iter().map(convert).collect())
        }
        YamlValue::Mapping(entries) => {
            // Long-form intrinsic: a single-key mapping whose key is one of
            // the fixed reference tags.
            if entries.len() == 1 {
                let (k, v) = entries.iter().next().expect("len checked");
                if let Some(key) = k.as_str() {
                    let payload = convert(v);
                    if let Some(intrinsic) = IntrinsicReference::from_fn_key(key, &payload) {
                        return TemplateValue::Intrinsic(Box::new(intrinsic));
                    }
                }
            }
            let mut map = ValueMap::new();
            for (k, v) in entries {
                let key = match k.as_str() {
                    Some(s) => s.to_string(),
                    // Non-string keys are rare in templates; render them
                    // so the entry is not silently lost.
                    None => serde_yaml::to_string(k)
                        .map(|s| s.trim_end().to_string())
                        .unwrap_or_default(),
                };
                map.insert(key, convert(v));
            }
            TemplateValue::Map(map)
        }
        YamlValue::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let tag = tag.trim_start_matches('!');
            let payload = convert(&tagged.value);
            match IntrinsicReference::from_short_tag(tag, &payload) {
                Some(intrinsic) => TemplateValue::Intrinsic(Box::new(intrinsic)),
                // Unknown or malformed tag: keep the payload as plain data.
                None => payload,
            }
        }
    }
}

fn json_to_yaml(value: &serde_json::Value) -> YamlValue {
    match value {
        serde_json::Value::Null => YamlValue::Null,
        serde_json::Value::Bool(b) => YamlValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                YamlValue::Number(i.into())
            } else {
                YamlValue::Number(serde_yaml::Number::from(n.as_f64().unwrap_or(f64::NAN)))
            }
        }
        serde_json::Value::String(s) => YamlValue::String(s.clone()),
        serde_json::Value::Array(items) => {
            YamlValue::Sequence(items.iter().map(json_to_yaml).collect())
        }
        serde_json::Value::Object(entries) => YamlValue::Mapping(
            entries
                .iter()
                .map(|(k, v)| (YamlValue::String(k.clone()), json_to_yaml(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
Transform: AWS::Serverless-2016-10-31
Resources:
  HelloFunction:
    Type: AWS::Serverless::Function
    Properties:
      Handler: app.handler
      Runtime: python3.12
      CodeUri: hello/
"#;

    #[test]
    fn test_parse_minimal_template() {
        let doc = parse_document(MINIMAL, DocumentFormat::Yaml).unwrap();
        assert_eq!(doc.transforms, vec!["AWS::Serverless-2016-10-31"]);
        assert_eq!(doc.resources.len(), 1);
        let f = doc.resource("HelloFunction").unwrap();
        assert_eq!(f.type_tag, "AWS::Serverless::Function");
        assert_eq!(f.properties.get_str("Runtime"), Some("python3.12"));
        assert!(doc.schema_diagnostics.is_empty());
    }

    #[test]
    fn test_short_and_long_intrinsics_parse_equal() {
        let short = r#"
Resources:
  Fn:
    Type: AWS::Serverless::Function
    Properties:
      Role: !GetAtt Pool.Arn
      Api: !Ref MyApi
"#;
        let long = r#"
Resources:
  Fn:
    Type: AWS::Serverless::Function
    Properties:
      Role:
        Fn::GetAtt: [Pool, Arn]
      Api:
        Ref: MyApi
"#;
        let a = parse_document(short, DocumentFormat::Yaml).unwrap();
        let b = parse_document(long, DocumentFormat::Yaml).unwrap();
        assert_eq!(a.resources, b.resources);
        let role = a.resource("Fn").unwrap().properties.get("Role").unwrap();
        assert!(role.as_intrinsic().is_some());
    }

    #[test]
    fn test_unknown_top_level_key_is_schema_error() {
        let text = "Resourcez:\n  A:\n    Type: X\n";
        let err = parse_document(text, DocumentFormat::Yaml).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::Schema(SchemaError::UnknownTopLevelKey { .. })
        ));
    }

    #[test]
    fn test_missing_resources_is_schema_error() {
        let err = parse_document("Description: nothing here\n", DocumentFormat::Yaml).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::Schema(SchemaError::MissingResources)
        ));
    }

    #[test]
    fn test_syntax_error_carries_location() {
        let err = parse_document("Resources:\n  bad: [unclosed\n", DocumentFormat::Yaml)
            .unwrap_err();
        match err {
            TemplateError::Parse(ParseError::Syntax { line, .. }) => assert!(line >= 1),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_resource_without_type_is_dropped_others_continue() {
        let text = r#"
Resources:
  Broken:
    Properties:
      Handler: x
  Good:
    Type: AWS::Serverless::Function
    Properties:
      Handler: app.handler
      Runtime: python3.12
"#;
        let doc = parse_document(text, DocumentFormat::Yaml).unwrap();
        assert!(doc.resource("Broken").is_none());
        assert!(doc.resource("Good").is_some());
        assert_eq!(doc.schema_diagnostics.len(), 1);
        assert_eq!(doc.schema_diagnostics[0].code, "TPL011");
    }

    #[test]
    fn test_json_format_hint() {
        let text = r#"{
  "Resources": {
    "Fn": {
      "Type": "AWS::Serverless::Function",
      "Properties": {"Handler": "app.handler", "Runtime": "python3.12", "Role": {"Ref": "MyRole"}}
    }
  }
}"#;
        let doc = parse_document(text, DocumentFormat::Json).unwrap();
        let role = doc.resource("Fn").unwrap().properties.get("Role").unwrap();
        assert!(role.as_intrinsic().is_some());
    }

    #[test]
    fn test_empty_document() {
        let err = parse_document("   \n", DocumentFormat::Yaml).unwrap_err();
        assert!(matches!(err, TemplateError::Parse(ParseError::Empty)));
    }

    #[test]
    fn test_round_trip_structural_equality() {
        let text = r#"
Transform: AWS::Serverless-2016-10-31
Parameters:
  Stage:
    Type: String
Resources:
  Api:
    Type: AWS::Serverless::Api
    Properties:
      StageName: prod
      Tags:
        team: platform
        tier: "1"
"#;
        let first = parse_document(text, DocumentFormat::Yaml).unwrap();
        let serialized = first.to_yaml_string().unwrap();
        let second = parse_document(&serialized, DocumentFormat::Yaml).unwrap();
        assert_eq!(first, second);
    }
}
