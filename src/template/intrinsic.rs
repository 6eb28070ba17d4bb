//! Intrinsic-function nodes
//!
//! Templates defer some lookups to deploy time: parameter references,
//! attribute lookups on other resources, and string substitution templates
//! with embedded references. The parser keeps these as tagged nodes so the
//! validator can resolve their targets against the document.
//!
//! Both spellings are recognized: YAML short tags (`!Ref X`, `!GetAtt A.B`,
//! `!Sub "..."`) and long-form single-key mappings (`Ref:`, `Fn::GetAtt:`,
//! `Fn::Sub:`). Re-serialization always emits the long form.

use std::sync::OnceLock;

use regex::Regex;
use serde_yaml::Value as YamlValue;

use super::value::{TemplateValue, ValueMap};

/// Pseudo parameters are always resolvable without a declaration.
const PSEUDO_PARAMETER_PREFIX: &str = "AWS::";

fn sub_variable_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"))
}

/// A deferred lookup embedded in a property value
#[derive(Debug, Clone, PartialEq)]
pub enum IntrinsicReference {
    /// Reference to a parameter or resource by logical name
    Ref { target: String },
    /// Attribute lookup on another resource
    GetAtt { target: String, attribute: String },
    /// Substitution template with embedded `${Name}` references and an
    /// optional local substitution map
    Sub {
        template: String,
        substitutions: ValueMap,
    },
}

impl IntrinsicReference {
    /// Operator kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            IntrinsicReference::Ref { .. } => "Ref",
            IntrinsicReference::GetAtt { .. } => "Fn::GetAtt",
            IntrinsicReference::Sub { .. } => "Fn::Sub",
        }
    }

    /// Recognize a YAML short-tag form. `tag` arrives without the leading `!`.
    pub fn from_short_tag(tag: &str, payload: &TemplateValue) -> Option<Self> {
        match tag {
            "Ref" => payload.as_str().map(|s| IntrinsicReference::Ref {
                target: s.to_string(),
            }),
            "GetAtt" => match payload {
                // !GetAtt Resource.Attribute
                TemplateValue::String(s) => Self::getatt_from_dotted(s),
                // !GetAtt [Resource, Attribute]
                TemplateValue::List(items) => Self::getatt_from_list(items),
                _ => None,
            },
            "Sub" => Self::sub_from_payload(payload),
            _ => None,
        }
    }

    /// Recognize a long-form single-key mapping entry (`Ref`, `Fn::GetAtt`,
    /// `Fn::Sub`). Returns `None` when the key is not an intrinsic or the
    /// payload shape does not match.
    pub fn from_fn_key(key: &str, payload: &TemplateValue) -> Option<Self> {
        match key {
            "Ref" => Self::from_short_tag("Ref", payload),
            "Fn::GetAtt" => Self::from_short_tag("GetAtt", payload),
            "Fn::Sub" => Self::from_short_tag("Sub", payload),
            _ => None,
        }
    }

    fn getatt_from_dotted(s: &str) -> Option<Self> {
        let (target, attribute) = s.split_once('.')?;
        if target.is_empty() || attribute.is_empty() {
            return None;
        }
        Some(IntrinsicReference::GetAtt {
            target: target.to_string(),
            attribute: attribute.to_string(),
        })
    }

    fn getatt_from_list(items: &[TemplateValue]) -> Option<Self> {
        if items.len() < 2 {
            return None;
        }
        let parts: Option<Vec<&str>> = items.iter().map(TemplateValue::as_str).collect();
        let parts = parts?;
        Some(IntrinsicReference::GetAtt {
            target: parts[0].to_string(),
            attribute: parts[1..].join("."),
        })
    }

    fn sub_from_payload(payload: &TemplateValue) -> Option<Self> {
        match payload {
            TemplateValue::String(template) => Some(IntrinsicReference::Sub {
                template: template.clone(),
                substitutions: ValueMap::new(),
            }),
            // [template, {Name: value, ...}]
            TemplateValue::List(items) => {
                if items.len() != 2 {
                    return None;
                }
                let template = items[0].as_str()?;
                let substitutions = items[1].as_map()?.clone();
                Some(IntrinsicReference::Sub {
                    template: template.to_string(),
                    substitutions,
                })
            }
            _ => None,
        }
    }

    /// Logical names this node defers to.
    ///
    /// Pseudo parameters (`AWS::*`), `${!escaped}` literals, and names bound
    /// by a Sub's local substitution map resolve without a declaration and
    /// are not reported as targets. A `${Resource.Attribute}` variable
    /// targets the resource part.
    pub fn targets(&self) -> Vec<String> {
        match self {
            IntrinsicReference::Ref { target } => {
                if target.starts_with(PSEUDO_PARAMETER_PREFIX) {
                    Vec::new()
                } else {
                    vec![target.clone()]
                }
            }
            IntrinsicReference::GetAtt { target, .. } => vec![target.clone()],
            IntrinsicReference::Sub {
                template,
                substitutions,
            } => {
                let mut targets = Vec::new();
                for cap in sub_variable_regex().captures_iter(template) {
                    let var = cap[1].trim();
                    if var.starts_with('!') {
                        continue; // ${!literal} escape
                    }
                    let name = var.split('.').next().unwrap_or(var);
                    if name.starts_with(PSEUDO_PARAMETER_PREFIX)
                        || substitutions.contains_key(var)
                        || substitutions.contains_key(name)
                    {
                        continue;
                    }
                    if !targets.iter().any(|t| t == name) {
                        targets.push(name.to_string());
                    }
                }
                targets
            }
        }
    }

    /// Canonical long-form serialization.
    pub fn to_yaml(&self) -> YamlValue {
        let single = |key: &str, value: YamlValue| {
            YamlValue::Mapping(
                std::iter::once((YamlValue::String(key.to_string()), value)).collect(),
            )
        };
        match self {
            IntrinsicReference::Ref { target } => {
                single("Ref", YamlValue::String(target.clone()))
            }
            IntrinsicReference::GetAtt { target, attribute } => single(
                "Fn::GetAtt",
                YamlValue::Sequence(vec![
                    YamlValue::String(target.clone()),
                    YamlValue::String(attribute.clone()),
                ]),
            ),
            IntrinsicReference::Sub {
                template,
                substitutions,
            } => {
                if substitutions.is_empty() {
                    single("Fn::Sub", YamlValue::String(template.clone()))
                } else {
                    let map = YamlValue::Mapping(
                        substitutions
                            .iter()
                            .map(|(k, v)| (YamlValue::String(k.to_string()), v.to_yaml()))
                            .collect(),
                    );
                    single(
                        "Fn::Sub",
                        YamlValue::Sequence(vec![
                            YamlValue::String(template.clone()),
                            map,
                        ]),
                    )
                }
            }
        }
    }
}

impl std::fmt::Display for IntrinsicReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntrinsicReference::Ref { target } => write!(f, "!Ref {}", target),
            IntrinsicReference::GetAtt { target, attribute } => {
                write!(f, "!GetAtt {}.{}", target, attribute)
            }
            IntrinsicReference::Sub { template, .. } => write!(f, "!Sub \"{}\"", template),
        }
    }
}
