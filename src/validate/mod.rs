//! Graph validation
//!
//! Walks the built resource graph and batch-returns every finding:
//! unresolved intrinsic targets (one error per occurrence) and missing
//! required properties for the known resource types. Never stops at the
//! first failure so tooling can report everything in one pass.

use tracing::debug;

use crate::graph::ResourceGraph;
use crate::report::Diagnostic;

/// Required properties per known resource type. Checked against the
/// Globals-merged property view, so a default satisfies the requirement.
const REQUIRED_PROPERTIES: &[(&str, &[&str])] = &[
    ("AWS::Serverless::Function", &["Handler", "Runtime"]),
    ("AWS::Serverless::Api", &["StageName"]),
    ("AWS::Serverless::LayerVersion", &["ContentUri"]),
];

/// Resource type whose definition may come from exactly one of two places
const STATE_MACHINE: &str = "AWS::Serverless::StateMachine";

/// Validate the graph, returning the complete list of findings.
pub fn validate(graph: &ResourceGraph) -> Vec<Diagnostic> {
    let mut diags = Vec::new();

    check_references(graph, &mut diags);
    for resource in &graph.resources {
        check_required_properties(resource, &mut diags);
    }

    debug!(findings = diags.len(), "validated resource graph");
    diags
}

/// Promote each unresolved reference computed by the graph builder to
/// exactly one error diagnostic.
fn check_references(graph: &ResourceGraph, diags: &mut Vec<Diagnostic>) {
    for unresolved in &graph.unresolved {
        let code = match unresolved.kind.as_str() {
            "Ref" => "VAL040",
            "Fn::GetAtt" => "VAL041",
            _ => "VAL042",
        };
        diags.push(
            Diagnostic::error(
                code,
                &unresolved.path,
                format!(
                    "{} target '{}' is not a declared parameter or resource",
                    unresolved.kind, unresolved.target
                ),
            )
            .with_hint(format!(
                "Declare '{}' under Parameters or Resources",
                unresolved.target
            )),
        );
    }
}

fn check_required_properties(
    resource: &crate::graph::Resource,
    diags: &mut Vec<Diagnostic>,
) {
    let path = format!("Resources.{}.Properties", resource.name);

    if let Some((_, required)) = REQUIRED_PROPERTIES
        .iter()
        .find(|(tag, _)| *tag == resource.type_tag)
    {
        for property in *required {
            if !resource.properties.contains_key(property) {
                diags.push(
                    Diagnostic::error(
                        "VAL050",
                        format!("{}.{}", path, property),
                        format!(
                            "'{}' requires property '{}'",
                            resource.type_tag, property
                        ),
                    )
                    .with_hint(format!("Add: {}: ...", property)),
                );
            }
        }
    }

    if resource.type_tag == STATE_MACHINE {
        let inline = resource.properties.contains_key("Definition");
        let external = resource.properties.contains_key("DefinitionUri");
        if inline == external {
            let message = if inline {
                "State machine declares both 'Definition' and 'DefinitionUri'"
            } else {
                "State machine needs either 'Definition' or 'DefinitionUri'"
            };
            diags.push(Diagnostic::error("VAL051", &path, message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph;
    use crate::template::{parse_document, DocumentFormat};

    fn validate_yaml(text: &str) -> Vec<Diagnostic> {
        let doc = parse_document(text, DocumentFormat::Yaml).unwrap();
        validate(&graph::build(&doc).unwrap())
    }

    #[test]
    fn test_clean_template_has_no_findings() {
        let diags = validate_yaml(r#"
Parameters:
  Stage:
    Type: String
Resources:
  MyApi:
    Type: AWS::Serverless::Api
    Properties:
      StageName: !Ref Stage
  MyFunction:
    Type: AWS::Serverless::Function
    Properties:
      Handler: app.handler
      Runtime: python3.12
      Environment:
        Variables:
          API_URL: !Sub "https://${MyApi}.example.com"
"#);
        assert!(diags.is_empty(), "unexpected findings: {:?}", diags);
    }

    #[test]
    fn test_unresolved_targets_yield_one_error_each() {
        let diags = validate_yaml(r#"
Resources:
  MyFunction:
    Type: AWS::Serverless::Function
    Properties:
      Handler: app.handler
      Runtime: python3.12
      Role: !GetAtt MissingRole.Arn
      Layers:
        - !Ref MissingLayer
"#);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().any(|d| d.code == "VAL040" && d.message.contains("MissingLayer")));
        assert!(diags.iter().any(|d| d.code == "VAL041" && d.message.contains("MissingRole")));
        assert!(diags.iter().all(Diagnostic::is_error));
    }

    #[test]
    fn test_unresolved_sub_variable() {
        let diags = validate_yaml(r#"
Resources:
  MyFunction:
    Type: AWS::Serverless::Function
    Properties:
      Handler: app.handler
      Runtime: python3.12
      Description: !Sub "uses ${NoSuchThing} here"
"#);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "VAL042");
        assert!(diags[0].message.contains("NoSuchThing"));
    }

    #[test]
    fn test_missing_required_properties() {
        let diags = validate_yaml(r#"
Resources:
  Bare:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: src/
"#);
        let codes: Vec<_> = diags.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["VAL050", "VAL050"]);
    }

    #[test]
    fn test_globals_satisfy_required_properties() {
        let diags = validate_yaml(r#"
Globals:
  Function:
    Handler: app.handler
    Runtime: python3.12
Resources:
  Bare:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: src/
"#);
        assert!(diags.is_empty(), "unexpected findings: {:?}", diags);
    }

    #[test]
    fn test_state_machine_definition_one_of() {
        let neither = validate_yaml(r#"
Resources:
  Machine:
    Type: AWS::Serverless::StateMachine
    Properties:
      Role: arn:aws:iam::123456789012:role/stepfn
"#);
        assert_eq!(neither.len(), 1);
        assert_eq!(neither[0].code, "VAL051");

        let both = validate_yaml(r#"
Resources:
  Machine:
    Type: AWS::Serverless::StateMachine
    Properties:
      Definition:
        StartAt: Done
      DefinitionUri: statemachine/def.asl.json
"#);
        assert_eq!(both.len(), 1);
        assert!(both[0].message.contains("both"));

        let just_one = validate_yaml(r#"
Resources:
  Machine:
    Type: AWS::Serverless::StateMachine
    Properties:
      DefinitionUri: statemachine/def.asl.json
"#);
        assert!(just_one.is_empty());
    }

    #[test]
    fn test_unknown_resource_type_is_not_checked() {
        let diags = validate_yaml(r#"
Resources:
  Custom:
    Type: AWS::SNS::Topic
"#);
        assert!(diags.is_empty());
    }
}
