//! Pipeline orchestration
//!
//! Strict Parser → GraphBuilder → MergeResolver → Validator sequence for a
//! single document. Fatal errors (syntax, top-level schema, duplicate
//! logical names, node budget) abort the run; merge conflicts and
//! validation findings accumulate into the `RunReport`.
//!
//! Independent documents share no mutable state, so batch runs process
//! them in parallel with one pipeline per document. All file I/O happens
//! at pipeline entry.

use std::path::{Path, PathBuf};
use std::thread;

use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::graph;
use crate::merge;
use crate::report::{DocumentSummary, RunReport};
use crate::template::{parse_document, Document, DocumentFormat};
use crate::validate;

/// Default upper bound on document nodes, to bound worst-case processing
pub const DEFAULT_MAX_NODES: usize = 100_000;

/// Per-run configuration
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Format hint; `None` means infer from the file extension (files) or
    /// assume YAML (raw text).
    pub format: Option<DocumentFormat>,
    /// Maximum node count a document may hold
    pub max_nodes: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            format: None,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

/// Run the full pipeline over raw document text.
pub fn run_str(text: &str, options: &PipelineOptions) -> TemplateResult<RunReport> {
    let format = options.format.unwrap_or_default();
    let document = parse_document(text, format)?;

    let node_count = document.node_count();
    if node_count > options.max_nodes {
        return Err(TemplateError::Limit {
            node_count,
            max_nodes: options.max_nodes,
        });
    }

    let graph = graph::build(&document)?;
    let outcome = merge::resolve(&graph);
    let findings = validate::validate(&graph);

    let mut report = RunReport {
        summary: summarize(&document),
        conflicts: outcome.conflicts,
        diagnostics: document.schema_diagnostics.clone(),
    };
    report.diagnostics.extend(findings);

    debug!(
        clean = report.is_clean(),
        conflicts = report.conflicts.len(),
        diagnostics = report.diagnostics.len(),
        "pipeline run complete"
    );
    Ok(report)
}

/// Run the pipeline over a file. The only I/O in the pipeline happens here.
pub fn run_file(path: &Path, options: &PipelineOptions) -> TemplateResult<RunReport> {
    let text = std::fs::read_to_string(path)?;
    let mut options = options.clone();
    if options.format.is_none() {
        options.format = Some(infer_format(path));
    }
    run_str(&text, &options)
}

/// Validate many independent documents in parallel, one pipeline per file.
pub fn run_batch(
    paths: &[PathBuf],
    options: &PipelineOptions,
) -> Vec<(PathBuf, TemplateResult<RunReport>)> {
    thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| {
                let options = options.clone();
                scope.spawn(move || (path.clone(), run_file(path, &options)))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("pipeline thread panicked"))
            .collect()
    })
}

fn infer_format(path: &Path) -> DocumentFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => DocumentFormat::Json,
        _ => DocumentFormat::Yaml,
    }
}

fn summarize(document: &Document) -> DocumentSummary {
    let mut resource_types: Vec<(String, usize)> = Vec::new();
    for resource in &document.resources {
        match resource_types
            .iter_mut()
            .find(|(tag, _)| *tag == resource.type_tag)
        {
            Some((_, count)) => *count += 1,
            None => resource_types.push((resource.type_tag.clone(), 1)),
        }
    }
    DocumentSummary {
        transforms: document.transforms.clone(),
        parameter_count: document.parameters.len(),
        resource_count: document.resources.len(),
        resource_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_budget_is_enforced() {
        let text = r#"
Resources:
  Fn:
    Type: AWS::Serverless::Function
    Properties:
      Handler: app.handler
      Runtime: python3.12
"#;
        let options = PipelineOptions {
            max_nodes: 2,
            ..PipelineOptions::default()
        };
        let err = run_str(text, &options).unwrap_err();
        assert!(matches!(err, TemplateError::Limit { max_nodes: 2, .. }));
    }

    #[test]
    fn test_summary_counts() {
        let report = run_str(
            r#"
Transform: AWS::Serverless-2016-10-31
Parameters:
  Stage:
    Type: String
Resources:
  A:
    Type: AWS::Serverless::Function
    Properties:
      Handler: a.handler
      Runtime: python3.12
  B:
    Type: AWS::Serverless::Function
    Properties:
      Handler: b.handler
      Runtime: python3.12
  Api:
    Type: AWS::Serverless::Api
    Properties:
      StageName: prod
"#,
            &PipelineOptions::default(),
        )
        .unwrap();
        assert_eq!(report.summary.parameter_count, 1);
        assert_eq!(report.summary.resource_count, 3);
        assert_eq!(
            report.summary.resource_types,
            vec![
                ("AWS::Serverless::Function".to_string(), 2),
                ("AWS::Serverless::Api".to_string(), 1),
            ]
        );
        assert!(report.is_clean());
    }

    #[test]
    fn test_schema_findings_surface_in_report() {
        let report = run_str(
            r#"
Resources:
  Broken:
    Properties:
      Handler: x
  Good:
    Type: AWS::Serverless::Api
    Properties:
      StageName: prod
"#,
            &PipelineOptions::default(),
        )
        .unwrap();
        assert!(!report.is_clean());
        assert!(report.diagnostics.iter().any(|d| d.code == "TPL011"));
    }
}
