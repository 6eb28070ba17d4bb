//! stacklint — validation and merge-resolution engine for serverless
//! application templates
//!
//! The engine runs a strict four-stage pipeline over a YAML/JSON template:
//!
//! 1. **Parser** — raw text into an immutable [`template::Document`] of
//!    typed values, with intrinsic-function markers preserved as distinct
//!    nodes.
//! 2. **Graph builder** — the document into a [`graph::ResourceGraph`] of
//!    named resources and the reference edges between them.
//! 3. **Merge resolver** — multi-source API method definitions combined
//!    under the resource's declared merge policy, with irreconcilable
//!    fragments surfaced as [`report::ConflictRecord`]s.
//! 4. **Validator** — cross-reference and required-property checks,
//!    batch-reported.
//!
//! ## Quick start
//!
//! ```rust
//! use stacklint::pipeline::{run_str, PipelineOptions};
//!
//! let template = r#"
//! Resources:
//!   HelloFunction:
//!     Type: AWS::Serverless::Function
//!     Properties:
//!       Handler: app.handler
//!       Runtime: python3.12
//! "#;
//! let report = run_str(template, &PipelineOptions::default()).unwrap();
//! assert!(report.is_clean());
//! ```

// Core error handling
pub mod error;

// Diagnostics and run reports
pub mod report;

// Template front end: parser, typed values, intrinsics
pub mod template;

// Resource graph construction
pub mod graph;

// Definition-fragment merging
pub mod merge;

// Cross-reference and property validation
pub mod validate;

// Stage orchestration
pub mod pipeline;

pub use error::{GraphError, ParseError, SchemaError, TemplateError, TemplateResult};
pub use pipeline::{run_file, run_str, PipelineOptions};
pub use report::{ConflictRecord, Diagnostic, RunReport, Severity};
