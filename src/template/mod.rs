//! Template front end
//!
//! Parses YAML/JSON serverless-application templates into an immutable
//! `Document` of typed values, preserving intrinsic-function markers as
//! distinct nodes.

pub mod intrinsic;
pub mod parser;
pub mod value;

pub use intrinsic::IntrinsicReference;
pub use parser::{parse_document, Document, DocumentFormat, ResourceDecl};
pub use value::{TemplateValue, ValueMap};
