//! Resource graph
//!
//! Turns a parsed `Document` into named resources with typed properties
//! and reference edges between them.

pub mod builder;
pub mod types;

pub use builder::build;
pub use types::{ReferenceEdge, Resource, ResourceGraph, UnresolvedReference};
