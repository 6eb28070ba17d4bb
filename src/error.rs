//! Error handling for the template pipeline
//!
//! Fatal errors use thiserror enums; non-fatal findings (merge conflicts,
//! validation errors) are collected as diagnostics in `report` instead of
//! being raised through this hierarchy.

use thiserror::Error;

/// Main error type for the template pipeline
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Document exceeds node budget: {node_count} nodes, limit {max_nodes}")]
    Limit { node_count: usize, max_nodes: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

/// Syntax-level failures from the YAML/JSON front end
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Document is empty")]
    Empty,
}

/// Violations of the fixed top-level template schema
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Template must be a mapping at the top level")]
    NotAMapping,

    #[error("Unrecognized top-level key '{key}'")]
    UnknownTopLevelKey { key: String },

    #[error("Template has no 'Resources' section")]
    MissingResources,

    #[error("'{section}' section must be a mapping")]
    SectionNotAMapping { section: String },
}

/// Failures while assembling the resource graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Duplicate logical name '{name}'")]
    DuplicateLogicalName { name: String },
}

impl ParseError {
    /// Build a syntax error from a serde_yaml failure, carrying its location.
    pub fn from_yaml(err: &serde_yaml::Error) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((0, 0));
        ParseError::Syntax {
            line,
            column,
            message: err.to_string(),
        }
    }

    /// Build a syntax error from a serde_json failure, carrying its location.
    pub fn from_json(err: &serde_json::Error) -> Self {
        ParseError::Syntax {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for pipeline operations
pub type TemplateResult<T> = Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TemplateError::Graph(GraphError::DuplicateLogicalName {
            name: "MyFunction".to_string(),
        });
        assert!(err.to_string().contains("MyFunction"));
    }

    #[test]
    fn test_parse_error_from_yaml() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("foo: [unclosed").unwrap_err();
        let err = ParseError::from_yaml(&yaml_err);
        match err {
            ParseError::Syntax { line, .. } => assert!(line >= 1),
            _ => panic!("expected syntax error"),
        }
    }
}
