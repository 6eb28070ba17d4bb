//! Diagnostic and report types for pipeline results
//!
//! Non-fatal findings are collected as diagnostics with rule codes so
//! tooling can batch-report every problem in one pass.
//!
//! ## Rule Codes
//!
//! | Range | Category |
//! |-------|----------|
//! | TPL000-009 | Parse / top-level schema |
//! | TPL010-019 | Per-resource schema |
//! | GRAPH020-029 | Graph construction |
//! | MERGE030-039 | Merge conflicts |
//! | VAL040-049 | Reference resolution |
//! | VAL050-059 | Required properties |

use serde::{Deserialize, Serialize};

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message (does not fail the run)
    Info,
    /// Warning (does not fail the run, but should be addressed)
    Warn,
    /// Error (fails the run)
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warn => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single finding from the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Rule code (e.g., "VAL040")
    pub code: String,
    /// Severity level
    pub severity: Severity,
    /// Path within the template (e.g., "Resources.MyApi.Properties.StageName")
    pub path: String,
    /// Human-readable message
    pub message: String,
    /// Optional hint for fixing the issue
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Create a warning diagnostic
    pub fn warn(
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity: Severity::Warn,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Create an info diagnostic
    pub fn info(
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity: Severity::Info,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Add a hint to this diagnostic
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check if this is a warning
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warn
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} at {}: {}",
            self.code, self.severity, self.path, self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

/// One field-level difference between two conflicting fragments.
///
/// Values are rendered as YAML so diffs stay readable and serializable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Path of the differing field within the fragment content
    pub path: String,
    /// Rendered value from the first fragment, if present
    pub left: Option<String>,
    /// Rendered value from the second fragment, if present
    pub right: Option<String>,
}

/// A merge conflict between two definition fragments at the same key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Rule code (MERGE030 for divergent content, MERGE031 for merge disabled)
    pub code: String,
    /// HTTP path of the conflicting merge key
    pub path: String,
    /// HTTP method of the conflicting merge key (lowercase)
    pub method: String,
    /// Where the first fragment came from
    pub first_source: String,
    /// Where the second fragment came from
    pub second_source: String,
    /// Field-level differences (empty when merge was not attempted)
    pub diff: Vec<FieldDiff>,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] conflict at {} {}: {} (from {} and {})",
            self.code, self.method, self.path, self.message, self.first_source, self.second_source
        )?;
        for d in &self.diff {
            write!(
                f,
                "\n    {}: {} != {}",
                d.path,
                d.left.as_deref().unwrap_or("<absent>"),
                d.right.as_deref().unwrap_or("<absent>")
            )?;
        }
        Ok(())
    }
}

/// Summary of a parsed document, included in every report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Transform declarations, in order
    pub transforms: Vec<String>,
    /// Number of declared parameters
    pub parameter_count: usize,
    /// Number of resources that survived schema checks
    pub resource_count: usize,
    /// Resource type tags with occurrence counts, in declaration order
    pub resource_types: Vec<(String, usize)>,
}

/// Complete result of one pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub summary: DocumentSummary,
    pub conflicts: Vec<ConflictRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// A run is clean when there are no conflicts and no error diagnostics.
    ///
    /// Warnings and info findings do not fail the run.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && !self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Count of error-severity diagnostics
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_creation() {
        let d = Diagnostic::error("VAL040", "Resources.MyFn", "Unresolved reference");
        assert_eq!(d.code, "VAL040");
        assert_eq!(d.severity, Severity::Error);
        assert!(d.is_error());
        assert!(!d.is_warning());
    }

    #[test]
    fn test_diagnostic_with_hint() {
        let d = Diagnostic::warn("GRAPH020", "Resources.MyApi", "Dangling reference")
            .with_hint("Declare the target under Resources or Parameters");
        assert!(d.hint.is_some());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warn);
        assert!(Severity::Warn > Severity::Info);
    }

    #[test]
    fn test_report_cleanliness() {
        let mut report = RunReport::default();
        assert!(report.is_clean());

        report
            .diagnostics
            .push(Diagnostic::warn("GRAPH020", "x", "warning only"));
        assert!(report.is_clean());

        report
            .diagnostics
            .push(Diagnostic::error("VAL040", "x", "an error"));
        assert!(!report.is_clean());
        assert_eq!(report.error_count(), 1);
    }
}
