//! Diagnostics infrastructure for input validation.
//!
//! Collects warnings and errors while a study document is checked against the
//! data-model invariants, so every problem is reported in one pass instead of
//! failing on the first. Issues carry a category for grouping and optionally
//! the entity they refer to (e.g. "Hydro 2 (Reservoir B)").

use serde::Serialize;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but the study can proceed (e.g. no thermal units)
    Warning,
    /// The study cannot run (e.g. inconsistent dimensions)
    Error,
}

/// A single diagnostic issue found during validation
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Category for grouping (e.g. "structure", "bounds", "dimensions")
    pub category: String,
    pub message: String,
    /// Optional entity reference (e.g. "Hydro 1 (Reservoir A)")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        Ok(())
    }
}

/// Collection of diagnostic issues for one validation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues.push(DiagnosticIssue {
            severity: Severity::Warning,
            category: category.to_string(),
            message: message.to_string(),
            entity: None,
        });
    }

    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues.push(DiagnosticIssue {
            severity: Severity::Error,
            category: category.to_string(),
            message: message.to_string(),
            entity: None,
        });
    }

    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues.push(DiagnosticIssue {
            severity: Severity::Error,
            category: category.to_string(),
            message: message.to_string(),
            entity: Some(entity.to_string()),
        });
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Collapse all errors into one message suitable for a fatal error.
    pub fn summary(&self) -> String {
        self.errors()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_filters() {
        let mut diag = Diagnostics::new();
        diag.add_warning("structure", "no thermal units");
        diag.add_error("dimensions", "demand vector has 3 stages, config says 4");
        assert_eq!(diag.warning_count(), 1);
        assert_eq!(diag.error_count(), 1);
        assert!(diag.has_errors());
    }

    #[test]
    fn test_entity_in_display() {
        let mut diag = Diagnostics::new();
        diag.add_error_with_entity("bounds", "initial storage out of range", "Hydro 2");
        let text = diag.summary();
        assert!(text.contains("Hydro 2"));
        assert!(text.contains("bounds"));
    }
}
