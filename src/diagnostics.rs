// ABOUTME: Diagnostics accumulator for non-fatal warnings during setup.
// ABOUTME: Collects conditions that don't abort startup but should be reported.

/// Collects non-fatal warnings during setup.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during setup.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// The drop-in directory exists but could not be inspected.
    pub fn drop_in_unreadable(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::DropInUnreadable,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Drop-in directory stat failed for a reason other than absence; the layer was skipped.
    DropInUnreadable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::drop_in_unreadable("permission denied"));
        diag.warn(Warning::drop_in_unreadable("input/output error"));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
    }

    #[test]
    fn warning_constructors_set_correct_kind() {
        let drop_in = Warning::drop_in_unreadable("test");
        assert_eq!(drop_in.kind, WarningKind::DropInUnreadable);
        assert_eq!(drop_in.message, "test");
    }
}
