//! Diagnostic Sink
//!
//! Collects informational and warning output produced during parsing,
//! evaluation, and dependency resolution. Fatal errors are not collected
//! here; they abort the pipeline as `Result` errors and are formatted
//! with [`format_fatal`].

use crate::loc::Loc;

/// Severity of a collected diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

/// One collected diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Accumulates diagnostics and mirrors them to the process streams:
/// info to stdout, warnings to stderr. `silent` suppresses info lines
/// on stdout but still records them.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub lines: Vec<Diagnostic>,
    pub silent: bool,
}

impl Diagnostics {
    pub fn new(silent: bool) -> Self {
        Self {
            lines: Vec::new(),
            silent,
        }
    }

    /// `$(info ...)` and friendly progress notes.
    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.silent {
            println!("{}", message);
        }
        self.lines.push(Diagnostic {
            severity: Severity::Info,
            message,
        });
    }

    /// A warning without a source location.
    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        eprintln!("{}", message);
        self.lines.push(Diagnostic {
            severity: Severity::Warning,
            message,
        });
    }

    /// A warning attached to a makefile location, in the conventional
    /// `file:line: warning: ...` shape.
    pub fn warning_loc(&mut self, loc: Loc, message: impl AsRef<str>) {
        self.warning(format!("{}: warning: {}", loc, message.as_ref()));
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.lines
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}

/// Format a fatal diagnostic the way the tool prints it before exiting
/// non-zero: `FILE:LINE: *** MESSAGE.`
pub fn format_fatal(loc: Loc, message: &str) -> String {
    format!("{}: *** {}.", loc, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sym::intern;

    #[test]
    fn test_format_fatal() {
        let loc = Loc::new(intern("Makefile"), 7);
        assert_eq!(
            format_fatal(loc, "missing separator"),
            "Makefile:7: *** missing separator."
        );
    }

    #[test]
    fn test_warning_loc_collects() {
        let mut diag = Diagnostics::new(true);
        let loc = Loc::new(intern("sub.mk"), 3);
        diag.warning_loc(loc, "overriding recipe for target 'a'");
        assert_eq!(diag.lines.len(), 1);
        assert_eq!(diag.warnings().count(), 1);
        assert!(diag.lines[0].message.contains("sub.mk:3: warning:"));
    }

    #[test]
    fn test_info_recorded_when_silent() {
        let mut diag = Diagnostics::new(true);
        diag.info("building");
        assert_eq!(diag.lines.len(), 1);
        assert_eq!(diag.lines[0].severity, Severity::Info);
    }
}
