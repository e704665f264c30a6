use ariadne::{Color, Label, Report, ReportKind, Source};
use std::fmt;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Blocks compilation.
    Error,
    /// Reported, but the script still compiles.
    Warning,
}

/// A diagnostic message with source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: Severity,
    /// Byte range in the source text.
    pub span: std::ops::Range<usize>,
    /// Headline.
    pub message: String,
    /// Text shown under the span; defaults to the message.
    pub label: Option<String>,
}

impl Diagnostic {
    /// An error at `span`.
    pub fn error(span: std::ops::Range<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            span,
            message: message.into(),
            label: None,
        }
    }

    /// A warning at `span`.
    pub fn warning(span: std::ops::Range<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            span,
            message: message.into(),
            label: None,
        }
    }

    /// Set the label shown under the span.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Move the span by `offset` bytes. Used when a script body was compiled
    /// on its own but must be reported against the file it came from.
    pub fn shifted(mut self, offset: usize) -> Self {
        self.span = self.span.start + offset..self.span.end + offset;
        self
    }

    /// Whether this blocks compilation.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Severity {
    fn name(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    fn report_kind(self) -> ReportKind<'static> {
        match self {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        }
    }

    fn color(self) -> Color {
        match self {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity.name(), self.message)
    }
}

/// `(errors, warnings)` in `diagnostics`.
pub fn count(diagnostics: &[Diagnostic]) -> (usize, usize) {
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    (errors, diagnostics.len() - errors)
}

/// Render diagnostics with ariadne, in source order.
///
/// Spans are clamped to `source`, so a diagnostic about a file that could not
/// be read (empty source) still renders.
pub fn render_diagnostics(source: &str, filename: &str, diagnostics: &[Diagnostic]) -> String {
    let mut ordered: Vec<&Diagnostic> = diagnostics.iter().collect();
    ordered.sort_by_key(|d| (d.span.start, d.span.end));

    let mut output = Vec::new();
    for diag in ordered {
        let end = diag.span.end.min(source.len());
        let span = diag.span.start.min(end)..end;
        let label = diag.label.as_deref().unwrap_or(&diag.message);

        Report::build(diag.severity.report_kind(), (filename, span.clone()))
            .with_message(&diag.message)
            .with_label(
                Label::new((filename, span))
                    .with_message(label)
                    .with_color(diag.severity.color()),
            )
            .finish()
            .write((filename, Source::from(source)), &mut output)
            .ok();
    }

    String::from_utf8(output).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic::error(0..5, "unknown field \"sicknes\"");
        assert_eq!(d.to_string(), "error: unknown field \"sicknes\"");
    }

    #[test]
    fn shifted_moves_span() {
        let d = Diagnostic::warning(2..4, "unused").shifted(10);
        assert_eq!(d.span, 12..14);
        assert!(!d.is_error());
    }

    #[test]
    fn counts_by_severity() {
        let diags = [
            Diagnostic::error(0..1, "a"),
            Diagnostic::warning(0..1, "b"),
            Diagnostic::warning(2..3, "c"),
        ];
        assert_eq!(count(&diags), (1, 2));
    }

    #[test]
    fn out_of_range_span_still_renders() {
        let diags = [Diagnostic::error(0..0, "cannot read default.items")];
        let output = render_diagnostics("", "default.items", &diags);
        assert!(output.contains("cannot read"));
    }

    #[test]
    fn render_produces_output() {
        let source = "item mask {\n    effect { sickness = \"high\" }\n}";
        let diags = vec![
            Diagnostic::error(36..42, "type mismatch")
                .with_label("expected int, found string"),
        ];
        let output = render_diagnostics(source, "default.items", &diags);
        assert!(!output.is_empty());
        assert!(output.contains("type mismatch"));
    }
}
