use crate::error::Error;
use crate::span::Span;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, PartialEq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub span: Option<Span>,
    pub suggestions: Vec<String>,
    pub source_context: Option<String>,
    pub code: Option<String>,
}

impl Diagnostic {
    fn with_level(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            span: None,
            suggestions: Vec::new(),
            source_context: None,
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Info, message)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_source_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Build an error diagnostic carrying the error's span and code.
    pub fn from_error(error: &Error) -> Self {
        let mut diagnostic = Diagnostic::error(error.to_string());
        if let Some(span) = error.span() {
            diagnostic = diagnostic.with_span(span);
        }
        if let Some(code) = error.code() {
            diagnostic = diagnostic.with_code(code);
        }
        diagnostic
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl std::fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostic")
            .field("level", &self.level)
            .field("message", &self.message)
            .field("span", &self.span)
            .field("suggestions", &self.suggestions)
            .field("source_context", &self.source_context)
            .field("code", &self.code)
            .finish()
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(context) = &self.source_context {
            write!(f, "[{}] ", context)?;
        }
        write!(f, "{}", self.message)?;

        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }

        if let Some(span) = &self.span {
            write!(f, " at {}", span)?;
        }

        if !self.suggestions.is_empty() {
            let hints = self.suggestions.join("; ");
            write!(f, " (hints: {})", hints)?;
        }

        Ok(())
    }
}

/// Shared sink for diagnostics produced while lowering one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticManager {
    diagnostics: Arc<Mutex<Vec<Diagnostic>>>,
}

impl DiagnosticManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_diagnostic(&self, diagnostic: Diagnostic) {
        if let Ok(mut diagnostics) = self.diagnostics.lock() {
            diagnostics.push(diagnostic);
        }
    }

    pub fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .lock()
            .map(|d| d.iter().any(Diagnostic::is_error))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut diagnostics) = self.diagnostics.lock() {
            diagnostics.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_from_error_keeps_span_and_code() {
        let span = Span::new(3, 10, 14);
        let error = Error::LengthMismatch {
            span,
            dst_len: 4,
            src_len: 3,
        };
        let diagnostic = Diagnostic::from_error(&error).with_source_context("arrays");

        assert!(diagnostic.is_error());
        assert_eq!(diagnostic.span, Some(span));
        assert_eq!(diagnostic.code.as_deref(), Some("E-ARRAY-LEN"));
        assert_eq!(
            diagnostic.to_string(),
            "[arrays] array length mismatch: destination has 4 elements, source has 3 \
             [E-ARRAY-LEN] at Span(3:10-14)"
        );
    }

    #[test]
    fn manager_tracks_errors_only_for_error_level() {
        let manager = DiagnosticManager::new();
        manager.add_diagnostic(Diagnostic::warning("provably out of bounds"));
        assert!(!manager.has_errors());
        manager.add_diagnostic(Diagnostic::error("bad"));
        assert!(manager.has_errors());
        assert_eq!(manager.get_diagnostics().len(), 2);
        manager.clear();
        assert!(manager.get_diagnostics().is_empty());
    }
}
