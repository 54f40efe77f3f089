//! # Error Types
//!
//! Diagnostics and error types for grammar construction and parsing.
//!
//! ## Overview
//!
//! The toolchain distinguishes three families of failure:
//!
//! - **Construction-time grammar errors** ([`GrammarError`]): a bad
//!   repetition range, an unresolvable symbol reference, an unknown
//!   character class. These are reported through a [`Reporter`] and
//!   construction continues where possible, so one run surfaces as many
//!   independent problems as it can.
//! - **Automaton conflicts**: shift/reduce and reduce/reduce conflicts are
//!   *data*, not errors (see [`crate::lr::Conflict`]). A graph with
//!   outstanding unresolved conflicts refuses table emission
//!   ([`EmitError`]) but stays fully inspectable.
//! - **Runtime errors** ([`ParseError`], [`LexError`]): carried in the
//!   parse result next to whatever tree could be built; the parser returns
//!   rather than panics.
//!
//! The core never prints. Everything user-visible flows through the
//! [`Reporter`] as structured [`Diagnostic`] values for the host tool to
//! render.
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, error types integrate with
//! [`miette`] for rich rendering with codes.

use crate::runtime::text::TextPosition;
use compact_str::CompactString;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic as MietteDiagnostic;

/// Severity of a reported diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// A single reported diagnostic: plain data for the host tool to render.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Short tag identifying the emitting component, e.g. `"lexer"`, `"lr"`.
    pub component: &'static str,
    pub message: String,
    pub position: Option<TextPosition>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.component, self.severity, self.message)?;
        if let Some(position) = self.position {
            write!(f, " at {position}")?;
        }
        Ok(())
    }
}

/// Sink for diagnostics emitted during grammar compilation.
///
/// The toolchain never decides exit codes or formatting; it hands every
/// conflict, warning and error to the reporter and moves on.
pub trait Reporter {
    fn report(&mut self, diagnostic: Diagnostic);

    fn info(&mut self, component: &'static str, message: String) {
        self.report(Diagnostic {
            severity: Severity::Info,
            component,
            message,
            position: None,
        });
    }

    fn warn(&mut self, component: &'static str, message: String) {
        self.report(Diagnostic {
            severity: Severity::Warning,
            component,
            message,
            position: None,
        });
    }

    fn error(&mut self, component: &'static str, message: String) {
        self.report(Diagnostic {
            severity: Severity::Error,
            component,
            message,
            position: None,
        });
    }

    fn fatal(&mut self, component: &'static str, message: String) {
        self.report(Diagnostic {
            severity: Severity::Fatal,
            component,
            message,
            position: None,
        });
    }
}

/// A [`Reporter`] that collects diagnostics into a vector.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    diagnostics: Vec<Diagnostic>,
}

impl CollectingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether any diagnostic at `Error` severity or above was reported.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity >= Severity::Error)
    }

    #[must_use]
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Errors raised while building a grammar or its automata.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(MietteDiagnostic))]
pub enum GrammarError {
    #[error("invalid repetition range: minimum {min} exceeds maximum {max}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::bad_repetition)))]
    InvalidRepetition { min: u32, max: u32 },

    #[error("malformed character span: begin {begin:#06x} exceeds end {end:#06x}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::malformed_span)))]
    MalformedSpan { begin: u16, end: u16 },

    #[error("unknown symbol `{name}`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::unknown_symbol)))]
    UnknownSymbol { name: CompactString },

    #[error("unknown character class `{name}`")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::unknown_class)))]
    UnknownSpanClass { name: CompactString },

    #[error("grammar has no axiom variable")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::no_axiom)))]
    NoAxiom,
}

/// Errors raised when emitting parser tables from an LR graph.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(MietteDiagnostic))]
pub enum EmitError {
    #[error("cannot emit deterministic tables: {count} unresolved conflict(s)")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(emit::unresolved_conflicts)))]
    UnresolvedConflicts { count: usize },
}

/// A tokenization failure.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(MietteDiagnostic))]
pub enum LexError {
    #[error("unexpected character `{text}` at {position}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lexer::unexpected_char)))]
    UnexpectedCharacter {
        text: CompactString,
        position: TextPosition,
    },
}

/// A parse failure, carrying the offending token and the terminals that
/// would have been accepted in its place.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(MietteDiagnostic))]
pub enum ParseError {
    #[error("unexpected token `{found}` at {position}; expected one of: {}", expected.join(", "))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::unexpected_token)))]
    UnexpectedToken {
        found: CompactString,
        position: TextPosition,
        expected: Vec<String>,
    },

    #[error("unexpected end of input at {position}; expected one of: {}", expected.join(", "))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::unexpected_eof)))]
    UnexpectedEnd {
        position: TextPosition,
        expected: Vec<String>,
    },
}

impl ParseError {
    #[must_use]
    pub fn position(&self) -> TextPosition {
        match self {
            Self::UnexpectedToken { position, .. } | Self::UnexpectedEnd { position, .. } => {
                *position
            }
        }
    }
}
