//! Compilation context: interning and generated-name bookkeeping.
//!
//! One [`ToolchainContext`] is created per compilation task and passed by
//! reference through grammar ingestion and automaton construction. It owns
//! everything the pipeline would otherwise be tempted to keep in statics:
//! the symbol-name interner, the counter behind generated symbol names, and
//! the registry of named character classes (Unicode blocks and categories
//! are supplied here by the host as plain span lists).

use crate::automata::CharSpan;
use crate::error::GrammarError;
use compact_str::CompactString;
use hashbrown::HashMap;
use lasso::{Rodeo, Spur};

/// An interned symbol name. Cheap to copy and compare; resolve through the
/// owning [`ToolchainContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Name(Spur);

/// Per-compilation state shared across the construction pipeline.
pub struct ToolchainContext {
    names: Rodeo,
    next_generated: u32,
    span_classes: HashMap<CompactString, Vec<CharSpan>, ahash::RandomState>,
}

impl ToolchainContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: Rodeo::new(),
            next_generated: 0,
            span_classes: HashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    pub fn intern(&mut self, name: &str) -> Name {
        Name(self.names.get_or_intern(name))
    }

    #[must_use]
    pub fn resolve(&self, name: Name) -> &str {
        self.names.resolve(&name.0)
    }

    /// A fresh name for an anonymous symbol. Deterministic within one
    /// context, so repeated compilations of the same grammar agree.
    pub fn generated_name(&mut self, prefix: &str) -> CompactString {
        let id = self.next_generated;
        self.next_generated += 1;
        CompactString::from(format!("{prefix}{id}"))
    }

    /// Register a named character class (e.g. a Unicode block or category).
    ///
    /// Classes are static lookup data supplied by the host; the toolchain
    /// only consumes them.
    pub fn register_span_class(&mut self, name: &str, spans: Vec<CharSpan>) {
        self.span_classes.insert(CompactString::from(name), spans);
    }

    /// Look up a named character class.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::UnknownSpanClass`] when no class of that name
    /// was registered.
    pub fn span_class(&self, name: &str) -> Result<&[CharSpan], GrammarError> {
        self.span_classes
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| GrammarError::UnknownSpanClass {
                name: CompactString::from(name),
            })
    }
}

impl Default for ToolchainContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates() {
        let mut ctx = ToolchainContext::new();
        let a = ctx.intern("expr");
        let b = ctx.intern("expr");
        let c = ctx.intern("term");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(ctx.resolve(a), "expr");
    }

    #[test]
    fn generated_names_are_sequential() {
        let mut ctx = ToolchainContext::new();
        assert_eq!(ctx.generated_name("_t"), "_t0");
        assert_eq!(ctx.generated_name("_v"), "_v1");
    }

    #[test]
    fn unknown_span_class_is_an_error() {
        let ctx = ToolchainContext::new();
        assert!(ctx.span_class("Lu").is_err());
    }
}
