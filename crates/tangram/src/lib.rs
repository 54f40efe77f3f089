//! # Tangram
//!
//! A parser-generator toolchain: grammars with regular-expression
//! terminals in, runnable lexer/parser tables out, plus the table-driven
//! runtime that turns input text into syntax trees.
//!
//! ## Overview
//!
//! The pipeline has three legs:
//!
//! - **Lexical construction**: terminal definitions are built as NFAs
//!   ([`automata::Nfa`] has the full operator algebra, including language
//!   difference), determinized into DFAs and packed into lexer tables.
//! - **Syntactic construction**: context-free rules (EBNF operators
//!   expanded away at ingestion) feed LR(0), canonical LR(1) or LALR(1)
//!   graph construction ([`lr::build`]), with conflicts reported as data
//!   and analyzed by a generalized stack simulator.
//! - **Runtime**: the emitted tables ([`runtime::automaton`]) drive either
//!   a deterministic LR parser or the RNGLR engine (graph-structured
//!   stack, shared packed parse forest) and the resulting tree gets its
//!   tree actions applied.
//!
//! ## Quick Start
//!
//! ```rust
//! use tangram::automata::Nfa;
//! use tangram::error::CollectingReporter;
//! use tangram::grammar::{Grammar, RuleBody, SymbolRef};
//! use tangram::lr::{self, LrMethod};
//! use tangram::runtime::{LexerAutomaton, Lexer, ParserAutomaton, TextContent};
//!
//! // Grammar: e -> A, with A = 'a'.
//! let mut grammar = Grammar::new("demo");
//! let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
//! let e = grammar.add_variable("e");
//! grammar.add_rule(e, RuleBody::single(SymbolRef::Terminal(a)));
//! grammar.add_option(Grammar::OPTION_AXIOM, "e");
//!
//! // Build the LALR(1) automaton and emit tables.
//! let mut reporter = CollectingReporter::new();
//! let (graph, rules) = lr::build(&grammar, LrMethod::Lalr1, &mut reporter)?;
//! let parser_tables = ParserAutomaton::emit(&grammar, &graph, &rules)?;
//! let lexer_tables = LexerAutomaton::emit(&grammar);
//!
//! // Parse.
//! let content = TextContent::new("a");
//! let mut lexer = Lexer::new(&lexer_tables, &content);
//! let outcome = tangram::runtime::parse(&parser_tables, &mut lexer);
//! assert!(outcome.is_success());
//! let tree = outcome.tree.unwrap();
//! assert_eq!(tree.render(&parser_tables, &content), "e(A)");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`automata`] - character spans, NFAs, DFAs
//! - [`grammar`] - the grammar model: symbols, rules, tree actions
//! - [`lr`] - LR/LALR graph construction and conflict analysis
//! - [`runtime`] - emitted tables and the table-driven parsers
//! - [`error`] - diagnostics, reporters, error types
//! - [`context`] - per-compilation interning and registries

pub mod automata;
pub mod context;
pub mod error;
pub mod grammar;
pub mod lr;
pub mod runtime;

pub use automata::{CharSpan, Dfa, Nfa};
pub use context::ToolchainContext;
pub use error::{CollectingReporter, Diagnostic, Reporter, Severity};
pub use grammar::{BodySet, Grammar, RuleBody, Sid, SymbolRef, TreeAction};
pub use lr::{Conflict, ConflictKind, Graph, LrMethod};
pub use runtime::{
    LexerAutomaton, ParseOutcome, ParseTree, ParserAutomaton, TextContent, Token,
};
