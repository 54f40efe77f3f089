//! # Table-Driven Runtime
//!
//! The engine that consumes emitted automata and produces syntax trees.
//!
//! ## Overview
//!
//! - [`automaton`] - the emitted parser and lexer tables (the logical
//!   serialization contract)
//! - [`text`] - code-unit buffering with line/column tracking
//! - [`lexer`] - the pull-based maximal-munch tokenizer
//! - [`parser`] - the deterministic LR stack machine
//! - [`gss`], [`sppf`], [`rnglr`] - the ambiguity-tolerant parser: a
//!   graph-structured stack over a shared packed parse forest
//! - [`tree`] - parse trees and post-parse tree-action application
//!
//! Everything here is single-threaded and pull-based: the parser asks the
//! lexer for the next token, the lexer walks the text buffer, and a parse
//! runs to completion, success or structured failure, with no suspension
//! and no cancellation.

pub mod automaton;
pub mod gss;
pub mod lexer;
pub mod parser;
pub mod rnglr;
pub mod sppf;
pub mod text;
pub mod tree;

pub use automaton::{LexerAutomaton, LrAction, ParserAutomaton, RuleOp, RuntimeRule};
pub use gss::{Gss, GssNodeId, GssPath};
pub use lexer::{Lexer, Token, tokenize};
pub use parser::{ParseOutcome, SemanticListener, parse, parse_with_listener};
pub use sppf::{Sppf, SppfId};
pub use text::{TextContent, TextPosition, TextSpan};
pub use tree::{ParseTree, TreeNode};
