//! Deterministic table-driven LR parser.
//!
//! A single linear stack of automaton states with one tree node per stack
//! entry. Each step applies at most one action per `(state, lookahead)`
//! pair; the tables must come from
//! [`super::automaton::ParserAutomaton::emit`]. Ambiguity-tolerant parsing
//! lives in [`super::rnglr`].

use super::automaton::{LrAction, ParserAutomaton, RuleOp};
use super::lexer::Lexer;
use super::tree::ParseTree;
use crate::error::{LexError, ParseError};
use crate::grammar::{Sid, SymbolRef, TreeAction};

/// Callback surface for semantic-action symbols encountered in reductions.
pub trait SemanticListener {
    fn on_action(&mut self, sid: Sid);
}

/// The result of a parse: a tree when one could be built, and whatever
/// errors occurred. A failed parse returns `tree: None` rather than
/// panicking; only internal faults would escalate beyond this.
#[derive(Debug)]
pub struct ParseOutcome {
    pub tree: Option<ParseTree>,
    pub errors: Vec<ParseError>,
    pub lex_errors: Vec<LexError>,
}

impl ParseOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.tree.is_some() && self.errors.is_empty() && self.lex_errors.is_empty()
    }

    pub(crate) fn failure(errors: Vec<ParseError>, lex_errors: Vec<LexError>) -> Self {
        Self {
            tree: None,
            errors,
            lex_errors,
        }
    }
}

/// Parse the lexer's input to completion.
#[must_use]
pub fn parse(automaton: &ParserAutomaton, lexer: &mut Lexer<'_>) -> ParseOutcome {
    parse_with_listener(automaton, lexer, None)
}

/// Parse, firing semantic-action callbacks through `listener`.
#[must_use]
pub fn parse_with_listener(
    automaton: &ParserAutomaton,
    lexer: &mut Lexer<'_>,
    mut listener: Option<&mut dyn SemanticListener>,
) -> ParseOutcome {
    let mut tree = ParseTree::new();
    let mut stack: Vec<u32> = vec![0];
    let mut nodes: Vec<usize> = Vec::new();

    let mut token = match lexer.next_token() {
        Ok(token) => token,
        Err(error) => return ParseOutcome::failure(Vec::new(), vec![error]),
    };

    loop {
        let state = stack[stack.len() - 1];
        let action = automaton.actions(state, token.sid).first().copied();
        match action {
            Some(LrAction::Shift(next)) => {
                let node = tree.add_token(token.clone(), TreeAction::Keep);
                nodes.push(node);
                stack.push(next);
                token = match lexer.next_token() {
                    Ok(token) => token,
                    Err(error) => return ParseOutcome::failure(Vec::new(), vec![error]),
                };
            }
            Some(LrAction::Reduce(rule_id)) => {
                let rule = automaton.rule(rule_id as usize);
                let length = rule.reduction_length;
                let Some(keep) = nodes.len().checked_sub(length) else {
                    return ParseOutcome::failure(
                        vec![unexpected(automaton, lexer, state, &token)],
                        Vec::new(),
                    );
                };
                let popped = nodes.split_off(keep);
                stack.truncate(stack.len() - length);

                let head_node = tree.add_node(SymbolRef::Variable(rule.head), TreeAction::Keep);
                let mut popped_iter = popped.into_iter();
                let mut children: Vec<usize> = Vec::with_capacity(rule.ops.len());
                for op in &rule.ops {
                    match *op {
                        RuleOp::Pop(action) => {
                            if let Some(child) = popped_iter.next() {
                                tree.node_mut(child).action = action;
                                children.push(child);
                            }
                        }
                        RuleOp::Virtual { sid, action } => {
                            children.push(tree.add_node(SymbolRef::Virtual(sid), action));
                        }
                        RuleOp::Action { sid } => {
                            if let Some(listener) = listener.as_deref_mut() {
                                listener.on_action(sid);
                            }
                        }
                    }
                }
                tree.node_mut(head_node).children = children;

                let below = stack[stack.len() - 1];
                match automaton.goto(below, rule.head) {
                    Some(next) => {
                        stack.push(next);
                        nodes.push(head_node);
                    }
                    None => {
                        return ParseOutcome::failure(
                            vec![unexpected(automaton, lexer, below, &token)],
                            Vec::new(),
                        );
                    }
                }
            }
            Some(LrAction::Accept) => {
                if let Some(&root) = nodes.last() {
                    tree.set_root(root);
                    tree.apply_actions();
                }
                return ParseOutcome {
                    tree: Some(tree),
                    errors: Vec::new(),
                    lex_errors: Vec::new(),
                };
            }
            None => {
                return ParseOutcome::failure(
                    vec![unexpected(automaton, lexer, state, &token)],
                    Vec::new(),
                );
            }
        }
    }
}

fn unexpected(
    automaton: &ParserAutomaton,
    lexer: &Lexer<'_>,
    state: u32,
    token: &super::lexer::Token,
) -> ParseError {
    let expected: Vec<String> = automaton
        .expected_terminals(state)
        .into_iter()
        .map(|sid| automaton.symbol_name(sid).to_string())
        .collect();
    if token.is_end() {
        ParseError::UnexpectedEnd {
            position: token.position,
            expected,
        }
    } else {
        ParseError::UnexpectedToken {
            found: token.text(lexer.content()),
            position: token.position,
            expected,
        }
    }
}
