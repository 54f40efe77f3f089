//! Shared packed parse forest.
//!
//! A forest node represents one symbol over one span of input and owns one
//! family per distinct derivation; ambiguous input shows up as a node with
//! several families. Identity is the dense arena index, and families
//! compare structurally (same rule, same child sequence), which is what
//! makes merging a set-insert instead of a tree walk.

use super::automaton::{ParserAutomaton, RuleOp};
use super::lexer::Token;
use super::tree::ParseTree;
use crate::grammar::{RuleId, Sid, SymbolRef, TreeAction};

pub type SppfId = usize;

/// What a forest node stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SppfLabel {
    Token(Token),
    Variable(Sid),
}

/// One derivation of a node: the rule applied and the children produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SppfFamily {
    pub rule: RuleId,
    pub children: Vec<SppfId>,
}

#[derive(Debug, Clone)]
pub struct SppfNode {
    pub label: SppfLabel,
    pub families: Vec<SppfFamily>,
}

/// The forest arena.
#[derive(Debug, Default)]
pub struct Sppf {
    nodes: Vec<SppfNode>,
}

impl Sppf {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn node(&self, id: SppfId) -> &SppfNode {
        &self.nodes[id]
    }

    pub fn add_token(&mut self, token: Token) -> SppfId {
        self.nodes.push(SppfNode {
            label: SppfLabel::Token(token),
            families: Vec::new(),
        });
        self.nodes.len() - 1
    }

    pub fn add_variable(&mut self, sid: Sid) -> SppfId {
        self.nodes.push(SppfNode {
            label: SppfLabel::Variable(sid),
            families: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Add a derivation to `node`, merging with an existing structurally
    /// equal family. Returns whether the family is new.
    pub fn add_family(&mut self, node: SppfId, rule: RuleId, children: Vec<SppfId>) -> bool {
        let family = SppfFamily { rule, children };
        if self.nodes[node].families.contains(&family) {
            return false;
        }
        self.nodes[node].families.push(family);
        true
    }

    /// Whether any node holds more than one family, i.e. the input was
    /// ambiguous.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.nodes.iter().any(|node| node.families.len() > 1)
    }

    /// Flatten the forest under `root` into one tree, following the first
    /// family of every node, replaying each rule's ops to place virtual
    /// symbols and tree actions. Iterative: forests built from deep input
    /// would overrun a recursive walk.
    #[must_use]
    pub fn extract(&self, root: SppfId, automaton: &ParserAutomaton) -> ParseTree {
        let mut tree = ParseTree::new();
        let root_node = match &self.nodes[root].label {
            SppfLabel::Variable(sid) => tree.add_node(SymbolRef::Variable(*sid), TreeAction::Keep),
            SppfLabel::Token(token) => tree.add_token(token.clone(), TreeAction::Keep),
        };
        tree.set_root(root_node);

        struct Frame {
            sppf: SppfId,
            tree_node: usize,
            op_index: usize,
            pop_index: usize,
        }
        let mut stack = vec![Frame {
            sppf: root,
            tree_node: root_node,
            op_index: 0,
            pop_index: 0,
        }];

        while !stack.is_empty() {
            let last = stack.len() - 1;
            let (sppf_id, tree_node, op_index, pop_index) = {
                let top = &stack[last];
                (top.sppf, top.tree_node, top.op_index, top.pop_index)
            };
            let node = &self.nodes[sppf_id];
            let Some(family) = node.families.first() else {
                stack.pop();
                continue;
            };
            let ops = &automaton.rule(family.rule).ops;
            if op_index >= ops.len() {
                stack.pop();
                continue;
            }
            stack[last].op_index += 1;

            match ops[op_index] {
                RuleOp::Pop(action) => {
                    stack[last].pop_index += 1;
                    let Some(&child) = family.children.get(pop_index) else {
                        continue;
                    };
                    match &self.nodes[child].label {
                        SppfLabel::Token(token) => {
                            let id = tree.add_token(token.clone(), action);
                            tree.node_mut(tree_node).children.push(id);
                        }
                        SppfLabel::Variable(sid) => {
                            let id = tree.add_node(SymbolRef::Variable(*sid), action);
                            tree.node_mut(tree_node).children.push(id);
                            stack.push(Frame {
                                sppf: child,
                                tree_node: id,
                                op_index: 0,
                                pop_index: 0,
                            });
                        }
                    }
                }
                RuleOp::Virtual { sid, action } => {
                    let id = tree.add_node(SymbolRef::Virtual(sid), action);
                    tree.node_mut(tree_node).children.push(id);
                }
                RuleOp::Action { .. } => {}
            }
        }
        tree
    }
}
