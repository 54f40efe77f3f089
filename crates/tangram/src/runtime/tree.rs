//! Parse trees and post-parse tree-action application.
//!
//! Nodes live in an arena indexed by `usize`. [`ParseTree::apply_actions`]
//! turns the raw concrete tree into the final shape by applying each node's
//! tree action in an explicit-stack post-order walk, never recursion:
//! grammar-derived trees get deep enough on pathological inputs to overrun
//! a call stack.

use super::automaton::ParserAutomaton;
use super::lexer::Token;
use super::text::TextContent;
use crate::grammar::{SymbolRef, TreeAction};

/// A node of a [`ParseTree`].
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub symbol: SymbolRef,
    /// The action attached by the parent rule's body element.
    pub action: TreeAction,
    /// The matched token, for terminal leaves.
    pub token: Option<Token>,
    pub children: Vec<usize>,
}

/// An arena-allocated syntax tree.
#[derive(Debug, Clone, Default)]
pub struct ParseTree {
    nodes: Vec<TreeNode>,
    root: Option<usize>,
}

impl ParseTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, symbol: SymbolRef, action: TreeAction) -> usize {
        self.nodes.push(TreeNode {
            symbol,
            action,
            token: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    pub fn add_token(&mut self, token: Token, action: TreeAction) -> usize {
        self.nodes.push(TreeNode {
            symbol: SymbolRef::Terminal(token.sid),
            action,
            token: Some(token),
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    #[must_use]
    pub fn node(&self, id: usize) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: usize) -> &mut TreeNode {
        &mut self.nodes[id]
    }

    #[must_use]
    pub const fn root(&self) -> Option<usize> {
        self.root
    }

    pub fn set_root(&mut self, root: usize) {
        self.root = Some(root);
    }

    /// Apply every node's tree action, bottom-up:
    ///
    /// - `Drop` removes the node and its subtree;
    /// - `Replace` splices the node's children into its place;
    /// - `Promote` makes the node take its parent's place, adopting the
    ///   parent's other children around its own (a later promotion in the
    ///   same body adopts the earlier promoted node as its first child).
    pub fn apply_actions(&mut self) {
        let Some(root) = self.root else {
            return;
        };

        // Left-to-right post-order without recursion.
        let mut order: Vec<usize> = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().copied());
        }
        order.reverse();

        // After processing, a node may have been replaced by a promoted
        // descendant; parents resolve children through this mapping.
        let mut effective: Vec<usize> = (0..self.nodes.len()).collect();

        for &id in &order {
            let original_children = std::mem::take(&mut self.nodes[id].children);
            let original_action = self.nodes[id].action;
            let mut promoted: Option<usize> = None;
            let mut pending: Vec<usize> = Vec::new();

            for child_id in original_children {
                let child = effective[child_id];
                match self.nodes[child].action {
                    TreeAction::Drop => {}
                    TreeAction::Keep => pending.push(child),
                    TreeAction::Replace => {
                        pending.extend(self.nodes[child].children.iter().copied());
                    }
                    TreeAction::Promote => {
                        // The promoted node adopts everything gathered so
                        // far around its own children; an earlier promoted
                        // root is committed and becomes its first child.
                        let own = std::mem::take(&mut self.nodes[child].children);
                        let mut adopted: Vec<usize> = Vec::new();
                        match promoted {
                            Some(previous) => {
                                self.nodes[previous].children.append(&mut pending);
                                adopted.push(previous);
                            }
                            None => adopted.append(&mut pending),
                        }
                        adopted.extend(own);
                        self.nodes[child].children = adopted;
                        promoted = Some(child);
                    }
                }
            }

            match promoted {
                Some(new_root) => {
                    self.nodes[new_root].children.extend(pending);
                    self.nodes[new_root].action = original_action;
                    effective[id] = new_root;
                }
                None => {
                    self.nodes[id].children = pending;
                }
            }
        }

        let final_root = effective[root];
        self.root = if self.nodes[final_root].action == TreeAction::Drop {
            None
        } else {
            Some(final_root)
        };
    }

    /// Render the tree as `head(child child ...)`, naming nodes through the
    /// automaton's symbol table. Terminal leaves whose text differs from
    /// their declared literal are rendered as `NAME='text'`.
    #[must_use]
    pub fn render(&self, automaton: &ParserAutomaton, content: &TextContent) -> String {
        let Some(root) = self.root else {
            return String::new();
        };
        let mut out = String::new();
        self.render_into(root, automaton, content, &mut out);
        out
    }

    fn render_into(
        &self,
        id: usize,
        automaton: &ParserAutomaton,
        content: &TextContent,
        out: &mut String,
    ) {
        let node = &self.nodes[id];
        let name = automaton.symbol_name(node.symbol.sid());
        out.push_str(name);
        if let Some(token) = &node.token {
            let text = token.text(content);
            if automaton.symbol_value(node.symbol.sid()) != Some(text.as_str()) {
                out.push_str("='");
                out.push_str(&text);
                out.push('\'');
            }
        }
        if !node.children.is_empty() {
            out.push('(');
            for (i, &child) in node.children.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                self.render_into(child, automaton, content, out);
            }
            out.push(')');
        }
    }
}
