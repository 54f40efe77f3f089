//! Emitted automaton tables: the contract between table construction and
//! the table-driven runtime.
//!
//! Logically the parser table maps `(state, symbol id)` to shift, reduce or
//! accept actions, with a rules table describing each reduction (head,
//! length, and the tree-action ops replayed when building syntax nodes) and
//! an expected-terminals query for error messages. The lexer table maps
//! `(state, code-unit span)` to successor states with per-state accepting
//! terminals. With the `serialize` feature both tables derive `serde`
//! traits; the concrete on-disk encoding is the host's business.

use crate::automata::{Dfa, FinalItem, Nfa};
use crate::error::EmitError;
use crate::grammar::{Grammar, RuleId, SID_DOLLAR, Sid, SymbolRef, TreeAction};
use crate::lr::{Graph, Resolution, RuleTable};
use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::SmallVec;

/// A parser action on a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum LrAction {
    Shift(u32),
    Reduce(u32),
    Accept,
}

/// One step of a reduction's tree-building bytecode, in body order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleOp {
    /// Consume one node popped from the stack, tagging it with the body
    /// element's tree action.
    Pop(TreeAction),
    /// Insert a virtual-symbol node without consuming anything.
    Virtual { sid: Sid, action: TreeAction },
    /// Fire a semantic action callback.
    Action { sid: Sid },
}

/// A rule as the runtime sees it.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RuntimeRule {
    /// Head variable id (the axiom pseudo-head for the augmented rule).
    pub head: Sid,
    pub ops: Vec<RuleOp>,
    /// Number of stack entries a reduction consumes (the `Pop` op count).
    pub reduction_length: usize,
}

/// A symbol's identity as carried in the emitted tables, so the runtime can
/// name tokens and tree nodes without the grammar at hand.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolEntry {
    pub sid: Sid,
    pub name: CompactString,
    /// The declared literal, for terminals.
    pub value: Option<CompactString>,
}

/// A nullable variable and its canonical empty derivation: the rule to
/// replay and the (nullable) variables it pops, in body order. Entries are
/// emitted children-before-parents so the runtime can materialize the
/// shared empty derivations in one pass.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NullableEntry {
    pub variable: Sid,
    pub rule: RuleId,
    pub children: Vec<Sid>,
}

type ActionCells = HashMap<Sid, SmallVec<[LrAction; 1]>, ahash::RandomState>;
type GotoCells = HashMap<Sid, u32, ahash::RandomState>;

/// The emitted parser tables.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ParserAutomaton {
    actions: Vec<ActionCells>,
    gotos: Vec<GotoCells>,
    rules: Vec<RuntimeRule>,
    symbols: Vec<SymbolEntry>,
    nullables: Vec<NullableEntry>,
    /// Whether every cell holds at most one action.
    deterministic: bool,
}

impl ParserAutomaton {
    /// Emit deterministic tables.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::UnresolvedConflicts`] when the graph still has
    /// contested conflicts; the graph stays available for inspection.
    pub fn emit(grammar: &Grammar, graph: &Graph, rules: &RuleTable) -> Result<Self, EmitError> {
        let unresolved = graph.unresolved_conflicts();
        if unresolved > 0 {
            return Err(EmitError::UnresolvedConflicts { count: unresolved });
        }
        let mut automaton = Self::build(grammar, graph, rules);
        for (state_id, cells) in automaton.actions.iter_mut().enumerate() {
            for (&sid, actions) in cells.iter_mut() {
                if actions.len() > 1 {
                    resolve_cell(graph, state_id, sid, actions);
                }
            }
        }
        automaton.deterministic = true;
        Ok(automaton)
    }

    /// Emit tables for the generalized parser: conflicting cells keep all
    /// their actions and the graph-structured stack explores them.
    #[must_use]
    pub fn emit_generalized(grammar: &Grammar, graph: &Graph, rules: &RuleTable) -> Self {
        let mut automaton = Self::build(grammar, graph, rules);
        // Priority- and simulation-resolved conflicts still apply.
        for (state_id, cells) in automaton.actions.iter_mut().enumerate() {
            for (&sid, actions) in cells.iter_mut() {
                if actions.len() > 1 {
                    resolve_cell(graph, state_id, sid, actions);
                }
            }
        }
        automaton
    }

    fn build(grammar: &Grammar, graph: &Graph, rules: &RuleTable) -> Self {
        let all_terminals: Vec<Sid> = grammar.terminals().iter().map(|t| t.sid).collect();
        let mut actions: Vec<ActionCells> = Vec::with_capacity(graph.states.len());
        let mut gotos: Vec<GotoCells> = Vec::with_capacity(graph.states.len());

        for state in &graph.states {
            let mut cells: ActionCells = HashMap::with_hasher(ahash::RandomState::new());
            let mut goto_cells: GotoCells = HashMap::with_hasher(ahash::RandomState::new());
            for &(symbol, child) in &state.children {
                match symbol {
                    SymbolRef::Terminal(sid) => {
                        cells
                            .entry(sid)
                            .or_default()
                            .push(LrAction::Shift(child as u32));
                    }
                    SymbolRef::Variable(sid) => {
                        goto_cells.insert(sid, child as u32);
                    }
                    _ => {}
                }
            }
            for reduction in &state.reductions {
                let is_axiom = reduction.rule == rules.axiom_rule;
                match reduction.lookahead {
                    Some(lookahead) => {
                        let action = if is_axiom {
                            LrAction::Accept
                        } else {
                            LrAction::Reduce(reduction.rule as u32)
                        };
                        push_unique(cells.entry(lookahead).or_default(), action);
                    }
                    None => {
                        // LR(0): the reduction applies on every terminal;
                        // the axiom reduction is the accept on end-of-input.
                        if is_axiom {
                            push_unique(cells.entry(SID_DOLLAR).or_default(), LrAction::Accept);
                        } else {
                            let action = LrAction::Reduce(reduction.rule as u32);
                            for &sid in &all_terminals {
                                push_unique(cells.entry(sid).or_default(), action);
                            }
                            push_unique(cells.entry(SID_DOLLAR).or_default(), action);
                        }
                    }
                }
            }
            actions.push(cells);
            gotos.push(goto_cells);
        }

        let runtime_rules = rules
            .rules
            .iter()
            .map(|compiled| match compiled.grammar_rule {
                Some(id) => compile_rule_ops(grammar, id, compiled.head),
                None => RuntimeRule {
                    head: compiled.head,
                    ops: vec![RuleOp::Pop(TreeAction::Keep)],
                    reduction_length: 1,
                },
            })
            .collect();

        let mut symbols: Vec<SymbolEntry> = Vec::new();
        for terminal in grammar.terminals() {
            symbols.push(SymbolEntry {
                sid: terminal.sid,
                name: terminal.name.clone(),
                value: Some(terminal.value.clone()),
            });
        }
        for variable in grammar.variables() {
            symbols.push(SymbolEntry {
                sid: variable.sid,
                name: variable.name.clone(),
                value: None,
            });
        }
        for virtual_symbol in grammar.virtuals() {
            symbols.push(SymbolEntry {
                sid: virtual_symbol.sid,
                name: virtual_symbol.name.clone(),
                value: None,
            });
        }
        symbols.sort_by_key(|entry| entry.sid);

        Self {
            actions,
            gotos,
            rules: runtime_rules,
            symbols,
            nullables: compute_nullables(grammar),
            deterministic: false,
        }
    }

    /// The actions available in `state` on terminal `sid` (the dollar id
    /// queries end-of-input behavior).
    #[must_use]
    pub fn actions(&self, state: u32, sid: Sid) -> &[LrAction] {
        self.actions[state as usize]
            .get(&sid)
            .map_or(&[], SmallVec::as_slice)
    }

    /// The goto target of `state` on variable `sid`.
    #[must_use]
    pub fn goto(&self, state: u32, sid: Sid) -> Option<u32> {
        self.gotos[state as usize].get(&sid).copied()
    }

    #[must_use]
    pub fn rule(&self, id: RuleId) -> &RuntimeRule {
        &self.rules[id]
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Nullable variables with their canonical empty derivations, in
    /// children-before-parents order.
    #[must_use]
    pub fn nullables(&self) -> &[NullableEntry] {
        &self.nullables
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub const fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Terminal ids with at least one action in `state`, sorted. This is
    /// the error-reporting query: "what was acceptable here".
    #[must_use]
    pub fn expected_terminals(&self, state: u32) -> Vec<Sid> {
        let mut expected: Vec<Sid> = self.actions[state as usize].keys().copied().collect();
        expected.sort_unstable();
        expected
    }

    /// The symbol's declared name, or `"?"` when the id is unknown.
    #[must_use]
    pub fn symbol_name(&self, sid: Sid) -> &str {
        if sid == SID_DOLLAR {
            return "$";
        }
        self.symbols
            .binary_search_by_key(&sid, |entry| entry.sid)
            .ok()
            .map_or("?", |i| self.symbols[i].name.as_str())
    }

    /// The terminal's declared literal value, if it has one.
    #[must_use]
    pub fn symbol_value(&self, sid: Sid) -> Option<&str> {
        self.symbols
            .binary_search_by_key(&sid, |entry| entry.sid)
            .ok()
            .and_then(|i| self.symbols[i].value.as_deref())
    }
}

fn push_unique(cell: &mut SmallVec<[LrAction; 1]>, action: LrAction) {
    if !cell.contains(&action) {
        cell.push(action);
    }
}

/// Apply a resolved conflict's verdict to a multi-action cell.
fn resolve_cell(graph: &Graph, state: usize, sid: Sid, cell: &mut SmallVec<[LrAction; 1]>) {
    let resolution = graph.states[state]
        .conflicts
        .iter()
        .filter(|c| c.lookahead.is_none_or(|la| la == sid))
        .find_map(|c| c.resolution);
    match resolution {
        Some(Resolution::Shift) => cell.retain(|a| matches!(a, LrAction::Shift(_))),
        Some(Resolution::Reduce(rule)) => {
            let winner = LrAction::Reduce(rule as u32);
            if cell.contains(&winner) {
                cell.retain(|a| *a == winner);
            }
        }
        None => {}
    }
}

/// The nullable variables of `grammar`, each with the first rule that
/// derives empty through already-known nullable variables.
fn compute_nullables(grammar: &Grammar) -> Vec<NullableEntry> {
    let mut entries: Vec<NullableEntry> = Vec::new();
    loop {
        let mut changed = false;
        for (id, rule) in grammar.rules().iter().enumerate() {
            if entries.iter().any(|e| e.variable == rule.head) {
                continue;
            }
            let mut children: Vec<Sid> = Vec::new();
            let mut nullable = true;
            for element in &rule.body.elements {
                match element.symbol {
                    SymbolRef::Variable(sid) => {
                        if entries.iter().any(|e| e.variable == sid) {
                            children.push(sid);
                        } else {
                            nullable = false;
                            break;
                        }
                    }
                    SymbolRef::Terminal(_) | SymbolRef::Dollar => {
                        nullable = false;
                        break;
                    }
                    SymbolRef::Epsilon | SymbolRef::Virtual(_) | SymbolRef::Action(_) => {}
                }
            }
            if nullable {
                entries.push(NullableEntry {
                    variable: rule.head,
                    rule: id,
                    children,
                });
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    entries
}

fn compile_rule_ops(grammar: &Grammar, id: RuleId, head: Sid) -> RuntimeRule {
    let rule = grammar.rule(id);
    let mut ops = Vec::with_capacity(rule.body.elements.len());
    let mut reduction_length = 0;
    for element in &rule.body.elements {
        match element.symbol {
            SymbolRef::Terminal(_) | SymbolRef::Variable(_) => {
                ops.push(RuleOp::Pop(element.action));
                reduction_length += 1;
            }
            SymbolRef::Virtual(sid) => ops.push(RuleOp::Virtual {
                sid,
                action: element.action,
            }),
            SymbolRef::Action(sid) => ops.push(RuleOp::Action { sid }),
            SymbolRef::Epsilon | SymbolRef::Dollar => {}
        }
    }
    RuntimeRule {
        head,
        ops,
        reduction_length,
    }
}

/// One state of the emitted lexer table.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LexerState {
    /// Disjoint spans, sorted by start.
    pub transitions: Vec<(crate::automata::CharSpan, u32)>,
    /// The terminal recognized when a token ends here, if any.
    pub accept: Option<Sid>,
}

/// The emitted lexer tables: the determinized union of every terminal's
/// automaton, plus the separator terminal discarded between tokens.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LexerAutomaton {
    states: Vec<LexerState>,
    separator: Option<Sid>,
}

impl LexerAutomaton {
    /// Build the lexer tables for `grammar`'s terminals.
    #[must_use]
    pub fn emit(grammar: &Grammar) -> Self {
        let mut combined = Nfa::new();
        for terminal in grammar.terminals() {
            let (entry, _) = combined.insert(terminal.nfa.clone());
            let root = combined.entry();
            combined.add_epsilon(root, entry);
        }
        let mut dfa = Dfa::from_nfa(&combined);
        dfa.prune();
        dfa.repack_transitions();

        let states = dfa
            .states()
            .iter()
            .map(|state| LexerState {
                transitions: state
                    .transitions()
                    .iter()
                    .map(|&(span, target)| (span, target as u32))
                    .collect(),
                accept: state.top_final().and_then(|item| match item {
                    FinalItem::Terminal(sid) => Some(sid),
                    FinalItem::Dummy => None,
                }),
            })
            .collect();

        Self {
            states,
            separator: grammar.separator(),
        }
    }

    #[must_use]
    pub fn state(&self, id: u32) -> &LexerState {
        &self.states[id as usize]
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub const fn separator(&self) -> Option<Sid> {
        self.separator
    }

    /// The successor of `state` on `unit`, if any.
    #[must_use]
    pub fn next_on(&self, state: u32, unit: u16) -> Option<u32> {
        self.states[state as usize]
            .transitions
            .iter()
            .find(|(span, _)| span.contains(unit))
            .map(|&(_, target)| target)
    }
}
