//! LR state graphs: states, transitions, reduction tables and conflicts.

use super::item::{Firsts, Item, RuleTable, TerminalSet, closure_lr0, closure_lr1, normalize_items};
use crate::error::Reporter;
use crate::grammar::{Grammar, RuleId, Sid, SymbolRef};
use hashbrown::HashMap;

/// The table-construction method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LrMethod {
    Lr0,
    Lr1,
    Lalr1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

/// How a conflict was settled, when declared priorities decide it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Shift,
    Reduce(RuleId),
}

/// A detected conflict: reported data, never an exception. An unresolved
/// conflict blocks deterministic table emission; construction itself always
/// runs to completion so every conflict in the grammar is visible at once.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub state: usize,
    pub kind: ConflictKind,
    /// The contested lookahead terminal; `None` for LR(0), which has none.
    pub lookahead: Option<Sid>,
    /// The competing items.
    pub items: Vec<Item>,
    pub resolution: Option<Resolution>,
    /// Sample terminal sequences leading into the conflict, filled by the
    /// conflict analysis pass (see [`super::simulator`]).
    pub examples: Vec<Vec<Sid>>,
}

impl Conflict {
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

/// A reduction action: apply `rule` when the lookahead matches (`None`
/// matches every terminal, the LR(0) regime).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reduction {
    pub lookahead: Option<Sid>,
    pub rule: RuleId,
}

/// A state of the LR automaton.
#[derive(Debug, Clone)]
pub struct State {
    pub id: usize,
    /// The generating items.
    pub kernel: Vec<Item>,
    /// The kernel's closure.
    pub items: Vec<Item>,
    /// Shift/goto transitions, sorted by symbol.
    pub children: Vec<(SymbolRef, usize)>,
    pub reductions: Vec<Reduction>,
    pub conflicts: Vec<Conflict>,
}

impl State {
    /// The child reached on `symbol`, if any.
    #[must_use]
    pub fn child_on(&self, symbol: SymbolRef) -> Option<usize> {
        self.children
            .binary_search_by_key(&symbol, |&(s, _)| s)
            .ok()
            .map(|i| self.children[i].1)
    }

    /// Whether the state shifts on terminal `sid`.
    #[must_use]
    pub fn has_shift_on(&self, sid: Sid) -> bool {
        self.child_on(SymbolRef::Terminal(sid)).is_some()
    }

    fn reduction_on(&self, sid: Sid) -> Option<&Reduction> {
        self.reductions
            .iter()
            .find(|r| r.lookahead.is_none_or(|la| la == sid))
    }

    /// Terminals this state can act on: shifts plus reduction lookaheads.
    /// Drives the runtime's unexpected-token diagnostics.
    #[must_use]
    pub fn expected_terminals(&self, all_terminals: &[Sid]) -> TerminalSet {
        let mut expected = TerminalSet::new();
        for &(symbol, _) in &self.children {
            if let SymbolRef::Terminal(sid) = symbol {
                expected.insert(sid);
            }
        }
        for reduction in &self.reductions {
            match reduction.lookahead {
                Some(la) => {
                    expected.insert(la);
                }
                None => {
                    for &sid in all_terminals {
                        expected.insert(sid);
                    }
                }
            }
        }
        expected
    }
}

/// The full LR automaton: states identified by discovery order from the
/// axiom state (id 0), deduplicated by kernel.
#[derive(Debug, Clone)]
pub struct Graph {
    pub method: LrMethod,
    pub states: Vec<State>,
}

impl Graph {
    #[must_use]
    pub fn state(&self, id: usize) -> &State {
        &self.states[id]
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.states.iter().flat_map(|s| s.conflicts.iter())
    }

    #[must_use]
    pub fn unresolved_conflicts(&self) -> usize {
        self.conflicts().filter(|c| !c.is_resolved()).count()
    }

    /// Render every conflict through the reporter, in state order.
    pub fn report_conflicts(
        &self,
        grammar: &Grammar,
        rules: &RuleTable,
        reporter: &mut dyn Reporter,
    ) {
        for conflict in self.conflicts() {
            let kind = match conflict.kind {
                ConflictKind::ShiftReduce => "shift/reduce",
                ConflictKind::ReduceReduce => "reduce/reduce",
            };
            let lookahead = conflict.lookahead.map_or_else(
                || "any terminal".into(),
                |la| grammar.symbol_name(SymbolRef::Terminal(la)),
            );
            let items = conflict
                .items
                .iter()
                .map(|item| describe_item(grammar, rules, item))
                .collect::<Vec<_>>()
                .join("; ");
            let status = if conflict.is_resolved() {
                " (resolved by priority)"
            } else {
                ""
            };
            let mut message = format!(
                "{kind} conflict in state {} on {lookahead}{status}: {items}",
                conflict.state
            );
            if let Some(example) = conflict.examples.first() {
                let tokens = example
                    .iter()
                    .map(|&sid| grammar.symbol_name(SymbolRef::Terminal(sid)).to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                message.push_str(&format!("; example input: {tokens}"));
            }
            if conflict.is_resolved() {
                reporter.warn("lr", message);
            } else {
                reporter.error("lr", message);
            }
        }
    }
}

/// Human-readable `head -> α · β` rendering of an item.
#[must_use]
pub fn describe_item(grammar: &Grammar, rules: &RuleTable, item: &Item) -> String {
    let rule = rules.rule(item.rule);
    let head = if rule.grammar_rule.is_none() {
        "<axiom>".to_string()
    } else {
        grammar.symbol_name(SymbolRef::Variable(rule.head)).to_string()
    };
    let mut parts: Vec<String> = Vec::with_capacity(rule.syms.len() + 1);
    for (i, &sym) in rule.syms.iter().enumerate() {
        if i == item.position {
            parts.push("·".to_string());
        }
        parts.push(grammar.symbol_name(sym).to_string());
    }
    if item.position >= rule.syms.len() {
        parts.push("·".to_string());
    }
    format!("{head} -> {}", parts.join(" "))
}

/// Build the canonical LR(0) graph.
#[must_use]
pub fn build_lr0(rules: &RuleTable) -> Graph {
    let initial = vec![Item::new(rules.axiom_rule, 0, TerminalSet::new())];
    let mut graph = build_states(rules, initial, LrMethod::Lr0, |kernel| {
        closure_lr0(rules, kernel)
    });
    for state in &mut graph.states {
        build_reductions_lr0(state, rules);
    }
    graph
}

/// Build the canonical LR(1) graph: states are distinguished by both their
/// item cores *and* lookahead sets, which is what makes these tables larger
/// than LALR(1) ones.
#[must_use]
pub fn build_lr1(grammar: &Grammar, rules: &RuleTable, firsts: &Firsts) -> Graph {
    let initial = vec![Item::new(rules.axiom_rule, 0, TerminalSet::dollar())];
    let mut graph = build_states(rules, initial, LrMethod::Lr1, |kernel| {
        closure_lr1(rules, firsts, kernel)
    });
    for state in &mut graph.states {
        build_reductions_lookahead(state, rules, grammar);
    }
    graph
}

/// Shared worklist construction: expand kernels into closures, group items
/// by next symbol, deduplicate child kernels, assign ids in discovery order.
pub(super) fn build_states(
    rules: &RuleTable,
    initial_kernel: Vec<Item>,
    method: LrMethod,
    closure: impl Fn(&[Item]) -> Vec<Item>,
) -> Graph {
    let mut states: Vec<State> = Vec::new();
    let mut ids: HashMap<Vec<Item>, usize, ahash::RandomState> =
        HashMap::with_hasher(ahash::RandomState::new());

    let kernel = normalize_items(initial_kernel);
    ids.insert(kernel.clone(), 0);
    states.push(State {
        id: 0,
        items: closure(&kernel),
        kernel,
        children: Vec::new(),
        reductions: Vec::new(),
        conflicts: Vec::new(),
    });

    let mut next = 0;
    while next < states.len() {
        let id = next;
        next += 1;

        // Group advanced items by the symbol crossed, keeping first-seen
        // order for reproducible discovery ids.
        let mut order: Vec<SymbolRef> = Vec::new();
        let mut grouped: HashMap<SymbolRef, Vec<Item>, ahash::RandomState> =
            HashMap::with_hasher(ahash::RandomState::new());
        for item in &states[id].items {
            if let Some(symbol) = item.next_symbol(rules) {
                if !grouped.contains_key(&symbol) {
                    order.push(symbol);
                }
                grouped.entry(symbol).or_default().push(item.advanced());
            }
        }

        let mut children = Vec::with_capacity(order.len());
        for symbol in order {
            let child_kernel = normalize_items(grouped.remove(&symbol).unwrap_or_default());
            let child_id = match ids.get(&child_kernel) {
                Some(&existing) => existing,
                None => {
                    let new_id = states.len();
                    ids.insert(child_kernel.clone(), new_id);
                    states.push(State {
                        id: new_id,
                        items: closure(&child_kernel),
                        kernel: child_kernel,
                        children: Vec::new(),
                        reductions: Vec::new(),
                        conflicts: Vec::new(),
                    });
                    new_id
                }
            };
            children.push((symbol, child_id));
        }
        children.sort_by_key(|&(symbol, _)| symbol);
        states[id].children = children;
    }

    Graph { method, states }
}

/// LR(0) reduction table: a reduction applies on every lookahead, so any
/// coexisting terminal shift is a shift/reduce conflict and any second
/// reduction a reduce/reduce conflict.
fn build_reductions_lr0(state: &mut State, rules: &RuleTable) {
    let reduce_items: Vec<Item> = state
        .items
        .iter()
        .filter(|i| i.is_reduction(rules))
        .cloned()
        .collect();
    let shift_items: Vec<Item> = state
        .items
        .iter()
        .filter(|i| matches!(i.next_symbol(rules), Some(SymbolRef::Terminal(_))))
        .cloned()
        .collect();

    if !reduce_items.is_empty() && !shift_items.is_empty() {
        let mut items = reduce_items.clone();
        items.extend(shift_items);
        state.conflicts.push(Conflict {
            state: state.id,
            kind: ConflictKind::ShiftReduce,
            lookahead: None,
            items,
            resolution: None,
            examples: Vec::new(),
        });
    }
    if reduce_items.len() > 1 {
        state.conflicts.push(Conflict {
            state: state.id,
            kind: ConflictKind::ReduceReduce,
            lookahead: None,
            items: reduce_items.clone(),
            resolution: None,
            examples: Vec::new(),
        });
    }
    for item in reduce_items {
        state.reductions.push(Reduction {
            lookahead: None,
            rule: item.rule,
        });
    }
}

/// LR(1)/LALR(1) reduction table: reductions apply per lookahead terminal;
/// conflicts are detected per terminal and resolved by declared priorities
/// when both sides carry one.
pub(super) fn build_reductions_lookahead(state: &mut State, rules: &RuleTable, grammar: &Grammar) {
    let reduce_items: Vec<Item> = state
        .items
        .iter()
        .filter(|i| i.is_reduction(rules))
        .cloned()
        .collect();

    for item in &reduce_items {
        let rule_priority = rules.rule(item.rule).priority;
        for lookahead in item.lookaheads.iter() {
            if state.has_shift_on(lookahead) {
                let terminal_priority = grammar
                    .terminal(lookahead)
                    .and_then(|t| t.priority);
                let resolution = match (rule_priority, terminal_priority) {
                    (Some(rp), Some(tp)) if rp > tp => Some(Resolution::Reduce(item.rule)),
                    (Some(_), Some(_)) => Some(Resolution::Shift),
                    _ => None,
                };
                let mut items = vec![item.clone()];
                items.extend(
                    state
                        .items
                        .iter()
                        .filter(|i| {
                            i.next_symbol(rules) == Some(SymbolRef::Terminal(lookahead))
                        })
                        .cloned(),
                );
                state.conflicts.push(Conflict {
                    state: state.id,
                    kind: ConflictKind::ShiftReduce,
                    lookahead: Some(lookahead),
                    items,
                    resolution,
                    examples: Vec::new(),
                });
                if matches!(resolution, Some(Resolution::Shift)) {
                    continue;
                }
                state.reductions.push(Reduction {
                    lookahead: Some(lookahead),
                    rule: item.rule,
                });
            } else if let Some(existing) = state.reduction_on(lookahead).copied() {
                if existing.rule == item.rule {
                    continue;
                }
                let other_priority = rules.rule(existing.rule).priority;
                let resolution = match (rule_priority, other_priority) {
                    (Some(rp), Some(op)) if rp > op => Some(Resolution::Reduce(item.rule)),
                    (Some(rp), Some(op)) if op > rp => Some(Resolution::Reduce(existing.rule)),
                    _ => None,
                };
                let other_item = reduce_items
                    .iter()
                    .find(|i| i.rule == existing.rule)
                    .cloned();
                let mut items = vec![item.clone()];
                items.extend(other_item);
                state.conflicts.push(Conflict {
                    state: state.id,
                    kind: ConflictKind::ReduceReduce,
                    lookahead: Some(lookahead),
                    items,
                    resolution,
                    examples: Vec::new(),
                });
                match resolution {
                    Some(Resolution::Reduce(winner)) if winner == item.rule => {
                        // Replace the loser for this lookahead.
                        if let Some(slot) = state
                            .reductions
                            .iter_mut()
                            .find(|r| r.lookahead == Some(lookahead))
                        {
                            slot.rule = item.rule;
                        }
                    }
                    Some(_) => {}
                    None => {
                        // Unresolved: keep both so the generalized parser
                        // can explore them.
                        state.reductions.push(Reduction {
                            lookahead: Some(lookahead),
                            rule: item.rule,
                        });
                    }
                }
            } else {
                state.reductions.push(Reduction {
                    lookahead: Some(lookahead),
                    rule: item.rule,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automata::Nfa;
    use crate::grammar::RuleBody;
    use crate::lr::item::Firsts;

    /// e -> e PLUS t | t ; t -> A
    fn arith() -> (Grammar, RuleTable) {
        let mut grammar = Grammar::new("arith");
        let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
        let plus = grammar.add_terminal_named("PLUS", "+", Nfa::from_char('+'));
        let e = grammar.add_variable("e");
        let t = grammar.add_variable("t");
        grammar.add_rule(
            e,
            RuleBody::from_symbols(&[
                SymbolRef::Variable(e),
                SymbolRef::Terminal(plus),
                SymbolRef::Variable(t),
            ]),
        );
        grammar.add_rule(e, RuleBody::single(SymbolRef::Variable(t)));
        grammar.add_rule(t, RuleBody::single(SymbolRef::Terminal(a)));
        grammar.add_option(Grammar::OPTION_AXIOM, "e");
        let rules = RuleTable::new(&grammar).unwrap();
        (grammar, rules)
    }

    #[test]
    fn lr1_graph_is_deterministic_for_arith() {
        let (grammar, rules) = arith();
        let firsts = Firsts::compute(&rules);
        let graph = build_lr1(&grammar, &rules, &firsts);
        assert_eq!(graph.unresolved_conflicts(), 0);
        // Two runs produce identical state counts and transitions.
        let again = build_lr1(&grammar, &rules, &firsts);
        assert_eq!(graph.states.len(), again.states.len());
        for (a, b) in graph.states.iter().zip(&again.states) {
            assert_eq!(a.children, b.children);
            assert_eq!(a.reductions, b.reductions);
        }
    }

    #[test]
    fn lr0_detects_shift_reduce_on_dangling_else_shape() {
        // s -> A | A B : after A, LR(0) both reduces and shifts B.
        let mut grammar = Grammar::new("sr");
        let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
        let b = grammar.add_terminal_named("B", "b", Nfa::from_char('b'));
        let s = grammar.add_variable("s");
        grammar.add_rule(s, RuleBody::single(SymbolRef::Terminal(a)));
        grammar.add_rule(
            s,
            RuleBody::from_symbols(&[SymbolRef::Terminal(a), SymbolRef::Terminal(b)]),
        );
        grammar.add_option(Grammar::OPTION_AXIOM, "s");
        let rules = RuleTable::new(&grammar).unwrap();

        let graph = build_lr0(&rules);
        assert!(graph.conflicts().any(|c| c.kind == ConflictKind::ShiftReduce));

        // LR(1) distinguishes the lookaheads: no conflict.
        let firsts = Firsts::compute(&rules);
        let lr1 = build_lr1(&grammar, &rules, &firsts);
        assert_eq!(lr1.unresolved_conflicts(), 0);
    }

    #[test]
    fn reduce_reduce_conflict_is_reported_not_thrown() {
        // s -> x | y ; x -> A ; y -> A
        let mut grammar = Grammar::new("rr");
        let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
        let s = grammar.add_variable("s");
        let x = grammar.add_variable("x");
        let y = grammar.add_variable("y");
        grammar.add_rule(s, RuleBody::single(SymbolRef::Variable(x)));
        grammar.add_rule(s, RuleBody::single(SymbolRef::Variable(y)));
        grammar.add_rule(x, RuleBody::single(SymbolRef::Terminal(a)));
        grammar.add_rule(y, RuleBody::single(SymbolRef::Terminal(a)));
        grammar.add_option(Grammar::OPTION_AXIOM, "s");
        let rules = RuleTable::new(&grammar).unwrap();
        let firsts = Firsts::compute(&rules);
        let graph = build_lr1(&grammar, &rules, &firsts);
        assert!(graph
            .conflicts()
            .any(|c| c.kind == ConflictKind::ReduceReduce && !c.is_resolved()));
        assert!(graph.unresolved_conflicts() > 0);
    }

    #[test]
    fn priorities_resolve_reduce_reduce() {
        let mut grammar = Grammar::new("rr");
        let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
        let s = grammar.add_variable("s");
        let x = grammar.add_variable("x");
        let y = grammar.add_variable("y");
        grammar.add_rule(s, RuleBody::single(SymbolRef::Variable(x)));
        grammar.add_rule(s, RuleBody::single(SymbolRef::Variable(y)));
        let rx = grammar.add_rule(x, RuleBody::single(SymbolRef::Terminal(a)));
        let ry = grammar.add_rule(y, RuleBody::single(SymbolRef::Terminal(a)));
        grammar.set_rule_priority(rx, 10);
        grammar.set_rule_priority(ry, 1);
        grammar.add_option(Grammar::OPTION_AXIOM, "s");
        let rules = RuleTable::new(&grammar).unwrap();
        let firsts = Firsts::compute(&rules);
        let graph = build_lr1(&grammar, &rules, &firsts);
        assert_eq!(graph.unresolved_conflicts(), 0);
        assert!(graph.conflicts().any(Conflict::is_resolved));
    }
}
