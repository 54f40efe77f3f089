//! Generalized simulation over an LR graph for conflict analysis.
//!
//! Given a graph with conflicts, the [`Simulator`] explores how each
//! competing action could play out on the contested lookahead by forking an
//! internal stack representation: an inverse-transition index answers "which
//! states could have led here via symbol X" without rescanning the graph,
//! and reductions are replayed backwards over every such path before
//! checking whether the resulting configuration can consume the lookahead.
//! The table generator uses the verdicts to discard actions that can never
//! succeed, and the conflict reporter uses the companion sample builder to
//! attach concrete counter-example inputs to what remains.

use super::graph::{Conflict, Graph, Resolution};
use super::item::{RuleTable, SID_AXIOM};
use crate::grammar::{RuleId, SID_DOLLAR, Sid, SymbolRef};
use hashbrown::HashMap;

/// Reverse index of a graph's transitions: for every state, the `(symbol,
/// predecessor)` pairs that lead into it. Built once per analysis.
#[derive(Debug)]
pub struct InverseGraph {
    incoming: Vec<Vec<(SymbolRef, usize)>>,
}

impl InverseGraph {
    #[must_use]
    pub fn new(graph: &Graph) -> Self {
        let mut incoming: Vec<Vec<(SymbolRef, usize)>> = vec![Vec::new(); graph.states.len()];
        for state in &graph.states {
            for &(symbol, child) in &state.children {
                incoming[child].push((symbol, state.id));
            }
        }
        for edges in &mut incoming {
            edges.sort_unstable();
        }
        Self { incoming }
    }

    /// Predecessors of `state` over `symbol`.
    pub fn predecessors_on(
        &self,
        state: usize,
        symbol: SymbolRef,
    ) -> impl Iterator<Item = usize> + '_ {
        self.incoming[state]
            .iter()
            .filter(move |&&(s, _)| s == symbol)
            .map(|&(_, p)| p)
    }
}

/// A stack-fork simulator over one LR graph.
pub struct Simulator<'a> {
    graph: &'a Graph,
    rules: &'a RuleTable,
    inverse: InverseGraph,
}

impl<'a> Simulator<'a> {
    #[must_use]
    pub fn new(graph: &'a Graph, rules: &'a RuleTable) -> Self {
        Self {
            graph,
            rules,
            inverse: InverseGraph::new(graph),
        }
    }

    /// All states from which `state` is reachable by shifting `syms` in
    /// order: the possible stack contexts below a reduction of that body.
    fn origins(&self, state: usize, syms: &[SymbolRef]) -> Vec<usize> {
        let mut current = vec![state];
        for &symbol in syms.iter().rev() {
            let mut previous: Vec<usize> = Vec::new();
            for &s in &current {
                for p in self.inverse.predecessors_on(s, symbol) {
                    if !previous.contains(&p) {
                        previous.push(p);
                    }
                }
            }
            current = previous;
            if current.is_empty() {
                break;
            }
        }
        current.sort_unstable();
        current
    }

    /// Whether some stack context lets the automaton at `state` consume
    /// `lookahead`: either a direct shift, or a chain of reductions (each
    /// explored over every possible origin path) ending in one.
    #[must_use]
    pub fn can_consume(&self, state: usize, lookahead: Sid) -> bool {
        let mut visited = vec![false; self.graph.states.len()];
        let mut stack = vec![state];
        visited[state] = true;
        while let Some(current) = stack.pop() {
            let node = &self.graph.states[current];
            if node.has_shift_on(lookahead) {
                return true;
            }
            for reduction in &node.reductions {
                if !reduction.lookahead.is_none_or(|la| la == lookahead) {
                    continue;
                }
                let rule = self.rules.rule(reduction.rule);
                if rule.head == SID_AXIOM {
                    // Accepting consumes exactly the end sentinel.
                    if lookahead == SID_DOLLAR {
                        return true;
                    }
                    continue;
                }
                for origin in self.origins(current, &rule.syms) {
                    if let Some(goto) =
                        self.graph.states[origin].child_on(SymbolRef::Variable(rule.head))
                        && !visited[goto]
                    {
                        visited[goto] = true;
                        stack.push(goto);
                    }
                }
            }
        }
        false
    }

    /// Whether reducing `rule` at `state` can lead to a configuration that
    /// consumes `lookahead`.
    #[must_use]
    pub fn test_reduction(&self, state: usize, rule: RuleId, lookahead: Sid) -> bool {
        let compiled = self.rules.rule(rule);
        if compiled.head == SID_AXIOM {
            return lookahead == SID_DOLLAR;
        }
        for origin in self.origins(state, &compiled.syms) {
            if let Some(goto) = self.graph.states[origin].child_on(SymbolRef::Variable(compiled.head))
                && self.can_consume(goto, lookahead)
            {
                return true;
            }
        }
        false
    }

    /// The actions of `conflict` that simulation cannot rule out on the
    /// contested lookahead. A conflict whose lookahead is unknown (LR(0))
    /// keeps all its actions.
    #[must_use]
    pub fn viable_actions(&self, conflict: &Conflict) -> Vec<Resolution> {
        let Some(lookahead) = conflict.lookahead else {
            return Vec::new();
        };
        let mut viable = Vec::new();
        if self.graph.states[conflict.state].has_shift_on(lookahead) {
            viable.push(Resolution::Shift);
        }
        for item in &conflict.items {
            if item.is_reduction(self.rules)
                && self.test_reduction(conflict.state, item.rule, lookahead)
                && !viable.contains(&Resolution::Reduce(item.rule))
            {
                viable.push(Resolution::Reduce(item.rule));
            }
        }
        viable
    }
}

/// Analyze a graph's conflicts: discard actions simulation proves dead
/// (marking the conflict resolved when a single action survives) and attach
/// a counter-example input to every conflict that remains contested.
pub fn analyze_conflicts(graph: &mut Graph, rules: &RuleTable) {
    let samples = shortest_samples(rules);
    let paths = shortest_paths(graph);

    let mut verdicts: Vec<(usize, usize, Option<Resolution>, Vec<Vec<Sid>>)> = Vec::new();
    {
        let simulator = Simulator::new(graph, rules);
        for (state_id, state) in graph.states.iter().enumerate() {
            for (conflict_id, conflict) in state.conflicts.iter().enumerate() {
                if conflict.is_resolved() {
                    continue;
                }
                let viable = simulator.viable_actions(conflict);
                let resolution = match viable.as_slice() {
                    [single] => Some(*single),
                    _ => None,
                };
                let examples = conflict_examples(conflict, &samples, &paths, state_id);
                verdicts.push((state_id, conflict_id, resolution, examples));
            }
        }
    }

    for (state_id, conflict_id, resolution, examples) in verdicts {
        let conflict = &mut graph.states[state_id].conflicts[conflict_id];
        if let Some(resolution) = resolution {
            conflict.resolution = Some(resolution);
        }
        conflict.examples = examples;
    }
}

/// Shortest terminal derivation per variable, by fixed point over the rule
/// table. Variables with no terminating derivation get no sample.
fn shortest_samples(rules: &RuleTable) -> HashMap<Sid, Vec<Sid>, ahash::RandomState> {
    let mut samples: HashMap<Sid, Vec<Sid>, ahash::RandomState> =
        HashMap::with_hasher(ahash::RandomState::new());
    loop {
        let mut changed = false;
        for rule in &rules.rules {
            let mut candidate: Vec<Sid> = Vec::new();
            let mut complete = true;
            for &symbol in &rule.syms {
                match symbol {
                    SymbolRef::Terminal(sid) => candidate.push(sid),
                    SymbolRef::Variable(sid) => match samples.get(&sid) {
                        Some(sample) => candidate.extend(sample),
                        None => {
                            complete = false;
                            break;
                        }
                    },
                    _ => {}
                }
            }
            if !complete {
                continue;
            }
            let better = samples
                .get(&rule.head)
                .is_none_or(|existing| candidate.len() < existing.len());
            if better {
                samples.insert(rule.head, candidate);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    samples
}

/// Shortest symbol path from the axiom state to every state, by BFS.
fn shortest_paths(graph: &Graph) -> Vec<Option<(usize, SymbolRef)>> {
    let mut parents: Vec<Option<(usize, SymbolRef)>> = vec![None; graph.states.len()];
    let mut visited = vec![false; graph.states.len()];
    visited[0] = true;
    let mut queue = std::collections::VecDeque::from([0usize]);
    while let Some(state) = queue.pop_front() {
        for &(symbol, child) in &graph.states[state].children {
            if !visited[child] {
                visited[child] = true;
                parents[child] = Some((state, symbol));
                queue.push_back(child);
            }
        }
    }
    parents
}

/// One sample token sequence reaching `state` and then hitting the
/// conflict's lookahead.
fn conflict_examples(
    conflict: &Conflict,
    samples: &HashMap<Sid, Vec<Sid>, ahash::RandomState>,
    parents: &[Option<(usize, SymbolRef)>],
    state: usize,
) -> Vec<Vec<Sid>> {
    let mut symbols: Vec<SymbolRef> = Vec::new();
    let mut current = state;
    while let Some((parent, symbol)) = parents[current] {
        symbols.push(symbol);
        current = parent;
    }
    if current != 0 {
        return Vec::new();
    }
    symbols.reverse();

    let mut tokens: Vec<Sid> = Vec::new();
    for symbol in symbols {
        match symbol {
            SymbolRef::Terminal(sid) => tokens.push(sid),
            SymbolRef::Variable(sid) => match samples.get(&sid) {
                Some(sample) => tokens.extend(sample),
                None => return Vec::new(),
            },
            _ => {}
        }
    }
    if let Some(lookahead) = conflict.lookahead
        && lookahead != SID_DOLLAR
    {
        tokens.push(lookahead);
    }
    vec![tokens]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automata::Nfa;
    use crate::grammar::{Grammar, RuleBody};
    use crate::lr::graph::{ConflictKind, build_lr1};
    use crate::lr::item::Firsts;

    /// s -> x | y ; x -> A ; y -> A B: the two reductions on A are only
    /// separated one token later.
    fn ambiguous() -> (Grammar, RuleTable) {
        let mut grammar = Grammar::new("amb");
        let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
        let b = grammar.add_terminal_named("B", "b", Nfa::from_char('b'));
        let s = grammar.add_variable("s");
        let x = grammar.add_variable("x");
        let y = grammar.add_variable("y");
        grammar.add_rule(s, RuleBody::single(SymbolRef::Variable(x)));
        grammar.add_rule(
            s,
            RuleBody::from_symbols(&[SymbolRef::Variable(y), SymbolRef::Terminal(b)]),
        );
        grammar.add_rule(x, RuleBody::single(SymbolRef::Terminal(a)));
        grammar.add_rule(y, RuleBody::single(SymbolRef::Terminal(a)));
        grammar.add_option(Grammar::OPTION_AXIOM, "s");
        let rules = RuleTable::new(&grammar).unwrap();
        (grammar, rules)
    }

    #[test]
    fn inverse_graph_answers_predecessor_queries() {
        let (grammar, rules) = ambiguous();
        let firsts = Firsts::compute(&rules);
        let graph = build_lr1(&grammar, &rules, &firsts);
        let inverse = InverseGraph::new(&graph);
        let a = grammar.terminal_by_name("A").unwrap();
        // Exactly one state is reached on shifting A, from the axiom state.
        let mut found = 0;
        for state in &graph.states {
            let preds: Vec<usize> = inverse
                .predecessors_on(state.id, SymbolRef::Terminal(a))
                .collect();
            if !preds.is_empty() {
                assert_eq!(preds, vec![0]);
                found += 1;
            }
        }
        assert_eq!(found, 1);
    }

    #[test]
    fn simulation_keeps_only_viable_reductions() {
        let (grammar, rules) = ambiguous();
        let firsts = Firsts::compute(&rules);
        let mut graph = build_lr1(&grammar, &rules, &firsts);
        // x -> A· reduces on $, y -> A· reduces on B: LR(1) already splits
        // them, so the grammar is conflict-free here.
        assert_eq!(graph.unresolved_conflicts(), 0);

        // Force a reduce/reduce regime by checking the simulator directly:
        // reducing y -> A can consume B, reducing x -> A can only reach $.
        let simulator = Simulator::new(&graph, &rules);
        let b = grammar.terminal_by_name("B").unwrap();
        let state_after_a = graph.states[0]
            .child_on(SymbolRef::Terminal(grammar.terminal_by_name("A").unwrap()))
            .unwrap();
        let x_rule = 2;
        let y_rule = 3;
        assert!(!simulator.test_reduction(state_after_a, x_rule, b));
        assert!(simulator.test_reduction(state_after_a, y_rule, b));
        assert!(simulator.test_reduction(state_after_a, x_rule, SID_DOLLAR));

        analyze_conflicts(&mut graph, &rules);
    }

    #[test]
    fn conflicts_get_counter_examples() {
        // Ambiguous grammar: s -> s s | A (shift/reduce on A).
        let mut grammar = Grammar::new("ss");
        let a = grammar.add_terminal_named("A", "a", Nfa::from_char('a'));
        let s = grammar.add_variable("s");
        grammar.add_rule(
            s,
            RuleBody::from_symbols(&[SymbolRef::Variable(s), SymbolRef::Variable(s)]),
        );
        grammar.add_rule(s, RuleBody::single(SymbolRef::Terminal(a)));
        grammar.add_option(Grammar::OPTION_AXIOM, "s");
        let rules = RuleTable::new(&grammar).unwrap();
        let firsts = Firsts::compute(&rules);
        let mut graph = build_lr1(&grammar, &rules, &firsts);
        assert!(graph.unresolved_conflicts() > 0);

        analyze_conflicts(&mut graph, &rules);
        let with_example = graph
            .conflicts()
            .find(|c| !c.is_resolved() && !c.examples.is_empty())
            .expect("a contested conflict with an example");
        assert_eq!(with_example.kind, ConflictKind::ShiftReduce);
        assert!(with_example.examples[0].iter().all(|&sid| sid == a));
    }
}
