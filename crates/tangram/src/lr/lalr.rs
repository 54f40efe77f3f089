//! LALR(1) construction over an LR(0) kernel graph.
//!
//! The graph is derived in four phases: build per-state kernels with empty
//! lookaheads, discover spontaneous lookaheads and propagation edges with
//! dummy-lookahead closures, run the propagation fixed point, then
//! materialize final states mirroring the LR(0) topology. Computing the
//! canonical LR(1) graph and merging same-core states afterwards is *not*
//! equivalent (it yields different automata and different conflict sets),
//! so the kernel-propagation form is the one implemented.

use super::graph::{Graph, LrMethod, State, build_reductions_lookahead, build_states};
use super::item::{Firsts, Item, RuleTable, TerminalSet, closure_lr0, closure_lr1, normalize_items};
use crate::grammar::{Grammar, Sid};

/// The dummy lookahead used to probe propagation; never a real terminal
/// (real symbol ids start after the sentinels).
const DUMMY: Sid = super::item::SID_AXIOM;

/// A propagation edge: lookaheads of the source kernel item flow into the
/// target kernel item. Addresses are `(state, kernel item index)`.
type PropagationEdge = ((usize, usize), (usize, usize));

/// Build the LALR(1) graph for `rules`.
#[must_use]
pub fn build_lalr1(grammar: &Grammar, rules: &RuleTable, firsts: &Firsts) -> Graph {
    let lr0 = build_states(
        rules,
        vec![Item::new(rules.axiom_rule, 0, TerminalSet::new())],
        LrMethod::Lr0,
        |kernel| closure_lr0(rules, kernel),
    );

    let mut kernels = build_kernels(&lr0);
    let table = build_propagation_table(&lr0, rules, firsts, &mut kernels);
    propagate(&mut kernels, &table);
    build_graph(grammar, rules, firsts, &lr0, kernels)
}

/// Phase 1: one kernel per LR(0) state, same core items, lookaheads empty
/// except the axiom state's, seeded with the end-of-input sentinel.
fn build_kernels(lr0: &Graph) -> Vec<Vec<Item>> {
    let mut kernels: Vec<Vec<Item>> = lr0
        .states
        .iter()
        .map(|state| {
            state
                .kernel
                .iter()
                .map(|item| Item::new(item.rule, item.position, TerminalSet::new()))
                .collect()
        })
        .collect();
    for item in &mut kernels[0] {
        item.lookaheads = TerminalSet::dollar();
    }
    kernels
}

/// Phase 2: for every non-reduction kernel item, close it with a unique
/// dummy lookahead. Where the dummy survives into an item crossing into a
/// child state, lookaheads propagate from parent to child along that edge;
/// where real terminals appear, the child item generates them spontaneously,
/// independent of the parent.
fn build_propagation_table(
    lr0: &Graph,
    rules: &RuleTable,
    firsts: &Firsts,
    kernels: &mut [Vec<Item>],
) -> Vec<PropagationEdge> {
    let mut table: Vec<PropagationEdge> = Vec::new();
    for state_id in 0..lr0.states.len() {
        let kernel_bases: Vec<(usize, usize)> = kernels[state_id]
            .iter()
            .map(|item| (item.rule, item.position))
            .collect();
        for (k, &(rule, position)) in kernel_bases.iter().enumerate() {
            let probe = Item::new(rule, position, TerminalSet::of(DUMMY));
            if probe.is_reduction(rules) {
                continue;
            }
            let closure = closure_lr1(rules, firsts, &[probe]);
            for closed in &closure {
                let Some(symbol) = closed.next_symbol(rules) else {
                    continue;
                };
                let Some(child) = lr0.states[state_id].child_on(symbol) else {
                    continue;
                };
                let Some(j) = kernels[child]
                    .iter()
                    .position(|i| i.rule == closed.rule && i.position == closed.position + 1)
                else {
                    continue;
                };
                for lookahead in closed.lookaheads.iter() {
                    if lookahead == DUMMY {
                        table.push(((state_id, k), (child, j)));
                    } else {
                        kernels[child][j].lookaheads.insert(lookahead);
                    }
                }
            }
        }
    }
    table.sort_unstable();
    table.dedup();
    table
}

/// Phase 3: apply the propagation table until a full pass adds nothing,
/// measured by the total lookahead count before and after.
fn propagate(kernels: &mut [Vec<Item>], table: &[PropagationEdge]) {
    loop {
        let before = lookahead_count(kernels);
        for &((source_state, source_item), (target_state, target_item)) in table {
            let lookaheads = kernels[source_state][source_item].lookaheads.clone();
            kernels[target_state][target_item].lookaheads.union(&lookaheads);
        }
        if lookahead_count(kernels) == before {
            break;
        }
    }
}

fn lookahead_count(kernels: &[Vec<Item>]) -> usize {
    kernels
        .iter()
        .flat_map(|kernel| kernel.iter())
        .map(|item| item.lookaheads.len())
        .sum()
}

/// Phase 4: close the propagated kernels into final states, mirror the
/// LR(0) transitions exactly (same topology, same ids, different lookahead
/// content) and build the LALR(1) reduction tables.
fn build_graph(
    grammar: &Grammar,
    rules: &RuleTable,
    firsts: &Firsts,
    lr0: &Graph,
    kernels: Vec<Vec<Item>>,
) -> Graph {
    let mut states: Vec<State> = kernels
        .into_iter()
        .enumerate()
        .map(|(id, kernel)| {
            let kernel = normalize_items(kernel);
            State {
                id,
                items: closure_lr1(rules, firsts, &kernel),
                kernel,
                children: lr0.states[id].children.clone(),
                reductions: Vec::new(),
                conflicts: Vec::new(),
            }
        })
        .collect();
    for state in &mut states {
        build_reductions_lookahead(state, rules, grammar);
    }
    Graph {
        method: LrMethod::Lalr1,
        states,
    }
}
