//! # LR Automaton Construction
//!
//! Bottom-up parser construction: LR items and closures, the shift/reduce
//! state graph, lookahead computation for the three table methods, and
//! conflict analysis.
//!
//! ## Overview
//!
//! - [`item`] - items, lookahead sets, FIRST sets and closures
//! - [`graph`] - states, transitions, reduction tables, conflicts,
//!   [`graph::build_lr0`] and [`graph::build_lr1`]
//! - [`lalr`] - LALR(1) via lookahead propagation over the LR(0) kernel
//!   graph
//! - [`simulator`] - generalized stack simulation used to discard dead
//!   conflict actions and produce counter-example inputs
//!
//! [`build`] ties the phases together: validate, compile the rule table,
//! construct the graph for the requested method, analyze conflicts, report.
//! Conflicts never abort construction; the whole grammar's diagnostics are
//! produced in one pass and emission is refused afterwards instead (see
//! [`crate::runtime::automaton::ParserAutomaton::emit`]).

pub mod graph;
pub mod item;
pub mod lalr;
pub mod simulator;

pub use graph::{Conflict, ConflictKind, Graph, LrMethod, Reduction, Resolution, State};
pub use item::{CompiledRule, Firsts, Item, RuleTable, TerminalSet};
pub use simulator::{InverseGraph, Simulator, analyze_conflicts};

use crate::error::{GrammarError, Reporter};
use crate::grammar::Grammar;

/// Build the LR automaton for `grammar` with the requested method.
///
/// Validation problems and conflicts are reported through `reporter`;
/// conflicts are additionally kept as data on the returned graph's states.
///
/// # Errors
///
/// Returns a [`GrammarError`] when the grammar has no axiom; all other
/// problems are diagnostics, not errors.
pub fn build(
    grammar: &Grammar,
    method: LrMethod,
    reporter: &mut dyn Reporter,
) -> Result<(Graph, RuleTable), GrammarError> {
    grammar.validate(reporter)?;
    let rules = RuleTable::new(grammar)?;
    let firsts = Firsts::compute(&rules);
    let mut graph = match method {
        LrMethod::Lr0 => graph::build_lr0(&rules),
        LrMethod::Lr1 => graph::build_lr1(grammar, &rules, &firsts),
        LrMethod::Lalr1 => lalr::build_lalr1(grammar, &rules, &firsts),
    };
    analyze_conflicts(&mut graph, &rules);
    graph.report_conflicts(grammar, &rules, reporter);
    Ok((graph, rules))
}
