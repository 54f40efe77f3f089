//! Ambiguity-tolerant table-driven parser (RNGLR-style).
//!
//! The stack is a [`Gss`]: one generation per consumed token, one node per
//! automaton state alive in that generation, with as many predecessor edges
//! as there are surviving derivations. Per token, every applicable
//! reduction is executed to a fixed point before any shift builds the next
//! generation, since reductions can enable further reductions at the same
//! input position. Zero-length reductions replay the pre-built empty
//! derivation of their head instead of walking paths. Competing
//! derivations of one variable over one span merge into a single forest
//! node with multiple families; after acceptance one representative tree is
//! extracted from the forest.

use super::automaton::{LrAction, ParserAutomaton};
use super::gss::{Gss, GssNodeId};
use super::lexer::{Lexer, Token};
use super::parser::ParseOutcome;
use super::sppf::{Sppf, SppfId};
use crate::error::ParseError;
use crate::grammar::Sid;
use hashbrown::HashMap;

type NullableMap = HashMap<Sid, SppfId, ahash::RandomState>;
type MergeMap = HashMap<(Sid, GssNodeId), SppfId, ahash::RandomState>;

/// Parse the lexer's input, tolerating table conflicts by exploring every
/// action. Succeeds iff some final-generation stack top accepts once the
/// end sentinel is consumed.
#[must_use]
pub fn parse(automaton: &ParserAutomaton, lexer: &mut Lexer<'_>) -> ParseOutcome {
    let mut gss = Gss::new();
    let mut sppf = Sppf::new();
    let nullables = build_nullable(automaton, &mut sppf);

    gss.new_generation();
    let v0 = gss.create_node(0);

    let mut token = match lexer.next_token() {
        Ok(token) => token,
        Err(error) => return ParseOutcome::failure(Vec::new(), vec![error]),
    };

    loop {
        reduce_all(automaton, &mut gss, &mut sppf, &nullables, token.sid);

        if token.is_end() {
            for &node_id in gss.generation(gss.current_generation()) {
                let state = gss.node(node_id).state;
                if automaton.actions(state, token.sid).contains(&LrAction::Accept)
                    && let Some(root) = gss.edge_label(node_id, v0)
                {
                    let mut tree = sppf.extract(root, automaton);
                    tree.apply_actions();
                    return ParseOutcome {
                        tree: Some(tree),
                        errors: Vec::new(),
                        lex_errors: Vec::new(),
                    };
                }
            }
            return ParseOutcome::failure(vec![unexpected(automaton, lexer, &gss, &token)], Vec::new());
        }

        // Shifter: queue every shift, then build the next generation.
        let mut shifts: Vec<(GssNodeId, u32)> = Vec::new();
        for &node_id in gss.generation(gss.current_generation()) {
            let state = gss.node(node_id).state;
            for action in automaton.actions(state, token.sid) {
                if let LrAction::Shift(next) = *action {
                    shifts.push((node_id, next));
                }
            }
        }
        if shifts.is_empty() {
            return ParseOutcome::failure(vec![unexpected(automaton, lexer, &gss, &token)], Vec::new());
        }

        let leaf = sppf.add_token(token.clone());
        gss.new_generation();
        for (from, state) in shifts {
            let (target, _) = gss.find_or_create(state);
            gss.add_edge(target, from, leaf);
        }

        token = match lexer.next_token() {
            Ok(token) => token,
            Err(error) => return ParseOutcome::failure(Vec::new(), vec![error]),
        };
    }
}

/// Materialize the shared empty derivation of every nullable variable.
/// Entries arrive children-before-parents from the emitted tables.
fn build_nullable(automaton: &ParserAutomaton, sppf: &mut Sppf) -> NullableMap {
    let mut map: NullableMap = HashMap::with_hasher(ahash::RandomState::new());
    for entry in automaton.nullables() {
        let children: Option<Vec<SppfId>> = entry
            .children
            .iter()
            .map(|sid| map.get(sid).copied())
            .collect();
        let Some(children) = children else {
            continue;
        };
        let node = sppf.add_variable(entry.variable);
        sppf.add_family(node, entry.rule, children);
        map.insert(entry.variable, node);
    }
    map
}

/// Execute every reduction applicable on `lookahead` across the current
/// generation, repeating until a full pass creates no node, edge or
/// family. Draining reductions entirely before shifting is what lets a
/// reduction enable further reductions at the same input position.
fn reduce_all(
    automaton: &ParserAutomaton,
    gss: &mut Gss,
    sppf: &mut Sppf,
    nullables: &NullableMap,
    lookahead: Sid,
) {
    let mut merge: MergeMap = HashMap::with_hasher(ahash::RandomState::new());
    loop {
        let mut created = false;
        let nodes: Vec<GssNodeId> = gss.generation(gss.current_generation()).to_vec();
        for node_id in nodes {
            let state = gss.node(node_id).state;
            let actions: Vec<LrAction> = automaton.actions(state, lookahead).to_vec();
            for action in actions {
                if let LrAction::Reduce(rule_id) = action {
                    created |= execute_reduction(
                        automaton,
                        gss,
                        sppf,
                        nullables,
                        &mut merge,
                        node_id,
                        rule_id as usize,
                    );
                }
            }
        }
        if !created {
            break;
        }
    }
}

fn execute_reduction(
    automaton: &ParserAutomaton,
    gss: &mut Gss,
    sppf: &mut Sppf,
    nullables: &NullableMap,
    merge: &mut MergeMap,
    node_id: GssNodeId,
    rule_id: usize,
) -> bool {
    let rule = automaton.rule(rule_id);
    let head = rule.head;
    let length = rule.reduction_length;
    let mut created = false;

    if length == 0 {
        let Some(&label) = nullables.get(&head) else {
            return false;
        };
        let state = gss.node(node_id).state;
        let Some(goto) = automaton.goto(state, head) else {
            return false;
        };
        let (target, new_node) = gss.find_or_create(goto);
        created |= new_node;
        created |= gss.add_edge(target, node_id, label);
        return created;
    }

    for path in gss.paths(node_id, length) {
        let origin_state = gss.node(path.origin).state;
        let Some(goto) = automaton.goto(origin_state, head) else {
            continue;
        };
        let parent = match merge.get(&(head, path.origin)) {
            Some(&existing) => existing,
            None => {
                let fresh = sppf.add_variable(head);
                merge.insert((head, path.origin), fresh);
                fresh
            }
        };
        created |= sppf.add_family(parent, rule_id, path.labels);
        let (target, new_node) = gss.find_or_create(goto);
        created |= new_node;
        created |= gss.add_edge(target, path.origin, parent);
    }
    created
}

/// The failure diagnostic: every terminal some live stack top would have
/// accepted, gathered across the whole generation.
fn unexpected(
    automaton: &ParserAutomaton,
    lexer: &Lexer<'_>,
    gss: &Gss,
    token: &Token,
) -> ParseError {
    let mut expected: Vec<Sid> = Vec::new();
    for &node_id in gss.generation(gss.current_generation()) {
        for sid in automaton.expected_terminals(gss.node(node_id).state) {
            if !expected.contains(&sid) {
                expected.push(sid);
            }
        }
    }
    expected.sort_unstable();
    let expected: Vec<String> = expected
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
