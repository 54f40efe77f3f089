//! LR items, lookahead sets and closure computation.

use crate::grammar::{Grammar, Rule, RuleId, Sid, SymbolRef, SID_DOLLAR};
use hashbrown::HashMap;
use smallvec::SmallVec;

/// An ordered set of lookahead terminal ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TerminalSet(SmallVec<[Sid; 4]>);

impl TerminalSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dollar() -> Self {
        let mut set = Self::new();
        set.insert(SID_DOLLAR);
        set
    }

    #[must_use]
    pub fn of(sid: Sid) -> Self {
        let mut set = Self::new();
        set.insert(sid);
        set
    }

    /// Insert `sid`, returning whether the set changed.
    pub fn insert(&mut self, sid: Sid) -> bool {
        match self.0.binary_search(&sid) {
            Ok(_) => false,
            Err(at) => {
                self.0.insert(at, sid);
                true
            }
        }
    }

    /// Union `other` into this set, returning whether the set changed.
    pub fn union(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for &sid in &other.0 {
            changed |= self.insert(sid);
        }
        changed
    }

    #[must_use]
    pub fn contains(&self, sid: Sid) -> bool {
        self.0.binary_search(&sid).is_ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Sid> + '_ {
        self.0.iter().copied()
    }
}

/// A rule compiled for automaton construction: the head and the body's
/// *transition* symbols (terminals and variables only; virtual and action
/// symbols decorate the tree but never label an LR edge).
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Index of the source rule in the grammar, `None` for the synthetic
    /// axiom rule.
    pub grammar_rule: Option<RuleId>,
    pub head: Sid,
    pub syms: Vec<SymbolRef>,
    pub priority: Option<u32>,
}

/// The rule table automaton construction runs on: every grammar rule under
/// its grammar id, plus the augmented axiom rule `S' -> S` at the end.
#[derive(Debug, Clone)]
pub struct RuleTable {
    pub rules: Vec<CompiledRule>,
    pub axiom_rule: RuleId,
    pub axiom_variable: Sid,
}

/// Pseudo-id of the augmented axiom head; never a real symbol.
pub const SID_AXIOM: Sid = 0;

impl RuleTable {
    /// Compile `grammar`'s rules. The grammar must already be free of EBNF
    /// operators (expansion happens at ingestion).
    ///
    /// # Errors
    ///
    /// Propagates [`crate::error::GrammarError::NoAxiom`] from the grammar.
    pub fn new(grammar: &Grammar) -> Result<Self, crate::error::GrammarError> {
        let axiom_variable = grammar.axiom()?;
        let mut rules: Vec<CompiledRule> = grammar
            .rules()
            .iter()
            .enumerate()
            .map(|(id, rule)| Self::compile(id, rule))
            .collect();
        let axiom_rule = rules.len();
        rules.push(CompiledRule {
            grammar_rule: None,
            head: SID_AXIOM,
            syms: vec![SymbolRef::Variable(axiom_variable)],
            priority: None,
        });
        Ok(Self {
            rules,
            axiom_rule,
            axiom_variable,
        })
    }

    fn compile(id: RuleId, rule: &Rule) -> CompiledRule {
        CompiledRule {
            grammar_rule: Some(id),
            head: rule.head,
            syms: rule
                .body
                .elements
                .iter()
                .map(|e| e.symbol)
                .filter(|s| matches!(s, SymbolRef::Terminal(_) | SymbolRef::Variable(_)))
                .collect(),
            priority: rule.priority,
        }
    }

    #[must_use]
    pub fn rule(&self, id: RuleId) -> &CompiledRule {
        &self.rules[id]
    }

    /// Ids of the rules headed by `variable`.
    pub fn rules_of(&self, variable: Sid) -> impl Iterator<Item = RuleId> + '_ {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.head == variable)
            .map(|(id, _)| id)
    }
}

/// FIRST sets and nullability, computed once per rule table by fixed point.
#[derive(Debug, Clone)]
pub struct Firsts {
    first: HashMap<Sid, TerminalSet, ahash::RandomState>,
    nullable: HashMap<Sid, bool, ahash::RandomState>,
}

impl Firsts {
    #[must_use]
    pub fn compute(rules: &RuleTable) -> Self {
        let mut firsts = Self {
            first: HashMap::with_hasher(ahash::RandomState::new()),
            nullable: HashMap::with_hasher(ahash::RandomState::new()),
        };
        loop {
            let mut changed = false;
            for rule in &rules.rules {
                let mut prefix_nullable = true;
                let mut gained = TerminalSet::new();
                for &sym in &rule.syms {
                    match sym {
                        SymbolRef::Terminal(sid) => {
                            gained.insert(sid);
                            prefix_nullable = false;
                        }
                        SymbolRef::Dollar => {
                            gained.insert(SID_DOLLAR);
                            prefix_nullable = false;
                        }
                        SymbolRef::Variable(sid) => {
                            if let Some(sub) = firsts.first.get(&sid) {
                                let sub = sub.clone();
                                gained.union(&sub);
                            }
                            if !firsts.is_nullable(sid) {
                                prefix_nullable = false;
                            }
                        }
                        SymbolRef::Epsilon | SymbolRef::Virtual(_) | SymbolRef::Action(_) => {}
                    }
                    if !prefix_nullable {
                        break;
                    }
                }
                let entry = firsts.first.entry(rule.head).or_default();
                changed |= entry.union(&gained);
                if prefix_nullable {
                    let slot = firsts.nullable.entry(rule.head).or_insert(false);
                    if !*slot {
                        *slot = true;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        firsts
    }

    #[must_use]
    pub fn is_nullable(&self, variable: Sid) -> bool {
        self.nullable.get(&variable).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn first_of(&self, variable: Sid) -> TerminalSet {
        self.first.get(&variable).cloned().unwrap_or_default()
    }

    /// FIRST of a symbol sequence followed by `tail` lookaheads: the
    /// lookahead composition used by the LR(1) closure.
    #[must_use]
    pub fn first_of_sequence(&self, syms: &[SymbolRef], tail: &TerminalSet) -> TerminalSet {
        let mut result = TerminalSet::new();
        for &sym in syms {
            match sym {
                SymbolRef::Terminal(sid) => {
                    result.insert(sid);
                    return result;
                }
                SymbolRef::Dollar => {
                    result.insert(SID_DOLLAR);
                    return result;
                }
                SymbolRef::Variable(sid) => {
                    result.union(&self.first_of(sid));
                    if !self.is_nullable(sid) {
                        return result;
                    }
                }
                SymbolRef::Epsilon | SymbolRef::Virtual(_) | SymbolRef::Action(_) => {}
            }
        }
        result.union(tail);
        result
    }
}

/// An LR item: a rule, a dot position over its transition symbols, and a
/// lookahead set (empty in LR(0) items). The derived action is `Reduce`
/// when the dot sits at the end of the body, `Shift` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    pub rule: RuleId,
    pub position: usize,
    pub lookaheads: TerminalSet,
}

impl Item {
    #[must_use]
    pub const fn new(rule: RuleId, position: usize, lookaheads: TerminalSet) -> Self {
        Self {
            rule,
            position,
            lookaheads,
        }
    }

    /// Base equality: same rule and dot position, lookaheads ignored.
    #[must_use]
    pub fn same_base(&self, other: &Self) -> bool {
        self.rule == other.rule && self.position == other.position
    }

    /// The symbol after the dot, `None` when the item is a reduction.
    #[must_use]
    pub fn next_symbol(&self, rules: &RuleTable) -> Option<SymbolRef> {
        rules.rule(self.rule).syms.get(self.position).copied()
    }

    #[must_use]
    pub fn is_reduction(&self, rules: &RuleTable) -> bool {
        self.position >= rules.rule(self.rule).syms.len()
    }

    /// The item with the dot advanced over one symbol.
    #[must_use]
    pub fn advanced(&self) -> Self {
        Self {
            rule: self.rule,
            position: self.position + 1,
            lookaheads: self.lookaheads.clone(),
        }
    }
}

/// Normalize a set of items: merge lookaheads of same-base items and sort
/// by (rule, position) so kernels compare and hash deterministically.
#[must_use]
pub fn normalize_items(items: Vec<Item>) -> Vec<Item> {
    let mut merged: Vec<Item> = Vec::with_capacity(items.len());
    for item in items {
        match merged.iter_mut().find(|m| m.same_base(&item)) {
            Some(existing) => {
                existing.lookaheads.union(&item.lookaheads);
            }
            None => merged.push(item),
        }
    }
    merged.sort_by(|a, b| a.rule.cmp(&b.rule).then(a.position.cmp(&b.position)));
    merged
}

/// LR(0) closure: kernel items plus `[B -> . γ]` for every production of a
/// variable that follows a dot. Lookaheads stay empty.
#[must_use]
pub fn closure_lr0(rules: &RuleTable, kernel: &[Item]) -> Vec<Item> {
    let mut items: Vec<Item> = kernel.to_vec();
    let mut index = 0;
    while index < items.len() {
        if let Some(SymbolRef::Variable(variable)) = items[index].next_symbol(rules) {
            for rule in rules.rules_of(variable) {
                if !items.iter().any(|i| i.rule == rule && i.position == 0) {
                    items.push(Item::new(rule, 0, TerminalSet::new()));
                }
            }
        }
        index += 1;
    }
    items
}

/// LR(1) closure: for an item `[A -> α . B β, L]` and every production
/// `B -> γ`, add `[B -> . γ, FIRST(β L)]`, merging lookaheads into items
/// already present and iterating to a fixed point so merged lookaheads
/// keep flowing into their own children.
#[must_use]
pub fn closure_lr1(rules: &RuleTable, firsts: &Firsts, kernel: &[Item]) -> Vec<Item> {
    let mut items: Vec<Item> = normalize_items(kernel.to_vec());
    loop {
        let mut changed = false;
        let mut index = 0;
        while index < items.len() {
            let item = items[index].clone();
            if let Some(SymbolRef::Variable(variable)) = item.next_symbol(rules) {
                let remainder = &rules.rule(item.rule).syms[item.position + 1..];
                let lookaheads = firsts.first_of_sequence(remainder, &item.lookaheads);
                for rule in rules.rules_of(variable) {
                    match items.iter_mut().find(|i| i.rule == rule && i.position == 0) {
                        Some(existing) => {
                            changed |= existing.lookaheads.union(&lookaheads);
                        }
                        None => {
                            items.push(Item::new(rule, 0, lookaheads.clone()));
                            changed = true;
                        }
                    }
                }
            }
            index += 1;
        }
        if !changed {
            break;
        }
    }
    items
}
