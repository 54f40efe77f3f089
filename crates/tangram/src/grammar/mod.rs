//! # Grammar Model
//!
//! Symbols, rules and options of a context-free grammar with
//! regular-expression terminals.
//!
//! ## Overview
//!
//! A [`Grammar`] owns four symbol registries (terminals, variables, virtual
//! symbols and semantic-action symbols) plus the rule table and a string
//! key/value option map. Every symbol gets a unique id ([`Sid`]) assigned
//! monotonically at creation; declaration order therefore doubles as lexical
//! priority (see [`crate::automata::dfa::DfaState::top_final`]).
//!
//! Ids `1` and `2` are reserved for the epsilon and end-of-input sentinels;
//! real symbols start at `3`.
//!
//! ## Ingestion surface
//!
//! A grammar front-end feeds an already-parsed description through
//! [`Grammar::add_terminal_named`], [`Grammar::add_terminal_anon`],
//! [`Grammar::add_variable`], [`Grammar::add_virtual`],
//! [`Grammar::add_action`], [`Grammar::add_rule`], [`Grammar::add_option`]
//! and [`Grammar::inherit`]. EBNF-style operators on rule bodies are
//! expanded through [`Grammar::body_optional`], [`Grammar::body_star`] and
//! [`Grammar::body_plus`] *before* automaton construction, so the rule table
//! handed to the LR builders is pure context-free.

pub mod rules;

pub use rules::{BodyElement, BodySet, Rule, RuleBody, RuleId, TreeAction};

use crate::automata::{FinalItem, Nfa};
use crate::context::ToolchainContext;
use crate::error::{GrammarError, Reporter};
use compact_str::CompactString;
use hashbrown::HashMap;

/// A symbol identifier, unique within a grammar across all symbol kinds.
pub type Sid = u32;

/// Reserved id of the epsilon sentinel.
pub const SID_EPSILON: Sid = 1;
/// Reserved id of the end-of-input (dollar) sentinel.
pub const SID_DOLLAR: Sid = 2;
/// First id handed to user symbols.
const SID_FIRST: Sid = 3;

/// A reference to a grammar symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum SymbolRef {
    Epsilon,
    Dollar,
    Terminal(Sid),
    Variable(Sid),
    Virtual(Sid),
    Action(Sid),
}

impl SymbolRef {
    #[must_use]
    pub const fn sid(self) -> Sid {
        match self {
            Self::Epsilon => SID_EPSILON,
            Self::Dollar => SID_DOLLAR,
            Self::Terminal(sid) | Self::Variable(sid) | Self::Virtual(sid) | Self::Action(sid) => {
                sid
            }
        }
    }

    /// Whether the symbol takes part in LR transitions (terminals and
    /// variables do; virtual and action symbols only decorate trees).
    #[must_use]
    pub const fn is_transition_symbol(self) -> bool {
        matches!(self, Self::Terminal(_) | Self::Variable(_) | Self::Dollar)
    }
}

/// A terminal symbol: a name, the literal it was declared with, and the
/// automaton recognizing it.
#[derive(Debug, Clone)]
pub struct Terminal {
    pub sid: Sid,
    pub name: CompactString,
    pub value: CompactString,
    pub nfa: Nfa,
    pub priority: Option<u32>,
}

/// A variable (nonterminal) symbol.
#[derive(Debug, Clone)]
pub struct Variable {
    pub sid: Sid,
    pub name: CompactString,
    /// Rules headed by this variable, in declaration order.
    pub rules: Vec<RuleId>,
}

/// A virtual symbol: appears in syntax trees without consuming input.
#[derive(Debug, Clone)]
pub struct VirtualSymbol {
    pub sid: Sid,
    pub name: CompactString,
}

/// A semantic-action symbol: triggers a callback at reduction time.
#[derive(Debug, Clone)]
pub struct ActionSymbol {
    pub sid: Sid,
    pub name: CompactString,
}

type NameMap = HashMap<CompactString, Sid, ahash::RandomState>;

fn new_name_map() -> NameMap {
    HashMap::with_hasher(ahash::RandomState::new())
}

/// A context-free grammar with regular-expression terminals.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub name: CompactString,
    options: HashMap<CompactString, CompactString, ahash::RandomState>,
    terminals: Vec<Terminal>,
    variables: Vec<Variable>,
    virtuals: Vec<VirtualSymbol>,
    actions: Vec<ActionSymbol>,
    rules: Vec<Rule>,
    terminals_by_name: NameMap,
    terminals_by_value: NameMap,
    variables_by_name: NameMap,
    virtuals_by_name: NameMap,
    actions_by_name: NameMap,
    next_sid: Sid,
}

impl Grammar {
    /// Option key naming the start variable.
    pub const OPTION_AXIOM: &'static str = "Axiom";
    /// Option key naming the terminal discarded between tokens.
    pub const OPTION_SEPARATOR: &'static str = "Separator";

    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: CompactString::from(name),
            options: HashMap::with_hasher(ahash::RandomState::new()),
            terminals: Vec::new(),
            variables: Vec::new(),
            virtuals: Vec::new(),
            actions: Vec::new(),
            rules: Vec::new(),
            terminals_by_name: new_name_map(),
            terminals_by_value: new_name_map(),
            variables_by_name: new_name_map(),
            virtuals_by_name: new_name_map(),
            actions_by_name: new_name_map(),
            next_sid: SID_FIRST,
        }
    }

    fn next_sid(&mut self) -> Sid {
        let sid = self.next_sid;
        self.next_sid += 1;
        sid
    }

    pub fn add_option(&mut self, key: &str, value: &str) {
        self.options
            .insert(CompactString::from(key), CompactString::from(value));
    }

    #[must_use]
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(CompactString::as_str)
    }

    /// The axiom variable named by the `Axiom` option.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::NoAxiom`] when the option is missing or names
    /// no known variable.
    pub fn axiom(&self) -> Result<Sid, GrammarError> {
        self.option(Self::OPTION_AXIOM)
            .and_then(|name| self.variables_by_name.get(name).copied())
            .ok_or(GrammarError::NoAxiom)
    }

    /// The separator terminal named by the `Separator` option, if any.
    #[must_use]
    pub fn separator(&self) -> Option<Sid> {
        self.option(Self::OPTION_SEPARATOR)
            .and_then(|name| self.terminals_by_name.get(name).copied())
    }

    /// Register a named terminal. Re-registering an existing name returns
    /// the existing symbol, leaving its definition untouched.
    pub fn add_terminal_named(&mut self, name: &str, value: &str, nfa: Nfa) -> Sid {
        if let Some(&sid) = self.terminals_by_name.get(name) {
            return sid;
        }
        self.insert_terminal(CompactString::from(name), CompactString::from(value), nfa)
    }

    /// Register an anonymous terminal (an inline literal), deduplicated by
    /// value. The name is generated from the context.
    pub fn add_terminal_anon(&mut self, ctx: &mut ToolchainContext, value: &str, nfa: Nfa) -> Sid {
        if let Some(&sid) = self.terminals_by_value.get(value) {
            return sid;
        }
        let name = ctx.generated_name("_t");
        self.insert_terminal(name, CompactString::from(value), nfa)
    }

    fn insert_terminal(&mut self, name: CompactString, value: CompactString, mut nfa: Nfa) -> Sid {
        let sid = self.next_sid();
        nfa.set_exit_final(FinalItem::Terminal(sid));
        self.terminals_by_name.insert(name.clone(), sid);
        self.terminals_by_value.insert(value.clone(), sid);
        self.terminals.push(Terminal {
            sid,
            name,
            value,
            nfa,
            priority: None,
        });
        sid
    }

    /// A clone of a named terminal's automaton, for fragment reuse inside
    /// other terminal definitions.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::UnknownSymbol`] for an unknown name; callers
    /// substitute [`Nfa::epsilon`] after reporting so construction can
    /// continue.
    pub fn terminal_nfa(&self, name: &str) -> Result<Nfa, GrammarError> {
        let terminal = self
            .terminals_by_name
            .get(name)
            .copied()
            .and_then(|sid| self.terminal(sid))
            .ok_or_else(|| GrammarError::UnknownSymbol {
                name: CompactString::from(name),
            })?;
        let mut nfa = terminal.nfa.clone();
        // The fragment must not carry the source terminal's acceptance.
        nfa.clear_all_finals();
        Ok(nfa)
    }

    pub fn set_terminal_priority(&mut self, sid: Sid, priority: u32) {
        if let Some(terminal) = self.terminal_mut(sid) {
            terminal.priority = Some(priority);
        }
    }

    pub fn add_variable(&mut self, name: &str) -> Sid {
        if let Some(&sid) = self.variables_by_name.get(name) {
            return sid;
        }
        let sid = self.next_sid();
        self.variables_by_name.insert(CompactString::from(name), sid);
        self.variables.push(Variable {
            sid,
            name: CompactString::from(name),
            rules: Vec::new(),
        });
        sid
    }

    pub fn add_virtual(&mut self, name: &str) -> Sid {
        if let Some(&sid) = self.virtuals_by_name.get(name) {
            return sid;
        }
        let sid = self.next_sid();
        self.virtuals_by_name.insert(CompactString::from(name), sid);
        self.virtuals.push(VirtualSymbol {
            sid,
            name: CompactString::from(name),
        });
        sid
    }

    pub fn add_action(&mut self, name: &str) -> Sid {
        if let Some(&sid) = self.actions_by_name.get(name) {
            return sid;
        }
        let sid = self.next_sid();
        self.actions_by_name.insert(CompactString::from(name), sid);
        self.actions.push(ActionSymbol {
            sid,
            name: CompactString::from(name),
        });
        sid
    }

    /// Add a rule `head -> body`. Identical rules are deduplicated.
    pub fn add_rule(&mut self, head: Sid, body: RuleBody) -> RuleId {
        let candidate = Rule::new(head, body);
        if let Some(existing) = self
            .rules
            .iter()
            .position(|r| r.head == candidate.head && r.body == candidate.body)
        {
            return existing;
        }
        let id = self.rules.len();
        self.rules.push(candidate);
        if let Some(variable) = self.variable_mut(head) {
            variable.rules.push(id);
        }
        id
    }

    /// Add every body of `set` as a rule of `head`.
    pub fn add_rules(&mut self, head: Sid, set: BodySet) -> Vec<RuleId> {
        set.bodies
            .into_iter()
            .map(|body| self.add_rule(head, body))
            .collect()
    }

    pub fn set_rule_priority(&mut self, id: RuleId, priority: u32) {
        if let Some(rule) = self.rules.get_mut(id) {
            rule.priority = Some(priority);
        }
    }

    /// `set?`: the set itself plus the epsilon alternative.
    #[must_use]
    pub fn body_optional(set: BodySet) -> BodySet {
        set.union(BodySet::epsilon())
    }

    /// `set*`: a synthetic left-recursive variable plus an epsilon
    /// alternative at the usage site. The synthetic references carry
    /// [`TreeAction::Replace`] so list nodes flatten away after parsing.
    pub fn body_star(&mut self, ctx: &mut ToolchainContext, set: BodySet) -> BodySet {
        let variable = self.list_variable(ctx, set);
        Self::body_optional(BodySet::single(RuleBody {
            elements: vec![BodyElement::with_action(
                SymbolRef::Variable(variable),
                TreeAction::Replace,
            )],
        }))
    }

    /// `set+`: a synthetic left-recursive variable, at least one occurrence.
    pub fn body_plus(&mut self, ctx: &mut ToolchainContext, set: BodySet) -> BodySet {
        let variable = self.list_variable(ctx, set);
        BodySet::single(RuleBody {
            elements: vec![BodyElement::with_action(
                SymbolRef::Variable(variable),
                TreeAction::Replace,
            )],
        })
    }

    /// Create the synthetic variable `v` with rules `v -> v b | b` for every
    /// body `b` of `set`.
    fn list_variable(&mut self, ctx: &mut ToolchainContext, set: BodySet) -> Sid {
        let name = ctx.generated_name("_gen_v");
        let variable = self.add_variable(&name);
        let recursive = BodyElement::with_action(SymbolRef::Variable(variable), TreeAction::Replace);
        for body in set.bodies {
            let mut looped = RuleBody {
                elements: vec![recursive],
            };
            looped.elements.extend(body.elements.iter().copied());
            for rule_body in [looped, body] {
                let id = self.add_rule(variable, rule_body);
                self.rules[id].generated = true;
            }
        }
        variable
    }

    /// Clone the parent grammar's terminals, virtual symbols and semantic
    /// actions (not its rules) into this grammar, realizing grammar
    /// composition. Symbols whose names already exist here are skipped.
    pub fn inherit(&mut self, parent: &Self) {
        for terminal in &parent.terminals {
            if !self.terminals_by_name.contains_key(terminal.name.as_str()) {
                let mut nfa = terminal.nfa.clone();
                nfa.clear_all_finals();
                let sid =
                    self.insert_terminal(terminal.name.clone(), terminal.value.clone(), nfa);
                if let Some(priority) = terminal.priority {
                    self.set_terminal_priority(sid, priority);
                }
            }
        }
        for virtual_symbol in &parent.virtuals {
            self.add_virtual(&virtual_symbol.name);
        }
        for action in &parent.actions {
            self.add_action(&action.name);
        }
    }

    #[must_use]
    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    #[must_use]
    pub fn virtuals(&self) -> &[VirtualSymbol] {
        &self.virtuals
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    #[must_use]
    pub fn terminal(&self, sid: Sid) -> Option<&Terminal> {
        self.terminals
            .binary_search_by_key(&sid, |t| t.sid)
            .ok()
            .map(|i| &self.terminals[i])
    }

    fn terminal_mut(&mut self, sid: Sid) -> Option<&mut Terminal> {
        self.terminals
            .binary_search_by_key(&sid, |t| t.sid)
            .ok()
            .map(|i| &mut self.terminals[i])
    }

    #[must_use]
    pub fn variable(&self, sid: Sid) -> Option<&Variable> {
        self.variables
            .binary_search_by_key(&sid, |v| v.sid)
            .ok()
            .map(|i| &self.variables[i])
    }

    fn variable_mut(&mut self, sid: Sid) -> Option<&mut Variable> {
        self.variables
            .binary_search_by_key(&sid, |v| v.sid)
            .ok()
            .map(|i| &mut self.variables[i])
    }

    #[must_use]
    pub fn variable_by_name(&self, name: &str) -> Option<Sid> {
        self.variables_by_name.get(name).copied()
    }

    #[must_use]
    pub fn terminal_by_name(&self, name: &str) -> Option<Sid> {
        self.terminals_by_name.get(name).copied()
    }

    /// Human-readable name of any symbol, for diagnostics.
    #[must_use]
    pub fn symbol_name(&self, symbol: SymbolRef) -> CompactString {
        match symbol {
            SymbolRef::Epsilon => CompactString::from("ε"),
            SymbolRef::Dollar => CompactString::from("$"),
            SymbolRef::Terminal(sid) => self
                .terminal(sid)
                .map_or_else(|| CompactString::from("?"), |t| t.name.clone()),
            SymbolRef::Variable(sid) => self
                .variable(sid)
                .map_or_else(|| CompactString::from("?"), |v| v.name.clone()),
            SymbolRef::Virtual(sid) => self
                .virtuals
                .iter()
                .find(|v| v.sid == sid)
                .map_or_else(|| CompactString::from("?"), |v| v.name.clone()),
            SymbolRef::Action(sid) => self
                .actions
                .iter()
                .find(|a| a.sid == sid)
                .map_or_else(|| CompactString::from("?"), |a| a.name.clone()),
        }
    }

    /// Check structural soundness before automaton construction: every
    /// variable referenced by a rule body must have at least one rule, and
    /// every variable should be reachable from the axiom. Problems go to
    /// the reporter; only the axiom's absence is fatal for the caller.
    pub fn validate(&self, reporter: &mut dyn Reporter) -> Result<(), GrammarError> {
        let axiom = self.axiom();
        if axiom.is_err() {
            reporter.error("grammar", "no axiom variable is defined".to_string());
        }

        for rule in &self.rules {
            for element in &rule.body.elements {
                if let SymbolRef::Variable(sid) = element.symbol {
                    let defined = self.variable(sid).is_some_and(|v| !v.rules.is_empty());
                    if !defined {
                        reporter.error(
                            "grammar",
                            format!(
                                "variable `{}` is referenced but has no rules",
                                self.symbol_name(element.symbol)
                            ),
                        );
                    }
                }
            }
        }

        if let Ok(axiom) = axiom {
            let mut reachable: Vec<Sid> = vec![axiom];
            let mut index = 0;
            while index < reachable.len() {
                let current = reachable[index];
                index += 1;
                if let Some(variable) = self.variable(current) {
                    for &rule_id in &variable.rules {
                        for element in &self.rules[rule_id].body.elements {
                            if let SymbolRef::Variable(sid) = element.symbol
                                && !reachable.contains(&sid)
                            {
                                reachable.push(sid);
                            }
                        }
                    }
                }
            }
            for variable in &self.variables {
                if !reachable.contains(&variable.sid) {
                    reporter.warn(
                        "grammar",
                        format!("variable `{}` is unreachable from the axiom", variable.name),
                    );
                }
            }
        }

        axiom.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectingReporter;

    fn char_terminal(grammar: &mut Grammar, name: &str, c: char) -> Sid {
        grammar.add_terminal_named(name, &c.to_string(), Nfa::from_char(c))
    }

    #[test]
    fn sids_are_monotone_and_start_after_sentinels() {
        let mut grammar = Grammar::new("test");
        let a = char_terminal(&mut grammar, "A", 'a');
        let e = grammar.add_variable("e");
        let v = grammar.add_virtual("marker");
        assert_eq!(a, 3);
        assert_eq!(e, 4);
        assert_eq!(v, 5);
    }

    #[test]
    fn terminals_deduplicate_by_name_and_value() {
        let mut ctx = ToolchainContext::new();
        let mut grammar = Grammar::new("test");
        let a1 = char_terminal(&mut grammar, "A", 'a');
        let a2 = char_terminal(&mut grammar, "A", 'a');
        assert_eq!(a1, a2);
        let anon1 = grammar.add_terminal_anon(&mut ctx, "+", Nfa::from_char('+'));
        let anon2 = grammar.add_terminal_anon(&mut ctx, "+", Nfa::from_char('+'));
        assert_eq!(anon1, anon2);
        assert_eq!(grammar.terminals().len(), 2);
    }

    #[test]
    fn rules_deduplicate() {
        let mut grammar = Grammar::new("test");
        let a = char_terminal(&mut grammar, "A", 'a');
        let e = grammar.add_variable("e");
        let r1 = grammar.add_rule(e, RuleBody::single(SymbolRef::Terminal(a)));
        let r2 = grammar.add_rule(e, RuleBody::single(SymbolRef::Terminal(a)));
        assert_eq!(r1, r2);
        assert_eq!(grammar.rules().len(), 1);
    }

    #[test]
    fn star_expansion_creates_a_left_recursive_list() {
        let mut ctx = ToolchainContext::new();
        let mut grammar = Grammar::new("test");
        let a = char_terminal(&mut grammar, "A", 'a');
        let e = grammar.add_variable("e");
        let set = grammar.body_star(&mut ctx, BodySet::of_symbol(SymbolRef::Terminal(a)));
        grammar.add_rules(e, set);

        // e -> v | ε, v -> v A | A
        let e_rules = grammar.variable(e).unwrap().rules.len();
        assert_eq!(e_rules, 2);
        let list = grammar
            .variables()
            .iter()
            .find(|v| v.name.starts_with("_gen_v"))
            .expect("synthetic variable");
        assert_eq!(list.rules.len(), 2);
        let recursive = grammar.rule(list.rules[0]);
        assert_eq!(recursive.body.len(), 2);
        assert!(recursive.generated);
        assert_eq!(
            recursive.body.elements[0].action,
            TreeAction::Replace
        );
    }

    #[test]
    fn inherit_clones_terminals_but_not_rules() {
        let mut parent = Grammar::new("parent");
        let a = char_terminal(&mut parent, "A", 'a');
        let e = parent.add_variable("e");
        parent.add_virtual("mark");
        parent.add_rule(e, RuleBody::single(SymbolRef::Terminal(a)));

        let mut child = Grammar::new("child");
        child.inherit(&parent);
        assert!(child.terminal_by_name("A").is_some());
        assert!(child.virtuals().iter().any(|v| v.name == "mark"));
        assert!(child.rules().is_empty());
        assert!(child.variable_by_name("e").is_none());
    }

    #[test]
    fn validation_reports_undefined_variables() {
        let mut grammar = Grammar::new("test");
        let e = grammar.add_variable("e");
        let ghost = grammar.add_variable("ghost");
        grammar.add_rule(e, RuleBody::single(SymbolRef::Variable(ghost)));
        grammar.add_option(Grammar::OPTION_AXIOM, "e");

        let mut reporter = CollectingReporter::new();
        let result = grammar.validate(&mut reporter);
        assert!(result.is_ok());
        assert!(reporter.has_errors());
    }
}
