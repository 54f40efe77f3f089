//! Nondeterministic finite automata and the regex operator algebra.
//!
//! States live in an arena (`Vec`) owned by their [`Nfa`]; transitions refer
//! to states by index, so a transition can never point outside the owning
//! automaton. Operators consume their operands: reusing a fragment in two
//! places requires an explicit `clone()`, which is what rules out the silent
//! transition-aliasing bugs a shared-reference design invites.

use super::dfa::Dfa;
use super::{CharSpan, FinalItem, HIGH_SURROGATES, LOW_SURROGATES, complement_spans};
use crate::error::GrammarError;
use smallvec::SmallVec;

/// A state of an [`Nfa`].
#[derive(Debug, Clone, Default)]
pub struct NfaState {
    /// Outgoing transitions; [`CharSpan::NULL`] labels epsilon edges.
    pub transitions: SmallVec<[(CharSpan, usize); 4]>,
    /// Accepting markers carried by this state.
    pub finals: Vec<FinalItem>,
    /// Transient positive/negative tag used by the difference operator.
    pub mark: i8,
}

/// A nondeterministic finite automaton with designated entry and exit.
#[derive(Debug, Clone)]
pub struct Nfa {
    states: Vec<NfaState>,
    entry: usize,
    exit: usize,
}

impl Nfa {
    /// An automaton with fresh entry and exit states and no transitions.
    /// It accepts nothing until the two are connected.
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: vec![NfaState::default(), NfaState::default()],
            entry: 0,
            exit: 1,
        }
    }

    /// The automaton accepting exactly the empty word. Also serves as the
    /// placeholder for terminals whose definition failed to build, so that
    /// construction can continue and report further errors.
    #[must_use]
    pub fn epsilon() -> Self {
        let mut nfa = Self::new();
        nfa.add_epsilon(nfa.entry, nfa.exit);
        nfa
    }

    /// The automaton accepting exactly the units in `span`.
    #[must_use]
    pub fn from_span(span: CharSpan) -> Self {
        let mut nfa = Self::new();
        nfa.add_transition(nfa.entry, span, nfa.exit);
        nfa
    }

    #[must_use]
    pub fn from_unit(unit: u16) -> Self {
        Self::from_span(CharSpan::single(unit))
    }

    /// The automaton accepting exactly `c`. Code points beyond the BMP
    /// become two chained single-unit transitions through a fresh state.
    #[must_use]
    pub fn from_char(c: char) -> Self {
        let mut units = [0u16; 2];
        let encoded = c.encode_utf16(&mut units);
        let mut nfa = Self::new();
        if encoded.len() == 1 {
            nfa.add_transition(nfa.entry, CharSpan::single(encoded[0]), nfa.exit);
        } else {
            let mid = nfa.add_state();
            nfa.add_transition(nfa.entry, CharSpan::single(encoded[0]), mid);
            nfa.add_transition(mid, CharSpan::single(encoded[1]), nfa.exit);
        }
        nfa
    }

    /// The automaton accepting exactly `text`.
    #[must_use]
    pub fn from_str(text: &str) -> Self {
        let mut nfa = Self::new();
        let mut current = nfa.entry;
        let units: Vec<u16> = text.encode_utf16().collect();
        for (i, &unit) in units.iter().enumerate() {
            let next = if i + 1 == units.len() {
                nfa.exit
            } else {
                nfa.add_state()
            };
            nfa.add_transition(current, CharSpan::single(unit), next);
            current = next;
        }
        if units.is_empty() {
            nfa.add_epsilon(nfa.entry, nfa.exit);
        }
        nfa
    }

    /// The automaton accepting any single unit in one of `spans`.
    #[must_use]
    pub fn from_class(spans: &[CharSpan]) -> Self {
        let mut nfa = Self::new();
        for &span in spans {
            if !span.is_empty() {
                nfa.add_transition(nfa.entry, span, nfa.exit);
            }
        }
        nfa
    }

    /// The automaton accepting any single *code point* not covered by
    /// `spans`: the BMP complement (surrogates excluded) plus the two-unit
    /// surrogate-pair chain covering every astral code point.
    #[must_use]
    pub fn from_negated_class(spans: &[CharSpan]) -> Self {
        let mut nfa = Self::from_class(&complement_spans(spans));
        let mid = nfa.add_state();
        nfa.add_transition(nfa.entry, HIGH_SURROGATES, mid);
        nfa.add_transition(mid, LOW_SURROGATES, nfa.exit);
        nfa
    }

    #[must_use]
    pub const fn entry(&self) -> usize {
        self.entry
    }

    #[must_use]
    pub const fn exit(&self) -> usize {
        self.exit
    }

    #[must_use]
    pub fn states(&self) -> &[NfaState] {
        &self.states
    }

    #[must_use]
    pub fn state(&self, id: usize) -> &NfaState {
        &self.states[id]
    }

    pub fn add_state(&mut self) -> usize {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    pub fn add_transition(&mut self, from: usize, span: CharSpan, to: usize) {
        self.states[from].transitions.push((span, to));
    }

    pub fn add_epsilon(&mut self, from: usize, to: usize) {
        self.add_transition(from, CharSpan::NULL, to);
    }

    /// Mark the exit state as accepting `item`.
    pub fn set_exit_final(&mut self, item: FinalItem) {
        self.states[self.exit].finals.push(item);
    }

    /// Strip every accepting marker, turning the automaton back into a
    /// plain fragment.
    pub fn clear_all_finals(&mut self) {
        for state in &mut self.states {
            state.finals.clear();
        }
    }

    /// Import all of `other`'s states, returning its entry and exit under
    /// their new indices. Internal transitions are remapped wholesale.
    pub fn insert(&mut self, other: Self) -> (usize, usize) {
        let shift = self.states.len();
        for mut state in other.states {
            for (_, target) in &mut state.transitions {
                *target += shift;
            }
            self.states.push(state);
        }
        (other.entry + shift, other.exit + shift)
    }

    /// `sub?`
    #[must_use]
    pub fn optional(sub: Self) -> Self {
        let mut nfa = Self::new();
        let (entry, exit) = nfa.insert(sub);
        nfa.add_epsilon(nfa.entry, entry);
        nfa.add_epsilon(nfa.entry, nfa.exit);
        nfa.add_epsilon(exit, nfa.exit);
        nfa
    }

    /// `sub*`
    #[must_use]
    pub fn star(sub: Self) -> Self {
        let mut nfa = Self::new();
        let (entry, exit) = nfa.insert(sub);
        nfa.add_epsilon(nfa.entry, entry);
        nfa.add_epsilon(nfa.entry, nfa.exit);
        nfa.add_epsilon(exit, nfa.exit);
        nfa.add_epsilon(nfa.exit, entry);
        nfa
    }

    /// `sub+`
    #[must_use]
    pub fn plus(sub: Self) -> Self {
        let mut nfa = Self::new();
        let (entry, exit) = nfa.insert(sub);
        nfa.add_epsilon(nfa.entry, entry);
        nfa.add_epsilon(exit, nfa.exit);
        nfa.add_epsilon(nfa.exit, entry);
        nfa
    }

    /// `sub{min,max}`: `min` mandatory copies followed by `max - min`
    /// optional ones.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::InvalidRepetition`] when `min > max`.
    pub fn repeat(sub: &Self, min: u32, max: u32) -> Result<Self, GrammarError> {
        if min > max {
            return Err(GrammarError::InvalidRepetition { min, max });
        }
        let mut nfa = Self::new();
        let mut last = nfa.entry;
        for _ in 0..min {
            let (entry, exit) = nfa.insert(sub.clone());
            nfa.add_epsilon(last, entry);
            last = exit;
        }
        for _ in min..max {
            let (entry, exit) = nfa.insert(sub.clone());
            nfa.add_epsilon(last, entry);
            let skip_target = nfa.exit;
            nfa.add_epsilon(last, skip_target);
            last = exit;
        }
        let exit = nfa.exit;
        nfa.add_epsilon(last, exit);
        Ok(nfa)
    }

    /// `left right`
    #[must_use]
    pub fn concat(left: Self, right: Self) -> Self {
        let mut nfa = left;
        let (right_entry, right_exit) = nfa.insert(right);
        let left_exit = nfa.exit;
        nfa.add_epsilon(left_exit, right_entry);
        nfa.exit = right_exit;
        nfa
    }

    /// `left | right`
    #[must_use]
    pub fn union(left: Self, right: Self) -> Self {
        let mut nfa = Self::new();
        let (left_entry, left_exit) = nfa.insert(left);
        let (right_entry, right_exit) = nfa.insert(right);
        nfa.add_epsilon(nfa.entry, left_entry);
        nfa.add_epsilon(nfa.entry, right_entry);
        nfa.add_epsilon(left_exit, nfa.exit);
        nfa.add_epsilon(right_exit, nfa.exit);
        nfa
    }

    /// `left - right`: the words of `left` that are not words of `right`.
    ///
    /// Regular-language subtraction has no direct NFA construction, so this
    /// is the one operator that round-trips through determinization: both
    /// operands are merged with positive/negative marks, the union is
    /// determinized, negative-marked subset states lose their acceptance,
    /// dead states are pruned, and the surviving machine is folded back
    /// into an NFA fragment.
    #[must_use]
    pub fn difference(left: Self, right: Self) -> Self {
        let mut combined = Self::new();
        let (left_entry, left_exit) = combined.insert(left);
        let (right_entry, right_exit) = combined.insert(right);
        combined.add_epsilon(combined.entry, left_entry);
        combined.add_epsilon(combined.entry, right_entry);
        combined.states[left_exit].finals.push(FinalItem::Dummy);
        combined.states[left_exit].mark = 1;
        combined.states[right_exit].mark = -1;

        let mut dfa = Dfa::from_nfa(&combined);
        for state in dfa.states_mut() {
            if state.mark < 0 {
                state.clear_finals();
            }
        }
        dfa.prune();
        Self::from_dfa(&dfa)
    }

    /// Fold a DFA back into an NFA fragment: same states and transitions,
    /// with accepting states wired by epsilon to a fresh exit. Final
    /// markers and marks are dropped.
    #[must_use]
    pub fn from_dfa(dfa: &Dfa) -> Self {
        let mut nfa = Self {
            states: Vec::with_capacity(dfa.states().len() + 1),
            entry: 0,
            exit: 0,
        };
        for dfa_state in dfa.states() {
            let mut state = NfaState::default();
            for &(span, target) in dfa_state.transitions() {
                state.transitions.push((span, target));
            }
            nfa.states.push(state);
        }
        if nfa.states.is_empty() {
            nfa.states.push(NfaState::default());
        }
        let exit = nfa.add_state();
        nfa.exit = exit;
        for (id, dfa_state) in dfa.states().iter().enumerate() {
            if !dfa_state.finals().is_empty() {
                nfa.add_epsilon(id, exit);
            }
        }
        nfa
    }

    /// All states reachable from `seeds` through epsilon transitions,
    /// sorted by index.
    #[must_use]
    pub fn epsilon_closure(&self, seeds: &[usize]) -> Vec<usize> {
        let mut closure: Vec<usize> = seeds.to_vec();
        let mut stack: Vec<usize> = seeds.to_vec();
        while let Some(id) = stack.pop() {
            for &(span, target) in &self.states[id].transitions {
                if span.is_empty() && !closure.contains(&target) {
                    closure.push(target);
                    stack.push(target);
                }
            }
        }
        closure.sort_unstable();
        closure.dedup();
        closure
    }

    /// Whether this automaton accepts `text` in full. A state accepts when
    /// it carries a final marker or is the designated exit. Intended for
    /// diagnostics and tests; the runtime lexer drives the determinized
    /// form instead.
    #[must_use]
    pub fn recognizes(&self, text: &str) -> bool {
        let mut current = self.epsilon_closure(&[self.entry]);
        for unit in text.encode_utf16() {
            let mut targets = Vec::new();
            for &id in &current {
                for &(span, target) in &self.states[id].transitions {
                    if span.contains(unit) {
                        targets.push(target);
                    }
                }
            }
            if targets.is_empty() {
                return false;
            }
            current = self.epsilon_closure(&targets);
        }
        current
            .iter()
            .any(|&id| id == self.exit || !self.states[id].finals.is_empty())
    }
}

impl Default for Nfa {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_concat() {
        let ab = Nfa::concat(Nfa::from_char('a'), Nfa::from_char('b'));
        assert!(ab.recognizes("ab"));
        assert!(!ab.recognizes("a"));
        assert!(!ab.recognizes("abb"));
    }

    #[test]
    fn option_star_plus() {
        let opt = Nfa::optional(Nfa::from_char('a'));
        assert!(opt.recognizes(""));
        assert!(opt.recognizes("a"));
        assert!(!opt.recognizes("aa"));

        let star = Nfa::star(Nfa::from_char('a'));
        assert!(star.recognizes(""));
        assert!(star.recognizes("aaaa"));

        let plus = Nfa::plus(Nfa::from_char('a'));
        assert!(!plus.recognizes(""));
        assert!(plus.recognizes("a"));
        assert!(plus.recognizes("aaa"));
    }

    #[test]
    fn bounded_repetition() {
        let nfa = Nfa::repeat(&Nfa::from_char('x'), 2, 4).unwrap();
        assert!(!nfa.recognizes("x"));
        assert!(nfa.recognizes("xx"));
        assert!(nfa.recognizes("xxxx"));
        assert!(!nfa.recognizes("xxxxx"));
    }

    #[test]
    fn repetition_with_zero_minimum_accepts_empty() {
        let nfa = Nfa::repeat(&Nfa::from_char('x'), 0, 2).unwrap();
        assert!(nfa.recognizes(""));
        assert!(nfa.recognizes("xx"));
        assert!(!nfa.recognizes("xxx"));
    }

    #[test]
    fn repetition_rejects_inverted_range() {
        assert!(matches!(
            Nfa::repeat(&Nfa::from_char('x'), 3, 1),
            Err(GrammarError::InvalidRepetition { min: 3, max: 1 })
        ));
    }

    #[test]
    fn union_accepts_both_branches() {
        let nfa = Nfa::union(Nfa::from_str("ab"), Nfa::from_str("cd"));
        assert!(nfa.recognizes("ab"));
        assert!(nfa.recognizes("cd"));
        assert!(!nfa.recognizes("ad"));
    }

    #[test]
    fn difference_removes_right_language() {
        // [a-c]+ minus "b"
        let left = Nfa::plus(Nfa::from_span(CharSpan::new(
            u16::from(b'a'),
            u16::from(b'c'),
        )));
        let nfa = Nfa::difference(left, Nfa::from_str("b"));
        assert!(nfa.recognizes("a"));
        assert!(nfa.recognizes("bb"));
        assert!(nfa.recognizes("ba"));
        assert!(!nfa.recognizes("b"));
        assert!(!nfa.recognizes(""));
    }

    #[test]
    fn astral_code_points_use_surrogate_chains() {
        let nfa = Nfa::from_char('𝕏');
        assert!(nfa.recognizes("𝕏"));
        assert!(!nfa.recognizes("X"));

        let negated = Nfa::from_negated_class(&[CharSpan::single(u16::from(b'x'))]);
        assert!(negated.recognizes("a"));
        assert!(negated.recognizes("𝕏"));
        assert!(!negated.recognizes("x"));
    }
}
