//! Deterministic finite automata: subset construction, pruning, repacking.

use super::nfa::Nfa;
use super::{CharSpan, FinalItem};
use hashbrown::HashMap;
use smallvec::SmallVec;

/// A state of a [`Dfa`].
#[derive(Debug, Clone, Default)]
pub struct DfaState {
    transitions: Vec<(CharSpan, usize)>,
    /// Accepting markers, kept sorted by priority so the representative is
    /// always first. The smallest symbol id (the terminal declared first)
    /// wins; that is the single disambiguation rule used everywhere.
    finals: Vec<FinalItem>,
    /// Aggregated difference-operator tag: negative dominates.
    pub(crate) mark: i8,
}

impl DfaState {
    #[must_use]
    pub fn transitions(&self) -> &[(CharSpan, usize)] {
        &self.transitions
    }

    #[must_use]
    pub fn finals(&self) -> &[FinalItem] {
        &self.finals
    }

    /// The representative accepting terminal: the one with the smallest
    /// priority key, i.e. the first declared.
    #[must_use]
    pub fn top_final(&self) -> Option<FinalItem> {
        self.finals.first().copied()
    }

    pub fn add_final(&mut self, item: FinalItem) {
        if self.finals.contains(&item) {
            return;
        }
        let at = self
            .finals
            .partition_point(|f| f.priority() <= item.priority());
        self.finals.insert(at, item);
    }

    pub fn clear_finals(&mut self) {
        self.finals.clear();
    }

    /// The target reached on `unit`, if any. Transitions are kept sorted by
    /// span start.
    #[must_use]
    pub fn next_on(&self, unit: u16) -> Option<usize> {
        self.transitions
            .iter()
            .find(|(span, _)| span.contains(unit))
            .map(|&(_, target)| target)
    }
}

/// A deterministic finite automaton. State 0 is the entry.
#[derive(Debug, Clone, Default)]
pub struct Dfa {
    states: Vec<DfaState>,
}

impl Dfa {
    /// Determinize `nfa` by subset construction.
    ///
    /// Each resulting state corresponds to the epsilon-closure of a set of
    /// NFA states; its outgoing alphabet is partitioned into atomic spans so
    /// that transitions never overlap. Final markers of all contained NFA
    /// states are aggregated; difference-operator marks aggregate with
    /// negative dominating.
    #[must_use]
    pub fn from_nfa(nfa: &Nfa) -> Self {
        let mut dfa = Self { states: Vec::new() };
        let mut subset_ids: HashMap<Vec<usize>, usize, ahash::RandomState> =
            HashMap::with_hasher(ahash::RandomState::new());
        let mut subsets: Vec<Vec<usize>> = Vec::new();

        let initial = nfa.epsilon_closure(&[nfa.entry()]);
        subset_ids.insert(initial.clone(), 0);
        subsets.push(initial);
        dfa.states.push(DfaState::default());

        let mut next = 0;
        while next < subsets.len() {
            let subset = subsets[next].clone();
            let id = next;
            next += 1;

            // Aggregate finals and marks.
            for &nfa_id in &subset {
                let nfa_state = nfa.state(nfa_id);
                for &item in &nfa_state.finals {
                    dfa.states[id].add_final(item);
                }
                if nfa_state.mark < 0 {
                    dfa.states[id].mark = -1;
                } else if nfa_state.mark > 0 && dfa.states[id].mark == 0 {
                    dfa.states[id].mark = 1;
                }
            }

            // Partition the outgoing alphabet into atomic spans.
            let mut edges: SmallVec<[(CharSpan, usize); 16]> = SmallVec::new();
            for &nfa_id in &subset {
                for &(span, target) in &nfa.state(nfa_id).transitions {
                    if !span.is_empty() {
                        edges.push((span, target));
                    }
                }
            }
            let mut cuts: Vec<u32> = Vec::with_capacity(edges.len() * 2);
            for &(span, _) in &edges {
                cuts.push(u32::from(span.begin));
                cuts.push(u32::from(span.end) + 1);
            }
            cuts.sort_unstable();
            cuts.dedup();

            for window in cuts.windows(2) {
                let atomic = CharSpan::new(window[0] as u16, (window[1] - 1) as u16);
                let mut targets: Vec<usize> = edges
                    .iter()
                    .filter(|(span, _)| span.contains(atomic.begin))
                    .map(|&(_, target)| target)
                    .collect();
                if targets.is_empty() {
                    continue;
                }
                targets.sort_unstable();
                targets.dedup();
                let closure = nfa.epsilon_closure(&targets);
                let target_id = match subset_ids.get(&closure) {
                    Some(&existing) => existing,
                    None => {
                        let new_id = subsets.len();
                        subset_ids.insert(closure.clone(), new_id);
                        subsets.push(closure);
                        dfa.states.push(DfaState::default());
                        new_id
                    }
                };
                dfa.states[id].transitions.push((atomic, target_id));
            }
        }
        dfa
    }

    #[must_use]
    pub fn states(&self) -> &[DfaState] {
        &self.states
    }

    pub(crate) fn states_mut(&mut self) -> &mut [DfaState] {
        &mut self.states
    }

    #[must_use]
    pub fn state(&self, id: usize) -> &DfaState {
        &self.states[id]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drop states that are unreachable from the entry or cannot reach any
    /// accepting state. The entry always survives, even when the automaton
    /// accepts nothing.
    pub fn prune(&mut self) {
        let n = self.states.len();
        if n == 0 {
            return;
        }

        let mut forward = vec![false; n];
        let mut stack = vec![0usize];
        forward[0] = true;
        while let Some(id) = stack.pop() {
            for &(_, target) in &self.states[id].transitions {
                if !forward[target] {
                    forward[target] = true;
                    stack.push(target);
                }
            }
        }

        let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (id, state) in self.states.iter().enumerate() {
            for &(_, target) in &state.transitions {
                reverse[target].push(id);
            }
        }
        let mut alive = vec![false; n];
        let mut stack: Vec<usize> = (0..n).filter(|&id| !self.states[id].finals.is_empty()).collect();
        for &id in &stack {
            alive[id] = true;
        }
        while let Some(id) = stack.pop() {
            for &pred in &reverse[id] {
                if !alive[pred] {
                    alive[pred] = true;
                    stack.push(pred);
                }
            }
        }

        let mut remap = vec![usize::MAX; n];
        let mut kept = 0;
        for id in 0..n {
            if id == 0 || (forward[id] && alive[id]) {
                remap[id] = kept;
                kept += 1;
            }
        }

        let old_states = std::mem::take(&mut self.states);
        self.states = Vec::with_capacity(kept);
        for (id, mut state) in old_states.into_iter().enumerate() {
            if remap[id] == usize::MAX {
                continue;
            }
            state.transitions.retain(|(_, target)| remap[*target] != usize::MAX);
            for (_, target) in &mut state.transitions {
                *target = remap[*target];
            }
            self.states.push(state);
        }
    }

    /// Merge adjacent and overlapping spans leading to the same target so
    /// that each state's transitions form a disjoint, sorted partition.
    /// Required before export or before folding the automaton back into an
    /// NFA.
    pub fn repack_transitions(&mut self) {
        for state in &mut self.states {
            let mut by_target: HashMap<usize, Vec<CharSpan>, ahash::RandomState> =
                HashMap::with_hasher(ahash::RandomState::new());
            for &(span, target) in &state.transitions {
                by_target.entry(target).or_default().push(span);
            }
            let mut repacked: Vec<(CharSpan, usize)> = Vec::new();
            let mut targets: Vec<usize> = by_target.keys().copied().collect();
            targets.sort_unstable();
            for target in targets {
                let mut spans = by_target.remove(&target).unwrap_or_default();
                spans.sort_unstable();
                let mut merged: Option<CharSpan> = None;
                for span in spans {
                    match merged {
                        Some(current) if u32::from(span.begin) <= u32::from(current.end) + 1 => {
                            merged = Some(CharSpan::new(current.begin, current.end.max(span.end)));
                        }
                        Some(current) => {
                            repacked.push((current, target));
                            merged = Some(span);
                        }
                        None => merged = Some(span),
                    }
                }
                if let Some(current) = merged {
                    repacked.push((current, target));
                }
            }
            repacked.sort_unstable_by_key(|&(span, _)| span.begin);
            state.transitions = repacked;
        }
    }

    /// Whether the automaton accepts `text` in full.
    #[must_use]
    pub fn recognizes(&self, text: &str) -> bool {
        let mut state = 0usize;
        for unit in text.encode_utf16() {
            match self.states[state].next_on(unit) {
                Some(next) => state = next,
                None => return false,
            }
        }
        !self.states[state].finals.is_empty()
    }
}
