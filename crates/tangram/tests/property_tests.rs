//! Property-based tests over the automata layer.
//!
//! Uses proptest to generate random spans, regular expressions and inputs,
//! checking the algebraic properties the construction pipeline relies on.

use proptest::prelude::*;
use tangram::automata::{CharSpan, Dfa, FinalItem, Nfa};

/// A small regular-expression AST to drive NFA construction.
#[derive(Debug, Clone)]
enum Re {
    Unit(u16),
    Concat(Box<Re>, Box<Re>),
    Union(Box<Re>, Box<Re>),
    Star(Box<Re>),
    Optional(Box<Re>),
    Plus(Box<Re>),
}

fn build(re: &Re) -> Nfa {
    match re {
        Re::Unit(unit) => Nfa::from_unit(*unit),
        Re::Concat(left, right) => Nfa::concat(build(left), build(right)),
        Re::Union(left, right) => Nfa::union(build(left), build(right)),
        Re::Star(sub) => Nfa::star(build(sub)),
        Re::Optional(sub) => Nfa::optional(build(sub)),
        Re::Plus(sub) => Nfa::plus(build(sub)),
    }
}

fn re_strategy() -> impl Strategy<Value = Re> {
    let leaf = (b'a'..=b'c').prop_map(|c| Re::Unit(u16::from(c)));
    leaf.prop_recursive(3, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Re::Concat(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Re::Union(Box::new(a), Box::new(b))),
            inner.clone().prop_map(|a| Re::Star(Box::new(a))),
            inner.clone().prop_map(|a| Re::Optional(Box::new(a))),
            inner.prop_map(|a| Re::Plus(Box::new(a))),
        ]
    })
}

fn input_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(prop_oneof![Just('a'), Just('b'), Just('c')], 0..6)
        .prop_map(|chars| chars.into_iter().collect())
}

fn span_strategy() -> impl Strategy<Value = CharSpan> {
    (0u16..200, 0u16..40).prop_map(|(begin, len)| CharSpan::new(begin, begin.saturating_add(len)))
}

proptest! {
    /// Intersection is commutative and empty exactly when the intervals
    /// are disjoint.
    #[test]
    fn charspan_intersection_commutes(a in span_strategy(), b in span_strategy()) {
        let ab = a.intersect(b);
        let ba = b.intersect(a);
        prop_assert_eq!(ab, ba);
        let overlap = a.begin.max(b.begin) <= a.end.min(b.end);
        prop_assert_eq!(!ab.is_empty(), overlap);
    }

    /// Splitting a span on a contained sub-span partitions it exactly.
    #[test]
    fn charspan_split_partitions(a in span_strategy(), offset in 0u16..40, len in 0u16..40) {
        let begin = a.begin.saturating_add(offset).min(a.end);
        let end = begin.saturating_add(len).min(a.end);
        let sub = CharSpan::new(begin, end);
        let (before, after) = a.split(sub);
        let total = before.len() + sub.len() + after.len();
        prop_assert_eq!(total, a.len());
        prop_assert!(before.intersect(sub).is_empty());
        prop_assert!(after.intersect(sub).is_empty());
    }

    /// Determinization preserves the recognized language.
    #[test]
    fn determinization_preserves_language(re in re_strategy(), input in input_strategy()) {
        let mut nfa = build(&re);
        nfa.set_exit_final(FinalItem::Dummy);
        let dfa = Dfa::from_nfa(&nfa);
        prop_assert_eq!(nfa.recognizes(&input), dfa.recognizes(&input));
    }

    /// Pruning never changes the language.
    #[test]
    fn pruning_preserves_language(re in re_strategy(), input in input_strategy()) {
        let mut nfa = build(&re);
        nfa.set_exit_final(FinalItem::Dummy);
        let mut dfa = Dfa::from_nfa(&nfa);
        let before = dfa.recognizes(&input);
        dfa.prune();
        dfa.repack_transitions();
        prop_assert_eq!(before, dfa.recognizes(&input));
    }

    /// `(r?)*` and `r*` accept the same language.
    #[test]
    fn star_of_optional_equals_star(re in re_strategy(), input in input_strategy()) {
        let star_opt = Nfa::star(Nfa::optional(build(&re)));
        let star = Nfa::star(build(&re));
        prop_assert_eq!(star_opt.recognizes(&input), star.recognizes(&input));
    }

    /// Difference against the empty language is identity.
    #[test]
    fn difference_with_empty_right_is_identity(re in re_strategy(), input in input_strategy()) {
        let plain = build(&re);
        // An automaton with no path between entry and exit accepts nothing.
        let empty = Nfa::new();
        let diff = Nfa::difference(build(&re), empty);
        prop_assert_eq!(plain.recognizes(&input), diff.recognizes(&input));
    }
}
