//! Rules, rule bodies and the body algebra behind EBNF-style operators.

use super::SymbolRef;

/// How a node is spliced into its parent after a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TreeAction {
    /// Keep the node under its parent unchanged.
    #[default]
    Keep,
    /// Replace the node's parent with the node itself; the parent's other
    /// children become the promoted node's own, order preserved.
    Promote,
    /// Remove the node and its entire subtree.
    Drop,
    /// Replace the node by its children, spliced in place.
    Replace,
}

/// One element of a rule body: a grammar symbol paired with its tree action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyElement {
    pub symbol: SymbolRef,
    pub action: TreeAction,
}

impl BodyElement {
    #[must_use]
    pub const fn new(symbol: SymbolRef) -> Self {
        Self {
            symbol,
            action: TreeAction::Keep,
        }
    }

    #[must_use]
    pub const fn with_action(symbol: SymbolRef, action: TreeAction) -> Self {
        Self { symbol, action }
    }
}

/// An ordered sequence of body elements. The empty body is epsilon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleBody {
    pub elements: Vec<BodyElement>,
}

impl RuleBody {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    #[must_use]
    pub fn single(symbol: SymbolRef) -> Self {
        Self {
            elements: vec![BodyElement::new(symbol)],
        }
    }

    #[must_use]
    pub fn from_symbols(symbols: &[SymbolRef]) -> Self {
        Self {
            elements: symbols.iter().copied().map(BodyElement::new).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The symbol at `position`, if the body is that long.
    #[must_use]
    pub fn symbol_at(&self, position: usize) -> Option<SymbolRef> {
        self.elements.get(position).map(|e| e.symbol)
    }

    #[must_use]
    pub fn concat(mut self, other: &Self) -> Self {
        self.elements.extend(other.elements.iter().copied());
        self
    }
}

/// A set of alternative bodies, the working representation while expanding
/// EBNF-style operators into plain context-free rules.
#[derive(Debug, Clone, Default)]
pub struct BodySet {
    pub bodies: Vec<RuleBody>,
}

impl BodySet {
    /// The set containing only the epsilon body.
    #[must_use]
    pub fn epsilon() -> Self {
        Self {
            bodies: vec![RuleBody::empty()],
        }
    }

    #[must_use]
    pub fn single(body: RuleBody) -> Self {
        Self { bodies: vec![body] }
    }

    #[must_use]
    pub fn of_symbol(symbol: SymbolRef) -> Self {
        Self::single(RuleBody::single(symbol))
    }

    /// Alternation: the union of both sets of alternatives.
    #[must_use]
    pub fn union(mut self, other: Self) -> Self {
        for body in other.bodies {
            if !self.bodies.contains(&body) {
                self.bodies.push(body);
            }
        }
        self
    }

    /// Concatenation: the cross product of alternatives.
    #[must_use]
    pub fn concat(self, other: &Self) -> Self {
        let mut bodies = Vec::with_capacity(self.bodies.len() * other.bodies.len());
        for left in &self.bodies {
            for right in &other.bodies {
                let combined = left.clone().concat(right);
                if !bodies.contains(&combined) {
                    bodies.push(combined);
                }
            }
        }
        Self { bodies }
    }
}

/// Identifier of a rule within its grammar's rule table.
pub type RuleId = usize;

/// A context-free production rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Symbol id of the head variable.
    pub head: u32,
    pub body: RuleBody,
    /// Declared priority for conflict resolution, if any.
    pub priority: Option<u32>,
    /// Whether this rule was synthesized while expanding an EBNF operator.
    pub generated: bool,
}

impl Rule {
    #[must_use]
    pub const fn new(head: u32, body: RuleBody) -> Self {
        Self {
            head,
            body,
            priority: None,
            generated: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolRef;

    const A: SymbolRef = SymbolRef::Terminal(3);
    const B: SymbolRef = SymbolRef::Terminal(4);
    const V: SymbolRef = SymbolRef::Variable(5);

    #[test]
    fn concat_is_a_cross_product() {
        let left = BodySet {
            bodies: vec![RuleBody::single(A), RuleBody::empty()],
        };
        let right = BodySet::of_symbol(B);
        let product = left.concat(&right);
        assert_eq!(
            product.bodies,
            vec![
                RuleBody::from_symbols(&[A, B]),
                RuleBody::from_symbols(&[B])
            ]
        );
    }

    #[test]
    fn union_deduplicates() {
        let left = BodySet::of_symbol(A).union(BodySet::of_symbol(V));
        let merged = left.union(BodySet::of_symbol(A));
        assert_eq!(merged.bodies.len(), 2);
    }

    #[test]
    fn empty_body_is_epsilon() {
        let body = RuleBody::empty();
        assert!(body.is_empty());
        assert_eq!(body.symbol_at(0), None);
    }
}
