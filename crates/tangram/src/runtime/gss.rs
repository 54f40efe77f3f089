//! Graph-structured stack for the ambiguity-tolerant parser.
//!
//! Nodes and edges live in arenas owned by the [`Gss`]; identity is the
//! dense index, never a hash of contents. Nodes are grouped into
//! generations, one per consumed token; edges always point from newer
//! nodes to older (or same-generation, for nullable reductions) ones, each
//! labeled with the forest node covering the input between them. The whole
//! structure is ephemeral: one parse builds it, tree extraction reads it,
//! then it is dropped.

use super::sppf::SppfId;

pub type GssNodeId = usize;

#[derive(Debug, Clone, Copy)]
pub struct GssNode {
    pub state: u32,
    pub generation: usize,
}

#[derive(Debug, Clone, Copy)]
struct GssEdge {
    to: GssNodeId,
    label: SppfId,
}

/// One path discovered while unwinding a reduction.
#[derive(Debug, Clone)]
pub struct GssPath {
    /// The node below the reduced body.
    pub origin: GssNodeId,
    /// Edge labels along the path, in body (leftmost-first) order.
    pub labels: Vec<SppfId>,
}

/// The graph-structured stack.
#[derive(Debug, Default)]
pub struct Gss {
    nodes: Vec<GssNode>,
    edges: Vec<Vec<GssEdge>>,
    generations: Vec<Vec<GssNodeId>>,
}

impl Gss {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new generation and return its index.
    pub fn new_generation(&mut self) -> usize {
        self.generations.push(Vec::new());
        self.generations.len() - 1
    }

    #[must_use]
    pub fn current_generation(&self) -> usize {
        self.generations.len().saturating_sub(1)
    }

    #[must_use]
    pub fn node(&self, id: GssNodeId) -> GssNode {
        self.nodes[id]
    }

    #[must_use]
    pub fn generation(&self, index: usize) -> &[GssNodeId] {
        &self.generations[index]
    }

    /// The node for `state` in `generation`, if it exists. At most one node
    /// per (generation, state) pair ever exists.
    #[must_use]
    pub fn node_in_generation(&self, generation: usize, state: u32) -> Option<GssNodeId> {
        self.generations[generation]
            .iter()
            .copied()
            .find(|&id| self.nodes[id].state == state)
    }

    /// Create a node for `state` in the current generation.
    pub fn create_node(&mut self, state: u32) -> GssNodeId {
        let id = self.nodes.len();
        let generation = self.current_generation();
        self.nodes.push(GssNode { state, generation });
        self.edges.push(Vec::new());
        self.generations[generation].push(id);
        id
    }

    /// The node for `state` in the current generation, created on demand.
    /// Returns `(id, created)`.
    pub fn find_or_create(&mut self, state: u32) -> (GssNodeId, bool) {
        match self.node_in_generation(self.current_generation(), state) {
            Some(id) => (id, false),
            None => (self.create_node(state), true),
        }
    }

    /// The label of the edge `from -> to`, if one exists.
    #[must_use]
    pub fn edge_label(&self, from: GssNodeId, to: GssNodeId) -> Option<SppfId> {
        self.edges[from]
            .iter()
            .find(|edge| edge.to == to)
            .map(|edge| edge.label)
    }

    /// Add the edge `from -> to` unless it already exists. Returns whether
    /// the edge is new.
    pub fn add_edge(&mut self, from: GssNodeId, to: GssNodeId, label: SppfId) -> bool {
        if self.edge_label(from, to).is_some() {
            return false;
        }
        self.edges[from].push(GssEdge { to, label });
        true
    }

    /// Every path of exactly `length` edges starting at `from`, with the
    /// crossed labels returned in body order.
    #[must_use]
    pub fn paths(&self, from: GssNodeId, length: usize) -> Vec<GssPath> {
        let mut partial: Vec<(GssNodeId, Vec<SppfId>)> = vec![(from, Vec::new())];
        for _ in 0..length {
            let mut next = Vec::with_capacity(partial.len());
            for (node, labels) in partial {
                for edge in &self.edges[node] {
                    let mut extended = labels.clone();
                    extended.push(edge.label);
                    next.push((edge.to, extended));
                }
            }
            partial = next;
            if partial.is_empty() {
                break;
            }
        }
        partial
            .into_iter()
            .map(|(origin, mut labels)| {
                labels.reverse();
                GssPath { origin, labels }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_are_unique_per_generation_and_state() {
        let mut gss = Gss::new();
        gss.new_generation();
        let (a, created_a) = gss.find_or_create(4);
        let (b, created_b) = gss.find_or_create(4);
        assert!(created_a);
        assert!(!created_b);
        assert_eq!(a, b);
        gss.new_generation();
        let (c, created_c) = gss.find_or_create(4);
        assert!(created_c);
        assert_ne!(a, c);
    }

    #[test]
    fn paths_enumerate_all_alternatives() {
        // Diamond: d -> b -> a, d -> c -> a
        let mut gss = Gss::new();
        gss.new_generation();
        let a = gss.create_node(0);
        gss.new_generation();
        let b = gss.create_node(1);
        let c = gss.create_node(2);
        gss.new_generation();
        let d = gss.create_node(3);
        gss.add_edge(b, a, 10);
        gss.add_edge(c, a, 20);
        gss.add_edge(d, b, 11);
        gss.add_edge(d, c, 21);

        let mut paths = gss.paths(d, 2);
        paths.sort_by_key(|p| p.labels.clone());
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].origin, a);
        assert_eq!(paths[0].labels, vec![10, 11]);
        assert_eq!(paths[1].labels, vec![20, 21]);
    }

    #[test]
    fn duplicate_edges_are_rejected() {
        let mut gss = Gss::new();
        gss.new_generation();
        let a = gss.create_node(0);
        gss.new_generation();
        let b = gss.create_node(1);
        assert!(gss.add_edge(b, a, 5));
        assert!(!gss.add_edge(b, a, 6));
        assert_eq!(gss.edge_label(b, a), Some(5));
    }

    #[test]
    fn zero_length_path_is_the_node_itself() {
        let mut gss = Gss::new();
        gss.new_generation();
        let a = gss.create_node(0);
        let paths = gss.paths(a, 0);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].origin, a);
        assert!(paths[0].labels.is_empty());
    }
}
