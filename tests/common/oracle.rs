//! Reference model of one relation type's direct edges

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use typed_dag::VertexId;

/// Direct edges of one relation type, kept as an adjacency list
#[derive(Debug, Clone, Default)]
pub struct EdgeModel {
    children: BTreeMap<VertexId, BTreeSet<VertexId>>,
}

impl EdgeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, parent: &VertexId, child: &VertexId) {
        self.children
            .entry(parent.clone())
            .or_default()
            .insert(child.clone());
    }

    pub fn remove(&mut self, parent: &VertexId, child: &VertexId) {
        if let Some(set) = self.children.get_mut(parent) {
            set.remove(child);
        }
    }

    pub fn remove_vertex(&mut self, vertex: &VertexId) {
        self.children.remove(vertex);
        for set in self.children.values_mut() {
            set.remove(vertex);
        }
    }

    pub fn has_parent(&self, vertex: &VertexId) -> bool {
        self.children.values().any(|set| set.contains(vertex))
    }

    pub fn edges(&self) -> Vec<(VertexId, VertexId)> {
        self.children
            .iter()
            .flat_map(|(p, set)| set.iter().map(move |c| (p.clone(), c.clone())))
            .collect()
    }

    /// Shortest distance from `origin` to every reachable vertex
    pub fn descendants(&self, origin: &VertexId) -> BTreeMap<VertexId, u32> {
        let mut depths = BTreeMap::new();
        let mut queue = VecDeque::from([(origin.clone(), 0u32)]);

        while let Some((vertex, depth)) = queue.pop_front() {
            for child in self.children.get(&vertex).into_iter().flatten() {
                if child != origin && !depths.contains_key(child) {
                    depths.insert(child.clone(), depth + 1);
                    queue.push_back((child.clone(), depth + 1));
                }
            }
        }
        depths
    }
}

/// Random DAG edges over `n` vertices: only edges from a lower to a higher
/// position in a shuffled order, so the result is acyclic.
///
/// With `single_parent`, every vertex receives at most one parent.
pub fn random_dag(
    rng: &mut impl Rng,
    n: usize,
    edge_probability: f64,
    single_parent: bool,
) -> (Vec<VertexId>, Vec<(VertexId, VertexId)>) {
    let mut vertices: Vec<VertexId> = (0..n).map(|i| VertexId::from(format!("v{i:02}"))).collect();
    vertices.shuffle(rng);

    let mut edges = Vec::new();
    for j in 1..n {
        let mut parents: Vec<usize> = (0..j).filter(|_| rng.gen_bool(edge_probability)).collect();
        if single_parent {
            parents.truncate(1);
        }
        for i in parents {
            edges.push((vertices[i].clone(), vertices[j].clone()));
        }
    }
    edges.shuffle(rng);

    vertices.sort();
    (vertices, edges)
}
