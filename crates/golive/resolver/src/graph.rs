//! Capability dependency graph
//!
//! Capabilities live in an arena indexed by position; edges are adjacency
//! lists of indices, so cyclic definitions never produce reference cycles.
//! Arena order is ascending capability id, which makes index order the
//! tie-break order for every traversal.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, VecDeque};

use golive_types::{Capability, CapabilityId};
use serde::{Deserialize, Serialize};

/// A `depends_on` entry that names no registered capability.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MissingDependency {
    pub capability_id: CapabilityId,
    pub missing: CapabilityId,
}

/// Dependency and exclusion adjacency derived from capability definitions.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<Capability>,
    index: HashMap<CapabilityId, usize>,
    /// `depends_on[i]`: capabilities `i` needs enabled.
    depends_on: Vec<Vec<usize>>,
    /// `dependents[i]`: capabilities that need `i` enabled.
    dependents: Vec<Vec<usize>>,
    missing: Vec<MissingDependency>,
}

impl DependencyGraph {
    /// Build the graph. Later duplicates of an id replace earlier ones.
    pub fn build(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        let by_id: BTreeMap<CapabilityId, Capability> = capabilities
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let nodes: Vec<Capability> = by_id.into_values().collect();
        let index: HashMap<CapabilityId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        let mut depends_on = vec![Vec::new(); nodes.len()];
        let mut dependents = vec![Vec::new(); nodes.len()];
        let mut missing = Vec::new();

        for (i, capability) in nodes.iter().enumerate() {
            for dependency in &capability.depends_on {
                match index.get(dependency) {
                    Some(&d) => {
                        depends_on[i].push(d);
                        dependents[d].push(i);
                    }
                    None => missing.push(MissingDependency {
                        capability_id: capability.id.clone(),
                        missing: dependency.clone(),
                    }),
                }
            }
        }

        // depends_on is filled from sorted sets; dependents needs sorting
        for list in &mut dependents {
            list.sort_unstable();
        }

        Self {
            nodes,
            index,
            depends_on,
            dependents,
            missing,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, id: &CapabilityId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node(&self, index: usize) -> &Capability {
        &self.nodes[index]
    }

    pub fn id(&self, index: usize) -> &CapabilityId {
        &self.nodes[index].id
    }

    pub fn nodes(&self) -> &[Capability] {
        &self.nodes
    }

    pub fn dependencies(&self, index: usize) -> &[usize] {
        &self.depends_on[index]
    }

    pub fn dependents(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    pub fn missing_dependencies(&self) -> &[MissingDependency] {
        &self.missing
    }

    pub fn ids(&self, indices: impl IntoIterator<Item = usize>) -> Vec<CapabilityId> {
        indices.into_iter().map(|i| self.id(i).clone()).collect()
    }

    /// Every cycle in the `depends_on` relation, found by iterative
    /// depth-first search with an explicit recursion stack.
    ///
    /// Each cycle is reported once as a closed path, e.g. `[a, b, a]`.
    pub fn find_cycles(&self) -> Vec<Vec<CapabilityId>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
        let mut cycles = Vec::new();

        for root in 0..self.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }

            // (node, position of the next edge to follow)
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            marks[root] = Mark::OnStack;

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                let Some(&child) = self.depends_on[node].get(frame.1) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                frame.1 += 1;

                match marks[child] {
                    Mark::Unvisited => {
                        marks[child] = Mark::OnStack;
                        stack.push((child, 0));
                    }
                    Mark::OnStack => {
                        if let Some(start) = stack.iter().position(|(n, _)| *n == child) {
                            let cycle: Vec<usize> = stack[start..].iter().map(|(n, _)| *n).collect();
                            if seen.insert(canonical_rotation(&cycle)) {
                                let mut path = self.ids(cycle.iter().copied());
                                path.push(self.id(child).clone());
                                cycles.push(path);
                            }
                        }
                    }
                    Mark::Done => {}
                }
            }
        }

        cycles
    }

    /// `start` plus everything it transitively depends on.
    pub fn dependency_closure(&self, start: usize) -> BTreeSet<usize> {
        Self::closure(start, &self.depends_on)
    }

    /// `start` plus everything that transitively depends on it.
    pub fn dependent_closure(&self, start: usize) -> BTreeSet<usize> {
        Self::closure(start, &self.dependents)
    }

    fn closure(start: usize, edges: &[Vec<usize>]) -> BTreeSet<usize> {
        let mut visited = BTreeSet::from([start]);
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            for &next in &edges[node] {
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }

        visited
    }

    /// Breadth-first walk of reverse-dependency edges from `start`.
    ///
    /// Returns `(node, distance)` in discovery order, excluding `start`.
    pub fn dependents_by_distance(&self, start: usize) -> Vec<(usize, usize)> {
        let mut visited = BTreeSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut reached = Vec::new();

        while let Some((node, distance)) = queue.pop_front() {
            for &dependent in &self.dependents[node] {
                if visited.insert(dependent) {
                    reached.push((dependent, distance + 1));
                    queue.push_back((dependent, distance + 1));
                }
            }
        }

        reached
    }

    /// Kahn's algorithm restricted to `nodes`: dependencies before
    /// dependents, ties broken by ascending id.
    ///
    /// On a cycle, returns the nodes that could not be ordered.
    pub fn topological_order(&self, nodes: &BTreeSet<usize>) -> Result<Vec<usize>, Vec<usize>> {
        let mut in_degree: BTreeMap<usize, usize> = nodes
            .iter()
            .map(|&n| {
                let degree = self.depends_on[n].iter().filter(|d| nodes.contains(d)).count();
                (n, degree)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&n, _)| Reverse(n))
            .collect();

        let mut order = Vec::with_capacity(nodes.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(dependent));
                    }
                }
            }
        }

        if order.len() == nodes.len() {
            Ok(order)
        } else {
            let ordered: BTreeSet<usize> = order.into_iter().collect();
            Err(nodes.difference(&ordered).copied().collect())
        }
    }
}

fn canonical_rotation(cycle: &[usize]) -> Vec<usize> {
    let pivot = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, n)| **n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut rotated = cycle[pivot..].to_vec();
    rotated.extend_from_slice(&cycle[..pivot]);
    rotated
}

#[cfg(test)]
mod tests {
    use super::*;
    use golive_types::Domain;

    fn cap(id: &str, deps: &[&str]) -> Capability {
        Capability::new(id, id, Domain::Platform).depends_on(deps.iter().copied())
    }

    #[test]
    fn test_arena_is_sorted_by_id() {
        let graph = DependencyGraph::build(vec![cap("c", &[]), cap("a", &[]), cap("b", &[])]);
        assert_eq!(graph.id(0).as_str(), "a");
        assert_eq!(graph.id(2).as_str(), "c");
        assert_eq!(graph.index_of(&"b".into()), Some(1));
    }

    #[test]
    fn test_missing_dependencies_recorded() {
        let graph = DependencyGraph::build(vec![cap("a", &["ghost"])]);
        assert_eq!(graph.missing_dependencies().len(), 1);
        assert_eq!(graph.missing_dependencies()[0].missing.as_str(), "ghost");
        assert!(graph.dependencies(0).is_empty());
    }

    #[test]
    fn test_two_node_cycle_path() {
        let graph = DependencyGraph::build(vec![cap("a", &["b"]), cap("b", &["a"])]);
        let cycles = graph.find_cycles();
        assert_eq!(cycles.len(), 1);
        let path: Vec<&str> = cycles[0].iter().map(|id| id.as_str()).collect();
        assert_eq!(path, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_long_cycle_with_tail() {
        // d -> a -> b -> c -> a
        let graph = DependencyGraph::build(vec![
            cap("a", &["b"]),
            cap("b", &["c"]),
            cap("c", &["a"]),
            cap("d", &["a"]),
        ]);
        let cycles = graph.find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 4);
        assert_eq!(cycles[0].first(), cycles[0].last());
    }

    #[test]
    fn test_acyclic_has_no_cycles() {
        let graph = DependencyGraph::build(vec![
            cap("a", &["b", "c"]),
            cap("b", &["c"]),
            cap("c", &[]),
        ]);
        assert!(graph.find_cycles().is_empty());
    }

    #[test]
    fn test_topological_tie_break() {
        // x depends on nothing, a and b both depend on base
        let graph = DependencyGraph::build(vec![
            cap("x", &[]),
            cap("b", &["base"]),
            cap("a", &["base"]),
            cap("base", &[]),
        ]);
        let all: BTreeSet<usize> = (0..graph.len()).collect();
        let order = graph.topological_order(&all).unwrap();
        let ids: Vec<&str> = order.iter().map(|&i| graph.id(i).as_str()).collect();
        assert_eq!(ids, vec!["base", "a", "b", "x"]);
    }

    #[test]
    fn test_topological_order_fails_on_cycle() {
        let graph = DependencyGraph::build(vec![cap("a", &["b"]), cap("b", &["a"]), cap("c", &[])]);
        let all: BTreeSet<usize> = (0..graph.len()).collect();
        let stuck = graph.topological_order(&all).unwrap_err();
        assert_eq!(stuck, vec![0, 1]);
    }

    #[test]
    fn test_dependents_by_distance() {
        // c <- b <- a, c <- d
        let graph = DependencyGraph::build(vec![
            cap("a", &["b"]),
            cap("b", &["c"]),
            cap("c", &[]),
            cap("d", &["c"]),
        ]);
        let c = graph.index_of(&"c".into()).unwrap();
        let reached: Vec<(&str, usize)> = graph
            .dependents_by_distance(c)
            .into_iter()
            .map(|(n, d)| (graph.id(n).as_str(), d))
            .collect();
        assert_eq!(reached, vec![("b", 1), ("d", 1), ("a", 2)]);
    }
}
