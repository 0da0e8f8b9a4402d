use entigraph_core::CycleError;
use entigraph_schema::{Direction, EntitySchema, MatchMode, RelationOperator};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// A directed type-to-type dependency, annotated with the relationship that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub relationship: String,
    pub operator: RelationOperator,
    pub direction: Direction,
    pub match_mode: MatchMode,
}

/// Directed graph over entity types, one edge per forward relationship.
///
/// Construction never fails; cyclic schemas stay usable because the cascade
/// engine resolves lazily and does not require a strict creation order. The
/// ordering queries are advisory and return structured results.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    edges: Vec<GraphEdge>,
    outgoing: BTreeMap<String, Vec<usize>>,
}

impl DependencyGraph {
    /// Builds the graph from a registered schema set. Backward and
    /// bidirectional declarations add no edge of their own; the forward side
    /// contributes it.
    pub fn build(schemas: &[Arc<EntitySchema>]) -> Self {
        let mut graph = Self::default();
        for schema in schemas {
            graph.nodes.insert(schema.name.clone());
            for (field, descriptor) in &schema.relationships {
                let Some(spec) = descriptor.relationship() else {
                    continue;
                };
                if spec.direction() != Direction::Forward {
                    continue;
                }
                let index = graph.edges.len();
                graph.edges.push(GraphEdge {
                    from: schema.name.clone(),
                    to: spec.target.clone(),
                    relationship: field.clone(),
                    operator: spec.operator,
                    direction: spec.direction(),
                    match_mode: spec.match_mode(),
                });
                graph
                    .outgoing
                    .entry(schema.name.clone())
                    .or_default()
                    .push(index);
            }
        }
        // Relationship targets count as nodes even when they have no schema
        // entry of their own yet.
        for edge in &graph.edges {
            graph.nodes.insert(edge.to.clone());
        }
        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "built dependency graph"
        );
        graph
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn edges_from(&self, node: &str) -> Vec<&GraphEdge> {
        self.outgoing
            .get(node)
            .map(|indices| indices.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    fn successors(&self, node: &str) -> Vec<&str> {
        self.edges_from(node)
            .into_iter()
            .map(|edge| edge.to.as_str())
            .collect()
    }

    fn in_degrees(&self) -> HashMap<&str, usize> {
        let mut degrees: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.as_str(), 0)).collect();
        for edge in &self.edges {
            *degrees.entry(edge.to.as_str()).or_insert(0) += 1;
        }
        degrees
    }

    /// Kahn's algorithm. Every edge source precedes its target in the
    /// returned order; alphabetical among ready nodes for determinism. Nodes
    /// left with unresolved incoming edges form cycles.
    pub fn topological_sort(&self) -> Result<Vec<String>, CycleError> {
        let mut degrees = self.in_degrees();
        let mut ready: VecDeque<&str> = self
            .nodes
            .iter()
            .map(String::as_str)
            .filter(|n| degrees[n] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_front() {
            order.push(node.to_string());
            for succ in self.successors(node) {
                let Some(degree) = degrees.get_mut(succ) else {
                    continue;
                };
                *degree -= 1;
                if *degree == 0 {
                    // Keep the ready set sorted for a deterministic order.
                    let pos = ready.iter().position(|n| *n > succ).unwrap_or(ready.len());
                    ready.insert(pos, succ);
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            Err(CycleError {
                cycles: self.detect_cycles(),
            })
        }
    }

    /// Enumerates actual cycle membership, not just a yes/no. Each cycle is a
    /// node sequence that returns to its start when edges are followed.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut visited = HashSet::new();
        let mut cycles = Vec::new();

        for node in &self.nodes {
            if !visited.contains(node.as_str()) {
                let mut rec_stack = HashSet::new();
                let mut path = Vec::new();
                self.dfs_detect_cycle(node, &mut visited, &mut rec_stack, &mut path, &mut cycles);
            }
        }

        cycles
    }

    fn dfs_detect_cycle<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        for succ in self.successors(node) {
            if !visited.contains(succ) {
                self.dfs_detect_cycle(succ, visited, rec_stack, path, cycles);
            } else if rec_stack.contains(succ) {
                // Back edge: the path slice from the reentry point is a cycle.
                if let Some(start) = path.iter().position(|&n| n == succ) {
                    cycles.push(path[start..].iter().map(|s| s.to_string()).collect());
                }
            }
        }

        rec_stack.remove(node);
        path.pop();
    }

    /// Groups types into tiers whose dependencies are fully satisfied by all
    /// prior tiers; types within a tier may be created concurrently.
    /// Alphabetical within each tier. Nodes trapped in cycles are omitted.
    pub fn parallel_groups(&self) -> Vec<Vec<String>> {
        let mut degrees = self.in_degrees();
        let mut remaining: BTreeSet<&str> = self.nodes.iter().map(String::as_str).collect();
        let mut tiers = Vec::new();

        while !remaining.is_empty() {
            let tier: Vec<&str> = remaining
                .iter()
                .copied()
                .filter(|n| degrees[n] == 0)
                .collect();
            if tier.is_empty() {
                break;
            }
            for node in &tier {
                remaining.remove(node);
                for succ in self.successors(node) {
                    if let Some(degree) = degrees.get_mut(succ) {
                        *degree = degree.saturating_sub(1);
                    }
                }
            }
            tiers.push(tier.into_iter().map(|s| s.to_string()).collect());
        }

        tiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigraph_schema::SchemaRegistry;
    use serde_json::json;

    fn graph_for(definitions: serde_json::Value) -> DependencyGraph {
        let registry = SchemaRegistry::new();
        registry.register_all(&definitions).unwrap();
        DependencyGraph::build(&registry.all())
    }

    #[test]
    fn forward_relationships_become_edges() {
        let graph = graph_for(json!({
            "Startup": {"idea": "What is the core idea? ->Idea"},
            "Idea": {"description": "string"}
        }));

        assert_eq!(graph.edges().len(), 1);
        let edge = &graph.edges()[0];
        assert_eq!(edge.from, "Startup");
        assert_eq!(edge.to, "Idea");
        assert_eq!(edge.relationship, "idea");
        assert_eq!(edge.direction, Direction::Forward);
        assert_eq!(edge.match_mode, MatchMode::Exact);
    }

    #[test]
    fn backward_relationships_add_no_edge() {
        let graph = graph_for(json!({
            "User": {"comments": "<-Comment.author"},
            "Comment": {"author": "->User"}
        }));

        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].from, "Comment");
    }

    #[test]
    fn topological_order_respects_edges() {
        let graph = graph_for(json!({
            "A": {"b": "->B", "c": "->C"},
            "B": {"d": "->D"},
            "C": {"d": "->D"},
            "D": {"name": "string"}
        }));

        let order = graph.topological_sort().unwrap();
        assert_eq!(order.len(), 4);
        for edge in graph.edges() {
            let from = order.iter().position(|n| *n == edge.from).unwrap();
            let to = order.iter().position(|n| *n == edge.to).unwrap();
            assert!(from < to, "{} must precede {}", edge.from, edge.to);
        }
    }

    #[test]
    fn cycles_fail_the_sort_with_membership() {
        let graph = graph_for(json!({
            "Idea": {"bio": "->Bio"},
            "Bio": {"idea": "->Idea"}
        }));

        let err = graph.topological_sort().unwrap_err();
        assert!(!err.cycles.is_empty());
    }

    #[test]
    fn detect_cycles_enumerates_members() {
        let graph = graph_for(json!({
            "Idea": {"bio": "->Bio"},
            "Bio": {"idea": "->Idea"},
            "Standalone": {"name": "string"}
        }));

        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
        let cycle = &cycles[0];
        assert_eq!(cycle.len(), 2);
        assert!(cycle.contains(&"Idea".to_string()));
        assert!(cycle.contains(&"Bio".to_string()));

        // Following edges from each member returns to the start.
        for window in cycle.windows(2) {
            assert!(graph
                .edges_from(&window[0])
                .iter()
                .any(|e| e.to == window[1]));
        }
        assert!(graph
            .edges_from(cycle.last().unwrap())
            .iter()
            .any(|e| e.to == cycle[0]));
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let graph = graph_for(json!({
            "Startup": {"idea": "->Idea"},
            "Idea": {"description": "string"}
        }));
        assert!(graph.detect_cycles().is_empty());
    }

    #[test]
    fn parallel_groups_partition_the_type_set() {
        let graph = graph_for(json!({
            "A": {"b": "->B", "c": "->C"},
            "B": {"d": "->D"},
            "C": {"d": "->D"},
            "D": {"name": "string"}
        }));

        let tiers = graph.parallel_groups();
        assert_eq!(tiers, vec![
            vec!["A".to_string()],
            vec!["B".to_string(), "C".to_string()],
            vec!["D".to_string()],
        ]);

        let mut seen = HashSet::new();
        for tier in &tiers {
            for node in tier {
                assert!(seen.insert(node.clone()), "{node} appears twice");
            }
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn build_never_fails_on_cycles() {
        let graph = graph_for(json!({
            "Idea": {"bio": "->Bio"},
            "Bio": {"idea": "->Idea"}
        }));
        // Cyclic members are omitted from tiers rather than erroring.
        assert!(graph.parallel_groups().is_empty());
    }
}
