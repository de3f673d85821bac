//! Pure traversal queries over a workflow's nodes and edges.
//!
//! Both directions are breadth-first walks with a visited set, so a diamond
//! is reported once per node and an accidental cycle terminates. The starting
//! node is never part of its own result, even when a back-edge leads to it.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::models::{Edge, Node};

/// Adjacency view over an immutable node/edge snapshot.
#[derive(Debug, Clone)]
pub struct Graph<'a> {
    /// Adjacency list: node_id -> downstream node_ids.
    adjacency: HashMap<&'a str, Vec<&'a str>>,
    /// Reverse adjacency: node_id -> upstream node_ids.
    reverse_adjacency: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> Graph<'a> {
    /// Build the graph. Edges touching unknown node ids are ignored.
    pub fn new(nodes: &'a [Node], edges: &'a [Edge]) -> Self {
        let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut reverse_adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

        for edge in edges {
            let (from, to) = (edge.source.as_str(), edge.target.as_str());
            if !known.contains(from) || !known.contains(to) {
                continue;
            }
            adjacency.entry(from).or_default().push(to);
            reverse_adjacency.entry(to).or_default().push(from);
        }

        Self { adjacency, reverse_adjacency }
    }

    /// Direct predecessors of `node_id`.
    pub fn parents(&self, node_id: &str) -> &[&'a str] {
        self.reverse_adjacency.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct successors of `node_id`.
    pub fn children(&self, node_id: &str) -> &[&'a str] {
        self.adjacency.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every node that can reach `node_id`.
    pub fn upstream_of(&self, node_id: &str) -> BTreeSet<String> {
        Self::walk(node_id, &self.reverse_adjacency)
    }

    /// Every node reachable from `node_id`.
    pub fn downstream_of(&self, node_id: &str) -> BTreeSet<String> {
        Self::walk(node_id, &self.adjacency)
    }

    fn walk(start: &str, next: &HashMap<&'a str, Vec<&'a str>>) -> BTreeSet<String> {
        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut queue: VecDeque<&str> = VecDeque::from([start]);
        let mut found = BTreeSet::new();

        while let Some(current) = queue.pop_front() {
            for &neighbour in next.get(current).map(Vec::as_slice).unwrap_or(&[]) {
                if visited.insert(neighbour) {
                    found.insert(neighbour.to_owned());
                    queue.push_back(neighbour);
                }
            }
        }

        found
    }
}

/// Every node that can reach `node_id`.
pub fn upstream_of(node_id: &str, nodes: &[Node], edges: &[Edge]) -> BTreeSet<String> {
    Graph::new(nodes, edges).upstream_of(node_id)
}

/// Every node reachable from `node_id`.
pub fn downstream_of(node_id: &str, nodes: &[Node], edges: &[Edge]) -> BTreeSet<String> {
    Graph::new(nodes, edges).downstream_of(node_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::NodeType;
    use serde_json::Value;

    fn make_nodes(ids: &[&str]) -> Vec<Node> {
        ids.iter().map(|id| Node::new(*id, NodeType::SetVariables, Value::Null)).collect()
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn linear_chain() {
        let nodes = make_nodes(&["a", "b", "c"]);
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "c")];

        assert_eq!(upstream_of("c", &nodes, &edges), set(&["a", "b"]));
        assert_eq!(downstream_of("a", &nodes, &edges), set(&["b", "c"]));
        assert!(upstream_of("a", &nodes, &edges).is_empty());
        assert!(downstream_of("c", &nodes, &edges).is_empty());
    }

    #[test]
    fn diamond_reports_each_ancestor_once() {
        //   A
        //  / \
        // B   C
        //  \ /
        //   D
        let nodes = make_nodes(&["a", "b", "c", "d"]);
        let edges = vec![
            Edge::new("a", "b"),
            Edge::new("a", "c"),
            Edge::new("b", "d"),
            Edge::new("c", "d"),
        ];

        let up = upstream_of("d", &nodes, &edges);
        assert_eq!(up, set(&["a", "b", "c"]));
        assert_eq!(up.len(), 3);
        assert_eq!(downstream_of("a", &nodes, &edges), set(&["b", "c", "d"]));
    }

    #[test]
    fn cycle_terminates_and_excludes_start() {
        // A → B → C → A  (cycle!)
        let nodes = make_nodes(&["a", "b", "c"]);
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "c"), Edge::new("c", "a")];

        assert_eq!(upstream_of("a", &nodes, &edges), set(&["b", "c"]));
        assert_eq!(downstream_of("a", &nodes, &edges), set(&["b", "c"]));
    }

    #[test]
    fn self_loop_is_not_self_upstream() {
        let nodes = make_nodes(&["a"]);
        let edges = vec![Edge::new("a", "a")];
        assert!(upstream_of("a", &nodes, &edges).is_empty());
    }

    #[test]
    fn dangling_edges_are_ignored() {
        let nodes = make_nodes(&["a", "b"]);
        let edges = vec![Edge::new("ghost", "b"), Edge::new("a", "b")];
        assert_eq!(upstream_of("b", &nodes, &edges), set(&["a"]));
    }

    #[test]
    fn parents_and_children() {
        let nodes = make_nodes(&["a", "b", "c"]);
        let edges = vec![Edge::new("a", "c"), Edge::new("b", "c")];
        let graph = Graph::new(&nodes, &edges);

        assert_eq!(graph.parents("c"), &["a", "b"]);
        assert_eq!(graph.children("a"), &["c"]);
        assert!(graph.children("c").is_empty());
    }

    #[test]
    fn upstream_of_downstream_never_contains_origin_in_a_dag() {
        let nodes = make_nodes(&["a", "b", "c", "d", "e"]);
        let edges = vec![
            Edge::new("a", "b"),
            Edge::new("a", "c"),
            Edge::new("b", "d"),
            Edge::new("c", "d"),
            Edge::new("d", "e"),
        ];
        let graph = Graph::new(&nodes, &edges);

        for origin in ["a", "b", "c", "d", "e"] {
            for descendant in graph.downstream_of(origin) {
                // The origin is upstream of its descendants, but never its own.
                assert!(graph.upstream_of(&descendant).contains(origin));
                assert!(!graph.upstream_of(origin).contains(origin));
            }
        }
    }
}
