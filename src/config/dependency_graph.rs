// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::config::GraphConfig;

/// Newtype wrapper for node adjacency: node id -> ids of its downstream nodes.
///
/// Edges come from matching stream names between one node's outputs and
/// another node's inputs. Input ports declared as back edges contribute no
/// edge, so a well-formed graph is acyclic here.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph(pub BTreeMap<String, BTreeSet<String>>);

impl DependencyGraph {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build the forward adjacency of a graph description.
    ///
    /// Nodes with duplicate ids collapse onto one vertex, and streams with
    /// several producers connect every producer; validation reports both.
    pub fn from_config(config: &GraphConfig) -> Self {
        let mut producers: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &config.nodes {
            for stream in node.outputs.values() {
                producers.entry(stream.as_str()).or_default().push(node.id.as_str());
            }
        }

        let mut graph = Self::new();
        for node in &config.nodes {
            graph.0.entry(node.id.clone()).or_default();
        }

        for node in &config.nodes {
            for (port, stream) in &node.inputs {
                if node.back_edges.iter().any(|p| p == port) {
                    continue;
                }
                for producer in producers.get(stream.as_str()).into_iter().flatten() {
                    graph.add_edge(producer, &node.id);
                }
            }
        }

        graph
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.0.entry(to.to_string()).or_default();
        self.0.entry(from.to_string()).or_default().insert(to.to_string());
    }

    /// Get the downstream nodes of a node
    pub fn get_dependents(&self, node_id: &str) -> Option<&BTreeSet<String>> {
        self.0.get(node_id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// First cycle found by depth-first search, as a closed path `[a, b, .., a]`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for node_id in self.0.keys() {
            if !visited.contains(node_id.as_str()) {
                if let Some(cycle) =
                    self.dfs_cycle_detection(node_id, &mut visited, &mut rec_stack, &mut path)
                {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn dfs_cycle_detection<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        if let Some(neighbors) = self.0.get(node) {
            for neighbor in neighbors {
                let neighbor = neighbor.as_str();
                if !visited.contains(neighbor) {
                    if let Some(cycle) = self.dfs_cycle_detection(neighbor, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(neighbor) {
                    let cycle_start = path.iter().position(|x| *x == neighbor).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[cycle_start..].iter().map(|s| s.to_string()).collect();
                    cycle.push(neighbor.to_string());
                    return Some(cycle);
                }
            }
        }

        rec_stack.remove(node);
        path.pop();
        None
    }

    /// Topological level of each node: 0 for nodes with no upstream node,
    /// otherwise one more than the deepest upstream node.
    ///
    /// Returns `None` if the graph has a cycle.
    pub fn topological_levels(&self) -> Option<HashMap<String, usize>> {
        let mut in_degree: HashMap<&str, usize> =
            self.0.keys().map(|id| (id.as_str(), 0)).collect();
        for dependents in self.0.values() {
            for dependent in dependents {
                *in_degree.entry(dependent.as_str()).or_insert(0) += 1;
            }
        }

        let mut levels: HashMap<String, usize> = HashMap::new();
        let mut current: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut level = 0;

        while !current.is_empty() {
            let mut next = Vec::new();
            for node in current {
                levels.insert(node.to_string(), level);
                for dependent in self.0.get(node).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(dependent.as_str());
                        }
                    }
                }
            }
            current = next;
            level += 1;
        }

        (levels.len() == self.0.len()).then_some(levels)
    }
}

impl From<BTreeMap<String, BTreeSet<String>>> for DependencyGraph {
    fn from(graph: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;

    fn graph_of(nodes: Vec<NodeConfig>) -> DependencyGraph {
        DependencyGraph::from_config(&GraphConfig {
            nodes,
            ..GraphConfig::default()
        })
    }

    #[test]
    fn test_edges_follow_stream_names() {
        let graph = graph_of(vec![
            NodeConfig::new("a", "k").output("out", "s1"),
            NodeConfig::new("b", "k").input("in", "s1").output("out", "s2"),
            NodeConfig::new("c", "k").input("x", "s1").input("y", "s2"),
        ]);

        let a: Vec<_> = graph.get_dependents("a").unwrap().iter().cloned().collect();
        assert_eq!(a, vec!["b", "c"]);
        assert!(graph.get_dependents("c").unwrap().is_empty());
    }

    #[test]
    fn test_topological_levels_diamond() {
        let graph = graph_of(vec![
            NodeConfig::new("src", "k").output("out", "s"),
            NodeConfig::new("left", "k").input("in", "s").output("out", "l"),
            NodeConfig::new("right", "k").input("in", "s").output("out", "r"),
            NodeConfig::new("join", "k").input("a", "l").input("b", "r"),
        ]);

        let levels = graph.topological_levels().unwrap();
        assert_eq!(levels["src"], 0);
        assert_eq!(levels["left"], 1);
        assert_eq!(levels["right"], 1);
        assert_eq!(levels["join"], 2);
    }

    #[test]
    fn test_find_cycle_reports_path() {
        let graph = graph_of(vec![
            NodeConfig::new("a", "k").input("in", "s3").output("out", "s1"),
            NodeConfig::new("b", "k").input("in", "s1").output("out", "s2"),
            NodeConfig::new("c", "k").input("in", "s2").output("out", "s3"),
        ]);

        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
        assert!(graph.topological_levels().is_none());
    }

    #[test]
    fn test_back_edge_breaks_cycle() {
        let graph = graph_of(vec![
            NodeConfig::new("a", "k")
                .input("in", "frames")
                .input("loop", "feedback")
                .back_edge("loop")
                .output("out", "s1"),
            NodeConfig::new("b", "k").input("in", "s1").output("out", "feedback"),
        ]);

        assert!(graph.find_cycle().is_none());
        assert_eq!(graph.topological_levels().unwrap()["b"], 1);
    }
}
