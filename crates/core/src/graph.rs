//! Generic directed graph with a keyed node registry
//!
//! Uses `petgraph::StableGraph` so node indices stay valid for the whole
//! build. Nothing is ever removed, which means node indices follow
//! registration order and edge indices follow insertion order. Traversal
//! relies on both: the sort result is a pure function of the sequence of
//! `add_node`/`add_edge` calls, never of content comparison.

use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;

use crate::error::{GraphError, Result};

/// Content that can be stored in a [`Graph`]
///
/// The key identifies the node in the registry and must not change for
/// the lifetime of the node.
pub trait NodeContent {
    fn key(&self) -> String;
}

impl NodeContent for String {
    fn key(&self) -> String {
        self.clone()
    }
}

/// A single vertex: an immutable key plus its content
#[derive(Debug, Clone)]
pub struct GraphNode<T> {
    key: String,
    content: T,
}

impl<T> GraphNode<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content(&self) -> &T {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut T {
        &mut self.content
    }
}

/// Directed graph keyed by [`NodeContent::key`]
///
/// Edges point from a dependent to its dependency, so a sorted walk emits
/// leaves first.
#[derive(Debug, Clone)]
pub struct Graph<T> {
    /// The underlying stable graph (private to enforce encapsulation)
    inner: StableGraph<GraphNode<T>, ()>,
    /// Key to index lookup; one entry per node
    registry: HashMap<String, NodeIndex>,
}

struct Frame {
    node: NodeIndex,
    adjacent: Vec<NodeIndex>,
    cursor: usize,
}

impl<T: NodeContent> Graph<T> {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self {
            inner: StableGraph::new(),
            registry: HashMap::new(),
        }
    }

    /// Register `content` under its key
    ///
    /// Idempotent: if the key is already registered the existing index is
    /// returned and `content` is dropped.
    pub fn add_node(&mut self, content: T) -> NodeIndex {
        let key = content.key();
        if let Some(&index) = self.registry.get(&key) {
            return index;
        }
        let index = self.inner.add_node(GraphNode {
            key: key.clone(),
            content,
        });
        self.registry.insert(key, index);
        index
    }

    pub fn get_node(&self, key: &str) -> Result<&GraphNode<T>> {
        self.index_of(key)
            .and_then(|index| self.inner.node_weight(index))
            .ok_or_else(|| GraphError::not_found("node", key))
    }

    pub fn get_node_mut(&mut self, key: &str) -> Result<&mut GraphNode<T>> {
        match self.registry.get(key) {
            Some(&index) => self
                .inner
                .node_weight_mut(index)
                .ok_or_else(|| GraphError::not_found("node", key)),
            None => Err(GraphError::not_found("node", key)),
        }
    }

    /// Replace the content of an existing node, keeping its key and edges
    pub fn update_node(&mut self, key: &str, content: T) -> Result<()> {
        let new_key = content.key();
        if new_key != key {
            return Err(GraphError::Assertion(format!(
                "cannot re-key node {key} as {new_key}"
            )));
        }
        self.get_node_mut(key)?.content = content;
        Ok(())
    }

    /// Add an edge `source -> destination`
    ///
    /// No-op when the edge already exists. Returns `self` for chaining.
    pub fn add_edge(&mut self, source: NodeIndex, destination: NodeIndex) -> &mut Self {
        if self.inner.find_edge(source, destination).is_none() {
            self.inner.add_edge(source, destination, ());
        }
        self
    }

    pub fn has_edge(&self, source: NodeIndex, destination: NodeIndex) -> bool {
        self.inner.find_edge(source, destination).is_some()
    }

    pub fn index_of(&self, key: &str) -> Option<NodeIndex> {
        self.registry.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.registry.contains_key(key)
    }

    pub fn node(&self, index: NodeIndex) -> Option<&GraphNode<T>> {
        self.inner.node_weight(index)
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> Option<&mut GraphNode<T>> {
        self.inner.node_weight_mut(index)
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// All nodes in registration order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode<T>> {
        self.inner.node_weights()
    }

    /// Outbound neighbours of `index` in the order their edges were added
    ///
    /// petgraph lists neighbours most-recent-first, so edges are re-ordered
    /// by their (monotonic) edge index.
    pub fn adjacent(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .inner
            .edges(index)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// Depth-first post-order over the whole graph
    ///
    /// A node is emitted only after every adjacent node it reaches first.
    /// When `start` is given its subtree is emitted first; the remaining
    /// nodes follow in registration order. Nodes already visited are
    /// skipped, so in a cycle the first node entered is emitted last.
    pub fn get_sorted_nodes(&self, start: Option<&str>) -> Result<Vec<&GraphNode<T>>> {
        let mut visited = HashSet::with_capacity(self.node_count());
        let mut order = Vec::with_capacity(self.node_count());

        if let Some(key) = start {
            let index = self
                .index_of(key)
                .ok_or_else(|| GraphError::not_found("node", key))?;
            self.visit(index, &mut visited, &mut order);
        }
        for index in self.inner.node_indices() {
            self.visit(index, &mut visited, &mut order);
        }

        Ok(order
            .into_iter()
            .filter_map(|index| self.inner.node_weight(index))
            .collect())
    }

    /// Keys of the full sorted order
    pub fn top_sort(&self) -> Vec<String> {
        let mut visited = HashSet::with_capacity(self.node_count());
        let mut order = Vec::with_capacity(self.node_count());
        for index in self.inner.node_indices() {
            self.visit(index, &mut visited, &mut order);
        }
        order
            .into_iter()
            .filter_map(|index| self.inner.node_weight(index))
            .map(|node| node.key.clone())
            .collect()
    }

    // Explicit stack; mirrors the recursive visit exactly.
    fn visit(&self, start: NodeIndex, visited: &mut HashSet<NodeIndex>, order: &mut Vec<NodeIndex>) {
        if !visited.insert(start) {
            return;
        }
        let mut stack = vec![Frame {
            node: start,
            adjacent: self.adjacent(start),
            cursor: 0,
        }];
        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };
            match frame.adjacent.get(frame.cursor).copied() {
                Some(next) => {
                    frame.cursor += 1;
                    if visited.insert(next) {
                        let adjacent = self.adjacent(next);
                        stack.push(Frame {
                            node: next,
                            adjacent,
                            cursor: 0,
                        });
                    }
                }
                None => {
                    order.push(frame.node);
                    stack.pop();
                }
            }
        }
    }
}

impl<T: NodeContent> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}
