// src/core/config_tree.rs

//! # Config Tree
//!
//! Raw configuration documents address entries with dotted keys
//! (`"cloudify.existing_manager_ip": 10.0.0.1`). This module denormalizes those keys
//! into a tree stored in a flat arena: every node lives in a `Vec` and branches refer
//! to their children by index. Inserting a key walks one segment at a time, so the work
//! is bounded by the number of segments in the key and no cycle can ever be created.

use crate::constants::DELIMITER;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Index of a node inside the arena.
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Branch(BTreeMap<String, NodeId>),
    Leaf(Value),
}

/// An arena-backed tree of raw configuration values keyed by path segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigTree {
    nodes: Vec<Node>,
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigTree {
    /// The root branch. It always exists.
    pub const ROOT: NodeId = 0;

    /// An empty tree holding only the root branch.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::Branch(BTreeMap::new())],
        }
    }

    /// Inserts `value` under a dotted key such as `a.b.c`.
    pub fn insert_dotted(&mut self, dotted_key: &str, value: Value) {
        let segments: Vec<&str> = dotted_key.split(DELIMITER).collect();
        self.insert_path(&segments, value);
    }

    /// Inserts `value` at `segments`, creating intermediate branches as needed.
    ///
    /// A later insert replaces whatever sat at the same leaf. If an intermediate
    /// segment currently holds a leaf, that leaf is replaced by a branch.
    pub fn insert_path(&mut self, segments: &[&str], value: Value) {
        let Some((last, parents)) = segments.split_last() else {
            return;
        };

        let mut current = Self::ROOT;
        for segment in parents {
            current = self.child_branch(current, segment);
        }

        let leaf = self.alloc(Node::Leaf(value));
        self.set_child(current, last, leaf);
    }

    /// Merges every leaf of `other` into this tree, later values winning.
    pub fn merge(&mut self, other: &Self) {
        for (path, value) in other.leaves() {
            let segments: Vec<&str> = path.iter().map(String::as_str).collect();
            self.insert_path(&segments, value.clone());
        }
    }

    /// Returns every leaf with its full path, in key order.
    pub fn leaves(&self) -> Vec<(Vec<String>, &Value)> {
        let mut leaves = Vec::new();
        // Explicit stack; children are pushed in reverse so output stays sorted.
        let mut stack: Vec<(Vec<String>, NodeId)> = vec![(Vec::new(), Self::ROOT)];

        while let Some((path, id)) = stack.pop() {
            match self.nodes.get(id) {
                Some(Node::Leaf(value)) => leaves.push((path, value)),
                Some(Node::Branch(children)) => {
                    for (segment, child) in children.iter().rev() {
                        let mut child_path = path.clone();
                        child_path.push(segment.clone());
                        stack.push((child_path, *child));
                    }
                }
                None => {}
            }
        }
        leaves
    }

    /// Finds the node at `segments`, if any.
    pub fn node_at(&self, segments: &[&str]) -> Option<NodeId> {
        let mut current = Self::ROOT;
        for segment in segments {
            current = self.child(current, segment)?;
        }
        Some(current)
    }

    /// Returns `true` when something (leaf or branch) exists at `segments`.
    pub fn contains(&self, segments: &[&str]) -> bool {
        self.node_at(segments).is_some()
    }

    /// Returns `true` when the node at `segments` is a leaf.
    pub fn is_leaf(&self, segments: &[&str]) -> bool {
        self.node_at(segments)
            .is_some_and(|id| matches!(self.nodes.get(id), Some(Node::Leaf(_))))
    }

    /// Names of the children of the branch at `segments`. Empty for leaves and
    /// missing nodes.
    pub fn child_keys(&self, segments: &[&str]) -> Vec<String> {
        match self.node_at(segments).and_then(|id| self.nodes.get(id)) {
            Some(Node::Branch(children)) => children.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// The value at `segments` as JSON. Branches are rendered as nested objects.
    pub fn value_at(&self, segments: &[&str]) -> Option<Value> {
        self.node_at(segments).map(|id| self.to_json(id))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.nodes.get(Self::ROOT), Some(Node::Branch(children)) if children.is_empty())
    }

    /// Renders the subtree rooted at `id`. Recursion depth is bounded by the number
    /// of segments in the longest inserted key.
    fn to_json(&self, id: NodeId) -> Value {
        match self.nodes.get(id) {
            Some(Node::Leaf(value)) => value.clone(),
            Some(Node::Branch(children)) => {
                let map: Map<String, Value> = children
                    .iter()
                    .map(|(segment, child)| (segment.clone(), self.to_json(*child)))
                    .collect();
                Value::Object(map)
            }
            None => Value::Null,
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn child(&self, parent: NodeId, segment: &str) -> Option<NodeId> {
        match self.nodes.get(parent) {
            Some(Node::Branch(children)) => children.get(segment).copied(),
            _ => None,
        }
    }

    /// Returns the branch child called `segment`, creating (or converting a leaf into)
    /// a branch when needed.
    fn child_branch(&mut self, parent: NodeId, segment: &str) -> NodeId {
        if let Some(id) = self.child(parent, segment)
            && matches!(self.nodes.get(id), Some(Node::Branch(_)))
        {
            return id;
        }
        let id = self.alloc(Node::Branch(BTreeMap::new()));
        self.set_child(parent, segment, id);
        id
    }

    fn set_child(&mut self, parent: NodeId, segment: &str, child: NodeId) {
        if let Some(Node::Branch(children)) = self.nodes.get_mut(parent) {
            children.insert(segment.to_string(), child);
        }
    }
}
