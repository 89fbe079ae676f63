// Copyright (c) 2026 NoiseFS contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! The topic hierarchy (`spec.md` §3, §4.7.8): `(name, full_path,
//! sha256(path), parent, children, metadata)` nodes.
//!
//! `spec.md` §9 flags the source's bidirectional parent/child pointers as
//! a cyclic-reference hazard in a systems language; this is addressed by
//! arena allocation (`Vec<Node>` indexed by `usize`) rather than
//! `Rc`/`RefCell` cycles, per the teacher's general avoidance of raw
//! cyclic pointers.

use std::collections::HashMap;
use std::sync::RwLock;

use super::topic::{hash_topic, normalize_topic};

/// Index into the hierarchy's node arena.
pub type NodeId = usize;

/// One node in the topic tree.
#[derive(Clone, Debug)]
pub struct TopicNode {
    /// The final path component, e.g. `"action"` for `"movies/action"`.
    pub name: String,
    /// The full normalized path, e.g. `"movies/action"`.
    pub full_path: String,
    /// `sha256(full_path)`, 64 hex chars.
    pub hash: String,
    /// Parent node, or `None` for a root.
    pub parent: Option<NodeId>,
    /// Child nodes, insertion order.
    pub children: Vec<NodeId>,
    /// Free-form metadata (e.g. announcement counts), owned by callers.
    pub metadata: HashMap<String, String>,
}

/// A thread-safe, arena-allocated topic tree with path-keyed lookup,
/// supporting add/get/children/descendants/ancestors/related/find
/// (`spec.md` §4.7.8).
pub struct TopicHierarchy {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    nodes: Vec<TopicNode>,
    by_path: HashMap<String, NodeId>,
}

impl Default for TopicHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicHierarchy {
    /// Build an empty hierarchy.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Ensure `path` (and every ancestor implied by its `/`-separated
    /// components) exists, returning the leaf node's id. Idempotent.
    pub fn add(&self, path: &str) -> NodeId {
        let normalized = normalize_topic(path);
        let mut inner = self.inner.write().expect("topic hierarchy poisoned");
        Self::ensure_path(&mut inner, &normalized)
    }

    fn ensure_path(inner: &mut Inner, normalized: &str) -> NodeId {
        if let Some(&id) = inner.by_path.get(normalized) {
            return id;
        }
        let (parent_path, name) = match normalized.rsplit_once('/') {
            Some((parent, name)) => (Some(parent.to_string()), name.to_string()),
            None => (None, normalized.to_string()),
        };
        let parent = parent_path.as_deref().map(|p| Self::ensure_path(inner, p));

        let id = inner.nodes.len();
        inner.nodes.push(TopicNode {
            name,
            full_path: normalized.to_string(),
            hash: hash_topic(normalized),
            parent,
            children: Vec::new(),
            metadata: HashMap::new(),
        });
        inner.by_path.insert(normalized.to_string(), id);
        if let Some(parent_id) = parent {
            inner.nodes[parent_id].children.push(id);
        }
        id
    }

    /// Look up a node by its normalized path.
    pub fn get(&self, path: &str) -> Option<TopicNode> {
        let normalized = normalize_topic(path);
        let inner = self.inner.read().expect("topic hierarchy poisoned");
        inner.by_path.get(&normalized).map(|&id| inner.nodes[id].clone())
    }

    /// Direct children of `path`, if it exists.
    pub fn children(&self, path: &str) -> Vec<TopicNode> {
        let normalized = normalize_topic(path);
        let inner = self.inner.read().expect("topic hierarchy poisoned");
        let Some(&id) = inner.by_path.get(&normalized) else {
            return Vec::new();
        };
        inner.nodes[id]
            .children
            .iter()
            .map(|&c| inner.nodes[c].clone())
            .collect()
    }

    /// Every descendant of `path`, in breadth-first order.
    pub fn descendants(&self, path: &str) -> Vec<TopicNode> {
        let normalized = normalize_topic(path);
        let inner = self.inner.read().expect("topic hierarchy poisoned");
        let Some(&root) = inner.by_path.get(&normalized) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut queue: Vec<NodeId> = inner.nodes[root].children.clone();
        while let Some(id) = queue.pop() {
            out.push(inner.nodes[id].clone());
            queue.extend(inner.nodes[id].children.iter().copied());
        }
        out
    }

    /// Every ancestor of `path`, nearest parent first.
    pub fn ancestors(&self, path: &str) -> Vec<TopicNode> {
        let normalized = normalize_topic(path);
        let inner = self.inner.read().expect("topic hierarchy poisoned");
        let Some(&id) = inner.by_path.get(&normalized) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut cur = inner.nodes[id].parent;
        while let Some(p) = cur {
            out.push(inner.nodes[p].clone());
            cur = inner.nodes[p].parent;
        }
        out
    }

    /// Siblings and cousins within `max_distance` tree hops of `path`
    /// (`spec.md` §4.7.8 "siblings and cousins, bounded distance").
    pub fn related(&self, path: &str, max_distance: usize) -> Vec<TopicNode> {
        let normalized = normalize_topic(path);
        let inner = self.inner.read().expect("topic hierarchy poisoned");
        let Some(&id) = inner.by_path.get(&normalized) else {
            return Vec::new();
        };

        // Walk up to max_distance ancestors, then collect all descendants
        // of each ancestor within the remaining budget, excluding `id`
        // itself and its own direct line.
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        seen.insert(id);

        let mut ancestor = id;
        for up in 1..=max_distance {
            let Some(parent) = inner.nodes[ancestor].parent else {
                break;
            };
            ancestor = parent;
            let remaining = max_distance - up;
            Self::collect_within(&inner, ancestor, remaining, &mut seen, &mut out);
        }
        out
    }

    fn collect_within(
        inner: &Inner,
        root: NodeId,
        depth: usize,
        seen: &mut std::collections::HashSet<NodeId>,
        out: &mut Vec<TopicNode>,
    ) {
        if seen.insert(root) {
            out.push(inner.nodes[root].clone());
        }
        if depth == 0 {
            return;
        }
        for &child in &inner.nodes[root].children {
            Self::collect_within(inner, child, depth - 1, seen, out);
        }
    }

    /// All nodes whose full path contains `substring` (a simple
    /// glob-free pattern search; `spec.md` §4.7.8 "pattern find").
    pub fn find(&self, substring: &str) -> Vec<TopicNode> {
        let needle = substring.to_lowercase();
        let inner = self.inner.read().expect("topic hierarchy poisoned");
        inner
            .nodes
            .iter()
            .filter(|n| n.full_path.contains(&needle))
            .cloned()
            .collect()
    }

    /// Total node count.
    pub fn len(&self) -> usize {
        self.inner.read().expect("topic hierarchy poisoned").nodes.len()
    }

    /// True if the hierarchy has no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_creates_implicit_ancestors() {
        let tree = TopicHierarchy::new();
        tree.add("movies/action/1990s");
        assert!(tree.get("movies").is_some());
        assert!(tree.get("movies/action").is_some());
        assert!(tree.get("movies/action/1990s").is_some());
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn add_is_idempotent() {
        let tree = TopicHierarchy::new();
        let a = tree.add("music/jazz");
        let b = tree.add("music/jazz");
        assert_eq!(a, b);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn children_and_descendants() {
        let tree = TopicHierarchy::new();
        tree.add("movies/action");
        tree.add("movies/comedy");
        tree.add("movies/action/1990s");

        assert_eq!(tree.children("movies").len(), 2);
        assert_eq!(tree.descendants("movies").len(), 3);
    }

    #[test]
    fn ancestors_walk_up_to_root() {
        let tree = TopicHierarchy::new();
        tree.add("movies/action/1990s");
        let ancestors = tree.ancestors("movies/action/1990s");
        assert_eq!(ancestors.len(), 2);
        assert_eq!(ancestors[0].full_path, "movies/action");
        assert_eq!(ancestors[1].full_path, "movies");
    }

    #[test]
    fn related_finds_siblings() {
        let tree = TopicHierarchy::new();
        tree.add("movies/action");
        tree.add("movies/comedy");
        let related = tree.related("movies/action", 1);
        assert!(related.iter().any(|n| n.full_path == "movies/comedy"));
    }

    #[test]
    fn find_matches_substring() {
        let tree = TopicHierarchy::new();
        tree.add("movies/action");
        tree.add("music/jazz");
        assert_eq!(tree.find("act").len(), 1);
    }
}
