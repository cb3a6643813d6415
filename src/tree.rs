//! Parse tree storage.
//!
//! A [`Tree`] owns every node of one parse in a flat arena and refers to them
//! by [`NodeId`]. Merging two trees moves the source arena wholesale into the
//! destination, remapping indices, and consumes the source value so it cannot
//! be used afterwards.
//!
//! Two traversals are provided:
//!
//! - [`Tree::preorder`] walks the tree read-only with a [`Visitor`] that can
//!   descend, skip a subtree or stop the walk.
//! - [`Tree::rewrite`] walks it with a callback that may also remove a node or
//!   replace it with a list of other nodes. Replacement happens through a
//!   worklist, so sibling order stays stable and no child list is mutated
//!   while it is being iterated.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::ser::{SerializeSeq, SerializeStruct, Serializer};

use crate::diag::Locus;
use crate::value::Value;

/// Index of a node inside the [`Tree`] that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Block form: `tag label { ... }`.
    Statement,
    /// Leaf form: `tag label;`.
    Parameter,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub tag: String,
    pub label: Option<Value>,
    pub locus: Locus,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_statement(&self) -> bool {
        self.kind == NodeKind::Statement
    }

    /// The label when it is a plain string.
    pub fn label_str(&self) -> Option<&str> {
        self.label.as_ref().and_then(Value::as_str)
    }
}

/// What a [`Visitor`] wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Descend into the children of this node.
    Continue,
    /// Do not visit the children of this node.
    Skip,
    /// Abandon the walk.
    Stop,
}

pub trait Visitor {
    fn enter(&mut self, tree: &Tree, id: NodeId) -> Visit;

    /// Called after the children of a statement entered with
    /// [`Visit::Continue`] have been visited. Only `Stop` has an effect.
    fn leave(&mut self, _tree: &Tree, _id: NodeId) -> Visit {
        Visit::Continue
    }
}

/// Outcome of a [`Tree::rewrite`] callback for the node being visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Keep the node and descend into its children.
    Keep,
    /// Keep the node but leave its children alone.
    Skip,
    /// Drop the node and its subtree.
    Remove,
    /// Put these nodes where the current one stood. They are not visited.
    Replace(Vec<NodeId>),
    /// Put these nodes where the current one stood and visit them next.
    Splice(Vec<NodeId>),
    /// Keep the node and stop rewriting.
    Stop,
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    source: Option<PathBuf>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty tree that remembers the file it was read from.
    pub fn with_source(path: impl Into<PathBuf>) -> Self {
        Tree {
            source: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of nodes reachable from the roots.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Allocate a node and append it to `parent`'s children, or to the roots
    /// when `parent` is `None`.
    pub fn push(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        tag: impl Into<String>,
        label: Option<Value>,
        locus: Locus,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            tag: tag.into(),
            label,
            locus,
            children: Vec::new(),
            parent,
        });
        match parent {
            Some(p) => {
                debug_assert!(self.node(p).is_statement(), "parameters cannot own children");
                self.nodes[p.0].children.push(id);
            }
            None => self.roots.push(id),
        }
        id
    }

    /// Append the root sequence of `other` after this tree's roots. An empty
    /// destination adopts `other` as is.
    pub fn union(&mut self, other: Tree) {
        if self.is_empty() && self.nodes.is_empty() {
            let source = self.source.take();
            *self = other;
            if self.source.is_none() {
                self.source = source;
            }
            return;
        }
        let roots = self.graft(other, None);
        self.roots.extend(roots);
    }

    /// Move all nodes of `other` into this arena without attaching them.
    /// Returns the remapped root ids, whose parent is set to `parent`.
    pub fn graft(&mut self, other: Tree, parent: Option<NodeId>) -> Vec<NodeId> {
        let offset = self.nodes.len();
        let shift = |id: NodeId| NodeId(id.0 + offset);

        self.nodes.extend(other.nodes.into_iter().map(|mut node| {
            node.children.iter_mut().for_each(|c| *c = shift(*c));
            node.parent = node.parent.map(shift);
            node
        }));

        let roots: Vec<NodeId> = other.roots.into_iter().map(shift).collect();
        for &r in &roots {
            self.nodes[r.0].parent = parent;
        }
        roots
    }

    /// Walk the tree in source order. Returns `false` if the visitor stopped
    /// the walk.
    pub fn preorder<V: Visitor + ?Sized>(&self, visitor: &mut V) -> bool {
        self.walk(&self.roots, visitor)
    }

    /// Walk only the subtree rooted at `id` (inclusive).
    pub fn preorder_from<V: Visitor + ?Sized>(&self, id: NodeId, visitor: &mut V) -> bool {
        self.walk(&[id], visitor)
    }

    fn walk<V: Visitor + ?Sized>(&self, ids: &[NodeId], visitor: &mut V) -> bool {
        for &id in ids {
            match visitor.enter(self, id) {
                Visit::Stop => return false,
                Visit::Skip => continue,
                Visit::Continue => {}
            }
            let node = self.node(id);
            if node.is_statement() {
                if !self.walk(&node.children, visitor) {
                    return false;
                }
                if visitor.leave(self, id) == Visit::Stop {
                    return false;
                }
            }
        }
        true
    }

    /// Preorder iterator over every reachable node id.
    pub fn iter(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Rewrite the tree in preorder. See [`Rewrite`] for what the callback can
    /// do with each node. Returns `false` if the callback stopped the pass.
    pub fn rewrite<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut(&mut Tree, NodeId) -> Rewrite,
    {
        let roots = std::mem::take(&mut self.roots);
        let (roots, stopped) = self.rewrite_level(None, roots, &mut f);
        self.roots = roots;
        !stopped
    }

    fn rewrite_level<F>(
        &mut self,
        parent: Option<NodeId>,
        ids: Vec<NodeId>,
        f: &mut F,
    ) -> (Vec<NodeId>, bool)
    where
        F: FnMut(&mut Tree, NodeId) -> Rewrite,
    {
        let mut queue: VecDeque<NodeId> = ids.into();
        let mut out = Vec::with_capacity(queue.len());
        let mut stopped = false;

        while let Some(id) = queue.pop_front() {
            if stopped {
                out.push(id);
                continue;
            }
            match f(self, id) {
                Rewrite::Keep => {
                    out.push(id);
                    if self.node(id).is_statement() {
                        let kids = std::mem::take(&mut self.nodes[id.0].children);
                        let (kids, s) = self.rewrite_level(Some(id), kids, f);
                        self.nodes[id.0].children = kids;
                        stopped = s;
                    }
                }
                Rewrite::Skip => out.push(id),
                Rewrite::Remove => {}
                Rewrite::Replace(ids) => out.extend(ids),
                Rewrite::Splice(ids) => {
                    for n in ids.into_iter().rev() {
                        queue.push_front(n);
                    }
                }
                Rewrite::Stop => {
                    out.push(id);
                    stopped = true;
                }
            }
        }

        for &id in &out {
            self.nodes[id.0].parent = parent;
        }
        (out, stopped)
    }

    /// Drop arena slots no longer reachable from the roots and renumber the
    /// rest in preorder.
    pub fn compact(&mut self) {
        let order: Vec<NodeId> = self.iter().collect();
        if order.len() == self.nodes.len() {
            return;
        }
        let mut map = vec![usize::MAX; self.nodes.len()];
        for (new, old) in order.iter().enumerate() {
            map[old.0] = new;
        }
        let remap = |id: NodeId| NodeId(map[id.0]);

        let mut old_nodes: Vec<Option<Node>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        self.nodes = order
            .iter()
            .filter_map(|old| old_nodes[old.0].take())
            .map(|mut node| {
                node.children = node.children.iter().map(|c| remap(*c)).collect();
                node.parent = node.parent.map(remap);
                node
            })
            .collect();
        self.roots = self.roots.iter().map(|r| remap(*r)).collect();
    }

    /// Tags from the root down to `id`, joined with `/`.
    pub fn node_path(&self, id: NodeId) -> String {
        let mut tags = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            let node = self.node(c);
            tags.push(node.tag.as_str());
            cur = node.parent;
        }
        tags.reverse();
        tags.join("/")
    }
}

pub struct Preorder<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.node(id).children.iter().rev().copied());
        Some(id)
    }
}

struct NodeRef<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl Serialize for NodeRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.tree.node(self.id);
        let mut st = serializer.serialize_struct("Node", 5)?;
        st.serialize_field("kind", &node.kind)?;
        st.serialize_field("tag", &node.tag)?;
        st.serialize_field("label", &node.label)?;
        st.serialize_field("locus", &node.locus)?;
        st.serialize_field(
            "children",
            &Nodes {
                tree: self.tree,
                ids: &node.children,
            },
        )?;
        st.end()
    }
}

struct Nodes<'a> {
    tree: &'a Tree,
    ids: &'a [NodeId],
}

impl Serialize for Nodes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.ids.len()))?;
        for &id in self.ids {
            seq.serialize_element(&NodeRef {
                tree: self.tree,
                id,
            })?;
        }
        seq.end()
    }
}

/// A tree serializes as its list of root nodes, each with nested children.
impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Nodes {
            tree: self,
            ids: &self.roots,
        }
        .serialize(serializer)
    }
}
