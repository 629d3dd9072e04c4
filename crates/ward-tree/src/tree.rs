use std::any::Any;
use std::fmt;
use std::rc::Rc;

use tracing::debug;
use ward_lexer::{Span, Token};

use crate::attributes::{AttributeKey, Attributes};
use crate::node::{NodeData, NodeId, NodeValue};
use crate::TreeError;

/// Arena owning every node of one compilation unit.
///
/// Nodes are never deallocated while the tree lives; a removed node becomes a
/// detached root that can be inserted again. Accessors index the arena
/// directly and panic when handed a [`NodeId`] from another tree.
pub struct Tree<V: NodeValue> {
    pub(crate) nodes: Vec<NodeData<V>>,
}

impl<V: NodeValue> Default for Tree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: NodeValue> Tree<V> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of nodes ever created, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Creates a detached node with no children.
    pub fn add_node(&mut self, value: V, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(value, span));
        id
    }

    /// Creates a node that adopts `children` in order.
    ///
    /// Every child must be detached and listed once, and the new payload must
    /// accept each of them.
    pub fn add_node_with_children(
        &mut self,
        value: V,
        span: Span,
        children: Vec<NodeId>,
    ) -> Result<NodeId, TreeError> {
        let id = NodeId(self.nodes.len());
        for (i, &child) in children.iter().enumerate() {
            if children[..i].contains(&child) {
                return Err(TreeError::AlreadyPresent { parent: id, child });
            }
            if self.node(child).attached {
                return Err(TreeError::AlreadyAttached { node: child });
            }
            if !value.accepts_child(&self.node(child).value) {
                return Err(TreeError::RejectedChild { parent: id, child });
            }
        }
        for &child in &children {
            self.node_mut(child).attached = true;
        }
        let mut data = NodeData::new(value, span);
        data.children = Rc::new(children);
        self.nodes.push(data);
        Ok(id)
    }

    pub(crate) fn node(&self, id: NodeId) -> &NodeData<V> {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData<V> {
        &mut self.nodes[id.0]
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn value(&self, id: NodeId) -> &V {
        &self.node(id).value
    }

    pub fn value_mut(&mut self, id: NodeId) -> Result<&mut V, TreeError> {
        self.check_not_frozen(id)?;
        Ok(&mut self.node_mut(id).value)
    }

    pub fn span(&self, id: NodeId) -> &Span {
        &self.node(id).span
    }

    pub fn set_span(&mut self, id: NodeId, span: Span) -> Result<(), TreeError> {
        self.check_not_frozen(id)?;
        self.node_mut(id).span = span;
        Ok(())
    }

    /// A snapshot of the child list.
    ///
    /// Later mutations of `id` do not affect the returned list.
    pub fn children(&self, id: NodeId) -> Rc<Vec<NodeId>> {
        Rc::clone(&self.node(id).children)
    }

    /// The current child list, borrowed.
    pub fn child_ids(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Whether the node sits in some parent's child list.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.node(id).attached
    }

    pub fn is_frozen(&self, id: NodeId) -> bool {
        self.node(id).frozen
    }

    pub fn comments(&self, id: NodeId) -> &[Token<V::CommentKind>] {
        &self.node(id).comments
    }

    pub fn set_comments(
        &mut self,
        id: NodeId,
        comments: Vec<Token<V::CommentKind>>,
    ) -> Result<(), TreeError> {
        self.check_not_frozen(id)?;
        self.node_mut(id).comments = comments;
        Ok(())
    }

    pub fn attributes(&self, id: NodeId) -> &Attributes {
        &self.node(id).attributes
    }

    pub fn attribute<T: Any>(&self, id: NodeId, key: AttributeKey<T>) -> Option<&T> {
        self.node(id).attributes.get(key)
    }

    /// Stores an attribute value, returning the one it replaces.
    pub fn set_attribute<T: Any>(
        &mut self,
        id: NodeId,
        key: AttributeKey<T>,
        value: T,
    ) -> Result<Option<T>, TreeError> {
        if self.node(id).attributes.is_frozen() {
            return Err(TreeError::Frozen { node: id });
        }
        Ok(self.node_mut(id).attributes.insert(key, value))
    }

    pub fn remove_attribute<T: Any>(
        &mut self,
        id: NodeId,
        key: AttributeKey<T>,
    ) -> Result<Option<T>, TreeError> {
        if self.node(id).attributes.is_frozen() {
            return Err(TreeError::Frozen { node: id });
        }
        Ok(self.node_mut(id).attributes.remove(key))
    }

    pub(crate) fn check_not_frozen(&self, id: NodeId) -> Result<(), TreeError> {
        if self.node(id).frozen {
            return Err(TreeError::Frozen { node: id });
        }
        Ok(())
    }

    /// Whether `target` is `root` or lies somewhere beneath it.
    pub fn contains(&self, root: NodeId, target: NodeId) -> bool {
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            if id == target {
                return true;
            }
            pending.extend(self.child_ids(id).iter().copied());
        }
        false
    }

    // -----------------------------------------------------------------------
    // Freezing
    // -----------------------------------------------------------------------

    /// Freezes the subtree under `id`: children first, then the node's
    /// attributes, then the node itself.
    ///
    /// Returns whether the whole subtree is now frozen. A payload that refuses
    /// to freeze leaves its node and every ancestor up to `id` mutable, while
    /// siblings that could be frozen stay frozen.
    pub fn make_immutable(&mut self, id: NodeId) -> bool {
        if self.node(id).frozen {
            return true;
        }
        let mut all_frozen = true;
        for child in self.children(id).iter() {
            all_frozen &= self.make_immutable(*child);
        }
        if !all_frozen || !self.node(id).value.freezable() {
            debug!(node = %id, "subtree could not be frozen");
            return false;
        }
        let node = self.node_mut(id);
        node.attributes.freeze();
        node.frozen = true;
        true
    }

    // -----------------------------------------------------------------------
    // Whole-subtree operations
    // -----------------------------------------------------------------------

    /// Whether two subtrees carry equal payloads in the same shape.
    ///
    /// Spans, comments and attributes are not compared.
    pub fn deep_equals(&self, a: NodeId, b: NodeId) -> bool
    where
        V: PartialEq,
    {
        if self.value(a) != self.value(b) {
            return false;
        }
        let (left, right) = (self.child_ids(a), self.child_ids(b));
        left.len() == right.len()
            && left
                .iter()
                .zip(right)
                .all(|(&x, &y)| self.deep_equals(x, y))
    }

    /// Indented dump of a subtree, one node per line.
    pub fn format_tree(&self, id: NodeId) -> String
    where
        V: fmt::Debug,
    {
        let mut out = String::new();
        self.format_node(id, 0, &mut out);
        out
    }

    fn format_node(&self, id: NodeId, depth: usize, out: &mut String)
    where
        V: fmt::Debug,
    {
        out.push_str(&format!("{}{:?}\n", "  ".repeat(depth), self.value(id)));
        for &child in self.child_ids(id) {
            self.format_node(child, depth + 1, out);
        }
    }
}

impl<V: NodeValue + Clone> Tree<V> {
    /// Copies a subtree into fresh nodes.
    ///
    /// The copy is detached and mutable. Payloads, spans and comments are
    /// cloned; attributes are derived facts about the original nodes and are
    /// not carried over.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let source = self.node(id);
        let mut data = NodeData::new(source.value.clone(), source.span.clone());
        data.comments = source.comments.clone();
        let children: Vec<NodeId> = self
            .children(id)
            .iter()
            .map(|&child| self.deep_clone(child))
            .collect();
        for &child in &children {
            self.node_mut(child).attached = true;
        }
        data.children = Rc::new(children);
        let copy = NodeId(self.nodes.len());
        self.nodes.push(data);
        copy
    }
}
