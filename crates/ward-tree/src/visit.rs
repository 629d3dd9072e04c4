//! Traversals that tolerate edits made by the visitor.
//!
//! The visitor gets the tree mutably together with an [`AncestorChain`] for
//! the node being visited. It may edit the subtree it is walking, with two
//! constraints: it must not edit ancestors of the current node, and it must
//! not edit siblings that have not been visited yet.
//!
//! Sibling iteration does not trust indices. After each visit the walk
//! re-reads the parent's child list and resumes after the last visited child
//! that is still in it, so a child list swapped out by copy-on-write, or a
//! node that removed or replaced itself, is handled.

use std::collections::VecDeque;
use std::rc::Rc;

use tracing::warn;

use crate::node::{NodeId, NodeValue};
use crate::tree::Tree;

/// The path from the traversal root to the node being visited.
///
/// A persistent stack: each link shares its tail with its siblings' chains.
/// Built fresh for every traversal and never stored on nodes.
#[derive(Debug)]
pub struct AncestorChain {
    node: NodeId,
    depth: usize,
    parent: Option<Rc<AncestorChain>>,
}

impl AncestorChain {
    pub fn root(node: NodeId) -> Rc<Self> {
        Rc::new(Self {
            node,
            depth: 0,
            parent: None,
        })
    }

    pub fn child(self: &Rc<Self>, node: NodeId) -> Rc<Self> {
        Rc::new(Self {
            node,
            depth: self.depth + 1,
            parent: Some(Rc::clone(self)),
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Zero at the traversal root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<&AncestorChain> {
        self.parent.as_deref()
    }

    pub fn parent_node(&self) -> Option<NodeId> {
        self.parent().map(AncestorChain::node)
    }

    /// Nodes from this one up to the traversal root.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(self), |chain| chain.parent()).map(AncestorChain::node)
    }
}

impl<V: NodeValue> Tree<V> {
    /// Visits `root` and its descendants, parents before children.
    ///
    /// When `visitor` returns `false` the children of that node are skipped.
    /// A node that was removed or replaced by its own visit is not descended
    /// into; the walk continues with whatever now follows the last visited
    /// sibling. Returns the visitor's answer for `root`.
    pub fn visit_pre_order<F>(&mut self, root: NodeId, mut visitor: F) -> bool
    where
        F: FnMut(&mut Tree<V>, &AncestorChain) -> bool,
    {
        self.pre_order(&AncestorChain::root(root), &mut visitor)
    }

    /// Visits the descendants of `root` and then `root`, children before
    /// parents.
    ///
    /// A node that is no longer in its parent's child list when its turn
    /// comes is not visited. Returns `false` as soon as `visitor` does,
    /// abandoning the rest of the walk.
    pub fn visit_post_order<F>(&mut self, root: NodeId, mut visitor: F) -> bool
    where
        F: FnMut(&mut Tree<V>, &AncestorChain) -> bool,
    {
        self.post_order(&AncestorChain::root(root), &mut visitor)
    }

    /// Visits `root` and its descendants level by level.
    ///
    /// The children of a node are queued only if the node is still in place
    /// after its visit. Returns `false` as soon as `visitor` does.
    pub fn visit_breadth_first<F>(&mut self, root: NodeId, mut visitor: F) -> bool
    where
        F: FnMut(&mut Tree<V>, &AncestorChain) -> bool,
    {
        let root = AncestorChain::root(root);
        if !visitor(self, &root) {
            return false;
        }
        let mut queue = VecDeque::from([root]);
        while let Some(parent) = queue.pop_front() {
            let finished = self.walk_children(&parent, |tree, chain| {
                if !visitor(tree, &chain) {
                    return false;
                }
                if tree.is_in_place(&chain) {
                    queue.push_back(chain);
                }
                true
            });
            if !finished {
                return false;
            }
        }
        true
    }

    fn pre_order<F>(&mut self, chain: &Rc<AncestorChain>, visitor: &mut F) -> bool
    where
        F: FnMut(&mut Tree<V>, &AncestorChain) -> bool,
    {
        if !visitor(self, chain) {
            return false;
        }
        if self.is_in_place(chain) {
            self.walk_children(chain, |tree, child| {
                tree.pre_order(&child, visitor);
                true
            });
        }
        true
    }

    fn post_order<F>(&mut self, chain: &Rc<AncestorChain>, visitor: &mut F) -> bool
    where
        F: FnMut(&mut Tree<V>, &AncestorChain) -> bool,
    {
        if !self.walk_children(chain, |tree, child| tree.post_order(&child, visitor)) {
            return false;
        }
        if self.is_in_place(chain) {
            return visitor(self, chain);
        }
        true
    }

    /// Whether the chain's node is still a child of the chain's parent.
    /// The traversal root is always in place.
    fn is_in_place(&self, chain: &AncestorChain) -> bool {
        match chain.parent_node() {
            Some(parent) => self.child_ids(parent).contains(&chain.node()),
            None => true,
        }
    }

    /// Calls `step` on each child of the chain's node, left to right, until
    /// it returns `false`. Returns whether every child was stepped over.
    fn walk_children<F>(&mut self, parent: &Rc<AncestorChain>, mut step: F) -> bool
    where
        F: FnMut(&mut Tree<V>, Rc<AncestorChain>) -> bool,
    {
        let mut last_visited: Option<NodeId> = None;
        loop {
            let children = self.children(parent.node());
            let next = match last_visited {
                None => 0,
                Some(previous) => match children.iter().position(|&id| id == previous) {
                    Some(index) => index + 1,
                    None => {
                        warn!(
                            parent = %parent.node(),
                            child = %previous,
                            "traversal continuation vanished; stopping sibling walk"
                        );
                        return true;
                    }
                },
            };
            let Some(&child) = children.get(next) else {
                return true;
            };
            drop(children);

            if !step(self, parent.child(child)) {
                return false;
            }
            if self.child_ids(parent.node()).contains(&child) {
                last_visited = Some(child);
            }
        }
    }
}
