//! Transactional edits of a node's child list.
//!
//! A [`Mutation`] queues replacements, insertions and removals against one
//! parent and applies them in order when executed. If any change fails, or
//! the parent's payload rejects the resulting children, every applied change
//! is undone in reverse order and the tree is left as it was.
//!
//! The child list is copied on the first write, so snapshots taken with
//! [`Tree::children`] before the edit keep their contents.

use std::rc::Rc;

use tracing::{debug, error};

use crate::node::{NodeId, NodeValue};
use crate::tree::Tree;
use crate::TreeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Replace { replacement: NodeId, child: NodeId },
    Insert { node: NodeId, before: Option<NodeId> },
    Remove { child: NodeId },
}

/// What an applied change did, with enough detail to undo it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Applied {
    Replaced { index: usize, replacement: NodeId, child: NodeId },
    Inserted { index: usize, node: NodeId },
    Removed { index: usize, child: NodeId },
}

/// A batch of child-list edits against one parent.
///
/// ```
/// # use ward_lexer::{ScriptTokenKind, Span};
/// # use ward_tree::{NodeValue, Tree};
/// # #[derive(Debug)]
/// # struct Stmt;
/// # impl NodeValue for Stmt { type CommentKind = ScriptTokenKind; }
/// let mut tree = Tree::new();
/// let old = tree.add_node(Stmt, Span::predefined());
/// let root = tree.add_node_with_children(Stmt, Span::predefined(), vec![old]).unwrap();
/// let guard = tree.add_node(Stmt, Span::predefined());
/// let new = tree.add_node(Stmt, Span::predefined());
///
/// tree.mutate(root)
///     .insert_before(guard, Some(old))
///     .replace_child(new, old)
///     .execute()
///     .unwrap();
/// assert_eq!(tree.child_ids(root), &[guard, new]);
/// ```
#[must_use = "a mutation does nothing until executed"]
pub struct Mutation<'t, V: NodeValue> {
    tree: &'t mut Tree<V>,
    parent: NodeId,
    changes: Vec<Change>,
}

impl<'t, V: NodeValue> Mutation<'t, V> {
    /// Queues replacing `child` with the detached node `replacement`.
    pub fn replace_child(mut self, replacement: NodeId, child: NodeId) -> Self {
        self.changes.push(Change::Replace { replacement, child });
        self
    }

    /// Queues inserting the detached `node` before `before`, or at the end.
    pub fn insert_before(mut self, node: NodeId, before: Option<NodeId>) -> Self {
        self.changes.push(Change::Insert { node, before });
        self
    }

    pub fn append_child(self, node: NodeId) -> Self {
        self.insert_before(node, None)
    }

    pub fn remove_child(mut self, child: NodeId) -> Self {
        self.changes.push(Change::Remove { child });
        self
    }

    /// Applies every queued change, or none of them.
    pub fn execute(self) -> Result<(), TreeError> {
        let Mutation {
            tree,
            parent,
            changes,
        } = self;
        tree.check_not_frozen(parent)?;

        let mut applied = Vec::with_capacity(changes.len());
        for change in &changes {
            match tree.apply(parent, *change) {
                Ok(done) => applied.push(done),
                Err(err) => return Err(tree.rollback(parent, &applied, err)),
            }
        }
        if let Some(child) = tree.first_rejected_child(parent) {
            let err = TreeError::RejectedChild { parent, child };
            return Err(tree.rollback(parent, &applied, err));
        }

        debug!(parent = %parent, changes = applied.len(), "committed tree mutation");
        Ok(())
    }
}

impl<V: NodeValue> Tree<V> {
    /// Starts a batch of edits to the children of `parent`.
    pub fn mutate(&mut self, parent: NodeId) -> Mutation<'_, V> {
        Mutation {
            tree: self,
            parent,
            changes: Vec::new(),
        }
    }

    pub fn replace_child(
        &mut self,
        parent: NodeId,
        replacement: NodeId,
        child: NodeId,
    ) -> Result<(), TreeError> {
        self.mutate(parent).replace_child(replacement, child).execute()
    }

    pub fn insert_before(
        &mut self,
        parent: NodeId,
        node: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), TreeError> {
        self.mutate(parent).insert_before(node, before).execute()
    }

    pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> Result<(), TreeError> {
        self.mutate(parent).append_child(node).execute()
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.mutate(parent).remove_child(child).execute()
    }

    fn index_of(&self, parent: NodeId, child: NodeId) -> Result<usize, TreeError> {
        self.child_ids(parent)
            .iter()
            .position(|&id| id == child)
            .ok_or(TreeError::NotAChild { parent, child })
    }

    /// Checks that `node` can be adopted by `parent`.
    fn check_adoptable(&self, parent: NodeId, node: NodeId) -> Result<(), TreeError> {
        if self.child_ids(parent).contains(&node) {
            return Err(TreeError::AlreadyPresent {
                parent,
                child: node,
            });
        }
        if self.is_attached(node) {
            return Err(TreeError::AlreadyAttached { node });
        }
        // `node` is a detached root, so `parent` can only be inside it if the
        // edit would close a loop.
        if self.contains(node, parent) {
            return Err(TreeError::Cycle { parent, node });
        }
        Ok(())
    }

    fn child_list_mut(&mut self, parent: NodeId) -> &mut Vec<NodeId> {
        Rc::make_mut(&mut self.node_mut(parent).children)
    }

    fn apply(&mut self, parent: NodeId, change: Change) -> Result<Applied, TreeError> {
        match change {
            Change::Replace { replacement, child } => {
                self.check_adoptable(parent, replacement)?;
                let index = self.index_of(parent, child)?;
                self.child_list_mut(parent)[index] = replacement;
                self.node_mut(replacement).attached = true;
                self.node_mut(child).attached = false;
                Ok(Applied::Replaced {
                    index,
                    replacement,
                    child,
                })
            }
            Change::Insert { node, before } => {
                self.check_adoptable(parent, node)?;
                let index = match before {
                    Some(before) => self.index_of(parent, before)?,
                    None => self.child_ids(parent).len(),
                };
                self.child_list_mut(parent).insert(index, node);
                self.node_mut(node).attached = true;
                Ok(Applied::Inserted { index, node })
            }
            Change::Remove { child } => {
                let index = self.index_of(parent, child)?;
                self.child_list_mut(parent).remove(index);
                self.node_mut(child).attached = false;
                Ok(Applied::Removed { index, child })
            }
        }
    }

    /// Undoes `applied` in reverse order and returns the error to report.
    ///
    /// That is `cause`, unless the child list no longer matches the change
    /// log, in which case the tree cannot be trusted and the inconsistency is
    /// reported instead.
    pub(crate) fn rollback(
        &mut self,
        parent: NodeId,
        applied: &[Applied],
        cause: TreeError,
    ) -> TreeError {
        let mut result = cause;
        for done in applied.iter().rev() {
            if let Err(err) = self.undo(parent, *done) {
                error!(parent = %parent, error = %err, "tree mutation rollback is inconsistent");
                result = err;
            }
        }
        debug!(parent = %parent, undone = applied.len(), "rolled back tree mutation");
        result
    }

    fn undo(&mut self, parent: NodeId, done: Applied) -> Result<(), TreeError> {
        match done {
            Applied::Replaced {
                index,
                replacement,
                child,
            } => {
                if self.child_ids(parent).contains(&child) {
                    return Ok(());
                }
                if self.child_ids(parent).get(index) != Some(&replacement) {
                    return Err(TreeError::Inconsistent {
                        parent,
                        child: replacement,
                    });
                }
                self.child_list_mut(parent)[index] = child;
                self.node_mut(child).attached = true;
                self.node_mut(replacement).attached = false;
            }
            Applied::Inserted { index, node } => {
                // A later change that moved or dropped `node` must have been
                // undone already.
                if self.child_ids(parent).get(index) != Some(&node) {
                    return Err(TreeError::Inconsistent {
                        parent,
                        child: node,
                    });
                }
                self.child_list_mut(parent).remove(index);
                self.node_mut(node).attached = false;
            }
            Applied::Removed { index, child } => {
                if self.child_ids(parent).contains(&child) {
                    return Ok(());
                }
                if index > self.child_ids(parent).len() {
                    return Err(TreeError::Inconsistent { parent, child });
                }
                self.child_list_mut(parent).insert(index, child);
                self.node_mut(child).attached = true;
            }
        }
        Ok(())
    }

    fn first_rejected_child(&self, parent: NodeId) -> Option<NodeId> {
        let value = self.value(parent);
        self.child_ids(parent)
            .iter()
            .copied()
            .find(|&child| !value.accepts_child(self.value(child)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::{abc, block, leaf, names, Value};
    use pretty_assertions::assert_eq;

    fn child_names(tree: &Tree<Value>, parent: NodeId) -> Vec<&'static str> {
        names(tree, tree.child_ids(parent))
    }

    // =========================================================================
    // Single edits
    // =========================================================================

    #[test]
    fn test_replace_child() {
        let (mut tree, root, [_, b, _]) = abc();
        let x = leaf(&mut tree, "x");
        tree.replace_child(root, x, b).unwrap();
        assert_eq!(child_names(&tree, root), vec!["a", "x", "c"]);
        assert!(!tree.is_attached(b));
        assert!(tree.is_attached(x));
    }

    #[test]
    fn test_insert_before() {
        let (mut tree, root, [a, _, c]) = abc();
        let x = leaf(&mut tree, "x");
        let y = leaf(&mut tree, "y");
        tree.insert_before(root, x, Some(a)).unwrap();
        tree.insert_before(root, y, Some(c)).unwrap();
        assert_eq!(child_names(&tree, root), vec!["x", "a", "b", "y", "c"]);
    }

    #[test]
    fn test_append_and_remove() {
        let (mut tree, root, [a, ..]) = abc();
        let x = leaf(&mut tree, "x");
        tree.append_child(root, x).unwrap();
        tree.remove_child(root, a).unwrap();
        assert_eq!(child_names(&tree, root), vec!["b", "c", "x"]);
        assert!(!tree.is_attached(a));

        // A removed node is a detached root and can be adopted again.
        tree.insert_before(root, a, None).unwrap();
        assert_eq!(child_names(&tree, root), vec!["b", "c", "x", "a"]);
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_not_a_child() {
        let (mut tree, root, _) = abc();
        let x = leaf(&mut tree, "x");
        let y = leaf(&mut tree, "y");
        assert_eq!(
            tree.remove_child(root, x),
            Err(TreeError::NotAChild { parent: root, child: x })
        );
        assert_eq!(
            tree.insert_before(root, y, Some(x)),
            Err(TreeError::NotAChild { parent: root, child: x })
        );
        assert_eq!(
            tree.replace_child(root, y, x),
            Err(TreeError::NotAChild { parent: root, child: x })
        );
        assert!(!tree.is_attached(y));
    }

    #[test]
    fn test_already_present() {
        let (mut tree, root, [a, b, _]) = abc();
        assert_eq!(
            tree.insert_before(root, a, None),
            Err(TreeError::AlreadyPresent { parent: root, child: a })
        );
        assert_eq!(
            tree.replace_child(root, a, b),
            Err(TreeError::AlreadyPresent { parent: root, child: a })
        );
    }

    #[test]
    fn test_already_attached_elsewhere() {
        let (mut tree, root, [a, ..]) = abc();
        let other = block(&mut tree, "other", Vec::new());
        assert_eq!(
            tree.append_child(other, a),
            Err(TreeError::AlreadyAttached { node: a })
        );
        assert_eq!(tree.child_ids(root).len(), 3);
    }

    #[test]
    fn test_cycle() {
        let (mut tree, root, _) = abc();
        let inner = block(&mut tree, "inner", Vec::new());
        let outer = block(&mut tree, "outer", vec![inner]);
        assert_eq!(
            tree.append_child(inner, outer),
            Err(TreeError::Cycle { parent: inner, node: outer })
        );
        assert_eq!(
            tree.append_child(root, root),
            Err(TreeError::Cycle { parent: root, node: root })
        );
    }

    #[test]
    fn test_frozen_parent() {
        let (mut tree, root, [a, ..]) = abc();
        tree.make_immutable(root);
        assert_eq!(tree.remove_child(root, a), Err(TreeError::Frozen { node: root }));
        assert!(tree.is_attached(a));
    }

    #[test]
    fn test_frozen_child_can_move() {
        let (mut tree, root, [a, ..]) = abc();
        let x = leaf(&mut tree, "x");
        tree.make_immutable(x);
        tree.append_child(root, x).unwrap();
        tree.remove_child(root, a).unwrap();
        assert_eq!(child_names(&tree, root), vec!["b", "c", "x"]);
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    #[test]
    fn test_transaction_commits_in_order() {
        let (mut tree, root, [a, b, c]) = abc();
        let x = leaf(&mut tree, "x");
        let y = leaf(&mut tree, "y");
        tree.mutate(root)
            .remove_child(b)
            .insert_before(x, Some(c))
            .replace_child(y, a)
            .append_child(b)
            .execute()
            .unwrap();
        assert_eq!(child_names(&tree, root), vec!["y", "x", "c", "b"]);
        assert!(tree.is_attached(b));
        assert!(!tree.is_attached(a));
    }

    #[test]
    fn test_transaction_rolls_back_on_failure() {
        let (mut tree, root, [a, b, c]) = abc();
        let x = leaf(&mut tree, "x");
        let y = leaf(&mut tree, "y");
        let stranger = leaf(&mut tree, "stranger");
        let before = tree.children(root);

        let result = tree
            .mutate(root)
            .insert_before(x, Some(b))
            .replace_child(y, stranger)
            .execute();

        assert_eq!(
            result,
            Err(TreeError::NotAChild { parent: root, child: stranger })
        );
        assert_eq!(tree.child_ids(root), &[a, b, c]);
        assert_eq!(*before, vec![a, b, c]);
        assert!(!tree.is_attached(x));
        assert!(!tree.is_attached(y));
        assert!(!tree.is_attached(stranger));
    }

    #[test]
    fn test_rollback_restores_removed_and_replaced() {
        let (mut tree, root, [a, b, c]) = abc();
        let x = leaf(&mut tree, "x");
        let result = tree
            .mutate(root)
            .remove_child(a)
            .replace_child(x, c)
            .remove_child(a)
            .execute();
        assert_eq!(result, Err(TreeError::NotAChild { parent: root, child: a }));
        assert_eq!(tree.child_ids(root), &[a, b, c]);
        assert!(tree.is_attached(a));
        assert!(tree.is_attached(c));
        assert!(!tree.is_attached(x));
    }

    #[test]
    fn test_remove_then_reinsert_within_transaction() {
        let (mut tree, root, [a, b, c]) = abc();
        tree.mutate(root)
            .remove_child(a)
            .append_child(a)
            .execute()
            .unwrap();
        assert_eq!(tree.child_ids(root), &[b, c, a]);
        assert!(tree.is_attached(a));
    }

    #[test]
    fn test_rejected_child_rolls_back() {
        let mut tree = Tree::new();
        let a = leaf(&mut tree, "a");
        let b = leaf(&mut tree, "b");
        let root = block(&mut tree, "root", vec![a]);
        let result = tree.mutate(a).append_child(b).execute();
        assert_eq!(result, Err(TreeError::RejectedChild { parent: a, child: b }));
        assert!(tree.child_ids(a).is_empty());
        assert!(!tree.is_attached(b));
        assert_eq!(tree.child_ids(root), &[a]);
    }

    #[test]
    fn test_rollback_detects_inconsistency() {
        let (mut tree, root, [a, b, c]) = abc();
        let x = leaf(&mut tree, "x");
        // The log claims `x` went in at 0, but the list does not hold it there.
        let applied = [Applied::Inserted { index: 0, node: x }];
        let cause = TreeError::NotAChild { parent: root, child: x };
        assert_eq!(
            tree.rollback(root, &applied, cause),
            TreeError::Inconsistent { parent: root, child: x }
        );
        assert_eq!(tree.child_ids(root), &[a, b, c]);
    }

    // =========================================================================
    // Copy-on-write
    // =========================================================================

    #[test]
    fn test_snapshot_survives_removal() {
        let (mut tree, root, [a, b, c]) = abc();
        let view = tree.children(root);
        tree.remove_child(root, b).unwrap();
        assert_eq!(*view, vec![a, b, c]);
        assert_eq!(tree.child_ids(root), &[a, c]);
    }

    #[test]
    fn test_unshared_list_is_edited_in_place() {
        let (mut tree, root, [a, ..]) = abc();
        let before = Rc::as_ptr(&tree.node(root).children);
        tree.remove_child(root, a).unwrap();
        assert_eq!(Rc::as_ptr(&tree.node(root).children), before);
    }
}
