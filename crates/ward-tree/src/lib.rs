//! Ward Tree
//!
//! A mutable parse tree for rewrite passes. Nodes live in an arena owned by a
//! [`Tree`] and are addressed by [`NodeId`]; a node has a payload, a source
//! span, an ordered child list, attached comments and typed attributes.
//!
//! Child lists are copy-on-write: [`Tree::children`] hands out a snapshot that
//! stays stable while the tree is edited. Edits are grouped into a
//! [`Mutation`] that either commits every change or rolls all of them back.
//! Traversals ([`Tree::visit_pre_order`], [`Tree::visit_post_order`],
//! [`Tree::visit_breadth_first`]) let the visitor edit the subtree it is
//! walking.
//!
//! ```
//! use ward_lexer::{ScriptTokenKind, Span};
//! use ward_tree::{NodeValue, Tree};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Stmt(&'static str);
//!
//! impl NodeValue for Stmt {
//!     type CommentKind = ScriptTokenKind;
//! }
//!
//! let mut tree = Tree::new();
//! let block = tree.add_node(Stmt("block"), Span::predefined());
//! let a = tree.add_node(Stmt("a"), Span::predefined());
//! let b = tree.add_node(Stmt("b"), Span::predefined());
//! tree.append_child(block, a).unwrap();
//! tree.insert_before(block, b, Some(a)).unwrap();
//! assert_eq!(tree.child_ids(block), &[b, a]);
//! ```

pub mod attributes;
pub mod mutation;
pub mod node;
pub mod tree;
pub mod visit;

pub use attributes::{AttributeKey, Attributes};
pub use mutation::Mutation;
pub use node::{NodeId, NodeValue};
pub use tree::Tree;
pub use visit::AncestorChain;

/// A structural edit that could not be made.
///
/// These are programming errors in the caller. A failed [`Mutation`] has
/// already restored the tree by the time one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("{child} is already a child of {parent}")]
    AlreadyPresent { parent: NodeId, child: NodeId },

    #[error("{node} is already attached to another parent")]
    AlreadyAttached { node: NodeId },

    #[error("adding {node} under {parent} would create a cycle")]
    Cycle { parent: NodeId, node: NodeId },

    #[error("{node} is frozen")]
    Frozen { node: NodeId },

    #[error("{parent} does not accept {child} as a child")]
    RejectedChild { parent: NodeId, child: NodeId },

    /// Rolling back a mutation found the child list in a state the change log
    /// does not explain.
    #[error("rollback found {child} out of place under {parent}")]
    Inconsistent { parent: NodeId, child: NodeId },
}
