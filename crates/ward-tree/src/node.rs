use std::fmt;
use std::rc::Rc;

use ward_lexer::{Span, Token};

use crate::attributes::Attributes;

/// Handle to a node in a [`Tree`](crate::Tree).
///
/// Two handles are equal only when they name the same node; structurally
/// identical subtrees are still distinct nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Payload carried by every node of a tree.
///
/// The payload decides which children a node may hold and whether it can be
/// frozen.
pub trait NodeValue {
    /// Token kind of the comments attached to nodes.
    type CommentKind: Clone + fmt::Debug;

    /// Whether a node carrying `self` may hold a child carrying `child`.
    ///
    /// Checked for every child after a mutation has been applied. A rejected
    /// child rolls the whole mutation back.
    fn accepts_child(&self, _child: &Self) -> bool {
        true
    }

    /// Whether a node carrying `self` may be made immutable.
    fn freezable(&self) -> bool {
        true
    }
}

pub(crate) struct NodeData<V: NodeValue> {
    pub(crate) value: V,
    pub(crate) span: Span,
    /// Shared with every snapshot handed out by `Tree::children`.
    pub(crate) children: Rc<Vec<NodeId>>,
    pub(crate) comments: Vec<Token<V::CommentKind>>,
    pub(crate) attributes: Attributes,
    pub(crate) frozen: bool,
    /// Set while the node sits in some parent's child list.
    pub(crate) attached: bool,
}

impl<V: NodeValue> NodeData<V> {
    pub(crate) fn new(value: V, span: Span) -> Self {
        Self {
            value,
            span,
            children: Rc::new(Vec::new()),
            comments: Vec::new(),
            attributes: Attributes::default(),
            frozen: false,
            attached: false,
        }
    }
}
