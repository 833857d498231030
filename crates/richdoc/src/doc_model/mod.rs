//! Immutable tree-shaped document model.
//!
//! A [`Document`] owns an ordered sequence of top-level block nodes and a
//! monotonically increasing version counter. Nodes are held behind [`Arc`]
//! so a mutation rebuilds only the ancestor chain along the edited path and
//! re-references every untouched sibling and subtree; old documents stay
//! valid and usable after any edit.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

pub mod codec;
pub mod id;
pub mod path;

pub use id::{global_ids, IdGenerator, NodeId, SequentialIdGenerator, SessionIdGenerator};
pub use path::{resolve_children, resolve_node, update_children_at, update_node_at, Path};

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    /// A path descends into a text node or indexes out of range.
    #[error("INVALID_PATH")]
    InvalidPath,
    /// An operation found a text node where it expected an element, or
    /// vice versa.
    #[error("TYPE_MISMATCH")]
    TypeMismatch,
    /// A structurally invalid operation (bad offset, unknown kind, ...).
    #[error("INVALID_OPERATION: {0}")]
    InvalidOperation(String),
}

// ── Attributes & marks ────────────────────────────────────────────────────

/// Ordered attribute map. Insertion order is preserved through the codec.
pub type Attrs = IndexMap<String, Value>;

/// An inline formatting annotation attached to a run of text.
///
/// Two marks are equal iff their type and all attribute key/values match.
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    pub mark_type: String,
    pub attrs: Option<Attrs>,
}

impl Mark {
    pub fn new(mark_type: impl Into<String>) -> Self {
        Self {
            mark_type: mark_type.into(),
            attrs: None,
        }
    }

    pub fn with_attrs(mark_type: impl Into<String>, attrs: Attrs) -> Self {
        Self {
            mark_type: mark_type.into(),
            attrs: Some(attrs),
        }
    }
}

// ── Nodes ─────────────────────────────────────────────────────────────────

/// A node in the document tree: an element container or a text leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

/// A block or inline container with a type tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub id: NodeId,
    pub node_type: String,
    pub attrs: Attrs,
    pub children: Vec<Arc<Node>>,
}

/// A leaf holding a text run and its marks.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub id: NodeId,
    pub text: String,
    pub marks: Vec<Mark>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Element(el) => el.id,
            Node::Text(t) => t.id,
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Element(_) => None,
            Node::Text(t) => Some(t),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }
}

impl ElementNode {
    pub fn new(id: NodeId, node_type: impl Into<String>) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            attrs: Attrs::new(),
            children: Vec::new(),
        }
    }

    /// Same identity, type, and attrs with a replacement child vector.
    pub fn with_children(&self, children: Vec<Arc<Node>>) -> Self {
        Self {
            id: self.id,
            node_type: self.node_type.clone(),
            attrs: self.attrs.clone(),
            children,
        }
    }
}

impl TextNode {
    pub fn new(id: NodeId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            marks: Vec::new(),
        }
    }

    /// Length in Unicode scalar values.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Concatenation of the direct text children of a block, in order.
///
/// Nested element children do not contribute; character offsets within a
/// block always refer to this flattened form.
pub fn flattened_text(children: &[Arc<Node>]) -> String {
    let mut out = String::new();
    for child in children {
        if let Node::Text(t) = &**child {
            out.push_str(&t.text);
        }
    }
    out
}

// ── Document ──────────────────────────────────────────────────────────────

/// The root value: stable identity, top-level blocks, and a version counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: NodeId,
    pub children: Vec<Arc<Node>>,
    pub version: u64,
}

impl Document {
    /// A new document holding a single empty paragraph, at version 0.
    pub fn empty(ids: &dyn IdGenerator) -> Self {
        let text = Arc::new(Node::Text(TextNode::new(ids.next_id(), "")));
        let para = ElementNode {
            id: ids.next_id(),
            node_type: "paragraph".to_string(),
            attrs: Attrs::new(),
            children: vec![text],
        };
        Self {
            id: ids.next_id(),
            children: vec![Arc::new(Node::Element(para))],
            version: 0,
        }
    }

    /// Same identity and version with a replacement block vector.
    pub fn with_children(&self, children: Vec<Arc<Node>>) -> Self {
        Self {
            id: self.id,
            children,
            version: self.version,
        }
    }
}

// ── Node type registry ────────────────────────────────────────────────────

/// Structural group of a node type, as exposed by the schema registry of the
/// embedding editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeGroup {
    Block,
    Inline,
    /// Void nodes never have children. The engine does not validate schema
    /// conformance; callers are expected not to hand void nodes text
    /// children in the first place.
    Void,
}

/// Per-type structural group lookup, consumed from the embedding editor.
pub trait NodeTypeRegistry {
    fn group_of(&self, node_type: &str) -> NodeGroup;
}

/// Standalone default: every type is a block.
pub struct BlockOnlyRegistry;

impl NodeTypeRegistry for BlockOnlyRegistry {
    fn group_of(&self, _node_type: &str) -> NodeGroup {
        NodeGroup::Block
    }
}
