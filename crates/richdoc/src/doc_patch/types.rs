//! Core types for the operation engine.

use std::sync::Arc;

use crate::doc_model::{Attrs, Document, Mark, Node, Path};
use crate::doc_position::EditorSelection;

// ── Transaction provenance ────────────────────────────────────────────────

/// Well-known transaction origins. Origins are open-ended strings; these are
/// the ones this crate itself gives meaning to.
pub mod origin {
    pub const INPUT: &str = "input";
    pub const COMMAND: &str = "command";
    pub const REMOTE: &str = "remote";
    pub const HISTORY_UNDO: &str = "history:undo";
    pub const HISTORY_REDO: &str = "history:redo";
}

// ── Op enum ───────────────────────────────────────────────────────────────

/// One atomic, typed tree mutation.
///
/// Offsets and lengths are signed so transformed operations can carry the
/// delete/delete no-op sentinel (`offset = -1`); [`apply`](super::apply)
/// validates ranges when folding.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Splice `data` into the text node at `path` at a char offset.
    InsertText {
        path: Path,
        offset: i64,
        data: String,
    },
    /// Remove `[offset, offset + length)` from the text node at `path`.
    DeleteText {
        path: Path,
        offset: i64,
        length: i64,
    },
    /// Insert `node` as a child of the element at `path` (document root for
    /// the empty path).
    InsertNode {
        path: Path,
        offset: i64,
        node: Arc<Node>,
    },
    /// Remove the child at `offset` of the element at `path`. A negative
    /// offset is the transform sentinel and folds as a no-op.
    DeleteNode { path: Path, offset: i64 },
    /// Replace the type tag of the element at `path`.
    SetNodeType { path: Path, node_type: String },
    /// Shallow-merge `attrs` over the element's attributes; `null` values
    /// remove keys.
    UpdateAttrs { path: Path, attrs: Attrs },
    /// Add `mark` over the flattened text range of the block at `path`.
    AddMark {
        path: Path,
        offset: i64,
        length: i64,
        mark: Mark,
    },
    /// Remove `mark` over the flattened text range of the block at `path`.
    /// A mark without attrs matches loosely by type.
    RemoveMark {
        path: Path,
        offset: i64,
        length: i64,
        mark: Mark,
    },
    /// Replace the child at `offset` with a fresh wrapper element holding it
    /// as sole child.
    WrapNode {
        path: Path,
        offset: i64,
        wrapper_type: String,
        wrapper_attrs: Attrs,
    },
    /// Replace the wrapper at `offset` with its own children, spliced in
    /// place.
    LiftNode { path: Path, offset: i64 },
    /// Remove the child at `(path, offset)` and re-insert it at
    /// `(target_path, target_offset)`.
    MoveNode {
        path: Path,
        offset: i64,
        target_path: Path,
        target_offset: i64,
    },
    /// Split the block at `path` into two siblings at child index `offset`.
    SplitNode { path: Path, offset: i64 },
    /// Merge the children at `offset - 1` and `offset` of the element at
    /// `path`, keeping the first's identity.
    MergeNodes { path: Path, offset: i64 },
}

impl Op {
    /// Wire name of the operation kind.
    pub fn op_name(&self) -> &'static str {
        match self {
            Op::InsertText { .. } => "insert_text",
            Op::DeleteText { .. } => "delete_text",
            Op::InsertNode { .. } => "insert_node",
            Op::DeleteNode { .. } => "delete_node",
            Op::SetNodeType { .. } => "set_node_type",
            Op::UpdateAttrs { .. } => "update_attrs",
            Op::AddMark { .. } => "add_mark",
            Op::RemoveMark { .. } => "remove_mark",
            Op::WrapNode { .. } => "wrap_node",
            Op::LiftNode { .. } => "lift_node",
            Op::MoveNode { .. } => "move_node",
            Op::SplitNode { .. } => "split_node",
            Op::MergeNodes { .. } => "merge_nodes",
        }
    }

    /// The path of the operation.
    pub fn path(&self) -> &Path {
        match self {
            Op::InsertText { path, .. } => path,
            Op::DeleteText { path, .. } => path,
            Op::InsertNode { path, .. } => path,
            Op::DeleteNode { path, .. } => path,
            Op::SetNodeType { path, .. } => path,
            Op::UpdateAttrs { path, .. } => path,
            Op::AddMark { path, .. } => path,
            Op::RemoveMark { path, .. } => path,
            Op::WrapNode { path, .. } => path,
            Op::LiftNode { path, .. } => path,
            Op::MoveNode { path, .. } => path,
            Op::SplitNode { path, .. } => path,
            Op::MergeNodes { path, .. } => path,
        }
    }

    /// Mutable access to the path, used by the transform to track block
    /// index shifts.
    pub fn path_mut(&mut self) -> &mut Path {
        match self {
            Op::InsertText { path, .. } => path,
            Op::DeleteText { path, .. } => path,
            Op::InsertNode { path, .. } => path,
            Op::DeleteNode { path, .. } => path,
            Op::SetNodeType { path, .. } => path,
            Op::UpdateAttrs { path, .. } => path,
            Op::AddMark { path, .. } => path,
            Op::RemoveMark { path, .. } => path,
            Op::WrapNode { path, .. } => path,
            Op::LiftNode { path, .. } => path,
            Op::MoveNode { path, .. } => path,
            Op::SplitNode { path, .. } => path,
            Op::MergeNodes { path, .. } => path,
        }
    }
}

// ── Transactions ──────────────────────────────────────────────────────────

/// An ordered batch of operations with provenance.
///
/// When `doc` is present the transaction is a full replacement: folding
/// adopts the document as-is (version untouched) instead of applying
/// `operations`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub operations: Vec<Op>,
    pub selection: Option<EditorSelection>,
    pub origin: String,
    pub timestamp: u64,
    pub doc: Option<Document>,
}

impl Transaction {
    pub fn new(operations: Vec<Op>, origin: impl Into<String>, timestamp: u64) -> Self {
        Self {
            operations,
            selection: None,
            origin: origin.into(),
            timestamp,
            doc: None,
        }
    }

    pub fn with_selection(mut self, selection: EditorSelection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn replacing(doc: Document, origin: impl Into<String>, timestamp: u64) -> Self {
        Self {
            operations: Vec::new(),
            selection: None,
            origin: origin.into(),
            timestamp,
            doc: Some(doc),
        }
    }
}

/// The document plus the local selection, as consumed by the renderer and
/// produced by every successful fold.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub doc: Document,
    pub selection: EditorSelection,
}

impl EditorState {
    pub fn new(doc: Document) -> Self {
        Self {
            doc,
            selection: EditorSelection::default(),
        }
    }
}
