//! richdoc — the editing core of a collaborative rich-text document engine.
//!
//! Provides the immutable document model, the operation engine (including
//! mark-range algebra and normalization), position mapping for cursors and
//! selections, operational transformation for concurrent edits, snapshot
//! diffing into minimal operation lists, and an undo/redo history manager
//! with input coalescing.
//!
//! Rendering, input handling, transport, and persistence are external
//! collaborators that consume only the types and contracts defined here.

pub mod util_inner;

pub mod doc_model;
pub mod doc_position;
pub mod doc_patch;
pub mod doc_patch_ot;
pub mod doc_diff;
pub mod doc_history;
