//! Operations, transactions, and the operation engine.
//!
//! [`types`] holds the closed operation set and the transaction shape,
//! [`apply`] folds operations into new documents (including the mark-range
//! algebra and post-mutation normalization), and [`codec`] converts
//! operations and transactions to/from their JSON wire shapes.

pub mod apply;
pub mod codec;
pub mod types;

pub use apply::{apply_op, apply_transaction, normalize_children};
pub use types::{origin, EditorState, Op, Transaction};
