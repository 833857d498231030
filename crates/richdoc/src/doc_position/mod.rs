//! Cursor/selection positions and mapping through operations.
//!
//! A [`Position`] names a top-level block, an optional sub-path into nested
//! structure, and a character offset within the block's flattened text.
//! [`map_position_through`] keeps positions valid across remote edits by
//! folding them through each operation in order; all arithmetic saturates so
//! a mapped position never goes negative.

use serde_json::{json, Value};

use crate::doc_model::EditError;
use crate::doc_patch::types::Op;

// ── Types ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    pub block_index: usize,
    pub sub_path: Vec<usize>,
    pub offset: usize,
}

impl Position {
    pub fn new(block_index: usize, offset: usize) -> Self {
        Self {
            block_index,
            sub_path: Vec::new(),
            offset,
        }
    }
}

/// An anchor/focus pair; equal endpoints form a collapsed cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSelection {
    pub anchor: Position,
    pub focus: Position,
}

impl EditorSelection {
    pub fn new(anchor: Position, focus: Position) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(pos: Position) -> Self {
        Self {
            anchor: pos.clone(),
            focus: pos,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

// ── Mapping ───────────────────────────────────────────────────────────────

/// Fold `pos` through each operation in order.
pub fn map_position_through(pos: &Position, ops: &[Op]) -> Position {
    let mut mapped = pos.clone();
    for op in ops {
        mapped = map_one(&mapped, op);
    }
    mapped
}

/// Map anchor and focus independently.
pub fn map_selection_through(selection: &EditorSelection, ops: &[Op]) -> EditorSelection {
    EditorSelection {
        anchor: map_position_through(&selection.anchor, ops),
        focus: map_position_through(&selection.focus, ops),
    }
}

fn same_block(path: &[usize], pos: &Position) -> bool {
    path.first() == Some(&pos.block_index)
}

fn map_one(pos: &Position, op: &Op) -> Position {
    let mut out = pos.clone();
    match op {
        Op::InsertText { path, offset, data } if same_block(path, pos) => {
            let Ok(at) = usize::try_from(*offset) else {
                return out;
            };
            // Tie goes to the insert: a cursor at the insertion point is
            // pushed forward.
            if at <= pos.offset {
                out.offset += data.chars().count();
            }
        }
        Op::DeleteText {
            path,
            offset,
            length,
        } if same_block(path, pos) => {
            let (Ok(start), Ok(len)) = (usize::try_from(*offset), usize::try_from(*length)) else {
                return out;
            };
            let end = start + len;
            if end <= pos.offset {
                out.offset -= len;
            } else if start >= pos.offset {
                // Deletion entirely after the position.
            } else {
                // Position was inside the deleted range.
                out.offset = start;
            }
        }
        Op::InsertNode { path, offset, .. } if path.is_empty() => {
            let Ok(at) = usize::try_from(*offset) else {
                return out;
            };
            if at <= pos.block_index {
                out.block_index += 1;
            }
        }
        Op::DeleteNode { path, offset } if path.is_empty() => {
            let Ok(at) = usize::try_from(*offset) else {
                return out; // transform sentinel, folds as a no-op
            };
            if at < pos.block_index {
                out.block_index -= 1;
            } else if at == pos.block_index {
                // The position's own block is gone.
                out = Position::new(pos.block_index.saturating_sub(1), 0);
            }
        }
        Op::SplitNode { path, .. } if path.len() == 1 => {
            // Splitting the position's own block is left alone; splitting an
            // earlier block shifts everything after it down by one sibling.
            if path[0] < pos.block_index {
                out.block_index += 1;
            }
        }
        Op::MergeNodes { path, offset } if path.is_empty() => {
            let Ok(at) = usize::try_from(*offset) else {
                return out;
            };
            if at <= pos.block_index {
                out.block_index = out.block_index.saturating_sub(1);
            }
        }
        // Every other kind leaves positions untouched (conservative).
        _ => {}
    }
    out
}

// ── Codec ─────────────────────────────────────────────────────────────────

pub fn position_to_json(pos: &Position) -> Value {
    json!({
        "blockIndex": pos.block_index,
        "subPath": pos.sub_path,
        "offset": pos.offset,
    })
}

pub fn position_from_json(v: &Value) -> Result<Position, EditError> {
    let obj = v
        .as_object()
        .ok_or_else(|| EditError::InvalidOperation("position must be an object".into()))?;
    let block_index = obj
        .get("blockIndex")
        .and_then(Value::as_u64)
        .ok_or_else(|| EditError::InvalidOperation("position blockIndex must be a number".into()))?
        as usize;
    let sub_path = match obj.get("subPath") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => v
            .as_array()
            .ok_or_else(|| EditError::InvalidOperation("position subPath must be an array".into()))?
            .iter()
            .map(|x| {
                x.as_u64()
                    .map(|n| n as usize)
                    .ok_or_else(|| EditError::InvalidOperation("subPath index must be a number".into()))
            })
            .collect::<Result<_, _>>()?,
    };
    let offset = obj.get("offset").and_then(Value::as_u64).unwrap_or(0) as usize;
    Ok(Position {
        block_index,
        sub_path,
        offset,
    })
}

pub fn selection_to_json(sel: &EditorSelection) -> Value {
    json!({
        "anchor": position_to_json(&sel.anchor),
        "focus": position_to_json(&sel.focus),
    })
}

pub fn selection_from_json(v: &Value) -> Result<EditorSelection, EditError> {
    let obj = v
        .as_object()
        .ok_or_else(|| EditError::InvalidOperation("selection must be an object".into()))?;
    let anchor = position_from_json(
        obj.get("anchor")
            .ok_or_else(|| EditError::InvalidOperation("selection missing anchor".into()))?,
    )?;
    let focus = position_from_json(
        obj.get("focus")
            .ok_or_else(|| EditError::InvalidOperation("selection missing focus".into()))?,
    )?;
    Ok(EditorSelection { anchor, focus })
}
