//! Snapshot diffing: derive a minimal operation list between two document
//! versions sharing lineage.
//!
//! Blocks are matched by stable id. Id-set differences become
//! `insert_node`/`delete_node`; a matched block's type/attr changes become
//! `set_node_type`/`update_attrs`; a contiguous text change becomes a
//! single-span `delete_text`/`insert_text` pair computed via common
//! prefix/suffix extraction. The generated block edit is verified by
//! simulation against the old block; anything the single-span form cannot
//! reproduce exactly (multi-region edits, mark layout changes, nested
//! structure changes) falls back to whole-block replacement.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::doc_model::{
    flattened_text, Attrs, Document, EditError, IdGenerator, Node, NodeId, SequentialIdGenerator,
};
use crate::doc_patch::codec::{ops_from_json, ops_to_json};
use crate::doc_patch::{apply_op, Op};
use crate::util_inner::diff::common_affixes;

// ── Delta ─────────────────────────────────────────────────────────────────

/// A versioned operation batch, the unit exchanged with peers.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub operations: Vec<Op>,
    pub base_version: u64,
    pub result_version: u64,
    pub client_id: String,
    pub timestamp: u64,
}

/// Diff `prev` into `next`, producing the operation list that explains the
/// difference.
pub fn generate_delta(
    prev: &Document,
    next: &Document,
    client_id: &str,
    timestamp: u64,
) -> Delta {
    let mut operations = Vec::new();
    if prev.children != next.children {
        diff_blocks(&mut operations, prev, next);
    }
    tracing::debug!(
        target: "richdoc::diff",
        ops = operations.len(),
        base = prev.version,
        result = next.version,
        "generated delta"
    );
    Delta {
        operations,
        base_version: prev.version,
        result_version: next.version,
        client_id: client_id.to_string(),
        timestamp,
    }
}

/// Fold a delta's operations into a new document, bumping the version by
/// one like any operation transaction.
pub fn apply_delta(
    doc: &Document,
    delta: &Delta,
    ids: &dyn IdGenerator,
) -> Result<Document, EditError> {
    let mut out = doc.clone();
    for op in &delta.operations {
        out = apply_op(&out, op, ids)?;
    }
    out.version += 1;
    Ok(out)
}

// ── Block-level diff ──────────────────────────────────────────────────────

fn diff_blocks(ops: &mut Vec<Op>, prev: &Document, next: &Document) {
    let prev_ids: Vec<NodeId> = prev.children.iter().map(|c| c.id()).collect();
    let next_ids: Vec<NodeId> = next.children.iter().map(|c| c.id()).collect();
    let prev_set: HashSet<NodeId> = prev_ids.iter().copied().collect();
    let next_set: HashSet<NodeId> = next_ids.iter().copied().collect();

    // Surviving blocks must keep their relative order for index arithmetic
    // below to line up; a reorder is outside the diff's single-edit scope,
    // so rebuild the whole block list.
    let kept_prev: Vec<NodeId> = prev_ids
        .iter()
        .copied()
        .filter(|id| next_set.contains(id))
        .collect();
    let kept_next: Vec<NodeId> = next_ids
        .iter()
        .copied()
        .filter(|id| prev_set.contains(id))
        .collect();
    if kept_prev != kept_next {
        replace_all(ops, prev, next);
        return;
    }

    // Deletions highest-index first so earlier indices stay valid while the
    // operation list folds.
    for (i, id) in prev_ids.iter().enumerate().rev() {
        if !next_set.contains(id) {
            ops.push(Op::DeleteNode {
                path: vec![],
                offset: i as i64,
            });
        }
    }
    // Insertions at their target indices, ascending.
    for (i, child) in next.children.iter().enumerate() {
        if !prev_set.contains(&child.id()) {
            ops.push(Op::InsertNode {
                path: vec![],
                offset: i as i64,
                node: child.clone(),
            });
        }
    }

    // After the structural ops above fold, matched blocks sit at their
    // `next` indices.
    let prev_by_id: HashMap<NodeId, &Arc<Node>> =
        prev.children.iter().map(|c| (c.id(), c)).collect();
    for (i, child) in next.children.iter().enumerate() {
        if let Some(prev_child) = prev_by_id.get(&child.id()) {
            diff_matched_block(ops, i, prev_child, child);
        }
    }
}

fn replace_all(ops: &mut Vec<Op>, prev: &Document, next: &Document) {
    for i in (0..prev.children.len()).rev() {
        ops.push(Op::DeleteNode {
            path: vec![],
            offset: i as i64,
        });
    }
    for (i, child) in next.children.iter().enumerate() {
        ops.push(Op::InsertNode {
            path: vec![],
            offset: i as i64,
            node: child.clone(),
        });
    }
}

fn diff_matched_block(ops: &mut Vec<Op>, idx: usize, prev_node: &Arc<Node>, next_node: &Arc<Node>) {
    if prev_node == next_node {
        return;
    }
    let (Node::Element(prev_el), Node::Element(next_el)) = (&**prev_node, &**next_node) else {
        replace_block(ops, idx, next_node);
        return;
    };

    // Candidate ops are built against block index 0 so they can be verified
    // on a scratch document, then re-based to `idx`.
    let mut local: Vec<Op> = Vec::new();
    if prev_el.node_type != next_el.node_type {
        local.push(Op::SetNodeType {
            path: vec![0],
            node_type: next_el.node_type.clone(),
        });
    }
    if prev_el.attrs != next_el.attrs {
        local.push(Op::UpdateAttrs {
            path: vec![0],
            attrs: attrs_patch(&prev_el.attrs, &next_el.attrs),
        });
    }
    if prev_el.children != next_el.children {
        let prev_text: Vec<char> = flattened_text(&prev_el.children).chars().collect();
        let next_text: Vec<char> = flattened_text(&next_el.children).chars().collect();
        let Some(mut text_ops) = single_span_edit(&prev_el.children, &prev_text, &next_text)
        else {
            replace_block(ops, idx, next_node);
            return;
        };
        local.append(&mut text_ops);
    }

    // The single-span form is only exact for one contiguous change; verify
    // by replaying onto the old block and fall back to replacement when the
    // result does not reproduce the new block.
    let ids = SequentialIdGenerator::new(1);
    let mut sim = Document {
        id: NodeId(0),
        children: vec![prev_node.clone()],
        version: 0,
    };
    for op in &local {
        match apply_op(&sim, op, &ids) {
            Ok(doc) => sim = doc,
            Err(_) => {
                replace_block(ops, idx, next_node);
                return;
            }
        }
    }
    if sim.children[0] != *next_node {
        replace_block(ops, idx, next_node);
        return;
    }

    for mut op in local {
        op.path_mut()[0] = idx;
        ops.push(op);
    }
}

fn replace_block(ops: &mut Vec<Op>, idx: usize, next_node: &Arc<Node>) {
    ops.push(Op::DeleteNode {
        path: vec![],
        offset: idx as i64,
    });
    ops.push(Op::InsertNode {
        path: vec![],
        offset: idx as i64,
        node: next_node.clone(),
    });
}

/// Shallow attr patch: changed keys carry the new value, removed keys carry
/// `null` (the merge semantics of `update_attrs`).
fn attrs_patch(prev: &Attrs, next: &Attrs) -> Attrs {
    let mut patch = Attrs::new();
    for (k, v) in next {
        if prev.get(k) != Some(v) {
            patch.insert(k.clone(), v.clone());
        }
    }
    for k in prev.keys() {
        if !next.contains_key(k) {
            patch.insert(k.clone(), Value::Null);
        }
    }
    patch
}

/// Express the difference between two flattened texts as one contiguous
/// splice targeted at the text child containing the span. `None` when there
/// is no text difference or the span does not fit a single child.
fn single_span_edit(
    prev_children: &[Arc<Node>],
    prev_text: &[char],
    next_text: &[char],
) -> Option<Vec<Op>> {
    if prev_text == next_text {
        return None;
    }
    let (pfx, sfx) = common_affixes(prev_text, next_text);
    let del_len = prev_text.len() - pfx - sfx;
    let ins: String = next_text[pfx..next_text.len() - sfx].iter().collect();

    let (child_idx, local_offset) = locate_span(prev_children, pfx, del_len)?;
    let mut ops = Vec::new();
    if del_len > 0 {
        ops.push(Op::DeleteText {
            path: vec![0, child_idx],
            offset: local_offset as i64,
            length: del_len as i64,
        });
    }
    if !ins.is_empty() {
        ops.push(Op::InsertText {
            path: vec![0, child_idx],
            offset: local_offset as i64,
            data: ins,
        });
    }
    Some(ops)
}

/// Find the text child whose span contains `[pos, pos + len)` of the
/// block's flattened text, returning its child index and the child-local
/// offset.
fn locate_span(children: &[Arc<Node>], pos: usize, len: usize) -> Option<(usize, usize)> {
    let mut start = 0usize;
    for (i, child) in children.iter().enumerate() {
        let Node::Text(t) = &**child else { continue };
        let end = start + t.char_len();
        let contains = if len == 0 {
            pos >= start && pos <= end
        } else {
            pos >= start && pos < end && pos + len <= end
        };
        if contains {
            return Some((i, pos - start));
        }
        start = end;
    }
    None
}

// ── Codec ─────────────────────────────────────────────────────────────────

pub fn delta_to_json(delta: &Delta) -> Value {
    json!({
        "operations": ops_to_json(&delta.operations),
        "baseVersion": delta.base_version,
        "resultVersion": delta.result_version,
        "clientId": delta.client_id,
        "timestamp": delta.timestamp,
    })
}

pub fn delta_from_json(v: &Value, ids: &dyn IdGenerator) -> Result<Delta, EditError> {
    let obj = v
        .as_object()
        .ok_or_else(|| EditError::InvalidOperation("delta must be an object".into()))?;
    let operations = ops_from_json(
        obj.get("operations")
            .ok_or_else(|| EditError::InvalidOperation("delta missing operations".into()))?,
        ids,
    )?;
    let field = |name: &str| -> Result<u64, EditError> {
        obj.get(name)
            .and_then(Value::as_u64)
            .ok_or_else(|| EditError::InvalidOperation(format!("delta missing {name}")))
    };
    Ok(Delta {
        operations,
        base_version: field("baseVersion")?,
        result_version: field("resultVersion")?,
        client_id: obj
            .get("clientId")
            .and_then(Value::as_str)
            .ok_or_else(|| EditError::InvalidOperation("delta missing clientId".into()))?
            .to_string(),
        timestamp: field("timestamp")?,
    })
}
