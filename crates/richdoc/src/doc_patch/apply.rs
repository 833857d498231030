//! Operation apply logic: folds one operation into a new document.
//!
//! Every applicator rebuilds only the ancestor chain along the operation's
//! path (see [`crate::doc_model::path`]); untouched subtrees are shared
//! between the old and new document. After any mutation that can create or
//! remove text children, the touched child vector is re-normalized so no two
//! adjacent text siblings carry identical mark sets.

use std::sync::Arc;

use crate::doc_model::{
    resolve_children, update_children_at, update_node_at, Attrs, Document, EditError, ElementNode,
    IdGenerator, Mark, Node, TextNode,
};
use crate::doc_position::map_selection_through;

use super::types::{origin, EditorState, Op, Transaction};

// ── Offset helpers ────────────────────────────────────────────────────────

fn to_index(v: i64) -> Result<usize, EditError> {
    usize::try_from(v).map_err(|_| EditError::InvalidPath)
}

/// Byte position of the `n`-th char, clamped to the end of the string.
fn byte_at(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

// ── Normalization ─────────────────────────────────────────────────────────

/// Collapse consecutive text siblings whose mark sets are equal into a
/// single text node. The first node's id is retained. One left-to-right
/// pass reaches a fixed point: each merge leaves the merged node's marks
/// unchanged, so it is compared against the next sibling in turn.
pub fn normalize_children(children: Vec<Arc<Node>>) -> Vec<Arc<Node>> {
    let mut out: Vec<Arc<Node>> = Vec::with_capacity(children.len());
    for child in children {
        if let (Some(prev), Node::Text(cur)) = (out.last(), &*child) {
            if let Node::Text(prev_text) = &**prev {
                if prev_text.marks == cur.marks {
                    let merged = TextNode {
                        id: prev_text.id,
                        text: format!("{}{}", prev_text.text, cur.text),
                        marks: prev_text.marks.clone(),
                    };
                    *out.last_mut().expect("non-empty") = Arc::new(Node::Text(merged));
                    continue;
                }
            }
        }
        out.push(child);
    }
    out
}

// ── Mark-range algebra ────────────────────────────────────────────────────

enum MarkEdit<'a> {
    Add(&'a Mark),
    Remove(&'a Mark),
}

/// Loose match by type when the removal carries no attrs; exact attribute
/// match otherwise.
fn mark_matches(existing: &Mark, requested: &Mark) -> bool {
    if existing.mark_type != requested.mark_type {
        return false;
    }
    match &requested.attrs {
        None => true,
        Some(attrs) => existing.attrs.as_ref() == Some(attrs),
    }
}

fn edit_marks(marks: &[Mark], edit: &MarkEdit) -> Vec<Mark> {
    match edit {
        MarkEdit::Add(mark) => {
            if marks.contains(mark) {
                marks.to_vec()
            } else {
                let mut out = marks.to_vec();
                out.push((*mark).clone());
                out
            }
        }
        MarkEdit::Remove(mark) => marks
            .iter()
            .filter(|existing| !mark_matches(existing, mark))
            .cloned()
            .collect(),
    }
}

/// Walk the block's text children accumulating character position; split any
/// child overlapping `[from, to)` into up to three pieces (the first piece
/// keeps the child's id, later pieces mint fresh ones) and recompute the
/// marks of the overlapping piece. Children outside the range pass through
/// untouched.
fn apply_mark_range(
    children: &[Arc<Node>],
    from: usize,
    to: usize,
    edit: &MarkEdit,
    ids: &dyn IdGenerator,
) -> Vec<Arc<Node>> {
    let mut out = Vec::with_capacity(children.len());
    let mut pos = 0usize;
    for child in children {
        let Node::Text(t) = &**child else {
            out.push(child.clone());
            continue;
        };
        let chars: Vec<char> = t.text.chars().collect();
        let start = pos;
        let end = pos + chars.len();
        pos = end;

        let a = from.max(start);
        let b = to.min(end);
        if a >= b {
            out.push(child.clone());
            continue;
        }

        let mut pieces: Vec<(String, Vec<Mark>)> = Vec::new();
        if a > start {
            pieces.push((chars[..a - start].iter().collect(), t.marks.clone()));
        }
        pieces.push((
            chars[a - start..b - start].iter().collect(),
            edit_marks(&t.marks, edit),
        ));
        if end > b {
            pieces.push((chars[b - start..].iter().collect(), t.marks.clone()));
        }
        for (i, (text, marks)) in pieces.into_iter().enumerate() {
            let id = if i == 0 { t.id } else { ids.next_id() };
            out.push(Arc::new(Node::Text(TextNode { id, text, marks })));
        }
    }
    out
}

// ── Individual applicators ────────────────────────────────────────────────

fn apply_insert_text(
    doc: &Document,
    path: &[usize],
    offset: i64,
    data: &str,
) -> Result<Document, EditError> {
    let at = to_index(offset)?;
    let children = update_node_at(&doc.children, path, |node| match node {
        Node::Text(t) => {
            let mut text = t.text.clone();
            let byte_pos = byte_at(&text, at);
            text.insert_str(byte_pos, data);
            Ok(Node::Text(TextNode {
                id: t.id,
                text,
                marks: t.marks.clone(),
            }))
        }
        Node::Element(_) => Err(EditError::TypeMismatch),
    })?;
    Ok(doc.with_children(children))
}

fn apply_delete_text(
    doc: &Document,
    path: &[usize],
    offset: i64,
    length: i64,
) -> Result<Document, EditError> {
    let start = to_index(offset)?;
    let len = to_index(length)?;
    let children = update_node_at(&doc.children, path, |node| match node {
        Node::Text(t) => {
            let chars: Vec<char> = t.text.chars().collect();
            let start = start.min(chars.len());
            let end = (start + len).min(chars.len());
            let text: String = chars[..start].iter().chain(chars[end..].iter()).collect();
            Ok(Node::Text(TextNode {
                id: t.id,
                text,
                marks: t.marks.clone(),
            }))
        }
        Node::Element(_) => Err(EditError::TypeMismatch),
    })?;
    Ok(doc.with_children(children))
}

fn apply_insert_node(
    doc: &Document,
    path: &[usize],
    offset: i64,
    node: &Arc<Node>,
) -> Result<Document, EditError> {
    let at = to_index(offset)?;
    let children = update_children_at(&doc.children, path, |kids| {
        if at > kids.len() {
            return Err(EditError::InvalidPath);
        }
        let mut out = kids.to_vec();
        out.insert(at, node.clone());
        Ok(normalize_children(out))
    })?;
    Ok(doc.with_children(children))
}

fn apply_delete_node(doc: &Document, path: &[usize], offset: i64) -> Result<Document, EditError> {
    if offset < 0 {
        // Transform sentinel: the node was already deleted concurrently.
        return Ok(doc.clone());
    }
    let at = offset as usize;
    let children = update_children_at(&doc.children, path, |kids| {
        if at >= kids.len() {
            return Err(EditError::InvalidPath);
        }
        let mut out = kids.to_vec();
        out.remove(at);
        Ok(normalize_children(out))
    })?;
    Ok(doc.with_children(children))
}

fn apply_set_node_type(
    doc: &Document,
    path: &[usize],
    node_type: &str,
) -> Result<Document, EditError> {
    let children = update_node_at(&doc.children, path, |node| match node {
        Node::Element(el) => Ok(Node::Element(ElementNode {
            id: el.id,
            node_type: node_type.to_string(),
            attrs: el.attrs.clone(),
            children: el.children.clone(),
        })),
        Node::Text(_) => Err(EditError::TypeMismatch),
    })?;
    Ok(doc.with_children(children))
}

fn apply_update_attrs(doc: &Document, path: &[usize], attrs: &Attrs) -> Result<Document, EditError> {
    let children = update_node_at(&doc.children, path, |node| match node {
        Node::Element(el) => {
            let mut merged = el.attrs.clone();
            for (k, v) in attrs {
                if v.is_null() {
                    merged.shift_remove(k);
                } else {
                    merged.insert(k.clone(), v.clone());
                }
            }
            Ok(Node::Element(ElementNode {
                id: el.id,
                node_type: el.node_type.clone(),
                attrs: merged,
                children: el.children.clone(),
            }))
        }
        Node::Text(_) => Err(EditError::TypeMismatch),
    })?;
    Ok(doc.with_children(children))
}

fn apply_mark_op(
    doc: &Document,
    path: &[usize],
    offset: i64,
    length: i64,
    edit: MarkEdit<'_>,
    ids: &dyn IdGenerator,
) -> Result<Document, EditError> {
    let from = to_index(offset)?;
    let len = to_index(length)?;
    let children = update_children_at(&doc.children, path, |kids| {
        Ok(normalize_children(apply_mark_range(
            kids,
            from,
            from + len,
            &edit,
            ids,
        )))
    })?;
    Ok(doc.with_children(children))
}

fn apply_wrap_node(
    doc: &Document,
    path: &[usize],
    offset: i64,
    wrapper_type: &str,
    wrapper_attrs: &Attrs,
    ids: &dyn IdGenerator,
) -> Result<Document, EditError> {
    let at = to_index(offset)?;
    let children = update_children_at(&doc.children, path, |kids| {
        let target = kids.get(at).ok_or(EditError::InvalidPath)?;
        let wrapper = ElementNode {
            id: ids.next_id(),
            node_type: wrapper_type.to_string(),
            attrs: wrapper_attrs.clone(),
            children: vec![target.clone()],
        };
        let mut out = kids.to_vec();
        out[at] = Arc::new(Node::Element(wrapper));
        Ok(out)
    })?;
    Ok(doc.with_children(children))
}

fn apply_lift_node(
    doc: &Document,
    path: &[usize],
    offset: i64,
) -> Result<Document, EditError> {
    let at = to_index(offset)?;
    let children = update_children_at(&doc.children, path, |kids| {
        let target = kids.get(at).ok_or(EditError::InvalidPath)?;
        let Node::Element(wrapper) = &**target else {
            return Err(EditError::TypeMismatch);
        };
        let mut out = Vec::with_capacity(kids.len() - 1 + wrapper.children.len());
        out.extend_from_slice(&kids[..at]);
        out.extend(wrapper.children.iter().cloned());
        out.extend_from_slice(&kids[at + 1..]);
        Ok(normalize_children(out))
    })?;
    Ok(doc.with_children(children))
}

fn apply_move_node(
    doc: &Document,
    path: &[usize],
    offset: i64,
    target_path: &[usize],
    target_offset: i64,
    ids: &dyn IdGenerator,
) -> Result<Document, EditError> {
    let at = to_index(offset)?;
    let mut target_at = to_index(target_offset)?;
    let source = resolve_children(&doc.children, path)?;
    let node = source.get(at).cloned().ok_or(EditError::InvalidPath)?;
    if path == target_path && target_at > at {
        target_at -= 1;
    }
    let removed = apply_op(
        doc,
        &Op::DeleteNode {
            path: path.to_vec(),
            offset: at as i64,
        },
        ids,
    )?;
    apply_op(
        &removed,
        &Op::InsertNode {
            path: target_path.to_vec(),
            offset: target_at as i64,
            node,
        },
        ids,
    )
}

fn apply_split_node(
    doc: &Document,
    path: &[usize],
    offset: i64,
    ids: &dyn IdGenerator,
) -> Result<Document, EditError> {
    let at = to_index(offset)?;
    let (&block_idx, parent_path) = path
        .split_last()
        .ok_or_else(|| EditError::InvalidOperation("cannot split the document root".into()))?;
    let children = update_children_at(&doc.children, parent_path, |kids| {
        let target = kids.get(block_idx).ok_or(EditError::InvalidPath)?;
        let Node::Element(el) = &**target else {
            return Err(EditError::TypeMismatch);
        };
        let at = at.min(el.children.len());
        let head = el.children[..at].to_vec();
        let mut tail = el.children[at..].to_vec();
        if tail.is_empty() {
            tail.push(Arc::new(Node::Text(TextNode::new(ids.next_id(), ""))));
        }
        let left = el.with_children(head);
        let right = ElementNode {
            id: ids.next_id(),
            node_type: el.node_type.clone(),
            attrs: el.attrs.clone(),
            children: tail,
        };
        let mut out = kids.to_vec();
        out[block_idx] = Arc::new(Node::Element(left));
        out.insert(block_idx + 1, Arc::new(Node::Element(right)));
        Ok(out)
    })?;
    Ok(doc.with_children(children))
}

fn apply_merge_nodes(
    doc: &Document,
    path: &[usize],
    offset: i64,
) -> Result<Document, EditError> {
    if offset <= 0 {
        return Err(EditError::InvalidOperation(
            "merge_nodes offset must be >= 1".into(),
        ));
    }
    let at = offset as usize;
    let children = update_children_at(&doc.children, path, |kids| {
        if at >= kids.len() {
            return Err(EditError::InvalidPath);
        }
        let (Node::Element(first), Node::Element(second)) = (&*kids[at - 1], &*kids[at]) else {
            return Err(EditError::TypeMismatch);
        };
        let mut merged_children =
            Vec::with_capacity(first.children.len() + second.children.len());
        merged_children.extend(first.children.iter().cloned());
        merged_children.extend(second.children.iter().cloned());
        let merged = first.with_children(normalize_children(merged_children));
        let mut out = kids.to_vec();
        out[at - 1] = Arc::new(Node::Element(merged));
        out.remove(at);
        Ok(out)
    })?;
    Ok(doc.with_children(children))
}

// ── Apply ─────────────────────────────────────────────────────────────────

/// Apply one operation, producing a new document. The input document is
/// never touched; the version is managed by [`apply_transaction`].
pub fn apply_op(doc: &Document, op: &Op, ids: &dyn IdGenerator) -> Result<Document, EditError> {
    match op {
        Op::InsertText { path, offset, data } => apply_insert_text(doc, path, *offset, data),
        Op::DeleteText {
            path,
            offset,
            length,
        } => apply_delete_text(doc, path, *offset, *length),
        Op::InsertNode { path, offset, node } => apply_insert_node(doc, path, *offset, node),
        Op::DeleteNode { path, offset } => apply_delete_node(doc, path, *offset),
        Op::SetNodeType { path, node_type } => apply_set_node_type(doc, path, node_type),
        Op::UpdateAttrs { path, attrs } => apply_update_attrs(doc, path, attrs),
        Op::AddMark {
            path,
            offset,
            length,
            mark,
        } => apply_mark_op(doc, path, *offset, *length, MarkEdit::Add(mark), ids),
        Op::RemoveMark {
            path,
            offset,
            length,
            mark,
        } => apply_mark_op(doc, path, *offset, *length, MarkEdit::Remove(mark), ids),
        Op::WrapNode {
            path,
            offset,
            wrapper_type,
            wrapper_attrs,
        } => apply_wrap_node(doc, path, *offset, wrapper_type, wrapper_attrs, ids),
        Op::LiftNode { path, offset } => apply_lift_node(doc, path, *offset),
        Op::MoveNode {
            path,
            offset,
            target_path,
            target_offset,
        } => apply_move_node(doc, path, *offset, target_path, *target_offset, ids),
        Op::SplitNode { path, offset } => apply_split_node(doc, path, *offset, ids),
        Op::MergeNodes { path, offset } => apply_merge_nodes(doc, path, *offset),
    }
}

/// Fold a transaction into a new editor state.
///
/// All-or-nothing: if any operation fails the error is returned and the
/// caller's state is untouched. A transaction carrying a full replacement
/// document adopts it without a version bump; an operation transaction
/// bumps the version by exactly one. A `"remote"` transaction without an
/// explicit selection re-derives the local selection by mapping it through
/// the remote operations.
pub fn apply_transaction(
    state: &EditorState,
    tr: &Transaction,
    ids: &dyn IdGenerator,
) -> Result<EditorState, EditError> {
    if let Some(doc) = &tr.doc {
        let selection = tr
            .selection
            .clone()
            .unwrap_or_else(|| state.selection.clone());
        return Ok(EditorState {
            doc: doc.clone(),
            selection,
        });
    }

    let mut doc = state.doc.clone();
    for op in &tr.operations {
        doc = apply_op(&doc, op, ids)?;
    }
    doc.version += 1;

    let selection = match &tr.selection {
        Some(sel) => sel.clone(),
        None if tr.origin == origin::REMOTE => {
            map_selection_through(&state.selection, &tr.operations)
        }
        None => state.selection.clone(),
    };

    tracing::debug!(
        target: "richdoc::patch",
        ops = tr.operations.len(),
        origin = %tr.origin,
        version = doc.version,
        "transaction folded"
    );
    Ok(EditorState { doc, selection })
}
