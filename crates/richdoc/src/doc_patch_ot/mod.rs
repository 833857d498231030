//! Operational transformation for concurrent operation lists.
//!
//! [`transform`] takes two operation lists produced concurrently against the
//! same base document and rewrites both so they can be applied in either
//! order with a converging result. The pairwise transform runs over every
//! (a, b) combination, folding updates back into both lists as it goes: an
//! operation may shift, split in two (a deletion straddling a concurrent
//! insert), collapse to the delete/delete no-op sentinel (`offset = -1`),
//! or disappear entirely (its target was deleted). Operation kinds without
//! a defined pair rule pass through unchanged, by design: mark operations
//! in particular are treated as mutually independent and both sides apply.

use crate::doc_patch::types::Op;

/// Which side wins position ties; `Left` means `ops_a` stays put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Left,
    Right,
}

/// Transform two concurrent operation lists against each other.
///
/// Returns `(ops_a', ops_b')` such that folding `ops_a` then `ops_b'`
/// produces the same text as folding `ops_b` then `ops_a'`.
pub fn transform(ops_a: &[Op], ops_b: &[Op], priority: Priority) -> (Vec<Op>, Vec<Op>) {
    let (a2, b2) = transform_seqs(ops_a.to_vec(), ops_b.to_vec(), priority);
    tracing::debug!(
        target: "richdoc::ot",
        a_in = ops_a.len(),
        b_in = ops_b.len(),
        a_out = a2.len(),
        b_out = b2.len(),
        "transformed concurrent operation lists"
    );
    (a2, b2)
}

/// Transform `proposed` so it applies correctly after `accepted` has already
/// been applied. `proposed_wins_ties` controls who stays put when two
/// insertions land on the same offset. This is the one-sided shape a
/// transport integration uses to rebase in-flight local operations onto
/// arriving remote ones.
pub fn transform_against(accepted: &[Op], proposed: &[Op], proposed_wins_ties: bool) -> Vec<Op> {
    let priority = if proposed_wins_ties {
        Priority::Left
    } else {
        Priority::Right
    };
    transform_seqs(proposed.to_vec(), accepted.to_vec(), priority).0
}

/// Pairwise dual fold over two sequential operation lists.
///
/// Each (a, b) pair transforms *both* sides: a's transformed fragments
/// continue against the rest of `b`, and b's continue against the rest of
/// `a`, so every operation is rewritten in the coordinates the other list
/// establishes. Decomposing on either head keeps both lists expressed
/// against a common base at every step.
fn transform_seqs(a: Vec<Op>, b: Vec<Op>, priority: Priority) -> (Vec<Op>, Vec<Op>) {
    if a.is_empty() || b.is_empty() {
        return (a, b);
    }
    if a.len() == 1 && b.len() == 1 {
        let a_wins = priority == Priority::Left;
        let a2 = transform_pair(&b[0], &a[0], a_wins);
        let b2 = transform_pair(&a[0], &b[0], !a_wins);
        return (a2, b2);
    }
    if a.len() == 1 {
        let mut b_rest = b;
        let b_head = b_rest.remove(0);
        let (a1, mut b_head2) = transform_seqs(a, vec![b_head], priority);
        let (a2, b_rest2) = transform_seqs(a1, b_rest, priority);
        b_head2.extend(b_rest2);
        (a2, b_head2)
    } else {
        let mut a_rest = a;
        let a_head = a_rest.remove(0);
        let (mut a_head2, b1) = transform_seqs(vec![a_head], b, priority);
        let (a_rest2, b2) = transform_seqs(a_rest, b1, priority);
        a_head2.extend(a_rest2);
        (a_head2, b2)
    }
}

fn transform_pair(accepted: &Op, proposed: &Op, proposed_wins_ties: bool) -> Vec<Op> {
    match accepted {
        Op::InsertText { path, offset, data } => x_insert_text(
            path,
            *offset,
            data.chars().count() as i64,
            proposed,
            proposed_wins_ties,
        ),
        Op::DeleteText {
            path,
            offset,
            length,
        } => x_delete_text(path, *offset, *length, proposed),
        Op::InsertNode { path, offset, .. } => {
            x_insert_node(path, *offset, proposed, proposed_wins_ties)
        }
        Op::DeleteNode { path, offset } => x_delete_node(path, *offset, proposed),
        // No pair rule: treated as independent.
        _ => vec![proposed.clone()],
    }
}

// ── Text-op transforms ────────────────────────────────────────────────────

fn x_insert_text(
    ins_path: &[usize],
    ins_pos: i64,
    ins_len: i64,
    p: &Op,
    proposed_wins_ties: bool,
) -> Vec<Op> {
    match p {
        Op::InsertText { path, offset, data } if path == ins_path => {
            let shifted = *offset > ins_pos || (*offset == ins_pos && !proposed_wins_ties);
            if shifted {
                vec![Op::InsertText {
                    path: path.clone(),
                    offset: offset + ins_len,
                    data: data.clone(),
                }]
            } else {
                vec![p.clone()]
            }
        }
        Op::DeleteText {
            path,
            offset,
            length,
        } if path == ins_path => {
            let (start, end) = (*offset, offset + length);
            if ins_pos <= start {
                // Insert at or before the deletion start shifts it right.
                vec![Op::DeleteText {
                    path: path.clone(),
                    offset: offset + ins_len,
                    length: *length,
                }]
            } else if ins_pos >= end {
                vec![p.clone()]
            } else {
                // The deletion straddles the insertion point: split around
                // the inserted text, higher half first so the pair applies
                // cleanly in sequence.
                let before = ins_pos - start;
                vec![
                    Op::DeleteText {
                        path: path.clone(),
                        offset: ins_pos + ins_len,
                        length: length - before,
                    },
                    Op::DeleteText {
                        path: path.clone(),
                        offset: start,
                        length: before,
                    },
                ]
            }
        }
        _ => vec![p.clone()],
    }
}

fn x_delete_text(del_path: &[usize], del_pos: i64, del_len: i64, p: &Op) -> Vec<Op> {
    let del_end = del_pos + del_len;
    match p {
        Op::InsertText { path, offset, data } if path == del_path => {
            if *offset <= del_pos {
                vec![p.clone()]
            } else if *offset >= del_end {
                vec![Op::InsertText {
                    path: path.clone(),
                    offset: offset - del_len,
                    data: data.clone(),
                }]
            } else {
                // Insertion point was deleted: collapse to the deletion
                // start.
                vec![Op::InsertText {
                    path: path.clone(),
                    offset: del_pos,
                    data: data.clone(),
                }]
            }
        }
        Op::DeleteText {
            path,
            offset,
            length,
        } if path == del_path => {
            let (start, end) = (*offset, offset + length);
            let overlap = del_end.min(end) - del_pos.max(start);
            if overlap > 0 {
                // Shrink by the overlap and align to the lower start.
                let new_len = length - overlap;
                if new_len <= 0 {
                    return vec![];
                }
                vec![Op::DeleteText {
                    path: path.clone(),
                    offset: del_pos.min(start),
                    length: new_len,
                }]
            } else if start >= del_end {
                vec![Op::DeleteText {
                    path: path.clone(),
                    offset: offset - del_len,
                    length: *length,
                }]
            } else {
                vec![p.clone()]
            }
        }
        _ => vec![p.clone()],
    }
}

// ── Node-op transforms ────────────────────────────────────────────────────

fn x_insert_node(ins_path: &[usize], ins_pos: i64, p: &Op, proposed_wins_ties: bool) -> Vec<Op> {
    match p {
        Op::InsertNode { path, offset, node } if path == ins_path => {
            let shifted = *offset > ins_pos || (*offset == ins_pos && !proposed_wins_ties);
            if shifted {
                vec![Op::InsertNode {
                    path: path.clone(),
                    offset: offset + 1,
                    node: node.clone(),
                }]
            } else {
                vec![p.clone()]
            }
        }
        Op::DeleteNode { path, offset } if path == ins_path => {
            if *offset >= ins_pos && *offset >= 0 {
                vec![Op::DeleteNode {
                    path: path.clone(),
                    offset: offset + 1,
                }]
            } else {
                vec![p.clone()]
            }
        }
        _ if ins_path.is_empty() && !p.path().is_empty() => {
            let Ok(at) = usize::try_from(ins_pos) else {
                return vec![p.clone()];
            };
            shift_block_paths(p, at, 1)
        }
        _ => vec![p.clone()],
    }
}

fn x_delete_node(del_path: &[usize], del_pos: i64, p: &Op) -> Vec<Op> {
    if del_pos < 0 {
        // The accepted op was itself neutralized.
        return vec![p.clone()];
    }
    match p {
        Op::InsertNode { path, offset, node } if path == del_path => {
            if *offset > del_pos {
                vec![Op::InsertNode {
                    path: path.clone(),
                    offset: offset - 1,
                    node: node.clone(),
                }]
            } else {
                vec![p.clone()]
            }
        }
        Op::DeleteNode { path, offset } if path == del_path => {
            if *offset < 0 {
                vec![p.clone()]
            } else if *offset == del_pos {
                // Both sides deleted the same node: neutralize instead of
                // double-deleting.
                vec![Op::DeleteNode {
                    path: path.clone(),
                    offset: -1,
                }]
            } else if *offset > del_pos {
                vec![Op::DeleteNode {
                    path: path.clone(),
                    offset: offset - 1,
                }]
            } else {
                vec![p.clone()]
            }
        }
        _ if del_path.is_empty() && !p.path().is_empty() => {
            shift_block_paths(p, del_pos as usize, -1)
        }
        _ => vec![p.clone()],
    }
}

/// Track a root-level block insertion (`delta = 1`) or deletion
/// (`delta = -1`) in the leading path index of a proposed op, including the
/// target path of a move. An op whose own block (or move target block) was
/// deleted becomes a no-op.
fn shift_block_paths(p: &Op, at: usize, delta: i64) -> Vec<Op> {
    if delta < 0 {
        if p.path().first() == Some(&at) {
            return vec![];
        }
        if let Op::MoveNode { target_path, .. } = p {
            if target_path.first() == Some(&at) {
                return vec![];
            }
        }
    }
    let mut out = p.clone();
    shift_lead(out.path_mut(), at, delta);
    if let Op::MoveNode { target_path, .. } = &mut out {
        shift_lead(target_path, at, delta);
    }
    vec![out]
}

fn shift_lead(path: &mut [usize], at: usize, delta: i64) {
    if let Some(lead) = path.first_mut() {
        if delta > 0 && *lead >= at {
            *lead += 1;
        } else if delta < 0 && *lead > at {
            *lead -= 1;
        }
    }
}
