//! JSON codec for operations and transactions.
//!
//! Operations serialize as
//! `{ type, path, offset?, length?, data?, mark?, nodeType?, attrs?,
//! targetPath?, targetOffset? }`; each kind carries only the fields it
//! needs. Decoding fails with `InvalidOperation` on unknown kinds or
//! missing/mistyped fields.

use serde_json::{json, Map, Value};

use crate::doc_model::codec::{
    attrs_from_json, document_from_json, document_to_json, mark_from_json, mark_to_json,
    node_from_json, node_to_json,
};
use crate::doc_model::{EditError, IdGenerator, Path};
use crate::doc_position::{selection_from_json, selection_to_json};

use super::types::{Op, Transaction};

// ── Field helpers ─────────────────────────────────────────────────────────

fn bad(detail: impl Into<String>) -> EditError {
    EditError::InvalidOperation(detail.into())
}

fn encode_path(path: &[usize]) -> Value {
    Value::Array(path.iter().map(|&i| json!(i)).collect())
}

fn decode_path(obj: &Map<String, Value>, field: &str) -> Result<Path, EditError> {
    let v = obj
        .get(field)
        .ok_or_else(|| bad(format!("missing {field}")))?;
    v.as_array()
        .ok_or_else(|| bad(format!("{field} must be an array")))?
        .iter()
        .map(|x| {
            x.as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| bad(format!("{field} index must be a number")))
        })
        .collect()
}

fn decode_i64(obj: &Map<String, Value>, field: &str) -> Result<i64, EditError> {
    obj.get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| bad(format!("missing {field}")))
}

fn decode_str(obj: &Map<String, Value>, field: &str) -> Result<String, EditError> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| bad(format!("missing {field}")))
}

// ── Serialization ─────────────────────────────────────────────────────────

pub fn op_to_json(op: &Op) -> Value {
    match op {
        Op::InsertText { path, offset, data } => json!({
            "type": "insert_text",
            "path": encode_path(path),
            "offset": offset,
            "data": data,
        }),
        Op::DeleteText {
            path,
            offset,
            length,
        } => json!({
            "type": "delete_text",
            "path": encode_path(path),
            "offset": offset,
            "length": length,
        }),
        Op::InsertNode { path, offset, node } => json!({
            "type": "insert_node",
            "path": encode_path(path),
            "offset": offset,
            "data": node_to_json(node),
        }),
        Op::DeleteNode { path, offset } => json!({
            "type": "delete_node",
            "path": encode_path(path),
            "offset": offset,
        }),
        Op::SetNodeType { path, node_type } => json!({
            "type": "set_node_type",
            "path": encode_path(path),
            "nodeType": node_type,
        }),
        Op::UpdateAttrs { path, attrs } => json!({
            "type": "update_attrs",
            "path": encode_path(path),
            "attrs": attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Map<_, _>>(),
        }),
        Op::AddMark {
            path,
            offset,
            length,
            mark,
        } => json!({
            "type": "add_mark",
            "path": encode_path(path),
            "offset": offset,
            "length": length,
            "mark": mark_to_json(mark),
        }),
        Op::RemoveMark {
            path,
            offset,
            length,
            mark,
        } => json!({
            "type": "remove_mark",
            "path": encode_path(path),
            "offset": offset,
            "length": length,
            "mark": mark_to_json(mark),
        }),
        Op::WrapNode {
            path,
            offset,
            wrapper_type,
            wrapper_attrs,
        } => json!({
            "type": "wrap_node",
            "path": encode_path(path),
            "offset": offset,
            "nodeType": wrapper_type,
            "attrs": wrapper_attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Map<_, _>>(),
        }),
        Op::LiftNode { path, offset } => json!({
            "type": "lift_node",
            "path": encode_path(path),
            "offset": offset,
        }),
        Op::MoveNode {
            path,
            offset,
            target_path,
            target_offset,
        } => json!({
            "type": "move_node",
            "path": encode_path(path),
            "offset": offset,
            "targetPath": encode_path(target_path),
            "targetOffset": target_offset,
        }),
        Op::SplitNode { path, offset } => json!({
            "type": "split_node",
            "path": encode_path(path),
            "offset": offset,
        }),
        Op::MergeNodes { path, offset } => json!({
            "type": "merge_nodes",
            "path": encode_path(path),
            "offset": offset,
        }),
    }
}

pub fn ops_to_json(ops: &[Op]) -> Value {
    Value::Array(ops.iter().map(op_to_json).collect())
}

pub fn transaction_to_json(tr: &Transaction) -> Value {
    let mut m = Map::new();
    m.insert("operations".into(), ops_to_json(&tr.operations));
    if let Some(sel) = &tr.selection {
        m.insert("selection".into(), selection_to_json(sel));
    }
    m.insert("origin".into(), json!(tr.origin));
    m.insert("timestamp".into(), json!(tr.timestamp));
    if let Some(doc) = &tr.doc {
        m.insert("doc".into(), document_to_json(doc));
    }
    Value::Object(m)
}

// ── Deserialization ───────────────────────────────────────────────────────

pub fn op_from_json(v: &Value, ids: &dyn IdGenerator) -> Result<Op, EditError> {
    let obj = v.as_object().ok_or_else(|| bad("op must be an object"))?;
    let kind = decode_str(obj, "type")?;
    let path = decode_path(obj, "path")?;
    match kind.as_str() {
        "insert_text" => Ok(Op::InsertText {
            path,
            offset: decode_i64(obj, "offset")?,
            data: decode_str(obj, "data")?,
        }),
        "delete_text" => Ok(Op::DeleteText {
            path,
            offset: decode_i64(obj, "offset")?,
            length: decode_i64(obj, "length")?,
        }),
        "insert_node" => {
            let data = obj.get("data").ok_or_else(|| bad("missing data"))?;
            Ok(Op::InsertNode {
                path,
                offset: decode_i64(obj, "offset")?,
                node: std::sync::Arc::new(node_from_json(data, ids)?),
            })
        }
        "delete_node" => Ok(Op::DeleteNode {
            path,
            offset: decode_i64(obj, "offset")?,
        }),
        "set_node_type" => Ok(Op::SetNodeType {
            path,
            node_type: decode_str(obj, "nodeType")?,
        }),
        "update_attrs" => Ok(Op::UpdateAttrs {
            path,
            attrs: attrs_from_json(obj.get("attrs").ok_or_else(|| bad("missing attrs"))?)?,
        }),
        "add_mark" | "remove_mark" => {
            let offset = decode_i64(obj, "offset")?;
            let length = decode_i64(obj, "length")?;
            let mark = mark_from_json(obj.get("mark").ok_or_else(|| bad("missing mark"))?)?;
            Ok(if kind == "add_mark" {
                Op::AddMark {
                    path,
                    offset,
                    length,
                    mark,
                }
            } else {
                Op::RemoveMark {
                    path,
                    offset,
                    length,
                    mark,
                }
            })
        }
        "wrap_node" => Ok(Op::WrapNode {
            path,
            offset: decode_i64(obj, "offset")?,
            wrapper_type: decode_str(obj, "nodeType")?,
            wrapper_attrs: match obj.get("attrs") {
                None | Some(Value::Null) => Default::default(),
                Some(v) => attrs_from_json(v)?,
            },
        }),
        "lift_node" => Ok(Op::LiftNode {
            path,
            offset: decode_i64(obj, "offset")?,
        }),
        "move_node" => Ok(Op::MoveNode {
            path,
            offset: decode_i64(obj, "offset")?,
            target_path: decode_path(obj, "targetPath")?,
            target_offset: decode_i64(obj, "targetOffset")?,
        }),
        "split_node" => Ok(Op::SplitNode {
            path,
            offset: decode_i64(obj, "offset")?,
        }),
        "merge_nodes" => Ok(Op::MergeNodes {
            path,
            offset: decode_i64(obj, "offset")?,
        }),
        other => Err(bad(format!("unknown operation kind: {other}"))),
    }
}

pub fn ops_from_json(v: &Value, ids: &dyn IdGenerator) -> Result<Vec<Op>, EditError> {
    v.as_array()
        .ok_or_else(|| bad("operations must be an array"))?
        .iter()
        .map(|op| op_from_json(op, ids))
        .collect()
}

pub fn transaction_from_json(v: &Value, ids: &dyn IdGenerator) -> Result<Transaction, EditError> {
    let obj = v
        .as_object()
        .ok_or_else(|| bad("transaction must be an object"))?;
    let operations = ops_from_json(
        obj.get("operations")
            .ok_or_else(|| bad("missing operations"))?,
        ids,
    )?;
    let selection = match obj.get("selection") {
        None | Some(Value::Null) => None,
        Some(v) => Some(selection_from_json(v)?),
    };
    let doc = match obj.get("doc") {
        None | Some(Value::Null) => None,
        Some(v) => Some(document_from_json(v, ids)?),
    };
    Ok(Transaction {
        operations,
        selection,
        origin: decode_str(obj, "origin")?,
        timestamp: obj.get("timestamp").and_then(Value::as_u64).unwrap_or(0),
        doc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_model::{Attrs, Mark, Node, SequentialIdGenerator, TextNode};
    use crate::doc_patch::types::origin;
    use std::sync::Arc;

    fn round_trip(op: Op) {
        let ids = SequentialIdGenerator::new(1000);
        let v = op_to_json(&op);
        let back = op_from_json(&v, &ids).unwrap();
        assert_eq!(back, op, "round trip failed for {}", op.op_name());
    }

    #[test]
    fn every_op_kind_round_trips() {
        let ids = SequentialIdGenerator::new(1);
        let mut attrs = Attrs::new();
        attrs.insert("level".into(), json!(2));
        round_trip(Op::InsertText {
            path: vec![0, 0],
            offset: 5,
            data: "hi".into(),
        });
        round_trip(Op::DeleteText {
            path: vec![1, 0],
            offset: 0,
            length: 3,
        });
        round_trip(Op::InsertNode {
            path: vec![],
            offset: 2,
            node: Arc::new(Node::Text(TextNode::new(ids.next_id(), "x"))),
        });
        round_trip(Op::DeleteNode {
            path: vec![],
            offset: -1,
        });
        round_trip(Op::SetNodeType {
            path: vec![0],
            node_type: "heading".into(),
        });
        round_trip(Op::UpdateAttrs {
            path: vec![0],
            attrs: attrs.clone(),
        });
        round_trip(Op::AddMark {
            path: vec![0],
            offset: 0,
            length: 4,
            mark: Mark::new("bold"),
        });
        round_trip(Op::RemoveMark {
            path: vec![0],
            offset: 0,
            length: 4,
            mark: Mark::new("bold"),
        });
        round_trip(Op::WrapNode {
            path: vec![],
            offset: 1,
            wrapper_type: "blockquote".into(),
            wrapper_attrs: attrs,
        });
        round_trip(Op::LiftNode {
            path: vec![],
            offset: 1,
        });
        round_trip(Op::MoveNode {
            path: vec![],
            offset: 0,
            target_path: vec![],
            target_offset: 2,
        });
        round_trip(Op::SplitNode {
            path: vec![0],
            offset: 1,
        });
        round_trip(Op::MergeNodes {
            path: vec![],
            offset: 1,
        });
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let ids = SequentialIdGenerator::new(1);
        let err = op_from_json(&json!({ "type": "frobnicate", "path": [] }), &ids).unwrap_err();
        assert!(matches!(err, crate::doc_model::EditError::InvalidOperation(_)));
    }

    #[test]
    fn transaction_round_trips() {
        let ids = SequentialIdGenerator::new(1);
        let tr = Transaction::new(
            vec![Op::InsertText {
                path: vec![0, 0],
                offset: 0,
                data: "a".into(),
            }],
            origin::INPUT,
            1234,
        );
        let back = transaction_from_json(&transaction_to_json(&tr), &ids).unwrap();
        assert_eq!(back, tr);
    }
}
