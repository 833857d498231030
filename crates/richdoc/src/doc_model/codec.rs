//! JSON codec for documents and nodes.
//!
//! Serialized shapes:
//! - `Document`: `{ id, kind: "document", children, version }`
//! - `ElementNode`: `{ id, kind: "element", type, attrs, children }`
//! - `TextNode`: `{ id, kind: "text", text, marks }`
//! - `Mark`: `{ type, attrs? }`
//!
//! Decoding mints a fresh id for any node whose `id` is missing or not a
//! non-negative integer, so imported trees always satisfy the id
//! invariants.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::{Attrs, Document, EditError, ElementNode, IdGenerator, Mark, Node, NodeId, TextNode};

// ── Helpers ───────────────────────────────────────────────────────────────

fn bad(detail: &str) -> EditError {
    EditError::InvalidOperation(detail.to_string())
}

fn attrs_to_json(attrs: &Attrs) -> Value {
    let mut map = Map::new();
    for (k, v) in attrs {
        map.insert(k.clone(), v.clone());
    }
    Value::Object(map)
}

pub(crate) fn attrs_from_json(v: &Value) -> Result<Attrs, EditError> {
    let obj = v.as_object().ok_or_else(|| bad("attrs must be an object"))?;
    Ok(obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn decode_id(obj: &Map<String, Value>, ids: &dyn IdGenerator) -> NodeId {
    obj.get("id")
        .and_then(Value::as_u64)
        .map(NodeId)
        .unwrap_or_else(|| ids.next_id())
}

// ── Marks ─────────────────────────────────────────────────────────────────

pub fn mark_to_json(mark: &Mark) -> Value {
    match &mark.attrs {
        None => json!({ "type": mark.mark_type }),
        Some(attrs) => json!({ "type": mark.mark_type, "attrs": attrs_to_json(attrs) }),
    }
}

pub fn mark_from_json(v: &Value) -> Result<Mark, EditError> {
    let obj = v.as_object().ok_or_else(|| bad("mark must be an object"))?;
    let mark_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| bad("mark type must be a string"))?
        .to_string();
    let attrs = match obj.get("attrs") {
        None | Some(Value::Null) => None,
        Some(v) => Some(attrs_from_json(v)?),
    };
    Ok(Mark { mark_type, attrs })
}

// ── Nodes ─────────────────────────────────────────────────────────────────

pub fn node_to_json(node: &Node) -> Value {
    match node {
        Node::Element(el) => json!({
            "id": el.id.0,
            "kind": "element",
            "type": el.node_type,
            "attrs": attrs_to_json(&el.attrs),
            "children": el.children.iter().map(|c| node_to_json(c)).collect::<Vec<_>>(),
        }),
        Node::Text(t) => json!({
            "id": t.id.0,
            "kind": "text",
            "text": t.text,
            "marks": t.marks.iter().map(mark_to_json).collect::<Vec<_>>(),
        }),
    }
}

pub fn node_from_json(v: &Value, ids: &dyn IdGenerator) -> Result<Node, EditError> {
    let obj = v.as_object().ok_or_else(|| bad("node must be an object"))?;
    let kind = obj
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| bad("node kind must be a string"))?;
    match kind {
        "element" => {
            let node_type = obj
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| bad("element type must be a string"))?
                .to_string();
            let attrs = match obj.get("attrs") {
                None | Some(Value::Null) => Attrs::new(),
                Some(v) => attrs_from_json(v)?,
            };
            let children = decode_children(obj.get("children"), ids)?;
            Ok(Node::Element(ElementNode {
                id: decode_id(obj, ids),
                node_type,
                attrs,
                children,
            }))
        }
        "text" => {
            let text = obj
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| bad("text node text must be a string"))?
                .to_string();
            let marks = match obj.get("marks") {
                None | Some(Value::Null) => Vec::new(),
                Some(v) => v
                    .as_array()
                    .ok_or_else(|| bad("marks must be an array"))?
                    .iter()
                    .map(mark_from_json)
                    .collect::<Result<_, _>>()?,
            };
            Ok(Node::Text(TextNode {
                id: decode_id(obj, ids),
                text,
                marks,
            }))
        }
        other => Err(bad(&format!("unknown node kind: {other}"))),
    }
}

fn decode_children(
    v: Option<&Value>,
    ids: &dyn IdGenerator,
) -> Result<Vec<Arc<Node>>, EditError> {
    match v {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) => v
            .as_array()
            .ok_or_else(|| bad("children must be an array"))?
            .iter()
            .map(|c| node_from_json(c, ids).map(Arc::new))
            .collect(),
    }
}

// ── Documents ─────────────────────────────────────────────────────────────

pub fn document_to_json(doc: &Document) -> Value {
    json!({
        "id": doc.id.0,
        "kind": "document",
        "children": doc.children.iter().map(|c| node_to_json(c)).collect::<Vec<_>>(),
        "version": doc.version,
    })
}

pub fn document_from_json(v: &Value, ids: &dyn IdGenerator) -> Result<Document, EditError> {
    let obj = v.as_object().ok_or_else(|| bad("document must be an object"))?;
    match obj.get("kind").and_then(Value::as_str) {
        Some("document") => {}
        _ => return Err(bad("expected kind: document")),
    }
    let children = decode_children(obj.get("children"), ids)?;
    let version = obj.get("version").and_then(Value::as_u64).unwrap_or(0);
    Ok(Document {
        id: decode_id(obj, ids),
        children,
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_model::SequentialIdGenerator;

    fn sample_doc(ids: &dyn IdGenerator) -> Document {
        let mut attrs = Attrs::new();
        attrs.insert("level".into(), json!(2));
        let mut link = Attrs::new();
        link.insert("href".into(), json!("https://a.example"));
        let text = TextNode {
            id: ids.next_id(),
            text: "Hello".into(),
            marks: vec![Mark::new("bold"), Mark::with_attrs("link", link)],
        };
        let heading = ElementNode {
            id: ids.next_id(),
            node_type: "heading".into(),
            attrs,
            children: vec![Arc::new(Node::Text(text))],
        };
        Document {
            id: ids.next_id(),
            children: vec![Arc::new(Node::Element(heading))],
            version: 3,
        }
    }

    #[test]
    fn document_round_trip() {
        let ids = SequentialIdGenerator::new(1);
        let doc = sample_doc(&ids);
        let v = document_to_json(&doc);
        let back = document_from_json(&v, &ids).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn decode_mints_missing_ids() {
        let ids = SequentialIdGenerator::new(50);
        let v = json!({
            "kind": "document",
            "children": [
                { "kind": "element", "type": "paragraph", "attrs": {}, "children": [
                    { "kind": "text", "text": "x", "marks": [] }
                ]}
            ],
            "version": 0,
        });
        let doc = document_from_json(&v, &ids).unwrap();
        let block = doc.children[0].as_element().unwrap();
        let text = block.children[0].as_text().unwrap();
        let mut seen = vec![doc.id, block.id, text.id];
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        let ids = SequentialIdGenerator::new(1);
        let err = node_from_json(&json!({ "kind": "comment" }), &ids).unwrap_err();
        assert!(matches!(err, EditError::InvalidOperation(_)));
    }

    #[test]
    fn mark_without_attrs_omits_field() {
        let v = mark_to_json(&Mark::new("bold"));
        assert_eq!(v, json!({ "type": "bold" }));
        assert_eq!(mark_from_json(&v).unwrap(), Mark::new("bold"));
    }

    #[test]
    fn attrs_preserve_insertion_order() {
        let mut attrs = Attrs::new();
        attrs.insert("z".into(), json!(1));
        attrs.insert("a".into(), json!(2));
        let round = attrs_from_json(&attrs_to_json(&attrs)).unwrap();
        let keys: Vec<_> = round.keys().cloned().collect();
        assert_eq!(keys, vec!["z".to_string(), "a".to_string()]);
    }
}
