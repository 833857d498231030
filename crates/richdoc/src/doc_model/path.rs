//! Integer-index path addressing and persistent tree rebuilding.
//!
//! A [`Path`] is the sequence of child indices from the document root (the
//! empty path addresses the root's own child level). Resolution fails with
//! [`EditError::InvalidPath`] when an index is out of range or the path
//! tries to descend *through* a text node; an operation that finds a text
//! node where it needs an element at the final step fails with
//! [`EditError::TypeMismatch`].
//!
//! The `update_*` helpers are the single write path of the model: they
//! shallow-copy the ancestor chain along `path` and re-reference everything
//! else, which is what makes documents cheap persistent values.

use std::sync::Arc;

use super::{EditError, ElementNode, Node};

/// Sequence of child indices from a root.
pub type Path = Vec<usize>;

/// Resolve the node addressed by `path`.
pub fn resolve_node<'a>(children: &'a [Arc<Node>], path: &[usize]) -> Result<&'a Node, EditError> {
    let (&idx, rest) = path.split_first().ok_or(EditError::InvalidPath)?;
    let node = children.get(idx).ok_or(EditError::InvalidPath)?;
    if rest.is_empty() {
        return Ok(node);
    }
    match &**node {
        Node::Element(el) => resolve_node(&el.children, rest),
        Node::Text(_) => Err(EditError::InvalidPath),
    }
}

/// Resolve the child vector of the element addressed by `path` (the root's
/// own children when `path` is empty).
pub fn resolve_children<'a>(
    children: &'a [Arc<Node>],
    path: &[usize],
) -> Result<&'a [Arc<Node>], EditError> {
    let Some((&idx, rest)) = path.split_first() else {
        return Ok(children);
    };
    let node = children.get(idx).ok_or(EditError::InvalidPath)?;
    match &**node {
        Node::Element(el) => resolve_children(&el.children, rest),
        Node::Text(_) => Err(if rest.is_empty() {
            EditError::TypeMismatch
        } else {
            EditError::InvalidPath
        }),
    }
}

/// Replace the node at `path` with `f(old)`, rebuilding only the ancestors.
pub fn update_node_at<F>(
    children: &[Arc<Node>],
    path: &[usize],
    f: F,
) -> Result<Vec<Arc<Node>>, EditError>
where
    F: FnOnce(&Node) -> Result<Node, EditError>,
{
    let (&idx, rest) = path.split_first().ok_or(EditError::InvalidPath)?;
    let node = children.get(idx).ok_or(EditError::InvalidPath)?;
    let replacement = if rest.is_empty() {
        f(node)?
    } else {
        match &**node {
            Node::Element(el) => {
                Node::Element(el.with_children(update_node_at(&el.children, rest, f)?))
            }
            Node::Text(_) => return Err(EditError::InvalidPath),
        }
    };
    let mut out = children.to_vec();
    out[idx] = Arc::new(replacement);
    Ok(out)
}

/// Run `f` over the child vector of the element at `path` (the root level
/// when `path` is empty) and splice the result back in.
pub fn update_children_at<F>(
    children: &[Arc<Node>],
    path: &[usize],
    f: F,
) -> Result<Vec<Arc<Node>>, EditError>
where
    F: FnOnce(&[Arc<Node>]) -> Result<Vec<Arc<Node>>, EditError>,
{
    let Some((&idx, rest)) = path.split_first() else {
        return f(children);
    };
    let node = children.get(idx).ok_or(EditError::InvalidPath)?;
    let el: &ElementNode = match &**node {
        Node::Element(el) => el,
        Node::Text(_) => {
            return Err(if rest.is_empty() {
                EditError::TypeMismatch
            } else {
                EditError::InvalidPath
            })
        }
    };
    let new_children = update_children_at(&el.children, rest, f)?;
    let mut out = children.to_vec();
    out[idx] = Arc::new(Node::Element(el.with_children(new_children)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_model::{IdGenerator, SequentialIdGenerator, TextNode};

    fn tree() -> Vec<Arc<Node>> {
        let ids = SequentialIdGenerator::new(1);
        let text = Arc::new(Node::Text(TextNode::new(ids.next_id(), "hi")));
        let mut inner = ElementNode::new(ids.next_id(), "paragraph");
        inner.children = vec![text];
        let mut outer = ElementNode::new(ids.next_id(), "blockquote");
        outer.children = vec![Arc::new(Node::Element(inner))];
        vec![Arc::new(Node::Element(outer))]
    }

    #[test]
    fn resolve_descends_indices() {
        let children = tree();
        let node = resolve_node(&children, &[0, 0, 0]).unwrap();
        assert_eq!(node.as_text().unwrap().text, "hi");
    }

    #[test]
    fn resolve_out_of_range_is_invalid_path() {
        let children = tree();
        assert_eq!(resolve_node(&children, &[1]), Err(EditError::InvalidPath));
        assert_eq!(
            resolve_node(&children, &[0, 5]),
            Err(EditError::InvalidPath)
        );
    }

    #[test]
    fn resolve_through_text_is_invalid_path() {
        let children = tree();
        assert_eq!(
            resolve_node(&children, &[0, 0, 0, 0]),
            Err(EditError::InvalidPath)
        );
        assert_eq!(
            resolve_children(&children, &[0, 0, 0, 0]),
            Err(EditError::InvalidPath)
        );
    }

    #[test]
    fn resolve_children_of_text_is_type_mismatch() {
        let children = tree();
        assert_eq!(
            resolve_children(&children, &[0, 0, 0]).unwrap_err(),
            EditError::TypeMismatch
        );
    }

    #[test]
    fn update_rebuilds_only_the_spine() {
        let children = tree();
        let updated = update_node_at(&children, &[0, 0, 0], |node| {
            let t = node.as_text().unwrap();
            Ok(Node::Text(TextNode {
                id: t.id,
                text: "ho".into(),
                marks: t.marks.clone(),
            }))
        })
        .unwrap();
        assert_eq!(
            resolve_node(&updated, &[0, 0, 0]).unwrap().as_text().unwrap().text,
            "ho"
        );
        // Original untouched.
        assert_eq!(
            resolve_node(&children, &[0, 0, 0]).unwrap().as_text().unwrap().text,
            "hi"
        );
    }

    #[test]
    fn update_children_at_root_level() {
        let children = tree();
        let ids = SequentialIdGenerator::new(100);
        let updated = update_children_at(&children, &[], |kids| {
            let mut out = kids.to_vec();
            out.push(Arc::new(Node::Text(TextNode::new(ids.next_id(), "x"))));
            Ok(out)
        })
        .unwrap();
        assert_eq!(updated.len(), 2);
        assert!(Arc::ptr_eq(&children[0], &updated[0]));
    }
}
