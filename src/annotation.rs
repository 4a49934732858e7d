//! Annotation tree: the nested document-field structure the processing
//! pipeline sends with each request.
//!
//! Nodes are tagged with a `schema_id` describing their semantic role; the
//! first pre-order match for a schema id is authoritative. Node ids must be
//! unique across the whole tree, which is validated at construction so later
//! lookups can trust them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::RequestShapeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContent {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationNode {
    pub id: String,
    pub schema_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<NodeContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AnnotationNode>,
}

impl AnnotationNode {
    /// Extracted text of the node; empty when the node carries no content.
    pub fn value(&self) -> &str {
        self.content.as_ref().map(|c| c.value.as_str()).unwrap_or("")
    }
}

/// Document-ordered annotation forest with ids validated unique.
#[derive(Debug, Clone)]
pub struct AnnotationTree {
    roots: Vec<AnnotationNode>,
}

impl AnnotationTree {
    /// Wraps the raw node list, rejecting duplicate node ids. Traversal is
    /// iterative so adversarially deep trees cannot blow the stack.
    pub fn new(roots: Vec<AnnotationNode>) -> Result<Self, RequestShapeError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&AnnotationNode> = roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if !seen.insert(node.id.as_str()) {
                return Err(RequestShapeError::DuplicateNodeId(node.id.clone()));
            }
            stack.extend(node.children.iter().rev());
        }
        Ok(Self { roots })
    }

    /// First node whose `schema_id` equals the target, in pre-order document
    /// order. Returns `None` when the tree is exhausted.
    pub fn find_by_schema_id(&self, schema_id: &str) -> Option<&AnnotationNode> {
        let mut stack: Vec<&AnnotationNode> = self.roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.schema_id == schema_id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    pub fn roots(&self) -> &[AnnotationNode] {
        &self.roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str, schema_id: &str, value: &str) -> AnnotationNode {
        AnnotationNode {
            id: id.to_string(),
            schema_id: schema_id.to_string(),
            content: Some(NodeContent {
                value: value.to_string(),
            }),
            children: Vec::new(),
        }
    }

    fn section(id: &str, schema_id: &str, children: Vec<AnnotationNode>) -> AnnotationNode {
        AnnotationNode {
            id: id.to_string(),
            schema_id: schema_id.to_string(),
            content: None,
            children,
        }
    }

    #[test]
    fn finds_nested_node_in_document_order() {
        let tree = AnnotationTree::new(vec![
            section(
                "1",
                "header",
                vec![leaf("2", "sender_name", "first"), leaf("3", "note", "x")],
            ),
            leaf("4", "sender_name", "second"),
        ])
        .unwrap();

        let node = tree.find_by_schema_id("sender_name").unwrap();
        assert_eq!(node.id, "2");
        assert_eq!(node.value(), "first");
    }

    #[test]
    fn searches_siblings_after_descending() {
        // A non-matching subtree must not swallow matches in later siblings.
        let tree = AnnotationTree::new(vec![
            section("1", "header", vec![leaf("2", "note", "x")]),
            section("3", "body", vec![leaf("4", "vendor_match", "---")]),
        ])
        .unwrap();

        assert_eq!(tree.find_by_schema_id("vendor_match").unwrap().id, "4");
    }

    #[test]
    fn missing_schema_id_is_none() {
        let tree = AnnotationTree::new(vec![leaf("1", "sender_name", "A")]).unwrap();
        assert!(tree.find_by_schema_id("vendor_match").is_none());
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let err = AnnotationTree::new(vec![
            leaf("1", "sender_name", "A"),
            section("2", "body", vec![leaf("1", "note", "x")]),
        ])
        .unwrap_err();
        assert_eq!(err, RequestShapeError::DuplicateNodeId("1".to_string()));
    }

    #[test]
    fn node_without_content_has_empty_value() {
        let node = section("1", "vendor_section", Vec::new());
        assert_eq!(node.value(), "");
    }
}
