//! Patch documents and the planner that builds them.
//!
//! The op for each field is decided against the snapshot passed in, which must
//! be the same snapshot the run extracted its features from.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::twin::TwinAttributes;

/// JSON-patch operation kinds the pipeline emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
}

/// A single field-level operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

impl PatchOperation {
    /// Top-level attribute name targeted by this operation.
    pub fn field(&self) -> String {
        let raw = self.path.strip_prefix('/').unwrap_or(&self.path);
        raw.replace("~1", "/").replace("~0", "~")
    }
}

/// Operations applied atomically by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchDocument(Vec<PatchOperation>);

impl PatchDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: PatchOperation) {
        self.0.push(operation);
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ops(&self) -> Vec<PatchOp> {
        self.0.iter().map(|o| o.op).collect()
    }
}

/// JSON pointer for a top-level attribute (RFC 6901 escaping).
pub fn pointer_for(field: &str) -> String {
    format!("/{}", field.replace('~', "~0").replace('/', "~1"))
}

/// Pure add/replace planner.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchPlanner;

impl PatchPlanner {
    /// `add` iff `field` is absent from `snapshot`, `replace` iff present.
    pub fn plan(snapshot: &TwinAttributes, field: &str, value: impl Into<Value>) -> PatchOperation {
        let op = if snapshot.contains(field) {
            PatchOp::Replace
        } else {
            PatchOp::Add
        };
        PatchOperation {
            op,
            path: pointer_for(field),
            value: value.into(),
        }
    }

    /// Plan several fields into one document, each against the same snapshot.
    pub fn plan_document<I, K, V>(snapshot: &TwinAttributes, fields: I) -> PatchDocument
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut document = PatchDocument::new();
        for (field, value) in fields {
            document.push(Self::plan(snapshot, field.as_ref(), value));
        }
        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_add_when_absent() {
        let op = PatchPlanner::plan(&TwinAttributes::new(), "predictionLabel", "mastitis");
        assert_eq!(op.op, PatchOp::Add);
        assert_eq!(op.path, "/predictionLabel");
        assert_eq!(op.value, json!("mastitis"));
    }

    #[test]
    fn test_replace_when_present() {
        let snapshot = TwinAttributes::new().with("predictionLabel", "normal");
        let op = PatchPlanner::plan(&snapshot, "predictionLabel", "lameness");
        assert_eq!(op.op, PatchOp::Replace);
    }

    #[test]
    fn test_multi_field_document() {
        let snapshot = TwinAttributes::new().with("predictionLabel", "normal");
        let doc = PatchPlanner::plan_document(
            &snapshot,
            [("predictionLabel", json!("estrus")), ("predictedAt", json!("2024-05-01T00:00:00Z"))],
        );
        assert_eq!(doc.ops(), vec![PatchOp::Replace, PatchOp::Add]);
    }

    #[test]
    fn test_wire_format_is_json_patch() {
        let doc = PatchPlanner::plan_document(&TwinAttributes::new(), [("predictionLabel", "normal")]);
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!([{"op": "add", "path": "/predictionLabel", "value": "normal"}])
        );
    }

    #[test]
    fn test_pointer_escaping() {
        let op = PatchPlanner::plan(&TwinAttributes::new(), "a/b~c", 1);
        assert_eq!(op.path, "/a~1b~0c");
        assert_eq!(op.field(), "a/b~c");
    }

    proptest! {
        #[test]
        fn prop_op_tracks_presence(
            keys in proptest::collection::btree_set("[a-zA-Z_]{1,12}", 0..8),
            field in "[a-zA-Z_]{1,12}",
        ) {
            let snapshot: TwinAttributes = keys
                .iter()
                .map(|k| (k.clone(), json!(1)))
                .collect();
            let op = PatchPlanner::plan(&snapshot, &field, "x").op;
            prop_assert_eq!(op == PatchOp::Add, !keys.contains(&field));
            prop_assert_eq!(op == PatchOp::Replace, keys.contains(&field));
        }
    }
}
