//! Frozen classifier artifact.
//!
//! The artifact mirrors the training pipeline: numeric columns are standard
//! scaled, categorical columns are one-hot encoded (unknown categories encode
//! as all zeros), and a forest of binary split trees votes on the encoded row.
//!
//! Encoded layout: every numeric feature in schema order, followed by one
//! block per categorical feature (one slot per category, schema order).
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "model_version": "cow-health-rf-2024.05",
//!   "features": [
//!     {"name": "breed", "kind": "categorical", "categories": ["Cross Breed", "Normal Breed"]},
//!     {"name": "rumination_time", "kind": "numeric", "mean": 320.0, "scale": 75.0}
//!   ],
//!   "classes": ["estrus", "lameness", "mastitis", "normal"],
//!   "trees": [{"split": {"feature_idx": 0, "threshold": -0.5,
//!              "left": {"leaf": {"class_label": 2}},
//!              "right": {"leaf": {"class_label": 3}}}}]
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Artifact format understood by this build.
pub const FORMAT_VERSION: u32 = 1;

/// How one input feature is turned into encoded columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeatureEncoding {
    /// `(x - mean) / scale`, one column.
    Numeric { mean: f64, scale: f64 },
    /// One column per category.
    Categorical { categories: Vec<String> },
}

impl FeatureEncoding {
    pub fn width(&self) -> usize {
        match self {
            FeatureEncoding::Numeric { .. } => 1,
            FeatureEncoding::Categorical { categories } => categories.len(),
        }
    }
}

/// A named input feature and its encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    #[serde(flatten)]
    pub encoding: FeatureEncoding,
}

/// Internal split: go left when `encoded[feature_idx] <= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitNode {
    pub feature_idx: usize,
    pub threshold: f64,
    pub left: Box<TreeNode>,
    pub right: Box<TreeNode>,
}

/// Terminal node holding an index into the artifact's class list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    pub class_label: usize,
    #[serde(default)]
    pub n_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeNode {
    Split(SplitNode),
    Leaf(Leaf),
}

impl TreeNode {
    pub fn leaf(class_label: usize) -> Self {
        TreeNode::Leaf(Leaf {
            class_label,
            n_samples: 0,
        })
    }

    pub fn split(feature_idx: usize, threshold: f64, left: TreeNode, right: TreeNode) -> Self {
        TreeNode::Split(SplitNode {
            feature_idx,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Walk to a leaf for one encoded row.
    pub fn classify(&self, encoded: &[f64]) -> usize {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf(leaf) => return leaf.class_label,
                TreeNode::Split(split) => {
                    node = if encoded[split.feature_idx] <= split.threshold {
                        &split.left
                    } else {
                        &split.right
                    };
                }
            }
        }
    }

    /// First structural problem found, given the encoded width and class count.
    pub(crate) fn check(&self, width: usize, n_classes: usize) -> Option<String> {
        match self {
            TreeNode::Leaf(leaf) if leaf.class_label >= n_classes => Some(format!(
                "leaf class {} outside {} classes",
                leaf.class_label, n_classes
            )),
            TreeNode::Leaf(_) => None,
            TreeNode::Split(split) => {
                if split.feature_idx >= width {
                    return Some(format!(
                        "split on column {} outside encoded width {}",
                        split.feature_idx, width
                    ));
                }
                if !split.threshold.is_finite() {
                    return Some(format!("non-finite threshold on column {}", split.feature_idx));
                }
                split
                    .left
                    .check(width, n_classes)
                    .or_else(|| split.right.check(width, n_classes))
            }
        }
    }
}

/// The frozen model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model_version: String,
    pub features: Vec<FeatureSpec>,
    pub classes: Vec<String>,
    pub trees: Vec<TreeNode>,
}

impl ModelArtifact {
    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    /// Total number of encoded columns.
    pub fn encoded_width(&self) -> usize {
        self.features.iter().map(|f| f.encoding.width()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_documented_layout() {
        let artifact: ModelArtifact = serde_json::from_value(json!({
            "format_version": 1,
            "model_version": "t",
            "features": [
                {"name": "breed", "kind": "categorical", "categories": ["Cross Breed", "Normal Breed"]},
                {"name": "rumination_time", "kind": "numeric", "mean": 320.0, "scale": 75.0}
            ],
            "classes": ["mastitis", "normal"],
            "trees": [{"split": {"feature_idx": 0, "threshold": -0.5,
                       "left": {"leaf": {"class_label": 0}},
                       "right": {"leaf": {"class_label": 1}}}}]
        }))
        .unwrap();

        assert_eq!(artifact.encoded_width(), 3);
        assert_eq!(artifact.feature_names(), vec!["breed", "rumination_time"]);
        assert_eq!(artifact.trees[0].classify(&[-1.0, 0.0, 0.0]), 0);
        assert_eq!(artifact.trees[0].classify(&[0.0, 0.0, 0.0]), 1);
    }

    #[test]
    fn test_check_flags_out_of_range() {
        let tree = TreeNode::split(4, 0.0, TreeNode::leaf(0), TreeNode::leaf(1));
        assert!(tree.check(3, 2).is_some());

        let tree = TreeNode::split(0, 0.0, TreeNode::leaf(0), TreeNode::leaf(5));
        assert!(tree.check(3, 2).is_some());

        let tree = TreeNode::split(0, f64::NAN, TreeNode::leaf(0), TreeNode::leaf(1));
        assert!(tree.check(3, 2).is_some());

        let tree = TreeNode::split(2, 0.0, TreeNode::leaf(0), TreeNode::leaf(1));
        assert!(tree.check(3, 2).is_none());
    }
}
