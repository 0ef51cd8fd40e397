//! Small hand-built artifacts for tests.
//!
//! Both use the default eleven-feature schema, so the encoded layout is:
//! columns 0..=8 scaled numerics (`rumination_time`, `avg_lameness`, `ax`,
//! `ay`, `az`, `gx`, `gy`, `gz`, `step_count`), columns 9..=10 `breed`,
//! columns 11..=13 `estrus_sign`.

use herdsync_types::REQUIRED_FEATURES;

use crate::artifact::{FeatureEncoding, FeatureSpec, ModelArtifact, TreeNode, FORMAT_VERSION};

fn schema() -> Vec<FeatureSpec> {
    REQUIRED_FEATURES
        .iter()
        .map(|name| {
            let encoding = match *name {
                "breed" => FeatureEncoding::Categorical {
                    categories: vec!["Cross Breed".to_string(), "Normal Breed".to_string()],
                },
                "estrus_sign" => FeatureEncoding::Categorical {
                    categories: vec![
                        "none".to_string(),
                        "mucus_discharge".to_string(),
                        "standing_mount".to_string(),
                    ],
                },
                "rumination_time" => FeatureEncoding::Numeric {
                    mean: 320.0,
                    scale: 75.0,
                },
                _ => FeatureEncoding::Numeric {
                    mean: 0.0,
                    scale: 1.0,
                },
            };
            FeatureSpec {
                name: name.to_string(),
                encoding,
            }
        })
        .collect()
}

/// Always predicts `label`.
pub fn constant_artifact(label: &str) -> ModelArtifact {
    ModelArtifact {
        format_version: FORMAT_VERSION,
        model_version: format!("test-constant-{}", label),
        features: schema(),
        classes: vec![label.to_string()],
        trees: vec![TreeNode::leaf(0)],
    }
}

/// `mastitis` when rumination time is at or below 245 minutes, else `normal`.
pub fn rumination_artifact() -> ModelArtifact {
    ModelArtifact {
        format_version: FORMAT_VERSION,
        model_version: "test-rumination".to_string(),
        features: schema(),
        classes: vec!["mastitis".to_string(), "normal".to_string()],
        trees: vec![
            TreeNode::split(0, -1.0, TreeNode::leaf(0), TreeNode::leaf(1)),
            TreeNode::split(0, -1.0, TreeNode::leaf(0), TreeNode::leaf(1)),
            TreeNode::leaf(1),
        ],
    }
}
