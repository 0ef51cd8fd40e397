//! Read-only predictor over a validated artifact.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use herdsync_types::{expected_kind, AttributeKind, FeatureValue, FeatureVector, PredictionResult};
use tracing::info;

use crate::artifact::{FeatureEncoding, ModelArtifact, FORMAT_VERSION};
use crate::error::{ModelError, ModelResult, PredictionError};

/// Predictor handle shared by every run in the process.
pub type SharedPredictor = Arc<Predictor>;

static INSTALLED: OnceLock<SharedPredictor> = OnceLock::new();

#[derive(Debug)]
enum Column {
    Scaled { feature: String, mean: f64, scale: f64 },
    OneHot { feature: String, categories: Vec<String> },
}

/// Frozen classifier. Immutable after construction.
#[derive(Debug)]
pub struct Predictor {
    artifact: ModelArtifact,
    columns: Vec<Column>,
    width: usize,
}

impl Predictor {
    /// Read and validate an artifact file.
    pub fn load(path: impl AsRef<Path>, required: &[String]) -> ModelResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;
        let predictor = Self::from_artifact(artifact, required)?;

        info!(
            path = %path.display(),
            model_version = %predictor.model_version(),
            trees = predictor.artifact.trees.len(),
            classes = predictor.artifact.classes.len(),
            "Loaded classifier artifact"
        );
        Ok(predictor)
    }

    /// Validate an in-memory artifact against the required feature list.
    ///
    /// The artifact's feature names must equal `required`, in the same order.
    pub fn from_artifact(artifact: ModelArtifact, required: &[String]) -> ModelResult<Self> {
        if artifact.format_version != FORMAT_VERSION {
            return Err(ModelError::UnsupportedFormat {
                found: artifact.format_version,
                supported: FORMAT_VERSION,
            });
        }

        let names = artifact.feature_names();
        if names != required {
            return Err(ModelError::SchemaMismatch {
                expected: required.to_vec(),
                found: names,
            });
        }

        for spec in &artifact.features {
            let kind = expected_kind(&spec.name);
            match &spec.encoding {
                FeatureEncoding::Numeric { mean, scale } => {
                    if kind != Some(AttributeKind::Number) {
                        return Err(invalid(format!("'{}' is not a numeric feature", spec.name)));
                    }
                    if !mean.is_finite() || !scale.is_finite() || *scale == 0.0 {
                        return Err(invalid(format!("bad scaler for '{}'", spec.name)));
                    }
                }
                FeatureEncoding::Categorical { categories } => {
                    if kind != Some(AttributeKind::Text) {
                        return Err(invalid(format!(
                            "'{}' is not a categorical feature",
                            spec.name
                        )));
                    }
                    if categories.is_empty() {
                        return Err(invalid(format!("no categories for '{}'", spec.name)));
                    }
                }
            }
        }

        if artifact.classes.is_empty() {
            return Err(invalid("empty class list".to_string()));
        }
        if artifact.trees.is_empty() {
            return Err(invalid("forest has no trees".to_string()));
        }

        let width = artifact.encoded_width();
        for (idx, tree) in artifact.trees.iter().enumerate() {
            if let Some(problem) = tree.check(width, artifact.classes.len()) {
                return Err(invalid(format!("tree {}: {}", idx, problem)));
            }
        }

        let numeric = artifact.features.iter().filter_map(|spec| match &spec.encoding {
            FeatureEncoding::Numeric { mean, scale } => Some(Column::Scaled {
                feature: spec.name.clone(),
                mean: *mean,
                scale: *scale,
            }),
            FeatureEncoding::Categorical { .. } => None,
        });
        let categorical = artifact.features.iter().filter_map(|spec| match &spec.encoding {
            FeatureEncoding::Categorical { categories } => Some(Column::OneHot {
                feature: spec.name.clone(),
                categories: categories.clone(),
            }),
            FeatureEncoding::Numeric { .. } => None,
        });
        let columns = numeric.chain(categorical).collect();

        Ok(Self {
            artifact,
            columns,
            width,
        })
    }

    /// Publish this predictor as the process-wide instance. Succeeds once.
    pub fn install(self) -> ModelResult<SharedPredictor> {
        let shared = Arc::new(self);
        INSTALLED
            .set(shared.clone())
            .map_err(|_| ModelError::AlreadyInstalled)?;
        Ok(shared)
    }

    pub fn model_version(&self) -> &str {
        &self.artifact.model_version
    }

    pub fn classes(&self) -> &[String] {
        &self.artifact.classes
    }

    /// Classify one vector. Majority vote; ties go to the lowest class index.
    pub fn predict(&self, vector: &FeatureVector) -> Result<PredictionResult, PredictionError> {
        let encoded = self.encode(vector)?;

        let mut votes = vec![0usize; self.artifact.classes.len()];
        for tree in &self.artifact.trees {
            votes[tree.classify(&encoded)] += 1;
        }

        let mut winner = 0;
        for (idx, count) in votes.iter().enumerate() {
            if *count > votes[winner] {
                winner = idx;
            }
        }

        Ok(PredictionResult::new(self.artifact.classes[winner].clone()))
    }

    fn encode(&self, vector: &FeatureVector) -> Result<Vec<f64>, PredictionError> {
        let mut encoded = Vec::with_capacity(self.width);
        for column in &self.columns {
            match column {
                Column::Scaled {
                    feature,
                    mean,
                    scale,
                } => {
                    let Some(FeatureValue::Number(x)) = vector.value(feature) else {
                        return Err(PredictionError::Format {
                            feature: feature.clone(),
                        });
                    };
                    let z = (x - mean) / scale;
                    if !z.is_finite() {
                        return Err(PredictionError::NonFinite {
                            feature: feature.clone(),
                        });
                    }
                    encoded.push(z);
                }
                Column::OneHot {
                    feature,
                    categories,
                } => {
                    let Some(FeatureValue::Text(value)) = vector.value(feature) else {
                        return Err(PredictionError::Format {
                            feature: feature.clone(),
                        });
                    };
                    encoded.extend(
                        categories
                            .iter()
                            .map(|c| if c == value { 1.0 } else { 0.0 }),
                    );
                }
            }
        }
        Ok(encoded)
    }
}

fn invalid(message: String) -> ModelError {
    ModelError::InvalidArtifact(message)
}
