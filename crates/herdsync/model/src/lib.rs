//! Herdsync classifier.
//!
//! A trained model is frozen into a versioned JSON artifact (see [`artifact`]).
//! [`Predictor`] loads it once, validates it against the feature schema, and is
//! read-only from then on: any number of runs may call [`Predictor::predict`]
//! concurrently through a shared `Arc`.

pub mod artifact;
pub mod error;
pub mod predictor;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use artifact::{FeatureEncoding, FeatureSpec, Leaf, ModelArtifact, SplitNode, TreeNode};
pub use error::{ModelError, ModelResult, PredictionError};
pub use predictor::{Predictor, SharedPredictor};
