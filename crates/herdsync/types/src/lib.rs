//! Herdsync core types.
//!
//! Everything a single sync run creates and discards lives here:
//! - [`TwinSnapshot`] / [`TwinAttributes`]: the remote twin state observed by a run
//! - [`FeatureVector`] and the [`FeatureValidator`] that builds it
//! - [`PredictionResult`]
//! - [`PatchDocument`] and the [`PatchPlanner`] that builds it
//! - [`NotificationEvent`]
//!
//! Nothing in this crate performs I/O.

pub mod error;
pub mod feature;
pub mod notification;
pub mod patch;
pub mod prediction;
pub mod twin;

pub use error::{FieldMismatch, ValidationError, ValidationResult};
pub use feature::{expected_kind, FeatureValidator, FeatureValue, FeatureVector, REQUIRED_FEATURES};
pub use notification::{ChannelFailure, NotificationEvent, Severity};
pub use patch::{PatchDocument, PatchOp, PatchOperation, PatchPlanner};
pub use prediction::PredictionResult;
pub use twin::{AttributeKind, TwinAttributes, TwinId, TwinSnapshot};
