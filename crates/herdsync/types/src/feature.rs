//! Feature vectors and their validation.
//!
//! A [`FeatureVector`] can only be obtained from [`FeatureValidator::validate`],
//! which checks every required key before failing and never yields a partial
//! vector.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{FieldMismatch, ValidationError, ValidationResult};
use crate::twin::{AttributeKind, TwinAttributes};

/// The eleven attributes the classifier consumes, in declared order.
pub const REQUIRED_FEATURES: [&str; 11] = [
    "breed",
    "rumination_time",
    "avg_lameness",
    "estrus_sign",
    "ax",
    "ay",
    "az",
    "gx",
    "gy",
    "gz",
    "step_count",
];

/// Stored kind a required feature must have; `None` for unknown names.
pub fn expected_kind(name: &str) -> Option<AttributeKind> {
    match name {
        "breed" | "estrus_sign" => Some(AttributeKind::Text),
        "rumination_time" | "avg_lameness" | "ax" | "ay" | "az" | "gx" | "gy" | "gz"
        | "step_count" => Some(AttributeKind::Number),
        _ => None,
    }
}

/// A single feature value, borrowed from a vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Text(&'a str),
    Number(f64),
}

/// Validated snapshot of the attributes a classifier needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    breed: String,
    rumination_time: f64,
    avg_lameness: f64,
    estrus_sign: String,
    ax: f64,
    ay: f64,
    az: f64,
    gx: f64,
    gy: f64,
    gz: f64,
    step_count: f64,
}

impl FeatureVector {
    /// Look up a feature by attribute name.
    pub fn value(&self, name: &str) -> Option<FeatureValue<'_>> {
        let value = match name {
            "breed" => FeatureValue::Text(&self.breed),
            "estrus_sign" => FeatureValue::Text(&self.estrus_sign),
            "rumination_time" => FeatureValue::Number(self.rumination_time),
            "avg_lameness" => FeatureValue::Number(self.avg_lameness),
            "ax" => FeatureValue::Number(self.ax),
            "ay" => FeatureValue::Number(self.ay),
            "az" => FeatureValue::Number(self.az),
            "gx" => FeatureValue::Number(self.gx),
            "gy" => FeatureValue::Number(self.gy),
            "gz" => FeatureValue::Number(self.gz),
            "step_count" => FeatureValue::Number(self.step_count),
            _ => return None,
        };
        Some(value)
    }
}

/// Converts twin attributes into feature vectors.
#[derive(Debug, Clone)]
pub struct FeatureValidator {
    required: Vec<String>,
}

impl Default for FeatureValidator {
    fn default() -> Self {
        Self {
            required: REQUIRED_FEATURES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FeatureValidator {
    /// Create a validator for an externally supplied required-feature list.
    ///
    /// The list fixes the reporting order and must name every feature-vector
    /// field exactly once.
    pub fn new(required: Vec<String>) -> ValidationResult<Self> {
        let mut seen = BTreeSet::new();
        for name in &required {
            if expected_kind(name).is_none() {
                return Err(ValidationError::Schema(format!("unknown feature '{}'", name)));
            }
            if !seen.insert(name.as_str()) {
                return Err(ValidationError::Schema(format!("duplicate feature '{}'", name)));
            }
        }
        let absent: Vec<_> = REQUIRED_FEATURES
            .iter()
            .filter(|name| !seen.contains(**name))
            .copied()
            .collect();
        if !absent.is_empty() {
            return Err(ValidationError::Schema(format!(
                "feature list omits {}",
                absent.join(", ")
            )));
        }
        Ok(Self { required })
    }

    /// Required attribute names, in reporting order.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Build a feature vector, or report every missing / mistyped key at once.
    pub fn validate(&self, attributes: &TwinAttributes) -> ValidationResult<FeatureVector> {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|name| !attributes.contains(name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields { missing });
        }

        let mismatches: Vec<FieldMismatch> = self
            .required
            .iter()
            .filter_map(|name| {
                let expected = expected_kind(name)?;
                let found = attributes.kind_of(name)?;
                (found != expected).then(|| FieldMismatch {
                    field: name.clone(),
                    expected,
                    found,
                })
            })
            .collect();
        if !mismatches.is_empty() {
            return Err(ValidationError::TypeMismatch { mismatches });
        }

        let text = |name: &str| -> String {
            attributes
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let number = |name: &str| -> f64 {
            attributes
                .get(name)
                .and_then(|v| v.as_f64())
                .unwrap_or_default()
        };

        Ok(FeatureVector {
            breed: text("breed"),
            rumination_time: number("rumination_time"),
            avg_lameness: number("avg_lameness"),
            estrus_sign: text("estrus_sign"),
            ax: number("ax"),
            ay: number("ay"),
            az: number("az"),
            gx: number("gx"),
            gy: number("gy"),
            gz: number("gz"),
            step_count: number("step_count"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn complete() -> TwinAttributes {
        TwinAttributes::new()
            .with("breed", "Cross Breed")
            .with("rumination_time", 280)
            .with("avg_lameness", 4.5)
            .with("estrus_sign", "standing_mount")
            .with("ax", 2.5)
            .with("ay", 2.8)
            .with("az", 2.2)
            .with("gx", 3.5)
            .with("gy", 3.2)
            .with("gz", 3.1)
            .with("step_count", 38)
    }

    #[test]
    fn test_complete_twin_validates() {
        let vector = FeatureValidator::default().validate(&complete()).unwrap();
        assert_eq!(vector.value("breed"), Some(FeatureValue::Text("Cross Breed")));
        assert_eq!(vector.value("rumination_time"), Some(FeatureValue::Number(280.0)));
        assert_eq!(vector.value("ay"), Some(FeatureValue::Number(2.8)));
        assert_eq!(vector.value("step_count"), Some(FeatureValue::Number(38.0)));
        assert_eq!(vector.value("estrus_sign"), Some(FeatureValue::Text("standing_mount")));
        assert_eq!(vector.value("predictionLabel"), None);
    }

    #[test]
    fn test_reports_all_missing_in_declared_order() {
        let mut attrs = complete();
        attrs.remove("step_count");
        attrs.remove("avg_lameness");

        let err = FeatureValidator::default().validate(&attrs).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields {
                missing: vec!["avg_lameness".to_string(), "step_count".to_string()],
            }
        );
    }

    #[test]
    fn test_missing_wins_over_mismatch() {
        let mut attrs = complete().with("ax", "fast");
        attrs.remove("gz");

        let err = FeatureValidator::default().validate(&attrs).unwrap_err();
        assert!(matches!(err, ValidationError::MissingFields { ref missing } if missing == &["gz"]));
    }

    #[test]
    fn test_type_mismatch_names_field_and_kind() {
        let attrs = complete()
            .with("ax", json!([0.1, 0.2, 0.3]))
            .with("breed", 7);

        let err = FeatureValidator::default().validate(&attrs).unwrap_err();
        let ValidationError::TypeMismatch { mismatches } = err else {
            panic!("expected type mismatch");
        };
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].field, "breed");
        assert_eq!(mismatches[0].expected, AttributeKind::Text);
        assert_eq!(mismatches[0].found, AttributeKind::Number);
        assert_eq!(mismatches[1].field, "ax");
        assert_eq!(mismatches[1].found, AttributeKind::Vector3);
    }

    #[test]
    fn test_custom_order_drives_reporting() {
        let mut order: Vec<String> = REQUIRED_FEATURES.iter().map(|s| s.to_string()).collect();
        order.reverse();
        let validator = FeatureValidator::new(order).unwrap();

        let mut attrs = complete();
        attrs.remove("breed");
        attrs.remove("step_count");

        let err = validator.validate(&attrs).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields {
                missing: vec!["step_count".to_string(), "breed".to_string()],
            }
        );
    }

    #[test]
    fn test_rejects_bad_schema() {
        let mut names: Vec<String> = REQUIRED_FEATURES.iter().map(|s| s.to_string()).collect();
        names.pop();
        assert!(matches!(FeatureValidator::new(names.clone()), Err(ValidationError::Schema(_))));

        names.push("breed".to_string());
        assert!(matches!(FeatureValidator::new(names.clone()), Err(ValidationError::Schema(_))));

        names.pop();
        names.push("weight".to_string());
        assert!(matches!(FeatureValidator::new(names), Err(ValidationError::Schema(_))));
    }

    proptest! {
        #[test]
        fn prop_missing_report_is_exact(mask in proptest::collection::vec(any::<bool>(), 11)) {
            let mut attrs = complete();
            let mut expected = Vec::new();
            for (name, drop) in REQUIRED_FEATURES.iter().zip(&mask) {
                if *drop {
                    attrs.remove(name);
                    expected.push(name.to_string());
                }
            }

            let result = FeatureValidator::default().validate(&attrs);
            if expected.is_empty() {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(result.unwrap_err(), ValidationError::MissingFields { missing: expected });
            }
        }
    }
}
