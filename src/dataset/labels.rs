//! Conversion from raw consensus ratings to the training target for a task type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BINARY_THRESHOLD: f64 = 4.0;

#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    #[error("unsupported target type {0:?} (expected binary or regression)")]
    UnsupportedTaskType(String),
    #[error("binary threshold must be finite, got {0}")]
    InvalidThreshold(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Binary,
    Regression,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Binary => "binary",
            TaskType::Regression => "regression",
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = LabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "binary" => Ok(TaskType::Binary),
            "regression" => Ok(TaskType::Regression),
            other => Err(LabelError::UnsupportedTaskType(other.to_string())),
        }
    }
}

/// Training target emitted into a manifest row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Target {
    /// `1` for good, `0` for not good.
    Class(u8),
    Value(f64),
}

/// How raw ratings become targets for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LabelPolicy {
    pub target_type: TaskType,
    pub binary_threshold: f64,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self {
            target_type: TaskType::Binary,
            binary_threshold: DEFAULT_BINARY_THRESHOLD,
        }
    }
}

impl LabelPolicy {
    /// Build a policy from a task type name, rejecting anything but `binary`/`regression`.
    pub fn new(target_type: &str, binary_threshold: f64) -> Result<Self, LabelError> {
        let target_type = target_type.parse::<TaskType>()?;
        if !binary_threshold.is_finite() {
            return Err(LabelError::InvalidThreshold(binary_threshold));
        }
        Ok(Self {
            target_type,
            binary_threshold,
        })
    }
}

/// Convert a continuous rating into the good/not-good class.
pub fn to_binary(label_value: f64, threshold: f64) -> u8 {
    if label_value >= threshold { 1 } else { 0 }
}

/// Map a raw rating to the target for the policy's task type.
pub fn map_label(label_value: f64, policy: &LabelPolicy) -> Target {
    match policy.target_type {
        TaskType::Binary => Target::Class(to_binary(label_value, policy.binary_threshold)),
        TaskType::Regression => Target::Value(label_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive_on_positive_side() {
        let policy = LabelPolicy::default();
        assert_eq!(map_label(4.0, &policy), Target::Class(1));
        assert_eq!(map_label(3.99, &policy), Target::Class(0));
        assert_eq!(map_label(3.0, &policy), Target::Class(0));
        assert_eq!(map_label(5.0, &policy), Target::Class(1));
    }

    #[test]
    fn regression_passes_value_through() {
        let policy = LabelPolicy::new("regression", 4.0).unwrap();
        assert_eq!(map_label(3.25, &policy), Target::Value(3.25));
    }

    #[test]
    fn custom_threshold_is_respected() {
        let policy = LabelPolicy::new("binary", 3.5).unwrap();
        assert_eq!(map_label(3.5, &policy), Target::Class(1));
        assert_eq!(map_label(3.49, &policy), Target::Class(0));
    }

    #[test]
    fn unknown_task_type_is_rejected() {
        let err = LabelPolicy::new("multiclass", 4.0).unwrap_err();
        assert_eq!(err, LabelError::UnsupportedTaskType("multiclass".to_string()));
    }

    #[test]
    fn non_finite_threshold_is_rejected() {
        assert!(matches!(
            LabelPolicy::new("binary", f64::NAN),
            Err(LabelError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn targets_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&Target::Class(1)).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Target::Value(4.5)).unwrap(), "4.5");
    }
}
