//! Dataset preparation for training pipelines.

/// Training manifest export.
pub mod export;
/// Rating to training-target mapping.
pub mod labels;
/// Deterministic train/val/test assignment.
pub mod split;
