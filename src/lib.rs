//! Library exports for the dataset export, audit, and disagreement jobs.
/// Run directories and CSV/JSON artifact writers.
pub mod artifacts;
/// Snapshot integrity audit.
pub mod audit;
/// Pipeline configuration and connection string resolution.
pub mod config;
/// Split assignment, label mapping, and manifest export.
pub mod dataset;
/// Automated vs. human rating disagreement report.
pub mod disagreement;
/// Tracing subscriber setup for the binaries.
pub mod logging;
/// SQLite store access and schema.
pub mod store;
