//! Training manifest export.
//!
//! Candidate snapshots are read once, assigned a split by webcam group and a
//! target by the label policy, and written as `manifest_{full,train,val,test}.csv`
//! plus `export_meta.json` into a fresh run directory. With a training-run id
//! the exact membership is also upserted into the store.

mod membership;
mod query;

use std::path::PathBuf;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::labels::{LabelPolicy, Target, TaskType, map_label};
use super::split::{Split, SplitConfig, SplitError, assign_split};
use crate::artifacts::{self, ArtifactError, CsvRow};
use crate::store::AccessMode;

pub use membership::{persist_membership, persist_membership_at};
pub use query::{CandidateRow, load_candidates};

const MANIFEST_FULL_FILE_NAME: &str = "manifest_full.csv";
const META_FILE_NAME: &str = "export_meta.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error("unsupported label source {0:?} (expected manual_only or public_aggregate)")]
    UnsupportedLabelSource(String),
    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("failed to format membership timestamp: {0}")]
    FormatTime(#[from] time::error::Format),
}

/// Candidate selection mode; also recorded as the label source of every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// Any snapshot with a consensus rating whose rating-row count (possibly zero)
    /// clears the gate.
    ManualOnly,
    /// Only snapshots backed by at least one rating row.
    PublicAggregate,
}

impl LabelSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LabelSource::ManualOnly => "manual_only",
            LabelSource::PublicAggregate => "public_aggregate",
        }
    }
}

impl std::str::FromStr for LabelSource {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "manual_only" => Ok(LabelSource::ManualOnly),
            "public_aggregate" => Ok(LabelSource::PublicAggregate),
            other => Err(ExportError::UnsupportedLabelSource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Root under which the timestamped run directory is created.
    pub output_root: PathBuf,
    pub label_source: LabelSource,
    pub label_policy: LabelPolicy,
    /// Minimum number of backing rating rows per snapshot.
    pub min_rating_count: u32,
    pub split: SplitConfig,
    /// When set, membership is persisted under this training run.
    pub training_run_id: Option<i64>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("ml/artifacts/datasets"),
            label_source: LabelSource::ManualOnly,
            label_policy: LabelPolicy::default(),
            min_rating_count: crate::config::DEFAULT_MIN_RATING_COUNT,
            split: SplitConfig::default(),
            training_run_id: None,
        }
    }
}

impl ExportOptions {
    /// Store access needed for this export; only membership persistence writes.
    pub fn access_mode(&self) -> AccessMode {
        if self.training_run_id.is_some() {
            AccessMode::ReadWrite
        } else {
            AccessMode::ReadOnly
        }
    }
}

/// One exported sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestRow {
    pub snapshot_id: i64,
    pub webcam_id: i64,
    pub label_source: LabelSource,
    /// Raw consensus rating.
    pub label_value: f64,
    pub target_label: Target,
    pub split: Split,
    #[serde(rename = "image_path_or_url")]
    pub image_ref: String,
    pub phase: Option<String>,
    pub captured_at: Option<String>,
    pub rating_count: u32,
}

impl CsvRow for ManifestRow {
    const HEADER: &'static [&'static str] = &[
        "snapshot_id",
        "webcam_id",
        "label_source",
        "label_value",
        "target_label",
        "split",
        "image_path_or_url",
        "phase",
        "captured_at",
        "rating_count",
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub total: usize,
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

impl SplitCounts {
    pub fn from_rows(rows: &[ManifestRow]) -> Self {
        let mut counts = SplitCounts {
            total: rows.len(),
            ..SplitCounts::default()
        };
        for row in rows {
            match row.split {
                Split::Train => counts.train += 1,
                Split::Val => counts.val += 1,
                Split::Test => counts.test += 1,
            }
        }
        counts
    }
}

/// Run metadata written next to the manifests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportMeta {
    pub label_source: LabelSource,
    pub target_type: TaskType,
    pub binary_threshold: f64,
    pub min_rating_count: u32,
    pub split_config: SplitConfig,
    pub counts: SplitCounts,
    pub training_run_id: Option<i64>,
    pub persisted_membership: usize,
    /// Rows whose consensus rating has no backing rating rows (gate 0, manual_only).
    pub unbacked_consensus_rows: usize,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub output_dir: PathBuf,
    pub meta: ExportMeta,
}

/// Turn candidate rows into manifest rows, in input order.
pub fn build_manifest(
    rows: &[CandidateRow],
    label_source: LabelSource,
    policy: &LabelPolicy,
    split: &SplitConfig,
) -> Result<Vec<ManifestRow>, ExportError> {
    split.validate()?;
    rows.iter()
        .map(|row| {
            // Group by webcam so one camera never spans two splits.
            let assigned = assign_split(&row.webcam_id.to_string(), split)?;
            Ok(ManifestRow {
                snapshot_id: row.snapshot_id,
                webcam_id: row.webcam_id,
                label_source,
                label_value: row.label_value,
                target_label: map_label(row.label_value, policy),
                split: assigned,
                image_ref: row.image_ref.clone(),
                phase: row.phase.clone(),
                captured_at: row.captured_at.clone(),
                rating_count: row.rating_count,
            })
        })
        .collect()
}

fn split_file_name(split: Split) -> String {
    format!("manifest_{}.csv", split.as_str())
}

/// Export manifests for the configured label source and persist membership if requested.
pub fn export_dataset(
    conn: &mut Connection,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    options.split.validate()?;

    let candidates = load_candidates(conn, options.label_source, options.min_rating_count)?;
    tracing::info!(
        label_source = options.label_source.as_str(),
        min_rating_count = options.min_rating_count,
        "Loaded {} candidate snapshots",
        candidates.len()
    );

    let manifest = build_manifest(
        &candidates,
        options.label_source,
        &options.label_policy,
        &options.split,
    )?;
    let unbacked_consensus_rows = manifest.iter().filter(|row| row.rating_count == 0).count();
    if unbacked_consensus_rows > 0 {
        tracing::warn!(
            "{unbacked_consensus_rows} exported snapshots have a consensus rating but no rating rows"
        );
    }

    let output_dir = artifacts::create_run_dir(&options.output_root)?;
    artifacts::write_rows(&output_dir.join(MANIFEST_FULL_FILE_NAME), &manifest)?;
    for split in Split::ALL {
        artifacts::write_rows(
            &output_dir.join(split_file_name(split)),
            manifest.iter().filter(|row| row.split == split),
        )?;
    }

    let counts = SplitCounts::from_rows(&manifest);
    tracing::info!(
        total = counts.total,
        train = counts.train,
        val = counts.val,
        test = counts.test,
        "Wrote manifests to {}",
        output_dir.display()
    );

    let persisted_membership = match options.training_run_id {
        Some(training_run_id) => {
            persist_membership(conn, training_run_id, options.label_source, &manifest)?
        }
        None => 0,
    };

    let meta = ExportMeta {
        label_source: options.label_source,
        target_type: options.label_policy.target_type,
        binary_threshold: options.label_policy.binary_threshold,
        min_rating_count: options.min_rating_count,
        split_config: options.split,
        counts,
        training_run_id: options.training_run_id,
        persisted_membership,
        unbacked_consensus_rows,
    };
    artifacts::write_json(&output_dir.join(META_FILE_NAME), &meta)?;

    Ok(ExportSummary { output_dir, meta })
}
