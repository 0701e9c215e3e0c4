//! Snapshot coverage and rating integrity audit.
//!
//! Classifies every snapshot by three predicates (image present, consensus
//! rating present, at least one rating row) and exports the export-eligible set
//! plus three mismatch sets for manual inspection. Only `summary.json` is meant
//! for machines. The audit never writes to the store.

mod query;

use std::path::PathBuf;

use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::artifacts::{self, ArtifactError, CsvRow};

pub const DEFAULT_OUTPUT_ROOT: &str = "ml/artifacts/reports/snapshot_audit";
const SUMMARY_FILE_NAME: &str = "summary.json";
const ALL_SNAPSHOTS_FILE_NAME: &str = "all_snapshots.csv";
const RATED_SNAPSHOTS_FILE_NAME: &str = "rated_snapshots.csv";

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("unsupported sort {0:?} (expected captured_desc, captured_asc, id_desc, or id_asc)")]
    UnsupportedSort(String),
    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSort {
    #[default]
    CapturedDesc,
    CapturedAsc,
    IdDesc,
    IdAsc,
}

impl std::str::FromStr for AuditSort {
    type Err = AuditError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "captured_desc" => Ok(AuditSort::CapturedDesc),
            "captured_asc" => Ok(AuditSort::CapturedAsc),
            "id_desc" => Ok(AuditSort::IdDesc),
            "id_asc" => Ok(AuditSort::IdAsc),
            other => Err(AuditError::UnsupportedSort(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub output_root: PathBuf,
    pub sort: AuditSort,
    /// Row cap; zero or negative means unbounded.
    pub limit: i64,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            sort: AuditSort::default(),
            limit: 0,
        }
    }
}

/// One snapshot with its rating statistics and coverage predicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRow {
    pub snapshot_id: i64,
    pub webcam_id: i64,
    pub phase: Option<String>,
    pub captured_at: Option<String>,
    pub created_at: Option<String>,
    pub image_ref: Option<String>,
    pub calculated_rating: Option<f64>,
    pub ai_rating: Option<f64>,
    pub rating_count: u32,
    pub unique_rater_count: u32,
    pub first_rating_at: Option<String>,
    pub last_rating_at: Option<String>,
    pub has_image: bool,
    pub has_consensus_rating: bool,
    pub has_rating_rows: bool,
}

impl CsvRow for AuditRow {
    const HEADER: &'static [&'static str] = &[
        "snapshot_id",
        "webcam_id",
        "phase",
        "captured_at",
        "created_at",
        "image_ref",
        "calculated_rating",
        "ai_rating",
        "rating_count",
        "unique_rater_count",
        "first_rating_at",
        "last_rating_at",
        "has_image",
        "has_consensus_rating",
        "has_rating_rows",
    ];
}

/// Row-sets derived from the coverage predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditCategory {
    ExportEligible,
    /// Rating rows exist but no consensus was calculated.
    RatedButUncalculated,
    /// Consensus exists without any backing rating row.
    CalculatedButUnrated,
    RatedButNoImage,
}

impl AuditCategory {
    pub const ALL: [AuditCategory; 4] = [
        AuditCategory::ExportEligible,
        AuditCategory::RatedButUncalculated,
        AuditCategory::CalculatedButUnrated,
        AuditCategory::RatedButNoImage,
    ];

    pub fn matches(self, row: &AuditRow) -> bool {
        match self {
            AuditCategory::ExportEligible => {
                row.has_image && row.has_consensus_rating && row.has_rating_rows
            }
            AuditCategory::RatedButUncalculated => {
                row.has_rating_rows && !row.has_consensus_rating
            }
            AuditCategory::CalculatedButUnrated => {
                row.has_consensus_rating && !row.has_rating_rows
            }
            AuditCategory::RatedButNoImage => row.has_rating_rows && !row.has_image,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            AuditCategory::ExportEligible => "export_eligible_snapshots.csv",
            AuditCategory::RatedButUncalculated => {
                "mismatch_rating_rows_but_no_calculated_rating.csv"
            }
            AuditCategory::CalculatedButUnrated => {
                "mismatch_calculated_rating_but_no_rating_rows.csv"
            }
            AuditCategory::RatedButNoImage => "mismatch_rating_rows_but_no_image.csv",
        }
    }
}

/// Mismatch categories a row falls into. Only rated rows lacking both a
/// consensus and an image land in two at once.
pub fn mismatches_for(row: &AuditRow) -> Vec<AuditCategory> {
    AuditCategory::ALL
        .into_iter()
        .filter(|category| *category != AuditCategory::ExportEligible && category.matches(row))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RatingTotals {
    pub total_rating_rows: i64,
    pub distinct_snapshots_with_ratings: i64,
    pub distinct_raters: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MismatchCounts {
    pub rating_rows_but_no_calculated_rating: usize,
    pub calculated_rating_but_no_rating_rows: usize,
    pub rating_rows_but_no_image: usize,
    /// Rows counted in both the first and third category.
    pub rating_rows_but_no_calculated_rating_or_image: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuditQuery {
    pub sort: AuditSort,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditSummary {
    pub total_snapshots: usize,
    pub with_image: usize,
    pub with_consensus_rating: usize,
    pub with_any_rating_rows: usize,
    pub export_eligible: usize,
    pub mismatches: MismatchCounts,
    pub rating_table_totals: RatingTotals,
    /// Rating rows per rated snapshot over the audited rows; 0 when none are rated.
    pub avg_rating_rows_per_rated_snapshot: f64,
    pub query: AuditQuery,
}

fn count_matching(rows: &[AuditRow], category: AuditCategory) -> usize {
    rows.iter().filter(|row| category.matches(row)).count()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Aggregate counts over the audited rows.
pub fn build_summary(rows: &[AuditRow], totals: RatingTotals, query: AuditQuery) -> AuditSummary {
    let with_any_rating_rows = rows.iter().filter(|row| row.has_rating_rows).count();
    let population_rating_rows: u64 = rows.iter().map(|row| u64::from(row.rating_count)).sum();
    let avg_rating_rows_per_rated_snapshot = if with_any_rating_rows == 0 {
        0.0
    } else {
        round4(population_rating_rows as f64 / with_any_rating_rows as f64)
    };

    AuditSummary {
        total_snapshots: rows.len(),
        with_image: rows.iter().filter(|row| row.has_image).count(),
        with_consensus_rating: rows.iter().filter(|row| row.has_consensus_rating).count(),
        with_any_rating_rows,
        export_eligible: count_matching(rows, AuditCategory::ExportEligible),
        mismatches: MismatchCounts {
            rating_rows_but_no_calculated_rating: count_matching(
                rows,
                AuditCategory::RatedButUncalculated,
            ),
            calculated_rating_but_no_rating_rows: count_matching(
                rows,
                AuditCategory::CalculatedButUnrated,
            ),
            rating_rows_but_no_image: count_matching(rows, AuditCategory::RatedButNoImage),
            rating_rows_but_no_calculated_rating_or_image: rows
                .iter()
                .filter(|row| mismatches_for(row).len() > 1)
                .count(),
        },
        rating_table_totals: totals,
        avg_rating_rows_per_rated_snapshot,
        query,
    }
}

#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub output_dir: PathBuf,
    pub summary: AuditSummary,
}

/// Run the audit and write every row-set plus `summary.json` into a fresh run directory.
pub fn run_audit(conn: &Connection, options: &AuditOptions) -> Result<AuditOutcome, AuditError> {
    let rows = query::load_snapshot_rows(conn, options.sort, options.limit)?;
    let totals = query::load_rating_totals(conn)?;
    tracing::info!("Audited {} snapshots", rows.len());

    let summary = build_summary(
        &rows,
        totals,
        AuditQuery {
            sort: options.sort,
            limit: options.limit,
        },
    );

    let output_dir = artifacts::create_run_dir(&options.output_root)?;
    artifacts::write_rows(&output_dir.join(ALL_SNAPSHOTS_FILE_NAME), &rows)?;
    artifacts::write_rows(
        &output_dir.join(RATED_SNAPSHOTS_FILE_NAME),
        rows.iter().filter(|row| row.has_rating_rows),
    )?;
    for category in AuditCategory::ALL {
        let written = artifacts::write_rows(
            &output_dir.join(category.file_name()),
            rows.iter().filter(|row| category.matches(row)),
        )?;
        tracing::debug!(?category, "Wrote {written} rows");
    }
    artifacts::write_json(&output_dir.join(SUMMARY_FILE_NAME), &summary)?;

    let mismatches = summary.mismatches;
    if mismatches.rating_rows_but_no_calculated_rating > 0
        || mismatches.calculated_rating_but_no_rating_rows > 0
        || mismatches.rating_rows_but_no_image > 0
    {
        tracing::warn!(
            rated_uncalculated = mismatches.rating_rows_but_no_calculated_rating,
            calculated_unrated = mismatches.calculated_rating_but_no_rating_rows,
            rated_no_image = mismatches.rating_rows_but_no_image,
            "Snapshot rating mismatches found"
        );
    }

    Ok(AuditOutcome {
        output_dir,
        summary,
    })
}
