//! Ranking of automated vs. human rating disagreements.
//!
//! Each snapshot with a consensus rating is paired with its most recent
//! automated inference (optionally restricted to one model version) and ranked
//! by absolute difference. The near-boundary band is a fixed inspection window
//! around the 4.0 rating boundary and does not follow the label policy threshold.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rusqlite::{Connection, params};
use serde::Serialize;
use thiserror::Error;

use crate::artifacts::{self, ArtifactError, CsvRow};

pub const DEFAULT_OUTPUT_ROOT: &str = "ml/artifacts/reports/disagreements";
pub const DEFAULT_LIMIT: usize = 200;
/// Number of rows kept in the top-disagreement and near-boundary lists.
pub const TOP_N: usize = 50;
pub const NEAR_BOUNDARY_LOW: f64 = 3.7;
pub const NEAR_BOUNDARY_HIGH: f64 = 4.3;
const UNKNOWN_PHASE: &str = "unknown";

const REPORT_FILE_NAME: &str = "disagreement_report.json";
const RANKED_FILE_NAME: &str = "disagreements_ranked.csv";
const TOP_FILE_NAME: &str = "top_disagreements.csv";
const NEAR_BOUNDARY_FILE_NAME: &str = "near_boundary_samples.csv";

#[derive(Debug, Error)]
pub enum DisagreementError {
    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

#[derive(Debug, Clone)]
pub struct DisagreementOptions {
    pub output_root: PathBuf,
    /// Restrict to inferences from this model version.
    pub model_version: Option<String>,
    /// Maximum number of ranked rows kept.
    pub limit: usize,
}

impl Default for DisagreementOptions {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            model_version: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisagreementRow {
    pub snapshot_id: i64,
    pub webcam_id: i64,
    pub phase: Option<String>,
    pub captured_at: Option<String>,
    pub calculated_rating: f64,
    pub ai_rating: f64,
    pub model_version: String,
    pub abs_diff: f64,
}

impl CsvRow for DisagreementRow {
    const HEADER: &'static [&'static str] = &[
        "snapshot_id",
        "webcam_id",
        "phase",
        "captured_at",
        "calculated_rating",
        "ai_rating",
        "model_version",
        "abs_diff",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseSummary {
    pub count: usize,
    pub avg_abs_diff: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisagreementReport {
    pub model_version: Option<String>,
    pub limit: usize,
    pub num_rows: usize,
    pub near_boundary_band: Band,
    pub phase_summary: BTreeMap<String, PhaseSummary>,
    pub top_disagreements: Vec<DisagreementRow>,
    pub near_boundary_samples: Vec<DisagreementRow>,
}

/// Pair consensus ratings with the latest matching inference, in snapshot id order.
pub fn load_pairs(
    conn: &Connection,
    model_version: Option<&str>,
) -> Result<Vec<DisagreementRow>, DisagreementError> {
    let mut stmt = conn.prepare(
        "WITH latest AS (
            SELECT i.snapshot_id,
                   i.ai_rating,
                   i.model_version,
                   ROW_NUMBER() OVER (
                       PARTITION BY i.snapshot_id
                       ORDER BY i.created_at DESC, i.id DESC
                   ) AS rn
            FROM snapshot_ai_inferences i
            WHERE i.ai_rating IS NOT NULL
              AND (?1 IS NULL OR i.model_version = ?1)
        )
        SELECT s.id,
               s.webcam_id,
               s.phase,
               s.captured_at,
               s.calculated_rating,
               l.ai_rating,
               l.model_version
        FROM webcam_snapshots s
        JOIN latest l
          ON l.snapshot_id = s.id AND l.rn = 1
        WHERE s.calculated_rating IS NOT NULL
        ORDER BY s.id ASC",
    )?;
    let rows = stmt
        .query_map(params![model_version], |row| {
            let calculated_rating: f64 = row.get(4)?;
            let ai_rating: f64 = row.get(5)?;
            Ok(DisagreementRow {
                snapshot_id: row.get(0)?,
                webcam_id: row.get(1)?,
                phase: row.get(2)?,
                captured_at: row.get(3)?,
                calculated_rating,
                ai_rating,
                model_version: row.get(6)?,
                abs_diff: (ai_rating - calculated_rating).abs(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Sort by descending `abs_diff`, keeping arrival order for ties, then cap at `limit`.
pub fn rank(mut rows: Vec<DisagreementRow>, limit: usize) -> Vec<DisagreementRow> {
    rows.sort_by(|a, b| b.abs_diff.total_cmp(&a.abs_diff));
    rows.truncate(limit);
    rows
}

pub fn is_near_boundary(row: &DisagreementRow) -> bool {
    (NEAR_BOUNDARY_LOW..=NEAR_BOUNDARY_HIGH).contains(&row.ai_rating)
}

/// Mean absolute difference per capture phase.
pub fn phase_summary(rows: &[DisagreementRow]) -> BTreeMap<String, PhaseSummary> {
    let mut sums: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for row in rows {
        let phase = row
            .phase
            .as_deref()
            .filter(|phase| !phase.is_empty())
            .unwrap_or(UNKNOWN_PHASE);
        let entry = sums.entry(phase.to_string()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += row.abs_diff;
    }
    sums.into_iter()
        .map(|(phase, (count, total))| {
            let avg_abs_diff = if count == 0 { 0.0 } else { total / count as f64 };
            (phase, PhaseSummary { count, avg_abs_diff })
        })
        .collect()
}

pub fn build_report(
    ranked: &[DisagreementRow],
    model_version: Option<&str>,
    limit: usize,
) -> DisagreementReport {
    DisagreementReport {
        model_version: model_version.map(str::to_string),
        limit,
        num_rows: ranked.len(),
        near_boundary_band: Band {
            low: NEAR_BOUNDARY_LOW,
            high: NEAR_BOUNDARY_HIGH,
        },
        phase_summary: phase_summary(ranked),
        top_disagreements: ranked.iter().take(TOP_N).cloned().collect(),
        near_boundary_samples: ranked
            .iter()
            .filter(|row| is_near_boundary(row))
            .take(TOP_N)
            .cloned()
            .collect(),
    }
}

#[derive(Debug, Clone)]
pub struct DisagreementOutcome {
    pub output_dir: PathBuf,
    pub report: DisagreementReport,
}

/// Build the disagreement report and write it with its row-sets into a fresh run directory.
pub fn run_report(
    conn: &Connection,
    options: &DisagreementOptions,
) -> Result<DisagreementOutcome, DisagreementError> {
    let model_version = options.model_version.as_deref();
    let pairs = load_pairs(conn, model_version)?;
    tracing::info!(
        model_version = model_version.unwrap_or("any"),
        "Paired {} snapshots with automated ratings",
        pairs.len()
    );
    let ranked = rank(pairs, options.limit);
    let report = build_report(&ranked, model_version, options.limit);

    let output_dir = artifacts::create_run_dir(&options.output_root)?;
    artifacts::write_rows(&output_dir.join(RANKED_FILE_NAME), &ranked)?;
    artifacts::write_rows(&output_dir.join(TOP_FILE_NAME), &report.top_disagreements)?;
    artifacts::write_rows(
        &output_dir.join(NEAR_BOUNDARY_FILE_NAME),
        ranked.iter().filter(|row| is_near_boundary(row)),
    )?;
    artifacts::write_json(&output_dir.join(REPORT_FILE_NAME), &report)?;

    Ok(DisagreementOutcome { output_dir, report })
}
