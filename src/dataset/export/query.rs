use rusqlite::{Connection, params};

use super::{ExportError, LabelSource};

/// Labeled snapshot eligible for export.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    pub snapshot_id: i64,
    pub webcam_id: i64,
    pub image_ref: String,
    pub phase: Option<String>,
    pub captured_at: Option<String>,
    /// Consensus rating.
    pub label_value: f64,
    pub rating_count: u32,
}

/// Both modes share the query; only join strictness on the rating table differs.
fn candidate_sql(label_source: LabelSource) -> String {
    let rating_join = match label_source {
        LabelSource::ManualOnly => "LEFT JOIN",
        LabelSource::PublicAggregate => "JOIN",
    };
    format!(
        "SELECT s.id,
                s.webcam_id,
                s.firebase_url,
                s.phase,
                s.captured_at,
                s.calculated_rating,
                COUNT(r.id) AS rating_count
         FROM webcam_snapshots s
         {rating_join} webcam_snapshot_ratings r
           ON r.snapshot_id = s.id
         WHERE s.firebase_url IS NOT NULL
           AND s.calculated_rating IS NOT NULL
         GROUP BY s.id, s.webcam_id, s.firebase_url, s.phase, s.captured_at, s.calculated_rating
         HAVING COUNT(r.id) >= ?1
         ORDER BY s.id ASC"
    )
}

/// Load export candidates for `label_source`, gated on `min_rating_count` backing ratings.
pub fn load_candidates(
    conn: &Connection,
    label_source: LabelSource,
    min_rating_count: u32,
) -> Result<Vec<CandidateRow>, ExportError> {
    let sql = candidate_sql(label_source);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![min_rating_count], |row| {
            Ok(CandidateRow {
                snapshot_id: row.get(0)?,
                webcam_id: row.get(1)?,
                image_ref: row.get(2)?,
                phase: row.get(3)?,
                captured_at: row.get(4)?,
                label_value: row.get(5)?,
                rating_count: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
