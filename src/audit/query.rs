use rusqlite::{Connection, params};

use super::{AuditError, AuditRow, AuditSort, RatingTotals};

fn order_by_clause(sort: AuditSort) -> &'static str {
    match sort {
        AuditSort::CapturedDesc => "ORDER BY s.captured_at DESC NULLS LAST, s.id DESC",
        AuditSort::CapturedAsc => "ORDER BY s.captured_at ASC NULLS LAST, s.id ASC",
        AuditSort::IdDesc => "ORDER BY s.id DESC",
        AuditSort::IdAsc => "ORDER BY s.id ASC",
    }
}

/// Load every snapshot (bounded by `limit` when positive) with its rating statistics.
pub(super) fn load_snapshot_rows(
    conn: &Connection,
    sort: AuditSort,
    limit: i64,
) -> Result<Vec<AuditRow>, AuditError> {
    let sql = format!(
        "WITH rating_stats AS (
            SELECT snapshot_id,
                   COUNT(*) AS rating_count,
                   COUNT(DISTINCT user_session_id) AS unique_rater_count,
                   MIN(created_at) AS first_rating_at,
                   MAX(created_at) AS last_rating_at
            FROM webcam_snapshot_ratings
            GROUP BY snapshot_id
        )
        SELECT s.id,
               s.webcam_id,
               s.phase,
               s.captured_at,
               s.created_at,
               s.firebase_url,
               s.calculated_rating,
               s.ai_rating,
               COALESCE(rs.rating_count, 0),
               COALESCE(rs.unique_rater_count, 0),
               rs.first_rating_at,
               rs.last_rating_at
        FROM webcam_snapshots s
        LEFT JOIN rating_stats rs
          ON rs.snapshot_id = s.id
        {}
        LIMIT ?1",
        order_by_clause(sort)
    );
    // SQLite treats a negative LIMIT as unbounded.
    let limit = if limit <= 0 { -1 } else { limit };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![limit], |row| {
            let image_ref: Option<String> = row.get(5)?;
            let calculated_rating: Option<f64> = row.get(6)?;
            let rating_count: u32 = row.get(8)?;
            Ok(AuditRow {
                snapshot_id: row.get(0)?,
                webcam_id: row.get(1)?,
                phase: row.get(2)?,
                captured_at: row.get(3)?,
                created_at: row.get(4)?,
                has_image: image_ref.is_some(),
                has_consensus_rating: calculated_rating.is_some(),
                has_rating_rows: rating_count > 0,
                image_ref,
                calculated_rating,
                ai_rating: row.get(7)?,
                rating_count,
                unique_rater_count: row.get(9)?,
                first_rating_at: row.get(10)?,
                last_rating_at: row.get(11)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Totals over the whole rating table, independent of sort/limit.
pub(super) fn load_rating_totals(conn: &Connection) -> Result<RatingTotals, AuditError> {
    let totals = conn.query_row(
        "SELECT COUNT(*),
                COUNT(DISTINCT snapshot_id),
                COUNT(DISTINCT user_session_id)
         FROM webcam_snapshot_ratings",
        [],
        |row| {
            Ok(RatingTotals {
                total_rating_rows: row.get(0)?,
                distinct_snapshots_with_ratings: row.get(1)?,
                distinct_raters: row.get(2)?,
            })
        },
    )?;
    Ok(totals)
}
