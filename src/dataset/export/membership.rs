//! Sample membership records: which snapshots, with which labels, trained a run.

use rusqlite::{Connection, TransactionBehavior, params};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::{ExportError, LabelSource, ManifestRow};

const UPSERT_SQL: &str = "INSERT INTO model_training_snapshot_labels (
        training_run_id,
        snapshot_id,
        label_source,
        label_value,
        included_at
     )
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT(training_run_id, snapshot_id) DO UPDATE SET
        label_source = excluded.label_source,
        label_value = excluded.label_value,
        included_at = excluded.included_at";

/// Upsert one membership record per manifest row, stamped with the current UTC time.
pub fn persist_membership(
    conn: &mut Connection,
    training_run_id: i64,
    label_source: LabelSource,
    rows: &[ManifestRow],
) -> Result<usize, ExportError> {
    let included_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
    persist_membership_at(conn, training_run_id, label_source, rows, &included_at)
}

/// Upsert membership records in a single transaction; nothing is kept if any row fails.
pub fn persist_membership_at(
    conn: &mut Connection,
    training_run_id: i64,
    label_source: LabelSource,
    rows: &[ManifestRow],
    included_at: &str,
) -> Result<usize, ExportError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    {
        let mut stmt = tx.prepare(UPSERT_SQL)?;
        for row in rows {
            stmt.execute(params![
                training_run_id,
                row.snapshot_id,
                label_source.as_str(),
                row.label_value,
                included_at
            ])?;
        }
    }
    tx.commit()?;
    tracing::info!(training_run_id, "Persisted {} membership records", rows.len());
    Ok(rows.len())
}
