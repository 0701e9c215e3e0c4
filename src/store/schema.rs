use rusqlite::Connection;

use super::StoreError;

/// Create the store tables if they do not exist yet. Existing tables are left untouched.
pub fn apply_schema(connection: &Connection) -> Result<(), StoreError> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS webcam_snapshots (
            id INTEGER PRIMARY KEY,
            webcam_id INTEGER NOT NULL,
            phase TEXT,
            captured_at TEXT,
            created_at TEXT,
            firebase_url TEXT,
            calculated_rating REAL,
            ai_rating REAL
         );
         CREATE INDEX IF NOT EXISTS idx_webcam_snapshots_webcam_id
            ON webcam_snapshots (webcam_id);
         CREATE TABLE IF NOT EXISTS webcam_snapshot_ratings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            snapshot_id INTEGER NOT NULL,
            user_session_id TEXT NOT NULL,
            rating REAL NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(snapshot_id) REFERENCES webcam_snapshots(id) ON DELETE CASCADE
         );
         CREATE INDEX IF NOT EXISTS idx_webcam_snapshot_ratings_snapshot_id
            ON webcam_snapshot_ratings (snapshot_id);
         CREATE TABLE IF NOT EXISTS snapshot_ai_inferences (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            snapshot_id INTEGER NOT NULL,
            ai_rating REAL,
            model_version TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(snapshot_id) REFERENCES webcam_snapshots(id) ON DELETE CASCADE
         );
         CREATE INDEX IF NOT EXISTS idx_snapshot_ai_inferences_snapshot_version
            ON snapshot_ai_inferences (snapshot_id, model_version);
         CREATE TABLE IF NOT EXISTS model_training_snapshot_labels (
            training_run_id INTEGER NOT NULL,
            snapshot_id INTEGER NOT NULL,
            label_source TEXT NOT NULL,
            label_value REAL NOT NULL,
            included_at TEXT NOT NULL,
            PRIMARY KEY (training_run_id, snapshot_id),
            FOREIGN KEY(snapshot_id) REFERENCES webcam_snapshots(id)
         ) WITHOUT ROWID;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        apply_schema(&conn).unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(tables.contains(&"webcam_snapshots".to_string()));
        assert!(tables.contains(&"webcam_snapshot_ratings".to_string()));
        assert!(tables.contains(&"snapshot_ai_inferences".to_string()));
        assert!(tables.contains(&"model_training_snapshot_labels".to_string()));
    }
}
