use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use sunset_ml::store::schema::apply_schema;

/// A file-backed store seeded with a small mixed-coverage population.
///
/// | id | webcam | image | consensus | rating rows | inference |
/// |----|--------|-------|-----------|-------------|-----------|
/// | 1  | 10     | yes   | 4.5       | 2           | 3.0 (v1)  |
/// | 2  | 10     | yes   | 3.0       | 3           | 4.0 (v1)  |
/// | 3  | 20     | yes   | 4.2       | 0           | none      |
/// | 4  | 30     | yes   | none      | 1           | 2.0 (v1)  |
/// | 5  | 30     | no    | 3.8       | 2           | 4.1 (v1)  |
pub fn seeded_store(dir: &Path) -> PathBuf {
    let path = dir.join("snapshots.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    apply_schema(&conn).unwrap();

    let image = Some("https://img.example/snap.jpg");
    let snapshots: [(i64, i64, Option<&str>, Option<f64>, &str); 5] = [
        (1, 10, image, Some(4.5), "sunset"),
        (2, 10, image, Some(3.0), "sunset"),
        (3, 20, image, Some(4.2), "sunrise"),
        (4, 30, image, None, "sunset"),
        (5, 30, None, Some(3.8), "sunrise"),
    ];
    for (id, webcam_id, firebase_url, calculated, phase) in snapshots {
        conn.execute(
            "INSERT INTO webcam_snapshots
                (id, webcam_id, phase, captured_at, created_at, firebase_url, calculated_rating)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?6)",
            params![
                id,
                webcam_id,
                phase,
                format!("2026-02-1{id}T18:00:00Z"),
                firebase_url,
                calculated
            ],
        )
        .unwrap();
    }

    let ratings: [(i64, &str, f64); 8] = [
        (1, "alice", 5.0),
        (1, "bob", 4.0),
        (2, "alice", 3.0),
        (2, "bob", 3.0),
        (2, "carol", 3.0),
        (4, "carol", 4.0),
        (5, "alice", 4.0),
        (5, "dave", 3.6),
    ];
    for (idx, (snapshot_id, rater, rating)) in ratings.into_iter().enumerate() {
        conn.execute(
            "INSERT INTO webcam_snapshot_ratings (snapshot_id, user_session_id, rating, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![snapshot_id, rater, rating, format!("2026-02-15T19:00:{idx:02}Z")],
        )
        .unwrap();
    }

    let inferences: [(i64, f64); 4] = [(1, 3.0), (2, 4.0), (4, 2.0), (5, 4.1)];
    for (snapshot_id, ai_rating) in inferences {
        conn.execute(
            "INSERT INTO snapshot_ai_inferences (snapshot_id, ai_rating, model_version, created_at)
             VALUES (?1, ?2, 'v1', '2026-02-16T00:00:00Z')",
            params![snapshot_id, ai_rating],
        )
        .unwrap();
    }
    path
}

pub fn count_membership(path: &Path, training_run_id: i64) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM model_training_snapshot_labels WHERE training_run_id = ?1",
        [training_run_id],
        |row| row.get(0),
    )
    .unwrap()
}
