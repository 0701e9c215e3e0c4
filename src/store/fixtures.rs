//! In-memory store fixtures for unit tests.

use rusqlite::{Connection, params};

use super::schema::apply_schema;

pub(crate) fn memory_store() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    apply_schema(&conn).unwrap();
    conn
}

pub(crate) struct SnapshotFixture<'a> {
    pub id: i64,
    pub webcam_id: i64,
    pub image: Option<&'a str>,
    pub calculated: Option<f64>,
    pub phase: Option<&'a str>,
    pub captured_at: Option<&'a str>,
}

impl SnapshotFixture<'_> {
    pub(crate) fn new(id: i64, webcam_id: i64) -> Self {
        Self {
            id,
            webcam_id,
            image: Some("https://img.example/snap.jpg"),
            calculated: Some(4.0),
            phase: Some("sunset"),
            captured_at: Some("2026-02-12T18:00:00Z"),
        }
    }
}

pub(crate) fn insert_snapshot(conn: &Connection, snapshot: &SnapshotFixture<'_>) {
    conn.execute(
        "INSERT INTO webcam_snapshots
            (id, webcam_id, phase, captured_at, created_at, firebase_url, calculated_rating)
         VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?6)",
        params![
            snapshot.id,
            snapshot.webcam_id,
            snapshot.phase,
            snapshot.captured_at,
            snapshot.image,
            snapshot.calculated
        ],
    )
    .unwrap();
}

pub(crate) fn insert_ratings(conn: &Connection, snapshot_id: i64, raters: &[&str]) {
    for (idx, rater) in raters.iter().enumerate() {
        conn.execute(
            "INSERT INTO webcam_snapshot_ratings (snapshot_id, user_session_id, rating, created_at)
             VALUES (?1, ?2, 4.0, ?3)",
            params![snapshot_id, rater, format!("2026-02-12T19:00:{idx:02}Z")],
        )
        .unwrap();
    }
}

pub(crate) fn insert_inference(
    conn: &Connection,
    snapshot_id: i64,
    ai_rating: f64,
    model_version: &str,
    created_at: &str,
) {
    conn.execute(
        "INSERT INTO snapshot_ai_inferences (snapshot_id, ai_rating, model_version, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![snapshot_id, ai_rating, model_version, created_at],
    )
    .unwrap();
}
