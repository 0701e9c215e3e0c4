//! SQLite access for the snapshot store.
//!
//! Connections are plain `rusqlite::Connection` values owned by the caller's
//! scope, so they are released on every return path, including early `?` exits.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Schema for the snapshot, rating, inference, and membership tables.
pub mod schema;

#[cfg(test)]
pub(crate) mod fixtures;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);
const SQLITE_URL_PREFIX: &str = "sqlite://";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store {target}: {source}")]
    Open {
        target: String,
        source: rusqlite::Error,
    },
    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Where a connection string points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StoreTarget {
    Path(PathBuf),
    Uri(String),
}

fn parse_target(database_url: &str) -> StoreTarget {
    if database_url.starts_with("file:") {
        return StoreTarget::Uri(database_url.to_string());
    }
    let path = database_url
        .strip_prefix(SQLITE_URL_PREFIX)
        .unwrap_or(database_url);
    StoreTarget::Path(PathBuf::from(path))
}

/// Open the store named by `database_url` (`path`, `sqlite://path`, or `file:` URI).
pub fn open_store(database_url: &str, mode: AccessMode) -> Result<Connection, StoreError> {
    let mut flags = match mode {
        AccessMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
        AccessMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
    };
    flags |= OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let opened = match parse_target(database_url) {
        StoreTarget::Path(path) => Connection::open_with_flags(path, flags),
        StoreTarget::Uri(uri) => {
            Connection::open_with_flags(uri, flags | OpenFlags::SQLITE_OPEN_URI)
        }
    };
    let conn = opened.map_err(|source| StoreError::Open {
        target: database_url.to_string(),
        source,
    })?;
    apply_pragmas(&conn)?;
    tracing::debug!(?mode, "Opened store {database_url}");
    Ok(conn)
}

fn apply_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_connection_string_forms() {
        assert_eq!(
            parse_target("sqlite:///tmp/db.sqlite"),
            StoreTarget::Path(PathBuf::from("/tmp/db.sqlite"))
        );
        assert_eq!(
            parse_target("data/webcams.db"),
            StoreTarget::Path(PathBuf::from("data/webcams.db"))
        );
        assert_eq!(
            parse_target("file:webcams.db?mode=ro"),
            StoreTarget::Uri("file:webcams.db?mode=ro".to_string())
        );
    }

    #[test]
    fn read_only_open_of_missing_file_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.db");
        let err = open_store(missing.to_str().unwrap(), AccessMode::ReadOnly).unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
    }

    #[test]
    fn read_write_open_sees_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let conn = Connection::open(&path).unwrap();
            schema::apply_schema(&conn).unwrap();
        }
        let conn = open_store(path.to_str().unwrap(), AccessMode::ReadWrite).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM webcam_snapshots", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }
}
