//! Run directories and row-set/summary writers shared by every job.
//!
//! Each run writes into its own `<root>/<YYYYMMDD_HHMMSS>` directory. Row-set
//! CSV files always carry a header, even with zero records, so consumers can
//! tell "no data" apart from "job didn't run".

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

const RUN_DIR_FORMAT: &[FormatItem<'_>] =
    format_description!("[year][month][day]_[hour][minute][second]");

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to create artifact directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to format run timestamp: {0}")]
    FormatTime(#[from] time::error::Format),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A row type that can be written as a CSV row-set.
///
/// `HEADER` lists the columns in serialization order; it is written even when
/// the row-set is empty.
pub trait CsvRow: Serialize {
    const HEADER: &'static [&'static str];
}

/// UTC timestamp used for run directory names.
pub fn run_stamp(now: OffsetDateTime) -> Result<String, ArtifactError> {
    Ok(now.format(RUN_DIR_FORMAT)?)
}

/// Create a fresh run directory under `root` for the current UTC time.
pub fn create_run_dir(root: &Path) -> Result<PathBuf, ArtifactError> {
    create_run_dir_at(root, OffsetDateTime::now_utc())
}

/// Create `<root>/<stamp>`, appending `_1`, `_2`, ... if an earlier run already owns the name.
pub fn create_run_dir_at(root: &Path, now: OffsetDateTime) -> Result<PathBuf, ArtifactError> {
    fs::create_dir_all(root).map_err(|source| ArtifactError::CreateDir {
        path: root.to_path_buf(),
        source,
    })?;
    let stamp = run_stamp(now)?;
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            stamp.clone()
        } else {
            format!("{stamp}_{attempt}")
        };
        let path = root.join(name);
        match fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(ArtifactError::CreateDir { path, source }),
        }
    }
}

/// Write `rows` to a CSV file with a header row.
pub fn write_rows<'a, T, I>(path: &Path, rows: I) -> Result<usize, ArtifactError>
where
    T: CsvRow + 'a,
    I: IntoIterator<Item = &'a T>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(T::HEADER)?;
    let mut written = 0usize;
    for row in rows {
        writer.serialize(row)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Write a pretty-printed JSON summary file.
pub fn write_json<T: Serialize>(path: &Path, payload: &T) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(payload)?;
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Serialize)]
    struct Pair {
        id: i64,
        name: Option<String>,
    }

    impl CsvRow for Pair {
        const HEADER: &'static [&'static str] = &["id", "name"];
    }

    #[test]
    fn run_stamp_is_utc_compact() {
        let fixed = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(run_stamp(fixed).unwrap(), "20231114_221320");
    }

    #[test]
    fn run_dirs_never_collide() {
        let root = tempdir().unwrap();
        let fixed = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let first = create_run_dir_at(root.path(), fixed).unwrap();
        let second = create_run_dir_at(root.path(), fixed).unwrap();
        let third = create_run_dir_at(root.path(), fixed).unwrap();
        assert_eq!(first, root.path().join("20231114_221320"));
        assert_eq!(second, root.path().join("20231114_221320_1"));
        assert_eq!(third, root.path().join("20231114_221320_2"));
    }

    #[test]
    fn empty_row_set_still_has_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let written = write_rows::<Pair, _>(&path, &[]).unwrap();
        assert_eq!(written, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "id,name\n");
    }

    #[test]
    fn rows_follow_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/rows.csv");
        let rows = vec![
            Pair {
                id: 1,
                name: Some("a,b".to_string()),
            },
            Pair { id: 2, name: None },
        ];
        write_rows(&path, &rows).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "id,name\n1,\"a,b\"\n2,\n"
        );
    }

    #[test]
    fn json_is_pretty_printed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_json(&path, &serde_json::json!({"ok": true})).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\n  \"ok\": true\n}");
    }
}
