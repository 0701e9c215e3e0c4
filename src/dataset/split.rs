//! Deterministic train/val/test assignment keyed by group id and seed.
//!
//! The split is a pure function of `(group_key, seed)`: every snapshot from
//! the same webcam lands in the same split on every export run, independent of
//! row order or which candidate query produced the row.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of buckets a group key is reduced to.
pub const BUCKET_COUNT: u32 = 100;
const KEY_SEPARATOR: char = '|';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("split percentages must sum to 100, got {0}")]
    InvalidPercentages(u32),
}

/// Seed and split percentages for one export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub seed: i64,
    pub train_pct: u32,
    pub val_pct: u32,
    pub test_pct: u32,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            seed: 20260212,
            train_pct: 70,
            val_pct: 15,
            test_pct: 15,
        }
    }
}

impl SplitConfig {
    /// Fail fast if the three percentages do not cover exactly 100 buckets.
    pub fn validate(&self) -> Result<(), SplitError> {
        let total = self
            .train_pct
            .saturating_add(self.val_pct)
            .saturating_add(self.test_pct);
        if total != BUCKET_COUNT {
            return Err(SplitError::InvalidPercentages(total));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduce `group_key` + `seed` to a bucket in `[0, 100)`.
///
/// SHA-256 over `"{group_key}|{seed}"`, first 32 bits of the digest read
/// big-endian (the leading 8 hex characters), modulo 100.
pub fn stable_bucket(group_key: &str, seed: i64) -> u32 {
    let digest = Sha256::digest(format!("{group_key}{KEY_SEPARATOR}{seed}").as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    prefix % BUCKET_COUNT
}

/// Map a bucket onto the cumulative `[train | val | test]` ranges.
pub fn split_for_bucket(bucket: u32, config: &SplitConfig) -> Split {
    if bucket < config.train_pct {
        Split::Train
    } else if bucket < config.train_pct.saturating_add(config.val_pct) {
        Split::Val
    } else {
        Split::Test
    }
}

/// Assign a group (e.g. a webcam id) to a split.
pub fn assign_split(group_key: &str, config: &SplitConfig) -> Result<Split, SplitError> {
    config.validate()?;
    Ok(split_for_bucket(stable_bucket(group_key, config.seed), config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn bucket_matches_known_digest_prefix() {
        // sha256("42|20260212") starts with 7bfb594c.
        assert_eq!(stable_bucket("42", 20260212), 0x7bfb594c % 100);
        assert_eq!(stable_bucket("42", 20260212), 64);
        assert_eq!(stable_bucket("7", 20260212), 29);
    }

    #[test]
    fn assignment_is_deterministic() {
        let config = SplitConfig::default();
        let first = assign_split("42", &config).unwrap();
        for _ in 0..10 {
            assert_eq!(assign_split("42", &config).unwrap(), first);
        }
        assert_eq!(first, Split::Train);
    }

    #[test]
    fn seed_changes_the_bucket_space() {
        let a: Vec<u32> = (0..50).map(|id| stable_bucket(&id.to_string(), 1)).collect();
        let b: Vec<u32> = (0..50).map(|id| stable_bucket(&id.to_string(), 2)).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_percentages_not_summing_to_100() {
        let config = SplitConfig {
            seed: 1,
            train_pct: 70,
            val_pct: 20,
            test_pct: 15,
        };
        assert_eq!(
            assign_split("1", &config).unwrap_err(),
            SplitError::InvalidPercentages(105)
        );
        let config = SplitConfig {
            train_pct: u32::MAX,
            ..SplitConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn every_bucket_maps_to_contiguous_ranges() {
        let config = SplitConfig {
            seed: 0,
            train_pct: 60,
            val_pct: 25,
            test_pct: 15,
        };
        let splits: Vec<Split> = (0..BUCKET_COUNT)
            .map(|bucket| split_for_bucket(bucket, &config))
            .collect();
        assert!(splits[..60].iter().all(|s| *s == Split::Train));
        assert!(splits[60..85].iter().all(|s| *s == Split::Val));
        assert!(splits[85..].iter().all(|s| *s == Split::Test));
    }

    #[test]
    fn oversized_percentages_do_not_overflow() {
        let config = SplitConfig {
            seed: 0,
            train_pct: u32::MAX,
            val_pct: u32::MAX,
            test_pct: 0,
        };
        assert_eq!(split_for_bucket(99, &config), Split::Train);
        let config = SplitConfig {
            seed: 0,
            train_pct: 10,
            val_pct: u32::MAX,
            test_pct: 0,
        };
        assert_eq!(split_for_bucket(50, &config), Split::Val);
    }

    #[test]
    fn zero_width_ranges_are_skipped() {
        let config = SplitConfig {
            seed: 0,
            train_pct: 100,
            val_pct: 0,
            test_pct: 0,
        };
        assert!((0..BUCKET_COUNT).all(|b| split_for_bucket(b, &config) == Split::Train));
        let config = SplitConfig {
            seed: 0,
            train_pct: 0,
            val_pct: 0,
            test_pct: 100,
        };
        assert!((0..BUCKET_COUNT).all(|b| split_for_bucket(b, &config) == Split::Test));
    }

    #[test]
    fn distribution_tracks_configured_percentages() {
        let config = SplitConfig::default();
        let n = 20_000;
        let mut counts: BTreeMap<Split, usize> = BTreeMap::new();
        for id in 0..n {
            let split = assign_split(&id.to_string(), &config).unwrap();
            *counts.entry(split).or_insert(0) += 1;
        }
        let frac = |split: Split| counts.get(&split).copied().unwrap_or(0) as f64 / n as f64;
        assert!((frac(Split::Train) - 0.70).abs() < 0.02);
        assert!((frac(Split::Val) - 0.15).abs() < 0.02);
        assert!((frac(Split::Test) - 0.15).abs() < 0.02);
    }
}
