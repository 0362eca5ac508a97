//! Durable score counter.
//!
//! The file holds a `score` header and a single integer row. Every non-zero
//! delta is a read-modify-write so concurrent viewers always see a whole
//! file.

use crate::coverage::write_atomic;
use crate::result::{RulemonError, RulemonResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const HEADER: &str = "score";

/// Score counter backed by a file
#[derive(Debug, Clone)]
pub struct ScoreStore {
    path: PathBuf,
}

impl ScoreStore {
    /// Open the store, creating it at zero when the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> RulemonResult<Self> {
        let store = Self { path: path.into() };
        if store.path.exists() {
            store.read()?;
        } else {
            store.write(0)?;
        }
        Ok(store)
    }

    /// Backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current score
    pub fn read(&self) -> RulemonResult<i64> {
        let text = fs::read_to_string(&self.path)?;
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        if lines.next() != Some(HEADER) {
            return Err(RulemonError::Score {
                message: format!("{} has no '{HEADER}' header", self.path.display()),
            });
        }
        let value = lines.next().ok_or_else(|| RulemonError::Score {
            message: format!("{} has no score row", self.path.display()),
        })?;
        value.parse().map_err(|_| RulemonError::Score {
            message: format!("'{value}' is not an integer score"),
        })
    }

    /// Add `delta` and return the new score; zero deltas do not touch the file
    pub fn add(&self, delta: i64) -> RulemonResult<i64> {
        let current = self.read()?;
        if delta == 0 {
            return Ok(current);
        }
        let next = current.saturating_add(delta);
        self.write(next)?;
        debug!(delta, score = next, "score updated");
        Ok(next)
    }

    fn write(&self, value: i64) -> RulemonResult<()> {
        write_atomic(&self.path, &format!("{HEADER}\n{value}\n"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_created_at_zero() {
        let dir = TempDir::new().unwrap();
        let store = ScoreStore::open(dir.path().join("score.csv")).unwrap();
        assert_eq!(store.read().unwrap(), 0);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "score\n0\n");
    }

    #[test]
    fn test_add_accumulates_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("score.csv");
        ScoreStore::open(&path).unwrap().add(1).unwrap();
        let store = ScoreStore::open(&path).unwrap();
        assert_eq!(store.add(-1).unwrap(), 0);
        assert_eq!(store.add(2).unwrap(), 2);
    }

    #[test]
    fn test_garbage_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("score.csv");
        fs::write(&path, "score\nten\n").unwrap();
        assert!(matches!(ScoreStore::open(&path), Err(RulemonError::Score { .. })));
        fs::write(&path, "points\n1\n").unwrap();
        assert!(ScoreStore::open(&path).is_err());
    }
}
