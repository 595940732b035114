//! JSONL export directory store
//!
//! Layout: `<root>/<collection>/**/*.jsonl`, one record per line. Files are
//! read in parallel; a record id seen twice keeps its first occurrence.

use async_trait::async_trait;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::{matches_range, DateRange, RecordKind, RecordStore};
use crate::services::normalizer::record_id;
use crate::types::{RawRecord, Result, RevtrackError};

const FILE_PATTERN: &str = "**/*.jsonl";

pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collect all JSONL files of a collection, sorted by path
    fn collect_files(&self, kind: RecordKind) -> Vec<PathBuf> {
        let pattern = self.root.join(kind.collection()).join(FILE_PATTERN);
        glob::glob(&pattern.to_string_lossy())
            .map(|paths| paths.filter_map(|e| e.ok()).collect())
            .unwrap_or_default()
    }

    /// Load every record of `kind`, deduplicated by id
    pub fn load(&self, kind: RecordKind) -> Result<Vec<RawRecord>> {
        if !self.root.is_dir() {
            return Err(RevtrackError::Store(format!(
                "data directory {} not found",
                self.root.display()
            )));
        }

        let files = self.collect_files(kind);
        let all: Vec<RawRecord> = files
            .par_iter()
            .flat_map(|f| match parse_file(f) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(path = %f.display(), error = %e, "failed to read record file");
                    Vec::new()
                }
            })
            .collect();

        let mut seen: HashSet<String> = HashSet::new();
        let mut deduped = Vec::with_capacity(all.len());
        for record in all {
            let id = record_id(&record);
            // Records without an id cannot be duplicates
            if id.is_empty() || seen.insert(id) {
                deduped.push(record);
            }
        }

        tracing::debug!(
            collection = kind.collection(),
            files = files.len(),
            records = deduped.len(),
            "loaded collection"
        );
        Ok(deduped)
    }
}

/// Parse one JSONL file. Blank and malformed lines are skipped.
fn parse_file(path: &Path) -> Result<Vec<RawRecord>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut malformed = 0usize;

    for line_result in reader.lines() {
        let line = match line_result {
            Ok(l) if !l.trim().is_empty() => l,
            Ok(_) => continue,
            Err(_) => {
                malformed += 1;
                continue;
            }
        };

        // simd-json parses in place
        let mut bytes = line.into_bytes();
        match simd_json::serde::from_slice::<RawRecord>(&mut bytes) {
            Ok(record) => records.push(record),
            Err(_) => malformed += 1,
        }
    }

    if malformed > 0 {
        tracing::debug!(path = %path.display(), malformed, "skipped malformed lines");
    }
    Ok(records)
}

#[async_trait]
impl RecordStore for JsonDirStore {
    async fn fetch(&self, kind: RecordKind, range: &DateRange) -> Result<Vec<RawRecord>> {
        let store = JsonDirStore::new(self.root.clone());
        let range = *range;
        tokio::task::spawn_blocking(move || {
            let records = store.load(kind)?;
            Ok(records
                .into_iter()
                .filter(|r| matches_range(r, kind, &range))
                .collect())
        })
        .await
        .map_err(|e| RevtrackError::Store(format!("{kind} read aborted: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "receipts/2024.jsonl",
            "{\"id\":\"r1\",\"total\":80}\nnot json\n\n{\"id\":\"r2\",\"total\":5}\n",
        );

        let store = JsonDirStore::new(dir.path());
        let records = store.load(RecordKind::Receipts).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_load_dedups_by_id_across_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "orders/a.jsonl", "{\"id\":\"o1\",\"status\":\"done\"}\n");
        write(dir.path(), "orders/nested/b.jsonl", "{\"id\":\"o1\",\"status\":\"pending\"}\n{\"status\":\"pending\"}\n{\"status\":\"pending\"}\n");

        let store = JsonDirStore::new(dir.path());
        let records = store.load(RecordKind::Orders).unwrap();

        // o1 once, plus two id-less records
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["status"], "done");
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path());
        assert!(store.load(RecordKind::Mechanics).unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_is_store_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path().join("nope"));
        let err = store.load(RecordKind::Orders).unwrap_err();
        assert!(matches!(err, RevtrackError::Store(_)));
    }

    #[test]
    fn test_preserves_key_order() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "orders/a.jsonl",
            "{\"id\":\"o1\",\"servicePrices\":{\"Zeta\":1,\"Alpha\":2}}\n",
        );
        let store = JsonDirStore::new(dir.path());
        let records = store.load(RecordKind::Orders).unwrap();
        let keys: Vec<&String> = records[0]["servicePrices"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(keys, vec!["Zeta", "Alpha"]);
    }

    #[tokio::test]
    async fn test_fetch_applies_range() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "quick_services/q.jsonl",
            concat!(
                "{\"id\":\"q1\",\"timestamp\":\"2024-03-05T10:00:00Z\"}\n",
                "{\"id\":\"q2\",\"timestamp\":\"not-a-date\"}\n",
                "{\"id\":\"q3\",\"dataCriacao\":\"2024-02-10\"}\n",
            ),
        );

        let store = JsonDirStore::new(dir.path());
        let range = DateRange::between(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
        );
        let records = store.fetch(RecordKind::Standalone, &range).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], "q1");
        assert!(store.subscribe().is_none());
    }
}
