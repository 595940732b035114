//! Record store collaborator
//!
//! The engine only needs two things from storage: "all records of kind K
//! dated within a range" and, optionally, "tell me when kind K changes".
//! Records come back as raw maps; the parsers decide what they mean.

mod json_dir;
mod memory;

pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::broadcast;

use crate::parsers::{ORDER_DATE_FIELDS, RECEIPT_DATE_FIELDS, STANDALONE_DATE_FIELDS};
use crate::services::normalizer::DateLike;
use crate::types::{RawRecord, Result};

/// Kinds of record the engine reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Orders,
    Standalone,
    Receipts,
    Mechanics,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        Self::Orders,
        Self::Standalone,
        Self::Receipts,
        Self::Mechanics,
    ];

    /// Collection name in the store
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Standalone => "quick_services",
            Self::Receipts => "receipts",
            Self::Mechanics => "mechanics",
        }
    }

    /// Fields a record of this kind may be dated by. Empty means undated.
    pub fn date_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Orders => ORDER_DATE_FIELDS,
            Self::Standalone => STANDALONE_DATE_FIELDS,
            Self::Receipts => RECEIPT_DATE_FIELDS,
            Self::Mechanics => &[],
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Half-open instant range `[start, end)`; a missing bound is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at < e)
    }
}

/// Coarse range check used by stores: a record matches when any of its
/// kind's date fields falls inside the range.
///
/// A record with no readable date never matches a bounded range; it is
/// unknown, not epoch zero. Undated kinds always match.
pub fn matches_range(record: &RawRecord, kind: RecordKind, range: &DateRange) -> bool {
    let fields = kind.date_fields();
    if range.is_unbounded() || fields.is_empty() {
        return true;
    }
    fields
        .iter()
        .filter_map(|key| record.get(*key))
        .filter_map(DateLike::to_date)
        .any(|at| range.contains(at))
}

/// Read access to the operational record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records of `kind` dated within `range`
    async fn fetch(&self, kind: RecordKind, range: &DateRange) -> Result<Vec<RawRecord>>;

    /// Change notifications, one message per modified kind. Stores that
    /// cannot notify return `None`.
    fn subscribe(&self) -> Option<broadcast::Receiver<RecordKind>> {
        None
    }
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    async fn fetch(&self, kind: RecordKind, range: &DateRange) -> Result<Vec<RawRecord>> {
        (**self).fetch(kind, range).await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<RecordKind>> {
        (**self).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn march() -> DateRange {
        DateRange::between(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_range_is_half_open() {
        let range = march();
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        assert!(!range.contains(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_unbounded_range_contains_everything() {
        let range = DateRange::all();
        assert!(range.is_unbounded());
        assert!(range.contains(DateTime::<Utc>::MIN_UTC));
    }

    #[test]
    fn test_matches_any_date_field() {
        // Created in February, completed in March
        let r = record(json!({"createdAt": "2024-02-20", "completedAt": "2024-03-02"}));
        assert!(matches_range(&r, RecordKind::Orders, &march()));
    }

    #[test]
    fn test_malformed_date_never_matches_bounded_range() {
        let r = record(json!({"timestamp": "not-a-date"}));
        assert!(!matches_range(&r, RecordKind::Standalone, &march()));
        assert!(matches_range(&r, RecordKind::Standalone, &DateRange::all()));
    }

    #[test]
    fn test_undated_kind_always_matches() {
        let r = record(json!({"id": "m1", "name": "João"}));
        assert!(matches_range(&r, RecordKind::Mechanics, &march()));
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(RecordKind::Standalone.collection(), "quick_services");
        assert_eq!(RecordKind::Receipts.to_string(), "receipts");
    }
}
