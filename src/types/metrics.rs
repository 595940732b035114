//! Aggregate output types. Recomputed on demand, never persisted.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{OrderStatus, Result, RevtrackError};

/// Inclusive calendar-day window. `end >= start` is enforced on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    start: NaiveDate,
    end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(RevtrackError::Contract(format!(
                "period end {end} precedes start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Instant bounds `[start 00:00, end+1 00:00)` in the given offset, as UTC
    pub fn bounds(&self, offset: &FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        let midnight = |date: NaiveDate| {
            let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
            offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| naive.and_utc())
        };
        let after_end = self.end.succ_opt().unwrap_or(self.end);
        (midnight(self.start), midnight(after_end))
    }
}

/// Source category of a monetary contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Order,
    Standalone,
    Receipt,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Standalone => "standalone",
            Self::Receipt => "receipt",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which figure a snapshot's revenue was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenueSource {
    /// Receipts issued in the period
    Receipts,
    /// Completed orders plus standalone services
    Operational,
}

impl RevenueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receipts => "receipts",
            Self::Operational => "operational",
        }
    }
}

impl fmt::Display for RevenueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamped monetary contribution fed to the series builder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub at: DateTime<Utc>,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(at: DateTime<Utc>, value: f64) -> Self {
        Self { at, value }
    }
}

/// One bucket of a contiguous series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    /// First calendar day covered by the bucket
    pub date: NaiveDate,
    pub label: String,
    pub value: f64,
}

/// Named contribution fed to the ranking aggregator
#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub key: String,
    pub quantity: f64,
    pub value: f64,
}

impl RankEntry {
    pub fn new(key: impl Into<String>, quantity: f64, value: f64) -> Self {
        Self {
            key: key.into(),
            quantity,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub key: String,
    pub quantity: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRank {
    pub name: String,
    pub quantity: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MechanicRank {
    pub id: String,
    pub total: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueShare {
    pub source: Origin,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub order_count: u64,
    pub standalone_count: u64,
    pub revenue: f64,
    pub average_ticket: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status_count: BTreeMap<OrderStatus, u64>,
    pub overdue_count: u64,
    /// Bikes (not orders) on pending or in-progress orders
    pub bikes_in_maintenance: u64,
    pub kpis: Kpis,
    /// Where the revenue figure and series were taken from
    pub revenue_source: RevenueSource,
    pub series: Vec<TimeSeriesPoint>,
    pub revenue_mix: Vec<RevenueShare>,
    pub top_services: Vec<ServiceRank>,
    pub top_mechanics: Vec<MechanicRank>,
    /// Sources whose read failed; figures were computed without them
    pub source_degraded: Vec<Origin>,
}

impl MetricsSnapshot {
    pub fn is_degraded(&self) -> bool {
        !self.source_degraded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_rejects_reversed_bounds() {
        let err = Period::new(date(2024, 3, 31), date(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, RevtrackError::Contract(_)));
    }

    #[test]
    fn test_period_single_day() {
        let p = Period::new(date(2024, 3, 1), date(2024, 3, 1)).unwrap();
        assert_eq!(p.days(), 1);
        assert!(p.contains(date(2024, 3, 1)));
        assert!(!p.contains(date(2024, 3, 2)));
    }

    #[test]
    fn test_period_bounds_in_offset() {
        let p = Period::new(date(2024, 3, 1), date(2024, 3, 31)).unwrap();
        let brt = FixedOffset::west_opt(3 * 3600).unwrap();
        let (start, end) = p.bounds(&brt);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 4, 1, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_origin_serializes_lowercase() {
        let json = serde_json::to_string(&Origin::Standalone).unwrap();
        assert_eq!(json, "\"standalone\"");
    }

    #[test]
    fn test_kpis_serialize_camel_case() {
        let kpis = Kpis {
            order_count: 2,
            standalone_count: 1,
            revenue: 90.0,
            average_ticket: 30.0,
        };
        let value = serde_json::to_value(&kpis).unwrap();
        assert_eq!(value["orderCount"], 2);
        assert_eq!(value["averageTicket"], 30.0);
    }

    #[test]
    fn test_status_count_keys_serialize_as_strings() {
        let mut counts = BTreeMap::new();
        counts.insert(OrderStatus::InProgress, 3u64);
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, "{\"inProgress\":3}");
    }
}
