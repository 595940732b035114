//! Time-bucketed series builder
//!
//! Buckets timestamped values into a contiguous, zero-filled series so
//! charts never see a missing tick. Buckets follow the calendar in a fixed
//! UTC offset; output is always ascending by date.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate, Offset, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::types::{Period, Result, RevtrackError, SeriesPoint, TimeSeriesPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Month,
}

impl Granularity {
    pub fn default_label_format(&self) -> &'static str {
        match self {
            Self::Day => "%Y-%m-%d",
            Self::Month => "%Y-%m",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeriesBuilder {
    granularity: Granularity,
    label_format: String,
    offset: FixedOffset,
}

impl SeriesBuilder {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            label_format: granularity.default_label_format().to_string(),
            offset: Utc.fix(),
        }
    }

    pub fn daily() -> Self {
        Self::new(Granularity::Day)
    }

    pub fn monthly() -> Self {
        Self::new(Granularity::Month)
    }

    /// Use a strftime label format. Rejected up front if chrono cannot render it.
    pub fn with_label_format(mut self, format: &str) -> Result<Self> {
        validate_label_format(format)?;
        self.label_format = format.to_string();
        Ok(self)
    }

    /// Calendar offset used to decide which day a point belongs to
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Calendar day of an instant in this builder's offset
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self.granularity {
            Granularity::Day => date,
            Granularity::Month => date.with_day(1).unwrap_or(date),
        }
    }

    fn next_bucket(&self, bucket: NaiveDate) -> Option<NaiveDate> {
        match self.granularity {
            Granularity::Day => bucket.succ_opt(),
            Granularity::Month => bucket.checked_add_months(Months::new(1)),
        }
    }

    /// Build the series for `period`. Points whose local date falls outside
    /// the period are dropped.
    pub fn build(&self, points: &[SeriesPoint], period: &Period) -> Vec<TimeSeriesPoint> {
        let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for point in points {
            let date = self.local_date(point.at);
            if !period.contains(date) {
                continue;
            }
            *totals.entry(self.bucket_start(date)).or_default() += point.value;
        }

        let last = self.bucket_start(period.end());
        let mut series = Vec::new();
        let mut bucket = Some(self.bucket_start(period.start()));

        while let Some(date) = bucket.filter(|d| *d <= last) {
            series.push(TimeSeriesPoint {
                date,
                label: date.format(&self.label_format).to_string(),
                value: totals.get(&date).copied().unwrap_or(0.0),
            });
            bucket = self.next_bucket(date);
        }

        series
    }
}

impl Default for SeriesBuilder {
    fn default() -> Self {
        Self::daily()
    }
}

/// Labels are rendered from calendar dates, so time and zone specifiers
/// (`%H`, `%Z`, `%s`, ...) are rejected along with malformed ones.
pub(crate) fn validate_label_format(format: &str) -> Result<()> {
    let invalid = || RevtrackError::Config(format!("invalid series label format '{format}'"));
    if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(invalid());
    }

    let sample = NaiveDate::from_ymd_opt(2024, 1, 31).ok_or_else(invalid)?;
    let mut rendered = String::new();
    write!(rendered, "{}", sample.format(format)).map_err(|_| invalid())?;
    Ok(())
}

/// Daily series in UTC with ISO labels, one bucket per day of `[start, end]`.
///
/// Fails only when `end` precedes `start`.
pub fn build_daily_series(
    points: &[SeriesPoint],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TimeSeriesPoint>> {
    let period = Period::new(start, end)?;
    Ok(SeriesBuilder::daily().build(points, &period))
}
