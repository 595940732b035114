//! Revenue reconciliation and snapshot assembly
//!
//! Orders, standalone services and receipts are read concurrently from the
//! record store. Everything after the reads is synchronous: records are
//! parsed, priced, filtered, bucketed and ranked into one `MetricsSnapshot`.
//!
//! Receipts are the financially authoritative source: when any receipt
//! revenue exists for the period it becomes the revenue figure. Otherwise the
//! figure falls back to completed orders plus standalone services.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::parsers::{MechanicParser, OrderParser, ReceiptParser, RecordParser, StandaloneParser};
use crate::services::aggregator::Aggregator;
use crate::services::resolver::{
    audit_declared_totals, resolve_order_total, resolve_receipt_total, resolve_services,
    resolve_standalone_total, TotalDrift,
};
use crate::services::series::{Granularity, SeriesBuilder};
use crate::services::status::count_statuses;
use crate::store::{DateRange, RecordKind, RecordStore};
use crate::types::{
    Kpis, Mechanic, MechanicRank, MetricsSnapshot, Origin, OrderStatus, Period, RankEntry,
    RawRecord, Receipt, Result, RevenueShare, RevenueSource, SeriesPoint, ServiceOrder,
    ServiceRank, StandaloneServiceEntry,
};

/// Which origins contribute to the figures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OriginFilter {
    #[default]
    All,
    Order,
    Standalone,
}

impl OriginFilter {
    fn includes(&self, origin: Origin) -> bool {
        match self {
            Self::All => true,
            Self::Order => origin == Origin::Order,
            Self::Standalone => origin == Origin::Standalone,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFilters {
    pub service: Option<String>,
    pub mechanic: Option<String>,
    pub origin: OriginFilter,
}

impl SnapshotFilters {
    /// No service, mechanic or origin restriction
    pub fn is_unfiltered(&self) -> bool {
        self.service.is_none() && self.mechanic.is_none() && self.origin == OriginFilter::All
    }

    fn matches_service(&self, name: &str) -> bool {
        self.service.as_deref().map_or(true, |s| same_name(s, name))
    }

    fn matches_mechanic(&self, id: Option<&str>) -> bool {
        match self.mechanic.as_deref() {
            None => true,
            Some(wanted) => id == Some(wanted),
        }
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Which orders the status counts cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StatusScope {
    /// Every order on record, ignoring the period and filters ("right now").
    ///
    /// `Done` is the lifetime total of finished orders; use `Period` for
    /// orders finished within a window.
    #[default]
    Active,
    /// Orders dated within the period that pass the service/mechanic filters
    Period,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRequest {
    pub period: Period,
    pub filters: SnapshotFilters,
    pub scope: StatusScope,
    pub granularity: Granularity,
    /// Reference instant for overdue detection
    pub now: DateTime<Utc>,
}

impl SnapshotRequest {
    pub fn new(period: Period, now: DateTime<Utc>) -> Self {
        Self {
            period,
            filters: SnapshotFilters::default(),
            scope: StatusScope::default(),
            granularity: Granularity::default(),
            now,
        }
    }

    pub fn with_filters(mut self, filters: SnapshotFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_scope(mut self, scope: StatusScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }
}

/// Parsed records of one snapshot, plus the sources that could not be read
#[derive(Debug, Clone, Default)]
pub struct SourceRecords {
    pub orders: Vec<ServiceOrder>,
    pub standalone: Vec<StandaloneServiceEntry>,
    pub receipts: Vec<Receipt>,
    pub degraded: Vec<Origin>,
}

/// Snapshot engine over a record store. Holds no mutable state; concurrent
/// `compute_snapshot` calls are independent.
pub struct MetricsEngine<S> {
    store: S,
    top_n: usize,
    offset: FixedOffset,
    daily: SeriesBuilder,
    monthly: SeriesBuilder,
}

impl<S: RecordStore> MetricsEngine<S> {
    /// Engine with UTC buckets, ISO labels and top-5 rankings
    pub fn new(store: S) -> Self {
        Self {
            store,
            top_n: 5,
            offset: Utc.fix(),
            daily: SeriesBuilder::daily(),
            monthly: SeriesBuilder::monthly(),
        }
    }

    pub fn with_config(store: S, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let offset = config.offset()?;
        Ok(Self {
            store,
            top_n: config.top_n,
            offset,
            daily: SeriesBuilder::daily()
                .with_label_format(&config.day_label_format)?
                .with_offset(offset),
            monthly: SeriesBuilder::monthly()
                .with_label_format(&config.month_label_format)?
                .with_offset(offset),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Snapshot for `[start, end]`. Fails only when `end` precedes `start`.
    pub async fn snapshot_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        filters: SnapshotFilters,
        scope: StatusScope,
    ) -> Result<MetricsSnapshot> {
        let request = SnapshotRequest::new(Period::new(start, end)?, Utc::now())
            .with_filters(filters)
            .with_scope(scope);
        Ok(self.compute_snapshot(&request).await)
    }

    /// Read all three sources concurrently and reconcile them.
    ///
    /// A source whose read fails is logged and listed in
    /// `source_degraded`; the snapshot is computed from the rest.
    pub async fn compute_snapshot(&self, request: &SnapshotRequest) -> MetricsSnapshot {
        let sources = self.fetch_sources(request).await;
        self.reconcile(&sources, request)
    }

    async fn fetch_sources(&self, request: &SnapshotRequest) -> SourceRecords {
        let (start, end) = request.period.bounds(&self.offset);
        let period_range = DateRange::between(start, end);
        let order_range = match request.scope {
            StatusScope::Active => DateRange::all(),
            StatusScope::Period => period_range,
        };

        let (orders, standalone, receipts) = tokio::join!(
            self.store.fetch(RecordKind::Orders, &order_range),
            self.store.fetch(RecordKind::Standalone, &period_range),
            self.store.fetch(RecordKind::Receipts, &period_range),
        );

        let mut degraded = Vec::new();
        let orders = settle(orders, Origin::Order, &mut degraded);
        let standalone = settle(standalone, Origin::Standalone, &mut degraded);
        let receipts = settle(receipts, Origin::Receipt, &mut degraded);

        SourceRecords {
            orders: OrderParser.parse_all(&orders),
            standalone: StandaloneParser.parse_all(&standalone),
            receipts: ReceiptParser.parse_all(&receipts),
            degraded,
        }
    }

    /// Pure reconciliation of already-read records
    pub fn reconcile(&self, sources: &SourceRecords, request: &SnapshotRequest) -> MetricsSnapshot {
        let (start, end) = request.period.bounds(&self.offset);
        let in_period = |at: Option<DateTime<Utc>>| at.is_some_and(|t| t >= start && t < end);
        let filters = &request.filters;

        let mut services: Vec<RankEntry> = Vec::new();
        let mut mechanics: Vec<RankEntry> = Vec::new();
        let mut operational_points: Vec<SeriesPoint> = Vec::new();

        // Completed orders, placed in time by their completion-relevant date
        let mut order_revenue = 0.0;
        let mut order_count = 0u64;
        if filters.origin.includes(Origin::Order) {
            for order in &sources.orders {
                if order.status != OrderStatus::Done {
                    continue;
                }
                let Some(at) = order.completion_date().filter(|t| in_period(Some(*t))) else {
                    continue;
                };
                if !filters.matches_mechanic(order.mechanic_id.as_deref()) {
                    continue;
                }

                let resolved: Vec<_> = order
                    .bikes
                    .iter()
                    .flat_map(resolve_services)
                    .filter(|s| filters.matches_service(&s.name))
                    .collect();
                let total = match filters.service {
                    None => resolve_order_total(order),
                    // Only the matching services count; parts belong to no service
                    Some(_) if resolved.is_empty() => continue,
                    Some(_) => resolved.iter().map(|s| s.total).sum(),
                };

                services.extend(
                    resolved
                        .iter()
                        .map(|s| RankEntry::new(s.name.clone(), s.quantity, s.total)),
                );
                if let Some(mechanic) = order.mechanic_id.as_deref().filter(|m| !m.is_empty()) {
                    mechanics.push(RankEntry::new(mechanic, 1.0, total));
                }
                order_revenue += total;
                order_count += 1;
                operational_points.push(SeriesPoint::new(at, total));
            }
        }

        let mut standalone_revenue = 0.0;
        let mut standalone_count = 0u64;
        if filters.origin.includes(Origin::Standalone) {
            for entry in &sources.standalone {
                // Unknown dates are excluded, never treated as epoch zero
                let Some(at) = entry.timestamp.filter(|t| in_period(Some(*t))) else {
                    continue;
                };
                if !filters.matches_service(&entry.service_name)
                    || !filters.matches_mechanic(Some(&entry.mechanic_id))
                {
                    continue;
                }

                let total = resolve_standalone_total(entry);
                services.push(RankEntry::new(
                    entry.service_name.clone(),
                    entry.quantity,
                    total,
                ));
                if !entry.mechanic_id.is_empty() {
                    mechanics.push(RankEntry::new(entry.mechanic_id.clone(), 1.0, total));
                }
                standalone_revenue += total;
                standalone_count += 1;
                operational_points.push(SeriesPoint::new(at, total));
            }
        }

        // Receipts cannot be split by service or mechanic, so they only
        // compete in the unfiltered view
        let mut receipt_revenue = 0.0;
        let mut receipt_points: Vec<SeriesPoint> = Vec::new();
        if filters.is_unfiltered() {
            for receipt in &sources.receipts {
                let Some(at) = receipt.issued_at.filter(|t| in_period(Some(*t))) else {
                    continue;
                };
                let total = resolve_receipt_total(receipt);
                receipt_revenue += total;
                receipt_points.push(SeriesPoint::new(at, total));
            }
        }

        let (revenue, revenue_source, points) = if receipt_revenue > 0.0 {
            (receipt_revenue, RevenueSource::Receipts, receipt_points)
        } else {
            (
                order_revenue + standalone_revenue,
                RevenueSource::Operational,
                operational_points,
            )
        };

        let tickets = order_count + standalone_count;
        let average_ticket = if tickets == 0 {
            0.0
        } else {
            revenue / tickets as f64
        };

        let builder = match request.granularity {
            Granularity::Day => &self.daily,
            Granularity::Month => &self.monthly,
        };
        let series = builder.build(&points, &request.period);

        let status = match request.scope {
            StatusScope::Active => count_statuses(&sources.orders, request.now),
            StatusScope::Period => count_statuses(
                sources.orders.iter().filter(|o| {
                    (in_period(o.created_at)
                        || in_period(o.updated_at)
                        || in_period(o.completed_at))
                        && filters.matches_mechanic(o.mechanic_id.as_deref())
                        && (filters.service.is_none()
                            || o.bikes
                                .iter()
                                .flat_map(resolve_services)
                                .any(|s| filters.matches_service(&s.name)))
                }),
                request.now,
            ),
        };

        let top_services = Aggregator::rank(&services, self.top_n)
            .into_iter()
            .map(|r| ServiceRank {
                name: r.key,
                quantity: r.quantity,
                total: r.total,
            })
            .collect();
        let top_mechanics = Aggregator::rank(&mechanics, self.top_n)
            .into_iter()
            .map(|r| MechanicRank {
                id: r.key,
                total: r.total,
                count: r.quantity as u64,
            })
            .collect();

        let mut snapshot = MetricsSnapshot {
            period_start: request.period.start(),
            period_end: request.period.end(),
            status_count: status.by_status,
            overdue_count: status.overdue,
            bikes_in_maintenance: status.bikes_in_maintenance,
            kpis: Kpis {
                order_count,
                standalone_count,
                revenue,
                average_ticket,
            },
            revenue_source,
            series,
            revenue_mix: vec![
                RevenueShare {
                    source: Origin::Order,
                    value: order_revenue,
                },
                RevenueShare {
                    source: Origin::Standalone,
                    value: standalone_revenue,
                },
                RevenueShare {
                    source: Origin::Receipt,
                    value: receipt_revenue,
                },
            ],
            top_services,
            top_mechanics,
            source_degraded: sources.degraded.clone(),
        };
        snapshot.source_degraded.sort();

        tracing::debug!(
            start = %snapshot.period_start,
            end = %snapshot.period_end,
            revenue = snapshot.kpis.revenue,
            source = %snapshot.revenue_source,
            degraded = snapshot.source_degraded.len(),
            "snapshot computed"
        );
        snapshot
    }

    /// Every mechanic on record
    pub async fn mechanics(&self) -> Result<Vec<Mechanic>> {
        let records = self
            .store
            .fetch(RecordKind::Mechanics, &DateRange::all())
            .await?;
        Ok(MechanicParser.parse_all(&records))
    }

    /// Orders whose declared total drifted from the recomputed one.
    ///
    /// Unlike snapshots, a failed read here is returned to the caller.
    pub async fn audit(&self, period: Option<&Period>, tolerance: f64) -> Result<Vec<TotalDrift>> {
        let range = match period {
            Some(p) => {
                let (start, end) = p.bounds(&self.offset);
                DateRange::between(start, end)
            }
            None => DateRange::all(),
        };
        let records = self.store.fetch(RecordKind::Orders, &range).await?;
        let orders = OrderParser.parse_all(&records);
        Ok(audit_declared_totals(&orders, tolerance))
    }
}

fn settle(result: Result<Vec<RawRecord>>, origin: Origin, degraded: &mut Vec<Origin>) -> Vec<RawRecord> {
    result.unwrap_or_else(|e| {
        tracing::warn!(source = %origin, error = %e, "source read failed, continuing without it");
        degraded.push(origin);
        Vec::new()
    })
}
