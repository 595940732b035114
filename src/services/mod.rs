//! Services for normalization, pricing and aggregation

pub mod aggregator;
pub mod live;
pub mod normalizer;
pub mod reconciler;
pub mod resolver;
pub mod series;
pub mod status;

pub use aggregator::Aggregator;
pub use live::LiveSnapshot;
pub use normalizer::{to_date, to_number, DateLike};
pub use reconciler::{
    MetricsEngine, OriginFilter, SnapshotFilters, SnapshotRequest, SourceRecords, StatusScope,
};
pub use resolver::{
    audit_declared_totals, resolve_bike_total, resolve_order_total, resolve_services,
    ResolvedService, TotalDrift,
};
pub use series::{build_daily_series, Granularity, SeriesBuilder};
pub use status::{classify_status, count_statuses, StatusClassification, StatusCounts};
