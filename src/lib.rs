//! Revenue and operations metrics over loosely-typed service records.
//!
//! Records (service orders, quick services, receipts) are read from a
//! [`store::RecordStore`], normalized by the [`parsers`], priced by the
//! [`services::resolver`] and reconciled into a [`types::MetricsSnapshot`]
//! by [`MetricsEngine`].

pub mod config;
pub mod parsers;
pub mod services;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use services::{
    build_daily_series, classify_status, resolve_order_total, Aggregator, Granularity,
    LiveSnapshot, MetricsEngine, OriginFilter, SnapshotFilters, SnapshotRequest, StatusScope,
};
pub use store::{JsonDirStore, MemoryStore, RecordKind, RecordStore};
pub use types::{MetricsSnapshot, Period, Result, RevtrackError};
