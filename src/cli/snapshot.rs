//! `revtrack snapshot` and `revtrack status`

use chrono::Utc;
use clap::Args;
use std::collections::HashMap;
use std::fmt::Write as _;

use revtrack::config::EngineConfig;
use revtrack::types::{MetricsSnapshot, OrderStatus};
use revtrack::{Granularity, OriginFilter, SnapshotFilters, SnapshotRequest, StatusScope};

use super::{engine, print_json, PeriodArgs};

#[derive(Args, Debug, Default)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub period: PeriodArgs,

    /// Only count this service (case-insensitive)
    #[arg(long)]
    pub service: Option<String>,

    /// Only count work by this mechanic id
    #[arg(long)]
    pub mechanic: Option<String>,

    /// Restrict to one origin
    #[arg(long, value_enum, default_value_t)]
    pub origin: OriginFilter,

    /// Status counts over all orders (active) or the period only
    #[arg(long, value_enum, default_value_t)]
    pub scope: StatusScope,

    /// Series bucket size
    #[arg(long, value_enum, default_value_t)]
    pub granularity: Granularity,

    /// Entries per ranking
    #[arg(long)]
    pub top: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SnapshotArgs {
    pub async fn run(self, mut config: EngineConfig) -> anyhow::Result<()> {
        if let Some(top) = self.top {
            config.top_n = top;
        }
        let engine = engine(&config)?;
        let period = self.period.resolve(&engine.offset())?;

        let request = SnapshotRequest::new(period, Utc::now())
            .with_filters(SnapshotFilters {
                service: self.service,
                mechanic: self.mechanic,
                origin: self.origin,
            })
            .with_scope(self.scope)
            .with_granularity(self.granularity);
        let snapshot = engine.compute_snapshot(&request).await;

        if self.json {
            return print_json(&snapshot);
        }

        let names: HashMap<String, String> = match engine.mechanics().await {
            Ok(mechanics) => mechanics.into_iter().map(|m| (m.id, m.name)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load mechanic names");
                HashMap::new()
            }
        };
        print!("{}", render_snapshot(&snapshot, &names));
        Ok(())
    }
}

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    #[command(flatten)]
    pub period: PeriodArgs,

    /// Status counts over all orders (active) or the period only
    #[arg(long, value_enum, default_value_t)]
    pub scope: StatusScope,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub async fn run(self, config: EngineConfig) -> anyhow::Result<()> {
        let engine = engine(&config)?;
        let period = self.period.resolve(&engine.offset())?;
        let request = SnapshotRequest::new(period, Utc::now()).with_scope(self.scope);
        let snapshot = engine.compute_snapshot(&request).await;

        if self.json {
            return print_json(&serde_json::json!({
                "statusCount": snapshot.status_count,
                "overdueCount": snapshot.overdue_count,
                "bikesInMaintenance": snapshot.bikes_in_maintenance,
                "sourceDegraded": snapshot.source_degraded,
            }));
        }
        print!("{}", render_status(&snapshot));
        Ok(())
    }
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

fn render_status(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();
    for status in OrderStatus::ALL {
        let count = snapshot.status_count.get(&status).copied().unwrap_or(0);
        let _ = writeln!(out, "{:<22}{count}", status.as_str());
    }
    let _ = writeln!(out, "{:<22}{}", "overdue", snapshot.overdue_count);
    let _ = writeln!(out, "{:<22}{}", "bikes in maintenance", snapshot.bikes_in_maintenance);
    out
}

fn render_snapshot(snapshot: &MetricsSnapshot, names: &HashMap<String, String>) -> String {
    let mut out = String::new();
    let kpis = &snapshot.kpis;

    let _ = writeln!(
        out,
        "Period        {} .. {}",
        snapshot.period_start, snapshot.period_end
    );
    let _ = writeln!(
        out,
        "Revenue       {} ({})",
        money(kpis.revenue),
        snapshot.revenue_source
    );
    let _ = writeln!(
        out,
        "Tickets       {} orders, {} standalone, average {}",
        kpis.order_count,
        kpis.standalone_count,
        money(kpis.average_ticket)
    );
    let mix: Vec<String> = snapshot
        .revenue_mix
        .iter()
        .map(|share| format!("{} {}", share.source, money(share.value)))
        .collect();
    let _ = writeln!(out, "Mix           {}", mix.join(", "));
    if snapshot.is_degraded() {
        let degraded: Vec<&str> = snapshot.source_degraded.iter().map(|o| o.as_str()).collect();
        let _ = writeln!(out, "Degraded      {} unavailable", degraded.join(", "));
    }

    let _ = writeln!(out, "\nStatus");
    for line in render_status(snapshot).lines() {
        let _ = writeln!(out, "  {line}");
    }

    if !snapshot.top_services.is_empty() {
        let _ = writeln!(out, "\nTop services");
        for (i, s) in snapshot.top_services.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {:<24} x{:<6} {:>12}",
                i + 1,
                s.name,
                s.quantity,
                money(s.total)
            );
        }
    }

    if !snapshot.top_mechanics.is_empty() {
        let _ = writeln!(out, "\nTop mechanics");
        for (i, m) in snapshot.top_mechanics.iter().enumerate() {
            let label = match names.get(&m.id).filter(|n| !n.is_empty()) {
                Some(name) => format!("{name} ({})", m.id),
                None => m.id.clone(),
            };
            let _ = writeln!(
                out,
                "  {}. {:<24} {:<7} {:>12}",
                i + 1,
                label,
                m.count,
                money(m.total)
            );
        }
    }

    let _ = writeln!(out, "\nSeries");
    for point in &snapshot.series {
        let _ = writeln!(out, "  {:<14}{:>12}", point.label, money(point.value));
    }
    out
}
