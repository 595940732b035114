//! `revtrack audit` subcommand for declared-total drift

use clap::Args;

use revtrack::config::EngineConfig;
use revtrack::services::resolver::TotalDrift;

use super::{engine, print_json, PeriodArgs};

/// Compare stored order totals with recomputed ones
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Limit to orders dated within --from/--to (default: every order)
    #[command(flatten)]
    pub period: PeriodArgs,

    /// Ignore differences at or below this amount (default from config)
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AuditArgs {
    pub async fn run(self, config: EngineConfig) -> anyhow::Result<()> {
        let engine = engine(&config)?;
        let tolerance = self.tolerance.unwrap_or(config.drift_tolerance);
        if !tolerance.is_finite() || tolerance < 0.0 {
            anyhow::bail!("tolerance must be a non-negative number");
        }

        let period = if self.period.is_set() {
            Some(self.period.resolve(&engine.offset())?)
        } else {
            None
        };
        let drifts = engine.audit(period.as_ref(), tolerance).await?;

        if self.json {
            return print_json(&drifts);
        }
        print!("{}", render_drifts(&drifts));
        Ok(())
    }
}

fn render_drifts(drifts: &[TotalDrift]) -> String {
    if drifts.is_empty() {
        return "All declared totals match their line items.\n".to_string();
    }

    let mut out = format!(
        "{:<16}{:<12}{:>12}{:>12}{:>12}\n",
        "order", "code", "declared", "computed", "difference"
    );
    for d in drifts {
        out.push_str(&format!(
            "{:<16}{:<12}{:>12.2}{:>12.2}{:>+12.2}\n",
            d.order_id, d.code, d.declared, d.computed, d.difference
        ));
    }
    out.push_str(&format!("{} order(s) drifted\n", drifts.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_no_drift() {
        assert!(render_drifts(&[]).starts_with("All declared totals match"));
    }

    #[test]
    fn test_render_drift_rows() {
        let drifts = vec![TotalDrift {
            order_id: "o1".into(),
            code: "OS-1".into(),
            declared: 70.0,
            computed: 50.0,
            difference: 20.0,
        }];
        let out = render_drifts(&drifts);
        assert!(out.contains("OS-1"));
        assert!(out.contains("+20.00"));
        assert!(out.ends_with("1 order(s) drifted\n"));
    }
}
