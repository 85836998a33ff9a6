//! Per-location KPIs read from the landing snapshots.
use crate::config::SnapshotConfig;
use crate::error::PivotSheetError;
use crate::landing::is_total_like;
use crate::landing::read_parquet;
use crate::landing::SnapshotTable;
use std::collections::BTreeSet;
use tracing::debug;

/// Locations never shown on the scoreboard.
pub const EXCLUDED_LOCATIONS: [&str; 2] = ["design services", "design services total"];

/// `(new - base) / base`; `None` when either side is missing or the base is zero.
pub fn pct_change(new: Option<f64>, base: Option<f64>) -> Option<f64> {
    match (new, base) {
        (Some(new), Some(base)) if base != 0.0 => Some((new - base) / base),
        _ => None,
    }
}

fn locations(snapshot: Option<&SnapshotTable>) -> impl Iterator<Item = String> + '_ {
    snapshot
        .into_iter()
        .flat_map(|snapshot| snapshot.locations())
        .map(|location| location.trim().to_owned())
        .filter(|location| !location.is_empty())
        .filter(|location| !EXCLUDED_LOCATIONS.contains(&location.to_lowercase().as_str()))
}

/// Sorted union of both snapshots' locations, total-like labels last.
pub fn location_order(plan: Option<&SnapshotTable>, ly: Option<&SnapshotTable>) -> Vec<String> {
    let all: BTreeSet<String> = locations(plan).chain(locations(ly)).collect();
    let (totals, sites): (Vec<String>, Vec<String>) = all.into_iter().partition(|location| is_total_like(location));
    sites.into_iter().chain(totals).collect()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanMetrics {
    pub yards_produced: Option<f64>,
    pub yards_planned: Option<f64>,
    pub income_produced: Option<f64>,
    pub income_planned: Option<f64>,
    pub net_yards_invoiced: Option<f64>,
    pub net_income_invoiced: Option<f64>,
    pub yards_vs_plan_pct: Option<f64>,
    pub income_vs_plan_pct: Option<f64>,
}

/// Plan KPIs of one location; `None` when the location has no row.
pub fn plan_metrics(plan: &SnapshotTable, location: &str) -> Option<PlanMetrics> {
    plan.row(location)?;
    let yards_produced = plan.value(location, &["Yards Produced"]);
    let yards_planned = plan.value(location, &["Yards Planned"]);
    let income_produced = plan.value(location, &["Income Produced"]);
    let income_planned = plan.value(location, &["Income Planned"]);
    Some(PlanMetrics {
        yards_produced,
        yards_planned,
        income_produced,
        income_planned,
        net_yards_invoiced: plan.value(location, &["Net Yards Invoiced"]),
        net_income_invoiced: plan.value(location, &["Net Income Invoiced"]),
        yards_vs_plan_pct: pct_change(yards_produced, yards_planned),
        income_vs_plan_pct: pct_change(income_produced, income_planned),
    })
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LyMetrics {
    pub produced_current: Option<f64>,
    pub produced_ly: Option<f64>,
    pub written_current: Option<f64>,
    pub written_ly: Option<f64>,
    pub invoiced_current: Option<f64>,
    pub invoiced_ly: Option<f64>,
    pub produced_vs_ly_pct: Option<f64>,
    pub written_vs_ly_pct: Option<f64>,
    pub invoiced_vs_ly_pct: Option<f64>,
}

/// Current versus last-year KPIs of one location; `None` when the location has no row.
pub fn ly_metrics(ly: &SnapshotTable, location: &str) -> Option<LyMetrics> {
    ly.row(location)?;
    let produced_current = ly.value(location, &["Produced Current", "Income Produced Current", "Produced"]);
    let produced_ly = ly.value(location, &["Produced LY", "Income Produced LY", "Produced Last Year"]);
    let written_current = ly.value(location, &["Written Current", "Written"]);
    let written_ly = ly.value(location, &["Written LY", "Written Last Year"]);
    let invoiced_current = ly.value(location, &["Invoiced Current", "Net Income Invoiced Current", "Invoiced"]);
    let invoiced_ly = ly.value(location, &["Invoiced LY", "Net Income Invoiced LY", "Invoiced Last Year"]);
    Some(LyMetrics {
        produced_current,
        produced_ly,
        written_current,
        written_ly,
        invoiced_current,
        invoiced_ly,
        produced_vs_ly_pct: pct_change(produced_current, produced_ly),
        written_vs_ly_pct: pct_change(written_current, written_ly),
        invoiced_vs_ly_pct: pct_change(invoiced_current, invoiced_ly),
    })
}

/// Metrics of one scoreboard line.
#[derive(Clone, Debug, PartialEq)]
pub struct LocationScore {
    pub location: String,
    pub plan: Option<PlanMetrics>,
    pub ly: Option<LyMetrics>,
}

/// Both snapshots, as read back from disk.
#[derive(Clone, Debug, PartialEq)]
pub struct Scoreboard {
    pub plan: SnapshotTable,
    pub ly: SnapshotTable,
}

impl Scoreboard {
    /// Reads both snapshots; `None` until both files exist.
    pub fn load(config: &SnapshotConfig) -> Result<Option<Scoreboard>, PivotSheetError> {
        let (Some(plan), Some(ly)) = (read_parquet(&config.plan_path)?, read_parquet(&config.ly_path)?) else {
            debug!(plan = %config.plan_path.display(), ly = %config.ly_path.display(), "snapshots not built yet");
            return Ok(None);
        };
        Ok(Some(Scoreboard { plan, ly }))
    }

    pub fn locations(&self) -> Vec<String> {
        location_order(Some(&self.plan), Some(&self.ly))
    }

    /// One line per location in scoreboard order.
    pub fn scores(&self) -> Vec<LocationScore> {
        self.locations()
            .into_iter()
            .map(|location| LocationScore {
                plan: plan_metrics(&self.plan, &location),
                ly: ly_metrics(&self.ly, &location),
                location,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landing::SnapshotRow;
    use pretty_assertions::assert_eq;

    fn snapshot(columns: &[&str], rows: Vec<(&str, Vec<Option<f64>>)>) -> SnapshotTable {
        SnapshotTable {
            columns: columns.iter().map(|column| column.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|(location, values)| SnapshotRow {
                    location: location.to_owned(),
                    values,
                })
                .collect(),
        }
    }

    fn labels(locations: &[&str]) -> SnapshotTable {
        snapshot(&[], locations.iter().map(|location| (*location, vec![])).collect())
    }

    #[test]
    fn percent_change() {
        assert_eq!(pct_change(Some(110.0), Some(100.0)), Some(0.1));
        assert_eq!(pct_change(Some(50.0), Some(0.0)), None);
        assert_eq!(pct_change(None, Some(1.0)), None);
        assert_eq!(pct_change(Some(1.0), None), None);
    }

    #[test]
    fn order_puts_totals_last() {
        let plan = labels(&["Plant B", "Grand Total", "Design Services", ""]);
        let ly = labels(&["Plant A", " Plant B ", "Total"]);
        assert_eq!(location_order(Some(&plan), Some(&ly)), vec!["Plant A", "Plant B", "Grand Total", "Total"]);
        assert_eq!(location_order(None, Some(&ly)), vec!["Plant A", "Plant B", "Total"]);
        assert!(location_order(None, None).is_empty());
    }

    #[test]
    fn metrics_per_location() {
        let plan = snapshot(&["Yards Produced", "Yards Planned", "Income Produced"], vec![
            ("Plant A", vec![Some(90.0), Some(100.0), Some(5.0)]),
        ]);
        let metrics = plan_metrics(&plan, " plant a").unwrap();
        assert_eq!(metrics.yards_vs_plan_pct, Some(-0.1));
        assert_eq!(metrics.income_planned, None);
        assert_eq!(metrics.income_vs_plan_pct, None);
        assert_eq!(plan_metrics(&plan, "Plant Z"), None);

        let ly = snapshot(&["Written", "Written LY", "Invoiced Current", "Invoiced LY"], vec![
            ("Plant A", vec![Some(30.0), Some(20.0), Some(8.0), Some(0.0)]),
        ]);
        let metrics = ly_metrics(&ly, "Plant A").unwrap();
        assert_eq!(metrics.written_current, Some(30.0));
        assert_eq!(metrics.written_vs_ly_pct, Some(0.5));
        assert_eq!(metrics.invoiced_vs_ly_pct, None);
        assert_eq!(metrics.produced_current, None);
    }

    #[test]
    fn scoreboard_waits_for_both_files() {
        let directory = tempfile::tempdir().unwrap();
        let config = SnapshotConfig {
            plan_path: directory.path().join("plan.parquet"),
            ly_path: directory.path().join("ly.parquet"),
        };
        assert_eq!(Scoreboard::load(&config).unwrap(), None);
    }
}
