//! Location × KPI snapshots of the two YTD tabs, persisted as Parquet.
//!
//! The snapshots are what the landing scoreboard reads, so they are written
//! once per workbook build instead of being derived on every view. Each one
//! always ends with a "Grand Total" row.
use crate::config::SnapshotConfig;
use crate::error::PivotSheetError;
use crate::error::ResultMessage;
use crate::spreadsheet::RawSheet;
use crate::spreadsheet::XlsxWorkbook;
use crate::table::cell_at;
use crate::table::header::HeaderStrategy;
use crate::table::header::DEFAULT_MAX_SCAN_ROWS;
use crate::table::is_placeholder;
use crate::table::normalize::NormalizeOptions;
use crate::table::normalize::TableNormalizer;
use crate::table::numeric::coerce_value;
use crate::table::resolve::find_column;
use crate::table::resolve::NameResolver;
use duckdb::params_from_iter;
use duckdb::types::Value as DuckValue;
use duckdb::Connection;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

pub const LOCATION_COLUMN: &str = "Location";
pub const GRAND_TOTAL: &str = "Grand Total";

/// Location labels that stand for an aggregate rather than a site.
pub const TOTAL_LIKE_LOCATIONS: [&str; 5] = ["grand total", "total", "overall", "company total", "all"];

pub const PLAN_SHEET: &str = "ytd plan v actual";
pub const LY_SHEET: &str = "ytd v ly";

/// Canonical KPI columns of the plan snapshot and the names they appear under.
pub const PLAN_MEASURES: &[(&str, &[&str])] = &[
    ("Yards Produced", &["Yards Produced", "Produced Yards", "Yds Produced", "Produced"]),
    ("Yards Planned", &["Yards Planned", "Planned Yards", "Yds Planned", "Plan Yards"]),
    ("Income Produced", &["Income Produced", "Produced Income", "Income", "Produced $", "Produced Dollars"]),
    ("Income Planned", &["Income Planned", "Planned Income", "Plan Income", "Planned $", "Plan $"]),
    ("Net Yards Invoiced", &["Net Yards Invoiced", "Invoiced Net Yards", "Net Invoiced Yards"]),
    ("Net Income Invoiced", &["Net Income Invoiced", "Invoiced Net Income", "Net Invoiced Income"]),
];

/// Canonical KPI columns of the last-year snapshot and the names they appear under.
pub const LY_MEASURES: &[(&str, &[&str])] = &[
    ("Written Current", &["Written Current", "Written CY", "Written"]),
    ("Written LY", &["Written LY", "Written Last Year"]),
    ("Produced Current", &["Produced Current", "Produced CY", "Produced"]),
    ("Produced LY", &["Produced LY", "Produced Last Year"]),
    ("Invoiced Current", &["Invoiced Current", "Invoiced CY", "Invoiced"]),
    ("Invoiced LY", &["Invoiced LY", "Invoiced Last Year"]),
];

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Workbook '{0}' has no sheet matching '{1}'")]
    SheetMissing(String, String),

    #[error("Snapshot '{0}' has no '{1}' column")]
    LocationMissing(String, String),
}

/// One location and its KPI values, in snapshot column order.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotRow {
    pub location: String,
    pub values: Vec<Option<f64>>,
}

/// A `Location × KPI` table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotTable {
    /// KPI column names; the location column is implicit
    pub columns: Vec<String>,
    pub rows: Vec<SnapshotRow>,
}

impl SnapshotTable {
    /// First row whose trimmed location equals `location`, ignoring case.
    pub fn row(&self, location: &str) -> Option<&SnapshotRow> {
        let wanted = location.trim().to_lowercase();
        self.rows.iter().find(|row| row.location.trim().to_lowercase() == wanted)
    }

    /// The value of the first matching column for a location.
    pub fn value<S: AsRef<str>>(&self, location: &str, column_candidates: &[S]) -> Option<f64> {
        let column = find_column(&self.columns, column_candidates)?;
        let index = self.columns.iter().position(|name| name == column)?;
        self.row(location)?.values.get(index).copied().flatten()
    }

    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.location.as_str())
    }

    pub fn grand_total(&self) -> Option<&SnapshotRow> {
        self.row(GRAND_TOTAL)
    }
}

pub fn is_total_like(location: &str) -> bool {
    TOTAL_LIKE_LOCATIONS.contains(&location.trim().to_lowercase().as_str())
}

fn landing_normalizer() -> TableNormalizer {
    TableNormalizer::new(NormalizeOptions {
        max_scan_rows: DEFAULT_MAX_SCAN_ROWS,
        strategy: HeaderStrategy::BestScore,
        remove_totals: false,
        ..NormalizeOptions::default()
    })
}

/// Builds the plan snapshot from the "YTD Plan vs Act" grid.
pub fn build_plan_snapshot(sheet: &RawSheet) -> SnapshotTable {
    build_snapshot(sheet, PLAN_MEASURES)
}

/// Builds the last-year snapshot from the "YTD vs LY" grid.
pub fn build_ly_snapshot(sheet: &RawSheet) -> SnapshotTable {
    build_snapshot(sheet, LY_MEASURES)
}

/// Keeps the location column and every measure found by alias, drops rows
/// without a location or without any value, and appends a "Grand Total"
/// row of column sums unless the sheet already carries one.
pub fn build_snapshot(sheet: &RawSheet, measures: &[(&str, &[&str])]) -> SnapshotTable {
    let table = landing_normalizer().run(sheet);
    let location_index = find_column(&table.columns, &[LOCATION_COLUMN])
        .and_then(|name| table.column_index(name))
        .or_else(|| {
            if !table.columns.is_empty() {
                debug!(sheet = %sheet.name, column = %table.columns[0], "first column taken as location");
            }
            (!table.columns.is_empty()).then_some(0)
        });

    let mut snapshot = SnapshotTable::default();
    let mut indexes = Vec::new();
    for &(canonical, aliases) in measures {
        match find_column(&table.columns, aliases).and_then(|name| table.column_index(name)) {
            Some(index) if Some(index) != location_index => {
                snapshot.columns.push(canonical.to_string());
                indexes.push(index);
            }
            _ => debug!(sheet = %sheet.name, measure = canonical, "measure column not found"),
        }
    }

    if let Some(location_index) = location_index {
        for row in &table.rows {
            let location = cell_at(row, location_index).as_text();
            if is_placeholder(&location) {
                continue;
            }
            let values: Vec<Option<f64>> = indexes.iter().map(|index| coerce_value(cell_at(row, *index))).collect();
            if !values.is_empty() && values.iter().all(Option::is_none) {
                continue;
            }
            snapshot.rows.push(SnapshotRow { location, values });
        }
    } else {
        warn!(sheet = %sheet.name, "no columns to build a snapshot from");
    }

    if snapshot.grand_total().is_none() {
        let totals = (0..snapshot.columns.len())
            .map(|column| {
                snapshot
                    .rows
                    .iter()
                    .filter(|row| !is_total_like(&row.location))
                    .filter_map(|row| row.values[column])
                    .fold(None, |total: Option<f64>, value| Some(total.unwrap_or(0.0) + value))
            })
            .collect();
        snapshot.rows.push(SnapshotRow {
            location: GRAND_TOTAL.to_owned(),
            values: totals,
        });
    }

    debug!(sheet = %sheet.name, columns = ?snapshot.columns, rows = snapshot.rows.len(), "built snapshot");
    snapshot
}

/// Both landing snapshots of one workbook.
#[derive(Clone, Debug, PartialEq)]
pub struct LandingSnapshots {
    pub plan: SnapshotTable,
    pub ly: SnapshotTable,
}

/// Builds the plan and last-year snapshots and writes them to the configured paths.
pub fn build_landing_snapshots(
    workbook: &mut XlsxWorkbook,
    resolver: &NameResolver,
    config: &SnapshotConfig,
) -> Result<LandingSnapshots, PivotSheetError> {
    let sheet_names = workbook.sheet_names();
    let mut read = |desired: &str| -> Result<RawSheet, PivotSheetError> {
        let name = resolver
            .resolve(&sheet_names, desired)
            .ok_or_else(|| SnapshotError::SheetMissing(workbook.name().to_owned(), desired.to_owned()))?;
        workbook.read_sheet(name, None)
    };
    let plan = build_plan_snapshot(&read(PLAN_SHEET)?);
    let ly = build_ly_snapshot(&read(LY_SHEET)?);

    write_parquet(&plan, &config.plan_path)?;
    write_parquet(&ly, &config.ly_path)?;
    Ok(LandingSnapshots { plan, ly })
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Writes a snapshot to a Parquet file, replacing any previous file atomically.
pub fn write_parquet(snapshot: &SnapshotTable, path: &Path) -> Result<(), PivotSheetError> {
    let connection = Connection::open_in_memory()?;
    let definitions: Vec<String> = std::iter::once(format!("{} VARCHAR", quote_identifier(LOCATION_COLUMN)))
        .chain(snapshot.columns.iter().map(|column| format!("{} DOUBLE", quote_identifier(column))))
        .collect();
    connection.execute_batch(&format!("CREATE TABLE snapshot ({})", definitions.join(", ")))?;

    {
        let placeholders = vec!["?"; definitions.len()].join(", ");
        let mut statement = connection.prepare(&format!("INSERT INTO snapshot VALUES ({placeholders})"))?;
        for row in &snapshot.rows {
            let values = std::iter::once(DuckValue::Text(row.location.to_owned()))
                .chain(row.values.iter().map(|value| value.map_or(DuckValue::Null, DuckValue::Double)));
            statement.execute(params_from_iter(values))?;
        }
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let temporary = path.with_extension("parquet.tmp");
    connection
        .execute_batch(&format!(
            "COPY snapshot TO {} (FORMAT PARQUET)",
            quote_literal(&temporary.display().to_string())
        ))
        .map_err(PivotSheetError::from)
        .with_prefix(&format!("Write snapshot '{}' failed", path.display()))?;
    connection.close().map_err(|(_, e)| e)?;
    std::fs::rename(&temporary, path)
        .map_err(PivotSheetError::from)
        .with_prefix(&format!("Replace snapshot '{}' failed", path.display()))?;

    info!(path = %path.display(), rows = snapshot.rows.len(), columns = snapshot.columns.len(), "wrote snapshot");
    Ok(())
}

/// Reads a snapshot back; `None` when the file does not exist.
pub fn read_parquet(path: &Path) -> Result<Option<SnapshotTable>, PivotSheetError> {
    if !path.is_file() {
        return Ok(None);
    }
    let file_name = path.display().to_string();
    let connection = Connection::open_in_memory()?;
    let snapshot = {
        let mut statement = connection.prepare("SELECT * FROM read_parquet(?)")?;
        let mut rows = statement.query([file_name.as_str()])?;
        let names = rows.as_ref().map(|statement| statement.column_names()).unwrap_or_default();
        let location_index = names
            .iter()
            .position(|name| name.trim().eq_ignore_ascii_case(LOCATION_COLUMN))
            .ok_or_else(|| SnapshotError::LocationMissing(file_name.to_owned(), LOCATION_COLUMN.to_owned()))?;

        let mut snapshot = SnapshotTable {
            columns: names
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != location_index)
                .map(|(_, name)| name.to_owned())
                .collect(),
            rows: Vec::new(),
        };
        while let Some(row) = rows.next()? {
            let location: Option<String> = row.get(location_index)?;
            let Some(location) = location.map(|location| location.trim().to_owned()).filter(|location| !location.is_empty()) else {
                continue;
            };
            let mut values = Vec::with_capacity(snapshot.columns.len());
            for index in (0..names.len()).filter(|index| *index != location_index) {
                values.push(row.get::<_, Option<f64>>(index)?);
            }
            snapshot.rows.push(SnapshotRow { location, values });
        }
        snapshot
    };
    connection.close().map_err(|(_, e)| e)?;
    debug!(path = %path.display(), rows = snapshot.rows.len(), "read snapshot");
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use pretty_assertions::assert_eq;

    fn plan_sheet() -> RawSheet {
        RawSheet::new("YTD Plan vs Act", vec![
            vec![Value::from("YTD Plan vs Actual"), Value::Empty, Value::Empty, Value::Empty, Value::Empty],
            vec![Value::Empty, Value::Empty, Value::Empty, Value::Empty, Value::Empty],
            vec![
                Value::from("Location"),
                Value::from("Produced Yards"),
                Value::from("Yards Planned"),
                Value::from("Income"),
                Value::from("Notes"),
            ],
            vec![Value::from("Plant A"), Value::from(100.0), Value::from(120.0), Value::from("1,000"), Value::from("ok")],
            vec![Value::from(" Plant B "), Value::from(50.0), Value::from(40.0), Value::from("(200)"), Value::from("late")],
            vec![Value::from("nan"), Value::from(1.0), Value::from(1.0), Value::from(1.0), Value::Empty],
            vec![Value::from("Plant C"), Value::from("-"), Value::Empty, Value::from("n/a"), Value::from("idle")],
        ])
    }

    #[test]
    fn plan_snapshot_renames_and_totals() {
        let snapshot = build_plan_snapshot(&plan_sheet());
        assert_eq!(snapshot.columns, vec!["Yards Produced", "Yards Planned", "Income Produced"]);
        let locations: Vec<&str> = snapshot.locations().collect();
        assert_eq!(locations, vec!["Plant A", "Plant B", "Grand Total"]);
        assert_eq!(snapshot.rows[1].values, vec![Some(50.0), Some(40.0), Some(-200.0)]);
        assert_eq!(snapshot.grand_total().unwrap().values, vec![Some(150.0), Some(160.0), Some(800.0)]);
        assert_eq!(snapshot.value("plant b", &["Yards Planned"]), Some(40.0));
        assert_eq!(snapshot.value("Plant B", &["Net Yards Invoiced"]), None);
    }

    #[test]
    fn existing_grand_total_is_kept() {
        let sheet = RawSheet::new("YTD vs LY", vec![
            vec![Value::from("Site"), Value::from("Written"), Value::from("Written LY"), Value::from("Produced")],
            vec![Value::from("Plant A"), Value::from(10.0), Value::from(8.0), Value::from(9.0)],
            vec![Value::from("Grand Total"), Value::from(99.0), Value::from(8.0), Value::from(9.0)],
        ]);
        let snapshot = build_ly_snapshot(&sheet);
        assert_eq!(snapshot.columns, vec!["Written Current", "Written LY", "Produced Current"]);
        assert_eq!(snapshot.rows.len(), 2);
        assert_eq!(snapshot.value("grand total", &["Written Current"]), Some(99.0));
    }

    #[test]
    fn empty_sheet_still_has_grand_total() {
        let snapshot = build_plan_snapshot(&RawSheet::default());
        assert!(snapshot.columns.is_empty());
        assert_eq!(snapshot.rows, vec![SnapshotRow {
            location: GRAND_TOTAL.to_owned(),
            values: vec![],
        }]);
    }

    #[test]
    fn parquet_round_trip() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("nested").join("landing_ytd_plan.parquet");
        assert_eq!(read_parquet(&path).unwrap(), None);

        let snapshot = build_plan_snapshot(&plan_sheet());
        write_parquet(&snapshot, &path).unwrap();
        assert!(path.is_file());
        assert!(!path.with_extension("parquet.tmp").exists());
        assert_eq!(read_parquet(&path).unwrap(), Some(snapshot));
    }

    #[test]
    fn total_like_labels() {
        assert!(is_total_like(" Grand Total "));
        assert!(is_total_like("ALL"));
        assert!(!is_total_like("Total Apparel Co"));
    }
}
