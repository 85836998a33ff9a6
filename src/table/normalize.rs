use crate::spreadsheet::RawSheet;
use crate::table::header::HeaderDetector;
use crate::table::header::HeaderStrategy;
use crate::table::header::DEFAULT_MAX_SCAN_ROWS;
use crate::table::header::DEFAULT_MIN_NON_EMPTY_CELLS;
use crate::table::cell_at;
use crate::table::CleanTable;
use crate::table::Value;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Hardcode regex pattern"));
static SPILLOVER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\.\d+").expect("Hardcode regex pattern"));

const JUNK_NAMES: [&str; 5] = ["unnamed", "nat", "null", "none", "nan"];
const TOTAL_MARKER: &str = "total";

/// Default junk column rule: empty or placeholder names, "Unnamed" prefixes
/// and dot-number spillover names such as ".1".
pub fn is_junk_column(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    lowered.is_empty()
        || JUNK_NAMES.contains(&lowered.as_str())
        || lowered.starts_with("unnamed")
        || SPILLOVER.is_match(&lowered)
}

/// Trims a promoted header cell and collapses internal whitespace runs.
pub fn clean_column_name(value: &Value) -> String {
    WHITESPACE.replace_all(value.to_string().trim(), " ").into_owned()
}

/// Parameters of the normalizer, one set for every sheet shape.
#[derive(Copy, Clone, Debug)]
pub struct NormalizeOptions {
    /// Non-empty cells a row needs to be taken as the header
    pub min_text_cells: usize,
    pub max_scan_rows: usize,
    pub strategy: HeaderStrategy,
    /// Drop rows whose text columns mention "total"
    pub remove_totals: bool,
    /// Columns whose promoted name this accepts are dropped
    pub junk_column: fn(&str) -> bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            min_text_cells: DEFAULT_MIN_NON_EMPTY_CELLS,
            max_scan_rows: DEFAULT_MAX_SCAN_ROWS,
            strategy: HeaderStrategy::FirstQualifying,
            remove_totals: true,
            junk_column: is_junk_column,
        }
    }
}

/// Header detection followed by normalization.
#[derive(Copy, Clone, Debug, Default)]
pub struct TableNormalizer {
    pub options: NormalizeOptions,
}

impl TableNormalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        TableNormalizer { options }
    }

    pub fn detector(&self) -> HeaderDetector {
        HeaderDetector::new(self.options.min_text_cells, self.options.max_scan_rows, self.options.strategy)
    }

    /// Detects the header row and normalizes the sheet. An empty sheet gives an empty table.
    pub fn run(&self, sheet: &RawSheet) -> CleanTable {
        match self.detector().detect(sheet) {
            Some(candidate) => self.normalize(sheet, candidate.row_index),
            None => CleanTable::empty(&sheet.name),
        }
    }

    /// Builds the clean table below `header_row_index`.
    ///
    /// A header index outside the grid gives an empty table.
    pub fn normalize(&self, sheet: &RawSheet, header_row_index: usize) -> CleanTable {
        let Some(header) = sheet.rows.get(header_row_index) else {
            return CleanTable::empty(&sheet.name);
        };
        let names: Vec<String> = header.iter().map(clean_column_name).collect();

        let rows: Vec<&Vec<Value>> = sheet.rows[header_row_index + 1..]
            .iter()
            .filter(|row| !row.iter().all(Value::is_empty))
            .collect();

        let keep: Vec<usize> = (0..names.len())
            .filter(|col| rows.iter().any(|row| !cell_at(row, *col).is_empty()))
            .filter(|col| !(self.options.junk_column)(&names[*col]))
            .collect();

        let columns = dedupe_columns(keep.iter().map(|col| names[*col].as_str()));
        let mut rows: Vec<Vec<Value>> = rows
            .into_iter()
            .map(|row| keep.iter().map(|col| cell_at(row, *col).clone()).collect())
            .collect();

        if self.options.remove_totals {
            let before = rows.len();
            rows = remove_total_rows(rows, columns.len());
            if before != rows.len() {
                debug!(sheet = %sheet.name, removed = before - rows.len(), "removed total rows");
            }
        }

        debug!(
            sheet = %sheet.name,
            header_row = header_row_index,
            columns = columns.len(),
            rows = rows.len(),
            "normalized table"
        );
        CleanTable {
            name: sheet.name.to_owned(),
            columns,
            rows,
            header_row: Some(header_row_index),
        }
    }
}

/// Normalizes with the default junk rule.
pub fn normalize(sheet: &RawSheet, header_row_index: usize, remove_totals: bool) -> CleanTable {
    let options = NormalizeOptions {
        remove_totals,
        ..NormalizeOptions::default()
    };
    TableNormalizer::new(options).normalize(sheet, header_row_index)
}

/// Suffixes repeated names with `__1`, `__2`, ... in order of appearance.
pub fn dedupe_columns<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    let mut taken: HashSet<String> = HashSet::new();
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let mut column = name.to_owned();
        let mut suffix = 0usize;
        while taken.contains(&column) {
            suffix += 1;
            column = format!("{name}__{suffix}");
        }
        taken.insert(column.to_owned());
        columns.push(column);
    }
    columns
}

/// Drops rows where a text-typed column (one holding any text cell) mentions "total".
fn remove_total_rows(rows: Vec<Vec<Value>>, width: usize) -> Vec<Vec<Value>> {
    let text_columns: Vec<usize> = (0..width)
        .filter(|col| rows.iter().any(|row| row[*col].is_text()))
        .collect();
    if text_columns.is_empty() {
        return rows;
    }
    rows.into_iter()
        .filter(|row| {
            !text_columns
                .iter()
                .any(|col| row[*col].as_text().to_lowercase().contains(TOTAL_MARKER))
        })
        .collect()
}
